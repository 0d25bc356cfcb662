//! 对话导出 / 导入
//!
//! 导出为单文件 JSON：metadata（导出时间、轮数、各智能体 provider/model/persona）+ conversation（按顺序的发言）。
//! 导入对分析工具产生的旧文件保持宽容：发言者字段可为 speaker 或 sender，metadata 中的智能体段可缺失，
//! 也接受扁平的 `ai1_provider` / `ai1_model` / `ai1_persona` 键。

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AgentId, ConversationConfig, ConversationState};
use crate::transcript::Transcript;

/// 导出文档根
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptExport {
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub conversation: Vec<ExportedTurn>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    #[serde(default)]
    pub export_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<ConversationState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentMetadata>,
    /// 旧格式的扁平键（ai1_model 等）与未知键
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

/// 导出的单条发言
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTurn {
    #[serde(alias = "sender")]
    pub speaker: AgentId,
    #[serde(alias = "text")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
}

impl TranscriptExport {
    /// 由配置与记录快照生成导出文档
    pub fn new(
        conversation_id: Uuid,
        config: &ConversationConfig,
        transcript: &Transcript,
        final_state: Option<ConversationState>,
    ) -> Self {
        let agents = config
            .agents
            .iter()
            .map(|a| AgentMetadata {
                id: a.identity.clone(),
                provider: Some(a.provider.to_string()),
                model: Some(a.model.clone()),
                persona: a.has_persona().then(|| a.persona.clone()),
            })
            .collect();

        let conversation = transcript
            .turns()
            .iter()
            .map(|t| ExportedTurn {
                speaker: t.speaker.clone(),
                message: t.text.clone(),
                timestamp: Some(t.created_at.to_rfc3339()),
                sequence: Some(t.sequence),
            })
            .collect();

        Self {
            metadata: ExportMetadata {
                export_time: Utc::now().to_rfc3339(),
                conversation_id: Some(conversation_id),
                message_count: transcript.len(),
                final_state,
                agents,
                extra: BTreeMap::new(),
            },
            conversation,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let mut export: Self = serde_json::from_str(data).context("Invalid conversation export")?;
        if export.metadata.message_count == 0 {
            export.metadata.message_count = export.conversation.len();
        }
        Ok(export)
    }

    /// 写入 JSON 文件；父目录不存在时自动创建
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Conversation exported to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&data)
    }

    /// 按 sequence 排序的发言；缺少 sequence 时以文件中的位置为准
    pub fn ordered_turns(&self) -> Vec<ExportedTurn> {
        let mut turns: Vec<ExportedTurn> = self
            .conversation
            .iter()
            .enumerate()
            .map(|(i, t)| ExportedTurn {
                sequence: Some(t.sequence.unwrap_or(i)),
                ..t.clone()
            })
            .collect();
        turns.sort_by_key(|t| t.sequence);
        turns
    }

    /// 智能体元数据；新格式缺失时从旧格式的扁平键（`{id}_provider` 等）还原
    pub fn agent_metadata(&self) -> Vec<AgentMetadata> {
        if !self.metadata.agents.is_empty() {
            return self.metadata.agents.clone();
        }

        let mut by_id: BTreeMap<String, AgentMetadata> = BTreeMap::new();
        for (key, value) in &self.metadata.extra {
            let Some((id, field)) = key.rsplit_once('_') else {
                continue;
            };
            let Some(text) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            let entry = by_id.entry(id.to_string()).or_insert_with(|| AgentMetadata {
                id: AgentId::new(id),
                provider: None,
                model: None,
                persona: None,
            });
            match field {
                "provider" => entry.provider = Some(text.to_string()),
                "model" => entry.model = Some(text.to_string()),
                "persona" => entry.persona = Some(text.to_string()),
                _ => {}
            }
        }
        by_id.into_values().collect()
    }
}

/// 默认导出文件名：conversation_YYYYmmdd_HHMMSS.json（本地时间）
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("conversation_{}.json", now.format("%Y%m%d_%H%M%S"))
}
