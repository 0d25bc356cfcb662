//! 智能体身份、智能体配置与对话配置
//!
//! 对话配置在 start 时校验；非法值（轮数为 0、延迟为负、重复身份等）在任何网络调用前被拒绝。
//! 发言顺序按 agents 列表轮转，增加第三个智能体只需改配置。

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::DialogueError;
use crate::llm::Provider;

pub const DEFAULT_INITIAL_PROMPT: &str = "Hello! Let's have an interesting conversation.";
pub const DEFAULT_TURN_LIMIT: usize = 10;
pub const DEFAULT_INTER_TURN_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_REPLY_TOKENS: u32 = 200;

/// 智能体身份（如 ai1 / ai2），统一为小写
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn ai1() -> Self {
        Self::new("ai1")
    }

    pub fn ai2() -> Self {
        Self::new("ai2")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 展示用名称（AI1）
    pub fn label(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个智能体的静态配置；一次对话期间不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub identity: AgentId,
    /// 注入系统提示的人设描述，可为空
    pub persona: String,
    pub provider: Provider,
    pub model: String,
    pub max_reply_tokens: u32,
}

impl AgentProfile {
    /// 使用 provider 默认模型与默认回复长度
    pub fn new(identity: AgentId, provider: Provider) -> Self {
        Self {
            identity,
            persona: String::new(),
            provider,
            model: provider.default_model().to_string(),
            max_reply_tokens: DEFAULT_MAX_REPLY_TOKENS,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_reply_tokens(mut self, tokens: u32) -> Self {
        self.max_reply_tokens = tokens;
        self
    }

    /// 人设是否被配置（导出时决定是否写出 persona 字段）
    pub fn has_persona(&self) -> bool {
        !self.persona.trim().is_empty()
    }
}

/// 一次对话的完整配置
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationConfig {
    pub turn_limit: usize,
    pub inter_turn_delay: Duration,
    /// 发给第一个智能体的种子消息
    pub initial_prompt: String,
    /// 发言顺序即列表顺序
    pub agents: Vec<AgentProfile>,
}

impl ConversationConfig {
    /// 两个智能体 + 默认轮数 / 延迟 / 种子消息
    pub fn new(ai1: AgentProfile, ai2: AgentProfile) -> Self {
        Self {
            turn_limit: DEFAULT_TURN_LIMIT,
            inter_turn_delay: DEFAULT_INTER_TURN_DELAY,
            initial_prompt: DEFAULT_INITIAL_PROMPT.to_string(),
            agents: vec![ai1, ai2],
        }
    }

    pub fn with_turn_limit(mut self, turn_limit: usize) -> Self {
        self.turn_limit = turn_limit;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_turn_delay = delay;
        self
    }

    pub fn with_initial_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.initial_prompt = prompt.into();
        self
    }

    pub fn validate(&self) -> Result<(), DialogueError> {
        if self.turn_limit == 0 {
            return Err(DialogueError::Configuration(
                "turn limit must be a positive integer".to_string(),
            ));
        }
        if self.agents.len() < 2 {
            return Err(DialogueError::Configuration(format!(
                "a conversation needs at least two agents, got {}",
                self.agents.len()
            )));
        }
        if self.initial_prompt.trim().is_empty() {
            return Err(DialogueError::Configuration(
                "initial prompt must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.identity.as_str().is_empty() {
                return Err(DialogueError::Configuration("agent identity must not be empty".to_string()));
            }
            if !seen.insert(&agent.identity) {
                return Err(DialogueError::Configuration(format!(
                    "duplicate agent identity '{}'",
                    agent.identity
                )));
            }
            if agent.model.trim().is_empty() {
                return Err(DialogueError::Configuration(format!(
                    "agent '{}' has no model",
                    agent.identity
                )));
            }
            if agent.max_reply_tokens == 0 {
                return Err(DialogueError::Configuration(format!(
                    "agent '{}' max reply tokens must be positive",
                    agent.identity
                )));
            }
        }
        Ok(())
    }

    /// 第 sequence 轮（从 0 开始）的发言者
    pub fn speaker_for(&self, sequence: usize) -> &AgentProfile {
        &self.agents[sequence % self.agents.len()]
    }
}

/// 将外部输入的轮数转换为 turn_limit（<= 0 拒绝）
pub fn turn_limit_from(raw: i64) -> Result<usize, DialogueError> {
    usize::try_from(raw)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            DialogueError::Configuration(format!("turn limit must be a positive integer, got {raw}"))
        })
}

/// 将外部输入的秒数转换为 Duration（负数与 NaN/inf 拒绝）
pub fn delay_from_secs(secs: f64) -> Result<Duration, DialogueError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(DialogueError::Configuration(format!(
            "inter-turn delay must be a non-negative number of seconds, got {secs}"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConversationConfig {
        ConversationConfig::new(
            AgentProfile::new(AgentId::ai1(), Provider::Anthropic),
            AgentProfile::new(AgentId::ai2(), Provider::OpenAi),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let c = config();
        assert!(c.validate().is_ok());
        assert_eq!(c.turn_limit, 10);
        assert_eq!(c.agents[0].model, "claude-3-5-sonnet-20241022");
        assert_eq!(c.agents[1].model, "gpt-4o-mini");
    }

    #[test]
    fn test_zero_turn_limit_rejected() {
        let err = config().with_turn_limit(0).validate().unwrap_err();
        assert!(matches!(err, DialogueError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut c = config();
        c.agents[1].identity = AgentId::new("AI1");
        assert!(matches!(c.validate(), Err(DialogueError::Configuration(m)) if m.contains("duplicate")));
    }

    #[test]
    fn test_single_agent_rejected() {
        let mut c = config();
        c.agents.pop();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_speaker_rotation() {
        let c = config();
        let speakers: Vec<&str> = (0..5).map(|i| c.speaker_for(i).identity.as_str()).collect();
        assert_eq!(speakers, ["ai1", "ai2", "ai1", "ai2", "ai1"]);
    }

    #[test]
    fn test_raw_value_conversion() {
        assert_eq!(turn_limit_from(4).unwrap(), 4);
        assert!(turn_limit_from(0).is_err());
        assert!(turn_limit_from(-3).is_err());

        assert_eq!(delay_from_secs(0.0).unwrap(), Duration::ZERO);
        assert_eq!(delay_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert!(delay_from_secs(-0.5).is_err());
        assert!(delay_from_secs(f64::NAN).is_err());
    }

    #[test]
    fn test_agent_id_normalised() {
        assert_eq!(AgentId::new(" AI2 "), AgentId::ai2());
        assert_eq!(AgentId::ai1().label(), "AI1");
    }
}
