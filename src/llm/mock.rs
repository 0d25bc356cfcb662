//! Mock LLM 客户端（无凭据时的离线回退，也用于测试）
//!
//! 取最后一条 User 消息，截取前 50 个字符回显为带标记的占位回复，便于在无网络时跑通整个对话循环。

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, LlmError, Provider};

/// 回显前缀的最大字符数
const ECHO_PREFIX_CHARS: usize = 50;

/// Mock 客户端：确定性地回显对方最后一条消息
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    label: String,
}

impl MockLlmClient {
    /// label 为回复中显示的发言者标识（如 ai1）
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn reply_for(&self, incoming: &str) -> String {
        let prefix: String = incoming.chars().take(ECHO_PREFIX_CHARS).collect();
        format!(
            "[Mock response from {}: {}... (No API available)]",
            self.label.to_uppercase(),
            prefix
        )
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let last_user = request.latest_user_message().unwrap_or("(no input)");
        Ok(self.reply_for(last_user))
    }

    fn provider(&self) -> Provider {
        Provider::Mock
    }
}
