//! LLM 客户端抽象
//!
//! 所有后端（Anthropic / OpenAI / Mock）实现 LlmClient：一次请求对应一次完整回复，不做流式、不做重试。
//! 客户端只读请求中的历史，不修改任何状态；网络 I/O 是唯一副作用。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{Message, Provider};

/// 单次补全请求：系统提示 + 按角色标注的历史 + 该智能体的模型参数
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// 历史中最后一条 user 消息（Mock 回显、日志预览用）
    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::llm::Role::User))
            .map(|m| m.content.as_str())
    }
}

/// Provider 层错误分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 所选 provider 没有配置凭据（配置缺陷，不是运行时故障）
    #[error("No credential configured for provider '{provider}'")]
    NoCredential { provider: Provider },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        retry_after_ms: Option<u64>,
        message: String,
    },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// LLM 客户端 trait：一次 complete 调用产出一条回复或一个分类错误
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// 客户端对应的后端（Mock 也在其中，便于上层判断是否走了网络）
    fn provider(&self) -> Provider;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }

    fn provider(&self) -> Provider {
        (**self).provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_user_message_skips_assistant_entries() {
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![
                Message::user("seed"),
                Message::assistant("mine"),
                Message::user("theirs"),
                Message::assistant("mine again"),
            ],
            model: "m".to_string(),
            max_tokens: 10,
        };
        assert_eq!(request.latest_user_message(), Some("theirs"));
    }

    #[test]
    fn test_no_credential_message_names_provider() {
        let err = LlmError::NoCredential {
            provider: Provider::OpenAi,
        };
        assert!(err.to_string().contains("openai"));
    }
}
