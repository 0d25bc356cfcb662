//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用 chat completions（可配置 base_url）；系统提示作为第一条 system 消息发送。
//! 错误按 LlmError 分类：鉴权 / 限流 / 网络 / 其它。
//! async_openai 的客户端默认对 429 与 5xx 自动退避重试，这里关闭：每次 complete 只发一个请求。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Provider, Role};

/// OpenAI 兼容客户端：持有 Client；模型与 max_tokens 来自每次请求（即智能体配置）
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiClient {
    /// api_key 由调用方显式注入，不读取环境变量
    pub fn new(base_url: Option<&str>, api_key: &str, timeout: Duration) -> Self {
        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config).with_backoff(no_retry()),
            timeout,
        }
    }

    fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, LlmError> {
        let build_err = |e: OpenAIError| LlmError::Provider(format!("Invalid request message: {e}"));
        let message = match m.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_err)?,
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_err)?,
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(build_err)?,
            ),
        };
        Ok(message)
    }

    fn to_openai_messages(
        request: &CompletionRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        std::iter::once(Message::system(request.system_prompt.clone()))
            .chain(request.messages.iter().cloned())
            .map(|m| Self::to_openai_message(&m))
            .collect()
    }
}

/// 第一次失败后即放弃
fn no_retry() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// 根据 API 返回的 code / type / message 归类错误
pub(crate) fn classify_api_error(code: Option<&str>, kind: Option<&str>, message: &str) -> LlmError {
    let code = code.unwrap_or_default().trim_matches('"');
    let kind = kind.unwrap_or_default().trim_matches('"');
    let lower = message.to_lowercase();

    if code == "invalid_api_key"
        || kind == "authentication_error"
        || lower.contains("incorrect api key")
        || lower.contains("invalid api key")
    {
        LlmError::Authentication(message.to_string())
    } else if code == "rate_limit_exceeded"
        || code == "insufficient_quota"
        || kind == "insufficient_quota"
        || lower.contains("rate limit")
    {
        LlmError::RateLimited {
            retry_after_ms: None,
            message: message.to_string(),
        }
    } else {
        LlmError::Provider(message.to_string())
    }
}

fn classify_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_ref().map(|c| c.to_string());
            let kind = api.r#type.as_ref().map(|t| t.to_string());
            classify_api_error(code.as_deref(), kind.as_deref(), &api.message)
        }
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => LlmError::Authentication(e.to_string()),
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
                message: e.to_string(),
            },
            Some(_) => LlmError::Provider(e.to_string()),
            None => LlmError::TransientNetwork(e.to_string()),
        },
        other => LlmError::Provider(other.to_string()),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let openai_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .max_completion_tokens(request.max_tokens)
            .messages(Self::to_openai_messages(request)?)
            .build()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(openai_request))
            .await
            .map_err(|_| {
                LlmError::TransientNetwork(format!(
                    "OpenAI request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(classify_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_server::StubServer;

    fn chat_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are AI2.".to_string(),
            messages: vec![Message::user("Hello")],
            model: "gpt-4o-mini".to_string(),
            max_tokens: 50,
        }
    }

    #[test]
    fn test_classify_invalid_key() {
        let err = classify_api_error(Some("invalid_api_key"), Some("invalid_request_error"), "Incorrect API key provided");
        assert!(matches!(err, LlmError::Authentication(_)));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_api_error(Some("\"rate_limit_exceeded\""), None, "slow down");
        assert!(matches!(err, LlmError::RateLimited { .. }));

        let err = classify_api_error(None, Some("insufficient_quota"), "You exceeded your current quota");
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[test]
    fn test_classify_other_is_provider_error() {
        let err = classify_api_error(Some("model_not_found"), Some("invalid_request_error"), "The model does not exist");
        assert_eq!(err, LlmError::Provider("The model does not exist".to_string()));
    }

    #[test]
    fn test_system_prompt_is_first_message() {
        let request = CompletionRequest {
            system_prompt: "You are AI1.".to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi")],
            model: "gpt-4o-mini".to_string(),
            max_tokens: 200,
        };
        let messages = OpenAiClient::to_openai_messages(&request).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_sent_once() {
        let server = StubServer::start(
            429,
            &[],
            r#"{"error":{"message":"Rate limit reached for gpt-4o-mini","type":"requests","param":null,"code":"rate_limit_exceeded"}}"#,
        )
        .await;
        let client = OpenAiClient::new(Some(&server.url), "sk-test", Duration::from_secs(5));

        let err = client.complete(&chat_request()).await.unwrap_err();
        assert!(
            matches!(&err, LlmError::RateLimited { message, .. } if message.contains("Rate limit reached")),
            "unexpected error: {err:?}"
        );
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = StubServer::start(503, &[], "upstream overloaded").await;
        let client = OpenAiClient::new(Some(&server.url), "sk-test", Duration::from_secs(5));

        let err = client.complete(&chat_request()).await.unwrap_err();
        assert!(
            matches!(&err, LlmError::Provider(m) if m.contains("upstream overloaded")),
            "unexpected error: {err:?}"
        );
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_maps_to_authentication() {
        let server = StubServer::start(
            401,
            &[],
            r#"{"error":{"message":"Incorrect API key provided: sk-test","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#,
        )
        .await;
        let client = OpenAiClient::new(Some(&server.url), "sk-test", Duration::from_secs(5));

        let err = client.complete(&chat_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)), "unexpected error: {err:?}");
        assert_eq!(server.hits(), 1);
    }
}
