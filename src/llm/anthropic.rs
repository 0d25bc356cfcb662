//! Anthropic Messages API 客户端
//!
//! 直接用 reqwest 调用 `POST {base}/v1/messages`：系统提示走顶层 system 字段，
//! 回复为所有 text 内容块拼接。HTTP 状态码映射为 LlmError。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Provider, Role};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize, Debug)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize, Debug)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize, Debug)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize, Debug)]
struct AnthropicErrorDetail {
    message: String,
}

pub struct AnthropicClient {
    endpoint: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl AnthropicClient {
    /// api_key 由调用方显式注入；base_url 为空时使用官方地址
    pub fn new(base_url: Option<&str>, api_key: &str, timeout: Duration) -> Result<Self, LlmError> {
        let base = base_url.unwrap_or(ANTHROPIC_BASE_URL).trim_end_matches('/');
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Provider(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: format!("{base}/v1/messages"),
            api_key: api_key.to_string(),
            http_client,
        })
    }

    fn build_request_body(request: &CompletionRequest) -> AnthropicRequest<'_> {
        AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: Some(request.system_prompt.as_str()).filter(|s| !s.is_empty()),
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m: &Message| AnthropicMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }
}

/// 非 2xx 响应的分类；retry_after 为响应头 retry-after 的原始值（秒）
pub(crate) fn classify_status(status: u16, retry_after: Option<&str>, body: &str) -> LlmError {
    let message = serde_json::from_str::<AnthropicErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

    match status {
        401 | 403 => LlmError::Authentication(message),
        429 | 529 => LlmError::RateLimited {
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000)),
            message,
        },
        _ => LlmError::Provider(message),
    }
}

fn classify_send_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::TransientNetwork(format!("Anthropic request timed out: {err}"))
    } else {
        LlmError::TransientNetwork(format!("Anthropic request failed: {err}"))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = Self::build_request_body(request);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), retry_after.as_deref(), &body_text));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("Failed to parse Anthropic response: {e}")))?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}
