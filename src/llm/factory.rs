//! 客户端工厂：按智能体配置选择后端（Anthropic / OpenAI / Mock）
//!
//! 凭据在构造时显式注入，工厂本身不读取环境变量：
//! - 一个凭据都没有：所有智能体回退到 Mock（对话循环仍可离线跑通）
//! - provider = mock：Mock
//! - 所选 provider 有凭据：真实客户端
//! - 其它：UnavailableClient，每次调用返回 NoCredential，由调度器按失败路径终止本次对话

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Credentials, LlmSettings};
use crate::core::{AgentId, AgentProfile};
use crate::llm::{
    AnthropicClient, CompletionRequest, LlmClient, LlmError, MockLlmClient, OpenAiClient, Provider,
};

/// 为每个智能体创建 Provider Client（不发起任何网络请求）
pub trait ClientFactory: Send + Sync {
    fn create(&self, profile: &AgentProfile) -> Arc<dyn LlmClient>;
}

/// 无法工作的客户端：每次调用都返回同一个错误
#[derive(Debug, Clone)]
pub struct UnavailableClient {
    provider: Provider,
    error: LlmError,
}

impl UnavailableClient {
    pub fn new(provider: Provider, error: LlmError) -> Self {
        Self { provider, error }
    }

    pub fn missing_credential(provider: Provider) -> Self {
        Self::new(provider, LlmError::NoCredential { provider })
    }
}

#[async_trait]
impl LlmClient for UnavailableClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Err(self.error.clone())
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}

/// 默认工厂：凭据 + 后端设置
#[derive(Debug, Clone)]
pub struct CredentialClientFactory {
    credentials: Credentials,
    settings: LlmSettings,
}

impl CredentialClientFactory {
    pub fn new(credentials: Credentials, settings: LlmSettings) -> Self {
        if credentials.is_empty() {
            tracing::warn!("No API key configured for any provider, using Mock LLM");
        }
        Self {
            credentials,
            settings,
        }
    }

    /// 没有任何凭据时整体回退到 Mock
    pub fn uses_mock_fallback(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl ClientFactory for CredentialClientFactory {
    fn create(&self, profile: &AgentProfile) -> Arc<dyn LlmClient> {
        if self.uses_mock_fallback() || profile.provider == Provider::Mock {
            return Arc::new(MockLlmClient::new(profile.identity.as_str()));
        }

        let Some(key) = self.credentials.get(profile.provider) else {
            tracing::warn!(
                agent = %profile.identity,
                provider = %profile.provider,
                "No credential for selected provider"
            );
            return Arc::new(UnavailableClient::missing_credential(profile.provider));
        };

        let timeout = self.settings.request_timeout();
        match profile.provider {
            Provider::Anthropic => {
                match AnthropicClient::new(self.settings.anthropic_base_url.as_deref(), key, timeout) {
                    Ok(client) => {
                        tracing::info!("Using Anthropic LLM ({}) for {}", profile.model, profile.identity);
                        Arc::new(client)
                    }
                    Err(e) => Arc::new(UnavailableClient::new(Provider::Anthropic, e)),
                }
            }
            Provider::OpenAi => {
                tracing::info!("Using OpenAI LLM ({}) for {}", profile.model, profile.identity);
                Arc::new(OpenAiClient::new(
                    self.settings.openai_base_url.as_deref(),
                    key,
                    timeout,
                ))
            }
            Provider::Mock => Arc::new(MockLlmClient::new(profile.identity.as_str())),
        }
    }
}

/// 固定映射工厂：嵌入方或测试为每个智能体直接注入客户端
#[derive(Default, Clone)]
pub struct FixedClientFactory {
    clients: HashMap<AgentId, Arc<dyn LlmClient>>,
}

impl FixedClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, agent: AgentId, client: Arc<dyn LlmClient>) -> Self {
        self.clients.insert(agent, client);
        self
    }
}

impl ClientFactory for FixedClientFactory {
    fn create(&self, profile: &AgentProfile) -> Arc<dyn LlmClient> {
        match self.clients.get(&profile.identity) {
            Some(client) => client.clone(),
            None => Arc::new(UnavailableClient::new(
                profile.provider,
                LlmError::Provider(format!("No client registered for agent {}", profile.identity)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, provider: Provider) -> AgentProfile {
        AgentProfile::new(AgentId::new(id), provider)
    }

    #[test]
    fn test_no_credentials_falls_back_to_mock() {
        let factory = CredentialClientFactory::new(Credentials::default(), LlmSettings::default());
        assert!(factory.uses_mock_fallback());
        for p in [Provider::Anthropic, Provider::OpenAi] {
            assert_eq!(factory.create(&profile("ai1", p)).provider(), Provider::Mock);
        }
    }

    #[tokio::test]
    async fn test_missing_credential_for_selected_provider() {
        let creds = Credentials {
            anthropic: None,
            openai: Some("sk-test".to_string()),
        };
        let factory = CredentialClientFactory::new(creds, LlmSettings::default());

        let client = factory.create(&profile("ai1", Provider::Anthropic));
        assert_eq!(client.provider(), Provider::Anthropic);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![],
            model: "m".to_string(),
            max_tokens: 1,
        };
        assert_eq!(
            client.complete(&request).await,
            Err(LlmError::NoCredential {
                provider: Provider::Anthropic
            })
        );

        assert_eq!(factory.create(&profile("ai2", Provider::OpenAi)).provider(), Provider::OpenAi);
    }

    #[test]
    fn test_explicit_mock_provider_with_credentials() {
        let creds = Credentials {
            anthropic: Some("sk-ant".to_string()),
            openai: None,
        };
        let factory = CredentialClientFactory::new(creds, LlmSettings::default());
        assert_eq!(factory.create(&profile("ai2", Provider::Mock)).provider(), Provider::Mock);
        assert_eq!(factory.create(&profile("ai1", Provider::Anthropic)).provider(), Provider::Anthropic);
    }

    #[test]
    fn test_fixed_factory_returns_registered_client() {
        let factory = FixedClientFactory::new()
            .with_client(AgentId::new("ai1"), Arc::new(MockLlmClient::new("ai1")));
        assert_eq!(factory.create(&profile("ai1", Provider::Anthropic)).provider(), Provider::Mock);
        assert_eq!(factory.create(&profile("ai2", Provider::OpenAi)).provider(), Provider::OpenAi);
    }
}
