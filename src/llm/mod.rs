//! LLM 层：Provider Client 抽象与实现（Anthropic / OpenAI / Mock）与客户端工厂

pub mod anthropic;
pub mod factory;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod traits;

#[cfg(test)]
mod test_server;

pub use anthropic::{AnthropicClient, ANTHROPIC_BASE_URL};
pub use factory::{ClientFactory, CredentialClientFactory, FixedClientFactory, UnavailableClient};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use provider::{Provider, CLAUDE_3_5_SONNET, GPT_4O_MINI};
pub use traits::{CompletionRequest, LlmClient, LlmError};
