//! 后端枚举与模型目录
//!
//! 模型目录仅供 UI 展示与默认值选择；配置中任何模型字符串都会原样透传给后端。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const CLAUDE_3_5_SONNET: &str = "claude-3-5-sonnet-20241022";
pub const GPT_4O_MINI: &str = "gpt-4o-mini";
pub const MOCK_MODEL: &str = "mock";

const ANTHROPIC_MODELS: &[&str] = &[
    CLAUDE_3_5_SONNET,
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

const OPENAI_MODELS: &[&str] = &["gpt-4o", GPT_4O_MINI, "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];

/// 生成式文本后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    /// 离线占位回复，不走网络
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Mock => "mock",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => CLAUDE_3_5_SONNET,
            Provider::OpenAi => GPT_4O_MINI,
            Provider::Mock => MOCK_MODEL,
        }
    }

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Anthropic => ANTHROPIC_MODELS,
            Provider::OpenAi => OPENAI_MODELS,
            Provider::Mock => &[MOCK_MODEL],
        }
    }

    /// 凭据对应的外部设置名（仅用于提示信息，读取在 config 层完成）
    pub fn credential_var(&self) -> Option<&'static str> {
        match self {
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Mock => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "gpt" => Ok(Provider::OpenAi),
            "mock" => Ok(Provider::Mock),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("Anthropic".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!(" OPENAI ".parse::<Provider>(), Ok(Provider::OpenAi));
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_serde_names() {
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), "\"openai\"");
        let p: Provider = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn test_default_model_is_in_catalog() {
        for p in [Provider::Anthropic, Provider::OpenAi, Provider::Mock] {
            assert!(p.models().contains(&p.default_model()));
        }
    }
}
