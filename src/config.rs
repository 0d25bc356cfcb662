//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DIALOGUE__*` 覆盖（双下划线表示嵌套，如 `DIALOGUE__CONVERSATION__TURN_LIMIT=4`）。
//! 凭据不在配置文件中：`Credentials::from_env` 在启动时读取一次 ANTHROPIC_API_KEY / OPENAI_API_KEY，再显式注入引擎。

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::core::{
    delay_from_secs, turn_limit_from, AgentId, AgentProfile, ConversationConfig, DialogueError,
    DEFAULT_INITIAL_PROMPT, DEFAULT_MAX_REPLY_TOKENS, DEFAULT_TURN_LIMIT,
};
use crate::llm::Provider;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub conversation: ConversationSection,
    /// 按键的字典序轮流发言（ai10 排在 ai2 之前），与文件中的书写顺序无关
    #[serde(default = "default_agents")]
    pub agents: BTreeMap<String, AgentSection>,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

/// [conversation] 段：轮数、轮间延迟、种子消息
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSection {
    /// 原始整数，<= 0 在转换时拒绝
    #[serde(default = "default_turn_limit")]
    pub turn_limit: i64,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    #[serde(default = "default_initial_prompt")]
    pub initial_prompt: String,
    /// 未单独设置的智能体使用此值
    #[serde(default = "default_max_reply_tokens")]
    pub max_reply_tokens: u32,
}

fn default_turn_limit() -> i64 {
    DEFAULT_TURN_LIMIT as i64
}

fn default_delay_secs() -> f64 {
    2.0
}

fn default_initial_prompt() -> String {
    DEFAULT_INITIAL_PROMPT.to_string()
}

fn default_max_reply_tokens() -> u32 {
    DEFAULT_MAX_REPLY_TOKENS
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            turn_limit: default_turn_limit(),
            delay_secs: default_delay_secs(),
            initial_prompt: default_initial_prompt(),
            max_reply_tokens: default_max_reply_tokens(),
        }
    }
}

/// [agents.<id>] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// anthropic / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 为空时使用 provider 默认模型
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub max_reply_tokens: Option<u32>,
}

fn default_provider() -> String {
    Provider::Anthropic.as_str().to_string()
}

impl AgentSection {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider: provider.as_str().to_string(),
            model: None,
            persona: String::new(),
            max_reply_tokens: None,
        }
    }

    fn to_profile(&self, id: &str, default_tokens: u32) -> Result<AgentProfile, DialogueError> {
        let provider: Provider = self
            .provider
            .parse()
            .map_err(|e| DialogueError::Configuration(format!("agent '{id}': {e}")))?;
        let mut profile = AgentProfile::new(AgentId::new(id), provider)
            .with_persona(self.persona.trim())
            .with_max_reply_tokens(self.max_reply_tokens.unwrap_or(default_tokens));
        if let Some(model) = self.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            profile = profile.with_model(model);
        }
        Ok(profile)
    }
}

fn default_agents() -> BTreeMap<String, AgentSection> {
    BTreeMap::from([
        ("ai1".to_string(), AgentSection::new(Provider::Anthropic)),
        ("ai2".to_string(), AgentSection::new(Provider::OpenAi)),
    ])
}

/// [llm] 段：请求超时与后端地址覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub anthropic_base_url: Option<String>,
    pub openai_base_url: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            anthropic_base_url: None,
            openai_base_url: None,
        }
    }
}

/// [export] 段：导出目录与结束时自动导出
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub auto_export: bool,
}

fn default_export_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: default_export_directory(),
            auto_export: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            conversation: ConversationSection::default(),
            agents: default_agents(),
            llm: LlmSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl AppConfig {
    /// 转换为经过校验的对话配置；非法值在任何网络调用前被拒绝
    pub fn to_conversation_config(&self) -> Result<ConversationConfig, DialogueError> {
        let turn_limit = turn_limit_from(self.conversation.turn_limit)?;
        let inter_turn_delay = delay_from_secs(self.conversation.delay_secs)?;
        let initial_prompt = match self.conversation.initial_prompt.trim() {
            "" => DEFAULT_INITIAL_PROMPT.to_string(),
            prompt => prompt.to_string(),
        };
        let agents = self
            .agents
            .iter()
            .map(|(id, section)| section.to_profile(id, self.conversation.max_reply_tokens))
            .collect::<Result<Vec<_>, _>>()?;

        let config = ConversationConfig {
            turn_limit,
            inter_turn_delay,
            initial_prompt,
            agents,
        };
        config.validate()?;
        Ok(config)
    }
}

/// 各 provider 的 API Key（空值视为未配置）
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 通过任意查找函数读取（测试与嵌入方使用）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |provider: Provider| {
            provider
                .credential_var()
                .and_then(&lookup)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            anthropic: read(Provider::Anthropic),
            openai: read(Provider::OpenAi),
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::OpenAi => self.openai.as_deref(),
            Provider::Mock => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anthropic.is_none() && self.openai.is_none()
    }

    /// 已配置凭据的后端
    pub fn available(&self) -> Vec<Provider> {
        [Provider::Anthropic, Provider::OpenAi]
            .into_iter()
            .filter(|p| self.get(*p).is_some())
            .collect()
    }
}

// 不输出密钥内容
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic", &self.anthropic.as_ref().map(|_| "***"))
            .field("openai", &self.openai.as_ref().map(|_| "***"))
            .finish()
    }
}

/// 从 config 目录加载配置，环境变量 DIALOGUE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键）；文件不存在或无法解析时报错
/// 3. 最后叠加环境变量 DIALOGUE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DIALOGUE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载并校验：读取失败与非法取值都作为错误返回，不回退默认值
pub fn load_conversation_config(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(AppConfig, ConversationConfig)> {
    let app = load_config(config_path).context("Failed to load configuration")?;
    let conversation = app
        .to_conversation_config()
        .context("Invalid conversation configuration")?;
    Ok((app, conversation))
}
