//! 引擎错误类型与错误分类
//!
//! DialogueError 是编排层对外的错误；ErrorKind 是可序列化的分类标签，随事件流一起发给调用方。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ConversationState;
use crate::llm::LlmError;

/// 编排过程中可能出现的错误（配置、重复启动、Provider 失败）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogueError {
    /// 配置非法：在任何网络调用之前被拒绝，调用方修正后可直接重试
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 一个 Orchestrator 只能绑定一次对话
    #[error("Conversation already started (state: {0})")]
    AlreadyStarted(ConversationState),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl DialogueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DialogueError::Configuration(_) | DialogueError::AlreadyStarted(_) => {
                ErrorKind::Configuration
            }
            DialogueError::Llm(e) => ErrorKind::from(e),
        }
    }
}

/// 错误分类（事件流与导出中使用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    NoCredential,
    Authentication,
    RateLimited,
    TransientNetwork,
    Provider,
}

impl ErrorKind {
    /// 调用方是否可以不经人工干预重新发起一次对话
    pub fn is_recoverable(&self) -> bool {
        match self {
            ErrorKind::Configuration
            | ErrorKind::RateLimited
            | ErrorKind::TransientNetwork
            | ErrorKind::Provider => true,
            ErrorKind::NoCredential | ErrorKind::Authentication => false,
        }
    }
}

impl From<&LlmError> for ErrorKind {
    fn from(e: &LlmError) -> Self {
        match e {
            LlmError::NoCredential { .. } => ErrorKind::NoCredential,
            LlmError::Authentication(_) => ErrorKind::Authentication,
            LlmError::RateLimited { .. } => ErrorKind::RateLimited,
            LlmError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            LlmError::Provider(_) => ErrorKind::Provider,
        }
    }
}

/// 终止对话的错误（分类 + 原始信息）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DialogueError> for ErrorReport {
    fn from(e: &DialogueError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
