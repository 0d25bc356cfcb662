//! Dialogue - 双智能体对话编排引擎
//!
//! 两个独立配置的生成式模型（AI1 / AI2）轮流发言，每轮以完整记录作为上下文，
//! 操作员可随时暂停、恢复、停止。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）与凭据读取
//! - **core**: 状态机、上下文构建、轮次调度、编排器、事件流
//! - **llm**: Provider Client 抽象与实现（Anthropic / OpenAI / Mock）
//! - **observability**: tracing 初始化
//! - **transcript**: 只追加的对话记录与 JSON 导出 / 导入
//! - **ui**: Ratatui TUI 与控制台模式

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod transcript;
pub mod ui;

pub use crate::core::{
    Command, ConversationConfig, ConversationEvent, ConversationState, DialogueError, Orchestrator,
};
