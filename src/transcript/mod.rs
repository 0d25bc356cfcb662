//! 对话记录层：只追加的 Turn 存储与 JSON 导出 / 导入

pub mod conversation;
pub mod export;

pub use conversation::{Transcript, Turn};
pub use export::{default_file_name, AgentMetadata, ExportMetadata, ExportedTurn, TranscriptExport};
