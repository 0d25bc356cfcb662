//! 前端层：Ratatui TUI（app / event / render）与控制台模式，只消费事件流、发出 Command

pub mod app;
pub mod console;
pub mod event;
pub mod render;
pub mod view;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;

use crate::core::Orchestrator;
use crate::transcript::default_file_name;

pub use app::run_app;
pub use console::{backend_report, run_console};
pub use event::{AppEvent, EventHandler};
pub use render::draw;
pub use view::ViewState;

/// 将当前记录导出到目录，返回文件路径
pub async fn export_conversation(orchestrator: &Orchestrator, dir: &Path) -> anyhow::Result<PathBuf> {
    let export = orchestrator
        .export()
        .await
        .context("Nothing to export: conversation has not started")?;
    let path = dir.join(default_file_name(Local::now()));
    export.save(&path)?;
    Ok(path)
}
