//! Dialogue - 双智能体对话
//!
//! 入口：加载配置与凭据、初始化日志、启动编排器，再运行 TUI（默认）或控制台模式（--plain）。
//! 用法：dialogue [config.toml] [--plain]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dialogue::config::{load_conversation_config, Credentials};
use dialogue::{observability, ui, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let plain = args.iter().any(|a| a == "--plain");
    let config_path = args.iter().find(|a| !a.starts_with("--")).map(PathBuf::from);

    // TUI 占用终端，日志写文件
    if plain {
        observability::init();
    } else {
        observability::init_to_file("dialogue.log")?;
    }

    // 配置错误直接退出，不回退默认值
    let (app, conversation) = load_conversation_config(config_path)?;

    let credentials = Credentials::from_env();
    for line in ui::backend_report(&credentials, &conversation) {
        println!("{line}");
    }

    let orchestrator = Arc::new(Orchestrator::with_credentials(credentials, app.llm.clone()));
    let events = orchestrator
        .start(conversation)
        .context("Failed to start conversation")?;

    if plain {
        ui::run_console(&orchestrator, events).await?;
    } else {
        ui::run_app(orchestrator.clone(), events, &app.export.directory)
            .await
            .context("App run failed")?;
    }

    let state = orchestrator.wait().await;
    tracing::info!("Conversation ended: {}", state);

    if app.export.auto_export {
        let path = ui::export_conversation(&orchestrator, &app.export.directory).await?;
        println!("Conversation exported to {}", path.display());
    }

    Ok(())
}
