//! 控制台模式（--plain）：逐行打印发言，Ctrl+C 优雅停止

use crate::config::Credentials;
use crate::core::{ConversationConfig, ConversationEvent, ConversationState, EventStream, Orchestrator};
use crate::llm::Provider;

/// 单个事件的打印文本；不需要显示的事件返回 None
pub fn format_event(event: &ConversationEvent) -> Option<String> {
    match event {
        ConversationEvent::TurnProduced {
            speaker,
            text,
            sequence,
            ..
        } => Some(format!("[{}] {}: {}", sequence + 1, speaker.label(), text)),
        ConversationEvent::StateChanged { state } => match state {
            ConversationState::Paused => Some("-- paused --".to_string()),
            ConversationState::Stopping => Some("-- stopping after the current turn --".to_string()),
            _ => None,
        },
        ConversationEvent::Error {
            kind,
            message,
            recoverable,
        } => Some(format!(
            "Error ({kind:?}{}): {message}",
            if *recoverable { ", retry possible" } else { "" }
        )),
        ConversationEvent::Finished { state, turns, .. } => {
            Some(format!("Conversation {state} after {turns} turn(s)"))
        }
    }
}

/// 启动时展示每个智能体实际使用的后端；模型不在目录中时列出该后端的已知模型
pub fn backend_report(credentials: &Credentials, config: &ConversationConfig) -> Vec<String> {
    let mut lines = Vec::new();
    for agent in &config.agents {
        let availability = if credentials.is_empty() || agent.provider == Provider::Mock {
            "mock replies".to_string()
        } else if credentials.get(agent.provider).is_some() {
            "available".to_string()
        } else {
            format!(
                "missing {}",
                agent.provider.credential_var().unwrap_or("credential")
            )
        };
        lines.push(format!(
            "{}: {} / {} ({})",
            agent.identity.label(),
            agent.provider,
            agent.model,
            availability
        ));

        let catalog = agent.provider.models();
        if !catalog.contains(&agent.model.as_str()) {
            lines.push(format!("  known {} models: {}", agent.provider, catalog.join(", ")));
        }
    }

    if credentials.is_empty() {
        lines.push(
            "Warning: no API key found (ANTHROPIC_API_KEY / OPENAI_API_KEY), using mock responses"
                .to_string(),
        );
    } else {
        let names: Vec<&str> = credentials.available().iter().map(|p| p.as_str()).collect();
        lines.push(format!("Credentials found for: {}", names.join(", ")));
    }
    lines
}

/// 打印事件直到 Finished；Ctrl+C 只发一次 stop，等待当前轮结束
pub async fn run_console(orchestrator: &Orchestrator, mut events: EventStream) -> anyhow::Result<ConversationState> {
    let mut stop_sent = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = format_event(&event) {
                    println!("{line}");
                }
                if event.is_finished() {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if !stop_sent => {
                signal?;
                stop_sent = true;
                println!("Stopping…");
                orchestrator.stop();
            }
        }
    }
    Ok(orchestrator.wait().await)
}
