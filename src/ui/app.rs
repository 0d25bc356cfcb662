//! TUI 应用主循环
//!
//! 进入全屏/原始模式，每帧取尽事件流更新 ViewState，轮询键盘把快捷键转为 Command 交给编排器，
//! 再用 draw 渲染。对话结束后界面保留，按 q 退出；运行中退出会先停止对话。

use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Arc;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::{EventStream, Orchestrator};
use crate::ui::event::{AppEvent, EventHandler, Scroll};
use crate::ui::render::draw;
use crate::ui::view::ViewState;
use crate::ui::export_conversation;

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    orchestrator: Arc<Orchestrator>,
    mut events: EventStream,
    export_dir: &Path,
) -> anyhow::Result<()> {
    let mut view = match orchestrator.config() {
        Some(config) => ViewState::new(config),
        None => anyhow::bail!("Conversation has not been started"),
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &orchestrator, &mut events, &mut view, export_dir).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    orchestrator: &Orchestrator,
    events: &mut EventStream,
    view: &mut ViewState,
    export_dir: &Path,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::default();
    let mut conversation_scroll = 0usize;
    let mut last_turns = 0usize;

    loop {
        while let Some(event) = events.try_recv() {
            view.apply(event);
        }
        if view.turns.len() != last_turns {
            last_turns = view.turns.len();
            conversation_scroll = usize::MAX;
        }

        if let Some(ev) = event_handler.poll()? {
            match ev {
                AppEvent::Quit => {
                    if orchestrator.state().is_active() {
                        orchestrator.stop();
                    }
                    break;
                }
                AppEvent::Command(command) => {
                    if orchestrator.dispatch(command) && orchestrator.control().pause_requested {
                        view.status = Some("Pausing after the current turn…".to_string());
                    }
                }
                AppEvent::Export => {
                    view.status = Some(match export_conversation(orchestrator, export_dir).await {
                        Ok(path) => format!("Exported to {}", path.display()),
                        Err(e) => format!("Export failed: {e}"),
                    });
                }
                AppEvent::Scroll(scroll) => {
                    conversation_scroll = match scroll {
                        Scroll::Up(n) => conversation_scroll.saturating_sub(n),
                        Scroll::Down(n) => conversation_scroll.saturating_add(n),
                        Scroll::Top => 0,
                        Scroll::Bottom => usize::MAX,
                    };
                }
            }
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, view, conversation_scroll, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        conversation_scroll = conversation_scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
