//! 事件处理
//!
//! 轮询 crossterm 键盘事件：p 暂停/恢复、s 停止、e 导出、q / Ctrl+C 退出，方向键与翻页键滚动。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::Command;

/// 应用事件：发给编排器的 Command，或仅作用于界面的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Command(Command),
    Export,
    Quit,
    Scroll(Scroll),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Up(usize),
    Down(usize),
    Top,
    Bottom,
}

/// 键盘事件处理器
#[derive(Debug, Clone)]
pub struct EventHandler {
    tick: Duration,
}

impl EventHandler {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// 最多等待一个 tick；无按键时返回 None
    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(self.tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(map_key(key));
                }
            }
        }
        Ok(None)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

pub fn map_key(key: KeyEvent) -> Option<AppEvent> {
    let event = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => AppEvent::Quit,
        KeyCode::Char('q') | KeyCode::Esc => AppEvent::Quit,
        KeyCode::Char('p') | KeyCode::Char(' ') => AppEvent::Command(Command::TogglePause),
        KeyCode::Char('s') => AppEvent::Command(Command::Stop),
        KeyCode::Char('e') => AppEvent::Export,
        KeyCode::Up => AppEvent::Scroll(Scroll::Up(1)),
        KeyCode::Down => AppEvent::Scroll(Scroll::Down(1)),
        KeyCode::PageUp => AppEvent::Scroll(Scroll::Up(10)),
        KeyCode::PageDown => AppEvent::Scroll(Scroll::Down(10)),
        KeyCode::Home => AppEvent::Scroll(Scroll::Top),
        KeyCode::End => AppEvent::Scroll(Scroll::Bottom),
        _ => return None,
    };
    Some(event)
}
