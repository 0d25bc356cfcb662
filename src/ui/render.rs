//! 界面渲染
//!
//! 标题栏显示状态与进度 n/limit，主体为按智能体着色的对话记录（按宽度换行），底部为状态 / 错误与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::ConversationState;
use crate::ui::view::ViewState;

const AGENT_COLORS: [Color; 4] = [Color::Cyan, Color::Green, Color::Magenta, Color::Yellow];

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn state_color(state: ConversationState) -> Color {
    match state {
        ConversationState::Running => Color::Green,
        ConversationState::Paused | ConversationState::Stopping => Color::Yellow,
        ConversationState::Failed => Color::Red,
        ConversationState::Idle | ConversationState::Completed => Color::Blue,
    }
}

/// 绘制一帧；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, view: &ViewState, conversation_scroll: usize, out: &mut (usize, usize)) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(3) as usize; // 边框 + 滚动条

    let title = format!(" Dialogue │ {} │ {} ", view.phase_label(), view.progress());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state_color(view.state)));

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, turn) in view.turns.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let color = AGENT_COLORS[view.agent_index(&turn.speaker) % AGENT_COLORS.len()];
        let prefix = format!("{:<4} ", turn.speaker.label());
        let indent = " ".repeat(prefix.chars().count());
        for (i, line) in wrap_text(&turn.text, content_width.saturating_sub(prefix.len()).max(20))
            .into_iter()
            .enumerate()
        {
            let pref = if i == 0 { prefix.clone() } else { indent.clone() };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }
    if view.turns.is_empty() && !view.finished {
        text_lines.push(Line::from(Span::styled(
            "Waiting for the first reply…",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let content_height = conv_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    f.render_widget(block, conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    let (status, status_color) = if let Some(err) = &view.error {
        (format!(" {:?}: {} ", err.kind, err.message), Color::Red)
    } else if let Some(status) = &view.status {
        (format!(" {} ", status), Color::Blue)
    } else if view.finished {
        (" Conversation finished ".to_string(), Color::Blue)
    } else {
        (String::new(), Color::Blue)
    };

    let hint = if view.finished {
        " e 导出 │ ↑↓ PgUp/PgDn 滚动 │ q 退出 "
    } else {
        " p 暂停/继续 │ s 停止 │ e 导出 │ ↑↓ 滚动 │ q 退出 "
    };
    let footer = Paragraph::new(Line::from(Span::styled(
        status.chars().take(content_width.max(20)).collect::<String>(),
        Style::default().fg(status_color),
    )))
    .block(
        Block::default()
            .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(status_color)),
    );
    f.render_widget(footer, chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}
