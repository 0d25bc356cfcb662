//! 前端视图状态：由事件流累积而成，TUI 与控制台共用

use crate::core::{AgentId, ConversationConfig, ConversationEvent, ConversationState, ErrorReport};

/// 界面上显示的一轮发言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTurn {
    pub speaker: AgentId,
    pub text: String,
    pub sequence: usize,
}

/// 界面状态投影
#[derive(Debug, Clone)]
pub struct ViewState {
    pub turns: Vec<DisplayTurn>,
    pub state: ConversationState,
    pub turn_limit: usize,
    /// 发言顺序中的身份，用于配色
    pub agents: Vec<AgentId>,
    /// 底部提示：导出路径、暂停请求等
    pub status: Option<String>,
    pub error: Option<ErrorReport>,
    pub finished: bool,
}

impl ViewState {
    pub fn new(config: &ConversationConfig) -> Self {
        Self {
            turns: Vec::new(),
            state: ConversationState::Idle,
            turn_limit: config.turn_limit,
            agents: config.agents.iter().map(|a| a.identity.clone()).collect(),
            status: None,
            error: None,
            finished: false,
        }
    }

    pub fn apply(&mut self, event: ConversationEvent) {
        match event {
            ConversationEvent::TurnProduced {
                speaker,
                text,
                sequence,
                ..
            } => self.turns.push(DisplayTurn {
                speaker,
                text,
                sequence,
            }),
            ConversationEvent::StateChanged { state } => {
                self.state = state;
                if state == ConversationState::Paused || state == ConversationState::Running {
                    self.status = None;
                }
            }
            ConversationEvent::Error { kind, message, .. } => {
                self.error = Some(ErrorReport { kind, message });
            }
            ConversationEvent::Finished { state, error, .. } => {
                self.state = state;
                if error.is_some() {
                    self.error = error;
                }
                self.finished = true;
            }
        }
    }

    /// n/limit
    pub fn progress(&self) -> String {
        format!("{}/{}", self.turns.len(), self.turn_limit)
    }

    pub fn phase_label(&self) -> &'static str {
        match self.state {
            ConversationState::Idle => "Idle",
            ConversationState::Running => "Running",
            ConversationState::Paused => "Paused",
            ConversationState::Stopping => "Stopping…",
            ConversationState::Completed => "Completed",
            ConversationState::Failed => "Failed",
        }
    }

    /// 发言者在列表中的位置（配色用）
    pub fn agent_index(&self, id: &AgentId) -> usize {
        self.agents.iter().position(|a| a == id).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AgentProfile, ErrorKind};
    use crate::llm::Provider;
    use chrono::Utc;

    fn view() -> ViewState {
        let config = ConversationConfig::new(
            AgentProfile::new(AgentId::ai1(), Provider::Mock),
            AgentProfile::new(AgentId::ai2(), Provider::Mock),
        )
        .with_turn_limit(4);
        ViewState::new(&config)
    }

    #[test]
    fn test_turn_events_update_progress() {
        let mut v = view();
        v.apply(ConversationEvent::StateChanged {
            state: ConversationState::Running,
        });
        v.apply(ConversationEvent::TurnProduced {
            speaker: AgentId::ai2(),
            text: "hi".into(),
            sequence: 0,
            created_at: Utc::now(),
        });
        assert_eq!(v.progress(), "1/4");
        assert_eq!(v.phase_label(), "Running");
        assert_eq!(v.agent_index(&AgentId::ai2()), 1);
    }

    #[test]
    fn test_finished_keeps_error() {
        let mut v = view();
        v.apply(ConversationEvent::Error {
            kind: ErrorKind::Authentication,
            message: "bad key".into(),
            recoverable: false,
        });
        v.apply(ConversationEvent::Finished {
            state: ConversationState::Failed,
            turns: 0,
            error: None,
        });
        assert!(v.finished);
        assert_eq!(v.state, ConversationState::Failed);
        assert_eq!(v.error.as_ref().map(|e| e.kind), Some(ErrorKind::Authentication));
    }
}
