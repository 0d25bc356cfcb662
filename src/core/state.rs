//! 对话状态机
//!
//! ConversationState 为对外可见的阶段；ControlState 额外记录「已请求暂停但尚未生效」。
//! 暂停只在两轮之间生效：pause 只置位请求，循环到达挂起点时才真正进入 Paused，
//! 因此 Paused 状态下一定没有在途的 Provider 调用，Paused --stop--> Completed 可以立即完成。
//!
//! | 当前 | 信号 | 结果 |
//! |---|---|---|
//! | Idle | start | Running |
//! | Running | pause | Running（pause_requested）→ 挂起点 → Paused |
//! | Paused | resume | Running |
//! | Running | stop | Stopping → 当前轮结束 → Completed |
//! | Paused | stop | Completed |
//!
//! Completed / Failed 为终态，之后所有信号都是空操作。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 对话阶段
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
}

impl ConversationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Completed | ConversationState::Failed)
    }

    /// 对话循环是否仍在运行（含暂停与停止中）
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConversationState::Running | ConversationState::Paused | ConversationState::Stopping
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Running => "running",
            ConversationState::Paused => "paused",
            ConversationState::Stopping => "stopping",
            ConversationState::Completed => "completed",
            ConversationState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 操作员发出的控制信号
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Start,
    Pause,
    Resume,
    Stop,
}

/// 编排器与对话循环共享的控制状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlState {
    pub state: ConversationState,
    /// Running 时收到 pause，等待循环到达挂起点
    pub pause_requested: bool,
}

impl ControlState {
    /// 应用操作员信号；不适用的信号为空操作，返回 false
    pub fn apply(&mut self, signal: ControlSignal) -> bool {
        use ConversationState::*;

        match (signal, self.state) {
            (ControlSignal::Start, Idle) => {
                self.state = Running;
                self.pause_requested = false;
                true
            }
            (ControlSignal::Pause, Running) if !self.pause_requested => {
                self.pause_requested = true;
                true
            }
            (ControlSignal::Resume, Paused) => {
                self.state = Running;
                self.pause_requested = false;
                true
            }
            (ControlSignal::Resume, Running) if self.pause_requested => {
                self.pause_requested = false;
                true
            }
            (ControlSignal::Stop, Running) => {
                self.state = Stopping;
                self.pause_requested = false;
                true
            }
            (ControlSignal::Stop, Paused) => {
                self.state = Completed;
                true
            }
            _ => false,
        }
    }

    /// 循环到达挂起点：兑现挂起的暂停请求
    pub fn reach_checkpoint(&mut self) -> bool {
        if self.state == ConversationState::Running && self.pause_requested {
            self.state = ConversationState::Paused;
            self.pause_requested = false;
            true
        } else {
            false
        }
    }

    /// 进入终态（已是终态时不变）
    pub fn finish(&mut self, terminal: ConversationState) -> bool {
        debug_assert!(terminal.is_terminal());
        if self.state.is_terminal() {
            return false;
        }
        self.state = terminal;
        self.pause_requested = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;

    fn running() -> ControlState {
        let mut c = ControlState::default();
        assert!(c.apply(ControlSignal::Start));
        c
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut c = running();
        assert_eq!(c.state, Running);
        assert!(!c.apply(ControlSignal::Start));
    }

    #[test]
    fn test_pause_takes_effect_at_checkpoint() {
        let mut c = running();
        assert!(c.apply(ControlSignal::Pause));
        assert_eq!(c.state, Running);
        assert!(c.reach_checkpoint());
        assert_eq!(c.state, Paused);
    }

    #[test]
    fn test_pause_twice_is_noop() {
        let mut c = running();
        assert!(c.apply(ControlSignal::Pause));
        let before = c;
        assert!(!c.apply(ControlSignal::Pause));
        assert_eq!(c, before);

        c.reach_checkpoint();
        assert!(!c.apply(ControlSignal::Pause));
        assert_eq!(c.state, Paused);
    }

    #[test]
    fn test_resume_cancels_pending_pause() {
        let mut c = running();
        c.apply(ControlSignal::Pause);
        assert!(c.apply(ControlSignal::Resume));
        assert!(!c.reach_checkpoint());
        assert_eq!(c.state, Running);
    }

    #[test]
    fn test_resume_from_paused() {
        let mut c = running();
        c.apply(ControlSignal::Pause);
        c.reach_checkpoint();
        assert!(c.apply(ControlSignal::Resume));
        assert_eq!(c.state, Running);
        assert!(!c.apply(ControlSignal::Resume));
    }

    #[test]
    fn test_stop_transitions() {
        let mut c = running();
        assert!(c.apply(ControlSignal::Stop));
        assert_eq!(c.state, Stopping);
        assert!(!c.apply(ControlSignal::Pause));

        let mut p = running();
        p.apply(ControlSignal::Pause);
        p.reach_checkpoint();
        assert!(p.apply(ControlSignal::Stop));
        assert_eq!(p.state, Completed);
    }

    #[test]
    fn test_terminal_states_ignore_signals() {
        for terminal in [Completed, Failed] {
            let mut c = running();
            assert!(c.finish(terminal));
            for signal in [ControlSignal::Start, ControlSignal::Pause, ControlSignal::Resume, ControlSignal::Stop] {
                assert!(!c.apply(signal));
            }
            assert!(!c.finish(Completed));
            assert_eq!(c.state, terminal);
        }
    }

    #[test]
    fn test_stop_on_idle_is_noop() {
        let mut c = ControlState::default();
        assert!(!c.apply(ControlSignal::Stop));
        assert_eq!(c.state, Idle);
    }
}
