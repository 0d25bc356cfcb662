//! 会话监管：控制状态、停止令牌与事件发送
//!
//! ControlState 放在 watch 通道里，编排器（调用方线程）写、对话循环读；
//! 停止请求同时触发 CancellationToken，使轮间延迟可以立即被打断。
//! 循环只在两个挂起点观察信号：调用 Provider 之前（checkpoint）与轮间延迟（delay）。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::state::{ControlSignal, ControlState};
use crate::core::{ConversationEvent, ConversationState, ErrorReport, EventStream};

/// 编排器与对话循环共享的监管句柄（Clone 共享同一份状态）
#[derive(Debug, Clone)]
pub struct Supervisor {
    control: Arc<watch::Sender<ControlState>>,
    /// stop 时触发
    stop_token: CancellationToken,
    /// Finished 之后置空，事件流随之结束
    events: Arc<Mutex<Option<mpsc::UnboundedSender<ConversationEvent>>>>,
}

impl Supervisor {
    pub fn new() -> (Self, EventStream) {
        let (control, _) = watch::channel(ControlState::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            control: Arc::new(control),
            stop_token: CancellationToken::new(),
            events: Arc::new(Mutex::new(Some(tx))),
        };
        (supervisor, EventStream::new(rx))
    }

    pub fn control(&self) -> ControlState {
        *self.control.borrow()
    }

    pub fn state(&self) -> ConversationState {
        self.control.borrow().state
    }

    pub fn watch(&self) -> watch::Receiver<ControlState> {
        self.control.subscribe()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    /// 应用操作员信号；不适用时为空操作，返回 false
    pub fn signal(&self, signal: ControlSignal) -> bool {
        let changed = self.transition(|c| c.apply(signal));
        if changed && signal == ControlSignal::Stop {
            self.stop_token.cancel();
        }
        if !changed {
            tracing::debug!(?signal, state = %self.state(), "Control signal ignored");
        }
        changed
    }

    /// 在 watch 锁内修改控制状态；可见状态变化时在锁内发出 StateChanged，保证事件顺序与迁移顺序一致
    fn transition(&self, f: impl FnOnce(&mut ControlState) -> bool) -> bool {
        self.control.send_if_modified(|control| {
            let before = control.state;
            let changed = f(control);
            if changed && control.state != before {
                tracing::info!(from = %before, to = %control.state, "Conversation state changed");
                self.emit(ConversationEvent::StateChanged {
                    state: control.state,
                });
            }
            changed
        })
    }

    /// 挂起点 (a)：兑现暂停请求，暂停期间等待 resume / stop。
    /// 返回 true 表示可以发起下一次 Provider 调用
    pub async fn checkpoint(&self) -> bool {
        self.transition(ControlState::reach_checkpoint);

        let mut rx = self.control.subscribe();
        loop {
            let state = rx.borrow_and_update().state;
            match state {
                ConversationState::Running => return true,
                ConversationState::Paused => {
                    if rx.changed().await.is_err() {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// 挂起点 (b)：轮间延迟，可被 stop 立即打断。返回 false 表示已请求停止
    pub async fn delay(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_stop_requested();
        }
        tokio::select! {
            _ = self.stop_token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub fn emit(&self, event: ConversationEvent) {
        if let Ok(guard) = self.events.lock() {
            if let Some(tx) = guard.as_ref() {
                // 接收端已丢弃时忽略
                let _ = tx.send(event);
            }
        }
    }

    /// 以 Failed 结束：先发 Error 事件，再 Finished
    pub fn fail(&self, turns: usize, report: ErrorReport) -> ConversationState {
        self.emit(ConversationEvent::error(&report));
        self.finish(ConversationState::Failed, turns, Some(report))
    }

    /// 进入终态并发出最后一个事件 Finished，随后关闭事件流
    pub fn finish(
        &self,
        terminal: ConversationState,
        turns: usize,
        error: Option<ErrorReport>,
    ) -> ConversationState {
        self.transition(|c| c.finish(terminal));
        let state = self.state();
        self.emit(ConversationEvent::Finished { state, turns, error });
        if let Ok(mut guard) = self.events.lock() {
            guard.take();
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkpoint_waits_while_paused() {
        let (supervisor, mut events) = Supervisor::new();
        supervisor.signal(ControlSignal::Start);
        supervisor.signal(ControlSignal::Pause);

        let loop_side = supervisor.clone();
        let waiter = tokio::spawn(async move { loop_side.checkpoint().await });

        let mut rx = supervisor.watch();
        rx.wait_for(|c| c.state == ConversationState::Paused).await.unwrap();
        assert!(!waiter.is_finished());

        supervisor.signal(ControlSignal::Resume);
        assert!(waiter.await.unwrap());

        let states: Vec<ConversationState> = std::iter::from_fn(|| events.try_recv())
            .filter_map(|e| match e {
                ConversationEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            [ConversationState::Running, ConversationState::Paused, ConversationState::Running]
        );
    }

    #[tokio::test]
    async fn test_stop_while_paused_releases_checkpoint() {
        let (supervisor, _events) = Supervisor::new();
        supervisor.signal(ControlSignal::Start);
        supervisor.signal(ControlSignal::Pause);

        let loop_side = supervisor.clone();
        let waiter = tokio::spawn(async move { loop_side.checkpoint().await });
        supervisor
            .watch()
            .wait_for(|c| c.state == ConversationState::Paused)
            .await
            .unwrap();

        assert!(supervisor.signal(ControlSignal::Stop));
        assert!(!waiter.await.unwrap());
        assert_eq!(supervisor.state(), ConversationState::Completed);
    }

    #[tokio::test]
    async fn test_stop_interrupts_delay() {
        let (supervisor, _events) = Supervisor::new();
        supervisor.signal(ControlSignal::Start);

        let loop_side = supervisor.clone();
        let sleeper = tokio::spawn(async move { loop_side.delay(Duration::from_secs(30)).await });
        tokio::task::yield_now().await;
        supervisor.signal(ControlSignal::Stop);

        let finished = tokio::time::timeout(Duration::from_secs(2), sleeper)
            .await
            .expect("delay should be interrupted")
            .unwrap();
        assert!(!finished);
    }

    #[tokio::test]
    async fn test_finish_is_last_event_and_closes_stream() {
        let (supervisor, events) = Supervisor::new();
        supervisor.signal(ControlSignal::Start);
        let state = supervisor.finish(ConversationState::Completed, 0, None);
        assert_eq!(state, ConversationState::Completed);

        // 终态之后的信号不产生事件
        supervisor.signal(ControlSignal::Stop);

        let all = events.collect_all().await;
        assert!(all.last().unwrap().is_finished());
        assert_eq!(all.len(), 3);
    }
}
