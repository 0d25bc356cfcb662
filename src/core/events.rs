//! 对话事件流：调度器 -> 调用方
//!
//! 每产出一轮发出 TurnProduced；状态迁移发出 StateChanged；失败先发 Error 再发 Finished。
//! Finished 永远是最后一个事件，之后流结束。

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::{AgentId, ConversationState, ErrorKind, ErrorReport};
use crate::transcript::Turn;

/// 引擎发给调用方的事件
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    TurnProduced {
        speaker: AgentId,
        text: String,
        sequence: usize,
        created_at: DateTime<Utc>,
    },
    StateChanged {
        state: ConversationState,
    },
    Error {
        kind: ErrorKind,
        message: String,
        recoverable: bool,
    },
    Finished {
        state: ConversationState,
        turns: usize,
        error: Option<ErrorReport>,
    },
}

impl ConversationEvent {
    pub fn turn(turn: &Turn) -> Self {
        ConversationEvent::TurnProduced {
            speaker: turn.speaker.clone(),
            text: turn.text.clone(),
            sequence: turn.sequence,
            created_at: turn.created_at,
        }
    }

    pub fn error(report: &ErrorReport) -> Self {
        ConversationEvent::Error {
            kind: report.kind,
            message: report.message.clone(),
            recoverable: report.kind.is_recoverable(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ConversationEvent::Finished { .. })
    }
}

/// 事件接收端
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ConversationEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ConversationEvent>) -> Self {
        Self { rx }
    }

    /// 下一个事件；循环结束且事件取尽后返回 None
    pub async fn recv(&mut self) -> Option<ConversationEvent> {
        self.rx.recv().await
    }

    /// 非阻塞读取（UI 每帧轮询）
    pub fn try_recv(&mut self) -> Option<ConversationEvent> {
        self.rx.try_recv().ok()
    }

    /// 读取直到 Finished，返回全部事件
    pub async fn collect_all(mut self) -> Vec<ConversationEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            let done = event.is_finished();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }
}

impl Stream for EventStream {
    type Item = ConversationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_event_serialises_with_type_tag() {
        let event = ConversationEvent::Finished {
            state: ConversationState::Failed,
            turns: 0,
            error: Some(ErrorReport {
                kind: ErrorKind::Authentication,
                message: "bad key".into(),
            }),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "finished");
        assert_eq!(value["state"], "failed");
        assert_eq!(value["error"]["kind"], "authentication");
    }

    #[test]
    fn test_error_event_carries_recoverability() {
        let report = ErrorReport {
            kind: ErrorKind::RateLimited,
            message: "slow down".into(),
        };
        assert_eq!(
            ConversationEvent::error(&report),
            ConversationEvent::Error {
                kind: ErrorKind::RateLimited,
                message: "slow down".into(),
                recoverable: true,
            }
        );
    }

    #[tokio::test]
    async fn test_stream_yields_until_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);
        tx.send(ConversationEvent::StateChanged {
            state: ConversationState::Running,
        })
        .unwrap();
        drop(tx);

        assert!(matches!(
            stream.next().await,
            Some(ConversationEvent::StateChanged { .. })
        ));
        assert!(stream.next().await.is_none());
    }
}
