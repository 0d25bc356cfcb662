//! 对话记录：只追加的 Turn 序列
//!
//! 插入顺序即对话时间；sequence 从 0 开始单调递增，Turn 一旦追加不可修改。
//! 设置上限后 append 在满时拒绝追加，保证 len <= turn_limit。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::AgentId;

/// 单轮发言
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: AgentId,
    pub text: String,
    pub sequence: usize,
    pub created_at: DateTime<Utc>,
}

/// 一次对话的完整记录
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    limit: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            turns: Vec::with_capacity(limit.min(256)),
            limit: Some(limit),
        }
    }

    /// 追加一轮；已满时返回 None 且不做任何修改
    pub fn append(&mut self, speaker: AgentId, text: impl Into<String>) -> Option<&Turn> {
        if self.is_full() {
            return None;
        }
        let sequence = self.turns.len();
        self.turns.push(Turn {
            speaker,
            text: text.into(),
            sequence,
            created_at: Utc::now(),
        });
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.turns.len() >= limit)
    }

    /// 相邻两轮发言者均不相同
    pub fn is_strictly_alternating(&self) -> bool {
        self.turns.windows(2).all(|w| w[0].speaker != w[1].speaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_monotonic_sequence() {
        let mut t = Transcript::new();
        t.append(AgentId::ai1(), "one");
        t.append(AgentId::ai2(), "two");
        let seqs: Vec<usize> = t.turns().iter().map(|turn| turn.sequence).collect();
        assert_eq!(seqs, [0, 1]);
        assert_eq!(t.last().unwrap().text, "two");
    }

    #[test]
    fn test_append_refuses_past_limit() {
        let mut t = Transcript::with_limit(2);
        assert!(t.append(AgentId::ai1(), "a").is_some());
        assert!(t.append(AgentId::ai2(), "b").is_some());
        assert!(t.is_full());
        assert!(t.append(AgentId::ai1(), "c").is_none());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_alternation_check() {
        let mut t = Transcript::new();
        t.append(AgentId::ai1(), "a");
        t.append(AgentId::ai2(), "b");
        assert!(t.is_strictly_alternating());
        t.append(AgentId::ai2(), "c");
        assert!(!t.is_strictly_alternating());
    }
}
