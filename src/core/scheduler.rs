//! 轮次调度：对话主循环
//!
//! 严格串行，任意时刻最多一个在途的 Provider 调用。每轮：
//! 挂起点 (a) → 构建上下文 → 调用当前发言者 → 成功则追加 Turn 并发出事件 → 挂起点 (b) 轮间延迟。
//! 任意 Provider 错误都终止本次对话（Failed），不在核心内重试；已在途的调用不会被取消。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{
    AgentId, ContextBuilder, ConversationConfig, ConversationEvent, ConversationState,
    DialogueError, ErrorReport, Supervisor,
};
use crate::llm::LlmClient;
use crate::transcript::Transcript;

/// 一次对话运行；由编排器在后台任务中驱动
pub struct TurnScheduler {
    conversation_id: Uuid,
    config: ConversationConfig,
    clients: HashMap<AgentId, Arc<dyn LlmClient>>,
    transcript: Arc<RwLock<Transcript>>,
    supervisor: Supervisor,
}

impl TurnScheduler {
    /// clients 与 config.agents 按位置一一对应
    pub fn new(
        conversation_id: Uuid,
        config: ConversationConfig,
        clients: Vec<Arc<dyn LlmClient>>,
        transcript: Arc<RwLock<Transcript>>,
        supervisor: Supervisor,
    ) -> Self {
        debug_assert_eq!(config.agents.len(), clients.len());
        let clients = config
            .agents
            .iter()
            .map(|a| a.identity.clone())
            .zip(clients)
            .collect();
        Self {
            conversation_id,
            config,
            clients,
            transcript,
            supervisor,
        }
    }

    /// 运行到终态，返回最终状态；Finished 事件在返回前发出
    pub async fn run(self) -> ConversationState {
        let agents: Vec<&str> = self.config.agents.iter().map(|a| a.identity.as_str()).collect();
        tracing::info!(
            conversation_id = %self.conversation_id,
            turn_limit = self.config.turn_limit,
            agents = ?agents,
            "Conversation started"
        );

        let outcome = self.drive().await;
        let turns = self.transcript.read().await.len();

        let state = match outcome {
            Ok(()) => self.supervisor.finish(ConversationState::Completed, turns, None),
            Err(e) => self.supervisor.fail(turns, ErrorReport::from(&e)),
        };

        tracing::info!(
            conversation_id = %self.conversation_id,
            state = %state,
            turns,
            "Conversation finished"
        );
        state
    }

    async fn drive(&self) -> Result<(), DialogueError> {
        let turn_limit = self.config.turn_limit;

        loop {
            let sequence = self.transcript.read().await.len();
            if sequence >= turn_limit {
                return Ok(());
            }
            if !self.supervisor.checkpoint().await {
                return Ok(());
            }

            let profile = self.config.speaker_for(sequence);
            let client = self.clients.get(&profile.identity).ok_or_else(|| {
                DialogueError::Configuration(format!("no client for agent '{}'", profile.identity))
            })?;

            // 只在读锁内构建请求；调用期间不持锁
            let request = {
                let transcript = self.transcript.read().await;
                ContextBuilder::build(profile, &transcript, &self.config.initial_prompt)
            };
            tracing::debug!(
                agent = %profile.identity,
                provider = %client.provider(),
                model = %profile.model,
                messages = request.messages.len(),
                "Requesting reply"
            );

            let text = match client.complete(&request).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(agent = %profile.identity, sequence, error = %e, "Provider call failed");
                    return Err(e.into());
                }
            };

            let event = {
                let mut transcript = self.transcript.write().await;
                match transcript.append(profile.identity.clone(), text) {
                    Some(turn) => ConversationEvent::turn(turn),
                    None => return Ok(()),
                }
            };
            tracing::info!(agent = %profile.identity, sequence, "Turn appended");
            self.supervisor.emit(event);

            // 最后一轮之后不再等待
            if sequence + 1 >= turn_limit || self.supervisor.is_stop_requested() {
                return Ok(());
            }
            if !self.supervisor.delay(self.config.inter_turn_delay).await {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ControlSignal;
    use crate::core::{AgentId, AgentProfile};
    use crate::llm::{MockLlmClient, Provider};
    use std::time::Duration;

    fn setup(turn_limit: usize) -> (TurnScheduler, Arc<RwLock<Transcript>>, crate::core::EventStream) {
        let config = ConversationConfig::new(
            AgentProfile::new(AgentId::ai1(), Provider::Mock),
            AgentProfile::new(AgentId::ai2(), Provider::Mock),
        )
        .with_turn_limit(turn_limit)
        .with_delay(Duration::ZERO);
        let clients: Vec<Arc<dyn LlmClient>> = vec![
            Arc::new(MockLlmClient::new("ai1")),
            Arc::new(MockLlmClient::new("ai2")),
        ];
        let transcript = Arc::new(RwLock::new(Transcript::with_limit(turn_limit)));
        let (supervisor, events) = Supervisor::new();
        supervisor.signal(ControlSignal::Start);
        let scheduler = TurnScheduler::new(Uuid::new_v4(), config, clients, transcript.clone(), supervisor);
        (scheduler, transcript, events)
    }

    #[tokio::test]
    async fn test_runs_to_turn_limit() {
        let (scheduler, transcript, events) = setup(5);
        assert_eq!(scheduler.run().await, ConversationState::Completed);

        let transcript = transcript.read().await;
        assert_eq!(transcript.len(), 5);
        assert!(transcript.is_strictly_alternating());
        assert_eq!(transcript.turns()[0].speaker, AgentId::ai1());

        let events = events.collect_all().await;
        let produced = events
            .iter()
            .filter(|e| matches!(e, ConversationEvent::TurnProduced { .. }))
            .count();
        assert_eq!(produced, 5);
        assert!(matches!(
            events.last(),
            Some(ConversationEvent::Finished { state: ConversationState::Completed, turns: 5, error: None })
        ));
    }

    #[tokio::test]
    async fn test_mock_echoes_previous_turn() {
        let (scheduler, transcript, _events) = setup(2);
        scheduler.run().await;
        let transcript = transcript.read().await;
        assert!(transcript.turns()[0]
            .text
            .starts_with("[Mock response from AI1: Hello! Let's have an interesting conversation."));
        assert!(transcript.turns()[1].text.starts_with("[Mock response from AI2: [Mock response from AI1"));
    }
}
