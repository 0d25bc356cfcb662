//! 对话编排器：对外的唯一入口
//!
//! 负责：校验配置、通过 ClientFactory 为每个智能体创建客户端、在后台任务中运行 TurnScheduler，
//! 并把操作员命令（Pause/Resume/Stop）转成控制信号。一个 Orchestrator 只绑定一次对话。

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock};

use futures_util::FutureExt;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{Credentials, LlmSettings};
use crate::core::state::{ControlSignal, ControlState};
use crate::core::{
    ConversationConfig, ConversationState, DialogueError, ErrorKind, ErrorReport, EventStream,
    Supervisor, TurnScheduler,
};
use crate::llm::{ClientFactory, CredentialClientFactory, LlmClient};
use crate::transcript::{Transcript, TranscriptExport};

/// 操作员命令（UI / 控制台 -> 编排器）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// 暂停中或已请求暂停则恢复，否则暂停
    TogglePause,
    Stop,
}

pub struct Orchestrator {
    factory: Arc<dyn ClientFactory>,
    conversation_id: Uuid,
    supervisor: Supervisor,
    /// start 时交给调用方
    events: Mutex<Option<EventStream>>,
    config: OnceLock<ConversationConfig>,
    transcript: Arc<RwLock<Transcript>>,
    task: Mutex<Option<JoinHandle<ConversationState>>>,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        let (supervisor, events) = Supervisor::new();
        Self {
            factory,
            conversation_id: Uuid::new_v4(),
            supervisor,
            events: Mutex::new(Some(events)),
            config: OnceLock::new(),
            transcript: Arc::new(RwLock::new(Transcript::new())),
            task: Mutex::new(None),
        }
    }

    /// 使用显式注入的凭据选择后端（无凭据时回退 Mock）
    pub fn with_credentials(credentials: Credentials, settings: LlmSettings) -> Self {
        Self::new(Arc::new(CredentialClientFactory::new(credentials, settings)))
    }

    /// 校验配置并在后台启动对话循环（需在 tokio 运行时内调用）。
    /// 配置非法时状态保持 Idle，可修正后再次 start
    pub fn start(&self, config: ConversationConfig) -> Result<EventStream, DialogueError> {
        let state = self.state();
        if state != ConversationState::Idle {
            return Err(DialogueError::AlreadyStarted(state));
        }
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            DialogueError::Configuration("start must be called inside a tokio runtime".to_string())
        })?;

        let events = self
            .events
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .ok_or(DialogueError::AlreadyStarted(state))?;

        let clients: Vec<Arc<dyn LlmClient>> =
            config.agents.iter().map(|profile| self.factory.create(profile)).collect();
        for (profile, client) in config.agents.iter().zip(&clients) {
            tracing::info!(
                agent = %profile.identity,
                provider = %client.provider(),
                model = %profile.model,
                "Agent ready"
            );
        }

        let transcript = self.transcript.clone();
        let supervisor = self.supervisor.clone();
        let scheduler_config = config.clone();
        if self.config.set(config).is_err() || !self.supervisor.signal(ControlSignal::Start) {
            return Err(DialogueError::AlreadyStarted(self.state()));
        }

        let conversation_id = self.conversation_id;
        let handle = runtime.spawn(async move {
            // 等待并发的读者释放锁，确保上限在第一轮之前生效
            *transcript.write().await = Transcript::with_limit(scheduler_config.turn_limit);

            let scheduler = TurnScheduler::new(
                conversation_id,
                scheduler_config,
                clients,
                transcript.clone(),
                supervisor.clone(),
            );
            match AssertUnwindSafe(scheduler.run()).catch_unwind().await {
                Ok(state) => state,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    tracing::error!(%conversation_id, "Conversation loop panicked: {}", detail);
                    let turns = transcript.read().await.len();
                    supervisor.fail(turns, task_failure(detail))
                }
            }
        });
        if let Ok(mut guard) = self.task.lock() {
            *guard = Some(handle);
        }
        Ok(events)
    }

    pub fn pause(&self) -> bool {
        self.supervisor.signal(ControlSignal::Pause)
    }

    pub fn resume(&self) -> bool {
        self.supervisor.signal(ControlSignal::Resume)
    }

    pub fn stop(&self) -> bool {
        self.supervisor.signal(ControlSignal::Stop)
    }

    pub fn toggle_pause(&self) -> bool {
        let control = self.control();
        if control.state == ConversationState::Paused || control.pause_requested {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// 执行命令；返回状态是否发生变化（不适用的命令为空操作）
    pub fn dispatch(&self, command: Command) -> bool {
        tracing::debug!(?command, "Dispatching command");
        match command {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => self.toggle_pause(),
            Command::Stop => self.stop(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.supervisor.state()
    }

    pub fn control(&self) -> ControlState {
        self.supervisor.control()
    }

    pub fn watch_state(&self) -> watch::Receiver<ControlState> {
        self.supervisor.watch()
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// start 之后可用
    pub fn config(&self) -> Option<&ConversationConfig> {
        self.config.get()
    }

    /// 当前记录的快照
    pub async fn transcript(&self) -> Transcript {
        self.transcript.read().await.clone()
    }

    /// 快照 + 元数据；start 之前返回 None
    pub async fn export(&self) -> Option<TranscriptExport> {
        let config = self.config.get()?;
        let transcript = self.transcript.read().await;
        Some(TranscriptExport::new(
            self.conversation_id,
            config,
            &transcript,
            Some(self.state()),
        ))
    }

    /// 等待对话循环结束，返回最终状态；未启动时直接返回当前状态
    pub async fn wait(&self) -> ConversationState {
        let handle = self.task.lock().ok().and_then(|mut guard| guard.take());
        match handle {
            Some(handle) => match handle.await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!("Conversation task failed: {}", e);
                    let turns = self.transcript.read().await.len();
                    self.supervisor.fail(turns, task_failure(e))
                }
            },
            None => self.state(),
        }
    }
}

/// 对话任务异常终止时上报的错误
fn task_failure(detail: impl fmt::Display) -> ErrorReport {
    ErrorReport {
        kind: ErrorKind::Provider,
        message: format!("Conversation task failed: {detail}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}
