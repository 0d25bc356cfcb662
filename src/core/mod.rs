//! 核心编排层：错误分类、状态机、智能体配置、上下文构建、会话监管、轮次调度、编排器

pub mod context;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod profile;
pub mod scheduler;
pub mod state;
pub mod supervisor;

pub use context::ContextBuilder;
pub use error::{DialogueError, ErrorKind, ErrorReport};
pub use events::{ConversationEvent, EventStream};
pub use orchestrator::{Command, Orchestrator};
pub use profile::{
    delay_from_secs, turn_limit_from, AgentId, AgentProfile, ConversationConfig,
    DEFAULT_INITIAL_PROMPT, DEFAULT_INTER_TURN_DELAY, DEFAULT_MAX_REPLY_TOKENS, DEFAULT_TURN_LIMIT,
};
pub use scheduler::TurnScheduler;
pub use state::{ControlSignal, ControlState, ConversationState};
pub use supervisor::Supervisor;
