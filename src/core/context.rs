//! 上下文构建：为即将发言的智能体从完整记录重建请求
//!
//! 每一轮都从头遍历 Transcript：种子消息作为第一条 user，
//! 之后本智能体的发言标为 assistant，其余为 user。最后一条即最新消息，不重复追加。

use crate::core::AgentProfile;
use crate::llm::{CompletionRequest, Message};
use crate::transcript::Transcript;

const BEHAVIOUR_DIRECTIVE: &str = "You are having a conversation with another AI. \
Keep your responses conversational, thoughtful, and engaging. \
Aim for 1-3 sentences unless the topic requires more depth.";

/// 纯函数式的上下文构建器（只读 Transcript）
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    /// 人设 + 固定行为指令
    pub fn system_prompt(profile: &AgentProfile) -> String {
        let mut intro = format!("You are {}.", profile.identity.label());
        let persona = profile.persona.trim();
        if !persona.is_empty() {
            intro.push(' ');
            intro.push_str(persona);
        }
        format!("{intro}\n\n{BEHAVIOUR_DIRECTIVE}")
    }

    /// 按角色标注的历史
    pub fn messages(profile: &AgentProfile, transcript: &Transcript, initial_prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::user(initial_prompt));
        for turn in transcript.turns() {
            if turn.speaker == profile.identity {
                messages.push(Message::assistant(turn.text.clone()));
            } else {
                messages.push(Message::user(turn.text.clone()));
            }
        }
        messages
    }

    pub fn build(profile: &AgentProfile, transcript: &Transcript, initial_prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: Self::system_prompt(profile),
            messages: Self::messages(profile, transcript, initial_prompt),
            model: profile.model.clone(),
            max_tokens: profile.max_reply_tokens,
        }
    }
}
