//! crates/tutor_core/src/chat.rs
//!
//! Free-form conversation with the education-only tutor persona.

use tracing::error;

use crate::domain::{ChatTurn, Session};
use crate::ports::{LanguageModel, PortError};
use crate::prompts;

pub const NOT_CONFIGURED_REPLY: &str =
    "Sorry, I can't connect to the AI right now. Please check your API key.";
pub const UPSTREAM_ERROR_REPLY: &str = "I'm having trouble thinking right now. Please try again.";
pub const FAILURE_REPLY: &str = "Something went wrong. Please try again later.";

pub struct TutorChat {
    turns: Vec<ChatTurn>,
}

impl TutorChat {
    /// Opens a conversation with the greeting already in the history.
    pub fn new(session: Option<&Session>) -> Self {
        let name = session.map(Session::display_name).unwrap_or("friend");
        Self {
            turns: vec![ChatTurn::assistant(format!(
                "Hi {}! Ready to practice your conversation skills today?",
                name
            ))],
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Sends a message and returns the tutor's reply. Blank input is ignored.
    pub async fn send(&mut self, model: &dyn LanguageModel, text: &str) -> Option<&ChatTurn> {
        if text.trim().is_empty() {
            return None;
        }
        self.turns.push(ChatTurn::user(text));

        let reply = match model.complete(prompts::CHAT_TUTOR_SYSTEM, &self.turns).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat Error: {}", e);
                match e {
                    PortError::NotConfigured(_) => NOT_CONFIGURED_REPLY,
                    PortError::Unexpected(_) => UPSTREAM_ERROR_REPLY,
                    _ => FAILURE_REPLY,
                }
                .to_string()
            }
        };
        self.turns.push(ChatTurn::assistant(reply));
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testing::{session, FakeModel};

    #[test]
    fn greets_by_email_local_part() {
        let user = session("maria.lopez@example.com");
        let chat = TutorChat::new(Some(&user));
        assert_eq!(
            chat.turns()[0].content,
            "Hi maria.lopez! Ready to practice your conversation skills today?"
        );
        assert!(TutorChat::new(None).turns()[0].content.starts_with("Hi friend!"));
    }

    #[tokio::test]
    async fn sends_full_history_with_tutor_prompt() {
        let model = FakeModel::new().reply("Photosynthesis makes sugar.");
        let mut chat = TutorChat::new(None);

        let reply = chat.send(&model, "What is photosynthesis?").await.cloned();

        assert_eq!(reply.map(|t| t.content), Some("Photosynthesis makes sugar.".to_string()));
        let calls = model.calls.lock().unwrap();
        let (system, turns) = &calls[0];
        assert_eq!(system, prompts::CHAT_TUTOR_SYSTEM);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[1].content, "What is photosynthesis?");
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let model = FakeModel::new();
        let mut chat = TutorChat::new(None);

        assert!(chat.send(&model, "   ").await.is_none());
        assert_eq!(model.call_count(), 0);
        assert_eq!(chat.turns().len(), 1);
    }

    #[tokio::test]
    async fn failures_become_fixed_replies() {
        let model = FakeModel::new()
            .fail(PortError::NotConfigured("no key".to_string()))
            .fail(PortError::Unauthorized("401".to_string()));
        let mut chat = TutorChat::new(None);

        chat.send(&model, "hello").await;
        chat.send(&model, "hello again").await;

        assert_eq!(chat.turns()[2].content, NOT_CONFIGURED_REPLY);
        assert_eq!(chat.turns()[4].content, FAILURE_REPLY);
    }
}
