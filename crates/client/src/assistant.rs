//! The help-desk assistant chat.

use crate::api::{ApiClient, ChatTurn};

/// Shown in place of a reply when the assistant cannot be reached.
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble connecting right now. Please try again in a moment.";

/// Starter prompts offered before the first message.
pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "What is JAPA?",
    "How do I get started?",
    "What features are available?",
    "Can I talk to an agent?",
];

pub const USER: &str = "user";
pub const ASSISTANT: &str = "assistant";

/// One assistant conversation, held client-side.
#[derive(Debug)]
pub struct AssistantChat {
    api: ApiClient,
    history: Vec<ChatTurn>,
}

fn turn(role: &str, content: &str) -> ChatTurn {
    ChatTurn {
        role: role.to_string(),
        content: content.to_string(),
    }
}

impl AssistantChat {
    pub fn new(api: &ApiClient) -> Self {
        Self {
            api: api.scoped(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Send a message and return the assistant's reply.
    ///
    /// The server returns the whole updated history, which replaces the
    /// local copy. Failures never surface as errors: the apology is
    /// appended as the reply instead. Blank messages are ignored.
    pub async fn send(&mut self, message: &str) -> Option<String> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let sent = self.history.clone();
        self.history.push(turn(USER, message));

        match self.api.chat(message, &sent).await {
            Ok(response) => match response.conversation_history {
                Some(history) => {
                    self.history = history;
                    self.history
                        .iter()
                        .rev()
                        .find(|t| t.role == ASSISTANT)
                        .map(|t| t.content.clone())
                        .or(response.response)
                }
                None => {
                    let reply = response.response.unwrap_or_else(|| APOLOGY.to_string());
                    self.history.push(turn(ASSISTANT, &reply));
                    Some(reply)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Assistant chat failed");
                self.history.push(turn(ASSISTANT, APOLOGY));
                Some(APOLOGY.to_string())
            }
        }
    }
}

impl Drop for AssistantChat {
    fn drop(&mut self) {
        self.api.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_backend_yields_apology() {
        // Port 9 (discard) is closed on test hosts.
        let api = ApiClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9".into());
        let mut chat = AssistantChat::new(&api);

        assert_eq!(chat.send("   ").await, None);
        let reply = chat.send("What is JAPA?").await;

        assert_eq!(reply.as_deref(), Some(APOLOGY));
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[0], turn(USER, "What is JAPA?"));
        assert_eq!(chat.history()[1].role, ASSISTANT);
    }
}
