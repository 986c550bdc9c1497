use crate::protocol::{ChatHistoryEntry, ChatRequest};
use crate::reducer::{ToolExecution, TurnOutput};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GREETING: &str = "Hello! How can I help you today?";
pub const FALLBACK_REPLY: &str =
    "I have processed your request, but could not generate a proper response.";
pub const ERROR_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolExecution>>,
}

/// How a streamed turn ended, before it is given an id in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnOutput),
    Failed,
}

impl TurnOutcome {
    fn into_reply(self) -> (String, Option<Vec<ToolExecution>>) {
        match self {
            TurnOutcome::Completed(output) => {
                let tools = (!output.tools.is_empty()).then_some(output.tools);
                let text = if output.answer.is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    output.answer
                };
                (text, tools)
            }
            TurnOutcome::Failed => (ERROR_REPLY.to_string(), None),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("a response is still streaming")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no turn is in progress")]
    NotBusy,
}

/// The transcript of one chat session.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    next_id: u64,
    busy: bool,
    user_id: String,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>) -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
            next_id: 1,
            busy: false,
            user_id: user_id.into(),
        };
        conversation.push(GREETING.to_string(), Sender::Assistant, None);
        conversation
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Records the user's message and builds the request for it.
    pub fn begin_turn(&mut self, text: &str) -> Result<ChatRequest, ConversationError> {
        if self.busy {
            return Err(ConversationError::Busy);
        }
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let chat_history = self.history();
        self.push(text.to_string(), Sender::User, None);
        self.busy = true;

        Ok(ChatRequest {
            query: text.to_string(),
            chat_history,
            user_id: self.user_id.clone(),
        })
    }

    pub fn finish_turn(
        &mut self,
        outcome: TurnOutcome,
    ) -> Result<&ConversationMessage, ConversationError> {
        if !self.busy {
            return Err(ConversationError::NotBusy);
        }
        self.busy = false;
        let (text, tools) = outcome.into_reply();
        Ok(self.push(text, Sender::Assistant, tools))
    }

    // Each user message paired with the assistant reply that followed it.
    fn history(&self) -> Vec<ChatHistoryEntry> {
        self.messages
            .windows(2)
            .filter(|pair| pair[0].sender == Sender::User && pair[1].sender == Sender::Assistant)
            .map(|pair| ChatHistoryEntry {
                query: pair[0].text.clone(),
                response: pair[1].text.clone(),
            })
            .collect()
    }

    fn push(
        &mut self,
        text: String,
        sender: Sender,
        tools: Option<Vec<ToolExecution>>,
    ) -> &ConversationMessage {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ConversationMessage {
            id,
            text,
            sender,
            tools,
        });
        &self.messages[self.messages.len() - 1]
    }
}
