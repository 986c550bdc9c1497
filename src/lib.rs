//! Terminal client for a streaming support-agent backend.
//!
//! The chat endpoint answers with newline-delimited JSON. [`decoder`] turns the
//! response body into JSON objects, [`reducer`] folds them into the state of a
//! turn, and [`conversation`] keeps the transcript the next request is built from.

pub mod client;
pub mod config;
pub mod conversation;
pub mod decoder;
pub mod protocol;
pub mod reducer;
pub mod register;
pub mod ui;

pub use client::{AgentClient, ChatError, RegisterRequestError};
pub use config::ClientConfig;
pub use conversation::{Conversation, ConversationMessage, Sender, TurnOutcome};
pub use reducer::{ChatReducer, Snapshot, ToolExecution, TurnOutput};
