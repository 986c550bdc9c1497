use crate::config::ClientConfig;
use crate::conversation::TurnOutcome;
use crate::decoder::decode_stream;
use crate::protocol::{ChatRequest, RegisterRequest, RegisterResponse};
use crate::reducer::{ChatReducer, Snapshot, TurnOutput};
use futures::StreamExt;
use reqwest::{Client as HttpClient, StatusCode};
use std::future::Future;
use thiserror::Error;

const CHAT_PATH: &str = "/api/v0/agent/chat";
const REGISTER_PATH: &str = "/api/v0/user/register";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("chat transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RegisterRequestError {
    #[error("registration failed: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("registration transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    api_key: String,
    user_id: String,
    http: HttpClient,
}

impl AgentClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            base_url: config.normalized_base_url(),
            user_id: config.resolved_user_id(),
            api_key: config.api_key,
            http: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Sends one chat turn and folds the streamed reply.
    ///
    /// `on_snapshot` sees the tool list and answer text after every chunk the
    /// reducer recognises.
    pub async fn stream_chat<F, Fut>(
        &self,
        request: &ChatRequest,
        mut on_snapshot: F,
    ) -> Result<TurnOutput, ChatError>
    where
        F: FnMut(Snapshot) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::debug!(
            history = request.chat_history.len(),
            "sending chat request"
        );

        let response = self
            .http
            .post(format!("{}{}", self.base_url, CHAT_PATH))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let mut reducer = ChatReducer::new();
        let values = decode_stream(response.bytes_stream());
        futures::pin_mut!(values);

        while let Some(value) = values.next().await {
            let value = value?;
            if reducer.apply_value(&value) {
                on_snapshot(reducer.snapshot()).await;
            }
        }

        let output = reducer.finish();
        tracing::debug!(
            tools = output.tools.len(),
            answer_len = output.answer.len(),
            "chat stream finished"
        );
        Ok(output)
    }

    /// Like [`AgentClient::stream_chat`], collapsing any failure into
    /// [`TurnOutcome::Failed`] so partial state never reaches the transcript.
    pub async fn run_turn<F, Fut>(&self, request: &ChatRequest, on_snapshot: F) -> TurnOutcome
    where
        F: FnMut(Snapshot) -> Fut,
        Fut: Future<Output = ()>,
    {
        match self.stream_chat(request, on_snapshot).await {
            Ok(output) => TurnOutcome::Completed(output),
            Err(err) => {
                tracing::warn!(error = %err, "chat turn failed");
                TurnOutcome::Failed
            }
        }
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, RegisterRequestError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, REGISTER_PATH))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // The backend reports rejections in the same {status, message} shape.
        match serde_json::from_str::<RegisterResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                tracing::warn!(error = %err, %status, "unexpected registration response");
                Err(RegisterRequestError::Status { status, body })
            }
        }
    }
}
