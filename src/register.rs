//! Registration form handling: validation, submission and the confirmation
//! the backend answers with.

use crate::client::{AgentClient, RegisterRequestError};
use crate::protocol::RegisterRequest;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

pub const MISSING_CHAT_ID_MESSAGE: &str =
    "We are facing an issue at this time, please contact the owner of the Telegram Bot.";
pub const INVALID_FORM_MESSAGE: &str =
    "Facing issue parsing the form data, please contact the owner of the Telegram Bot.";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: u32,
    pub gender: String,
    pub privacy_policy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("no chat id was provided")]
    MissingChatId,
    #[error("invalid registration form: {}", join_errors(.0))]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Request(#[from] RegisterRequestError),
    #[error("registration was not accepted: {0}")]
    Rejected(String),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RegisterError {
    /// Confirmation shown instead of a backend answer.
    pub fn confirmation(&self) -> Option<Confirmation> {
        let message = match self {
            RegisterError::MissingChatId => MISSING_CHAT_ID_MESSAGE,
            RegisterError::Invalid(_) => INVALID_FORM_MESSAGE,
            RegisterError::Request(_) | RegisterError::Rejected(_) => return None,
        };
        Some(Confirmation {
            status: false,
            message: message.to_string(),
        })
    }
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field, message| {
            if !ok {
                errors.push(FieldError { field, message });
            }
        };

        check(
            self.first_name.chars().count() >= 2,
            "firstName",
            "First name must be at least 2 characters",
        );
        check(
            self.last_name.chars().count() >= 2,
            "lastName",
            "Last name must be at least 2 characters",
        );
        check(
            EMAIL.is_match(&self.email),
            "email",
            "Please enter a valid email address",
        );
        check(self.age >= 18, "age", "You must be at least 18 years old");
        check(self.age <= 120, "age", "Please enter a valid age");
        check(!self.gender.is_empty(), "gender", "Please select a gender");
        check(
            self.privacy_policy,
            "privacyPolicy",
            "You must accept the privacy policy",
        );

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn into_request(self, chat_id: String) -> RegisterRequest {
        RegisterRequest {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            age: self.age,
            gender: self.gender,
            privacy_policy: self.privacy_policy,
            chat_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub status: bool,
    pub message: String,
}

impl Confirmation {
    /// Fails with the backend's message when the registration was refused.
    pub fn accepted(&self) -> Result<(), RegisterError> {
        if self.status {
            Ok(())
        } else {
            Err(RegisterError::Rejected(self.message.clone()))
        }
    }

    /// The thank-you page carrying this confirmation as query parameters.
    pub fn redirect_url(&self, base: &str) -> Result<Url, url::ParseError> {
        let base = base.trim_end_matches('/');
        Url::parse_with_params(
            &format!("{}/thank-you", base),
            &[
                ("status", self.status.to_string()),
                ("message", self.message.clone()),
            ],
        )
    }
}

/// Validates the form and submits it for the given Telegram chat.
pub async fn submit(
    client: &AgentClient,
    chat_id: Option<&str>,
    form: RegistrationForm,
) -> Result<Confirmation, RegisterError> {
    let chat_id = match chat_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => return Err(RegisterError::MissingChatId),
    };
    form.validate().map_err(RegisterError::Invalid)?;

    let response = client.register(&form.into_request(chat_id)).await?;
    tracing::debug!(status = response.status, "registration answered");

    Ok(Confirmation {
        status: response.status,
        message: response.message,
    })
}
