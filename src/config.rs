use uuid::Uuid;

/// Connection settings for the agent backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Identifies this user to the backend; a random id is used when unset.
    pub user_id: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub(crate) fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub(crate) fn resolved_user_id(&self) -> String {
        match &self.user_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => Uuid::new_v4().to_string(),
        }
    }
}
