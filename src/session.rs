use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::GenerationError;

/// Identifier correlating every step of one generation attempt on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept an externally chosen id. The backend treats it as opaque, so
    /// anything non-blank is allowed.
    pub fn parse(raw: &str) -> Result<Self, GenerationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::Validation("missing session id".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
