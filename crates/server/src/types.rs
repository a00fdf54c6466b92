//! Core types for the chat relay server.

use std::{fmt, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Parse a client-supplied role, trimming and ignoring case.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(ValidationError::InvalidRole),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relayed chat message.
///
/// Built only by [`crate::store::MessageLog::append`]; never mutated after
/// that. Ids are assigned from a process-lifetime counter and are never
/// reused, not even after the history is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Strictly increasing message id, starting at 1
    pub id: u64,
    /// Seconds since the Unix epoch at append time
    pub ts: f64,
    pub role: Role,
    pub content: String,
    /// Display name; empty when the client supplied none
    pub name: String,
}

/// Rejection reasons for client-supplied message input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("role must be one of: user, assistant, system")]
    InvalidRole,

    #[error("content is required")]
    EmptyContent,
}

/// Server configuration options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 for auto-assign)
    pub port: u16,
    /// Maximum number of retained messages
    pub capacity: usize,
    /// Quiet period between stream heartbeats
    pub heartbeat_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            capacity: crate::store::DEFAULT_CAPACITY,
            heartbeat_interval: crate::session::HEARTBEAT_INTERVAL,
        }
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub(crate) fn now_ts() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_trims_and_ignores_case() {
        assert_eq!(Role::parse("user"), Ok(Role::User));
        assert_eq!(Role::parse("  ASSISTANT "), Ok(Role::Assistant));
        assert_eq!(Role::parse("System"), Ok(Role::System));
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        assert_eq!(Role::parse("moderator"), Err(ValidationError::InvalidRole));
        assert_eq!(Role::parse(""), Err(ValidationError::InvalidRole));
    }

    #[test]
    fn test_message_json_shape() {
        let msg = Message {
            id: 1,
            ts: 1700000000.5,
            role: Role::User,
            content: "hi".to_string(),
            name: String::new(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["name"], "");
        assert!(json["ts"].is_f64());
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::InvalidRole.to_string(),
            "role must be one of: user, assistant, system"
        );
        assert_eq!(ValidationError::EmptyContent.to_string(), "content is required");
    }
}
