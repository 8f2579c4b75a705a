use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON error body returned by every Set Track'r HTTP endpoint.
///
/// `message` is the human readable text the web client displays as-is.
/// Endpoint specific context (for example the `direction` of a block)
/// is carried as additional top-level fields in `extra`.
///
/// ```ignore
/// let body = ErrorResponse::new("Conversation not found", 404, error_types::NOT_FOUND_ERROR, error_codes::CONVERSATION_NOT_FOUND);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// User facing message
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Coarse error class used by clients to route handling, see [`error_types`]
    pub error_type: String,

    /// Stable machine readable code, see [`error_codes`]
    pub code: String,

    /// ISO 8601 timestamp
    pub timestamp: String,

    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl ErrorResponse {
    pub fn new(message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            extra: Map::new(),
        }
    }

    /// Attach an extra top-level field to the body.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Stable error codes
pub mod error_codes {
    // Users
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const USER_BLOCKED: &str = "USER_BLOCKED";
    pub const BLOCK_NOT_FOUND: &str = "BLOCK_NOT_FOUND";

    // Authentication
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";

    // Chat
    pub const CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
    pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
    pub const NOT_CONVERSATION_MEMBER: &str = "NOT_CONVERSATION_MEMBER";
    pub const NOT_MESSAGE_SENDER: &str = "NOT_MESSAGE_SENDER";
    pub const ROOM_NOT_JOINED: &str = "ROOM_NOT_JOINED";

    // Request validation
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Error classes
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const SERVER_ERROR: &str = "server_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "User not found",
            404,
            error_types::NOT_FOUND_ERROR,
            error_codes::USER_NOT_FOUND,
        );

        assert_eq!(error.status, 404);
        assert_eq!(error.message, "User not found");
        assert_eq!(error.code, error_codes::USER_NOT_FOUND);
    }

    #[test]
    fn test_extra_fields_are_flattened() {
        let error = ErrorResponse::new(
            "You have blocked this user",
            403,
            error_types::AUTHORIZATION_ERROR,
            error_codes::USER_BLOCKED,
        )
        .with_field("direction", "outgoing");

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["direction"], "outgoing");
        assert_eq!(json["message"], "You have blocked this user");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_round_trip_keeps_extra_fields() {
        let error = ErrorResponse::new("nope", 403, error_types::AUTHORIZATION_ERROR, "X")
            .with_field("direction", "incoming");

        let text = serde_json::to_string(&error).unwrap();
        let back: ErrorResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back.extra.get("direction").unwrap(), "incoming");
        assert_eq!(back.status, 403);
    }
}
