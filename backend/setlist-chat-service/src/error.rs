use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use error_types::{error_codes, error_types as kinds, ErrorResponse};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Which side of a block relationship stopped the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDirection {
    /// The caller blocked the other user
    Outgoing,
    /// The other user blocked the caller
    Incoming,
}

impl BlockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockDirection::Outgoing => "outgoing",
            BlockDirection::Incoming => "incoming",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{message}")]
    Forbidden { code: &'static str, message: String },

    #[error("{message}")]
    Blocked {
        direction: BlockDirection,
        message: String,
    },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("internal server error")]
    Internal,
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database operation failed");
        AppError::Database(e.to_string())
    }
}

impl AppError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Forbidden {
            code,
            message: message.into(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => error_codes::INVALID_REQUEST,
            AppError::Unauthorized => error_codes::TOKEN_INVALID,
            AppError::Forbidden { code, .. } | AppError::NotFound { code, .. } => *code,
            AppError::Blocked { .. } => error_codes::USER_BLOCKED,
            AppError::Database(_) => error_codes::DATABASE_ERROR,
            _ => error_codes::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => kinds::VALIDATION_ERROR,
            AppError::Unauthorized => kinds::AUTHENTICATION_ERROR,
            AppError::Forbidden { .. } | AppError::Blocked { .. } => kinds::AUTHORIZATION_ERROR,
            AppError::NotFound { .. } => kinds::NOT_FOUND_ERROR,
            _ => kinds::SERVER_ERROR,
        }
    }

    /// Message shown to clients; internal details stay in the logs.
    pub(crate) fn public_message(&self) -> String {
        match self {
            AppError::Database(_)
            | AppError::Internal
            | AppError::Config(_)
            | AppError::StartServer(_) => "Server error".to_string(),
            AppError::Unauthorized => "User not authenticated".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } | AppError::Blocked { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = ErrorResponse::new(
            &self.public_message(),
            status.as_u16(),
            self.kind(),
            self.code(),
        );
        if let AppError::Blocked { direction, .. } = self {
            body = body.with_field("direction", direction.as_str());
        }

        HttpResponse::build(status).json(body)
    }
}
