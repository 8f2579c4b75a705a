//! # Actix Middleware Library
//!
//! Shared middleware components for Set Track'r actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer token authentication against the identity provider's keys
//! - `request_id`: `X-Request-ID` generation and propagation
//! - `logging`: structured request/response logging

pub mod jwt_auth;
pub mod logging;
pub mod request_id;

pub use jwt_auth::{bearer_token, AuthSubject, Claims, JwtAuthMiddleware, JwtVerifier};
pub use logging::Logging;
pub use request_id::{RequestId, RequestIdValue};
