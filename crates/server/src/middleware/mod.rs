//! HTTP middleware.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID
//! 4. Route guards ([`auth::require_role`]) on protected route groups

pub mod auth;
pub mod request_id;

pub use auth::{Guard, require_role};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
