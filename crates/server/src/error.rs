//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Domain and service errors
//! convert into `AppError` through `From`, which is where each failure is
//! classified. Server-side failures are captured to Sentry before the
//! response is built.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use ventas_core::cart::CartError;
use ventas_core::catalog::CatalogError;
use ventas_core::checkout::CheckoutError;
use ventas_core::invoice::InvoiceError;
use ventas_core::{EmailError, IdError, InvalidVariant, MoneyError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::{
    CartServiceError, CatalogServiceError, OrderError, ReceiptError, TokenError, UploadError,
};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed input, rejected before any store access.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, invalid or expired credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not allow this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate of something that must be unique.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Well-formed request refused by a business rule.
    #[error("Rule violation: {0}")]
    DomainRule(String),

    /// The server is misconfigured for this operation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    /// Stable machine-readable kind, sent as `error` in the response body.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::DomainRule(_) => "domain_rule",
            Self::Configuration(_) => "configuration",
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountDisabled => "unauthorized",
                AuthError::UserAlreadyExists(_) => "conflict",
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidField(_) => "validation",
                AuthError::Repository(_) | AuthError::PasswordHash => "internal",
            },
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DomainRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Configuration(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountDisabled => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidField(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::AccountDisabled => "Account is deactivated".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
                other => other.to_string(),
            },
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::DomainRule(msg)
            | Self::Configuration(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

// =============================================================================
// Classification
// =============================================================================

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("not found".to_string()),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Database(other),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity(_) => Self::Validation(err.to_string()),
            CartError::LineNotFound(_) => Self::NotFound(err.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidQuantity { .. } => Self::Validation(err.to_string()),
            CheckoutError::ProductNotFound(_) => Self::NotFound(err.to_string()),
            CheckoutError::EmptyOrder
            | CheckoutError::ProductUnavailable(_)
            | CheckoutError::InsufficientStock { .. } => Self::DomainRule(err.to_string()),
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        Self::DomainRule(err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::Validation(err.to_string())
    }
}

macro_rules! validation_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    Self::Validation(err.to_string())
                }
            }
        )+
    };
}

validation_from!(IdError, EmailError, InvalidVariant, MoneyError);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) => Self::Internal(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ReceiptError> for AppError {
    fn from(err: ReceiptError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => Self::Internal(err.to_string()),
            TokenError::Expired => Self::Unauthorized("token has expired".to_string()),
            TokenError::InvalidSignature | TokenError::Malformed(_) => {
                Self::Unauthorized("invalid token".to_string())
            }
        }
    }
}

impl From<CartServiceError> for AppError {
    fn from(err: CartServiceError) -> Self {
        match err {
            CartServiceError::NotFound(_) => Self::NotFound(err.to_string()),
            CartServiceError::AlreadyExists => Self::Conflict(err.to_string()),
            CartServiceError::Unavailable(_) => Self::DomainRule(err.to_string()),
            CartServiceError::Cart(inner) => inner.into(),
            CartServiceError::Repository(inner) => inner.into(),
        }
    }
}

impl From<CatalogServiceError> for AppError {
    fn from(err: CatalogServiceError) -> Self {
        match err {
            CatalogServiceError::NotFound(_) => Self::NotFound(err.to_string()),
            CatalogServiceError::Conflict(message) => Self::Conflict(message),
            CatalogServiceError::Invalid(inner) => inner.into(),
            CatalogServiceError::FallbackCategory => Self::DomainRule(err.to_string()),
            CatalogServiceError::FallbackUnavailable(_) => Self::Configuration(err.to_string()),
            CatalogServiceError::Repository(inner) => inner.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => Self::NotFound(err.to_string()),
            OrderError::Checkout(inner) => inner.into(),
            OrderError::Invoice(inner) => inner.into(),
            OrderError::Repository(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use ventas_core::ProductId;

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");
    }

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(status(AppError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(AppError::DomainRule("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(AppError::Configuration("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_are_classified() {
        let product_id = ProductId::new();
        assert_eq!(
            status(CheckoutError::InsufficientStock {
                product_id,
                name: "Mug".into(),
                requested: 5,
                available: 3,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(CheckoutError::EmptyOrder), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(CheckoutError::ProductNotFound(product_id)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(InvoiceError::AlreadyPaid), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(CartError::LineNotFound(product_id)), StatusCode::NOT_FOUND);
        assert_eq!(status(CartError::InvalidQuantity(0)), StatusCode::BAD_REQUEST);
        assert_eq!(status(CatalogError::MissingQuery), StatusCode::BAD_REQUEST);
        assert_eq!(status(CatalogError::StockTooLarge(u32::MAX)), StatusCode::BAD_REQUEST);
        assert_eq!(status(MoneyError::TooLarge), StatusCode::BAD_REQUEST);
        assert_eq!(status(CartServiceError::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status(CatalogServiceError::FallbackUnavailable("none".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(OrderError::NotFound("cart")), StatusCode::NOT_FOUND);
        assert_eq!(status(TokenError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthError::UserAlreadyExists("taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RepositoryError::Conflict("dup".into())),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response =
            AppError::Database(RepositoryError::DataCorruption("secret detail".into()))
                .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::Conflict("category name already exists".into()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["message"], "category name already exists");
    }
}
