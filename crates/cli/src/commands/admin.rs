//! `ventas admin create`: bootstrap an administrator without going through
//! the API, which only lets an existing admin create another.

use sqlx::PgPool;

use ventas_core::UserRole;
use ventas_server::services::AuthService;
use ventas_server::services::auth::Registration;

use super::CliError;

/// Create an ADMIN account with the same validation as registration.
///
/// # Errors
///
/// Returns `CliError::Auth` for invalid fields or a taken username/email.
pub async fn create_user(
    pool: &PgPool,
    name: String,
    username: String,
    email: String,
    password: String,
) -> Result<(), CliError> {
    let user = AuthService::new(pool)
        .register(
            Registration {
                name,
                username,
                email,
                password,
                profile_picture: None,
            },
            UserRole::Admin,
        )
        .await?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        email = %user.email,
        "admin user created"
    );
    Ok(())
}
