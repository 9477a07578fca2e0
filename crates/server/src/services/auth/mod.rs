//! Account registration, login and password handling.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::instrument;

use ventas_core::{Email, UserRole};

use crate::db::users::UserRepository;
use crate::models::user::{NewUser, User, UserChanges};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum display-name length.
const MIN_NAME_LENGTH: usize = 3;

const MAX_FIELD_LENGTH: usize = 120;

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Stored upload name of an avatar sent with the registration.
    pub profile_picture: Option<String>,
}

/// Profile fields a user may change. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Create an account with the given role.
    ///
    /// Self-registration always passes [`UserRole::Client`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidField`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for bad input, and
    /// `AuthError::UserAlreadyExists` if the username or email is taken.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(
        &self,
        registration: Registration,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let name = validate_name(&registration.name)?;
        let username = validate_username(&registration.username)?;
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let password_hash = hash_password(&registration.password)?;

        let user = self
            .users
            .create(&NewUser {
                name,
                username,
                email,
                password_hash,
                profile_picture: registration.profile_picture,
                role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "account created");
        Ok(user)
    }

    /// Check a login (email or username) and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the login or password is
    /// wrong, and `AuthError::AccountDisabled` for a deactivated account.
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_login(login.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user)
    }
}

/// Validate a profile update and hash any new password.
///
/// # Errors
///
/// Returns the same validation errors as registration.
pub fn profile_changes(update: ProfileUpdate) -> Result<UserChanges, AuthError> {
    let password_hash = match update.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };

    Ok(UserChanges {
        name: update.name.as_deref().map(validate_name).transpose()?,
        username: update.username.as_deref().map(validate_username).transpose()?,
        email: update.email.as_deref().map(Email::parse).transpose()?,
        password_hash,
    })
}

/// Validate password strength.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or an unreadable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    let length = name.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(AuthError::InvalidField(format!(
            "name must be at least {MIN_NAME_LENGTH} characters"
        )));
    }
    if length > MAX_FIELD_LENGTH {
        return Err(AuthError::InvalidField(format!(
            "name must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidField("username is required".to_owned()));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidField(
            "username must not contain whitespace".to_owned(),
        ));
    }
    if username.chars().count() > MAX_FIELD_LENGTH {
        return Err(AuthError::InvalidField(format!(
            "username must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(username.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_unreadable_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_profile_changes() {
        let changes = profile_changes(ProfileUpdate {
            name: Some("  Ada Lovelace ".to_string()),
            email: Some("ADA@Example.com".to_string()),
            ..ProfileUpdate::default()
        })
        .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(changes.email.unwrap().as_str(), "ada@example.com");
        assert!(changes.password_hash.is_none());

        assert!(profile_changes(ProfileUpdate::default()).unwrap().is_empty());
    }

    #[test]
    fn test_profile_changes_rejects_bad_fields() {
        let short_name = ProfileUpdate {
            name: Some("Al".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            profile_changes(short_name),
            Err(AuthError::InvalidField(_))
        ));

        let spaced = ProfileUpdate {
            username: Some("two words".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            profile_changes(spaced),
            Err(AuthError::InvalidField(_))
        ));

        let weak = ProfileUpdate {
            password: Some("short".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            profile_changes(weak),
            Err(AuthError::WeakPassword(_))
        ));
    }
}
