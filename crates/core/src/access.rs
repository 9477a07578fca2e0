//! Role-based access policy.
//!
//! Every guarded route declares the roles it accepts and the request pipeline
//! asks [`is_permitted`] once per request. No handler inspects roles itself.

use crate::types::UserRole;

/// Roles accepted by admin-only routes.
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

/// Roles accepted by routes open to any signed-in user.
pub const ANY_ROLE: &[UserRole] = UserRole::ALL;

/// Whether a caller holding `role` may use a route that accepts `required`.
///
/// An empty `required` list admits nobody.
#[must_use]
pub fn is_permitted(role: UserRole, required: &[UserRole]) -> bool {
    required.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only() {
        assert!(is_permitted(UserRole::Admin, ADMIN_ONLY));
        assert!(!is_permitted(UserRole::Client, ADMIN_ONLY));
    }

    #[test]
    fn test_any_role() {
        assert!(is_permitted(UserRole::Admin, ANY_ROLE));
        assert!(is_permitted(UserRole::Client, ANY_ROLE));
    }

    #[test]
    fn test_empty_requirement_denies() {
        assert!(!is_permitted(UserRole::Admin, &[]));
    }
}
