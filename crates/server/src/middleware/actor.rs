//! Actor extractors.
//!
//! The API sits behind an authenticating gateway which forwards the caller's
//! identity in headers:
//!
//! - `x-user-id` - signed-in customer (absent for guests)
//! - `x-admin-id` / `x-admin-role` - back-office staff
//!
//! Handlers declare what they need by taking [`CurrentUser`] or
//! [`RequireAdmin`] as an argument.

use axum::{extract::FromRequestParts, http::request::Parts};
use local_market_core::order::Actor;
use local_market_core::{AdminRole, UserId};

use crate::error::AppError;

/// Header carrying the signed-in customer id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the admin id.
pub const ADMIN_ID_HEADER: &str = "x-admin-id";
/// Header carrying the admin role.
pub const ADMIN_ROLE_HEADER: &str = "x-admin-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The signed-in customer, or `None` for a guest.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Option<UserId>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = header(parts, USER_ID_HEADER) else {
            return Ok(Self(None));
        };
        let id = raw
            .parse::<i32>()
            .map_err(|_| AppError::Unauthorized("invalid user id".to_string()))?;
        Ok(Self(Some(UserId::new(id))))
    }
}

/// An authenticated admin.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub id: String,
    pub role: AdminRole,
}

impl AdminActor {
    /// Audit and status-log identity of this admin.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::admin(self.id.clone())
    }

    /// Require the manager role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for staff.
    pub fn require_manager(&self) -> Result<(), AppError> {
        match self.role {
            AdminRole::Manager => Ok(()),
            AdminRole::Staff => Err(AppError::Forbidden("manager role required".to_string())),
        }
    }
}

/// Extractor that requires an admin.
///
/// A missing role header means [`AdminRole::Staff`].
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.id)
/// }
/// ```
#[derive(Debug)]
pub struct RequireAdmin(pub AdminActor);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ADMIN_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("admin authentication required".to_string()))?
            .to_string();
        let role = match header(parts, ADMIN_ROLE_HEADER) {
            Some(raw) => raw
                .to_ascii_uppercase()
                .parse::<AdminRole>()
                .map_err(|_| AppError::Unauthorized("unknown admin role".to_string()))?,
            None => AdminRole::Staff,
        };

        tracing::Span::current().record("admin_id", id.as_str());

        Ok(Self(AdminActor { id, role }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_guest_has_no_user() {
        let mut p = parts(&[]);
        let CurrentUser(user) = CurrentUser::from_request_parts(&mut p, &()).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_user_id_parsed() {
        let mut p = parts(&[(USER_ID_HEADER, "42")]);
        let CurrentUser(user) = CurrentUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(user, Some(UserId::new(42)));
    }

    #[tokio::test]
    async fn test_bad_user_id_rejected() {
        let mut p = parts(&[(USER_ID_HEADER, "abc")]);
        let err = CurrentUser::from_request_parts(&mut p, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_admin_required() {
        let mut p = parts(&[]);
        let err = RequireAdmin::from_request_parts(&mut p, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_admin_role_defaults_to_staff() {
        let mut p = parts(&[(ADMIN_ID_HEADER, "kim")]);
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(admin.id, "kim");
        assert_eq!(admin.role, AdminRole::Staff);
        assert!(admin.require_manager().is_err());
    }

    #[tokio::test]
    async fn test_manager_role() {
        let mut p = parts(&[(ADMIN_ID_HEADER, "lee"), (ADMIN_ROLE_HEADER, "manager")]);
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(admin.role, AdminRole::Manager);
        assert!(admin.require_manager().is_ok());
        assert_eq!(admin.actor(), Actor::admin("lee"));
    }
}
