//! Request identity
//!
//! Playlist mutations require an admin. The provided implementation compares
//! a configured admin key against the `X-Admin-Key` header or an
//! `Authorization: Bearer` token. With no key configured nobody is admin.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Caller identity as far as this service cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentUser {
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self, headers: &HeaderMap) -> CurrentUser;
}

/// Shared-secret admin identity
pub struct AdminKeyIdentity {
    admin_key: Option<String>,
}

impl AdminKeyIdentity {
    pub fn new(admin_key: Option<String>) -> Self {
        Self {
            admin_key: admin_key.filter(|k| !k.is_empty()),
        }
    }

    fn presented_key(headers: &HeaderMap) -> Option<&str> {
        if let Some(key) = headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            return Some(key.trim());
        }

        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    }
}

impl IdentityProvider for AdminKeyIdentity {
    fn current_user(&self, headers: &HeaderMap) -> CurrentUser {
        let is_admin = match (&self.admin_key, Self::presented_key(headers)) {
            (Some(expected), Some(presented)) => {
                expected.as_bytes().ct_eq(presented.as_bytes()).into()
            }
            _ => false,
        };

        CurrentUser { is_admin }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.identity.current_user(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_admin_key_header_and_bearer() {
        let identity = AdminKeyIdentity::new(Some("s3cret".into()));

        assert!(identity.current_user(&headers("x-admin-key", "s3cret")).is_admin);
        assert!(identity.current_user(&headers("authorization", "Bearer s3cret")).is_admin);
        assert!(!identity.current_user(&headers("x-admin-key", "wrong")).is_admin);
        assert!(!identity.current_user(&headers("x-admin-key", "s3cre")).is_admin);
        assert!(!identity.current_user(&headers("x-admin-key", "s3cret!")).is_admin);
        assert!(!identity.current_user(&headers("authorization", "Basic s3cret")).is_admin);
        assert!(!identity.current_user(&HeaderMap::new()).is_admin);
    }

    #[test]
    fn test_no_key_configured_means_no_admin() {
        let identity = AdminKeyIdentity::new(None);
        assert!(!identity.current_user(&headers("x-admin-key", "")).is_admin);

        let empty = AdminKeyIdentity::new(Some(String::new()));
        assert!(!empty.current_user(&headers("x-admin-key", "")).is_admin);
    }

    #[test]
    fn test_require_admin() {
        assert!(CurrentUser { is_admin: true }.require_admin().is_ok());
        assert!(matches!(
            CurrentUser::default().require_admin(),
            Err(AppError::Forbidden(_))
        ));
    }
}
