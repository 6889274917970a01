//! Bearer-token extractors.
//!
//! ```rust,ignore
//! async fn create_bundle(
//!     RequireAdmin(admin): RequireAdmin,
//!     State(state): State<AppState>,
//! ) -> Result<impl IntoResponse> { ... }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use stockroom_core::{Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::Claims;
use crate::services::orders::Caller;
use crate::state::AppState;

/// The authenticated caller, taken from verified access token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    #[must_use]
    pub const fn caller(&self) -> Caller {
        Caller {
            user_id: self.id,
            is_admin: self.role.is_admin(),
        }
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Extractor that requires a valid access token.
///
/// Rejects with 401 when the `Authorization: Bearer` header is missing or
/// the token does not verify.
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_owned()))?;

        let claims = state
            .tokens()
            .verify_access(token)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        let user = CurrentUser::from(claims);
        set_sentry_user(&user.id, Some(&user.email));
        Ok(Self(user))
    }
}

/// Extractor that requires a valid access token with the admin role.
///
/// Rejects with 401 like [`RequireAuth`], then 403 for non-admins.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::Forbidden(
                "Administrator role required".to_owned(),
            ));
        }
        Ok(Self(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/orders");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def.ghi"))), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&parts(Some("bearer xyz"))), Some("xyz"));
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwdw=="))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
