use axum::{
    extract::{FromRef, FromRequestParts},
    http::header,
};

use crate::{
    config::AuthConfig, error::AppError, services::auth_service::decode_token, state::AppState,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
}

/// Optional identity. Missing, malformed, or expired tokens are absorbed here
/// and the request proceeds anonymous; routes that need an identity use
/// [`AuthUser`] instead.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if !user.role.eq_ignore_ascii_case(role) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "ADMIN")
}

fn user_from_bearer(parts: &axum::http::request::Parts, config: &AuthConfig) -> Option<AuthUser> {
    let auth_str = parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;

    let token = auth_str.strip_prefix("Bearer ")?.trim();

    match decode_token(config, token) {
        Ok(claims) => Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
        }),
        Err(err) => {
            tracing::debug!(error = %err, "discarding invalid bearer token");
            None
        }
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        Ok(MaybeUser(user_from_bearer(parts, &app.auth)))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state)
            .await
            .unwrap_or(MaybeUser(None));
        user.ok_or_else(|| AppError::Unauthorized("Missing or invalid credentials".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "tester".into(),
            role: role.into(),
        }
    }

    #[test]
    fn admin_guard_matches_case_insensitively() {
        assert!(ensure_admin(&user("ADMIN")).is_ok());
        assert!(ensure_admin(&user("admin")).is_ok());
        assert!(matches!(
            ensure_admin(&user("USER")),
            Err(AppError::Forbidden)
        ));
    }
}
