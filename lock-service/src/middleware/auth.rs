use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::{models::Identity, AppState};

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Require a valid bearer token, from the `Authorization` header or a
/// `token` query parameter, and attach the caller's [`Identity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(q)| q.token)
        });

    let Some(token) = token else {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing or invalid Authorization header"
        )));
    };

    let identity = state.authenticator.authenticate(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extractor for the identity attached by [`auth_middleware`].
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
        })?;

        Ok(AuthUser(identity.clone()))
    }
}
