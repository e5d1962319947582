//! Middleware for JWT token validation and policy enforcement

use std::convert::Infallible;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, MatchedPath, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    error::{AppError, AppResult},
    policy::Subject,
    state::AppState,
};

/// Validate the bearer token, then authorize `(role, route, method)`
///
/// The request passes when the caller's role or the base role is granted the
/// matched route pattern. Validated claims are added to the request
/// extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::Token)?;
    let claims = state.jwt_service.validate_access(bearer.token())?;

    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().as_str().to_string();

    let mut allowed = false;
    for subject in [Subject::Role(claims.rid), Subject::BASE_ROLE] {
        let subject = subject.encode();
        allowed = state
            .enforcer
            .enforce(&subject, &path, &method)
            .await
            .map_err(|e| {
                error!(%subject, %path, %method, "Failed to enforce policy: {}", e);
                AppError::Internal(e.into())
            })?;
        if allowed {
            break;
        }
    }

    if !allowed {
        warn!(role_id = claims.rid, %path, %method, "Access denied");
        return Err(AppError::Forbidden);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Cancellation token of one request, a child of the shutdown token
#[derive(Debug, Clone)]
pub struct RequestToken(pub CancellationToken);

#[async_trait]
impl FromRequestParts<AppState> for RequestToken {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestToken(state.shutdown.child_token()))
    }
}
