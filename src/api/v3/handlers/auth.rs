/*
 * Responsibility
 * - /api/v3/auth handlers: token pair, ticket, refresh, verify, revoke
 * - Map provider outcomes to problem documents
 */
use std::collections::BTreeSet;

use axum::http::StatusCode;
use tracing::{debug, error, info};

use crate::api::v3::dto::auth::{ScopesRequest, TokenVerificationResponse};
use crate::http::context::HttpContext;
use crate::http::handler::HandlerResult;
use crate::http::problem::{HandleError, ProblemDetail};
use crate::http::response::HttpResponse;
use crate::services::auth::jwt::provider::{JwtAuthProvider, RefreshOutcome};
use crate::services::auth::result::{AuthTokenError, AuthTokenGenerationResult};
use crate::services::auth::user::AuthenticatedUser;
use crate::state::AppState;

pub fn invalid_scope_problem() -> ProblemDetail {
    ProblemDetail::new(
        StatusCode::FORBIDDEN,
        "auth-refresh-invalid-scope",
        "Auth Refresh Invalid Scope",
    )
    .detail("The scoped refresh token contains a scope that is not valid anymore.")
}

fn ticket_invalid_scopes_problem() -> ProblemDetail {
    ProblemDetail::new(
        StatusCode::FORBIDDEN,
        "ticket-creation-invalid-scopes",
        "Ticket Creation Requested Invalid Scopes",
    )
    .detail("Requested scopes for the ticket that the user is not allowed to use.")
}

fn access_token_used_problem() -> ProblemDetail {
    ProblemDetail::new(StatusCode::BAD_REQUEST, "access-token-used", "Access Token Used")
        .detail("This route can only be called with an refresh token, not with an access token")
}

fn invalid_refresh_token_problem() -> ProblemDetail {
    ProblemDetail::new(StatusCode::UNAUTHORIZED, "invalid-refresh-token", "Invalid Refresh Token")
        .detail("The provided refresh token is invalid")
}

fn invalid_token_problem() -> ProblemDetail {
    ProblemDetail::new(StatusCode::UNAUTHORIZED, "invalid-token", "Invalid Token")
        .detail("The provided authentication token is invalid")
}

fn unknown_token_problem() -> ProblemDetail {
    ProblemDetail::new(StatusCode::UNAUTHORIZED, "unknown-token", "Unknown Token")
        .detail("The provided authentication token is unknown")
}

fn invalid_body_problem(detail: String) -> ProblemDetail {
    ProblemDetail::new(StatusCode::BAD_REQUEST, "invalid-request-body", "Invalid Request Body").detail(detail)
}

fn requested_scopes(ctx: &HttpContext) -> Result<BTreeSet<String>, HandleError> {
    let request = ScopesRequest::from_body(&ctx.request.body).map_err(|e| {
        debug!(error = %e, "malformed scopes body");
        HandleError::from(invalid_body_problem(format!("Malformed JSON body: {}", e)))
    })?;

    request
        .normalized()
        .map_err(|scope| invalid_body_problem(format!("Malformed scope '{}'", scope)).into())
}

fn authenticated_user(ctx: &HttpContext) -> Result<AuthenticatedUser, HandleError> {
    // routes using this are registered with an authentication interceptor
    ctx.user().cloned().ok_or_else(|| {
        error!(path = %ctx.request.path, "handler reached without an authenticated user");
        HandleError::internal()
    })
}

fn token_failure(err: AuthTokenError) -> HandleError {
    error!(error = %err, "token generation failed");
    HandleError::internal()
}

/// `POST /api/v3/auth`: a JWT pair for a user authenticated with basic auth.
pub fn create_token_pair(state: &AppState, ctx: &mut HttpContext) -> HandlerResult {
    let user = authenticated_user(ctx)?;
    let scopes = requested_scopes(ctx)?;

    match state
        .jwt
        .issue_token_pair(state.users().as_ref(), &user, &scopes, None)
        .map_err(token_failure)?
    {
        AuthTokenGenerationResult::Success(pair) => {
            info!(user_id = %user.id(), "issued token pair");
            Ok(HttpResponse::json(StatusCode::OK, &pair.to_body()))
        }
        AuthTokenGenerationResult::RequestedInvalidScopes => Err(invalid_scope_problem().into()),
    }
}

/// `POST /api/v3/auth/ticket`
pub fn create_ticket(state: &AppState, ctx: &mut HttpContext) -> HandlerResult {
    let user = authenticated_user(ctx)?;
    let scopes = requested_scopes(ctx)?;

    match state.ticket.issue_ticket(&user, &scopes) {
        AuthTokenGenerationResult::Success(ticket) => Ok(HttpResponse::json(StatusCode::OK, &ticket.to_body())),
        AuthTokenGenerationResult::RequestedInvalidScopes => Err(ticket_invalid_scopes_problem().into()),
    }
}

/// `POST /api/v3/auth/refresh`, called with the refresh token as bearer.
pub fn refresh_token_pair(state: &AppState, ctx: &mut HttpContext) -> HandlerResult {
    match state
        .jwt
        .refresh(ctx, state.users().as_ref())
        .map_err(token_failure)?
    {
        RefreshOutcome::Issued(pair) => Ok(HttpResponse::json(StatusCode::OK, &pair.to_body())),
        RefreshOutcome::InvalidScopes => Err(invalid_scope_problem().into()),
        RefreshOutcome::AccessTokenUsed => Err(access_token_used_problem().into()),
        RefreshOutcome::InvalidToken => Err(invalid_refresh_token_problem().into()),
    }
}

/// `POST /api/v3/auth/verify`: type and expiry of the presented token.
pub fn verify_token(state: &AppState, ctx: &mut HttpContext) -> HandlerResult {
    let presented = state
        .jwt
        .inspect(ctx, state.users().as_ref())
        .ok_or_else(|| HandleError::from(invalid_token_problem()))?;

    let expires_at = JwtAuthProvider::token_expiry(&presented.user, &presented.token_id, presented.token_type)
        .ok_or_else(|| HandleError::from(unknown_token_problem()))?;

    Ok(HttpResponse::json(
        StatusCode::OK,
        &TokenVerificationResponse {
            token_type: presented.token_type.as_str(),
            expires_at: expires_at.timestamp_millis(),
        },
    ))
}

/// `POST /api/v3/auth/revoke`: kills both tokens of the presented pair.
pub fn revoke_token(state: &AppState, ctx: &mut HttpContext) -> HandlerResult {
    let presented = state
        .jwt
        .inspect(ctx, state.users().as_ref())
        .ok_or_else(|| HandleError::from(invalid_token_problem()))?;

    state
        .jwt
        .revoke(state.users().as_ref(), presented.user.id(), &presented.token_id);
    Ok(HttpResponse::no_content())
}
