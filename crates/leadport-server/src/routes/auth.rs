//! `/api/auth/*`: registration, login, logout and the current user.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use leadport_auth::{LoginInput, RegisterInput};
use leadport_core::models::user::Role;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, JsonBody, clear_session_cookie, session_cookie};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    tenant: String,
    email: String,
    name: String,
    password: String,
    #[serde(default)]
    role: Option<Role>,
}

async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> ApiResult<Response> {
    let user = state
        .auth
        .register(RegisterInput {
            tenant_slug: body.tenant,
            email: body.email,
            name: body.name,
            password: body.password,
            role: body.role.unwrap_or(Role::User),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))).into_response())
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    tenant: String,
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<LoginBody>,
) -> ApiResult<Response> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let output = state
        .auth
        .login(LoginInput {
            tenant_slug: body.tenant,
            email: body.email,
            password: body.password,
            ip_address,
            user_agent,
        })
        .await?;

    let mut response = Json(json!({
        "user": output.user,
        "token": output.session_token,
        "expires_at": output.expires_at,
    }))
    .into_response();
    if let Some(cookie) = session_cookie(&output.session_token, &state.cookie) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

async fn logout(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> ApiResult<Response> {
    state.auth.logout(&actor).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Some(cookie) = clear_session_cookie(&state.cookie) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

async fn me(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> ApiResult<Response> {
    let subscription = if actor.role == Role::User {
        state
            .billing
            .current_subscription(actor.tenant_id, actor.user_id)
            .await?
    } else {
        None
    };
    Ok(Json(json!({ "user": actor, "subscription": subscription })).into_response())
}
