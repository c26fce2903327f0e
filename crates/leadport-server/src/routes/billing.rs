//! Packages, subscriptions, checkout and the Stripe webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use leadport_core::error::LeadportError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/packages", get(packages))
        .route("/subscription", get(subscription).delete(cancel))
        .route("/stripe/checkout", post(checkout))
        .route("/stripe/webhook", post(webhook))
}

async fn packages(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> ApiResult<Response> {
    let packages = state.billing.list_packages(actor.tenant_id, true).await?;
    Ok(Json(packages).into_response())
}

async fn subscription(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Response> {
    actor.require_user()?;
    let current = state
        .billing
        .current_subscription(actor.tenant_id, actor.user_id)
        .await?;
    let history = state
        .billing
        .purchase_history(actor.tenant_id, actor.user_id)
        .await?;
    Ok(Json(json!({ "subscription": current, "history": history })).into_response())
}

async fn cancel(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> ApiResult<Response> {
    let cancelled = state.billing.cancel_subscription(&actor).await?;
    Ok(Json(cancelled).into_response())
}

#[derive(Debug, Deserialize)]
struct CheckoutBody {
    #[serde(default)]
    invoice_id: Option<Uuid>,
    #[serde(default)]
    package_id: Option<Uuid>,
}

/// Starts a hosted checkout for exactly one of an invoice or a package.
async fn checkout(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(body): JsonBody<CheckoutBody>,
) -> ApiResult<Response> {
    let session = match (body.invoice_id, body.package_id) {
        (Some(invoice_id), None) => {
            state
                .billing
                .start_invoice_checkout(&actor, invoice_id)
                .await?
        }
        (None, Some(package_id)) => {
            state
                .billing
                .start_package_checkout(&actor, package_id)
                .await?
        }
        _ => {
            return Err(LeadportError::validation(
                "provide exactly one of invoice_id or package_id",
            )
            .into());
        }
    };
    Ok(Json(session).into_response())
}

/// Raw body and signature header go straight to verification; no
/// session is involved.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Response> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let outcome = state.billing.handle_webhook(&body, signature).await?;
    Ok(Json(outcome).into_response())
}
