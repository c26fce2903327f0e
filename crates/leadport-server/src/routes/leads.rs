//! Lead routes for agents and users: `/api/leads*` and `/api/invoices`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use leadport_core::models::invoice::{InvoiceFilter, InvoiceStatus};
use leadport_core::models::lead::{LeadFilter, LeadStatus};
use leadport_core::repository::Pagination;
use leadport_leads::SubmitLead;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, JsonBody, PathParam, QueryParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(list).post(submit))
        .route("/leads/{id}", get(show))
        .route("/leads/{id}/accept", post(accept))
        .route("/leads/{id}/decline", post(decline))
        .route("/invoices", get(my_invoices))
}

#[derive(Debug, Default, Deserialize)]
struct LeadQuery {
    status: Option<LeadStatus>,
    offset: Option<u64>,
    limit: Option<u64>,
}

/// Visible leads; the service narrows the filter by role.
async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    QueryParams(query): QueryParams<LeadQuery>,
) -> ApiResult<Response> {
    let filter = LeadFilter {
        status: query.status,
        ..Default::default()
    };
    let page = state
        .leads
        .list(&actor, filter, Pagination::new(query.offset, query.limit))
        .await?;
    Ok(Json(page).into_response())
}

async fn submit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(body): JsonBody<SubmitLead>,
) -> ApiResult<Response> {
    let lead = state.leads.submit(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(lead)).into_response())
}

async fn show(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Response> {
    Ok(Json(state.leads.get(&actor, id).await?).into_response())
}

async fn accept(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Response> {
    Ok(Json(state.leads.accept(&actor, id).await?).into_response())
}

async fn decline(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Response> {
    Ok(Json(state.leads.decline(&actor, id).await?).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct InvoiceQuery {
    status: Option<InvoiceStatus>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn my_invoices(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    QueryParams(query): QueryParams<InvoiceQuery>,
) -> ApiResult<Response> {
    let filter = InvoiceFilter {
        status: query.status,
        user_id: Some(actor.user_id),
    };
    let page = state
        .leads
        .list_invoices(&actor, filter, Pagination::new(query.offset, query.limit))
        .await?;
    Ok(Json(page).into_response())
}
