//! `/api/admin/*`: lead assignment and invoicing, user and package
//! management. Every handler checks the admin role through its service
//! call.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use leadport_billing::NewPackage;
use leadport_core::models::invoice::{InvoiceFilter, InvoiceStatus};
use leadport_core::models::lead::{LeadFilter, LeadStatus, UpdateLead};
use leadport_core::models::package::UpdatePackage;
use leadport_core::models::user::{Role, UpdateUser};
use leadport_core::repository::Pagination;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, JsonBody, PathParam, QueryParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/leads", get(list_leads))
        .route("/admin/leads/{id}", patch(update_lead).delete(delete_lead))
        .route("/admin/leads/{id}/assign", post(assign_lead))
        .route("/admin/leads/{id}/invoice", post(invoice_lead))
        .route("/admin/invoices", get(list_invoices))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", patch(update_user))
        .route("/admin/packages", get(list_packages).post(create_package))
        .route("/admin/packages/{id}", patch(update_package))
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct AdminLeadQuery {
    status: Option<LeadStatus>,
    agent_id: Option<Uuid>,
    assigned_user_id: Option<Uuid>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn list_leads(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    QueryParams(query): QueryParams<AdminLeadQuery>,
) -> ApiResult<Response> {
    actor.require_admin()?;
    let filter = LeadFilter {
        status: query.status,
        agent_id: query.agent_id,
        assigned_user_id: query.assigned_user_id,
    };
    let page = state
        .leads
        .list(&actor, filter, Pagination::new(query.offset, query.limit))
        .await?;
    Ok(Json(page).into_response())
}

async fn update_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<UpdateLead>,
) -> ApiResult<Response> {
    actor.require_admin()?;
    Ok(Json(state.leads.update_details(&actor, id, patch).await?).into_response())
}

async fn delete_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Response> {
    state.leads.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
struct AssignBody {
    user_id: Uuid,
}

async fn assign_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<AssignBody>,
) -> ApiResult<Response> {
    Ok(Json(state.leads.assign(&actor, id, body.user_id).await?).into_response())
}

#[derive(Debug, Deserialize)]
struct InvoiceBody {
    amount_cents: i64,
}

async fn invoice_lead(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<InvoiceBody>,
) -> ApiResult<Response> {
    let invoice = state
        .leads
        .create_invoice(&actor, id, body.amount_cents)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct AdminInvoiceQuery {
    status: Option<InvoiceStatus>,
    user_id: Option<Uuid>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn list_invoices(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    QueryParams(query): QueryParams<AdminInvoiceQuery>,
) -> ApiResult<Response> {
    actor.require_admin()?;
    let filter = InvoiceFilter {
        user_id: query.user_id,
        status: query.status,
    };
    let page = state
        .leads
        .list_invoices(&actor, filter, Pagination::new(query.offset, query.limit))
        .await?;
    Ok(Json(page).into_response())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct UserQuery {
    role: Option<Role>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    QueryParams(query): QueryParams<UserQuery>,
) -> ApiResult<Response> {
    let page = state
        .auth
        .list_users(&actor, query.role, Pagination::new(query.offset, query.limit))
        .await?;
    Ok(Json(page).into_response())
}

async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<UpdateUser>,
) -> ApiResult<Response> {
    Ok(Json(state.auth.update_user(&actor, id, body).await?).into_response())
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

/// All packages, including inactive ones.
async fn list_packages(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Response> {
    actor.require_admin()?;
    let packages = state.billing.list_packages(actor.tenant_id, false).await?;
    Ok(Json(packages).into_response())
}

async fn create_package(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(body): JsonBody<NewPackage>,
) -> ApiResult<Response> {
    let package = state.billing.create_package(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(package)).into_response())
}

async fn update_package(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<UpdatePackage>,
) -> ApiResult<Response> {
    Ok(Json(state.billing.update_package(&actor, id, body).await?).into_response())
}
