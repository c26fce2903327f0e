//! Router assembly.

use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::rate_limit;
use crate::routes;
use crate::state::AppState;

/// The full `/api` surface with rate limiting, CORS for the portal
/// origin and request tracing.
pub fn build_router(state: AppState, portal_origin: &str) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health))
        .merge(routes::auth::router())
        .merge(routes::leads::router())
        .merge(routes::billing::router())
        .merge(routes::admin::router());

    Router::new()
        .nest("/api", api)
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(cors(portal_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS needs an explicit origin; without a parseable one
/// cross-origin requests are simply refused.
fn cors(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(origin.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin, error = %e, "Invalid portal origin; CORS disabled");
            layer
        }
    }
}
