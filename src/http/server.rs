//! Main router configuration assembling the authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use tower_http::trace::TraceLayer;

use super::context::AppState;
use super::handler_oauth1::{handle_oauth1_callback, handle_oauth1_login};
use super::handler_oauth2::{handle_oauth2_callback, handle_oauth2_login};
use super::handler_session::{handle_logout, handle_me, handle_refresh};

/// GET /healthz
async fn handle_healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.config.version,
    }))
}

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/oauth1/login", get(handle_oauth1_login))
        .route("/oauth1/callback", get(handle_oauth1_callback))
        .route("/oauth2/login", get(handle_oauth2_login))
        .route("/oauth2/callback", get(handle_oauth2_callback))
        .route("/me", get(handle_me))
        .route("/refresh", axum::routing::post(handle_refresh))
        .route("/logout", get(handle_logout).post(handle_logout));

    Router::new()
        .route("/healthz", get(handle_healthz))
        .nest("/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
