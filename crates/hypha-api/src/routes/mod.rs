//! HTTP routes

pub mod documents;
pub mod events;
pub mod health;
pub mod spaces;
pub mod tokens;
pub mod views;
pub mod webhooks;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/spaces/{slug}", get(spaces::summary))
        .route("/api/v1/spaces/{slug}/subscription", get(spaces::subscription))
        .route(
            "/api/v1/spaces/{slug}/subscription/stream",
            get(spaces::subscription_stream),
        )
        .route("/api/v1/spaces/{slug}/invite-info", get(spaces::invite_info))
        .route("/api/v1/spaces/{slug}/delegate", get(spaces::delegate))
        .route("/api/v1/spaces/{slug}/proposals", get(spaces::proposals))
        .route("/api/v1/spaces/{slug}/members", get(spaces::members))
        .route("/api/v1/spaces/{slug}/organisation", get(spaces::organisation))
        .route(
            "/api/v1/spaces/{slug}/assets-without-balances",
            get(spaces::assets_without_balances),
        )
        .route("/api/v1/documents/{slug}/voters", get(documents::voters))
        .route("/api/v1/tokens/{token}/supply", get(tokens::supply))
        .route(
            "/api/v1/proposal-events/proposal-executed",
            get(events::proposal_executed),
        )
        .route(
            "/api/v1/proposal-events/proposal-rejected",
            get(events::proposal_rejected),
        )
        .route("/api/webhooks/proposal/created", post(webhooks::proposal_created))
        .route("/api/webhooks/space/created", post(webhooks::space_created))
        .route("/api/webhooks/proposal/executed", post(webhooks::proposal_executed))
        .route("/api/webhooks/proposal/rejected", post(webhooks::proposal_rejected))
        .with_state(state)
}

/// Current unix time in milliseconds
pub(crate) fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
