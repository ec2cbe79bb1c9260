//! Server-sent proposal outcome streams

use crate::error::ApiError;
use crate::state::AppState;
use alloy::primitives::U256;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use hypha_chain::GovernanceEventKind;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalEventQuery {
    pub proposal_id: Option<String>,
}

pub async fn proposal_executed(
    State(state): State<AppState>,
    query: Result<Query<ProposalEventQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    stream(state, GovernanceEventKind::ProposalExecuted, query).await
}

pub async fn proposal_rejected(
    State(state): State<AppState>,
    query: Result<Query<ProposalEventQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    stream(state, GovernanceEventKind::ProposalRejected, query).await
}

/// One `data:` frame per decoded event until the client disconnects.
///
/// The subscription lives inside the response body, so a disconnect drops it
/// and releases the listener.
async fn stream(
    state: AppState,
    kind: GovernanceEventKind,
    query: ProposalEventQuery,
) -> Result<impl IntoResponse, ApiError> {
    let raw = query
        .proposal_id
        .ok_or_else(|| ApiError::validation("proposalId", "is required"))?;
    let proposal_id = U256::from_str(raw.trim())
        .map_err(|_| ApiError::validation("proposalId", "must be an unsigned integer"))?;

    let subscription = state.watcher.subscribe(kind, proposal_id).await?;
    let frames = subscription.map(|event| Event::default().json_data(&event));
    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}
