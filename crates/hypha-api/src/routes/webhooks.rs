//! Chain indexer webhooks
//!
//! Each endpoint verifies the signature for its event kind before the body
//! is parsed, decodes the logs and hands every event to the dispatcher.

use crate::state::AppState;
use crate::webhook::{parse_logs, DispatchedEvent, WebhookError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hypha_chain::{GovernanceEvent, GovernanceEventKind};
use hypha_store::HybridRepository;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

fn accepted() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn verified_events(
    state: &AppState,
    kind: GovernanceEventKind,
    headers: &HeaderMap,
    body: &[u8],
    strict: bool,
) -> Result<Vec<GovernanceEvent>, WebhookError> {
    state.webhooks.verify(kind, headers, body)?;
    let logs = parse_logs(body)?;
    let events = kind.decode(&logs, strict).map_err(|e| {
        warn!("Rejecting {} webhook: {}", kind.name(), e);
        WebhookError::from(e)
    })?;
    debug!(
        "{} webhook: {} logs, {} events",
        kind.name(),
        logs.len(),
        events.len()
    );
    Ok(events)
}

async fn dispatch(state: &AppState, event: DispatchedEvent) -> Result<(), WebhookError> {
    state
        .dispatcher
        .dispatch(event)
        .await
        .map_err(|e| WebhookError::Dispatch(e.to_string()))
}

pub async fn proposal_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let events = verified_events(
        &state,
        GovernanceEventKind::ProposalCreated,
        &headers,
        &body,
        true,
    )?;
    let repo = HybridRepository::new(state.db.admin());
    for event in events {
        let mut dispatched = DispatchedEvent::from(event.clone());
        if let GovernanceEvent::ProposalCreated {
            space_id, creator, ..
        } = event
        {
            match i64::try_from(space_id) {
                Ok(id) => {
                    dispatched.space_slug = repo.space_by_web3_id(id).await?.map(|s| s.slug)
                }
                Err(_) => warn!(
                    "Proposal {} names out-of-range space id {}",
                    dispatched.event.proposal_id().unwrap_or_default(),
                    space_id
                ),
            }
            dispatched.creator_slug = repo
                .person_by_address(&creator.to_string())
                .await?
                .map(|p| p.slug);
        }
        dispatch(&state, dispatched).await?;
    }
    Ok(accepted())
}

pub async fn space_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let events = verified_events(
        &state,
        GovernanceEventKind::SpaceCreated,
        &headers,
        &body,
        false,
    )?;
    let repo = HybridRepository::new(state.db.admin());
    for event in events {
        let mut dispatched = DispatchedEvent::from(event.clone());
        if let GovernanceEvent::SpaceCreated {
            space_id, executor, ..
        } = event
        {
            let id = i64::try_from(space_id).map_err(|_| {
                WebhookError::InvalidPayload(format!("space id {} out of range", space_id))
            })?;
            let executor = executor.to_string();
            let attached = repo.attach_web3_space_id(&executor, id).await?;
            if attached == 0 {
                warn!("No pending space for executor {} (space {})", executor, id);
            } else {
                info!("Linked space {} to executor {}", id, executor);
            }
            dispatched.space_slug = repo.space_by_web3_id(id).await?.map(|s| s.slug);
        }
        dispatch(&state, dispatched).await?;
    }
    Ok(accepted())
}

pub async fn proposal_executed(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    outcome(state, GovernanceEventKind::ProposalExecuted, headers, body).await
}

pub async fn proposal_rejected(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    outcome(state, GovernanceEventKind::ProposalRejected, headers, body).await
}

async fn outcome(
    state: AppState,
    kind: GovernanceEventKind,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    for event in verified_events(&state, kind, &headers, &body, true)? {
        dispatch(&state, event.into()).await?;
    }
    Ok(accepted())
}
