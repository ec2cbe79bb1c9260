//! Space views combining relational rows with on-chain state

use super::now_ms;
use super::views::{PersonView, SpaceView};
use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::state::AppState;
use alloy::primitives::{Address, U256};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use hypha_chain::conversions::{InviteInfo, ProposalCore};
use hypha_chain::subscription::{countdown_label, resolve};
use hypha_chain::{
    derive_metrics, derive_status, DerivedProposalMetrics, OnChainId, Poller, ProposalStatus,
    SubscriptionState, SubscriptionStatus,
};
use hypha_store::entity::{documents, spaces};
use hypha_store::{AuthInfo, HybridRepository, OffsetPage, OffsetRequest, PageRequest, Paginated};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

async fn load_space(
    state: &AppState,
    auth: &AuthInfo,
    slug: &str,
) -> Result<spaces::Model, ApiError> {
    let scoped = state.db.scoped(auth).await?;
    let space = HybridRepository::new(scoped.conn()).space_by_slug(slug).await?;
    scoped.finish().await?;
    Ok(space)
}

#[derive(Debug, Serialize)]
pub struct SpaceSummaryView {
    pub slug: String,
    pub web3_space_id: Option<i64>,
    pub pending: bool,
    pub members_count: usize,
    pub proposals_count: usize,
}

pub async fn summary(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<Json<SpaceSummaryView>, ApiError> {
    let space = load_space(&state, &auth, &slug).await?;
    let (pending, members_count, proposals_count) =
        match OnChainId::from_column(space.web3_space_id).active() {
            Some(space_id) => {
                let summary = state.spaces.summary(space_id).await?;
                (false, summary.members_count, summary.proposals_count)
            }
            None => (true, 0, 0),
        };

    Ok(Json(SpaceSummaryView {
        slug: space.slug,
        web3_space_id: space.web3_space_id,
        pending,
        members_count,
        proposals_count,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<String>,
}

impl From<SubscriptionStatus> for SubscriptionView {
    fn from(status: SubscriptionStatus) -> Self {
        let countdown = (status.status != SubscriptionState::Unknown)
            .then(|| countdown_label(status.days_left));
        Self { status, countdown }
    }
}

pub async fn subscription(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let space = load_space(&state, &auth, &slug).await?;
    let now = now_ms();
    let status = match OnChainId::from_column(space.web3_space_id).active() {
        Some(space_id) => state.spaces.fetch_subscription(space_id, now).await?,
        None => resolve(0, false, now),
    };
    Ok(Json(status.into()))
}

/// Subscription status re-read every poll interval, one frame per refresh.
///
/// The poller lives inside the response body and stops with it.
pub async fn subscription_stream(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let space = load_space(&state, &auth, &slug).await?;
    let space_id = OnChainId::from_column(space.web3_space_id)
        .active()
        .ok_or_else(|| ApiError::validation("slug", "space is not active on chain"))?;

    let spaces = state.spaces.clone();
    let poller = Poller::spawn(state.poll_interval, move || {
        let spaces = spaces.clone();
        async move { spaces.fetch_subscription(space_id, now_ms()).await }
    });
    debug!("Polling subscription of {} every {:?}", slug, state.poll_interval);

    let frames = stream::unfold(poller, |mut poller| async move {
        let status = poller.changed().await?;
        let frame = Event::default().json_data(SubscriptionView::from(status));
        Some((frame, poller))
    });
    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

impl UserQuery {
    fn address(&self) -> Result<Address, ApiError> {
        let raw = self
            .user
            .as_deref()
            .ok_or_else(|| ApiError::validation("user", "is required"))?;
        Address::from_str(raw.trim())
            .map_err(|_| ApiError::validation("user", "must be an address"))
    }
}

/// Invite cooldown state of `user` in the space; `null` while pending
pub async fn invite_info(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Option<InviteInfo>>, ApiError> {
    let Query(query) = query?;
    let user = query.address()?;
    let space = load_space(&state, &auth, &slug).await?;
    let Some(space_id) = OnChainId::from_column(space.web3_space_id).active() else {
        return Ok(Json(None));
    };
    Ok(Json(Some(state.spaces.fetch_invite_info(space_id, user).await?)))
}

#[derive(Debug, Serialize)]
pub struct DelegateView {
    pub user: Address,
    pub delegate: Option<Address>,
}

pub async fn delegate(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<DelegateView>, ApiError> {
    let Query(query) = query?;
    let user = query.address()?;
    let space = load_space(&state, &auth, &slug).await?;
    let delegate = match OnChainId::from_column(space.web3_space_id).active() {
        Some(space_id) => state.spaces.fetch_delegate(user, space_id).await?,
        None => None,
    };
    Ok(Json(DelegateView { user, delegate }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalsQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub quorum_total: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalChainView {
    pub core: ProposalCore,
    pub status: ProposalStatus,
    pub metrics: DerivedProposalMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
    pub slug: String,
    pub title: String,
    pub label: Option<String>,
    pub web3_proposal_id: Option<i64>,
    pub pending: bool,
    /// `null` while pending or when the on-chain read failed
    pub chain: Option<ProposalChainView>,
}

impl ProposalView {
    fn new(
        document: documents::Model,
        core: Option<ProposalCore>,
        quorum_total: U256,
        now: u64,
    ) -> Self {
        let link = OnChainId::from_column(document.web3_proposal_id);
        let chain = core.map(|core| ProposalChainView {
            status: derive_status(&core, now),
            metrics: derive_metrics(&core, quorum_total),
            core,
        });
        Self {
            slug: document.slug,
            title: document.title,
            label: document.label,
            web3_proposal_id: document.web3_proposal_id,
            pending: link == OnChainId::Pending,
            chain,
        }
    }
}

pub async fn proposals(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
    query: Result<Query<ProposalsQuery>, QueryRejection>,
) -> Result<Json<OffsetPage<ProposalView>>, ApiError> {
    let Query(query) = query?;
    let request = OffsetRequest::new(query.limit, query.offset)?;
    let quorum_total = match query.quorum_total.as_deref() {
        Some(raw) => U256::from_str(raw)
            .map_err(|_| ApiError::validation("quorumTotal", "must be an unsigned integer"))?,
        None => U256::ZERO,
    };

    let scoped = state.db.scoped(&auth).await?;
    let repo = HybridRepository::new(scoped.conn());
    let space = repo.space_by_slug(&slug).await?;
    let page = repo.space_proposals(space.id, request).await?;
    scoped.finish().await?;

    let ids: Vec<U256> = page
        .data
        .iter()
        .filter_map(|doc| OnChainId::from_column(doc.web3_proposal_id).active())
        .collect();
    let cores: HashMap<U256, Option<ProposalCore>> = ids
        .iter()
        .copied()
        .zip(state.proposals.fetch_batch(&ids).await?)
        .collect();
    debug!(
        "Space {}: {} proposal rows, {} on chain",
        slug,
        page.data.len(),
        ids.len()
    );

    let now = now_ms() / 1000;
    Ok(Json(page.map(|doc| {
        let core = OnChainId::from_column(doc.web3_proposal_id)
            .active()
            .and_then(|id| cores.get(&id).cloned().flatten());
        ProposalView::new(doc, core, quorum_total, now)
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembersView {
    pub persons: Paginated<PersonView>,
    pub spaces: Paginated<SpaceView>,
}

pub async fn members(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
    query: Result<Query<MembersQuery>, QueryRejection>,
) -> Result<Json<MembersView>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.page_size)?;
    let space = load_space(&state, &auth, &slug).await?;

    let Some(space_id) = OnChainId::from_column(space.web3_space_id).active() else {
        return Ok(Json(MembersView {
            persons: Paginated::empty(page),
            spaces: Paginated::empty(page),
        }));
    };

    let space_ids = [space_id];
    let (details, delegates) = tokio::try_join!(
        state.spaces.fetch_details(&space_ids),
        state.spaces.fetch_delegates(space_id)
    )?;
    let details = details
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("empty space details batch".to_string()))?;
    let addresses: Vec<String> = details.members.iter().map(Address::to_string).collect();
    let delegates: HashSet<String> = delegates
        .iter()
        .map(|a| a.to_string().to_uppercase())
        .collect();

    let scoped = state.db.scoped(&auth).await?;
    let repo = HybridRepository::new(scoped.conn());
    let search = query.search.as_deref();
    let persons = repo.search_people_by_addresses(&addresses, page, search).await?;
    let spaces = repo.search_spaces_by_addresses(&addresses, page, search).await?;
    scoped.finish().await?;

    let persons = persons.map(|person| {
        let is_delegate = person
            .address
            .as_deref()
            .is_some_and(|a| delegates.contains(&a.to_uppercase()));
        PersonView {
            is_delegate: Some(is_delegate),
            ..PersonView::from(person)
        }
    });

    Ok(Json(MembersView {
        persons,
        spaces: spaces.map(SpaceView::from),
    }))
}

pub async fn organisation(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<Json<Vec<SpaceView>>, ApiError> {
    let scoped = state.db.scoped(&auth).await?;
    let repo = HybridRepository::new(scoped.conn());
    let space = repo.space_by_slug(&slug).await?;
    let spaces = repo.organisation(space).await?;
    scoped.finish().await?;
    Ok(Json(spaces.into_iter().map(SpaceView::from).collect()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetView {
    pub address: Address,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AssetsView {
    pub data: Vec<AssetView>,
    /// Token families whose read failed
    pub unavailable: Vec<&'static str>,
}

pub async fn assets_without_balances(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<Json<AssetsView>, ApiError> {
    let space = load_space(&state, &auth, &slug).await?;
    let mut view = AssetsView {
        data: Vec::new(),
        unavailable: Vec::new(),
    };
    let Some(space_id) = OnChainId::from_column(space.web3_space_id).active() else {
        return Ok(Json(view));
    };

    let tokens = state.spaces.fetch_tokens(space_id).await?;
    for (token_type, result) in [
        ("regular", tokens.regular),
        ("ownership", tokens.ownership),
        ("decaying", tokens.decaying),
    ] {
        match result {
            Ok(addresses) => view.data.extend(
                addresses
                    .into_iter()
                    .map(|address| AssetView { address, token_type }),
            ),
            Err(e) if e.is_rate_limited() => return Err(e.into()),
            Err(e) => {
                warn!("Space {}: {} tokens unavailable: {}", slug, token_type, e);
                view.unavailable.push(token_type);
            }
        }
    }
    Ok(Json(view))
}
