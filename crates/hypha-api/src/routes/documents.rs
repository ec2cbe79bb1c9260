use super::views::PersonView;
use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::state::AppState;
use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::Json;
use hypha_chain::OnChainId;
use hypha_store::HybridRepository;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Yes,
    No,
}

#[derive(Debug, Serialize)]
pub struct VoterView {
    pub address: Address,
    pub vote: Vote,
    pub person: Option<PersonView>,
}

/// Voters of a proposal document, joined with their person rows
pub async fn voters(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(slug): Path<String>,
) -> Result<Json<Vec<VoterView>>, ApiError> {
    let scoped = state.db.scoped(&auth).await?;
    let document = HybridRepository::new(scoped.conn())
        .document_by_slug(&slug)
        .await?;
    scoped.finish().await?;

    let Some(proposal_id) = OnChainId::from_column(document.web3_proposal_id).active() else {
        return Ok(Json(Vec::new()));
    };
    let voters = state.proposals.fetch_voters(proposal_id).await?;

    let ballots: Vec<(Address, Vote)> = voters
        .yes_voters
        .into_iter()
        .map(|a| (a, Vote::Yes))
        .chain(voters.no_voters.into_iter().map(|a| (a, Vote::No)))
        .collect();
    let addresses: Vec<String> = ballots.iter().map(|(a, _)| a.to_string()).collect();

    let scoped = state.db.scoped(&auth).await?;
    let people = HybridRepository::new(scoped.conn())
        .people_by_addresses(&addresses)
        .await?;
    scoped.finish().await?;

    let mut by_address: HashMap<String, PersonView> = people
        .into_iter()
        .filter_map(|p| Some((p.address.clone()?.to_uppercase(), PersonView::from(p))))
        .collect();

    Ok(Json(
        ballots
            .into_iter()
            .map(|(address, vote)| VoterView {
                person: by_address.remove(&address.to_string().to_uppercase()),
                address,
                vote,
            })
            .collect(),
    ))
}
