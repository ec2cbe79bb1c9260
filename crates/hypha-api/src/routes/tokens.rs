use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::pricing::PriceError;
use crate::state::AppState;
use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSupplyView {
    pub token: Address,
    pub symbol: Option<String>,
    /// Raw base-unit supply as a decimal string
    pub total_supply: String,
    pub decimals: u8,
    pub formatted: f64,
    pub price: Option<f64>,
}

pub async fn supply(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    Path(token): Path<String>,
) -> Result<Json<TokenSupplyView>, ApiError> {
    let token = Address::from_str(&token)
        .map_err(|e| ApiError::validation("token", e.to_string()))?;
    let supply = state.tokens.supply(token).await?;

    let price = match &state.prices {
        None => None,
        Some(oracle) => match oracle.usd_price(token).await {
            Ok(price) => price,
            Err(PriceError::RateLimited) => {
                return Err(ApiError::RateLimited("price oracle".to_string()))
            }
            Err(e) => {
                warn!("No price for {}: {}", token, e);
                None
            }
        },
    };

    Ok(Json(TokenSupplyView {
        token,
        formatted: supply.formatted(),
        total_supply: supply.total_supply.to_string(),
        decimals: supply.decimals,
        symbol: supply.symbol,
        price,
    }))
}
