use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical Multicall3 deployment, identical on every EVM chain we target
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// Chain id of the production network (Base mainnet)
pub const PRODUCTION_CHAIN_ID: u64 = 8453;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmNetwork {
    pub name: String,
    pub chain_id: u64,
    pub rpc_endpoints: Vec<String>,
    pub explorer: Option<String>,
    pub testnet: bool,
}

impl EvmNetwork {
    pub fn by_chain_id(chain_id: u64) -> Option<&'static EvmNetwork> {
        NETWORKS.get(&chain_id)
    }

    pub fn list_chain_ids() -> Vec<u64> {
        let mut ids: Vec<u64> = NETWORKS.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// First public RPC endpoint, used when no explicit URL is configured
    pub fn default_rpc(&self) -> Option<&str> {
        self.rpc_endpoints.first().map(String::as_str)
    }
}

static NETWORKS: Lazy<HashMap<u64, EvmNetwork>> = Lazy::new(|| {
    let mut networks = HashMap::new();

    networks.insert(
        8453,
        EvmNetwork {
            name: "Base".to_string(),
            chain_id: 8453,
            rpc_endpoints: vec![
                "https://mainnet.base.org".to_string(),
                "https://base.llamarpc.com".to_string(),
            ],
            explorer: Some("https://basescan.org".to_string()),
            testnet: false,
        },
    );

    networks.insert(
        84532,
        EvmNetwork {
            name: "Base Sepolia".to_string(),
            chain_id: 84532,
            rpc_endpoints: vec!["https://sepolia.base.org".to_string()],
            explorer: Some("https://sepolia.basescan.org".to_string()),
            testnet: true,
        },
    );

    networks.insert(
        31337,
        EvmNetwork {
            name: "Local".to_string(),
            chain_id: 31337,
            rpc_endpoints: vec!["http://localhost:8545".to_string()],
            explorer: None,
            testnet: true,
        },
    );

    networks
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_network_known() {
        let base = EvmNetwork::by_chain_id(PRODUCTION_CHAIN_ID).unwrap();
        assert_eq!(base.name, "Base");
        assert!(!base.testnet);
        assert_eq!(base.default_rpc(), Some("https://mainnet.base.org"));
    }

    #[test]
    fn test_unknown_chain() {
        assert!(EvmNetwork::by_chain_id(999_999).is_none());
        assert_eq!(EvmNetwork::list_chain_ids(), vec![8453, 31337, 84532]);
    }
}
