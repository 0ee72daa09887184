//! relayer configuration

use serde::{Deserialize, Serialize};

use sluice_pool::TREE_HEIGHT;

/// runtime configuration, read from the environment with defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// json-rpc endpoint of the remote ledger
    pub rpc_url: String,
    /// hex-encoded 32-byte pool program id
    pub program_id: String,
    /// hex-encoded 32-byte ed25519 signing secret
    pub signer_key: Option<String>,
    /// sled directory for the utxo store
    pub store_path: String,
    pub tree_height: usize,
    /// fee used when the remote pool config cannot be read
    pub fallback_fee_bps: u16,
    /// ledger-state cache lifetime
    pub cache_ttl_secs: u64,
    /// confirmation polling bounds
    pub confirm_timeout_secs: u64,
    pub confirm_interval_secs: u64,
    /// transactions fetched per indexing pass
    pub log_fetch_limit: usize,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".into(),
            program_id: hex::encode([0u8; 32]),
            signer_key: None,
            store_path: "sluice-utxos".into(),
            tree_height: TREE_HEIGHT,
            fallback_fee_bps: 25,
            cache_ttl_secs: 30,
            confirm_timeout_secs: 60,
            confirm_interval_secs: 1,
            log_fetch_limit: 1000,
        }
    }
}

impl RelayerConfig {
    /// read `SLUICE_*` environment variables over the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SLUICE_RPC_URL") {
            config.rpc_url = v;
        }
        if let Ok(v) = std::env::var("SLUICE_PROGRAM_ID") {
            config.program_id = v;
        }
        if let Ok(v) = std::env::var("SLUICE_SIGNER_KEY") {
            config.signer_key = Some(v);
        }
        if let Ok(v) = std::env::var("SLUICE_STORE_PATH") {
            config.store_path = v;
        }
        if let Ok(v) = std::env::var("SLUICE_FALLBACK_FEE_BPS") {
            if let Ok(bps) = v.parse() {
                config.fallback_fee_bps = bps;
            }
        }
        if let Ok(v) = std::env::var("SLUICE_CACHE_TTL_SECS") {
            if let Ok(secs) = v.parse() {
                config.cache_ttl_secs = secs;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayerConfig::default();
        assert_eq!(config.tree_height, TREE_HEIGHT);
        assert_eq!(config.fallback_fee_bps, 25);
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.confirm_timeout_secs, 60);
    }
}
