use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root prefix every store key lives under. Two engines with
    /// different prefixes share a store without seeing each other.
    pub prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: "carmine".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}
