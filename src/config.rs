//! Weaver configuration.

use serde::{Deserialize, Serialize};

/// Default module path generated wrappers call their runtime helpers
/// through.
pub const DEFAULT_RUNTIME_PATH: &str = "::spanweave::rt";

/// Knobs for one weaving run. All analysis passes are deterministic; the
/// parallelism and cache settings change throughput only, never output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaverConfig {
    /// Path prefix emitted in front of every runtime helper call.
    pub runtime_path: String,
    /// Run the per-file passes on the rayon pool.
    pub parallel: bool,
    /// Memoize per-file scan results by structural hash.
    pub cache_enabled: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            parallel: true,
            cache_enabled: true,
        }
    }
}
