//! Engine configuration

use serde::{Deserialize, Serialize};

/// Block size used to chunk object streams before encoding (10 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 10 * 1024 * 1024;

/// Default cap on `list_objects` results
pub const DEFAULT_LIST_MAX_KEYS: usize = 1000;

/// Engine-level tunables shared by all buckets of a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chunk size for the object pipeline; the final chunk of a stream may
    /// be shorter
    pub block_size: usize,
    /// Result cap applied when a listing request passes `max_keys <= 0`
    pub list_max_keys: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            list_max_keys: DEFAULT_LIST_MAX_KEYS,
        }
    }
}
