//! Direct vs chunked upload decision and chunked finalize timing

use std::time::Duration;

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Default chunk size requested from the upload service
pub const DEFAULT_CHUNK_BYTE_COUNT: u64 = 5 * MIB;

/// Smallest chunk size the service accepts
pub const MIN_CHUNK_BYTE_COUNT: u64 = 5 * MIB;

/// Largest chunk size the service accepts
pub const MAX_CHUNK_BYTE_COUNT: u64 = 500 * MIB;

/// Payloads at or above this size are signed from a stream
pub const STREAMING_SIGN_THRESHOLD: u64 = 100 * MIB;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChunkingMode {
    /// Chunk when the item is larger than the threshold
    #[default]
    Auto,
    /// Always chunk
    Force,
    /// Never chunk
    Disabled,
}

pub fn should_chunk(mode: ChunkingMode, threshold_bytes: u64, size: u64) -> bool {
    match mode {
        ChunkingMode::Disabled => false,
        ChunkingMode::Force => true,
        ChunkingMode::Auto => size > threshold_bytes,
    }
}

/// Interval between finalize status polls for an item of `size` bytes
pub fn finalize_poll_interval(size: u64) -> Duration {
    if size < 100 * MIB {
        Duration::from_secs(2)
    } else if size < 3 * GIB {
        Duration::from_secs(4)
    } else {
        Duration::from_millis(1500 * size.div_ceil(GIB)).max(Duration::from_secs(15))
    }
}

/// Default upper bound on the time spent polling finalize status
pub fn default_max_finalize_wait(size: u64) -> Duration {
    let gib = size.div_ceil(GIB).max(1);
    Duration::from_secs(150 * gib)
}
