//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use turbo_core::{
    ChunkingMode, RetryPolicy, DEFAULT_CHUNK_BYTE_COUNT, MAX_CHUNK_BYTE_COUNT,
    MIN_CHUNK_BYTE_COUNT,
};
use url::Url;

use crate::error::{ClientError, Result};

/// Turbo client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurboConfig {
    /// Base URL of the upload service
    pub upload_base_url: String,

    /// Base URL of the payment service
    pub payment_base_url: String,

    /// Network/currency token in upload paths
    pub token: String,

    /// Whole-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Idle read timeout on an open connection (milliseconds)
    pub socket_timeout_ms: u64,

    /// Backoff applied to transient failures
    pub retry_policy: RetryPolicy,

    /// Chunk size requested for chunked uploads
    pub chunk_byte_count: u64,

    /// Direct vs chunked upload selection
    pub chunking_mode: ChunkingMode,

    /// Fixed finalize poll interval; derived from item size when unset
    pub finalize_poll_interval_ms: Option<u64>,

    /// Overall finalize wait; derived from item size when unset
    pub max_finalize_wait_ms: Option<u64>,

    /// Files uploaded at once by a folder upload
    pub max_concurrency: usize,

    /// How long service info is cached (seconds)
    pub service_info_ttl_secs: u64,
}

impl Default for TurboConfig {
    fn default() -> Self {
        Self {
            upload_base_url: "https://upload.ardrive.io".to_string(),
            payment_base_url: "https://payment.ardrive.io".to_string(),
            token: "arweave".to_string(),
            request_timeout_ms: 60_000,
            connect_timeout_ms: 30_000,
            socket_timeout_ms: 30_000,
            retry_policy: RetryPolicy::default(),
            chunk_byte_count: DEFAULT_CHUNK_BYTE_COUNT,
            chunking_mode: ChunkingMode::Auto,
            finalize_poll_interval_ms: None,
            max_finalize_wait_ms: None,
            max_concurrency: 4,
            service_info_ttl_secs: 300,
        }
    }
}

impl TurboConfig {
    /// Defaults pointed at another upload service
    pub fn with_upload_url(upload_base_url: impl Into<String>) -> Self {
        Self {
            upload_base_url: upload_base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.upload_url()?;
        Url::parse(&self.payment_base_url)?;
        if self.token.is_empty() {
            return Err(ClientError::Config("token must not be empty".to_string()));
        }
        if !(MIN_CHUNK_BYTE_COUNT..=MAX_CHUNK_BYTE_COUNT).contains(&self.chunk_byte_count) {
            return Err(ClientError::Config(format!(
                "chunk_byte_count {} outside {MIN_CHUNK_BYTE_COUNT}..={MAX_CHUNK_BYTE_COUNT}",
                self.chunk_byte_count
            )));
        }
        if !self.retry_policy.multiplier.is_finite() || self.retry_policy.multiplier < 1.0 {
            return Err(ClientError::Config(
                "retry multiplier must be a finite value >= 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ClientError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upload service URL with a trailing slash so relative joins keep its path
    pub fn upload_url(&self) -> Result<Url> {
        let mut base = self.upload_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Items strictly larger than this are chunked in `AUTO` mode
    pub fn chunking_threshold(&self) -> u64 {
        self.chunk_byte_count.saturating_mul(2)
    }

    pub fn finalize_poll_interval(&self) -> Option<Duration> {
        self.finalize_poll_interval_ms.map(Duration::from_millis)
    }

    pub fn max_finalize_wait(&self) -> Option<Duration> {
        self.max_finalize_wait_ms.map(Duration::from_millis)
    }

    pub fn service_info_ttl(&self) -> Duration {
        Duration::from_secs(self.service_info_ttl_secs)
    }
}
