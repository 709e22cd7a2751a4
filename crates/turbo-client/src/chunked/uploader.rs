//! Drives [`UploadState`] against the upload service

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use turbo_core::{default_max_finalize_wait, finalize_poll_interval, RetryPolicy};

use super::source::ChunkSource;
use super::state::{transition, FailureReason, StepOutcome, UploadState};
use crate::api::{UploadApi, UploadReceipt};
use crate::config::TurboConfig;
use crate::error::{ClientError, Result};
use crate::events::{EventSink, UploadStep};
use crate::retry::with_retry;

/// Runs one chunked upload per call to [`ChunkedUploader::upload`]
#[derive(Clone)]
pub struct ChunkedUploader {
    api: Arc<dyn UploadApi>,
    token: String,
    retry_policy: RetryPolicy,
    chunk_byte_count: u64,
    poll_interval: Option<Duration>,
    max_finalize_wait: Option<Duration>,
}

impl ChunkedUploader {
    pub fn new(api: Arc<dyn UploadApi>, config: &TurboConfig) -> Self {
        Self {
            api,
            token: config.token.clone(),
            retry_policy: config.retry_policy.clone(),
            chunk_byte_count: config.chunk_byte_count,
            poll_interval: config.finalize_poll_interval(),
            max_finalize_wait: config.max_finalize_wait(),
        }
    }

    /// Upload every byte of `source`, finalize, and wait for the receipt.
    ///
    /// State lives only in this call; an aborted upload starts over from init.
    pub async fn upload(
        &self,
        source: &mut dyn ChunkSource,
        paid_by: &[String],
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        let total = source.total_size();
        let poll_interval = self
            .poll_interval
            .unwrap_or_else(|| finalize_poll_interval(total));
        let max_wait = self
            .max_finalize_wait
            .unwrap_or_else(|| default_max_finalize_wait(total));
        let policy = &self.retry_policy;
        let token = self.token.as_str();

        let mut state = UploadState::Idle;
        let mut polling_since: Option<Instant> = None;

        loop {
            let outcome = match &state {
                UploadState::Idle => {
                    events.progress(UploadStep::Initializing, 0, total);
                    let info = with_retry(policy, "initialize chunked upload", || {
                        self.api.create_chunked_upload(token, self.chunk_byte_count)
                    })
                    .await?;
                    info!(
                        upload_id = %info.upload_id,
                        chunk_size = info.chunk_size,
                        total,
                        "chunked upload initialized"
                    );
                    StepOutcome::Created(info)
                }

                UploadState::Initialized { .. } => StepOutcome::Started,

                UploadState::Uploading {
                    upload_id,
                    chunk_size,
                    next_offset,
                } => {
                    let offset = *next_offset;
                    events.progress(UploadStep::UploadingChunks, offset, total);
                    let len = (*chunk_size).min(total - offset);
                    let chunk = source.read_chunk(offset, len).await?;
                    with_retry(policy, "upload chunk", || {
                        self.api.upload_chunk(token, upload_id, offset, chunk.clone())
                    })
                    .await?;
                    debug!(%upload_id, offset, len, "chunk accepted");
                    StepOutcome::ChunkAccepted { len }
                }

                UploadState::Finalizing { upload_id } => {
                    events.progress(UploadStep::Finalizing, total, total);
                    with_retry(policy, "finalize chunked upload", || {
                        self.api.finalize_chunked_upload(token, upload_id, paid_by)
                    })
                    .await?;
                    debug!(%upload_id, "finalize accepted");
                    StepOutcome::FinalizeAccepted
                }

                UploadState::Polling { upload_id } => {
                    if polling_since.is_none() {
                        events.progress(UploadStep::Polling, total, total);
                        polling_since = Some(Instant::now());
                    }
                    let status = with_retry(policy, "chunked upload status", || {
                        self.api.chunked_upload_status(token, upload_id)
                    })
                    .await?;
                    debug!(%upload_id, status = ?status.status, "polled finalize status");
                    StepOutcome::Status(status)
                }

                UploadState::Finalized(receipt) => {
                    events.progress(UploadStep::Finalized, total, total);
                    info!(id = %receipt.id, total, "chunked upload finalized");
                    return Ok(receipt.clone());
                }

                UploadState::Failed { upload_id, reason } => {
                    let upload_id = upload_id.clone();
                    return Err(match reason {
                        FailureReason::Underfunded => ClientError::Underfunded { upload_id },
                        FailureReason::Rejected(reason) => ClientError::ChunkedUploadFailed {
                            upload_id,
                            reason: reason.clone(),
                        },
                    });
                }
            };

            let next = transition(&state, outcome, total)?;
            if let (UploadState::Polling { upload_id }, Some(since)) = (&next, polling_since) {
                let waited = since.elapsed();
                if waited >= max_wait {
                    return Err(ClientError::FinalizeTimeout {
                        upload_id: upload_id.clone(),
                        waited,
                    });
                }
                tokio::time::sleep(poll_interval.min(max_wait - waited)).await;
            }
            state = next;
        }
    }
}
