//! Chunked upload state machine
//!
//! ```text
//! Idle -> Initialized -> Uploading(offset)* -> Finalizing -> Polling* -> Finalized | Failed
//! ```
//!
//! [`transition`] is pure: it maps the current state and the outcome of the
//! step just performed to the next state. Network calls, retries and polling
//! delays live in the driver.

use crate::api::{ChunkInfo, ChunkedUploadStatus, MultiPartStatus, UploadReceipt};
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Initialized {
        upload_id: String,
        chunk_size: u64,
    },
    Uploading {
        upload_id: String,
        chunk_size: u64,
        next_offset: u64,
    },
    Finalizing {
        upload_id: String,
    },
    Polling {
        upload_id: String,
    },
    Finalized(UploadReceipt),
    Failed {
        upload_id: String,
        reason: FailureReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Rejected(String),
    Underfunded,
}

/// Outcome of the step performed in the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Init call answered
    Created(ChunkInfo),
    /// Chunk size settled, nothing sent yet
    Started,
    /// Chunk at the current offset acknowledged
    ChunkAccepted { len: u64 },
    /// Finalize call acknowledged
    FinalizeAccepted,
    /// Status poll answered
    Status(MultiPartStatus),
}

impl UploadState {
    pub fn upload_id(&self) -> Option<&str> {
        match self {
            UploadState::Idle | UploadState::Finalized(_) => None,
            UploadState::Initialized { upload_id, .. }
            | UploadState::Uploading { upload_id, .. }
            | UploadState::Finalizing { upload_id }
            | UploadState::Polling { upload_id }
            | UploadState::Failed { upload_id, .. } => Some(upload_id),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Finalized(_) | UploadState::Failed { .. })
    }
}

/// Next state for an item of `total_size` bytes
pub fn transition(state: &UploadState, outcome: StepOutcome, total_size: u64) -> Result<UploadState> {
    match (state, outcome) {
        (UploadState::Idle, StepOutcome::Created(info)) => {
            if info.upload_id.is_empty() {
                return Err(ClientError::ProtocolViolation(
                    "init returned an empty upload id".to_string(),
                ));
            }
            if info.chunk_size == 0 {
                return Err(ClientError::ProtocolViolation(
                    "init returned a zero chunk size".to_string(),
                ));
            }
            Ok(UploadState::Initialized {
                upload_id: info.upload_id,
                chunk_size: info.chunk_size,
            })
        }

        (
            UploadState::Initialized {
                upload_id,
                chunk_size,
            },
            StepOutcome::Started,
        ) => {
            if total_size == 0 {
                Ok(UploadState::Finalizing {
                    upload_id: upload_id.clone(),
                })
            } else {
                Ok(UploadState::Uploading {
                    upload_id: upload_id.clone(),
                    chunk_size: *chunk_size,
                    next_offset: 0,
                })
            }
        }

        (
            UploadState::Uploading {
                upload_id,
                chunk_size,
                next_offset,
            },
            StepOutcome::ChunkAccepted { len },
        ) => {
            let expected = (*chunk_size).min(total_size - next_offset);
            if len != expected {
                return Err(ClientError::ProtocolViolation(format!(
                    "chunk at offset {next_offset} was {len} bytes, expected {expected}"
                )));
            }
            let offset = next_offset + len;
            if offset == total_size {
                Ok(UploadState::Finalizing {
                    upload_id: upload_id.clone(),
                })
            } else {
                Ok(UploadState::Uploading {
                    upload_id: upload_id.clone(),
                    chunk_size: *chunk_size,
                    next_offset: offset,
                })
            }
        }

        (UploadState::Finalizing { upload_id }, StepOutcome::FinalizeAccepted) => {
            Ok(UploadState::Polling {
                upload_id: upload_id.clone(),
            })
        }

        (UploadState::Polling { upload_id }, StepOutcome::Status(status)) => {
            let upload_id = upload_id.clone();
            Ok(match (status.status, status.receipt) {
                (ChunkedUploadStatus::Finalized, Some(receipt)) => UploadState::Finalized(receipt),
                (ChunkedUploadStatus::Failed, _) => UploadState::Failed {
                    upload_id,
                    reason: FailureReason::Rejected(
                        status
                            .failed_reason
                            .unwrap_or_else(|| "service reported FAILED".to_string()),
                    ),
                },
                (ChunkedUploadStatus::Underfunded, _) => UploadState::Failed {
                    upload_id,
                    reason: FailureReason::Underfunded,
                },
                // Finalized without a receipt yet, or still assembling
                _ => UploadState::Polling { upload_id },
            })
        }

        (state, outcome) => Err(ClientError::ProtocolViolation(format!(
            "unexpected {outcome:?} in state {state:?}"
        ))),
    }
}
