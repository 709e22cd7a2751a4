//! Upload progress notifications

use std::fmt;
use std::sync::Arc;

use crate::error::ClientError;

/// Stage of an upload, reported before the stage's first request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStep {
    Signing,
    Uploading,
    Initializing,
    UploadingChunks,
    Finalizing,
    Polling,
    Finalized,
}

/// Progress snapshot passed to [`UploadEvents::on_progress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub step: UploadStep,
    pub processed_bytes: u64,
    pub total_bytes: u64,
}

/// Observer for an upload. Callbacks may run concurrently during folder uploads.
pub trait UploadEvents: Send + Sync {
    fn on_progress(&self, progress: &UploadProgress);

    fn on_error(&self, _error: &ClientError) {}

    fn on_success(&self) {}
}

impl<F> UploadEvents for F
where
    F: Fn(&UploadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &UploadProgress) {
        self(progress)
    }
}

/// Optional shared observer, cheap to clone into upload tasks
#[derive(Clone, Default)]
pub struct EventSink(Option<Arc<dyn UploadEvents>>);

impl EventSink {
    pub fn new(events: Arc<dyn UploadEvents>) -> Self {
        Self(Some(events))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn progress(&self, step: UploadStep, processed_bytes: u64, total_bytes: u64) {
        if let Some(events) = &self.0 {
            events.on_progress(&UploadProgress {
                step,
                processed_bytes,
                total_bytes,
            });
        }
    }

    pub fn error(&self, error: &ClientError) {
        if let Some(events) = &self.0 {
            events.on_error(error);
        }
    }

    pub fn success(&self) {
        if let Some(events) = &self.0 {
            events.on_success();
        }
    }
}

impl From<Arc<dyn UploadEvents>> for EventSink {
    fn from(events: Arc<dyn UploadEvents>) -> Self {
        Self::new(events)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventSink")
            .field(&self.0.as_ref().map(|_| "observer"))
            .finish()
    }
}
