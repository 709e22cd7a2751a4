//! Chunked upload protocol: init, chunks at increasing offsets, finalize, poll

pub mod source;
pub mod state;
pub mod uploader;

pub use source::{ChunkSource, MemoryChunkSource, StreamingChunkSource};
pub use state::{transition, FailureReason, StepOutcome, UploadState};
pub use uploader::ChunkedUploader;
