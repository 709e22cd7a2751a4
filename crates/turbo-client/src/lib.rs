//! Turbo Client - uploads signed data items to the Turbo upload service
//!
//! [`TurboClient`] signs payloads with a wallet from `turbo-core` and sends
//! them either in one request or through the chunked upload protocol,
//! retrying transient failures with exponential backoff. Folder uploads add
//! a path manifest once every file has been accepted.

pub mod api;
pub mod cache;
pub mod chunked;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod folder;
pub mod http;
pub mod retry;

pub use api::{
    ChunkInfo, ChunkedUploadStatus, CreditShareApproval, CreditShareApprovals, MultiPartStatus,
    ServiceInfo, TransactionStatus, UploadApi, UploadReceipt,
};
pub use chunked::{ChunkSource, ChunkedUploader, MemoryChunkSource, StreamingChunkSource};
pub use client::TurboClient;
pub use config::TurboConfig;
pub use error::{ClientError, ErrorClass, Result};
pub use events::{EventSink, UploadEvents, UploadProgress, UploadStep};
pub use folder::{FolderUploadOptions, SizeFactory, UploadFileDescriptor, UploadFolderResponse};
pub use http::HttpUploadApi;
pub use retry::with_retry;
