//! Folder upload inputs and results

use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use turbo_core::{Manifest, StreamFactory, Tag};

use crate::api::UploadReceipt;

/// Reports the payload size without opening it
pub type SizeFactory = Arc<dyn Fn() -> std::io::Result<u64> + Send + Sync>;

/// One file of a folder upload
#[derive(Clone)]
pub struct UploadFileDescriptor {
    /// Path relative to the folder root, as it appears in the manifest
    pub path: String,
    pub content_type: String,
    pub stream_factory: StreamFactory,
    pub size_factory: SizeFactory,
    /// Tags added after the `Content-Type` tag
    pub tags: Vec<Tag>,
}

impl UploadFileDescriptor {
    pub fn new(
        path: impl Into<String>,
        content_type: impl Into<String>,
        stream_factory: StreamFactory,
        size_factory: SizeFactory,
    ) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            stream_factory,
            size_factory,
            tags: Vec::new(),
        }
    }

    /// A file whose contents are already in memory
    pub fn from_bytes(
        path: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        let stream_factory: StreamFactory =
            Arc::new(move || Ok(Box::new(Cursor::new(data.clone())) as Box<dyn Read + Send>));
        Self::new(path, content_type, stream_factory, Arc::new(move || Ok(size)))
    }

    /// A file on disk, opened each time its contents are needed
    pub fn from_file(
        path: impl Into<String>,
        content_type: impl Into<String>,
        file: impl Into<PathBuf>,
    ) -> Self {
        let file: PathBuf = file.into();
        let open = file.clone();
        let stream_factory: StreamFactory = Arc::new(move || {
            Ok(Box::new(std::fs::File::open(&open)?) as Box<dyn Read + Send>)
        });
        let size_factory: SizeFactory = Arc::new(move || Ok(std::fs::metadata(&file)?.len()));
        Self::new(path, content_type, stream_factory, size_factory)
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }
}

impl fmt::Debug for UploadFileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFileDescriptor")
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Options for [`crate::TurboClient::upload_folder`]
#[derive(Debug, Clone)]
pub struct FolderUploadOptions {
    /// Manifest index path; `index.html` or the first file when unset
    pub index_file: Option<String>,
    /// Manifest fallback path; `404.html` or the index when unset
    pub fallback_file: Option<String>,
    /// Upload a manifest after the files
    pub manifest_enabled: bool,
    /// Files uploaded at once; the client config decides when unset
    pub max_concurrency: Option<usize>,
    /// Extra tags on the manifest item
    pub manifest_tags: Vec<Tag>,
    /// Addresses paying for every file and the manifest
    pub paid_by: Vec<String>,
}

impl Default for FolderUploadOptions {
    fn default() -> Self {
        Self {
            index_file: None,
            fallback_file: None,
            manifest_enabled: true,
            max_concurrency: None,
            manifest_tags: Vec::new(),
            paid_by: Vec::new(),
        }
    }
}

/// Result of a folder upload
#[derive(Debug, Clone)]
pub struct UploadFolderResponse {
    /// Receipts in the order the files were given
    pub file_receipts: Vec<(String, UploadReceipt)>,
    pub manifest: Option<Manifest>,
    pub manifest_receipt: Option<UploadReceipt>,
}

impl UploadFolderResponse {
    pub fn receipt_for(&self, path: &str) -> Option<&UploadReceipt> {
        self.file_receipts
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, receipt)| receipt)
    }
}
