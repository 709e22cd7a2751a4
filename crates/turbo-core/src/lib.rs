//! Turbo Core - wallet signing, ANS-104 data items and upload policies
//!
//! This crate holds everything the Turbo upload client does without touching
//! the network: loading RSA wallet keys, signing payloads into data items,
//! sizing them ahead of time, and the pure policies that drive uploads.

pub mod backoff;
pub mod chunking;
pub mod data_item;
pub mod deep_hash;
pub mod encoding;
pub mod error;
pub mod jwk;
pub mod manifest;
pub mod signer;
pub mod stream;
pub mod tags;
pub mod types;

pub use backoff::{backoff, RetryPolicy};
pub use chunking::{
    default_max_finalize_wait, finalize_poll_interval, should_chunk, ChunkingMode,
    DEFAULT_CHUNK_BYTE_COUNT, MAX_CHUNK_BYTE_COUNT, MIN_CHUNK_BYTE_COUNT,
    STREAMING_SIGN_THRESHOLD,
};
pub use data_item::{
    estimate_size, item_id, sign, sign_streaming, DataItemView, SignedDataItem,
    SignedDataItemHeader,
};
pub use encoding::{from_base64_url, to_base64_url};
pub use error::{CoreError, Result};
pub use jwk::Jwk;
pub use manifest::{Manifest, ManifestBuilder, ManifestEntry, ManifestIndex, MANIFEST_CONTENT_TYPE};
pub use signer::{verify_signature, ArweaveSigner, TurboSigner};
pub use stream::{SignedDataItemStreamFactory, StreamFactory, StreamingSignedDataItem};
pub use types::{DataItemOptions, SignatureHeaders, Tag, WalletAddress};

/// Signature type of RSA-PSS wallet signatures in the data item header
pub const SIGNATURE_TYPE_ARWEAVE: u16 = 1;

/// Modulus, owner and signature length of a 4096-bit wallet key
pub const ARWEAVE_KEY_LENGTH: usize = 512;
