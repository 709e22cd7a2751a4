//! Core value types shared by the signer, the codec and the client

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::to_base64_url;

/// Header carrying the Base64URL public key of the request signer
pub const HEADER_PUBLIC_KEY: &str = "x-public-key";

/// Header carrying the single-use nonce
pub const HEADER_NONCE: &str = "x-nonce";

/// Header carrying the signature over the nonce
pub const HEADER_SIGNATURE: &str = "x-signature";

/// Wallet address - Base64URL SHA-256 of the normalized public key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Derive the address from normalized public key bytes
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(to_base64_url(Sha256::digest(public_key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single data item tag. Order within a tag list is part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Options applied when building a data item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItemOptions {
    /// Tags in insertion order
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Base64URL encoded 32-byte target address
    #[serde(default)]
    pub target: Option<String>,
    /// 32-byte anchor, taken as its UTF-8 bytes
    #[serde(default)]
    pub anchor: Option<String>,
    /// Addresses paying for the upload instead of the signer
    #[serde(default)]
    pub paid_by: Vec<String>,
}

impl DataItemOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_paid_by(mut self, address: impl Into<String>) -> Self {
        self.paid_by.push(address.into());
        self
    }

    /// Add a `Content-Type` tag unless one is already present
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        let present = self
            .tags
            .iter()
            .any(|tag| tag.name.eq_ignore_ascii_case("content-type"));
        if !present {
            self.tags.push(Tag::new("Content-Type", content_type));
        }
        self
    }
}

/// Authentication headers for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub public_key: String,
    pub nonce: String,
    pub signature: String,
}

impl SignatureHeaders {
    /// Header name/value pairs in the form the upload service expects
    pub fn header_pairs(&self) -> [(&'static str, &str); 3] {
        [
            (HEADER_PUBLIC_KEY, self.public_key.as_str()),
            (HEADER_NONCE, self.nonce.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}
