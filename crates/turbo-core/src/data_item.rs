//! ANS-104 data item codec
//!
//! Layout of a signed item:
//!
//! ```text
//! signature type  u16 LE
//! signature       signer.signature_length() bytes
//! owner           signer.public_key().len() bytes
//! target          presence byte, then 32 bytes when present
//! anchor          presence byte, then 32 bytes when present
//! tag count       u64 LE
//! tag bytes len   u64 LE
//! tags            Avro encoded
//! data            payload
//! ```
//!
//! The signature covers the deep hash of
//! `["dataitem", "1", <type>, owner, target, anchor, tags, data]`.

use std::io::Read;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::deep_hash::{blob_hash, blob_hash_reader, list_hash, DeepHash};
use crate::encoding::{from_base64_url, to_base64_url};
use crate::error::{CoreError, Result};
use crate::signer::{verify_signature, TurboSigner};
use crate::tags::{decode_tags, encode_tags, validate_tags};
use crate::types::{DataItemOptions, Tag};
use crate::{ARWEAVE_KEY_LENGTH, SIGNATURE_TYPE_ARWEAVE};

const TARGET_LENGTH: usize = 32;
const ANCHOR_LENGTH: usize = 32;

/// Options resolved to the exact bytes that go on the wire
#[derive(Debug, Clone)]
struct EncodedOptions {
    target: Option<Vec<u8>>,
    anchor: Option<Vec<u8>>,
    tag_count: u64,
    tags: Vec<u8>,
}

impl EncodedOptions {
    fn new(options: &DataItemOptions) -> Result<Self> {
        let target = match &options.target {
            Some(target) => {
                let bytes = from_base64_url(target)
                    .map_err(|_| CoreError::Validation("target is not Base64URL".to_string()))?;
                if bytes.len() != TARGET_LENGTH {
                    return Err(CoreError::Validation(format!(
                        "target must be {TARGET_LENGTH} bytes, got {}",
                        bytes.len()
                    )));
                }
                Some(bytes)
            }
            None => None,
        };

        let anchor = match &options.anchor {
            Some(anchor) => {
                let bytes = anchor.as_bytes().to_vec();
                if bytes.len() != ANCHOR_LENGTH {
                    return Err(CoreError::Validation(format!(
                        "anchor must be {ANCHOR_LENGTH} bytes, got {}",
                        bytes.len()
                    )));
                }
                Some(bytes)
            }
            None => None,
        };

        validate_tags(&options.tags)?;

        Ok(Self {
            target,
            anchor,
            tag_count: options.tags.len() as u64,
            tags: encode_tags(&options.tags),
        })
    }

    fn header_len(&self, signature_len: usize, owner_len: usize) -> usize {
        2 + signature_len
            + owner_len
            + 1
            + self.target.as_ref().map_or(0, Vec::len)
            + 1
            + self.anchor.as_ref().map_or(0, Vec::len)
            + 16
            + self.tags.len()
    }

    /// Header with a zeroed signature slot
    fn write_header(&self, signature_len: usize, owner: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_len(signature_len, owner.len()));
        out.extend_from_slice(&SIGNATURE_TYPE_ARWEAVE.to_le_bytes());
        out.resize(2 + signature_len, 0);
        out.extend_from_slice(owner);
        write_optional(&mut out, self.target.as_deref());
        write_optional(&mut out, self.anchor.as_deref());
        out.extend_from_slice(&self.tag_count.to_le_bytes());
        out.extend_from_slice(&(self.tags.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.tags);
        out
    }

    /// Deep hash of the signed fields, given the data blob's hash
    fn signature_data(&self, owner: &[u8], data_hash: DeepHash) -> DeepHash {
        let signature_type = SIGNATURE_TYPE_ARWEAVE.to_string();
        list_hash(&[
            blob_hash(b"dataitem"),
            blob_hash(b"1"),
            blob_hash(signature_type.as_bytes()),
            blob_hash(owner),
            blob_hash(self.target.as_deref().unwrap_or_default()),
            blob_hash(self.anchor.as_deref().unwrap_or_default()),
            blob_hash(&self.tags),
            data_hash,
        ])
    }
}

fn write_optional(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            out.push(1);
            out.extend_from_slice(bytes);
        }
        None => out.push(0),
    }
}

/// Exact size of the signed item for a payload of `data_len` bytes
pub fn estimate_size<S>(data_len: u64, options: &DataItemOptions, signer: &S) -> Result<u64>
where
    S: TurboSigner + ?Sized,
{
    let encoded = EncodedOptions::new(options)?;
    let header = encoded.header_len(signer.signature_length(), signer.public_key().len());
    Ok(header as u64 + data_len)
}

/// Sign `data` into a complete data item
pub async fn sign<S>(data: &[u8], options: &DataItemOptions, signer: &S) -> Result<SignedDataItem>
where
    S: TurboSigner + ?Sized,
{
    let encoded = EncodedOptions::new(options)?;
    let owner = signer.public_key();
    let signature_len = signer.signature_length();

    let message = encoded.signature_data(owner, blob_hash(data));
    let signature = signer.sign(&message).await?;
    check_signature_len(&signature, signature_len)?;

    let mut bytes = encoded.write_header(signature_len, owner);
    bytes[2..2 + signature_len].copy_from_slice(&signature);
    bytes.extend_from_slice(data);

    let item = SignedDataItem::new(Bytes::from(bytes), signature_len)?;
    debug!(id = %item.id(), size = item.size(), "signed data item");
    Ok(item)
}

/// Sign a payload read from `reader` without holding it in memory.
///
/// Returns the signed header; the complete item is the header followed by the
/// same `data_len` payload bytes.
pub async fn sign_streaming<R, S>(
    reader: R,
    data_len: u64,
    options: &DataItemOptions,
    signer: &S,
) -> Result<SignedDataItemHeader>
where
    R: Read + Send + 'static,
    S: TurboSigner + ?Sized,
{
    let encoded = EncodedOptions::new(options)?;
    let owner = signer.public_key();
    let signature_len = signer.signature_length();

    let data_hash = tokio::task::spawn_blocking(move || blob_hash_reader(reader, data_len))
        .await
        .map_err(|e| CoreError::Signing(format!("hashing task failed: {e}")))??;

    let message = encoded.signature_data(owner, data_hash);
    let signature = signer.sign(&message).await?;
    check_signature_len(&signature, signature_len)?;

    let mut header = encoded.write_header(signature_len, owner);
    header[2..2 + signature_len].copy_from_slice(&signature);

    debug!(
        id = %item_id(&signature),
        header_size = header.len(),
        data_len,
        "signed streaming data item"
    );
    Ok(SignedDataItemHeader {
        header: Bytes::from(header),
        signature_len,
        data_len,
    })
}

fn check_signature_len(signature: &[u8], expected: usize) -> Result<()> {
    if signature.len() != expected {
        return Err(CoreError::Signing(format!(
            "signer produced {} signature bytes, expected {expected}",
            signature.len()
        )));
    }
    Ok(())
}

/// Item id: Base64URL SHA-256 of the signature
pub fn item_id(signature: &[u8]) -> String {
    to_base64_url(Sha256::digest(signature))
}

/// A complete signed data item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataItem {
    bytes: Bytes,
    signature_len: usize,
}

impl SignedDataItem {
    /// Wrap signed bytes whose signature slot is `signature_len` bytes
    pub fn new(bytes: Bytes, signature_len: usize) -> Result<Self> {
        if bytes.len() < 2 + signature_len {
            return Err(CoreError::Parse(format!(
                "{} bytes cannot hold a {signature_len} byte signature",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            signature_len,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn signature(&self) -> &[u8] {
        &self.bytes[2..2 + self.signature_len]
    }

    pub fn id(&self) -> String {
        item_id(self.signature())
    }
}

/// Signed header of a streamed item
#[derive(Debug, Clone)]
pub struct SignedDataItemHeader {
    header: Bytes,
    signature_len: usize,
    data_len: u64,
}

impl SignedDataItemHeader {
    pub fn header(&self) -> Bytes {
        self.header.clone()
    }

    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Size of header plus payload
    pub fn size(&self) -> u64 {
        self.header.len() as u64 + self.data_len
    }

    pub fn signature(&self) -> &[u8] {
        &self.header[2..2 + self.signature_len]
    }

    pub fn id(&self) -> String {
        item_id(self.signature())
    }
}

/// Borrowed view over a signed data item
#[derive(Debug, Clone)]
pub struct DataItemView<'a> {
    pub signature_type: u16,
    pub signature: &'a [u8],
    pub owner: &'a [u8],
    pub target: Option<&'a [u8]>,
    pub anchor: Option<&'a [u8]>,
    pub tag_count: u64,
    pub tags: &'a [u8],
    pub data: &'a [u8],
}

impl<'a> DataItemView<'a> {
    /// Parse an item signed with a 4096-bit wallet
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        Self::parse_with_key_length(bytes, ARWEAVE_KEY_LENGTH)
    }

    pub fn parse_with_key_length(bytes: &'a [u8], key_len: usize) -> Result<Self> {
        let mut reader = SliceReader { bytes, cursor: 0 };

        let signature_type = u16::from_le_bytes(reader.array::<2>()?);
        if signature_type != SIGNATURE_TYPE_ARWEAVE {
            return Err(CoreError::Parse(format!(
                "unsupported signature type {signature_type}"
            )));
        }
        let signature = reader.take(key_len)?;
        let owner = reader.take(key_len)?;
        let target = reader.optional(TARGET_LENGTH)?;
        let anchor = reader.optional(ANCHOR_LENGTH)?;
        let tag_count = u64::from_le_bytes(reader.array::<8>()?);
        let tags_len = u64::from_le_bytes(reader.array::<8>()?);
        let tags_len = usize::try_from(tags_len)
            .map_err(|_| CoreError::Parse(format!("tag length {tags_len} is too large")))?;
        let tags = reader.take(tags_len)?;
        let data = reader.rest();

        Ok(Self {
            signature_type,
            signature,
            owner,
            target,
            anchor,
            tag_count,
            tags,
            data,
        })
    }

    pub fn id(&self) -> String {
        item_id(self.signature)
    }

    pub fn decoded_tags(&self) -> Result<Vec<Tag>> {
        let tags = decode_tags(self.tags)?;
        if tags.len() as u64 != self.tag_count {
            return Err(CoreError::Parse(format!(
                "header declares {} tags, found {}",
                self.tag_count,
                tags.len()
            )));
        }
        Ok(tags)
    }

    /// Recompute the signed deep hash and check the signature against the owner
    pub fn verify(&self) -> Result<()> {
        let signature_type = self.signature_type.to_string();
        let message = list_hash(&[
            blob_hash(b"dataitem"),
            blob_hash(b"1"),
            blob_hash(signature_type.as_bytes()),
            blob_hash(self.owner),
            blob_hash(self.target.unwrap_or_default()),
            blob_hash(self.anchor.unwrap_or_default()),
            blob_hash(self.tags),
            blob_hash(self.data),
        ]);
        verify_signature(self.owner, &message, self.signature)
    }
}

struct SliceReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> SliceReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                CoreError::Parse(format!("truncated data item at offset {}", self.cursor))
            })?;
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn optional(&mut self, len: usize) -> Result<Option<&'a [u8]>> {
        match self.take(1)?[0] {
            0 => Ok(None),
            1 => self.take(len).map(Some),
            flag => Err(CoreError::Parse(format!("invalid presence byte {flag}"))),
        }
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.bytes[self.cursor..];
        self.cursor = self.bytes.len();
        out
    }
}
