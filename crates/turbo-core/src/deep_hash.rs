//! SHA-384 deep hash over nested byte lists
//!
//! `blob(data) = H(H("blob" ++ len) ++ H(data))`
//! `list(items) = fold(H("list" ++ count), |acc, item| H(acc ++ deep(item)))`

use std::io::Read;

use sha2::{Digest, Sha384};

use crate::error::{CoreError, Result};

pub type DeepHash = [u8; 48];

/// Input to [`deep_hash`]
#[derive(Debug, Clone)]
pub enum DeepHashChunk<'a> {
    Blob(&'a [u8]),
    List(Vec<DeepHashChunk<'a>>),
}

pub fn deep_hash(chunk: &DeepHashChunk<'_>) -> DeepHash {
    match chunk {
        DeepHashChunk::Blob(data) => blob_hash(data),
        DeepHashChunk::List(items) => {
            let hashes: Vec<DeepHash> = items.iter().map(deep_hash).collect();
            list_hash(&hashes)
        }
    }
}

pub fn blob_hash(data: &[u8]) -> DeepHash {
    tagged_blob(data.len() as u64, sha384(data))
}

/// Blob hash of exactly `expected_len` bytes read from `reader`
pub fn blob_hash_reader<R: Read>(mut reader: R, expected_len: u64) -> Result<DeepHash> {
    let mut hasher = Sha384::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        hasher.update(&buf[..read]);
    }
    if total != expected_len {
        return Err(CoreError::Validation(format!(
            "stream produced {total} bytes, expected {expected_len}"
        )));
    }
    Ok(tagged_blob(total, finish(hasher)))
}

/// Fold already deep-hashed items into a list hash
pub fn list_hash(items: &[DeepHash]) -> DeepHash {
    let tag = format!("list{}", items.len());
    let mut acc = sha384(tag.as_bytes());
    for item in items {
        let mut hasher = Sha384::new();
        hasher.update(acc);
        hasher.update(item);
        acc = finish(hasher);
    }
    acc
}

fn tagged_blob(len: u64, data_hash: DeepHash) -> DeepHash {
    let tag = format!("blob{len}");
    let mut hasher = Sha384::new();
    hasher.update(sha384(tag.as_bytes()));
    hasher.update(data_hash);
    finish(hasher)
}

fn sha384(data: &[u8]) -> DeepHash {
    let mut hasher = Sha384::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Sha384) -> DeepHash {
    let mut out = [0u8; 48];
    out.copy_from_slice(&hasher.finalize());
    out
}
