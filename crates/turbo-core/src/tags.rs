//! Avro encoding of data item tags
//!
//! Tags are written as an Avro array of `{name: bytes, value: bytes}` records:
//! a zigzag varint block count, each name and value as a length-prefixed byte
//! string, then a zero terminator. An empty tag list encodes to no bytes at all.

use crate::error::{CoreError, Result};
use crate::types::Tag;

/// Maximum number of tags on one data item
pub const MAX_TAG_COUNT: usize = 128;

/// Maximum tag name length in bytes
pub const MAX_TAG_NAME_BYTES: usize = 1024;

/// Maximum tag value length in bytes
pub const MAX_TAG_VALUE_BYTES: usize = 3072;

/// Check tag count and field lengths
pub fn validate_tags(tags: &[Tag]) -> Result<()> {
    if tags.len() > MAX_TAG_COUNT {
        return Err(CoreError::Validation(format!(
            "{} tags exceeds the limit of {MAX_TAG_COUNT}",
            tags.len()
        )));
    }
    for tag in tags {
        if tag.name.is_empty() || tag.name.len() > MAX_TAG_NAME_BYTES {
            return Err(CoreError::Validation(format!(
                "tag name must be 1..={MAX_TAG_NAME_BYTES} bytes, got {}",
                tag.name.len()
            )));
        }
        if tag.value.is_empty() || tag.value.len() > MAX_TAG_VALUE_BYTES {
            return Err(CoreError::Validation(format!(
                "tag value for {} must be 1..={MAX_TAG_VALUE_BYTES} bytes, got {}",
                tag.name,
                tag.value.len()
            )));
        }
    }
    Ok(())
}

pub fn encode_tags(tags: &[Tag]) -> Vec<u8> {
    let mut out = Vec::new();
    if tags.is_empty() {
        return out;
    }
    write_long(&mut out, tags.len() as i64);
    for tag in tags {
        write_bytes(&mut out, tag.name.as_bytes());
        write_bytes(&mut out, tag.value.as_bytes());
    }
    write_long(&mut out, 0);
    out
}

pub fn decode_tags(bytes: &[u8]) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    if bytes.is_empty() {
        return Ok(tags);
    }
    let mut cursor = 0usize;
    loop {
        let count = read_long(bytes, &mut cursor)?;
        if count == 0 {
            break;
        }
        // A negative count is followed by the block size in bytes
        if count < 0 {
            read_long(bytes, &mut cursor)?;
        }
        for _ in 0..count.unsigned_abs() {
            let name = read_string(bytes, &mut cursor)?;
            let value = read_string(bytes, &mut cursor)?;
            tags.push(Tag { name, value });
        }
    }
    if cursor != bytes.len() {
        return Err(CoreError::Parse(format!(
            "{} trailing bytes after tags",
            bytes.len() - cursor
        )));
    }
    Ok(tags)
}

fn write_long(out: &mut Vec<u8>, value: i64) {
    let mut n = ((value << 1) ^ (value >> 63)) as u64;
    while n & !0x7f != 0 {
        out.push((n as u8 & 0x7f) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_long(out, bytes.len() as i64);
    out.extend_from_slice(bytes);
}

fn read_long(bytes: &[u8], cursor: &mut usize) -> Result<i64> {
    let mut n = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes
            .get(*cursor)
            .ok_or_else(|| CoreError::Parse("truncated varint in tags".to_string()))?;
        *cursor += 1;
        n |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(CoreError::Parse("varint in tags is too long".to_string()));
        }
    }
    Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
}

fn read_string(bytes: &[u8], cursor: &mut usize) -> Result<String> {
    let len = read_long(bytes, cursor)?;
    let len = usize::try_from(len)
        .map_err(|_| CoreError::Parse(format!("negative string length {len} in tags")))?;
    let end = cursor
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| CoreError::Parse("tag string runs past the end".to_string()))?;
    let value = String::from_utf8(bytes[*cursor..end].to_vec())
        .map_err(|_| CoreError::Parse("tag is not UTF-8".to_string()))?;
    *cursor = end;
    Ok(value)
}
