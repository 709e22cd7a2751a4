//! Base64URL helpers
//!
//! Arweave encodes every binary field (keys, addresses, ids, signatures) as
//! unpadded URL-safe Base64. Decoding accepts padded input too, since some
//! wallet exporters pad JWK members.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::Result;

const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded Base64URL
pub fn to_base64_url(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL.encode(bytes)
}

/// Decode Base64URL, with or without padding
pub fn from_base64_url(input: &str) -> Result<Vec<u8>> {
    Ok(BASE64_URL.decode(input)?)
}
