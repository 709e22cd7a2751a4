//! JSON Web Key loading for RSA wallet keys

use std::fmt;

use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{from_base64_url, to_base64_url};
use crate::error::{CoreError, Result};

/// RSA private key in JWK form, every member Base64URL big-endian unsigned
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    pub n: String,
    pub e: String,
    pub d: String,
    pub p: String,
    pub q: String,
    pub dp: String,
    pub dq: String,
    pub qi: String,
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("n", &self.n)
            .field("e", &self.e)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl Jwk {
    /// Parse a wallet JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidKey(format!("malformed JWK: {e}")))
    }

    /// Build the RSA private key, checking the CRT members against the primes
    pub fn to_private_key(&self) -> Result<RsaPrivateKey> {
        if let Some(kty) = &self.kty {
            if kty != "RSA" {
                return Err(CoreError::InvalidKey(format!("unsupported key type: {kty}")));
            }
        }

        let n = decode_member("n", &self.n)?;
        let e = decode_member("e", &self.e)?;
        let d = decode_member("d", &self.d)?;
        let p = decode_member("p", &self.p)?;
        let q = decode_member("q", &self.q)?;
        let dp = decode_member("dp", &self.dp)?;
        let dq = decode_member("dq", &self.dq)?;
        let qi = decode_member("qi", &self.qi)?;

        let one = BigUint::from(1u32);
        if p <= one || q <= one {
            return Err(CoreError::InvalidKey("primes must be greater than one".to_string()));
        }
        if dp != &d % (&p - &one) || dq != &d % (&q - &one) {
            return Err(CoreError::InvalidKey(
                "CRT exponents do not match the private exponent".to_string(),
            ));
        }
        if (&qi * &q) % &p != one {
            return Err(CoreError::InvalidKey(
                "CRT coefficient does not match the primes".to_string(),
            ));
        }

        let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        key.validate()
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(key)
    }

    /// Export a two-prime RSA key in wallet form
    pub fn from_private_key(key: &RsaPrivateKey) -> Result<Self> {
        let [p, q] = key.primes() else {
            return Err(CoreError::InvalidKey(format!(
                "expected two primes, key has {}",
                key.primes().len()
            )));
        };
        let one = BigUint::from(1u32);
        let dp = key.d() % (p - &one);
        let dq = key.d() % (q - &one);
        // p is prime, so q^(p-2) mod p is the inverse of q
        let qi = q.modpow(&(p - BigUint::from(2u32)), p);

        let encode = |value: &BigUint| to_base64_url(value.to_bytes_be());
        Ok(Self {
            kty: Some("RSA".to_string()),
            n: encode(key.n()),
            e: encode(key.e()),
            d: encode(key.d()),
            p: encode(p),
            q: encode(q),
            dp: encode(&dp),
            dq: encode(&dq),
            qi: encode(&qi),
        })
    }

    /// Serialize back to a wallet JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Raw modulus bytes as carried by the document
    pub fn modulus_bytes(&self) -> Result<Vec<u8>> {
        from_base64_url(&self.n)
            .map_err(|_| CoreError::InvalidKey("member n is not Base64URL".into()))
    }
}

fn decode_member(name: &str, value: &str) -> Result<BigUint> {
    let bytes = from_base64_url(value)
        .map_err(|_| CoreError::InvalidKey(format!("member {name} is not Base64URL")))?;
    if bytes.iter().all(|b| *b == 0) {
        return Err(CoreError::InvalidKey(format!("member {name} is empty or zero")));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Normalize a big-endian modulus to exactly `key_len` bytes.
///
/// Shorter values are left-padded with zeros and a single leading zero sign
/// byte is stripped. Anything else cannot be a modulus of that size.
pub fn normalize_modulus(modulus: &[u8], key_len: usize) -> Result<Vec<u8>> {
    match modulus.len() {
        len if len == key_len => Ok(modulus.to_vec()),
        len if len < key_len => {
            let mut out = vec![0u8; key_len - len];
            out.extend_from_slice(modulus);
            Ok(out)
        }
        len if len == key_len + 1 && modulus[0] == 0 => Ok(modulus[1..].to_vec()),
        len => Err(CoreError::InvalidKey(format!(
            "modulus is {len} bytes, expected {key_len}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pads_short_modulus() {
        let out = normalize_modulus(&[1, 2, 3], 5).unwrap();
        assert_eq!(out, vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_normalize_strips_sign_byte() {
        let out = normalize_modulus(&[0, 0xff, 1, 2, 3], 4).unwrap();
        assert_eq!(out, vec![0xff, 1, 2, 3]);
    }

    #[test]
    fn test_normalize_rejects_oversized() {
        assert!(normalize_modulus(&[1, 0xff, 1, 2, 3], 4).is_err());
        assert!(normalize_modulus(&[0, 0, 0xff, 1, 2, 3], 4).is_err());
    }

    #[test]
    fn test_malformed_json_is_invalid_key() {
        let err = Jwk::from_json("{\"n\": \"abc\"}").unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey(_)));
    }

    #[test]
    fn test_debug_redacts_private_members() {
        let jwk = Jwk {
            kty: Some("RSA".into()),
            n: "bg".into(),
            e: "AQAB".into(),
            d: "secret-d".into(),
            p: "secret-p".into(),
            q: "secret-q".into(),
            dp: "secret-dp".into(),
            dq: "secret-dq".into(),
            qi: "secret-qi".into(),
        };
        let debug = format!("{jwk:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_rejects_non_rsa_key_type() {
        let jwk = Jwk {
            kty: Some("EC".into()),
            n: "AQ".into(),
            e: "AQAB".into(),
            d: "AQ".into(),
            p: "AQ".into(),
            q: "AQ".into(),
            dp: "AQ".into(),
            dq: "AQ".into(),
            qi: "AQ".into(),
        };
        assert!(matches!(jwk.to_private_key(), Err(CoreError::InvalidKey(_))));
    }
}
