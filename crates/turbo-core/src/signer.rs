//! Wallet signers
//!
//! [`TurboSigner`] is the capability the codec and the client depend on.
//! [`ArweaveSigner`] is the production implementation: RSASSA-PSS with
//! SHA-256, MGF1-SHA256, a 32-byte salt and trailer field 1.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::warn;
use uuid::Uuid;

use crate::encoding::to_base64_url;
use crate::error::{CoreError, Result};
use crate::jwk::{normalize_modulus, Jwk};
use crate::types::{SignatureHeaders, WalletAddress};
use crate::ARWEAVE_KEY_LENGTH;

/// Public exponent used by every Arweave wallet
pub const ARWEAVE_PUBLIC_EXPONENT: u32 = 65537;

/// Signing capability used to build data items and authenticate requests
#[async_trait]
pub trait TurboSigner: Send + Sync {
    /// Normalized public key bytes (the data item owner)
    fn public_key(&self) -> &[u8];

    /// Wallet address derived from [`TurboSigner::public_key`]
    fn address(&self) -> &WalletAddress;

    /// Length of every signature this signer produces
    fn signature_length(&self) -> usize {
        self.public_key().len()
    }

    /// Sign an arbitrary payload
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Sign a fresh single-use nonce for request authentication
    async fn generate_signature_headers(&self) -> Result<SignatureHeaders> {
        let nonce = Uuid::new_v4().to_string();
        let signature = self.sign(nonce.as_bytes()).await?;
        Ok(SignatureHeaders {
            public_key: to_base64_url(self.public_key()),
            nonce,
            signature: to_base64_url(signature),
        })
    }
}

/// RSA wallet signer loaded from a JWK
#[derive(Clone)]
pub struct ArweaveSigner {
    signing_key: Arc<SigningKey<Sha256>>,
    public_key: Vec<u8>,
    address: WalletAddress,
}

impl ArweaveSigner {
    /// Load a signer from a wallet JSON document
    pub fn from_jwk_json(json: &str) -> Result<Self> {
        Self::from_jwk(&Jwk::from_json(json)?)
    }

    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let key = jwk.to_private_key()?;
        let public_key = normalize_modulus(&jwk.modulus_bytes()?, key.size())?;
        Ok(Self::with_public_key(key, public_key))
    }

    pub fn from_private_key(key: RsaPrivateKey) -> Result<Self> {
        let public_key = normalize_modulus(&key.n().to_bytes_be(), key.size())?;
        Ok(Self::with_public_key(key, public_key))
    }

    fn with_public_key(key: RsaPrivateKey, public_key: Vec<u8>) -> Self {
        if public_key.len() != ARWEAVE_KEY_LENGTH {
            warn!(
                key_bytes = public_key.len(),
                "wallet key is not 4096-bit; the network will reject its data items"
            );
        }
        let address = WalletAddress::from_public_key(&public_key);
        Self {
            signing_key: Arc::new(SigningKey::<Sha256>::new(key)),
            public_key,
            address,
        }
    }
}

impl fmt::Debug for ArweaveSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArweaveSigner")
            .field("address", &self.address)
            .field("key_bytes", &self.public_key.len())
            .finish()
    }
}

#[async_trait]
impl TurboSigner for ArweaveSigner {
    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn address(&self) -> &WalletAddress {
        &self.address
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let key = Arc::clone(&self.signing_key);
        let payload = payload.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut rng = rand::thread_rng();
            key.try_sign_with_rng(&mut rng, &payload)
                .map(|signature| signature.to_vec())
                .map_err(|e| CoreError::Signing(e.to_string()))
        })
        .await
        .map_err(|e| CoreError::Signing(format!("signing task failed: {e}")))?
    }
}

/// Verify an RSASSA-PSS signature against normalized public key bytes
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(public_key),
        BigUint::from(ARWEAVE_PUBLIC_EXPONENT),
    )
    .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    let signature =
        Signature::try_from(signature).map_err(|_| CoreError::SignatureVerificationFailed)?;
    VerifyingKey::<Sha256>::new(key)
        .verify(message, &signature)
        .map_err(|_| CoreError::SignatureVerificationFailed)
}
