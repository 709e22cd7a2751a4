//! Replayable sources of signed data item bytes

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;

use crate::data_item::{sign, sign_streaming, SignedDataItemHeader};
use crate::error::{CoreError, Result};
use crate::signer::TurboSigner;
use crate::types::DataItemOptions;

/// Opens a fresh reader over the same bytes on every call
pub type StreamFactory = Arc<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// A signed item held in memory, with its size known up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataItemStreamFactory {
    bytes: Bytes,
}

impl SignedDataItemStreamFactory {
    /// Wrap bytes that are already a signed data item
    pub fn from_signed_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Sign `data` now and wrap the result
    pub async fn from_bytes<S>(data: &[u8], signer: &S, options: &DataItemOptions) -> Result<Self>
    where
        S: TurboSigner + ?Sized,
    {
        let item = sign(data, options, signer).await?;
        Ok(Self::from_signed_bytes(item.bytes()))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// A new reader over the signed bytes
    pub fn stream(&self) -> Cursor<Bytes> {
        Cursor::new(self.bytes.clone())
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

/// A signed header plus a factory for the payload that follows it
#[derive(Clone)]
pub struct StreamingSignedDataItem {
    header: SignedDataItemHeader,
    data: StreamFactory,
}

impl StreamingSignedDataItem {
    /// Hash one pass over the payload and sign it
    pub async fn sign<S>(
        data: StreamFactory,
        data_len: u64,
        signer: &S,
        options: &DataItemOptions,
    ) -> Result<Self>
    where
        S: TurboSigner + ?Sized,
    {
        let open = Arc::clone(&data);
        let reader = tokio::task::spawn_blocking(move || open())
            .await
            .map_err(|e| CoreError::Signing(format!("opening payload failed: {e}")))??;
        let header = sign_streaming(reader, data_len, options, signer).await?;
        Ok(Self { header, data })
    }

    pub fn header(&self) -> &SignedDataItemHeader {
        &self.header
    }

    pub fn size(&self) -> u64 {
        self.header.size()
    }

    pub fn id(&self) -> String {
        self.header.id()
    }

    /// A new reader over header then payload
    pub fn stream(&self) -> io::Result<impl Read + Send> {
        let data = (self.data)()?;
        Ok(Cursor::new(self.header.header()).chain(data.take(self.header.data_len())))
    }
}

impl fmt::Debug for StreamingSignedDataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSignedDataItem")
            .field("id", &self.id())
            .field("size", &self.size())
            .finish()
    }
}
