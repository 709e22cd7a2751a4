//! Upload service surface
//!
//! [`UploadApi`] is one attempt per call; retries are layered on top by
//! [`crate::retry`]. [`crate::http::HttpUploadApi`] is the network
//! implementation.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use turbo_core::SignatureHeaders;

use crate::error::Result;

/// Header selecting the chunked upload protocol revision
pub const CHUNKING_VERSION_HEADER: &str = "x-chunking-version";
pub const CHUNKING_VERSION: &str = "2";

/// Header naming the addresses paying for an upload
pub const PAID_BY_HEADER: &str = "x-paid-by";

/// Tags that turn an uploaded item into a credit share or revocation
pub const SHARE_CREDITS_TAG: &str = "x-approve-payment";
pub const SHARED_WINC_AMOUNT_TAG: &str = "x-amount";
pub const APPROVAL_EXPIRES_BY_SECONDS_TAG: &str = "x-expires-seconds";
pub const REVOKE_CREDITS_TAG: &str = "x-delete-payment-approval";

/// Receipt for an accepted data item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub data_caches: BTreeSet<String>,
    #[serde(default)]
    pub fast_finality_indexes: BTreeSet<String>,
    #[serde(default)]
    pub winc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_height: Option<u64>,
    /// Set when the item shared credits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_approval: Option<CreditShareApproval>,
    /// Set when the item revoked credit shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_approvals: Option<Vec<CreditShareApproval>>,
}

/// Permission for another address to spend the payer's credits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditShareApproval {
    pub approval_data_item_id: String,
    pub approved_address: String,
    pub paying_address: String,
    pub approved_winc_amount: String,
    #[serde(default)]
    pub used_winc_amount: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub expiration_date: Option<String>,
}

/// Approvals an address has given and received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditShareApprovals {
    pub given_approvals: Vec<CreditShareApproval>,
    pub received_approvals: Vec<CreditShareApproval>,
}

/// Chunk negotiation returned when a chunked upload is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    #[serde(rename = "id", alias = "uploadId")]
    pub upload_id: String,
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: u64,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkedUploadStatus {
    Accepted,
    Finalizing,
    Finalized,
    Failed,
    Underfunded,
    /// Any intermediate status this client does not know by name
    #[serde(other)]
    Pending,
}

/// Status of a chunked upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPartStatus {
    pub status: ChunkedUploadStatus,
    #[serde(default)]
    pub receipt: Option<UploadReceipt>,
    #[serde(default)]
    pub failed_reason: Option<String>,
}

/// Status of a data item already accepted by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub status: String,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

/// Upload service metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceInfo {
    pub version: String,
    pub gateway: String,
    pub addresses: BTreeMap<String, String>,
    pub free_upload_limit_bytes: u64,
}

/// Requests understood by the upload service
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// `POST /v1/tx/{token}` with a complete signed item
    async fn upload_data_item(
        &self,
        token: &str,
        item: Bytes,
        headers: &SignatureHeaders,
        paid_by: &[String],
    ) -> Result<UploadReceipt>;

    /// `POST /v1/chunks/{token}/-1/-1`
    async fn create_chunked_upload(&self, token: &str, chunk_size: u64) -> Result<ChunkInfo>;

    /// `POST /v1/chunks/{token}/{upload_id}/{offset}`
    async fn upload_chunk(
        &self,
        token: &str,
        upload_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> Result<()>;

    /// `POST /v1/chunks/{token}/{upload_id}/finalize`
    async fn finalize_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
        paid_by: &[String],
    ) -> Result<()>;

    /// `GET /v1/chunks/{token}/{upload_id}/status`
    async fn chunked_upload_status(&self, token: &str, upload_id: &str) -> Result<MultiPartStatus>;

    /// `GET /v1/tx/{id}/status`
    async fn transaction_status(&self, id: &str) -> Result<TransactionStatus>;

    /// `GET /v1/info`
    async fn service_info(&self) -> Result<ServiceInfo>;

    /// `GET /v1/account/approvals/all?userAddress=`
    async fn list_credit_shares(&self, user_address: &str) -> Result<CreditShareApprovals>;

    /// `GET /v1/account/approvals/get?userAddress=`
    async fn credit_approvals(&self, user_address: &str) -> Result<CreditShareApprovals>;
}
