//! Shared helpers for turbo-client integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rsa::RsaPrivateKey;
use turbo_client::{
    ChunkInfo, ChunkedUploadStatus, ClientError, CreditShareApproval, CreditShareApprovals,
    MultiPartStatus, Result, ServiceInfo,
    TransactionStatus, TurboConfig, UploadApi, UploadEvents, UploadProgress, UploadReceipt,
    UploadStep,
};
use turbo_client::api::{
    APPROVAL_EXPIRES_BY_SECONDS_TAG, REVOKE_CREDITS_TAG, SHARED_WINC_AMOUNT_TAG, SHARE_CREDITS_TAG,
};
use turbo_core::{
    to_base64_url, ArweaveSigner, DataItemView, RetryPolicy, SignatureHeaders, WalletAddress,
};

/// Modulus length of the 1024-bit test wallet
pub const TEST_KEY_LENGTH: usize = 128;

pub fn test_signer() -> Arc<ArweaveSigner> {
    static SIGNER: OnceLock<Arc<ArweaveSigner>> = OnceLock::new();
    SIGNER
        .get_or_init(|| {
            let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
            Arc::new(ArweaveSigner::from_private_key(key).unwrap())
        })
        .clone()
}

/// Config with millisecond retries and polling
pub fn fast_config() -> TurboConfig {
    TurboConfig {
        retry_policy: RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            max_retries: 3,
        },
        finalize_poll_interval_ms: Some(5),
        max_finalize_wait_ms: Some(2_000),
        ..TurboConfig::default()
    }
}

pub fn transient() -> ClientError {
    ClientError::Http {
        status: 503,
        url: "stub://upload".to_string(),
        body: "unavailable".to_string(),
    }
}

pub fn rejected() -> ClientError {
    ClientError::Http {
        status: 400,
        url: "stub://upload".to_string(),
        body: "bad item".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Direct { size: usize, paid_by: Vec<String> },
    Create { chunk_size: u64 },
    Chunk { upload_id: String, offset: u64, len: usize },
    Finalize { upload_id: String, paid_by: Vec<String> },
    Status { upload_id: String },
    TransactionStatus { id: String },
    Info,
    CreditShares { user_address: String },
    CreditApprovals { user_address: String },
}

#[derive(Default)]
struct StubState {
    calls: Vec<Call>,
    failures: HashMap<&'static str, u32>,
    rejections: HashMap<&'static str, u32>,
    chunk_delay: Option<Duration>,
    statuses: VecDeque<MultiPartStatus>,
    uploads: BTreeMap<String, Vec<u8>>,
    accepted: Vec<Bytes>,
    headers: Vec<SignatureHeaders>,
    next_upload: u32,
    approvals: Vec<CreditShareApproval>,
}

/// In-memory upload service.
///
/// Direct items and finished chunked uploads are parsed back, so receipt ids
/// are the real item ids.
pub struct StubUploadApi {
    key_length: usize,
    chunk_size: Option<u64>,
    reject_suffix: Option<Vec<u8>>,
    approvals_in_receipts: bool,
    state: Mutex<StubState>,
}

impl StubUploadApi {
    pub fn new() -> Self {
        Self {
            key_length: TEST_KEY_LENGTH,
            chunk_size: None,
            reject_suffix: None,
            approvals_in_receipts: true,
            state: Mutex::new(StubState::default()),
        }
    }

    /// Answer init with this chunk size instead of the requested one
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Reject direct uploads whose payload ends with `suffix`
    pub fn rejecting_payload(mut self, suffix: &[u8]) -> Self {
        self.reject_suffix = Some(suffix.to_vec());
        self
    }

    /// Leave approval fields out of receipts, like an older service
    pub fn without_approvals(mut self) -> Self {
        self.approvals_in_receipts = false;
        self
    }

    /// Fail the next `times` calls of `operation` with a 503
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        self.state.lock().unwrap().failures.insert(operation, times);
    }

    /// Reject the next `times` calls of `operation` with a 400
    pub fn reject_next(&self, operation: &'static str, times: u32) {
        self.state.lock().unwrap().rejections.insert(operation, times);
    }

    /// Hold every chunk request for `delay` before answering
    pub fn set_chunk_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().chunk_delay = delay;
    }

    /// Statuses returned before the stub reports the upload finalized
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = MultiPartStatus>) {
        self.state.lock().unwrap().statuses.extend(statuses);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Items the stub accepted, direct or reassembled from chunks
    pub fn accepted(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().accepted.clone()
    }

    pub fn signature_headers(&self) -> Vec<SignatureHeaders> {
        self.state.lock().unwrap().headers.clone()
    }

    fn enter(&self, operation: &'static str, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(remaining) = state.rejections.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(rejected());
            }
        }
        if let Some(remaining) = state.failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(transient());
            }
        }
        Ok(())
    }

    fn receipt(&self, item: &[u8]) -> UploadReceipt {
        let view = DataItemView::parse_with_key_length(item, self.key_length)
            .expect("stub received a malformed data item");
        view.verify().expect("stub received a badly signed data item");
        let id = view.id();
        let owner = to_base64_url(view.owner);
        let payer = WalletAddress::from_public_key(view.owner).to_string();
        let tags: HashMap<String, String> = view
            .decoded_tags()
            .expect("stub received unreadable tags")
            .into_iter()
            .map(|tag| (tag.name, tag.value))
            .filter(|_| self.approvals_in_receipts)
            .collect();

        let mut state = self.state.lock().unwrap();
        let created_approval = tags.get(SHARE_CREDITS_TAG).map(|approved| {
            let approval = CreditShareApproval {
                approval_data_item_id: id.clone(),
                approved_address: approved.clone(),
                paying_address: payer.clone(),
                approved_winc_amount: tags[SHARED_WINC_AMOUNT_TAG].clone(),
                used_winc_amount: "0".to_string(),
                creation_date: "2024-01-01T00:00:00.000Z".to_string(),
                expiration_date: tags
                    .get(APPROVAL_EXPIRES_BY_SECONDS_TAG)
                    .map(|seconds| format!("+{seconds}s")),
            };
            state.approvals.push(approval.clone());
            approval
        });
        let revoked_approvals = tags.get(REVOKE_CREDITS_TAG).map(|revoked| {
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.approvals)
                .into_iter()
                .partition(|a| &a.approved_address == revoked && a.paying_address == payer);
            state.approvals = kept;
            removed
        });

        UploadReceipt {
            id,
            owner,
            data_caches: ["arweave.net".to_string()].into(),
            fast_finality_indexes: ["arweave.net".to_string()].into(),
            winc: "0".to_string(),
            timestamp: Some(1_700_000_000_000),
            deadline_height: Some(1_500_000),
            created_approval,
            revoked_approvals,
        }
    }

    fn approvals_for(&self, user_address: &str) -> CreditShareApprovals {
        let state = self.state.lock().unwrap();
        let involving = |pick: fn(&CreditShareApproval) -> &str| -> Vec<CreditShareApproval> {
            state
                .approvals
                .iter()
                .filter(|a| pick(a) == user_address)
                .cloned()
                .collect()
        };
        CreditShareApprovals {
            given_approvals: involving(|a| a.paying_address.as_str()),
            received_approvals: involving(|a| a.approved_address.as_str()),
        }
    }
}

pub fn status(status: ChunkedUploadStatus) -> MultiPartStatus {
    MultiPartStatus {
        status,
        receipt: None,
        failed_reason: None,
    }
}

#[async_trait]
impl UploadApi for StubUploadApi {
    async fn upload_data_item(
        &self,
        _token: &str,
        item: Bytes,
        headers: &SignatureHeaders,
        paid_by: &[String],
    ) -> Result<UploadReceipt> {
        self.enter(
            "upload_data_item",
            Call::Direct {
                size: item.len(),
                paid_by: paid_by.to_vec(),
            },
        )?;
        if let Some(suffix) = &self.reject_suffix {
            if item.ends_with(suffix) {
                return Err(rejected());
            }
        }
        let receipt = self.receipt(&item);
        let mut state = self.state.lock().unwrap();
        state.headers.push(headers.clone());
        state.accepted.push(item);
        Ok(receipt)
    }

    async fn create_chunked_upload(&self, _token: &str, chunk_size: u64) -> Result<ChunkInfo> {
        self.enter("create", Call::Create { chunk_size })?;
        let mut state = self.state.lock().unwrap();
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(upload_id.clone(), Vec::new());
        Ok(ChunkInfo {
            upload_id,
            min: 1,
            max: u64::MAX,
            chunk_size: self.chunk_size.unwrap_or(chunk_size),
        })
    }

    async fn upload_chunk(
        &self,
        _token: &str,
        upload_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> Result<()> {
        self.enter(
            "chunk",
            Call::Chunk {
                upload_id: upload_id.to_string(),
                offset,
                len: chunk.len(),
            },
        )?;
        let delay = self.state.lock().unwrap().chunk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        let assembled = state
            .uploads
            .get_mut(upload_id)
            .expect("chunk for unknown upload");
        let offset = offset as usize;
        if assembled.len() < offset + chunk.len() {
            assembled.resize(offset + chunk.len(), 0);
        }
        assembled[offset..offset + chunk.len()].copy_from_slice(&chunk);
        Ok(())
    }

    async fn finalize_chunked_upload(
        &self,
        _token: &str,
        upload_id: &str,
        paid_by: &[String],
    ) -> Result<()> {
        self.enter(
            "finalize",
            Call::Finalize {
                upload_id: upload_id.to_string(),
                paid_by: paid_by.to_vec(),
            },
        )
    }

    async fn chunked_upload_status(&self, _token: &str, upload_id: &str) -> Result<MultiPartStatus> {
        self.enter(
            "status",
            Call::Status {
                upload_id: upload_id.to_string(),
            },
        )?;
        if let Some(next) = self.state.lock().unwrap().statuses.pop_front() {
            return Ok(next);
        }
        let item = self.state.lock().unwrap().uploads[upload_id].clone();
        let receipt = self.receipt(&item);
        self.state.lock().unwrap().accepted.push(Bytes::from(item));
        Ok(MultiPartStatus {
            status: ChunkedUploadStatus::Finalized,
            receipt: Some(receipt),
            failed_reason: None,
        })
    }

    async fn transaction_status(&self, id: &str) -> Result<TransactionStatus> {
        self.enter(
            "transaction_status",
            Call::TransactionStatus { id: id.to_string() },
        )?;
        Ok(TransactionStatus {
            status: "CONFIRMED".to_string(),
            bundle_id: Some("bundle".to_string()),
            info: None,
        })
    }

    async fn service_info(&self) -> Result<ServiceInfo> {
        self.enter("info", Call::Info)?;
        Ok(ServiceInfo {
            version: "0.2.0".to_string(),
            gateway: "arweave.net".to_string(),
            addresses: BTreeMap::new(),
            free_upload_limit_bytes: 107_520,
        })
    }

    async fn list_credit_shares(&self, user_address: &str) -> Result<CreditShareApprovals> {
        self.enter(
            "credit_shares",
            Call::CreditShares {
                user_address: user_address.to_string(),
            },
        )?;
        Ok(self.approvals_for(user_address))
    }

    async fn credit_approvals(&self, user_address: &str) -> Result<CreditShareApprovals> {
        self.enter(
            "credit_approvals",
            Call::CreditApprovals {
                user_address: user_address.to_string(),
            },
        )?;
        let mut approvals = self.approvals_for(user_address);
        approvals.given_approvals.clear();
        Ok(approvals)
    }
}

/// Records every callback for later inspection
#[derive(Default)]
pub struct RecordingEvents {
    pub progress: Mutex<Vec<UploadProgress>>,
    pub errors: Mutex<Vec<String>>,
    pub successes: Mutex<u32>,
}

impl RecordingEvents {
    pub fn steps(&self) -> Vec<UploadStep> {
        let mut steps: Vec<UploadStep> = Vec::new();
        for progress in self.progress.lock().unwrap().iter() {
            if steps.last() != Some(&progress.step) {
                steps.push(progress.step);
            }
        }
        steps
    }
}

impl UploadEvents for RecordingEvents {
    fn on_progress(&self, progress: &UploadProgress) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_error(&self, error: &ClientError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_success(&self) {
        *self.successes.lock().unwrap() += 1;
    }
}
