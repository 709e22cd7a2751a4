//! Turbo client facade

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;
use turbo_core::{
    estimate_size, should_chunk, ArweaveSigner, CoreError, DataItemOptions, ManifestBuilder,
    SignedDataItemStreamFactory, StreamFactory, StreamingSignedDataItem, TurboSigner,
    WalletAddress, MANIFEST_CONTENT_TYPE, STREAMING_SIGN_THRESHOLD,
};

use crate::api::{
    CreditShareApproval, CreditShareApprovals, ServiceInfo, TransactionStatus, UploadApi,
    UploadReceipt, APPROVAL_EXPIRES_BY_SECONDS_TAG, REVOKE_CREDITS_TAG, SHARED_WINC_AMOUNT_TAG,
    SHARE_CREDITS_TAG,
};
use crate::cache::ExpiringCell;
use crate::chunked::{ChunkedUploader, MemoryChunkSource, StreamingChunkSource};
use crate::config::TurboConfig;
use crate::error::{ClientError, Result};
use crate::events::{EventSink, UploadStep};
use crate::folder::{FolderUploadOptions, UploadFileDescriptor, UploadFolderResponse};
use crate::http::HttpUploadApi;
use crate::retry::with_retry;

/// Signs data items with one wallet and uploads them to the Turbo upload service
pub struct TurboClient {
    config: TurboConfig,
    signer: Arc<dyn TurboSigner>,
    api: Arc<dyn UploadApi>,
    uploader: ChunkedUploader,
    service_info: ExpiringCell<ServiceInfo>,
}

impl TurboClient {
    pub fn new(config: TurboConfig, signer: Arc<dyn TurboSigner>) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(HttpUploadApi::new(&config)?);
        Ok(Self::with_api(config, signer, api))
    }

    /// Client for the wallet in a JWK document
    pub fn from_wallet_json(json: &str, config: TurboConfig) -> Result<Self> {
        let signer = ArweaveSigner::from_jwk_json(json)?;
        Self::new(config, Arc::new(signer))
    }

    /// Client over any [`UploadApi`] implementation
    pub fn with_api(
        config: TurboConfig,
        signer: Arc<dyn TurboSigner>,
        api: Arc<dyn UploadApi>,
    ) -> Self {
        let uploader = ChunkedUploader::new(Arc::clone(&api), &config);
        let service_info = ExpiringCell::new(config.service_info_ttl());
        Self {
            config,
            signer,
            api,
            uploader,
            service_info,
        }
    }

    pub fn config(&self) -> &TurboConfig {
        &self.config
    }

    pub fn address(&self) -> &WalletAddress {
        self.signer.address()
    }

    /// Sign without uploading, e.g. to upload later with
    /// [`TurboClient::upload_signed_data_item`]
    pub async fn sign_data_item(
        &self,
        data: &[u8],
        options: &DataItemOptions,
    ) -> Result<SignedDataItemStreamFactory> {
        Ok(SignedDataItemStreamFactory::from_bytes(data, self.signer.as_ref(), options).await?)
    }

    /// Sign `payload` and upload it directly or in chunks
    pub async fn upload_data_item(
        &self,
        payload: &[u8],
        content_type: Option<&str>,
        options: DataItemOptions,
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        let options = match content_type {
            Some(content_type) => options.with_content_type(content_type),
            None => options,
        };
        report(events, self.sign_and_upload(payload, options, events).await)
    }

    /// Upload an item signed earlier; it is not signed again on retries
    pub async fn upload_signed_data_item(
        &self,
        item: &SignedDataItemStreamFactory,
        paid_by: &[String],
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        report(events, self.upload_signed(item, paid_by, events).await)
    }

    /// Sign and upload one file, streaming it when it is large enough
    pub async fn upload_file(
        &self,
        file: &UploadFileDescriptor,
        options: DataItemOptions,
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        report(events, self.upload_file_inner(file, options, events).await)
    }

    /// Upload every file, then a manifest mapping their paths to item ids.
    ///
    /// Any failed file aborts the folder before a manifest is built.
    pub async fn upload_folder(
        &self,
        files: Vec<UploadFileDescriptor>,
        options: FolderUploadOptions,
        events: &EventSink,
    ) -> Result<UploadFolderResponse> {
        report(events, self.upload_folder_inner(files, options, events).await)
    }

    /// Status of an item already accepted by the service
    pub async fn transaction_status(&self, id: &str) -> Result<TransactionStatus> {
        with_retry(&self.config.retry_policy, "transaction status", || {
            self.api.transaction_status(id)
        })
        .await
    }

    /// Service metadata, cached for the configured TTL
    pub async fn service_info(&self) -> Result<ServiceInfo> {
        self.service_info
            .get_or_refresh(|| {
                with_retry(&self.config.retry_policy, "service info", || {
                    self.api.service_info()
                })
            })
            .await
    }

    /// Let `approved_address` spend up to `approved_winc_amount` of this
    /// wallet's credits, optionally for `expires_by_seconds` only
    pub async fn share_credits(
        &self,
        approved_address: &str,
        approved_winc_amount: &str,
        expires_by_seconds: Option<u64>,
    ) -> Result<CreditShareApproval> {
        if approved_address.trim().is_empty() {
            return Err(validation("approved address must not be blank"));
        }
        if !matches!(approved_winc_amount.parse::<u128>(), Ok(amount) if amount > 0) {
            return Err(validation(format!(
                "approved winc amount must be a positive integer, got {approved_winc_amount:?}"
            )));
        }
        if expires_by_seconds == Some(0) {
            return Err(validation("approval expiry must be positive"));
        }

        let mut options = DataItemOptions::new()
            .with_tag(SHARE_CREDITS_TAG, approved_address)
            .with_tag(SHARED_WINC_AMOUNT_TAG, approved_winc_amount);
        if let Some(seconds) = expires_by_seconds {
            options = options.with_tag(APPROVAL_EXPIRES_BY_SECONDS_TAG, seconds.to_string());
        }
        let payload = format!("{approved_address}{approved_winc_amount}{}", now_millis());
        let receipt = self
            .sign_and_upload(payload.as_bytes(), options, &EventSink::none())
            .await?;
        let approval = receipt.created_approval.ok_or_else(|| {
            ClientError::ProtocolViolation(format!(
                "receipt {} has no created approval",
                receipt.id
            ))
        })?;
        info!(
            approved = %approval.approved_address,
            winc = %approval.approved_winc_amount,
            "credits shared"
        );
        Ok(approval)
    }

    /// Withdraw every approval this wallet gave `revoked_address`
    pub async fn revoke_credits(&self, revoked_address: &str) -> Result<Vec<CreditShareApproval>> {
        if revoked_address.trim().is_empty() {
            return Err(validation("revoked address must not be blank"));
        }
        let options = DataItemOptions::new().with_tag(REVOKE_CREDITS_TAG, revoked_address);
        let payload = format!("{revoked_address}{}", now_millis());
        let receipt = self
            .sign_and_upload(payload.as_bytes(), options, &EventSink::none())
            .await?;
        let revoked = receipt.revoked_approvals.ok_or_else(|| {
            ClientError::ProtocolViolation(format!(
                "receipt {} has no revoked approvals",
                receipt.id
            ))
        })?;
        info!(revoked = %revoked_address, count = revoked.len(), "credit shares revoked");
        Ok(revoked)
    }

    /// Every approval given or received by `user_address`, this wallet by default
    pub async fn list_credit_shares(
        &self,
        user_address: Option<&str>,
    ) -> Result<CreditShareApprovals> {
        let user_address = user_address.unwrap_or_else(|| self.address().as_str());
        with_retry(&self.config.retry_policy, "list credit shares", || {
            self.api.list_credit_shares(user_address)
        })
        .await
    }

    /// Approvals `user_address` can currently spend, this wallet by default
    pub async fn credit_approvals(
        &self,
        user_address: Option<&str>,
    ) -> Result<CreditShareApprovals> {
        let user_address = user_address.unwrap_or_else(|| self.address().as_str());
        with_retry(&self.config.retry_policy, "credit approvals", || {
            self.api.credit_approvals(user_address)
        })
        .await
    }

    async fn sign_and_upload(
        &self,
        payload: &[u8],
        options: DataItemOptions,
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        events.progress(UploadStep::Signing, 0, payload.len() as u64);
        let item = self.sign_data_item(payload, &options).await?;
        self.upload_signed(&item, &options.paid_by, events).await
    }

    async fn upload_signed(
        &self,
        item: &SignedDataItemStreamFactory,
        paid_by: &[String],
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        let size = item.size();
        if should_chunk(
            self.config.chunking_mode,
            self.config.chunking_threshold(),
            size,
        ) {
            info!(size, "uploading data item in chunks");
            let mut source = MemoryChunkSource::from(item);
            return self.uploader.upload(&mut source, paid_by, events).await;
        }

        events.progress(UploadStep::Uploading, 0, size);
        let receipt = with_retry(&self.config.retry_policy, "upload data item", || async {
            let headers = self.signer.generate_signature_headers().await?;
            self.api
                .upload_data_item(&self.config.token, item.bytes(), &headers, paid_by)
                .await
        })
        .await?;
        info!(id = %receipt.id, size, "data item uploaded");
        Ok(receipt)
    }

    async fn upload_file_inner(
        &self,
        file: &UploadFileDescriptor,
        options: DataItemOptions,
        events: &EventSink,
    ) -> Result<UploadReceipt> {
        let mut options = options.with_content_type(&file.content_type);
        options.tags.extend(file.tags.iter().cloned());

        let size_factory = file.size_factory.clone();
        let size = tokio::task::spawn_blocking(move || size_factory()).await??;
        let signed_size = estimate_size(size, &options, self.signer.as_ref())?;
        let chunked = should_chunk(
            self.config.chunking_mode,
            self.config.chunking_threshold(),
            signed_size,
        );

        if chunked && size >= STREAMING_SIGN_THRESHOLD {
            events.progress(UploadStep::Signing, 0, size);
            let item = StreamingSignedDataItem::sign(
                file.stream_factory.clone(),
                size,
                self.signer.as_ref(),
                &options,
            )
            .await?;
            info!(path = %file.path, id = %item.id(), size = item.size(), "uploading streamed file in chunks");
            let mut source = StreamingChunkSource::new(&item);
            return self.uploader.upload(&mut source, &options.paid_by, events).await;
        }

        let data = read_all(file.stream_factory.clone()).await?;
        if data.len() as u64 != size {
            return Err(ClientError::Core(CoreError::Validation(format!(
                "{} produced {} bytes, size factory reported {size}",
                file.path,
                data.len()
            ))));
        }
        self.sign_and_upload(&data, options, events).await
    }

    async fn upload_folder_inner(
        &self,
        files: Vec<UploadFileDescriptor>,
        options: FolderUploadOptions,
        events: &EventSink,
    ) -> Result<UploadFolderResponse> {
        if files.is_empty() {
            return Err(ClientError::Core(CoreError::Validation(
                "folder upload needs at least one file".to_string(),
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = files.iter().find(|file| !seen.insert(file.path.as_str())) {
            return Err(ClientError::Core(CoreError::Validation(format!(
                "duplicate path {} in folder",
                duplicate.path
            ))));
        }

        let concurrency = options
            .max_concurrency
            .unwrap_or(self.config.max_concurrency)
            .max(1);
        info!(files = files.len(), concurrency, "uploading folder");

        let paid_by = &options.paid_by;
        let uploads = files.iter().enumerate().map(|(position, file)| async move {
            let file_options = DataItemOptions {
                paid_by: paid_by.clone(),
                ..DataItemOptions::new()
            };
            let receipt = self
                .upload_file_inner(file, file_options, events)
                .await
                .map_err(|err| ClientError::FolderUpload {
                    path: file.path.clone(),
                    source: Box::new(err),
                })?;
            Ok::<_, ClientError>((position, file.path.clone(), receipt))
        });
        let mut uploaded: Vec<_> = stream::iter(uploads)
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;
        uploaded.sort_by_key(|(position, _, _)| *position);
        let file_receipts: Vec<_> = uploaded
            .into_iter()
            .map(|(_, path, receipt)| (path, receipt))
            .collect();

        if !options.manifest_enabled {
            return Ok(UploadFolderResponse {
                file_receipts,
                manifest: None,
                manifest_receipt: None,
            });
        }

        let mut builder = ManifestBuilder::new();
        for (path, receipt) in &file_receipts {
            builder.add_path(path.as_str(), receipt.id.as_str());
        }
        if let Some(index) = &options.index_file {
            builder.index(index.as_str());
        }
        if let Some(fallback) = &options.fallback_file {
            builder.fallback(fallback.as_str());
        }
        let manifest = builder.build()?;

        let mut manifest_options = DataItemOptions::new().with_content_type(MANIFEST_CONTENT_TYPE);
        manifest_options
            .tags
            .extend(options.manifest_tags.iter().cloned());
        manifest_options.paid_by = options.paid_by.clone();
        let manifest_receipt = self
            .sign_and_upload(&manifest.to_json_bytes()?, manifest_options, events)
            .await?;
        info!(
            id = %manifest_receipt.id,
            index = %manifest.index.path,
            paths = manifest.paths.len(),
            "folder manifest uploaded"
        );

        Ok(UploadFolderResponse {
            file_receipts,
            manifest: Some(manifest),
            manifest_receipt: Some(manifest_receipt),
        })
    }
}

fn validation(message: impl Into<String>) -> ClientError {
    ClientError::Core(CoreError::Validation(message.into()))
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

async fn read_all(factory: StreamFactory) -> Result<Vec<u8>> {
    let data = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        factory()?.read_to_end(&mut data)?;
        Ok(data)
    })
    .await??;
    Ok(data)
}

fn report<T>(events: &EventSink, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => events.success(),
        Err(err) => events.error(err),
    }
    result
}
