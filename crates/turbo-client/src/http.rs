//! reqwest implementation of [`UploadApi`]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use turbo_core::SignatureHeaders;
use url::Url;

use crate::api::{
    ChunkInfo, CreditShareApprovals, MultiPartStatus, ServiceInfo, TransactionStatus, UploadApi,
    UploadReceipt, CHUNKING_VERSION, CHUNKING_VERSION_HEADER, PAID_BY_HEADER,
};
use crate::config::TurboConfig;
use crate::error::{ClientError, Result};

const OCTET_STREAM: &str = "application/octet-stream";

/// Upload service client over a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpUploadApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpUploadApi {
    pub fn new(config: &TurboConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.socket_timeout())
            .user_agent(concat!("turbo-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, config.upload_url()?))
    }

    /// Reuse an existing client, e.g. one shared with other services
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn chunked(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(CHUNKING_VERSION_HEADER, CHUNKING_VERSION)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(%url, status = status.as_u16(), %body, "upload service rejected request");
        Err(ClientError::Http {
            status: status.as_u16(),
            url,
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Approval listings; an address the service has never seen has none
    async fn send_approvals(
        &self,
        path: &str,
        user_address: &str,
    ) -> Result<CreditShareApprovals> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().append_pair("userAddress", user_address);
        match self.send_json(self.http.get(url)).await {
            Err(ClientError::Http { status: 404, .. }) => Ok(CreditShareApprovals::default()),
            other => other,
        }
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        let response = self.send(request).await?;
        response.bytes().await?;
        Ok(())
    }
}

fn with_paid_by(request: RequestBuilder, paid_by: &[String]) -> RequestBuilder {
    if paid_by.is_empty() {
        request
    } else {
        request.header(PAID_BY_HEADER, paid_by.join(","))
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn upload_data_item(
        &self,
        token: &str,
        item: Bytes,
        headers: &SignatureHeaders,
        paid_by: &[String],
    ) -> Result<UploadReceipt> {
        let url = self.url(&format!("v1/tx/{token}"))?;
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(item);
        for (name, value) in headers.header_pairs() {
            request = request.header(name, value);
        }
        self.send_json(with_paid_by(request, paid_by)).await
    }

    async fn create_chunked_upload(&self, token: &str, chunk_size: u64) -> Result<ChunkInfo> {
        let mut url = self.url(&format!("v1/chunks/{token}/-1/-1"))?;
        url.query_pairs_mut()
            .append_pair("chunkSize", &chunk_size.to_string());
        self.send_json(self.chunked(self.http.post(url))).await
    }

    async fn upload_chunk(
        &self,
        token: &str,
        upload_id: &str,
        offset: u64,
        chunk: Bytes,
    ) -> Result<()> {
        let url = self.url(&format!("v1/chunks/{token}/{upload_id}/{offset}"))?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(chunk);
        self.send_empty(self.chunked(request)).await
    }

    async fn finalize_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
        paid_by: &[String],
    ) -> Result<()> {
        let url = self.url(&format!("v1/chunks/{token}/{upload_id}/finalize"))?;
        let request = with_paid_by(self.chunked(self.http.post(url)), paid_by);
        self.send_empty(request).await
    }

    async fn chunked_upload_status(&self, token: &str, upload_id: &str) -> Result<MultiPartStatus> {
        let url = self.url(&format!("v1/chunks/{token}/{upload_id}/status"))?;
        self.send_json(self.chunked(self.http.get(url))).await
    }

    async fn transaction_status(&self, id: &str) -> Result<TransactionStatus> {
        let url = self.url(&format!("v1/tx/{id}/status"))?;
        self.send_json(self.http.get(url)).await
    }

    async fn service_info(&self) -> Result<ServiceInfo> {
        let url = self.url("v1/info")?;
        self.send_json(self.http.get(url)).await
    }

    async fn list_credit_shares(&self, user_address: &str) -> Result<CreditShareApprovals> {
        self.send_approvals("v1/account/approvals/all", user_address)
            .await
    }

    async fn credit_approvals(&self, user_address: &str) -> Result<CreditShareApprovals> {
        self.send_approvals("v1/account/approvals/get", user_address)
            .await
    }
}
