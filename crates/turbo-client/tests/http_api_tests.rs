//! Wire format of HttpUploadApi against a mock upload service

mod common;

use std::net::TcpListener;

use common::{fast_config, test_signer};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use turbo_client::{
    ChunkedUploadStatus, ClientError, CreditShareApprovals, EventSink, HttpUploadApi,
    TurboClient, TurboConfig, UploadApi,
};
use turbo_core::{ChunkingMode, DataItemOptions, DEFAULT_CHUNK_BYTE_COUNT};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn config(server: &MockServer) -> TurboConfig {
    TurboConfig {
        upload_base_url: server.base_url(),
        ..fast_config()
    }
}

fn receipt_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "owner": "owner-address",
        "dataCaches": ["arweave.net"],
        "fastFinalityIndexes": ["arweave.net"],
        "winc": "0",
        "timestamp": 1700000000000u64,
        "deadlineHeight": 1500000
    })
}

#[tokio::test]
async fn test_direct_upload_request_shape() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/tx/arweave")
            .header("content-type", "application/octet-stream")
            .header("x-paid-by", "payer-one,payer-two")
            .header_exists("x-public-key")
            .header_exists("x-nonce")
            .header_exists("x-signature");
        then.status(200).json_body(receipt_json("direct-id"));
    });

    let client = TurboClient::new(config(&server), test_signer()).unwrap();
    let options = DataItemOptions::new()
        .with_paid_by("payer-one")
        .with_paid_by("payer-two");
    let receipt = client
        .upload_data_item(b"over the wire", Some("text/plain"), options, &EventSink::none())
        .await
        .unwrap();

    upload.assert();
    assert_eq!(receipt.id, "direct-id");
    assert_eq!(receipt.deadline_height, Some(1_500_000));
    assert!(receipt.data_caches.contains("arweave.net"));
}

#[tokio::test]
async fn test_chunked_upload_request_sequence() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let init = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chunks/arweave/-1/-1")
            .query_param("chunkSize", DEFAULT_CHUNK_BYTE_COUNT.to_string())
            .header("x-chunking-version", "2");
        then.status(200).json_body(json!({
            "id": "up-1",
            "min": 1,
            "max": 10000,
            "chunkSize": DEFAULT_CHUNK_BYTE_COUNT
        }));
    });
    let chunk = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chunks/arweave/up-1/0")
            .header("x-chunking-version", "2")
            .header("content-type", "application/octet-stream");
        then.status(200);
    });
    let finalize = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chunks/arweave/up-1/finalize")
            .header("x-chunking-version", "2");
        then.status(202);
    });
    let status = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/chunks/arweave/up-1/status")
            .header("x-chunking-version", "2");
        then.status(200).json_body(json!({
            "status": "FINALIZED",
            "receipt": receipt_json("chunked-id")
        }));
    });

    let config = TurboConfig {
        chunking_mode: ChunkingMode::Force,
        ..config(&server)
    };
    let client = TurboClient::new(config, test_signer()).unwrap();
    let receipt = client
        .upload_data_item(b"chunked body", None, DataItemOptions::new(), &EventSink::none())
        .await
        .unwrap();

    init.assert();
    chunk.assert();
    finalize.assert();
    status.assert();
    assert_eq!(receipt.id, "chunked-id");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST).path("/v1/tx/arweave");
        then.status(503).body("try later");
    });

    let client = TurboClient::new(config(&server), test_signer()).unwrap();
    let err = client
        .upload_data_item(b"unlucky", None, DataItemOptions::new(), &EventSink::none())
        .await
        .unwrap_err();

    upload.assert_hits(4);
    match err {
        ClientError::RetriesExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, ClientError::Http { status: 503, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_client_errors_fail_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST).path("/v1/tx/arweave");
        then.status(400).body("invalid data item");
    });

    let client = TurboClient::new(config(&server), test_signer()).unwrap();
    let err = client
        .upload_data_item(b"rejected", None, DataItemOptions::new(), &EventSink::none())
        .await
        .unwrap_err();

    upload.assert_hits(1);
    match err {
        ClientError::Http { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "invalid data item");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_status_and_info_endpoints() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/tx/item-1/status");
        then.status(200).json_body(json!({
            "status": "FINALIZED",
            "bundleId": "bundle-9"
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/chunks/arweave/up-2/status");
        then.status(200).json_body(json!({ "status": "VALIDATING" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/info");
        then.status(200).json_body(json!({
            "version": "0.2.0",
            "gateway": "https://arweave.net",
            "addresses": { "arweave": "bundler-address" },
            "freeUploadLimitBytes": 107520
        }));
    });

    let api = HttpUploadApi::new(&config(&server)).unwrap();

    let tx = api.transaction_status("item-1").await.unwrap();
    assert_eq!(tx.status, "FINALIZED");
    assert_eq!(tx.bundle_id.as_deref(), Some("bundle-9"));

    let multipart = api.chunked_upload_status("arweave", "up-2").await.unwrap();
    assert_eq!(multipart.status, ChunkedUploadStatus::Pending);
    assert!(multipart.receipt.is_none());

    let info = api.service_info().await.unwrap();
    assert_eq!(info.free_upload_limit_bytes, 107_520);
    assert_eq!(info.addresses["arweave"], "bundler-address");
}

#[tokio::test]
async fn test_credit_share_listing() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let all = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/account/approvals/all")
            .query_param("userAddress", "payer-address");
        then.status(200).json_body(json!({
            "givenApprovals": [{
                "approvalDataItemId": "approval-1",
                "approvedAddress": "friend-address",
                "payingAddress": "payer-address",
                "approvedWincAmount": "5000",
                "usedWincAmount": "120",
                "creationDate": "2024-01-01T00:00:00.000Z",
                "expirationDate": "2024-01-02T00:00:00.000Z"
            }]
        }));
    });

    let api = HttpUploadApi::new(&config(&server)).unwrap();
    let shares = api.list_credit_shares("payer-address").await.unwrap();

    all.assert();
    assert_eq!(shares.given_approvals.len(), 1);
    assert!(shares.received_approvals.is_empty());
    let approval = &shares.given_approvals[0];
    assert_eq!(approval.approved_address, "friend-address");
    assert_eq!(approval.used_winc_amount, "120");
    assert_eq!(
        approval.expiration_date.as_deref(),
        Some("2024-01-02T00:00:00.000Z")
    );
}

#[tokio::test]
async fn test_unknown_address_has_no_approvals() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/account/approvals/get")
            .query_param("userAddress", "stranger");
        then.status(404).body("no approvals");
    });

    let api = HttpUploadApi::new(&config(&server)).unwrap();
    let approvals = api.credit_approvals("stranger").await.unwrap();

    get.assert();
    assert_eq!(approvals, CreditShareApprovals::default());
}
