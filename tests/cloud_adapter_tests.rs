use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use invoice_ledger_bot::bot::{FileSource, OutboundMessage, TelegramClient, TransportError};
use invoice_ledger_bot::cloud_adapters::auth::{AuthError, TokenProvider};
use invoice_ledger_bot::cloud_adapters::google_sheets4::GoogleSheets4Adapter;
use invoice_ledger_bot::cloud_adapters::{
    AttachmentStore, CloudSpreadsheetService, FileAdapter, FolderAttachmentStore,
    GoogleDriveStore, MemorySheetsAdapter, SpreadsheetError, UploadError,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticToken;

impl TokenProvider for StaticToken {
    fn token<'a>(
        &'a self,
        _scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>> {
        Box::pin(async { Ok("test-token".to_string()) })
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("ledger-bot-{}", Uuid::new_v4()))
}

#[test]
fn memory_rows_are_one_based() {
    let mut sheets = MemorySheetsAdapter::new();
    sheets.add_sheet_with_header("s", &["A", "B"]);
    assert_eq!(sheets.append_row("s", vec!["1".into(), "2".into()]).unwrap(), 2);
    assert_eq!(sheets.read_row("s", 2).unwrap(), vec!["1", "2"]);
    assert_eq!(sheets.read_row("s", 0), Err(SpreadsheetError::RowNotFound));
    assert_eq!(sheets.read_row("s", 3), Err(SpreadsheetError::RowNotFound));
    assert_eq!(
        sheets.list_rows("missing"),
        Err(SpreadsheetError::SheetNotFound)
    );
}

#[test]
fn file_adapter_keeps_rows_on_disk() {
    let dir = scratch_dir();
    let mut adapter = FileAdapter::new(&dir);
    assert_eq!(
        adapter.list_rows("ledger"),
        Err(SpreadsheetError::SheetNotFound)
    );
    adapter.ensure_sheet("ledger", &["Tanggal", "No. INV"]).unwrap();
    let row = adapter
        .append_row("ledger", vec!["2024-06-01".into(), "PB-1, revisi".into()])
        .unwrap();
    assert_eq!(row, 2);
    adapter
        .update_row("ledger", 2, vec!["2024-06-02".into(), "PB-1".into()])
        .unwrap();

    let reopened = FileAdapter::new(&dir);
    let rows = reopened.list_rows("ledger").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], vec!["2024-06-02", "PB-1"]);
    // A second ensure must not truncate the ledger.
    reopened.ensure_sheet("ledger", &["x"]).unwrap();
    assert_eq!(reopened.list_rows("ledger").unwrap().len(), 2);
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn folder_store_writes_files() {
    let dir = scratch_dir();
    let mut store = FolderAttachmentStore::new(&dir);
    let url = store
        .upload("grup", "../B.01-06-2024.PB-1.Toko-A-Pusat-INV.pdf", "application/pdf", b"pdf")
        .unwrap();
    let expected = dir.join("grup").join("B.01-06-2024.PB-1.Toko-A-Pusat-INV.pdf");
    assert_eq!(url, format!("file://{}", expected.display()));
    assert_eq!(std::fs::read(&expected).unwrap(), b"pdf");

    let url = store.upload("", "x.jpg", "image/jpeg", b"j").unwrap();
    assert!(url.ends_with("attachments/x.jpg"));
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn sheets_append_returns_landing_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/spreadsheets/sheet-1/values/Transaksi!A:P:append"))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"values": [["2024-06-01", "PB-1"]]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": {"updatedRange": "Transaksi!A7:P7"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let row = tokio::task::spawn_blocking(move || {
        let mut adapter =
            GoogleSheets4Adapter::with_base_url(StaticToken, base, "Transaksi").unwrap();
        adapter
            .append_row("sheet-1", vec!["2024-06-01".into(), "PB-1".into()])
            .unwrap()
    })
    .await
    .unwrap();
    assert_eq!(row, 7);
    server.verify().await;
}

#[tokio::test]
async fn sheets_reads_formulas_and_updates_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/sheet-1/values/Transaksi!A:P"))
        .and(query_param("valueRenderOption", "FORMULA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["Tanggal", "Nominal"], ["2024-06-01", 1500000]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/spreadsheets/sheet-1/values/Transaksi!A2:P2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let rows = tokio::task::spawn_blocking(move || {
        let mut adapter =
            GoogleSheets4Adapter::with_base_url(StaticToken, base, "Transaksi").unwrap();
        let rows = adapter.list_rows("sheet-1").unwrap();
        adapter
            .update_row("sheet-1", 2, vec!["2024-06-01".into(), "1500000".into()])
            .unwrap();
        rows
    })
    .await
    .unwrap();
    assert_eq!(rows[1], vec!["2024-06-01", "1500000"]);
    server.verify().await;
}

#[tokio::test]
async fn sheets_status_codes_map_to_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/gone/values/Transaksi!A:P"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/busy/values/Transaksi!A:P"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let (gone, busy) = tokio::task::spawn_blocking(move || {
        let adapter = GoogleSheets4Adapter::with_base_url(StaticToken, base, "Transaksi").unwrap();
        (
            adapter.list_rows("gone").unwrap_err(),
            adapter.list_rows("busy").unwrap_err(),
        )
    })
    .await
    .unwrap();
    assert_eq!(gone, SpreadsheetError::SheetNotFound);
    assert!(busy.is_retryable());
}

#[tokio::test]
async fn drive_upload_returns_view_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "webViewLink": "https://drive.google.com/file/d/abc/view"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let (link, too_big) = tokio::task::spawn_blocking(move || {
        let mut store = GoogleDriveStore::with_base_url(StaticToken, base).unwrap();
        let link = store
            .upload("folder-1", "B.nota.pdf", "application/pdf", b"pdf")
            .unwrap();
        let big = vec![0u8; 10 * 1024 * 1024 + 1];
        (link, store.upload("folder-1", "big", "x", &big).unwrap_err())
    })
    .await
    .unwrap();
    assert_eq!(link, "https://drive.google.com/file/d/abc/view");
    assert!(matches!(too_big, UploadError::TooLarge { .. }));
    server.verify().await;
}

#[tokio::test]
async fn telegram_polls_replies_and_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botT0KEN/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{
                "update_id": 41,
                "message": {
                    "message_id": 5,
                    "date": 1717210800,
                    "chat": {"id": -100, "type": "group"},
                    "from": {"id": 9, "first_name": "Budi"},
                    "text": "/belumlunas"
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botT0KEN/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": -100,
            "text": "halo",
            "reply_parameters": {"message_id": 5}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botT0KEN/getFile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_id": "f1", "file_path": "documents/nota.pdf"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/botT0KEN/documents/nota.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pdf".to_vec()))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let (messages, bytes) = tokio::task::spawn_blocking(move || {
        let mut client = TelegramClient::with_base_url("T0KEN", base).unwrap();
        let messages = client.get_updates(0).unwrap();
        client
            .send(&OutboundMessage::reply(&messages[0], "halo"))
            .unwrap();
        let bytes = client.download("f1").unwrap();
        (messages, bytes)
    })
    .await
    .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text.as_deref(), Some("/belumlunas"));
    assert_eq!(messages[0].sender.display_name(), "Budi");
    assert_eq!(bytes, b"pdf");
    server.verify().await;
}

#[tokio::test]
async fn telegram_api_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botT0KEN/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let err = tokio::task::spawn_blocking(move || {
        let client = TelegramClient::with_base_url("T0KEN", base).unwrap();
        let msg = OutboundMessage {
            chat_id: 1,
            thread_id: None,
            reply_to: None,
            text: "x".into(),
        };
        client.send(&msg).unwrap_err()
    })
    .await
    .unwrap();
    assert_eq!(
        err,
        TransportError::Api("Bad Request: chat not found".into())
    );
}
