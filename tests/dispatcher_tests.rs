use std::cell::RefCell;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use invoice_ledger_bot::bot::{
    Attachment, ChatKind, Dispatcher, FileSource, InboundMessage, Sender, TransportError, replies,
};
use invoice_ledger_bot::cloud_adapters::{
    CloudSpreadsheetService, MemoryAttachmentStore, MemorySheetsAdapter,
};
use invoice_ledger_bot::config::Config;
use invoice_ledger_bot::core::ledger::COLUMNS;
use invoice_ledger_bot::core::{InvoiceStatus, LedgerRow, SlidingWindowGuard, TransactionType};

const GROUP_ID: i64 = -1001;
const SHEET: &str = "sheet-pusat";

const CONFIG: &str = r#"
[[groups]]
id = -1001
name = "Toko Pusat"
spreadsheet_id = "sheet-pusat"
drive_folder_id = "folder-pusat"
notification_topic_id = 9

[[groups]]
id = -1002
name = "Cabang"
spreadsheet_id = "sheet-cabang"
"#;

/// Serves the same bytes for every file id and records what was asked for.
#[derive(Default)]
struct StaticFiles {
    requested: RefCell<Vec<String>>,
    fail: bool,
}

impl FileSource for StaticFiles {
    fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.requested.borrow_mut().push(file_id.to_string());
        if self.fail {
            return Err(TransportError::Http("connection reset".into()));
        }
        Ok(b"scan".to_vec())
    }
}

type TestDispatcher = Dispatcher<MemorySheetsAdapter, MemoryAttachmentStore>;

fn dispatcher() -> TestDispatcher {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let mut sheets = MemorySheetsAdapter::new();
    sheets.add_sheet_with_header(SHEET, &COLUMNS);
    sheets.add_sheet_with_header("sheet-cabang", &COLUMNS);
    Dispatcher::new(config, sheets, MemoryAttachmentStore::new()).unwrap()
}

fn sender() -> Sender {
    Sender {
        id: 42,
        username: Some("budi".into()),
        first_name: "Budi".into(),
        last_name: None,
    }
}

fn text(body: &str) -> InboundMessage {
    InboundMessage {
        message_id: 10,
        chat_id: GROUP_ID,
        chat_kind: ChatKind::Supergroup,
        thread_id: None,
        sender: sender(),
        text: Some(body.to_string()),
        attachment: None,
        date: Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap(),
    }
}

fn with_file(caption: &str) -> InboundMessage {
    let mut msg = text(caption);
    msg.attachment = Some(Attachment {
        file_id: "file-1".into(),
        file_name: Some("nota.pdf".into()),
        mime: Some("application/pdf".into()),
        size: Some(4),
        is_photo: false,
    });
    msg
}

fn reply_texts(d: &mut TestDispatcher, msg: &InboundMessage, files: &StaticFiles) -> Vec<String> {
    d.handle(msg, files).into_iter().map(|m| m.text).collect()
}

fn purchase_caption(invoice: &str, supplier: &str, amount: &str) -> String {
    format!(
        "/pembelian\nTanggal: 01/06/2024\nNo. INV: {invoice}\nKeterangan: Bahan baku\nSupplier: {supplier}\nNominal: {amount}\nNo. Rekening Tujuan: 123\nNama Rekening Tujuan: Andi"
    )
}

fn stored_row(d: &TestDispatcher, row: usize) -> LedgerRow {
    LedgerRow::from_cells(row, &d.sheets().read_row(SHEET, row).unwrap())
}

#[test]
fn purchase_then_settlement() {
    let mut d = dispatcher();
    let files = StaticFiles::default();

    let msg = with_file(&purchase_caption("PB-1", "Toko A", "Rp 1.500.000"));
    let out = d.handle(&msg, &files);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].reply_to, Some(10));
    assert!(out[0].text.starts_with("✅ PEMBELIAN dari Toko A sebesar Rp 1.500.000"));

    let row = stored_row(&d, 2);
    assert_eq!(row.kind, Some(TransactionType::Purchase));
    assert_eq!(row.amount, 1_500_000);
    assert_eq!(row.status, Some(InvoiceStatus::Unpaid));
    assert_eq!(row.submitter, "@budi");
    assert!(row.proof.is_empty());
    let upload = &d.attachments().uploads()[0];
    assert_eq!(upload.folder_id, "folder-pusat");
    assert_eq!(upload.name, "B.01-06-2024.PB-1.Toko-A-Toko-Pusat-INV.pdf");
    assert!(row.attachment.contains(&upload.url));

    let mut settle = with_file("/pelunasan\nPB-1");
    settle.sender.username = Some("sari".into());
    let out = reply_texts(&mut d, &settle, &files);
    assert_eq!(out, vec!["✅ Invoice PB-1 berhasil dilunasi.".to_string()]);

    let settled = stored_row(&d, 2);
    assert_eq!(settled.status, Some(InvoiceStatus::Paid));
    assert!(settled.proof.contains("B.01-06-2024.PB-1.Toko-A-Toko-Pusat-TF.pdf"));
    assert!(settled.update_stamp.starts_with("@sari ("));
    assert_eq!(settled.amount, row.amount);
    assert_eq!(settled.invoice_number, row.invoice_number);
    assert_eq!(settled.attachment, row.attachment);
    assert_eq!(settled.input_stamp, row.input_stamp);

    let again = reply_texts(&mut d, &settle, &files);
    assert_eq!(again, vec!["❌ Invoice PB-1 sudah berstatus LUNAS.".to_string()]);
}

#[test]
fn duplicate_invoice_is_refused_without_upload() {
    let mut d = dispatcher();
    let files = StaticFiles::default();
    let msg = with_file(&purchase_caption("PB-1", "Toko A", "1000"));
    d.handle(&msg, &files);
    let out = reply_texts(&mut d, &msg, &files);
    assert_eq!(
        out,
        vec!["❌ No. INV: PB-1 sudah ada pada baris ke-2".to_string()]
    );
    assert_eq!(d.attachments().uploads().len(), 1);
    assert_eq!(d.sheets().row_count(SHEET), 2);
}

#[test]
fn advertisement_is_recorded_without_attachment() {
    let mut d = dispatcher();
    let files = StaticFiles::default();
    let msg = with_file(
        "/iklan\nTanggal: 01/06/2024\nNo. VA: 8800\nKeterangan: Iklan Juni\nSupplier: Meta\nNominal: 250000",
    );
    let out = reply_texts(&mut d, &msg, &files);
    assert!(out[0].starts_with("✅ IKLAN dari Meta"));
    assert!(files.requested.borrow().is_empty());
    let row = stored_row(&d, 2);
    assert!(row.is_advertisement);
    assert!(row.attachment.is_empty());

    let early = reply_texts(&mut d, &with_file("/invoiceiklan\nNo. VA: 8800"), &files);
    assert_eq!(
        early,
        vec!["❌ Iklan dengan No. VA 8800 tidak ditemukan atau belum dilunasi.".to_string()]
    );

    let paid = reply_texts(&mut d, &with_file("/pelunasan\n8800"), &files);
    assert!(paid[0].contains("@budi, silakan kirim invoice iklan"));

    let attached = reply_texts(&mut d, &with_file("/invoiceiklan\nNo. VA: 8800"), &files);
    assert_eq!(
        attached,
        vec!["✅ Invoice iklan No. VA 8800 berhasil dilampirkan.".to_string()]
    );
    assert!(!stored_row(&d, 2).attachment.is_empty());
}

#[test]
fn batch_settlement_is_all_or_nothing() {
    let mut d = dispatcher();
    let files = StaticFiles::default();
    for (inv, supplier) in [("A", "Toko A"), ("B", "Toko B"), ("C", "Toko A")] {
        d.handle(&with_file(&purchase_caption(inv, supplier, "100")), &files);
    }
    let uploads_before = d.attachments().uploads().len();

    let out = reply_texts(&mut d, &with_file("/pelunasanmassal\nA\nB\nC"), &files);
    assert!(out[0].starts_with("❌ Pelunasan massal gagal karena:"));
    assert!(out[0].contains("Invoice B supplier Toko B berbeda dengan Toko A"));
    assert_eq!(d.attachments().uploads().len(), uploads_before);
    for row in 2..=4 {
        assert_eq!(stored_row(&d, row).status, Some(InvoiceStatus::Unpaid));
    }

    let out = reply_texts(&mut d, &with_file("/pelunasanmassal\nA\nC"), &files);
    assert_eq!(
        out,
        vec!["✅ Berhasil melunasi 2 invoice (Rp 200): A, C".to_string()]
    );
    let proof = d.attachments().uploads().last().unwrap();
    assert_eq!(proof.name, "B.01-06-2024.REKAP-PEMBAYARAN.Toko-A-Toko-Pusat-TF.pdf");
    assert_eq!(stored_row(&d, 2).proof, stored_row(&d, 4).proof);
}

#[test]
fn caption_problems_are_reported() {
    let mut d = dispatcher();
    let files = StaticFiles::default();

    let mut no_caption = with_file("");
    no_caption.text = None;
    assert_eq!(
        reply_texts(&mut d, &no_caption, &files),
        vec![replies::MISSING_CAPTION.to_string()]
    );
    assert_eq!(
        reply_texts(&mut d, &with_file("/bayar\nPB-1"), &files),
        vec![replies::unknown_command("/bayar")]
    );
    assert_eq!(
        reply_texts(&mut d, &with_file("tolong dicatat"), &files),
        vec![replies::INVALID_FORMAT.to_string()]
    );
    assert_eq!(
        reply_texts(
            &mut d,
            &with_file("/pembelian\nTanggal: 01/06/2024\nNo. INV: X\nKeterangan: y\nSupplier: z"),
            &files
        ),
        vec!["❌ Nominal tidak boleh kosong!".to_string()]
    );

    let mut big = with_file(&purchase_caption("PB-9", "Toko A", "1000"));
    if let Some(a) = big.attachment.as_mut() {
        a.size = Some(11 * 1024 * 1024);
    }
    assert_eq!(
        reply_texts(&mut d, &big, &files),
        vec!["❌ Ukuran file terlalu besar (11.0 MB). Maksimal 10 MB.".to_string()]
    );
    assert_eq!(d.sheets().row_count(SHEET), 1);
}

#[test]
fn text_commands() {
    let mut d = dispatcher();
    let files = StaticFiles::default();
    assert_eq!(
        reply_texts(&mut d, &text("/pembelian\nTanggal: 01/06/2024"), &files),
        vec!["❌ Perintah /pembelian harus menyertakan lampiran file/gambar.".to_string()]
    );
    assert_eq!(
        reply_texts(&mut d, &text("/linksheet"), &files),
        vec!["📊 Link Spreadsheet Toko Pusat:\nhttps://docs.google.com/spreadsheets/d/sheet-pusat".to_string()]
    );
    assert_eq!(
        reply_texts(&mut d, &text("/belumlunas"), &files),
        vec![replies::NO_PENDING.to_string()]
    );
    assert_eq!(
        reply_texts(&mut d, &text("/help@LedgerBot"), &files),
        vec![replies::HELP.to_string()]
    );
    assert!(reply_texts(&mut d, &text("selamat pagi"), &files).is_empty());

    let mut cabang = text("/linkdrive");
    cabang.chat_id = -1002;
    assert_eq!(
        reply_texts(&mut d, &cabang, &files),
        vec![replies::NOT_LINKED.to_string()]
    );
}

#[test]
fn rate_guard_blocks_bursts() {
    let mut d = dispatcher().with_guard(SlidingWindowGuard::new(1, Duration::from_secs(3600)));
    let files = StaticFiles::default();
    d.handle(&with_file(&purchase_caption("PB-1", "Toko A", "1000")), &files);
    let out = reply_texts(&mut d, &with_file(&purchase_caption("PB-2", "Toko A", "1000")), &files);
    assert_eq!(out, vec![replies::RATE_LIMITED.to_string()]);
    assert_eq!(d.sheets().row_count(SHEET), 2);
}

#[test]
fn transfer_failures_leave_ledger_untouched() {
    let mut d = dispatcher();
    let failing = StaticFiles {
        fail: true,
        ..Default::default()
    };
    let out = reply_texts(&mut d, &with_file(&purchase_caption("PB-1", "Toko A", "1000")), &failing);
    assert_eq!(out, vec![replies::GENERIC_FAILURE.to_string()]);
    assert_eq!(d.sheets().row_count(SHEET), 1);

    let files = StaticFiles::default();
    let mut store = MemoryAttachmentStore::new();
    store.fail_uploads(true);
    let mut sheets = MemorySheetsAdapter::new();
    sheets.add_sheet_with_header(SHEET, &COLUMNS);
    let mut d = Dispatcher::new(d.config().clone(), sheets, store).unwrap();
    let out = reply_texts(&mut d, &with_file(&purchase_caption("PB-3", "Toko A", "1000")), &files);
    assert_eq!(out, vec![replies::GENERIC_FAILURE.to_string()]);
    assert_eq!(d.sheets().row_count(SHEET), 1);
}

#[test]
fn notifications_go_to_configured_topics() {
    let mut d = dispatcher();
    let files = StaticFiles::default();
    assert!(d.pending_notifications().is_empty());

    d.handle(&with_file(&purchase_caption("PB-1", "Toko A", "1000")), &files);
    d.handle(&with_file(&purchase_caption("PB-2", "Toko B", "2000")), &files);
    let out = d.pending_notifications();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chat_id, GROUP_ID);
    assert_eq!(out[0].thread_id, Some(9));
    assert_eq!(out[0].reply_to, None);
    assert!(out[0].text.contains("📍 Grup: Toko Pusat"));
    assert!(out[0].text.contains("TOTAL KESELURUHAN: Rp 3.000"));
    let a = out[0].text.find("👨‍💼 Toko A").unwrap();
    let b = out[0].text.find("👨‍💼 Toko B").unwrap();
    assert!(a < b);
}
