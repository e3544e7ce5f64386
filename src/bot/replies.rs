//! Reply texts and attachment file names.

use crate::core::ledger::LedgerRow;
use crate::core::pending::PendingReport;
use crate::core::reconcile::{BatchIssue, BatchOutcome, ReconcileError};
use crate::core::{TransactionKind, TransactionRecord, format_rupiah};
use crate::parser::{CommandKind, ParseError};

/// Longest message the chat service accepts, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

pub const START: &str =
    "📊 BOT Transaksi siap digunakan! Ketik /help untuk melihat daftar perintah.";
pub const ACCESS_DENIED: &str = "⛔ Maaf, Anda tidak memiliki akses untuk menggunakan bot ini.";
pub const RATE_LIMITED: &str = "⚠️ Terlalu banyak transaksi dalam waktu singkat. Mohon tunggu beberapa saat sebelum mencoba lagi.";
pub const MISSING_CAPTION: &str = "Mohon sertakan data transaksi dalam caption file.";
pub const GENERIC_FAILURE: &str = "❌ Terjadi kesalahan saat menyimpan data. Silakan coba lagi.";
pub const NO_PENDING: &str = "✅ Tidak ada invoice pembelian yang belum lunas.";
pub const NOT_LINKED: &str = "❌ Chat ini belum terhubung dengan spreadsheet mana pun.";
pub const INVALID_FORMAT: &str =
    "❌ Format pesan tidak valid. Ketik /help untuk melihat format yang benar.";

pub const HELP: &str = "TRANSAKSI:

Penjualan:
/penjualan
Tanggal: DD/MM/YYYY
No. INV: [nomor invoice]
Keterangan: [deskripsi transaksi]
Customer: [nama customer]
Nominal: [jumlah]
No. Rekening Penerima: [nomor rekening]
Nama Rekening Penerima: [nama pemilik rekening]

Pembelian:
/pembelian
Tanggal: DD/MM/YYYY
No. INV: [nomor invoice]
Keterangan: [deskripsi transaksi]
Supplier: [nama supplier]
Nominal: [jumlah]
No. Rekening Tujuan: [nomor rekening]
Nama Rekening Tujuan: [nama pemilik rekening]

Iklan:
/iklan
Tanggal: DD/MM/YYYY
No. VA: [nomor virtual account]
Keterangan: [deskripsi transaksi]
Supplier: [nama supplier]
Nominal: [jumlah]
Rekening Pengirim: [nomor rekening]
Nama Rekening Pengirim: [nama pemilik rekening]

PELUNASAN & INVOICE:

Pelunasan:
/pelunasan
[nomor invoice/VA]

Pelunasan Massal:
/pelunasanmassal
[nomor invoice/VA 1]
[nomor invoice/VA 2]
...

Invoice Iklan:
/invoiceiklan
No. VA: [nomor VA]

⚠️ Semua perintah di atas menggunakan lampiran.

LAINNYA:
/belumlunas - Daftar invoice belum dibayar
/linksheet - Link Google Spreadsheet
/linkdrive - Link folder Google Drive";

pub fn unknown_command(token: &str) -> String {
    format!("❌ Perintah {token} tidak ditemukan. Ketik /help untuk melihat daftar perintah.")
}

pub fn attachment_required(command: CommandKind) -> String {
    format!(
        "❌ Perintah {} harus menyertakan lampiran file/gambar.",
        command.token()
    )
}

pub fn attachment_too_large(size: u64, limit: u64) -> String {
    format!(
        "❌ Ukuran file terlalu besar ({:.1} MB). Maksimal {} MB.",
        size as f64 / (1024.0 * 1024.0),
        limit / (1024 * 1024)
    )
}

pub fn parse_error(err: &ParseError) -> String {
    let ParseError::Fields {
        missing_fields,
        error_messages,
        ..
    } = err
    else {
        return format!("❌ {err}");
    };
    match missing_fields.as_slice() {
        [] => INVALID_FORMAT.to_string(),
        [field] => match error_messages.get(field) {
            Some(msg) => format!("❌ {field}: {msg}"),
            None => format!("❌ {field} tidak boleh kosong!"),
        },
        fields => {
            let mut out = format!("❌ Beberapa field tidak valid: {}", fields.join(", "));
            if !error_messages.is_empty() {
                out.push_str("\n\nDetail error:");
                for (field, msg) in error_messages {
                    out.push_str(&format!("\n- {field}: {msg}"));
                }
            }
            out
        }
    }
}

pub fn reconcile_error(err: &ReconcileError) -> String {
    match err {
        ReconcileError::Duplicate { invoice, row } => {
            format!("❌ No. INV: {invoice} sudah ada pada baris ke-{row}")
        }
        ReconcileError::NotFound { invoice } => {
            format!("❌ Invoice {invoice} tidak ditemukan.")
        }
        ReconcileError::NotPurchase { invoice, .. } => format!(
            "❌ Invoice {invoice} bukan transaksi pembelian. Hanya transaksi pembelian yang dapat dilunasi."
        ),
        ReconcileError::AlreadySettled { invoice, .. } => {
            format!("❌ Invoice {invoice} sudah berstatus LUNAS.")
        }
        ReconcileError::BatchRejected(issues) => batch_rejected(issues),
        ReconcileError::AdvertisementNotPaid { invoice } => format!(
            "❌ Iklan dengan No. VA {invoice} tidak ditemukan atau belum dilunasi."
        ),
        ReconcileError::Store(_) => GENERIC_FAILURE.to_string(),
    }
}

pub fn transaction_recorded(record: &TransactionRecord) -> String {
    let amount = format_rupiah(record.amount);
    match record.kind {
        TransactionKind::Sale => format!(
            "✅ PENJUALAN kepada {} sebesar {amount} berhasil dicatat.",
            record.customer
        ),
        kind => {
            let label = if kind.is_advertisement() {
                "IKLAN"
            } else {
                "PEMBELIAN"
            };
            format!(
                "✅ {label} dari {} sebesar {amount} berhasil dicatat.\n\n\
                 Untuk melakukan pelunasan, gunakan command berikut:\n\
                 /pelunasan\n{}\n\n\
                 Lampirkan bukti transfer saat menggunakan command di atas.",
                record.supplier, record.invoice_number
            )
        }
    }
}

/// Confirmation for a single settlement. Advertisements tag whoever
/// submitted them and ask for the invoice document.
pub fn settled(row: &LedgerRow) -> String {
    let mut out = format!("✅ Invoice {} berhasil dilunasi.", row.invoice_number);
    if row.is_advertisement && !row.submitter.is_empty() {
        out.push_str(&format!(
            "\n\n{}, silakan kirim invoice iklan dengan menggunakan command berikut:\n/invoiceiklan\nNo. VA: {}",
            row.submitter, row.invoice_number
        ));
    }
    out
}

pub fn batch_rejected(issues: &[(String, BatchIssue)]) -> String {
    let mut out = String::from("❌ Pelunasan massal gagal karena:");
    for (invoice, issue) in issues {
        out.push_str(&format!("\n- Invoice {invoice} {issue}"));
    }
    out.push_str(
        "\n\nPelunasan massal hanya dapat dilakukan untuk invoice dengan supplier yang sama.",
    );
    out
}

pub fn batch_summary(outcome: &BatchOutcome) -> String {
    let mut lines = Vec::new();
    if !outcome.settled.is_empty() {
        let invoices: Vec<&str> = outcome
            .settled
            .iter()
            .map(|r| r.invoice_number.as_str())
            .collect();
        lines.push(format!(
            "✅ Berhasil melunasi {} invoice ({}): {}",
            invoices.len(),
            format_rupiah(outcome.settled_amount()),
            invoices.join(", ")
        ));
    }
    if !outcome.not_found.is_empty() {
        lines.push(format!(
            "❌ {} invoice tidak ditemukan: {}",
            outcome.not_found.len(),
            outcome.not_found.join(", ")
        ));
    }
    if !outcome.already_paid.is_empty() {
        lines.push(format!(
            "⚠️ {} invoice sudah lunas sebelumnya: {}",
            outcome.already_paid.len(),
            outcome.already_paid.join(", ")
        ));
    }
    if !outcome.failed.is_empty() {
        let invoices: Vec<&str> = outcome.failed.iter().map(|(i, _)| i.as_str()).collect();
        lines.push(format!(
            "❌ {} invoice gagal diperbarui: {}",
            invoices.len(),
            invoices.join(", ")
        ));
    }
    lines.join("\n")
}

pub fn ad_invoice_attached(row: &LedgerRow) -> String {
    format!(
        "✅ Invoice iklan No. VA {} berhasil dilampirkan.",
        row.invoice_number
    )
}

/// Renders the pending report, split into messages of at most
/// [`MESSAGE_LIMIT`] characters at supplier boundaries.
pub fn pending_report(report: &PendingReport, group_name: &str) -> Vec<String> {
    if report.is_empty() {
        return vec![NO_PENDING.to_string()];
    }
    let mut blocks = vec![format!(
        "📋 DAFTAR INVOICE BELUM LUNAS\n📍 Grup: {group_name}\n"
    )];
    for group in &report.groups {
        let mut block = format!(
            "👨‍💼 {}\n💰 Total: {}\n🏦 No. Rekening: {}\n👤 Nama Rekening: {}\n",
            group.supplier,
            format_rupiah(group.total_amount),
            or_dash(&group.account_number),
            or_dash(&group.account_holder),
        );
        for (idx, invoice) in group.invoices.iter().enumerate() {
            block.push_str(&format!(
                "\n{}. {} ({})\n   💵 {}\n   📝 {}",
                idx + 1,
                invoice.invoice_number,
                invoice.date,
                format_rupiah(invoice.amount),
                invoice.description
            ));
        }
        block.push('\n');
        blocks.push(block);
    }
    blocks.push(format!(
        "{}\n💵 TOTAL KESELURUHAN: {}\n📊 Jumlah invoice: {}",
        "═".repeat(25),
        format_rupiah(report.grand_total),
        report.invoice_count
    ));
    pack(&blocks, MESSAGE_LIMIT)
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

/// Joins `blocks` with blank lines into as few messages as fit `limit`.
/// A block too long on its own is broken at line boundaries.
fn pack(blocks: &[String], limit: usize) -> Vec<String> {
    let mut pieces: Vec<&str> = Vec::new();
    for block in blocks {
        if block.chars().count() <= limit {
            pieces.push(block.as_str());
        } else {
            pieces.extend(block.lines());
        }
    }

    let mut messages = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        let needed = if current.is_empty() {
            piece.chars().count()
        } else {
            current.chars().count() + 1 + piece.chars().count()
        };
        if needed > limit && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.extend(piece.chars().take(limit));
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Whether a stored file is the invoice document or a transfer proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    TransferProof,
}

fn dashed(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("-")
}

/// `{J|B}.{date}.{invoice}.{counterparty}-{group}-{INV|TF}{ext}`, `date` as
/// `DD-MM-YYYY`.
pub fn attachment_name(
    kind: TransactionKind,
    date: &str,
    invoice: &str,
    counterparty: &str,
    group: &str,
    document: DocumentKind,
    ext: &str,
) -> String {
    let prefix = match kind {
        TransactionKind::Sale => "J",
        TransactionKind::Purchase | TransactionKind::Advertisement => "B",
    };
    let suffix = match document {
        DocumentKind::Invoice => "INV",
        DocumentKind::TransferProof => "TF",
    };
    format!(
        "{prefix}.{date}.{}.{}-{}-{suffix}{ext}",
        invoice.trim(),
        dashed(counterparty),
        dashed(group)
    )
}

/// Name of the single proof stored for a batch settlement.
pub fn batch_proof_name(date: &str, supplier: &str, group: &str, ext: &str) -> String {
    format!(
        "B.{date}.REKAP-PEMBAYARAN.{}-{}-TF{ext}",
        dashed(supplier),
        dashed(group)
    )
}
