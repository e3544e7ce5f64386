//! Turns chat captions into typed commands.
//!
//! Each parser answers `None` when the text is not its command, so the
//! caller can try the next one. A recognized command yields either the
//! parsed value or a [`ParseError`] listing every problem at once.

pub mod ad_invoice;
pub mod settlement;
pub mod transaction;

pub use transaction::TransactionDraft;

use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ADDRESSED_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*/\w+)@\w+").expect("valid regex"));

/// `Something:` at the start of a line, used to tell labels from bare values.
pub(crate) static LABEL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\s*:").expect("valid regex"));

pub(crate) static INVOICE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^No\.\s*INV\s*:").expect("valid regex"));

pub(crate) static VA_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^No\.\s*VA\s*:").expect("valid regex"));

/// Commands understood by the bot that carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Sale,
    Purchase,
    Advertisement,
    Settlement,
    BatchSettlement,
    AdInvoice,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Sale,
        CommandKind::Purchase,
        CommandKind::Advertisement,
        CommandKind::Settlement,
        CommandKind::BatchSettlement,
        CommandKind::AdInvoice,
    ];

    pub fn token(self) -> &'static str {
        match self {
            CommandKind::Sale => "/penjualan",
            CommandKind::Purchase => "/pembelian",
            CommandKind::Advertisement => "/iklan",
            CommandKind::Settlement => "/pelunasan",
            CommandKind::BatchSettlement => "/pelunasanmassal",
            CommandKind::AdInvoice => "/invoiceiklan",
        }
    }

    /// The command `text` starts with, if any.
    pub fn detect(text: &str) -> Option<Self> {
        let text = normalize_command_token(text);
        Self::ALL
            .into_iter()
            .find(|kind| starts_with_command(&text, kind.token()))
    }
}

/// A successfully parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Transaction(TransactionDraft),
    Settlement { invoice: String },
    BatchSettlement { invoices: Vec<String> },
    AdInvoice { invoice: String },
}

/// A recognized command whose content is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Required fields absent or invalid, in a stable order per command.
    Fields {
        command: CommandKind,
        missing_fields: Vec<String>,
        /// Validation message per label, for fields that were present but bad.
        error_messages: BTreeMap<String, String>,
    },
    /// A batch settlement listed no invoices.
    NoInvoices,
}

impl ParseError {
    pub(crate) fn fields(command: CommandKind, missing_fields: Vec<String>) -> Self {
        ParseError::Fields {
            command,
            missing_fields,
            error_messages: BTreeMap::new(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Fields {
                command,
                missing_fields,
                ..
            } => write!(
                f,
                "{} is missing or has invalid fields: {}",
                command.token(),
                missing_fields.join(", ")
            ),
            ParseError::NoInvoices => write!(f, "Tidak ada nomor invoice yang ditemukan"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Rewrites a leading `/command@BotName` to `/command`.
pub fn normalize_command_token(text: &str) -> Cow<'_, str> {
    ADDRESSED_COMMAND.replace(text, "$1")
}

/// Tries every parser against `text`. `None` means no known command.
pub fn parse_command(text: &str) -> Option<Result<Command, ParseError>> {
    let text = normalize_command_token(text);
    if let Some(parsed) = transaction::parse(&text) {
        return Some(parsed.map(Command::Transaction));
    }
    if let Some(parsed) = settlement::parse_batch(&text) {
        return Some(parsed.map(|invoices| Command::BatchSettlement { invoices }));
    }
    if let Some(parsed) = settlement::parse_single(&text) {
        return Some(parsed.map(|invoice| Command::Settlement { invoice }));
    }
    ad_invoice::parse(&text).map(|parsed| parsed.map(|invoice| Command::AdInvoice { invoice }))
}

/// True when `text` starts with `token` followed by whitespace or the end of
/// the text, compared case-insensitively.
pub(crate) fn starts_with_command(text: &str, token: &str) -> bool {
    let head = text.trim_start();
    match head.get(..token.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(token) => head[token.len()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace),
        _ => false,
    }
}

/// Trimmed, non-blank lines. Line 0 is the command itself.
pub(crate) fn content_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Value following `label` on `line`, trimmed. `None` if the label does not
/// match.
pub(crate) fn labeled<'a>(line: &'a str, label: &Regex) -> Option<&'a str> {
    label.find(line).map(|m| line[m.end()..].trim())
}
