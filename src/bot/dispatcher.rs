//! Routes one inbound message through access control, the rate guard, the
//! parsers and the reconciler, and produces the replies.
//!
//! Messages are handled one at a time to completion. The dispatcher holds
//! no lock around the ledger; two bot instances writing the same sheet can
//! still race between a check and its write.

use std::time::Duration;

use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use super::replies::{self, DocumentKind};
use super::{Attachment, ChatKind, FileSource, InboundMessage, OutboundMessage, TransportError};
use crate::cloud_adapters::drive::MAX_ATTACHMENT_BYTES;
use crate::cloud_adapters::{AttachmentStore, CloudSpreadsheetService, UploadError};
use crate::config::{CliError, Config, GroupConfig};
use crate::core::ledger::{LedgerStore, SheetLedger, display_sheet_date};
use crate::core::pending::aggregate;
use crate::core::reconcile::{ReconcileError, Reconciler};
use crate::core::time::local_date;
use crate::core::{SlidingWindowGuard, TransactionKind};
use crate::parser::{self, Command, CommandKind, TransactionDraft};

/// Why a flow stopped after parsing succeeded.
#[derive(Debug)]
enum FlowError {
    Ledger(ReconcileError),
    Upload(UploadError),
    Download(TransportError),
}

impl From<ReconcileError> for FlowError {
    fn from(e: ReconcileError) -> Self {
        FlowError::Ledger(e)
    }
}

impl From<UploadError> for FlowError {
    fn from(e: UploadError) -> Self {
        FlowError::Upload(e)
    }
}

impl From<TransportError> for FlowError {
    fn from(e: TransportError) -> Self {
        FlowError::Download(e)
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::Ledger(e) => write!(f, "{e}"),
            FlowError::Upload(e) => write!(f, "{e}"),
            FlowError::Download(e) => write!(f, "download failed: {e}"),
        }
    }
}

/// Turns chat messages into ledger operations.
pub struct Dispatcher<S, A> {
    config: Config,
    tz: Tz,
    sheets: S,
    attachments: A,
    guard: SlidingWindowGuard,
}

impl<S: CloudSpreadsheetService, A: AttachmentStore> Dispatcher<S, A> {
    /// Builds a dispatcher with a rate guard sized from `config`.
    pub fn new(config: Config, sheets: S, attachments: A) -> Result<Self, CliError> {
        let tz = config.tz()?;
        let guard = SlidingWindowGuard::new(
            config.rate_limit.max_submissions,
            Duration::from_secs(config.rate_limit.window_secs),
        );
        Ok(Self {
            config,
            tz,
            sheets,
            attachments,
            guard,
        })
    }

    /// Replaces the rate guard.
    pub fn with_guard(mut self, guard: SlidingWindowGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sheets(&self) -> &S {
        &self.sheets
    }

    pub fn attachments(&self) -> &A {
        &self.attachments
    }

    /// Handles one message and returns the replies to send, in order.
    pub fn handle(&mut self, msg: &InboundMessage, files: &dyn FileSource) -> Vec<OutboundMessage> {
        if !self.is_allowed(msg) {
            warn!(
                chat_id = msg.chat_id,
                user_id = msg.sender.id,
                chat_kind = ?msg.chat_kind,
                "Access denied"
            );
            return vec![OutboundMessage::reply(msg, replies::ACCESS_DENIED)];
        }
        let texts = match &msg.attachment {
            None => self.handle_text(msg),
            Some(attachment) => self.handle_attachment(msg, attachment, files),
        };
        texts
            .into_iter()
            .map(|text| OutboundMessage::reply(msg, text))
            .collect()
    }

    fn is_allowed(&self, msg: &InboundMessage) -> bool {
        let access = &self.config.access_control;
        if !access.enabled {
            return true;
        }
        match msg.chat_kind {
            ChatKind::Private => access.allowed_users.contains(&msg.sender.id),
            ChatKind::Group | ChatKind::Supergroup => self.config.group(msg.chat_id).is_some(),
            ChatKind::Channel => false,
        }
    }

    fn handle_text(&mut self, msg: &InboundMessage) -> Vec<String> {
        let Some(text) = msg.text.as_deref() else {
            return Vec::new();
        };
        let text = parser::normalize_command_token(text);
        let token = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if !token.starts_with('/') {
            return Vec::new();
        }
        let group = self.config.group(msg.chat_id).cloned();

        match token.as_str() {
            "/start" => vec![replies::START.to_string()],
            "/help" => vec![replies::HELP.to_string()],
            "/belumlunas" | "/invoicebelumlunas" => {
                let Some(group) = group else {
                    return vec![replies::NOT_LINKED.to_string()];
                };
                match self.pending_report(&group) {
                    Ok(messages) => {
                        info!(
                            submitter = %msg.sender.display_name(),
                            group = %group.name,
                            "Pending report requested"
                        );
                        messages
                    }
                    Err(e) => {
                        error!(group = %group.name, error = %e, "Failed to read pending invoices");
                        vec![replies::GENERIC_FAILURE.to_string()]
                    }
                }
            }
            "/linksheet" => match group {
                Some(group) => vec![format!(
                    "📊 Link Spreadsheet {}:\n{}",
                    group.name,
                    group.spreadsheet_url()
                )],
                None => vec![replies::NOT_LINKED.to_string()],
            },
            "/linkdrive" => match group {
                Some(group) if !group.drive_folder_id.is_empty() => vec![format!(
                    "📁 Link Folder Drive {}:\n{}",
                    group.name,
                    group.drive_folder_url()
                )],
                _ => vec![replies::NOT_LINKED.to_string()],
            },
            _ => match CommandKind::detect(&text) {
                Some(kind) => vec![replies::attachment_required(kind)],
                None => vec![replies::unknown_command(&token)],
            },
        }
    }

    fn handle_attachment(
        &mut self,
        msg: &InboundMessage,
        attachment: &Attachment,
        files: &dyn FileSource,
    ) -> Vec<String> {
        if !self.guard.check() {
            warn!(
                submitter = %msg.sender.display_name(),
                in_window = self.guard.in_window(),
                "Submission rejected by rate guard"
            );
            return vec![replies::RATE_LIMITED.to_string()];
        }
        let Some(caption) = msg.text.as_deref().filter(|c| !c.trim().is_empty()) else {
            return vec![replies::MISSING_CAPTION.to_string()];
        };
        if let Some(size) = attachment.size
            && size > MAX_ATTACHMENT_BYTES
        {
            return vec![replies::attachment_too_large(size, MAX_ATTACHMENT_BYTES)];
        }

        let command = match parser::parse_command(caption) {
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                debug!(submitter = %msg.sender.display_name(), error = %e, "Rejected caption");
                return vec![replies::parse_error(&e)];
            }
            None => {
                let caption = parser::normalize_command_token(caption);
                let first = caption.split_whitespace().next().unwrap_or_default();
                return if first.starts_with('/') {
                    vec![replies::unknown_command(first)]
                } else {
                    vec![replies::INVALID_FORMAT.to_string()]
                };
            }
        };
        let Some(group) = self.config.group(msg.chat_id).cloned() else {
            return vec![replies::NOT_LINKED.to_string()];
        };

        let submitter = msg.sender.display_name();
        let result = match command {
            Command::Transaction(draft) => {
                self.record_transaction(msg, &group, draft, attachment, files)
            }
            Command::Settlement { invoice } => {
                self.settle(msg, &group, &invoice, attachment, files)
            }
            Command::BatchSettlement { invoices } => {
                self.settle_batch(msg, &group, &invoices, attachment, files)
            }
            Command::AdInvoice { invoice } => {
                self.attach_ad_invoice(&group, &invoice, attachment, files)
            }
        };
        match result {
            Ok(reply) => vec![reply],
            Err(e) => vec![self.failure_reply(&e, &submitter, &group)],
        }
    }

    fn failure_reply(&self, e: &FlowError, submitter: &str, group: &GroupConfig) -> String {
        match e {
            FlowError::Ledger(ReconcileError::Store(_)) => {
                error!(submitter, group = %group.name, error = %e, "Ledger store failed");
                replies::GENERIC_FAILURE.to_string()
            }
            FlowError::Ledger(err) => {
                info!(submitter, group = %group.name, reason = %err, "Request refused");
                replies::reconcile_error(err)
            }
            FlowError::Upload(UploadError::TooLarge { size, limit }) => {
                replies::attachment_too_large(*size, *limit)
            }
            FlowError::Upload(_) | FlowError::Download(_) => {
                error!(submitter, group = %group.name, error = %e, "Attachment transfer failed");
                replies::GENERIC_FAILURE.to_string()
            }
        }
    }

    fn reconciler<'a>(
        sheets: &'a mut S,
        group: &'a GroupConfig,
        tz: Tz,
    ) -> Reconciler<SheetLedger<'a, S>> {
        Reconciler::new(SheetLedger::new(sheets, &group.spreadsheet_id), tz)
    }

    /// Downloads `attachment` and stores it in the group's folder.
    fn store_attachment(
        &mut self,
        group: &GroupConfig,
        attachment: &Attachment,
        name: &str,
        files: &dyn FileSource,
    ) -> Result<String, FlowError> {
        let bytes = files.download(&attachment.file_id)?;
        let url = self.attachments.upload(
            &group.drive_folder_id,
            name,
            attachment.mime_type(),
            &bytes,
        )?;
        debug!(group = %group.name, name, "Stored attachment");
        Ok(url)
    }

    fn record_transaction(
        &mut self,
        msg: &InboundMessage,
        group: &GroupConfig,
        draft: TransactionDraft,
        attachment: &Attachment,
        files: &dyn FileSource,
    ) -> Result<String, FlowError> {
        Self::reconciler(&mut self.sheets, group, self.tz).ensure_unique(&draft.invoice_number)?;

        // Advertisement invoices arrive later through /invoiceiklan.
        let url = if draft.is_advertisement() {
            String::new()
        } else {
            let name = replies::attachment_name(
                draft.kind,
                &draft.date.format("%d-%m-%Y").to_string(),
                &draft.invoice_number,
                draft.counterparty(),
                &group.name,
                DocumentKind::Invoice,
                &attachment.extension(),
            );
            self.store_attachment(group, attachment, &name, files)?
        };

        let record = draft.into_record(msg.sender.display_name(), msg.date, url);
        let row = Self::reconciler(&mut self.sheets, group, self.tz).create(&record)?;
        info!(
            invoice = %record.invoice_number,
            submitter = %record.submitter,
            group = %group.name,
            row,
            "Transaction recorded"
        );
        Ok(replies::transaction_recorded(&record))
    }

    fn settle(
        &mut self,
        msg: &InboundMessage,
        group: &GroupConfig,
        invoice: &str,
        attachment: &Attachment,
        files: &dyn FileSource,
    ) -> Result<String, FlowError> {
        let row = Self::reconciler(&mut self.sheets, group, self.tz).check_settleable(invoice)?;
        let name = replies::attachment_name(
            TransactionKind::Purchase,
            &display_sheet_date(&row.date),
            invoice,
            &row.supplier,
            &group.name,
            DocumentKind::TransferProof,
            &attachment.extension(),
        );
        let url = self.store_attachment(group, attachment, &name, files)?;

        let settler = msg.sender.display_name();
        let row = Self::reconciler(&mut self.sheets, group, self.tz)
            .settle(invoice, &url, &settler, msg.date)?;
        info!(invoice, settler = %settler, group = %group.name, row = row.row, "Invoice settled");
        Ok(replies::settled(&row))
    }

    fn settle_batch(
        &mut self,
        msg: &InboundMessage,
        group: &GroupConfig,
        invoices: &[String],
        attachment: &Attachment,
        files: &dyn FileSource,
    ) -> Result<String, FlowError> {
        let validation =
            Self::reconciler(&mut self.sheets, group, self.tz).validate_batch(invoices)?;
        if !validation.is_clean() {
            let invalid = validation.invalid();
            info!(group = %group.name, invalid = invalid.len(), "Batch settlement rejected");
            return Ok(replies::batch_rejected(&invalid));
        }

        let date = local_date(msg.date, self.tz).format("%d-%m-%Y").to_string();
        let supplier = validation.supplier.clone().unwrap_or_default();
        let name =
            replies::batch_proof_name(&date, &supplier, &group.name, &attachment.extension());
        let url = self.store_attachment(group, attachment, &name, files)?;

        let settler = msg.sender.display_name();
        let outcome = Self::reconciler(&mut self.sheets, group, self.tz).commit_batch(
            &validation.valid_invoices(),
            &url,
            &settler,
            msg.date,
        );
        for (invoice, reason) in &outcome.failed {
            error!(invoice = %invoice, settler = %settler, group = %group.name, reason = %reason, "Batch item failed");
        }
        Ok(replies::batch_summary(&outcome))
    }

    fn attach_ad_invoice(
        &mut self,
        group: &GroupConfig,
        invoice: &str,
        attachment: &Attachment,
        files: &dyn FileSource,
    ) -> Result<String, FlowError> {
        let row = Self::reconciler(&mut self.sheets, group, self.tz)
            .find_paid_advertisement(invoice)?
            .ok_or_else(|| ReconcileError::AdvertisementNotPaid {
                invoice: invoice.trim().to_string(),
            })?;
        let name = replies::attachment_name(
            TransactionKind::Advertisement,
            &display_sheet_date(&row.date),
            invoice,
            &row.supplier,
            &group.name,
            DocumentKind::Invoice,
            &attachment.extension(),
        );
        let url = self.store_attachment(group, attachment, &name, files)?;
        let row = Self::reconciler(&mut self.sheets, group, self.tz)
            .attach_advertisement_invoice(invoice, &url)?;
        info!(invoice, group = %group.name, row = row.row, "Advertisement invoice attached");
        Ok(replies::ad_invoice_attached(&row))
    }

    /// Rendered pending-invoice report for `group`.
    pub fn pending_report(&mut self, group: &GroupConfig) -> Result<Vec<String>, ReconcileError> {
        let rows = SheetLedger::new(&mut self.sheets, &group.spreadsheet_id).rows()?;
        Ok(replies::pending_report(&aggregate(&rows), &group.name))
    }

    /// Reports for every group with a notification thread and something
    /// pending. A group that fails is logged and skipped.
    pub fn pending_notifications(&mut self) -> Vec<OutboundMessage> {
        let groups: Vec<GroupConfig> = self
            .config
            .groups
            .iter()
            .filter(|g| g.notification_topic_id.is_some())
            .cloned()
            .collect();
        let mut out = Vec::new();
        for group in groups {
            let rows = match SheetLedger::new(&mut self.sheets, &group.spreadsheet_id).rows() {
                Ok(rows) => rows,
                Err(e) => {
                    error!(group = %group.name, error = %e, "Pending notification failed");
                    continue;
                }
            };
            let report = aggregate(&rows);
            if report.is_empty() {
                debug!(group = %group.name, "Nothing pending");
                continue;
            }
            info!(
                group = %group.name,
                invoices = report.invoice_count,
                "Sending pending notification"
            );
            out.extend(
                replies::pending_report(&report, &group.name)
                    .into_iter()
                    .map(|text| OutboundMessage {
                        chat_id: group.id,
                        thread_id: group.notification_topic_id,
                        reply_to: None,
                        text,
                    }),
            );
        }
        out
    }
}
