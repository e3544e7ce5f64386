use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use invoice_ledger_bot::bot::{Dispatcher, TelegramClient};
use invoice_ledger_bot::cloud_adapters::auth::service_account_authenticator;
use invoice_ledger_bot::cloud_adapters::google_sheets4::GoogleSheets4Adapter;
use invoice_ledger_bot::cloud_adapters::{
    AttachmentStore, CloudSpreadsheetService, FileAdapter, FolderAttachmentStore,
    GoogleDriveStore, RetryingService,
};
use invoice_ledger_bot::config::{CliError, Config};
use invoice_ledger_bot::core::ledger::COLUMNS;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Long-poll wait; also bounds how late a scheduled notification can be.
const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_PAUSE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "invoice-bot", about = "Chat bot keeping an invoice ledger")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the chat service and handle messages until stopped
    Run,
    /// Print the pending-invoice report of a group
    Pending {
        #[arg(long)]
        group: i64,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    if matches!(cli.command, Commands::CheckConfig) {
        cfg.bot_token()?;
        println!(
            "Configuration OK: {} group(s), timezone {}",
            cfg.groups.len(),
            cfg.timezone
        );
        return Ok(());
    }

    match cfg.storage.local_dir.clone() {
        Some(dir) => {
            let sheets = FileAdapter::new(&dir);
            for group in &cfg.groups {
                sheets.ensure_sheet(&group.spreadsheet_id, &COLUMNS)?;
            }
            info!(dir = %dir.display(), "Using local storage");
            let attachments = FolderAttachmentStore::new(dir.join("attachments"));
            execute(cli.command, cfg, sheets, attachments)
        }
        None => {
            if !cfg.google.credentials_path.exists() {
                return Err(Box::new(CliError::MissingCredentials(
                    cfg.google.credentials_path.clone(),
                )));
            }
            let rt = tokio::runtime::Runtime::new()?;
            let auth = Arc::new(rt.block_on(service_account_authenticator(
                &cfg.google.credentials_path,
            ))?);
            let sheets = RetryingService::new(
                GoogleSheets4Adapter::new(auth.clone(), cfg.google.sheet_name.clone())?,
                3,
                Duration::from_millis(500),
            );
            let attachments = GoogleDriveStore::new(auth)?;
            execute(cli.command, cfg, sheets, attachments)
        }
    }
}

fn execute<S, A>(
    command: Commands,
    cfg: Config,
    sheets: S,
    attachments: A,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: CloudSpreadsheetService,
    A: AttachmentStore,
{
    match command {
        Commands::Pending { group } => {
            let group = cfg
                .group(group)
                .cloned()
                .ok_or_else(|| CliError::InvalidConfig(format!("unknown group {group}")))?;
            let mut dispatcher = Dispatcher::new(cfg, sheets, attachments)?;
            for message in dispatcher.pending_report(&group)? {
                println!("{message}\n");
            }
            Ok(())
        }
        Commands::Run => {
            let token = cfg.bot_token()?;
            let schedule = if cfg.notification.enabled {
                Some(cfg.schedule()?)
            } else {
                None
            };
            let dispatcher = Dispatcher::new(cfg, sheets, attachments)?;
            let telegram = TelegramClient::new(token)?;
            poll(dispatcher, telegram, schedule);
            Ok(())
        }
        Commands::CheckConfig => Ok(()),
    }
}

/// Handles updates one at a time, forever. Scheduled notifications are
/// checked between polls.
fn poll<S, A>(
    mut dispatcher: Dispatcher<S, A>,
    mut telegram: TelegramClient,
    schedule: Option<invoice_ledger_bot::core::NotificationSchedule>,
) where
    S: CloudSpreadsheetService,
    A: AttachmentStore,
{
    info!(groups = dispatcher.config().groups.len(), "Bot started");
    let mut last_check = Utc::now();
    loop {
        match telegram.get_updates(POLL_TIMEOUT_SECS) {
            Ok(messages) => {
                for msg in messages {
                    for reply in dispatcher.handle(&msg, &telegram) {
                        // Failures are logged by the client.
                        telegram.send(&reply).ok();
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Polling failed");
                std::thread::sleep(RETRY_PAUSE);
            }
        }

        if let Some(schedule) = &schedule {
            let now = Utc::now();
            if schedule.fired_between(last_check, now) {
                let notifications = dispatcher.pending_notifications();
                if notifications.is_empty() {
                    info!("No pending invoices to announce");
                }
                for message in notifications {
                    if telegram.send(&message).is_err() {
                        warn!(chat_id = message.chat_id, "Pending notification not delivered");
                    }
                }
            }
            last_check = now;
        }
    }
}
