//! TOML configuration for the bot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::scheduler::NotificationSchedule;

/// Environment variable consulted when `bot_token` is absent.
pub const TOKEN_ENV: &str = "BOT_TOKEN";

#[derive(Debug)]
pub enum CliError {
    MissingConfig(PathBuf),
    InvalidConfig(String),
    MissingCredentials(PathBuf),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::MissingConfig(p) => write!(f, "config file {} not found", p.display()),
            CliError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            CliError::MissingCredentials(p) => {
                write!(f, "credentials file {} was not found", p.display())
            }
        }
    }
}

impl std::error::Error for CliError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Tab holding the ledger inside every group's spreadsheet.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            sheet_name: default_sheet_name(),
        }
    }
}

/// Keeps ledgers as CSV files and attachments in a local folder instead of
/// Google Sheets and Drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `HH:MM` in the configured time zone.
    #[serde(default = "default_notification_time")]
    pub time: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: default_notification_time(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControlConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Users allowed to talk to the bot in private chats.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_submissions")]
    pub max_submissions: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_submissions: default_max_submissions(),
            window_secs: default_window_secs(),
        }
    }
}

/// One Telegram group and the stores its transactions go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Telegram chat id.
    pub id: i64,
    pub name: String,
    pub spreadsheet_id: String,
    #[serde(default)]
    pub drive_folder_id: String,
    /// Forum thread receiving the daily pending report.
    #[serde(default)]
    pub notification_topic_id: Option<i64>,
}

impl GroupConfig {
    pub fn spreadsheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}",
            self.spreadsheet_id
        )
    }

    pub fn drive_folder_url(&self) -> String {
        format!(
            "https://drive.google.com/drive/folders/{}",
            self.drive_folder_id
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub access_control: AccessControlConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("service-account.json")
}

fn default_sheet_name() -> String {
    "Transaksi".to_string()
}

fn default_notification_time() -> String {
    "09:00".to_string()
}

fn default_max_submissions() -> usize {
    20
}

fn default_window_secs() -> u64 {
    60
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

impl Config {
    /// Reads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let data =
            fs::read_to_string(path).map_err(|_| CliError::MissingConfig(path.to_path_buf()))?;
        Self::from_toml_str(&data)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(data: &str) -> Result<Self, CliError> {
        let cfg: Config =
            toml::from_str(data).map_err(|e| CliError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        self.tz()?;
        if self.groups.is_empty() {
            return Err(CliError::InvalidConfig(
                "at least one [[groups]] entry is required".to_string(),
            ));
        }
        for group in &self.groups {
            if group.spreadsheet_id.trim().is_empty() {
                return Err(CliError::InvalidConfig(format!(
                    "group {} ({}) has no spreadsheet_id",
                    group.name, group.id
                )));
            }
        }
        if self.rate_limit.max_submissions == 0 || self.rate_limit.window_secs == 0 {
            return Err(CliError::InvalidConfig(
                "rate_limit values must be positive".to_string(),
            ));
        }
        self.schedule()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, CliError> {
        self.timezone
            .parse()
            .map_err(|_| CliError::InvalidConfig(format!("unknown timezone {}", self.timezone)))
    }

    /// Daily notification schedule built from `notification.time`.
    pub fn schedule(&self) -> Result<NotificationSchedule, CliError> {
        NotificationSchedule::daily(&self.notification.time, self.tz()?)
            .map_err(|e| CliError::InvalidConfig(e.to_string()))
    }

    /// Token from the file, else from `BOT_TOKEN`.
    pub fn bot_token(&self) -> Result<String, CliError> {
        self.resolve_token(std::env::var(TOKEN_ENV).ok())
    }

    /// Token from the file, else `env_value`.
    pub fn resolve_token(&self, env_value: Option<String>) -> Result<String, CliError> {
        self.bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or(env_value.filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| {
                CliError::InvalidConfig(format!("bot_token is missing and {TOKEN_ENV} is not set"))
            })
    }

    pub fn group(&self, chat_id: i64) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.id == chat_id)
    }
}
