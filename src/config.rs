use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Message every config failure surfaces with; the cause chain carries the details.
pub const CONFIG_ERROR: &str = "Invalid or missing config file";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "Amazon")]
    pub amazon: AmazonConfig,
    #[serde(rename = "Trello")]
    pub trello: TrelloConfig,
    #[serde(rename = "Schedule")]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmazonConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    #[serde(default = "default_list_url")]
    pub list_url: String,
    #[serde(default = "default_logout_url")]
    pub logout_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloConfig {
    pub app_key: String,
    /// Trello API secret.
    pub secret: String,
    pub token: String,
    pub buy_list_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Path under `api_base`; `{list_id}` is replaced with the target list id.
    #[serde(default = "default_card_path")]
    pub card_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub poll_time_in_seconds: u64,
    #[serde(default)]
    pub on_item_error: ItemErrorPolicy,
    /// Delete items from the household list once their card exists.
    #[serde(default)]
    pub clear_source: bool,
}

/// What a cycle does when creating the card for one item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemErrorPolicy {
    /// Log the failure and carry on with the remaining items.
    #[default]
    Skip,
    /// End the cycle with the error.
    Abort,
}

/// Parsed portal URLs used by the household list client.
#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    pub portal: Url,
    pub list: Url,
    pub logout: Url,
}

fn default_portal_url() -> String {
    "https://alexa.amazon.com".to_string()
}

fn default_list_url() -> String {
    "https://api.amazonalexa.com/v2/householdlists/shopping_list_list_id/active".to_string()
}

fn default_logout_url() -> String {
    "https://alexa.amazon.com/logout".to_string()
}

fn default_api_base() -> String {
    "https://api.trello.com/1".to_string()
}

fn default_card_path() -> String {
    "lists/{list_id}/cards".to_string()
}

impl AmazonConfig {
    pub fn endpoints(&self) -> Result<PortalEndpoints> {
        Ok(PortalEndpoints {
            portal: parse_url("Amazon.portal_url", &self.portal_url)?,
            list: parse_url("Amazon.list_url", &self.list_url)?,
            logout: parse_url("Amazon.logout_url", &self.logout_url)?,
        })
    }
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        let required = [
            ("Amazon.email", &self.amazon.email),
            ("Amazon.password", &self.amazon.password),
            ("Trello.app_key", &self.trello.app_key),
            ("Trello.secret", &self.trello.secret),
            ("Trello.token", &self.trello.token),
            ("Trello.buy_list_id", &self.trello.buy_list_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("{key} must not be empty")).into());
            }
        }

        self.amazon.endpoints()?;
        parse_url("Trello.api_base", &self.trello.api_base)?;
        if !self.trello.card_path.contains("{list_id}") {
            return Err(
                SyncError::Config("Trello.card_path must contain {list_id}".into()).into(),
            );
        }
        Ok(())
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| SyncError::Config(format!("{key} is not a valid URL: {e}")).into())
}

/// Pick the config file: explicit path, then `./config.toml`, then the platform config dir.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("alexa-trello")
        .join(CONFIG_FILE)
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    read_config(path).context(CONFIG_ERROR)
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
