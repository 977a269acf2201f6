//! On-disk configuration written by `doctree init` and read at startup.

use anyhow::{anyhow, Context, Result};
use doctree_core::tree::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "doctree.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Service-account key used by the console browser.
    #[serde(default)]
    pub service_account: Option<PathBuf>,
    /// Overrides the project named in the key file.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Identities allowed to open the console browser.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    /// Where the HTTP API keeps uploaded service-account keys.
    #[serde(default = "default_service_accounts_dir")]
    pub service_accounts_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Uploaded keys older than this are removed.
    #[serde(default = "default_upload_ttl_secs")]
    pub upload_ttl_secs: u64,
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_service_accounts_dir() -> PathBuf {
    PathBuf::from("service_accounts")
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_upload_ttl_secs() -> u64 {
    3600
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_account: None,
            project_id: None,
            admin_emails: Vec::new(),
            service_accounts_dir: default_service_accounts_dir(),
            batch_size: default_batch_size(),
            max_depth: default_max_depth(),
            upload_ttl_secs: default_upload_ttl_secs(),
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load the config at `path`, falling back to defaults when absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(anyhow!("max_depth must be at least 1"));
        }
        Ok(())
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}
