// src/config.rs
// =============================================================================
// Configuration loaded from a TOML file (default: ./vcd.toml).
//
// Every field has a default, so an empty or missing file is valid. Command
// line flags are applied on top of the file in main.rs, and the portal
// credentials can come from VCD_USERNAME / VCD_PASSWORD instead of the file.
// =============================================================================

use crate::http::RetryPolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USERNAME_ENV: &str = "VCD_USERNAME";
pub const PASSWORD_ENV: &str = "VCD_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where subjects are downloaded (one folder per subject)
    pub root_folder: PathBuf,
    /// Number of concurrent crawl workers
    pub workers: usize,
    /// Directory for vcd.log and HTML diagnostic dumps
    pub log_dir: PathBuf,
    /// Group every forum under a shared "forums" folder
    pub forums_subfolder: bool,
    /// Longest destination path written as is; longer ones get an alias
    pub max_path_len: usize,
    /// Stop the whole crawl at the first fatal item
    pub fail_fast: bool,
    pub portal: PortalConfig,
    pub request: RequestConfig,
    pub watchdog: WatchdogConfig,
    pub credentials: Option<Credentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_folder: PathBuf::from("downloads"),
            workers: 50,
            log_dir: PathBuf::from("logs"),
            forums_subfolder: true,
            max_path_len: 250,
            fail_fast: false,
            portal: PortalConfig::default(),
            request: RequestConfig::default(),
            watchdog: WatchdogConfig::default(),
            credentials: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub login_path: String,
    pub dashboard_path: String,
    /// Text that only appears on the dashboard once logged in
    pub login_marker: String,
    /// Courses whose lowercase name contains any of these are skipped
    pub skip_subjects_containing: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://campusvirtual.uva.es".to_string(),
            login_path: "/login/index.php".to_string(),
            dashboard_path: "/my/".to_string(),
            login_marker: "Vista general de cursos".to_string(),
            skip_subjects_containing: vec!["grado".to_string()],
        }
    }
}

impl PortalConfig {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_secs: u64,
    /// Attempts per request while the portal answers 408
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Redirect hops followed by a single resource
    pub max_redirects: u32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 8,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            max_redirects: 10,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Abandon the crawl when no unit completes for this long
    pub idle_timeout_secs: Option<u64>,
}

impl WatchdogConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keeps the password out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

impl Config {
    /// Reads `path`, or returns the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Environment variables win over the config file.
    pub fn credentials(&self) -> Result<Credentials> {
        let from_env = (std::env::var(USERNAME_ENV), std::env::var(PASSWORD_ENV));
        if let (Ok(username), Ok(password)) = from_env {
            return Ok(Credentials { username, password });
        }

        match &self.credentials {
            Some(credentials) => Ok(credentials.clone()),
            None => bail!(
                "no credentials: set {USERNAME_ENV}/{PASSWORD_ENV} or add a [credentials] section"
            ),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root_folder.join(".vcd")
    }
}
