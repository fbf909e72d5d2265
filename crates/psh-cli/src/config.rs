//! Client configuration at `~/.psh/config.toml`.
//!
//! Holds the control-plane endpoint and credentials, SSH dial settings and
//! the pty shape. Command-line flags and `PSH_*` environment variables
//! always override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use psh_client::{DirectoryConfig, HostKeyPolicy, PtySpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Where and how to reach the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// `scheme://host:port` of the control plane (empty = none).
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_context_path")]
    pub context_path: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            context_path: default_context_path(),
            access_key: String::new(),
            secret_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// SSH dial settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// "insecure" or "tofu".
    #[serde(default = "default_host_key_policy")]
    pub host_key_policy: String,

    #[serde(default = "default_timeout_secs")]
    pub dial_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host_key_policy: default_host_key_policy(),
            dial_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Pseudo-terminal shape requested for interactive shells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_term")]
    pub term: String,

    #[serde(default = "default_rows")]
    pub rows: u32,

    #[serde(default = "default_cols")]
    pub cols: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            term: default_term(),
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

fn default_context_path() -> String {
    "platform".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_host_key_policy() -> String {
    HostKeyPolicy::default().to_string()
}

fn default_term() -> String {
    "linux".to_string()
}

fn default_rows() -> u32 {
    32
}

fn default_cols() -> u32 {
    160
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub host_key_policy: Option<HostKeyPolicy>,
}

/// `~/.psh/config.toml`.
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".psh").join("config.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Layer command-line and environment values over the file values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.control_plane.endpoint = endpoint;
        }
        if let Some(access_key) = overrides.access_key {
            self.control_plane.access_key = access_key;
        }
        if let Some(secret_key) = overrides.secret_key {
            self.control_plane.secret_key = secret_key;
        }
        if let Some(policy) = overrides.host_key_policy {
            self.ssh.host_key_policy = policy.to_string();
        }
    }

    pub fn directory_config(&self) -> Result<DirectoryConfig> {
        let cp = &self.control_plane;
        if cp.endpoint.trim().is_empty() {
            anyhow::bail!(
                "no control-plane endpoint configured (set --endpoint, PSH_ENDPOINT or control_plane.endpoint)"
            );
        }
        Ok(DirectoryConfig {
            endpoint: cp.endpoint.trim().to_string(),
            context_path: cp.context_path.clone(),
            access_key: cp.access_key.clone(),
            secret_key: cp.secret_key.clone(),
            timeout_secs: cp.timeout_secs,
        })
    }

    pub fn host_key_policy(&self) -> Result<HostKeyPolicy> {
        self.ssh
            .host_key_policy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("invalid ssh.host_key_policy")
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.dial_timeout_secs)
    }

    pub fn pty(&self) -> PtySpec {
        PtySpec {
            term: self.session.term.clone(),
            rows: self.session.rows,
            cols: self.session.cols,
            ..PtySpec::default()
        }
    }
}
