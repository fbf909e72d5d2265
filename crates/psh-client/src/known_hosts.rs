//! Trust-on-first-use (TOFU) host key pinning.
//!
//! Stores pinned host key fingerprints at `~/.psh/known_hosts`.
//! Format: one `host:port fingerprint` pair per line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of checking a host's fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    /// The host is pinned and the fingerprint matches.
    Known,
    /// The host has never been pinned.
    Unknown,
    /// The host is pinned to a different fingerprint.
    Changed {
        /// The previously pinned fingerprint.
        expected: String,
    },
}

/// Known hosts file manager.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.psh/known_hosts`.
    pub fn default_location() -> io::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "cannot determine home directory")
        })?;
        Ok(Self::new(home.join(".psh").join("known_hosts")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check `fingerprint` against the pin for `host`.
    pub fn verify_host(&self, host: &str, fingerprint: &str) -> io::Result<HostStatus> {
        let status = match self.load_entries()?.into_iter().find(|(h, _)| h == host) {
            None => HostStatus::Unknown,
            Some((_, stored)) if stored == fingerprint => HostStatus::Known,
            Some((_, stored)) => HostStatus::Changed { expected: stored },
        };
        Ok(status)
    }

    /// Pin `host` to `fingerprint`, replacing any previous pin.
    pub fn add_host(&self, host: &str, fingerprint: &str) -> io::Result<()> {
        let mut entries = self.load_entries()?;
        entries.retain(|(h, _)| h != host);
        entries.push((host.to_string(), fingerprint.to_string()));
        self.save_entries(&entries)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn load_entries(&self) -> io::Result<Vec<(String, String)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let entries = content
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                let (host, fp) = line.split_once(' ')?;
                let fp = fp.trim();
                if fp.is_empty() {
                    return None;
                }
                Some((host.to_string(), fp.to_string()))
            })
            .collect();

        Ok(entries)
    }

    fn save_entries(&self, entries: &[(String, String)]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let content: String = entries
            .iter()
            .map(|(host, fp)| format!("{host} {fp}\n"))
            .collect();
        fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
