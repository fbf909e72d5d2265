//! One-time SSH connection parameters issued by the control plane.

use std::fmt;

use crate::error::{PshError, PshResult};

/// The remote login user. A control-plane convention, never negotiated.
pub const POD_USER: &str = "pod";

/// Where and how to reach a service for exactly one connection attempt.
///
/// Only obtainable by parsing a connection URL the control plane issued, so a
/// descriptor always stems from a successful resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
    password: String,
}

impl ConnectionDescriptor {
    /// Build a descriptor from an issued `<user>@<host>:<port>` URL and its
    /// one-time password.
    ///
    /// The user segment is discarded; sessions always log in as [`POD_USER`].
    pub fn from_connection_url(url: &str, password: &str) -> PshResult<Self> {
        let authority = match url.rsplit_once('@') {
            Some((_user, authority)) => authority,
            None => url,
        };
        let (host, port) = split_authority(authority).ok_or_else(|| {
            PshError::CredentialIssuanceFailed(format!("malformed connection url '{url}'"))
        })?;

        Ok(Self {
            host: host.to_string(),
            port,
            password: password.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        POD_USER
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &POD_USER)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Split `host:port` or `[v6]:port`.
fn split_authority(authority: &str) -> Option<(&str, u16)> {
    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        (host, tail.strip_prefix(':')?)
    } else {
        authority.rsplit_once(':')?
    };
    if host.is_empty() || (host.contains(':') && !authority.starts_with('[')) {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    if port == 0 {
        return None;
    }
    Some((host, port))
}
