//! Authenticated transport to a resolved service.
//!
//! The session and transfer drivers are written against the [`Connector`],
//! [`Connection`] and [`ShellChannel`] traits. [`SshConnector`] is the real
//! implementation (libssh2 via the `ssh2` crate, blocking I/O).

pub mod ssh;

#[cfg(test)]
pub(crate) mod mock;

pub use ssh::{SshConnection, SshConnector, SshShell};

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use psh_core::{ConnectionDescriptor, PshError, PshResult};

use crate::known_hosts::HostStatus;
use crate::session::{PtySpec, StdStreams};

/// Dials and authenticates a connection to a descriptor's endpoint.
pub trait Connector {
    type Conn: Connection;

    /// Open and authenticate a transport. Errors are `DialFailed`.
    fn dial(&self, descriptor: &ConnectionDescriptor) -> PshResult<Self::Conn>;
}

/// An authenticated transport, owned by exactly one invocation.
pub trait Connection {
    type Shell: ShellChannel;

    /// Open a session channel. Errors are `SessionSetupFailed`.
    fn open_shell_channel(&mut self) -> PshResult<Self::Shell>;

    /// Copy `size` bytes from `src` to `remote_path` with permission `mode`.
    /// Errors are `TransferFailed`.
    fn push_file(
        &mut self,
        remote_path: &str,
        mode: i32,
        size: u64,
        src: &mut dyn Read,
    ) -> PshResult<u64>;

    /// Copy `remote_path` into `dst`. Errors are `TransferFailed`.
    fn pull_file(&mut self, remote_path: &str, dst: &mut dyn Write) -> PshResult<u64>;

    /// Move `from` onto `to` on the remote side, replacing it.
    fn rename(&mut self, from: &str, to: &str) -> PshResult<()>;

    /// Delete a remote file.
    fn remove(&mut self, path: &str) -> PshResult<()>;

    /// Tear the transport down. Calling it again is a no-op.
    fn close(&mut self);
}

/// One session channel carrying an interactive shell.
pub trait ShellChannel {
    /// Errors are `PtyRequestFailed`.
    fn request_pty(&mut self, pty: &PtySpec) -> PshResult<()>;

    /// Errors are `ShellStartFailed`.
    fn start_shell(&mut self) -> PshResult<()>;

    /// Pump the local streams to and from the remote shell until it exits,
    /// returning its exit status. Errors are `RemoteSessionError`.
    fn bridge(&mut self, streams: StdStreams) -> PshResult<i32>;

    /// Release the channel. Calling it again is a no-op.
    fn close(&mut self);
}

/// How the server's host key is checked while dialling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key. Service endpoints are ephemeral and re-issued on
    /// every resolution, so their keys are rarely stable.
    #[default]
    Insecure,
    /// Trust on first use, pinned in the known hosts file.
    Tofu,
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insecure" | "none" | "off" => Ok(Self::Insecure),
            "tofu" => Ok(Self::Tofu),
            other => Err(format!(
                "unknown host key policy '{other}' (expected insecure or tofu)"
            )),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insecure => f.write_str("insecure"),
            Self::Tofu => f.write_str("tofu"),
        }
    }
}

/// Decides whether to trust a host key that is not yet pinned (or changed).
pub trait HostKeyVerifier: Send + Sync {
    /// Return `true` to trust and pin `fingerprint` for `host`.
    fn accept(&self, host: &str, fingerprint: &str, status: &HostStatus) -> bool;
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell command that moves `from` onto `to`, refusing when `to` is a
/// directory (plain `mv` would move `from` into it and exit 0).
pub(crate) fn rename_command(from: &str, to: &str) -> String {
    let (from, to) = (shell_quote(from), shell_quote(to));
    format!("if [ -d {to} ]; then echo {to}: is a directory >&2; exit 1; fi; mv -f -- {from} {to}")
}

/// Outcome of a finished remote shell. A shell killed by a signal carries no
/// meaningful exit status.
pub(crate) fn shell_exit(status: i32, signal: Option<&str>) -> PshResult<i32> {
    match signal {
        Some(sig) if !sig.is_empty() => Err(PshError::RemoteSessionError(format!(
            "remote shell killed by signal SIG{sig}"
        ))),
        _ => Ok(status),
    }
}
