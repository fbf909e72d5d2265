//! `psh connect <service>`: interactive shell on a service.
//!
//! Resolves the service, puts the local terminal in raw mode when it is one,
//! and bridges stdin/stdout/stderr to a remote pty until the shell exits.

use anyhow::{Context, Result};
use psh_client::session::open_interactive;
use psh_client::StdStreams;
use tracing::info;

use crate::config::Config;
use crate::terminal::RawModeGuard;

/// Returns the remote shell's exit status.
pub async fn run(cfg: &Config, service_id: &str) -> Result<i32> {
    let descriptor = super::resolve(cfg, service_id).await?;
    let connector = super::connector(cfg)?;
    let pty = cfg.pty();
    info!(service = %service_id, endpoint = %descriptor.authority(), "connecting");

    let guard = RawModeGuard::enter_if_tty()?;
    let outcome = tokio::task::spawn_blocking(move || {
        open_interactive(&connector, &descriptor, &pty, StdStreams::process())
    })
    .await
    .context("session task failed");
    drop(guard);

    let status = outcome??;
    info!(status, "remote shell exited");
    Ok(status)
}
