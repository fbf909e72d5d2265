//! CLI subcommand implementations.

pub mod connect;
pub mod copy;
pub mod endpoint;

use anyhow::{Context, Result};
use psh_client::{
    ConnectionDescriptor, HostKeyPolicy, HttpDirectory, KnownHosts, Resolver, SshConnector,
};
use tracing::debug;

use crate::config::Config;
use crate::known_hosts::PromptingVerifier;

/// Ask the control plane for a one-time descriptor for `service_id`.
pub async fn resolve(cfg: &Config, service_id: &str) -> Result<ConnectionDescriptor> {
    let directory = HttpDirectory::new(cfg.directory_config()?)
        .context("invalid control-plane endpoint")?;
    debug!(service = %service_id, "resolving");
    let descriptor = Resolver::new(directory).resolve(service_id).await?;
    Ok(descriptor)
}

/// SSH connector honouring the configured host key policy.
pub fn connector(cfg: &Config) -> Result<SshConnector> {
    let policy = cfg.host_key_policy()?;
    let connector = SshConnector::new(policy, cfg.dial_timeout());
    Ok(match policy {
        HostKeyPolicy::Insecure => connector,
        HostKeyPolicy::Tofu => {
            let known_hosts =
                KnownHosts::default_location().context("failed to locate known_hosts")?;
            debug!(path = %known_hosts.path().display(), "pinning host keys");
            connector
                .with_known_hosts(known_hosts)
                .with_verifier(Box::new(PromptingVerifier))
        }
    })
}
