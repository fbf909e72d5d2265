//! `psh copy <src> <dst>`: single-file transfer, scp style.
//!
//! Exactly one side is `service:path`. The arguments are validated before
//! anything touches the network.

use anyhow::{Context, Result};
use psh_client::file_transfer;
use psh_core::{Direction, TransferPlan};

use crate::config::Config;

pub async fn run(cfg: &Config, source: &str, destination: &str) -> Result<()> {
    let plan = TransferPlan::parse(source, destination)?;
    let descriptor = super::resolve(cfg, &plan.service_id).await?;
    let connector = super::connector(cfg)?;

    let summary = {
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || file_transfer::copy(&connector, &plan, &descriptor))
            .await
            .context("transfer task failed")??
    };

    let arrow = match summary.direction {
        Direction::Upload => format!(
            "{} -> {}:{}",
            summary.local_path.display(),
            plan.service_id,
            summary.remote_path
        ),
        Direction::Download => format!(
            "{}:{} -> {}",
            plan.service_id,
            summary.remote_path,
            summary.local_path.display()
        ),
    };
    eprintln!("{arrow} ({} bytes)", summary.bytes);
    Ok(())
}
