//! psh: shell and file copy on control-plane managed services.
//!
//! Resolves a service identifier to one-time SSH credentials through the
//! control plane, then opens an interactive pty session or copies a single
//! file over SCP.

mod commands;
mod config;
mod known_hosts;
mod terminal;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use psh_client::{HostKeyPolicy, PshError};
use tracing::error;

/// psh: service shell client
#[derive(Parser)]
#[command(name = "psh", version, about = "Shell and file copy on control-plane managed services")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Control-plane endpoint, scheme://host:port
    #[arg(long, global = true, env = "PSH_ENDPOINT")]
    endpoint: Option<String>,

    /// Control-plane access key
    #[arg(long, global = true, env = "PSH_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Control-plane secret key
    #[arg(long, global = true, env = "PSH_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Host key checking: insecure or tofu
    #[arg(long, global = true)]
    host_key_policy: Option<HostKeyPolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open an interactive shell on a service
    ///
    /// Exits with the remote shell's status. Local failures use 64-74, which a
    /// remote shell can also return; the `psh:` message on stderr tells them apart.
    Connect {
        /// Service identifier
        service: String,
    },

    /// Copy one file to or from a service (use service:path syntax)
    #[command(visible_alias = "cp")]
    Copy {
        /// Source path (local or service:path)
        src: String,
        /// Destination path (local or service:path)
        dst: String,
    },

    /// Resolve a service and print its one-time SSH endpoint
    Endpoint {
        /// Service identifier
        service: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Print the password instead of a mask
        #[arg(long)]
        show_password: bool,
    },
}

/// Process exit code for a failed command.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PshError>())
        .map_or(1, PshError::exit_code)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the bridged shell output.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("psh=debug,psh_cli=debug,psh_client=debug,psh_core=debug")
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("psh=warn,psh_cli=warn")
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("psh: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.apply(config::Overrides {
        endpoint: cli.endpoint,
        access_key: cli.access_key,
        secret_key: cli.secret_key,
        host_key_policy: cli.host_key_policy,
    });

    let result = match cli.command {
        Command::Connect { service } => commands::connect::run(&cfg, &service).await,
        Command::Copy { src, dst } => commands::copy::run(&cfg, &src, &dst).await.map(|()| 0),
        Command::Endpoint {
            service,
            json,
            show_password,
        } => commands::endpoint::run(&cfg, &service, json, show_password)
            .await
            .map(|()| 0),
    };

    match result {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("psh: {e:#}");
            std::process::exit(exit_code(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cp_is_an_alias_for_copy() {
        let cli = Cli::try_parse_from(["psh", "cp", "a.txt", "svc:/a.txt"]).unwrap();
        assert!(matches!(cli.command, Command::Copy { .. }));
    }

    #[test]
    fn host_key_policy_flag() {
        let cli =
            Cli::try_parse_from(["psh", "--host-key-policy", "tofu", "connect", "svc"]).unwrap();
        assert_eq!(cli.host_key_policy, Some(HostKeyPolicy::Tofu));
        assert!(Cli::try_parse_from(["psh", "--host-key-policy", "maybe", "connect", "svc"]).is_err());
    }

    #[test]
    fn exit_code_found_through_context() {
        let err = anyhow::Error::new(PshError::ServiceNotFound("svc".into())).context("resolving");
        assert_eq!(exit_code(&err), 66);
        assert_eq!(exit_code(&anyhow::anyhow!("bad config")), 1);
    }
}
