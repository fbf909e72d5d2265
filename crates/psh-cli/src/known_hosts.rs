//! Interactive host key prompts for `--host-key-policy tofu`.
//!
//! Plugs into the SSH connector as its [`HostKeyVerifier`]: on first contact
//! the user is asked to accept the server's key, and a changed key is shown
//! with a loud warning before asking again.

use dialoguer::Confirm;
use psh_client::{HostKeyVerifier, HostStatus};
use tracing::warn;

use crate::terminal;

/// Asks on the controlling terminal.
pub struct PromptingVerifier;

impl HostKeyVerifier for PromptingVerifier {
    fn accept(&self, host: &str, fingerprint: &str, status: &HostStatus) -> bool {
        terminal::with_cooked_mode(|| prompt(host, fingerprint, status))
    }
}

fn short(fp: &str) -> &str {
    &fp[..fp.len().min(16)]
}

fn prompt(host: &str, fingerprint: &str, status: &HostStatus) -> bool {
    let question = match status {
        HostStatus::Known => return true,
        HostStatus::Unknown => {
            eprintln!("The authenticity of host '{host}' cannot be established.");
            eprintln!("Server key SHA256 fingerprint is {}.", short(fingerprint));
            "Are you sure you want to continue connecting?"
        }
        HostStatus::Changed { expected } => {
            eprintln!("@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@");
            eprintln!("@    WARNING: REMOTE HOST IDENTIFICATION HAS CHANGED!    @");
            eprintln!("@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@");
            eprintln!("The server key fingerprint for '{host}' has changed.");
            eprintln!("  Previous: {}", short(expected));
            eprintln!("  Current:  {}", short(fingerprint));
            warn!(
                host = %host,
                old_fp = %short(expected),
                new_fp = %short(fingerprint),
                "host key has changed"
            );
            "Do you want to update the known host and continue?"
        }
    };

    match Confirm::new().with_prompt(question).default(false).interact() {
        Ok(accepted) => {
            if accepted {
                eprintln!("Warning: Permanently added '{host}' to the list of known hosts.");
            }
            accepted
        }
        Err(e) => {
            warn!("failed to read user input: {e}");
            false
        }
    }
}
