//! Terminal raw mode for interactive shells.
//!
//! The remote pty does all line editing and echo, so the local terminal is
//! put in raw mode for the lifetime of the bridge and restored on drop.

use anyhow::{Context, Result};
use crossterm::terminal;
use crossterm::tty::IsTty;

/// RAII guard that restores the terminal to its original mode on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Enter raw terminal mode.
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self { _private: () })
    }

    /// Enter raw mode only when stdin is a terminal.
    pub fn enter_if_tty() -> Result<Option<Self>> {
        if std::io::stdin().is_tty() {
            Self::enter().map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Run `f` with the terminal in cooked mode, restoring raw mode afterwards
/// if it was on.
pub fn with_cooked_mode<T>(f: impl FnOnce() -> T) -> T {
    let was_raw = terminal::is_raw_mode_enabled().unwrap_or(false);
    if was_raw {
        let _ = terminal::disable_raw_mode();
    }
    let out = f();
    if was_raw {
        let _ = terminal::enable_raw_mode();
    }
    out
}
