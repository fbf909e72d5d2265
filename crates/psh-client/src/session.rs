//! Interactive shell sessions.
//!
//! [`open_interactive`] turns the local process into a dumb terminal for a
//! remote shell: dial, open a channel, request a pty, start the shell, then
//! pump stdin/stdout/stderr until the shell exits. Each step runs only if the
//! previous one succeeded, and the channel and transport are released exactly
//! once whatever happens.

use std::io::{self, Read, Write};

use tracing::{debug, info};

use psh_core::{ConnectionDescriptor, PshResult};

use crate::transport::{Connection, Connector, ShellChannel};

/// Pseudo-terminal parameters sent with the pty request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtySpec {
    /// `TERM` value for the remote side.
    pub term: String,
    pub rows: u32,
    pub cols: u32,
    /// Remote echo (the local terminal already echoes).
    pub echo: bool,
    /// Input and output baud rate.
    pub speed: u32,
}

impl Default for PtySpec {
    fn default() -> Self {
        Self {
            term: "linux".to_string(),
            rows: 32,
            cols: 160,
            echo: false,
            speed: 14400,
        }
    }
}

/// The local ends of the bridge.
pub struct StdStreams {
    pub input: Box<dyn Read + Send>,
    pub output: Box<dyn Write + Send>,
    pub error: Box<dyn Write + Send>,
}

impl StdStreams {
    /// This process's stdin, stdout and stderr.
    pub fn process() -> Self {
        Self {
            input: Box::new(io::stdin()),
            output: Box::new(io::stdout()),
            error: Box::new(io::stderr()),
        }
    }
}

/// Run an interactive shell on the endpoint described by `descriptor`.
///
/// Returns the remote shell's exit status.
pub fn open_interactive<C: Connector>(
    connector: &C,
    descriptor: &ConnectionDescriptor,
    pty: &PtySpec,
    streams: StdStreams,
) -> PshResult<i32> {
    let mut conn = connector.dial(descriptor)?;
    let result = run_on_connection(&mut conn, pty, streams);
    conn.close();
    debug!(endpoint = %descriptor.authority(), "transport released");
    result
}

fn run_on_connection<T: Connection>(
    conn: &mut T,
    pty: &PtySpec,
    streams: StdStreams,
) -> PshResult<i32> {
    let mut shell = conn.open_shell_channel()?;
    let result = run_shell(&mut shell, pty, streams);
    shell.close();
    result
}

fn run_shell<S: ShellChannel>(shell: &mut S, pty: &PtySpec, streams: StdStreams) -> PshResult<i32> {
    shell.request_pty(pty)?;
    shell.start_shell()?;
    info!("remote shell started");
    shell.bridge(streams)
}
