//! SSH transport over libssh2.
//!
//! Everything here blocks; async callers run it inside `spawn_blocking`.
//! The interactive bridge switches the session to non-blocking mode and
//! polls, because libssh2 serialises all channel I/O on one session lock.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use ssh2::{Channel, HashType, PtyModeOpcode, PtyModes, Session};
use tracing::{debug, info, warn};

use psh_core::{ConnectionDescriptor, PshError, PshResult};

use crate::known_hosts::{HostStatus, KnownHosts};
use crate::session::{PtySpec, StdStreams};

use super::{
    rename_command, shell_exit, shell_quote, Connection, Connector, HostKeyPolicy,
    HostKeyVerifier, ShellChannel,
};

/// Sleep between polls when neither side had anything to say.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read buffer for the interactive bridge.
const BRIDGE_BUF_SIZE: usize = 8192;

/// Dials services over SSH with password authentication.
pub struct SshConnector {
    policy: HostKeyPolicy,
    dial_timeout: Duration,
    known_hosts: Option<KnownHosts>,
    verifier: Option<Box<dyn HostKeyVerifier>>,
}

impl SshConnector {
    pub fn new(policy: HostKeyPolicy, dial_timeout: Duration) -> Self {
        Self {
            policy,
            dial_timeout,
            known_hosts: None,
            verifier: None,
        }
    }

    /// A connector that skips host key verification, 10 second dial timeout.
    pub fn insecure() -> Self {
        Self::new(HostKeyPolicy::Insecure, Duration::from_secs(10))
    }

    /// Known hosts store used by [`HostKeyPolicy::Tofu`]. Defaults to
    /// `~/.psh/known_hosts`.
    pub fn with_known_hosts(mut self, known_hosts: KnownHosts) -> Self {
        self.known_hosts = Some(known_hosts);
        self
    }

    /// Who to ask about unpinned or changed host keys. Without one, such keys
    /// are rejected.
    pub fn with_verifier(mut self, verifier: Box<dyn HostKeyVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    fn timeout_ms(&self) -> u32 {
        u32::try_from(self.dial_timeout.as_millis()).unwrap_or(u32::MAX)
    }

    fn verify_host_key(&self, session: &Session, descriptor: &ConnectionDescriptor) -> PshResult<()> {
        if self.policy == HostKeyPolicy::Insecure {
            debug!(host = %descriptor.authority(), "host key verification disabled");
            return Ok(());
        }

        let fingerprint = host_key_fingerprint(session).ok_or_else(|| {
            PshError::DialFailed("server presented no host key".into())
        })?;
        let host = descriptor.authority();

        let known_hosts = match &self.known_hosts {
            Some(kh) => kh.clone(),
            None => KnownHosts::default_location().map_err(|e| {
                PshError::DialFailed(format!("cannot open known hosts: {e}"))
            })?,
        };
        let status = known_hosts
            .verify_host(&host, &fingerprint)
            .map_err(|e| PshError::DialFailed(format!("cannot read known hosts: {e}")))?;

        if status == HostStatus::Known {
            debug!(host = %host, "host key matches known hosts");
            return Ok(());
        }

        let accepted = self
            .verifier
            .as_ref()
            .is_some_and(|v| v.accept(&host, &fingerprint, &status));
        if !accepted {
            return Err(PshError::DialFailed(format!(
                "host key for '{host}' was not accepted"
            )));
        }

        known_hosts
            .add_host(&host, &fingerprint)
            .map_err(|e| PshError::DialFailed(format!("cannot update known hosts: {e}")))?;
        info!(host = %host, "pinned host key");
        Ok(())
    }
}

impl Connector for SshConnector {
    type Conn = SshConnection;

    fn dial(&self, descriptor: &ConnectionDescriptor) -> PshResult<SshConnection> {
        let authority = descriptor.authority();
        let addrs: Vec<SocketAddr> = (descriptor.host(), descriptor.port())
            .to_socket_addrs()
            .map_err(|e| PshError::DialFailed(format!("cannot resolve {authority}: {e}")))?
            .collect();
        let tcp = connect_any(&addrs, self.dial_timeout)
            .map_err(|e| PshError::DialFailed(format!("cannot connect to {authority}: {e}")))?;
        debug!(endpoint = %authority, "tcp connected");

        let mut session = Session::new()
            .map_err(|e| PshError::DialFailed(format!("cannot create ssh session: {e}")))?;
        session.set_timeout(self.timeout_ms());
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| PshError::DialFailed(format!("ssh handshake with {authority}: {e}")))?;

        self.verify_host_key(&session, descriptor)?;

        session
            .userauth_password(descriptor.user(), descriptor.password())
            .map_err(|e| PshError::DialFailed(format!("authentication as '{}': {e}", descriptor.user())))?;
        if !session.authenticated() {
            return Err(PshError::DialFailed(format!(
                "authentication as '{}' was rejected",
                descriptor.user()
            )));
        }

        // Interactive waits are unbounded; only the dial is timed.
        session.set_timeout(0);
        info!(endpoint = %authority, user = %descriptor.user(), "ssh connected");

        Ok(SshConnection {
            session,
            closed: false,
        })
    }
}

/// An authenticated SSH session.
pub struct SshConnection {
    session: Session,
    closed: bool,
}

impl SshConnection {
    /// Run `command` on a fresh exec channel; non-zero exit is an error.
    fn exec(&mut self, command: &str) -> PshResult<()> {
        let fail = |e: &dyn std::fmt::Display| PshError::TransferFailed(format!("`{command}`: {e}"));

        let mut channel = self.session.channel_session().map_err(|e| fail(&e))?;
        channel.exec(command).map_err(|e| fail(&e))?;

        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| fail(&e))?;
        let mut sink = Vec::new();
        channel.read_to_end(&mut sink).map_err(|e| fail(&e))?;
        channel.wait_close().map_err(|e| fail(&e))?;

        let status = channel.exit_status().map_err(|e| fail(&e))?;
        if status != 0 {
            return Err(PshError::TransferFailed(format!(
                "`{command}` exited with {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Connection for SshConnection {
    type Shell = SshShell;

    fn open_shell_channel(&mut self) -> PshResult<SshShell> {
        let channel = self
            .session
            .channel_session()
            .map_err(|e| PshError::SessionSetupFailed(e.to_string()))?;
        Ok(SshShell {
            session: self.session.clone(),
            channel,
            closed: false,
        })
    }

    fn push_file(
        &mut self,
        remote_path: &str,
        mode: i32,
        size: u64,
        src: &mut dyn Read,
    ) -> PshResult<u64> {
        let fail = |e: &dyn std::fmt::Display| {
            PshError::TransferFailed(format!("scp to '{remote_path}': {e}"))
        };

        let mut channel = self
            .session
            .scp_send(Path::new(remote_path), mode, size, None)
            .map_err(|e| fail(&e))?;
        let written = io::copy(&mut (&mut *src).take(size), &mut channel).map_err(|e| fail(&e))?;
        if written != size {
            return Err(fail(&format!("local file shrank to {written} of {size} bytes")));
        }

        channel.send_eof().map_err(|e| fail(&e))?;
        channel.wait_eof().map_err(|e| fail(&e))?;
        channel.close().map_err(|e| fail(&e))?;
        channel.wait_close().map_err(|e| fail(&e))?;
        debug!(remote = %remote_path, bytes = written, "scp push complete");
        Ok(written)
    }

    fn pull_file(&mut self, remote_path: &str, dst: &mut dyn Write) -> PshResult<u64> {
        let fail = |e: &dyn std::fmt::Display| {
            PshError::TransferFailed(format!("scp from '{remote_path}': {e}"))
        };

        let (mut channel, stat) = self
            .session
            .scp_recv(Path::new(remote_path))
            .map_err(|e| fail(&e))?;
        let size = stat.size();
        let read = io::copy(&mut (&mut channel).take(size), dst).map_err(|e| fail(&e))?;
        if read != size {
            return Err(fail(&format!("stream ended after {read} of {size} bytes")));
        }

        channel.send_eof().map_err(|e| fail(&e))?;
        channel.wait_eof().map_err(|e| fail(&e))?;
        channel.close().map_err(|e| fail(&e))?;
        channel.wait_close().map_err(|e| fail(&e))?;
        debug!(remote = %remote_path, bytes = read, "scp pull complete");
        Ok(read)
    }

    fn rename(&mut self, from: &str, to: &str) -> PshResult<()> {
        self.exec(&rename_command(from, to))
    }

    fn remove(&mut self, path: &str) -> PshResult<()> {
        self.exec(&format!("rm -f -- {}", shell_quote(path)))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.disconnect(None, "psh finished", None) {
            debug!("ssh disconnect: {e}");
        }
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// A session channel hosting the remote shell.
pub struct SshShell {
    session: Session,
    channel: Channel,
    closed: bool,
}

impl ShellChannel for SshShell {
    fn request_pty(&mut self, pty: &PtySpec) -> PshResult<()> {
        let mut modes = PtyModes::new();
        modes.set_boolean(PtyModeOpcode::ECHO, pty.echo);
        modes.set_u32(PtyModeOpcode::TTY_OP_ISPEED, pty.speed);
        modes.set_u32(PtyModeOpcode::TTY_OP_OSPEED, pty.speed);

        self.channel
            .request_pty(&pty.term, Some(modes), Some((pty.cols, pty.rows, 0, 0)))
            .map_err(|e| PshError::PtyRequestFailed(e.to_string()))?;
        debug!(term = %pty.term, rows = pty.rows, cols = pty.cols, "pty granted");
        Ok(())
    }

    fn start_shell(&mut self) -> PshResult<()> {
        self.channel
            .shell()
            .map_err(|e| PshError::ShellStartFailed(e.to_string()))
    }

    fn bridge(&mut self, streams: StdStreams) -> PshResult<i32> {
        let StdStreams {
            input,
            mut output,
            mut error,
        } = streams;
        let fail = |e: io::Error| PshError::RemoteSessionError(e.to_string());

        let input_rx = spawn_input_reader(input);
        let mut stdin_open = true;
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = vec![0u8; BRIDGE_BUF_SIZE];

        self.session.set_blocking(false);
        let pumped = (|| -> PshResult<()> {
            loop {
                let mut idle = true;

                if let Some(n) = read_nonblocking(&mut self.channel, &mut buf).map_err(fail)? {
                    output.write_all(&buf[..n]).map_err(fail)?;
                    output.flush().map_err(fail)?;
                    idle = false;
                }
                if let Some(n) =
                    read_nonblocking(&mut self.channel.stderr(), &mut buf).map_err(fail)?
                {
                    error.write_all(&buf[..n]).map_err(fail)?;
                    error.flush().map_err(fail)?;
                    idle = false;
                }

                // Input is taken one chunk at a time; a full send window leaves
                // the rest pending while remote output keeps draining.
                if pending.is_empty() && stdin_open {
                    match input_rx.try_recv() {
                        Ok(bytes) => pending = bytes,
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => {
                            debug!("local input closed, sending eof");
                            retry_would_block(|| self.channel.send_eof()).map_err(fail)?;
                            stdin_open = false;
                        }
                    }
                }
                if !pending.is_empty()
                    && write_pending(&mut self.channel, &mut pending).map_err(fail)?
                {
                    idle = false;
                }

                if idle {
                    if self.channel.eof() {
                        return Ok(());
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        })();
        self.session.set_blocking(true);
        pumped?;

        self.channel
            .wait_close()
            .map_err(|e| PshError::RemoteSessionError(e.to_string()))?;
        let status = self
            .channel
            .exit_status()
            .map_err(|e| PshError::RemoteSessionError(e.to_string()))?;
        let signal = self
            .channel
            .exit_signal()
            .map_err(|e| PshError::RemoteSessionError(e.to_string()))?;
        let status = shell_exit(status, signal.exit_signal.as_deref())?;
        info!(status, "remote shell exited");
        Ok(status)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.close() {
            warn!("closing ssh channel: {e}");
        }
    }
}

/// Forward local input on a helper thread; the bridge drains it with
/// `try_recv`. The channel disconnects on local EOF or a read error.
///
/// Once the remote shell exits the thread may stay parked in a blocking read
/// of stdin; it is reaped at process exit.
fn spawn_input_reader(mut input: Box<dyn Read + Send>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("local input read error: {e}");
                    break;
                }
            }
        }
    });
    rx
}

/// `Ok(None)` when nothing is available right now.
fn read_nonblocking(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<Option<usize>> {
    match reader.read(buf) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

/// One non-blocking write of `pending`, dropping whatever was accepted.
/// Returns whether any bytes went out.
fn write_pending(writer: &mut impl Write, pending: &mut Vec<u8>) -> io::Result<bool> {
    match writer.write(pending) {
        Ok(0) => Err(io::ErrorKind::WriteZero.into()),
        Ok(n) => {
            pending.drain(..n);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

fn retry_would_block(mut op: impl FnMut() -> Result<(), ssh2::Error>) -> io::Result<()> {
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) => {
                let e = io::Error::from(e);
                if e.kind() != io::ErrorKind::WouldBlock {
                    return Err(e);
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Try each resolved address in turn with a bounded connect.
fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(addr = %addr, "connect failed: {e}");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Hex SHA-256 of the server host key.
fn host_key_fingerprint(session: &Session) -> Option<String> {
    session.host_key_hash(HashType::Sha256).map(hex::encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_nonblocking_maps_eof_to_none() {
        let mut empty: &[u8] = &[];
        let mut buf = [0u8; 4];
        assert_eq!(read_nonblocking(&mut empty, &mut buf).unwrap(), None);
    }

    #[test]
    fn read_nonblocking_returns_count() {
        let mut data: &[u8] = b"abc";
        let mut buf = [0u8; 8];
        assert_eq!(read_nonblocking(&mut data, &mut buf).unwrap(), Some(3));
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn input_reader_forwards_then_disconnects() {
        let rx = spawn_input_reader(Box::new(io::Cursor::new(b"ls\n".to_vec())));
        let mut got = Vec::new();
        while let Ok(chunk) = rx.recv() {
            got.extend(chunk);
        }
        assert_eq!(got, b"ls\n");
    }

    /// Accepts `window` bytes, then reports a full send window.
    struct Throttled {
        window: usize,
        sent: Vec<u8>,
    }

    impl Write for Throttled {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.window == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.window);
            self.window -= n;
            self.sent.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn full_send_window_keeps_input_pending() {
        let mut writer = Throttled {
            window: 3,
            sent: Vec::new(),
        };
        let mut pending = b"hello".to_vec();

        assert!(write_pending(&mut writer, &mut pending).unwrap());
        assert_eq!(pending, b"lo");
        // Window full: returns at once instead of waiting.
        assert!(!write_pending(&mut writer, &mut pending).unwrap());
        assert_eq!(pending, b"lo");

        writer.window = 10;
        assert!(write_pending(&mut writer, &mut pending).unwrap());
        assert!(pending.is_empty());
        assert_eq!(writer.sent, b"hello");
    }

    #[test]
    fn connect_any_without_addresses() {
        let err = connect_any(&[], Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn dial_refused_is_dial_failed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let descriptor =
            ConnectionDescriptor::from_connection_url(&format!("pod@127.0.0.1:{port}"), "x").unwrap();
        let connector = SshConnector::new(HostKeyPolicy::Insecure, Duration::from_millis(500));
        let err = connector.dial(&descriptor).err().unwrap();
        assert!(matches!(err, PshError::DialFailed(_)));
    }
}
