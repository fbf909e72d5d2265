//! In-memory transport for driver tests.
//!
//! Records every step attempted, counts transport closes, and keeps remote
//! files in a map so transfers can be checked byte for byte.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use psh_core::{ConnectionDescriptor, PshError, PshResult};

use crate::session::{PtySpec, StdStreams};

use super::{shell_exit, Connection, Connector, ShellChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Dial,
    OpenChannel,
    RequestPty,
    StartShell,
    Bridge,
    CloseChannel,
    Push,
    Pull,
    Rename,
    Remove,
    CloseTransport,
}

#[derive(Default)]
struct State {
    steps: Vec<Step>,
    transport_closes: usize,
    last_pty: Option<PtySpec>,
    shell_input: Vec<u8>,
    files: HashMap<String, (i32, Vec<u8>)>,
    dirs: HashSet<String>,
}

pub fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::from_connection_url("pod@10.0.0.5:22", "p@ss").unwrap()
}

fn failure(step: Step) -> PshError {
    let msg = format!("injected failure at {step:?}");
    match step {
        Step::Dial => PshError::DialFailed(msg),
        Step::OpenChannel => PshError::SessionSetupFailed(msg),
        Step::RequestPty => PshError::PtyRequestFailed(msg),
        Step::StartShell => PshError::ShellStartFailed(msg),
        Step::Bridge => PshError::RemoteSessionError(msg),
        _ => PshError::TransferFailed(msg),
    }
}

#[derive(Default)]
pub struct MockConnector {
    state: Arc<Mutex<State>>,
    fail_at: Option<Step>,
    exit_status: i32,
    exit_signal: Option<String>,
    shell_output: Vec<u8>,
}

impl MockConnector {
    pub fn failing_at(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn with_exit_status(mut self, status: i32) -> Self {
        self.exit_status = status;
        self
    }

    pub fn with_exit_signal(mut self, signal: &str) -> Self {
        self.exit_signal = Some(signal.to_string());
        self
    }

    pub fn with_shell_output(mut self, bytes: &[u8]) -> Self {
        self.shell_output = bytes.to_vec();
        self
    }

    pub fn with_remote_file(self, path: &str, bytes: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), (0o644, bytes.to_vec()));
        self
    }

    pub fn with_remote_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().dirs.insert(path.to_string());
        self
    }

    pub fn steps(&self) -> Vec<Step> {
        self.state.lock().unwrap().steps.clone()
    }

    pub fn transport_closes(&self) -> usize {
        self.state.lock().unwrap().transport_closes
    }

    pub fn last_pty(&self) -> Option<PtySpec> {
        self.state.lock().unwrap().last_pty.clone()
    }

    pub fn shell_input(&self) -> Vec<u8> {
        self.state.lock().unwrap().shell_input.clone()
    }

    pub fn remote_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn remote_mode(&self, path: &str) -> Option<i32> {
        self.state.lock().unwrap().files.get(path).map(|(mode, _)| *mode)
    }

    pub fn remote_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.lock().unwrap().files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// Record `step` and fail if it is the injected one.
fn enter(state: &Mutex<State>, fail_at: Option<Step>, step: Step) -> PshResult<()> {
    state.lock().unwrap().steps.push(step);
    if fail_at == Some(step) {
        return Err(failure(step));
    }
    Ok(())
}

impl Connector for MockConnector {
    type Conn = MockConnection;

    fn dial(&self, _descriptor: &ConnectionDescriptor) -> PshResult<MockConnection> {
        enter(&self.state, self.fail_at, Step::Dial)?;
        Ok(MockConnection {
            state: self.state.clone(),
            fail_at: self.fail_at,
            exit_status: self.exit_status,
            exit_signal: self.exit_signal.clone(),
            shell_output: self.shell_output.clone(),
        })
    }
}

pub struct MockConnection {
    state: Arc<Mutex<State>>,
    fail_at: Option<Step>,
    exit_status: i32,
    exit_signal: Option<String>,
    shell_output: Vec<u8>,
}

impl Connection for MockConnection {
    type Shell = MockShell;

    fn open_shell_channel(&mut self) -> PshResult<MockShell> {
        enter(&self.state, self.fail_at, Step::OpenChannel)?;
        Ok(MockShell {
            state: self.state.clone(),
            fail_at: self.fail_at,
            exit_status: self.exit_status,
            exit_signal: self.exit_signal.clone(),
            shell_output: self.shell_output.clone(),
        })
    }

    fn push_file(
        &mut self,
        remote_path: &str,
        mode: i32,
        size: u64,
        src: &mut dyn Read,
    ) -> PshResult<u64> {
        enter(&self.state, self.fail_at, Step::Push)?;
        let mut bytes = Vec::new();
        src.take(size)
            .read_to_end(&mut bytes)
            .map_err(|e| PshError::TransferFailed(e.to_string()))?;
        let n = bytes.len() as u64;
        self.state
            .lock()
            .unwrap()
            .files
            .insert(remote_path.to_string(), (mode, bytes));
        Ok(n)
    }

    fn pull_file(&mut self, remote_path: &str, dst: &mut dyn Write) -> PshResult<u64> {
        enter(&self.state, self.fail_at, Step::Pull)?;
        let bytes = self
            .state
            .lock()
            .unwrap()
            .files
            .get(remote_path)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| PshError::TransferFailed(format!("{remote_path}: no such file")))?;
        dst.write_all(&bytes)
            .map_err(|e| PshError::TransferFailed(e.to_string()))?;
        Ok(bytes.len() as u64)
    }

    fn rename(&mut self, from: &str, to: &str) -> PshResult<()> {
        enter(&self.state, self.fail_at, Step::Rename)?;
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(to) {
            return Err(PshError::TransferFailed(format!("{to}: is a directory")));
        }
        let entry = state
            .files
            .remove(from)
            .ok_or_else(|| PshError::TransferFailed(format!("{from}: no such file")))?;
        state.files.insert(to.to_string(), entry);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> PshResult<()> {
        enter(&self.state, None, Step::Remove)?;
        self.state.lock().unwrap().files.remove(path);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.steps.push(Step::CloseTransport);
        state.transport_closes += 1;
    }
}

pub struct MockShell {
    state: Arc<Mutex<State>>,
    fail_at: Option<Step>,
    exit_status: i32,
    exit_signal: Option<String>,
    shell_output: Vec<u8>,
}

impl ShellChannel for MockShell {
    fn request_pty(&mut self, pty: &PtySpec) -> PshResult<()> {
        enter(&self.state, self.fail_at, Step::RequestPty)?;
        self.state.lock().unwrap().last_pty = Some(pty.clone());
        Ok(())
    }

    fn start_shell(&mut self) -> PshResult<()> {
        enter(&self.state, self.fail_at, Step::StartShell)
    }

    fn bridge(&mut self, mut streams: StdStreams) -> PshResult<i32> {
        enter(&self.state, self.fail_at, Step::Bridge)?;
        let mut input = Vec::new();
        streams
            .input
            .read_to_end(&mut input)
            .map_err(|e| PshError::RemoteSessionError(e.to_string()))?;
        self.state.lock().unwrap().shell_input = input;
        streams
            .output
            .write_all(&self.shell_output)
            .map_err(|e| PshError::RemoteSessionError(e.to_string()))?;
        shell_exit(self.exit_status, self.exit_signal.as_deref())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().steps.push(Step::CloseChannel);
    }
}

/// A cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
