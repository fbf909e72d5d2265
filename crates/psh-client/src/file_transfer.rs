//! Single-file SCP transfers to and from a service.
//!
//! Uploads land on a temporary sibling of the target and are renamed into
//! place only once every byte arrived, so the target is either the old file
//! or the complete new one. Downloads do the same locally with a `.part`
//! file. Remote files are always created with mode `0655`.

use std::fs::{self, File};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use psh_core::{ConnectionDescriptor, Direction, PshError, PshResult, TransferPlan};

use crate::transport::{Connection, Connector};

/// Permission bits for every file written on the remote side.
pub const REMOTE_FILE_MODE: i32 = 0o655;

/// What a finished transfer moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub direction: Direction,
    pub bytes: u64,
    pub local_path: PathBuf,
    pub remote_path: String,
}

/// Perform the transfer described by `plan` over a fresh connection.
pub fn copy<C: Connector>(
    connector: &C,
    plan: &TransferPlan,
    descriptor: &ConnectionDescriptor,
) -> PshResult<TransferSummary> {
    let mut conn = connector.dial(descriptor)?;
    let result = match plan.direction {
        Direction::Upload => upload(&mut conn, plan),
        Direction::Download => download(&mut conn, plan),
    };
    conn.close();
    debug!(endpoint = %descriptor.authority(), "transport released");

    if let Ok(summary) = &result {
        info!(
            direction = ?summary.direction,
            bytes = summary.bytes,
            local = %summary.local_path.display(),
            remote = %summary.remote_path,
            "transfer complete"
        );
    }
    result
}

fn upload<T: Connection>(conn: &mut T, plan: &TransferPlan) -> PshResult<TransferSummary> {
    let local_path = PathBuf::from(&plan.local_path);
    let mut file = File::open(&local_path).map_err(|e| {
        PshError::LocalFileOpenFailed(format!("{}: {e}", local_path.display()))
    })?;
    let size = file
        .metadata()
        .map_err(|e| PshError::LocalFileOpenFailed(format!("{}: {e}", local_path.display())))?
        .len();

    let staging = staging_path(&plan.remote_path);
    debug!(local = %local_path.display(), staging = %staging, size, "uploading");

    let pushed = conn
        .push_file(&staging, REMOTE_FILE_MODE, size, &mut file)
        .and_then(|bytes| conn.rename(&staging, &plan.remote_path).map(|()| bytes));
    drop(file);

    match pushed {
        Ok(bytes) => Ok(TransferSummary {
            direction: Direction::Upload,
            bytes,
            local_path,
            remote_path: plan.remote_path.clone(),
        }),
        Err(e) => {
            if let Err(cleanup) = conn.remove(&staging) {
                warn!(staging = %staging, "could not remove partial upload: {cleanup}");
            }
            Err(e)
        }
    }
}

fn download<T: Connection>(conn: &mut T, plan: &TransferPlan) -> PshResult<TransferSummary> {
    let local_path = PathBuf::from(&plan.local_path);
    let part = PathBuf::from(format!("{}.part", plan.local_path));
    let mut file = File::create(&part)
        .map_err(|e| PshError::LocalFileOpenFailed(format!("{}: {e}", part.display())))?;
    debug!(remote = %plan.remote_path, part = %part.display(), "downloading");

    let pulled = conn.pull_file(&plan.remote_path, &mut file).and_then(|bytes| {
        file.sync_all()
            .map(|()| bytes)
            .map_err(|e| PshError::TransferFailed(format!("{}: {e}", part.display())))
    });
    drop(file);

    let finished = pulled.and_then(|bytes| {
        fs::rename(&part, &local_path)
            .map(|()| bytes)
            .map_err(|e| PshError::TransferFailed(format!("{}: {e}", local_path.display())))
    });

    match finished {
        Ok(bytes) => Ok(TransferSummary {
            direction: Direction::Download,
            bytes,
            local_path,
            remote_path: plan.remote_path.clone(),
        }),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&part) {
                warn!(part = %part.display(), "could not remove partial download: {cleanup}");
            }
            Err(e)
        }
    }
}

/// Temporary sibling of `remote_path`, so the final rename stays on one
/// filesystem.
fn staging_path(remote_path: &str) -> String {
    format!("{remote_path}.psh-{:08x}.tmp", rand::random::<u32>())
}
