use thiserror::Error;

/// Errors produced while resolving a service endpoint and driving a session
/// or transfer over it.
///
/// Every variant is terminal for the invoking command and maps to a stable
/// process exit code via [`PshError::exit_code`].
#[derive(Debug, Error)]
pub enum PshError {
    #[error("invalid path spec: {0}")]
    InvalidPathSpec(String),

    #[error("service lookup failed: {0}")]
    LookupFailed(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("ssh credential issuance failed: {0}")]
    CredentialIssuanceFailed(String),

    #[error("ssh dial failed: {0}")]
    DialFailed(String),

    #[error("ssh session setup failed: {0}")]
    SessionSetupFailed(String),

    #[error("pty request failed: {0}")]
    PtyRequestFailed(String),

    #[error("remote shell failed to start: {0}")]
    ShellStartFailed(String),

    #[error("remote session error: {0}")]
    RemoteSessionError(String),

    #[error("cannot open local file: {0}")]
    LocalFileOpenFailed(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),
}

impl PshError {
    /// Process exit code for this failure kind.
    ///
    /// Codes live in the BSD `sysexits` range (64..=74), clear of the usual
    /// 0..=2 shell statuses. `psh connect` passes a remote shell's status
    /// through unchanged, so a remote `exit 66` is indistinguishable from
    /// `ServiceNotFound` by exit code alone.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidPathSpec(_) => 64,
            Self::LookupFailed(_) => 65,
            Self::ServiceNotFound(_) => 66,
            Self::CredentialIssuanceFailed(_) => 67,
            Self::DialFailed(_) => 68,
            Self::SessionSetupFailed(_) => 69,
            Self::PtyRequestFailed(_) => 70,
            Self::ShellStartFailed(_) => 71,
            Self::RemoteSessionError(_) => 72,
            Self::LocalFileOpenFailed(_) => 73,
            Self::TransferFailed(_) => 74,
        }
    }
}

pub type PshResult<T> = Result<T, PshError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_kinds() -> Vec<PshError> {
        vec![
            PshError::InvalidPathSpec(String::new()),
            PshError::LookupFailed(String::new()),
            PshError::ServiceNotFound(String::new()),
            PshError::CredentialIssuanceFailed(String::new()),
            PshError::DialFailed(String::new()),
            PshError::SessionSetupFailed(String::new()),
            PshError::PtyRequestFailed(String::new()),
            PshError::ShellStartFailed(String::new()),
            PshError::RemoteSessionError(String::new()),
            PshError::LocalFileOpenFailed(String::new()),
            PshError::TransferFailed(String::new()),
        ]
    }

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let codes: HashSet<i32> = all_kinds().iter().map(PshError::exit_code).collect();
        assert_eq!(codes.len(), 11);
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&1));
    }

    #[test]
    fn display_includes_underlying_message() {
        let err = PshError::DialFailed("connection refused".into());
        assert_eq!(err.to_string(), "ssh dial failed: connection refused");
    }
}
