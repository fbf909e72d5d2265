//! scp-style `[service:]path` argument parsing.
//!
//! A raw argument containing a colon names a path on a remote service: the
//! text before the first colon is the service identifier, the rest is the
//! remote path. Anything else is a local filesystem path. Paths are passed
//! through untouched.

use crate::error::{PshError, PshResult};

/// One side of a copy, as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    Local(String),
    Remote { service_id: String, path: String },
}

impl PathSpec {
    /// Classify a single raw argument.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((service_id, path)) => Self::Remote {
                service_id: service_id.to_string(),
                path: path.to_string(),
            },
            None => Self::Local(raw.to_string()),
        }
    }
}

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local file → remote service.
    Upload,
    /// Remote service → local file.
    Download,
}

/// A validated (source, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub direction: Direction,
    pub service_id: String,
    pub local_path: String,
    pub remote_path: String,
}

impl TransferPlan {
    /// Parse a source/destination pair where exactly one side is remote.
    pub fn parse(source: &str, destination: &str) -> PshResult<Self> {
        let plan = match (PathSpec::parse(source), PathSpec::parse(destination)) {
            (PathSpec::Local(local_path), PathSpec::Remote { service_id, path }) => Self {
                direction: Direction::Upload,
                service_id,
                local_path,
                remote_path: path,
            },
            (PathSpec::Remote { service_id, path }, PathSpec::Local(local_path)) => Self {
                direction: Direction::Download,
                service_id,
                local_path,
                remote_path: path,
            },
            (PathSpec::Local(_), PathSpec::Local(_)) => {
                return Err(PshError::InvalidPathSpec(format!(
                    "neither '{source}' nor '{destination}' names a remote service (use service:path)"
                )));
            }
            (PathSpec::Remote { .. }, PathSpec::Remote { .. }) => {
                return Err(PshError::InvalidPathSpec(format!(
                    "both '{source}' and '{destination}' are remote; exactly one side must be service:path"
                )));
            }
        };

        if plan.service_id.is_empty() {
            return Err(PshError::InvalidPathSpec(
                "empty service identifier before ':'".into(),
            ));
        }
        if plan.remote_path.is_empty() {
            return Err(PshError::InvalidPathSpec(format!(
                "empty remote path for service '{}'",
                plan.service_id
            )));
        }
        if plan.local_path.is_empty() {
            return Err(PshError::InvalidPathSpec("empty local path".into()));
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_destination_is_upload() {
        let plan = TransferPlan::parse("/local/path", "svc:/remote/path").unwrap();
        assert_eq!(plan.direction, Direction::Upload);
        assert_eq!(plan.service_id, "svc");
        assert_eq!(plan.remote_path, "/remote/path");
        assert_eq!(plan.local_path, "/local/path");
    }

    #[test]
    fn parsing_is_idempotent() {
        let a = TransferPlan::parse("/local/path", "svc:/remote/path").unwrap();
        let b = TransferPlan::parse("/local/path", "svc:/remote/path").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn relative_local_upload() {
        let plan = TransferPlan::parse("local.txt", "svc-123:/data/out.txt").unwrap();
        assert_eq!(
            plan,
            TransferPlan {
                direction: Direction::Upload,
                service_id: "svc-123".into(),
                remote_path: "/data/out.txt".into(),
                local_path: "local.txt".into(),
            }
        );
    }

    #[test]
    fn remote_source_is_download() {
        let plan = TransferPlan::parse("svc-9:/var/log/app.log", "./app.log").unwrap();
        assert_eq!(plan.direction, Direction::Download);
        assert_eq!(plan.service_id, "svc-9");
        assert_eq!(plan.remote_path, "/var/log/app.log");
        assert_eq!(plan.local_path, "./app.log");
    }

    #[test]
    fn splits_on_first_colon_only() {
        let plan = TransferPlan::parse("a.txt", "svc:/odd:name").unwrap();
        assert_eq!(plan.service_id, "svc");
        assert_eq!(plan.remote_path, "/odd:name");
    }

    #[test]
    fn neither_remote_fails() {
        let err = TransferPlan::parse("a.txt", "b.txt").unwrap_err();
        assert!(matches!(err, PshError::InvalidPathSpec(_)));
    }

    #[test]
    fn both_remote_fails() {
        let err = TransferPlan::parse("svc-a:/x", "svc-b:/y").unwrap_err();
        assert!(matches!(err, PshError::InvalidPathSpec(_)));
    }

    #[test]
    fn empty_service_fails() {
        assert!(TransferPlan::parse("a.txt", ":/x").is_err());
    }

    #[test]
    fn empty_remote_path_fails() {
        assert!(TransferPlan::parse("a.txt", "svc:").is_err());
    }

    #[test]
    fn empty_local_path_fails() {
        assert!(TransferPlan::parse("", "svc:/x").is_err());
    }

    #[test]
    fn separators_pass_through() {
        let plan = TransferPlan::parse(r"dir\file.txt", "svc:relative/../x").unwrap();
        assert_eq!(plan.local_path, r"dir\file.txt");
        assert_eq!(plan.remote_path, "relative/../x");
    }

    #[test]
    fn single_spec_classification() {
        assert!(matches!(PathSpec::parse("svc:/a"), PathSpec::Remote { .. }));
        assert_eq!(PathSpec::parse("/a"), PathSpec::Local("/a".into()));
    }
}
