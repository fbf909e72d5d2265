//! psh-core: Shared types for the psh service shell.
//!
//! Provides the error taxonomy and its exit codes, the scp-style path spec
//! parser, one-time connection descriptors, and the control-plane wire
//! messages consumed by the endpoint resolver.

pub mod descriptor;
pub mod error;
pub mod messages;
pub mod pathspec;

// Re-export commonly used items at crate root.
pub use descriptor::{ConnectionDescriptor, POD_USER};
pub use error::{PshError, PshResult};
pub use messages::{DirectoryError, Page, ServiceRow, SshEntry};
pub use pathspec::{Direction, PathSpec, TransferPlan};
