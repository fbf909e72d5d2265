//! psh-client: Rust client library for reaching control-plane managed services.
//!
//! Resolves a service identifier into one-time SSH credentials through the
//! control plane, then drives either an interactive pty session or a single
//! SCP transfer over a freshly dialled connection.
//!
//! # Quick Start
//!
//! ```no_run
//! use psh_client::{DirectoryConfig, HttpDirectory, Resolver, SshConnector, PtySpec, StdStreams};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = HttpDirectory::new(DirectoryConfig {
//!     endpoint: "https://cp.example.com:443".into(),
//!     ..Default::default()
//! })?;
//! let descriptor = Resolver::new(directory).resolve("svc-123").await?;
//!
//! let connector = SshConnector::insecure();
//! let status = tokio::task::spawn_blocking(move || {
//!     psh_client::session::open_interactive(&connector, &descriptor, &PtySpec::default(), StdStreams::process())
//! })
//! .await??;
//! std::process::exit(status);
//! # }
//! ```

pub mod directory;
pub mod file_transfer;
pub mod known_hosts;
pub mod resolver;
pub mod session;
pub mod transport;

// Re-export primary public types.
pub use directory::{DirectoryConfig, HttpDirectory, ServiceDirectory};
pub use file_transfer::TransferSummary;
pub use known_hosts::{HostStatus, KnownHosts};
pub use resolver::Resolver;
pub use session::{PtySpec, StdStreams};
pub use transport::{HostKeyPolicy, HostKeyVerifier, SshConnector};

// Re-export psh-core types for convenience.
pub use psh_core::{ConnectionDescriptor, PshError, PshResult, TransferPlan};
