//! Service identifier → one-time connection descriptor.
//!
//! Two control-plane calls, strictly in order: describe the service to learn
//! its zone, then ask that zone to issue SSH credentials. Nothing is cached
//! and nothing is retried; every call to [`Resolver::resolve`] yields a fresh
//! single-use descriptor.

use tracing::{debug, info};

use psh_core::messages::Page;
use psh_core::{ConnectionDescriptor, PshError, PshResult};

use crate::directory::ServiceDirectory;

/// Resolves service identifiers against a [`ServiceDirectory`].
pub struct Resolver<D> {
    directory: D,
}

impl<D: ServiceDirectory> Resolver<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Look up `service_id` and issue a descriptor for exactly one connection.
    pub async fn resolve(&self, service_id: &str) -> PshResult<ConnectionDescriptor> {
        if service_id.is_empty() {
            return Err(PshError::LookupFailed("service identifier is empty".into()));
        }

        let rows = self
            .directory
            .describe_services(service_id, Page::first())
            .await
            .map_err(|e| PshError::LookupFailed(e.to_string()))?;

        let service = rows
            .first()
            .ok_or_else(|| PshError::ServiceNotFound(service_id.to_string()))?;
        let zone_code = service.zone_code();
        debug!(service = %service_id, zone = %zone_code, "service located");

        let entries = self
            .directory
            .describe_service_ssh(zone_code, service_id)
            .await
            .map_err(|e| PshError::CredentialIssuanceFailed(e.to_string()))?;

        let entry = entries.first().ok_or_else(|| {
            PshError::CredentialIssuanceFailed(format!(
                "control plane issued no ssh credentials for '{service_id}'"
            ))
        })?;

        let descriptor = ConnectionDescriptor::from_connection_url(&entry.url, &entry.password)?;
        info!(
            service = %service_id,
            zone = %zone_code,
            endpoint = %descriptor.authority(),
            "resolved endpoint"
        );
        Ok(descriptor)
    }
}
