//! Control-plane request/response payloads for service description and SSH
//! credential issuance.
//!
//! Responses arrive wrapped in an envelope carrying an application status
//! code. [`Envelope::into_result`] turns that into a tagged `Result` so no
//! caller ever compares status codes itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application status code the control plane uses for success.
pub const SUCCESS_CODE: i64 = 200;

/// Failure reported by the service directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The control plane answered with a non-success status.
    #[error("control plane returned {code}: {message}")]
    Status { code: i64, message: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Pagination window for list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_num: u32,
    pub page_size: u32,
}

impl Page {
    /// The only page this client ever asks for.
    pub fn first() -> Self {
        Self {
            page_num: 1,
            page_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeServicesRequest {
    #[serde(flatten)]
    pub page: Page,
    pub service_uuid: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeServicesSshRequest {
    pub zone_code: String,
    pub service_uuids: Vec<String>,
}

/// Status wrapper around every control-plane response body.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T: Default> Envelope<T> {
    /// Success payload, or the status the control plane reported.
    ///
    /// A success response without a `data` member yields `T::default()`.
    pub fn into_result(self) -> Result<T, DirectoryError> {
        if self.code != SUCCESS_CODE {
            return Err(DirectoryError::Status {
                code: self.code,
                message: self.message,
            });
        }
        Ok(self.data.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesPage {
    #[serde(default)]
    pub rows: Vec<ServiceRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRow {
    pub service_uuid: String,
    pub zone: Zone,
    #[serde(default)]
    pub service_status: Option<String>,
}

impl ServiceRow {
    pub fn zone_code(&self) -> &str {
        &self.zone.zone_code
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshPage {
    #[serde(default)]
    pub sshes: Vec<SshEntry>,
}

/// One issued SSH credential: `<user>@<host>:<port>` plus a one-time password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SshEntry {
    pub url: String,
    pub password: String,
}

impl std::fmt::Debug for SshEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshEntry")
            .field("url", &self.url)
            .field("password", &"<redacted>")
            .finish()
    }
}
