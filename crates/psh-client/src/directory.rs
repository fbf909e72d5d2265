//! The control-plane service directory.
//!
//! Resolution only needs two calls from the control plane: describe a
//! service (to learn its zone) and issue SSH credentials for it. They sit
//! behind the [`ServiceDirectory`] trait; [`HttpDirectory`] is the JSON over
//! HTTP implementation.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use psh_core::messages::{
    DescribeServicesRequest, DescribeServicesSshRequest, DirectoryError, Envelope, Page,
    ServiceRow, ServicesPage, SshEntry, SshPage,
};

/// Source of service metadata and one-time SSH credentials.
#[allow(async_fn_in_trait)]
pub trait ServiceDirectory {
    /// Describe services matching `service_id`, one page at most.
    async fn describe_services(
        &self,
        service_id: &str,
        page: Page,
    ) -> Result<Vec<ServiceRow>, DirectoryError>;

    /// Issue SSH credentials for `service_id` in `zone_code`.
    async fn describe_service_ssh(
        &self,
        zone_code: &str,
        service_id: &str,
    ) -> Result<Vec<SshEntry>, DirectoryError>;
}

/// Connection settings for the control-plane API.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// `scheme://host:port` of the control plane.
    pub endpoint: String,
    /// Path prefix in front of every API action.
    pub context_path: String,
    pub access_key: String,
    pub secret_key: String,
    /// Per-request timeout (also bounds the TCP connect).
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            context_path: "platform".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// [`ServiceDirectory`] backed by the control plane's JSON API.
pub struct HttpDirectory {
    /// `scheme://host:port[/context]` without a trailing slash.
    base_url: String,
    access_key: String,
    secret_key: String,
    http_client: reqwest::Client,
}

impl HttpDirectory {
    /// Validate the endpoint and build the HTTP client.
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let base_url = build_base_url(&config.endpoint, &config.context_path)?;
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Transport(format!("cannot build http client: {e}")))?;

        Ok(Self {
            base_url,
            access_key: config.access_key,
            secret_key: config.secret_key,
            http_client,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/ackcs/{action}", self.base_url)
    }

    async fn call<B, T>(&self, action: &str, body: &B) -> Result<T, DirectoryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let url = self.action_url(action);
        debug!(url = %url, "control plane request");

        let mut req = self.http_client.post(&url).json(body);
        if !self.access_key.is_empty() {
            req = req.basic_auth(&self.access_key, Some(&self.secret_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;
        envelope.into_result()
    }
}

impl ServiceDirectory for HttpDirectory {
    async fn describe_services(
        &self,
        service_id: &str,
        page: Page,
    ) -> Result<Vec<ServiceRow>, DirectoryError> {
        let body = DescribeServicesRequest {
            page,
            service_uuid: service_id.to_string(),
        };
        let page: ServicesPage = self.call("DescribeServices", &body).await?;
        Ok(page.rows)
    }

    async fn describe_service_ssh(
        &self,
        zone_code: &str,
        service_id: &str,
    ) -> Result<Vec<SshEntry>, DirectoryError> {
        let body = DescribeServicesSshRequest {
            zone_code: zone_code.to_string(),
            service_uuids: vec![service_id.to_string()],
        };
        let page: SshPage = self.call("DescribeServicesSSH", &body).await?;
        Ok(page.sshes)
    }
}

/// Check `endpoint` is `http(s)://host[:port]` and append the context path.
fn build_base_url(endpoint: &str, context_path: &str) -> Result<String, DirectoryError> {
    if endpoint.trim().is_empty() {
        return Err(DirectoryError::Transport(
            "control plane endpoint is not configured".into(),
        ));
    }
    let url = reqwest::Url::parse(endpoint.trim())
        .map_err(|e| DirectoryError::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DirectoryError::Transport(format!(
            "unsupported endpoint scheme '{}' (expected http or https)",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| DirectoryError::Transport(format!("endpoint '{endpoint}' has no host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| DirectoryError::Transport(format!("endpoint '{endpoint}' has no port")))?;

    let mut base = format!("{}://{host}:{port}", url.scheme());
    let context = context_path.trim_matches('/');
    if !context.is_empty() {
        base.push('/');
        base.push_str(context);
    }
    Ok(base)
}
