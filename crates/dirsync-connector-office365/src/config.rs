//! Connector configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use dirsync_connector::config::{ConnectionSettings, ConnectorConfig};
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::types::ConnectorType;

use crate::error::{Office365Error, Office365Result};
use crate::immutable_id::ImmutableIdEncoding;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.windows.net";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.accesscontrol.windows.net/tokens/OAuth/2";
/// Well-known principal of the directory Graph service.
pub const DEFAULT_RESOURCE_ID: &str = "00000002-0000-0000-c000-000000000000";
/// Well-known principal of the access control token service.
pub const DEFAULT_ACS_PRINCIPAL_ID: &str = "00000001-0000-0000-c000-000000000000";
pub const DEFAULT_API_VERSION: &str = "2013-11-08";

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_resource_id() -> String {
    DEFAULT_RESOURCE_ID.to_string()
}

fn default_acs_principal_id() -> String {
    DEFAULT_ACS_PRINCIPAL_ID.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_immutable_id_encoding() -> Option<ImmutableIdEncoding> {
    Some(ImmutableIdEncoding::MsBase64)
}

fn default_max_token_attempts() -> u32 {
    3
}

fn default_token_lifetime_secs() -> i64 {
    3600
}

fn default_true() -> bool {
    true
}

/// Office 365 tenant configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office365Config {
    /// Tenant domain or realm, e.g. `contoso.onmicrosoft.com`.
    pub tenant: String,

    /// Directory API base (scheme and host).
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Token endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Service principal the connector authenticates as.
    pub principal_id: String,

    #[serde(default = "default_resource_id")]
    pub resource_id: String,

    #[serde(default = "default_acs_principal_id")]
    pub acs_principal_id: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// `None` sends `immutableId` values through unchanged.
    #[serde(default = "default_immutable_id_encoding")]
    pub immutable_id_encoding: Option<ImmutableIdEncoding>,

    #[serde(default = "default_max_token_attempts")]
    pub max_token_attempts: u32,

    /// Validity window written into each assertion.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: i64,

    /// Drop the cached token when a request fails below the HTTP layer.
    #[serde(default = "default_true")]
    pub invalidate_token_on_transport_error: bool,

    #[serde(default)]
    pub connection: ConnectionSettings,
}

impl Office365Config {
    pub fn builder() -> Office365ConfigBuilder {
        Office365ConfigBuilder::default()
    }

    /// Host of the directory API (`graph.windows.net`).
    pub fn graph_host(&self) -> Office365Result<String> {
        host_of(&self.graph_url, "graph_url")
    }

    /// Host of the token endpoint.
    pub fn auth_host(&self) -> Office365Result<String> {
        host_of(&self.auth_url, "auth_url")
    }

    /// `resource` form parameter of the token request.
    pub fn token_resource(&self) -> Office365Result<String> {
        Ok(format!(
            "{}/{}@{}",
            self.resource_id,
            self.graph_host()?,
            self.tenant
        ))
    }

    fn check(&self) -> Result<(), String> {
        let required = [
            ("tenant", &self.tenant),
            ("principal_id", &self.principal_id),
            ("resource_id", &self.resource_id),
            ("acs_principal_id", &self.acs_principal_id),
            ("api_version", &self.api_version),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{name} is required"));
            }
        }

        for (name, value) in [("graph_url", &self.graph_url), ("auth_url", &self.auth_url)] {
            let url = Url::parse(value).map_err(|e| format!("invalid {name}: {e}"))?;
            if url.host_str().is_none() {
                return Err(format!("{name} has no host"));
            }
        }

        if self.max_token_attempts == 0 {
            return Err("max_token_attempts must be at least 1".to_string());
        }
        if self.token_lifetime_secs <= 0 {
            return Err("token_lifetime_secs must be positive".to_string());
        }
        Ok(())
    }
}

fn host_of(raw: &str, field: &str) -> Office365Result<String> {
    let url = Url::parse(raw).map_err(|e| Office365Error::Config(format!("invalid {field}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| Office365Error::Config(format!("{field} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

impl ConnectorConfig for Office365Config {
    fn connector_type() -> ConnectorType {
        ConnectorType::Office365
    }

    fn validate(&self) -> ConnectorResult<()> {
        self.check()
            .map_err(|message| ConnectorError::InvalidConfiguration { message })
    }

    fn redacted(&self) -> Self {
        // Secrets live in `Office365Credentials`; nothing here is sensitive.
        self.clone()
    }
}

/// Builder for [`Office365Config`].
#[derive(Debug, Default)]
pub struct Office365ConfigBuilder {
    tenant: Option<String>,
    principal_id: Option<String>,
    graph_url: Option<String>,
    auth_url: Option<String>,
    resource_id: Option<String>,
    acs_principal_id: Option<String>,
    api_version: Option<String>,
    immutable_id_encoding: Option<Option<ImmutableIdEncoding>>,
    max_token_attempts: Option<u32>,
    token_lifetime_secs: Option<i64>,
    invalidate_token_on_transport_error: Option<bool>,
    connection: Option<ConnectionSettings>,
}

impl Office365ConfigBuilder {
    #[must_use]
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    #[must_use]
    pub fn principal_id(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    #[must_use]
    pub fn graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn acs_principal_id(mut self, id: impl Into<String>) -> Self {
        self.acs_principal_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// `None` disables encoding.
    #[must_use]
    pub fn immutable_id_encoding(mut self, encoding: Option<ImmutableIdEncoding>) -> Self {
        self.immutable_id_encoding = Some(encoding);
        self
    }

    #[must_use]
    pub fn max_token_attempts(mut self, attempts: u32) -> Self {
        self.max_token_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn token_lifetime_secs(mut self, secs: i64) -> Self {
        self.token_lifetime_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn invalidate_token_on_transport_error(mut self, invalidate: bool) -> Self {
        self.invalidate_token_on_transport_error = Some(invalidate);
        self
    }

    #[must_use]
    pub fn connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Office365Error::Config`] naming the first invalid field.
    pub fn build(self) -> Office365Result<Office365Config> {
        let config = Office365Config {
            tenant: self.tenant.unwrap_or_default(),
            principal_id: self.principal_id.unwrap_or_default(),
            graph_url: self.graph_url.unwrap_or_else(default_graph_url),
            auth_url: self.auth_url.unwrap_or_else(default_auth_url),
            resource_id: self.resource_id.unwrap_or_else(default_resource_id),
            acs_principal_id: self.acs_principal_id.unwrap_or_else(default_acs_principal_id),
            api_version: self.api_version.unwrap_or_else(default_api_version),
            immutable_id_encoding: self
                .immutable_id_encoding
                .unwrap_or_else(default_immutable_id_encoding),
            max_token_attempts: self
                .max_token_attempts
                .unwrap_or_else(default_max_token_attempts),
            token_lifetime_secs: self
                .token_lifetime_secs
                .unwrap_or_else(default_token_lifetime_secs),
            invalidate_token_on_transport_error: self
                .invalidate_token_on_transport_error
                .unwrap_or(true),
            connection: self.connection.unwrap_or_default(),
        };
        config.check().map_err(Office365Error::Config)?;
        Ok(config)
    }
}

/// Secret material for minting assertions.
#[derive(Clone, Deserialize)]
pub struct Office365Credentials {
    /// Base64 encoded HMAC key shared with the token service.
    pub symmetric_key: SecretString,
}

impl Office365Credentials {
    pub fn new(symmetric_key: impl Into<String>) -> Self {
        Self {
            symmetric_key: SecretString::from(symmetric_key.into()),
        }
    }
}

impl std::fmt::Debug for Office365Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Office365Credentials")
            .field("symmetric_key", &"[REDACTED]")
            .finish()
    }
}
