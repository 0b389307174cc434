//! Directory Graph API client.
//!
//! Every call carries the connection's bearer token and the OData protocol
//! headers expected by the 2013-era Graph API. Any non-success status drops
//! the token so the next call re-authenticates.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::TokenService;
use crate::config::Office365Config;
use crate::error::{Office365Error, Office365Result};

/// Identifier returned for operations that succeed without creating an object.
pub const SUCCESS_UID: &str = "fffffff-ffff-ffff-ffff-ffffffffffff";

const DATA_SERVICE_VERSION: &str = "DataServiceVersion";
const MAX_DATA_SERVICE_VERSION: &str = "MaxDataServiceVersion";

static LOCATION_OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r".*directoryObjects/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})/.*",
    )
    .expect("LOCATION_OBJECT_ID is a valid regex pattern")
});

/// Result of a successful POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// 201 with the new object's id taken from `Location`.
    Created(String),
    /// 200 from an `assignLicense` action.
    LicenseAssigned,
}

impl PostOutcome {
    /// Identifier to report to callers: the object id, or [`SUCCESS_UID`].
    pub fn uid(&self) -> &str {
        match self {
            PostOutcome::Created(id) => id,
            PostOutcome::LicenseAssigned => SUCCESS_UID,
        }
    }
}

/// Object id embedded in a `.../directoryObjects/{guid}/...` location.
pub fn object_id_from_location(location: &str) -> Option<String> {
    LOCATION_OBJECT_ID
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// User-facing message from a directory error body.
///
/// Looks for a `message` element in XML bodies, then the OData JSON error
/// shapes. Falls back to the body itself.
pub fn extract_error_message(body: &str) -> String {
    xml_message(body)
        .or_else(|| json_message(body))
        .unwrap_or_else(|| body.to_string())
}

fn xml_message(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_message = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_message = e.local_name().as_ref() == b"message",
            Ok(Event::Text(t)) if in_message => {
                return t.unescape().ok().map(|s| s.into_owned());
            }
            Ok(Event::End(_)) => in_message = false,
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn json_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("odata.error").or_else(|| value.get("error"))?;
    match error.get("message")? {
        Value::String(s) => Some(s.clone()),
        other => other.get("value")?.as_str().map(str::to_string),
    }
}

/// Client for the tenant's directory resources.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    tokens: Arc<TokenService>,
    graph_url: String,
    tenant: String,
    api_version: String,
    invalidate_on_transport_error: bool,
}

impl GraphClient {
    pub fn new(config: &Office365Config, tokens: Arc<TokenService>, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            tokens,
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            tenant: config.tenant.clone(),
            api_version: config.api_version.clone(),
            invalidate_on_transport_error: config.invalidate_token_on_transport_error,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// `{graph_url}/{tenant}/directoryObjects/{id}`, used in `$links` bodies.
    pub fn directory_object_url(&self, object_id: &str) -> String {
        format!("{}/{}/directoryObjects/{}", self.graph_url, self.tenant, object_id)
    }

    /// Absolute URL of a tenant-relative path with the API version appended.
    pub fn url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}/{}/{}{}api-version={}",
            self.graph_url,
            self.tenant,
            path.trim_start_matches('/'),
            separator,
            self.api_version
        )
    }

    /// GET expecting 200 and a JSON object.
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Office365Result<Value> {
        let response = self.send(Method::GET, path, None).await?;
        if response.status() != StatusCode::OK {
            return Err(self.failure("GET", path, response).await);
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Office365Error::InvalidResponse(format!("GET {path}: {e}")))?;
        if !value.is_object() {
            return Err(Office365Error::InvalidResponse(format!(
                "GET {path}: expected a JSON object"
            )));
        }
        debug!(path, "GET succeeded");
        Ok(value)
    }

    /// POST expecting 201 with a `Location`, or 200 for `assignLicense`.
    #[instrument(skip(self, body))]
    pub async fn post(&self, path: &str, body: &Value) -> Office365Result<PostOutcome> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        let status = response.status();

        if status == StatusCode::OK && path.contains("/assignLicense") {
            info!(path, "License assignment accepted");
            return Ok(PostOutcome::LicenseAssigned);
        }
        if status != StatusCode::CREATED {
            return Err(self.failure("POST", path, response).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match object_id_from_location(location) {
            Some(id) => {
                info!(path, object_id = %id, "Object created");
                Ok(PostOutcome::Created(id))
            }
            None => {
                error!(path, location, "Created response has no object identifier");
                Err(Office365Error::directory(
                    status.as_u16(),
                    "No identifier found",
                    location,
                ))
            }
        }
    }

    /// POST to a `$links` collection, expecting 204.
    #[instrument(skip(self, body))]
    pub async fn post_link(&self, path: &str, body: &Value) -> Office365Result<()> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(self.failure("POST", path, response).await);
        }
        debug!(path, "Link added");
        Ok(())
    }

    /// POST to an action returning 200 and JSON.
    #[instrument(skip(self, body))]
    pub async fn post_for_json(&self, path: &str, body: &Value) -> Office365Result<Value> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        if response.status() != StatusCode::OK {
            return Err(self.failure("POST", path, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| Office365Error::InvalidResponse(format!("POST {path}: {e}")))
    }

    /// PATCH expecting 204.
    #[instrument(skip(self, body))]
    pub async fn patch(&self, path: &str, body: &Value) -> Office365Result<bool> {
        let response = self.send(Method::PATCH, path, Some(body)).await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(self.failure("PATCH", path, response).await);
        }
        info!(path, "Object modified");
        Ok(true)
    }

    /// DELETE expecting 204.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Office365Result<bool> {
        let response = self.send(Method::DELETE, path, None).await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(self.failure("DELETE", path, response).await);
        }
        info!(path, "Object deleted");
        Ok(true)
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Office365Result<Response> {
        let token = self.tokens.get_token().await?;
        let url = self.url(path);
        debug!(%method, %url, "Directory request");

        let (content_type, data_service_version, accept) = protocol_headers(&method);
        let mut authorization = HeaderValue::from_str(token.expose_secret())
            .map_err(|_| Office365Error::InvalidResponse("token is not a valid header".to_string()))?;
        authorization.set_sensitive(true);

        let mut request = self
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, content_type)
            .header(DATA_SERVICE_VERSION, data_service_version)
            .header(MAX_DATA_SERVICE_VERSION, "3.0;NetFx");
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body).map_err(|e| {
                Office365Error::InvalidResponse(format!("cannot encode request body: {e}"))
            })?);
        }

        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(%url, error = %e, "Directory request failed before a response");
                if self.invalidate_on_transport_error {
                    self.tokens.invalidate().await;
                }
                Err(Office365Error::Transport(e))
            }
        }
    }

    /// Drop the token and turn a failed response into a directory error.
    async fn failure(&self, verb: &str, path: &str, response: Response) -> Office365Error {
        self.tokens.invalidate().await;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        warn!(verb, path, status, %message, "Directory request rejected");
        Office365Error::directory(status, message, body)
    }
}

/// `(Content-Type, DataServiceVersion, Accept)` for a request method.
fn protocol_headers(method: &Method) -> (&'static str, &'static str, Option<&'static str>) {
    match *method {
        Method::GET => (
            "application/json;odata=verbose",
            "1.0;NetFx",
            Some("application/json"),
        ),
        Method::DELETE => ("application/json", "3.0;NetFx", None),
        _ => (
            "application/json;charset=utf-8;odata=verbose",
            "3.0;NetFx",
            Some("application/atom+xml"),
        ),
    }
}
