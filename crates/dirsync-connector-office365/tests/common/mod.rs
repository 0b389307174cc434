//! Common test utilities for dirsync-connector-office365 integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dirsync_connector_office365::{Office365Config, Office365Connector, Office365Credentials};

pub const TENANT: &str = "contoso.onmicrosoft.com";
pub const PRINCIPAL_ID: &str = "4b0b9b52-3a1c-4f6e-8b2d-2d5f0f0e7a11";
pub const API_VERSION: &str = "2013-11-08";
/// Base64 of `test-symmetric-key-0123456789abcd`.
pub const SYMMETRIC_KEY: &str = "dGVzdC1zeW1tZXRyaWMta2V5LTAxMjM0NTY3ODlhYmNk";
pub const TOKEN_PATH: &str = "/tokens/OAuth/2";

pub const E3_SKU_ID: &str = "6fd2c87f-b296-42f0-b197-1e91e994b900";
pub const E1_SKU_ID: &str = "18181a46-0d4e-45cd-891e-60aabd171b4e";

/// Tenant-relative resource path as seen by the mock server.
pub fn tenant_path(resource: &str) -> String {
    format!("/{TENANT}/{}", resource.trim_start_matches('/'))
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "expires_in": "3599"
    })
}

/// A `subscribedSkus` response with an E3 and an E1 SKU.
pub fn create_subscribed_skus() -> Value {
    json!({"value": [
        {
            "skuId": E3_SKU_ID,
            "skuPartNumber": "ENTERPRISEPACK",
            "objectId": "sku-object-e3",
            "consumedUnits": 12,
            "prepaidUnits": {"enabled": 25, "suspended": 0, "warning": 0},
            "servicePlans": [
                {"servicePlanId": "efb87545-963c-4e0d-99df-69c6916d9eb0", "servicePlanName": "EXCHANGE_S_ENTERPRISE"},
                {"servicePlanId": "5dbe027f-2339-4123-9542-606e4d348a72", "servicePlanName": "SHAREPOINTENTERPRISE"},
                {"servicePlanId": "0feaeb32-d00e-4d66-bd5a-43b5b83db82c", "servicePlanName": "MCOSTANDARD"}
            ]
        },
        {
            "skuId": E1_SKU_ID,
            "skuPartNumber": "STANDARDPACK",
            "objectId": "sku-object-e1",
            "consumedUnits": 0,
            "prepaidUnits": {"enabled": 5, "suspended": 0, "warning": 0},
            "servicePlans": [
                {"servicePlanId": "9aaf7827-d63c-4b61-89c3-182f06f82e5c", "servicePlanName": "EXCHANGE_S_STANDARD"}
            ]
        }
    ]})
}

/// A `tenantDetails` response with a federated, a managed and an unverified domain.
pub fn create_tenant_details() -> Value {
    json!({"value": [{
        "objectType": "Company",
        "objectId": "8f2a3b4c-0000-4000-8000-00000000c0de",
        "displayName": "Contoso",
        "assignedPlans": [
            {"assignedTimestamp": "2014-01-01T00:00:00Z", "capabilityStatus": "Enabled",
             "service": "exchange", "servicePlanId": "efb87545-963c-4e0d-99df-69c6916d9eb0"}
        ],
        "verifiedDomains": [
            {"capabilities": "Email, OfficeCommunicationsOnline", "default": true, "id": "000520000FC1D7A8",
             "initial": false, "name": "fed.contoso.com", "type": "Federated"},
            {"capabilities": "Email", "default": false, "id": "000520000FC1D7A9",
             "initial": true, "name": "contoso.onmicrosoft.com", "type": "Managed"},
            {"capabilities": "None", "default": false, "id": "000520000FC1D7AA",
             "initial": false, "name": "pending.contoso.com", "type": "None"}
        ]
    }]})
}

/// A directory user record.
pub fn create_directory_user(object_id: &str, upn: &str, sku_ids: &[Value]) -> Value {
    json!({
        "odata.type": "Microsoft.WindowsAzure.ActiveDirectory.User",
        "objectType": "User",
        "objectId": object_id,
        "userPrincipalName": upn,
        "accountEnabled": true,
        "displayName": "Test User",
        "givenName": "Test",
        "surname": "User",
        "mailNickname": upn.split('@').next().unwrap_or_default(),
        "usageLocation": "GB",
        "otherMails": [],
        "proxyAddresses": [],
        "assignedLicenses": sku_ids
            .iter()
            .map(|id| json!({"disabledPlans": [], "skuId": id}))
            .collect::<Vec<_>>()
    })
}

/// An OData error body in the JSON shape.
pub fn create_odata_error(code: &str, message: &str) -> Value {
    json!({
        "odata.error": {
            "code": code,
            "message": {"lang": "en", "value": message}
        }
    })
}

/// `Location` header of a created directory object.
pub fn created_location(base: &str, object_id: &str, kind: &str) -> String {
    format!("{base}/{TENANT}/directoryObjects/{object_id}/Microsoft.WindowsAzure.ActiveDirectory.{kind}")
}

/// Mock server wrapper with common setup helpers.
pub struct MockGraphServer {
    pub server: MockServer,
}

impl MockGraphServer {
    /// Creates a new mock directory and token server.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Returns the mock server's base URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Configuration pointing both endpoints at the mock server.
    pub fn config(&self) -> Office365Config {
        Office365Config::builder()
            .tenant(TENANT)
            .principal_id(PRINCIPAL_ID)
            .graph_url(self.url())
            .auth_url(format!("{}{TOKEN_PATH}", self.url()))
            .build()
            .unwrap()
    }

    pub fn connector(&self) -> Office365Connector {
        Office365Connector::new(self.config(), Office365Credentials::new(SYMMETRIC_KEY)).unwrap()
    }

    /// Token endpoint handing out `access_token`.
    pub async fn mock_token_endpoint(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_token_response(access_token)),
            )
            .mount(&self.server)
            .await;
    }

    /// Token endpoint that must be hit exactly `times` times.
    pub async fn expect_token_requests(&self, access_token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_token_response(access_token)),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_subscribed_skus(&self) {
        self.mock_get("subscribedSkus", create_subscribed_skus()).await;
    }

    pub async fn mock_tenant_details(&self) {
        self.mock_get("tenantDetails", create_tenant_details()).await;
    }

    /// GET of a tenant resource answering 200 with `body`.
    pub async fn mock_get(&self, resource: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(tenant_path(resource)))
            .and(query_param("api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// POST of a tenant resource answering 201 with a `Location` header.
    pub async fn mock_create(&self, resource: &str, object_id: &str, kind: &str) {
        Mock::given(method("POST"))
            .and(path(tenant_path(resource)))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Location", created_location(&self.url(), object_id, kind).as_str())
                    .set_body_json(json!({"objectId": object_id})),
            )
            .mount(&self.server)
            .await;
    }

    /// `assignLicense` accepting every request.
    pub async fn mock_assign_license(&self, user_id: &str) {
        Mock::given(method("POST"))
            .and(path(tenant_path(&format!("users/{user_id}/assignLicense"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectId": user_id})))
            .mount(&self.server)
            .await;
    }

    /// Request bodies received on `resource` with `verb`, in arrival order.
    pub async fn bodies(&self, verb: &str, resource: &str) -> Vec<Value> {
        let wanted = tenant_path(resource);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == wanted)
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Number of requests received on `resource`.
    pub async fn request_count(&self, resource_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == resource_path)
            .count()
    }
}
