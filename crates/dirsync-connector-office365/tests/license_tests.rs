//! Integration tests for license reconciliation.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use dirsync_connector_office365::Office365Error;

const USER_ID: &str = "0c9a1f2e-4b3d-4e5f-8a6b-7c8d9e0f1a2b";

async fn server_with_user(sku_ids: &[serde_json::Value]) -> MockGraphServer {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint("tok-1").await;
    mock.mock_subscribed_skus().await;
    mock.mock_get(
        &format!("users/{USER_ID}"),
        create_directory_user(USER_ID, "jdoe@contoso.onmicrosoft.com", sku_ids),
    )
    .await;
    mock
}

/// Every assigned SKU is removed, one request each, before the add.
#[tokio::test]
async fn test_removals_precede_add() {
    let mock = server_with_user(&[json!(E1_SKU_ID), json!(E3_SKU_ID)]).await;
    mock.mock_assign_license(USER_ID).await;

    let connector = mock.connector();
    connector
        .reconciler()
        .assign_license(USER_ID, Some("ENTERPRISEPACK:EXCHANGE_S_ENTERPRISE"))
        .await
        .unwrap();

    let bodies = mock.bodies("POST", &format!("users/{USER_ID}/assignLicense")).await;
    assert_eq!(
        bodies,
        vec![
            json!({"addLicenses": null, "removeLicenses": [E1_SKU_ID]}),
            json!({"addLicenses": null, "removeLicenses": [E3_SKU_ID]}),
            json!({
                "addLicenses": [{
                    "skuId": E3_SKU_ID,
                    "disabledPlans": [
                        "5dbe027f-2339-4123-9542-606e4d348a72",
                        "0feaeb32-d00e-4d66-bd5a-43b5b83db82c"
                    ]
                }],
                "removeLicenses": null
            }),
        ]
    );
}

/// A rejected removal stops the sequence; nothing is added.
#[tokio::test]
async fn test_failed_removal_aborts() {
    let mock = server_with_user(&[json!(E1_SKU_ID), json!(E3_SKU_ID)]).await;

    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("users/{USER_ID}/assignLicense"))))
        .and(body_json(json!({"addLicenses": null, "removeLicenses": [E1_SKU_ID]})))
        .respond_with(ResponseTemplate::new(400).set_body_json(create_odata_error(
            "Request_BadRequest",
            "License cannot be removed",
        )))
        .mount(&mock.server)
        .await;
    mock.mock_assign_license(USER_ID).await;

    let err = mock
        .connector()
        .reconciler()
        .assign_license(USER_ID, Some("STANDARDPACK"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("License cannot be removed"));

    let bodies = mock.bodies("POST", &format!("users/{USER_ID}/assignLicense")).await;
    assert_eq!(bodies.len(), 1);
}

/// A blank spec only removes.
#[tokio::test]
async fn test_blank_spec_clears_licenses() {
    let mock = server_with_user(&[json!(E3_SKU_ID)]).await;
    mock.mock_assign_license(USER_ID).await;

    mock.connector()
        .reconciler()
        .assign_license(USER_ID, None)
        .await
        .unwrap();

    let bodies = mock.bodies("POST", &format!("users/{USER_ID}/assignLicense")).await;
    assert_eq!(bodies, vec![json!({"addLicenses": null, "removeLicenses": [E3_SKU_ID]})]);
    assert_eq!(mock.request_count(&tenant_path("subscribedSkus")).await, 0);
}

/// An unknown SKU fails before any assigned license is removed.
#[tokio::test]
async fn test_unknown_sku_keeps_assigned_licenses() {
    let mock = server_with_user(&[json!(E1_SKU_ID)]).await;
    mock.mock_assign_license(USER_ID).await;

    let err = mock
        .connector()
        .reconciler()
        .assign_license(USER_ID, Some("NO_SUCH_SKU"))
        .await
        .unwrap_err();
    assert!(matches!(err, Office365Error::License(_)));

    let assign_path = tenant_path(&format!("users/{USER_ID}/assignLicense"));
    assert_eq!(mock.request_count(&assign_path).await, 0);
}

/// The SKU catalog is read once per connection.
#[tokio::test]
async fn test_catalog_is_read_once() {
    let mock = server_with_user(&[]).await;
    mock.mock_assign_license(USER_ID).await;

    let connector = mock.connector();
    for spec in ["ENTERPRISEPACK", "STANDARDPACK", "ENTERPRISEPACK:MCOSTANDARD"] {
        connector
            .reconciler()
            .assign_license(USER_ID, Some(spec))
            .await
            .unwrap();
    }

    assert_eq!(mock.request_count(&tenant_path("subscribedSkus")).await, 1);
    let catalog = connector.catalog().license_plans().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.sku("STANDARDPACK").unwrap().prepaid_units.enabled, 5);
}

/// A failed catalog read is retried on next access.
#[tokio::test]
async fn test_failed_catalog_read_is_not_cached() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint("tok-1").await;
    Mock::given(method("GET"))
        .and(path(tenant_path("subscribedSkus")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock.server)
        .await;
    mock.mock_subscribed_skus().await;

    let connector = mock.connector();
    assert!(connector.catalog().license_plans().await.is_err());
    assert_eq!(connector.catalog().license_plans().await.unwrap().len(), 2);
}
