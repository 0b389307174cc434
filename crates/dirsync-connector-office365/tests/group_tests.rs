//! Integration tests for groups and membership.

mod common;

use common::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use dirsync_connector::operation::{AttributeDelta, AttributeSet, Uid, NAME_ATTRIBUTE};
use dirsync_connector::traits::{CreateOp, GroupOp, SearchOp, UpdateOp};

const GROUP_ID: &str = "9d8c7b6a-5f4e-4d3c-b2a1-0f9e8d7c6b5a";
const USER_ID: &str = "0c9a1f2e-4b3d-4e5f-8a6b-7c8d9e0f1a2b";

async fn directory() -> MockGraphServer {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint("tok-1").await;
    mock
}

/// Groups are created as security groups named by `__NAME__`.
#[tokio::test]
async fn test_create_group() {
    let mock = directory().await;
    mock.mock_create("groups", GROUP_ID, "Group").await;

    let attrs = AttributeSet::new()
        .with(NAME_ATTRIBUTE, "engineering")
        .with("displayName", "Engineering")
        .with("description", "All engineers");
    let uid = mock.connector().create("group", attrs).await.unwrap();
    assert_eq!(uid.value(), GROUP_ID);

    assert_eq!(
        mock.bodies("POST", "groups").await,
        vec![json!({
            "mailNickname": "engineering",
            "displayName": "Engineering",
            "description": "All engineers",
            "mailEnabled": false,
            "securityEnabled": true
        })]
    );
}

/// Members given on create are linked after the group exists.
#[tokio::test]
async fn test_create_group_links_members() {
    let mock = directory().await;
    mock.mock_create("groups", GROUP_ID, "Group").await;
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock.server)
        .await;

    let attrs = AttributeSet::new()
        .with(NAME_ATTRIBUTE, "engineering")
        .with("displayName", "Engineering")
        .with("members", vec![USER_ID, "1a2b3c4d-0000-4000-8000-000000000002"]);
    mock.connector().create("group", attrs).await.unwrap();
}

/// Adding a member posts the member's directory object URL.
#[tokio::test]
async fn test_add_member() {
    let mock = directory().await;
    let expected_url = format!("{}/{TENANT}/directoryObjects/{USER_ID}", mock.url());
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members"))))
        .and(body_json(json!({ "url": expected_url })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.connector()
        .add_member(&Uid::from_value(GROUP_ID), &Uid::from_value(USER_ID))
        .await
        .unwrap();
}

/// An existing membership is reported as a directory error.
#[tokio::test]
async fn test_add_existing_member_fails() {
    let mock = directory().await;
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members"))))
        .respond_with(ResponseTemplate::new(400).set_body_json(create_odata_error(
            "Request_BadRequest",
            "One or more added object references already exist for the following modified properties: 'members'.",
        )))
        .mount(&mock.server)
        .await;

    let err = mock
        .connector()
        .add_member(&Uid::from_value(GROUP_ID), &Uid::from_value(USER_ID))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("HTTP 400"));
}

#[tokio::test]
async fn test_remove_member() {
    let mock = directory().await;
    Mock::given(method("DELETE"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}/$links/members/{USER_ID}"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.connector()
        .remove_member(&Uid::from_value(GROUP_ID), &Uid::from_value(USER_ID))
        .await
        .unwrap();
}

/// Group lookup for a user asks for every group, not only security groups.
#[tokio::test]
async fn test_groups_for_member() {
    let mock = directory().await;
    Mock::given(method("POST"))
        .and(path(tenant_path(&format!("users/{USER_ID}/getMemberGroups"))))
        .and(body_json(json!({"securityEnabledOnly": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "odata.metadata": "https://graph.windows.net/contoso.onmicrosoft.com/$metadata#Collection(Edm.String)",
            "value": [GROUP_ID, "2b3c4d5e-0000-4000-8000-000000000003"]
        })))
        .mount(&mock.server)
        .await;

    let groups = mock
        .connector()
        .get_groups_for_member(&Uid::from_value(USER_ID))
        .await
        .unwrap();
    assert_eq!(
        groups,
        vec![
            Uid::from_value(GROUP_ID),
            Uid::from_value("2b3c4d5e-0000-4000-8000-000000000003")
        ]
    );
}

/// Renaming a group patches its mail nickname.
#[tokio::test]
async fn test_update_group() {
    let mock = directory().await;
    Mock::given(method("PATCH"))
        .and(path(tenant_path(&format!("groups/{GROUP_ID}"))))
        .and(body_json(json!({"mailNickname": "platform", "description": null})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    let mut delta = AttributeDelta::new();
    delta.replace(NAME_ATTRIBUTE, "platform");
    delta.clear_attribute("description");
    mock.connector()
        .update("group", &Uid::from_value(GROUP_ID), delta)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_group() {
    let mock = directory().await;
    mock.mock_get(
        &format!("groups/{GROUP_ID}"),
        json!({
            "objectType": "Group",
            "objectId": GROUP_ID,
            "displayName": "Engineering",
            "mailNickname": "engineering",
            "mailEnabled": false,
            "securityEnabled": true,
            "proxyAddresses": []
        }),
    )
    .await;

    let group = mock
        .connector()
        .get("group", &Uid::from_value(GROUP_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.get_string(NAME_ATTRIBUTE), Some("engineering"));
    assert_eq!(group.get_string("displayName"), Some("Engineering"));
}
