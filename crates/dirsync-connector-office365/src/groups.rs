//! Security groups and membership.

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use dirsync_connector::operation::{
    AttributeDelta, AttributeSet, AttributeValue, Uid, NAME_ATTRIBUTE, UID_ATTRIBUTE,
};

use crate::error::{Office365Error, Office365Result};
use crate::schema::{self, GROUP_OBJECT_CLASS};
use crate::Office365Connector;

const MAIL_NICKNAME: &str = "mailNickname";
const MEMBERS_ATTR: &str = "members";

/// Attributes copied from a directory group into an [`AttributeSet`].
pub const GROUP_READ_ATTRIBUTES: &[&str] = &[
    "description",
    "displayName",
    "mail",
    "mailEnabled",
    "proxyAddresses",
    "securityEnabled",
];

fn group_attribute_json(name: &str, value: &AttributeValue) -> Office365Result<Value> {
    if schema::object_class(GROUP_OBJECT_CLASS)
        .and_then(|oc| oc.attribute(name).map(|a| a.read_only))
        .unwrap_or(false)
    {
        return Err(Office365Error::InvalidAttribute {
            attribute: name.to_string(),
            message: "attribute is read-only".to_string(),
        });
    }

    let multi = schema::is_multi_valued(GROUP_OBJECT_CLASS, name);
    Ok(match value {
        AttributeValue::Array(values) if !multi && values.len() == 1 => values[0].to_json(),
        AttributeValue::Array(values) if !multi => {
            return Err(Office365Error::InvalidAttribute {
                attribute: name.to_string(),
                message: format!("single-valued attribute given {} values", values.len()),
            })
        }
        single if multi && !single.is_multi_valued() && !single.is_null() => {
            Value::Array(vec![single.to_json()])
        }
        other => other.to_json(),
    })
}

/// Body of a new security group plus the members to link afterwards.
pub(crate) fn group_create_body(attributes: &AttributeSet) -> Office365Result<(Value, Vec<String>)> {
    let nickname = attributes
        .get_string(NAME_ATTRIBUTE)
        .ok_or_else(|| Office365Error::MissingAttribute(NAME_ATTRIBUTE.to_string()))?;

    let mut body = Map::new();
    let mut members = Vec::new();
    for (name, value) in attributes.iter() {
        match name.as_str() {
            NAME_ATTRIBUTE | UID_ATTRIBUTE => {}
            MEMBERS_ATTR => members.extend(value.as_strings().into_iter().map(str::to_string)),
            _ => {
                body.insert(name.clone(), group_attribute_json(name, value)?);
            }
        }
    }
    body.insert(MAIL_NICKNAME.to_string(), Value::String(nickname.to_string()));
    // Only security groups can be created through this API.
    body.insert("mailEnabled".to_string(), Value::Bool(false));
    body.insert("securityEnabled".to_string(), Value::Bool(true));

    Ok((Value::Object(body), members))
}

/// Convert a directory group into an [`AttributeSet`].
pub fn make_group_object(group: &Value) -> Office365Result<AttributeSet> {
    let object_type = group.get("objectType").and_then(Value::as_str);
    if object_type != Some("Group") {
        return Err(Office365Error::InvalidResponse(format!(
            "expected objectType Group, got {}",
            object_type.unwrap_or("none")
        )));
    }
    let object_id = group
        .get("objectId")
        .and_then(Value::as_str)
        .ok_or_else(|| Office365Error::InvalidResponse("group has no objectId".to_string()))?;

    let mut attributes = AttributeSet::new();
    attributes.set(UID_ATTRIBUTE, object_id);
    if let Some(nickname) = group.get(MAIL_NICKNAME).and_then(Value::as_str) {
        attributes.set(NAME_ATTRIBUTE, nickname);
    }
    for &name in GROUP_READ_ATTRIBUTES {
        match group.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => attributes.set(name, AttributeValue::from_json(value)),
        }
    }
    Ok(attributes)
}

impl Office365Connector {
    /// Creates a security group and links any `members` given.
    #[instrument(skip(self, attributes))]
    pub async fn create_group(&self, attributes: &AttributeSet) -> Office365Result<Uid> {
        let (body, members) = group_create_body(attributes)?;
        info!(mail_nickname = ?body.get(MAIL_NICKNAME), "Creating group");

        let created = self.client().post("/groups", &body).await?;
        let group_id = created.uid().to_string();
        info!(%group_id, "Group created");

        for member in &members {
            self.add_member_to_group(&group_id, member).await?;
        }
        Ok(Uid::from_value(group_id))
    }

    /// Modifies group attributes. Membership goes through
    /// [`Office365Connector::add_member_to_group`] instead.
    #[instrument(skip(self, delta))]
    pub async fn update_group(&self, group_id: &str, delta: &AttributeDelta) -> Office365Result<Uid> {
        if delta.touches(MEMBERS_ATTR) {
            return Err(Office365Error::InvalidAttribute {
                attribute: MEMBERS_ATTR.to_string(),
                message: "membership is changed with add/remove member".to_string(),
            });
        }

        let mut body = Map::new();
        for (name, value) in &delta.replace {
            let target = if name == NAME_ATTRIBUTE { MAIL_NICKNAME } else { name.as_str() };
            body.insert(target.to_string(), group_attribute_json(target, value)?);
        }
        for name in &delta.clear {
            if name == NAME_ATTRIBUTE || name == UID_ATTRIBUTE {
                warn!(group_id, attribute = %name, "Attribute cannot be cleared, ignoring");
                continue;
            }
            body.insert(name.clone(), Value::Null);
        }
        if body.is_empty() {
            warn!(group_id, "Empty group modification");
            return Ok(Uid::from_value(group_id));
        }

        self.client()
            .patch(&format!("/groups/{group_id}"), &Value::Object(body))
            .await?;
        info!(group_id, "Group modified");
        Ok(Uid::from_value(group_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_group(&self, group_id: &str) -> Office365Result<()> {
        self.client().delete(&format!("/groups/{group_id}")).await?;
        info!(group_id, "Group deleted");
        Ok(())
    }

    /// Reads one group; `None` on 404.
    #[instrument(skip(self))]
    pub async fn get_group(&self, group_id: &str) -> Office365Result<Option<AttributeSet>> {
        match self.client().get(&format!("/groups/{group_id}")).await {
            Ok(group) => make_group_object(&group).map(Some),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Adds a directory object to a group's members.
    #[instrument(skip(self))]
    pub async fn add_member_to_group(&self, group_id: &str, member_id: &str) -> Office365Result<()> {
        let body = json!({ "url": self.client().directory_object_url(member_id) });
        self.client()
            .post_link(&format!("/groups/{group_id}/$links/members"), &body)
            .await?;
        info!(group_id, member_id, "Member added to group");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_member_from_group(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Office365Result<()> {
        self.client()
            .delete(&format!("/groups/{group_id}/$links/members/{member_id}"))
            .await?;
        info!(group_id, member_id, "Member removed from group");
        Ok(())
    }

    /// Ids of every group the user belongs to, security-enabled or not.
    #[instrument(skip(self))]
    pub async fn member_groups(&self, user_id: &str) -> Office365Result<Vec<String>> {
        let response = self
            .client()
            .post_for_json(
                &format!("/users/{user_id}/getMemberGroups"),
                &json!({ "securityEnabledOnly": false }),
            )
            .await?;

        let groups: Vec<String> = response
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Office365Error::InvalidResponse("getMemberGroups has no value array".to_string())
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        debug!(user_id, count = groups.len(), "Fetched member groups");
        Ok(groups)
    }
}
