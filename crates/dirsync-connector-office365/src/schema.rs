//! Static schema of the directory objects this connector manages.
//!
//! The 2013 Graph API exposes no usable schema endpoint, so the object
//! classes are described here.

use serde::{Deserialize, Serialize};

use dirsync_connector::operation::{NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE};

use crate::users::{
    FORCE_CHANGE_PASSWORD_ATTR, IMMUTABLE_ID_ATTR, LICENSE_ATTR, USAGE_LOCATION_ATTR,
};

pub const USER_OBJECT_CLASS: &str = "user";
pub const GROUP_OBJECT_CLASS: &str = "group";

/// Object class definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectClass {
    pub name: String,
    pub description: Option<String>,
    pub attributes: Vec<AttributeDefinition>,
}

impl ObjectClass {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Attribute definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub attribute_type: AttributeType,
    pub required: bool,
    pub multi_valued: bool,
    /// Never returned on read.
    pub write_only: bool,
    /// Set by the directory; rejected on create/update.
    pub read_only: bool,
}

impl AttributeDefinition {
    fn new(name: &str, attribute_type: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            attribute_type,
            required: false,
            multi_valued: false,
            write_only: false,
            read_only: false,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Attribute data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Boolean,
    Binary,
    /// Never logged or returned.
    Secret,
}

fn user_object_class() -> ObjectClass {
    use AttributeType::{Binary, Boolean, Secret, String};

    let mut attributes = vec![
        AttributeDefinition::new(NAME_ATTRIBUTE, String).required(),
        AttributeDefinition::new(PASSWORD_ATTRIBUTE, Secret).write_only(),
        AttributeDefinition::new("accountEnabled", Boolean).required(),
        AttributeDefinition::new("mailNickname", String).required(),
        AttributeDefinition::new(FORCE_CHANGE_PASSWORD_ATTR, Boolean).write_only(),
        // SKU[:PLAN]*
        AttributeDefinition::new(LICENSE_ATTR, String).write_only(),
        // Mandatory for users in federated domains.
        AttributeDefinition::new(IMMUTABLE_ID_ATTR, String),
        AttributeDefinition::new(USAGE_LOCATION_ATTR, String),
        AttributeDefinition::new("otherMails", String).multi_valued(),
        AttributeDefinition::new("proxyAddresses", String).multi_valued(),
        AttributeDefinition::new("thumbnailPhoto", Binary),
    ];
    attributes.extend(
        [
            "city",
            "country",
            "department",
            "displayName",
            "facsimileTelephoneNumber",
            "givenName",
            "jobTitle",
            "mail",
            "mobile",
            "physicalDeliveryOfficeName",
            "postalCode",
            "preferredLanguage",
            "state",
            "streetAddress",
            "surname",
            "telephoneNumber",
        ]
        .into_iter()
        .map(|name| AttributeDefinition::new(name, String)),
    );

    ObjectClass {
        name: USER_OBJECT_CLASS.to_string(),
        description: Some("Directory user account".to_string()),
        attributes,
    }
}

fn group_object_class() -> ObjectClass {
    use AttributeType::{Boolean, String};

    ObjectClass {
        name: GROUP_OBJECT_CLASS.to_string(),
        description: Some("Security group".to_string()),
        attributes: vec![
            // mailNickname
            AttributeDefinition::new(NAME_ATTRIBUTE, String).required(),
            AttributeDefinition::new("displayName", String).required(),
            AttributeDefinition::new("description", String),
            AttributeDefinition::new("mail", String).read_only(),
            AttributeDefinition::new("mailEnabled", Boolean).required(),
            AttributeDefinition::new("securityEnabled", Boolean).required(),
            AttributeDefinition::new("proxyAddresses", String).multi_valued(),
            AttributeDefinition::new("members", String).multi_valued(),
        ],
    }
}

/// All object classes.
pub fn object_classes() -> Vec<ObjectClass> {
    vec![user_object_class(), group_object_class()]
}

/// Look up an object class by name, case-insensitively.
pub fn object_class(name: &str) -> Option<ObjectClass> {
    object_classes()
        .into_iter()
        .find(|oc| oc.name.eq_ignore_ascii_case(name))
}

/// Whether `attribute` of `object_class` holds several values.
pub fn is_multi_valued(object_class: &str, attribute: &str) -> bool {
    self::object_class(object_class)
        .and_then(|oc| oc.attribute(attribute).map(|a| a.multi_valued))
        .unwrap_or(false)
}
