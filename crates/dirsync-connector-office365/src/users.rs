//! User provisioning.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use dirsync_connector::operation::{
    AttributeDelta, AttributeSet, AttributeValue, Uid, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE,
    UID_ATTRIBUTE,
};

use crate::error::{Office365Error, Office365Result};
use crate::immutable_id::{self, ImmutableIdEncoding};
use crate::schema::{self, USER_OBJECT_CLASS};
use crate::Office365Connector;

/// License spec attribute, `SKU[:PLAN]*`.
pub const LICENSE_ATTR: &str = "licenses";
/// Country code; the directory refuses licenses without it.
pub const USAGE_LOCATION_ATTR: &str = "usageLocation";
pub const IMMUTABLE_ID_ATTR: &str = "immutableId";
pub const FORCE_CHANGE_PASSWORD_ATTR: &str = "forceChangePasswordNextLogin";

const USER_PRINCIPAL_NAME: &str = "userPrincipalName";
const ACCOUNT_ENABLED: &str = "accountEnabled";

/// Attributes copied from a directory user into an [`AttributeSet`].
pub const USER_READ_ATTRIBUTES: &[&str] = &[
    "accountEnabled",
    "city",
    "country",
    "department",
    "displayName",
    "facsimileTelephoneNumber",
    "givenName",
    "jobTitle",
    "mail",
    "mailNickname",
    "mobile",
    "otherMails",
    "physicalDeliveryOfficeName",
    "postalCode",
    "preferredLanguage",
    "proxyAddresses",
    "state",
    "streetAddress",
    "surname",
    "telephoneNumber",
    "usageLocation",
];

/// A user payload being assembled from framework attributes.
///
/// The password is held apart from the body until the request is built.
#[derive(Default)]
pub(crate) struct UserPayload {
    body: Map<String, Value>,
    password: Option<SecretString>,
    force_change_password: Option<bool>,
    user_principal_name: Option<String>,
    /// `Some(None)` clears every license.
    license: Option<Option<String>>,
    immutable_id_supplied: bool,
    usage_location_supplied: bool,
}

impl UserPayload {
    fn add(
        &mut self,
        name: &str,
        value: &AttributeValue,
        encoding: Option<ImmutableIdEncoding>,
    ) -> Office365Result<()> {
        match name {
            UID_ATTRIBUTE => {}
            PASSWORD_ATTRIBUTE => {
                let password = single_string(name, value)?;
                self.password = Some(SecretString::from(password));
            }
            FORCE_CHANGE_PASSWORD_ATTR => {
                self.force_change_password = Some(boolean(name, value)?);
            }
            ACCOUNT_ENABLED => {
                self.body.insert(name.to_string(), Value::Bool(boolean(name, value)?));
            }
            NAME_ATTRIBUTE => {
                let upn = single_string(name, value)?;
                self.body
                    .insert(USER_PRINCIPAL_NAME.to_string(), Value::String(upn.clone()));
                self.user_principal_name = Some(upn);
            }
            LICENSE_ATTR => {
                let specs = value.as_strings();
                if specs.len() > 1 {
                    warn!(count = specs.len(), "Several licenses requested, only the last is kept");
                }
                self.license = Some(specs.last().map(|s| s.to_string()));
            }
            IMMUTABLE_ID_ATTR => {
                let raw = single_string(name, value)?;
                let encoded = match encoding {
                    Some(mode) => immutable_id::encode(&raw, mode)?,
                    None => raw,
                };
                self.body.insert(name.to_string(), Value::String(encoded));
                self.immutable_id_supplied = true;
            }
            _ => {
                let json = user_attribute_json(name, value)?;
                if name == USAGE_LOCATION_ATTR {
                    self.usage_location_supplied = match &json {
                        Value::String(location) => !location.trim().is_empty(),
                        other => !other.is_null(),
                    };
                }
                self.body.insert(name.to_string(), json);
            }
        }
        Ok(())
    }

    fn clear(&mut self, name: &str) {
        match name {
            LICENSE_ATTR => self.license = Some(None),
            PASSWORD_ATTRIBUTE | FORCE_CHANGE_PASSWORD_ATTR | NAME_ATTRIBUTE | UID_ATTRIBUTE => {
                warn!(attribute = name, "Attribute cannot be cleared, ignoring");
            }
            _ => {
                self.body.insert(name.to_string(), Value::Null);
            }
        }
    }

    /// Build the payload of a new user.
    pub(crate) fn for_create(
        attributes: &AttributeSet,
        encoding: Option<ImmutableIdEncoding>,
    ) -> Office365Result<Self> {
        let mut payload = Self::default();
        for (name, value) in attributes.iter() {
            payload.add(name, value, encoding)?;
        }
        if payload.user_principal_name.is_none() {
            return Err(Office365Error::MissingAttribute(NAME_ATTRIBUTE.to_string()));
        }
        Ok(payload)
    }

    /// Build the payload of a modification.
    pub(crate) fn for_update(
        delta: &AttributeDelta,
        encoding: Option<ImmutableIdEncoding>,
    ) -> Office365Result<Self> {
        let mut payload = Self::default();
        for (name, value) in &delta.replace {
            payload.add(name, value, encoding)?;
        }
        for name in &delta.clear {
            payload.clear(name);
        }
        Ok(payload)
    }

    /// The JSON body, password profile included.
    pub(crate) fn body(&self) -> Value {
        let mut body = self.body.clone();
        match (&self.password, self.force_change_password) {
            (Some(password), force) => {
                body.insert(
                    "passwordProfile".to_string(),
                    json!({
                        "password": password.expose_secret(),
                        "forceChangePasswordNextLogin": force.unwrap_or(false),
                    }),
                );
            }
            (None, Some(_)) => {
                warn!("forceChangePasswordNextLogin ignored without a password");
            }
            (None, None) => {}
        }
        Value::Object(body)
    }

    fn has_changes(&self) -> bool {
        !self.body.is_empty() || self.password.is_some()
    }

    /// Attribute names in the body, for logging.
    fn attribute_names(&self) -> Vec<&str> {
        self.body.keys().map(String::as_str).collect()
    }
}

fn single_string(name: &str, value: &AttributeValue) -> Office365Result<String> {
    match value.as_strings().as_slice() {
        [single] => Ok((*single).to_string()),
        _ => Err(Office365Error::InvalidAttribute {
            attribute: name.to_string(),
            message: "expected a single string".to_string(),
        }),
    }
}

fn boolean(name: &str, value: &AttributeValue) -> Office365Result<bool> {
    let single = match value {
        AttributeValue::Array(values) if values.len() == 1 => &values[0],
        other => other,
    };
    single.as_boolean().ok_or_else(|| Office365Error::InvalidAttribute {
        attribute: name.to_string(),
        message: "expected a boolean".to_string(),
    })
}

/// JSON for an ordinary user attribute, shaped by its multiplicity.
fn user_attribute_json(name: &str, value: &AttributeValue) -> Office365Result<Value> {
    let multi = schema::is_multi_valued(USER_OBJECT_CLASS, name);
    match value {
        AttributeValue::Array(values) if !multi => match values.as_slice() {
            [] => Ok(Value::Null),
            [single] => Ok(single.to_json()),
            _ => Err(Office365Error::InvalidAttribute {
                attribute: name.to_string(),
                message: format!("single-valued attribute given {} values", values.len()),
            }),
        },
        AttributeValue::Null => Ok(Value::Null),
        single if multi && !single.is_multi_valued() => Ok(Value::Array(vec![single.to_json()])),
        other => Ok(other.to_json()),
    }
}

fn is_duplicate(err: &Office365Error) -> bool {
    match err {
        Office365Error::Directory {
            status, message, ..
        } => *status == 409 || message.to_lowercase().contains("already exists"),
        _ => false,
    }
}

/// Convert a directory user into an [`AttributeSet`].
///
/// # Errors
///
/// [`Office365Error::InvalidResponse`] unless the object is a user with an
/// `objectId`.
pub fn make_user_object(user: &Value) -> Office365Result<AttributeSet> {
    let object_type = user.get("objectType").and_then(Value::as_str);
    if object_type != Some("User") {
        return Err(Office365Error::InvalidResponse(format!(
            "expected objectType User, got {}",
            object_type.unwrap_or("none")
        )));
    }
    let object_id = user
        .get("objectId")
        .and_then(Value::as_str)
        .ok_or_else(|| Office365Error::InvalidResponse("user has no objectId".to_string()))?;

    let mut attributes = AttributeSet::new();
    attributes.set(UID_ATTRIBUTE, object_id);
    if let Some(upn) = user.get(USER_PRINCIPAL_NAME).and_then(Value::as_str) {
        attributes.set(NAME_ATTRIBUTE, upn);
    }
    for &name in USER_READ_ATTRIBUTES {
        match user.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => attributes.set(name, AttributeValue::from_json(value)),
        }
    }
    Ok(attributes)
}

impl Office365Connector {
    /// Creates a user and, when a usage location is given, assigns its
    /// license.
    ///
    /// # Errors
    ///
    /// Fails before any request when `__NAME__` is missing or when the
    /// principal's domain is federated and no `immutableId` is supplied.
    /// A duplicate principal name yields [`Office365Error::AlreadyExists`].
    /// License failures after creation are logged only.
    #[instrument(skip(self, attributes))]
    pub async fn create_user(&self, attributes: &AttributeSet) -> Office365Result<Uid> {
        let payload = UserPayload::for_create(attributes, self.config().immutable_id_encoding)?;
        let upn = payload.user_principal_name.clone().unwrap_or_default();
        info!(user_principal_name = %upn, "Creating user");

        if !payload.immutable_id_supplied && self.classifier().is_federated(&upn).await? {
            error!(user_principal_name = %upn, "Federated user without immutableId");
            return Err(Office365Error::MissingAttribute(IMMUTABLE_ID_ATTR.to_string()));
        }

        debug!(attributes = ?payload.attribute_names(), "User create payload");
        let created = match self.client().post("/users", &payload.body()).await {
            Ok(outcome) => outcome,
            Err(e) if is_duplicate(&e) => {
                warn!(user_principal_name = %upn, "User already exists");
                return Err(Office365Error::AlreadyExists { message: upn });
            }
            Err(e) => return Err(e),
        };
        let object_id = created.uid().to_string();
        info!(user_principal_name = %upn, %object_id, "User created");

        match payload.license {
            Some(Some(spec)) if payload.usage_location_supplied => {
                if let Err(e) = self.reconciler().assign_license(&object_id, Some(&spec)).await {
                    error!(%object_id, license = %spec, error = %e, "Failed to assign license");
                }
            }
            Some(Some(spec)) => {
                error!(%object_id, license = %spec, "Usage location not set, unable to assign license");
            }
            _ => {}
        }

        Ok(Uid::from_value(object_id))
    }

    /// Modifies a user. A `licenses` change is applied after the PATCH;
    /// clearing it removes every license.
    #[instrument(skip(self, delta))]
    pub async fn update_user(&self, user_id: &str, delta: &AttributeDelta) -> Office365Result<Uid> {
        if delta.is_empty() {
            return Err(Office365Error::InvalidAttribute {
                attribute: UID_ATTRIBUTE.to_string(),
                message: "no attributes passed for update".to_string(),
            });
        }
        let payload = UserPayload::for_update(delta, self.config().immutable_id_encoding)?;

        if payload.has_changes() {
            debug!(user_id, attributes = ?payload.attribute_names(), "User modify payload");
            self.client()
                .patch(&format!("/users/{user_id}"), &payload.body())
                .await?;
            info!(user_id, "User modified");
        }

        if let Some(license) = &payload.license {
            self.reconciler()
                .assign_license(user_id, license.as_deref())
                .await?;
        }

        Ok(Uid::from_value(user_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Office365Result<()> {
        self.client().delete(&format!("/users/{user_id}")).await?;
        info!(user_id, "User deleted");
        Ok(())
    }

    /// Reads one user; `None` when the directory answers 404.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Office365Result<Option<AttributeSet>> {
        match self.client().get(&format!("/users/{user_id}")).await {
            Ok(user) => make_user_object(&user).map(Some),
            Err(e) if e.status() == Some(404) => {
                debug!(user_id, "User not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
