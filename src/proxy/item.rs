//! Proxy for `org.freedesktop.Secret.Item`.

use std::collections::HashMap;

use zvariant::{ObjectPath, OwnedObjectPath};

use crate::secret::SecretStruct;

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Item",
    default_service = "org.freedesktop.secrets",
    gen_blocking = false
)]
pub trait Item {
    /// Returns the prompt path, or `/` when no prompt is required.
    fn delete(&self) -> zbus::Result<OwnedObjectPath>;

    fn get_secret(&self, session: &ObjectPath<'_>) -> zbus::Result<SecretStruct>;

    fn set_secret(&self, secret: &SecretStruct) -> zbus::Result<()>;

    #[zbus(property)]
    fn locked(&self) -> zbus::fdo::Result<bool>;

    #[zbus(property)]
    fn attributes(&self) -> zbus::fdo::Result<HashMap<String, String>>;

    #[zbus(property)]
    fn set_attributes(&self, attributes: HashMap<&str, &str>) -> zbus::fdo::Result<()>;

    #[zbus(property)]
    fn label(&self) -> zbus::fdo::Result<String>;

    #[zbus(property)]
    fn set_label(&self, new_label: &str) -> zbus::fdo::Result<()>;

    #[zbus(property, name = "Type")]
    fn item_type(&self) -> zbus::fdo::Result<String>;

    #[zbus(property, name = "Type")]
    fn set_item_type(&self, item_type: &str) -> zbus::fdo::Result<()>;

    #[zbus(property)]
    fn created(&self) -> zbus::fdo::Result<u64>;

    #[zbus(property)]
    fn set_created(&self, created: u64) -> zbus::fdo::Result<()>;

    #[zbus(property)]
    fn modified(&self) -> zbus::fdo::Result<u64>;

    #[zbus(property)]
    fn set_modified(&self, modified: u64) -> zbus::fdo::Result<()>;
}
