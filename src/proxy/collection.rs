//! Proxy for `org.freedesktop.Secret.Collection`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use zvariant::{OwnedObjectPath, Type, Value};

use crate::secret::SecretStruct;

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Collection",
    default_service = "org.freedesktop.secrets",
    gen_blocking = false
)]
pub trait Collection {
    /// Returns the prompt path, or `/` when no prompt is required.
    fn delete(&self) -> zbus::Result<OwnedObjectPath>;

    fn search_items(
        &self,
        attributes: HashMap<&str, &str>,
    ) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn create_item(
        &self,
        properties: HashMap<&str, Value<'_>>,
        secret: &SecretStruct,
        replace: bool,
    ) -> zbus::Result<CreateItemResult>;

    #[zbus(property)]
    fn items(&self) -> zbus::fdo::Result<Vec<OwnedObjectPath>>;

    #[zbus(property)]
    fn label(&self) -> zbus::fdo::Result<String>;

    #[zbus(property)]
    fn set_label(&self, new_label: &str) -> zbus::fdo::Result<()>;

    #[zbus(property)]
    fn locked(&self) -> zbus::fdo::Result<bool>;

    #[zbus(property)]
    fn created(&self) -> zbus::fdo::Result<u64>;

    #[zbus(property)]
    fn modified(&self) -> zbus::fdo::Result<u64>;
}

#[derive(Debug, Serialize, Deserialize, Type)]
pub struct CreateItemResult {
    pub item: OwnedObjectPath,
    pub prompt: OwnedObjectPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_item_result_matches_daemon_signature() {
        assert_eq!(CreateItemResult::SIGNATURE.to_string(), "(oo)");
    }
}
