//! Proxy for `org.freedesktop.Secret.Service`, the daemon's root object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Type, Value};

use crate::secret::SecretStruct;

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Service",
    default_service = "org.freedesktop.secrets",
    default_path = "/org/freedesktop/secrets",
    gen_blocking = false
)]
pub trait Service {
    fn open_session(&self, algorithm: &str, input: Value<'_>)
        -> zbus::Result<OpenSessionResult>;

    fn create_collection(
        &self,
        properties: HashMap<&str, Value<'_>>,
        alias: &str,
    ) -> zbus::Result<CreateCollectionResult>;

    fn search_items(
        &self,
        attributes: HashMap<&str, &str>,
    ) -> zbus::Result<SearchItemsResult>;

    fn lock(&self, objects: Vec<&ObjectPath<'_>>) -> zbus::Result<LockActionResult>;

    fn unlock(&self, objects: Vec<&ObjectPath<'_>>) -> zbus::Result<LockActionResult>;

    fn get_secrets(
        &self,
        items: Vec<&ObjectPath<'_>>,
        session: &ObjectPath<'_>,
    ) -> zbus::Result<HashMap<OwnedObjectPath, SecretStruct>>;

    fn read_alias(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    fn set_alias(&self, name: &str, collection: &ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(property)]
    fn collections(&self) -> zbus::fdo::Result<Vec<OwnedObjectPath>>;
}

#[derive(Debug, Serialize, Deserialize, Type)]
pub struct OpenSessionResult {
    pub output: OwnedValue,
    pub result: OwnedObjectPath,
}

#[derive(Debug, Serialize, Deserialize, Type)]
pub struct CreateCollectionResult {
    pub collection: OwnedObjectPath,
    pub prompt: OwnedObjectPath,
}

#[derive(Debug, Serialize, Deserialize, Type)]
pub struct SearchItemsResult {
    pub unlocked: Vec<OwnedObjectPath>,
    pub locked: Vec<OwnedObjectPath>,
}

#[derive(Debug, Serialize, Deserialize, Type)]
pub struct LockActionResult {
    pub object_paths: Vec<OwnedObjectPath>,
    pub prompt: OwnedObjectPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_structs_match_daemon_signatures() {
        assert_eq!(OpenSessionResult::SIGNATURE.to_string(), "(vo)");
        assert_eq!(CreateCollectionResult::SIGNATURE.to_string(), "(oo)");
        assert_eq!(SearchItemsResult::SIGNATURE.to_string(), "(aoao)");
        assert_eq!(LockActionResult::SIGNATURE.to_string(), "(aoo)");
    }
}
