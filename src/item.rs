//! A single stored secret entry and its metadata.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::check::{check_conn_and_path, parent_path};
use crate::error::Error;
use crate::prompt::complete_if_prompt;
use crate::proxy::ItemProxy;
use crate::secret::Secret;
use crate::service::Lockable;
use crate::session::Session;
use crate::tracker::{ModifiedTracker, epoch_secs, time_from_epoch};

/// Attribute value that marks a key for removal in
/// [`Item::modify_attributes`]. A NUL cannot occur in a D-Bus string, so
/// the sentinel can never collide with a real attribute value.
pub const ATTRIBUTE_REMOVE_SENTINEL: &str = "\u{0}";

/// One entry in a collection: a secret payload plus a label, a type, and a
/// map of searchable string attributes.
///
/// The label and lock state are cached on the handle; reads that matter
/// for freshness (`locked`, `modified`, `get_secret`) go back to the
/// daemon. The handle also keeps the secret most recently moved through
/// it, replaced on every fetch or write.
#[derive(Debug)]
pub struct Item {
    conn: Connection,
    proxy: ItemProxy<'static>,
    path: OwnedObjectPath,
    label: Mutex<String>,
    locked: AtomicBool,
    modified: ModifiedTracker,
    secret: Mutex<Option<Secret>>,
}

impl Item {
    pub(crate) async fn new(conn: &Connection, path: OwnedObjectPath) -> Result<Self, Error> {
        check_conn_and_path(conn, path.as_str())?;
        let proxy = ItemProxy::builder(conn)
            .path(path.clone())
            .map_err(Error::from)?
            .build()
            .await
            .map_err(Error::from)?;
        let label = proxy.label().await?;
        let locked = proxy.locked().await?;
        let modified = ModifiedTracker::new();
        modified.observe(proxy.modified().await?);
        Ok(Self {
            conn: conn.clone(),
            proxy,
            path,
            label: Mutex::new(label),
            locked: AtomicBool::new(locked),
            modified,
            secret: Mutex::new(None),
        })
    }

    /// Path of the item object on the bus.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Path of the collection this item lives under, derived from the
    /// item's own path.
    pub fn collection_path(&self) -> Result<OwnedObjectPath, Error> {
        parent_path(&self.path)
    }

    /// The item's label as last seen by this handle.
    pub fn label(&self) -> String {
        self.label.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Renames the item.
    pub async fn relabel(&self, label: &str) -> Result<(), Error> {
        self.proxy.set_label(label).await?;
        *self.label.lock().unwrap_or_else(|e| e.into_inner()) = label.to_string();
        Ok(())
    }

    /// The item's type string, e.g. `org.freedesktop.Secret.Generic`.
    pub async fn item_type(&self) -> Result<String, Error> {
        Ok(self.proxy.item_type().await?)
    }

    pub async fn change_item_type(&self, item_type: &str) -> Result<(), Error> {
        self.proxy.set_item_type(item_type).await?;
        Ok(())
    }

    /// The item's attribute map, read fresh from the daemon.
    pub async fn attributes(&self) -> Result<HashMap<String, String>, Error> {
        Ok(self.proxy.attributes().await?)
    }

    /// Replaces the attribute map wholesale.
    pub async fn replace_attributes(
        &self,
        attributes: &HashMap<String, String>,
    ) -> Result<(), Error> {
        let view: HashMap<&str, &str> = attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.proxy.set_attributes(view).await?;
        Ok(())
    }

    /// Applies a partial update to the attribute map.
    ///
    /// Keys present in `changes` overwrite the current value; a value of
    /// [`ATTRIBUTE_REMOVE_SENTINEL`] deletes the key instead. Keys the item
    /// does not already have are ignored, and if the merge produces no
    /// difference the daemon is not called at all.
    pub async fn modify_attributes(
        &self,
        changes: &HashMap<String, String>,
    ) -> Result<(), Error> {
        let current = self.proxy.attributes().await?;
        let Some(merged) = merge_attributes(&current, changes) else {
            debug!(path = %self.path, "attribute modification is a no-op");
            return Ok(());
        };
        let view: HashMap<&str, &str> = merged
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.proxy.set_attributes(view).await?;
        Ok(())
    }

    /// Fetches the item's secret through `session`. The daemon is called
    /// on every fetch, so a secret rotated by another client is picked up;
    /// the result becomes the handle's attached secret, replacing any
    /// earlier one.
    pub async fn get_secret(&self, session: &Session) -> Result<Secret, Error> {
        let wire = self.proxy.get_secret(session.path()).await?;
        Ok(attach_secret(&self.secret, Secret::from_wire(wire)))
    }

    /// The secret most recently fetched or written through this handle,
    /// if any. Does not call the daemon.
    pub fn cached_secret(&self) -> Option<Secret> {
        self.secret.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replaces the item's secret.
    pub async fn set_secret(&self, secret: &Secret) -> Result<(), Error> {
        self.proxy.set_secret(&secret.to_wire()).await?;
        attach_secret(&self.secret, secret.clone());
        Ok(())
    }

    /// Whether the item is locked, read fresh from the daemon.
    pub async fn locked(&self) -> Result<bool, Error> {
        let locked = self.proxy.locked().await?;
        self.locked.store(locked, Ordering::Relaxed);
        Ok(locked)
    }

    /// When the item was created.
    pub async fn created(&self) -> Result<SystemTime, Error> {
        Ok(time_from_epoch(self.proxy.created().await?))
    }

    /// When the item was last modified, and whether that is later than the
    /// last value this handle observed.
    pub async fn modified(&self) -> Result<(SystemTime, bool), Error> {
        let secs = self.proxy.modified().await?;
        let changed = self.modified.observe(secs);
        Ok((time_from_epoch(secs), changed))
    }

    /// Overrides the creation timestamp. Not all daemons honor writes to
    /// this property.
    pub async fn set_created(&self, created: SystemTime) -> Result<(), Error> {
        self.proxy.set_created(epoch_secs(created)).await?;
        Ok(())
    }

    /// Overrides the modification timestamp. Not all daemons honor writes
    /// to this property.
    pub async fn set_modified(&self, modified: SystemTime) -> Result<(), Error> {
        let secs = epoch_secs(modified);
        self.proxy.set_modified(secs).await?;
        self.modified.observe(secs);
        Ok(())
    }

    /// Deletes the item, completing the daemon's prompt if it interposes
    /// one.
    pub async fn delete(&self) -> Result<(), Error> {
        debug!(path = %self.path, "deleting item");
        let prompt = self.proxy.delete().await?;
        complete_if_prompt(&self.conn, &prompt).await?;
        Ok(())
    }
}

#[async_trait]
impl Lockable for Item {
    fn lockable_path(&self) -> &OwnedObjectPath {
        &self.path
    }

    async fn refresh_locked(&self) -> Result<bool, Error> {
        self.locked().await
    }
}

/// Attaches a secret to an item handle's slot, displacing whatever was
/// there. The latest fetch or write always wins.
fn attach_secret(slot: &Mutex<Option<Secret>>, secret: Secret) -> Secret {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(secret.clone());
    secret
}

/// Merges a partial attribute update into `current`.
///
/// Returns the replacement map, or `None` when the merge changes nothing
/// and no daemon round trip is needed.
fn merge_attributes(
    current: &HashMap<String, String>,
    changes: &HashMap<String, String>,
) -> Option<HashMap<String, String>> {
    let mut merged = current.clone();
    let mut dirty = false;
    for (key, value) in changes {
        if value == ATTRIBUTE_REMOVE_SENTINEL {
            dirty |= merged.remove(key).is_some();
        } else if let Some(existing) = merged.get_mut(key) {
            if existing != value {
                *existing = value.clone();
                dirty = true;
            }
        }
        // Keys the item does not carry are ignored.
    }
    dirty.then_some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::{CONTENT_TYPE_TEXT_PLAIN, SecretStruct};
    use zvariant::ObjectPath;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn secret(bytes: &[u8]) -> Secret {
        Secret::from_wire(SecretStruct {
            session: ObjectPath::try_from("/org/freedesktop/secrets/session/s1")
                .unwrap()
                .into(),
            parameters: Vec::new(),
            value: bytes.to_vec(),
            content_type: CONTENT_TYPE_TEXT_PLAIN.to_string(),
        })
    }

    #[test]
    fn each_fetch_displaces_the_attached_secret() {
        let slot = Mutex::new(None);

        let returned = attach_secret(&slot, secret(b"first"));
        assert_eq!(returned.value(), b"first");

        // A rotation by another writer arrives on the next fetch; the
        // attachment must follow it, not shadow it.
        attach_secret(&slot, secret(b"rotated"));
        let cached = slot.lock().unwrap().clone().unwrap();
        assert_eq!(cached.value(), b"rotated");
    }

    #[test]
    fn merge_updates_existing_keys() {
        let current = map(&[("user", "alice"), ("host", "db1")]);
        let merged = merge_attributes(&current, &map(&[("host", "db2")])).unwrap();
        assert_eq!(merged, map(&[("user", "alice"), ("host", "db2")]));
    }

    #[test]
    fn merge_ignores_unknown_keys() {
        let current = map(&[("user", "alice")]);
        assert!(merge_attributes(&current, &map(&[("color", "blue")])).is_none());
    }

    #[test]
    fn merge_with_equal_values_is_a_no_op() {
        let current = map(&[("user", "alice"), ("host", "db1")]);
        assert!(merge_attributes(&current, &map(&[("user", "alice")])).is_none());
        assert!(merge_attributes(&current, &HashMap::new()).is_none());
    }

    #[test]
    fn sentinel_removes_exactly_its_key() {
        let current = map(&[("user", "alice"), ("host", "db1")]);
        let merged =
            merge_attributes(&current, &map(&[("host", ATTRIBUTE_REMOVE_SENTINEL)])).unwrap();
        assert_eq!(merged, map(&[("user", "alice")]));
    }

    #[test]
    fn sentinel_for_absent_key_is_quiet() {
        let current = map(&[("user", "alice")]);
        assert!(
            merge_attributes(&current, &map(&[("gone", ATTRIBUTE_REMOVE_SENTINEL)])).is_none()
        );
    }

    #[test]
    fn mixed_update_applies_every_effective_change() {
        let current = map(&[("user", "alice"), ("host", "db1"), ("stale", "x")]);
        let changes = map(&[
            ("host", "db2"),
            ("stale", ATTRIBUTE_REMOVE_SENTINEL),
            ("user", "alice"),
            ("new", "ignored"),
        ]);
        let merged = merge_attributes(&current, &changes).unwrap();
        assert_eq!(merged, map(&[("user", "alice"), ("host", "db2")]));
    }
}
