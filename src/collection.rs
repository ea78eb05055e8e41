//! A keyring: the daemon-side grouping of items.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;
use zbus::Connection;
use zvariant::{OwnedObjectPath, Value};

use crate::DEFAULT_ITEM_TYPE;
use crate::check::check_conn_and_path;
use crate::error::{Error, MultiError, Partial};
use crate::item::Item;
use crate::prompt::{complete_if_prompt, path_from_result};
use crate::proxy::{
    CollectionProxy, ITEM_PROP_ATTRIBUTES, ITEM_PROP_CREATED, ITEM_PROP_LABEL, ITEM_PROP_TYPE,
    ServiceProxy,
};
use crate::secret::Secret;
use crate::service::{Lockable, lock_paths};
use crate::tracker::{ModifiedTracker, epoch_secs, time_from_epoch};

/// A named group of items, e.g. the `login` keyring.
///
/// The label, lock state, and alias are cached on the handle and refreshed
/// by the operations that change them; lock state and timestamps can always
/// be re-read from the daemon through [`Collection::locked`] and
/// [`Collection::modified`].
#[derive(Debug)]
pub struct Collection {
    conn: Connection,
    proxy: CollectionProxy<'static>,
    service: ServiceProxy<'static>,
    path: OwnedObjectPath,
    label: Mutex<String>,
    alias: Mutex<Option<String>>,
    locked: AtomicBool,
    modified: ModifiedTracker,
    legacy: bool,
}

impl Collection {
    /// Builds a handle for the collection at `path` and populates its
    /// cached state from the daemon. Callers normally go through
    /// [`crate::Service::get_collection`] instead.
    pub(crate) async fn new(
        conn: &Connection,
        path: OwnedObjectPath,
        legacy: bool,
    ) -> Result<Self, Error> {
        check_conn_and_path(conn, path.as_str())?;
        let proxy = CollectionProxy::builder(conn)
            .path(path.clone())
            .map_err(Error::from)?
            .build()
            .await
            .map_err(Error::from)?;
        let service = ServiceProxy::new(conn).await.map_err(Error::from)?;
        let label = proxy.label().await?;
        let locked = proxy.locked().await?;
        let modified = ModifiedTracker::new();
        modified.observe(proxy.modified().await?);
        Ok(Self {
            conn: conn.clone(),
            proxy,
            service,
            path,
            label: Mutex::new(label),
            alias: Mutex::new(None),
            locked: AtomicBool::new(locked),
            modified,
            legacy,
        })
    }

    /// Path of the collection object on the bus.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// The collection's label as last seen by this handle.
    pub fn label(&self) -> String {
        self.label.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The alias this handle knows the collection under, if it was resolved
    /// or assigned through one.
    pub fn alias(&self) -> Option<String> {
        self.alias.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn remember_alias(&self, alias: &str) {
        *self.alias.lock().unwrap_or_else(|e| e.into_inner()) = Some(alias.to_string());
    }

    /// Renames the collection.
    pub async fn relabel(&self, label: &str) -> Result<(), Error> {
        self.proxy.set_label(label).await?;
        *self.label.lock().unwrap_or_else(|e| e.into_inner()) = label.to_string();
        self.modified().await?;
        Ok(())
    }

    /// Assigns `alias` to this collection, displacing whatever collection
    /// held it before.
    pub async fn set_alias(&self, alias: &str) -> Result<(), Error> {
        self.service.set_alias(alias, &self.path).await?;
        self.remember_alias(alias);
        self.modified().await?;
        Ok(())
    }

    /// The items in this collection. Handles that fail to construct are
    /// reported in the partial result without discarding the rest.
    pub async fn items(&self) -> Result<Partial<Vec<Item>>, Error> {
        let paths = self.proxy.items().await?;
        self.items_from_paths(paths).await
    }

    /// Creates (or, with `replace`, overwrites) an item in this collection.
    ///
    /// `item_type` defaults to `org.freedesktop.Secret.Generic`; against a
    /// legacy daemon the type property is omitted entirely because older
    /// daemons reject it. Completes the daemon's prompt if it interposes
    /// one. The daemon does not stamp timestamps on creation, so the new
    /// item's created and modified times are written explicitly afterwards.
    pub async fn create_item(
        &self,
        label: &str,
        attributes: &HashMap<String, String>,
        secret: &Secret,
        replace: bool,
        item_type: Option<&str>,
    ) -> Result<Item, Error> {
        let attrs: HashMap<&str, &str> = attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let now = SystemTime::now();
        let mut props: HashMap<&str, Value<'_>> = HashMap::from([
            (ITEM_PROP_LABEL, Value::from(label)),
            (ITEM_PROP_ATTRIBUTES, Value::from(attrs)),
            (ITEM_PROP_CREATED, Value::from(epoch_secs(now))),
        ]);
        if !self.legacy {
            props.insert(
                ITEM_PROP_TYPE,
                Value::from(item_type.unwrap_or(DEFAULT_ITEM_TYPE)),
            );
        }

        debug!(collection = %self.path, label, replace, "creating item");
        let result = self
            .proxy
            .create_item(props, &secret.to_wire(), replace)
            .await
            .map_err(Error::from)?;

        let path = match complete_if_prompt(&self.conn, &result.prompt).await? {
            Some(value) => path_from_result(value)?,
            None => result.item,
        };
        let item = Item::new(&self.conn, path).await?;
        item.set_created(now).await?;
        item.set_modified(now).await?;
        Ok(item)
    }

    /// Searches this collection for items whose attributes contain all of
    /// `attributes`.
    pub async fn search_items(
        &self,
        attributes: &HashMap<String, String>,
    ) -> Result<Partial<Vec<Item>>, Error> {
        if attributes.is_empty() {
            return Err(Error::MissingAttributes);
        }
        let attrs: HashMap<&str, &str> = attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let paths = self.proxy.search_items(attrs).await.map_err(Error::from)?;
        self.items_from_paths(paths).await
    }

    async fn items_from_paths(
        &self,
        paths: Vec<OwnedObjectPath>,
    ) -> Result<Partial<Vec<Item>>, Error> {
        let mut items = Vec::with_capacity(paths.len());
        let mut errs = MultiError::new();
        for path in paths {
            match Item::new(&self.conn, path).await {
                Ok(item) => items.push(item),
                Err(err) => errs.push(err),
            }
        }
        Ok(Partial::new(items, errs))
    }

    /// Whether the collection is locked, read fresh from the daemon.
    pub async fn locked(&self) -> Result<bool, Error> {
        let locked = self.proxy.locked().await?;
        self.locked.store(locked, Ordering::Relaxed);
        Ok(locked)
    }

    /// Locks the collection. A no-op if the daemon already reports it
    /// locked.
    pub async fn lock(&self) -> Result<(), Error> {
        if self.locked().await? {
            return Ok(());
        }
        lock_paths(&self.conn, &self.service, vec![&*self.path], true).await?;
        self.locked.store(true, Ordering::Relaxed);
        self.modified().await?;
        Ok(())
    }

    /// Unlocks the collection. A no-op if the daemon already reports it
    /// unlocked.
    pub async fn unlock(&self) -> Result<(), Error> {
        if !self.locked().await? {
            return Ok(());
        }
        lock_paths(&self.conn, &self.service, vec![&*self.path], false).await?;
        self.locked.store(false, Ordering::Relaxed);
        self.modified().await?;
        Ok(())
    }

    /// When the collection was created.
    pub async fn created(&self) -> Result<SystemTime, Error> {
        Ok(time_from_epoch(self.proxy.created().await?))
    }

    /// When the collection was last modified, and whether that is later
    /// than the last value this handle observed.
    pub async fn modified(&self) -> Result<(SystemTime, bool), Error> {
        let secs = self.proxy.modified().await?;
        let changed = self.modified.observe(secs);
        Ok((time_from_epoch(secs), changed))
    }

    /// Deletes the collection, completing the daemon's prompt if it
    /// interposes one.
    ///
    /// Items still inside are left behind as orphaned paths in the bus
    /// daemon's cache until it restarts; delete the items first when that
    /// matters.
    pub async fn delete(&self) -> Result<(), Error> {
        debug!(path = %self.path, "deleting collection");
        let prompt = self.proxy.delete().await?;
        complete_if_prompt(&self.conn, &prompt).await?;
        Ok(())
    }
}

#[async_trait]
impl Lockable for Collection {
    fn lockable_path(&self) -> &OwnedObjectPath {
        &self.path
    }

    async fn refresh_locked(&self) -> Result<bool, Error> {
        self.locked().await
    }
}
