//! The root Service handle and bulk operations that span collections.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, warn};
use zbus::Connection;
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::check::{connection_is_valid, name_from_path, parent_path};
use crate::collection::Collection;
use crate::error::{DaemonError, Error, MultiError, Partial};
use crate::item::Item;
use crate::prompt::{complete_if_prompt, path_from_result};
use crate::proxy::{
    COLLECTION_PROP_CREATED, COLLECTION_PROP_LABEL, COLLECTION_PROP_MODIFIED, ServiceProxy,
};
use crate::secret::Secret;
use crate::session::Session;
use crate::tracker::epoch_secs;
use crate::{ALGORITHM_PLAIN, NO_OBJECT_PATH};

/// Anything the daemon can lock and unlock: a [`Collection`] or an
/// [`Item`]. [`Service::lock`] and [`Service::unlock`] accept a mixed
/// batch of both.
#[async_trait]
pub trait Lockable: Send + Sync {
    /// Path of the object on the bus.
    fn lockable_path(&self) -> &OwnedObjectPath;

    /// Re-reads the object's lock state from the daemon so the handle's
    /// cache converges with the outcome of a bulk lock/unlock.
    async fn refresh_locked(&self) -> Result<bool, Error>;
}

/// The result of a cross-collection search, split by lock state as the
/// daemon reports it.
#[derive(Debug)]
pub struct ItemSearch {
    pub unlocked: Vec<Item>,
    pub locked: Vec<Item>,
}

/// The client's root handle: a connection to the session bus plus an open
/// default [`Session`] for secret transfer.
#[derive(Debug)]
pub struct Service {
    conn: Connection,
    proxy: ServiceProxy<'static>,
    session: Session,
    legacy: bool,
}

impl Service {
    /// Connects to the session bus and opens the default transfer session.
    /// Construction is all-or-nothing: a `Service` always has a usable
    /// session.
    pub async fn new() -> Result<Self, Error> {
        let conn = Connection::session().await.map_err(Error::from)?;
        Self::with_connection(conn).await
    }

    /// Builds a `Service` over an existing bus connection.
    pub async fn with_connection(conn: Connection) -> Result<Self, Error> {
        connection_is_valid(&conn)?;
        let proxy = ServiceProxy::new(&conn).await.map_err(Error::from)?;
        let (session, _) = open_session_on(&conn, &proxy, ALGORITHM_PLAIN, "").await?;
        debug!(session = %session.path(), "connected to secret service");
        Ok(Self {
            conn,
            proxy,
            session,
            legacy: false,
        })
    }

    /// Marks the daemon as a pre-spec implementation. Legacy daemons
    /// reject the `Type` property on item creation, so collections created
    /// through a legacy service omit it.
    pub fn set_legacy(&mut self, legacy: bool) {
        self.legacy = legacy;
    }

    /// The default transfer session opened at construction.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying bus connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Closes the default session. The bus connection itself is shut down
    /// when the last handle to it is dropped.
    pub async fn close(&self) -> Result<(), Error> {
        self.session.close().await
    }

    /// Opens an additional transfer session. A blank `algorithm` selects
    /// `plain`. Returns the session together with the daemon's algorithm
    /// output parameter (always empty under `plain`).
    pub async fn open_session(
        &self,
        algorithm: &str,
        input: &str,
    ) -> Result<(Session, OwnedValue), Error> {
        let algorithm = match algorithm.trim() {
            "" => ALGORITHM_PLAIN,
            other => other,
        };
        open_session_on(&self.conn, &self.proxy, algorithm, input).await
    }

    /// Every collection the daemon exposes. Handles that fail to construct
    /// are reported in the partial result without discarding the rest.
    pub async fn collections(&self) -> Result<Partial<Vec<Collection>>, Error> {
        let paths = self.proxy.collections().await?;
        let mut collections = Vec::with_capacity(paths.len());
        let mut errs = MultiError::new();
        for path in paths {
            match Collection::new(&self.conn, path, self.legacy).await {
                Ok(coll) => collections.push(coll),
                Err(err) => errs.push(err),
            }
        }
        Ok(Partial::new(collections, errs))
    }

    /// Creates a collection labelled `label` with no alias.
    pub async fn create_collection(&self, label: &str) -> Result<Collection, Error> {
        self.create_aliased_collection(label, "").await
    }

    /// Creates a collection labelled `label` and binds it to `alias`.
    /// Completes the daemon's prompt if it interposes one.
    pub async fn create_aliased_collection(
        &self,
        label: &str,
        alias: &str,
    ) -> Result<Collection, Error> {
        let now = epoch_secs(SystemTime::now());
        let props: HashMap<&str, Value<'_>> = HashMap::from([
            (COLLECTION_PROP_LABEL, Value::from(label)),
            (COLLECTION_PROP_CREATED, Value::from(now)),
            (COLLECTION_PROP_MODIFIED, Value::from(now)),
        ]);

        debug!(label, alias, "creating collection");
        let result = self
            .proxy
            .create_collection(props, alias)
            .await
            .map_err(Error::from)?;

        let path = match complete_if_prompt(&self.conn, &result.prompt).await? {
            Some(value) => path_from_result(value)?,
            None => result.collection,
        };
        let collection = Collection::new(&self.conn, path, self.legacy).await?;
        if !alias.is_empty() {
            collection.remember_alias(alias);
        }
        Ok(collection)
    }

    /// Resolves a collection by `name`, trying in order: an alias of that
    /// name, a collection whose path ends in `name`, and a collection
    /// labelled `name`.
    pub async fn get_collection(&self, name: &str) -> Result<Collection, Error> {
        match self.read_alias(name).await {
            Ok(coll) => return Ok(coll),
            Err(Error::NotFound) => {}
            Err(err) => return Err(err),
        }

        let Partial {
            value: collections,
            errors: mut errs,
        } = self.collections().await?;

        let mut target = None;
        for coll in &collections {
            match name_from_path(coll.path()) {
                Ok(path_name) if path_name == name => {
                    target = Some(coll.path().clone());
                    break;
                }
                Ok(_) => {}
                Err(err) => errs.push(err),
            }
        }
        if target.is_none() {
            target = collections
                .iter()
                .find(|c| c.label() == name)
                .map(|c| c.path().clone());
        }
        if let Some(path) = target {
            return take_match(collections, path);
        }

        debug!(name, "no collection matched by alias, path, or label");
        errs.into_result()?;
        Err(Error::NotFound)
    }

    /// Resolves a collection through an alias, e.g. `default`.
    ///
    /// The daemon signals a nonexistent alias with the `/` path; some
    /// implementations raise `NoSuchObject` instead. Both map to
    /// [`Error::NotFound`].
    pub async fn read_alias(&self, alias: &str) -> Result<Collection, Error> {
        let outcome = self.proxy.read_alias(alias).await.map_err(Error::from);
        let path = resolve_alias_outcome(outcome)?;
        let collection = Collection::new(&self.conn, path, self.legacy).await?;
        collection.remember_alias(alias);
        Ok(collection)
    }

    /// Binds `alias` to `collection`, displacing any previous holder.
    pub async fn set_alias(&self, alias: &str, collection: &Collection) -> Result<(), Error> {
        self.proxy
            .set_alias(alias, collection.path())
            .await
            .map_err(Error::from)?;
        collection.remember_alias(alias);
        Ok(())
    }

    /// Unbinds `alias` by pointing it at the distinguished `/` path.
    pub async fn remove_alias(&self, alias: &str) -> Result<(), Error> {
        let no_object = ObjectPath::try_from(NO_OBJECT_PATH)
            .map_err(|_| Error::BadPath(NO_OBJECT_PATH.to_string()))?;
        self.proxy
            .set_alias(alias, &no_object)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    /// Searches every collection for items whose attributes contain all of
    /// `attributes`, split by lock state.
    ///
    /// Items whose parent path does not correspond to a known collection,
    /// and items whose handle fails to construct, are reported in the
    /// partial result without discarding the rest.
    pub async fn search_items(
        &self,
        attributes: &HashMap<String, String>,
    ) -> Result<Partial<ItemSearch>, Error> {
        if attributes.is_empty() {
            return Err(Error::MissingAttributes);
        }
        let attrs: HashMap<&str, &str> = attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let result = self.proxy.search_items(attrs).await.map_err(Error::from)?;

        let known: HashSet<OwnedObjectPath> =
            self.proxy.collections().await?.into_iter().collect();

        let mut errs = MultiError::new();
        let unlocked = self
            .items_in_collections(result.unlocked, &known, &mut errs)
            .await;
        let locked = self
            .items_in_collections(result.locked, &known, &mut errs)
            .await;
        Ok(Partial::new(ItemSearch { unlocked, locked }, errs))
    }

    async fn items_in_collections(
        &self,
        paths: Vec<OwnedObjectPath>,
        known: &HashSet<OwnedObjectPath>,
        errs: &mut MultiError,
    ) -> Vec<Item> {
        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            match parent_path(&path) {
                Ok(parent) if known.contains(&parent) => {}
                Ok(parent) => {
                    warn!(item = %path, collection = %parent, "search result outside any known collection");
                    errs.push(Error::BadPath(path.to_string()));
                    continue;
                }
                Err(err) => {
                    errs.push(err);
                    continue;
                }
            }
            match Item::new(&self.conn, path).await {
                Ok(item) => items.push(item),
                Err(err) => errs.push(err),
            }
        }
        items
    }

    /// Fetches the secrets behind several items in one call, keyed by item
    /// path, using the default session.
    pub async fn get_secrets(
        &self,
        item_paths: &[OwnedObjectPath],
    ) -> Result<HashMap<OwnedObjectPath, Secret>, Error> {
        if item_paths.is_empty() {
            return Err(Error::MissingPaths);
        }
        let views: Vec<&ObjectPath<'_>> = item_paths.iter().map(|p| &**p).collect();
        let wire = self
            .proxy
            .get_secrets(views, self.session.path())
            .await
            .map_err(Error::from)?;
        Ok(wire
            .into_iter()
            .map(|(path, secret)| (path, Secret::from_wire(secret)))
            .collect())
    }

    /// Locks a batch of collections and items, then refreshes each
    /// handle's lock state so the caches converge with the daemon.
    pub async fn lock(&self, objects: &[&dyn Lockable]) -> Result<(), Error> {
        self.lock_or_unlock(objects, true).await
    }

    /// Unlocks a batch of collections and items, then refreshes each
    /// handle's lock state so the caches converge with the daemon.
    pub async fn unlock(&self, objects: &[&dyn Lockable]) -> Result<(), Error> {
        self.lock_or_unlock(objects, false).await
    }

    async fn lock_or_unlock(&self, objects: &[&dyn Lockable], lock: bool) -> Result<(), Error> {
        if objects.is_empty() {
            return Err(Error::MissingObjects);
        }
        let paths: Vec<&ObjectPath<'_>> = objects
            .iter()
            .map(|o| &**o.lockable_path())
            .collect();
        lock_paths(&self.conn, &self.proxy, paths, lock).await?;
        for object in objects {
            object.refresh_locked().await?;
        }
        Ok(())
    }
}

/// Issues the daemon's Lock or Unlock call for a set of paths and
/// completes the prompt if one is interposed. Returns the paths the daemon
/// reported as affected directly (prompt-gated objects are not included).
pub(crate) async fn lock_paths(
    conn: &Connection,
    proxy: &ServiceProxy<'_>,
    paths: Vec<&ObjectPath<'_>>,
    lock: bool,
) -> Result<Vec<OwnedObjectPath>, Error> {
    debug!(count = paths.len(), lock, "changing lock state");
    let result = if lock {
        proxy.lock(paths).await
    } else {
        proxy.unlock(paths).await
    }
    .map_err(Error::from)?;
    complete_if_prompt(conn, &result.prompt).await?;
    Ok(result.object_paths)
}

async fn open_session_on(
    conn: &Connection,
    proxy: &ServiceProxy<'_>,
    algorithm: &str,
    input: &str,
) -> Result<(Session, OwnedValue), Error> {
    let result = proxy
        .open_session(algorithm, Value::from(input))
        .await
        .map_err(Error::from)?;
    let session = Session::new(conn, result.result).await?;
    Ok((session, result.output))
}

/// Pulls the collection at `path` out of `collections` by value. The path
/// always originates from the vector itself.
fn take_match(
    collections: Vec<Collection>,
    path: OwnedObjectPath,
) -> Result<Collection, Error> {
    collections
        .into_iter()
        .find(|c| *c.path() == path)
        .ok_or(Error::NotFound)
}

/// Maps the outcome of the daemon's ReadAlias call onto the resolution
/// contract: the `/` sentinel and a `NoSuchObject` reply both mean the
/// alias is unbound. A caller never receives a collection wrapping `/`.
fn resolve_alias_outcome(
    outcome: Result<OwnedObjectPath, Error>,
) -> Result<OwnedObjectPath, Error> {
    match outcome {
        Ok(path) if path.as_str() == NO_OBJECT_PATH => Err(Error::NotFound),
        Ok(path) => Ok(path),
        Err(Error::Daemon(DaemonError::NoSuchObject)) => Err(Error::NotFound),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> OwnedObjectPath {
        ObjectPath::try_from(raw).unwrap().into()
    }

    #[test]
    fn unbound_alias_sentinel_is_not_found() {
        assert!(matches!(
            resolve_alias_outcome(Ok(path("/"))),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn no_such_object_reply_is_not_found() {
        assert!(matches!(
            resolve_alias_outcome(Err(Error::Daemon(DaemonError::NoSuchObject))),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn bound_alias_resolves_to_its_path() {
        let resolved =
            resolve_alias_outcome(Ok(path("/org/freedesktop/secrets/collection/login")))
                .unwrap();
        assert_eq!(
            resolved.as_str(),
            "/org/freedesktop/secrets/collection/login"
        );
    }

    #[test]
    fn unrelated_failures_pass_through() {
        assert!(matches!(
            resolve_alias_outcome(Err(Error::Daemon(DaemonError::IsLocked))),
            Err(Error::Daemon(DaemonError::IsLocked))
        ));
    }
}
