//! Connection and object-path validation, plus small path helpers.
//!
//! Every handle constructor funnels through [`check_conn_and_path`], which
//! accumulates both failures instead of short-circuiting so a caller sees
//! everything that is wrong with the pair at once.

use zbus::Connection;
use zvariant::{ObjectPath, OwnedObjectPath};

use crate::error::{Error, MultiError};
use crate::PROMPT_PATH_PREFIX;

/// Checks that a bus connection is live. A connected bus endpoint always
/// carries a unique name assigned by the bus; its absence means the
/// handshake never completed or the connection is a peer-to-peer socket we
/// cannot address the daemon through.
pub fn connection_is_valid(conn: &Connection) -> Result<(), Error> {
    if conn.unique_name().is_none() {
        return Err(Error::NoConnection);
    }
    Ok(())
}

/// Checks that `path` is a well-formed, non-empty object path and returns
/// the typed form.
pub fn path_is_valid(path: &str) -> Result<ObjectPath<'_>, Error> {
    if path.trim().is_empty() {
        return Err(Error::BadPath(path.to_string()));
    }
    ObjectPath::try_from(path).map_err(|_| Error::BadPath(path.to_string()))
}

/// Runs both checks, accumulating rather than short-circuiting.
pub fn check_conn_and_path(conn: &Connection, path: &str) -> Result<(), MultiError> {
    let mut errs = MultiError::new();
    if let Err(err) = connection_is_valid(conn) {
        errs.push(err);
    }
    if let Err(err) = path_is_valid(path) {
        errs.push(err);
    }
    errs.into_result()
}

/// True when `path` names a Prompt object, i.e. lives under the prompt
/// path prefix. Gated calls use this to decide whether the returned path
/// is a real result or a prompt that must be completed first.
pub fn is_prompt_path(path: &ObjectPath<'_>) -> bool {
    path.as_str().starts_with(PROMPT_PATH_PREFIX)
}

/// The trailing segment of an object path, as the object's name appears on
/// the bus. `/org/freedesktop/secrets/collection/login` yields `login`.
pub fn name_from_path<'a>(path: &'a ObjectPath<'_>) -> Result<&'a str, Error> {
    let raw = path.as_str();
    raw.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| Error::BadPath(raw.to_string()))
}

/// The parent of an object path. Item paths live directly under their
/// collection's path, so this recovers the owning collection.
pub fn parent_path(path: &ObjectPath<'_>) -> Result<OwnedObjectPath, Error> {
    let raw = path.as_str();
    let (parent, _) = raw
        .rsplit_once('/')
        .filter(|(parent, _)| !parent.is_empty())
        .ok_or_else(|| Error::BadPath(raw.to_string()))?;
    ObjectPath::try_from(parent)
        .map(OwnedObjectPath::from)
        .map_err(|_| Error::BadPath(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_paths_are_rejected() {
        assert!(matches!(path_is_valid(""), Err(Error::BadPath(_))));
        assert!(matches!(path_is_valid("   "), Err(Error::BadPath(_))));
        assert!(matches!(path_is_valid("\t"), Err(Error::BadPath(_))));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(path_is_valid("no-leading-slash").is_err());
        assert!(path_is_valid("/trailing/slash/").is_err());
        assert!(path_is_valid("/double//slash").is_err());
        assert!(path_is_valid("/bad-char!").is_err());
    }

    #[test]
    fn well_formed_paths_are_accepted() {
        assert!(path_is_valid("/").is_ok());
        assert!(path_is_valid("/org/freedesktop/secrets").is_ok());
        assert!(path_is_valid("/org/freedesktop/secrets/collection/login").is_ok());
    }

    #[test]
    fn prompt_paths_are_recognized() {
        let prompt = ObjectPath::try_from("/org/freedesktop/secrets/prompt/p7").unwrap();
        assert!(is_prompt_path(&prompt));

        let root = ObjectPath::try_from("/").unwrap();
        assert!(!is_prompt_path(&root));

        let collection =
            ObjectPath::try_from("/org/freedesktop/secrets/collection/login").unwrap();
        assert!(!is_prompt_path(&collection));
    }

    #[test]
    fn name_is_trailing_segment() {
        let path = ObjectPath::try_from("/org/freedesktop/secrets/collection/login").unwrap();
        assert_eq!(name_from_path(&path).unwrap(), "login");

        let root = ObjectPath::try_from("/").unwrap();
        assert!(name_from_path(&root).is_err());
    }

    #[test]
    fn parent_of_item_is_its_collection() {
        let item =
            ObjectPath::try_from("/org/freedesktop/secrets/collection/login/42").unwrap();
        let parent = parent_path(&item).unwrap();
        assert_eq!(parent.as_str(), "/org/freedesktop/secrets/collection/login");

        let root = ObjectPath::try_from("/").unwrap();
        assert!(parent_path(&root).is_err());
    }
}
