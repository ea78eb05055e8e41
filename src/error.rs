//! Error taxonomy: local precondition errors, translated daemon errors,
//! prompt failures, and the [`MultiError`] aggregate used at every batch
//! boundary.

use std::time::Duration;

/// Errors returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bus connection handle is absent or reports no unique name.
    #[error("no live dbus connection")]
    NoConnection,

    /// An object path was empty, whitespace-only, or syntactically invalid.
    #[error("invalid dbus object path: {0:?}")]
    BadPath(String),

    /// A search was requested with an empty attribute map.
    #[error("no attributes given to search on")]
    MissingAttributes,

    /// A batched secret fetch was requested with no item paths.
    #[error("no item paths given")]
    MissingPaths,

    /// A bulk lock/unlock was requested with no target objects.
    #[error("no objects given to lock or unlock")]
    MissingObjects,

    /// No collection matched the requested name, alias, or label.
    #[error("no such collection or alias")]
    NotFound,

    /// The prompt result did not carry an object path where one was expected.
    #[error("prompt completed without a usable result")]
    PromptResult,

    /// The user dismissed the prompt dialog.
    #[error("prompt was dismissed")]
    PromptDismissed,

    /// The completion signal never arrived within the wait bound.
    #[error("timed out after {0:?} waiting for prompt completion")]
    PromptTimeout(Duration),

    /// The signal stream ended before a matching completion was observed.
    #[error("signal stream closed while waiting for prompt completion")]
    PromptClosed,

    /// A recognized Secret Service protocol error.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Any other bus-level failure.
    #[error(transparent)]
    Bus(zbus::Error),

    /// Multiple non-fatal failures collected from a batch operation.
    #[error(transparent)]
    Multi(#[from] MultiError),
}

impl From<zbus::Error> for Error {
    /// Wraps a bus error, translating method errors whose D-Bus error name
    /// belongs to the Secret Service error family into [`DaemonError`].
    fn from(err: zbus::Error) -> Self {
        if let zbus::Error::MethodError(name, _, _) = &err
            && let Some(daemon) = DaemonError::from_name(name.as_str())
        {
            return Error::Daemon(daemon);
        }
        Error::Bus(err)
    }
}

impl From<zbus::fdo::Error> for Error {
    fn from(err: zbus::fdo::Error) -> Self {
        Error::from(zbus::Error::from(err))
    }
}

impl From<zvariant::Error> for Error {
    fn from(err: zvariant::Error) -> Self {
        Error::Bus(zbus::Error::from(err))
    }
}

/// The closed family of protocol-defined Secret Service errors.
///
/// Codes the daemon may emit that fall outside this family map to
/// [`DaemonError::Unknown`] rather than failing translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DaemonError {
    #[error("an invalid message or data was received from the secret service")]
    Protocol,
    #[error("the item or collection is locked; the operation cannot be performed")]
    IsLocked,
    #[error("no such item or collection exists in the secret service")]
    NoSuchObject,
    #[error("an item or collection with that name already exists")]
    AlreadyExists,
    #[error("the file or content format is invalid")]
    InvalidFileFormat,
    #[error("unrecognized secret service error")]
    Unknown,
}

impl DaemonError {
    const DBUS_ERROR_PREFIX: &str = "org.freedesktop.Secret.Error.";

    /// Translates a numeric protocol error code. Unrecognized codes yield
    /// [`DaemonError::Unknown`], never a panic.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Protocol,
            1 => Self::IsLocked,
            2 => Self::NoSuchObject,
            3 => Self::AlreadyExists,
            4 => Self::InvalidFileFormat,
            _ => Self::Unknown,
        }
    }

    /// Translates a D-Bus error name, returning `None` for names outside
    /// the Secret Service error namespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let suffix = name.strip_prefix(Self::DBUS_ERROR_PREFIX)?;
        Some(match suffix {
            "IsLocked" => Self::IsLocked,
            "NoSuchObject" => Self::NoSuchObject,
            "AlreadyExists" => Self::AlreadyExists,
            _ => Self::Unknown,
        })
    }

    /// The symbolic name used by libsecret for this error kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Protocol => "SECRET_ERROR_PROTOCOL",
            Self::IsLocked => "SECRET_ERROR_IS_LOCKED",
            Self::NoSuchObject => "SECRET_ERROR_NO_SUCH_OBJECT",
            Self::AlreadyExists => "SECRET_ERROR_ALREADY_EXISTS",
            Self::InvalidFileFormat => "SECRET_ERROR_INVALID_FILE_FORMAT",
            Self::Unknown => "SECRET_ERROR_UNKNOWN",
        }
    }
}

/// An aggregate of non-fatal failures collected while iterating a batch.
///
/// Batch operations such as [`crate::Service::collections`] construct one
/// proxy per returned path; a failure for one path must not discard the
/// others. Every individual failure is retained here and the aggregate is
/// handed back alongside the successes.
#[derive(Debug, Default, thiserror::Error)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates the constituent errors in the order they were collected.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected, otherwise the aggregate itself.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s): ", self.errors.len())?;
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for MultiError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// The outcome of a batch operation: the entries that were produced plus
/// the aggregate of per-entry failures (empty when everything succeeded).
#[derive(Debug)]
pub struct Partial<T> {
    pub value: T,
    pub errors: MultiError,
}

impl<T> Partial<T> {
    pub(crate) fn new(value: T, errors: MultiError) -> Self {
        Self { value, errors }
    }

    /// True when no per-entry failure was recorded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The value if the batch was complete, otherwise the aggregate error.
    /// Callers that can work with a subset should read the fields directly.
    pub fn into_complete(self) -> Result<T, MultiError> {
        if self.errors.is_empty() {
            Ok(self.value)
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_error_from_known_codes() {
        assert_eq!(DaemonError::from_code(0), DaemonError::Protocol);
        assert_eq!(DaemonError::from_code(1), DaemonError::IsLocked);
        assert_eq!(DaemonError::from_code(2), DaemonError::NoSuchObject);
        assert_eq!(DaemonError::from_code(3), DaemonError::AlreadyExists);
        assert_eq!(DaemonError::from_code(4), DaemonError::InvalidFileFormat);
    }

    #[test]
    fn daemon_error_unknown_code_is_sentinel() {
        assert_eq!(DaemonError::from_code(99), DaemonError::Unknown);
        assert_eq!(DaemonError::from_code(u32::MAX), DaemonError::Unknown);
    }

    #[test]
    fn daemon_error_from_dbus_name() {
        assert_eq!(
            DaemonError::from_name("org.freedesktop.Secret.Error.IsLocked"),
            Some(DaemonError::IsLocked)
        );
        assert_eq!(
            DaemonError::from_name("org.freedesktop.Secret.Error.NoSuchObject"),
            Some(DaemonError::NoSuchObject)
        );
        assert_eq!(
            DaemonError::from_name("org.freedesktop.Secret.Error.AlreadyExists"),
            Some(DaemonError::AlreadyExists)
        );
    }

    #[test]
    fn daemon_error_name_outside_namespace_is_none() {
        assert_eq!(
            DaemonError::from_name("org.freedesktop.DBus.Error.ServiceUnknown"),
            None
        );
        assert_eq!(DaemonError::from_name(""), None);
    }

    #[test]
    fn daemon_error_unrecognized_in_namespace_is_sentinel() {
        assert_eq!(
            DaemonError::from_name("org.freedesktop.Secret.Error.SomethingNew"),
            Some(DaemonError::Unknown)
        );
    }

    #[test]
    fn daemon_error_names_are_stable() {
        assert_eq!(DaemonError::IsLocked.name(), "SECRET_ERROR_IS_LOCKED");
        assert_eq!(DaemonError::Protocol.name(), "SECRET_ERROR_PROTOCOL");
    }

    #[test]
    fn multi_error_retains_every_failure() {
        let mut errs = MultiError::new();
        assert!(errs.is_empty());
        errs.push(Error::NotFound);
        errs.push(Error::MissingAttributes);
        errs.push(Error::BadPath("oops".into()));
        assert_eq!(errs.len(), 3);
        assert_eq!(errs.iter().count(), 3);
    }

    #[test]
    fn multi_error_display_joins_with_separator() {
        let errs = MultiError::from(vec![Error::NotFound, Error::MissingPaths]);
        let rendered = errs.to_string();
        assert!(rendered.starts_with("2 error(s): "));
        assert!(rendered.contains("; "));
        assert!(rendered.contains("no such collection or alias"));
        assert!(rendered.contains("no item paths given"));
    }

    #[test]
    fn empty_multi_error_into_result_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
        let errs = MultiError::from(vec![Error::NotFound]);
        assert!(errs.into_result().is_err());
    }

    #[test]
    fn partial_complete_round_trip() {
        let partial = Partial::new(vec![1, 2, 3], MultiError::new());
        assert!(partial.is_complete());
        assert_eq!(partial.into_complete().unwrap(), vec![1, 2, 3]);

        let partial = Partial::new(vec![1], MultiError::from(vec![Error::NotFound]));
        assert!(!partial.is_complete());
        assert_eq!(partial.errors.len(), 1);
        assert_eq!(partial.value, vec![1]);
    }
}
