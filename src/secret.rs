//! The secret payload value object and its wire representation.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;
use zvariant::{OwnedObjectPath, Type};

use crate::session::Session;

/// Content type used when a caller supplies plain text.
pub const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain";

/// The Secret structure as it crosses the bus:
/// `(ObjectPath session, Array<Byte> parameters, Array<Byte> value, String content_type)`.
///
/// Only used at the proxy boundary; the public [`Secret`] type keeps the
/// value bytes in a zeroizing buffer instead.
#[derive(Clone, Serialize, Deserialize, Type)]
pub struct SecretStruct {
    pub(crate) session: OwnedObjectPath,
    pub(crate) parameters: Vec<u8>,
    pub(crate) value: Vec<u8>,
    pub(crate) content_type: String,
}

impl std::fmt::Debug for SecretStruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStruct")
            .field("session", &self.session)
            .field("value", &"[redacted]")
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A secret payload: raw bytes, a MIME content type, algorithm-dependent
/// encoding parameters (empty under the `plain` transport), and the path of
/// the session it was produced through.
///
/// The value bytes are zeroized when the last clone is dropped.
#[derive(Clone)]
pub struct Secret {
    session: OwnedObjectPath,
    parameters: Vec<u8>,
    value: Zeroizing<Vec<u8>>,
    content_type: String,
}

impl Secret {
    /// Builds a secret bound to `session` with explicit parameters and
    /// content type.
    pub fn new(
        session: &Session,
        parameters: Vec<u8>,
        value: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            session: session.path().clone(),
            parameters,
            value: Zeroizing::new(value.into()),
            content_type: content_type.into(),
        }
    }

    /// Builds a `text/plain` secret with no encoding parameters, which is
    /// what the `plain` transport expects.
    pub fn plain(session: &Session, value: impl Into<Vec<u8>>) -> Self {
        Self::new(session, Vec::new(), value, CONTENT_TYPE_TEXT_PLAIN)
    }

    /// The secret's raw bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// MIME content type of [`Secret::value`].
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Algorithm-dependent encoding parameters. Empty for plain sessions.
    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }

    /// Path of the session this secret is bound to.
    pub fn session_path(&self) -> &OwnedObjectPath {
        &self.session
    }

    pub(crate) fn to_wire(&self) -> SecretStruct {
        SecretStruct {
            session: self.session.clone(),
            parameters: self.parameters.clone(),
            value: self.value.to_vec(),
            content_type: self.content_type.clone(),
        }
    }

    pub(crate) fn from_wire(wire: SecretStruct) -> Self {
        Self {
            session: wire.session,
            parameters: wire.parameters,
            value: Zeroizing::new(wire.value),
            content_type: wire.content_type,
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("session", &self.session)
            .field("value", &"[redacted]")
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zvariant::ObjectPath;

    fn wire(value: &[u8]) -> SecretStruct {
        SecretStruct {
            session: ObjectPath::try_from("/org/freedesktop/secrets/session/s1")
                .unwrap()
                .into(),
            parameters: Vec::new(),
            value: value.to_vec(),
            content_type: CONTENT_TYPE_TEXT_PLAIN.to_string(),
        }
    }

    #[test]
    fn wire_struct_matches_daemon_signature() {
        assert_eq!(SecretStruct::SIGNATURE.to_string(), "(oayays)");
    }

    #[test]
    fn from_wire_preserves_fields() {
        let secret = Secret::from_wire(wire(b"hello"));
        assert_eq!(secret.value(), b"hello");
        assert_eq!(secret.content_type(), CONTENT_TYPE_TEXT_PLAIN);
        assert!(secret.parameters().is_empty());
        assert_eq!(
            secret.session_path().as_str(),
            "/org/freedesktop/secrets/session/s1"
        );
    }

    #[test]
    fn round_trip_through_wire_form() {
        let secret = Secret::from_wire(wire(b"payload"));
        let wire = secret.to_wire();
        assert_eq!(wire.value, b"payload");
        assert_eq!(wire.content_type, CONTENT_TYPE_TEXT_PLAIN);
    }

    #[test]
    fn debug_output_redacts_the_value() {
        let secret = Secret::from_wire(wire(b"super-sensitive"));
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super-sensitive"));
        assert!(rendered.contains("[redacted]"));

        let rendered = format!("{:?}", wire(b"super-sensitive"));
        assert!(!rendered.contains("super-sensitive"));
    }
}
