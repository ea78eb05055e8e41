//! Typed async client for the freedesktop.org Secret Service.
//!
//! The Secret Service daemon (`org.freedesktop.secrets`, usually
//! gnome-keyring or KWallet) stores secrets on behalf of desktop
//! applications and exposes them over the D-Bus session bus. This crate
//! maps the daemon's object hierarchy onto typed Rust handles:
//!
//! - [`Service`] — the root handle; opens the bus connection and a default
//!   decode [`Session`], resolves collections by name or alias, searches
//!   items across all collections, and performs bulk lock/unlock.
//! - [`Collection`] — a keyring grouping items, addressable by name or alias.
//! - [`Item`] — a single labelled entry with searchable string attributes.
//! - [`Secret`] — the raw payload bytes plus MIME content type behind an item.
//! - [`Prompt`] — the user-confirmation step the daemon may interpose before
//!   operations such as unlock, create, or delete complete.
//!
//! All encryption and persistence happen inside the daemon; this crate is
//! purely the caller-side proxy. Secret payloads are transferred over a
//! `"plain"` session and zeroized in client memory on drop.
//!
//! ```no_run
//! # async fn demo() -> Result<(), keybus::Error> {
//! let service = keybus::Service::new().await?;
//! let collection = service.get_collection("login").await?;
//! let secret = keybus::Secret::plain(service.session(), "hunter2");
//! let attributes = std::collections::HashMap::from([
//!     ("application".to_string(), "demo".to_string()),
//! ]);
//! collection
//!     .create_item("demo credential", &attributes, &secret, true, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod collection;
pub mod error;
pub mod item;
pub mod prompt;
pub mod proxy;
pub mod secret;
pub mod service;
pub mod session;
pub mod tracker;

pub use collection::Collection;
pub use error::{DaemonError, Error, MultiError, Partial};
pub use item::{ATTRIBUTE_REMOVE_SENTINEL, Item};
pub use prompt::Prompt;
pub use secret::Secret;
pub use service::{ItemSearch, Lockable, Service};
pub use session::Session;

/// Well-known bus name of the Secret Service daemon.
pub const BUS_NAME: &str = "org.freedesktop.secrets";

/// Object path of the root Service object.
pub const SERVICE_PATH: &str = "/org/freedesktop/secrets";

/// Path prefix under which the daemon creates Prompt objects. A path
/// returned from a gated call is a prompt if and only if it lives under
/// this prefix.
pub const PROMPT_PATH_PREFIX: &str = "/org/freedesktop/secrets/prompt/";

/// The distinguished "no object" path. Returned by the daemon for a
/// nonexistent alias, and sent by the client to remove an alias or to
/// signal that no prompt is required.
pub const NO_OBJECT_PATH: &str = "/";

/// Item type used when the caller does not supply one.
pub const DEFAULT_ITEM_TYPE: &str = "org.freedesktop.Secret.Generic";

/// The only transport-encryption algorithm this client negotiates.
pub const ALGORITHM_PLAIN: &str = "plain";
