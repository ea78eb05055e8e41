//! zbus proxies for the five daemon interfaces.
//!
//! These mirror the Secret Service D-Bus API verbatim; the fixed interface
//! and property identifiers live here. Everything above this module works
//! with the typed handles instead.

pub mod collection;
pub mod item;
pub mod prompt;
pub mod service;
pub mod session;

pub use collection::{CollectionProxy, CreateItemResult};
pub use item::ItemProxy;
pub use prompt::PromptProxy;
pub use service::{
    CreateCollectionResult, LockActionResult, OpenSessionResult, SearchItemsResult, ServiceProxy,
};
pub use session::SessionProxy;

// Property identifiers passed inside the `properties` dict of
// CreateCollection and CreateItem.
pub const COLLECTION_PROP_LABEL: &str = "org.freedesktop.Secret.Collection.Label";
pub const COLLECTION_PROP_CREATED: &str = "org.freedesktop.Secret.Collection.Created";
pub const COLLECTION_PROP_MODIFIED: &str = "org.freedesktop.Secret.Collection.Modified";
pub const ITEM_PROP_LABEL: &str = "org.freedesktop.Secret.Item.Label";
pub const ITEM_PROP_TYPE: &str = "org.freedesktop.Secret.Item.Type";
pub const ITEM_PROP_ATTRIBUTES: &str = "org.freedesktop.Secret.Item.Attributes";
pub const ITEM_PROP_CREATED: &str = "org.freedesktop.Secret.Item.Created";
pub const ITEM_PROP_MODIFIED: &str = "org.freedesktop.Secret.Item.Modified";
