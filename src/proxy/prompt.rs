//! Proxy for `org.freedesktop.Secret.Prompt`.

use zvariant::Value;

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Prompt",
    default_service = "org.freedesktop.secrets",
    gen_blocking = false
)]
pub trait Prompt {
    /// Asks the daemon to display the prompt. The result arrives later via
    /// the `Completed` signal, never in the method reply.
    fn prompt(&self, window_id: &str) -> zbus::Result<()>;

    fn dismiss(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn completed(&self, dismissed: bool, result: Value<'_>) -> zbus::Result<()>;
}
