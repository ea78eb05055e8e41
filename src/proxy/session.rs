//! Proxy for `org.freedesktop.Secret.Session`.

#[zbus::proxy(
    interface = "org.freedesktop.Secret.Session",
    default_service = "org.freedesktop.secrets",
    gen_blocking = false
)]
pub trait Session {
    fn close(&self) -> zbus::Result<()>;
}
