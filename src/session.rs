//! The transfer session a [`crate::Service`] negotiates at startup.

use tracing::debug;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::check::check_conn_and_path;
use crate::error::Error;
use crate::proxy::SessionProxy;

/// An open transfer session. Secrets moving in either direction reference
/// its path so the daemon knows how their payload is encoded.
#[derive(Debug)]
pub struct Session {
    proxy: SessionProxy<'static>,
    path: OwnedObjectPath,
}

impl Session {
    pub(crate) async fn new(conn: &Connection, path: OwnedObjectPath) -> Result<Self, Error> {
        check_conn_and_path(conn, path.as_str())?;
        let proxy = SessionProxy::builder(conn)
            .path(path.clone())
            .map_err(Error::from)?
            .build()
            .await
            .map_err(Error::from)?;
        Ok(Self { proxy, path })
    }

    /// Path of the session object on the bus.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Closes the session on the daemon side.
    ///
    /// A daemon that has already gone away is not an error: the session is
    /// equally closed either way.
    pub async fn close(&self) -> Result<(), Error> {
        debug!(path = %self.path, "closing session");
        match self.proxy.close().await {
            Ok(()) => Ok(()),
            Err(zbus::Error::MethodError(name, _, _))
                if name.as_str() == "org.freedesktop.DBus.Error.ServiceUnknown" =>
            {
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
