use std::ops::Deref;

use colbus_api::{BackendError, ClusterConfig, Connection, Connector};

/// A connection that lives for one client operation and is closed when
/// dropped, whether the operation succeeded or not.
pub(crate) struct ScopedConnection {
    inner: Box<dyn Connection>,
}

impl ScopedConnection {
    pub fn open(connector: &dyn Connector, config: &ClusterConfig) -> Result<Self, BackendError> {
        let inner = connector.connect(config)?;
        Ok(Self { inner })
    }
}

impl Deref for ScopedConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            tracing::warn!(error = %e, "failed to close connection");
        }
    }
}
