use crate::config::ClusterConfig;
use crate::error::BackendError;
use crate::table::{Delete, Get, Put, RowResult, Scan, TableDescriptor, TableName};

/// Lazy stream of rows produced by a scan. Ends when the table is exhausted.
pub type RowScanner = Box<dyn Iterator<Item = Result<RowResult, BackendError>> + Send>;

/// Opens connections to a storage cluster.
///
/// The clients don't enumerate or know concrete implementations.
/// For them, a cluster is just this trait.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ClusterConfig) -> Result<Box<dyn Connection>, BackendError>;
}

/// An open connection. Must be closed exactly once; `close` on an
/// already closed connection is a no-op.
pub trait Connection: Send {
    /// Administrative handle for table lifecycle operations.
    fn admin(&self) -> Result<Box<dyn Admin>, BackendError>;

    /// Data handle for one table. Does not check that the table exists;
    /// the first operation on it does.
    fn table(&self, name: &TableName) -> Result<Box<dyn Table>, BackendError>;

    fn close(&mut self) -> Result<(), BackendError>;

    fn is_closed(&self) -> bool;
}

/// Table lifecycle: absent → enabled → disabled → absent.
pub trait Admin: Send {
    fn table_exists(&self, name: &TableName) -> Result<bool, BackendError>;

    /// Create an enabled table. Fails with `AlreadyExists` if present.
    fn create_table(&self, descriptor: &TableDescriptor) -> Result<(), BackendError>;

    /// Enabled → disabled. Fails with `InvalidState` if already disabled.
    fn disable_table(&self, name: &TableName) -> Result<(), BackendError>;

    /// Disabled → enabled. Fails with `InvalidState` if already enabled.
    fn enable_table(&self, name: &TableName) -> Result<(), BackendError>;

    fn is_table_enabled(&self, name: &TableName) -> Result<bool, BackendError>;

    /// Disabled → absent. Fails with `InvalidState` if the table is enabled.
    fn delete_table(&self, name: &TableName) -> Result<(), BackendError>;

    fn list_table_names(&self) -> Result<Vec<TableName>, BackendError>;
}

/// Row-level operations on one table.
pub trait Table: Send {
    fn name(&self) -> &TableName;

    fn put(&self, put: Put) -> Result<(), BackendError>;

    fn delete(&self, delete: Delete) -> Result<(), BackendError>;

    /// Apply several deletes in one call.
    fn delete_batch(&self, deletes: Vec<Delete>) -> Result<(), BackendError>;

    /// Point lookup. A missing row yields an empty `RowResult`, not an error.
    fn get(&self, get: &Get) -> Result<RowResult, BackendError>;

    fn scanner(&self, scan: &Scan) -> Result<RowScanner, BackendError>;
}
