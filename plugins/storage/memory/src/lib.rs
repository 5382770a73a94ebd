mod connection;
mod scanner;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use colbus_api::{
    BackendError, Cell, ClusterConfig, Connection, Connector, RowResult, TableDescriptor,
    TableName,
};

pub use connection::{MemoryAdmin, MemoryConnection, MemoryTable};
pub use scanner::MemoryScanner;

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_caching() -> usize {
    1_000
}

fn default_namespaces() -> Vec<String> {
    vec!["default".into(), "hbase".into()]
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryStoreConfig {
    /// Upper bound on rows fetched per scanner round trip.
    #[serde(default = "default_max_caching")]
    pub max_caching: usize,
    /// Namespaces tables may be created in (`ns:table`).
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_caching: default_max_caching(),
            namespaces: default_namespaces(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Table state
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub(crate) struct StoredCell {
    pub timestamp_ms: i64,
    pub value: Bytes,
}

/// Cells of one row keyed by (family, qualifier).
pub(crate) type StoredRow = BTreeMap<(Bytes, Bytes), StoredCell>;

#[derive(Debug)]
pub(crate) struct TableState {
    pub descriptor: TableDescriptor,
    pub enabled: bool,
    pub rows: BTreeMap<Bytes, StoredRow>,
}

impl TableState {
    /// Fail with `Schema` unless every family is defined on the table.
    pub fn check_families<'a>(
        &self,
        families: impl IntoIterator<Item = &'a Bytes>,
    ) -> Result<(), BackendError> {
        for family in families {
            if !self.descriptor.has_family(family) {
                return Err(BackendError::schema(format!(
                    "column family '{}' does not exist in table '{}'",
                    String::from_utf8_lossy(family),
                    self.descriptor.name,
                )));
            }
        }
        Ok(())
    }
}

/// Materialise a stored row, keeping only families `wants` accepts.
pub(crate) fn row_result(
    row: &Bytes,
    stored: &StoredRow,
    wants: impl Fn(&[u8]) -> bool,
) -> RowResult {
    let cells = stored
        .iter()
        .filter(|((family, _), _)| wants(family))
        .map(|((family, qualifier), cell)| Cell {
            row: row.clone(),
            family: family.clone(),
            qualifier: qualifier.clone(),
            timestamp_ms: cell.timestamp_ms,
            value: cell.value.clone(),
        })
        .collect();
    RowResult { row: row.clone(), cells }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// In-process column store. Stands in for a storage cluster in demos
/// and tests: enforces the table state machine and family existence,
/// keeps one version per cell.
#[derive(Debug)]
pub struct MemoryStore {
    config: MemoryStoreConfig,
    tables: RwLock<BTreeMap<TableName, TableState>>,
    available: AtomicBool,
    open_connections: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            open_connections: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Simulate the cluster going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!(available, "memory store availability changed");
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::unavailable("storage cluster is unavailable"))
        }
    }

    pub(crate) fn connection_closed(&self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<TableName, TableState>> {
        match self.tables.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory store read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<TableName, TableState>> {
        match self.tables.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory store write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Reject names the store cannot hold.
    ///
    /// Qualifier: `[A-Za-z0-9_.-]+`, not starting with `.` or `-`.
    /// Namespace, if present, must be configured.
    pub(crate) fn validate_name(&self, name: &TableName) -> Result<(), BackendError> {
        if let Some(ns) = name.namespace() {
            if !self.config.namespaces.iter().any(|n| n == ns) {
                return Err(BackendError::not_found(format!("namespace '{ns}' does not exist")));
            }
        }
        let qualifier = name.qualifier();
        let legal = !qualifier.is_empty()
            && !qualifier.starts_with(['.', '-'])
            && qualifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if legal {
            Ok(())
        } else {
            Err(BackendError::format(format!("illegal table name '{name}'")))
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnector
// ═══════════════════════════════════════════════════════════════

/// `Connector` handing out connections to a shared `MemoryStore`.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ClusterConfig) -> Result<Box<dyn Connection>, BackendError> {
        if config.quorum.is_empty() {
            return Err(BackendError::config("cluster quorum is empty"));
        }
        self.store
            .ensure_available()
            .map_err(|e| e.with_context(format!("connect {}", config.endpoints().join(","))))?;
        self.store.open_connections.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(quorum = ?config.quorum, "memory store connection opened");
        Ok(Box::new(MemoryConnection::new(self.store.clone())))
    }
}
