pub mod error;
mod guard;
mod scan;

pub use error::TableClientError;
pub use scan::TableScan;

use std::sync::Arc;

use colbus_api::{
    ClusterConfig, Connector, Delete, Get, Put, RowResult, Scan, TableDescriptor, TableName,
};

use guard::ScopedConnection;

/// Family `get_row` reads.
pub const INFO_FAMILY: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The table was already there and was left untouched.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped,
    NotFound,
}

// ═══════════════════════════════════════════════════════════════
//  TableClient
// ═══════════════════════════════════════════════════════════════

/// Thin client for table lifecycle and row operations.
///
/// Every call opens its own connection and closes it before returning,
/// except `scan`, whose connection lives as long as the returned iterator.
#[derive(Clone)]
pub struct TableClient {
    connector: Arc<dyn Connector>,
    config: ClusterConfig,
}

impl std::fmt::Debug for TableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl TableClient {
    pub fn new(config: ClusterConfig, connector: Arc<dyn Connector>) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn connect(&self) -> Result<ScopedConnection, TableClientError> {
        Ok(ScopedConnection::open(self.connector.as_ref(), &self.config)?)
    }

    pub fn exists(&self, table: &TableName) -> Result<bool, TableClientError> {
        let conn = self.connect()?;
        Ok(conn.admin()?.table_exists(table)?)
    }

    /// Create `table` with one column family per name. An existing table is
    /// reported and left as is.
    pub fn create<F: AsRef<[u8]>>(
        &self,
        table: &TableName,
        families: &[F],
    ) -> Result<CreateOutcome, TableClientError> {
        let conn = self.connect()?;
        let admin = conn.admin()?;
        if admin.table_exists(table)? {
            tracing::info!(%table, "table already exists");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let descriptor = families
            .iter()
            .fold(TableDescriptor::new(table.clone()), |d, family| d.with_family(family));
        admin.create_table(&descriptor)?;
        tracing::info!(%table, families = families.len(), "table created");
        Ok(CreateOutcome::Created)
    }

    /// Disable (if needed) and delete `table`. A missing table is reported
    /// and otherwise ignored.
    pub fn delete(&self, table: &TableName) -> Result<DropOutcome, TableClientError> {
        let conn = self.connect()?;
        let admin = conn.admin()?;
        if !admin.table_exists(table)? {
            tracing::info!(%table, "table does not exist");
            return Ok(DropOutcome::NotFound);
        }

        if admin.is_table_enabled(table)? {
            admin.disable_table(table)?;
        }
        admin.delete_table(table)?;
        tracing::info!(%table, "table deleted");
        Ok(DropOutcome::Dropped)
    }

    /// Write one cell, replacing any previous value.
    pub fn upsert(
        &self,
        table: &TableName,
        row: impl AsRef<[u8]>,
        family: impl AsRef<[u8]>,
        column: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<(), TableClientError> {
        let conn = self.connect()?;
        conn.table(table)?.put(Put::new(row).add_column(family, column, value))?;
        Ok(())
    }

    /// Delete the whole row. `_family` does not narrow the delete.
    pub fn delete_row(
        &self,
        table: &TableName,
        row: impl AsRef<[u8]>,
        _family: impl AsRef<[u8]>,
    ) -> Result<(), TableClientError> {
        let conn = self.connect()?;
        conn.table(table)?.delete(Delete::new(row))?;
        Ok(())
    }

    /// Delete several whole rows in one batch.
    pub fn delete_rows<R: AsRef<[u8]>>(
        &self,
        table: &TableName,
        rows: &[R],
    ) -> Result<(), TableClientError> {
        let conn = self.connect()?;
        let deletes = rows.iter().map(Delete::new).collect();
        conn.table(table)?.delete_batch(deletes)?;
        Ok(())
    }

    /// Scan every row of `table`.
    pub fn scan(&self, table: &TableName) -> Result<TableScan, TableClientError> {
        let conn = self.connect()?;
        let rows = conn.table(table)?.scanner(&Scan::new())?;
        Ok(TableScan::new(rows, table.clone(), conn))
    }

    /// Read the `info` family of one row. A missing row gives an empty result.
    pub fn get_row(
        &self,
        table: &TableName,
        row: impl AsRef<[u8]>,
    ) -> Result<RowResult, TableClientError> {
        let conn = self.connect()?;
        let result = conn.table(table)?.get(&Get::new(row).add_family(INFO_FAMILY))?;
        for cell in &result.cells {
            tracing::info!(
                %table,
                row = %String::from_utf8_lossy(&cell.row),
                family = %String::from_utf8_lossy(&cell.family),
                qualifier = %String::from_utf8_lossy(&cell.qualifier),
                value = %String::from_utf8_lossy(&cell.value),
                "cell"
            );
        }
        Ok(result)
    }

    pub fn list_tables(&self) -> Result<Vec<TableName>, TableClientError> {
        let conn = self.connect()?;
        Ok(conn.admin()?.list_table_names()?)
    }

    pub fn is_enabled(&self, table: &TableName) -> Result<bool, TableClientError> {
        let conn = self.connect()?;
        Ok(conn.admin()?.is_table_enabled(table)?)
    }
}
