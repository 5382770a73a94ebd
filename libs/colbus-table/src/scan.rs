use colbus_api::{RowResult, RowScanner, TableName};

use crate::error::TableClientError;
use crate::guard::ScopedConnection;

/// Rows of a full-table scan, fetched lazily.
///
/// Holds its connection until dropped. Ends after the last row or after
/// the first error; a new scan has to be started to read the table again.
pub struct TableScan {
    // declared before `_connection`: the scanner must be dropped first
    rows: RowScanner,
    table: TableName,
    failed: bool,
    _connection: ScopedConnection,
}

impl TableScan {
    pub(crate) fn new(rows: RowScanner, table: TableName, connection: ScopedConnection) -> Self {
        Self { rows, table, failed: false, _connection: connection }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }
}

impl Iterator for TableScan {
    type Item = Result<RowResult, TableClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.rows.next()? {
            Ok(row) => {
                for cell in &row.cells {
                    tracing::info!(
                        table = %self.table,
                        row = %String::from_utf8_lossy(&cell.row),
                        family = %String::from_utf8_lossy(&cell.family),
                        value = %String::from_utf8_lossy(&cell.value),
                        "scanned cell"
                    );
                }
                Some(Ok(row))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e.into()))
            }
        }
    }
}
