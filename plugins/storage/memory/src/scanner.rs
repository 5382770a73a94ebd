use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use colbus_api::{BackendError, RowResult, Scan, TableName};

use crate::{MemoryStore, row_result};

/// Lazy scanner over a memory table.
///
/// Fetches `caching` rows per round trip, resuming after the last row key
/// it returned. Rows written behind the cursor are not seen; the scan
/// finishes once a fetch comes back empty.
pub struct MemoryScanner {
    store: Arc<MemoryStore>,
    closed: Arc<AtomicBool>,
    table: TableName,
    scan: Scan,
    caching: usize,
    last_row: Option<Bytes>,
    buffer: VecDeque<RowResult>,
    done: bool,
}

impl MemoryScanner {
    pub(crate) fn new(
        store: Arc<MemoryStore>,
        closed: Arc<AtomicBool>,
        table: TableName,
        scan: Scan,
        caching: usize,
    ) -> Self {
        Self {
            store,
            closed,
            table,
            scan,
            caching,
            last_row: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch(&mut self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::invalid_state("connection is closed"));
        }
        self.store.ensure_available()?;

        let tables = self.store.read();
        let state = tables.get(&self.table).ok_or_else(|| {
            BackendError::not_found(format!("table '{}' was removed during scan", self.table))
        })?;
        if !state.enabled {
            return Err(BackendError::invalid_state(format!(
                "table '{}' was disabled during scan",
                self.table
            )));
        }

        let lower = match &self.last_row {
            Some(row) => Bound::Excluded(row.clone()),
            None => Bound::Unbounded,
        };
        let mut fetched = 0;
        for (row, stored) in state.rows.range((lower, Bound::Unbounded)) {
            self.last_row = Some(row.clone());
            fetched += 1;
            let result = row_result(row, stored, |f| self.scan.wants(f));
            if !result.is_empty() {
                self.buffer.push_back(result);
            }
            if fetched == self.caching {
                break;
            }
        }
        if fetched < self.caching {
            self.done = true;
        }
        tracing::trace!(table = %self.table, fetched, "scanner fetch");
        Ok(())
    }
}

impl Iterator for MemoryScanner {
    type Item = Result<RowResult, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
