use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use colbus_api::{
    Admin, BackendError, Connection, Delete, Get, Put, RowResult, RowScanner, Scan, Table,
    TableDescriptor, TableName, now_ms,
};

use crate::scanner::MemoryScanner;
use crate::{MemoryStore, StoredCell, TableState, row_result};

/// Shared state every handle checks before touching the store.
#[derive(Debug, Clone)]
struct Session {
    store: Arc<MemoryStore>,
    closed: Arc<AtomicBool>,
}

impl Session {
    fn check(&self) -> Result<&MemoryStore, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::invalid_state("connection is closed"));
        }
        self.store.ensure_available()?;
        Ok(&self.store)
    }
}

fn not_found(name: &TableName) -> BackendError {
    BackendError::not_found(format!("table '{name}' does not exist"))
}

fn disabled(name: &TableName) -> BackendError {
    BackendError::invalid_state(format!("table '{name}' is disabled"))
}

/// Look up an enabled table for a data operation.
fn enabled_table<'a>(
    tables: &'a std::collections::BTreeMap<TableName, TableState>,
    name: &TableName,
) -> Result<&'a TableState, BackendError> {
    let state = tables.get(name).ok_or_else(|| not_found(name))?;
    if !state.enabled {
        return Err(disabled(name));
    }
    Ok(state)
}

fn enabled_table_mut<'a>(
    tables: &'a mut std::collections::BTreeMap<TableName, TableState>,
    name: &TableName,
) -> Result<&'a mut TableState, BackendError> {
    let state = tables.get_mut(name).ok_or_else(|| not_found(name))?;
    if !state.enabled {
        return Err(disabled(name));
    }
    Ok(state)
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnection
// ═══════════════════════════════════════════════════════════════

pub struct MemoryConnection {
    session: Session,
}

impl MemoryConnection {
    pub(crate) fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            session: Session { store, closed: Arc::new(AtomicBool::new(false)) },
        }
    }
}

impl Connection for MemoryConnection {
    fn admin(&self) -> Result<Box<dyn Admin>, BackendError> {
        self.session.check()?;
        Ok(Box::new(MemoryAdmin { session: self.session.clone() }))
    }

    fn table(&self, name: &TableName) -> Result<Box<dyn Table>, BackendError> {
        self.session.check()?;
        Ok(Box::new(MemoryTable { session: self.session.clone(), name: name.clone() }))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if !self.session.closed.swap(true, Ordering::SeqCst) {
            self.session.store.connection_closed();
            tracing::debug!("memory store connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryAdmin
// ═══════════════════════════════════════════════════════════════

pub struct MemoryAdmin {
    session: Session,
}

impl Admin for MemoryAdmin {
    fn table_exists(&self, name: &TableName) -> Result<bool, BackendError> {
        let store = self.session.check()?;
        Ok(store.read().contains_key(name))
    }

    fn create_table(&self, descriptor: &TableDescriptor) -> Result<(), BackendError> {
        let store = self.session.check()?;
        store.validate_name(&descriptor.name)?;
        if descriptor.families().next().is_none() {
            return Err(BackendError::format(format!(
                "table '{}' must have at least one column family",
                descriptor.name
            )));
        }
        let mut tables = store.write();
        if tables.contains_key(&descriptor.name) {
            return Err(BackendError::already_exists(format!(
                "table '{}' already exists",
                descriptor.name
            )));
        }
        tables.insert(
            descriptor.name.clone(),
            TableState {
                descriptor: descriptor.clone(),
                enabled: true,
                rows: Default::default(),
            },
        );
        tracing::info!(table = %descriptor.name, "table created");
        Ok(())
    }

    fn disable_table(&self, name: &TableName) -> Result<(), BackendError> {
        let store = self.session.check()?;
        let mut tables = store.write();
        let state = tables.get_mut(name).ok_or_else(|| not_found(name))?;
        if !state.enabled {
            return Err(BackendError::invalid_state(format!("table '{name}' is already disabled")));
        }
        state.enabled = false;
        tracing::info!(table = %name, "table disabled");
        Ok(())
    }

    fn enable_table(&self, name: &TableName) -> Result<(), BackendError> {
        let store = self.session.check()?;
        let mut tables = store.write();
        let state = tables.get_mut(name).ok_or_else(|| not_found(name))?;
        if state.enabled {
            return Err(BackendError::invalid_state(format!("table '{name}' is already enabled")));
        }
        state.enabled = true;
        tracing::info!(table = %name, "table enabled");
        Ok(())
    }

    fn is_table_enabled(&self, name: &TableName) -> Result<bool, BackendError> {
        let store = self.session.check()?;
        let tables = store.read();
        tables.get(name).map(|s| s.enabled).ok_or_else(|| not_found(name))
    }

    fn delete_table(&self, name: &TableName) -> Result<(), BackendError> {
        let store = self.session.check()?;
        let mut tables = store.write();
        let state = tables.get(name).ok_or_else(|| not_found(name))?;
        if state.enabled {
            return Err(BackendError::invalid_state(format!(
                "table '{name}' must be disabled before it can be deleted"
            )));
        }
        tables.remove(name);
        tracing::info!(table = %name, "table deleted");
        Ok(())
    }

    fn list_table_names(&self) -> Result<Vec<TableName>, BackendError> {
        let store = self.session.check()?;
        Ok(store.read().keys().cloned().collect())
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryTable
// ═══════════════════════════════════════════════════════════════

pub struct MemoryTable {
    session: Session,
    name: TableName,
}

impl MemoryTable {
    fn check_delete(state: &TableState, delete: &Delete) -> Result<(), BackendError> {
        if delete.row.is_empty() {
            return Err(BackendError::format("row key is empty"));
        }
        state.check_families(&delete.families)
    }

    fn apply_delete(state: &mut TableState, delete: Delete) {
        if delete.is_whole_row() {
            state.rows.remove(&delete.row);
            return;
        }
        if let Some(row) = state.rows.get_mut(&delete.row) {
            row.retain(|(family, _), _| !delete.families.contains(family));
            if row.is_empty() {
                state.rows.remove(&delete.row);
            }
        }
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &TableName {
        &self.name
    }

    fn put(&self, put: Put) -> Result<(), BackendError> {
        let store = self.session.check()?;
        if put.row.is_empty() {
            return Err(BackendError::format("row key is empty"));
        }
        if put.columns.is_empty() {
            return Err(BackendError::format("no columns to insert"));
        }
        let mut tables = store.write();
        let state = enabled_table_mut(&mut tables, &self.name)?;
        state.check_families(put.columns.iter().map(|(family, _, _)| family))?;

        let ts = now_ms();
        let row = state.rows.entry(put.row).or_default();
        for (family, qualifier, value) in put.columns {
            row.insert((family, qualifier), StoredCell { timestamp_ms: ts, value });
        }
        Ok(())
    }

    fn delete(&self, delete: Delete) -> Result<(), BackendError> {
        let store = self.session.check()?;
        let mut tables = store.write();
        let state = enabled_table_mut(&mut tables, &self.name)?;
        Self::check_delete(state, &delete)?;
        Self::apply_delete(state, delete);
        Ok(())
    }

    fn delete_batch(&self, deletes: Vec<Delete>) -> Result<(), BackendError> {
        let store = self.session.check()?;
        let mut tables = store.write();
        let state = enabled_table_mut(&mut tables, &self.name)?;
        for delete in &deletes {
            Self::check_delete(state, delete)?;
        }
        let count = deletes.len();
        for delete in deletes {
            Self::apply_delete(state, delete);
        }
        tracing::debug!(table = %self.name, count, "batch delete applied");
        Ok(())
    }

    fn get(&self, get: &Get) -> Result<RowResult, BackendError> {
        let store = self.session.check()?;
        let tables = store.read();
        let state = enabled_table(&tables, &self.name)?;
        state.check_families(&get.families)?;
        Ok(match state.rows.get(&get.row) {
            Some(stored) => row_result(&get.row, stored, |f| get.wants(f)),
            None => RowResult::empty(Bytes::clone(&get.row)),
        })
    }

    fn scanner(&self, scan: &Scan) -> Result<RowScanner, BackendError> {
        let store = self.session.check()?;
        {
            let tables = store.read();
            let state = enabled_table(&tables, &self.name)?;
            state.check_families(&scan.families)?;
        }
        let caching = scan.caching.min(store.config().max_caching).max(1);
        Ok(Box::new(MemoryScanner::new(
            self.session.store.clone(),
            self.session.closed.clone(),
            self.name.clone(),
            scan.clone(),
            caching,
        )))
    }
}
