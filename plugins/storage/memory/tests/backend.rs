use std::sync::Arc;

use colbus_api::{
    ClusterConfig, Connection, Connector, Delete, ErrorKind, Get, Put, Scan, TableDescriptor,
    TableName,
};
use colbus_storage_memory::{MemoryConnector, MemoryStore, MemoryStoreConfig};

fn open(max_caching: usize) -> (Arc<MemoryStore>, Box<dyn Connection>) {
    let store = Arc::new(MemoryStore::new(MemoryStoreConfig {
        max_caching,
        ..MemoryStoreConfig::default()
    }));
    let conn = MemoryConnector::new(store.clone()).connect(&ClusterConfig::default()).unwrap();
    (store, conn)
}

fn emp() -> TableName {
    TableName::new("emp")
}

fn create_emp(conn: &dyn Connection) {
    let descriptor = TableDescriptor::new(emp()).with_family("info").with_family("data");
    conn.admin().unwrap().create_table(&descriptor).unwrap();
}

#[test]
fn lifecycle_state_machine() {
    let (_store, conn) = open(100);
    let admin = conn.admin().unwrap();
    create_emp(conn.as_ref());

    let again = TableDescriptor::new(emp()).with_family("info");
    assert_eq!(admin.create_table(&again).unwrap_err().kind(), ErrorKind::AlreadyExists);

    assert_eq!(admin.delete_table(&emp()).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(admin.enable_table(&emp()).unwrap_err().kind(), ErrorKind::InvalidState);

    admin.disable_table(&emp()).unwrap();
    assert!(!admin.is_table_enabled(&emp()).unwrap());
    assert_eq!(admin.disable_table(&emp()).unwrap_err().kind(), ErrorKind::InvalidState);

    admin.enable_table(&emp()).unwrap();
    admin.disable_table(&emp()).unwrap();
    admin.delete_table(&emp()).unwrap();
    assert!(!admin.table_exists(&emp()).unwrap());
    assert_eq!(admin.is_table_enabled(&emp()).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn table_without_families_is_rejected() {
    let (_store, conn) = open(100);
    let err = conn.admin().unwrap().create_table(&TableDescriptor::new(emp())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn disabled_table_refuses_data_operations() {
    let (_store, conn) = open(100);
    create_emp(conn.as_ref());
    conn.admin().unwrap().disable_table(&emp()).unwrap();

    let table = conn.table(&emp()).unwrap();
    let err = table.put(Put::new("r1").add_column("info", "age", "25")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(table.get(&Get::new("r1")).is_err());
}

#[test]
fn family_scoped_delete_keeps_other_families() {
    let (_store, conn) = open(100);
    create_emp(conn.as_ref());
    let table = conn.table(&emp()).unwrap();
    table
        .put(Put::new("r1").add_column("info", "age", "25").add_column("data", "city", "x"))
        .unwrap();

    table.delete(Delete::new("r1").add_family("data")).unwrap();

    let row = table.get(&Get::new("r1")).unwrap();
    assert_eq!(row.len(), 1);
    assert_eq!(row.cells[0].family.as_ref(), b"info");
}

#[test]
fn batch_delete_is_all_or_nothing() {
    let (_store, conn) = open(100);
    create_emp(conn.as_ref());
    let table = conn.table(&emp()).unwrap();
    table.put(Put::new("1").add_column("info", "n", "a")).unwrap();

    let err = table
        .delete_batch(vec![Delete::new("1"), Delete::new("2").add_family("missing")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(!table.get(&Get::new("1")).unwrap().is_empty());
}

#[test]
fn scanner_pages_through_every_row() {
    let (_store, conn) = open(3);
    create_emp(conn.as_ref());
    let table = conn.table(&emp()).unwrap();
    for i in 0..10 {
        table.put(Put::new(format!("r{i}")).add_column("info", "n", i.to_string())).unwrap();
    }

    let rows: Vec<_> = table
        .scanner(&Scan::new())
        .unwrap()
        .map(|r| r.unwrap().row)
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("r{i}")).collect();
    assert_eq!(rows, expected);
}

#[test]
fn scanner_fails_once_connection_is_closed() {
    let (store, mut conn) = open(1);
    create_emp(conn.as_ref());
    let table = conn.table(&emp()).unwrap();
    table.put(Put::new("a").add_column("info", "n", "1")).unwrap();
    table.put(Put::new("b").add_column("info", "n", "2")).unwrap();

    let mut scanner = table.scanner(&Scan::new()).unwrap();
    assert!(scanner.next().unwrap().is_ok());
    conn.close().unwrap();
    assert_eq!(store.open_connections(), 0);
    assert_eq!(scanner.next().unwrap().unwrap_err().kind(), ErrorKind::InvalidState);
    assert!(scanner.next().is_none());
}

#[test]
fn close_is_idempotent() {
    let (store, mut conn) = open(100);
    assert_eq!(store.open_connections(), 1);
    conn.close().unwrap();
    conn.close().unwrap();
    assert!(conn.is_closed());
    assert_eq!(store.open_connections(), 0);
    assert!(conn.admin().is_err());
}

#[test]
fn empty_quorum_is_a_config_error() {
    let store = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
    let err = MemoryConnector::new(store)
        .connect(&ClusterConfig::new(Vec::<String>::new()))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}
