use std::sync::Arc;

use colbus_api::{RowResult, TableName};
use colbus_storage_memory::{MemoryConnector, MemoryStore};
use colbus_table::TableClient;

use crate::config::{DemoConfig, TableArgs};
use crate::error::DemoError;

pub fn run(args: TableArgs) -> Result<(), DemoError> {
    let config = DemoConfig::load(args.config.as_deref())?;
    let store = Arc::new(MemoryStore::new(config.storage));
    let client = TableClient::new(config.cluster, Arc::new(MemoryConnector::new(store.clone())));
    let table = TableName::new(args.table);

    tracing::info!(%table, "table walkthrough starting");

    client.create(&table, &["info", "data"])?;
    println!("exists {table}: {}", client.exists(&table)?);

    client.upsert(&table, "r1", "info", "age", "25")?;
    client.upsert(&table, "r1", "info", "name", "hunter")?;
    client.upsert(&table, "r1", "data", "city", "beijing")?;
    client.upsert(&table, "1", "info", "name", "one")?;
    client.upsert(&table, "2", "info", "name", "two")?;

    println!("-- scan {table}");
    for row in client.scan(&table)? {
        print_row(&row?);
    }

    println!("-- get r1 (info)");
    print_row(&client.get_row(&table, "r1")?);

    client.delete_row(&table, "r1", "data")?;
    client.delete_rows(&table, &["1", "2"])?;

    println!("-- scan {table} after deletes");
    let remaining = client.scan(&table)?.collect::<Result<Vec<_>, _>>()?;
    println!("{} rows left", remaining.len());

    client.delete(&table)?;
    println!("exists {table}: {}", client.exists(&table)?);

    tracing::info!(open_connections = store.open_connections(), "table walkthrough finished");
    Ok(())
}

fn print_row(row: &RowResult) {
    for cell in &row.cells {
        println!(
            "{}\t{}:{}\t{}",
            String::from_utf8_lossy(&cell.row),
            String::from_utf8_lossy(&cell.family),
            String::from_utf8_lossy(&cell.qualifier),
            String::from_utf8_lossy(&cell.value),
        );
    }
}
