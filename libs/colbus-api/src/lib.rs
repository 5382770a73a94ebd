pub mod broker;
pub mod config;
pub mod error;
pub mod storage;
pub mod table;

pub use broker::{
    Acks, BrokerConnector, BrokerTransport, ClusterView, PartitionInfo, Partitioner,
    ProduceRequest, ProduceResponse, ProducerRecord, RecordMetadata, WireRecord,
};
pub use config::ClusterConfig;
pub use error::{BackendError, ErrorKind};
pub use storage::{Admin, Connection, Connector, RowScanner, Table};
pub use table::{
    Cell, ColumnFamilyDescriptor, Delete, Get, Put, RowResult, Scan, TableDescriptor, TableName,
};

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
