use std::time::Duration;

use colbus_api::BackendError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProducerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("record of {size} bytes exceeds buffer.memory ({limit} bytes)")]
    RecordTooLarge { size: usize, limit: usize },

    #[error("no buffer space after waiting {waited:?} (max.block.ms)")]
    BufferExhausted { waited: Duration },

    #[error("partition {partition} out of range for topic '{topic}' ({count} partitions)")]
    InvalidPartition { topic: String, partition: u32, count: u32 },

    #[error("send to {topic}-{partition} failed: {source}")]
    Send { topic: String, partition: u32, source: BackendError },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("producer is closed")]
    Closed,
}
