#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Table(#[from] colbus_table::TableClientError),

    #[error("{0}")]
    Producer(#[from] colbus_producer::ProducerError),

    #[error("{failed} of {total} records failed")]
    Undelivered { failed: usize, total: usize },
}
