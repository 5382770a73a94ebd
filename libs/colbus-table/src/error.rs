use colbus_api::{BackendError, ErrorKind};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TableClientError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl TableClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableClientError::Backend(e) => e.kind(),
        }
    }
}
