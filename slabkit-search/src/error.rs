use slabkit_core::MemoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Invalid search parameters: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
