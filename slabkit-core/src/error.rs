use std::alloc::Layout;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Out of memory: failed to allocate {size} bytes (align {align})")]
    OutOfMemory { size: usize, align: usize },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub(crate) fn out_of_memory(layout: Layout) -> Self {
        MemoryError::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }
}
