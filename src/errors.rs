use thiserror::Error;

use crate::storage::page::page::PageId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every frame is pinned and the free list is empty.
    #[error("buffer pool exhausted: every frame is pinned")]
    BufferPoolExhausted,

    /// No extent has a free page left.
    #[error("disk full: no free page in any extent")]
    DiskFull,

    #[error("page {page_id} is already free")]
    PageAlreadyFree { page_id: PageId },

    #[error("corrupted page data: {0}")]
    Corrupted(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("key schema mismatch: {0}")]
    KeySchema(String),

    #[error("index roots page has no room for another index")]
    RegistryFull,
}
