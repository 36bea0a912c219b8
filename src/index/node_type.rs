use std::{fmt, ops::Deref};

use bytes::Bytes;

use crate::storage::page::page::PageId;

/// Location of a stored record: page id in the high 32 bits, slot in the low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    page_id: PageId,
    slot_num: u32,
}

impl RowId {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        RowId { page_id, slot_num }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_num(&self) -> u32 {
        self.slot_num
    }

    /// Packed wire form.
    pub fn get(&self) -> u64 {
        ((self.page_id as u64) << 32) | self.slot_num as u64
    }
}

impl From<u64> for RowId {
    fn from(packed: u64) -> Self {
        RowId {
            page_id: (packed >> 32) as PageId,
            slot_num: packed as u32,
        }
    }
}

impl From<RowId> for u64 {
    fn from(row_id: RowId) -> u64 {
        row_id.get()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}

/// Serialized index key of exactly the index's key size.
///
/// Equality here is bytewise; ordering always goes through the index's
/// [`KeyManager`](super::key_manager::KeyManager).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericKey(Bytes);

impl GenericKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        GenericKey(Bytes::copy_from_slice(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for GenericKey {
    fn from(bytes: Bytes) -> Self {
        GenericKey(bytes)
    }
}

impl Deref for GenericKey {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for GenericKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
