use byteorder::{ByteOrder, LittleEndian};
use bytes::Buf;

use crate::index::IndexId;

use super::page::{
    page_constants::{PAGE_SIZE, U32_SIZE},
    PageId,
};

const COUNT_OFFSET: usize = 0;
const ENTRIES_OFFSET: usize = U32_SIZE;
const ENTRY_SIZE: usize = 2 * U32_SIZE;

pub const MAX_INDEX_ROOTS: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_SIZE;

/// Registry of `index_id -> root_page_id`, kept in insertion order.
pub struct IndexRootsPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> IndexRootsPage<B> {
    pub fn new(data: B) -> Self {
        IndexRootsPage { data }
    }

    pub fn count(&self) -> usize {
        LittleEndian::read_u32(&self.data.as_ref()[COUNT_OFFSET..]) as usize
    }

    pub fn entries(&self) -> Vec<(IndexId, PageId)> {
        let end = ENTRIES_OFFSET + self.count() * ENTRY_SIZE;
        let mut buf = &self.data.as_ref()[ENTRIES_OFFSET..end];
        let mut entries = Vec::with_capacity(self.count());
        while buf.has_remaining() {
            let index_id = buf.get_u32_le();
            let root_page_id = buf.get_u32_le();
            entries.push((index_id, root_page_id));
        }
        entries
    }

    pub fn get_root_id(&self, index_id: IndexId) -> Option<PageId> {
        self.position(index_id).map(|slot| self.root_at(slot))
    }

    fn position(&self, index_id: IndexId) -> Option<usize> {
        (0..self.count()).find(|slot| {
            LittleEndian::read_u32(&self.data.as_ref()[Self::entry_offset(*slot)..]) == index_id
        })
    }

    fn root_at(&self, slot: usize) -> PageId {
        LittleEndian::read_u32(&self.data.as_ref()[Self::entry_offset(slot) + U32_SIZE..])
    }

    fn entry_offset(slot: usize) -> usize {
        ENTRIES_OFFSET + slot * ENTRY_SIZE
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IndexRootsPage<B> {
    pub fn init(&mut self) {
        self.set_count(0);
    }

    /// Adds a new entry. False if the index is already registered or the
    /// page is full.
    pub fn insert(&mut self, index_id: IndexId, root_page_id: PageId) -> bool {
        let count = self.count();
        if count >= MAX_INDEX_ROOTS || self.position(index_id).is_some() {
            return false;
        }
        let offset = Self::entry_offset(count);
        let data = self.data.as_mut();
        LittleEndian::write_u32(&mut data[offset..], index_id);
        LittleEndian::write_u32(&mut data[offset + U32_SIZE..], root_page_id);
        self.set_count(count + 1);
        true
    }

    pub fn update(&mut self, index_id: IndexId, root_page_id: PageId) -> bool {
        let Some(slot) = self.position(index_id) else {
            return false;
        };
        let offset = Self::entry_offset(slot) + U32_SIZE;
        LittleEndian::write_u32(&mut self.data.as_mut()[offset..], root_page_id);
        true
    }

    pub fn delete(&mut self, index_id: IndexId) -> bool {
        let Some(slot) = self.position(index_id) else {
            return false;
        };
        let count = self.count();
        let start = Self::entry_offset(slot + 1);
        let end = Self::entry_offset(count);
        self.data.as_mut().copy_within(start..end, Self::entry_offset(slot));
        self.set_count(count - 1);
        true
    }

    fn set_count(&mut self, count: usize) {
        LittleEndian::write_u32(&mut self.data.as_mut()[COUNT_OFFSET..], count as u32);
    }
}
