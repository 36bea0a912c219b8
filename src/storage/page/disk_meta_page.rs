use byteorder::{ByteOrder, LittleEndian};

use super::page::page_constants::{PAGE_SIZE, U32_SIZE};

pub const META_MAGIC: u32 = 0x4341_524E;

pub const MAGIC_OFFSET: usize = 0;
pub const CHECKSUM_OFFSET: usize = U32_SIZE;
pub const NUM_ALLOCATED_PAGES_OFFSET: usize = 2 * U32_SIZE;
pub const NUM_EXTENTS_OFFSET: usize = 3 * U32_SIZE;
pub const EXTENT_USED_PAGE_OFFSET: usize = 4 * U32_SIZE;

/// Upper bound on extents, limited by how many counters fit in the meta page.
pub const MAX_EXTENTS: usize = (PAGE_SIZE - EXTENT_USED_PAGE_OFFSET) / U32_SIZE;

/// View over physical page 0: allocation totals plus one used-page counter
/// per extent. The checksum covers everything after the checksum field.
pub struct DiskFileMetaPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> DiskFileMetaPage<B> {
    pub fn new(data: B) -> Self {
        DiskFileMetaPage { data }
    }

    pub fn magic(&self) -> u32 {
        LittleEndian::read_u32(&self.data.as_ref()[MAGIC_OFFSET..])
    }

    /// A zero page is what an empty file reads back as.
    pub fn is_blank(&self) -> bool {
        self.data.as_ref().iter().all(|b| *b == 0)
    }

    pub fn verify(&self) -> bool {
        self.magic() == META_MAGIC
            && LittleEndian::read_u32(&self.data.as_ref()[CHECKSUM_OFFSET..]) == self.checksum()
    }

    pub fn num_allocated_pages(&self) -> u32 {
        LittleEndian::read_u32(&self.data.as_ref()[NUM_ALLOCATED_PAGES_OFFSET..])
    }

    pub fn num_extents(&self) -> u32 {
        LittleEndian::read_u32(&self.data.as_ref()[NUM_EXTENTS_OFFSET..])
    }

    pub fn extent_used_page(&self, extent_id: usize) -> u32 {
        if extent_id >= MAX_EXTENTS {
            return 0;
        }
        LittleEndian::read_u32(&self.data.as_ref()[Self::extent_offset(extent_id)..])
    }

    fn extent_offset(extent_id: usize) -> usize {
        EXTENT_USED_PAGE_OFFSET + extent_id * U32_SIZE
    }

    fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data.as_ref()[NUM_ALLOCATED_PAGES_OFFSET..]);
        hasher.finalize()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DiskFileMetaPage<B> {
    /// Stamps a fresh, empty meta page.
    pub fn init(&mut self) {
        self.data.as_mut().fill(0);
        LittleEndian::write_u32(&mut self.data.as_mut()[MAGIC_OFFSET..], META_MAGIC);
        self.seal();
    }

    pub fn set_num_allocated_pages(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.data.as_mut()[NUM_ALLOCATED_PAGES_OFFSET..], value);
    }

    pub fn set_num_extents(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.data.as_mut()[NUM_EXTENTS_OFFSET..], value);
    }

    pub fn set_extent_used_page(&mut self, extent_id: usize, value: u32) {
        let offset = Self::extent_offset(extent_id);
        LittleEndian::write_u32(&mut self.data.as_mut()[offset..], value);
    }

    /// Recomputes the checksum. Call after the last mutation, before writing.
    pub fn seal(&mut self) {
        let checksum = self.checksum();
        LittleEndian::write_u32(&mut self.data.as_mut()[CHECKSUM_OFFSET..], checksum);
    }
}

#[cfg(test)]
pub mod test {
    use super::{DiskFileMetaPage, MAX_EXTENTS};
    use crate::storage::page::page::zeroed_page;

    #[test]
    fn meta_page_checksum_tracks_contents() {
        let mut buffer = zeroed_page();
        let mut meta = DiskFileMetaPage::new(&mut buffer[..]);
        assert!(meta.is_blank());
        assert!(!meta.verify());

        meta.init();
        assert!(meta.verify());

        meta.set_num_allocated_pages(3);
        meta.set_num_extents(1);
        meta.set_extent_used_page(0, 3);
        assert!(!meta.verify());
        meta.seal();
        assert!(meta.verify());

        assert_eq!(3, meta.num_allocated_pages());
        assert_eq!(3, meta.extent_used_page(0));
        assert_eq!(0, meta.extent_used_page(MAX_EXTENTS));

        buffer[100] ^= 0xFF;
        assert!(!DiskFileMetaPage::new(&buffer[..]).verify());
    }
}
