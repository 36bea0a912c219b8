use byteorder::{ByteOrder, LittleEndian};

use super::page::page_constants::{PAGE_SIZE, U32_SIZE};

// Header: page_allocated (u32) | next_free_page (u32)
pub const PAGE_ALLOCATED_OFFSET: usize = 0;
pub const NEXT_FREE_PAGE_OFFSET: usize = U32_SIZE;
pub const BITMAP_HEADER_SIZE: usize = 2 * U32_SIZE;

/// Number of data pages tracked by one bitmap page, i.e. the extent size.
pub const BITMAP_SIZE: usize = (PAGE_SIZE - BITMAP_HEADER_SIZE) * 8;

/// Allocation bitmap for one extent, viewed over a raw page buffer.
///
/// A set bit means the page at that offset is allocated. Offsets are
/// addressed MSB first inside each byte. `next_free_page` always caches the
/// lowest clear bit, or the capacity when the extent is full.
pub struct BitmapPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> BitmapPage<B> {
    pub fn new(data: B) -> Self {
        BitmapPage { data }
    }

    /// Number of pages a bitmap over this buffer can track.
    pub fn max_supported_size(&self) -> usize {
        (self.data.as_ref().len() - BITMAP_HEADER_SIZE) * 8
    }

    pub fn page_allocated(&self) -> usize {
        LittleEndian::read_u32(&self.data.as_ref()[PAGE_ALLOCATED_OFFSET..]) as usize
    }

    pub fn next_free_page(&self) -> usize {
        LittleEndian::read_u32(&self.data.as_ref()[NEXT_FREE_PAGE_OFFSET..]) as usize
    }

    pub fn is_page_free(&self, page_offset: usize) -> bool {
        if page_offset >= self.max_supported_size() {
            return false;
        }
        let (byte_index, mask) = Self::locate(page_offset);
        self.bitmap()[byte_index] & mask == 0
    }

    fn bitmap(&self) -> &[u8] {
        &self.data.as_ref()[BITMAP_HEADER_SIZE..]
    }

    fn locate(page_offset: usize) -> (usize, u8) {
        (page_offset / 8, 0x80 >> (page_offset % 8))
    }

    fn first_free_from(&self, start: usize) -> usize {
        let capacity = self.max_supported_size();
        let bitmap = self.bitmap();
        let mut offset = start;
        while offset < capacity {
            let (byte_index, mask) = Self::locate(offset);
            if bitmap[byte_index] == 0xFF {
                // Whole byte taken, jump to the next one
                offset = (byte_index + 1) * 8;
                continue;
            }
            if bitmap[byte_index] & mask == 0 {
                return offset;
            }
            offset += 1;
        }
        capacity
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitmapPage<B> {
    /// Marks the lowest free page as allocated and returns its offset.
    /// Returns `None` when the extent is full.
    pub fn allocate_page(&mut self) -> Option<usize> {
        let offset = self.next_free_page();
        if offset >= self.max_supported_size() || !self.is_page_free(offset) {
            return None;
        }

        let (byte_index, mask) = Self::locate(offset);
        self.bitmap_mut()[byte_index] |= mask;

        let allocated = self.page_allocated() + 1;
        self.set_page_allocated(allocated);

        // Everything below `offset` was already taken
        let next = self.first_free_from(offset + 1);
        self.set_next_free_page(next);
        Some(offset)
    }

    /// Clears the bit for `page_offset`. Returns false if it was already free.
    pub fn deallocate_page(&mut self, page_offset: usize) -> bool {
        if page_offset >= self.max_supported_size() || self.is_page_free(page_offset) {
            return false;
        }

        let (byte_index, mask) = Self::locate(page_offset);
        self.bitmap_mut()[byte_index] &= !mask;

        let allocated = self.page_allocated() - 1;
        self.set_page_allocated(allocated);

        if page_offset < self.next_free_page() {
            self.set_next_free_page(page_offset);
        }
        true
    }

    fn bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut()[BITMAP_HEADER_SIZE..]
    }

    fn set_page_allocated(&mut self, value: usize) {
        LittleEndian::write_u32(
            &mut self.data.as_mut()[PAGE_ALLOCATED_OFFSET..],
            value as u32,
        );
    }

    fn set_next_free_page(&mut self, value: usize) {
        LittleEndian::write_u32(
            &mut self.data.as_mut()[NEXT_FREE_PAGE_OFFSET..],
            value as u32,
        );
    }
}

#[cfg(test)]
pub mod test {
    use super::BitmapPage;

    #[test]
    fn bitmap_allocates_lowest_free_offset() {
        // A 16 byte buffer leaves 8 bytes of bitmap, 64 pages
        let mut buffer = [0u8; 16];
        let mut bitmap = BitmapPage::new(&mut buffer[..]);
        assert_eq!(64, bitmap.max_supported_size());

        for expected in 0..10 {
            assert_eq!(Some(expected), bitmap.allocate_page());
        }
        assert_eq!(10, bitmap.page_allocated());
        assert!(!bitmap.is_page_free(3));

        assert!(bitmap.deallocate_page(3));
        assert!(bitmap.deallocate_page(7));
        assert!(bitmap.is_page_free(3));
        assert_eq!(3, bitmap.next_free_page());

        assert_eq!(Some(3), bitmap.allocate_page());
        assert_eq!(Some(7), bitmap.allocate_page());
        assert_eq!(Some(10), bitmap.allocate_page());
    }

    #[test]
    fn bitmap_rejects_double_free_and_overflow() {
        let mut buffer = [0u8; 10];
        let mut bitmap = BitmapPage::new(&mut buffer[..]);
        let capacity = bitmap.max_supported_size();
        assert_eq!(16, capacity);

        assert!(!bitmap.deallocate_page(0));

        for _ in 0..capacity {
            assert!(bitmap.allocate_page().is_some());
        }
        assert_eq!(None, bitmap.allocate_page());
        assert_eq!(capacity, bitmap.next_free_page());

        assert!(bitmap.deallocate_page(12));
        assert!(!bitmap.deallocate_page(12));
        assert!(!bitmap.deallocate_page(capacity));
        assert_eq!(Some(12), bitmap.allocate_page());
    }
}
