pub type PageId = u32;
pub type FrameId = usize;

/// Raw bytes of a single page as held by a buffer pool frame.
pub type PageData = [u8; page_constants::PAGE_SIZE];

pub const INVALID_PAGE_ID: PageId = u32::MAX;

pub mod page_constants {
    use super::PageId;

    // Size
    pub const PAGE_SIZE: usize = 1024 * 4;

    // Every page id and counter on disk is a little endian u32
    pub const U32_SIZE: usize = size_of::<u32>();

    // Logical pages reserved at bootstrap, before any index page exists
    pub const CATALOG_META_PAGE_ID: PageId = 0;
    pub const INDEX_ROOTS_PAGE_ID: PageId = 1;
}

/// Allocates a zeroed page buffer on the heap.
pub fn zeroed_page() -> Box<PageData> {
    Box::new([0; page_constants::PAGE_SIZE])
}
