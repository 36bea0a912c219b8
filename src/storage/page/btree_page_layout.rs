use super::page::page_constants::{PAGE_SIZE, U32_SIZE};

/// Common B+Tree page header, one little endian u32 per field.
#[derive(Debug, Clone, Copy)]
pub enum TreePageHeader {
    PageType,
    KeySize,
    Size,
    MaxSize,
    ParentPageId,
    PageId,
}

impl TreePageHeader {
    pub fn size(&self) -> usize {
        U32_SIZE
    }

    pub fn offset(&self) -> usize {
        match *self {
            TreePageHeader::PageType => PAGE_TYPE_OFFSET,
            TreePageHeader::KeySize => KEY_SIZE_OFFSET,
            TreePageHeader::Size => SIZE_OFFSET,
            TreePageHeader::MaxSize => MAX_SIZE_OFFSET,
            TreePageHeader::ParentPageId => PARENT_PAGE_ID_OFFSET,
            TreePageHeader::PageId => PAGE_ID_OFFSET,
        }
    }
}

// Defining the constants
pub const PAGE_TYPE_OFFSET: usize = 0;
pub const KEY_SIZE_OFFSET: usize = PAGE_TYPE_OFFSET + U32_SIZE;
pub const SIZE_OFFSET: usize = KEY_SIZE_OFFSET + U32_SIZE;
pub const MAX_SIZE_OFFSET: usize = SIZE_OFFSET + U32_SIZE;
pub const PARENT_PAGE_ID_OFFSET: usize = MAX_SIZE_OFFSET + U32_SIZE;
pub const PAGE_ID_OFFSET: usize = PARENT_PAGE_ID_OFFSET + U32_SIZE;

pub const TREE_PAGE_HEADER_SIZE: usize = PAGE_ID_OFFSET + U32_SIZE;

/// Internal pages hold `(key, child page id)` pairs straight after the header.
pub const INTERNAL_PAGE_HEADER_SIZE: usize = TREE_PAGE_HEADER_SIZE;
pub const INTERNAL_VALUE_SIZE: usize = U32_SIZE;

/// Leaf pages add the right sibling link before their `(key, RowId)` pairs.
pub const NEXT_PAGE_ID_OFFSET: usize = TREE_PAGE_HEADER_SIZE;
pub const LEAF_PAGE_HEADER_SIZE: usize = NEXT_PAGE_ID_OFFSET + U32_SIZE;
pub const LEAF_VALUE_SIZE: usize = size_of::<u64>();

/// Entries that physically fit in an internal page for a given key size.
pub fn internal_page_capacity(key_size: usize) -> usize {
    (PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / (key_size + INTERNAL_VALUE_SIZE)
}

/// Entries that physically fit in a leaf page for a given key size.
pub fn leaf_page_capacity(key_size: usize) -> usize {
    (PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / (key_size + LEAF_VALUE_SIZE)
}
