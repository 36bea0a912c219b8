use byteorder::{ByteOrder, LittleEndian};

use crate::{
    errors::{Error, Result},
    index::key_manager::KeyManager,
};

use super::{
    b_plus_tree_internal_page::InternalPage,
    b_plus_tree_leaf_page::LeafPage,
    btree_page_layout::TreePageHeader,
    page::{PageId, INVALID_PAGE_ID},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPageType {
    Invalid,
    Leaf,
    Internal,
}

impl From<u32> for IndexPageType {
    fn from(tag: u32) -> Self {
        match tag {
            0x01 => IndexPageType::Leaf,
            0x02 => IndexPageType::Internal,
            _ => IndexPageType::Invalid,
        }
    }
}

impl From<IndexPageType> for u32 {
    fn from(page_type: IndexPageType) -> u32 {
        match page_type {
            IndexPageType::Invalid => 0x00,
            IndexPageType::Leaf => 0x01,
            IndexPageType::Internal => 0x02,
        }
    }
}

pub(crate) fn read_field(data: &[u8], field: TreePageHeader) -> u32 {
    LittleEndian::read_u32(&data[field.offset()..field.offset() + field.size()])
}

pub(crate) fn write_field(data: &mut [u8], field: TreePageHeader, value: u32) {
    LittleEndian::write_u32(&mut data[field.offset()..field.offset() + field.size()], value);
}

/// Header accessors shared by internal and leaf pages.
pub trait TreeNode {
    fn data(&self) -> &[u8];

    fn key_at(&self, index: usize) -> &[u8];

    fn page_type(&self) -> IndexPageType {
        read_field(self.data(), TreePageHeader::PageType).into()
    }

    fn is_leaf_page(&self) -> bool {
        self.page_type() == IndexPageType::Leaf
    }

    fn key_size(&self) -> usize {
        read_field(self.data(), TreePageHeader::KeySize) as usize
    }

    fn size(&self) -> usize {
        read_field(self.data(), TreePageHeader::Size) as usize
    }

    fn max_size(&self) -> usize {
        read_field(self.data(), TreePageHeader::MaxSize) as usize
    }

    /// A node splits when it reaches `max_size`, so both halves of a split
    /// hold at least `max_size / 2` entries.
    fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    fn parent_page_id(&self) -> PageId {
        read_field(self.data(), TreePageHeader::ParentPageId)
    }

    fn page_id(&self) -> PageId {
        read_field(self.data(), TreePageHeader::PageId)
    }

    fn is_root_page(&self) -> bool {
        self.parent_page_id() == INVALID_PAGE_ID
    }
}

pub trait TreeNodeMut: TreeNode {
    fn data_mut(&mut self) -> &mut [u8];

    fn set_key_at(&mut self, index: usize, key: &[u8]);

    fn set_page_type(&mut self, page_type: IndexPageType) {
        write_field(self.data_mut(), TreePageHeader::PageType, page_type.into());
    }

    fn set_key_size(&mut self, key_size: usize) {
        write_field(self.data_mut(), TreePageHeader::KeySize, key_size as u32);
    }

    fn set_size(&mut self, size: usize) {
        write_field(self.data_mut(), TreePageHeader::Size, size as u32);
    }

    fn set_max_size(&mut self, max_size: usize) {
        write_field(self.data_mut(), TreePageHeader::MaxSize, max_size as u32);
    }

    fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        write_field(self.data_mut(), TreePageHeader::ParentPageId, parent_page_id);
    }

    fn set_page_id(&mut self, page_id: PageId) {
        write_field(self.data_mut(), TreePageHeader::PageId, page_id);
    }
}

/// A tree page parsed by its type tag.
///
/// Tree algorithms are written once against this type; the structural moves
/// dispatch to the matching page layout and fail if the two pages disagree
/// on their kind. Moves that hand internal entries to another page return
/// the child ids that now need their parent pointer rewritten.
pub enum BTreeNode<B> {
    Internal(InternalPage<B>),
    Leaf(LeafPage<B>),
}

impl<B: AsRef<[u8]>> BTreeNode<B> {
    pub fn decode(data: B) -> Result<Self> {
        let tag = read_field(data.as_ref(), TreePageHeader::PageType);
        match IndexPageType::from(tag) {
            IndexPageType::Leaf => Ok(BTreeNode::Leaf(LeafPage::new(data))),
            IndexPageType::Internal => Ok(BTreeNode::Internal(InternalPage::new(data))),
            IndexPageType::Invalid => Err(Error::Corrupted(format!(
                "unexpected tree page type tag {:#x}",
                tag
            ))),
        }
    }

    /// Child to descend into for internal pages, `None` at a leaf. Without
    /// a key the leftmost child is taken.
    pub fn lookup_child(&self, key: Option<&[u8]>, key_manager: &KeyManager) -> Option<PageId> {
        match (self, key) {
            (BTreeNode::Internal(node), Some(key)) => Some(node.lookup(key, key_manager)),
            (BTreeNode::Internal(node), None) => Some(node.value_at(0)),
            (BTreeNode::Leaf(_), _) => None,
        }
    }

    /// Child page ids in slot order. Empty for leaves.
    pub fn children(&self) -> Vec<PageId> {
        match self {
            BTreeNode::Internal(node) => (0..node.size()).map(|i| node.value_at(i)).collect(),
            BTreeNode::Leaf(_) => Vec::new(),
        }
    }
}

impl<B: AsRef<[u8]>> TreeNode for BTreeNode<B> {
    fn data(&self) -> &[u8] {
        match self {
            BTreeNode::Internal(node) => node.data(),
            BTreeNode::Leaf(node) => node.data(),
        }
    }

    fn key_at(&self, index: usize) -> &[u8] {
        match self {
            BTreeNode::Internal(node) => node.key_at(index),
            BTreeNode::Leaf(node) => node.key_at(index),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreeNodeMut for BTreeNode<B> {
    fn data_mut(&mut self) -> &mut [u8] {
        match self {
            BTreeNode::Internal(node) => node.data_mut(),
            BTreeNode::Leaf(node) => node.data_mut(),
        }
    }

    fn set_key_at(&mut self, index: usize, key: &[u8]) {
        match self {
            BTreeNode::Internal(node) => node.set_key_at(index, key),
            BTreeNode::Leaf(node) => node.set_key_at(index, key),
        }
    }
}

fn kind_mismatch(left: PageId, right: PageId) -> Error {
    Error::Corrupted(format!(
        "pages {} and {} are siblings of different kinds",
        left, right
    ))
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BTreeNode<B> {
    /// Split: moves the upper half of the entries into an empty `recipient`.
    pub fn move_half_to<R>(&mut self, recipient: &mut BTreeNode<R>) -> Result<Vec<PageId>>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        match (self, recipient) {
            (BTreeNode::Internal(node), BTreeNode::Internal(recipient)) => {
                Ok(node.move_half_to(recipient))
            }
            (BTreeNode::Leaf(node), BTreeNode::Leaf(recipient)) => {
                node.move_half_to(recipient);
                Ok(Vec::new())
            }
            (node, recipient) => Err(kind_mismatch(node.page_id(), recipient.page_id())),
        }
    }

    /// Merge: appends every entry to `recipient`, the left sibling.
    /// `middle_key` is the parent's separator for this page.
    pub fn move_all_to<R>(
        &mut self,
        recipient: &mut BTreeNode<R>,
        middle_key: &[u8],
    ) -> Result<Vec<PageId>>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        match (self, recipient) {
            (BTreeNode::Internal(node), BTreeNode::Internal(recipient)) => {
                Ok(node.move_all_to(recipient, middle_key))
            }
            (BTreeNode::Leaf(node), BTreeNode::Leaf(recipient)) => {
                node.move_all_to(recipient);
                Ok(Vec::new())
            }
            (node, recipient) => Err(kind_mismatch(node.page_id(), recipient.page_id())),
        }
    }

    /// Redistribute from a right sibling: our first entry becomes the last
    /// entry of `recipient`.
    pub fn move_first_to_end_of<R>(
        &mut self,
        recipient: &mut BTreeNode<R>,
        middle_key: &[u8],
    ) -> Result<Option<PageId>>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        match (self, recipient) {
            (BTreeNode::Internal(node), BTreeNode::Internal(recipient)) => {
                Ok(Some(node.move_first_to_end_of(recipient, middle_key)))
            }
            (BTreeNode::Leaf(node), BTreeNode::Leaf(recipient)) => {
                node.move_first_to_end_of(recipient);
                Ok(None)
            }
            (node, recipient) => Err(kind_mismatch(node.page_id(), recipient.page_id())),
        }
    }

    /// Redistribute from a left sibling: our last entry becomes the first
    /// entry of `recipient`.
    pub fn move_last_to_front_of<R>(
        &mut self,
        recipient: &mut BTreeNode<R>,
        middle_key: &[u8],
    ) -> Result<Option<PageId>>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        match (self, recipient) {
            (BTreeNode::Internal(node), BTreeNode::Internal(recipient)) => {
                Ok(Some(node.move_last_to_front_of(recipient, middle_key)))
            }
            (BTreeNode::Leaf(node), BTreeNode::Leaf(recipient)) => {
                node.move_last_to_front_of(recipient);
                Ok(None)
            }
            (node, recipient) => Err(kind_mismatch(node.page_id(), recipient.page_id())),
        }
    }
}
