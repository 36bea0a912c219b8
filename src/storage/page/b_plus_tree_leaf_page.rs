use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::index::{key_manager::KeyManager, node_type::RowId};

use super::{
    b_plus_tree_page::{IndexPageType, TreeNode, TreeNodeMut},
    btree_page_layout::{LEAF_PAGE_HEADER_SIZE, LEAF_VALUE_SIZE, NEXT_PAGE_ID_OFFSET},
    page::{page_constants::U32_SIZE, PageId, INVALID_PAGE_ID},
};

/// Leaf node view: header, right sibling link, then `(key, RowId)` pairs
/// sorted by key with no duplicates.
pub struct LeafPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> LeafPage<B> {
    pub fn new(data: B) -> Self {
        LeafPage { data }
    }

    fn pair_size(&self) -> usize {
        self.key_size() + LEAF_VALUE_SIZE
    }

    fn pair_offset(&self, index: usize) -> usize {
        LEAF_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_u32(&self.data.as_ref()[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + U32_SIZE])
    }

    pub fn value_at(&self, index: usize) -> RowId {
        let offset = self.pair_offset(index) + self.key_size();
        RowId::from(LittleEndian::read_u64(
            &self.data.as_ref()[offset..offset + LEAF_VALUE_SIZE],
        ))
    }

    pub fn item(&self, index: usize) -> (&[u8], RowId) {
        (self.key_at(index), self.value_at(index))
    }

    /// First slot whose key is `>= key`; `size()` if every key is smaller.
    pub fn key_index(&self, key: &[u8], key_manager: &KeyManager) -> usize {
        let mut left = 0;
        let mut right = self.size();
        while left < right {
            let mid = left + (right - left) / 2;
            match key_manager.compare_keys(self.key_at(mid), key) {
                Ordering::Less => left = mid + 1,
                Ordering::Equal | Ordering::Greater => right = mid,
            }
        }
        left
    }

    /// Slot holding exactly `key`.
    pub fn find_key(&self, key: &[u8], key_manager: &KeyManager) -> Option<usize> {
        let index = self.key_index(key, key_manager);
        (index < self.size()
            && key_manager.compare_keys(self.key_at(index), key) == Ordering::Equal)
            .then_some(index)
    }

    pub fn lookup(&self, key: &[u8], key_manager: &KeyManager) -> Option<RowId> {
        self.find_key(key, key_manager).map(|index| self.value_at(index))
    }
}

impl<B: AsRef<[u8]>> TreeNode for LeafPage<B> {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data.as_ref()[offset..offset + self.key_size()]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreeNodeMut for LeafPage<B> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn set_key_at(&mut self, index: usize, key: &[u8]) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        self.data.as_mut()[offset..offset + key_size].copy_from_slice(&key[..key_size]);
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafPage<B> {
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.set_page_type(IndexPageType::Leaf);
        self.set_key_size(key_size);
        self.set_size(0);
        self.set_max_size(max_size);
        self.set_parent_page_id(parent_id);
        self.set_page_id(page_id);
        self.set_next_page_id(INVALID_PAGE_ID);
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        LittleEndian::write_u32(
            &mut self.data.as_mut()[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + U32_SIZE],
            next_page_id,
        );
    }

    pub fn set_value_at(&mut self, index: usize, value: RowId) {
        let offset = self.pair_offset(index) + self.key_size();
        LittleEndian::write_u64(
            &mut self.data.as_mut()[offset..offset + LEAF_VALUE_SIZE],
            value.get(),
        );
    }

    /// Inserts in key order and returns the new size. The caller has already
    /// ruled out a duplicate.
    pub fn insert(&mut self, key: &[u8], value: RowId, key_manager: &KeyManager) -> usize {
        let index = self.key_index(key, key_manager);
        self.shift_right(index);
        self.set_key_at(index, key);
        self.set_value_at(index, value);
        self.size()
    }

    pub fn remove_at(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index + 1);
        let end = self.pair_offset(size);
        let dest = self.pair_offset(index);
        self.data.as_mut().copy_within(start..end, dest);
        self.set_size(size - 1);
    }

    /// Moves slots `[size / 2, size)` into the empty `recipient`. Sibling
    /// links are left to the caller.
    pub fn move_half_to<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let split = size / 2;
        let bytes = &self.data.as_ref()[self.pair_offset(split)..self.pair_offset(size)];
        recipient.copy_n_from(bytes, size - split);
        self.set_size(split);
    }

    /// Appends every entry to the left sibling `recipient`, which takes over
    /// our right sibling link.
    pub fn move_all_to<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let bytes = &self.data.as_ref()[self.pair_offset(0)..self.pair_offset(size)];
        recipient.copy_n_from(bytes, size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (key, value) = self.item(0);
        recipient.copy_last_from(key, value);
        self.remove_at(0);
    }

    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let (key, value) = self.item(last);
        recipient.copy_first_from(key, value);
        self.set_size(last);
    }

    fn shift_right(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index);
        let end = self.pair_offset(size);
        let dest = self.pair_offset(index + 1);
        self.data.as_mut().copy_within(start..end, dest);
        self.set_size(size + 1);
    }

    fn copy_n_from(&mut self, bytes: &[u8], count: usize) {
        let size = self.size();
        let start = self.pair_offset(size);
        self.data.as_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_size(size + count);
    }

    fn copy_last_from(&mut self, key: &[u8], value: RowId) {
        let size = self.size();
        self.set_size(size + 1);
        self.set_key_at(size, key);
        self.set_value_at(size, value);
    }

    fn copy_first_from(&mut self, key: &[u8], value: RowId) {
        self.shift_right(0);
        self.set_key_at(0, key);
        self.set_value_at(0, value);
    }
}

#[cfg(test)]
pub mod test {
    use super::LeafPage;
    use crate::{
        index::{
            key_manager::{DataType, KeyManager, Value},
            node_type::RowId,
        },
        storage::page::{
            b_plus_tree_page::TreeNode,
            page::{zeroed_page, INVALID_PAGE_ID},
        },
    };

    fn key(key_manager: &KeyManager, value: i32) -> Vec<u8> {
        key_manager
            .serialize_from_key(&[Value::Int(value)])
            .unwrap()
            .to_vec()
    }

    #[test]
    fn insert_keeps_keys_sorted() {
        let key_manager = KeyManager::new(vec![DataType::Int], 16).unwrap();
        let mut buffer = zeroed_page();
        let mut leaf = LeafPage::new(&mut buffer[..]);
        leaf.init(3, INVALID_PAGE_ID, 16, 8);
        assert!(leaf.is_leaf_page());
        assert_eq!(INVALID_PAGE_ID, leaf.next_page_id());

        for value in [50, -3, 7, 19, 0] {
            leaf.insert(&key(&key_manager, value), RowId::new(1, value as u32), &key_manager);
        }
        assert_eq!(5, leaf.size());

        let stored: Vec<Vec<u8>> = (0..leaf.size()).map(|i| leaf.key_at(i).to_vec()).collect();
        let expected: Vec<Vec<u8>> = [-3, 0, 7, 19, 50].iter().map(|v| key(&key_manager, *v)).collect();
        assert_eq!(expected, stored);

        assert_eq!(Some(RowId::new(1, 19)), leaf.lookup(&key(&key_manager, 19), &key_manager));
        assert_eq!(None, leaf.lookup(&key(&key_manager, 20), &key_manager));
        assert_eq!(4, leaf.key_index(&key(&key_manager, 20), &key_manager));
        assert_eq!(5, leaf.key_index(&key(&key_manager, 51), &key_manager));

        leaf.remove_at(0);
        assert_eq!(Some(0), leaf.find_key(&key(&key_manager, 0), &key_manager));
    }

    #[test]
    fn merge_takes_over_sibling_link() {
        let key_manager = KeyManager::new(vec![DataType::Int], 16).unwrap();
        let mut left_buffer = zeroed_page();
        let mut right_buffer = zeroed_page();
        let mut left = LeafPage::new(&mut left_buffer[..]);
        let mut right = LeafPage::new(&mut right_buffer[..]);
        left.init(1, 7, 16, 6);
        right.init(2, 7, 16, 6);

        for value in 0..6 {
            left.insert(&key(&key_manager, value), RowId::from(value as u64), &key_manager);
        }
        left.move_half_to(&mut right);
        right.set_next_page_id(99);
        left.set_next_page_id(2);
        assert_eq!(3, left.size());
        assert_eq!(3, right.size());
        assert_eq!(key(&key_manager, 3), right.key_at(0));

        right.move_last_to_front_of(&mut left);
        assert_eq!(key(&key_manager, 5), left.key_at(0));
        left.move_first_to_end_of(&mut right);
        assert_eq!(key(&key_manager, 5), right.key_at(2));

        right.move_all_to(&mut left);
        assert_eq!(0, right.size());
        assert_eq!(6, left.size());
        assert_eq!(99, left.next_page_id());
    }
}
