use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::index::key_manager::KeyManager;

use super::{
    b_plus_tree_page::{IndexPageType, TreeNode, TreeNodeMut},
    btree_page_layout::{INTERNAL_PAGE_HEADER_SIZE, INTERNAL_VALUE_SIZE},
    page::PageId,
};

/// Internal node view: header followed by `(key, child page id)` pairs.
///
/// The key in slot 0 is a placeholder; slot 0 only contributes its child.
/// Every key in child `i`'s subtree is `>= key_at(i)` and `< key_at(i + 1)`.
pub struct InternalPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> InternalPage<B> {
    pub fn new(data: B) -> Self {
        InternalPage { data }
    }

    fn pair_size(&self) -> usize {
        self.key_size() + INTERNAL_VALUE_SIZE
    }

    fn pair_offset(&self, index: usize) -> usize {
        INTERNAL_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    pub fn value_at(&self, index: usize) -> PageId {
        let offset = self.pair_offset(index) + self.key_size();
        LittleEndian::read_u32(&self.data.as_ref()[offset..offset + INTERNAL_VALUE_SIZE])
    }

    /// Slot holding `value` as its child.
    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|index| self.value_at(*index) == value)
    }

    /// Child whose key range contains `key`.
    pub fn lookup(&self, key: &[u8], key_manager: &KeyManager) -> PageId {
        // First slot in [1, size) whose key is greater than `key`
        let mut left = 1;
        let mut right = self.size();
        while left < right {
            let mid = left + (right - left) / 2;
            match key_manager.compare_keys(self.key_at(mid), key) {
                Ordering::Greater => right = mid,
                Ordering::Less | Ordering::Equal => left = mid + 1,
            }
        }
        self.value_at(left - 1)
    }
}

impl<B: AsRef<[u8]>> TreeNode for InternalPage<B> {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data.as_ref()[offset..offset + self.key_size()]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreeNodeMut for InternalPage<B> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn set_key_at(&mut self, index: usize, key: &[u8]) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        self.data.as_mut()[offset..offset + key_size].copy_from_slice(&key[..key_size]);
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalPage<B> {
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.set_page_type(IndexPageType::Internal);
        self.set_key_size(key_size);
        self.set_size(0);
        self.set_max_size(max_size);
        self.set_parent_page_id(parent_id);
        self.set_page_id(page_id);
    }

    pub fn set_value_at(&mut self, index: usize, value: PageId) {
        let offset = self.pair_offset(index) + self.key_size();
        LittleEndian::write_u32(
            &mut self.data.as_mut()[offset..offset + INTERNAL_VALUE_SIZE],
            value,
        );
    }

    /// Turns an empty page into a root over two children.
    pub fn populate_new_root(&mut self, old_value: PageId, new_key: &[u8], new_value: PageId) {
        self.set_value_at(0, old_value);
        self.set_key_at(1, new_key);
        self.set_value_at(1, new_value);
        self.set_size(2);
    }

    /// Inserts `(new_key, new_value)` right after the slot of `old_value`.
    /// Returns the new size, or `None` if `old_value` is not a child here.
    pub fn insert_node_after(
        &mut self,
        old_value: PageId,
        new_key: &[u8],
        new_value: PageId,
    ) -> Option<usize> {
        let index = self.value_index(old_value)? + 1;
        self.shift_right(index);
        self.set_key_at(index, new_key);
        self.set_value_at(index, new_value);
        Some(self.size())
    }

    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index + 1);
        let end = self.pair_offset(size);
        let dest = self.pair_offset(index);
        self.data.as_mut().copy_within(start..end, dest);
        self.set_size(size - 1);
    }

    /// Moves slots `[size / 2, size)` into the empty `recipient`. The first
    /// key moved becomes the recipient's placeholder, which is also the
    /// separator to push up.
    pub fn move_half_to<R>(&mut self, recipient: &mut InternalPage<R>) -> Vec<PageId>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let split = size / 2;
        let moved = (split..size).map(|index| self.value_at(index)).collect();

        let bytes = &self.data.as_ref()[self.pair_offset(split)..self.pair_offset(size)];
        recipient.copy_n_from(bytes, size - split);
        self.set_size(split);
        moved
    }

    /// Appends every slot to `recipient`, with `middle_key` filling in our
    /// placeholder key.
    pub fn move_all_to<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> Vec<PageId>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        self.set_key_at(0, middle_key);
        let moved = (0..size).map(|index| self.value_at(index)).collect();

        let bytes = &self.data.as_ref()[self.pair_offset(0)..self.pair_offset(size)];
        recipient.copy_n_from(bytes, size);
        self.set_size(0);
        moved
    }

    /// Our first child moves to the end of `recipient` under `middle_key`.
    /// Afterwards `key_at(0)` is the new separator for this page.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> PageId
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let child = self.value_at(0);
        recipient.copy_last_from(middle_key, child);
        self.remove(0);
        child
    }

    /// Our last child moves to the front of `recipient`. `middle_key` drops
    /// into the recipient's old first slot and the moved key becomes the
    /// recipient's new separator at `key_at(0)`.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> PageId
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let child = self.value_at(last);
        recipient.copy_first_from(self.key_at(last), middle_key, child);
        self.set_size(last);
        child
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

    fn copy_last_from(&mut self, key: &[u8], value: PageId) {
        let size = self.size();
        self.set_size(size + 1);
        self.set_key_at(size, key);
        self.set_value_at(size, value);
    }

    fn copy_first_from(&mut self, key: &[u8], middle_key: &[u8], value: PageId) {
        self.shift_right(0);
        self.set_key_at(1, middle_key);
        self.set_key_at(0, key);
        self.set_value_at(0, value);
    }
}

#[cfg(test)]
pub mod test {
    use super::InternalPage;
    use crate::{
        index::key_manager::{DataType, KeyManager, Value},
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
    fn lookup_routes_to_covering_child() {
        let key_manager = KeyManager::new(vec![DataType::Int], 8).unwrap();
        let mut buffer = zeroed_page();
        let mut node = InternalPage::new(&mut buffer[..]);
        node.init(5, INVALID_PAGE_ID, 8, 8);

        node.populate_new_root(100, &key(&key_manager, 10), 101);
        node.insert_node_after(101, &key(&key_manager, 20), 102).unwrap();
        node.insert_node_after(102, &key(&key_manager, 30), 103).unwrap();
        assert_eq!(4, node.size());

        assert_eq!(100, node.lookup(&key(&key_manager, -4), &key_manager));
        assert_eq!(101, node.lookup(&key(&key_manager, 10), &key_manager));
        assert_eq!(101, node.lookup(&key(&key_manager, 19), &key_manager));
        assert_eq!(102, node.lookup(&key(&key_manager, 20), &key_manager));
        assert_eq!(103, node.lookup(&key(&key_manager, 1000), &key_manager));
        assert_eq!(Some(2), node.value_index(102));
        assert_eq!(None, node.value_index(7));
    }

    #[test]
    fn redistribution_moves_separators() {
        let key_manager = KeyManager::new(vec![DataType::Int], 8).unwrap();
        let mut left_buffer = zeroed_page();
        let mut right_buffer = zeroed_page();
        let mut left = InternalPage::new(&mut left_buffer[..]);
        let mut right = InternalPage::new(&mut right_buffer[..]);
        left.init(1, 9, 8, 8);
        right.init(2, 9, 8, 8);

        // left: [_ 1] [10 2] [20 3], right: [_ 4] [40 5]
        left.populate_new_root(1, &key(&key_manager, 10), 2);
        left.insert_node_after(2, &key(&key_manager, 20), 3).unwrap();
        right.populate_new_root(4, &key(&key_manager, 40), 5);

        // Parent separator for `right` is 30
        let moved = left.move_last_to_front_of(&mut right, &key(&key_manager, 30));
        assert_eq!(3, moved);
        assert_eq!(2, left.size());
        assert_eq!(3, right.size());
        assert_eq!(key(&key_manager, 20), right.key_at(0));
        assert_eq!(key(&key_manager, 30), right.key_at(1));
        assert_eq!(key(&key_manager, 40), right.key_at(2));
        assert_eq!(vec![3, 4, 5], (0..3).map(|i| right.value_at(i)).collect::<Vec<_>>());

        // And back again, separator is now 20
        let moved = right.move_first_to_end_of(&mut left, &key(&key_manager, 20));
        assert_eq!(3, moved);
        assert_eq!(key(&key_manager, 30), right.key_at(0));
        assert_eq!(key(&key_manager, 20), left.key_at(2));
        assert_eq!(3, left.value_at(2));
    }

    #[test]
    fn split_and_merge_keep_every_child() {
        let key_manager = KeyManager::new(vec![DataType::Int], 8).unwrap();
        let mut buffer = zeroed_page();
        let mut sibling_buffer = zeroed_page();
        let mut node = InternalPage::new(&mut buffer[..]);
        let mut sibling = InternalPage::new(&mut sibling_buffer[..]);
        node.init(1, INVALID_PAGE_ID, 8, 5);
        sibling.init(2, INVALID_PAGE_ID, 8, 5);

        node.populate_new_root(10, &key(&key_manager, 1), 11);
        for (old, (k, new)) in (11..14).zip([(2, 12), (3, 13), (4, 14)]) {
            node.insert_node_after(old, &key(&key_manager, k), new).unwrap();
        }
        assert_eq!(5, node.size());

        let moved = node.move_half_to(&mut sibling);
        assert_eq!(vec![12, 13, 14], moved);
        assert_eq!(2, node.size());
        assert_eq!(key(&key_manager, 2), sibling.key_at(0));

        let moved = sibling.move_all_to(&mut node, &key(&key_manager, 2));
        assert_eq!(vec![12, 13, 14], moved);
        assert_eq!(0, sibling.size());
        assert_eq!(5, node.size());
        assert_eq!(key(&key_manager, 4), node.key_at(4));
    }
}
