use std::{cmp::Ordering, fmt};

use crate::{
    errors::{Error, Result},
    index::{
        btree::BPlusTree,
        key_manager::KeyManager,
        node_type::{GenericKey, RowId},
    },
    storage::page::{
        b_plus_tree_leaf_page::LeafPage,
        b_plus_tree_page::{IndexPageType, TreeNode},
        page::{PageId, INVALID_PAGE_ID},
        page_guard::{FrameGuard, ReadGuard},
    },
};

use super::iterator::StorageIterator;

/// Forward scan over the leaf level in key order.
///
/// The iterator remembers the entry it stands on by key, not by slot. Its
/// leaf stays pinned between steps but is only latched while the iterator
/// moves, under the shared tree latch, so writers are never blocked by an
/// idle iterator. Each step looks for the first key after the current one:
/// inside the pinned leaf while that leaf still brackets the current key,
/// from the root otherwise. Entries shifted by concurrent writes are never
/// skipped or repeated; keys inserted behind the iterator are not seen.
pub struct IndexIterator<'a> {
    tree: &'a BPlusTree,
    // `None` once past the last entry
    cursor: Option<Cursor<'a>>,
    // Failure hit while advancing, reported by the next `next()`
    error: Option<Error>,
}

/// Current entry, copied out of its leaf.
struct Cursor<'a> {
    leaf: FrameGuard<'a>,
    index: usize,
    key: GenericKey,
    value: RowId,
}

impl<'a> Cursor<'a> {
    fn read(leaf: ReadGuard<'a>, index: usize) -> Self {
        let (key, value) = {
            let page = LeafPage::new(leaf.data());
            let (key, value) = page.item(index);
            (GenericKey::from_bytes(key), value)
        };
        Cursor {
            leaf: leaf.into_frame(),
            index,
            key,
            value,
        }
    }

    /// Next entry within the pinned leaf. `None` unless the page is still a
    /// live leaf holding keys on both sides of the current one, the only case
    /// where its next key is also the next key of the tree.
    fn step(&self, key_manager: &KeyManager) -> Option<(usize, GenericKey, RowId)> {
        let data = self.leaf.read();
        let leaf = LeafPage::new(&data[..]);
        if leaf.page_type() != IndexPageType::Leaf || leaf.page_id() != self.leaf.page_id() {
            return None;
        }
        let size = leaf.size();
        if size == 0
            || key_manager.compare_keys(leaf.key_at(0), &self.key) == Ordering::Greater
            || key_manager.compare_keys(leaf.key_at(size - 1), &self.key) != Ordering::Greater
        {
            return None;
        }

        let mut index = leaf.key_index(&self.key, key_manager);
        if key_manager.compare_keys(leaf.key_at(index), &self.key) == Ordering::Equal {
            index += 1;
        }
        let (key, value) = leaf.item(index);
        Some((index, GenericKey::from_bytes(key), value))
    }
}

impl<'a> IndexIterator<'a> {
    /// Iterator standing on `start`, a leaf slot found by
    /// [`BPlusTree::seek`]; at the end when there is none.
    pub(crate) fn new(tree: &'a BPlusTree, start: Option<(ReadGuard<'a>, usize)>) -> Self {
        IndexIterator {
            tree,
            cursor: start.map(|(leaf, index)| Cursor::read(leaf, index)),
            error: None,
        }
    }

    pub(crate) fn end(tree: &'a BPlusTree) -> Self {
        IndexIterator {
            tree,
            cursor: None,
            error: None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.cursor.is_none()
    }

    /// Leaf the current entry was read from, `INVALID_PAGE_ID` at the end.
    pub fn page_id(&self) -> PageId {
        self.cursor
            .as_ref()
            .map_or(INVALID_PAGE_ID, |cursor| cursor.leaf.page_id())
    }

    pub fn index(&self) -> Option<usize> {
        self.cursor.as_ref().map(|cursor| cursor.index)
    }

    pub fn key(&self) -> Option<&GenericKey> {
        self.cursor.as_ref().map(|cursor| &cursor.key)
    }
}

impl StorageIterator for IndexIterator<'_> {
    type Item = Option<(GenericKey, RowId)>;

    fn value(&self) -> Self::Item {
        self.cursor
            .as_ref()
            .map(|cursor| (cursor.key.clone(), cursor.value))
    }

    fn is_valid(&self) -> bool {
        self.cursor.is_some()
    }

    fn advance(&mut self) -> Result<()> {
        let tree = self.tree;
        let Some(cursor) = self.cursor.take() else {
            return Ok(());
        };
        let root = tree.latch_shared();

        if let Some((index, key, value)) = cursor.step(tree.key_manager()) {
            self.cursor = Some(Cursor {
                index,
                key,
                value,
                ..cursor
            });
            return Ok(());
        }

        let next = tree.seek(*root, Some(&cursor.key[..]), true)?;
        drop(cursor);
        self.cursor = next.map(|(leaf, index)| Cursor::read(leaf, index));
        Ok(())
    }
}

impl Iterator for IndexIterator<'_> {
    type Item = Result<(GenericKey, RowId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        let item = StorageIterator::value(self)?;
        if let Err(err) = StorageIterator::advance(self) {
            self.error = Some(err);
        }
        Some(Ok(item))
    }
}

impl PartialEq for IndexIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.key() == other.key()
    }
}

impl fmt::Debug for IndexIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .key()
            .map(|key| self.tree.key_manager().display_key(key));
        f.debug_struct("IndexIterator")
            .field("index_id", &self.tree.index_id())
            .field("page_id", &self.page_id())
            .field("key", &key)
            .finish()
    }
}
