use std::{cmp::Ordering, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, trace};

use crate::{
    buffer::buffer_pool_manager::BufferPoolManager,
    errors::{Error, Result},
    iterators::b_tree_iterator::IndexIterator,
    storage::page::{
        b_plus_tree_internal_page::InternalPage,
        b_plus_tree_leaf_page::LeafPage,
        b_plus_tree_page::{BTreeNode, IndexPageType, TreeNode, TreeNodeMut},
        btree_page_layout::{internal_page_capacity, leaf_page_capacity},
        index_roots_page::IndexRootsPage,
        page::{page_constants::INDEX_ROOTS_PAGE_ID, PageId, INVALID_PAGE_ID},
        page_guard::{ReadGuard, WriteGuard},
    },
};

use super::{
    key_manager::KeyManager,
    node_type::{GenericKey, RowId},
    IndexId,
};

const MIN_LEAF_MAX_SIZE: usize = 2;
// Keeps non-root internal nodes at two children or more
const MIN_INTERNAL_MAX_SIZE: usize = 4;

/// Builds a [`BPlusTree`] bound to an index id.
///
/// ```ignore
/// let tree = BPlusTreeBuilder::new()
///     .leaf_max_size(4)
///     .internal_max_size(4)
///     .build(index_id, bpm, key_manager)?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct BPlusTreeBuilder {
    leaf_max_size: Option<usize>,
    internal_max_size: Option<usize>,
}

impl BPlusTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_max_size(mut self, leaf_max_size: usize) -> Self {
        self.leaf_max_size = Some(leaf_max_size);
        self
    }

    pub fn internal_max_size(mut self, internal_max_size: usize) -> Self {
        self.internal_max_size = Some(internal_max_size);
        self
    }

    /// Opens the tree registered under `index_id`, or an empty one if the
    /// registry has no root for it yet.
    pub fn build(
        self,
        index_id: IndexId,
        bpm: Arc<BufferPoolManager>,
        key_manager: KeyManager,
    ) -> Result<BPlusTree> {
        let key_size = key_manager.key_size();
        let leaf_max_size = resolve_max_size(
            "leaf",
            self.leaf_max_size,
            leaf_page_capacity(key_size),
            MIN_LEAF_MAX_SIZE,
        )?;
        let internal_max_size = resolve_max_size(
            "internal",
            self.internal_max_size,
            internal_page_capacity(key_size),
            MIN_INTERNAL_MAX_SIZE,
        )?;

        let root_page_id = {
            let guard = bpm.read_page(INDEX_ROOTS_PAGE_ID)?;
            IndexRootsPage::new(guard.data())
                .get_root_id(index_id)
                .unwrap_or(INVALID_PAGE_ID)
        };
        debug!(
            index_id,
            root_page_id, leaf_max_size, internal_max_size, "opened index"
        );

        Ok(BPlusTree {
            index_id,
            bpm,
            key_manager,
            leaf_max_size,
            internal_max_size,
            root_page_id: RwLock::new(root_page_id),
        })
    }
}

fn resolve_max_size(
    kind: &str,
    requested: Option<usize>,
    capacity: usize,
    floor: usize,
) -> Result<usize> {
    // One slot stays spare for a node whose split could not allocate a page
    let limit = capacity.saturating_sub(1);
    let max_size = requested.unwrap_or(limit);
    if max_size < floor || max_size > limit {
        return Err(Error::InvalidConfig(format!(
            "{} max size {} outside [{}, {}] for this key size",
            kind, max_size, floor, limit
        )));
    }
    Ok(max_size)
}

fn expect_leaf<B: AsRef<[u8]>>(data: B) -> Result<LeafPage<B>> {
    match BTreeNode::decode(data)? {
        BTreeNode::Leaf(leaf) => Ok(leaf),
        BTreeNode::Internal(node) => Err(Error::Corrupted(format!(
            "page {} is internal where a leaf was expected",
            node.page_id()
        ))),
    }
}

fn expect_internal<B: AsRef<[u8]>>(data: B) -> Result<InternalPage<B>> {
    match BTreeNode::decode(data)? {
        BTreeNode::Internal(node) => Ok(node),
        BTreeNode::Leaf(leaf) => Err(Error::Corrupted(format!(
            "page {} is a leaf where an internal page was expected",
            leaf.page_id()
        ))),
    }
}

fn broken_link(parent_id: PageId, child_id: PageId) -> Error {
    Error::Corrupted(format!(
        "page {} does not list child {}",
        parent_id, child_id
    ))
}

/// Unique-key B+Tree over `GenericKey -> RowId`, stored in buffer pool pages.
///
/// The root pointer doubles as the tree latch. Lookups, scans and writes that
/// stay inside one leaf hold it shared and crab page latches top-down;
/// anything that may split, merge or rewrite a separator retries with it held
/// exclusively.
pub struct BPlusTree {
    index_id: IndexId,
    bpm: Arc<BufferPoolManager>,
    key_manager: KeyManager,
    leaf_max_size: usize,
    internal_max_size: usize,
    root_page_id: RwLock<PageId>,
}

impl BPlusTree {
    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn leaf_max_size(&self) -> usize {
        self.leaf_max_size
    }

    pub fn internal_max_size(&self) -> usize {
        self.internal_max_size
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id() == INVALID_PAGE_ID
    }

    pub(crate) fn latch_shared(&self) -> RwLockReadGuard<'_, PageId> {
        self.root_page_id.read()
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_manager.key_size() {
            return Err(Error::KeySchema(format!(
                "key of {} bytes for an index with {} byte keys",
                key.len(),
                self.key_manager.key_size()
            )));
        }
        Ok(())
    }

    /// Point lookup.
    pub fn get_value(&self, key: &GenericKey) -> Result<Option<RowId>> {
        self.check_key(key)?;
        let root = self.root_page_id.read();
        if *root == INVALID_PAGE_ID {
            return Ok(None);
        }
        let guard = self.find_leaf_read(*root, Some(&key[..]))?;
        let leaf = expect_leaf(guard.data())?;
        Ok(leaf.lookup(key, &self.key_manager))
    }

    /// Inserts a new entry. `Ok(false)` if the key is already present.
    pub fn insert(&self, key: &GenericKey, value: RowId) -> Result<bool> {
        self.check_key(key)?;
        {
            let root = self.root_page_id.read();
            if *root != INVALID_PAGE_ID {
                if let Some(inserted) = self.insert_in_leaf(*root, key, value)? {
                    return Ok(inserted);
                }
            }
        }

        let mut root = self.root_page_id.write();
        self.insert_structural(&mut root, key, value)
    }

    /// Removes `key`. `Ok(false)` if it was not present.
    pub fn remove(&self, key: &GenericKey) -> Result<bool> {
        self.check_key(key)?;
        {
            let root = self.root_page_id.read();
            if *root == INVALID_PAGE_ID {
                return Ok(false);
            }
            if let Some(removed) = self.remove_in_leaf(*root, key)? {
                return Ok(removed);
            }
        }

        let mut root = self.root_page_id.write();
        self.remove_structural(&mut root, key)
    }

    /// Frees every page of the tree and drops its registry entry. The tree
    /// is empty and usable afterwards.
    pub fn destroy(&self) -> Result<()> {
        let mut root = self.root_page_id.write();
        if *root != INVALID_PAGE_ID {
            self.destroy_subtree(*root)?;
        }
        *root = INVALID_PAGE_ID;

        let mut guard = self.bpm.write_page(INDEX_ROOTS_PAGE_ID)?;
        IndexRootsPage::new(guard.data_mut()).delete(self.index_id);
        debug!(index_id = self.index_id, "destroyed index");
        Ok(())
    }

    /// Iterator at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<'_>> {
        let root = self.root_page_id.read();
        let start = self.seek(*root, None, false)?;
        Ok(IndexIterator::new(self, start))
    }

    /// Iterator at the first key `>= key`.
    pub fn begin_at(&self, key: &GenericKey) -> Result<IndexIterator<'_>> {
        self.check_key(key)?;
        let root = self.root_page_id.read();
        let start = self.seek(*root, Some(&key[..]), false)?;
        Ok(IndexIterator::new(self, start))
    }

    pub fn end(&self) -> IndexIterator<'_> {
        IndexIterator::end(self)
    }

    /// Read-crabs from `root` to the leaf covering `key`, or to the leftmost
    /// leaf without a key.
    fn find_leaf_read(&self, root: PageId, key: Option<&[u8]>) -> Result<ReadGuard<'_>> {
        let mut guard = self.bpm.read_page(root)?;
        loop {
            let child = BTreeNode::decode(guard.data())?.lookup_child(key, &self.key_manager);
            match child {
                Some(child) => guard = self.bpm.read_page(child)?,
                None => return Ok(guard),
            }
        }
    }

    /// Read-crabs down to the leaf covering `key` and returns it write
    /// latched. The parent stays read latched until the leaf latch is held.
    fn find_leaf_write(&self, root: PageId, key: &[u8]) -> Result<WriteGuard<'_>> {
        let mut parent: Option<ReadGuard<'_>> = None;
        let mut page_id = root;
        loop {
            let guard = self.bpm.read_page(page_id)?;
            let child = BTreeNode::decode(guard.data())?.lookup_child(Some(key), &self.key_manager);
            match child {
                Some(child) => {
                    parent = Some(guard);
                    page_id = child;
                }
                None => {
                    drop(guard);
                    let leaf = self.bpm.write_page(page_id)?;
                    drop(parent);
                    return Ok(leaf);
                }
            }
        }
    }

    /// Insert that fits in the leaf without a split. `None` asks the caller
    /// to retry with the tree latched exclusively.
    fn insert_in_leaf(&self, root: PageId, key: &[u8], value: RowId) -> Result<Option<bool>> {
        let mut guard = self.find_leaf_write(root, key)?;
        {
            let leaf = expect_leaf(guard.data())?;
            if leaf.find_key(key, &self.key_manager).is_some() {
                return Ok(Some(false));
            }
            if leaf.size() + 1 >= leaf.max_size() {
                return Ok(None);
            }
        }
        expect_leaf(guard.data_mut())?.insert(key, value, &self.key_manager);
        Ok(Some(true))
    }

    fn insert_structural(&self, root: &mut PageId, key: &[u8], value: RowId) -> Result<bool> {
        if *root == INVALID_PAGE_ID {
            self.start_new_tree(root, key, value)?;
            return Ok(true);
        }

        let mut leaf_guard = self.find_leaf_write(*root, key)?;
        if expect_leaf(leaf_guard.data())?
            .find_key(key, &self.key_manager)
            .is_some()
        {
            return Ok(false);
        }

        let mut leaf = expect_leaf(leaf_guard.data_mut())?;
        let size = leaf.insert(key, value, &self.key_manager);
        if size < leaf.max_size() {
            return Ok(true);
        }

        let (separator, sibling_guard) = self.split(&mut leaf_guard)?;
        self.insert_into_parent(root, leaf_guard, &separator, sibling_guard)?;
        Ok(true)
    }

    fn start_new_tree(&self, root: &mut PageId, key: &[u8], value: RowId) -> Result<()> {
        let mut guard = self.bpm.new_page()?.upgrade_write();
        let page_id = guard.page_id();
        let mut leaf = LeafPage::new(guard.data_mut());
        leaf.init(
            page_id,
            INVALID_PAGE_ID,
            self.key_manager.key_size(),
            self.leaf_max_size,
        );
        leaf.insert(key, value, &self.key_manager);
        drop(guard);

        *root = page_id;
        self.update_root_page_id(page_id)?;
        debug!(index_id = self.index_id, root_page_id = page_id, "started new tree");
        Ok(())
    }

    /// Moves the upper half of a full node into a new right sibling and
    /// returns the separator to push up along with the latched sibling.
    fn split<'a>(&'a self, guard: &mut WriteGuard<'a>) -> Result<(GenericKey, WriteGuard<'a>)> {
        let mut sibling_guard = self.bpm.new_page()?.upgrade_write();
        let sibling_id = sibling_guard.page_id();
        let node_id = guard.page_id();

        let mut node = BTreeNode::decode(guard.data_mut())?;
        let parent_id = node.parent_page_id();
        let mut sibling = match &node {
            BTreeNode::Internal(_) => {
                let mut page = InternalPage::new(sibling_guard.data_mut());
                page.init(sibling_id, parent_id, node.key_size(), node.max_size());
                BTreeNode::Internal(page)
            }
            BTreeNode::Leaf(_) => {
                let mut page = LeafPage::new(sibling_guard.data_mut());
                page.init(sibling_id, parent_id, node.key_size(), node.max_size());
                BTreeNode::Leaf(page)
            }
        };

        let moved = node.move_half_to(&mut sibling)?;
        if let (BTreeNode::Leaf(leaf), BTreeNode::Leaf(new_leaf)) = (&mut node, &mut sibling) {
            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(sibling_id);
        }
        let separator = GenericKey::from_bytes(sibling.key_at(0));
        trace!(
            index_id = self.index_id,
            page_id = node_id,
            sibling_id,
            kept = node.size(),
            moved = sibling.size(),
            "split page"
        );

        self.adopt(&moved, sibling_id)?;
        Ok((separator, sibling_guard))
    }

    /// Hooks a freshly split-off `new` node into the parent of `old`,
    /// splitting upwards as long as parents fill up.
    fn insert_into_parent<'a>(
        &'a self,
        root: &mut PageId,
        mut old: WriteGuard<'a>,
        key: &[u8],
        mut new: WriteGuard<'a>,
    ) -> Result<()> {
        let old_id = old.page_id();
        let new_id = new.page_id();
        let parent_id = BTreeNode::decode(old.data())?.parent_page_id();

        if parent_id == INVALID_PAGE_ID {
            let mut root_guard = self.bpm.new_page()?.upgrade_write();
            let root_id = root_guard.page_id();
            let mut node = InternalPage::new(root_guard.data_mut());
            node.init(
                root_id,
                INVALID_PAGE_ID,
                self.key_manager.key_size(),
                self.internal_max_size,
            );
            node.populate_new_root(old_id, key, new_id);
            BTreeNode::decode(old.data_mut())?.set_parent_page_id(root_id);
            BTreeNode::decode(new.data_mut())?.set_parent_page_id(root_id);
            drop(root_guard);
            drop(old);
            drop(new);

            *root = root_id;
            self.update_root_page_id(root_id)?;
            debug!(index_id = self.index_id, root_page_id = root_id, "grew new root");
            return Ok(());
        }

        let mut parent_guard = self.bpm.write_page(parent_id)?;
        drop(old);
        drop(new);

        let mut parent = expect_internal(parent_guard.data_mut())?;
        let size = parent
            .insert_node_after(old_id, key, new_id)
            .ok_or_else(|| broken_link(parent_id, old_id))?;
        if size < parent.max_size() {
            return Ok(());
        }

        let (separator, sibling_guard) = self.split(&mut parent_guard)?;
        self.insert_into_parent(root, parent_guard, &separator, sibling_guard)
    }

    /// Removal that leaves the leaf within bounds and its first key intact.
    /// `None` asks the caller to retry with the tree latched exclusively.
    fn remove_in_leaf(&self, root: PageId, key: &[u8]) -> Result<Option<bool>> {
        let mut guard = self.find_leaf_write(root, key)?;
        let index = {
            let leaf = expect_leaf(guard.data())?;
            let Some(index) = leaf.find_key(key, &self.key_manager) else {
                debug!(
                    index_id = self.index_id,
                    key = %self.key_manager.display_key(key),
                    "remove of absent key"
                );
                return Ok(Some(false));
            };
            let remaining = leaf.size() - 1;
            let in_place = if leaf.is_root_page() {
                remaining > 0
            } else {
                index > 0 && remaining >= leaf.min_size()
            };
            if !in_place {
                return Ok(None);
            }
            index
        };
        expect_leaf(guard.data_mut())?.remove_at(index);
        Ok(Some(true))
    }

    fn remove_structural(&self, root: &mut PageId, key: &[u8]) -> Result<bool> {
        if *root == INVALID_PAGE_ID {
            return Ok(false);
        }

        let mut leaf_guard = self.find_leaf_write(*root, key)?;
        let Some(index) = expect_leaf(leaf_guard.data())?.find_key(key, &self.key_manager) else {
            debug!(
                index_id = self.index_id,
                key = %self.key_manager.display_key(key),
                "remove of absent key"
            );
            return Ok(false);
        };

        let leaf_id = leaf_guard.page_id();
        let (parent_id, new_first) = {
            let mut leaf = expect_leaf(leaf_guard.data_mut())?;
            leaf.remove_at(index);
            let new_first = (index == 0 && leaf.size() > 0)
                .then(|| GenericKey::from_bytes(leaf.key_at(0)));
            (leaf.parent_page_id(), new_first)
        };
        if let Some(first) = new_first {
            self.update_parent_key(leaf_id, parent_id, &first)?;
        }

        self.coalesce_or_redistribute(root, leaf_guard)?;
        Ok(true)
    }

    /// Rewrites the separator for `child_id` in its ancestors, climbing while
    /// the child hangs off slot 0.
    fn update_parent_key(&self, child_id: PageId, parent_id: PageId, key: &[u8]) -> Result<()> {
        let mut child_id = child_id;
        let mut parent_id = parent_id;
        while parent_id != INVALID_PAGE_ID {
            let mut guard = self.bpm.write_page(parent_id)?;
            let mut parent = expect_internal(guard.data_mut())?;
            let index = parent
                .value_index(child_id)
                .ok_or_else(|| broken_link(parent_id, child_id))?;
            parent.set_key_at(index, key);
            if index != 0 {
                break;
            }
            child_id = parent_id;
            parent_id = parent.parent_page_id();
        }
        Ok(())
    }

    /// Restores occupancy of `node_guard` after a removal, merging with or
    /// borrowing from a sibling and recursing into the parent on a merge.
    fn coalesce_or_redistribute<'a>(
        &'a self,
        root: &mut PageId,
        node_guard: WriteGuard<'a>,
    ) -> Result<()> {
        let mut node_guard = node_guard;
        let node_id = node_guard.page_id();
        let (parent_id, size, min_size, max_size) = {
            let node = BTreeNode::decode(node_guard.data())?;
            (node.parent_page_id(), node.size(), node.min_size(), node.max_size())
        };

        if parent_id == INVALID_PAGE_ID {
            return self.adjust_root(root, node_guard);
        }
        if size >= min_size {
            return Ok(());
        }

        let mut parent_guard = self.bpm.write_page(parent_id)?;
        let (node_index, sibling_id) = {
            let parent = expect_internal(parent_guard.data())?;
            let node_index = parent
                .value_index(node_id)
                .ok_or_else(|| broken_link(parent_id, node_id))?;
            let sibling_index = if node_index == 0 { 1 } else { node_index - 1 };
            if sibling_index >= parent.size() {
                return Err(Error::Corrupted(format!(
                    "page {} has no sibling under parent {}",
                    node_id, parent_id
                )));
            }
            (node_index, parent.value_at(sibling_index))
        };
        let mut sibling_guard = self.bpm.write_page(sibling_id)?;
        let sibling_size = BTreeNode::decode(sibling_guard.data())?.size();

        if sibling_size + size < max_size {
            // Always fold the right page into the left one
            let (mut left_guard, mut right_guard, separator_index) = if node_index == 0 {
                (node_guard, sibling_guard, 1)
            } else {
                (sibling_guard, node_guard, node_index)
            };
            let left_id = left_guard.page_id();
            let right_id = right_guard.page_id();

            let moved = {
                let mut parent = expect_internal(parent_guard.data_mut())?;
                let middle_key = GenericKey::from_bytes(parent.key_at(separator_index));
                let mut left = BTreeNode::decode(left_guard.data_mut())?;
                let mut right = BTreeNode::decode(right_guard.data_mut())?;
                let moved = right.move_all_to(&mut left, &middle_key)?;
                parent.remove(separator_index);
                moved
            };
            drop(left_guard);
            drop(right_guard);

            self.adopt(&moved, left_id)?;
            self.delete_tree_page(right_id)?;
            debug!(
                index_id = self.index_id,
                page_id = left_id,
                merged = right_id,
                "merged pages"
            );
            return self.coalesce_or_redistribute(root, parent_guard);
        }

        let moved = {
            let mut parent = expect_internal(parent_guard.data_mut())?;
            let mut node = BTreeNode::decode(node_guard.data_mut())?;
            let mut sibling = BTreeNode::decode(sibling_guard.data_mut())?;
            if node_index == 0 {
                let middle_key = GenericKey::from_bytes(parent.key_at(1));
                let moved = sibling.move_first_to_end_of(&mut node, &middle_key)?;
                parent.set_key_at(1, sibling.key_at(0));
                moved
            } else {
                let middle_key = GenericKey::from_bytes(parent.key_at(node_index));
                let moved = sibling.move_last_to_front_of(&mut node, &middle_key)?;
                parent.set_key_at(node_index, node.key_at(0));
                moved
            }
        };
        drop(sibling_guard);
        drop(node_guard);
        drop(parent_guard);

        if let Some(child) = moved {
            self.adopt(&[child], node_id)?;
        }
        trace!(
            index_id = self.index_id,
            page_id = node_id,
            sibling_id,
            "redistributed one entry"
        );
        Ok(())
    }

    /// Collapses an emptied root leaf or a root internal page down to a
    /// single child.
    fn adjust_root<'a>(&'a self, root: &mut PageId, root_guard: WriteGuard<'a>) -> Result<()> {
        let new_root = match BTreeNode::decode(root_guard.data())? {
            BTreeNode::Leaf(leaf) if leaf.size() == 0 => INVALID_PAGE_ID,
            BTreeNode::Internal(node) if node.size() == 1 => node.value_at(0),
            _ => return Ok(()),
        };
        let old_root = root_guard.page_id();
        drop(root_guard);

        if new_root != INVALID_PAGE_ID {
            let mut child = self.bpm.write_page(new_root)?;
            BTreeNode::decode(child.data_mut())?.set_parent_page_id(INVALID_PAGE_ID);
        }
        *root = new_root;
        self.update_root_page_id(new_root)?;
        self.delete_tree_page(old_root)?;
        debug!(
            index_id = self.index_id,
            old_root,
            root_page_id = new_root,
            "adjusted root"
        );
        Ok(())
    }

    /// Points each of `children` back at `parent_id`.
    fn adopt(&self, children: &[PageId], parent_id: PageId) -> Result<()> {
        for child in children {
            let mut guard = self.bpm.write_page(*child)?;
            BTreeNode::decode(guard.data_mut())?.set_parent_page_id(parent_id);
        }
        Ok(())
    }

    /// Frees an unlinked tree page. A page still pinned by an iterator is
    /// tagged invalid so the iterator stops trusting it, and goes back to the
    /// allocator with its last pin.
    fn delete_tree_page(&self, page_id: PageId) -> Result<()> {
        {
            let mut guard = self.bpm.write_page(page_id)?;
            BTreeNode::decode(guard.data_mut())?.set_page_type(IndexPageType::Invalid);
        }
        if !self.bpm.delete_page_on_unpin(page_id)? {
            trace!(
                index_id = self.index_id,
                page_id, "unlinked tree page is pinned, freeing it on last unpin"
            );
        }
        Ok(())
    }

    fn destroy_subtree(&self, page_id: PageId) -> Result<()> {
        let children = {
            let guard = self.bpm.read_page(page_id)?;
            BTreeNode::decode(guard.data())?.children()
        };
        for child in children {
            self.destroy_subtree(child)?;
        }
        self.delete_tree_page(page_id)
    }

    /// Persists the root pointer in the registry page, creating the entry on
    /// first use. Caller holds the tree latch exclusively.
    fn update_root_page_id(&self, root_page_id: PageId) -> Result<()> {
        let mut guard = self.bpm.write_page(INDEX_ROOTS_PAGE_ID)?;
        let mut roots = IndexRootsPage::new(guard.data_mut());
        if !roots.update(self.index_id, root_page_id)
            && !roots.insert(self.index_id, root_page_id)
        {
            return Err(Error::RegistryFull);
        }
        Ok(())
    }

    /// Leaf and slot of the first entry `>= key`, or `> key` when
    /// `exclusive`; the leftmost entry without a key. Empty leaves are
    /// skipped through the leaf links, coupling read latches left to right.
    /// Caller holds the tree latch.
    pub(crate) fn seek(
        &self,
        root: PageId,
        key: Option<&[u8]>,
        exclusive: bool,
    ) -> Result<Option<(ReadGuard<'_>, usize)>> {
        if root == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.find_leaf_read(root, key)?;
        let mut index = match key {
            Some(key) => {
                let leaf = expect_leaf(guard.data())?;
                let index = leaf.key_index(key, &self.key_manager);
                let on_key = index < leaf.size()
                    && self.key_manager.compare_keys(leaf.key_at(index), key) == Ordering::Equal;
                if exclusive && on_key {
                    index + 1
                } else {
                    index
                }
            }
            None => 0,
        };

        loop {
            let next = {
                let leaf = expect_leaf(guard.data())?;
                if index < leaf.size() {
                    break;
                }
                leaf.next_page_id()
            };
            if next == INVALID_PAGE_ID {
                return Ok(None);
            }
            guard = self.bpm.read_page(next)?;
            index = 0;
        }
        Ok(Some((guard, index)))
    }
}
