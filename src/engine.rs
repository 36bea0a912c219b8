use std::{path::Path, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    buffer::buffer_pool_manager::BufferPoolManager,
    config::StorageOptions,
    errors::{Error, Result},
    index::{
        btree::{BPlusTree, BPlusTreeBuilder},
        key_manager::{DataType, KeyManager},
        IndexId,
    },
    storage::{
        disk::manager::DiskManager,
        page::{
            index_roots_page::IndexRootsPage,
            page::{
                page_constants::{CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID},
                PageId,
            },
        },
    },
};

/// One database file: the disk manager, a buffer pool over it, and the
/// B+Tree indexes registered in its index roots page.
pub struct StorageEngine {
    options: StorageOptions,
    bpm: Arc<BufferPoolManager>,
    // Trees already opened, so every caller shares one tree latch per index
    indexes: DashMap<IndexId, Arc<BPlusTree>>,
}

impl StorageEngine {
    /// Opens or creates the database file at `path`. A new file gets its
    /// reserved catalog and index roots pages.
    pub fn open(path: impl AsRef<Path>, options: StorageOptions) -> Result<Self> {
        options.validate()?;

        let disk_manager = DiskManager::open(path.as_ref())?;
        let fresh = disk_manager.num_allocated_pages() == 0;
        let bpm = Arc::new(BufferPoolManager::new(options.pool_size, disk_manager));
        if fresh {
            Self::bootstrap(&bpm)?;
        }

        info!(
            file = %path.as_ref().display(),
            pool_size = options.pool_size,
            fresh,
            "opened storage engine"
        );
        Ok(StorageEngine {
            options,
            bpm,
            indexes: DashMap::new(),
        })
    }

    fn bootstrap(bpm: &BufferPoolManager) -> Result<()> {
        let catalog = bpm.new_page()?;
        let roots = bpm.new_page()?;
        if catalog.page_id() != CATALOG_META_PAGE_ID || roots.page_id() != INDEX_ROOTS_PAGE_ID {
            return Err(Error::Corrupted(format!(
                "fresh file handed out pages {} and {} for the reserved pages",
                catalog.page_id(),
                roots.page_id()
            )));
        }
        drop(catalog);

        let mut roots = roots.upgrade_write();
        IndexRootsPage::new(roots.data_mut()).init();
        drop(roots);

        bpm.flush_page(CATALOG_META_PAGE_ID)?;
        bpm.flush_page(INDEX_ROOTS_PAGE_ID)?;
        debug!("bootstrapped reserved pages");
        Ok(())
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Tree for `index_id` over keys of `key_schema`, created empty if the
    /// index has never been written.
    pub fn open_index(&self, index_id: IndexId, key_schema: Vec<DataType>) -> Result<Arc<BPlusTree>> {
        if let Some(tree) = self.indexes.get(&index_id).map(|tree| Arc::clone(&tree)) {
            if tree.key_manager().key_schema() != key_schema.as_slice() {
                return Err(Error::KeySchema(format!(
                    "index {} is already open with a different key schema",
                    index_id
                )));
            }
            return Ok(tree);
        }

        let key_manager = KeyManager::new(key_schema, self.options.key_size)?;
        let mut builder = BPlusTreeBuilder::new();
        if let Some(leaf_max_size) = self.options.leaf_max_size {
            builder = builder.leaf_max_size(leaf_max_size);
        }
        if let Some(internal_max_size) = self.options.internal_max_size {
            builder = builder.internal_max_size(internal_max_size);
        }
        let tree = Arc::new(builder.build(index_id, Arc::clone(&self.bpm), key_manager)?);

        Ok(Arc::clone(self.indexes.entry(index_id).or_insert(tree).value()))
    }

    /// Frees every page of the index and forgets it.
    pub fn drop_index(&self, index_id: IndexId) -> Result<()> {
        if let Some((_, tree)) = self.indexes.remove(&index_id) {
            return tree.destroy();
        }
        // Never opened in this session; only the registry knows its root
        let registered = self
            .registered_indexes()?
            .into_iter()
            .any(|(id, _)| id == index_id);
        if registered {
            let key_manager = KeyManager::new(vec![DataType::Boolean], self.options.key_size)?;
            BPlusTreeBuilder::new()
                .build(index_id, Arc::clone(&self.bpm), key_manager)?
                .destroy()?;
        }
        Ok(())
    }

    /// `(index_id, root_page_id)` for every index with a persisted root.
    pub fn registered_indexes(&self) -> Result<Vec<(IndexId, PageId)>> {
        let guard = self.bpm.read_page(INDEX_ROOTS_PAGE_ID)?;
        Ok(IndexRootsPage::new(guard.data()).entries())
    }

    /// Writes every cached page back to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }
}
