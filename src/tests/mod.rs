mod buffer_pool_test;
mod engine_test;
mod iterator_test;

use std::path::PathBuf;

use tempfile::TempDir;

use crate::{
    config::StorageOptions,
    engine::StorageEngine,
    errors::Result,
    index::{
        btree::BPlusTree,
        key_manager::{DataType, Value},
        node_type::{GenericKey, RowId},
    },
};

/// Engine over a scratch file. The engine is dropped, and so flushed,
/// before the directory goes away.
pub(crate) struct Fixture {
    pub engine: StorageEngine,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(options: StorageOptions) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let engine = StorageEngine::open(dir.path().join("cairn.db"), options)?;
        Ok(Fixture { engine, dir })
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("cairn.db")
    }
}

pub(crate) fn small_node_options(pool_size: usize) -> StorageOptions {
    StorageOptions::new()
        .pool_size(pool_size)
        .key_size(8)
        .leaf_max_size(4)
        .internal_max_size(4)
}

pub(crate) fn bigint_schema() -> Vec<DataType> {
    vec![DataType::BigInt]
}

pub(crate) fn key(tree: &BPlusTree, value: i64) -> GenericKey {
    tree.key_manager()
        .serialize_from_key(&[Value::BigInt(value)])
        .unwrap()
}

pub(crate) fn row_id(value: i64) -> RowId {
    RowId::new((value >> 8) as u32, (value & 0xff) as u32)
}
