pub mod btree;
pub mod btree_ops;
pub mod key_manager;
pub mod node_type;

/// Identifies an index in the index roots page.
pub type IndexId = u32;
