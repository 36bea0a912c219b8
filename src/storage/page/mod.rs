pub mod b_plus_tree_internal_page;
pub mod b_plus_tree_leaf_page;
pub mod b_plus_tree_page;
pub mod bitmap_page;
pub mod btree_page_layout;
pub mod disk_meta_page;
pub mod index_roots_page;
pub mod page;
pub mod page_guard;
