pub mod b_tree_iterator;
pub mod iterator;
