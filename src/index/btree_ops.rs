use std::cmp::Ordering;

use tracing::error;

use crate::{
    errors::Result,
    storage::page::{
        b_plus_tree_page::{BTreeNode, TreeNode},
        page::{PageId, INVALID_PAGE_ID},
    },
};

use super::{btree::BPlusTree, node_type::GenericKey};

/// State carried across the structural walk of [`BPlusTree::check`].
#[derive(Default)]
struct CheckWalk {
    leaf_depth: Option<usize>,
    // (leaf, its next link) in key order
    leaves: Vec<(PageId, PageId)>,
}

/// Child page with the key range its subtree must stay within.
struct Subtree {
    page_id: PageId,
    lower: Option<GenericKey>,
    upper: Option<GenericKey>,
}

impl BPlusTree {
    /// Validates the whole tree and that no page is left pinned.
    ///
    /// Every violation is logged; the result is `false` if any was found.
    pub fn check(&self) -> Result<bool> {
        let structure_ok = {
            let root = self.latch_shared();
            if *root == INVALID_PAGE_ID {
                true
            } else {
                let mut walk = CheckWalk::default();
                let subtree = Subtree {
                    page_id: *root,
                    lower: None,
                    upper: None,
                };
                let nodes_ok = self.check_subtree(subtree, INVALID_PAGE_ID, 0, &mut walk)?;
                nodes_ok && check_leaf_chain(&walk.leaves)
            }
        };
        let unpinned = self.buffer_pool().check_all_unpinned();
        Ok(structure_ok && unpinned)
    }

    fn check_subtree(
        &self,
        subtree: Subtree,
        expected_parent: PageId,
        depth: usize,
        walk: &mut CheckWalk,
    ) -> Result<bool> {
        let key_manager = self.key_manager();
        let page_id = subtree.page_id;
        let mut ok = true;

        let children = {
            let guard = self.buffer_pool().read_page(page_id)?;
            let node = BTreeNode::decode(guard.data())?;
            let size = node.size();

            if node.page_id() != page_id {
                error!(page_id, stored = node.page_id(), "page id mismatch");
                ok = false;
            }
            if node.parent_page_id() != expected_parent {
                error!(
                    page_id,
                    parent = node.parent_page_id(),
                    expected_parent,
                    "wrong parent pointer"
                );
                ok = false;
            }

            let (first_key, root_floor) = if node.is_leaf_page() { (0, 1) } else { (1, 2) };
            if expected_parent == INVALID_PAGE_ID {
                if size < root_floor {
                    error!(page_id, size, "root page is underfull");
                    ok = false;
                }
            } else if size < node.min_size() || size >= node.max_size() {
                error!(
                    page_id,
                    size,
                    min_size = node.min_size(),
                    max_size = node.max_size(),
                    "page occupancy out of bounds"
                );
                ok = false;
            }

            let keys: Vec<&[u8]> = (first_key..size).map(|i| node.key_at(i)).collect();
            if keys
                .windows(2)
                .any(|pair| key_manager.compare_keys(pair[0], pair[1]) != Ordering::Less)
            {
                error!(page_id, "keys out of order");
                ok = false;
            }
            if let (Some(lower), Some(first)) = (&subtree.lower, keys.first()) {
                if key_manager.compare_keys(first, lower) == Ordering::Less {
                    error!(
                        page_id,
                        key = %key_manager.display_key(first),
                        lower = %key_manager.display_key(lower),
                        "key below separator"
                    );
                    ok = false;
                }
            }
            if let (Some(upper), Some(last)) = (&subtree.upper, keys.last()) {
                if key_manager.compare_keys(last, upper) != Ordering::Less {
                    error!(
                        page_id,
                        key = %key_manager.display_key(last),
                        upper = %key_manager.display_key(upper),
                        "key at or above next separator"
                    );
                    ok = false;
                }
            }

            match &node {
                BTreeNode::Leaf(leaf) => {
                    match walk.leaf_depth {
                        None => walk.leaf_depth = Some(depth),
                        Some(leaf_depth) if leaf_depth != depth => {
                            error!(page_id, depth, leaf_depth, "leaves at different depths");
                            ok = false;
                        }
                        Some(_) => {}
                    }
                    walk.leaves.push((page_id, leaf.next_page_id()));
                    Vec::new()
                }
                BTreeNode::Internal(inner) => (0..size)
                    .map(|i| Subtree {
                        page_id: inner.value_at(i),
                        lower: if i == 0 {
                            subtree.lower.clone()
                        } else {
                            Some(GenericKey::from_bytes(inner.key_at(i)))
                        },
                        upper: if i + 1 < size {
                            Some(GenericKey::from_bytes(inner.key_at(i + 1)))
                        } else {
                            subtree.upper.clone()
                        },
                    })
                    .collect(),
            }
        };

        for child in children {
            ok &= self.check_subtree(child, page_id, depth + 1, walk)?;
        }
        Ok(ok)
    }

    /// Graphviz rendering: one record per page, solid edges to children and
    /// dashed edges along the leaf chain.
    pub fn to_dot(&self) -> Result<String> {
        let root = self.latch_shared();
        let mut out = String::from("digraph bplustree {\n    node [shape=record];\n");
        if *root != INVALID_PAGE_ID {
            self.dot_subtree(*root, &mut out)?;
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn dot_subtree(&self, page_id: PageId, out: &mut String) -> Result<()> {
        let key_manager = self.key_manager();
        let (children, next_link) = {
            let guard = self.buffer_pool().read_page(page_id)?;
            let node = BTreeNode::decode(guard.data())?;
            let (kind, first_key, next_link) = match &node {
                BTreeNode::Leaf(leaf) => ("leaf", 0, leaf.next_page_id()),
                BTreeNode::Internal(_) => ("internal", 1, INVALID_PAGE_ID),
            };
            let keys: Vec<String> = (first_key..node.size())
                .map(|i| escape_label(&key_manager.display_key(node.key_at(i))))
                .collect();
            out.push_str(&format!(
                "    page{} [label=\"{} {}|{}\"];\n",
                page_id,
                kind,
                page_id,
                keys.join("|")
            ));
            (node.children(), next_link)
        };

        for child in children {
            out.push_str(&format!("    page{} -> page{};\n", page_id, child));
            self.dot_subtree(child, out)?;
        }
        if next_link != INVALID_PAGE_ID {
            out.push_str(&format!(
                "    page{} -> page{} [style=dashed];\n",
                page_id, next_link
            ));
        }
        Ok(())
    }

    /// Level by level dump, one line per depth: `level 0: [page: keys]`.
    pub fn print_tree(&self) -> Result<String> {
        let root = self.latch_shared();
        if *root == INVALID_PAGE_ID {
            return Ok("(empty)\n".to_string());
        }

        let key_manager = self.key_manager();
        let mut out = String::new();
        let mut level = vec![*root];
        let mut depth = 0;
        while !level.is_empty() {
            out.push_str(&format!("level {}:", depth));
            let mut next_level = Vec::new();
            for page_id in level {
                let guard = self.buffer_pool().read_page(page_id)?;
                let node = BTreeNode::decode(guard.data())?;
                let first_key = if node.is_leaf_page() { 0 } else { 1 };
                let keys: Vec<String> = (first_key..node.size())
                    .map(|i| key_manager.display_key(node.key_at(i)))
                    .collect();
                out.push_str(&format!(" [{}: {}]", page_id, keys.join(" ")));
                next_level.extend(node.children());
            }
            out.push('\n');
            level = next_level;
            depth += 1;
        }
        Ok(out)
    }
}

fn check_leaf_chain(leaves: &[(PageId, PageId)]) -> bool {
    let mut ok = true;
    for (i, (page_id, next_link)) in leaves.iter().enumerate() {
        let expected = leaves.get(i + 1).map_or(INVALID_PAGE_ID, |(next, _)| *next);
        if *next_link != expected {
            error!(
                page_id = *page_id,
                next_link = *next_link,
                expected,
                "leaf chain out of order"
            );
            ok = false;
        }
    }
    ok
}

fn escape_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '"' | '|' | '{' | '}' | '<' | '>' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
