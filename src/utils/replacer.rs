use std::hash::Hash;

use hashlink::LinkedHashSet;

/// Eviction policy over frame ids. Only unpinned frames are ever tracked.
pub trait Replacer<ID: Eq + Hash + Copy> {
    /// Removes and returns the frame to evict, if any is eligible.
    fn victim(&mut self) -> Option<ID>;
    /// The frame is in use again and must not be evicted.
    fn pin(&mut self, entry_id: ID);
    /// The frame became eligible for eviction.
    fn unpin(&mut self, entry_id: ID);
    fn size(&self) -> usize;
}

/// Least recently unpinned first.
///
/// Entries sit in unpin order, oldest at the front. Touching a frame that is
/// already tracked does not refresh its position; only a pin followed by a
/// new unpin does.
pub struct LRUReplacer<ID: Eq + Hash + Copy> {
    entries: LinkedHashSet<ID>,
}

impl<ID: Eq + Hash + Copy> LRUReplacer<ID> {
    pub fn new(capacity: usize) -> Self {
        LRUReplacer {
            entries: LinkedHashSet::with_capacity(capacity),
        }
    }
}

impl<ID: Eq + Hash + Copy> Replacer<ID> for LRUReplacer<ID> {
    fn victim(&mut self) -> Option<ID> {
        self.entries.pop_front()
    }

    fn pin(&mut self, entry_id: ID) {
        self.entries.remove(&entry_id);
    }

    fn unpin(&mut self, entry_id: ID) {
        if self.entries.contains(&entry_id) {
            return;
        }
        self.entries.insert(entry_id);
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
