use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::buffer_pool_manager::BufferPoolManager;

use super::page::{FrameId, PageData, PageId};

/// A pinned page without a latch. Dropping it unpins the page.
///
/// Holding a `FrameGuard` keeps the frame from being evicted but says nothing
/// about the page contents; take a latch through [`FrameGuard::read`] or
/// upgrade into a [`ReadGuard`]/[`WriteGuard`] before touching the bytes.
pub struct FrameGuard<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    frame_id: FrameId,
    is_dirty: bool,
}

impl<'a> FrameGuard<'a> {
    /// The frame must already be pinned on behalf of this guard.
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame_id: FrameId) -> Self {
        FrameGuard {
            bpm,
            page_id,
            frame_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Short lived shared latch over the page bytes.
    pub fn read(&self) -> RwLockReadGuard<'a, Box<PageData>> {
        self.bpm.frame_latch(self.frame_id).read()
    }

    pub fn upgrade_read(self) -> ReadGuard<'a> {
        let latch = self.bpm.frame_latch(self.frame_id).read();
        ReadGuard { latch, frame: self }
    }

    pub fn upgrade_write(self) -> WriteGuard<'a> {
        let latch = self.bpm.frame_latch(self.frame_id).write();
        WriteGuard { latch, frame: self }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// Pinned and share-latched. Fields drop in order, so the latch is released
/// before the pin.
pub struct ReadGuard<'a> {
    latch: RwLockReadGuard<'a, Box<PageData>>,
    frame: FrameGuard<'a>,
}

impl<'a> ReadGuard<'a> {
    pub fn page_id(&self) -> PageId {
        self.frame.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }

    /// Releases the latch but keeps the page pinned.
    pub fn into_frame(self) -> FrameGuard<'a> {
        let ReadGuard { latch, frame } = self;
        drop(latch);
        frame
    }
}

/// Pinned and exclusively latched. Mutable access marks the page dirty.
pub struct WriteGuard<'a> {
    latch: RwLockWriteGuard<'a, Box<PageData>>,
    frame: FrameGuard<'a>,
}

impl WriteGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.frame.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.frame.is_dirty = true;
        &mut self.latch[..]
    }
}
