use std::collections::{HashMap, VecDeque};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::{
    errors::{Error, Result},
    storage::{
        disk::manager::DiskManager,
        page::{
            page::{zeroed_page, FrameId, PageData, PageId, INVALID_PAGE_ID},
            page_guard::{FrameGuard, ReadGuard, WriteGuard},
        },
    },
    utils::replacer::{LRUReplacer, Replacer},
};

/// Cache bookkeeping for one frame. Lives under the pool mutex.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
    // Freed on disk once the last pin is released
    pub delete_on_unpin: bool,
}

impl Default for FrameHeader {
    fn default() -> Self {
        FrameHeader {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            delete_on_unpin: false,
        }
    }
}

struct PoolState {
    headers: Vec<FrameHeader>,
    // Resident page -> frame holding it
    page_table: HashMap<PageId, FrameId>,
    // Frames holding no page, consulted before the replacer
    free_frames: VecDeque<FrameId>,
    replacer: LRUReplacer<FrameId>,
}

/// Fixed-size page cache over a [`DiskManager`].
///
/// Frame metadata, the page table, the free list and the replacer share one
/// mutex, so pin counts always change together with the page table. Page
/// bytes are behind a per-frame latch that is only ever taken while the frame
/// is pinned, or under the pool mutex for a frame nobody has pinned.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<RwLock<Box<PageData>>>,
    state: Mutex<PoolState>,
    disk_manager: Mutex<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        let frames = (0..pool_size).map(|_| RwLock::new(zeroed_page())).collect();

        // The maximum amount of frames are all allocated at once
        let state = PoolState {
            headers: vec![FrameHeader::default(); pool_size],
            page_table: HashMap::with_capacity(pool_size),
            free_frames: (0..pool_size).collect(),
            replacer: LRUReplacer::new(pool_size),
        };

        BufferPoolManager {
            pool_size,
            frames,
            state: Mutex::new(state),
            disk_manager: Mutex::new(disk_manager),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub(crate) fn frame_latch(&self, frame_id: FrameId) -> &RwLock<Box<PageData>> {
        &self.frames[frame_id]
    }

    /// Pins `page_id`, reading it from disk if it is not cached.
    pub fn fetch_page(&self, page_id: PageId) -> Result<FrameGuard<'_>> {
        if page_id == INVALID_PAGE_ID {
            return Err(Error::Corrupted("fetch of the invalid page id".to_string()));
        }

        let mut state = self.state.lock();
        let state = &mut *state;

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.headers[frame_id].pin_count += 1;
            state.replacer.pin(frame_id);
            return Ok(FrameGuard::new(self, page_id, frame_id));
        }

        let frame_id = self.acquire_frame(state)?;
        {
            let mut data = self.frames[frame_id].write();
            if let Err(err) = self.disk_manager.lock().read_page(page_id, &mut data[..]) {
                state.free_frames.push_back(frame_id);
                return Err(err);
            }
        }

        state.page_table.insert(page_id, frame_id);
        state.headers[frame_id] = FrameHeader {
            page_id,
            pin_count: 1,
            is_dirty: false,
            delete_on_unpin: false,
        };
        trace!(page_id, frame_id, "page read into frame");
        Ok(FrameGuard::new(self, page_id, frame_id))
    }

    pub fn read_page(&self, page_id: PageId) -> Result<ReadGuard<'_>> {
        Ok(self.fetch_page(page_id)?.upgrade_read())
    }

    pub fn write_page(&self, page_id: PageId) -> Result<WriteGuard<'_>> {
        Ok(self.fetch_page(page_id)?.upgrade_write())
    }

    /// Allocates a fresh page on disk and pins it in a zeroed frame.
    pub fn new_page(&self) -> Result<FrameGuard<'_>> {
        let mut state = self.state.lock();
        let state = &mut *state;

        let frame_id = self.acquire_frame(state)?;
        let page_id = match self.disk_manager.lock().allocate_page() {
            Ok(page_id) => page_id,
            Err(err) => {
                state.free_frames.push_back(frame_id);
                return Err(err);
            }
        };

        self.frames[frame_id].write().fill(0);
        state.page_table.insert(page_id, frame_id);
        // Dirty from the start so the initialized bytes reach disk even if
        // the previous owner of this page id left something behind
        state.headers[frame_id] = FrameHeader {
            page_id,
            pin_count: 1,
            is_dirty: true,
            delete_on_unpin: false,
        };
        debug!(page_id, frame_id, "new page");
        Ok(FrameGuard::new(self, page_id, frame_id))
    }

    /// Drops one pin. Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let state = &mut *state;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let header = &mut state.headers[frame_id];
        if header.pin_count == 0 {
            warn!(page_id, frame_id, "unpin of a page that is not pinned");
            return false;
        }

        header.is_dirty |= is_dirty;
        header.pin_count -= 1;
        if header.pin_count > 0 {
            return true;
        }
        if !header.delete_on_unpin {
            state.replacer.unpin(frame_id);
            return true;
        }

        state.page_table.remove(&page_id);
        state.headers[frame_id] = FrameHeader::default();
        state.free_frames.push_back(frame_id);
        match self.disk_manager.lock().deallocate_page(page_id) {
            Ok(()) => debug!(page_id, "deleted page on last unpin"),
            Err(err) => error!(page_id, %err, "failed to free page on last unpin"),
        }
        true
    }

    /// Writes a resident page back to disk and clears its dirty flag.
    /// Returns false if the page is not cached. The frame keeps its place in
    /// the replacer.
    ///
    /// The calling thread must not hold a write latch on the page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame_id = {
            let mut state = self.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };

            // Unpinned frames cannot be latched by anyone else, so the write
            // happens under the pool mutex without pinning
            if state.headers[frame_id].pin_count == 0 {
                let data = self.frames[frame_id].read();
                self.disk_manager.lock().write_page(page_id, &data[..])?;
                state.headers[frame_id].is_dirty = false;
                trace!(page_id, frame_id, "flushed idle page");
                return Ok(true);
            }

            // Already pinned, hence not tracked by the replacer
            state.headers[frame_id].pin_count += 1;
            frame_id
        };
        let frame = FrameGuard::new(self, page_id, frame_id);

        let data = frame.read();
        self.disk_manager.lock().write_page(page_id, &data[..])?;
        // Cleared under the latch so a concurrent writer's dirty bit is kept
        self.state.lock().headers[frame_id].is_dirty = false;
        drop(data);

        trace!(page_id, frame_id, "flushed page");
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drops a page from the cache and frees it on disk.
    ///
    /// Returns `Ok(false)` without doing anything while the page is pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        self.delete(page_id, false)
    }

    /// Like [`delete_page`](Self::delete_page), but a pinned page is marked
    /// and freed when its last pin is released. Returns true if the page was
    /// freed right away.
    pub fn delete_page_on_unpin(&self, page_id: PageId) -> Result<bool> {
        self.delete(page_id, true)
    }

    fn delete(&self, page_id: PageId, defer: bool) -> Result<bool> {
        let mut state = self.state.lock();
        let state = &mut *state;

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let pin_count = state.headers[frame_id].pin_count;
            if pin_count > 0 && defer {
                state.headers[frame_id].delete_on_unpin = true;
                debug!(page_id, pin_count, "page will be deleted on last unpin");
                return Ok(false);
            }
            if pin_count > 0 {
                warn!(page_id, pin_count, "refusing to delete a pinned page");
                return Ok(false);
            }
            state.replacer.pin(frame_id);
            state.page_table.remove(&page_id);
            state.headers[frame_id] = FrameHeader::default();
            state.free_frames.push_back(frame_id);
        }

        self.disk_manager.lock().deallocate_page(page_id)?;
        debug!(page_id, "deleted page");
        Ok(true)
    }

    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        self.disk_manager.lock().is_page_free(page_id)
    }

    pub fn num_allocated_pages(&self) -> u32 {
        self.disk_manager.lock().num_allocated_pages()
    }

    /// Pin count of a resident page, `None` if it is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| state.headers[*frame_id].pin_count)
    }

    /// True when no frame is pinned. Logs every frame that still is.
    pub fn check_all_unpinned(&self) -> bool {
        let state = self.state.lock();
        let mut all_unpinned = true;
        for (frame_id, header) in state.headers.iter().enumerate() {
            if header.pin_count > 0 {
                error!(
                    page_id = header.page_id,
                    frame_id,
                    pin_count = header.pin_count,
                    "page left pinned"
                );
                all_unpinned = false;
            }
        }
        all_unpinned
    }

    /// Free list first, then the replacer. A dirty victim is written back
    /// before its frame is handed out.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_frames.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.victim() else {
            warn!(pool_size = self.pool_size, "buffer pool exhausted");
            return Err(Error::BufferPoolExhausted);
        };

        let victim = state.headers[frame_id];
        if victim.is_dirty {
            let data = self.frames[frame_id].read();
            if let Err(err) = self.disk_manager.lock().write_page(victim.page_id, &data[..]) {
                state.replacer.unpin(frame_id);
                return Err(err);
            }
            debug!(page_id = victim.page_id, frame_id, "wrote back dirty victim");
        }

        state.page_table.remove(&victim.page_id);
        state.headers[frame_id] = FrameHeader::default();
        trace!(page_id = victim.page_id, frame_id, "evicted page");
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all_pages() {
            error!(%err, "failed to flush buffer pool on shutdown");
        }
    }
}
