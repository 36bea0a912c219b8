use std::{
    fs::{create_dir_all, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, error};

use crate::{
    errors::{Error, Result},
    storage::page::{
        bitmap_page::{BitmapPage, BITMAP_SIZE},
        disk_meta_page::{DiskFileMetaPage, MAX_EXTENTS},
        page::{page_constants::PAGE_SIZE, zeroed_page, PageData, PageId},
    },
};

// Physical page holding the allocation totals
const META_PAGE_ID: u64 = 0;

/// Owns the database file and the logical page id space on top of it.
///
/// Physical layout: page 0 is the meta page, then each extent is one bitmap
/// page followed by `BITMAP_SIZE` data pages. Callers only ever see logical
/// page ids; `map_page_id` translates them.
pub struct DiskManager {
    db_io: File,
    file_name: PathBuf,

    // Cached copy of physical page 0, written through on every change
    meta_data: Box<PageData>,
    closed: bool,
}

impl DiskManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut manager = DiskManager {
            db_io,
            file_name: path.to_path_buf(),
            meta_data: zeroed_page(),
            // Nothing to persist until the meta page is loaded
            closed: true,
        };

        let mut meta_data = zeroed_page();
        manager.read_physical_page(META_PAGE_ID, &mut meta_data[..])?;

        let mut meta = DiskFileMetaPage::new(&mut meta_data[..]);
        if meta.is_blank() {
            debug!(file = %path.display(), "initializing new database file");
            meta.init();
            manager.write_physical_page(META_PAGE_ID, &meta_data[..])?;
        } else if !meta.verify() {
            return Err(Error::Corrupted(format!(
                "meta page of {} failed verification",
                path.display()
            )));
        }

        manager.meta_data = meta_data;
        manager.closed = false;
        Ok(manager)
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn read_page(&self, logical_page_id: PageId, page_data: &mut [u8]) -> Result<()> {
        self.read_physical_page(Self::map_page_id(logical_page_id), page_data)
    }

    pub fn write_page(&self, logical_page_id: PageId, page_data: &[u8]) -> Result<()> {
        self.write_physical_page(Self::map_page_id(logical_page_id), page_data)
    }

    /// Hands out the lowest free page of the first extent with room.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let extent_id = {
            let meta = DiskFileMetaPage::new(&self.meta_data[..]);
            (0..MAX_EXTENTS)
                .find(|extent| (meta.extent_used_page(*extent) as usize) < BITMAP_SIZE)
                .ok_or(Error::DiskFull)?
        };

        let bitmap_page_id = Self::bitmap_physical_id(extent_id);
        let mut bitmap_data = zeroed_page();
        self.read_physical_page(bitmap_page_id, &mut bitmap_data[..])?;

        let page_offset = BitmapPage::new(&mut bitmap_data[..])
            .allocate_page()
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "extent {} reports free space but its bitmap is full",
                    extent_id
                ))
            })?;
        self.write_physical_page(bitmap_page_id, &bitmap_data[..])?;

        {
            let mut meta = DiskFileMetaPage::new(&mut self.meta_data[..]);
            meta.set_num_allocated_pages(meta.num_allocated_pages() + 1);
            meta.set_extent_used_page(extent_id, meta.extent_used_page(extent_id) + 1);
            if meta.num_extents() as usize <= extent_id {
                meta.set_num_extents(extent_id as u32 + 1);
            }
            meta.seal();
        }
        self.write_physical_page(META_PAGE_ID, &self.meta_data[..])?;

        let page_id = (extent_id * BITMAP_SIZE + page_offset) as PageId;
        debug!(page_id, extent_id, "allocated page");
        Ok(page_id)
    }

    /// Frees a logical page. Freeing a page that is not allocated is an error.
    pub fn deallocate_page(&mut self, logical_page_id: PageId) -> Result<()> {
        let (extent_id, page_offset) = Self::split_page_id(logical_page_id);
        if extent_id >= MAX_EXTENTS {
            return Err(Error::PageAlreadyFree { page_id: logical_page_id });
        }

        let bitmap_page_id = Self::bitmap_physical_id(extent_id);
        let mut bitmap_data = zeroed_page();
        self.read_physical_page(bitmap_page_id, &mut bitmap_data[..])?;

        if !BitmapPage::new(&mut bitmap_data[..]).deallocate_page(page_offset) {
            return Err(Error::PageAlreadyFree { page_id: logical_page_id });
        }
        self.write_physical_page(bitmap_page_id, &bitmap_data[..])?;

        {
            let mut meta = DiskFileMetaPage::new(&mut self.meta_data[..]);
            meta.set_num_allocated_pages(meta.num_allocated_pages().saturating_sub(1));
            meta.set_extent_used_page(
                extent_id,
                meta.extent_used_page(extent_id).saturating_sub(1),
            );
            meta.seal();
        }
        self.write_physical_page(META_PAGE_ID, &self.meta_data[..])?;

        debug!(page_id = logical_page_id, extent_id, "deallocated page");
        Ok(())
    }

    pub fn is_page_free(&self, logical_page_id: PageId) -> Result<bool> {
        let (extent_id, page_offset) = Self::split_page_id(logical_page_id);
        if extent_id >= MAX_EXTENTS {
            return Ok(true);
        }

        let mut bitmap_data = zeroed_page();
        self.read_physical_page(Self::bitmap_physical_id(extent_id), &mut bitmap_data[..])?;
        Ok(BitmapPage::new(&bitmap_data[..]).is_page_free(page_offset))
    }

    pub fn num_allocated_pages(&self) -> u32 {
        DiskFileMetaPage::new(&self.meta_data[..]).num_allocated_pages()
    }

    pub fn num_extents(&self) -> u32 {
        DiskFileMetaPage::new(&self.meta_data[..]).num_extents()
    }

    pub fn extent_used_pages(&self, extent_id: usize) -> u32 {
        DiskFileMetaPage::new(&self.meta_data[..]).extent_used_page(extent_id)
    }

    /// Logical id to physical page number: skips the meta page and one
    /// bitmap page per extent up to and including the page's own.
    pub fn map_page_id(logical_page_id: PageId) -> u64 {
        let id = logical_page_id as u64;
        id + id / BITMAP_SIZE as u64 + 2
    }

    fn bitmap_physical_id(extent_id: usize) -> u64 {
        (extent_id * (BITMAP_SIZE + 1) + 1) as u64
    }

    fn split_page_id(logical_page_id: PageId) -> (usize, usize) {
        let id = logical_page_id as usize;
        (id / BITMAP_SIZE, id % BITMAP_SIZE)
    }

    fn read_physical_page(&self, physical_page_id: u64, page_data: &mut [u8]) -> Result<()> {
        let offset = physical_page_id * PAGE_SIZE as u64;
        let file_len = self.db_io.metadata()?.len();

        // Lazily grown file: anything past the end reads back as zeroes
        if offset >= file_len {
            page_data.fill(0);
            return Ok(());
        }

        let available = ((file_len - offset) as usize).min(PAGE_SIZE);
        let mut db_io = &self.db_io;
        db_io.seek(SeekFrom::Start(offset))?;
        db_io.read_exact(&mut page_data[..available])?;
        page_data[available..].fill(0);
        Ok(())
    }

    fn write_physical_page(&self, physical_page_id: u64, page_data: &[u8]) -> Result<()> {
        let offset = physical_page_id * PAGE_SIZE as u64;
        let mut db_io = &self.db_io;
        db_io.seek(SeekFrom::Start(offset))?;
        db_io.write_all(&page_data[..PAGE_SIZE])?;
        db_io.flush()?;
        Ok(())
    }

    /// Persists the meta page and syncs the file. Safe to call twice.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.write_physical_page(META_PAGE_ID, &self.meta_data[..])?;
        self.db_io.sync_all()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(file = %self.file_name.display(), %err, "failed to close database file");
        }
    }
}
