#[cfg(test)]
pub mod test {
    use std::thread;

    use byteorder::{ByteOrder, LittleEndian};

    use crate::{
        buffer::buffer_pool_manager::BufferPoolManager,
        errors::Error,
        storage::disk::manager::DiskManager,
    };

    fn pool(dir: &tempfile::TempDir, pool_size: usize) -> anyhow::Result<BufferPoolManager> {
        let disk_manager = DiskManager::open(dir.path().join("pool.db"))?;
        Ok(BufferPoolManager::new(pool_size, disk_manager))
    }

    #[test]
    fn exhausted_pool_recovers_after_unpin() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 3)?;

        let mut guards = Vec::new();
        for expected in 0..3 {
            let guard = bpm.new_page()?;
            assert_eq!(expected, guard.page_id());
            guards.push(guard);
        }
        assert!(matches!(bpm.new_page(), Err(Error::BufferPoolExhausted)));
        assert!(matches!(bpm.fetch_page(0), Ok(_)));

        guards.remove(1);
        let guard = bpm.new_page()?;
        assert_eq!(3, guard.page_id());
        assert_eq!(None, bpm.pin_count(1));
        Ok(())
    }

    #[test]
    fn dirty_pages_survive_eviction() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 2)?;

        let page_id = {
            let mut guard = bpm.new_page()?.upgrade_write();
            guard.data_mut()[..5].copy_from_slice(b"cairn");
            guard.page_id()
        };

        // Two more pages push the first one out of a two frame pool
        for _ in 0..2 {
            let mut guard = bpm.new_page()?.upgrade_write();
            guard.data_mut()[0] = 0xFF;
        }
        assert_eq!(None, bpm.pin_count(page_id));

        let guard = bpm.read_page(page_id)?;
        assert_eq!(b"cairn", &guard.data()[..5]);
        Ok(())
    }

    #[test]
    fn pin_counts_follow_guards() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 4)?;

        let page_id = bpm.new_page()?.page_id();
        assert_eq!(Some(0), bpm.pin_count(page_id));
        assert!(bpm.check_all_unpinned());

        let first = bpm.fetch_page(page_id)?;
        let second = bpm.read_page(page_id)?;
        assert_eq!(Some(2), bpm.pin_count(page_id));
        assert!(!bpm.check_all_unpinned());

        drop(second);
        drop(first);
        assert_eq!(Some(0), bpm.pin_count(page_id));
        assert!(!bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(99, false));
        assert!(bpm.check_all_unpinned());
        Ok(())
    }

    #[test]
    fn pinned_pages_cannot_be_deleted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 4)?;

        let guard = bpm.new_page()?;
        let page_id = guard.page_id();
        assert!(!bpm.delete_page(page_id)?);
        assert!(!bpm.is_page_free(page_id)?);

        drop(guard);
        assert!(bpm.delete_page(page_id)?);
        assert!(bpm.is_page_free(page_id)?);
        assert_eq!(None, bpm.pin_count(page_id));

        // The freed id is handed out again
        assert_eq!(page_id, bpm.new_page()?.page_id());
        Ok(())
    }

    #[test]
    fn pinned_page_is_freed_on_last_unpin() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 4)?;

        let first = bpm.new_page()?;
        let page_id = first.page_id();
        let second = bpm.fetch_page(page_id)?;
        assert!(!bpm.delete_page_on_unpin(page_id)?);
        assert_eq!(1, bpm.num_allocated_pages());

        drop(first);
        assert!(!bpm.is_page_free(page_id)?);
        drop(second);
        assert!(bpm.is_page_free(page_id)?);
        assert_eq!(None, bpm.pin_count(page_id));
        assert_eq!(0, bpm.num_allocated_pages());

        // Unpinned pages go right away
        let page_id = bpm.new_page()?.page_id();
        assert!(bpm.delete_page_on_unpin(page_id)?);
        assert!(bpm.is_page_free(page_id)?);
        assert!(bpm.check_all_unpinned());
        Ok(())
    }

    #[test]
    fn flushing_keeps_eviction_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 3)?;

        // Unpinned in order 0, 1, 2
        for expected in 0..3 {
            assert_eq!(expected, bpm.new_page()?.page_id());
        }
        assert!(bpm.flush_page(0)?);
        bpm.flush_all_pages()?;

        let guard = bpm.new_page()?;
        assert_eq!(None, bpm.pin_count(0));
        assert_eq!(Some(0), bpm.pin_count(1));
        assert_eq!(Some(0), bpm.pin_count(2));
        drop(guard);

        // Flushing a pinned page leaves it out of the replacer until released
        let pinned = bpm.fetch_page(1)?;
        assert!(bpm.flush_page(1)?);
        assert_eq!(Some(1), bpm.pin_count(1));
        let _ = bpm.new_page()?;
        assert_eq!(None, bpm.pin_count(2));
        assert_eq!(Some(1), bpm.pin_count(1));
        drop(pinned);
        Ok(())
    }

    #[test]
    fn flushed_pages_reach_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let page_id = {
            let bpm = pool(&dir, 4)?;
            let mut guard = bpm.new_page()?.upgrade_write();
            LittleEndian::write_u64(guard.data_mut(), 0xDEAD_BEEF);
            let page_id = guard.page_id();
            drop(guard);

            assert!(bpm.flush_page(page_id)?);
            assert!(!bpm.flush_page(1234)?);
            bpm.flush_all_pages()?;
            page_id
        };

        let bpm = pool(&dir, 4)?;
        let guard = bpm.read_page(page_id)?;
        assert_eq!(0xDEAD_BEEF, LittleEndian::read_u64(guard.data()));
        Ok(())
    }

    #[test]
    fn concurrent_writers_serialize_on_the_page_latch() -> anyhow::Result<()> {
        const THREADS: u64 = 8;
        const ROUNDS: u64 = 200;

        let dir = tempfile::tempdir()?;
        let bpm = pool(&dir, 4)?;
        let page_id = bpm.new_page()?.page_id();

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..ROUNDS {
                        let mut guard = bpm.write_page(page_id).unwrap();
                        let data = guard.data_mut();
                        let counter = LittleEndian::read_u64(data);
                        LittleEndian::write_u64(data, counter + 1);
                    }
                });
            }
        });

        let guard = bpm.read_page(page_id)?;
        assert_eq!(THREADS * ROUNDS, LittleEndian::read_u64(guard.data()));
        drop(guard);
        assert!(bpm.check_all_unpinned());
        Ok(())
    }
}
