#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use crate::{
        config::StorageOptions,
        engine::StorageEngine,
        errors::Error,
        index::key_manager::DataType,
        storage::page::page::page_constants::{CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID},
        tests::{bigint_schema, key, row_id, small_node_options, Fixture},
    };

    #[test]
    fn fresh_file_reserves_catalog_and_roots_pages() -> anyhow::Result<()> {
        let fixture = Fixture::new(StorageOptions::default())?;
        let bpm = fixture.engine.buffer_pool();

        assert!(!bpm.is_page_free(CATALOG_META_PAGE_ID)?);
        assert!(!bpm.is_page_free(INDEX_ROOTS_PAGE_ID)?);
        assert!(fixture.engine.registered_indexes()?.is_empty());
        assert!(bpm.check_all_unpinned());

        // First tree page comes after the reserved ones
        let index = fixture.engine.open_index(1, bigint_schema())?;
        index.insert(&key(&index, 1), row_id(1))?;
        assert_eq!(2, index.root_page_id());
        assert_eq!(vec![(1, 2)], fixture.engine.registered_indexes()?);
        Ok(())
    }

    #[test]
    fn indexes_share_one_file() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(32))?;
        let orders = fixture.engine.open_index(10, bigint_schema())?;
        let users = fixture.engine.open_index(20, bigint_schema())?;

        for k in 0..50 {
            orders.insert(&key(&orders, k), row_id(k))?;
            users.insert(&key(&users, k * 3), row_id(k + 1000))?;
        }
        assert_eq!(Some(row_id(7)), orders.get_value(&key(&orders, 7))?);
        assert_eq!(Some(row_id(1007)), users.get_value(&key(&users, 21))?);
        assert_eq!(None, orders.get_value(&key(&orders, 60))?);
        assert!(orders.check()? && users.check()?);

        let mut registered: Vec<u32> = fixture
            .engine
            .registered_indexes()?
            .into_iter()
            .map(|(index_id, _)| index_id)
            .collect();
        registered.sort();
        assert_eq!(vec![10, 20], registered);

        drop(orders);
        fixture.engine.drop_index(10)?;
        let remaining: Vec<u32> = fixture
            .engine
            .registered_indexes()?
            .into_iter()
            .map(|(index_id, _)| index_id)
            .collect();
        assert_eq!(vec![20], remaining);
        assert_eq!(Some(row_id(1000)), users.get_value(&key(&users, 0))?);
        Ok(())
    }

    #[test]
    fn open_index_hands_out_one_tree_per_id() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(8))?;
        let first = fixture.engine.open_index(5, bigint_schema())?;
        let second = fixture.engine.open_index(5, bigint_schema())?;
        assert!(Arc::ptr_eq(&first, &second));

        assert!(matches!(
            fixture.engine.open_index(5, vec![DataType::Int]),
            Err(Error::KeySchema(_))
        ));
        assert!(matches!(
            fixture.engine.open_index(6, vec![DataType::Char(64)]),
            Err(Error::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn dropping_an_index_from_a_previous_session() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(16))?;
        let path = fixture.db_path();
        {
            let engine = &fixture.engine;
            let index = engine.open_index(3, bigint_schema())?;
            for k in 0..30 {
                index.insert(&key(&index, k), row_id(k))?;
            }
            engine.flush()?;
        }
        let Fixture { engine, dir } = fixture;
        drop(engine);

        let engine = StorageEngine::open(&path, small_node_options(16))?;
        assert_eq!(1, engine.registered_indexes()?.len());
        engine.drop_index(3)?;
        assert!(engine.registered_indexes()?.is_empty());
        assert!(engine.buffer_pool().check_all_unpinned());

        // Tree pages went back to the allocator
        let index = engine.open_index(3, bigint_schema())?;
        index.insert(&key(&index, 1), row_id(1))?;
        assert_eq!(2, index.root_page_id());

        drop(index);
        drop(engine);
        drop(dir);
        Ok(())
    }

    #[test]
    fn invalid_options_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = StorageEngine::open(
            dir.path().join("bad.db"),
            StorageOptions::new().pool_size(0),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        Ok(())
    }
}
