#[cfg(test)]
pub mod test {
    use std::{cmp::Ordering, collections::HashSet, thread};

    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    use crate::{
        index::node_type::GenericKey,
        iterators::iterator::StorageIterator,
        tests::{bigint_schema, key, row_id, small_node_options, Fixture},
    };

    #[test]
    fn empty_tree_begins_at_end() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(8))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;

        let iter = index.begin()?;
        assert!(!iter.is_valid());
        assert!(iter == index.end());
        assert!(index.begin_at(&key(&index, 3))? == index.end());
        Ok(())
    }

    #[test]
    fn leaf_iterator_test() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(16))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;

        let mut keys: Vec<i64> = (0..100).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(11));
        for k in keys {
            index.insert(&key(&index, k), row_id(k))?;
        }

        let mut iter = index.begin()?;
        let mut expected = 0;
        while iter.is_valid() {
            let (k, value) = iter.value().expect("valid iterator has a value");
            assert_eq!(key(&index, expected), k);
            assert_eq!(row_id(expected), value);
            iter.advance()?;
            expected += 1;
        }
        assert_eq!(100, expected);
        assert!(iter == index.end());
        assert_eq!(None, iter.value());

        // Advancing past the end stays there
        iter.advance()?;
        assert!(iter.is_end());
        drop(iter);

        assert!(index.check()?);
        Ok(())
    }

    #[test]
    fn begin_at_seeks_first_key_not_less() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(16))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;

        for k in (0..60).map(|k| k * 2) {
            index.insert(&key(&index, k), row_id(k))?;
        }

        let from_present: Vec<i64> = index
            .begin_at(&key(&index, 40))?
            .take(3)
            .map(|entry| entry.map(|(_, value)| value.get() as i64))
            .collect::<Result<_, _>>()?;
        let expected: Vec<i64> = [40, 42, 44].iter().map(|k| row_id(*k).get() as i64).collect();
        assert_eq!(expected, from_present);

        // Every odd key lands on its even successor, across leaf boundaries too
        for k in (0..59).map(|k| k * 2 + 1) {
            let iter = index.begin_at(&key(&index, k))?;
            let (found, _) = iter.value().expect("successor exists");
            assert_eq!(key(&index, k + 1), found);
        }

        assert!(index.begin_at(&key(&index, 119))? == index.end());
        assert!(index.begin_at(&key(&index, -5))? == index.begin()?);
        assert_eq!(60, index.begin_at(&key(&index, -5))?.count());
        Ok(())
    }

    #[test]
    fn iterator_keeps_only_one_pin() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(16))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;
        for k in 0..40 {
            index.insert(&key(&index, k), row_id(k))?;
        }

        let bpm = index.buffer_pool();
        let mut iter = index.begin()?;
        for _ in 0..10 {
            iter.advance()?;
        }
        assert_eq!(Some(1), bpm.pin_count(iter.page_id()));
        assert!(!index.check()?);

        drop(iter);
        assert!(index.check()?);
        Ok(())
    }

    #[test]
    fn writers_proceed_while_an_iterator_is_open() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(32))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;
        for k in 0..20 {
            index.insert(&key(&index, k * 10), row_id(k * 10))?;
        }

        let mut iter = index.begin()?;
        iter.advance()?;
        assert_eq!(Some(&key(&index, 10)), iter.key());

        // Fill every gap, then drop a run of keys ahead of the iterator and
        // the key it stands on
        for k in 0..20 {
            index.insert(&key(&index, k * 10 + 5), row_id(k * 10 + 5))?;
        }
        for k in (60..=90).step_by(5) {
            assert!(index.remove(&key(&index, k))?);
        }
        assert!(index.remove(&key(&index, 10))?);

        let scanned: Vec<GenericKey> = iter
            .map(|entry| entry.map(|(k, _)| k))
            .collect::<Result<_, _>>()?;
        let expected: Vec<GenericKey> = std::iter::once(10)
            .chain((15..=195).step_by(5).filter(|k| !(60..=90).contains(k)))
            .map(|k| key(&index, k))
            .collect();
        assert_eq!(expected, scanned);
        assert!(index.check()?);
        Ok(())
    }

    #[test]
    fn removing_each_visited_key() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(32))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;
        for k in 0..100 {
            index.insert(&key(&index, k), row_id(k))?;
        }

        let mut visited = Vec::new();
        for entry in index.begin()? {
            let (k, value) = entry?;
            assert!(index.remove(&k)?);
            visited.push((k, value));
        }

        let expected: Vec<_> = (0..100).map(|k| (key(&index, k), row_id(k))).collect();
        assert_eq!(expected, visited);
        assert!(index.is_empty());
        assert!(index.check()?);
        Ok(())
    }

    #[test]
    fn merged_leaf_is_freed_when_the_iterator_lets_go() -> anyhow::Result<()> {
        let fixture = Fixture::new(small_node_options(32))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;
        let bpm = index.buffer_pool();
        // Only the catalog and index roots pages
        let reserved = bpm.num_allocated_pages();

        for k in 0..20 {
            index.insert(&key(&index, k), row_id(k))?;
        }
        let iter = index.begin_at(&key(&index, 10))?;
        let pinned_leaf = iter.page_id();
        for k in 0..20 {
            assert!(index.remove(&key(&index, k))?);
        }
        assert!(index.is_empty());
        assert!(!bpm.is_page_free(pinned_leaf)?);

        drop(iter);
        assert!(bpm.is_page_free(pinned_leaf)?);
        assert_eq!(reserved, bpm.num_allocated_pages());
        assert!(index.check()?);
        Ok(())
    }

    #[test]
    fn scanners_see_every_untouched_key() -> anyhow::Result<()> {
        const WRITERS: i64 = 3;
        const SCANNERS: usize = 4;
        const KEYS: i64 = 600;

        let fixture = Fixture::new(small_node_options(256))?;
        let index = fixture.engine.open_index(1, bigint_schema())?;
        // Even keys stay put, writers churn the odd ones
        for k in (0..KEYS).step_by(2) {
            index.insert(&key(&index, k), row_id(k))?;
        }
        let stable: HashSet<GenericKey> =
            (0..KEYS).step_by(2).map(|k| key(&index, k)).collect();

        thread::scope(|scope| {
            for writer in 0..WRITERS {
                let index = &index;
                scope.spawn(move || {
                    let owned: Vec<i64> = (1..KEYS)
                        .step_by(2)
                        .filter(|k| (k / 2) % WRITERS == writer)
                        .collect();
                    for _ in 0..10 {
                        for k in &owned {
                            assert!(index.insert(&key(index, *k), row_id(*k)).unwrap());
                        }
                        for k in &owned {
                            assert!(index.remove(&key(index, *k)).unwrap());
                        }
                    }
                });
            }
            for _ in 0..SCANNERS {
                let index = &index;
                let stable = &stable;
                scope.spawn(move || {
                    let key_manager = index.key_manager();
                    for _ in 0..10 {
                        let scanned: Vec<GenericKey> = index
                            .begin()
                            .unwrap()
                            .map(|entry| entry.map(|(k, _)| k))
                            .collect::<Result<_, _>>()
                            .unwrap();
                        assert!(scanned
                            .windows(2)
                            .all(|pair| key_manager.compare_keys(&pair[0], &pair[1])
                                == Ordering::Less));
                        let seen = scanned.iter().filter(|k| stable.contains(*k)).count();
                        assert_eq!(stable.len(), seen);
                    }
                });
            }
        });

        let remaining: Vec<GenericKey> = index
            .begin()?
            .map(|entry| entry.map(|(k, _)| k))
            .collect::<Result<_, _>>()?;
        assert_eq!(stable.len(), remaining.len());
        assert!(index.check()?);
        Ok(())
    }
}
