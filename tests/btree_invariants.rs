//! Property-based checks for the paged B-tree's universal invariants.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use proptest::collection::vec;
use proptest::prelude::*;

use btreedb::block_device::InMemoryBlockDevice;
use btreedb::btree::BTree;
use btreedb::virtual_disk::VirtualDisk;

fn fresh_tree() -> BTree {
    let disk = Rc::new(RefCell::new(
        VirtualDisk::new(Box::new(InMemoryBlockDevice::new())).unwrap(),
    ));
    let root_id = disk.borrow_mut().allocate_page().unwrap();
    BTree::new(disk, root_id, "root").unwrap()
}

proptest! {
    /// Invariant 1 + 2: after inserting a set of distinct keys,
    /// `get_all()` is strictly sorted with no duplicates, and every
    /// key round-trips through `search`.
    #[test]
    fn sorted_traversal_and_search_round_trip(keys in vec(0u32..5000, 1..200)) {
        let mut tree = fresh_tree();
        let distinct: BTreeSet<u32> = keys.into_iter().collect();

        for key in &distinct {
            tree.insert(*key, &key.to_be_bytes()).unwrap();
        }

        let all = tree.get_all().unwrap();
        let seen: Vec<u32> = all.iter().map(|(k, _)| *k).collect();
        let expected: Vec<u32> = distinct.iter().copied().collect();
        prop_assert_eq!(seen, expected);

        for key in &distinct {
            prop_assert_eq!(tree.search(*key).unwrap(), Some(key.to_be_bytes().to_vec()));
        }
    }

    /// Invariant 3: deleting a key removes it from both `search` and
    /// `get_all()`, leaving every other key intact.
    #[test]
    fn delete_removes_only_the_target_key(
        keys in vec(0u32..2000, 2..100),
        remove_index in 0usize..2000,
    ) {
        let mut tree = fresh_tree();
        let distinct: Vec<u32> = {
            let set: BTreeSet<u32> = keys.into_iter().collect();
            set.into_iter().collect()
        };
        prop_assume!(!distinct.is_empty());

        for key in &distinct {
            tree.insert(*key, &key.to_be_bytes()).unwrap();
        }

        let target = distinct[remove_index % distinct.len()];
        tree.delete(target).unwrap();

        prop_assert_eq!(tree.search(target).unwrap(), None);
        let remaining: Vec<u32> = tree.get_all().unwrap().into_iter().map(|(k, _)| k).collect();
        prop_assert!(!remaining.contains(&target));
        prop_assert_eq!(remaining.len(), distinct.len() - 1);
    }

    /// Invariant 4: `get_max_key()` only advances on inserts of larger
    /// keys and never regresses when a smaller key is inserted later.
    #[test]
    fn max_key_is_monotonic(keys in vec(0u32..5000, 1..150)) {
        let mut tree = fresh_tree();
        let mut running_max = 0u32;
        let mut seen = BTreeSet::new();

        for key in keys {
            if seen.contains(&key) {
                continue;
            }
            seen.insert(key);
            tree.insert(key, &key.to_be_bytes()).unwrap();
            let reported = tree.get_max_key().unwrap();
            prop_assert!(reported >= running_max);
            running_max = running_max.max(key);
            prop_assert_eq!(reported, running_max);
        }
    }

    /// Invariant 8: re-inserting an existing key fails and leaves the
    /// tree's visible contents unchanged.
    #[test]
    fn duplicate_insert_is_rejected_without_side_effects(keys in vec(0u32..1000, 1..50)) {
        let mut tree = fresh_tree();
        let distinct: BTreeSet<u32> = keys.into_iter().collect();
        for key in &distinct {
            tree.insert(*key, &key.to_be_bytes()).unwrap();
        }

        let repeat = *distinct.iter().next().unwrap();
        let before = tree.get_all().unwrap();
        let err = tree.insert(repeat, b"mallory").unwrap_err();
        prop_assert_eq!(err, btreedb::error::EngineError::DuplicateKey);
        let after = tree.get_all().unwrap();
        prop_assert_eq!(before, after);
    }
}

/// Invariant 9: forcing a root split preserves full ordering and
/// searchability, and changes `root_page_id`.
#[test]
fn root_split_preserves_all_keys() {
    let mut tree = fresh_tree();
    let original_root = tree.root_page_id();
    let payload = vec![0u8; 700];

    for key in 0..30u32 {
        tree.insert(key, &payload).unwrap();
    }

    assert_ne!(tree.root_page_id(), original_root);
    let keys: Vec<u32> = tree.get_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..30).collect::<Vec<_>>());
    for key in 0..30u32 {
        assert_eq!(tree.search(key).unwrap(), Some(payload.clone()));
    }
}
