// tests/property_staleness.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use proptest::prelude::*;
use staleset::fs::mock::MockFileSystem;
use staleset::fs::FileSystem;
use staleset::store::MemoryTimestampStore;
use staleset::trigger::TriggerMap;
use staleset::IncrementalSelector;

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn name(i: usize) -> String {
    format!("f{i}.md")
}

/// Mock tree with one file per mtime, named `f0.md`, `f1.md`, ...
fn mock_tree(mtimes: &[u64]) -> Arc<dyn FileSystem> {
    let fs = MockFileSystem::new();
    for (i, secs) in mtimes.iter().enumerate() {
        fs.add_file_with_mtime(name(i), "", t(*secs));
    }
    Arc::new(fs)
}

fn select(fs: Arc<dyn FileSystem>, triggers: TriggerMap, n: usize, since: u64) -> BTreeSet<String> {
    let selector = IncrementalSelector::new(fs, ".").with_triggers(triggers);
    let mut store = MemoryTimestampStore::with_last(t(since));
    let names: Vec<String> = (0..n).map(name).collect();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let out = rt
        .block_on(selector.select_all(names, &mut store))
        .expect("selection");
    assert_eq!(store.writes(), 1);
    out.into_iter().map(|p| p.to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn selection_is_exactly_the_strictly_newer_files(
        mtimes in proptest::collection::vec(0u64..10, 1..12),
        since in 0u64..10,
    ) {
        let n = mtimes.len();
        let got = select(mock_tree(&mtimes), TriggerMap::new(), n, since);

        let expected: BTreeSet<String> = mtimes
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > since)
            .map(|(i, _)| name(i))
            .collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn chained_triggers_cascade_exactly_one_hop(
        mtimes in proptest::collection::vec(0u64..10, 2..10),
        since in 0u64..10,
    ) {
        let n = mtimes.len();
        // f0 -> f1 -> f2 -> ...
        let mut triggers = TriggerMap::new();
        for i in 0..n - 1 {
            triggers.insert(name(i), name(i + 1));
        }

        let got = select(mock_tree(&mtimes), triggers, n, since);

        let expected: BTreeSet<String> = (0..n)
            .filter(|&i| mtimes[i] > since || (i > 0 && mtimes[i - 1] > since))
            .map(name)
            .collect();
        prop_assert_eq!(got, expected);
    }
}
