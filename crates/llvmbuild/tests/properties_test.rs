//! Property-based tests for labels and job partitioning

use camino::Utf8PathBuf;
use llvmbuild::abbrev::AbbreviationMap;
use llvmbuild::build::partition_jobs;
use proptest::prelude::*;
use std::collections::HashSet;

// Directory names from a small alphabet so paths share prefixes and levels
fn dir_name() -> impl Strategy<Value = String> {
    "[abc][abc0-9-]{0,6}"
}

fn source_path() -> impl Strategy<Value = Utf8PathBuf> {
    prop::collection::vec(dir_name(), 1..4).prop_map(|parts| Utf8PathBuf::from(format!("/{}", parts.join("/"))))
}

proptest! {
    #[test]
    fn labels_are_injective(paths in prop::collection::hash_set(source_path(), 1..6)) {
        let paths: Vec<Utf8PathBuf> = paths.into_iter().collect();

        // Some sets have no unique label; those are reported, never mislabelled
        if let Ok(map) = AbbreviationMap::resolve(&paths) {
            prop_assert_eq!(map.len(), paths.len());

            let labels: HashSet<&str> = paths.iter().map(|p| map.get(p).unwrap()).collect();
            prop_assert_eq!(labels.len(), paths.len());
            prop_assert!(labels.iter().all(|l| !l.is_empty()));
        }
    }

    #[test]
    fn single_path_keeps_its_name(path in source_path()) {
        let map = AbbreviationMap::resolve(std::slice::from_ref(&path)).unwrap();
        prop_assert_eq!(map.get(&path), path.file_name());
    }

    #[test]
    fn partition_stays_within_budget(total in 1usize..256, threads in 1usize..64) {
        let partition = partition_jobs(total, threads);

        prop_assert!(partition.workers >= 1);
        prop_assert!(partition.jobs_per_worker >= 1);
        prop_assert!(partition.workers <= threads);
        prop_assert!(partition.workers * partition.jobs_per_worker <= total.max(1));
    }
}
