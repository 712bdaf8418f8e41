//! Property tests for job list merging

use jobsphere_core::orchestrator::{DedupKey, ResultMerger, SourceList};
use jobsphere_core::protocol::JobItem;
use proptest::prelude::*;
use std::collections::HashSet;

fn posting() -> impl Strategy<Value = JobItem> {
    // small alphabets so duplicates across lists are common
    ("(Rust|Go|Data) (Engineer|Lead)", "(Acme|Initech|Globex)", 0u8..4, any::<bool>()).prop_map(
        |(title, company, path, tracked)| {
            let mut url = format!("https://jobs.example.com/{}", path);
            if tracked {
                url.push_str("?utm_source=board");
            }
            JobItem::new(title, company, url)
        },
    )
}

fn source_lists() -> impl Strategy<Value = Vec<SourceList>> {
    prop::collection::vec((0i32..3, prop::collection::vec(posting(), 0..10)), 1..5).prop_map(
        |lists| {
            lists
                .into_iter()
                .enumerate()
                .map(|(i, (priority, items))| {
                    SourceList::new(format!("board{}", i), priority, items)
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn prop_merged_postings_are_unique(lists in source_lists()) {
        let merged = ResultMerger::new().merge(lists.clone());

        let keys: HashSet<DedupKey> = merged.iter().map(DedupKey::of).collect();
        prop_assert_eq!(keys.len(), merged.len());

        let input_keys: HashSet<DedupKey> = lists
            .iter()
            .flat_map(|list| list.items.iter().map(DedupKey::of))
            .collect();
        prop_assert_eq!(input_keys, keys);
    }

    #[test]
    fn prop_sources_name_every_contributor(lists in source_lists()) {
        let merged = ResultMerger::new().merge(lists.clone());

        for item in &merged {
            let key = DedupKey::of(item);
            let mut expected: Vec<&SourceList> = lists
                .iter()
                .filter(|list| list.items.iter().any(|other| DedupKey::of(other) == key))
                .collect();
            expected.sort_by_key(|list| list.priority);
            let expected: Vec<&str> =
                expected.iter().map(|list| list.provider_id.as_str()).collect();
            prop_assert_eq!(item.sources.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn prop_list_merged_with_itself_has_no_duplicates(
        items in prop::collection::vec(posting(), 0..20)
    ) {
        let unique: HashSet<DedupKey> = items.iter().map(DedupKey::of).collect();
        let merged = ResultMerger::new().merge(vec![
            SourceList::new("remotive", 1, items.clone()),
            SourceList::new("remotive", 1, items),
        ]);

        let keys: HashSet<DedupKey> = merged.iter().map(DedupKey::of).collect();
        prop_assert_eq!(keys.len(), merged.len());
        prop_assert!(merged.len() <= unique.len());
        prop_assert!(merged.iter().all(|item| item.sources == vec!["remotive".to_string()]));
    }

    #[test]
    fn prop_limit_takes_a_prefix(lists in source_lists(), max in 0usize..12) {
        let full = ResultMerger::new().merge(lists.clone());
        let limited = ResultMerger::new().with_max_results(max).merge(lists);

        prop_assert_eq!(limited.len(), full.len().min(max));
        prop_assert_eq!(&full[..limited.len()], &limited[..]);
    }
}
