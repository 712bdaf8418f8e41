//! Deduplication and ranking of job lists from several boards

use crate::protocol::JobItem;
use std::collections::HashMap;
use url::Url;

/// Job items returned by one provider
#[derive(Debug, Clone)]
pub struct SourceList {
    pub provider_id: String,
    /// Provider priority for the task (lower = ranked first)
    pub priority: i32,
    pub items: Vec<JobItem>,
}

impl SourceList {
    pub fn new(provider_id: impl Into<String>, priority: i32, items: Vec<JobItem>) -> Self {
        Self {
            provider_id: provider_id.into(),
            priority,
            items,
        }
    }
}

/// Merges per-provider job lists into one ordered list.
///
/// Lists are ranked by provider priority, ties keeping the order they were
/// given in, and each provider's internal order is preserved. The first
/// occurrence of a posting wins; later duplicates only add their provider to
/// the survivor's `sources`. The limit is applied after deduplication.
#[derive(Debug, Clone, Default)]
pub struct ResultMerger {
    max_results: Option<usize>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn merge(&self, mut lists: Vec<SourceList>) -> Vec<JobItem> {
        // stable: equal priorities keep their given order
        lists.sort_by_key(|list| list.priority);

        let mut merged: Vec<JobItem> = Vec::new();
        let mut seen: HashMap<DedupKey, usize> = HashMap::new();

        for list in lists {
            for mut item in list.items {
                let key = DedupKey::of(&item);
                if let Some(&index) = seen.get(&key) {
                    let sources = &mut merged[index].sources;
                    if !sources.contains(&list.provider_id) {
                        sources.push(list.provider_id.clone());
                    }
                    continue;
                }
                if item.sources.is_empty() {
                    item.sources.push(list.provider_id.clone());
                }
                seen.insert(key, merged.len());
                merged.push(item);
            }
        }

        if let Some(max) = self.max_results {
            merged.truncate(max);
        }
        merged
    }
}

/// Case-insensitive, whitespace-collapsed `(title, company, url)` with the
/// query string and fragment removed from the url
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    title: String,
    company: String,
    url: String,
}

impl DedupKey {
    pub fn of(item: &JobItem) -> Self {
        Self {
            title: fold(&item.title),
            company: fold(&item.company),
            url: fold(&strip_query(&item.url)),
        }
    }
}

fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_query(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string(),
    }
}
