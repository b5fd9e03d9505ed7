//! Multi-retailer search
//!
//! Runs every adapter for a query, concatenates their records in source order
//! and keeps the user's search history up to date. History writes are
//! best-effort: a broken database never costs the caller their results.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::Span;

use crate::config::SearchConfig;
use crate::fetch::Fetcher;
use crate::model::{ProductRecord, QueryContext};
use crate::sources::{default_adapters, SourceAdapter};
use crate::store::SearchHistory;

pub struct Aggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    fetcher: Arc<dyn Fetcher>,
    history: Option<Arc<dyn SearchHistory>>,
    user_agents: Arc<[String]>,
    parallel: bool,
}

impl Aggregator {
    /// Aggregator over the three retailers, without history
    pub fn new(config: &SearchConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            adapters: default_adapters(config),
            fetcher,
            history: None,
            user_agents: Arc::from(config.user_agents.clone()),
            parallel: config.parallel,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn SearchHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Replace the adapter list; order is the merge order
    pub fn with_adapters(mut self, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Search all retailers for `query`. Searches by a known user are
    /// recorded in their history along with the final result count.
    pub fn search_medicine(&self, query: &str, user_id: Option<i64>) -> Vec<ProductRecord> {
        let ctx = QueryContext::new(query, Arc::clone(&self.user_agents));
        if ctx.raw_query.is_empty() {
            return Vec::new();
        }

        let span = tracing::info_span!("search", query = %ctx.raw_query);
        let _enter = span.enter();

        let history_id = user_id.and_then(|user_id| self.record_search(user_id, &ctx.raw_query));

        let per_source = if self.parallel {
            self.run_parallel(&ctx, &span)
        } else {
            self.adapters
                .iter()
                .map(|adapter| self.run_adapter(adapter.as_ref(), &ctx))
                .collect()
        };

        let results: Vec<ProductRecord> = per_source.into_iter().flatten().collect();

        if let Some(id) = history_id {
            self.update_result_count(id, results.len());
        }

        if results.is_empty() {
            tracing::warn!("no source returned results");
        } else {
            tracing::info!(count = results.len(), "returning results");
        }
        results
    }

    /// One thread per adapter; results are collected back in adapter order
    fn run_parallel(&self, ctx: &QueryContext, span: &Span) -> Vec<Vec<ProductRecord>> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .adapters
                .iter()
                .map(|adapter| {
                    scope.spawn(move || {
                        let _enter = span.enter();
                        self.run_adapter(adapter.as_ref(), ctx)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_default())
                .collect()
        })
    }

    /// Run one adapter, turning a panic into an empty result
    fn run_adapter(&self, adapter: &dyn SourceAdapter, ctx: &QueryContext) -> Vec<ProductRecord> {
        let source = adapter.source();
        let fetcher = self.fetcher.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| adapter.search(ctx, fetcher))) {
            Ok(records) => {
                tracing::info!(source = %source, count = records.len(), "source finished");
                records
            }
            Err(_) => {
                tracing::error!(source = %source, "source adapter panicked");
                Vec::new()
            }
        }
    }

    fn record_search(&self, user_id: i64, query: &str) -> Option<i64> {
        let history = self.history.as_ref()?;
        match history.record_search(user_id, query) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(user_id, "failed to record search: {}", e);
                None
            }
        }
    }

    fn update_result_count(&self, search_id: i64, count: usize) {
        let Some(history) = self.history.as_ref() else {
            return;
        };
        if let Err(e) = history.update_result_count(search_id, count) {
            tracing::error!(search_id, "failed to update result count: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::model::Source;
    use crate::store::Store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;
    use std::time::Duration;

    /// Adapter returning fixed titles after an optional delay
    struct Canned {
        source: Source,
        titles: Vec<&'static str>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Canned {
        fn new(source: Source, titles: Vec<&'static str>) -> Self {
            Self {
                source,
                titles,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SourceAdapter for Canned {
        fn source(&self) -> Source {
            self.source
        }

        fn search(&self, _ctx: &QueryContext, _fetcher: &dyn Fetcher) -> Vec<ProductRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay);
            self.titles
                .iter()
                .map(|t| ProductRecord::new(self.source, *t, "#", "₹1", 1.0))
                .collect()
        }
    }

    struct Panicking;

    impl SourceAdapter for Panicking {
        fn source(&self) -> Source {
            Source::Tata1mg
        }

        fn search(&self, _ctx: &QueryContext, _fetcher: &dyn Fetcher) -> Vec<ProductRecord> {
            panic!("selector exploded")
        }
    }

    struct BrokenHistory;

    impl SearchHistory for BrokenHistory {
        fn record_search(&self, _user_id: i64, _query: &str) -> Result<i64, StoreError> {
            Err(StoreError::Invalid("read-only database".into()))
        }

        fn update_result_count(&self, _search_id: i64, _count: usize) -> Result<(), StoreError> {
            Err(StoreError::Invalid("read-only database".into()))
        }
    }

    fn aggregator(adapters: Vec<Box<dyn SourceAdapter>>) -> Aggregator {
        Aggregator::new(&SearchConfig::default(), Arc::new(ScriptedFetcher::new())).with_adapters(adapters)
    }

    fn titles(records: &[ProductRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_blank_query_skips_adapters() {
        let canned = Canned::new(Source::PharmEasy, vec!["x"]);
        let calls = Arc::clone(&canned.calls);
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("asha", "Asha", 34).unwrap();
        let agg = aggregator(vec![Box::new(canned)]).with_history(store.clone());

        assert!(agg.search_medicine("   ", Some(user)).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.recent_searches(user, 5).unwrap().is_empty());
    }

    #[test]
    fn test_merge_in_source_order() {
        let agg = aggregator(vec![
            Box::new(Canned::new(Source::PharmEasy, vec!["p1", "p2"])),
            Box::new(Canned::new(Source::Tata1mg, vec![])),
            Box::new(Canned::new(Source::Amazon, vec!["a1"])),
        ]);
        assert_eq!(titles(&agg.search_medicine("dolo", None)), vec!["p1", "p2", "a1"]);
    }

    #[test]
    fn test_parallel_merge_keeps_source_order() {
        let mut slow = Canned::new(Source::PharmEasy, vec!["p1"]);
        slow.delay = Duration::from_millis(50);
        let agg = aggregator(vec![
            Box::new(slow),
            Box::new(Canned::new(Source::Tata1mg, vec!["t1"])),
            Box::new(Canned::new(Source::Amazon, vec!["a1"])),
        ])
        .with_parallel(true);
        assert_eq!(titles(&agg.search_medicine("dolo", None)), vec!["p1", "t1", "a1"]);
    }

    #[test]
    fn test_panicking_adapter_is_isolated() {
        for parallel in [false, true] {
            let agg = aggregator(vec![
                Box::new(Canned::new(Source::PharmEasy, vec!["p1"])),
                Box::new(Panicking),
                Box::new(Canned::new(Source::Amazon, vec!["a1"])),
            ])
            .with_parallel(parallel);
            assert_eq!(titles(&agg.search_medicine("dolo", None)), vec!["p1", "a1"]);
        }
    }

    #[test]
    fn test_history_records_result_count() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("ravi", "Ravi", 61).unwrap();
        let agg = aggregator(vec![
            Box::new(Canned::new(Source::PharmEasy, vec!["p1", "p2"])),
            Box::new(Canned::new(Source::Amazon, vec!["a1"])),
        ])
        .with_history(store.clone());

        agg.search_medicine("  crocin ", Some(user));
        let recent = store.recent_searches(user, 5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].query, "crocin");
        assert_eq!(recent[0].results_count, 3);
    }

    #[test]
    fn test_history_failure_does_not_block_search() {
        let agg = aggregator(vec![Box::new(Canned::new(Source::Amazon, vec!["a1"]))])
            .with_history(Arc::new(BrokenHistory));
        assert_eq!(agg.search_medicine("dolo", Some(1)).len(), 1);
    }

    #[test]
    fn test_all_sources_failing_records_zero() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("meena", "Meena", 45).unwrap();
        // real adapters against a fetcher that refuses every URL
        let agg = Aggregator::new(&SearchConfig::default(), Arc::new(ScriptedFetcher::new()))
            .with_history(store.clone());

        assert!(agg.search_medicine("paracetamol", Some(user)).is_empty());
        let recent = store.recent_searches(user, 5).unwrap();
        assert_eq!(recent[0].results_count, 0);
    }
}
