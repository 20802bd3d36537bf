//! Statistics store: filter state, cache-backed metric loaders, and the
//! debounced refresh coordinator.
//!
//! Mutations call [`StatsStore::signal_change`]; bursts within the debounce
//! window collapse into a single invalidation + bulk re-fetch of the active
//! metrics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::Transport;
use crate::cache::ResponseCache;
use crate::error::StoreError;
use crate::models::{Person, StatsFilter};

/// Quiet period after the last change signal before the bulk refresh runs.
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(100);

/// A statistics endpoint the store knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Yearly,
    Monthly,
    Family,
    NetMonthly,
    GrossVsNet,
    IncomeComposition,
    Deductions,
    ContribCumulative,
    TableMonthly,
    TableAnnual,
    TableAnnualMonthly,
}

impl Metric {
    /// Metrics every bulk refresh re-fetches; cumulative contributions joins
    /// only when a person is selected.
    const REFRESH_SET: [Metric; 6] = [
        Metric::NetMonthly,
        Metric::GrossVsNet,
        Metric::IncomeComposition,
        Metric::Deductions,
        Metric::TableMonthly,
        Metric::TableAnnual,
    ];

    /// Stable identifier used for cache keys and loading/error flags.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Yearly => "yearly",
            Metric::Monthly => "monthly",
            Metric::Family => "family",
            Metric::NetMonthly => "net_monthly",
            Metric::GrossVsNet => "gross_vs_net",
            Metric::IncomeComposition => "income_composition",
            Metric::Deductions => "deductions",
            Metric::ContribCumulative => "contrib_cumulative",
            Metric::TableMonthly => "table_monthly",
            Metric::TableAnnual => "table_annual",
            Metric::TableAnnualMonthly => "table_annual_monthly",
        }
    }

    /// Backend endpoint path.
    pub fn path(self) -> &'static str {
        match self {
            Metric::Yearly => "/stats/yearly",
            Metric::Monthly => "/stats/monthly",
            Metric::Family => "/stats/family",
            Metric::NetMonthly => "/stats/net-income/monthly",
            Metric::GrossVsNet => "/stats/gross-vs-net/monthly",
            Metric::IncomeComposition => "/stats/income-composition",
            Metric::Deductions => "/stats/deductions/breakdown",
            Metric::ContribCumulative => "/stats/contributions/cumulative",
            Metric::TableMonthly => "/stats/tables/monthly",
            Metric::TableAnnual => "/stats/tables/annual",
            Metric::TableAnnualMonthly => "/stats/tables/annual-monthly",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owns the active filter, the response cache, and the persons list.
///
/// Constructed once per session via [`StatsStore::new`]; [`reset`](Self::reset)
/// returns it to its initial state on logout.
pub struct StatsStore {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    filter: Mutex<StatsFilter>,
    persons: Mutex<Vec<Person>>,
    persons_loading: AtomicBool,
    persons_error: Mutex<Option<StoreError>>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
    refreshing: AtomicBool,
    /// Handle to ourselves for the debounce task spawned by `signal_change`.
    weak: Weak<StatsStore>,
}

impl StatsStore {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            transport,
            cache: ResponseCache::new(),
            filter: Mutex::new(StatsFilter::default()),
            persons: Mutex::new(Vec::new()),
            persons_loading: AtomicBool::new(false),
            persons_error: Mutex::new(None),
            refresh_timer: Mutex::new(None),
            refreshing: AtomicBool::new(false),
            weak: weak.clone(),
        })
    }

    // ===== Filter state =====

    /// Snapshot of the active filter.
    pub fn filter(&self) -> StatsFilter {
        self.filter.lock().clone()
    }

    pub fn set_person(&self, person_id: Option<i64>) {
        self.filter.lock().person_id = person_id;
    }

    pub fn set_year(&self, year: i32) {
        self.filter.lock().year = Some(year);
    }

    /// Select a discrete month; clears any named range.
    pub fn set_month(&self, month: Option<u32>) {
        let mut filter = self.filter.lock();
        filter.month = month;
        if month.is_some() {
            filter.range = None;
        }
    }

    /// Select a named reporting range; clears any discrete month.
    pub fn set_range(&self, range: Option<String>) {
        let mut filter = self.filter.lock();
        if range.is_some() {
            filter.month = None;
        }
        filter.range = range;
    }

    // ===== Metric loaders =====

    /// Load a metric for the current filter through the cache.
    ///
    /// Changing the filter does not trigger a reload by itself; the next
    /// call here recomputes the key and fetches fresh data for the new
    /// scope.
    pub async fn load_metric(&self, metric: Metric) -> Result<Value, StoreError> {
        let mut filter = self.filter();
        match metric {
            Metric::ContribCumulative => {
                if filter.person_id.is_none() {
                    return Err(StoreError::PersonRequired);
                }
            }
            // The annual-by-month table aggregates whole years; the month
            // slot never applies to it.
            Metric::TableAnnualMonthly => {
                filter.month = None;
                filter.range = None;
            }
            _ => {}
        }

        let transport = Arc::clone(&self.transport);
        let params = filter.params();
        let path = metric.path();
        self.cache
            .load(metric.name(), &filter, move || async move {
                transport.get(path, &params).await
            })
            .await
    }

    pub async fn load_yearly_stats(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::Yearly).await
    }

    pub async fn load_monthly_stats(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::Monthly).await
    }

    pub async fn load_family_summary(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::Family).await
    }

    pub async fn load_monthly_net_income(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::NetMonthly).await
    }

    pub async fn load_gross_vs_net_monthly(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::GrossVsNet).await
    }

    pub async fn load_income_composition(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::IncomeComposition).await
    }

    pub async fn load_deductions_breakdown(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::Deductions).await
    }

    pub async fn load_contributions_cumulative(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::ContribCumulative).await
    }

    pub async fn load_monthly_table(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::TableMonthly).await
    }

    pub async fn load_annual_table(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::TableAnnual).await
    }

    pub async fn load_annual_monthly_table(&self) -> Result<Value, StoreError> {
        self.load_metric(Metric::TableAnnualMonthly).await
    }

    // ===== Persons =====

    /// Load the persons list once; later calls return the cached list.
    pub async fn ensure_persons(&self) -> Result<Vec<Person>, StoreError> {
        {
            let persons = self.persons.lock();
            if !persons.is_empty() {
                return Ok(persons.clone());
            }
        }

        self.persons_loading.store(true, Ordering::SeqCst);
        *self.persons_error.lock() = None;

        let result = async {
            let raw = self
                .transport
                .get("/persons/", &[])
                .await
                .map_err(StoreError::remote)?;
            serde_json::from_value::<Vec<Person>>(raw).map_err(|e| StoreError::remote(e.into()))
        }
        .await;

        self.persons_loading.store(false, Ordering::SeqCst);
        match result {
            Ok(list) => {
                *self.persons.lock() = list.clone();
                Ok(list)
            }
            Err(err) => {
                *self.persons_error.lock() = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn persons(&self) -> Vec<Person> {
        self.persons.lock().clone()
    }

    pub fn persons_loading(&self) -> bool {
        self.persons_loading.load(Ordering::SeqCst)
    }

    pub fn persons_error(&self) -> Option<StoreError> {
        self.persons_error.lock().clone()
    }

    // ===== Cache access =====

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Drop every cached response, in-flight marker, and flag.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    // ===== Refresh coordination =====

    /// Signal that underlying data changed. Debounced: each call cancels the
    /// previously scheduled refresh and schedules a new one
    /// [`REFRESH_DEBOUNCE`] out, so a burst of mutations produces exactly one
    /// invalidation + refresh cycle. Must be called from within a tokio
    /// runtime.
    pub fn signal_change(&self) {
        let Some(store) = self.weak.upgrade() else {
            return;
        };
        let mut timer = self.refresh_timer.lock();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        debug!("scheduling debounced stats refresh");
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(REFRESH_DEBOUNCE).await;
            store.refresh_all().await;
        }));
    }

    /// Invalidate the cache and re-load every active metric concurrently.
    ///
    /// Individual metric failures are logged and do not block the others;
    /// they remain visible through [`ResponseCache::error`].
    pub async fn refresh_all(&self) {
        self.cache.invalidate();
        self.refreshing.store(true, Ordering::SeqCst);

        let mut metrics: Vec<Metric> = Metric::REFRESH_SET.to_vec();
        if self.filter().person_id.is_some() {
            metrics.push(Metric::ContribCumulative);
        }

        let results = join_all(metrics.into_iter().map(|metric| {
            let store = self;
            async move { (metric, store.load_metric(metric).await) }
        }))
        .await;

        for (metric, result) in results {
            if let Err(err) = result {
                warn!(metric = metric.name(), error = %err, "metric refresh failed");
            }
        }

        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// True between invalidation and the settlement of all bulk reloads.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Return the store to its initial state: default filter, no persons,
    /// empty cache, no scheduled refresh.
    pub fn reset(&self) {
        if let Some(handle) = self.refresh_timer.lock().take() {
            handle.abort();
        }
        *self.filter.lock() = StatsFilter::default();
        self.persons.lock().clear();
        self.persons_loading.store(false, Ordering::SeqCst);
        *self.persons_error.lock() = None;
        self.refreshing.store(false, Ordering::SeqCst);
        self.cache.invalidate();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Transport fake that records GET traffic and serves canned responses.
    #[derive(Default)]
    struct StaticTransport {
        responses: Mutex<HashMap<String, Value>>,
        failures: Mutex<HashSet<String>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl StaticTransport {
        fn respond(&self, path: &str, value: Value) {
            self.responses.lock().insert(path.to_owned(), value);
        }

        fn fail(&self, path: &str) {
            self.failures.lock().insert(path.to_owned());
        }

        fn count(&self, path: &str) -> usize {
            self.calls.lock().iter().filter(|(p, _)| p == path).count()
        }

        fn last_params(&self, path: &str) -> Vec<(String, String)> {
            self.calls
                .lock()
                .iter()
                .rev()
                .find(|(p, _)| p == path)
                .map(|(_, params)| params.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
            self.calls.lock().push((path.to_owned(), params.to_vec()));
            if self.failures.lock().contains(path) {
                anyhow::bail!("injected failure for {path}");
            }
            Ok(self
                .responses
                .lock()
                .get(path)
                .cloned()
                .unwrap_or_else(|| json!({ "path": path })))
        }

        async fn post(&self, _path: &str, _body: &Value) -> Result<Value> {
            anyhow::bail!("unexpected POST in stats tests")
        }

        async fn put(&self, _path: &str, _body: &Value) -> Result<Value> {
            anyhow::bail!("unexpected PUT in stats tests")
        }

        async fn delete(&self, _path: &str) -> Result<()> {
            anyhow::bail!("unexpected DELETE in stats tests")
        }
    }

    fn make_store() -> (Arc<StaticTransport>, Arc<StatsStore>) {
        let transport = Arc::new(StaticTransport::default());
        let store = StatsStore::new(transport.clone());
        (transport, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_signals_yields_one_refresh() {
        let (transport, store) = make_store();

        store.signal_change();
        store.signal_change();
        store.signal_change();

        // Only the last scheduled timer survives the burst.
        let handle = store.refresh_timer.lock().take().expect("timer scheduled");
        handle.await.unwrap();

        assert_eq!(transport.count(Metric::NetMonthly.path()), 1);
        assert_eq!(transport.count(Metric::TableAnnual.path()), 1);
        assert!(!store.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_after_quiet_period_refreshes_again() {
        let (transport, store) = make_store();

        store.signal_change();
        let handle = store.refresh_timer.lock().take().unwrap();
        handle.await.unwrap();

        store.signal_change();
        let handle = store.refresh_timer.lock().take().unwrap();
        handle.await.unwrap();

        assert_eq!(transport.count(Metric::NetMonthly.path()), 2);
    }

    #[tokio::test]
    async fn test_refresh_tolerates_individual_metric_failure() {
        let (transport, store) = make_store();
        transport.fail(Metric::Deductions.path());
        store.set_person(Some(7));

        store.refresh_all().await;

        // The failing metric is recorded, the rest still landed in the cache.
        assert!(store.cache().error(Metric::Deductions.name()).is_some());
        assert!(store
            .cache()
            .peek(Metric::NetMonthly.name(), &store.filter())
            .is_some());
        assert_eq!(transport.count(Metric::ContribCumulative.path()), 1);
        assert!(!store.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_skips_contributions_without_person() {
        let (transport, store) = make_store();

        store.refresh_all().await;

        assert_eq!(transport.count(Metric::ContribCumulative.path()), 0);
        assert_eq!(transport.count(Metric::GrossVsNet.path()), 1);
    }

    #[tokio::test]
    async fn test_contributions_require_person() {
        let (transport, store) = make_store();

        let err = store.load_contributions_cumulative().await.unwrap_err();
        assert!(matches!(err, StoreError::PersonRequired));
        assert_eq!(transport.count(Metric::ContribCumulative.path()), 0);
    }

    #[tokio::test]
    async fn test_filter_change_refetches_and_old_scope_stays_cached() {
        let (transport, store) = make_store();
        store.set_year(2024);

        store.load_monthly_net_income().await.unwrap();
        assert_eq!(transport.count(Metric::NetMonthly.path()), 1);

        store.set_year(2023);
        store.load_monthly_net_income().await.unwrap();
        assert_eq!(transport.count(Metric::NetMonthly.path()), 2);

        // Back to the first scope: served from cache.
        store.set_year(2024);
        store.load_monthly_net_income().await.unwrap();
        assert_eq!(transport.count(Metric::NetMonthly.path()), 2);
    }

    #[tokio::test]
    async fn test_annual_monthly_table_ignores_month() {
        let (transport, store) = make_store();
        store.set_year(2024);
        store.set_month(Some(3));

        store.load_annual_monthly_table().await.unwrap();

        let params = transport.last_params(Metric::TableAnnualMonthly.path());
        assert!(params.iter().all(|(key, _)| key != "month"));
        assert!(params.contains(&("year".to_owned(), "2024".to_owned())));
    }

    #[tokio::test]
    async fn test_month_and_range_are_mutually_exclusive() {
        let (_, store) = make_store();

        store.set_month(Some(3));
        store.set_range(Some("q2".to_owned()));
        assert_eq!(store.filter().month, None);
        assert_eq!(store.filter().range.as_deref(), Some("q2"));

        store.set_month(Some(5));
        assert_eq!(store.filter().month, Some(5));
        assert_eq!(store.filter().range, None);
    }

    #[tokio::test]
    async fn test_ensure_persons_fetches_once() {
        let (transport, store) = make_store();
        transport.respond("/persons/", json!([{"id": 1, "name": "Alice"}]));

        let first = store.ensure_persons().await.unwrap();
        let second = store.ensure_persons().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].name, "Alice");
        assert_eq!(transport.count("/persons/"), 1);
    }

    #[tokio::test]
    async fn test_ensure_persons_records_error() {
        let (transport, store) = make_store();
        transport.fail("/persons/");

        assert!(store.ensure_persons().await.is_err());
        assert!(store.persons_error().is_some());
        assert!(!store.persons_loading());
        assert!(store.persons().is_empty());
    }

    #[tokio::test]
    async fn test_reset_restores_initial_state() {
        let (transport, store) = make_store();
        transport.respond("/persons/", json!([{"id": 1, "name": "Alice"}]));

        store.set_person(Some(1));
        store.ensure_persons().await.unwrap();
        store.load_monthly_net_income().await.unwrap();
        store.signal_change();

        store.reset();

        assert!(store.filter().person_id.is_none());
        assert!(store.persons().is_empty());
        assert!(store.cache().is_empty());
        assert!(store.refresh_timer.lock().is_none());
    }

    #[tokio::test]
    async fn test_loader_returns_cached_payload() {
        let (transport, store) = make_store();
        transport.respond(Metric::Yearly.path(), json!([{"year": 2024, "net": 1.0}]));

        let first = store.load_yearly_stats().await.unwrap();
        let second = store.load_yearly_stats().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.count(Metric::Yearly.path()), 1);
    }
}
