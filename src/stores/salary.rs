//! Salary record store: the authoritative local list for the selected
//! person, guarded mutations with optimistic updates, and derived
//! aggregates.
//!
//! Every successful mutation signals the stats store (debounced bulk
//! refresh) and then re-fetches the list so server-computed fields land
//! locally even when the optimistic copy could not know them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::Transport;
use crate::error::StoreError;
use crate::models::SalaryRecord;
use crate::stores::StatsStore;

/// Aggregates over the filtered record list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalaryStats {
    pub total: f64,
    pub average: f64,
    /// Net income of the last entry in filtered + descending-sorted order.
    pub latest: f64,
}

#[derive(Default)]
struct SalaryState {
    list: Vec<SalaryRecord>,
    person_id: Option<i64>,
    year: Option<i32>,
    month: Option<u32>,
    /// Tokens of mutations currently executing: `create`, `update-<id>`,
    /// `delete-<id>`. Present exactly while the mutation runs.
    pending: HashSet<String>,
}

/// Removes its token from the pending set on every exit path.
struct MutationGuard<'a> {
    state: &'a Mutex<SalaryState>,
    token: String,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().pending.remove(&self.token);
    }
}

/// Store owning the salary record list for the active person.
///
/// The list is mutated only by this store's own methods; readers get
/// snapshots and derived aggregates.
pub struct SalaryStore {
    transport: Arc<dyn Transport>,
    stats: Arc<StatsStore>,
    state: Mutex<SalaryState>,
    loading: AtomicBool,
    refreshing: AtomicBool,
}

impl SalaryStore {
    pub fn new(transport: Arc<dyn Transport>, stats: Arc<StatsStore>) -> Self {
        Self {
            transport,
            stats,
            state: Mutex::new(SalaryState::default()),
            loading: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
        }
    }

    fn begin_mutation(&self, token: String) -> Result<MutationGuard<'_>, StoreError> {
        let mut state = self.state.lock();
        if !state.pending.insert(token.clone()) {
            return Err(StoreError::DuplicateOperation(token));
        }
        Ok(MutationGuard {
            state: &self.state,
            token,
        })
    }

    async fn fetch_for(&self, person_id: i64) -> Result<Vec<SalaryRecord>, StoreError> {
        let params = vec![("person_id".to_owned(), person_id.to_string())];
        let raw = self
            .transport
            .get("/salaries/", &params)
            .await
            .map_err(StoreError::remote)?;
        serde_json::from_value(raw).map_err(|e| StoreError::remote(e.into()))
    }

    // ===== List loading =====

    /// Replace the list with the server's records for `person_id`.
    pub async fn fetch_list(&self, person_id: i64) -> Result<Vec<SalaryRecord>, StoreError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.fetch_for(person_id).await;
        self.loading.store(false, Ordering::SeqCst);

        let list = result?;
        let mut state = self.state.lock();
        state.list = list.clone();
        state.person_id = Some(person_id);
        Ok(list)
    }

    /// Authoritative re-fetch after a mutation. Failures are logged, not
    /// propagated: the optimistic state stays in place and the next
    /// successful fetch repairs it.
    pub async fn refresh_list(&self) {
        let Some(person_id) = self.state.lock().person_id else {
            return;
        };
        self.refreshing.store(true, Ordering::SeqCst);
        match self.fetch_for(person_id).await {
            Ok(list) => self.state.lock().list = list,
            Err(err) => warn!(person_id, error = %err, "failed to refresh salary list"),
        }
        self.refreshing.store(false, Ordering::SeqCst);
    }

    // ===== Mutations =====

    /// Create a salary record for `person_id`.
    ///
    /// Rejects with [`StoreError::DuplicateOperation`] while another create
    /// is outstanding. The created record is inserted at the head of the
    /// local list (most-recent-first) before the reconciling re-fetch runs.
    pub async fn create(&self, person_id: i64, payload: Value) -> Result<SalaryRecord, StoreError> {
        let _guard = self.begin_mutation("create".to_owned())?;

        let raw = self
            .transport
            .post(&format!("/salaries/{person_id}"), &payload)
            .await
            .map_err(StoreError::remote)?;
        let record: SalaryRecord =
            serde_json::from_value(raw).map_err(|e| StoreError::remote(e.into()))?;
        debug!(record_id = record.id, person_id, "created salary record");

        {
            let mut state = self.state.lock();
            state.list.insert(0, record.clone());
            if state.person_id.is_none() {
                state.person_id = Some(person_id);
            }
        }

        self.stats.signal_change();
        self.refresh_list().await;
        Ok(record)
    }

    /// Update a salary record by id, replacing the local copy on success.
    pub async fn update(&self, record_id: i64, payload: Value) -> Result<SalaryRecord, StoreError> {
        let _guard = self.begin_mutation(format!("update-{record_id}"))?;

        let raw = self
            .transport
            .put(&format!("/salaries/{record_id}"), &payload)
            .await
            .map_err(StoreError::remote)?;
        let record: SalaryRecord =
            serde_json::from_value(raw).map_err(|e| StoreError::remote(e.into()))?;

        {
            let mut state = self.state.lock();
            match state.list.iter_mut().find(|item| item.id == record_id) {
                Some(slot) => *slot = record.clone(),
                // Tolerated inconsistency: the re-fetch below repairs the list.
                None => warn!(record_id, "updated record missing from local list"),
            }
        }

        self.stats.signal_change();
        self.refresh_list().await;
        Ok(record)
    }

    /// Delete a salary record by id, removing the local copy on success.
    pub async fn delete(&self, record_id: i64) -> Result<(), StoreError> {
        let _guard = self.begin_mutation(format!("delete-{record_id}"))?;

        self.transport
            .delete(&format!("/salaries/{record_id}"))
            .await
            .map_err(StoreError::remote)?;
        debug!(record_id, "deleted salary record");

        self.state.lock().list.retain(|item| item.id != record_id);

        self.stats.signal_change();
        self.refresh_list().await;
        Ok(())
    }

    // ===== Filters =====

    pub fn set_person(&self, person_id: Option<i64>) {
        self.state.lock().person_id = person_id;
    }

    pub fn set_year(&self, year: Option<i32>) {
        self.state.lock().year = year;
    }

    pub fn set_month(&self, month: Option<u32>) {
        self.state.lock().month = month;
    }

    pub fn clear_filters(&self) {
        let mut state = self.state.lock();
        state.year = None;
        state.month = None;
    }

    pub fn person_id(&self) -> Option<i64> {
        self.state.lock().person_id
    }

    // ===== Derived getters =====

    /// Snapshot of the unfiltered list.
    pub fn list(&self) -> Vec<SalaryRecord> {
        self.state.lock().list.clone()
    }

    /// Records matching the active year/month filters, sorted descending by
    /// `(year, month)`.
    pub fn filtered_list(&self) -> Vec<SalaryRecord> {
        let state = self.state.lock();
        let mut filtered: Vec<SalaryRecord> = state
            .list
            .iter()
            .filter(|item| state.year.map_or(true, |year| item.year == year))
            .filter(|item| state.month.map_or(true, |month| item.month == month))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| b.year.cmp(&a.year).then(b.month.cmp(&a.month)));
        filtered
    }

    /// Aggregates over [`filtered_list`](Self::filtered_list); all zero when
    /// the filtered list is empty.
    pub fn stats(&self) -> SalaryStats {
        let list = self.filtered_list();
        if list.is_empty() {
            return SalaryStats::default();
        }
        let total: f64 = list.iter().map(|item| item.net_income).sum();
        let average = total / list.len() as f64;
        let latest = list.last().map(|item| item.net_income).unwrap_or(0.0);
        SalaryStats {
            total,
            average,
            latest,
        }
    }

    /// Distinct years present in the unfiltered list, descending.
    pub fn year_options(&self) -> Vec<i32> {
        let state = self.state.lock();
        let mut years: Vec<i32> = state.list.iter().map(|item| item.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// True while the post-mutation reconciling re-fetch is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Clear the list, filters, and pending-mutation set.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.list.clear();
        state.person_id = None;
        state.year = None;
        state.month = None;
        state.pending.clear();
        drop(state);
        self.loading.store(false, Ordering::SeqCst);
        self.refreshing.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Tests
// ============================================================================
