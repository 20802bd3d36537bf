//! Session-scoped stores coordinating reads and writes.
//!
//! - [`StatsStore`]: filter state, cache-backed statistics loaders, and the
//!   debounced refresh coordinator
//! - [`SalaryStore`]: the salary record list with guarded mutations and
//!   derived aggregates
//!
//! Each store owns its state behind its own methods; nothing mutates a
//! store's maps from outside. Construct one of each per session and call
//! `reset()` on logout.

pub mod salary;
pub mod stats;

pub use salary::{SalaryStats, SalaryStore};
pub use stats::{Metric, StatsStore, REFRESH_DEBOUNCE};
