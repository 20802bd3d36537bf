//! paycache - client-side data-synchronization core for a payroll tracker.
//!
//! This crate sits between a UI layer and a salary-tracking REST backend.
//! It owns the hard part of the client: keeping cached read data consistent
//! with the server across interleaved reads and writes.
//!
//! - [`ResponseCache`]: per-filter statistics cache with request
//!   coalescing - concurrent loads for the same `(metric, filter)` share a
//!   single in-flight fetch
//! - [`StatsStore`]: filter state, metric loaders, and a debounced refresh
//!   coordinator that collapses bursts of mutations into one
//!   invalidation + bulk re-fetch
//! - [`SalaryStore`]: the authoritative record list with per-class mutation
//!   guards, optimistic updates, and a reconciling trailing re-fetch
//! - [`ApiClient`]: reqwest transport with bearer auth, behind the
//!   [`Transport`] trait so the stores are testable offline
//!
//! Rendering, routing, and session handling belong to the embedding
//! application; payload shapes for the statistics endpoints pass through as
//! opaque JSON.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod stores;

pub use api::{ApiClient, ApiError, Transport};
pub use cache::ResponseCache;
pub use config::Config;
pub use error::StoreError;
pub use models::{Person, SalaryRecord, StatsFilter};
pub use stores::{Metric, SalaryStats, SalaryStore, StatsStore, REFRESH_DEBOUNCE};
