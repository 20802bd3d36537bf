//! Per-filter response cache with request coalescing.
//!
//! Statistics responses are cached under a composite key derived from the
//! metric name and the active [`StatsFilter`](crate::models::StatsFilter).
//! Concurrent loads for the same key share a single in-flight fetch instead
//! of issuing duplicate network calls, and a bulk `invalidate()` forgets
//! everything at once so the next read round-trips to the server.

pub mod store;

pub use store::{cache_key, ResponseCache};
