//! REST API transport for the payroll backend.
//!
//! The stores talk to the backend through the [`Transport`] trait so that
//! tests can substitute an in-memory fake; [`ApiClient`] is the production
//! implementation backed by `reqwest` with bearer-token authentication.
//!
//! Session handling beyond surfacing [`ApiError::Unauthorized`] (redirecting
//! to login, token refresh) belongs to the embedding application.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use client::ApiClient;
pub use error::ApiError;

/// The request surface the stores consume.
///
/// Paths are backend-relative (`/salaries/`, `/stats/yearly`); query
/// parameters carry present-only filter fields. Payloads and responses are
/// opaque JSON - the stores decide what to type.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value>;
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;
    async fn put(&self, path: &str, body: &Value) -> Result<Value>;
    async fn delete(&self, path: &str) -> Result<()>;
}
