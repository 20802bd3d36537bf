//! Data models for payroll entities.
//!
//! This module contains the typed structures shared by the stores:
//!
//! - `Person`: a tracked person
//! - `SalaryRecord`: a monthly salary entry with server-computed totals
//! - `StatsFilter`: the active `{person, year, month|range}` reporting scope
//!
//! Statistics payloads themselves stay opaque (`serde_json::Value`) and are
//! passed through to the UI untouched.

pub mod filter;
pub mod person;
pub mod salary;

pub use filter::StatsFilter;
pub use person::Person;
pub use salary::SalaryRecord;
