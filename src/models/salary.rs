use serde::{Deserialize, Serialize};

/// A monthly salary record as the backend reports it.
///
/// The totals (`gross_income`, `net_income`, the `*_total` fields) are
/// computed server-side; an optimistic local copy only ever carries the
/// values the server already confirmed, and the trailing re-fetch after a
/// mutation picks up any recalculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRecord {
    pub id: i64,
    /// Not part of the canonical response shape; present when the caller
    /// or backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<i64>,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub base_salary: f64,
    #[serde(default)]
    pub performance: f64,
    #[serde(default)]
    pub allowances_total: f64,
    #[serde(default)]
    pub bonuses_total: f64,
    #[serde(default)]
    pub deductions_total: f64,
    #[serde(default)]
    pub insurance_total: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub gross_income: f64,
    #[serde(default)]
    pub net_income: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
