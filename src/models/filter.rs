use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// The active reporting scope driving every statistics read.
///
/// Absent fields are omitted from cache keys and query parameters, never
/// sent as null or empty strings. `month` and `range` describe the same
/// semantic slot (a discrete month vs. a named period) and are mutually
/// exclusive; the setters on [`StatsStore`](crate::stores::StatsStore)
/// enforce that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFilter {
    pub person_id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub range: Option<String>,
}

impl Default for StatsFilter {
    /// The UI opens on the current calendar year with no person selected.
    fn default() -> Self {
        Self {
            person_id: None,
            year: Some(Utc::now().year()),
            month: None,
            range: None,
        }
    }
}

impl StatsFilter {
    /// An entirely empty filter (no implicit current-year default).
    pub fn empty() -> Self {
        Self {
            person_id: None,
            year: None,
            month: None,
            range: None,
        }
    }

    /// Query parameters for the stats endpoints, present fields only.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(person_id) = self.person_id {
            params.push(("person_id".to_owned(), person_id.to_string()));
        }
        if let Some(year) = self.year {
            params.push(("year".to_owned(), year.to_string()));
        }
        if let Some(month) = self.month {
            params.push(("month".to_owned(), month.to_string()));
        }
        if let Some(ref range) = self.range {
            params.push(("range".to_owned(), range.clone()));
        }
        params
    }
}
