use serde::{Deserialize, Serialize};

/// A tracked person, as returned by `GET /persons/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
}
