use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column holding the derived note text; never returned to clients.
pub const NOTES_COMBINED_COLUMN: &str = "notes_combined";

/// Response key carrying the query similarity; a catalog column of the same name is dropped.
pub const SIMILARITY_FIELD: &str = "similarity";

/// One row of the product catalog.
///
/// The typed fields drive feature encoding and filtering; `record` keeps every
/// CSV column in its original order for the response projection.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: f64,
    pub size: f64,
    pub gender: String,
    pub situation: String,
    pub concentrate: String,
    pub top_notes: String,
    pub mid_notes: String,
    pub base_notes: String,
    pub notes_combined: String,
    /// `None` when the catalog does not carry a local-brand column.
    pub is_local: Option<bool>,
    pub record: Map<String, Value>,
}

impl CatalogItem {
    /// The catalog record as returned to clients, without the derived note
    /// text or any column that would shadow the similarity score.
    pub fn projection(&self) -> Map<String, Value> {
        let mut record = self.record.clone();
        record.shift_remove(NOTES_COMBINED_COLUMN);
        record.shift_remove(SIMILARITY_FIELD);
        record
    }
}

/// Concatenates top, mid and base notes; missing positions count as empty.
pub fn combine_notes(top: Option<&str>, mid: Option<&str>, base: Option<&str>) -> String {
    format!(
        "{} {} {}",
        top.unwrap_or_default(),
        mid.unwrap_or_default(),
        base.unwrap_or_default()
    )
    .trim()
    .to_string()
}

/// A catalog projection with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPerfume {
    #[serde(flatten)]
    pub perfume: Map<String, Value>,
    pub similarity: f64,
}

/// Entry of the perfume-to-perfume similarity response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPerfume {
    pub id: String,
    pub perfume: Option<String>,
    pub brand: Option<String>,
    pub similarity_score: f64,
}
