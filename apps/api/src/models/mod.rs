use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};

pub use notes::{NoteCategory, NoteSet, NOTE_COUNT};
pub use perfume::{CatalogItem, ScoredPerfume, SimilarPerfume};

pub mod notes;
pub mod perfume;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_SIMILAR_LIMIT: usize = 8;

/// Wire body of `POST /recommend`.
///
/// Every field is kept as raw JSON so that missing, null and mistyped values
/// produce precise validation messages instead of a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecommendationRequest {
    pub gender: Option<Value>,
    pub situation: Option<Value>,
    pub concentrate: Option<Value>,
    pub size: Option<Value>,
    pub min_price: Option<Value>,
    pub max_price: Option<Value>,
    pub description: Option<Value>,
    pub top_k: Option<Value>,
}

/// A validated recommendation request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    gender: String,
    situation: String,
    concentrate: String,
    size: u32,
    min_price: f64,
    max_price: f64,
    description: String,
    top_k: usize,
}

impl RecommendationRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gender: impl Into<String>,
        situation: impl Into<String>,
        concentrate: impl Into<String>,
        size: u32,
        min_price: f64,
        max_price: f64,
        description: impl Into<String>,
        top_k: usize,
    ) -> Result<Self> {
        if !min_price.is_finite() || !max_price.is_finite() {
            return Err(ApiError::InvalidInput("Prices must be finite".into()));
        }
        if min_price < 0.0 || max_price < 0.0 {
            return Err(ApiError::InvalidInput("Prices cannot be negative".into()));
        }
        if min_price > max_price {
            return Err(ApiError::InvalidInput(
                "Min price cannot be greater than max price".into(),
            ));
        }
        if size == 0 {
            return Err(ApiError::InvalidInput("Size must be positive".into()));
        }
        if top_k == 0 {
            return Err(ApiError::InvalidInput("top_k must be positive".into()));
        }

        let description = description.into();
        if description.trim().is_empty() {
            return Err(ApiError::InvalidInput("Description cannot be empty".into()));
        }

        Ok(Self {
            gender: gender.into(),
            situation: situation.into(),
            concentrate: concentrate.into(),
            size,
            min_price,
            max_price,
            description,
            top_k,
        })
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn situation(&self) -> &str {
        &self.situation
    }

    pub fn concentrate(&self) -> &str {
        &self.concentrate
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    /// Midpoint of the requested price band, the price the query is encoded with.
    pub fn average_price(&self) -> f64 {
        (self.min_price + self.max_price) / 2.0
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

fn required<'a>(value: &'a Option<Value>, field: &str) -> Result<&'a Value> {
    match value {
        None | Some(Value::Null) => Err(ApiError::InvalidInput(format!(
            "Missing required field: '{}'",
            field
        ))),
        Some(v) => Ok(v),
    }
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::InvalidInput(format!("Field '{}' must be a string.", field)))
}

fn number_field(value: &Value, field: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| ApiError::InvalidInput(format!("Field '{}' must be a number.", field)))
}

fn whole_number(value: f64) -> Option<u64> {
    (value.fract() == 0.0 && value >= 0.0 && value <= u64::MAX as f64).then_some(value as u64)
}

impl TryFrom<RawRecommendationRequest> for RecommendationRequest {
    type Error = ApiError;

    fn try_from(raw: RawRecommendationRequest) -> Result<Self> {
        let gender = required(&raw.gender, "gender")?;
        let situation = required(&raw.situation, "situation")?;
        let concentrate = required(&raw.concentrate, "concentrate")?;
        let size = required(&raw.size, "size")?;
        let min_price = required(&raw.min_price, "min_price")?;
        let max_price = required(&raw.max_price, "max_price")?;
        let description = required(&raw.description, "description")?;

        let size = number_field(size, "size")?;
        let min_price = number_field(min_price, "min_price")?;
        let max_price = number_field(max_price, "max_price")?;

        if size <= 0.0 {
            return Err(ApiError::InvalidInput("Size must be positive".into()));
        }
        let size = whole_number(size)
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| ApiError::InvalidInput("Field 'size' must be a whole number.".into()))?;

        let top_k = match &raw.top_k {
            None | Some(Value::Null) => DEFAULT_TOP_K,
            Some(value) => {
                let top_k = number_field(value, "top_k")?;
                if top_k <= 0.0 {
                    return Err(ApiError::InvalidInput("top_k must be positive".into()));
                }
                whole_number(top_k)
                    .and_then(|k| usize::try_from(k).ok())
                    .ok_or_else(|| {
                        ApiError::InvalidInput("Field 'top_k' must be a positive integer.".into())
                    })?
            }
        };

        RecommendationRequest::new(
            string_field(gender, "gender")?,
            string_field(situation, "situation")?,
            string_field(concentrate, "concentrate")?,
            size,
            min_price,
            max_price,
            string_field(description, "description")?,
            top_k,
        )
    }
}

/// Response of `POST /recommend`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub cluster: usize,
    pub extracted_notes: String,
    pub total_in_cluster: usize,
    pub filtered_count: usize,
    pub recommendations: Vec<ScoredPerfume>,
}

/// Request body of `POST /similar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRequest {
    pub perfume: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response of `POST /similar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarResponse {
    pub input_perfume: String,
    pub recommendations: Vec<SimilarPerfume>,
    pub total_found: usize,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}
