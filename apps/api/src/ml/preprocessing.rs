//! Fitted preprocessing transforms exported from the training notebook.
//!
//! Each transform mirrors the fitted scikit-learn object it was exported from
//! (`OneHotEncoder`, `Count/TfidfVectorizer`, `StandardScaler`/`MinMaxScaler`)
//! closely enough that a row encoded here matches the row the autoencoder was
//! trained on. Values are computed in `f64` and emitted as `f32`, the dtype the
//! embedding model consumes.

use std::collections::HashMap;

use ndarray::{Array1, Array2, Axis};
use regex::Regex;
use serde::Deserialize;

use super::{ModelError, ModelResult};

/// scikit-learn's default `token_pattern`.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

#[derive(Debug, Deserialize)]
struct TextVectorizerFile {
    vocabulary: HashMap<String, usize>,
    #[serde(default)]
    idf: Option<Vec<f64>>,
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default = "default_token_pattern")]
    token_pattern: String,
    #[serde(default)]
    norm: Option<Norm>,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default)]
    binary: bool,
}

fn default_true() -> bool {
    true
}

fn default_token_pattern() -> String {
    DEFAULT_TOKEN_PATTERN.to_string()
}

/// Bag-of-words / TF-IDF encoder over a fixed vocabulary.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "TextVectorizerFile")]
pub struct TextVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Option<Vec<f64>>,
    lowercase: bool,
    token_pattern: Regex,
    norm: Option<Norm>,
    sublinear_tf: bool,
    binary: bool,
}

impl TryFrom<TextVectorizerFile> for TextVectorizer {
    type Error = ModelError;

    fn try_from(file: TextVectorizerFile) -> ModelResult<Self> {
        let token_pattern = Regex::new(&file.token_pattern).map_err(|e| {
            ModelError::InvalidArtifact(format!("vectorizer token_pattern: {}", e))
        })?;

        let vectorizer = Self {
            vocabulary: file.vocabulary,
            idf: file.idf,
            lowercase: file.lowercase,
            token_pattern,
            norm: file.norm,
            sublinear_tf: file.sublinear_tf,
            binary: file.binary,
        };
        vectorizer.validate()?;
        Ok(vectorizer)
    }
}

impl TextVectorizer {
    /// A TF-IDF vectorizer with scikit-learn defaults (lowercase, default token pattern, l2 norm).
    pub fn tfidf(vocabulary: HashMap<String, usize>, idf: Vec<f64>) -> ModelResult<Self> {
        TextVectorizerFile {
            vocabulary,
            idf: Some(idf),
            lowercase: true,
            token_pattern: default_token_pattern(),
            norm: Some(Norm::L2),
            sublinear_tf: false,
            binary: false,
        }
        .try_into()
    }

    /// A plain term-count vectorizer.
    pub fn counts(vocabulary: HashMap<String, usize>) -> ModelResult<Self> {
        TextVectorizerFile {
            vocabulary,
            idf: None,
            lowercase: true,
            token_pattern: default_token_pattern(),
            norm: None,
            sublinear_tf: false,
            binary: false,
        }
        .try_into()
    }

    fn validate(&self) -> ModelResult<()> {
        let width = self.vocabulary.len();
        if width == 0 {
            return Err(ModelError::InvalidArtifact(
                "vectorizer vocabulary is empty".to_string(),
            ));
        }

        let mut seen = vec![false; width];
        for (term, &column) in &self.vocabulary {
            match seen.get_mut(column) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(ModelError::InvalidArtifact(format!(
                        "vectorizer column {} is assigned twice (term '{}')",
                        column, term
                    )))
                }
                None => {
                    return Err(ModelError::InvalidArtifact(format!(
                        "vectorizer column {} for term '{}' is out of range",
                        column, term
                    )))
                }
            }
        }

        if let Some(idf) = &self.idf {
            if idf.len() != width {
                return Err(ModelError::InvalidArtifact(format!(
                    "vectorizer has {} idf weights for {} terms",
                    idf.len(),
                    width
                )));
            }
        }

        Ok(())
    }

    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn transform(&self, text: &str) -> Array1<f32> {
        let mut counts = vec![0.0_f64; self.width()];

        let lowered;
        let text = if self.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };

        for token in self.token_pattern.find_iter(text) {
            if let Some(&column) = self.vocabulary.get(token.as_str()) {
                counts[column] += 1.0;
            }
        }

        for (column, value) in counts.iter_mut().enumerate() {
            if *value == 0.0 {
                continue;
            }
            if self.binary {
                *value = 1.0;
            } else if self.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            if let Some(idf) = &self.idf {
                *value *= idf[column];
            }
        }

        if let Some(norm) = self.norm {
            let magnitude = match norm {
                Norm::L1 => counts.iter().map(|v| v.abs()).sum::<f64>(),
                Norm::L2 => counts.iter().map(|v| v * v).sum::<f64>().sqrt(),
            };
            if magnitude > 0.0 {
                counts.iter_mut().for_each(|v| *v /= magnitude);
            }
        }

        counts.into_iter().map(|v| v as f32).collect()
    }

    pub fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Array2<f32> {
        let mut out = Array2::zeros((texts.len(), self.width()));
        for (text, mut row) in texts.iter().zip(out.axis_iter_mut(Axis(0))) {
            row.assign(&self.transform(text.as_ref()));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

fn default_categorical_features() -> Vec<String> {
    ["gender", "situation", "concentrate"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// One-hot encoder over a fixed list of categorical columns.
#[derive(Debug, Clone, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<Vec<String>>,
    #[serde(default)]
    handle_unknown: HandleUnknown,
    #[serde(default = "default_categorical_features")]
    feature_names: Vec<String>,
}

impl OneHotEncoder {
    pub fn new(categories: Vec<Vec<String>>, handle_unknown: HandleUnknown) -> ModelResult<Self> {
        let encoder = Self {
            categories,
            handle_unknown,
            feature_names: default_categorical_features(),
        };
        encoder.validate()?;
        Ok(encoder)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.categories.len() != self.feature_names.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "one-hot encoder has {} category lists for {} features",
                self.categories.len(),
                self.feature_names.len()
            )));
        }
        if let Some(position) = self.categories.iter().position(|c| c.is_empty()) {
            return Err(ModelError::InvalidArtifact(format!(
                "one-hot encoder has no categories for '{}'",
                self.feature_names[position]
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn n_features(&self) -> usize {
        self.categories.len()
    }

    pub fn transform(&self, values: &[&str]) -> ModelResult<Array1<f32>> {
        if values.len() != self.categories.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.categories.len(),
                got: values.len(),
            });
        }

        let mut encoded = Array1::zeros(self.width());
        let mut offset = 0;
        for ((value, categories), feature) in values
            .iter()
            .zip(&self.categories)
            .zip(&self.feature_names)
        {
            match categories.iter().position(|c| c == value) {
                Some(index) => encoded[offset + index] = 1.0,
                None if self.handle_unknown == HandleUnknown::Ignore => {}
                None => {
                    return Err(ModelError::UnknownCategory {
                        feature: feature.clone(),
                        value: value.to_string(),
                    })
                }
            }
            offset += categories.len();
        }

        Ok(encoded)
    }
}

/// Positional scaler for the numeric columns (average price, size).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericScaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl NumericScaler {
    pub fn validate(&self) -> ModelResult<()> {
        let (offset, scale) = match self {
            NumericScaler::Standard { mean, scale } => (mean, scale),
            NumericScaler::MinMax { min, scale } => (min, scale),
        };
        if offset.is_empty() || offset.len() != scale.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "scaler has {} offsets and {} scales",
                offset.len(),
                scale.len()
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        match self {
            NumericScaler::Standard { mean, .. } => mean.len(),
            NumericScaler::MinMax { min, .. } => min.len(),
        }
    }

    pub fn transform(&self, values: &[f64]) -> ModelResult<Array1<f32>> {
        if values.len() != self.width() {
            return Err(ModelError::DimensionMismatch {
                expected: self.width(),
                got: values.len(),
            });
        }

        let scaled = match self {
            NumericScaler::Standard { mean, scale } => values
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| {
                    // A zero-variance column is left unscaled
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    ((x - m) / s) as f32
                })
                .collect(),
            NumericScaler::MinMax { min, scale } => values
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| (x * s + m) as f32)
                .collect(),
        };

        Ok(scaled)
    }
}
