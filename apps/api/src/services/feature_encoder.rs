//! Assembles the feature vector the embedding model was trained on.
//!
//! Column order is fixed: one-hot `{gender, situation, concentrate}`, then the
//! note text encoding, then the scaled `{price, size}` pair. Query rows and
//! catalog rows go through the same fitted transforms so their latent vectors
//! are directly comparable.

use ndarray::{s, Array1, Array2};

use crate::{
    error::Result,
    ml::{ModelError, Preprocessors},
    models::{CatalogItem, RecommendationRequest},
};

/// The raw inputs of one feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow<'a> {
    pub gender: &'a str,
    pub situation: &'a str,
    pub concentrate: &'a str,
    pub notes: &'a str,
    pub price: f64,
    pub size: f64,
}

impl<'a> FeatureRow<'a> {
    /// A query row, priced at the midpoint of the requested band.
    pub fn from_request(request: &'a RecommendationRequest, notes: &'a str) -> Self {
        Self {
            gender: request.gender(),
            situation: request.situation(),
            concentrate: request.concentrate(),
            notes,
            price: request.average_price(),
            size: f64::from(request.size()),
        }
    }

    /// A catalog row, priced at its stored price.
    pub fn from_item(item: &'a CatalogItem) -> Self {
        Self {
            gender: &item.gender,
            situation: &item.situation,
            concentrate: &item.concentrate,
            notes: &item.notes_combined,
            price: item.price,
            size: item.size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    preprocessors: Preprocessors,
}

impl FeatureEncoder {
    pub fn new(preprocessors: Preprocessors) -> Self {
        Self { preprocessors }
    }

    pub fn preprocessors(&self) -> &Preprocessors {
        &self.preprocessors
    }

    /// Width implied by the fitted transforms.
    pub fn width(&self) -> usize {
        self.preprocessors.categorical.width()
            + self.preprocessors.notes.width()
            + self.preprocessors.numeric.width()
    }

    pub fn encode(&self, row: &FeatureRow<'_>) -> Result<Array1<f32>> {
        let Preprocessors {
            categorical,
            notes,
            numeric,
        } = &self.preprocessors;

        let categorical = categorical.transform(&[row.gender, row.situation, row.concentrate])?;
        let notes = notes.transform(row.notes);
        let numeric = numeric.transform(&[row.price, row.size])?;

        let mut features = Array1::zeros(categorical.len() + notes.len() + numeric.len());
        let (cat_end, notes_end) = (categorical.len(), categorical.len() + notes.len());
        features.slice_mut(s![..cat_end]).assign(&categorical);
        features.slice_mut(s![cat_end..notes_end]).assign(&notes);
        features.slice_mut(s![notes_end..]).assign(&numeric);

        if features.len() != self.width() {
            return Err(ModelError::DimensionMismatch {
                expected: self.width(),
                got: features.len(),
            }
            .into());
        }
        Ok(features)
    }

    pub fn encode_request(
        &self,
        request: &RecommendationRequest,
        notes: &str,
    ) -> Result<Array1<f32>> {
        self.encode(&FeatureRow::from_request(request, notes))
    }

    /// Encodes every catalog item, one row per item in catalog order.
    pub fn encode_corpus(&self, items: &[CatalogItem]) -> Result<Array2<f32>> {
        let mut matrix = Array2::zeros((items.len(), self.width()));
        for (item, mut row) in items.iter().zip(matrix.rows_mut()) {
            row.assign(&self.encode(&FeatureRow::from_item(item))?);
        }
        Ok(matrix)
    }

    /// Runs one row through all three transforms and returns the produced width.
    pub fn probe_width(&self, sample: &FeatureRow<'_>) -> Result<usize> {
        Ok(self.encode(sample)?.len())
    }
}
