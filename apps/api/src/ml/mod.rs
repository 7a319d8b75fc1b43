//! Offline-trained model artifacts and the interfaces the pipeline consumes them through.
//!
//! Everything here is loaded once at startup and is read-only afterwards. The
//! recommendation pipeline only depends on the [`Embedder`] and
//! [`ClusterAssigner`] traits plus the fitted preprocessing transforms, so the
//! concrete artifact types can be swapped without touching the services.

pub mod autoencoder;
pub mod kmeans;
pub mod loader;
pub mod preprocessing;
pub mod similarity;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

pub use autoencoder::DenseEncoder;
pub use kmeans::KMeans;
pub use loader::{ArtifactPaths, ModelLoader};
pub use preprocessing::{NumericScaler, OneHotEncoder, TextVectorizer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown category '{value}' for feature '{feature}'")]
    UnknownCategory { feature: String, value: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Maps a feature vector onto the latent space used for similarity and clustering.
pub trait Embedder: Send + Sync {
    /// Width of the feature vectors this model accepts.
    fn input_width(&self) -> usize;

    /// Width of the latent vectors it produces.
    fn output_width(&self) -> usize;

    fn embed(&self, features: ArrayView1<'_, f32>) -> ModelResult<Array1<f32>>;

    /// Embeds every row of `features`. The default runs [`Embedder::embed`] row by row.
    fn embed_batch(&self, features: ArrayView2<'_, f32>) -> ModelResult<Array2<f32>> {
        let mut out = Array2::zeros((features.nrows(), self.output_width()));
        for (row, mut target) in features.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            let latent = self.embed(row)?;
            if latent.len() != target.len() {
                return Err(ModelError::DimensionMismatch {
                    expected: target.len(),
                    got: latent.len(),
                });
            }
            target.assign(&latent);
        }
        Ok(out)
    }
}

/// Assigns a latent vector to one of a fixed number of clusters.
pub trait ClusterAssigner: Send + Sync {
    fn n_clusters(&self) -> usize;

    /// Width of the latent vectors the assigner was fitted on.
    fn dimension(&self) -> usize;

    fn assign(&self, latent: ArrayView1<'_, f32>) -> ModelResult<usize>;
}

/// The fitted preprocessing transforms, in feature-column order.
#[derive(Debug, Clone)]
pub struct Preprocessors {
    pub categorical: OneHotEncoder,
    pub notes: TextVectorizer,
    pub numeric: NumericScaler,
}

/// Every artifact the pipeline needs, checked against each other at load time.
pub struct ModelSet {
    pub preprocessors: Preprocessors,
    pub embedder: Box<dyn Embedder>,
    pub assigner: Box<dyn ClusterAssigner>,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("preprocessors", &self.preprocessors)
            .field("input_width", &self.embedder.input_width())
            .field("latent_width", &self.embedder.output_width())
            .field("n_clusters", &self.assigner.n_clusters())
            .finish()
    }
}
