//! Startup-time loading of the exported model artifacts.
//!
//! Every failure here is a [`ApiError::ModelLoadError`]: the service must not
//! start serving with a missing or inconsistent artifact.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::info;

use super::{
    ClusterAssigner, DenseEncoder, Embedder, KMeans, NumericScaler, OneHotEncoder, Preprocessors,
    TextVectorizer,
};
use crate::error::{ApiError, Result};

pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const ONE_HOT_FILE: &str = "ohe.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ENCODER_FILE: &str = "encoder.json";
pub const KMEANS_FILE: &str = "kmeans.json";

/// Locations of every startup artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub vectorizer: PathBuf,
    pub one_hot: PathBuf,
    pub scaler: PathBuf,
    pub encoder: PathBuf,
    pub kmeans: PathBuf,
    pub dataset: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(model_dir: impl AsRef<Path>, dataset_file: &str) -> Self {
        let base = model_dir.as_ref();
        Self {
            vectorizer: base.join(VECTORIZER_FILE),
            one_hot: base.join(ONE_HOT_FILE),
            scaler: base.join(SCALER_FILE),
            encoder: base.join(ENCODER_FILE),
            kmeans: base.join(KMEANS_FILE),
            dataset: base.join(dataset_file),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("cannot parse '{}'", path.display()))
}

fn load_error(what: &str, err: anyhow::Error) -> ApiError {
    ApiError::ModelLoadError(format!("Failed to load {}: {:#}", what, err))
}

pub struct ModelLoader;

impl ModelLoader {
    pub fn load_preprocessors(paths: &ArtifactPaths) -> Result<Preprocessors> {
        info!("Loading preprocessing models...");

        let notes: TextVectorizer =
            read_json(&paths.vectorizer).map_err(|e| load_error("text vectorizer", e))?;
        let categorical: OneHotEncoder =
            read_json(&paths.one_hot).map_err(|e| load_error("categorical encoder", e))?;
        categorical
            .validate()
            .map_err(|e| load_error("categorical encoder", e.into()))?;
        let numeric: NumericScaler =
            read_json(&paths.scaler).map_err(|e| load_error("numeric scaler", e))?;
        numeric
            .validate()
            .map_err(|e| load_error("numeric scaler", e.into()))?;

        info!(
            categorical_width = categorical.width(),
            notes_width = notes.width(),
            numeric_width = numeric.width(),
            "Preprocessing models loaded"
        );

        Ok(Preprocessors {
            categorical,
            notes,
            numeric,
        })
    }

    /// Loads the encoder and checks that it accepts vectors of `feature_width`.
    pub fn load_embedder(path: &Path, feature_width: usize) -> Result<DenseEncoder> {
        info!("Loading embedding model from '{}'...", path.display());

        let encoder: DenseEncoder = read_json(path).map_err(|e| load_error("embedding model", e))?;
        Self::check_input_width(&encoder, feature_width)?;

        info!(
            input_width = encoder.input_width(),
            latent_width = encoder.output_width(),
            "Embedding model loaded"
        );
        Ok(encoder)
    }

    /// Loads the clustering model and checks it was fitted on `latent_width`-wide vectors.
    pub fn load_clustering(path: &Path, latent_width: usize) -> Result<KMeans> {
        info!("Loading clustering model from '{}'...", path.display());

        let kmeans: KMeans = read_json(path).map_err(|e| load_error("clustering model", e))?;
        Self::check_latent_width(&kmeans, latent_width)?;

        info!(n_clusters = kmeans.n_clusters(), "Clustering model loaded");
        Ok(kmeans)
    }

    pub fn check_input_width(embedder: &dyn Embedder, feature_width: usize) -> Result<()> {
        if embedder.input_width() != feature_width {
            return Err(ApiError::ModelLoadError(format!(
                "Embedding model expects {} input features but the preprocessors produce {}",
                embedder.input_width(),
                feature_width
            )));
        }
        Ok(())
    }

    pub fn check_latent_width(assigner: &dyn ClusterAssigner, latent_width: usize) -> Result<()> {
        if assigner.dimension() != latent_width {
            return Err(ApiError::ModelLoadError(format!(
                "Clustering model was fitted on {}-dimensional vectors but the embedding model produces {}",
                assigner.dimension(),
                latent_width
            )));
        }
        Ok(())
    }
}
