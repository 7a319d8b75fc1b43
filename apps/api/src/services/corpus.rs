//! The catalog with every item pre-embedded and pre-clustered.
//!
//! Built once at startup and shared read-only by every request. Catalog
//! changes require a restart; there is no incremental update path.

use ndarray::{Array2, ArrayView1};
use tracing::{debug, info, warn};

use crate::{
    error::{ApiError, Result},
    ml::{ClusterAssigner, Embedder},
    models::CatalogItem,
    services::feature_encoder::FeatureEncoder,
};

#[derive(Debug, Clone)]
pub struct CorpusIndex {
    items: Vec<CatalogItem>,
    latents: Array2<f32>,
    clusters: Vec<usize>,
    n_clusters: usize,
}

impl CorpusIndex {
    /// Encodes, embeds and clusters every catalog item.
    ///
    /// Fails with [`ApiError::ModelLoadError`] if any step fails or if the
    /// clustering model hands out an id outside `0..n_clusters`.
    pub fn build(
        items: Vec<CatalogItem>,
        encoder: &FeatureEncoder,
        embedder: &dyn Embedder,
        assigner: &dyn ClusterAssigner,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(ApiError::ModelLoadError("Catalog is empty".to_string()));
        }

        let prepare_error =
            |e: ApiError| ApiError::ModelLoadError(format!("Failed to prepare catalog embeddings: {}", e));

        let features = encoder.encode_corpus(&items).map_err(prepare_error)?;
        let latents = embedder
            .embed_batch(features.view())
            .map_err(|e| prepare_error(e.into()))?;

        let n_clusters = assigner.n_clusters();
        let clusters = latents
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, latent)| {
                let cluster = assigner.assign(latent).map_err(|e| prepare_error(e.into()))?;
                if cluster >= n_clusters {
                    return Err(ApiError::ModelLoadError(format!(
                        "Catalog item {} was assigned cluster {} but the model only has {} clusters",
                        items[index].id, cluster, n_clusters
                    )));
                }
                Ok(cluster)
            })
            .collect::<Result<Vec<_>>>()?;

        let index = Self {
            items,
            latents,
            clusters,
            n_clusters,
        };
        index.report_cluster_sizes();
        Ok(index)
    }

    fn report_cluster_sizes(&self) {
        let sizes = self.cluster_sizes();
        debug!(?sizes, "Catalog cluster sizes");

        let empty: Vec<usize> = sizes
            .iter()
            .enumerate()
            .filter(|(_, size)| **size == 0)
            .map(|(cluster, _)| cluster)
            .collect();
        if !empty.is_empty() {
            warn!(
                ?empty,
                "Clusters without any catalog item; the clustering model and catalog may be out of sync"
            );
        }

        info!(
            items = self.items.len(),
            latent_width = self.latents.ncols(),
            n_clusters = self.n_clusters,
            "Catalog embeddings prepared"
        );
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> &CatalogItem {
        &self.items[index]
    }

    pub fn latent(&self, index: usize) -> ArrayView1<'_, f32> {
        self.latents.row(index)
    }

    pub fn cluster_of(&self, index: usize) -> usize {
        self.clusters[index]
    }

    /// Number of catalog items per cluster id.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &cluster in &self.clusters {
            sizes[cluster] += 1;
        }
        sizes
    }

    /// Catalog positions of the items in `cluster`, in catalog order.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = usize> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .filter(move |(_, &c)| c == cluster)
            .map(|(index, _)| index)
    }
}
