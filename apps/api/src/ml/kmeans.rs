use ndarray::{Array2, ArrayView1};
use serde::Deserialize;

use super::{ClusterAssigner, ModelError, ModelResult};

#[derive(Debug, Deserialize)]
struct KMeansFile {
    cluster_centers: Vec<Vec<f32>>,
}

/// Nearest-centroid assignment against the centers of a fitted k-means model.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "KMeansFile")]
pub struct KMeans {
    centers: Array2<f32>,
}

impl TryFrom<KMeansFile> for KMeans {
    type Error = ModelError;

    fn try_from(file: KMeansFile) -> ModelResult<Self> {
        let k = file.cluster_centers.len();
        let dim = file.cluster_centers.first().map_or(0, Vec::len);
        if file.cluster_centers.iter().any(|c| c.len() != dim) {
            return Err(ModelError::InvalidArtifact(
                "cluster centers have different dimensions".to_string(),
            ));
        }

        let flat: Vec<f32> = file.cluster_centers.into_iter().flatten().collect();
        let centers = Array2::from_shape_vec((k, dim), flat)
            .map_err(|e| ModelError::InvalidArtifact(format!("cluster centers: {}", e)))?;
        KMeans::new(centers)
    }
}

impl KMeans {
    pub fn new(centers: Array2<f32>) -> ModelResult<Self> {
        if centers.nrows() == 0 || centers.ncols() == 0 {
            return Err(ModelError::InvalidArtifact(
                "clustering model has no centers".to_string(),
            ));
        }
        Ok(Self { centers })
    }
}

impl ClusterAssigner for KMeans {
    fn n_clusters(&self) -> usize {
        self.centers.nrows()
    }

    fn dimension(&self) -> usize {
        self.centers.ncols()
    }

    fn assign(&self, latent: ArrayView1<'_, f32>) -> ModelResult<usize> {
        if latent.len() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: latent.len(),
            });
        }

        // Strict comparison keeps the lowest index on ties
        let mut best = (0, f32::INFINITY);
        for (index, center) in self.centers.outer_iter().enumerate() {
            let distance: f32 = center
                .iter()
                .zip(latent.iter())
                .map(|(c, x)| (c - x) * (c - x))
                .sum();
            if distance < best.1 {
                best = (index, distance);
            }
        }
        Ok(best.0)
    }
}
