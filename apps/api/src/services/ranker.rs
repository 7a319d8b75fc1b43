//! Cluster-restricted, price-filtered cosine ranking.

use std::cmp::Ordering;

use ndarray::ArrayView1;
use tracing::debug;

use crate::{
    ml::similarity::{cosine_similarity, round_score},
    models::ScoredPerfume,
    services::corpus::CorpusIndex,
};

/// Inclusive price band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedCandidates {
    /// Catalog items sharing the query's cluster.
    pub total_in_cluster: usize,
    /// Of those, the items inside the price band.
    pub filtered_count: usize,
    pub items: Vec<ScoredPerfume>,
}

pub fn rank(
    index: &CorpusIndex,
    query: ArrayView1<'_, f32>,
    cluster: usize,
    prices: PriceRange,
    top_k: usize,
) -> RankedCandidates {
    let members: Vec<usize> = index.members(cluster).collect();
    let filtered: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&i| prices.contains(index.item(i).price))
        .collect();

    debug!(
        cluster,
        total_in_cluster = members.len(),
        filtered_count = filtered.len(),
        "Candidate set"
    );

    let mut scored: Vec<(usize, f32)> = filtered
        .iter()
        .map(|&i| (i, cosine_similarity(query, index.latent(i))))
        .collect();
    // sort_by is stable, so equal scores keep catalog order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    RankedCandidates {
        total_in_cluster: members.len(),
        filtered_count: filtered.len(),
        items: scored
            .into_iter()
            .map(|(i, score)| ScoredPerfume {
                perfume: index.item(i).projection(),
                similarity: round_score(score),
            })
            .collect(),
    }
}
