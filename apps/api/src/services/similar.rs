//! Perfume-to-perfume similarity over the note text alone.

use ndarray::Array2;
use tracing::{debug, info};

use crate::{
    error::{ApiError, Result},
    ml::{
        similarity::{cosine_similarity, round_score},
        TextVectorizer,
    },
    models::{SimilarPerfume, SimilarResponse},
    services::catalog::{Catalog, LOCAL_COLUMN},
};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    name: Option<String>,
    brand: Option<String>,
    is_local: bool,
    key: Option<String>,
}

fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Note-text vectors for every catalog item, in catalog order.
#[derive(Debug, Clone)]
pub struct SimilarIndex {
    entries: Vec<Entry>,
    vectors: Array2<f32>,
    local_only: bool,
}

impl SimilarIndex {
    pub fn build(catalog: &Catalog, vectorizer: &TextVectorizer) -> Self {
        let texts: Vec<&str> = catalog
            .items()
            .iter()
            .map(|item| item.notes_combined.as_str())
            .collect();
        let vectors = vectorizer.transform_batch(&texts);

        let entries = catalog
            .items()
            .iter()
            .map(|item| Entry {
                id: item.id.clone(),
                name: item.name.clone(),
                brand: item.brand.clone(),
                is_local: item.is_local.unwrap_or(false),
                key: item.name.as_deref().map(match_key),
            })
            .collect();

        let local_only = catalog.has_column(LOCAL_COLUMN);
        info!(
            items = catalog.len(),
            local_only, "Similar-perfume index prepared"
        );

        Self {
            entries,
            vectors,
            local_only,
        }
    }

    /// Ranks the catalog against the first item named `name`, case-insensitively.
    pub fn find(&self, name: &str, limit: usize) -> Result<SimilarResponse> {
        let key = match_key(name);
        if key.is_empty() {
            return Err(ApiError::InvalidInput(
                "Missing required field: 'perfume'".into(),
            ));
        }
        if limit == 0 {
            return Err(ApiError::InvalidInput("limit must be positive".into()));
        }

        let query = self
            .entries
            .iter()
            .position(|entry| entry.key.as_deref() == Some(key.as_str()))
            .ok_or_else(|| ApiError::NotFound(format!("Perfume '{}' not found", name.trim())))?;

        let query_vector = self.vectors.row(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(index, entry)| *index != query && (!self.local_only || entry.is_local))
            .map(|(index, _)| (index, cosine_similarity(query_vector, self.vectors.row(index))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        debug!(perfume = %name.trim(), found = scored.len(), "Similar perfumes ranked");

        let recommendations: Vec<SimilarPerfume> = scored
            .into_iter()
            .map(|(index, score)| {
                let entry = &self.entries[index];
                SimilarPerfume {
                    id: entry.id.clone(),
                    perfume: entry.name.clone(),
                    brand: entry.brand.clone(),
                    similarity_score: round_score(score),
                }
            })
            .collect();

        Ok(SimilarResponse {
            input_perfume: name.trim().to_string(),
            total_found: recommendations.len(),
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{preprocessors, similar_index};

    #[test]
    fn test_ranks_local_items_by_note_overlap() {
        let index = similar_index();
        let response = index.find("  citrus DAWN ", 8).unwrap();

        assert_eq!(response.input_perfume, "citrus DAWN");
        let ids: Vec<&str> = response.recommendations.iter().map(|r| r.id.as_str()).collect();
        // P2 and P5 are not local; P1 is the query itself
        assert_eq!(ids, ["P8", "P3", "P4", "P7", "P6"]);
        assert_eq!(response.total_found, 5);
        assert_eq!(response.recommendations[0].similarity_score, 0.5774);
        assert_eq!(response.recommendations[1].similarity_score, 0.5);
        assert_eq!(response.recommendations[4].similarity_score, 0.0);
    }

    #[test]
    fn test_limit_truncates() {
        let index = similar_index();
        let response = index.find("Citrus Dawn", 2).unwrap();

        assert_eq!(response.total_found, 2);
        assert_eq!(response.recommendations[0].brand.as_deref(), Some("Rimba"));
    }

    #[test]
    fn test_unknown_perfume_is_not_found() {
        let index = similar_index();
        let err = index.find("Nonexistent", 8).unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let index = similar_index();
        assert!(matches!(
            index.find("  ", 8).unwrap_err(),
            ApiError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_without_local_column_every_item_is_eligible() {
        let csv = "\
perfume,price,size,gender,situation,concentrate,top notes,mid notes,base notes
A,10,50,unisex,daily,EDT,Lemon,,Musk
B,10,50,unisex,daily,EDT,Lemon,,
C,10,50,unisex,daily,EDT,Oud,,
";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        let index = SimilarIndex::build(&catalog, &preprocessors().notes);

        let response = index.find("a", 8).unwrap();
        let names: Vec<_> = response
            .recommendations
            .iter()
            .map(|r| r.perfume.as_deref().unwrap())
            .collect();
        assert_eq!(names, ["B", "C"]);
        assert_eq!(response.recommendations[0].id, "1");
    }
}
