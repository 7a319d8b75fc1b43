use std::{sync::Arc, time::Instant};

use tracing::{debug, info};

use crate::{
    error::{ApiError, Result},
    ml::{ArtifactPaths, ClusterAssigner, Embedder, ModelLoader, ModelSet},
    models::{RecommendationRequest, RecommendationResult, SimilarResponse},
    services::{
        catalog::Catalog,
        corpus::CorpusIndex,
        feature_encoder::{FeatureEncoder, FeatureRow},
        note_extractor::NoteExtractor,
        ranker::{rank, PriceRange},
        similar::SimilarIndex,
    },
};

/// The recommendation pipeline with every model and the prepared catalog.
///
/// Built once before the server binds and shared read-only across workers.
pub struct RecommendationService {
    encoder: FeatureEncoder,
    embedder: Box<dyn Embedder>,
    assigner: Box<dyn ClusterAssigner>,
    corpus: CorpusIndex,
    similar: SimilarIndex,
    extractor: Arc<dyn NoteExtractor>,
}

/// Feature width produced for the first catalog row.
fn probe_feature_width(encoder: &FeatureEncoder, catalog: &Catalog) -> Result<usize> {
    let first = catalog
        .items()
        .first()
        .ok_or_else(|| ApiError::ModelLoadError("Catalog is empty".to_string()))?;

    encoder
        .probe_width(&FeatureRow::from_item(first))
        .map_err(|e| {
            ApiError::ModelLoadError(format!(
                "Preprocessors cannot encode catalog item {}: {}",
                first.id, e
            ))
        })
}

impl RecommendationService {
    /// Assembles the service from already-loaded models, checking that they
    /// agree with each other and with the catalog.
    pub fn new(
        models: ModelSet,
        catalog: Catalog,
        extractor: Arc<dyn NoteExtractor>,
    ) -> Result<Self> {
        let ModelSet {
            preprocessors,
            embedder,
            assigner,
        } = models;

        let encoder = FeatureEncoder::new(preprocessors);
        let width = probe_feature_width(&encoder, &catalog)?;
        ModelLoader::check_input_width(embedder.as_ref(), width)?;
        ModelLoader::check_latent_width(assigner.as_ref(), embedder.output_width())?;
        if assigner.n_clusters() == 0 {
            return Err(ApiError::ModelLoadError(
                "Clustering model has no clusters".to_string(),
            ));
        }

        let similar = SimilarIndex::build(&catalog, &encoder.preprocessors().notes);
        let corpus = CorpusIndex::build(
            catalog.into_items(),
            &encoder,
            embedder.as_ref(),
            assigner.as_ref(),
        )?;

        Ok(Self {
            encoder,
            embedder,
            assigner,
            corpus,
            similar,
            extractor,
        })
    }

    /// Runs the whole startup sequence from the artifact files on disk.
    pub fn from_artifacts(paths: &ArtifactPaths, extractor: Arc<dyn NoteExtractor>) -> Result<Self> {
        let started = Instant::now();

        let preprocessors = ModelLoader::load_preprocessors(paths)?;
        let catalog = Catalog::load(&paths.dataset)?;

        let encoder = FeatureEncoder::new(preprocessors);
        let width = probe_feature_width(&encoder, &catalog)?;
        let embedder = ModelLoader::load_embedder(&paths.encoder, width)?;
        let assigner = ModelLoader::load_clustering(&paths.kmeans, embedder.output_width())?;

        let models = ModelSet {
            preprocessors: encoder.preprocessors().clone(),
            embedder: Box::new(embedder),
            assigner: Box::new(assigner),
        };
        let service = Self::new(models, catalog, extractor)?;

        info!(
            "All models and data loaded successfully in {:?}",
            started.elapsed()
        );
        Ok(service)
    }

    /// Extract, encode, embed, assign, rank. Every failure short-circuits.
    pub async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationResult> {
        let started = Instant::now();

        let notes = self.extractor.extract(request.description()).await?;
        let extracted_notes = notes.joined();
        debug!(notes = %extracted_notes, "Extracted notes");

        let features = self.encoder.encode_request(request, &extracted_notes)?;
        let latent = self.embedder.embed(features.view())?;
        let cluster = self.assigner.assign(latent.view())?;

        let ranked = rank(
            &self.corpus,
            latent.view(),
            cluster,
            PriceRange::new(request.min_price(), request.max_price()),
            request.top_k(),
        );

        info!(
            cluster,
            total_in_cluster = ranked.total_in_cluster,
            filtered_count = ranked.filtered_count,
            returned = ranked.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recommendation complete"
        );

        Ok(RecommendationResult {
            cluster,
            extracted_notes,
            total_in_cluster: ranked.total_in_cluster,
            filtered_count: ranked.filtered_count,
            recommendations: ranked.items,
        })
    }

    pub fn similar(&self, perfume: &str, limit: usize) -> Result<SimilarResponse> {
        self.similar.find(perfume, limit)
    }

    pub fn catalog_size(&self) -> usize {
        self.corpus.len()
    }

    pub fn n_clusters(&self) -> usize {
        self.corpus.n_clusters()
    }
}
