//! A small, hand-weighted model set and catalog shared by the unit tests.
//!
//! The encoder projects the note columns onto three latent axes (citrus,
//! floral/sweet, woody) and ignores every other feature, so cluster
//! membership and similarity order can be worked out by hand. Cluster 3 sits
//! far away from every catalog item and stays empty.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use serde_json::json;

use crate::{
    error::{ApiError, Result},
    ml::{
        autoencoder::{Activation, DenseLayer},
        loader::{ENCODER_FILE, KMEANS_FILE, ONE_HOT_FILE, SCALER_FILE, VECTORIZER_FILE},
        preprocessing::HandleUnknown,
        ClusterAssigner, DenseEncoder, Embedder, KMeans, ModelSet, NumericScaler, OneHotEncoder, Preprocessors,
        TextVectorizer,
    },
    models::{CatalogItem, NoteSet},
    services::{
        catalog::Catalog,
        corpus::CorpusIndex,
        feature_encoder::{FeatureEncoder, FeatureRow},
        note_extractor::NoteExtractor,
        recommendation::RecommendationService,
        similar::SimilarIndex,
    },
};

pub const CITRUS_CLUSTER: usize = 0;
pub const FLORAL_CLUSTER: usize = 1;
pub const WOODY_CLUSTER: usize = 2;
pub const EMPTY_CLUSTER: usize = 3;

pub const DATASET_FILE: &str = "catalog.csv";

pub const CATALOG_CSV: &str = "\
ID_Perfume,perfume,brand,price,size,gender,situation,concentrate,top notes,mid notes,base notes,is_lokal
P1,Citrus Dawn,Azuria,25,50,unisex,daily,EDT,Lemon Bergamot,Neroli,Musk,true
P2,Harbor Breeze,Azuria,45,100,male,daily,EDT,Mandarin Orange,Ginger,Vetiver Amber,false
P3,Morning Tea,Kebun,80,50,unisex,daily,EDP,Green Tea,Lemon,Musk,true
P4,Rose Veil,Kebun,30,30,female,daily,EDP,Rose,Jasmine,Musk,true
P5,Velvet Musk,Noir,55,50,female,night,EDP,Vanilla,Musk,Amber,false
P6,Oud Royale,Noir,120,100,male,night,EDP,Oud,Sandalwood,Amber,true
P7,Cedar Trail,Rimba,40,50,male,daily,EDT,Bergamot,Vetiver,Sandalwood Amber,true
P8,Lime Spark,Rimba,10,30,unisex,daily,EDT,Lemon Ginger,,Musk,true
";

/// Notes the stub extractor answers with, in the order a model would return them.
pub const CITRUS_NOTES: [&str; 8] = [
    "Lemon",
    "Bergamot",
    "Mandarin Orange",
    "Green Tea",
    "Musk",
    "Vetiver",
    "Ginger",
    "Neroli",
];

const GENDERS: [&str; 3] = ["female", "male", "unisex"];
const SITUATIONS: [&str; 2] = ["daily", "night"];
const CONCENTRATES: [&str; 2] = ["EDP", "EDT"];

/// Vocabulary in column order, each term tagged with the latent axis it feeds.
const VOCABULARY: [(&str, usize); 16] = [
    ("lemon", 0),
    ("bergamot", 0),
    ("mandarin", 0),
    ("orange", 0),
    ("green", 0),
    ("tea", 0),
    ("neroli", 0),
    ("ginger", 0),
    ("rose", 1),
    ("jasmine", 1),
    ("vanilla", 1),
    ("musk", 1),
    ("oud", 2),
    ("amber", 2),
    ("sandalwood", 2),
    ("vetiver", 2),
];

const SCALER_MEAN: [f64; 2] = [50.0, 75.0];
const SCALER_SCALE: [f64; 2] = [25.0, 25.0];

const CENTERS: [[f32; 3]; 4] = [
    [0.8, 0.0, 0.0],
    [0.0, 0.8, 0.0],
    [0.0, 0.0, 0.8],
    [5.0, 5.0, 5.0],
];

const LATENT_WIDTH: usize = 3;

fn categories() -> Vec<Vec<String>> {
    [&GENDERS[..], &SITUATIONS[..], &CONCENTRATES[..]]
        .iter()
        .map(|values| values.iter().map(|v| v.to_string()).collect())
        .collect()
}

fn vocabulary() -> HashMap<String, usize> {
    VOCABULARY
        .iter()
        .enumerate()
        .map(|(column, (term, _))| (term.to_string(), column))
        .collect()
}

fn categorical_width() -> usize {
    GENDERS.len() + SITUATIONS.len() + CONCENTRATES.len()
}

fn feature_width() -> usize {
    categorical_width() + VOCABULARY.len() + SCALER_MEAN.len()
}

fn encoder_weights() -> Array2<f32> {
    let mut weights = Array2::zeros((feature_width(), LATENT_WIDTH));
    let offset = categorical_width();
    for (column, (_, axis)) in VOCABULARY.iter().enumerate() {
        weights[[offset + column, *axis]] = 1.0;
    }
    weights
}

pub fn preprocessors() -> Preprocessors {
    Preprocessors {
        categorical: OneHotEncoder::new(categories(), HandleUnknown::Error).unwrap(),
        notes: TextVectorizer::tfidf(vocabulary(), vec![1.0; VOCABULARY.len()]).unwrap(),
        numeric: NumericScaler::Standard {
            mean: SCALER_MEAN.to_vec(),
            scale: SCALER_SCALE.to_vec(),
        },
    }
}

pub fn embedder() -> DenseEncoder {
    let layer = DenseLayer::new(
        encoder_weights(),
        Array1::zeros(LATENT_WIDTH),
        Activation::Relu,
    )
    .unwrap();
    DenseEncoder::new(feature_width(), vec![layer]).unwrap()
}

pub fn kmeans() -> KMeans {
    let flat: Vec<f32> = CENTERS.iter().flatten().copied().collect();
    KMeans::new(Array2::from_shape_vec((CENTERS.len(), LATENT_WIDTH), flat).unwrap()).unwrap()
}

pub fn model_set() -> ModelSet {
    ModelSet {
        preprocessors: preprocessors(),
        embedder: Box::new(embedder()),
        assigner: Box::new(kmeans()),
    }
}

pub fn catalog() -> Catalog {
    Catalog::from_reader(CATALOG_CSV.as_bytes()).unwrap()
}

pub fn catalog_items() -> Vec<CatalogItem> {
    catalog().into_items()
}

pub fn corpus_index() -> CorpusIndex {
    let encoder = FeatureEncoder::new(preprocessors());
    CorpusIndex::build(catalog_items(), &encoder, &embedder(), &kmeans()).unwrap()
}

pub fn similar_index() -> SimilarIndex {
    let catalog = catalog();
    SimilarIndex::build(&catalog, &preprocessors().notes)
}

/// Latent vector of the citrus query used across the pipeline tests.
pub fn query_latent() -> Array1<f32> {
    let encoder = FeatureEncoder::new(preprocessors());
    let notes = CITRUS_NOTES.join(" ");
    let row = FeatureRow {
        gender: "unisex",
        situation: "daily",
        concentrate: "EDT",
        notes: &notes,
        price: 30.0,
        size: 50.0,
    };
    let features = encoder.encode(&row).unwrap();
    embedder().embed(features.view()).unwrap()
}

pub fn service(extractor: StubExtractor) -> RecommendationService {
    RecommendationService::new(model_set(), catalog(), Arc::new(extractor)).unwrap()
}

/// Writes the fixture as on-disk artifacts, the way the training export lays them out.
pub fn write_artifacts(dir: &Path) {
    let vocabulary: serde_json::Map<String, serde_json::Value> = VOCABULARY
        .iter()
        .enumerate()
        .map(|(column, (term, _))| (term.to_string(), json!(column)))
        .collect();
    let weights: Vec<Vec<f32>> = encoder_weights()
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect();

    let files = [
        (
            VECTORIZER_FILE,
            json!({ "vocabulary": vocabulary, "idf": vec![1.0; VOCABULARY.len()], "norm": "l2" }),
        ),
        (
            ONE_HOT_FILE,
            json!({ "categories": [GENDERS, SITUATIONS, CONCENTRATES], "handle_unknown": "error" }),
        ),
        (
            SCALER_FILE,
            json!({ "kind": "standard", "mean": SCALER_MEAN, "scale": SCALER_SCALE }),
        ),
        (
            ENCODER_FILE,
            json!({
                "input_dim": feature_width(),
                "layers": [{ "weights": weights, "bias": [0.0, 0.0, 0.0], "activation": "relu" }]
            }),
        ),
        (KMEANS_FILE, json!({ "cluster_centers": CENTERS })),
    ];
    for (name, value) in files {
        fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }
    fs::write(dir.join(DATASET_FILE), CATALOG_CSV).unwrap();
}

/// A [`NoteExtractor`] with a canned answer that counts its calls.
#[derive(Debug)]
pub struct StubExtractor {
    reply: std::result::Result<Vec<String>, String>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn returning<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            reply: Ok(labels.iter().map(|l| l.as_ref().to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn citrus() -> Self {
        Self::returning(&CITRUS_NOTES)
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteExtractor for StubExtractor {
    async fn extract(&self, _description: &str) -> Result<NoteSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(labels) => NoteSet::new(labels),
            Err(message) => Err(ApiError::RecommendationError(message.clone())),
        }
    }
}

#[test]
fn test_fixture_clusters_match_hand_computation() {
    let index = corpus_index();
    let clusters: Vec<usize> = (0..index.len()).map(|i| index.cluster_of(i)).collect();

    assert_eq!(
        clusters,
        [
            CITRUS_CLUSTER,
            CITRUS_CLUSTER,
            CITRUS_CLUSTER,
            FLORAL_CLUSTER,
            FLORAL_CLUSTER,
            WOODY_CLUSTER,
            WOODY_CLUSTER,
            CITRUS_CLUSTER
        ]
    );
    assert_eq!(index.cluster_sizes()[EMPTY_CLUSTER], 0);
    assert_eq!(
        kmeans().assign(query_latent().view()).unwrap(),
        CITRUS_CLUSTER
    );
}

/// Initialises the full route table over `$service`, the way the server wires it.
macro_rules! test_app {
    ($service:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($service))
                .wrap($crate::routes::security_headers())
                .configure($crate::routes::configure)
                .default_service(actix_web::web::route().to($crate::routes::not_found)),
        )
        .await
    };
}
pub(crate) use test_app;
