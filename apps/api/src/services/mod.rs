pub mod catalog;
pub mod corpus;
pub mod feature_encoder;
pub mod note_extractor;
pub mod ranker;
pub mod recommendation;
pub mod similar;

// Re-export public types
pub use catalog::Catalog;
pub use corpus::CorpusIndex;
pub use feature_encoder::{FeatureEncoder, FeatureRow};
pub use note_extractor::{GeminiNoteExtractor, GeminiSettings, NoteExtractor};
pub use ranker::{rank, PriceRange, RankedCandidates};
pub use recommendation::RecommendationService;
pub use similar::SimilarIndex;
