//! Turns a free-text description into eight taxonomy notes via an LLM.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{ApiError, Result},
    models::{NoteCategory, NoteSet, NOTE_COUNT},
};

const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const MAX_TEXT_PREVIEW_LENGTH: usize = 100;

#[async_trait]
pub trait NoteExtractor: Send + Sync {
    /// Extracts exactly [`NOTE_COUNT`] taxonomy notes from `description`.
    ///
    /// Unusable model output is `InvalidInput`; a failed call is
    /// `RecommendationError`.
    async fn extract(&self, description: &str) -> Result<NoteSet>;
}

/// Builds the extraction prompt: the full taxonomy grouped by category, the
/// expected JSON shape and the user's description.
pub fn build_prompt(description: &str) -> String {
    let taxonomy = NoteCategory::ALL
        .iter()
        .map(|category| format!("[{}]\n{}", category.name(), category.notes().join(", ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"
You are a professional perfume expert with deep knowledge of fragrance families and ingredients.

Your task is to extract the most appropriate fragrance notes based on a user's natural language description of their desired perfume.
You must ONLY recommend notes from the valid list provided below, categorized into CITRUS, FLORAL, FRUITY, etc.

Respond only with a JSON format like this:
{{
  "notes": ["note1", "note2", "note3", "note4", "note5", "note6", "note7", "note8"]
}}
you have to give {count} notes
example :
{{
  "notes": ["Lemon", "Lime", "Lavender", "Rose", "Sandalwood", "Jasmine", "Ylang-Ylang", "Orange Blossom"]
}}

---
VALID NOTES (Grouped by Category):

{taxonomy}

---

User Description:
{description}

Output JSON:
"#,
        count = NOTE_COUNT,
        taxonomy = taxonomy,
        description = description,
    )
}

#[derive(Debug, Deserialize)]
struct NotesReply {
    notes: Vec<String>,
}

/// Parses raw model output into a [`NoteSet`], tolerating Markdown code fences.
pub fn parse_notes(content: &str) -> Result<NoteSet> {
    let cleaned = content
        .trim()
        .replace("```json", "")
        .replace("```", "");

    let reply: NotesReply = serde_json::from_str(cleaned.trim())
        .map_err(|e| ApiError::InvalidInput(format!("Invalid AI response format: {}", e)))?;

    NoteSet::new(&reply.notes)
}

fn reject_blank(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(ApiError::InvalidInput("Description cannot be empty".into()));
    }
    Ok(())
}

/// Exponential backoff before retry number `attempt` (1-based), saturating on overflow.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_PREVIEW_LENGTH) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Connection settings for [`GeminiNoteExtractor`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&Config> for GeminiSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.gemini_temperature,
            timeout: config.extractor_timeout(),
            connect_timeout: config.extractor_connect_timeout(),
            max_attempts: config.extractor_max_attempts.max(1),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Done(String),
    Retryable(String),
    Fatal(String),
}

/// Note extractor backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiNoteExtractor {
    client: Client,
    settings: GeminiSettings,
    endpoint: String,
}

impl GeminiNoteExtractor {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(ApiError::ConfigError("Gemini API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.base_url, settings.model
        );

        info!(
            model = %settings.model,
            timeout_secs = settings.timeout.as_secs(),
            max_attempts = settings.max_attempts,
            "Gemini note extractor ready"
        );

        Ok(Self {
            client,
            settings,
            endpoint,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(GeminiSettings::from(config))
    }

    async fn attempt(&self, prompt: &str) -> Attempt {
        let request = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retryable(format!("request to Gemini failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    "Gemini rejected the API key".to_string()
                }
                StatusCode::TOO_MANY_REQUESTS => "Gemini quota exceeded".to_string(),
                _ => format!("Gemini returned {}: {}", status, preview(&body)),
            };
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Attempt::Retryable(message)
            } else {
                Attempt::Fatal(message)
            };
        }

        match response.text().await {
            Ok(body) => Attempt::Done(body),
            Err(e) => Attempt::Retryable(format!("failed to read Gemini response: {}", e)),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.attempt(prompt).await {
                Attempt::Done(body) => return Ok(body),
                Attempt::Fatal(message) => {
                    return Err(ApiError::RecommendationError(format!(
                        "Failed to extract notes: {}",
                        message
                    )))
                }
                Attempt::Retryable(message) if attempt < attempts => {
                    let delay = backoff_delay(self.settings.retry_delay, attempt);
                    warn!(
                        "Gemini call failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        attempts,
                        message,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retryable(message) => {
                    return Err(ApiError::RecommendationError(format!(
                        "Failed to extract notes: {}",
                        message
                    )))
                }
            }
        }

        Err(ApiError::RecommendationError(
            "Failed to extract notes: no attempt was made".to_string(),
        ))
    }
}

#[async_trait]
impl NoteExtractor for GeminiNoteExtractor {
    async fn extract(&self, description: &str) -> Result<NoteSet> {
        reject_blank(description)?;
        debug!("Extracting notes from description: {}", preview(description));

        let body = self.generate(&build_prompt(description)).await?;
        let response: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::RecommendationError(format!("Failed to extract notes: malformed Gemini response: {}", e))
        })?;
        let text = response.text().ok_or_else(|| {
            ApiError::InvalidInput("Invalid AI response format: no text in the model reply".into())
        })?;

        let notes = parse_notes(&text)?;
        debug!(notes = %notes, "Notes extracted");
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    const MODEL_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn settings(base_url: String, max_attempts: u32) -> GeminiSettings {
        GeminiSettings {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url,
            temperature: 0.5,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            max_attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn gemini_reply(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })
        .to_string()
    }

    #[test]
    fn test_prompt_lists_every_category_and_the_description() {
        let prompt = build_prompt("warm evening vanilla");

        for category in NoteCategory::ALL {
            assert!(prompt.contains(&format!("[{}]", category.name())));
        }
        assert!(prompt.contains("Lily of the Valley"));
        assert!(prompt.contains("you have to give 8 notes"));
        assert!(prompt.contains("User Description:\nwarm evening vanilla"));
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let content = "```json\n{\"notes\": [\"Lemon\", \"Bergamot\", \"Mandarin Orange\", \"Green Tea\", \"Musk\", \"Vetiver\", \"Ginger\", \"Neroli\"]}\n```";
        let notes = parse_notes(content).unwrap();

        assert_eq!(
            notes.joined(),
            "Lemon Bergamot Mandarin Orange Green Tea Musk Vetiver Ginger Neroli"
        );
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        for content in [
            "I think lemon would be nice",
            r#"{"scents": ["Lemon"]}"#,
            r#"{"notes": ["Lemon", 3]}"#,
            r#"{"notes": ["Lemon", "Lime"]}"#,
            r#"{"notes": ["Lemon", "Lime", "Bergamot", "Grapefruit", "Yuzu", "Pomelo", "Calamansi", "Dragonfruit"]}"#,
        ] {
            let err = parse_notes(content).unwrap_err();
            assert!(matches!(err, ApiError::InvalidInput(_)), "{content}: {err}");
        }
    }

    #[tokio::test]
    async fn test_extracts_notes_from_gemini_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(
                json!({ "generationConfig": { "temperature": 0.5 } }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(gemini_reply(
                "```json\n{\"notes\": [\"Lemon\", \"Bergamot\", \"Mandarin Orange\", \"Green Tea\", \"Musk\", \"Vetiver\", \"Ginger\", \"Neroli\"]}\n```",
            ))
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 1)).unwrap();
        let notes = extractor.extract("fresh citrus morning scent").await.unwrap();

        mock.assert_async().await;
        assert_eq!(notes.labels().len(), NOTE_COUNT);
        assert_eq!(notes.labels()[2], "Mandarin Orange");
    }

    #[tokio::test]
    async fn test_blank_description_never_calls_out() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", MODEL_PATH)
            .expect(0)
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 1)).unwrap();
        let err = extractor.extract("   ").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_fail() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 3)).unwrap();
        let err = extractor.extract("something woody").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ApiError::RecommendationError(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_until_success() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_reply(
                r#"{"notes": ["Lemon", "Bergamot", "Mandarin Orange", "Green Tea", "Musk", "Vetiver", "Ginger", "Neroli"]}"#,
            ))
            .expect(1)
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 2)).unwrap();
        let notes = extractor.extract("fresh citrus morning scent").await.unwrap();

        limited.assert_async().await;
        ok.assert_async().await;
        assert_eq!(notes.labels()[0], "Lemon");
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let base = Duration::from_millis(500);

        assert_eq!(backoff_delay(base, 1), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 3)).unwrap();
        let err = extractor.extract("something woody").await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn test_unusable_model_text_is_invalid_input() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_reply("Sorry, I cannot help with that."))
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 1)).unwrap();
        let err = extractor.extract("something woody").await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_are_invalid_input() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", MODEL_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let extractor = GeminiNoteExtractor::new(settings(server.url(), 1)).unwrap();
        let err = extractor.extract("something woody").await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
