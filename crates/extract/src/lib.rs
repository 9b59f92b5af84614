pub mod decoder;
pub mod error;
pub mod llm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod normalizer;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use decoder::{DecodeError, decode, decode_value, strip_code_fence};
pub use error::{LlmError, PipelineError, Result, Stage};
pub use llm::{CompletionClient, OllamaClient, OllamaConfig, ProgressFn};
pub use normalizer::EntityNormalizer;
pub use retry::{RetryConfig, RetryPolicy};
pub use schema::{
    CaseAnswer, CaseRecord, CaseSummary, ChunkExtraction, ChunkQa, GeneratedPairs,
    InstructionPair, Irac, Parties, QaPair, Quote, TimelineEntry, TrainingRecord,
};

use futures::{StreamExt, TryStreamExt, stream};
use ingest::Chunk;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Call the completion service once and decode the response into `T`
pub async fn request_json<C, T>(
    client: &C,
    prompt: &str,
    max_tokens: usize,
    stage: Stage,
    locator: &str,
) -> Result<T>
where
    C: CompletionClient,
    T: DeserializeOwned,
{
    let started = Instant::now();
    let raw = client
        .complete(prompt, max_tokens)
        .await
        .map_err(|e| PipelineError::completion(stage, locator, e))?;

    debug!(
        %stage,
        locator,
        model = client.model(),
        response_chars = raw.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Completion received"
    );

    decode(&raw).map_err(|e| PipelineError::decode(stage, locator, e))
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Token budget per chunk; must fit 20 items across every list field
    pub max_tokens: usize,
    /// Chunks extracted at once; 1 processes the document strictly in order
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
    /// On unparseable output, ask the model once to repair its own JSON
    pub repair_malformed: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2500,
            max_concurrent: 1,
            retry: RetryPolicy::none(),
            repair_malformed: false,
        }
    }
}

/// Chunk extraction stage: one [`ChunkExtraction`] per chunk, in document order
pub struct Extractor<C> {
    llm_client: C,
    config: ExtractorConfig,
}

impl<C: CompletionClient> Extractor<C> {
    pub fn new(llm_client: C, config: ExtractorConfig) -> Self {
        Self { llm_client, config }
    }

    /// Extract every chunk. Results come back in chunk order even when several
    /// chunks are in flight; the first failure aborts the rest.
    pub async fn extract_all(&self, case_id: &str, chunks: &[Chunk]) -> Result<Vec<ChunkExtraction>> {
        let concurrency = self.config.max_concurrent.max(1);
        info!(case_id, chunks = chunks.len(), concurrency, "Extracting chunks");

        stream::iter(chunks)
            .map(|chunk| self.extract_chunk(case_id, chunk))
            .buffered(concurrency)
            .try_collect()
            .await
    }

    /// Extract a single chunk, retrying per the configured policy
    pub async fn extract_chunk(&self, case_id: &str, chunk: &Chunk) -> Result<ChunkExtraction> {
        let locator = chunk.locator();
        let prompt = prompt::build_chunk_extraction_prompt(&chunk.contextualized, case_id, &locator);
        let label = format!("chunk {} ({})", chunk.ordinal, locator);

        let started = Instant::now();
        let extraction = self
            .config
            .retry
            .retry("chunk_extraction", || self.attempt(&prompt, &label))
            .await?;

        info!(
            case_id,
            chunk = chunk.ordinal,
            pages = %locator,
            input_tokens = chunk.estimated_tokens(),
            facts = extraction.facts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chunk extracted"
        );

        Ok(normalize_extraction(extraction, case_id, &locator))
    }

    async fn attempt(&self, prompt: &str, label: &str) -> Result<ChunkExtraction> {
        let raw = self
            .llm_client
            .complete(prompt, self.config.max_tokens)
            .await
            .map_err(|e| PipelineError::completion(Stage::Extraction, label, e))?;

        match decode::<ChunkExtraction>(&raw) {
            Ok(extraction) => Ok(extraction),
            Err(DecodeError::Malformed { .. }) if self.config.repair_malformed => {
                warn!(chunk = label, "Malformed extraction, asking model to repair it");
                let repair_prompt = prompt::build_retry_prompt(&raw);
                request_json(
                    &self.llm_client,
                    &repair_prompt,
                    self.config.max_tokens,
                    Stage::Extraction,
                    label,
                )
                .await
            }
            Err(e) => Err(PipelineError::decode(Stage::Extraction, label, e)),
        }
    }
}

/// Pin the fields the pipeline, not the model, is authoritative for
fn normalize_extraction(mut extraction: ChunkExtraction, case_id: &str, locator: &str) -> ChunkExtraction {
    if extraction.case_id != case_id {
        warn!(
            expected = case_id,
            found = %extraction.case_id,
            pages = locator,
            "Extraction echoed a different case id; overriding"
        );
        extraction.case_id = case_id.to_string();
    }

    if extraction.pages.trim().is_empty() {
        extraction.pages = locator.to_string();
    }

    if !(0.0..=1.0).contains(&extraction.confidence) {
        warn!(pages = locator, confidence = extraction.confidence, "Confidence out of range; clamping");
        extraction.confidence = if extraction.confidence.is_nan() {
            0.0
        } else {
            extraction.confidence.clamp(0.0, 1.0)
        };
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClient;
    use std::time::Duration;

    fn chunk(ordinal: usize, text: &str) -> Chunk {
        Chunk::new(ordinal, text.to_string(), &[], None)
    }

    fn extraction_json(case_id: &str, fact: &str) -> String {
        format!(r#"{{"case_id": "{case_id}", "chunk_summary": "s", "facts": ["{fact}"], "confidence": 0.9}}"#)
    }

    #[tokio::test]
    async fn extracts_each_chunk_with_budget_and_locator() {
        let client = MockClient::with_responses(vec![
            extraction_json("case-1", "A [p1]"),
            format!("```json\n{}\n```", extraction_json("case-1", "B [p2]")),
        ]);
        let extractor = Extractor::new(client.clone(), ExtractorConfig::default());

        let chunks = vec![chunk(0, "first"), chunk(1, "second")];
        let extractions = extractor.extract_all("case-1", &chunks).await.unwrap();

        assert_eq!(extractions.len(), 2);
        assert_eq!(extractions[0].facts, vec!["A [p1]"]);
        assert_eq!(extractions[1].facts, vec!["B [p2]"]);
        assert_eq!(extractions[1].pages, "chunk-1");

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 2500);
        assert!(calls[0].0.contains(r#""pages": "chunk-0""#));
        assert!(calls[1].0.ends_with("Text:\nsecond"));
    }

    #[tokio::test]
    async fn concurrent_extraction_preserves_chunk_order() {
        let client = MockClient::from_fn(|prompt| {
            let fact = if prompt.ends_with("slow") { "slow" } else { "fast" };
            Ok(extraction_json("c", fact))
        })
        .with_delay(|prompt| {
            if prompt.ends_with("slow") {
                Duration::from_millis(50)
            } else {
                Duration::from_millis(1)
            }
        });

        let config = ExtractorConfig {
            max_concurrent: 4,
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(client, config);
        let chunks = vec![chunk(0, "slow"), chunk(1, "fast"), chunk(2, "fast")];

        let extractions = extractor.extract_all("c", &chunks).await.unwrap();
        let facts: Vec<_> = extractions.iter().map(|e| e.facts[0].as_str()).collect();
        assert_eq!(facts, vec!["slow", "fast", "fast"]);
    }

    #[tokio::test]
    async fn malformed_response_aborts_with_locator() {
        let client = MockClient::with_responses(vec![
            extraction_json("c", "A"),
            "I could not find any facts.".to_string(),
            extraction_json("c", "C"),
        ]);
        let extractor = Extractor::new(client.clone(), ExtractorConfig::default());
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];

        let err = extractor.extract_all("c", &chunks).await.unwrap_err();
        match &err {
            PipelineError::MalformedResponse { stage, locator, .. } => {
                assert_eq!(*stage, Stage::Extraction);
                assert_eq!(locator, "chunk 1 (chunk-1)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn mistyped_fields_are_schema_violations() {
        let client = MockClient::with_responses(vec![r#"{"case_id": "c", "facts": 3}"#]);
        let extractor = Extractor::new(client, ExtractorConfig::default());

        let err = extractor.extract_chunk("c", &chunk(0, "a")).await.unwrap_err();
        assert!(matches!(err, PipelineError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn retries_recover_from_a_bad_response() {
        let client = MockClient::with_responses(vec![
            "not json".to_string(),
            extraction_json("c", "A"),
        ]);
        let config = ExtractorConfig {
            retry: RetryPolicy::new(2, 1, 2),
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(client.clone(), config);

        let extraction = extractor.extract_chunk("c", &chunk(0, "a")).await.unwrap();
        assert_eq!(extraction.facts, vec!["A"]);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn repair_prompt_is_sent_for_malformed_output() {
        let client = MockClient::with_responses(vec![
            r#"{"case_id": "c", "facts": ["A"],}"#.to_string(),
            extraction_json("c", "A"),
        ]);
        let config = ExtractorConfig {
            repair_malformed: true,
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(client.clone(), config);

        extractor.extract_chunk("c", &chunk(0, "a")).await.unwrap();
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0.starts_with("The following JSON is invalid"));
    }

    #[tokio::test]
    async fn pipeline_owned_fields_are_normalized() {
        let client = MockClient::with_responses(vec![
            r#"{"case_id": "other", "pages": "", "confidence": 7.5}"#,
        ]);
        let extractor = Extractor::new(client, ExtractorConfig::default());
        let paged = Chunk::new(3, "t".to_string(), &[], Some("pp. 4–5".to_string()));

        let extraction = extractor.extract_chunk("case-9", &paged).await.unwrap();
        assert_eq!(extraction.case_id, "case-9");
        assert_eq!(extraction.pages, "pp. 4–5");
        assert_eq!(extraction.confidence, 1.0);
    }

    #[tokio::test]
    async fn completion_failures_carry_stage() {
        let extractor = Extractor::new(MockClient::failing(), ExtractorConfig::default());
        let err = extractor.extract_chunk("c", &chunk(0, "a")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Completion { stage: Stage::Extraction, .. }));
    }
}
