use extract::{
    CaseRecord, ChunkExtraction, CompletionClient, Irac, PipelineError, Result, Stage, prompt,
    request_json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{info, warn};

use crate::reconcile;

const HEADNOTE_MAX_WORDS: usize = 250;

/// Turns the ordered chunk extractions of one document into a single case record
pub trait MergeStrategy: Send + Sync {
    fn merge(
        &self,
        case_id: &str,
        extractions: &[ChunkExtraction],
    ) -> impl Future<Output = Result<CaseRecord>> + Send;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    /// Let the model deduplicate and reconcile (default)
    #[default]
    Llm,
    /// Concatenate chunk records in document order; no completion call
    Deterministic,
}

/// Merge by asking the completion service to write the case record
pub struct LlmMerge<C> {
    llm_client: C,
    max_tokens: usize,
}

impl<C: CompletionClient> LlmMerge<C> {
    pub fn new(llm_client: C, max_tokens: usize) -> Self {
        Self {
            llm_client,
            max_tokens,
        }
    }
}

impl<C: CompletionClient> MergeStrategy for LlmMerge<C> {
    async fn merge(&self, case_id: &str, extractions: &[ChunkExtraction]) -> Result<CaseRecord> {
        let chunks_json = serde_json::to_string(extractions).map_err(|e| {
            PipelineError::SchemaViolation {
                stage: Stage::Synthesis,
                locator: case_id.to_string(),
                detail: format!("chunk extractions could not be serialized: {e}"),
            }
        })?;

        let prompt = prompt::build_case_synthesis_prompt(&chunks_json, case_id);
        info!(case_id, chunks = extractions.len(), prompt_chars = prompt.len(), "Synthesizing case");

        let mut record: CaseRecord = request_json(
            &self.llm_client,
            &prompt,
            self.max_tokens,
            Stage::Synthesis,
            case_id,
        )
        .await?;

        if record.case_id != case_id {
            warn!(expected = case_id, found = %record.case_id, "Synthesis echoed a different case id; overriding");
            record.case_id = case_id.to_string();
        }

        Ok(record)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Merge without a model: lists concatenated in chunk order, then reconciled
pub struct DeterministicMerge;

impl DeterministicMerge {
    pub fn merge_now(case_id: &str, extractions: &[ChunkExtraction]) -> CaseRecord {
        let mut record = CaseRecord {
            case_id: case_id.to_string(),
            ..CaseRecord::default()
        };

        for extraction in extractions {
            record.facts.extend_from_slice(&extraction.facts);
            record.procedural_history.extend_from_slice(&extraction.procedural_history);
            record.issues.extend_from_slice(&extraction.issues);
            record.holdings.extend_from_slice(&extraction.holdings);
            record.rules.extend_from_slice(&extraction.rules);
            record.reasoning.extend_from_slice(&extraction.reasoning);
            record.orders.extend_from_slice(&extraction.orders);
            record.citations.extend_from_slice(&extraction.citations);
            record.entities.extend_from_slice(&extraction.entities);
            record.parties.plaintiffs.extend_from_slice(&extraction.parties.plaintiffs);
            record.parties.defendants.extend_from_slice(&extraction.parties.defendants);
            record.parties.judges.extend_from_slice(&extraction.parties.judges);
            record.timeline.extend_from_slice(&extraction.timeline);
            record.key_quotes.extend_from_slice(&extraction.quotes);
        }

        reconcile::repair(&mut record);

        record.headnote = headnote_from_summaries(extractions);
        record.disposition = record.orders.last().cloned().unwrap_or_default();
        record.summary_irac = Irac {
            issue: record.issues.clone(),
            rule: record.rules.clone(),
            analysis: record.reasoning.clone(),
            conclusion: record.holdings.clone(),
        };

        record
    }
}

impl MergeStrategy for DeterministicMerge {
    async fn merge(&self, case_id: &str, extractions: &[ChunkExtraction]) -> Result<CaseRecord> {
        Ok(Self::merge_now(case_id, extractions))
    }

    fn name(&self) -> &'static str {
        "deterministic"
    }
}

/// Chunk summaries in document order, cut at the headnote word limit
fn headnote_from_summaries(extractions: &[ChunkExtraction]) -> String {
    extractions
        .iter()
        .flat_map(|e| e.chunk_summary.split_whitespace())
        .take(HEADNOTE_MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merge strategy picked at runtime from configuration
pub enum AnyMerge<C> {
    Llm(LlmMerge<C>),
    Deterministic(DeterministicMerge),
}

impl<C: CompletionClient> AnyMerge<C> {
    pub fn from_kind(kind: MergeKind, llm_client: C, max_tokens: usize) -> Self {
        match kind {
            MergeKind::Llm => AnyMerge::Llm(LlmMerge::new(llm_client, max_tokens)),
            MergeKind::Deterministic => AnyMerge::Deterministic(DeterministicMerge),
        }
    }
}

impl<C: CompletionClient> MergeStrategy for AnyMerge<C> {
    async fn merge(&self, case_id: &str, extractions: &[ChunkExtraction]) -> Result<CaseRecord> {
        match self {
            AnyMerge::Llm(merge) => merge.merge(case_id, extractions).await,
            AnyMerge::Deterministic(merge) => merge.merge(case_id, extractions).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AnyMerge::Llm(merge) => merge.name(),
            AnyMerge::Deterministic(merge) => merge.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::TimelineEntry;
    use extract::mock::MockClient;

    fn extraction(fact: &str, summary: &str, date: &str, event: &str) -> ChunkExtraction {
        ChunkExtraction {
            case_id: "c".to_string(),
            chunk_summary: summary.to_string(),
            facts: vec![fact.to_string()],
            timeline: vec![TimelineEntry {
                date: date.to_string(),
                event: event.to_string(),
                source: "[p1]".to_string(),
            }],
            ..ChunkExtraction::default()
        }
    }

    #[test]
    fn deterministic_merge_concatenates_and_orders() {
        let extractions = vec![
            ChunkExtraction {
                orders: vec!["Appeal allowed in part".to_string()],
                quotes: vec![extract::Quote {
                    text: "q".to_string(),
                    source: "[p 1]".to_string(),
                }],
                ..extraction("A", "First chunk.", "2024-02-01", "Filed")
            },
            ChunkExtraction {
                orders: vec!["Costs of GH¢10,000 to respondent".to_string()],
                ..extraction("B", "Second chunk.", "2024-01-01", "Incident")
            },
        ];

        let record = DeterministicMerge::merge_now("case-1", &extractions);

        assert_eq!(record.case_id, "case-1");
        assert_eq!(record.facts, vec!["A", "B"]);
        assert_eq!(record.timeline[0].date, "2024-01-01");
        assert_eq!(record.timeline[1].date, "2024-02-01");
        assert_eq!(record.headnote, "First chunk. Second chunk.");
        assert_eq!(record.disposition, "Costs of GH¢10,000 to respondent");
        assert_eq!(record.key_quotes.len(), 1);
    }

    #[test]
    fn headnote_is_capped() {
        let long = "word ".repeat(400);
        let extractions = vec![extraction("A", &long, "", "x")];
        let record = DeterministicMerge::merge_now("c", &extractions);
        assert_eq!(record.headnote.split_whitespace().count(), HEADNOTE_MAX_WORDS);
    }

    #[tokio::test]
    async fn llm_merge_sends_all_chunks_with_synthesis_budget() {
        let client = MockClient::with_responses(vec![
            r#"{"case_id": "case-1", "headnote": "h", "facts": ["A", "B"]}"#,
        ]);
        let merge = LlmMerge::new(client.clone(), 3000);
        let extractions = vec![
            extraction("A", "s", "2024-02-01", "Filed"),
            extraction("B", "s", "2024-01-01", "Incident"),
        ];

        let record = merge.merge("case-1", &extractions).await.unwrap();
        assert_eq!(record.facts, vec!["A", "B"]);

        let calls = client.calls();
        assert_eq!(calls[0].1, 3000);
        assert!(calls[0].0.contains(r#""facts":["A"]"#));
        assert!(calls[0].0.contains(r#""facts":["B"]"#));
    }

    #[tokio::test]
    async fn llm_merge_surfaces_malformed_output() {
        let client = MockClient::with_responses(vec!["Here is the merged case: {"]);
        let merge = LlmMerge::new(client, 3000);

        let err = merge.merge("case-1", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedResponse { stage: Stage::Synthesis, .. }
        ));
    }
}
