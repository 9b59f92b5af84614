use extract::{CaseRecord, CompletionClient, PipelineError, QaPair, Result, Stage, prompt, request_json};
use tracing::{info, warn};

/// Generates short question/answer pairs grounded in one case record
pub struct QaGenerator<C> {
    llm_client: C,
    max_tokens: usize,
    count: usize,
}

impl<C: CompletionClient> QaGenerator<C> {
    pub fn new(llm_client: C, max_tokens: usize, count: usize) -> Self {
        Self {
            llm_client,
            max_tokens,
            count,
        }
    }

    pub async fn generate(&self, case: &CaseRecord) -> Result<Vec<QaPair>> {
        let case_json = serde_json::to_string(case).map_err(|e| PipelineError::SchemaViolation {
            stage: Stage::QaGeneration,
            locator: case.case_id.clone(),
            detail: format!("case record could not be serialized: {e}"),
        })?;

        let prompt = prompt::build_qa_prompt(&case_json, self.count);
        let pairs: Vec<QaPair> = request_json(
            &self.llm_client,
            &prompt,
            self.max_tokens,
            Stage::QaGeneration,
            &case.case_id,
        )
        .await?;

        // Blank pairs carry nothing to train on
        let total = pairs.len();
        let pairs: Vec<QaPair> = pairs
            .into_iter()
            .filter(|p| !p.question.trim().is_empty() && !p.answer.trim().is_empty())
            .collect();

        if pairs.len() < total {
            warn!(case_id = %case.case_id, dropped = total - pairs.len(), "Dropped blank Q&A pairs");
        }
        if pairs.len() != self.count {
            warn!(case_id = %case.case_id, requested = self.count, received = pairs.len(), "Q&A count differs from request");
        }

        info!(case_id = %case.case_id, pairs = pairs.len(), "Q&A pairs generated");
        Ok(pairs)
    }
}
