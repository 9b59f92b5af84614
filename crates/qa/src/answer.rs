use extract::prompt::NOT_FOUND_ANSWER;
use extract::{CaseAnswer, CaseRecord, CompletionClient, PipelineError, Result, Stage, prompt, request_json};
use tracing::info;

/// Answers free-text questions strictly from a case record
pub struct CaseAnswerer<C> {
    llm_client: C,
    max_tokens: usize,
}

impl<C: CompletionClient> CaseAnswerer<C> {
    pub fn new(llm_client: C, max_tokens: usize) -> Self {
        Self {
            llm_client,
            max_tokens,
        }
    }

    pub async fn answer(&self, question: &str, case: &CaseRecord) -> Result<CaseAnswer> {
        if case.is_empty() {
            info!(case_id = %case.case_id, "Case record is empty; nothing to answer from");
            return Ok(not_found());
        }

        let case_json = serde_json::to_string(case).map_err(|e| PipelineError::SchemaViolation {
            stage: Stage::Answering,
            locator: case.case_id.clone(),
            detail: format!("case record could not be serialized: {e}"),
        })?;

        let prompt = prompt::build_answer_prompt(question, &case_json);
        let answer: CaseAnswer = request_json(
            &self.llm_client,
            &prompt,
            self.max_tokens,
            Stage::Answering,
            &case.case_id,
        )
        .await?;

        Ok(canonicalize(answer))
    }
}

fn not_found() -> CaseAnswer {
    CaseAnswer {
        answer: NOT_FOUND_ANSWER.to_string(),
        support: Vec::new(),
        fields_consulted: Vec::new(),
        confidence: 0.0,
    }
}

/// True when `answer` is the "not found" sentinel, give or take surrounding
/// whitespace and quotes
pub fn is_not_found(answer: &str) -> bool {
    answer.trim().trim_matches(|c| c == '"' || c == '\'').trim() == NOT_FOUND_ANSWER
}

/// Rewrite near-miss sentinels to the exact string; an ungrounded answer has no support
fn canonicalize(mut answer: CaseAnswer) -> CaseAnswer {
    if is_not_found(&answer.answer) {
        answer.answer = NOT_FOUND_ANSWER.to_string();
        answer.support.clear();
    }
    answer.confidence = answer.confidence.clamp(0.0, 1.0);
    answer
}
