use extract::{CaseSummary, CompletionClient, Result, Stage, prompt, request_json};
use tracing::info;

/// Single-pass headnote + IRAC for a judgment short enough to fit one prompt
pub struct CaseSummarizer<C> {
    llm_client: C,
    max_tokens: usize,
    target_words: usize,
}

impl<C: CompletionClient> CaseSummarizer<C> {
    pub fn new(llm_client: C, max_tokens: usize, target_words: usize) -> Self {
        Self {
            llm_client,
            max_tokens,
            target_words,
        }
    }

    /// Generate a summary for the full judgment text
    pub async fn summarize(&self, case_id: &str, text: &str) -> Result<CaseSummary> {
        let prompt = prompt::build_full_case_summary_prompt(text, self.target_words);
        info!(case_id, words = text.split_whitespace().count(), "Summarizing judgment in one pass");

        let mut summary: CaseSummary =
            request_json(&self.llm_client, &prompt, self.max_tokens, Stage::Summary, case_id).await?;
        summary.headnote = summary.headnote.trim().to_string();

        Ok(summary)
    }
}
