use extract::{ChunkQa, CompletionClient, GeneratedPairs, QaPair, Result, Stage, prompt, request_json};
use futures::{StreamExt, TryStreamExt, stream};
use ingest::Chunk;
use tracing::{debug, info};

/// Generates question/answer pairs from each chunk's own text
pub struct ChunkQaGenerator<C> {
    llm_client: C,
    max_tokens: usize,
    per_chunk: usize,
    max_concurrent: usize,
}

impl<C: CompletionClient> ChunkQaGenerator<C> {
    pub fn new(llm_client: C, max_tokens: usize, per_chunk: usize) -> Self {
        Self {
            llm_client,
            max_tokens,
            per_chunk,
            max_concurrent: 1,
        }
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// One [`ChunkQa`] per chunk, in chunk order; the first failure aborts the rest
    pub async fn generate_all(&self, case_id: &str, chunks: &[Chunk]) -> Result<Vec<ChunkQa>> {
        info!(case_id, chunks = chunks.len(), per_chunk = self.per_chunk, "Generating chunk Q&A");

        let sets: Vec<ChunkQa> = stream::iter(chunks)
            .map(|chunk| self.generate(chunk))
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let pairs: usize = sets.iter().map(|s| s.generated.len()).sum();
        info!(case_id, pairs, "Chunk Q&A generated");
        Ok(sets)
    }

    pub async fn generate(&self, chunk: &Chunk) -> Result<ChunkQa> {
        let locator = chunk.locator();
        let prompt = prompt::build_chunk_qa_prompt(&chunk.contextualized, self.per_chunk);
        let label = format!("chunk {} ({})", chunk.ordinal, locator);

        let response: GeneratedPairs =
            request_json(&self.llm_client, &prompt, self.max_tokens, Stage::QaGeneration, &label).await?;

        let generated: Vec<QaPair> = response
            .generated
            .into_iter()
            .filter(|p| !p.question.trim().is_empty() && !p.answer.trim().is_empty())
            .map(|mut p| {
                if p.source.trim().is_empty() {
                    p.source = locator.clone();
                }
                p
            })
            .collect();

        debug!(chunk = chunk.ordinal, pages = %locator, pairs = generated.len(), "Chunk Q&A");

        Ok(ChunkQa {
            chunk: chunk.ordinal,
            pages: locator,
            context: chunk.contextualized.clone(),
            generated,
        })
    }
}
