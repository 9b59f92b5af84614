use anyhow::{Context, Result};
use dataset::{ArtifactWriter, assemble_training_records, context_instruction_pairs};
use extract::{CompletionClient, Extractor, PipelineError, Stage};
use ingest::{DocumentSource, FileReader, FileSource, case_id_from_path};
use qa::{ChunkQaGenerator, QaGenerator};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use synthesis::{AnyMerge, CaseSynthesizer};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::metrics::{RunMetrics, TimedOperation};

#[derive(Debug)]
pub struct DocumentReport {
    pub case_id: String,
    pub out_dir: PathBuf,
    pub chunks: usize,
    pub qa_pairs: usize,
    pub training_records: usize,
    /// Context-prefixed pairs from per-chunk Q&A, 0 when that stage is off
    pub instruction_pairs: usize,
    /// False when synthesis left invariant violations in place
    pub reconcile_clean: bool,
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub case_id: String,
    pub stage: Stage,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<DocumentReport>,
    pub failed: Vec<DocumentFailure>,
}

/// Judgment file in, extraction/case/Q&A/training artifacts out
pub struct Pipeline<C> {
    source: FileSource,
    extractor: Extractor<C>,
    synthesizer: CaseSynthesizer<AnyMerge<C>>,
    qa_generator: QaGenerator<C>,
    chunk_qa: Option<ChunkQaGenerator<C>>,
    metrics: Arc<RunMetrics>,
}

impl<C: CompletionClient + Clone> Pipeline<C> {
    pub fn new(llm_client: C, config: &AppConfig, metrics: Arc<RunMetrics>) -> Self {
        let merge = AnyMerge::from_kind(
            config.synthesis.strategy,
            llm_client.clone(),
            config.tokens.synthesis,
        );

        let chunk_qa = config.chunk_qa.enabled.then(|| {
            ChunkQaGenerator::new(llm_client.clone(), config.tokens.chunk_qa, config.chunk_qa.per_chunk)
                .with_concurrency(config.concurrency.max_concurrent_extractions)
        });

        Self {
            source: FileSource::new(config.chunking.clone()),
            extractor: Extractor::new(llm_client.clone(), config.extractor_config()),
            synthesizer: CaseSynthesizer::new(merge, config.synthesis.repair),
            qa_generator: QaGenerator::new(llm_client, config.tokens.qa, config.qa_count),
            chunk_qa,
            metrics,
        }
    }

    /// Run every supported document under `input` (or `input` itself when it is a
    /// file). A failed document is logged and recorded; the others still run.
    pub async fn run_batch(&self, input: &Path, out_root: &Path) -> Result<BatchReport> {
        let per_case_dirs = input.is_dir();
        let documents = if per_case_dirs {
            FileReader::list_documents(input)
                .context(format!("Failed to list documents under {:?}", input))?
        } else {
            vec![input.to_path_buf()]
        };

        if documents.is_empty() {
            anyhow::bail!("No supported documents found under {:?}", input);
        }
        info!(documents = documents.len(), out = %out_root.display(), "Starting batch");

        let mut report = BatchReport::default();
        // case id -> first document that claimed its output directory
        let mut claimed: HashMap<String, &Path> = HashMap::new();

        for path in &documents {
            let case_id = case_id_from_path(path);
            if let Some(first) = claimed.get(&case_id) {
                let message = format!(
                    "{:?} has the same case id as {:?}; skipped to keep its artifacts",
                    path, first
                );
                warn!(case_id = %case_id, error = %message, "Duplicate case id");
                self.metrics.record_document(false);
                report.failed.push(DocumentFailure {
                    case_id,
                    stage: Stage::Ingest,
                    error: message,
                });
                continue;
            }
            claimed.insert(case_id.clone(), path.as_path());

            let out_dir = if per_case_dirs {
                out_root.join(&case_id)
            } else {
                out_root.to_path_buf()
            };

            match self.run_document(path, &out_dir).await {
                Ok(document) => {
                    self.metrics.record_document(true);
                    report.succeeded.push(document);
                }
                Err(e) => {
                    self.metrics.record_document(false);
                    let stage = failed_stage(&e);
                    let message = format!("{e:#}");
                    error!(case_id = %case_id, %stage, error = %message, "Document failed");
                    report.failed.push(DocumentFailure {
                        case_id,
                        stage,
                        error: message,
                    });
                }
            }
        }

        Ok(report)
    }

    pub async fn run_document(&self, path: &Path, out_dir: &Path) -> Result<DocumentReport> {
        let case_id = case_id_from_path(path);
        info!(case_id = %case_id, path = %path.display(), "Processing document");

        let timer = TimedOperation::start();
        let chunks = self
            .source
            .load(path)
            .await
            .map_err(|e| PipelineError::acquisition(&case_id, e))?;
        self.metrics.record_stage(Stage::Ingest, timer.elapsed());
        info!(case_id = %case_id, chunks = chunks.len(), "Document chunked");

        let timer = TimedOperation::start();
        let extractions = self.extractor.extract_all(&case_id, &chunks).await?;
        self.metrics.record_stage(Stage::Extraction, timer.elapsed());
        self.metrics.record_chunks(extractions.len());

        let writer = ArtifactWriter::new(out_dir);
        let timer = TimedOperation::start();
        writer
            .write_extractions(&extractions)
            .await
            .with_context(|| output_context(&case_id))?;
        self.metrics.record_stage(Stage::Output, timer.elapsed());

        let timer = TimedOperation::start();
        let outcome = self.synthesizer.synthesize(&case_id, &extractions).await?;
        self.metrics.record_stage(Stage::Synthesis, timer.elapsed());

        let timer = TimedOperation::start();
        writer
            .write_case(&outcome.record)
            .await
            .with_context(|| output_context(&case_id))?;
        self.metrics.record_stage(Stage::Output, timer.elapsed());

        let timer = TimedOperation::start();
        let qa_pairs = self.qa_generator.generate(&outcome.record).await?;
        self.metrics.record_stage(Stage::QaGeneration, timer.elapsed());

        let timer = TimedOperation::start();
        writer
            .write_qa(&qa_pairs)
            .await
            .with_context(|| output_context(&case_id))?;

        let chunk_texts: Vec<&str> = chunks.iter().map(|c| c.contextualized.as_str()).collect();
        let training = assemble_training_records(&chunk_texts, &extractions, &outcome.record, &qa_pairs)
            .with_context(|| output_context(&case_id))?;
        writer
            .write_training(&training)
            .await
            .with_context(|| output_context(&case_id))?;
        self.metrics.record_stage(Stage::Output, timer.elapsed());
        self.metrics.record_outputs(qa_pairs.len(), training.len());

        let mut instruction_pairs = 0;
        if let Some(chunk_qa) = &self.chunk_qa {
            let timer = TimedOperation::start();
            let sets = chunk_qa.generate_all(&case_id, &chunks).await?;
            self.metrics.record_stage(Stage::QaGeneration, timer.elapsed());

            let timer = TimedOperation::start();
            let instructions = context_instruction_pairs(&sets);
            writer
                .write_chunk_qa(&sets)
                .await
                .with_context(|| output_context(&case_id))?;
            writer
                .write_instructions(&instructions)
                .await
                .with_context(|| output_context(&case_id))?;
            self.metrics.record_stage(Stage::Output, timer.elapsed());
            self.metrics.record_instructions(instructions.len());
            instruction_pairs = instructions.len();
        }

        info!(
            case_id = %case_id,
            chunks = chunks.len(),
            qa_pairs = qa_pairs.len(),
            training_records = training.len(),
            instruction_pairs,
            out = %out_dir.display(),
            "Document complete"
        );

        Ok(DocumentReport {
            case_id,
            out_dir: out_dir.to_path_buf(),
            chunks: chunks.len(),
            qa_pairs: qa_pairs.len(),
            training_records: training.len(),
            instruction_pairs,
            reconcile_clean: outcome.report.is_clean(),
        })
    }
}

fn output_context(case_id: &str) -> String {
    format!("{} [{case_id}]: failed to produce artifacts", Stage::Output)
}

/// Stage a document run failed in; anything that is not a pipeline error happened
/// while producing artifacts
pub fn failed_stage(err: &anyhow::Error) -> Stage {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::stage)
        .unwrap_or(Stage::Output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::{read_json, read_jsonl};
    use extract::mock::MockClient;
    use extract::{CaseRecord, ChunkExtraction, ChunkQa, InstructionPair, LlmError, QaPair, TrainingRecord};
    use ingest::ChunkerConfig;
    use synthesis::MergeKind;

    const JUDGMENT: &str = "# Facts\n\nThe plaintiff bought land at Kwabenya.\n\u{000C}# Judgment\n\nThe appeal is dismissed.\n";

    fn config(strategy: MergeKind) -> AppConfig {
        let mut config = AppConfig::default();
        config.chunking = ChunkerConfig {
            target_tokens_min: 1,
            target_tokens_max: 900,
        };
        config.synthesis.strategy = strategy;
        config.qa_count = 1;
        config
    }

    /// Answers each stage's prompt the way a well-behaved model would
    fn scripted_model() -> MockClient {
        MockClient::from_fn(|prompt| {
            if prompt.starts_with("You are a judicial law clerk") {
                if prompt.contains("Kwabenya") {
                    Ok(r#"{"case_id": "x", "facts": ["A"], "timeline": [{"date": "2024-02-01", "event": "Filed", "source": "[p. 1]"}]}"#.to_string())
                } else {
                    Ok(r#"```json
{"case_id": "x", "facts": ["B"], "orders": ["Appeal dismissed"], "timeline": [{"date": "2024-01-01", "event": "Incident", "source": "[p. 2]"}]}
```"#.to_string())
                }
            } else if prompt.starts_with("Generate ") {
                Ok(r#"{"generated": [{"question": "What is described?", "answer": "The passage"}]}"#.to_string())
            } else if prompt.starts_with("Create ") {
                Ok(r#"[{"question": "What was ordered?", "answer": "Appeal dismissed", "source": "[p. 2]"}]"#.to_string())
            } else {
                Err(LlmError::Other("unexpected prompt".to_string()))
            }
        })
    }

    fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn single_document_produces_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_doc(dir.path(), "acheamfour_(J4-03-2024).txt", JUDGMENT);
        let out = dir.path().join("out");

        let pipeline = Pipeline::new(scripted_model(), &config(MergeKind::Deterministic), RunMetrics::new());
        let report = pipeline.run_document(&doc, &out).await.unwrap();

        assert_eq!(report.case_id, "acheamfour_(J4-03-2024)");
        assert_eq!(report.chunks, 2);
        assert_eq!(report.training_records, 4);

        let extractions: Vec<ChunkExtraction> = read_jsonl(&out.join("extracted.jsonl")).await.unwrap();
        assert_eq!(extractions.len(), 2);
        assert!(extractions.iter().all(|e| e.case_id == "acheamfour_(J4-03-2024)"));
        assert_eq!(extractions[1].pages, "p. 2");

        let case: CaseRecord = read_json(&out.join("case_structured.json")).await.unwrap();
        assert!(case.facts.contains(&"A".to_string()));
        assert!(case.facts.contains(&"B".to_string()));
        let dates: Vec<&str> = case.timeline.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-02-01"]);

        let qa: Vec<QaPair> = read_json(&out.join("qa.json")).await.unwrap();
        assert_eq!(qa.len(), 1);

        let train: Vec<TrainingRecord> = read_jsonl(&out.join("train.jsonl")).await.unwrap();
        assert_eq!(train.len(), extractions.len() + 2);
        assert!(train[0].input.starts_with("Facts\n"));

        assert_eq!(report.instruction_pairs, 0);
        assert!(!out.join("instruction.json").exists());
    }

    #[tokio::test]
    async fn chunk_qa_stage_writes_context_prefixed_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_doc(dir.path(), "case.txt", JUDGMENT);
        let out = dir.path().join("out");

        let mut config = config(MergeKind::Deterministic);
        config.chunk_qa.enabled = true;
        config.chunk_qa.per_chunk = 1;

        let client = scripted_model();
        let pipeline = Pipeline::new(client.clone(), &config, RunMetrics::new());
        let report = pipeline.run_document(&doc, &out).await.unwrap();
        assert_eq!(report.instruction_pairs, 2);

        let sets: Vec<ChunkQa> = read_json(&out.join("chunk_qa.json")).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].pages, "p. 2");

        let instructions: Vec<InstructionPair> = read_json(&out.join("instruction.json")).await.unwrap();
        assert_eq!(
            instructions[0].question,
            "Context: Facts\nThe plaintiff bought land at Kwabenya. What is described?"
        );
        assert_eq!(instructions[1].answer, "The passage");

        let chunk_prompts = client
            .calls()
            .iter()
            .filter(|(prompt, _)| prompt.starts_with("Generate 1 question"))
            .count();
        assert_eq!(chunk_prompts, 2);
    }

    #[tokio::test]
    async fn extraction_failure_stops_before_later_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_doc(dir.path(), "case.txt", JUDGMENT);
        let out = dir.path().join("out");

        let client = MockClient::from_fn(|_| Ok("I could not find any facts.".to_string()));
        let pipeline = Pipeline::new(client, &config(MergeKind::Llm), RunMetrics::new());

        let err = pipeline.run_document(&doc, &out).await.unwrap_err();
        assert_eq!(failed_stage(&err), Stage::Extraction);
        assert!(!out.join("case_structured.json").exists());
        assert!(!out.join("qa.json").exists());
    }

    #[tokio::test]
    async fn batch_isolates_failing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cases");
        std::fs::create_dir_all(&input).unwrap();
        write_doc(&input, "a_good.txt", JUDGMENT);
        write_doc(&input, "b_blank.txt", "   \n\n");
        write_doc(&input, "notes.docx", "ignored");
        let out = dir.path().join("out");

        let metrics = RunMetrics::new();
        let pipeline = Pipeline::new(scripted_model(), &config(MergeKind::Deterministic), metrics.clone());
        let report = pipeline.run_batch(&input, &out).await.unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].out_dir, out.join("a_good"));
        assert!(out.join("a_good").join("train.jsonl").exists());

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].case_id, "b_blank");
        assert_eq!(report.failed[0].stage, Stage::Ingest);

        let snapshot = metrics.snapshot(crate::cache::CacheStats {
            enabled: false,
            responses_cached: 0,
            hits: 0,
            misses: 0,
        });
        assert_eq!(snapshot.documents_succeeded, 1);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.chunks_extracted, 2);
    }

    #[tokio::test]
    async fn shared_case_id_does_not_overwrite_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cases");
        std::fs::create_dir_all(&input).unwrap();
        write_doc(&input, "case.md", JUDGMENT);
        write_doc(&input, "case.txt", JUDGMENT);
        let out = dir.path().join("out");

        let pipeline = Pipeline::new(scripted_model(), &config(MergeKind::Deterministic), RunMetrics::new());
        let report = pipeline.run_batch(&input, &out).await.unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].out_dir, out.join("case"));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].case_id, "case");
        assert_eq!(report.failed[0].stage, Stage::Ingest);
        assert!(report.failed[0].error.contains("case.txt"));
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(scripted_model(), &config(MergeKind::Deterministic), RunMetrics::new());
        assert!(pipeline.run_batch(dir.path(), &dir.path().join("out")).await.is_err());
    }
}
