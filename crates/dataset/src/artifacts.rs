use anyhow::{Context, Result};
use extract::{CaseRecord, ChunkExtraction, ChunkQa, InstructionPair, QaPair, TrainingRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub const EXTRACTED_FILE: &str = "extracted.jsonl";
pub const CASE_FILE: &str = "case_structured.json";
pub const QA_FILE: &str = "qa.json";
pub const TRAIN_FILE: &str = "train.jsonl";
pub const CHUNK_QA_FILE: &str = "chunk_qa.json";
pub const INSTRUCTION_FILE: &str = "instruction.json";

/// Writes the per-case output files. Each file is written to a temporary
/// sibling and renamed into place, so readers never see a partial artifact.
pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub async fn write_extractions(&self, extractions: &[ChunkExtraction]) -> Result<PathBuf> {
        self.write_jsonl(EXTRACTED_FILE, extractions).await
    }

    pub async fn write_case(&self, case: &CaseRecord) -> Result<PathBuf> {
        self.write_pretty(CASE_FILE, case).await
    }

    pub async fn write_qa(&self, qa_pairs: &[QaPair]) -> Result<PathBuf> {
        self.write_pretty(QA_FILE, qa_pairs).await
    }

    pub async fn write_training(&self, records: &[TrainingRecord]) -> Result<PathBuf> {
        self.write_jsonl(TRAIN_FILE, records).await
    }

    pub async fn write_chunk_qa(&self, sets: &[ChunkQa]) -> Result<PathBuf> {
        self.write_pretty(CHUNK_QA_FILE, sets).await
    }

    pub async fn write_instructions(&self, pairs: &[InstructionPair]) -> Result<PathBuf> {
        self.write_pretty(INSTRUCTION_FILE, pairs).await
    }

    /// One compact JSON object per line
    pub async fn write_jsonl<T: Serialize>(&self, name: &str, items: &[T]) -> Result<PathBuf> {
        let mut body = String::new();
        for item in items {
            body.push_str(&serde_json::to_string(item).context("Failed to serialize JSONL record")?);
            body.push('\n');
        }
        self.write_atomic(name, body.as_bytes()).await
    }

    pub async fn write_pretty<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let body = serde_json::to_string_pretty(value).context("Failed to serialize JSON artifact")?;
        self.write_atomic(name, body.as_bytes()).await
    }

    async fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .await
            .context(format!("Failed to create output directory: {:?}", self.out_dir))?;

        let target = self.out_dir.join(name);
        let staging = self.out_dir.join(format!("{name}.tmp"));

        fs::write(&staging, bytes)
            .await
            .context(format!("Failed to write file: {:?}", staging))?;
        fs::rename(&staging, &target)
            .await
            .context(format!("Failed to move {:?} into place", staging))?;

        info!(path = %target.display(), bytes = bytes.len(), "Artifact written");
        Ok(target)
    }
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .context(format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).context(format!("Failed to parse JSON in {:?}", path))
}

pub async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .await
        .context(format!("Failed to read file: {:?}", path))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).context(format!("Failed to parse line {} of {:?}", i + 1, path))
        })
        .collect()
}
