use acquire::AcquireConfig;
use anyhow::{Context, Result};
use extract::{ExtractorConfig, OllamaConfig, RetryConfig, RetryPolicy};
use ingest::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use synthesis::MergeKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: OllamaConfig,
    pub tokens: TokenBudgets,
    pub chunking: ChunkerConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    /// Ask the model once to repair an unparseable chunk extraction
    pub repair_malformed: bool,
    pub cache: CacheConfig,
    pub synthesis: SynthesisConfig,
    pub chunk_qa: ChunkQaConfig,
    pub acquire: AcquireConfig,
    /// Q&A pairs requested per case
    pub qa_count: usize,
    /// Headnote length for single-pass summaries
    pub summary_words: usize,
    pub output_dir: PathBuf,
}

/// Output token budget per completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgets {
    pub extraction: usize,
    pub synthesis: usize,
    pub qa: usize,
    pub answer: usize,
    pub summary: usize,
    pub chunk_qa: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_extractions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Persist responses here so re-runs skip identical calls
    pub dir: Option<PathBuf>,
    /// In-memory responses kept before a quarter of them is evicted
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub strategy: MergeKind,
    /// Sort the timeline and drop duplicates after merging
    pub repair: bool,
}

/// Per-chunk Q&A turned into context-prefixed instruction pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkQaConfig {
    pub enabled: bool,
    pub per_chunk: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: OllamaConfig::default(),
            tokens: TokenBudgets::default(),
            chunking: ChunkerConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            repair_malformed: false,
            cache: CacheConfig::default(),
            synthesis: SynthesisConfig::default(),
            chunk_qa: ChunkQaConfig::default(),
            acquire: AcquireConfig::default(),
            qa_count: 15,
            summary_words: 200,
            output_dir: PathBuf::from("out"),
        }
    }
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            extraction: 2500,
            synthesis: 3000,
            qa: 2500,
            answer: 1000,
            summary: 1500,
            chunk_qa: 2000,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: 1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_entries: 10_000,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            strategy: MergeKind::Llm,
            repair: true,
        }
    }
}

impl Default for ChunkQaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_chunk: 5,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the TOML file at `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).context(format!("Failed to parse config file: {:?}", path))
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_tokens: self.tokens.extraction,
            max_concurrent: self.concurrency.max_concurrent_extractions.max(1),
            retry: RetryPolicy::from(&self.retry),
            repair_malformed: self.repair_malformed,
        }
    }
}
