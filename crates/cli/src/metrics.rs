use extract::Stage;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::cache::CacheStats;

pub struct RunMetrics {
    // Counters
    documents_succeeded: AtomicUsize,
    documents_failed: AtomicUsize,
    chunks_extracted: AtomicUsize,
    qa_pairs: AtomicUsize,
    training_records: AtomicUsize,
    instruction_pairs: AtomicUsize,

    // Timing (in microseconds)
    ingest_time_us: AtomicU64,
    extraction_time_us: AtomicU64,
    synthesis_time_us: AtomicU64,
    qa_time_us: AtomicU64,
    output_time_us: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            documents_succeeded: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            chunks_extracted: AtomicUsize::new(0),
            qa_pairs: AtomicUsize::new(0),
            training_records: AtomicUsize::new(0),
            instruction_pairs: AtomicUsize::new(0),
            ingest_time_us: AtomicU64::new(0),
            extraction_time_us: AtomicU64::new(0),
            synthesis_time_us: AtomicU64::new(0),
            qa_time_us: AtomicU64::new(0),
            output_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_document(&self, success: bool) {
        if success {
            self.documents_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.documents_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stage(&self, stage: Stage, duration: Duration) {
        let slot = match stage {
            Stage::Ingest => &self.ingest_time_us,
            Stage::Extraction => &self.extraction_time_us,
            Stage::Synthesis => &self.synthesis_time_us,
            Stage::QaGeneration => &self.qa_time_us,
            Stage::Output => &self.output_time_us,
            // Not part of a document run
            Stage::Answering | Stage::Summary => return,
        };
        slot.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_chunks(&self, chunks: usize) {
        self.chunks_extracted.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_outputs(&self, qa_pairs: usize, training_records: usize) {
        self.qa_pairs.fetch_add(qa_pairs, Ordering::Relaxed);
        self.training_records.fetch_add(training_records, Ordering::Relaxed);
    }

    pub fn record_instructions(&self, pairs: usize) {
        self.instruction_pairs.fetch_add(pairs, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: CacheStats) -> MetricsSnapshot {
        let chunks = self.chunks_extracted.load(Ordering::Relaxed);
        let extraction_us = self.extraction_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            documents_succeeded: self.documents_succeeded.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_extracted: chunks,
            qa_pairs: self.qa_pairs.load(Ordering::Relaxed),
            training_records: self.training_records.load(Ordering::Relaxed),
            instruction_pairs: self.instruction_pairs.load(Ordering::Relaxed),
            ingest_ms: to_ms(self.ingest_time_us.load(Ordering::Relaxed)),
            extraction_ms: to_ms(extraction_us),
            synthesis_ms: to_ms(self.synthesis_time_us.load(Ordering::Relaxed)),
            qa_ms: to_ms(self.qa_time_us.load(Ordering::Relaxed)),
            output_ms: to_ms(self.output_time_us.load(Ordering::Relaxed)),
            avg_extraction_ms_per_chunk: if chunks > 0 {
                to_ms(extraction_us) / chunks as f64
            } else {
                0.0
            },
            completion_calls: cache.misses,
            cache_hits: cache.hits,
        }
    }
}

fn to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub documents_succeeded: usize,
    pub documents_failed: usize,
    pub chunks_extracted: usize,
    pub qa_pairs: usize,
    pub training_records: usize,
    pub instruction_pairs: usize,
    pub ingest_ms: f64,
    pub extraction_ms: f64,
    pub synthesis_ms: f64,
    pub qa_ms: f64,
    pub output_ms: f64,
    pub avg_extraction_ms_per_chunk: f64,
    pub completion_calls: usize,
    pub cache_hits: usize,
}

impl MetricsSnapshot {
    pub fn log(&self) {
        tracing::info!(
            documents_succeeded = self.documents_succeeded,
            documents_failed = self.documents_failed,
            chunks = self.chunks_extracted,
            qa_pairs = self.qa_pairs,
            training_records = self.training_records,
            instruction_pairs = self.instruction_pairs,
            extraction_ms = self.extraction_ms,
            avg_extraction_ms_per_chunk = self.avg_extraction_ms_per_chunk,
            synthesis_ms = self.synthesis_ms,
            qa_ms = self.qa_ms,
            completion_calls = self.completion_calls,
            cache_hits = self.cache_hits,
            "Run metrics"
        );
    }
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_stats(hits: usize, misses: usize) -> CacheStats {
        CacheStats {
            enabled: true,
            responses_cached: misses,
            hits,
            misses,
        }
    }

    #[test]
    fn stage_times_accumulate() {
        let metrics = RunMetrics::new();
        metrics.record_stage(Stage::Extraction, Duration::from_millis(30));
        metrics.record_stage(Stage::Extraction, Duration::from_millis(10));
        metrics.record_stage(Stage::Answering, Duration::from_millis(999));
        metrics.record_chunks(4);

        let snapshot = metrics.snapshot(cache_stats(0, 6));
        assert_eq!(snapshot.extraction_ms, 40.0);
        assert_eq!(snapshot.avg_extraction_ms_per_chunk, 10.0);
        assert_eq!(snapshot.completion_calls, 6);
    }

    #[test]
    fn documents_are_counted_by_outcome() {
        let metrics = RunMetrics::new();
        metrics.record_document(true);
        metrics.record_document(true);
        metrics.record_document(false);
        metrics.record_outputs(15, 7);
        metrics.record_instructions(10);

        let snapshot = metrics.snapshot(cache_stats(2, 3));
        assert_eq!(snapshot.documents_succeeded, 2);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.qa_pairs, 15);
        assert_eq!(snapshot.training_records, 7);
        assert_eq!(snapshot.instruction_pairs, 10);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.avg_extraction_ms_per_chunk, 0.0);
    }
}
