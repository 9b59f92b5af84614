pub mod merge;
pub mod reconcile;
pub mod summarizer;

pub use merge::{AnyMerge, DeterministicMerge, LlmMerge, MergeKind, MergeStrategy};
pub use reconcile::ReconcileReport;
pub use summarizer::CaseSummarizer;

use extract::{CaseRecord, ChunkExtraction, PipelineError, Result, Stage};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct SynthesisOutcome {
    pub record: CaseRecord,
    pub report: ReconcileReport,
}

/// Case synthesis stage: merge, then validate (and by default repair) the invariants
pub struct CaseSynthesizer<M> {
    strategy: M,
    repair: bool,
}

impl<M: MergeStrategy> CaseSynthesizer<M> {
    pub fn new(strategy: M, repair: bool) -> Self {
        Self { strategy, repair }
    }

    pub async fn synthesize(
        &self,
        case_id: &str,
        extractions: &[ChunkExtraction],
    ) -> Result<SynthesisOutcome> {
        if extractions.is_empty() {
            return Err(PipelineError::SchemaViolation {
                stage: Stage::Synthesis,
                locator: case_id.to_string(),
                detail: "no chunk extractions to merge".to_string(),
            });
        }

        let started = Instant::now();
        let mut record = self.strategy.merge(case_id, extractions).await?;

        // Model output is best effort: violations are warnings, fixed in place when repairing
        let report = if self.repair {
            reconcile::repair(&mut record)
        } else {
            reconcile::check(&record)
        };
        reconcile::log_report(case_id, &report);

        info!(
            case_id,
            strategy = self.strategy.name(),
            facts = record.facts.len(),
            timeline = record.timeline.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Case synthesized"
        );

        Ok(SynthesisOutcome { record, report })
    }
}
