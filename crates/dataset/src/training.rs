use anyhow::{Context, Result};
use extract::{CaseRecord, ChunkExtraction, ChunkQa, InstructionPair, QaPair, TrainingRecord};

pub const EXTRACTION_INSTRUCTION: &str =
    "Extract a structured legal summary from the case chunk using the given JSON schema.";
pub const SYNTHESIS_INSTRUCTION: &str =
    "Merge multiple chunk-level extractions into a single structured case summary as per the schema.";
pub const QA_INSTRUCTION: &str =
    "Answer short questions about the case strictly from the structured JSON.";

/// Build the instruction-tuning records for one case: one extraction task per chunk
/// (in chunk order), then the synthesis task, then the Q&A task.
///
/// `chunk_texts` are the contextualized texts the extractions were produced from.
pub fn assemble_training_records<S: AsRef<str>>(
    chunk_texts: &[S],
    extractions: &[ChunkExtraction],
    case: &CaseRecord,
    qa_pairs: &[QaPair],
) -> Result<Vec<TrainingRecord>> {
    if chunk_texts.len() != extractions.len() {
        anyhow::bail!(
            "{} chunk texts but {} chunk extractions for case {}",
            chunk_texts.len(),
            extractions.len(),
            case.case_id
        );
    }

    let mut records = Vec::with_capacity(extractions.len() + 2);

    for (text, extraction) in chunk_texts.iter().zip(extractions) {
        records.push(TrainingRecord {
            instruction: EXTRACTION_INSTRUCTION.to_string(),
            input: text.as_ref().to_string(),
            output: serde_json::to_string(extraction).context("Failed to serialize chunk extraction")?,
        });
    }

    let case_json = serde_json::to_string(case).context("Failed to serialize case record")?;

    records.push(TrainingRecord {
        instruction: SYNTHESIS_INSTRUCTION.to_string(),
        input: serde_json::to_string(extractions).context("Failed to serialize chunk extractions")?,
        output: case_json.clone(),
    });

    records.push(TrainingRecord {
        instruction: QA_INSTRUCTION.to_string(),
        input: case_json,
        output: serde_json::to_string(qa_pairs).context("Failed to serialize Q&A pairs")?,
    });

    Ok(records)
}

/// Flatten per-chunk Q&A into instruction pairs whose question carries the chunk
/// text: `Context: {context} {question}`. Chunk order, then generation order.
pub fn context_instruction_pairs(sets: &[ChunkQa]) -> Vec<InstructionPair> {
    sets.iter()
        .flat_map(|set| {
            set.generated.iter().map(move |pair| InstructionPair {
                question: format!("Context: {} {}", set.context, pair.question),
                answer: pair.answer.clone(),
            })
        })
        .collect()
}
