pub mod artifacts;
pub mod training;

pub use artifacts::{ArtifactWriter, read_json, read_jsonl};
pub use training::{assemble_training_records, context_instruction_pairs};
