pub mod answer;
pub mod chunk_qa;
pub mod generator;

pub use answer::{CaseAnswerer, is_not_found};
pub use chunk_qa::ChunkQaGenerator;
pub use generator::QaGenerator;
pub use extract::prompt::NOT_FOUND_ANSWER;
