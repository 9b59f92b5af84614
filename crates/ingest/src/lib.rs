pub mod chunk;
pub mod chunker;
pub mod error;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use error::IngestError;
pub use reader::FileReader;

use std::future::Future;
use std::path::Path;

/// Turns a document on disk into ordered chunks
pub trait DocumentSource: Send + Sync {
    fn load(&self, path: &Path) -> impl Future<Output = Result<Vec<Chunk>, IngestError>> + Send;
}

/// Reads `.txt`/`.md`/`.pdf` files and chunks them by paragraph
pub struct FileSource {
    chunker: Chunker,
}

impl FileSource {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            chunker: Chunker::new(config),
        }
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl DocumentSource for FileSource {
    async fn load(&self, path: &Path) -> Result<Vec<Chunk>, IngestError> {
        let content = FileReader::read_file(path).await?;
        let chunks = self.chunker.chunk_text(&content);

        if chunks.is_empty() {
            return Err(IngestError::Empty(path.to_path_buf()));
        }

        tracing::debug!(path = %path.display(), chunks = chunks.len(), "Chunked document");
        Ok(chunks)
    }
}

/// Case id derived from the document file name (stem)
pub fn case_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
