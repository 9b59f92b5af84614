use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from PDF {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("document {0} contains no text")]
    Empty(PathBuf),

    #[error("failed to walk directory {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
}
