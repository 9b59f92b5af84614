use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::chunker::PAGE_BREAK;
use crate::error::IngestError;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String, IngestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "md" => fs::read_to_string(path)
                .await
                .map_err(|source| IngestError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            "pdf" => Self::read_pdf(path).await,
            _ => Err(IngestError::UnsupportedFormat(extension)),
        }
    }

    async fn read_pdf(path: &Path) -> Result<String, IngestError> {
        let bytes = fs::read(path).await.map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // pdf-extract is CPU bound and synchronous
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
                .map(join_pages)
                .map_err(|e| IngestError::Pdf {
                    path: owned,
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| IngestError::Pdf {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    }

    /// All supported documents under `dir`, sorted by path
    pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| IngestError::Walk {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if supported {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }
}

/// Join extracted pages with form feeds so chunks carry page locators. A single
/// page gets a trailing break so it is still labelled `p. 1`.
fn join_pages(pages: Vec<String>) -> String {
    let separator = PAGE_BREAK.to_string();
    let mut text = pages.join(separator.as_str());
    if pages.len() == 1 {
        text.push(PAGE_BREAK);
    }
    text
}
