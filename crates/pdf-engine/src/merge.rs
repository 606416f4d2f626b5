//! Concatenates whole documents into one.

use log::{info, warn};

use crate::document::{LoadOptions, PdfDocument};
use crate::PdfEngineError;

/// Merge failures. `file` is the 1-based position of the offending input.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no documents to merge")]
    Empty,
    #[error("file {file} is encrypted; password-protected PDFs cannot be merged")]
    Encrypted { file: usize },
    #[error("file {file} is damaged or not a valid PDF")]
    Malformed { file: usize },
    #[error("failed to process file {file}: {reason}")]
    Failed { file: usize, reason: String },
    #[error("failed to save the merged document: {0}")]
    Save(String),
}

impl MergeError {
    fn classify(file: usize, err: PdfEngineError) -> Self {
        warn!("merge input {file} failed: {err}");
        match err {
            PdfEngineError::Encrypted => Self::Encrypted { file },
            PdfEngineError::Parse(inner) => {
                let message = inner.to_string().to_lowercase();
                if message.contains("crypt") || message.contains("password") {
                    Self::Encrypted { file }
                } else {
                    Self::Malformed { file }
                }
            }
            PdfEngineError::NoPages => Self::Malformed { file },
            other => Self::Failed { file, reason: other.to_string() },
        }
    }
}

/// Appends every page of each input, in order. Encryption markers are
/// tolerated on load; inputs that still cannot be read stop the merge at
/// that file, and nothing is produced.
pub fn merge_documents<B: AsRef<[u8]>>(inputs: &[B]) -> Result<Vec<u8>, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::Empty);
    }

    let mut merged = PdfDocument::create();
    for (index, input) in inputs.iter().enumerate() {
        let file = index + 1;
        let source = PdfDocument::load(input.as_ref(), LoadOptions { ignore_encryption: true })
            .map_err(|err| MergeError::classify(file, err))?;
        let pages: Vec<usize> = (0..source.page_count()).collect();
        merged.copy_pages_from(&source, &pages).map_err(|err| MergeError::classify(file, err))?;
    }

    let bytes = merged.save().map_err(|err| MergeError::Save(err.to_string()))?;
    info!("merged {} files into {} pages", inputs.len(), merged.page_count());
    Ok(bytes)
}
