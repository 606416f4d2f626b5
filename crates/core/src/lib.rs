//! PDF Editor Core Library
//!
//! The editor facade over the edit model: load and save through the storage
//! collaborator, the commit pipeline, pointer interactions and render wiring.

pub mod commit;
pub mod editor;
pub mod images;
pub mod interaction;
pub mod render;

use std::path::PathBuf;

use doc_model::ModelError;
use pdf_engine::{MergeError, PdfEngineError, SplitError};
use storage::StorageError;
use viewer_core::RasterError;

pub use commit::{commit, flip_y};
pub use editor::{Editor, DEFAULT_MERGE_NAME, DEFAULT_SAVE_NAME};
pub use images::{prepare_image, PreparedImage};
pub use interaction::{Draft, Gesture, PointerInteraction, PointerOutcome};
pub use render::EngineRasterizer;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no document is open")]
    NoDocument,
    #[error("the document has not been saved yet; choose a path with save as")]
    NoFilePath,
    #[error("failed to load {}: {source}", describe_path(.path))]
    Load {
        path: Option<PathBuf>,
        #[source]
        source: PdfEngineError,
    },
    #[error("unsupported image format {0}; only PNG and JPEG can be inserted")]
    UnsupportedImage(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("document error: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("split failed: {0}")]
    Split(#[from] SplitError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("render error: {0}")]
    Raster(#[from] RasterError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type EditorResult<T> = Result<T, EditorError>;

fn describe_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "document".to_owned(),
    }
}
