//! In-memory edit model for a PDF editing session.

pub mod annotation;
pub mod geometry;
pub mod history;
pub mod layout;
pub mod session;
pub mod settings;
pub mod store;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, AnnotationRef, Color,
    CommentAnnotation, CommentPatch, HighlightAnnotation, HighlightPatch, ImageAnnotation,
    ImageKind, ImagePatch, LineCap, LineStyle, TextAnnotation, TextPatch, UnderlineAnnotation,
    UnderlinePatch,
};
pub use geometry::{
    Corner, DisplayRect, Endpoint, PageSize, PageTransform, PixelSize, Point, Rect, Rotation,
};
pub use history::{Action, ActionExecutor, EditState};
pub use layout::{PageId, PageLayout, PageThumbnail};
pub use session::{EditSession, PageInfo};
pub use settings::EditorSettings;
pub use store::{AnnotationSet, EditStore, PageObjects, Tool};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("page {page} is out of range for a {page_count}-page document")]
    InvalidPage { page: u32, page_count: usize },
    #[error("invalid page order: {reason}")]
    InvalidPageOrder { reason: String },
    #[error("no document is loaded")]
    NoDocument,
}
