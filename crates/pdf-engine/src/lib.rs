//! lopdf-backed document model: load, copy pages, rotate, draw and serialize.

pub mod backend;
pub mod document;
pub mod draw;
pub mod merge;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod raster;
pub mod split;

use image::{ImageBuffer, Rgba};

pub use backend::{DocumentBackend, DrawOp, LopdfBackend};
pub use doc_model::PageSize;
pub use document::{LoadOptions, PdfDocument};
pub use draw::{
    encode_win_ansi, Border, ImageHandle, ImageParams, LineCapStyle, LineParams, PolygonParams,
    RectangleParams, Rgb, StandardFont, TextParams,
};
pub use merge::{merge_documents, MergeError};
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;
pub use raster::{render_page, viewport_size};
pub use split::{split_document, SplitError, SplitOutput, SplitRange};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("document is encrypted")]
    Encrypted,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i64),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to serialize document: {0}")]
    Save(String),
    #[error("document has no pages")]
    NoPages,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Builds a document of blank pages, each labelled "Page N".
pub fn build_blank_pdf(sizes: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = PdfDocument::create();
    for (number, size) in sizes.iter().enumerate() {
        let page = doc.add_blank_page(*size);
        doc.draw_text(
            page,
            &TextParams::new(format!("Page {}", number + 1), 72.0, size.height_pt - 72.0, 24.0),
        )?;
    }
    doc.save()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub size: PageSize,
    pub rotation: i64,
}

/// Page sizes and intrinsic rotations of a serialized document.
pub fn describe(bytes: &[u8]) -> Result<Vec<PageSummary>, PdfEngineError> {
    let doc = PdfDocument::load(bytes, LoadOptions::default())?;
    (0..doc.page_count())
        .map(|page| Ok(PageSummary { size: doc.page_size(page)?, rotation: doc.rotation(page)? }))
        .collect()
}
