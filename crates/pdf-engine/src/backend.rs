use log::debug;

use crate::document::PdfDocument;
use crate::draw::{ImageParams, LineParams, PolygonParams, RectangleParams, TextParams};
use crate::{PageSize, PdfEngineError};

/// One primitive drawn onto an output page, in output coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp<'a> {
    Text(TextParams),
    Rectangle(RectangleParams),
    Line(LineParams),
    Polygon(PolygonParams),
    Image(ImageParams<'a>),
}

/// Builds an output document from pages of a source document.
///
/// Page indices passed to the accessors and drawing calls refer to the output
/// document; `copy_pages` takes source indices and returns output indices.
pub trait DocumentBackend {
    fn copy_pages(&mut self, source_pages: &[usize]) -> Result<Vec<usize>, PdfEngineError>;
    fn page_count(&self) -> usize;
    fn page_size(&self, page: usize) -> Result<PageSize, PdfEngineError>;
    /// Intrinsic rotation in degrees, `0..360`.
    fn rotation(&self, page: usize) -> Result<i64, PdfEngineError>;
    fn set_rotation(&mut self, page: usize, degrees: i64) -> Result<(), PdfEngineError>;
    fn draw(&mut self, page: usize, op: DrawOp<'_>) -> Result<(), PdfEngineError>;
    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError>;
}

/// Writes into a fresh [`PdfDocument`], copying pages out of `source`.
#[derive(Debug)]
pub struct LopdfBackend<'a> {
    source: &'a PdfDocument,
    output: PdfDocument,
}

impl<'a> LopdfBackend<'a> {
    pub fn new(source: &'a PdfDocument) -> Self {
        Self { source, output: PdfDocument::create() }
    }

    pub fn into_output(self) -> PdfDocument {
        self.output
    }
}

impl DocumentBackend for LopdfBackend<'_> {
    fn copy_pages(&mut self, source_pages: &[usize]) -> Result<Vec<usize>, PdfEngineError> {
        self.output.copy_pages_from(self.source, source_pages)
    }

    fn page_count(&self) -> usize {
        self.output.page_count()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfEngineError> {
        self.output.page_size(page)
    }

    fn rotation(&self, page: usize) -> Result<i64, PdfEngineError> {
        self.output.rotation(page)
    }

    fn set_rotation(&mut self, page: usize, degrees: i64) -> Result<(), PdfEngineError> {
        self.output.set_rotation(page, degrees)
    }

    fn draw(&mut self, page: usize, op: DrawOp<'_>) -> Result<(), PdfEngineError> {
        match op {
            DrawOp::Text(params) => self.output.draw_text(page, &params),
            DrawOp::Rectangle(params) => self.output.draw_rectangle(page, &params),
            DrawOp::Line(params) => self.output.draw_line(page, &params),
            DrawOp::Polygon(params) => self.output.draw_polygon(page, &params),
            DrawOp::Image(params) => self.output.draw_image(page, &params),
        }
    }

    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        if self.output.page_count() == 0 {
            return Err(PdfEngineError::NoPages);
        }
        debug!("saving output document with {} pages", self.output.page_count());
        self.output.save()
    }
}
