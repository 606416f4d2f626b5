//! Page rasterization through the pdfium system library.
//!
//! Only built with the `pdfium` feature. pdfium applies each page's own
//! `/Rotate`, so only the rotation added on top of it is requested here.

use std::fmt;

use log::debug;
use pdfium_render::prelude::*;

use crate::document::PdfDocument;
use crate::raster::viewport_size;
use crate::{PageSize, PdfEngineError, RgbaImage};

/// Unrotated size and intrinsic rotation of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageGeometry {
    size: PageSize,
    rotation: u16,
}

pub struct PdfiumRenderer {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    pages: Vec<PageGeometry>,
}

impl fmt::Debug for PdfiumRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfiumRenderer")
            .field("bytes", &self.bytes.len())
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl PdfiumRenderer {
    /// Binds the system pdfium library for the document `bytes` were parsed into.
    pub fn from_system_library(bytes: Vec<u8>, document: &PdfDocument) -> Result<Self, PdfEngineError> {
        let bindings = Pdfium::bind_to_system_library().map_err(|err| {
            PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
        })?;

        let mut pages = Vec::with_capacity(document.page_count());
        for page in 0..document.page_count() {
            let rotation = document.rotation(page)?.rem_euclid(360) as u16;
            pages.push(PageGeometry { size: document.page_size(page)?, rotation });
        }
        Ok(Self { pdfium: Pdfium::new(bindings), bytes, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Renders 0-based `page` at `scale`, turned to `rotation` degrees in
    /// total (intrinsic rotation included), matching [`viewport_size`].
    pub fn render_page(&self, page: usize, scale: f32, rotation: u16) -> Result<RgbaImage, PdfEngineError> {
        let geometry = self
            .pages
            .get(page)
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count: self.pages.len() })?;
        let index = u16::try_from(page)
            .map_err(|_| PdfEngineError::PageOutOfRange { page, page_count: self.pages.len() })?;
        let backend = |err: PdfiumError| PdfEngineError::Backend(err.to_string());

        let document = self.pdfium.load_pdf_from_byte_slice(&self.bytes, None).map_err(backend)?;
        let pdf_page = document.pages().get(index).map_err(backend)?;

        let (width, height) = viewport_size(geometry.size, scale, geometry.rotation);
        let extra = (i32::from(rotation) - i32::from(geometry.rotation)).rem_euclid(360);
        let turn = match extra {
            90 => PdfPageRenderRotation::Degrees90,
            180 => PdfPageRenderRotation::Degrees180,
            270 => PdfPageRenderRotation::Degrees270,
            _ => PdfPageRenderRotation::None,
        };
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .rotate(turn, true);

        let bitmap = pdf_page.render_with_config(&config).map_err(backend)?;
        let (out_width, out_height) = (bitmap.width() as u32, bitmap.height() as u32);
        debug!("pdfium rendered page {page} at {out_width}x{out_height}");
        RgbaImage::from_raw(out_width, out_height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            PdfEngineError::Backend(format!("pdfium returned a short {out_width}x{out_height} bitmap"))
        })
    }
}
