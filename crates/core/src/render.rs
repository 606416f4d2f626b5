//! Rasterizer backed by the page sizes of a loaded document, drawing real
//! pages through pdfium when the `pdfium` feature is enabled.

use doc_model::PixelSize;
#[cfg(feature = "pdfium")]
use log::warn;
use log::debug;
#[cfg(feature = "pdfium")]
use pdf_engine::PdfiumRenderer;
use pdf_engine::{render_page, viewport_size, PageSize, PdfDocument, PdfEngineError, RgbaImage};
use viewer_core::{Bitmap, CancellationToken, RasterError, RenderTarget, Rasterizer};

#[derive(Debug)]
pub struct EngineRasterizer {
    sizes: Vec<PageSize>,
    #[cfg(feature = "pdfium")]
    pdfium: Option<PdfiumRenderer>,
}

impl EngineRasterizer {
    pub fn new(sizes: Vec<PageSize>) -> Self {
        Self {
            sizes,
            #[cfg(feature = "pdfium")]
            pdfium: None,
        }
    }

    pub fn from_document(document: &PdfDocument) -> Result<Self, PdfEngineError> {
        let sizes = (0..document.page_count())
            .map(|page| document.page_size(page))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sizes))
    }

    /// Renders through the system pdfium library, keeping the blank pages
    /// when it cannot be bound.
    #[cfg(feature = "pdfium")]
    pub fn with_system_pdfium(mut self, bytes: &[u8], document: &PdfDocument) -> Self {
        match PdfiumRenderer::from_system_library(bytes.to_vec(), document) {
            Ok(renderer) => self.pdfium = Some(renderer),
            Err(err) => warn!("rendering blank pages: {err}"),
        }
        self
    }

    fn size(&self, page_number: u32) -> Result<PageSize, RasterError> {
        let index = (page_number as usize).checked_sub(1);
        index.and_then(|index| self.sizes.get(index)).copied().ok_or(RasterError::PageOutOfRange {
            page_number,
            page_count: self.page_count(),
        })
    }

    fn rasterize(&self, target: &RenderTarget, size: PageSize) -> Result<RgbaImage, RasterError> {
        #[cfg(feature = "pdfium")]
        if let Some(pdfium) = &self.pdfium {
            let page = target.page_number as usize - 1;
            return pdfium
                .render_page(page, target.scale, target.rotation.degrees())
                .map_err(|err| RasterError::Backend(err.to_string()));
        }
        Ok(render_page(size, target.scale, target.rotation.degrees()))
    }
}

impl Rasterizer for EngineRasterizer {
    fn page_count(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn viewport(&self, target: &RenderTarget) -> Result<PixelSize, RasterError> {
        let size = self.size(target.page_number)?;
        let (width, height) = viewport_size(size, target.scale, target.rotation.degrees());
        Ok(PixelSize::new(width, height))
    }

    fn render(
        &self,
        target: &RenderTarget,
        viewport: PixelSize,
        token: &CancellationToken,
    ) -> Result<Bitmap, RasterError> {
        if token.is_cancelled() {
            return Err(RasterError::Cancelled);
        }
        let size = self.size(target.page_number)?;
        let image = self.rasterize(target, size)?;
        if token.is_cancelled() {
            return Err(RasterError::Cancelled);
        }

        let (width, height) = image.dimensions();
        if (width, height) != (viewport.width, viewport.height) {
            return Err(RasterError::Backend(format!(
                "rendered {width}x{height}, expected {}x{}",
                viewport.width, viewport.height
            )));
        }
        debug!("rasterized page {} at {width}x{height}", target.page_number);
        Ok(Bitmap::new(viewport, image.into_raw()))
    }
}
