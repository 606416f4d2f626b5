use doc_model::{PixelSize, Rotation};

use crate::cancel::CancellationToken;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RasterError {
    /// The render was cancelled. Expected during rapid navigation, never shown to users.
    #[error("render cancelled")]
    Cancelled,
    #[error("page {page_number} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page_number: u32, page_count: u32 },
    #[error("render error: {0}")]
    Backend(String),
}

/// What to rasterize: a 1-based page number at a scale and absolute rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pub page_number: u32,
    pub scale: f32,
    pub rotation: Rotation,
}

/// RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub size: PixelSize,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(size: PixelSize, pixels: Vec<u8>) -> Self {
        Self { size, pixels }
    }
}

/// Turns page descriptions into pixels. Called from a render worker thread.
pub trait Rasterizer: Send + Sync {
    fn page_count(&self) -> u32;

    /// Pixel size the page will have at `target`'s scale and rotation.
    fn viewport(&self, target: &RenderTarget) -> Result<PixelSize, RasterError>;

    /// Renders into a bitmap of `viewport` size. Implementations should return
    /// [`RasterError::Cancelled`] once `token` is cancelled.
    fn render(
        &self,
        target: &RenderTarget,
        viewport: PixelSize,
        token: &CancellationToken,
    ) -> Result<Bitmap, RasterError>;
}
