//! Placeholder page rasterization: a white page with a light border.
//!
//! lopdf cannot draw page content; this gives the viewer correctly sized
//! bitmaps for every page and rotation. Builds with the `pdfium` feature
//! render real pages through [`crate::PdfiumRenderer`] instead.

use image::Rgba;

use crate::{PageSize, RgbaImage};

const PAGE_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Pixel size of `page` at `scale`, with width and height swapped for
/// quarter-turn rotations.
pub fn viewport_size(size: PageSize, scale: f32, rotation: u16) -> (u32, u32) {
    let scale = if scale <= 0.0 { 1.0 } else { scale };

    let width = (size.width_pt * scale).round().max(1.0) as u32;
    let height = (size.height_pt * scale).round().max(1.0) as u32;
    if rotation % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    }
}

pub fn render_page(size: PageSize, scale: f32, rotation: u16) -> RgbaImage {
    let (width, height) = viewport_size(size, scale, rotation);
    let mut image = RgbaImage::from_pixel(width, height, PAGE_FILL);

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, PAGE_BORDER);
            image.put_pixel(x, height - 1, PAGE_BORDER);
        }
        for y in 0..height {
            image.put_pixel(0, y, PAGE_BORDER);
            image.put_pixel(width - 1, y, PAGE_BORDER);
        }
    }

    image
}
