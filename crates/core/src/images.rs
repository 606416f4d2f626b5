//! Preparing encoded images for insertion onto a page.

use std::io::Cursor;

use doc_model::settings::ImageDefaults;
use doc_model::{ImageAnnotation, ImageKind, PageId, Point};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::{debug, info};

use crate::EditorError;

/// Encoded image bytes ready to become an [`ImageAnnotation`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub data: Vec<u8>,
    pub kind: ImageKind,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub display_width: f32,
    pub display_height: f32,
}

impl PreparedImage {
    pub fn into_annotation(self, page: PageId, at: Point) -> ImageAnnotation {
        ImageAnnotation {
            id: Default::default(),
            page,
            x: at.x,
            y: at.y,
            width: self.display_width,
            height: self.display_height,
            data: self.data,
            kind: self.kind,
            original_width: self.pixel_width,
            original_height: self.pixel_height,
        }
    }
}

/// Decodes `bytes`, downsizes images whose longest side exceeds
/// `max_pixel_dimension` (re-encoding in the source format) and picks a
/// display size whose longest side is at most `default_display_size`.
pub fn prepare_image(bytes: &[u8], defaults: &ImageDefaults) -> Result<PreparedImage, EditorError> {
    let format = image::guess_format(bytes)?;
    let kind = match format {
        ImageFormat::Png => ImageKind::Png,
        ImageFormat::Jpeg => ImageKind::Jpeg,
        other => return Err(EditorError::UnsupportedImage(format!("{other:?}"))),
    };

    let decoded = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = decoded.dimensions();
    let longest = width.max(height);

    let limit = defaults.max_pixel_dimension;
    let (data, pixel_width, pixel_height) = if limit > 0 && longest > limit {
        let ratio = limit as f32 / longest as f32;
        let new_width = ((width as f32 * ratio).round() as u32).max(1);
        let new_height = ((height as f32 * ratio).round() as u32).max(1);
        let resized = decoded.resize_exact(new_width, new_height, FilterType::Triangle);
        info!("downsized {width}x{height} image to {new_width}x{new_height}");
        (encode(resized, format)?, new_width, new_height)
    } else {
        (bytes.to_vec(), width, height)
    };

    let (display_width, display_height) = display_size(pixel_width, pixel_height, defaults.default_display_size);
    debug!("prepared {kind:?} image {pixel_width}x{pixel_height}, shown at {display_width}x{display_height}");
    Ok(PreparedImage { data, kind, pixel_width, pixel_height, display_width, display_height })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, EditorError> {
    // JPEG has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

fn display_size(width: u32, height: u32, max_side: u32) -> (f32, f32) {
    let (width, height, max_side) = (width as f32, height as f32, max_side as f32);
    if max_side <= 0.0 || (width <= max_side && height <= max_side) {
        return (width, height);
    }
    let ratio = (max_side / width).min(max_side / height);
    (width * ratio, height * ratio)
}
