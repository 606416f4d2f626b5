//! Commit pipeline: copies the surviving pages of the source document in
//! display order, applies rotations and draws every annotation onto its page.
//!
//! Annotations live in document space (top-left origin, Y down). The only
//! conversion to output space (bottom-left origin, Y up) is [`flip_y`].

use std::collections::HashMap;

use doc_model::{
    Color, CommentAnnotation, EditState, HighlightAnnotation, ImageAnnotation, LineCap, LineStyle,
    PageId, TextAnnotation, UnderlineAnnotation,
};
use log::{debug, info};
use pdf_engine::{
    Border, DocumentBackend, DrawOp, ImageParams, LineCapStyle, LineParams, PdfEngineError,
    PolygonParams, RectangleParams, Rgb, StandardFont, TextParams,
};

const COMMENT_ICON_SIDE: f32 = 20.0;
const COMMENT_TEXT_OFFSET: f32 = 25.0;
const COMMENT_FONT_SIZE: f32 = 8.0;
const COMMENT_LINE_PITCH: f32 = 10.0;
const COMMENT_FILL: Rgb = Rgb { r: 1.0, g: 0.9, b: 0.4 };
const COMMENT_BORDER: Rgb = Rgb { r: 0.8, g: 0.7, b: 0.2 };
const COMMENT_TEXT_GRAY: f32 = 0.3;
const MIN_ARROW_SIZE: f32 = 8.0;
const DASHED: [f32; 2] = [6.0, 4.0];
const DOTTED: [f32; 2] = [2.0, 4.0];

/// Converts a document-space top edge to an output-space bottom edge.
pub fn flip_y(page_height: f32, y: f32, shape_height: f32) -> f32 {
    page_height - y - shape_height
}

#[derive(Debug, Clone, Copy)]
struct OutputPage {
    index: usize,
    height: f32,
}

/// Builds the output document for `state` through `backend` and returns its bytes.
///
/// Deleted pages are not copied, and annotations on them are skipped without
/// error. A page's stored rotation is added to the rotation the source page
/// already carries; pages without a stored rotation keep theirs untouched.
pub fn commit<B: DocumentBackend>(backend: &mut B, state: &EditState) -> Result<Vec<u8>, PdfEngineError> {
    let layout = state.layout();
    let active = layout.active_pages();
    let source: Vec<usize> = active.iter().map(|page| page.index()).collect();
    let copied = backend.copy_pages(&source)?;

    let mut pages = HashMap::with_capacity(active.len());
    for (&page, &index) in active.iter().zip(&copied) {
        let delta = layout.rotation(page);
        if !delta.is_none() {
            let intrinsic = backend.rotation(index)?;
            let degrees = (intrinsic + i64::from(delta.degrees())).rem_euclid(360);
            debug!("page {page} -> output {index}: rotation {intrinsic} + {}", delta.degrees());
            backend.set_rotation(index, degrees)?;
        }
        let height = backend.page_size(index)?.height_pt;
        pages.insert(page, OutputPage { index, height });
    }

    let annotations = state.annotations();
    let mut drawn = 0usize;
    let mut skipped = 0usize;
    let mut target = |page: PageId| {
        let found = pages.get(&page).copied();
        match found {
            Some(_) => drawn += 1,
            None => skipped += 1,
        }
        found
    };

    for text in &annotations.texts {
        if let Some(out) = target(text.page) {
            draw_text(backend, out, text)?;
        }
    }
    for highlight in &annotations.highlights {
        if let Some(out) = target(highlight.page) {
            draw_highlight(backend, out, highlight)?;
        }
    }
    for underline in &annotations.underlines {
        if let Some(out) = target(underline.page) {
            draw_underline(backend, out, underline)?;
        }
    }
    for comment in &annotations.comments {
        if let Some(out) = target(comment.page) {
            draw_comment(backend, out, comment)?;
        }
    }
    for image in &annotations.images {
        if let Some(out) = target(image.page) {
            draw_image(backend, out, image)?;
        }
    }

    info!(
        "committed {} of {} pages: {drawn} annotations drawn, {skipped} on deleted pages skipped",
        copied.len(),
        layout.page_count()
    );
    backend.save()
}

fn rgb(color: Color) -> Rgb {
    let [r, g, b] = color.to_normalized();
    Rgb::new(r, g, b)
}

fn draw_text<B: DocumentBackend>(
    backend: &mut B,
    out: OutputPage,
    text: &TextAnnotation,
) -> Result<(), PdfEngineError> {
    let y = flip_y(out.height, text.y, text.font_size);
    let mut params = TextParams::new(text.text.clone(), text.x, y, text.font_size);
    params.font = StandardFont::from_family_hint(&text.font_family);
    params.color = rgb(text.color);
    backend.draw(out.index, DrawOp::Text(params))
}

fn draw_highlight<B: DocumentBackend>(
    backend: &mut B,
    out: OutputPage,
    highlight: &HighlightAnnotation,
) -> Result<(), PdfEngineError> {
    backend.draw(
        out.index,
        DrawOp::Rectangle(RectangleParams {
            x: highlight.x,
            y: flip_y(out.height, highlight.y, highlight.height),
            width: highlight.width,
            height: highlight.height,
            fill: Some(rgb(highlight.color)),
            opacity: highlight.opacity,
            border: None,
        }),
    )
}

fn draw_underline<B: DocumentBackend>(
    backend: &mut B,
    out: OutputPage,
    underline: &UnderlineAnnotation,
) -> Result<(), PdfEngineError> {
    let start = (underline.x1, flip_y(out.height, underline.y1, 0.0));
    let end = (underline.x2, flip_y(out.height, underline.y2, 0.0));
    let color = rgb(underline.color);
    let dash = match underline.line_style {
        LineStyle::Solid => Vec::new(),
        LineStyle::Dashed => DASHED.to_vec(),
        LineStyle::Dotted => DOTTED.to_vec(),
    };
    let cap = match underline.line_cap {
        LineCap::Butt => LineCapStyle::Butt,
        LineCap::Round => LineCapStyle::Round,
        LineCap::Square => LineCapStyle::Square,
    };

    backend.draw(
        out.index,
        DrawOp::Line(LineParams { start, end, thickness: underline.thickness, color, cap, dash }),
    )?;

    if !underline.arrow_start && !underline.arrow_end {
        return Ok(());
    }
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = match dx.hypot(dy) {
        length if length > 0.0 => length,
        _ => 1.0,
    };
    let direction = (dx / length, dy / length);
    let size = (underline.thickness * 3.0).max(MIN_ARROW_SIZE);

    if underline.arrow_end {
        let points = arrowhead(end, direction, size);
        backend.draw(out.index, DrawOp::Polygon(PolygonParams { points, fill: color }))?;
    }
    if underline.arrow_start {
        let points = arrowhead(start, (-direction.0, -direction.1), size);
        backend.draw(out.index, DrawOp::Polygon(PolygonParams { points, fill: color }))?;
    }
    Ok(())
}

/// Triangle with its tip at `tip`, pointing along the unit vector `direction`.
fn arrowhead(tip: (f32, f32), direction: (f32, f32), size: f32) -> Vec<(f32, f32)> {
    let half = size * 0.5;
    let base = (tip.0 - direction.0 * size, tip.1 - direction.1 * size);
    let perp = (-direction.1, direction.0);
    vec![
        tip,
        (base.0 + perp.0 * half, base.1 + perp.1 * half),
        (base.0 - perp.0 * half, base.1 - perp.1 * half),
    ]
}

fn draw_comment<B: DocumentBackend>(
    backend: &mut B,
    out: OutputPage,
    comment: &CommentAnnotation,
) -> Result<(), PdfEngineError> {
    backend.draw(
        out.index,
        DrawOp::Rectangle(RectangleParams {
            x: comment.x,
            y: flip_y(out.height, comment.y, COMMENT_ICON_SIDE),
            width: COMMENT_ICON_SIDE,
            height: COMMENT_ICON_SIDE,
            fill: Some(COMMENT_FILL),
            opacity: 1.0,
            border: Some(Border { color: COMMENT_BORDER, width: 1.0 }),
        }),
    )?;

    if comment.text.is_empty() {
        return Ok(());
    }
    let mut params = TextParams::new(
        comment.text.clone(),
        comment.x + COMMENT_TEXT_OFFSET,
        flip_y(out.height, comment.y, COMMENT_LINE_PITCH),
        COMMENT_FONT_SIZE,
    );
    params.color = Rgb::gray(COMMENT_TEXT_GRAY);
    params.line_height = Some(COMMENT_LINE_PITCH);
    backend.draw(out.index, DrawOp::Text(params))
}

fn draw_image<B: DocumentBackend>(
    backend: &mut B,
    out: OutputPage,
    image: &ImageAnnotation,
) -> Result<(), PdfEngineError> {
    backend.draw(
        out.index,
        DrawOp::Image(ImageParams {
            data: &image.data,
            x: image.x,
            y: flip_y(out.height, image.y, image.height),
            width: image.width,
            height: image.height,
        }),
    )
}
