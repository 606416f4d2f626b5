//! Coordinate conversion and hit-testing for overlay objects.
//!
//! Three spaces are involved:
//! - screen space: pointer positions relative to the viewport, in CSS-like pixels;
//! - bitmap space: pixels of the rendered raster, which may be displayed scaled;
//! - document space: PDF points at the page's unrotated size, origin top-left, Y down.

use serde::{Deserialize, Serialize};

use crate::annotation::{
    AnnotationRef, CommentAnnotation, HighlightAnnotation, ImageAnnotation, TextAnnotation,
    UnderlineAnnotation,
};
use crate::store::PageObjects;

/// Horizontal hit width used for text hit-testing instead of measuring glyphs.
pub const TEXT_HIT_WIDTH: f32 = 100.0;
/// Side length of the square comment icon.
pub const COMMENT_ICON_SIZE: f32 = 24.0;
/// Underlines thinner than this are still hit within this distance.
pub const UNDERLINE_HIT_TOLERANCE: f32 = 4.0;
/// Smallest width or height a rectangle can be resized to.
pub const MIN_RESIZE_EXTENT: f32 = 5.0;
/// Smallest length an underline can be resized to.
pub const MIN_SEGMENT_LENGTH: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle in document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rectangle spanned by two drag corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Inclusive containment, matching pointer-hit semantics on edges.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn corner(&self, corner: Corner) -> Point {
        match corner {
            Corner::TopLeft => Point::new(self.x, self.y),
            Corner::TopRight => Point::new(self.x + self.width, self.y),
            Corner::BottomLeft => Point::new(self.x, self.y + self.height),
            Corner::BottomRight => Point::new(self.x + self.width, self.y + self.height),
        }
    }
}

/// Where the rendered bitmap currently sits on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const ZERO: Self = Self { width: 0, height: 0 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Unrotated page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const LETTER: Self = Self::new(612.0, 792.0);

    pub const fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Clockwise page rotation in degrees, always in `0..360`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Self = Self(0);

    pub fn from_degrees(degrees: i32) -> Self {
        Self(degrees.rem_euclid(360) as u16)
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    pub fn rotated_by(self, delta: i32) -> Self {
        Self::from_degrees(i32::from(self.0) + delta)
    }

    pub fn combine(self, other: Rotation) -> Self {
        self.rotated_by(i32::from(other.0))
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether width and height trade places when displayed.
    pub fn is_quarter_turn(self) -> bool {
        self.0 == 90 || self.0 == 270
    }
}

/// Maps document space onto the rendered bitmap for a page at a given zoom and rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    pub page_size: PageSize,
    pub zoom: f32,
    pub rotation: Rotation,
}

impl PageTransform {
    pub fn new(page_size: PageSize, zoom: f32, rotation: Rotation) -> Self {
        Self { page_size, zoom, rotation }
    }

    /// Size of the rendered bitmap this transform expects, rounded up like a viewport.
    pub fn bitmap_size(&self) -> PixelSize {
        let width = (self.page_size.width_pt * self.zoom).ceil().max(0.0) as u32;
        let height = (self.page_size.height_pt * self.zoom).ceil().max(0.0) as u32;
        if self.rotation.is_quarter_turn() {
            PixelSize::new(height, width)
        } else {
            PixelSize::new(width, height)
        }
    }

    pub fn document_to_bitmap(&self, point: Point) -> Point {
        let (w, h, z) = (self.page_size.width_pt, self.page_size.height_pt, self.zoom);
        match self.rotation.degrees() {
            90 => Point::new((h - point.y) * z, point.x * z),
            180 => Point::new((w - point.x) * z, (h - point.y) * z),
            270 => Point::new(point.y * z, (w - point.x) * z),
            _ => Point::new(point.x * z, point.y * z),
        }
    }

    pub fn bitmap_to_document(&self, point: Point) -> Point {
        let (w, h) = (self.page_size.width_pt, self.page_size.height_pt);
        let z = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        let (bx, by) = (point.x / z, point.y / z);
        match self.rotation.degrees() {
            90 => Point::new(by, h - bx),
            180 => Point::new(w - bx, h - by),
            270 => Point::new(w - by, bx),
            _ => Point::new(bx, by),
        }
    }
}

/// Scales a pointer position into bitmap pixels.
///
/// Returns `None` while the displayed size is unknown (zero), which is the
/// case between a render request and the collaborator reporting its viewport.
pub fn screen_to_bitmap(pointer: Point, displayed: DisplayRect, bitmap: PixelSize) -> Option<Point> {
    if displayed.width <= 0.0 || displayed.height <= 0.0 || bitmap.is_zero() {
        return None;
    }
    let scale_x = bitmap.width as f32 / displayed.width;
    let scale_y = bitmap.height as f32 / displayed.height;
    Some(Point::new((pointer.x - displayed.left) * scale_x, (pointer.y - displayed.top) * scale_y))
}

pub fn bitmap_to_screen(point: Point, displayed: DisplayRect, bitmap: PixelSize) -> Option<Point> {
    if bitmap.is_zero() {
        return None;
    }
    let scale_x = displayed.width / bitmap.width as f32;
    let scale_y = displayed.height / bitmap.height as f32;
    Some(Point::new(point.x * scale_x + displayed.left, point.y * scale_y + displayed.top))
}

pub fn screen_to_document(
    pointer: Point,
    displayed: DisplayRect,
    bitmap: PixelSize,
    transform: &PageTransform,
) -> Option<Point> {
    screen_to_bitmap(pointer, displayed, bitmap).map(|p| transform.bitmap_to_document(p))
}

pub fn document_to_screen(
    point: Point,
    displayed: DisplayRect,
    bitmap: PixelSize,
    transform: &PageTransform,
) -> Option<Point> {
    bitmap_to_screen(transform.document_to_bitmap(point), displayed, bitmap)
}

pub fn text_contains(text: &TextAnnotation, point: Point) -> bool {
    Rect::new(text.x, text.y, TEXT_HIT_WIDTH, text.font_size).contains(point)
}

pub fn highlight_contains(highlight: &HighlightAnnotation, point: Point) -> bool {
    highlight.rect().contains(point)
}

/// Distance from `point` to the segment, or `None` when the projection falls
/// outside the segment or the segment is degenerate.
pub fn segment_distance(start: Point, end: Point, point: Point) -> Option<f32> {
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return None;
    }
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / len_sq;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let projected = Point::new(start.x + t * dx, start.y + t * dy);
    Some(projected.distance_to(point))
}

pub fn underline_contains(underline: &UnderlineAnnotation, point: Point) -> bool {
    let tolerance = underline.thickness.max(UNDERLINE_HIT_TOLERANCE);
    segment_distance(underline.start(), underline.end(), point)
        .is_some_and(|distance| distance <= tolerance)
}

pub fn comment_contains(comment: &CommentAnnotation, point: Point) -> bool {
    Rect::new(comment.x, comment.y, COMMENT_ICON_SIZE, COMMENT_ICON_SIZE).contains(point)
}

pub fn image_contains(image: &ImageAnnotation, point: Point) -> bool {
    image.rect().contains(point)
}

/// First object under `point`, testing text, highlight, underline, comment
/// and image collections in that order.
pub fn hit_test<'a>(point: Point, objects: &PageObjects<'a>) -> Option<AnnotationRef<'a>> {
    if let Some(text) = objects.texts.iter().find(|t| text_contains(t, point)) {
        return Some(AnnotationRef::Text(text));
    }
    if let Some(highlight) = objects.highlights.iter().find(|h| highlight_contains(h, point)) {
        return Some(AnnotationRef::Highlight(highlight));
    }
    if let Some(underline) = objects.underlines.iter().find(|u| underline_contains(u, point)) {
        return Some(AnnotationRef::Underline(underline));
    }
    if let Some(comment) = objects.comments.iter().find(|c| comment_contains(c, point)) {
        return Some(AnnotationRef::Comment(comment));
    }
    objects.images.iter().find(|i| image_contains(i, point)).map(|image| AnnotationRef::Image(image))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] =
        [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight];

    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }

    fn moves_left_edge(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::BottomLeft)
    }

    fn moves_top_edge(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }
}

/// Drags `corner` of `start` to `pointer`, keeping the opposite corner fixed.
pub fn resize_rect(start: Rect, corner: Corner, pointer: Point) -> Rect {
    let anchor = start.corner(corner.opposite());

    let width = if corner.moves_left_edge() { anchor.x - pointer.x } else { pointer.x - anchor.x };
    let height = if corner.moves_top_edge() { anchor.y - pointer.y } else { pointer.y - anchor.y };
    let width = width.max(MIN_RESIZE_EXTENT);
    let height = height.max(MIN_RESIZE_EXTENT);

    let x = if corner.moves_left_edge() { anchor.x - width } else { anchor.x };
    let y = if corner.moves_top_edge() { anchor.y - height } else { anchor.y };
    Rect { x, y, width, height }
}

/// Which end of an underline is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Start,
    End,
}

/// New position for a dragged endpoint so the segment to `fixed` is at least
/// [`MIN_SEGMENT_LENGTH`] long.
pub fn drag_endpoint(fixed: Point, pointer: Point) -> Point {
    let length = fixed.distance_to(pointer);
    if length >= MIN_SEGMENT_LENGTH {
        return pointer;
    }
    if length == 0.0 {
        return Point::new(fixed.x + MIN_SEGMENT_LENGTH, fixed.y);
    }
    let scale = MIN_SEGMENT_LENGTH / length;
    Point::new(fixed.x + (pointer.x - fixed.x) * scale, fixed.y + (pointer.y - fixed.y) * scale)
}

/// Corner handle of `rect` within `radius` of `point`, if any.
pub fn rect_handle_at(rect: Rect, point: Point, radius: f32) -> Option<Corner> {
    Corner::ALL.into_iter().find(|corner| rect.corner(*corner).distance_to(point) <= radius)
}

pub fn underline_handle_at(
    underline: &UnderlineAnnotation,
    point: Point,
    radius: f32,
) -> Option<Endpoint> {
    if underline.start().distance_to(point) <= radius {
        Some(Endpoint::Start)
    } else if underline.end().distance_to(point) <= radius {
        Some(Endpoint::End)
    } else {
        None
    }
}

/// Clamps a prospective object origin to the page bounds.
pub fn clamp_to_page(point: Point, page: PageSize) -> Point {
    Point::new(point.x.clamp(0.0, page.width_pt.max(0.0)), point.y.clamp(0.0, page.height_pt.max(0.0)))
}
