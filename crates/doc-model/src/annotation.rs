//! Annotation objects placed on pages, in document space.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Point, Rect};
use crate::layout::PageId;
use crate::store::AnnotationSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnnotationId(Uuid);

impl AnnotationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Placeholder id carried by freshly constructed objects until they are added.
    pub const fn unassigned() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::unassigned()
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// RGB color. Opacity lives on the objects that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the `#` is optional). Anything else yields black.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Self::BLACK;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        match (channel(0..2), channel(2..4), channel(4..6)) {
            (Some(r), Some(g), Some(b)) => Self { r, g, b },
            _ => Self::BLACK,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channels in `0.0..=1.0`.
    pub fn to_normalized(self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub id: AnnotationId,
    pub page: PageId,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    pub color: Color,
    pub font_family: String,
}

impl TextAnnotation {
    pub fn new(page: PageId, x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            id: AnnotationId::unassigned(),
            page,
            x,
            y,
            text: text.into(),
            font_size: 14.0,
            color: Color::BLACK,
            font_family: "sans-serif".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightAnnotation {
    pub id: AnnotationId,
    pub page: PageId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
    pub opacity: f32,
}

impl HighlightAnnotation {
    pub fn new(page: PageId, rect: Rect) -> Self {
        Self {
            id: AnnotationId::unassigned(),
            page,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            color: Color::YELLOW,
            opacity: 0.3,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// A stroked segment from `(x1, y1)` to `(x2, y2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderlineAnnotation {
    pub id: AnnotationId,
    pub page: PageId,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub color: Color,
    pub thickness: f32,
    pub line_style: LineStyle,
    pub line_cap: LineCap,
    pub arrow_start: bool,
    pub arrow_end: bool,
}

impl UnderlineAnnotation {
    pub fn new(page: PageId, start: Point, end: Point, color: Color) -> Self {
        Self {
            id: AnnotationId::unassigned(),
            page,
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            color,
            thickness: 2.0,
            line_style: LineStyle::Solid,
            line_cap: LineCap::Butt,
            arrow_start: false,
            arrow_end: false,
        }
    }

    /// Legacy single-point form: a horizontal segment of `width` starting at `(x, y)`.
    pub fn horizontal(page: PageId, x: f32, y: f32, width: f32, color: Color) -> Self {
        Self::new(page, Point::new(x, y), Point::new(x + width, y), color)
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f32 {
        self.start().distance_to(self.end())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAnnotation {
    pub id: AnnotationId,
    pub page: PageId,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub author: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

impl CommentAnnotation {
    pub fn new(page: PageId, x: f32, y: f32, text: impl Into<String>) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self {
            id: AnnotationId::unassigned(),
            page,
            x,
            y,
            text: text.into(),
            author: None,
            created_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    pub id: AnnotationId,
    pub page: PageId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub data: Vec<u8>,
    pub kind: ImageKind,
    pub original_width: u32,
    pub original_height: u32,
}

impl ImageAnnotation {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.original_height == 0 {
            return 1.0;
        }
        self.original_width as f32 / self.original_height as f32
    }

    /// Patch setting the width and deriving the height from the original aspect ratio.
    pub fn resize_to_width(&self, width: f32) -> ImagePatch {
        ImagePatch { width: Some(width), height: Some(width / self.aspect_ratio()), ..ImagePatch::default() }
    }

    /// Patch setting the height and deriving the width from the original aspect ratio.
    pub fn resize_to_height(&self, height: f32) -> ImagePatch {
        ImagePatch { width: Some(height * self.aspect_ratio()), height: Some(height), ..ImagePatch::default() }
    }

    pub fn reset_to_original_size(&self) -> ImagePatch {
        ImagePatch {
            width: Some(self.original_width as f32),
            height: Some(self.original_height as f32),
            ..ImagePatch::default()
        }
    }
}

/// Declares a partial-update struct for an annotation type. Every field is
/// optional; only the fields that are set take part in an update.
macro_rules! annotation_patch {
    ($(#[$meta:meta])* $patch:ident for $target:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $patch {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $patch {
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())*
            }

            /// Current values of `target` for exactly the fields set in `self`.
            pub fn capture(&self, target: &$target) -> Self {
                Self { $($field: self.$field.as_ref().map(|_| target.$field.clone()),)* }
            }

            pub fn apply_to(&self, target: &mut $target) {
                $(
                    if let Some(value) = &self.$field {
                        target.$field = value.clone();
                    }
                )*
            }
        }
    };
}

annotation_patch!(TextPatch for TextAnnotation {
    x: f32,
    y: f32,
    text: String,
    font_size: f32,
    color: Color,
    font_family: String,
});

annotation_patch!(HighlightPatch for HighlightAnnotation {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: Color,
    opacity: f32,
});

annotation_patch!(UnderlinePatch for UnderlineAnnotation {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    color: Color,
    thickness: f32,
    line_style: LineStyle,
    line_cap: LineCap,
    arrow_start: bool,
    arrow_end: bool,
});

annotation_patch!(CommentPatch for CommentAnnotation {
    x: f32,
    y: f32,
    text: String,
    author: Option<String>,
});

annotation_patch!(ImagePatch for ImageAnnotation {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Text,
    Highlight,
    Underline,
    Comment,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    Text(TextAnnotation),
    Highlight(HighlightAnnotation),
    Underline(UnderlineAnnotation),
    Comment(CommentAnnotation),
    Image(ImageAnnotation),
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.as_view().id()
    }

    pub fn page(&self) -> PageId {
        self.as_view().page()
    }

    pub fn kind(&self) -> AnnotationKind {
        self.as_view().kind()
    }

    pub fn as_view(&self) -> AnnotationRef<'_> {
        match self {
            Annotation::Text(a) => AnnotationRef::Text(a),
            Annotation::Highlight(a) => AnnotationRef::Highlight(a),
            Annotation::Underline(a) => AnnotationRef::Underline(a),
            Annotation::Comment(a) => AnnotationRef::Comment(a),
            Annotation::Image(a) => AnnotationRef::Image(a),
        }
    }

    pub(crate) fn set_id(&mut self, id: AnnotationId) {
        match self {
            Annotation::Text(a) => a.id = id,
            Annotation::Highlight(a) => a.id = id,
            Annotation::Underline(a) => a.id = id,
            Annotation::Comment(a) => a.id = id,
            Annotation::Image(a) => a.id = id,
        }
    }
}

macro_rules! impl_into_annotation {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Annotation {
                fn from(value: $ty) -> Self {
                    Annotation::$variant(value)
                }
            }
        )*
    };
}

impl_into_annotation!(
    Text(TextAnnotation),
    Highlight(HighlightAnnotation),
    Underline(UnderlineAnnotation),
    Comment(CommentAnnotation),
    Image(ImageAnnotation),
);

/// Borrowed view of an annotation in the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotationRef<'a> {
    Text(&'a TextAnnotation),
    Highlight(&'a HighlightAnnotation),
    Underline(&'a UnderlineAnnotation),
    Comment(&'a CommentAnnotation),
    Image(&'a ImageAnnotation),
}

impl AnnotationRef<'_> {
    pub fn id(&self) -> AnnotationId {
        match self {
            AnnotationRef::Text(a) => a.id,
            AnnotationRef::Highlight(a) => a.id,
            AnnotationRef::Underline(a) => a.id,
            AnnotationRef::Comment(a) => a.id,
            AnnotationRef::Image(a) => a.id,
        }
    }

    pub fn page(&self) -> PageId {
        match self {
            AnnotationRef::Text(a) => a.page,
            AnnotationRef::Highlight(a) => a.page,
            AnnotationRef::Underline(a) => a.page,
            AnnotationRef::Comment(a) => a.page,
            AnnotationRef::Image(a) => a.page,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationRef::Text(_) => AnnotationKind::Text,
            AnnotationRef::Highlight(_) => AnnotationKind::Highlight,
            AnnotationRef::Underline(_) => AnnotationKind::Underline,
            AnnotationRef::Comment(_) => AnnotationKind::Comment,
            AnnotationRef::Image(_) => AnnotationKind::Image,
        }
    }

    /// Top-left anchor used when dragging the object.
    pub fn origin(&self) -> Point {
        match self {
            AnnotationRef::Text(a) => Point::new(a.x, a.y),
            AnnotationRef::Highlight(a) => Point::new(a.x, a.y),
            AnnotationRef::Underline(a) => a.start(),
            AnnotationRef::Comment(a) => Point::new(a.x, a.y),
            AnnotationRef::Image(a) => Point::new(a.x, a.y),
        }
    }

    pub fn to_annotation(&self) -> Annotation {
        match self {
            AnnotationRef::Text(a) => Annotation::Text((*a).clone()),
            AnnotationRef::Highlight(a) => Annotation::Highlight((*a).clone()),
            AnnotationRef::Underline(a) => Annotation::Underline((*a).clone()),
            AnnotationRef::Comment(a) => Annotation::Comment((*a).clone()),
            AnnotationRef::Image(a) => Annotation::Image((*a).clone()),
        }
    }
}

/// Partial update addressed to one annotation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationPatch {
    Text(TextPatch),
    Highlight(HighlightPatch),
    Underline(UnderlinePatch),
    Comment(CommentPatch),
    Image(ImagePatch),
}

impl AnnotationPatch {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationPatch::Text(_) => AnnotationKind::Text,
            AnnotationPatch::Highlight(_) => AnnotationKind::Highlight,
            AnnotationPatch::Underline(_) => AnnotationKind::Underline,
            AnnotationPatch::Comment(_) => AnnotationKind::Comment,
            AnnotationPatch::Image(_) => AnnotationKind::Image,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnnotationPatch::Text(p) => p.is_empty(),
            AnnotationPatch::Highlight(p) => p.is_empty(),
            AnnotationPatch::Underline(p) => p.is_empty(),
            AnnotationPatch::Comment(p) => p.is_empty(),
            AnnotationPatch::Image(p) => p.is_empty(),
        }
    }
}

macro_rules! impl_into_patch {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for AnnotationPatch {
                fn from(value: $ty) -> Self {
                    AnnotationPatch::$variant(value)
                }
            }
        )*
    };
}

impl_into_patch!(
    Text(TextPatch),
    Highlight(HighlightPatch),
    Underline(UnderlinePatch),
    Comment(CommentPatch),
    Image(ImagePatch),
);

/// Ties an annotation type to its collection inside [`AnnotationSet`] and its patch type.
pub trait StoredAnnotation: Clone + Into<Annotation> {
    type Patch: Clone + PartialEq;

    fn id(&self) -> AnnotationId;
    fn page(&self) -> PageId;
    fn collection(set: &AnnotationSet) -> &Vec<Self>;
    fn collection_mut(set: &mut AnnotationSet) -> &mut Vec<Self>;
    fn capture(patch: &Self::Patch, target: &Self) -> Self::Patch;
    fn apply(patch: &Self::Patch, target: &mut Self);
}

macro_rules! impl_stored_annotation {
    ($($ty:ty => $patch:ty, $field:ident);* $(;)?) => {
        $(
            impl StoredAnnotation for $ty {
                type Patch = $patch;

                fn id(&self) -> AnnotationId {
                    self.id
                }

                fn page(&self) -> PageId {
                    self.page
                }

                fn collection(set: &AnnotationSet) -> &Vec<Self> {
                    &set.$field
                }

                fn collection_mut(set: &mut AnnotationSet) -> &mut Vec<Self> {
                    &mut set.$field
                }

                fn capture(patch: &Self::Patch, target: &Self) -> Self::Patch {
                    patch.capture(target)
                }

                fn apply(patch: &Self::Patch, target: &mut Self) {
                    patch.apply_to(target)
                }
            }
        )*
    };
}

impl_stored_annotation!(
    TextAnnotation => TextPatch, texts;
    HighlightAnnotation => HighlightPatch, highlights;
    UnderlineAnnotation => UnderlinePatch, underlines;
    CommentAnnotation => CommentPatch, comments;
    ImageAnnotation => ImagePatch, images;
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_colors_parse_and_fall_back_to_black() {
        assert_eq!(Color::from_hex("#FFFF00"), Color::YELLOW);
        assert_eq!(Color::from_hex("ff0000"), Color::RED);
        assert_eq!(Color::from_hex("#12"), Color::BLACK);
        assert_eq!(Color::from_hex("#GG0000"), Color::BLACK);
        assert_eq!(Color::rgb(18, 52, 86).to_hex(), "#123456");
    }

    #[test]
    fn capture_records_only_patched_fields() {
        let text = TextAnnotation::new(PageId(0), 5.0, 6.0, "before");
        let patch = TextPatch { text: Some("after".to_owned()), ..TextPatch::default() };

        let previous = patch.capture(&text);
        assert_eq!(previous, TextPatch { text: Some("before".to_owned()), ..TextPatch::default() });
    }

    #[test]
    fn apply_then_apply_previous_restores_object() {
        let original = HighlightAnnotation::new(PageId(1), Rect::new(1.0, 2.0, 3.0, 4.0));
        let patch = HighlightPatch { x: Some(9.0), opacity: Some(0.8), ..HighlightPatch::default() };
        let previous = patch.capture(&original);

        let mut edited = original.clone();
        patch.apply_to(&mut edited);
        assert_eq!(edited.x, 9.0);
        assert_eq!(edited.opacity, 0.8);

        previous.apply_to(&mut edited);
        assert_eq!(edited, original);
    }

    #[test]
    fn legacy_underline_extends_horizontally() {
        let underline = UnderlineAnnotation::horizontal(PageId(0), 10.0, 20.0, 30.0, Color::RED);
        assert_eq!(underline.end(), Point::new(40.0, 20.0));
        assert_eq!(underline.length(), 30.0);
    }

    #[test]
    fn image_resize_keeps_original_aspect_ratio() {
        let image = ImageAnnotation {
            id: AnnotationId::new(),
            page: PageId(0),
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 100.0,
            data: Vec::new(),
            kind: ImageKind::Png,
            original_width: 400,
            original_height: 200,
        };
        assert_eq!(image.resize_to_width(100.0).height, Some(50.0));
        assert_eq!(image.resize_to_height(30.0).width, Some(60.0));
        assert_eq!(image.reset_to_original_size().width, Some(400.0));
    }

    #[test]
    fn annotation_serializes_with_explicit_kind_tag() {
        let annotation: Annotation = TextAnnotation::new(PageId(2), 1.0, 2.0, "hi").into();
        let json = serde_json::to_value(&annotation).expect("serialize annotation");
        assert_eq!(json["type"], "text");
        let back: Annotation = serde_json::from_value(json).expect("deserialize annotation");
        assert_eq!(back, annotation);
    }
}
