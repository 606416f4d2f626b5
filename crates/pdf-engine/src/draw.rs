//! Drawing primitives in output space (points, bottom-left origin, Y up).
//!
//! Drawing is queued per page and written out as one appended content
//! stream when the document is saved.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{GenericImageView, ImageFormat};
use log::warn;
use lopdf::content::Operation;
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};

use crate::document::PdfDocument;
use crate::PdfEngineError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        Self { r: level, g: level, b: level }
    }

    fn operands(self) -> Vec<Object> {
        vec![Object::Real(self.r), Object::Real(self.g), Object::Real(self.b)]
    }
}

/// The base-14 families used for annotation text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    /// Maps a CSS-style family hint onto a standard font; anything
    /// unrecognized falls back to Helvetica.
    pub fn from_family_hint(hint: &str) -> Self {
        let lower = hint.trim().to_lowercase();
        match lower.as_str() {
            "serif" => return Self::TimesRoman,
            "monospace" => return Self::Courier,
            "sans-serif" | "cursive" | "fantasy" => return Self::Helvetica,
            _ => {}
        }

        if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
            Self::TimesRoman
        } else if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            Self::Courier
        } else {
            Self::Helvetica
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextParams {
    pub text: String,
    /// Baseline of the first line.
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub font: StandardFont,
    pub color: Rgb,
    /// Distance between baselines when `text` spans several lines.
    pub line_height: Option<f32>,
}

impl TextParams {
    pub fn new(text: impl Into<String>, x: f32, y: f32, size: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size,
            font: StandardFont::default(),
            color: Rgb::BLACK,
            line_height: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub color: Rgb,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectangleParams {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: Option<Rgb>,
    /// Fill opacity in `[0, 1]`.
    pub opacity: f32,
    pub border: Option<Border>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineCapStyle {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCapStyle {
    fn code(self) -> i64 {
        match self {
            Self::Butt => 0,
            Self::Round => 1,
            Self::Square => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineParams {
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub thickness: f32,
    pub color: Rgb,
    pub cap: LineCapStyle,
    /// Dash array; empty for a solid line.
    pub dash: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonParams {
    pub points: Vec<(f32, f32)>,
    pub fill: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageParams<'a> {
    /// Encoded PNG or JPEG bytes.
    pub data: &'a [u8],
    /// Lower-left corner of the placed image.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An image XObject embedded in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(ObjectId);

impl PdfDocument {
    pub fn draw_text(&mut self, page: usize, params: &TextParams) -> Result<(), PdfEngineError> {
        let font = self.page_font(page, params.font)?;
        let line_height = params.line_height.unwrap_or(params.size * 1.2);

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font), Object::Real(params.size)]),
            Operation::new("rg", params.color.operands()),
            Operation::new("Td", vec![Object::Real(params.x), Object::Real(params.y)]),
        ];
        for (index, line) in params.text.split('\n').enumerate() {
            if index > 0 {
                operations
                    .push(Operation::new("Td", vec![Object::Real(0.0), Object::Real(-line_height)]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        self.queue(page, operations)
    }

    pub fn draw_rectangle(
        &mut self,
        page: usize,
        params: &RectangleParams,
    ) -> Result<(), PdfEngineError> {
        let mut operations = vec![Operation::new("q", vec![])];
        if params.fill.is_some() && params.opacity < 1.0 {
            let state = self.page_opacity(page, params.opacity)?;
            operations.push(Operation::new("gs", vec![Object::Name(state)]));
        }
        if let Some(fill) = params.fill {
            operations.push(Operation::new("rg", fill.operands()));
        }
        if let Some(border) = params.border {
            operations.push(Operation::new("RG", border.color.operands()));
            operations.push(Operation::new("w", vec![Object::Real(border.width)]));
        }
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(params.x),
                Object::Real(params.y),
                Object::Real(params.width),
                Object::Real(params.height),
            ],
        ));
        let paint = match (params.fill.is_some(), params.border.is_some()) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => "n",
        };
        operations.push(Operation::new(paint, vec![]));
        operations.push(Operation::new("Q", vec![]));

        self.queue(page, operations)
    }

    pub fn draw_line(&mut self, page: usize, params: &LineParams) -> Result<(), PdfEngineError> {
        let dash = params.dash.iter().map(|length| Object::Real(*length)).collect();
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new("RG", params.color.operands()),
            Operation::new("w", vec![Object::Real(params.thickness)]),
            Operation::new("J", vec![Object::Integer(params.cap.code())]),
            Operation::new("d", vec![Object::Array(dash), Object::Integer(0)]),
            Operation::new("m", vec![Object::Real(params.start.0), Object::Real(params.start.1)]),
            Operation::new("l", vec![Object::Real(params.end.0), Object::Real(params.end.1)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ];
        self.queue(page, operations)
    }

    pub fn draw_polygon(
        &mut self,
        page: usize,
        params: &PolygonParams,
    ) -> Result<(), PdfEngineError> {
        let Some((first, rest)) = params.points.split_first() else {
            return Ok(());
        };

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new("rg", params.fill.operands()),
            Operation::new("m", vec![Object::Real(first.0), Object::Real(first.1)]),
        ];
        for point in rest {
            operations.push(Operation::new("l", vec![Object::Real(point.0), Object::Real(point.1)]));
        }
        operations.push(Operation::new("h", vec![]));
        operations.push(Operation::new("f", vec![]));
        operations.push(Operation::new("Q", vec![]));

        self.queue(page, operations)
    }

    /// Decodes and embeds an image. JPEGs are stored as-is; everything else is
    /// re-encoded as Flate-compressed RGB with an optional soft mask for alpha.
    pub fn embed_image(&mut self, data: &[u8]) -> Result<ImageHandle, PdfEngineError> {
        let format = image::guess_format(data)?;
        let decoded = image::load_from_memory_with_format(data, format)?;
        let (width, height) = decoded.dimensions();

        let mut dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(width))),
            ("Height", Object::Integer(i64::from(height))),
            ("BitsPerComponent", Object::Integer(8)),
        ]);

        if format == ImageFormat::Jpeg {
            let color_space = match decoded.color().channel_count() {
                1 => "DeviceGray",
                _ => "DeviceRGB",
            };
            dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            let id = self.doc.add_object(Stream::new(dict, data.to_vec()).with_compression(false));
            return Ok(ImageHandle(id));
        }

        let rgba = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        if alpha.iter().any(|value| *value != u8::MAX) {
            let mask = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(i64::from(width))),
                ("Height", Object::Integer(i64::from(height))),
                ("BitsPerComponent", Object::Integer(8)),
                ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
                ("Filter", Object::Name(b"FlateDecode".to_vec())),
            ]);
            let mask_id = self.doc.add_object(flate_stream(mask, &alpha)?);
            dict.set("SMask", Object::Reference(mask_id));
        }

        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let id = self.doc.add_object(flate_stream(dict, &rgb)?);
        Ok(ImageHandle(id))
    }

    pub fn draw_image(&mut self, page: usize, params: &ImageParams<'_>) -> Result<(), PdfEngineError> {
        let handle = self.embed_image(params.data)?;
        self.draw_embedded_image(page, handle, params)
    }

    pub fn draw_embedded_image(
        &mut self,
        page: usize,
        handle: ImageHandle,
        params: &ImageParams<'_>,
    ) -> Result<(), PdfEngineError> {
        let name = self.page_image(page, handle)?;
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(params.width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(params.height),
                    Object::Real(params.x),
                    Object::Real(params.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name)]),
            Operation::new("Q", vec![]),
        ];
        self.queue(page, operations)
    }

    /// Appends operations to the page's pending canvas. Pages whose media box
    /// does not start at the origin get a one-time translation first.
    fn queue(&mut self, page: usize, operations: Vec<Operation>) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page)?;
        let ((x0, y0), _) = self.media_box(page)?;
        let canvas = self.canvases.entry(page_id).or_default();
        if canvas.operations.is_empty() && (x0 != 0.0 || y0 != 0.0) {
            canvas.operations.push(Operation::new(
                "cm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(x0),
                    Object::Real(y0),
                ],
            ));
        }
        canvas.operations.extend(operations);
        Ok(())
    }

    fn page_font(&mut self, page: usize, font: StandardFont) -> Result<Vec<u8>, PdfEngineError> {
        let page_id = self.page_id(page)?;
        if let Some(name) = self.canvases.get(&page_id).and_then(|canvas| canvas.fonts.get(&font)) {
            return Ok(name.clone());
        }

        let font_id = match self.fonts.get(&font) {
            Some(id) => *id,
            None => {
                let id = self.doc.add_object(Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"Font".to_vec())),
                    ("Subtype", Object::Name(b"Type1".to_vec())),
                    ("BaseFont", Object::Name(font.base_font().as_bytes().to_vec())),
                    ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
                ]));
                self.fonts.insert(font, id);
                id
            }
        };

        let name = self.add_resource(page_id, b"Font", "F", Object::Reference(font_id))?;
        self.canvases.entry(page_id).or_default().fonts.insert(font, name.clone());
        Ok(name)
    }

    fn page_opacity(&mut self, page: usize, opacity: f32) -> Result<Vec<u8>, PdfEngineError> {
        let page_id = self.page_id(page)?;
        let opacity = opacity.clamp(0.0, 1.0);
        let key = opacity.to_bits();
        if let Some(name) = self.canvases.get(&page_id).and_then(|canvas| canvas.states.get(&key)) {
            return Ok(name.clone());
        }

        let state = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"ExtGState".to_vec())),
            ("ca", Object::Real(opacity)),
            ("CA", Object::Real(opacity)),
        ]);
        let name = self.add_resource(page_id, b"ExtGState", "GS", Object::Dictionary(state))?;
        self.canvases.entry(page_id).or_default().states.insert(key, name.clone());
        Ok(name)
    }

    fn page_image(&mut self, page: usize, handle: ImageHandle) -> Result<Vec<u8>, PdfEngineError> {
        let page_id = self.page_id(page)?;
        if let Some(name) = self.canvases.get(&page_id).and_then(|canvas| canvas.images.get(&handle.0))
        {
            return Ok(name.clone());
        }

        let name = self.add_resource(page_id, b"XObject", "Im", Object::Reference(handle.0))?;
        self.canvases.entry(page_id).or_default().images.insert(handle.0, name.clone());
        Ok(name)
    }

    /// Adds `value` under a fresh name in one category of the page's resources,
    /// inlining the resource dictionaries so shared ones are never modified.
    fn add_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        value: Object,
    ) -> Result<Vec<u8>, PdfEngineError> {
        let page = self.doc.get_dictionary(page_id)?;
        let mut resources = match page.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
            _ => Dictionary::new(),
        };
        let mut entries = match resources.get(category) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
            _ => Dictionary::new(),
        };

        let mut counter = entries.len() + 1;
        let name = loop {
            let candidate = format!("{prefix}{counter}").into_bytes();
            if !entries.has(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        entries.set(name.clone(), value);
        resources.set(category.to_vec(), Object::Dictionary(entries));

        let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(name)
    }
}

fn flate_stream(dict: Dictionary, data: &[u8]) -> Result<Stream, PdfEngineError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(Stream::new(dict, compressed).with_compression(false))
}

/// Encodes text for a WinAnsi standard font. Characters outside the encoding
/// are replaced with `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut replaced = 0usize;
    let bytes = text
        .chars()
        .map(|ch| match win_ansi_byte(ch) {
            Some(byte) => byte,
            None => {
                replaced += 1;
                b'?'
            }
        })
        .collect();
    if replaced > 0 {
        warn!("replaced {replaced} characters not representable in WinAnsiEncoding");
    }
    bytes
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = u32::from(ch);
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        0x09 => Some(b' '),
        _ => match ch {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoadOptions, PageSize};
    use image::{ImageBuffer, Rgba};
    use pretty_assertions::assert_eq;

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let image = ImageBuffer::from_pixel(width, height, Rgba([10u8, 20, 30, alpha]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).expect("png encode should succeed");
        bytes.into_inner()
    }

    fn numbers(operands: &[Object]) -> Vec<f32> {
        operands.iter().map(|operand| operand.as_float().expect("numeric operand")).collect()
    }

    fn blank_document() -> PdfDocument {
        let mut doc = PdfDocument::create();
        doc.add_blank_page(PageSize::LETTER);
        doc
    }

    fn saved_operators(mut doc: PdfDocument) -> Vec<String> {
        let bytes = doc.save().expect("save should succeed");
        let reloaded = PdfDocument::load(&bytes, LoadOptions::default()).expect("reload");
        reloaded
            .page_operations(0)
            .expect("content should decode")
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    #[test]
    fn family_hints_map_to_standard_fonts() {
        assert_eq!(StandardFont::from_family_hint("serif"), StandardFont::TimesRoman);
        assert_eq!(StandardFont::from_family_hint("Georgia, serif"), StandardFont::TimesRoman);
        assert_eq!(StandardFont::from_family_hint("monospace"), StandardFont::Courier);
        assert_eq!(StandardFont::from_family_hint("sans-serif"), StandardFont::Helvetica);
        assert_eq!(StandardFont::from_family_hint("Comic Sans"), StandardFont::Helvetica);
    }

    #[test]
    fn win_ansi_replaces_unencodable_characters() {
        assert_eq!(encode_win_ansi("café – ok"), b"caf\xe9 \x96 ok".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn multi_line_text_moves_down_by_line_height() {
        let mut doc = blank_document();
        let mut params = TextParams::new("one\ntwo", 10.0, 100.0, 8.0);
        params.line_height = Some(10.0);
        doc.draw_text(0, &params).expect("draw should succeed");

        let canvas = doc.canvases.values().next().expect("canvas was created");
        let moves: Vec<Vec<f32>> = canvas
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .map(|op| numbers(&op.operands))
            .collect();
        assert_eq!(moves, vec![vec![10.0, 100.0], vec![0.0, -10.0]]);
    }

    #[test]
    fn translucent_fill_uses_a_graphics_state() {
        let mut doc = blank_document();
        doc.draw_rectangle(
            0,
            &RectangleParams {
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 40.0,
                fill: Some(Rgb::new(1.0, 1.0, 0.0)),
                opacity: 0.3,
                border: None,
            },
        )
        .expect("draw should succeed");

        assert_eq!(saved_operators(doc), vec!["q", "gs", "rg", "re", "f", "Q"]);
    }

    #[test]
    fn dashed_line_sets_cap_and_pattern() {
        let mut doc = blank_document();
        doc.draw_line(
            0,
            &LineParams {
                start: (0.0, 0.0),
                end: (50.0, 0.0),
                thickness: 2.0,
                color: Rgb::BLACK,
                cap: LineCapStyle::Round,
                dash: vec![6.0, 4.0],
            },
        )
        .expect("draw should succeed");

        let canvas = doc.canvases.values().next().expect("canvas was created");
        let cap = canvas.operations.iter().find(|op| op.operator == "J").expect("cap is set");
        assert_eq!(numbers(&cap.operands), vec![1.0]);
        let dash = canvas.operations.iter().find(|op| op.operator == "d").expect("dash is set");
        let pattern = dash.operands[0].as_array().expect("dash array");
        assert_eq!(numbers(pattern), vec![6.0, 4.0]);
    }

    #[test]
    fn translucent_png_gets_a_soft_mask() {
        let mut doc = blank_document();
        let handle = doc.embed_image(&png_bytes(4, 2, 128)).expect("embed should succeed");
        let stream = doc.doc.get_object(handle.0).and_then(Object::as_stream).expect("stream");
        assert!(stream.dict.has(b"SMask"));
        assert_eq!(stream.dict.get(b"Width").and_then(Object::as_i64).expect("width"), 4);

        let opaque = doc.embed_image(&png_bytes(4, 2, 255)).expect("embed should succeed");
        let stream = doc.doc.get_object(opaque.0).and_then(Object::as_stream).expect("stream");
        assert!(!stream.dict.has(b"SMask"));
    }

    #[test]
    fn image_is_placed_with_a_scaling_matrix() {
        let mut doc = blank_document();
        let data = png_bytes(2, 2, 255);
        doc.draw_image(0, &ImageParams { data: &data, x: 5.0, y: 6.0, width: 100.0, height: 50.0 })
            .expect("draw should succeed");

        assert_eq!(saved_operators(doc), vec!["q", "cm", "Do", "Q"]);
    }

    #[test]
    fn undecodable_image_is_an_error() {
        let mut doc = blank_document();
        let err = doc.embed_image(b"definitely not an image").expect_err("bad bytes");
        assert!(matches!(err, PdfEngineError::Image(_)));
    }
}
