//! Editor defaults and limits, persisted by the storage crate.

use serde::{Deserialize, Serialize};

use crate::annotation::{Color, LineCap, LineStyle};
use crate::store::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomSettings {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self { min: 0.25, max: 4.0, step: 0.25, default: 1.0 }
    }
}

impl ZoomSettings {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if zoom.is_nan() {
            return self.default;
        }
        zoom.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub content: String,
    pub font_size: f32,
    pub color: Color,
    pub font_family: String,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            content: "Text".to_owned(),
            font_size: 14.0,
            color: Color::BLACK,
            font_family: "sans-serif".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightDefaults {
    pub color: Color,
    pub opacity: f32,
}

impl Default for HighlightDefaults {
    fn default() -> Self {
        Self { color: Color::YELLOW, opacity: 0.3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderlineDefaults {
    pub color: Color,
    pub thickness: f32,
    pub line_style: LineStyle,
    pub line_cap: LineCap,
}

impl Default for UnderlineDefaults {
    fn default() -> Self {
        Self { color: Color::RED, thickness: 2.0, line_style: LineStyle::Solid, line_cap: LineCap::Butt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    /// Longest side, in pixels, an inserted image is downsized to.
    pub max_pixel_dimension: u32,
    /// Longest side, in points, of a newly inserted image on the page.
    pub default_display_size: u32,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self { max_pixel_dimension: 2000, default_display_size: 200 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Drawn highlights and underlines must exceed this extent to be created.
    pub min_draw_extent: f32,
    pub handle_radius: f32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self { min_draw_extent: 5.0, handle_radius: 6.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Tool active when a document is opened.
    pub default_tool: Tool,
    pub zoom: ZoomSettings,
    pub text: TextDefaults,
    pub highlight: HighlightDefaults,
    pub underline: UnderlineDefaults,
    pub images: ImageDefaults,
    pub interaction: InteractionSettings,
}

impl EditorSettings {
    /// Replaces values the editor cannot work with by their defaults and
    /// returns the dotted names of the fields that were changed.
    pub fn repair(&mut self) -> Vec<&'static str> {
        let mut repaired = Vec::new();
        let zoom_defaults = ZoomSettings::default();

        let zoom = &mut self.zoom;
        if !(zoom.min.is_finite() && zoom.max.is_finite() && zoom.min > 0.0 && zoom.min <= zoom.max) {
            zoom.min = zoom_defaults.min;
            zoom.max = zoom_defaults.max;
            repaired.push("zoom.min");
            repaired.push("zoom.max");
        }
        if !(zoom.step.is_finite() && zoom.step > 0.0) {
            zoom.step = zoom_defaults.step;
            repaired.push("zoom.step");
        }
        if !(zoom.default >= zoom.min && zoom.default <= zoom.max) {
            zoom.default = zoom_defaults.default.clamp(zoom.min, zoom.max);
            repaired.push("zoom.default");
        }

        if !(self.text.font_size.is_finite() && self.text.font_size > 0.0) {
            self.text.font_size = TextDefaults::default().font_size;
            repaired.push("text.font_size");
        }
        if !(0.0..=1.0).contains(&self.highlight.opacity) {
            self.highlight.opacity = HighlightDefaults::default().opacity;
            repaired.push("highlight.opacity");
        }
        if !(self.underline.thickness.is_finite() && self.underline.thickness > 0.0) {
            self.underline.thickness = UnderlineDefaults::default().thickness;
            repaired.push("underline.thickness");
        }

        let image_defaults = ImageDefaults::default();
        if self.images.max_pixel_dimension == 0 {
            self.images.max_pixel_dimension = image_defaults.max_pixel_dimension;
            repaired.push("images.max_pixel_dimension");
        }
        if self.images.default_display_size == 0 {
            self.images.default_display_size = image_defaults.default_display_size;
            repaired.push("images.default_display_size");
        }

        let interaction_defaults = InteractionSettings::default();
        if !(self.interaction.min_draw_extent.is_finite() && self.interaction.min_draw_extent >= 0.0) {
            self.interaction.min_draw_extent = interaction_defaults.min_draw_extent;
            repaired.push("interaction.min_draw_extent");
        }
        if !(self.interaction.handle_radius.is_finite() && self.interaction.handle_radius > 0.0) {
            self.interaction.handle_radius = interaction_defaults.handle_radius;
            repaired.push("interaction.handle_radius");
        }

        repaired
    }
}
