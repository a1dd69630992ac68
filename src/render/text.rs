use anyhow::{Result, anyhow};
use rusttype::{Font, Scale, point};

use super::raster::Surface;
use crate::types::Color;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    pub size: f32,
    pub color: Color,
    pub h_align: HAlign,
    pub v_align: VAlign,
    /// Outline colour and width in pixels, drawn under the fill.
    pub outline: Option<(Color, f32)>,
}

impl TextStyle {
    pub fn new(size: f32, color: Color) -> Self {
        Self {
            size,
            color,
            h_align: HAlign::Left,
            v_align: VAlign::Top,
            outline: None,
        }
    }

    pub fn align(mut self, h_align: HAlign, v_align: VAlign) -> Self {
        self.h_align = h_align;
        self.v_align = v_align;
        self
    }

    pub fn outline(mut self, color: Color, width: f32) -> Self {
        self.outline = Some((color, width));
        self
    }
}

/// Rasterizes single-line labels with the embedded Fira Code face.
pub struct TextRenderer {
    font: Font<'static>,
}

impl TextRenderer {
    pub fn new() -> Result<Self> {
        let font_data = ttf_firacode::REGULAR;
        let font = Font::try_from_bytes(font_data as &[u8])
            .ok_or_else(|| anyhow!("error constructing font"))?;
        Ok(Self { font })
    }

    /// Width and line height of `text` at `size` pixels.
    pub fn measure(&self, text: &str, size: f32) -> (f32, f32) {
        let scale = Scale::uniform(size);
        let v_metrics = self.font.v_metrics(scale);
        let width = self
            .font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        (width, v_metrics.ascent - v_metrics.descent)
    }

    pub fn draw(&self, surface: &mut Surface, text: &str, anchor: (f32, f32), style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        let scale = Scale::uniform(style.size);
        let v_metrics = self.font.v_metrics(scale);
        let (width, height) = self.measure(text, style.size);

        let left = match style.h_align {
            HAlign::Left => anchor.0,
            HAlign::Center => anchor.0 - width / 2.0,
        };
        let top = match style.v_align {
            VAlign::Top => anchor.1,
            VAlign::Middle => anchor.1 - height / 2.0,
            VAlign::Bottom => anchor.1 - height,
        };

        if let Some((outline_color, outline_width)) = style.outline {
            let radius = (outline_width / 2.0).ceil().max(1.0) as i32;
            for oy in -radius..=radius {
                for ox in -radius..=radius {
                    if (ox == 0 && oy == 0) || ox * ox + oy * oy > radius * radius {
                        continue;
                    }
                    let origin = (left + ox as f32, top + oy as f32 + v_metrics.ascent);
                    self.draw_glyphs(surface, text, scale, origin, outline_color);
                }
            }
        }

        self.draw_glyphs(
            surface,
            text,
            scale,
            (left, top + v_metrics.ascent),
            style.color,
        );
    }

    fn draw_glyphs(
        &self,
        surface: &mut Surface,
        text: &str,
        scale: Scale,
        baseline: (f32, f32),
        color: Color,
    ) {
        for glyph in self.font.layout(text, scale, point(baseline.0, baseline.1)) {
            if let Some(bounding_box) = glyph.pixel_bounding_box() {
                glyph.draw(|x, y, coverage| {
                    surface.blend_pixel(
                        x as i32 + bounding_box.min.x,
                        y as i32 + bounding_box.min.y,
                        color,
                        coverage,
                    );
                });
            }
        }
    }
}
