use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;

use crate::types::{Color, Frame};

/// An RGBA8 drawing target. Every primitive clips to the surface bounds.
#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            rgba: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Changes the dimensions. Contents are undefined until the next `clear`.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.rgba.resize((width as usize) * (height as usize) * 4, 0);
    }

    pub fn clear(&mut self, color: Color) {
        for px in self.rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&color.0);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.rgba[idx..idx + 4]);
        Some(out)
    }

    /// Copies a frame onto the surface, stretched to cover all of it.
    pub fn blit_scaled(&mut self, frame: &Frame) -> Result<()> {
        let expected_len = (frame.width as usize)
            .saturating_mul(frame.height as usize)
            .saturating_mul(4);
        if frame.rgba.len() != expected_len {
            return Err(anyhow!(
                "frame buffer size mismatch: got {}, expected {}",
                frame.rgba.len(),
                expected_len
            ));
        }

        if frame.width == self.width && frame.height == self.height {
            self.rgba.copy_from_slice(&frame.rgba);
            return Ok(());
        }

        let src_image = fir::images::Image::from_vec_u8(
            frame.width,
            frame.height,
            frame.rgba.clone(),
            fir::PixelType::U8x4,
        )?;
        let mut dst_image = fir::images::Image::new(self.width, self.height, fir::PixelType::U8x4);
        let mut resizer = fir::Resizer::new();
        let resize_options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
        resizer
            .resize(&src_image, &mut dst_image, Some(&resize_options))
            .context("fast resize failed")?;
        self.rgba = dst_image.into_vec();
        Ok(())
    }

    /// Source-over blend of one pixel. Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Color, coverage: f32) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        let alpha = (color.0[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let dst = &mut self.rgba[idx..idx + 4];
        if alpha >= 1.0 {
            dst.copy_from_slice(&color.0);
            dst[3] = 255;
            return;
        }
        for channel in 0..3 {
            let src = color.0[channel] as f32;
            let old = dst[channel] as f32;
            dst[channel] = (src * alpha + old * (1.0 - alpha)).round() as u8;
        }
        let old_alpha = dst[3] as f32 / 255.0;
        dst[3] = ((alpha + old_alpha * (1.0 - alpha)) * 255.0).round() as u8;
    }

    /// Thick line with square-ish caps. Each covered pixel is blended once, so
    /// translucent strokes stay even.
    pub fn draw_line(&mut self, p0: (f32, f32), p1: (f32, f32), color: Color, thickness: f32) {
        let half = (thickness.max(1.0)) / 2.0;
        let min_x = (p0.0.min(p1.0) - half).floor() as i32;
        let max_x = (p0.0.max(p1.0) + half).ceil() as i32;
        let min_y = (p0.1.min(p1.1) - half).floor() as i32;
        let max_y = (p0.1.max(p1.1) + half).ceil() as i32;
        let (x_lo, x_hi) = self.clip_x(min_x, max_x);
        let (y_lo, y_hi) = self.clip_y(min_y, max_y);

        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let px = (x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(px, p0, p1) <= half {
                    self.blend_pixel(x, y, color, 1.0);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        self.ring(center, 0.0, radius, color);
    }

    /// Stroke centred on `radius`, like a canvas `arc` + `stroke`.
    pub fn stroke_circle(&mut self, center: (f32, f32), radius: f32, thickness: f32, color: Color) {
        let half = thickness / 2.0;
        self.ring(center, (radius - half).max(0.0), radius + half, color);
    }

    fn ring(&mut self, center: (f32, f32), inner: f32, outer: f32, color: Color) {
        let (cx, cy) = center;
        let (x_lo, x_hi) = self.clip_x((cx - outer).floor() as i32, (cx + outer).ceil() as i32);
        let (y_lo, y_hi) = self.clip_y((cy - outer).floor() as i32, (cy + outer).ceil() as i32);
        let inner_sq = inner * inner;
        let outer_sq = outer * outer;
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d = dx * dx + dy * dy;
                if d <= outer_sq && (inner == 0.0 || d >= inner_sq) {
                    self.blend_pixel(x, y, color, 1.0);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let (x_lo, x_hi) = self.clip_x(x.round() as i32, (x + width).round() as i32 - 1);
        let (y_lo, y_hi) = self.clip_y(y.round() as i32, (y + height).round() as i32 - 1);
        for py in y_lo..=y_hi {
            for px in x_lo..=x_hi {
                self.blend_pixel(px, py, color, 1.0);
            }
        }
    }

    // Empty ranges come back inverted so the `..=` loops skip them.
    fn clip_x(&self, lo: i32, hi: i32) -> (i32, i32) {
        (lo.max(0), hi.min(self.width as i32 - 1))
    }

    fn clip_y(&self, lo: i32, hi: i32) -> (i32, i32) {
        (lo.max(0), hi.min(self.height as i32 - 1))
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + abx * t, a.1 + aby * t);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Frame {
            camera_id: 0,
            frame_id: 0,
            rgba,
            width,
            height,
        }
    }

    #[test]
    fn translucent_blend_over_black() {
        let mut surface = Surface::new(4, 4);
        surface.clear(Color::BLACK);
        surface.blend_pixel(1, 1, Color([0, 255, 0, 153]), 1.0);
        assert_eq!(surface.pixel(1, 1), Some([0, 153, 0, 255]));
    }

    #[test]
    fn primitives_clip_to_bounds() {
        let mut surface = Surface::new(10, 10);
        surface.clear(Color::BLACK);
        surface.draw_line((-50.0, 5.0), (50.0, 5.0), Color::WHITE, 3.0);
        surface.fill_circle((0.0, 0.0), 30.0, Color::WHITE);
        surface.fill_rect(-5.0, -5.0, 100.0, 100.0, Color::WHITE);
        assert_eq!(surface.pixel(9, 9), Some([255, 255, 255, 255]));
    }

    #[test]
    fn thick_line_covers_its_width() {
        let mut surface = Surface::new(20, 20);
        surface.clear(Color::BLACK);
        surface.draw_line((2.0, 10.0), (18.0, 10.0), Color::WHITE, 4.0);
        assert_eq!(surface.pixel(10, 8), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(10, 11), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(10, 14), Some([0, 0, 0, 255]));
    }

    #[test]
    fn stroke_circle_leaves_centre_untouched() {
        let mut surface = Surface::new(30, 30);
        surface.clear(Color::BLACK);
        surface.stroke_circle((15.0, 15.0), 9.0, 3.0, Color::WHITE);
        assert_eq!(surface.pixel(15, 15), Some([0, 0, 0, 255]));
        assert_eq!(surface.pixel(24, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn blit_copies_or_scales() {
        let mut surface = Surface::new(8, 6);
        surface.blit_scaled(&solid_frame(8, 6, [10, 20, 30])).unwrap();
        assert_eq!(surface.pixel(7, 5), Some([10, 20, 30, 255]));

        surface.blit_scaled(&solid_frame(4, 3, [200, 100, 50])).unwrap();
        assert_eq!(surface.rgba().len(), 8 * 6 * 4);
        assert_eq!(surface.pixel(4, 3), Some([200, 100, 50, 255]));
    }

    #[test]
    fn blit_rejects_short_buffers() {
        let mut surface = Surface::new(4, 4);
        let mut frame = solid_frame(4, 4, [0, 0, 0]);
        frame.rgba.truncate(10);
        assert!(surface.blit_scaled(&frame).is_err());
    }
}
