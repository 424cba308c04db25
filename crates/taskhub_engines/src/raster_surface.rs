#![forbid(unsafe_code)]

use std::f32::consts::PI;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::unsub_glyph::{GlyphColor, GlyphPlacement, GlyphSurface};

const ELLIPSE_SEGMENTS: usize = 28;

/// In-memory RGBA canvas backing the challenge image.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(1, 1),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<GlyphColor> {
        self.image.get_pixel_checked(x, y).map(|p| GlyphColor {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        })
    }

    /// Wipes the canvas so a closed challenge leaves no drawn code behind.
    pub fn clear(&mut self) {
        self.image = RgbaImage::new(1, 1);
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn blend_coverage(&mut self, x: i32, y: i32, color: GlyphColor, coverage: f32) {
        if x < 0 || y < 0 || coverage <= 0.0 {
            return;
        }
        let Some(dst) = self.image.get_pixel_mut_checked(x as u32, y as u32) else {
            return;
        };
        let src_a = (color.a as f32 / 255.0) * coverage.min(1.0);
        let dst_a = dst[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return;
        }
        let mix = |s: u8, d: u8| -> u8 {
            let v = (s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };
        *dst = Rgba([
            mix(color.r, dst[0]),
            mix(color.g, dst[1]),
            mix(color.b, dst[2]),
            (out_a * 255.0).round() as u8,
        ]);
    }
}

impl GlyphSurface for RasterSurface {
    fn resize(&mut self, width_px: u32, height_px: u32) {
        self.image = RgbaImage::new(width_px.max(1), height_px.max(1));
    }

    fn fill(&mut self, color: GlyphColor) {
        let px = Rgba([color.r, color.g, color.b, color.a]);
        for p in self.image.pixels_mut() {
            *p = px;
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: GlyphColor) {
        self.blend_coverage(x, y, color, 1.0);
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width_px: f32, color: GlyphColor) {
        let half = (width_px / 2.0).max(0.5);
        let min_x = (from.0.min(to.0) - half - 1.0).floor() as i32;
        let max_x = (from.0.max(to.0) + half + 1.0).ceil() as i32;
        let min_y = (from.1.min(to.1) - half - 1.0).floor() as i32;
        let max_y = (from.1.max(to.1) + half + 1.0).ceil() as i32;
        let max_x = max_x.min(self.image.width() as i32 - 1);
        let max_y = max_y.min(self.image.height() as i32 - 1);
        for y in min_y.max(0)..=max_y {
            for x in min_x.max(0)..=max_x {
                let d = distance_to_segment((x as f32 + 0.5, y as f32 + 0.5), from, to);
                let coverage = (half + 0.5 - d).clamp(0.0, 1.0);
                self.blend_coverage(x, y, color, coverage);
            }
        }
    }

    fn draw_glyph(&mut self, glyph: &GlyphPlacement) {
        let (sin, cos) = glyph.rotation_rad.sin_cos();
        let place = |(u, v): (f32, f32)| -> (f32, f32) {
            let x = u * glyph.size_px;
            let y = v * glyph.size_px;
            (
                glyph.center_x + x * cos - y * sin,
                glyph.center_y + x * sin + y * cos,
            )
        };
        for stroke in glyph_strokes(glyph.ch) {
            for pair in stroke.windows(2) {
                self.stroke_line(place(pair[0]), place(pair[1]), glyph.stroke_px, glyph.color);
            }
        }
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

fn ellipse(cx: f32, cy: f32, rx: f32, ry: f32) -> Vec<(f32, f32)> {
    (0..=ELLIPSE_SEGMENTS)
        .map(|i| {
            let t = 2.0 * PI * i as f32 / ELLIPSE_SEGMENTS as f32;
            (cx + rx * t.cos(), cy + ry * t.sin())
        })
        .collect()
}

/// Polylines in a unit em box centred on the origin, y pointing down.
fn glyph_strokes(ch: char) -> Vec<Vec<(f32, f32)>> {
    match ch {
        'I' => vec![
            vec![(0.0, -0.45), (0.0, 0.45)],
            vec![(-0.16, -0.45), (0.16, -0.45)],
            vec![(-0.16, 0.45), (0.16, 0.45)],
        ],
        'l' => vec![vec![(0.0, -0.5), (0.0, 0.38), (0.04, 0.46), (0.12, 0.48)]],
        '1' => vec![
            vec![(-0.16, -0.3), (0.04, -0.46), (0.04, 0.45)],
            vec![(-0.14, 0.45), (0.22, 0.45)],
        ],
        '|' => vec![vec![(0.0, -0.55), (0.0, 0.55)]],
        '!' => vec![vec![(0.0, -0.46), (0.0, 0.2)], vec![(0.0, 0.38), (0.0, 0.45)]],
        'i' => vec![vec![(0.0, -0.08), (0.0, 0.45)], vec![(0.0, -0.34), (0.0, -0.27)]],
        'O' => vec![ellipse(0.0, 0.0, 0.3, 0.45)],
        '0' => vec![ellipse(0.0, 0.0, 0.23, 0.45)],
        'o' => vec![ellipse(0.0, 0.18, 0.22, 0.27)],
        _ => vec![vec![
            (-0.25, -0.4),
            (0.25, -0.4),
            (0.25, 0.4),
            (-0.25, 0.4),
            (-0.25, -0.4),
        ]],
    }
}
