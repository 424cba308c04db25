#![forbid(unsafe_code)]

use std::f32::consts::PI;
use std::fmt;

use rand::Rng;
use taskhub_kernel_contracts::unsub::{ChallengeCode, SurfaceSize};
use taskhub_kernel_contracts::ContractViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl GlyphColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

pub const GLYPH_PALETTE: &[GlyphColor] = &[
    GlyphColor::rgb(0x1f, 0x3a, 0x8a),
    GlyphColor::rgb(0x9d, 0x17, 0x4d),
    GlyphColor::rgb(0x06, 0x5f, 0x46),
    GlyphColor::rgb(0x92, 0x40, 0x0e),
    GlyphColor::rgb(0x4c, 0x1d, 0x95),
    GlyphColor::rgb(0x11, 0x18, 0x27),
];

pub const SURFACE_BACKGROUND_LIGHT: GlyphColor = GlyphColor::rgb(0xf8, 0xfa, 0xfc);

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRenderConfig {
    pub surface_height_css: u32,
    pub min_width_css: u32,
    pub max_width_css: u32,
    pub max_device_pixel_ratio: f32,
    pub padding_css: f32,
    pub glyph_size_css: f32,
    pub max_rotation_rad: f32,
    pub max_jitter_css: f32,
    pub noise_dot_count: u32,
    pub noise_alpha_max: u8,
    pub wave_line_count: u8,
    pub wave_alpha: u8,
    pub background: GlyphColor,
    pub palette: &'static [GlyphColor],
}

impl GlyphRenderConfig {
    pub fn mvp_v1() -> Self {
        Self {
            surface_height_css: 80,
            min_width_css: 120,
            max_width_css: 4_096,
            max_device_pixel_ratio: 4.0,
            padding_css: 12.0,
            glyph_size_css: 36.0,
            max_rotation_rad: 0.30,
            max_jitter_css: 8.0,
            noise_dot_count: 420,
            noise_alpha_max: 70,
            wave_line_count: 3,
            wave_alpha: 110,
            background: SURFACE_BACKGROUND_LIGHT,
            palette: GLYPH_PALETTE,
        }
    }
}

/// Container measurements supplied by the host on open, resize or theme change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderViewport {
    pub container_width_css: u32,
    pub device_pixel_ratio: f32,
}

impl RenderViewport {
    pub fn new(container_width_css: u32, device_pixel_ratio: f32) -> Self {
        Self {
            container_width_css,
            device_pixel_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub width_px: u32,
    pub height_px: u32,
    pub scale: f32,
}

impl SurfaceGeometry {
    pub fn size(&self) -> SurfaceSize {
        SurfaceSize {
            width_px: self.width_px,
            height_px: self.height_px,
        }
    }
}

/// Where and how one character is drawn. `Debug` omits the character.
#[derive(Clone, Copy, PartialEq)]
pub struct GlyphPlacement {
    pub ch: char,
    pub center_x: f32,
    pub center_y: f32,
    pub rotation_rad: f32,
    pub size_px: f32,
    pub stroke_px: f32,
    pub color: GlyphColor,
}

impl fmt::Debug for GlyphPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphPlacement")
            .field("center_x", &self.center_x)
            .field("center_y", &self.center_y)
            .field("rotation_rad", &self.rotation_rad)
            .field("size_px", &self.size_px)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseDot {
    pub x: i32,
    pub y: i32,
    pub color: GlyphColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveLine {
    pub points: Vec<(f32, f32)>,
    pub width_px: f32,
    pub color: GlyphColor,
}

/// A fully randomized drawing, consumed by `paint`.
#[derive(Debug)]
pub struct RenderPlan {
    pub surface: SurfaceGeometry,
    pub background: GlyphColor,
    pub noise: Vec<NoiseDot>,
    pub glyphs: Vec<GlyphPlacement>,
    pub waves: Vec<WaveLine>,
}

/// 2D drawing surface primitives the renderer needs.
pub trait GlyphSurface {
    fn resize(&mut self, width_px: u32, height_px: u32);
    fn fill(&mut self, color: GlyphColor);
    fn blend_pixel(&mut self, x: i32, y: i32, color: GlyphColor);
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width_px: f32, color: GlyphColor);
    fn draw_glyph(&mut self, glyph: &GlyphPlacement);
}

#[derive(Debug, Clone)]
pub struct GlyphRenderer {
    config: GlyphRenderConfig,
}

impl GlyphRenderer {
    pub fn new(config: GlyphRenderConfig) -> Result<Self, ContractViolation> {
        if config.surface_height_css < 32 || config.surface_height_css > 400 {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_render_config.surface_height_css",
                reason: "must be within 32..=400",
            });
        }
        if config.min_width_css == 0 || config.max_width_css < config.min_width_css {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_render_config.max_width_css",
                reason: "must be >= min_width_css > 0",
            });
        }
        if !config.max_device_pixel_ratio.is_finite() || config.max_device_pixel_ratio < 1.0 {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_render_config.max_device_pixel_ratio",
                reason: "must be finite and >= 1",
            });
        }
        if config.palette.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_render_config.palette",
                reason: "must not be empty",
            });
        }
        if !(0.0..=PI / 2.0).contains(&config.max_rotation_rad) {
            return Err(ContractViolation::InvalidRange {
                field: "glyph_render_config.max_rotation_rad",
                min: 0.0,
                max: f64::from(PI / 2.0),
                got: f64::from(config.max_rotation_rad),
            });
        }
        if config.glyph_size_css <= 0.0 || config.max_jitter_css < 0.0 || config.padding_css < 0.0
        {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_render_config",
                reason: "sizes must be positive",
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GlyphRenderConfig {
        &self.config
    }

    /// Container width by fixed height, scaled for pixel density.
    pub fn surface_geometry(&self, viewport: RenderViewport) -> Result<SurfaceGeometry, ContractViolation> {
        let dpr = viewport.device_pixel_ratio;
        if !dpr.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "render_viewport.device_pixel_ratio",
            });
        }
        if viewport.container_width_css > self.config.max_width_css {
            return Err(ContractViolation::InvalidRange {
                field: "render_viewport.container_width_css",
                min: 0.0,
                max: f64::from(self.config.max_width_css),
                got: f64::from(viewport.container_width_css),
            });
        }
        let scale = dpr.clamp(1.0, self.config.max_device_pixel_ratio);
        let width_css = viewport.container_width_css.max(self.config.min_width_css);
        Ok(SurfaceGeometry {
            width_px: (width_css as f32 * scale).round() as u32,
            height_px: (self.config.surface_height_css as f32 * scale).round() as u32,
            scale,
        })
    }

    pub fn plan<R>(
        &self,
        code: &ChallengeCode,
        viewport: RenderViewport,
        rng: &mut R,
    ) -> Result<RenderPlan, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        let surface = self.surface_geometry(viewport)?;
        let chars = code.expose_secret().chars();
        let glyph_count = code.char_len();
        if glyph_count == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "glyph_renderer.code",
                reason: "must not be cleared",
            });
        }

        let width = surface.width_px as f32;
        let height = surface.height_px as f32;
        let padding = self.config.padding_css * surface.scale;
        let slot = ((width - 2.0 * padding) / glyph_count as f32).max(1.0);
        let size_px = (self.config.glyph_size_css * surface.scale)
            .min(slot * 1.6)
            .min(height * 0.7);
        let stroke_px = (size_px * 0.09).max(1.5);
        let jitter_bound = (self.config.max_jitter_css * surface.scale)
            .min(((height - size_px) / 2.0).max(0.0));

        let glyphs = chars
            .enumerate()
            .map(|(i, ch)| GlyphPlacement {
                ch,
                center_x: padding + slot * (i as f32 + 0.5),
                center_y: height / 2.0 + symmetric(rng, jitter_bound),
                rotation_rad: symmetric(rng, self.config.max_rotation_rad),
                size_px,
                stroke_px,
                color: self.config.palette[rng.gen_range(0..self.config.palette.len())],
            })
            .collect();

        let noise = (0..self.config.noise_dot_count)
            .map(|_| NoiseDot {
                x: rng.gen_range(0..surface.width_px.max(1)) as i32,
                y: rng.gen_range(0..surface.height_px.max(1)) as i32,
                color: self.config.palette[rng.gen_range(0..self.config.palette.len())]
                    .with_alpha(rng.gen_range(8..=self.config.noise_alpha_max.max(8))),
            })
            .collect();

        let waves = (0..self.config.wave_line_count)
            .map(|_| self.wave_line(surface, rng))
            .collect();

        Ok(RenderPlan {
            surface,
            background: self.config.background,
            noise,
            glyphs,
            waves,
        })
    }

    fn wave_line<R>(&self, surface: SurfaceGeometry, rng: &mut R) -> WaveLine
    where
        R: Rng + ?Sized,
    {
        let width = surface.width_px as f32;
        let height = surface.height_px as f32;
        let base_y = rng.gen_range(height * 0.2..=height * 0.8);
        let amplitude = rng.gen_range(3.0..=12.0) * surface.scale;
        let wavelength = rng.gen_range(40.0..=120.0) * surface.scale;
        let phase = rng.gen_range(0.0..(2.0 * PI));
        let step = 4.0 * surface.scale;
        let mut points = Vec::new();
        let mut x = 0.0;
        while x <= width {
            let y = base_y + amplitude * ((2.0 * PI * x / wavelength) + phase).sin();
            points.push((x, y));
            x += step;
        }
        WaveLine {
            points,
            width_px: (1.2 * surface.scale).max(1.0),
            color: self.config.palette[rng.gen_range(0..self.config.palette.len())]
                .with_alpha(self.config.wave_alpha),
        }
    }

    /// Draws background, noise, glyphs, then distractor waves on top.
    pub fn paint<S>(&self, plan: RenderPlan, surface: &mut S)
    where
        S: GlyphSurface + ?Sized,
    {
        surface.resize(plan.surface.width_px, plan.surface.height_px);
        surface.fill(plan.background);
        for dot in &plan.noise {
            surface.blend_pixel(dot.x, dot.y, dot.color);
        }
        for glyph in &plan.glyphs {
            surface.draw_glyph(glyph);
        }
        for wave in &plan.waves {
            for pair in wave.points.windows(2) {
                surface.stroke_line(pair[0], pair[1], wave.width_px, wave.color);
            }
        }
    }

    pub fn render<S, R>(
        &self,
        code: &ChallengeCode,
        viewport: RenderViewport,
        surface: &mut S,
        rng: &mut R,
    ) -> Result<SurfaceGeometry, ContractViolation>
    where
        S: GlyphSurface + ?Sized,
        R: Rng + ?Sized,
    {
        let plan = self.plan(code, viewport, rng)?;
        let geometry = plan.surface;
        self.paint(plan, surface);
        Ok(geometry)
    }
}

fn symmetric<R>(rng: &mut R, bound: f32) -> f32
where
    R: Rng + ?Sized,
{
    if bound <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-bound..=bound)
}
