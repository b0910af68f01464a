//! Core path tracing renderer.
//!
//! Implements Monte Carlo path tracing with:
//! - Recursive ray tracing with a hard bounce limit
//! - Gamma correction
//! - Anti-aliasing via multi-sampling

use crate::{Camera, Color, QueryMode, Scene, TraversalStats};
use arbor_math::{Interval, Ray};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Hits closer than this are ignored so bounced rays don't re-hit their origin.
pub const RAY_T_MIN: f64 = 0.001;

/// What a ray sees when it leaves the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Background {
    /// Constant color in every direction
    Solid(Color),
    /// White at the horizon blending to light blue overhead
    SkyGradient,
}

impl Background {
    /// Radiance for a ray that hit nothing; depends on direction only.
    pub fn color(&self, ray: &Ray) -> Color {
        match *self {
            Background::Solid(color) => color,
            Background::SkyGradient => sky_gradient(ray),
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Background::SkyGradient
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Samples per pixel for anti-aliasing
    pub samples_per_pixel: u32,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Radiance returned by rays that miss all geometry
    pub background: Background,
    /// Nearest-hit search used for every ray
    pub query: QueryMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 100,
            max_depth: 50,
            background: Background::SkyGradient,
            query: QueryMode::Bvh,
        }
    }
}

/// Work and time spent on one render.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub elapsed: Duration,
    /// Camera rays traced (pixels times samples)
    pub camera_rays: u64,
    /// Intersection work summed over every bounce of every path
    pub traversal: TraversalStats,
}

impl RenderStats {
    /// Primitive intersection tests per camera ray.
    pub fn tests_per_ray(&self) -> f64 {
        if self.camera_rays == 0 {
            return 0.0;
        }
        self.traversal.primitive_tests as f64 / self.camera_rays as f64
    }

    /// How many times faster this render was than `baseline`.
    pub fn speedup_over(&self, baseline: &RenderStats) -> f64 {
        baseline.elapsed.as_secs_f64() / self.elapsed.as_secs_f64().max(f64::MIN_POSITIVE)
    }
}

/// Compute the color seen by a ray.
///
/// This is the core path tracing function. It traces the ray through
/// the scene, bouncing off surfaces and multiplying in each surface's
/// attenuation.
pub fn ray_color(
    ray: &Ray,
    scene: &Scene,
    depth: u32,
    background: &Background,
    rng: &mut dyn RngCore,
) -> Color {
    let mut stats = TraversalStats::default();
    trace_path(ray, scene, depth, background, QueryMode::Bvh, &mut stats, rng)
}

fn trace_path(
    ray: &Ray,
    scene: &Scene,
    depth: u32,
    background: &Background,
    query: QueryMode,
    stats: &mut TraversalStats,
    rng: &mut dyn RngCore,
) -> Color {
    // If we've exceeded max depth, return black (no light)
    if depth == 0 {
        return Color::ZERO;
    }

    let ray_t = Interval::new(RAY_T_MIN, f64::INFINITY);
    let Some(rec) = scene.intersect_counted(ray, ray_t, query, stats) else {
        return background.color(ray);
    };

    let Some(material) = scene.material(rec.material) else {
        return Color::ZERO;
    };

    match material.scatter(ray, &rec, rng) {
        Some(result) => {
            let incoming =
                trace_path(&result.scattered, scene, depth - 1, background, query, stats, rng);
            result.attenuation * incoming
        }
        // Ray was absorbed
        None => Color::ZERO,
    }
}

/// Compute sky gradient background.
fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize_or_zero();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f64| {
        if !c.is_finite() {
            return 0;
        }
        (255.999 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8
    };
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// Render a single pixel with multi-sampling.
///
/// Samples that come back non-finite are dropped rather than allowed to
/// poison the average.
pub fn render_pixel(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> Color {
    let mut stats = TraversalStats::default();
    sample_pixel(camera, scene, x, y, config, &mut stats, rng)
}

fn sample_pixel(
    camera: &Camera,
    scene: &Scene,
    x: u32,
    y: u32,
    config: &RenderConfig,
    stats: &mut TraversalStats,
    rng: &mut dyn RngCore,
) -> Color {
    let mut pixel_color = Color::ZERO;
    let mut valid_samples = 0u32;

    for _ in 0..config.samples_per_pixel {
        let ray = camera.get_ray(x, y, rng);
        let sample = trace_path(
            &ray,
            scene,
            config.max_depth,
            &config.background,
            config.query,
            stats,
            rng,
        );
        if sample.is_finite() {
            pixel_color += sample;
            valid_samples += 1;
        }
    }

    if valid_samples < config.samples_per_pixel {
        log::debug!(
            "Pixel ({x}, {y}): dropped {} non-finite samples",
            config.samples_per_pixel - valid_samples
        );
    }

    if valid_samples == 0 {
        return Color::ZERO;
    }

    // Average the samples
    pixel_color / valid_samples as f64
}

/// Simple image buffer for storing render output (linear color).
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width * self.height * 4) as usize);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }
}

/// Render the entire scene to an image buffer.
///
/// Single-threaded; the scene is only read, so callers that want
/// parallelism can split pixels across workers, each with its own RNG.
pub fn render(
    camera: &Camera,
    scene: &Scene,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> ImageBuffer {
    render_with_stats(camera, scene, config, rng).0
}

/// Same as [`render`], also reporting time and intersection work.
pub fn render_with_stats(
    camera: &Camera,
    scene: &Scene,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> (ImageBuffer, RenderStats) {
    let start = Instant::now();
    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    let mut stats = RenderStats::default();

    for y in 0..camera.image_height {
        log::debug!("Scanline {} / {}", y + 1, camera.image_height);
        for x in 0..camera.image_width {
            let color = sample_pixel(camera, scene, x, y, config, &mut stats.traversal, rng);
            image.set(x, y, color);
        }
    }

    stats.elapsed = start.elapsed();
    stats.camera_rays = u64::from(camera.image_width)
        * u64::from(camera.image_height)
        * u64::from(config.samples_per_pixel);

    log::info!(
        "Rendered {}x{} @ {} spp ({:?}) in {:?}, {:.1} tests per ray",
        camera.image_width,
        camera.image_height,
        config.samples_per_pixel,
        config.query,
        stats.elapsed,
        stats.tests_per_ray()
    );

    (image, stats)
}
