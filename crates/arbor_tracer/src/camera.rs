//! Thin-lens camera.
//!
//! Positioned with a look-from/look-at pair and an up hint. The focus plane
//! sits `focus_dist` in front of the lens; a non-zero aperture scatters ray
//! origins over the lens disk so anything off that plane blurs.

use crate::sampling::{gen_f64, random_in_unit_disk};
use arbor_math::{Ray, Vec3};
use rand::RngCore;

/// Focus plane and lens geometry derived from the camera settings.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    lens_center: Vec3,
    /// Focus-plane point seen through the top-left image corner
    top_left: Vec3,
    /// Spans of the whole image on the focus plane
    across: Vec3,
    down: Vec3,
    /// Lens-plane axes, pre-scaled by the lens radius
    lens_u: Vec3,
    lens_v: Vec3,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f64,
    aperture: f64,
    focus_dist: f64,

    frame: Frame,
}

impl Camera {
    /// 800x450 pinhole camera at the origin looking down -Z with a 90 degree field of view.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 800,
            image_height: 450,
            look_from: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            vup: Vec3::Y,
            vfov: 90.0,
            aperture: 0.0,
            focus_dist: 1.0,
            frame: Frame {
                lens_center: Vec3::ZERO,
                top_left: Vec3::ZERO,
                across: Vec3::ZERO,
                down: Vec3::ZERO,
                lens_u: Vec3::ZERO,
                lens_v: Vec3::ZERO,
            },
        };
        camera.initialize();
        camera
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self
    }

    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// `aperture` is the lens diameter; 0 gives a pinhole.
    pub fn with_lens(mut self, vfov: f64, aperture: f64, focus_dist: f64) -> Self {
        self.vfov = vfov;
        self.aperture = aperture.max(0.0);
        self.focus_dist = focus_dist;
        self
    }

    /// Recompute the frame after changing settings; `get_ray` reads only the frame.
    pub fn initialize(&mut self) {
        let backward = (self.look_from - self.look_at).normalize_or_zero();
        let right = self.vup.cross(backward).normalize_or_zero();
        let up = backward.cross(right);

        if right == Vec3::ZERO {
            log::warn!(
                "Camera basis is degenerate (look_from {:?}, look_at {:?}, vup {:?})",
                self.look_from,
                self.look_at,
                self.vup
            );
        }

        let half_height = (self.vfov.to_radians() * 0.5).tan() * self.focus_dist;
        let half_width = half_height * self.image_width as f64 / self.image_height as f64;
        let lens_radius = self.aperture * 0.5;

        let focus_center = self.look_from - backward * self.focus_dist;
        self.frame = Frame {
            lens_center: self.look_from,
            top_left: focus_center - right * half_width + up * half_height,
            across: right * (2.0 * half_width),
            down: up * (-2.0 * half_height),
            lens_u: right * lens_radius,
            lens_v: up * lens_radius,
        };
    }

    /// Ray through a random point of pixel (i, j), counted from the top-left.
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut dyn RngCore) -> Ray {
        let s = (i as f64 + gen_f64(rng)) / self.image_width as f64;
        let t = (j as f64 + gen_f64(rng)) / self.image_height as f64;
        let target = self.frame.top_left + self.frame.across * s + self.frame.down * t;

        let origin = if self.aperture > 0.0 {
            let disk = random_in_unit_disk(rng);
            self.frame.lens_center + self.frame.lens_u * disk.x + self.frame.lens_v * disk.y
        } else {
            self.frame.lens_center
        };

        Ray::new(origin, target - origin)
    }

    pub fn center(&self) -> Vec3 {
        self.frame.lens_center
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
