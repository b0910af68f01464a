//! Sphere primitive for ray tracing.

use crate::{
    hittable::{HitRecord, Hittable},
    MaterialId,
};
use arbor_math::{Aabb, Interval, Ray, Vec3};

/// A sphere primitive. The material is referenced by index into the
/// owning scene's material list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    center: Vec3,
    radius: f64,
    material: MaterialId,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere. Negative finite radii are clamped to zero;
    /// non-finite radii are kept as given so scene validation can reject them.
    pub fn new(center: Vec3, radius: f64, material: MaterialId) -> Self {
        let radius = if radius.is_finite() { radius.max(0.0) } else { radius };
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        // A point sphere has no surface normal to report
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return None;
        }

        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        if a == 0.0 {
            return None;
        }
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let point = ray.at(root);
        let outward_normal = (point - self.center) / self.radius;
        Some(HitRecord::new(ray, root, outward_normal, self.material))
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
