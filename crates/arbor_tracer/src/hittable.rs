//! Hittable trait and HitRecord for ray-object intersection.

use crate::material::MaterialId;
use arbor_math::{Aabb, Interval, Ray, Vec3};

/// Record of a ray-object intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Parameter t where the intersection occurs
    pub t: f64,
    /// Point of intersection
    pub point: Vec3,
    /// Surface normal at intersection (always points against the ray)
    pub normal: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Material of the surface that was hit
    pub material: MaterialId,
}

impl HitRecord {
    /// Build a record, orienting `outward_normal` against the ray.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn new(ray: &Ray, t: f64, outward_normal: Vec3, material: MaterialId) -> Self {
        // If the ray and normal point in the same direction, we're inside
        let front_face = ray.direction().dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };

        Self {
            t,
            point: ray.at(t),
            normal,
            front_face,
            material,
        }
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Nearest intersection with `ray` whose parameter lies strictly inside `ray_t`.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

/// Exhaustive nearest-hit search: test every object, keep the closest.
///
/// This is the reference the BVH must agree with.
pub fn closest_hit<H: Hittable>(objects: &[H], ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
    let mut closest: Option<HitRecord> = None;

    for object in objects {
        let interval = closest.map_or(ray_t, |rec| ray_t.with_max(rec.t));
        if let Some(rec) = object.hit(ray, interval) {
            closest = Some(rec);
        }
    }

    closest
}
