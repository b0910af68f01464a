//! Arbor math - the small set of geometric types shared by the tracer.
//!
//! Everything works in double precision; `Vec3` is glam's `DVec3`.

// Re-export glam's f64 vector for convenience
pub use glam::{dvec3, DVec3};

/// 3D vector / point type used throughout Arbor.
pub type Vec3 = DVec3;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
