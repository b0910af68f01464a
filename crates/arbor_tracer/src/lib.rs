//! Arbor tracer - BVH-accelerated CPU path tracing
//!
//! A Monte Carlo path tracer over sphere scenes. Nearest-hit queries go
//! through a bounding volume hierarchy built with the Surface Area
//! Heuristic; a brute-force query is kept alongside as a baseline.
//!
//! Randomness is always drawn from an RNG handle passed in by the caller.

mod bvh;
mod camera;
mod hittable;
mod material;
mod renderer;
mod sampling;
mod scene;
mod sphere;

pub use bvh::{Bvh, BvhNode, BvhStats, SahConfig, TraversalStats};
pub use camera::Camera;
pub use hittable::{closest_hit, HitRecord, Hittable};
pub use material::{reflect, reflectance, refract, Color, Material, MaterialId, ScatterResult};
pub use renderer::{
    color_to_rgba, linear_to_gamma, ray_color, render, render_pixel, render_with_stats,
    Background, ImageBuffer, RenderConfig, RenderStats, RAY_T_MIN,
};
pub use sampling::{gen_f64, random_in_unit_disk, random_in_unit_sphere, random_unit_vector};
pub use scene::{QueryMode, Scene, SceneBuilder, SceneError, SceneResult};
pub use sphere::Sphere;

/// Re-export Vec3 and common math types from arbor_math
pub use arbor_math::{Aabb, Interval, Ray, Vec3};
