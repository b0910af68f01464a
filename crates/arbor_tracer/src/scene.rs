//! Scene: spheres, the materials they reference, and the BVH over them.
//!
//! A scene is validated and its BVH built once at construction; afterwards
//! it is read-only and can be shared freely between render workers.

use crate::hittable::closest_hit;
use crate::renderer::{ray_color, Background};
use crate::{Bvh, Color, HitRecord, Material, MaterialId, SahConfig, Sphere, TraversalStats};
use arbor_math::{Interval, Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while assembling a scene.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Sphere {sphere} references material {material}, but the scene has {count} materials")]
    MaterialOutOfRange {
        sphere: usize,
        material: MaterialId,
        count: usize,
    },

    #[error("Sphere {index} has a non-finite center or radius")]
    InvalidSphere { index: usize },

    #[error("Material {index} is invalid: {reason}")]
    InvalidMaterial { index: usize, reason: String },
}

/// Result type for scene construction.
pub type SceneResult<T> = Result<T, SceneError>;

/// Which nearest-hit search a query goes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    /// Descend the BVH
    #[default]
    Bvh,
    /// Test every sphere
    BruteForce,
}

/// Immutable, render-ready scene.
#[derive(Debug, Clone)]
pub struct Scene {
    spheres: Vec<Sphere>,
    materials: Vec<Material>,
    bvh: Bvh,
}

impl Scene {
    /// Validate the inputs and build the BVH with default SAH settings.
    pub fn new(spheres: Vec<Sphere>, materials: Vec<Material>) -> SceneResult<Self> {
        Self::with_sah_config(spheres, materials, &SahConfig::default())
    }

    /// Validate the inputs and build the BVH with the given SAH settings.
    pub fn with_sah_config(
        spheres: Vec<Sphere>,
        materials: Vec<Material>,
        config: &SahConfig,
    ) -> SceneResult<Self> {
        for (index, material) in materials.iter().enumerate() {
            validate_material(index, material)?;
        }

        for (index, sphere) in spheres.iter().enumerate() {
            if !sphere.center().is_finite() || !sphere.radius().is_finite() {
                return Err(SceneError::InvalidSphere { index });
            }
            if sphere.material().index() >= materials.len() {
                return Err(SceneError::MaterialOutOfRange {
                    sphere: index,
                    material: sphere.material(),
                    count: materials.len(),
                });
            }
        }

        if spheres.is_empty() {
            log::warn!("Scene has no primitives, every ray will miss");
        }

        let bvh = Bvh::build_with(&spheres, config);

        log::info!(
            "Scene ready: {} spheres, {} materials",
            spheres.len(),
            materials.len()
        );

        Ok(Self {
            spheres,
            materials,
            bvh,
        })
    }

    /// Start an incremental scene description.
    pub fn builder() -> SceneBuilder {
        SceneBuilder::new()
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    /// Nearest hit through the BVH.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        self.bvh.intersect(&self.spheres, ray, ray_t)
    }

    /// Nearest hit through the BVH, counting traversal work.
    pub fn intersect_with_stats(
        &self,
        ray: &Ray,
        ray_t: Interval,
        stats: &mut TraversalStats,
    ) -> Option<HitRecord> {
        self.bvh.intersect_with_stats(&self.spheres, ray, ray_t, stats)
    }

    /// Nearest hit by testing every sphere; the baseline the BVH must match.
    pub fn intersect_brute(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        closest_hit(&self.spheres, ray, ray_t)
    }

    /// Nearest hit through the chosen search, counting the work done.
    ///
    /// Brute force visits no nodes and tests every sphere.
    pub fn intersect_counted(
        &self,
        ray: &Ray,
        ray_t: Interval,
        mode: QueryMode,
        stats: &mut TraversalStats,
    ) -> Option<HitRecord> {
        match mode {
            QueryMode::Bvh => self.intersect_with_stats(ray, ray_t, stats),
            QueryMode::BruteForce => {
                stats.primitive_tests += self.spheres.len() as u64;
                self.intersect_brute(ray, ray_t)
            }
        }
    }

    /// Radiance arriving along `ray`, following at most `max_depth` bounces,
    /// against the default sky background.
    pub fn trace(&self, ray: &Ray, max_depth: u32, rng: &mut dyn RngCore) -> Color {
        ray_color(ray, self, max_depth, &Background::SkyGradient, rng)
    }
}

fn validate_material(index: usize, material: &Material) -> SceneResult<()> {
    let invalid = |reason: &str| SceneError::InvalidMaterial {
        index,
        reason: reason.to_string(),
    };

    match *material {
        Material::Diffuse { albedo } => {
            if !albedo.is_finite() {
                return Err(invalid("albedo must be finite"));
            }
        }
        Material::Metal { albedo, roughness } => {
            if !albedo.is_finite() {
                return Err(invalid("albedo must be finite"));
            }
            if !(0.0..=1.0).contains(&roughness) {
                return Err(invalid("roughness must be within [0, 1]"));
            }
        }
        Material::Dielectric {
            index_of_refraction,
        } => {
            if !index_of_refraction.is_finite() || index_of_refraction <= 1.0 {
                return Err(invalid("index of refraction must be finite and greater than 1"));
            }
        }
    }

    Ok(())
}

/// Incremental scene description; materials are registered once and
/// referenced by the returned [`MaterialId`].
#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    spheres: Vec<Sphere>,
    materials: Vec<Material>,
    sah_config: SahConfig,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material and return its handle.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    /// Add a sphere using a previously registered material.
    pub fn add_sphere(&mut self, center: Vec3, radius: f64, material: MaterialId) -> &mut Self {
        self.spheres.push(Sphere::new(center, radius, material));
        self
    }

    /// Override the BVH construction settings.
    pub fn with_sah_config(mut self, config: SahConfig) -> Self {
        self.sah_config = config;
        self
    }

    /// Validate and build the scene.
    pub fn build(self) -> SceneResult<Scene> {
        Scene::with_sah_config(self.spheres, self.materials, &self.sah_config)
    }
}
