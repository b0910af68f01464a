//! Surface scattering models.
//!
//! The set of materials is closed: diffuse, metal and dielectric. Each one
//! maps an incoming ray and a hit to an outgoing ray plus an attenuation, or
//! absorbs the ray.

use crate::hittable::HitRecord;
use crate::sampling::{gen_f64, random_in_unit_sphere, random_unit_vector};
use arbor_math::{Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Color type alias (linear RGB, typically 0-1)
pub type Color = glam::DVec3;

/// Index of a material in the owning scene's material list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub usize);

impl MaterialId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of a successful scatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterResult {
    /// Per-channel fraction of the scattered radiance that survives
    pub attenuation: Color,
    /// Continuation ray leaving the surface
    pub scattered: Ray,
}

/// How light interacts with a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    /// Lambertian (diffuse) reflector.
    Diffuse { albedo: Color },
    /// Specular reflector; `roughness` in [0, 1] perturbs the mirror direction.
    Metal { albedo: Color, roughness: f64 },
    /// Clear refractive material such as glass or water.
    Dielectric { index_of_refraction: f64 },
}

impl Material {
    /// Create a new diffuse material with the given albedo color.
    pub fn diffuse(albedo: Color) -> Self {
        Material::Diffuse { albedo }
    }

    /// Create a new metal material.
    ///
    /// - `albedo`: The color of the metal
    /// - `roughness`: 0.0 = perfect mirror, 1.0 = very rough (clamped to that range)
    pub fn metal(albedo: Color, roughness: f64) -> Self {
        Material::Metal {
            albedo,
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    /// Create a new dielectric material.
    ///
    /// - `index_of_refraction`: 1.33 = water, 1.5 = glass, 2.4 = diamond
    pub fn dielectric(index_of_refraction: f64) -> Self {
        Material::Dielectric {
            index_of_refraction,
        }
    }

    /// Scatter an incoming ray.
    ///
    /// Returns `None` if the ray is absorbed.
    pub fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        match *self {
            Material::Diffuse { albedo } => {
                let mut scatter_direction = rec.normal + random_unit_vector(rng);

                // Catch degenerate scatter direction
                if scatter_direction.length_squared() < 1e-8 {
                    scatter_direction = rec.normal;
                }

                Some(ScatterResult {
                    attenuation: albedo,
                    scattered: Ray::new(rec.point, scatter_direction),
                })
            }

            Material::Metal { albedo, roughness } => {
                let unit_direction = ray_in.direction().try_normalize()?;
                let reflected = reflect(unit_direction, rec.normal);
                let scattered_dir = reflected + roughness * random_in_unit_sphere(rng);

                // Fuzz pushed the ray below the surface: absorbed
                if scattered_dir.dot(rec.normal) <= 0.0 {
                    return None;
                }

                Some(ScatterResult {
                    attenuation: albedo,
                    scattered: Ray::new(rec.point, scattered_dir),
                })
            }

            Material::Dielectric {
                index_of_refraction,
            } => {
                let refraction_ratio = if rec.front_face {
                    1.0 / index_of_refraction
                } else {
                    index_of_refraction
                };

                let unit_direction = ray_in.direction().try_normalize()?;
                let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

                // Total internal reflection
                let cannot_refract = refraction_ratio * sin_theta > 1.0;

                let direction = if cannot_refract
                    || reflectance(cos_theta, refraction_ratio) > gen_f64(rng)
                {
                    reflect(unit_direction, rec.normal)
                } else {
                    refract(unit_direction, rec.normal, refraction_ratio)
                };

                Some(ScatterResult {
                    attenuation: Color::ONE,
                    scattered: Ray::new(rec.point, direction),
                })
            }
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with relative index `etai_over_etat`.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f64) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation for Fresnel reflectance.
///
/// `r0` only depends on the ratio up to inversion, so passing either
/// `ior` or `1/ior` yields the same base reflectance.
#[inline]
pub fn reflectance(cosine: f64, refraction_ratio: f64) -> f64 {
    let r0 = ((1.0 - refraction_ratio) / (1.0 + refraction_ratio)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn front_hit(normal: Vec3) -> HitRecord {
        HitRecord {
            t: 1.0,
            point: Vec3::ZERO,
            normal,
            front_face: true,
            material: MaterialId(0),
        }
    }

    #[test]
    fn test_reflect() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        assert_eq!(reflect(v, Vec3::Y), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_refract_normal_incidence_passes_straight() {
        let out = refract(-Vec3::Y, Vec3::Y, 1.0 / 1.5);
        assert!((out - (-Vec3::Y)).length() < 1e-12);
    }

    #[test]
    fn test_schlick_normal_incidence() {
        let r0 = ((1.0 - 1.5_f64) / (1.0 + 1.5)).powi(2);
        assert!((r0 - 0.04).abs() < 1e-12);

        // Entering and exiting ratios agree at normal incidence
        assert!((reflectance(1.0, 1.0 / 1.5) - r0).abs() < 1e-12);
        assert!((reflectance(1.0, 1.5) - r0).abs() < 1e-12);

        // Grazing incidence reflects everything
        assert!((reflectance(0.0, 1.0 / 1.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_metal_roughness_clamped() {
        assert_eq!(
            Material::metal(Color::ONE, 3.0),
            Material::Metal {
                albedo: Color::ONE,
                roughness: 1.0
            }
        );
    }

    #[test]
    fn test_diffuse_scatters_into_hemisphere() {
        let mut rng = StdRng::seed_from_u64(42);
        let albedo = Color::new(0.8, 0.3, 0.3);
        let material = Material::diffuse(albedo);
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let rec = front_hit(Vec3::Y);

        for _ in 0..1000 {
            let result = material.scatter(&ray, &rec, &mut rng).expect("diffuse always scatters");
            assert_eq!(result.attenuation, albedo);
            assert!(result.scattered.direction().dot(rec.normal) >= 0.0);
            assert_eq!(result.scattered.origin(), rec.point);
        }
    }

    #[test]
    fn test_metal_mirror_reflection() {
        let mut rng = StdRng::seed_from_u64(7);
        let material = Material::metal(Color::new(0.7, 0.6, 0.5), 0.0);
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
        let rec = front_hit(Vec3::Y);

        let result = material.scatter(&ray, &rec, &mut rng).expect("mirror reflects");
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((result.scattered.direction() - expected).length() < 1e-12);
    }

    #[test]
    fn test_metal_absorbs_below_surface() {
        let mut rng = StdRng::seed_from_u64(9);
        let material = Material::metal(Color::ONE, 1.0);
        // Nearly grazing incidence: heavy fuzz sends many samples into the surface
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, -0.01, 0.0));
        let rec = front_hit(Vec3::Y);

        let mut absorbed = 0;
        for _ in 0..1000 {
            match material.scatter(&ray, &rec, &mut rng) {
                Some(result) => assert!(result.scattered.direction().dot(rec.normal) > 0.0),
                None => absorbed += 1,
            }
        }
        assert!(absorbed > 0);
    }

    #[test]
    fn test_dielectric_normal_incidence_mostly_refracts() {
        let mut rng = StdRng::seed_from_u64(1234);
        let glass = Material::dielectric(1.5);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let rec = front_hit(Vec3::Z);

        let samples = 20_000;
        let mut reflected = 0;
        for _ in 0..samples {
            let result = glass.scatter(&ray, &rec, &mut rng).expect("glass never absorbs");
            assert_eq!(result.attenuation, Color::ONE);
            if result.scattered.direction().dot(rec.normal) > 0.0 {
                reflected += 1;
            }
        }

        let fraction = reflected as f64 / samples as f64;
        assert!(
            (fraction - 0.04).abs() < 0.01,
            "reflected fraction {fraction} should be close to r0 = 0.04"
        );
    }

    #[test]
    fn test_dielectric_total_internal_reflection() {
        let mut rng = StdRng::seed_from_u64(99);
        let glass = Material::dielectric(1.5);
        // Leaving the glass at 60 degrees from the normal: 1.5 * sin(60) > 1
        let direction = Vec3::new(60f64.to_radians().sin(), 60f64.to_radians().cos(), 0.0);
        let ray = Ray::new(Vec3::ZERO, direction);
        let rec = HitRecord {
            front_face: false,
            ..front_hit(-Vec3::Y)
        };

        for _ in 0..100 {
            let result = glass.scatter(&ray, &rec, &mut rng).expect("TIR reflects");
            let expected = reflect(direction.normalize(), rec.normal);
            assert!((result.scattered.direction() - expected).length() < 1e-12);
        }
    }

    #[test]
    fn test_zero_direction_is_absorbed() {
        let mut rng = StdRng::seed_from_u64(0);
        let ray = Ray::new(Vec3::ZERO, Vec3::ZERO);
        let rec = front_hit(Vec3::Y);

        assert!(Material::metal(Color::ONE, 0.0).scatter(&ray, &rec, &mut rng).is_none());
        assert!(Material::dielectric(1.5).scatter(&ray, &rec, &mut rng).is_none());
    }
}
