use crate::{Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// `EMPTY` (min = +inf, max = -inf) is the identity of [`Aabb::merge`]; every
/// other box satisfies `min <= max` on all three axes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box containing nothing; merging it with any box returns that box.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box enclosing both inputs.
    pub fn merge(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Grow the box to include a point.
    pub fn include_point(&self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// True if the box contains no points (some axis has min > max).
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Edge lengths of the box.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, as used by the SAH cost model.
    ///
    /// Empty and zero-extent boxes report 0.
    pub fn surface_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// True if `other` lies entirely inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.min.cmple(other.min).all() && other.max.cmple(self.max).all())
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        Interval::new(self.min[n], self.max[n])
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Slab method: each axis clips `ray_t` to the parametric range in which
    /// the ray is between that axis' two planes. The box is hit if anything
    /// is left after all three axes.
    pub fn hit(&self, r: &Ray, mut ray_t: Interval) -> bool {
        for axis in 0..3 {
            let origin = r.origin[axis];
            let dir = r.direction[axis];
            let slab = self.axis_interval(axis);

            let adinv = 1.0 / dir;

            // Only a zero (or subnormal) component overflows the reciprocal.
            // The ray then never crosses this slab's planes, so it is inside
            // for every t or for none.
            if !adinv.is_finite() {
                if !slab.contains(origin) {
                    return false;
                }
                continue;
            }

            let mut t0 = (slab.min - origin) * adinv;
            let mut t1 = (slab.max - origin) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max <= ray_t.min {
                return false;
            }
        }

        true
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.extent();

        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_box(rng: &mut StdRng) -> Aabb {
        let a = Vec3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
        );
        let b = Vec3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
        );
        Aabb::from_points(a, b)
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_merge() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0));
        let box2 = Aabb::from_points(Vec3::new(3.0, -3.0, 3.0), Vec3::new(10.0, 10.0, 10.0));
        let merged = Aabb::merge(&box1, &box2);

        assert_eq!(merged.min, Vec3::new(0.0, -3.0, 0.0));
        assert_eq!(merged.max, Vec3::splat(10.0));
        assert_eq!(merged, Aabb::merge(&box2, &box1));
    }

    #[test]
    fn test_aabb_merge_empty_is_identity() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, 2.0, -3.0), Vec3::new(4.0, 5.0, 6.0));

        assert_eq!(Aabb::merge(&aabb, &Aabb::EMPTY), aabb);
        assert_eq!(Aabb::merge(&Aabb::EMPTY, &aabb), aabb);
        assert!(Aabb::merge(&Aabb::EMPTY, &Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_aabb_merge_associative() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let (a, b, c) = (random_box(&mut rng), random_box(&mut rng), random_box(&mut rng));
            let left = Aabb::merge(&Aabb::merge(&a, &b), &c);
            let right = Aabb::merge(&a, &Aabb::merge(&b, &c));
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_aabb_surface_area() {
        let cube = Aabb::from_points(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(cube.surface_area(), 24.0);

        let slab = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(slab.surface_area(), 2.0 * (2.0 + 6.0 + 3.0));
    }

    #[test]
    fn test_aabb_surface_area_degenerate() {
        let point = Aabb::from_points(Vec3::ONE, Vec3::ONE);
        assert_eq!(point.surface_area(), 0.0);

        let line = Aabb::from_points(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(line.surface_area(), 0.0);

        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_aabb_merge_never_shrinks_surface_area() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let a = random_box(&mut rng);
            let b = random_box(&mut rng);
            let merged = Aabb::merge(&a, &b);

            assert!(merged.surface_area() >= a.surface_area());
            assert!(merged.surface_area() >= b.surface_area());
            assert!(merged.contains(&a));
            assert!(merged.contains(&b));
        }
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray missing the box
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));
    }

    #[test]
    fn test_aabb_hit_respects_interval() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

        // Box spans t in [4, 6]
        assert!(!aabb.hit(&ray, Interval::new(0.0, 3.9)));
        assert!(!aabb.hit(&ray, Interval::new(6.1, 100.0)));
        assert!(aabb.hit(&ray, Interval::new(5.0, 5.5)));
    }

    #[test]
    fn test_aabb_hit_diagonal_needs_all_axes() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);

        // Passes the x and y slabs at t in [1, 2] but the z slab only at [3, 4]
        let ray = Ray::new(Vec3::new(-1.0, -1.0, -3.0), Vec3::ONE);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));
    }

    #[test]
    fn test_aabb_hit_axis_parallel_ray() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        // Zero x and y components: no NaN, just a slab containment check
        let inside = Ray::new(Vec3::new(0.5, -0.5, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aabb.hit(&inside, Interval::new(0.0, 100.0)));

        let outside = Ray::new(Vec3::new(1.5, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!aabb.hit(&outside, Interval::new(0.0, 100.0)));

        // Origin exactly on a slab plane with a zero component
        let grazing = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aabb.hit(&grazing, Interval::new(0.0, 100.0)));
    }

    #[test]
    fn test_aabb_hit_short_direction() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));

        // Unnormalized directions only rescale t: the box is still crossed
        for scale in [1.0, 1e-6, 1e-13, 1e-200] {
            let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -scale));
            assert!(aabb.hit(&ray, Interval::new(0.001, f64::INFINITY)), "scale {scale}");

            let off_axis = Ray::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -scale));
            assert!(!aabb.hit(&off_axis, Interval::new(0.001, f64::INFINITY)), "scale {scale}");
        }

        // Small but non-zero sideways drift is still honoured
        let drifting = Ray::new(Vec3::ZERO, Vec3::new(1e-14, 0.0, -1e-13));
        assert!(aabb.hit(&drifting, Interval::new(0.001, f64::INFINITY)));
        let escaping = Ray::new(Vec3::ZERO, Vec3::new(1e-13, 0.0, -1e-14));
        assert!(!aabb.hit(&escaping, Interval::new(0.001, f64::INFINITY)));
    }

    #[test]
    fn test_aabb_flat_box_reports_miss() {
        // Crossing a zero-thickness slab collapses the interval to a point
        let flat = Aabb::from_points(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0));
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.1, -1.0, 0.0));
        assert!(!flat.hit(&ray, Interval::new(0.0, 100.0)));
        assert!(!flat.is_empty());
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::from_points(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(aabb.centroid(), Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_aabb_longest_axis() {
        let aabb_x = Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0));
        assert_eq!(aabb_x.longest_axis(), 0);

        let aabb_y = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0));
        assert_eq!(aabb_y.longest_axis(), 1);

        let aabb_z = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(aabb_z.longest_axis(), 2);
    }

    #[test]
    fn test_aabb_include_point() {
        let aabb = Aabb::EMPTY
            .include_point(Vec3::new(1.0, 2.0, 3.0))
            .include_point(Vec3::new(-1.0, 0.0, 4.0));

        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 4.0));
    }
}
