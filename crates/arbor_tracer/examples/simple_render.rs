//! Simple path tracer example.
//!
//! Renders a field of random spheres twice, once through the BVH and once
//! by testing every sphere, and reports the time and intersection work of
//! each. Writes three images:
//! - `output.png`: the BVH render
//! - `comparison.png`: BVH render on the left, brute-force render on the right
//! - `bvh_layers.png`: top-down view of the first BVH levels over the spheres
//!
//! Run with: cargo run --release --example simple_render -- [num_spheres] [config.json]

use anyhow::{Context, Result};
use arbor_tracer::{
    render_with_stats, Aabb, Camera, Color, ImageBuffer, Material, QueryMode, RenderConfig,
    Scene, Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::env;
use std::time::Instant;

const DEFAULT_SPHERES: usize = 200;

/// Half-width of the square XZ window shown by the BVH visualization.
const VIEW_HALF_EXTENT: f64 = 13.0;
/// Deepest BVH level drawn by the visualization (root is 0).
const VIEW_MAX_DEPTH: usize = 3;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();

    let num_spheres = match args.get(1) {
        Some(arg) => arg
            .parse::<usize>()
            .with_context(|| format!("Invalid sphere count: {arg}"))?,
        None => DEFAULT_SPHERES,
    };

    let config = match args.get(2) {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read render config {path}"))?;
            serde_json::from_str::<RenderConfig>(&text)
                .with_context(|| format!("Failed to parse render config {path}"))?
        }
        None => RenderConfig {
            samples_per_pixel: 4,
            max_depth: 8,
            ..Default::default()
        },
    };

    println!("Arbor Path Tracer - Simple Example");
    println!("==================================");

    // Build the scene
    let start = Instant::now();
    let scene = build_scene(num_spheres)?;
    let bvh_stats = scene.bvh().stats();
    println!(
        "Scene built in {:?}: {} spheres, {} BVH nodes, height {}",
        start.elapsed(),
        scene.len(),
        bvh_stats.node_count,
        bvh_stats.height
    );

    // Set up camera
    let mut camera = Camera::new()
        .with_resolution(400, 200)
        .with_position(
            Vec3::new(13.0, 2.0, 3.0), // look_from
            Vec3::new(0.0, 0.0, 0.0),  // look_at
            Vec3::new(0.0, 1.0, 0.0),  // vup
        )
        .with_lens(20.0, 0.1, 10.0);
    camera.initialize();

    let bounds = scene.bvh().bounding_box();
    println!("Scene bounds: {:?} .. {:?}", bounds.min, bounds.max);
    println!(
        "Rendering {}x{} @ {} spp, depth {} from {:?}...",
        camera.image_width,
        camera.image_height,
        config.samples_per_pixel,
        config.max_depth,
        camera.center()
    );

    let bvh_config = RenderConfig {
        query: QueryMode::Bvh,
        ..config.clone()
    };
    let brute_config = RenderConfig {
        query: QueryMode::BruteForce,
        ..config
    };

    // Same seed for both so any difference comes from the query path
    let (bvh_image, bvh_render) =
        render_with_stats(&camera, &scene, &bvh_config, &mut StdRng::seed_from_u64(42));
    let (brute_image, brute_render) =
        render_with_stats(&camera, &scene, &brute_config, &mut StdRng::seed_from_u64(42));

    println!("BVH:");
    println!("  Render time: {:?}", bvh_render.elapsed);
    println!("  Node visits: {}", bvh_render.traversal.nodes_visited);
    println!("  Sphere tests per camera ray: {:.1}", bvh_render.tests_per_ray());
    println!("Brute force:");
    println!("  Render time: {:?}", brute_render.elapsed);
    println!("  Sphere tests per query: {} (fixed)", scene.len());
    println!("  Sphere tests per camera ray: {:.1}", brute_render.tests_per_ray());

    let speedup = bvh_render.speedup_over(&brute_render);
    println!("Speedup: {speedup:.2}x");
    if speedup <= 1.0 {
        log::warn!("BVH was not faster; traversal overhead dominates on small scenes");
    }

    let mismatched = bvh_image
        .pixels
        .iter()
        .zip(&brute_image.pixels)
        .filter(|(a, b)| a != b)
        .count();
    if mismatched > 0 {
        log::warn!("{mismatched} pixels differ between the BVH and brute-force renders");
    }

    save_png(&bvh_image, "output.png")?;
    save_png(&side_by_side(&bvh_image, &brute_image), "comparison.png")?;
    save_png(&draw_bvh_layers(&scene, 600), "bvh_layers.png")?;

    Ok(())
}

/// Ground, three large spheres, and up to `num_spheres` small ones placed
/// from a fixed seed so every run sees the same scene.
fn build_scene(num_spheres: usize) -> Result<Scene> {
    let mut builder = Scene::builder();

    // Ground
    let ground = builder.add_material(Material::diffuse(Color::new(0.5, 0.5, 0.5)));
    builder.add_sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0, ground);

    // Three main spheres
    let big_centers = [
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(-4.0, 1.0, 0.0),
        Vec3::new(4.0, 1.0, 0.0),
    ];
    let glass = builder.add_material(Material::dielectric(1.5));
    let brown = builder.add_material(Material::diffuse(Color::new(0.4, 0.2, 0.1)));
    let mirror = builder.add_material(Material::metal(Color::new(0.7, 0.6, 0.5), 0.0));
    builder
        .add_sphere(big_centers[0], 1.0, glass)
        .add_sphere(big_centers[1], 1.0, brown)
        .add_sphere(big_centers[2], 1.0, mirror);

    // Small random spheres
    let mut rng = StdRng::seed_from_u64(12345);
    let mut placed = 0;
    let mut attempts = 0;

    while placed < num_spheres && attempts < num_spheres * 10 {
        attempts += 1;
        let center = Vec3::new(
            rng.gen::<f64>() * 22.0 - 11.0,
            0.2,
            rng.gen::<f64>() * 22.0 - 11.0,
        );

        // Keep clear of the large spheres
        if big_centers.iter().any(|c| (center - *c).length() < 1.2) {
            continue;
        }

        let choose_mat: f64 = rng.gen();
        let material = if choose_mat < 0.7 {
            // Diffuse
            let albedo = Color::new(
                rng.gen::<f64>() * rng.gen::<f64>(),
                rng.gen::<f64>() * rng.gen::<f64>(),
                rng.gen::<f64>() * rng.gen::<f64>(),
            );
            Material::diffuse(albedo)
        } else if choose_mat < 0.9 {
            // Metal
            let albedo = Color::new(
                0.5 + 0.5 * rng.gen::<f64>(),
                0.5 + 0.5 * rng.gen::<f64>(),
                0.5 + 0.5 * rng.gen::<f64>(),
            );
            Material::metal(albedo, 0.5 * rng.gen::<f64>())
        } else {
            // Glass
            Material::dielectric(1.5)
        };

        let id = builder.add_material(material);
        builder.add_sphere(center, 0.2, id);
        placed += 1;
    }

    if placed < num_spheres {
        log::warn!("Placed only {placed} of {num_spheres} small spheres");
    }

    Ok(builder.build()?)
}

/// Two equally sized images next to each other.
fn side_by_side(left: &ImageBuffer, right: &ImageBuffer) -> ImageBuffer {
    let mut combined = ImageBuffer::new(left.width + right.width, left.height.max(right.height));
    for y in 0..left.height {
        for x in 0..left.width {
            combined.set(x, y, left.get(x, y));
        }
    }
    for y in 0..right.height {
        for x in 0..right.width {
            combined.set(left.width + x, y, right.get(x, y));
        }
    }
    combined
}

/// Top-down (XZ) map of the upper BVH levels, one outline color per level,
/// with the scene's spheres drawn as dots in their material color.
fn draw_bvh_layers(scene: &Scene, size: u32) -> ImageBuffer {
    const LEVEL_COLORS: [Color; 4] = [
        Color::new(1.0, 0.3, 0.3),
        Color::new(0.3, 1.0, 0.3),
        Color::new(0.3, 0.3, 1.0),
        Color::new(1.0, 1.0, 0.3),
    ];

    let mut image = ImageBuffer::new(size, size);
    image.pixels.fill(Color::new(0.1, 0.1, 0.15));

    let to_pixel = |w: f64| -> i64 {
        ((w + VIEW_HALF_EXTENT) / (2.0 * VIEW_HALF_EXTENT) * size as f64).floor() as i64
    };
    let clamp = |p: i64| p.clamp(0, i64::from(size) - 1) as u32;

    for (depth, bbox) in scene.bvh().boxes_to_depth(VIEW_MAX_DEPTH) {
        let color = LEVEL_COLORS[depth.min(LEVEL_COLORS.len() - 1)];
        let alpha = 1.0 / (depth as f64 + 1.0);
        outline(&mut image, &bbox, color, alpha, &to_pixel, &clamp);
    }

    for sphere in scene.spheres() {
        // The ground would cover the whole map
        if sphere.radius() >= VIEW_HALF_EXTENT {
            continue;
        }
        let color = match scene.material(sphere.material()) {
            Some(Material::Diffuse { albedo } | Material::Metal { albedo, .. }) => *albedo,
            Some(Material::Dielectric { .. }) => Color::new(0.8, 0.9, 1.0),
            None => Color::ONE,
        };

        let (cx, cz) = (to_pixel(sphere.center().x), to_pixel(sphere.center().z));
        let r = ((sphere.radius() / (2.0 * VIEW_HALF_EXTENT) * size as f64) as i64).max(1);
        for dz in -r..=r {
            for dx in -r..=r {
                let (px, pz) = (cx + dx, cz + dz);
                let inside = (0..i64::from(size)).contains(&px) && (0..i64::from(size)).contains(&pz);
                if dx * dx + dz * dz <= r * r && inside {
                    image.set(px as u32, pz as u32, color);
                }
            }
        }
    }

    image
}

/// Blend the XZ outline of `bbox` into the image.
fn outline(
    image: &mut ImageBuffer,
    bbox: &Aabb,
    color: Color,
    alpha: f64,
    to_pixel: &impl Fn(f64) -> i64,
    clamp: &impl Fn(i64) -> u32,
) {
    let (x0, x1) = (clamp(to_pixel(bbox.min.x)), clamp(to_pixel(bbox.max.x)));
    let (z0, z1) = (clamp(to_pixel(bbox.min.z)), clamp(to_pixel(bbox.max.z)));

    let mut blend = |x: u32, z: u32| {
        let old = image.get(x, z);
        image.set(x, z, old * (1.0 - alpha) + color * alpha);
    };
    for x in x0..=x1 {
        blend(x, z0);
        blend(x, z1);
    }
    for z in z0..=z1 {
        blend(x0, z);
        blend(x1, z);
    }
}

fn save_png(image: &ImageBuffer, path: &str) -> Result<()> {
    image::RgbaImage::from_raw(image.width, image.height, image.to_rgba())
        .context("Image buffer size does not match its dimensions")?
        .save(path)
        .with_context(|| format!("Failed to save {path}"))?;
    println!("Saved to {path}");
    Ok(())
}
