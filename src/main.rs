// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use std::io::Write;

use glam::Vec3A;
use indicatif::{
    ParallelProgressIterator,
    ProgressBar,
};
use rand::{
    rngs::StdRng,
    SeedableRng,
};
use rayon::iter::{
    IndexedParallelIterator,
    IntoParallelRefMutIterator,
    ParallelIterator,
};
use rgb::Rgb;
use rtscene::{
    config::Config,
    layout::{
        Encoder,
        LayoutEncoder,
    },
    render::{
        Ray,
        Scene,
    },
    scene::random_scene,
};
use tracing::info;

pub const ACNE_MIN: f32 = 0.001;

#[inline]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn process_ray(mut input: Vec3A) -> Rgb<u16> {
    input = input.clamp(Vec3A::splat(0f32), Vec3A::splat(1f32));

    // Saturating cast - Will auto-clamp within bounds of u16
    input *= f32::from(u16::MAX);
    Rgb::new(input.x as u16, input.y as u16, input.z as u16)
}

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args(std::env::args().skip(1))?;

    let fmt_subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    tracing::subscriber::set_global_default(fmt_subscriber)?;

    info!(?config, "starting");
    let begin_time = std::time::Instant::now();

    let store = random_scene(&mut StdRng::seed_from_u64(config.seed));
    let scene = Scene::build(store, config.leaf_size)?;
    let stats = scene.bvh().stats();
    info!(
        objects = scene.store().len(),
        avg_depth = format_args!("{:.2}", stats.avg_depth),
        "hierarchy ready"
    );
    let flattened = scene.flatten();

    let mut stage = config.stage();
    let encoder = Encoder::for_stage(config.layout, &stage);
    let buffer = encoder.encode(&flattened)?;
    buffer.bind(&mut stage);

    info!(
        layout = %encoder.kind(),
        bytes = buffer.as_bytes().len(),
        bindings = stage.bound.len(),
        elapsed_ms = begin_time.elapsed().as_millis(),
        "scene encoded"
    );

    // Pinhole preview of the CPU traversal path
    let (width, height) = (config.width, config.height);
    let fov = 20f32;
    let camera_position = Vec3A::new(13.0, 2.0, 3.0);
    let look_at = Vec3A::ZERO;
    let camera_up = Vec3A::Y;

    let focal_length = (camera_position - look_at).length();
    let viewport_height = 2f32 * (fov.to_radians() / 2.0).tan() * focal_length;
    let viewport_width = viewport_height * (width as f32 / height as f32);

    let focal_w = (camera_position - look_at).normalize_or_zero();
    let focal_u = camera_up.cross(focal_w).normalize_or_zero();
    let focal_v = focal_w.cross(focal_u);

    let viewport_u = focal_u * viewport_width;
    let viewport_v = -focal_v * viewport_height;

    let delta_u = viewport_u / width as f32;
    let delta_v = viewport_v / height as f32;

    let viewport_origin =
        (camera_position - (focal_length * focal_w) - viewport_u / 2.0 - viewport_v / 2.0)
            + 0.5f32 * (delta_u + delta_v);

    info!(hit_test = ?config.hit_test, "beginning preview");
    let begin_time = std::time::Instant::now();

    let mut render_buffer = vec![Rgb::<u16>::default(); width as usize * height as usize];
    let bar = ProgressBar::new(u64::from(width) * u64::from(height));

    render_buffer
        .par_iter_mut()
        .enumerate()
        .progress_with(bar)
        .for_each(|(idx, px)| {
            let y = idx / width as usize;
            let x = idx % width as usize;

            let pixel_center = viewport_origin + x as f32 * delta_u + y as f32 * delta_v;
            let ray = Ray::new(camera_position, pixel_center - camera_position);

            let color = match scene.hit_scene(&ray, ACNE_MIN, f32::MAX, config.hit_test) {
                Some((record, _)) => 0.5 * (record.normal + 1.0),
                None => {
                    let a = 0.5f32 * (ray.direction.normalize().y + 1f32);
                    Vec3A::splat(1f32) * (1f32 - a) + Vec3A::new(0.5f32, 0.7f32, 1f32) * a
                },
            };
            *px = process_ray(color);
        });

    info!(
        elapsed = format_args!("{:.2}s", begin_time.elapsed().as_secs_f32()),
        "preview rendered"
    );

    // Write results to a PNG
    let mut encoder = png::Encoder::new(std::fs::File::create(&config.output)?, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Sixteen);
    let mut writer = encoder.write_header()?;
    let mut stream = writer.stream_writer()?;

    for px in bytemuck::must_cast_slice::<_, u16>(&render_buffer) {
        stream.write_all(&px.to_be_bytes())?;
    }

    stream.finish()?;
    writer.finish()?;

    info!(output = %config.output.display(), "preview written");
    Ok(())
}
