// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::Vec3A;
use rand::Rng;

use crate::render::{
    Material,
    PrimitiveStore,
    Sphere,
};

pub const GRID_HALF_EXTENT: i32 = 11;
pub const SMALL_RADIUS: f32 = 0.2;

/// Ground, a jittered grid of small spheres and three large feature spheres.
///
/// At most `1 + 22 * 22 + 3` spheres, which fits the fixed block layout.
#[allow(clippy::cast_precision_loss)]
pub fn random_scene<R: Rng>(rng: &mut R) -> PrimitiveStore {
    let mut store = PrimitiveStore::new();

    store.insert(Sphere::new(
        Vec3A::new(0.0, -1000.0, 0.0),
        1000.0,
        Material::diffuse(Vec3A::splat(0.5)),
    ));

    // Keep clear of the metal feature sphere
    let keep_out = Vec3A::new(4.0, SMALL_RADIUS, 0.0);
    for a in -GRID_HALF_EXTENT..GRID_HALF_EXTENT {
        for b in -GRID_HALF_EXTENT..GRID_HALF_EXTENT {
            let choose_mat: f32 = rng.gen();
            let center = Vec3A::new(
                0.9f32.mul_add(rng.gen(), a as f32),
                SMALL_RADIUS,
                0.9f32.mul_add(rng.gen(), b as f32),
            );
            if center.distance(keep_out) <= 0.9 {
                continue;
            }

            let material = if choose_mat < 0.8 {
                let albedo = Vec3A::new(rng.gen(), rng.gen(), rng.gen())
                    * Vec3A::new(rng.gen(), rng.gen(), rng.gen());
                Material::diffuse(albedo)
            } else if choose_mat < 0.95 {
                let albedo = Vec3A::new(rng.gen(), rng.gen(), rng.gen()) * 0.5 + 0.5;
                Material::metal(albedo, 0.5 * rng.gen::<f32>())
            } else {
                Material::dielectric(1.5)
            };
            store.insert(Sphere::new(center, SMALL_RADIUS, material));
        }
    }

    store.insert(Sphere::new(
        Vec3A::new(0.0, 1.0, 0.0),
        1.0,
        Material::dielectric(1.5),
    ));
    store.insert(Sphere::new(
        Vec3A::new(-4.0, 1.0, 0.0),
        1.0,
        Material::diffuse(Vec3A::new(0.4, 0.2, 0.1)),
    ));
    store.insert(Sphere::new(
        Vec3A::new(4.0, 1.0, 0.0),
        1.0,
        Material::metal(Vec3A::new(0.7, 0.6, 0.5), 0.0),
    ));

    tracing::debug!(objects = store.len(), "generated random scene");
    store
}
