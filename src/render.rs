// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::Vec3A;
use slotmap::SlotMap;
use tracing::instrument;

use crate::{
    bvh::{
        self,
        BoundingBox,
        Bvh,
        FlattenedScene,
    },
    error::Result,
};

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin:    Vec3A,
    pub direction: Vec3A,
    pub inv_dir:   Vec3A,
}

impl Ray {
    #[must_use]
    pub fn new(
        origin: Vec3A,
        direction: Vec3A,
    ) -> Self {
        Self {
            origin,
            direction,
            inv_dir: 1.0 / direction,
        }
    }

    #[inline]
    #[must_use]
    pub fn at(
        &self,
        along: f32,
    ) -> Vec3A {
        self.origin + self.direction * along
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitRecord {
    pub along:    f32,
    pub point:    Vec3A,
    pub normal:   Vec3A,
    pub material: Material,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Diffuse = 0,
    Metal = 1,
    Dielectric = 2,
}

impl MaterialKind {
    /// Encoded as a float so it can share a vec4 with the albedo
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }

    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn from_f32(value: f32) -> Option<Self> {
        match value {
            v if v == 0.0 => Some(Self::Diffuse),
            v if v == 1.0 => Some(Self::Metal),
            v if v == 2.0 => Some(Self::Dielectric),
            _ => None,
        }
    }
}

/// `prop` is the roughness of a metal and the refractive index of a dielectric.
/// Diffuse materials ignore it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub kind:   MaterialKind,
    pub albedo: Vec3A,
    pub prop:   f32,
}

impl Material {
    #[must_use]
    pub const fn diffuse(albedo: Vec3A) -> Self {
        Self {
            kind: MaterialKind::Diffuse,
            albedo,
            prop: 0.0,
        }
    }

    #[must_use]
    pub const fn metal(
        albedo: Vec3A,
        roughness: f32,
    ) -> Self {
        Self {
            kind: MaterialKind::Metal,
            albedo,
            prop: roughness,
        }
    }

    #[must_use]
    pub const fn dielectric(refractive_index: f32) -> Self {
        Self {
            kind:   MaterialKind::Dielectric,
            albedo: Vec3A::ZERO,
            prop:   refractive_index,
        }
    }
}

/// Anything the BVH can bound and intersect.
pub trait Primitive {
    fn bounds(&self) -> BoundingBox;

    fn centroid(&self) -> Vec3A {
        self.bounds().center()
    }

    /// Closest intersection with `along` inside `[t_min, t_max]`
    fn hit(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
    ) -> Option<HitRecord>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center:   Vec3A,
    pub radius:   f32,
    pub material: Material,
}

impl Sphere {
    #[must_use]
    pub const fn new(
        center: Vec3A,
        radius: f32,
        material: Material,
    ) -> Self {
        Self {
            center,
            radius,
            material,
        }
    }
}

impl Primitive for Sphere {
    fn bounds(&self) -> BoundingBox {
        BoundingBox::from_corners(
            self.center - Vec3A::splat(self.radius),
            self.center + Vec3A::splat(self.radius),
        )
    }

    fn centroid(&self) -> Vec3A {
        self.center
    }

    fn hit(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
    ) -> Option<HitRecord> {
        let offset_origin = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(offset_origin);
        let c = self
            .radius
            .mul_add(-self.radius, offset_origin.length_squared());

        let discrim = h.mul_add(h, -(a * c));
        if discrim < 0.0 {
            return None;
        }

        let sqrt_d = discrim.sqrt();
        let mut root = (h - sqrt_d) / a;
        if !(t_min..=t_max).contains(&root) {
            root = (h + sqrt_d) / a;
            if !(t_min..=t_max).contains(&root) {
                return None;
            }
        }

        let point = ray.at(root);
        Some(HitRecord {
            along: root,
            point,
            normal: (point - self.center) / self.radius,
            material: self.material,
        })
    }
}

slotmap::new_key_type! {
    pub struct ObjectKey;
}

/// Owns every primitive of a scene. The BVH refers back into it by key.
#[derive(Debug)]
pub struct PrimitiveStore<P = Sphere> {
    objects: SlotMap<ObjectKey, P>,
}

impl<P> Default for PrimitiveStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PrimitiveStore<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    pub fn insert(
        &mut self,
        object: P,
    ) -> ObjectKey {
        self.objects.insert(object)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &P)> {
        self.objects.iter()
    }
}

impl<P> std::ops::Index<ObjectKey> for PrimitiveStore<P> {
    type Output = P;

    fn index(
        &self,
        key: ObjectKey,
    ) -> &Self::Output {
        &self.objects[key]
    }
}

impl<P> FromIterator<P> for PrimitiveStore<P> {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut store = Self::new();
        for object in iter {
            store.insert(object);
        }
        store
    }
}

impl<P: Primitive> PrimitiveStore<P> {
    /// Tests every primitive. Used as the reference the BVH has to agree with.
    #[must_use]
    pub fn hit_linear(
        &self,
        ray: &Ray,
        t_min: f32,
        mut t_max: f32,
    ) -> Option<(HitRecord, ObjectKey)> {
        let mut closest = None;

        for (key, object) in &self.objects {
            let Some(record) = object.hit(ray, t_min, t_max) else {
                continue;
            };

            t_max = record.along;
            closest = Some((record, key));
        }

        closest
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HitTest {
    BruteForce,
    #[default]
    Bvh,
}

/// Primitive store plus the hierarchy built over it. Both live and die together.
#[derive(Debug)]
pub struct Scene<P = Sphere> {
    store: PrimitiveStore<P>,
    bvh:   Bvh,
}

impl<P: Primitive> Scene<P> {
    /// # Errors
    ///
    /// Fails with [`crate::Error::EmptyScene`] when `store` is empty.
    #[instrument(skip_all, fields(objects = store.len()))]
    pub fn build(
        store: PrimitiveStore<P>,
        leaf_size: usize,
    ) -> Result<Self> {
        let bvh = bvh::Builder::new(&store).leaf_size(leaf_size).build()?;
        let stats = bvh.stats();
        tracing::info!(
            nodes = stats.nodes,
            leaves = stats.leaves,
            max_depth = stats.max_depth,
            "scene built"
        );
        Ok(Self { store, bvh })
    }

    #[must_use]
    pub const fn store(&self) -> &PrimitiveStore<P> {
        &self.store
    }

    #[must_use]
    pub const fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    #[must_use]
    pub fn hit_scene(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        mode: HitTest,
    ) -> Option<(HitRecord, ObjectKey)> {
        match mode {
            HitTest::Bvh => self.bvh.raycast(&self.store, ray, t_min, t_max),
            HitTest::BruteForce => self.store.hit_linear(ray, t_min, t_max),
        }
    }
}

impl Scene<Sphere> {
    /// # Panics
    ///
    /// If the scene has more nodes or objects than `i32` can index.
    #[must_use]
    pub fn flatten(&self) -> FlattenedScene {
        bvh::flatten(&self.bvh, &self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey() -> Material {
        Material::diffuse(Vec3A::splat(0.5))
    }

    #[test]
    fn sphere_hit_through_center() {
        let sphere = Sphere::new(Vec3A::new(0.0, 0.0, 10.0), 2.0, grey());
        let ray = Ray::new(Vec3A::ZERO, Vec3A::Z);

        let record = sphere.hit(&ray, 0.0, f32::MAX).expect("ray should hit");
        assert!((record.along - 8.0).abs() < 1e-5);
        assert!((record.normal - Vec3A::NEG_Z).length() < 1e-5);
        assert_eq!(record.material, grey());
    }

    #[test]
    fn sphere_hit_respects_interval() {
        let sphere = Sphere::new(Vec3A::new(0.0, 0.0, 10.0), 2.0, grey());
        let ray = Ray::new(Vec3A::ZERO, Vec3A::Z);

        // Near root excluded, far root accepted
        let record = sphere.hit(&ray, 9.0, f32::MAX).expect("far side should hit");
        assert!((record.along - 12.0).abs() < 1e-5);

        assert!(sphere.hit(&ray, 0.0, 7.5).is_none());
        assert!(sphere.hit(&ray, 12.5, f32::MAX).is_none());
    }

    #[test]
    fn sphere_miss() {
        let sphere = Sphere::new(Vec3A::new(5.0, 0.0, 10.0), 1.0, grey());
        let ray = Ray::new(Vec3A::ZERO, Vec3A::Z);
        assert!(sphere.hit(&ray, 0.0, f32::MAX).is_none());
    }

    #[test]
    fn material_kind_float_encoding() {
        for kind in [
            MaterialKind::Diffuse,
            MaterialKind::Metal,
            MaterialKind::Dielectric,
        ] {
            assert_eq!(MaterialKind::from_f32(kind.as_f32()), Some(kind));
        }
        assert_eq!(MaterialKind::from_f32(0.5), None);
    }

    #[test]
    fn linear_scan_picks_nearest() {
        let near = Material::metal(Vec3A::ONE, 0.1);
        let store: PrimitiveStore = [
            Sphere::new(Vec3A::new(0.0, 0.0, 20.0), 1.0, grey()),
            Sphere::new(Vec3A::new(0.0, 0.0, 5.0), 1.0, near),
        ]
        .into_iter()
        .collect();

        let ray = Ray::new(Vec3A::ZERO, Vec3A::Z);
        let (record, key) = store.hit_linear(&ray, 0.0, f32::MAX).expect("should hit");
        assert_eq!(record.material, near);
        assert_eq!(store[key].center, Vec3A::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn scene_build_rejects_empty_store() {
        assert!(matches!(
            Scene::build(PrimitiveStore::<Sphere>::new(), 2),
            Err(crate::Error::EmptyScene)
        ));
    }

    #[test]
    fn scene_keeps_store_and_hierarchy_together() {
        let store: PrimitiveStore = [
            Sphere::new(Vec3A::new(0.0, 0.0, 5.0), 1.0, grey()),
            Sphere::new(Vec3A::new(0.0, 0.0, 20.0), 1.0, grey()),
            Sphere::new(Vec3A::new(30.0, 0.0, 5.0), 1.0, grey()),
        ]
        .into_iter()
        .collect();
        let scene = Scene::build(store, 1).expect("build");

        assert_eq!(scene.store().len(), 3);
        assert_eq!(scene.bvh().order().len(), scene.store().len());
        assert!(!scene.bvh().root().is_leaf());

        let ray = Ray::new(Vec3A::ZERO, Vec3A::Z);
        let (bvh_hit, bvh_key) = scene.hit_scene(&ray, 0.0, f32::MAX, HitTest::Bvh).expect("bvh");
        let (linear_hit, linear_key) = scene
            .hit_scene(&ray, 0.0, f32::MAX, HitTest::BruteForce)
            .expect("linear");
        assert_eq!(bvh_key, linear_key);
        assert!((bvh_hit.along - linear_hit.along).abs() < f32::EPSILON);
        assert_eq!(scene.store()[bvh_key].center, Vec3A::new(0.0, 0.0, 5.0));
    }
}
