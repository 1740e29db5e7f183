// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use bytemuck::{
    Pod,
    Zeroable,
};
use tracing::instrument;

use super::{
    BoundingBox,
    Bvh,
    BvhNode,
};
use crate::render::{
    Material,
    PrimitiveStore,
    Sphere,
};

/// Child index stored by leaves
pub const NO_CHILD: i32 = -1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FlatNode {
    pub min:         [f32; 3],
    pub _pad0:       f32,
    pub max:         [f32; 3],
    pub _pad1:       f32,
    pub left:        i32,
    pub right:       i32,
    pub first_index: i32,
    pub count:       i32,
}

impl FlatNode {
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.left == NO_CHILD && self.right == NO_CHILD
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FlatSphere {
    pub center: [f32; 3],
    pub radius: f32,
}

impl From<&Sphere> for FlatSphere {
    fn from(sphere: &Sphere) -> Self {
        Self {
            center: sphere.center.to_array(),
            radius: sphere.radius,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FlatMaterial {
    pub albedo:   [f32; 3],
    pub kind:     f32,
    pub prop:     f32,
    pub _padding: [f32; 3],
}

impl From<&Material> for FlatMaterial {
    fn from(material: &Material) -> Self {
        Self {
            albedo: material.albedo.to_array(),
            kind: material.kind.as_f32(),
            prop: material.prop,
            _padding: [0.0; 3],
        }
    }
}

/// Pre-order, index-addressed copy of a BVH and the spheres it covers.
///
/// `nodes[0]` is the root and every child index is larger than its parent's.
/// `objects[i]` and `materials[i]` describe the same sphere.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedScene {
    pub nodes:     Vec<FlatNode>,
    pub objects:   Vec<FlatSphere>,
    pub materials: Vec<FlatMaterial>,
}

struct Flattener<'a> {
    bvh:   &'a Bvh,
    store: &'a PrimitiveStore<Sphere>,
    out:   FlattenedScene,
}

impl Flattener<'_> {
    fn visit(
        &mut self,
        node: &BvhNode,
    ) -> i32 {
        let index = self.out.nodes.len();
        self.out.nodes.push(flat_bounds(node.bounds()));
        self.out.nodes[index].first_index = to_index(self.out.objects.len());

        match node {
            BvhNode::Leaf { first, count, .. } => {
                for &key in &self.bvh.order[*first..*first + *count] {
                    let sphere = &self.store[key];
                    self.out.objects.push(sphere.into());
                    self.out.materials.push((&sphere.material).into());
                }

                let flat = &mut self.out.nodes[index];
                flat.count = to_index(*count);
                flat.left = NO_CHILD;
                flat.right = NO_CHILD;
            },
            BvhNode::Internal { left, right, .. } => {
                let left = self.visit(left);
                let right = self.visit(right);

                let flat = &mut self.out.nodes[index];
                flat.left = left;
                flat.right = right;
            },
        }

        to_index(index)
    }
}

fn flat_bounds(bounds: &BoundingBox) -> FlatNode {
    FlatNode {
        min: bounds.min().to_array(),
        max: bounds.max().to_array(),
        ..FlatNode::default()
    }
}

fn to_index(value: usize) -> i32 {
    i32::try_from(value).expect("Scene too large for i32 addressing")
}

/// Deterministic for a given tree: node order is the pre-order walk and
/// objects follow leaf order.
///
/// # Panics
///
/// If the scene has more nodes or objects than `i32` can index.
#[instrument(skip_all, fields(objects = store.len()))]
#[must_use]
pub fn flatten(
    bvh: &Bvh,
    store: &PrimitiveStore<Sphere>,
) -> FlattenedScene {
    let mut flattener = Flattener {
        bvh,
        store,
        out: FlattenedScene {
            nodes:     Vec::new(),
            objects:   Vec::with_capacity(bvh.order.len()),
            materials: Vec::with_capacity(bvh.order.len()),
        },
    };
    flattener.visit(&bvh.root);

    let out = flattener.out;
    tracing::debug!(
        nodes = out.nodes.len(),
        objects = out.objects.len(),
        "flattened BVH"
    );
    out
}
