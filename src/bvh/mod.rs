// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

mod builder;
mod flatten;
mod traverse;

pub use builder::Builder;
pub use flatten::{
    flatten,
    FlatMaterial,
    FlatNode,
    FlatSphere,
    FlattenedScene,
    NO_CHILD,
};
use glam::Vec3A;

use crate::render::{
    ObjectKey,
    Ray,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    max: Vec3A,
    min: Vec3A,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingBox {
    /// Inverted box, the identity for `union`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max: Vec3A::splat(f32::MIN),
            min: Vec3A::splat(f32::MAX),
        }
    }

    #[must_use]
    pub fn from_corners(
        a: Vec3A,
        b: Vec3A,
    ) -> Self {
        Self {
            max: a.max(b),
            min: a.min(b),
        }
    }

    #[must_use]
    pub const fn min(&self) -> Vec3A {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Vec3A {
        self.max
    }

    #[must_use]
    pub fn center(&self) -> Vec3A {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn extent(&self) -> Vec3A {
        self.max - self.min
    }

    /// Axis with the largest extent, x before y before z on ties
    #[must_use]
    pub fn largest_axis(&self) -> usize {
        let extent = self.extent();
        let mut axis = 0;
        for candidate in 1..3 {
            if extent[candidate] > extent[axis] {
                axis = candidate;
            }
        }
        axis
    }

    #[must_use]
    pub fn union(
        &self,
        other: &Self,
    ) -> Self {
        Self {
            max: self.max.max(other.max),
            min: self.min.min(other.min),
        }
    }

    #[must_use]
    pub fn contains(
        &self,
        other: &Self,
    ) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Slab test against `[t_min, t_max]`, returning where the ray enters the box.
    #[inline]
    #[must_use]
    pub fn intersects(
        &self,
        ray: &Ray,
        mut t_min: f32,
        mut t_max: f32,
    ) -> Option<f32> {
        for axis in 0..3 {
            let inv = ray.inv_dir[axis];
            let mut near = (self.min[axis] - ray.origin[axis]) * inv;
            let mut far = (self.max[axis] - ray.origin[axis]) * inv;
            if inv < 0.0 {
                core::mem::swap(&mut near, &mut far);
            }

            // f32::max/min drop NaN from 0 * inf so a flat slab doesn't reject the ray
            t_min = near.max(t_min);
            t_max = far.min(t_max);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

#[derive(Debug)]
pub enum BvhNode {
    /// Covers `order[first..first + count]`
    Leaf {
        bounds: BoundingBox,
        first:  usize,
        count:  usize,
    },
    Internal {
        bounds: BoundingBox,
        left:   Box<BvhNode>,
        right:  Box<BvhNode>,
    },
}

impl BvhNode {
    #[must_use]
    pub const fn bounds(&self) -> &BoundingBox {
        match self {
            Self::Leaf { bounds, .. } | Self::Internal { bounds, .. } => bounds,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    pub nodes:     usize,
    pub leaves:    usize,
    /// Root sits at depth 0
    pub max_depth: usize,
    pub avg_depth: f64,
}

/// Immutable hierarchy over a primitive store.
///
/// Leaves index into `order`, a permutation of the store's keys produced while
/// partitioning. The tree never owns primitives itself.
#[derive(Debug)]
pub struct Bvh {
    root:  BvhNode,
    order: Vec<ObjectKey>,
}

impl Bvh {
    #[must_use]
    pub const fn root(&self) -> &BvhNode {
        &self.root
    }

    #[must_use]
    pub fn order(&self) -> &[ObjectKey] {
        &self.order
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        let mut depth_sum = 0;

        let mut search_nodes = vec![(&self.root, 0)];
        while let Some((node, depth)) = search_nodes.pop() {
            stats.nodes += 1;
            match node {
                BvhNode::Leaf { .. } => {
                    stats.leaves += 1;
                    depth_sum += depth;
                    stats.max_depth = stats.max_depth.max(depth);
                },
                BvhNode::Internal { left, right, .. } => {
                    search_nodes.push((&**left, depth + 1));
                    search_nodes.push((&**right, depth + 1));
                },
            }
        }

        stats.avg_depth = depth_sum as f64 / stats.leaves as f64;
        stats
    }
}
