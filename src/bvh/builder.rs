// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::Vec3A;
use tracing::instrument;

use super::{
    BoundingBox,
    Bvh,
    BvhNode,
};
use crate::{
    error::{
        Error,
        Result,
    },
    render::{
        ObjectKey,
        Primitive,
        PrimitiveStore,
    },
};

struct Entry {
    key:      ObjectKey,
    bounds:   BoundingBox,
    centroid: Vec3A,
}

/// Top-down median-split builder.
pub struct Builder<'a, P> {
    store:     &'a PrimitiveStore<P>,
    leaf_size: usize,
}

impl<'a, P: Primitive> Builder<'a, P> {
    pub const BVH_MAX_LEAF: usize = 2;

    #[must_use]
    pub const fn new(store: &'a PrimitiveStore<P>) -> Self {
        Self {
            store,
            leaf_size: Self::BVH_MAX_LEAF,
        }
    }

    /// Largest subset emitted as a leaf. Clamped to at least one.
    #[must_use]
    pub fn leaf_size(
        mut self,
        leaf_size: usize,
    ) -> Self {
        self.leaf_size = leaf_size.max(1);
        self
    }

    /// # Errors
    ///
    /// [`Error::EmptyScene`] if the store holds no primitives.
    #[instrument(skip(self), fields(objects = self.store.len(), leaf_size = self.leaf_size))]
    pub fn build(self) -> Result<Bvh> {
        if self.store.is_empty() {
            return Err(Error::EmptyScene);
        }

        let mut entries = self
            .store
            .iter()
            .map(|(key, object)| Entry {
                key,
                bounds: object.bounds(),
                centroid: object.centroid(),
            })
            .collect::<Vec<_>>();

        let root = self.split(&mut entries, 0);
        let bvh = Bvh {
            root,
            order: entries.iter().map(|entry| entry.key).collect(),
        };

        let stats = bvh.stats();
        tracing::debug!(
            nodes = stats.nodes,
            leaves = stats.leaves,
            max_depth = stats.max_depth,
            avg_depth = stats.avg_depth,
            "BVH generated"
        );

        Ok(bvh)
    }

    /// `first` is the offset of `entries` within the final ordering
    fn split(
        &self,
        entries: &mut [Entry],
        first: usize,
    ) -> BvhNode {
        let bounds = entries
            .iter()
            .fold(BoundingBox::new(), |bounds, entry| bounds.union(&entry.bounds));

        if entries.len() <= self.leaf_size {
            return BvhNode::Leaf {
                bounds,
                first,
                count: entries.len(),
            };
        }

        // Splitting by position rather than by coordinate keeps both halves
        // non-empty even when every centroid coincides on this axis.
        let axis = bounds.largest_axis();
        let mid = entries.len() / 2;
        entries.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

        let (left, right) = entries.split_at_mut(mid);
        BvhNode::Internal {
            bounds,
            left: Box::new(self.split(left, first)),
            right: Box::new(self.split(right, first + mid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{
        rngs::StdRng,
        Rng,
        SeedableRng,
    };

    use super::*;
    use crate::render::{
        Material,
        Sphere,
    };

    fn random_store(
        seed: u64,
        count: usize,
    ) -> PrimitiveStore {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Sphere::new(
                    Vec3A::new(
                        rng.gen_range(-50.0..50.0),
                        rng.gen_range(-5.0..5.0),
                        rng.gen_range(-50.0..50.0),
                    ),
                    rng.gen_range(0.1..2.0),
                    Material::diffuse(Vec3A::splat(0.5)),
                )
            })
            .collect()
    }

    fn collect_leaves<'a>(
        node: &'a BvhNode,
        depth: usize,
        out: &mut Vec<(&'a BvhNode, usize)>,
    ) {
        match node {
            BvhNode::Leaf { .. } => out.push((node, depth)),
            BvhNode::Internal { left, right, .. } => {
                collect_leaves(left, depth + 1, out);
                collect_leaves(right, depth + 1, out);
            },
        }
    }

    fn check_bounds<P: Primitive>(
        node: &BvhNode,
        bvh: &Bvh,
        store: &PrimitiveStore<P>,
    ) {
        match node {
            BvhNode::Leaf {
                bounds,
                first,
                count,
            } => {
                for &key in &bvh.order()[*first..*first + *count] {
                    assert!(bounds.contains(&store[key].bounds()));
                }
            },
            BvhNode::Internal {
                bounds,
                left,
                right,
            } => {
                assert_eq!(*bounds, left.bounds().union(right.bounds()));
                check_bounds(left, bvh, store);
                check_bounds(right, bvh, store);
            },
        }
    }

    #[test]
    fn empty_scene_fails() {
        let store = PrimitiveStore::<Sphere>::new();
        assert_eq!(Builder::new(&store).build().err(), Some(Error::EmptyScene));
    }

    #[test]
    fn single_sphere_is_one_leaf() {
        let store = random_store(1, 1);
        let bvh = Builder::new(&store).build().expect("build");

        let BvhNode::Leaf { first, count, .. } = bvh.root() else {
            panic!("root should be a leaf");
        };
        assert_eq!((*first, *count), (0, 1));
        assert_eq!(bvh.order().len(), 1);
    }

    #[test]
    fn leaves_cover_every_primitive_once() {
        for (seed, count) in [(2, 2), (3, 3), (4, 17), (5, 256), (6, 1000)] {
            let store = random_store(seed, count);
            let bvh = Builder::new(&store).build().expect("build");

            let mut leaves = Vec::new();
            collect_leaves(bvh.root(), 0, &mut leaves);

            let mut covered = vec![false; count];
            for (leaf, _) in &leaves {
                let BvhNode::Leaf { first, count, .. } = leaf else {
                    unreachable!();
                };
                assert!(*count >= 1);
                for slot in &mut covered[*first..*first + *count] {
                    assert!(!*slot, "leaf ranges overlap");
                    *slot = true;
                }
            }
            assert!(covered.iter().all(|&c| c));

            let keys = bvh.order().iter().copied().collect::<HashSet<_>>();
            let expected = store.iter().map(|(key, _)| key).collect::<HashSet<_>>();
            assert_eq!(keys, expected);
        }
    }

    #[test]
    fn bounds_are_exact_unions() {
        let store = random_store(7, 300);
        let bvh = Builder::new(&store).leaf_size(3).build().expect("build");
        check_bounds(bvh.root(), &bvh, &store);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn depth_is_logarithmic() {
        for leaf_size in 1..=4 {
            for count in [1, 2, 5, 64, 100, 777] {
                let store = random_store(count as u64, count);
                let bvh = Builder::new(&store).leaf_size(leaf_size).build().expect("build");

                let levels = bvh.stats().max_depth + 1;
                let bound = (count as f64 / leaf_size as f64).log2().ceil().max(0.0) as usize + 1;
                assert!(levels <= bound, "{count} objects, leaf {leaf_size}: {levels} > {bound}");
            }
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn coincident_centroids_still_split() {
        let store: PrimitiveStore = (0..9)
            .map(|i| {
                Sphere::new(
                    Vec3A::ZERO,
                    1.0 + i as f32,
                    Material::diffuse(Vec3A::ONE),
                )
            })
            .collect();
        let bvh = Builder::new(&store).build().expect("build");

        let stats = bvh.stats();
        assert_eq!(stats.leaves, 5);
        assert!(stats.max_depth <= 3);
    }

    #[test]
    fn two_far_spheres_make_internal_root() {
        let store: PrimitiveStore = [
            Sphere::new(Vec3A::new(-100.0, 0.0, 0.0), 1.0, Material::diffuse(Vec3A::ONE)),
            Sphere::new(Vec3A::new(100.0, 0.0, 0.0), 1.0, Material::diffuse(Vec3A::ONE)),
        ]
        .into_iter()
        .collect();
        let bvh = Builder::new(&store).leaf_size(1).build().expect("build");

        let BvhNode::Internal { left, right, .. } = bvh.root() else {
            panic!("root should be internal");
        };
        assert!(left.is_leaf() && right.is_leaf());
    }
}
