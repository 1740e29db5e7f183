// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use super::{
    Bvh,
    BvhNode,
};
use crate::render::{
    HitRecord,
    ObjectKey,
    Primitive,
    PrimitiveStore,
    Ray,
};

/// Best hit so far. `t_max` shrinks as closer hits are found.
struct Search {
    t_min:   f32,
    t_max:   f32,
    closest: Option<(HitRecord, ObjectKey)>,
}

impl Bvh {
    /// Nearest hit within `[t_min, t_max]`.
    ///
    /// Only reads the tree; all traversal state lives on this call's stack, so
    /// any number of threads may raycast the same `Bvh` at once.
    #[must_use]
    pub fn raycast<P: Primitive>(
        &self,
        store: &PrimitiveStore<P>,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
    ) -> Option<(HitRecord, ObjectKey)> {
        // Children are tested by their parent, so the root needs its own check
        self.root.bounds().intersects(ray, t_min, t_max)?;

        let mut search = Search {
            t_min,
            t_max,
            closest: None,
        };
        self.descend(&self.root, store, ray, &mut search);
        search.closest
    }

    fn descend<P: Primitive>(
        &self,
        node: &BvhNode,
        store: &PrimitiveStore<P>,
        ray: &Ray,
        search: &mut Search,
    ) {
        match node {
            BvhNode::Leaf { first, count, .. } => {
                for &key in &self.order[*first..*first + *count] {
                    let Some(record) = store[key].hit(ray, search.t_min, search.t_max) else {
                        continue;
                    };

                    search.t_max = record.along;
                    search.closest = Some((record, key));
                }
            },
            BvhNode::Internal { left, right, .. } => {
                let left_entry = left.bounds().intersects(ray, search.t_min, search.t_max);
                let right_entry = right.bounds().intersects(ray, search.t_min, search.t_max);

                // Nearer child first so its hits can prune the other one
                let mut queue = [(left_entry, &**left), (right_entry, &**right)];
                if let (Some(l), Some(r)) = (left_entry, right_entry) {
                    if r < l {
                        queue.swap(0, 1);
                    }
                }

                for (entry, child) in queue {
                    let Some(entry) = entry else {
                        continue;
                    };
                    if entry > search.t_max {
                        continue;
                    }
                    self.descend(child, store, ray, search);
                }
            },
        }
    }
}
