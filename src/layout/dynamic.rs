// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use tracing::instrument;

use super::{
    check_capacity,
    Binding,
    BindingKind,
    EncodedBuffer,
    LayoutEncoder,
    LayoutKind,
    Table,
};
use crate::{
    bvh::FlattenedScene,
    error::Result,
};

/// Storage buffer sized to the scene.
///
/// Nodes, objects and materials are three ranges of one allocation, bound at
/// slots 0, 1 and 2. Each range starts on a multiple of `alignment`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynamicBlock {
    pub alignment: usize,
    pub max_range: Option<usize>,
}

impl DynamicBlock {
    #[must_use]
    pub const fn new(
        alignment: usize,
        max_range: Option<usize>,
    ) -> Self {
        Self {
            alignment: if alignment == 0 { 1 } else { alignment },
            max_range,
        }
    }

    const fn round_up(
        &self,
        size: usize,
    ) -> usize {
        size.next_multiple_of(self.alignment)
    }
}

impl LayoutEncoder for DynamicBlock {
    fn kind(&self) -> LayoutKind {
        LayoutKind::DynamicBlock
    }

    #[instrument(skip_all, fields(nodes = scene.nodes.len(), objects = scene.objects.len()))]
    fn encode(
        &self,
        scene: &FlattenedScene,
    ) -> Result<EncodedBuffer> {
        let layout = self.kind();
        let node_size = size_of_val(scene.nodes.as_slice());
        let object_size = size_of_val(scene.objects.as_slice());
        let material_size = size_of_val(scene.materials.as_slice());

        if let Some(limit) = self.max_range {
            check_capacity(layout, "node bytes", node_size, limit)?;
            check_capacity(layout, "object bytes", object_size, limit)?;
            check_capacity(layout, "material bytes", material_size, limit)?;
        }

        let object_offset = self.round_up(node_size);
        let material_offset = object_offset + self.round_up(object_size);
        let mut buffer = EncodedBuffer::zeroed(layout, material_offset + material_size);

        let ranges = [
            (Table::Nodes, 0, node_size, scene.nodes.len()),
            (Table::Objects, object_offset, object_size, scene.objects.len()),
            (Table::Materials, material_offset, material_size, scene.materials.len()),
        ];
        buffer.put(Table::Nodes, 0, scene.nodes.len(), &scene.nodes);
        buffer.put(Table::Objects, object_offset, scene.objects.len(), &scene.objects);
        buffer.put(
            Table::Materials,
            material_offset,
            scene.materials.len(),
            &scene.materials,
        );

        for (slot, (table, offset, size, len)) in (0..).zip(ranges) {
            tracing::debug!(slot, ?table, offset, size, len, "storage range");
            buffer.expose(Binding {
                slot,
                offset,
                size,
                kind: BindingKind::StorageRange,
            });
        }

        Ok(buffer)
    }
}
