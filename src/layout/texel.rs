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
    TexelFormat,
};
use crate::{
    bvh::{
        FlatNode,
        FlattenedScene,
    },
    error::Result,
};

/// Four one dimensional vec4 tables, one texel per slot:
///
/// | slot | format  | texels per record            |
/// |------|---------|------------------------------|
/// | 0    | RGBA32F | 2 per node, `min` then `max` |
/// | 1    | RGBA32I | 1 per node                   |
/// | 2    | RGBA32F | 1 per sphere                 |
/// | 3    | RGBA32F | 2 per material               |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexelTables {
    pub max_extent: usize,
}

impl TexelTables {
    #[must_use]
    pub const fn new(max_extent: usize) -> Self {
        Self { max_extent }
    }
}

fn split_node(node: &FlatNode) -> ([[f32; 4]; 2], [i32; 4]) {
    let [min_x, min_y, min_z] = node.min;
    let [max_x, max_y, max_z] = node.max;
    let bounds = [
        [min_x, min_y, min_z, node._pad0],
        [max_x, max_y, max_z, node._pad1],
    ];
    (bounds, [node.left, node.right, node.first_index, node.count])
}

impl LayoutEncoder for TexelTables {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Texel
    }

    #[instrument(skip_all, fields(nodes = scene.nodes.len(), objects = scene.objects.len()))]
    fn encode(
        &self,
        scene: &FlattenedScene,
    ) -> Result<EncodedBuffer> {
        let layout = self.kind();
        check_capacity(layout, "node bound texels", scene.nodes.len() * 2, self.max_extent)?;
        check_capacity(layout, "material texels", scene.materials.len() * 2, self.max_extent)?;
        check_capacity(layout, "object texels", scene.objects.len(), self.max_extent)?;

        let (bounds, topology): (Vec<_>, Vec<_>) = scene.nodes.iter().map(split_node).unzip();

        let tables = [
            (Table::NodeBounds, TexelFormat::Rgba32F, bounds.len(), 2),
            (Table::NodeTopology, TexelFormat::Rgba32I, topology.len(), 1),
            (Table::Objects, TexelFormat::Rgba32F, scene.objects.len(), 1),
            (Table::Materials, TexelFormat::Rgba32F, scene.materials.len(), 2),
        ];
        let total = tables
            .iter()
            .map(|(_, _, records, texels)| records * texels * Binding::TEXEL_SIZE)
            .sum::<usize>();

        let mut buffer = EncodedBuffer::zeroed(layout, total);
        let mut offset = 0;
        for (slot, (table, format, records, texels)) in (0..).zip(tables) {
            match table {
                Table::NodeBounds => buffer.put(table, offset, records, &bounds),
                Table::NodeTopology => buffer.put(table, offset, records, &topology),
                Table::Objects => buffer.put(table, offset, records, &scene.objects),
                Table::Materials => buffer.put(table, offset, records, &scene.materials),
                Table::Nodes => unreachable!("nodes are split into bounds and topology"),
            }

            let size = records * texels * Binding::TEXEL_SIZE;
            buffer.expose(Binding {
                slot,
                offset,
                size,
                kind: BindingKind::Texels(format),
            });
            tracing::debug!(slot, ?table, ?format, texels = records * texels, "texel table");
            offset += size;
        }

        Ok(buffer)
    }
}
