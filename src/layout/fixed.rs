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
    bvh::{
        FlatMaterial,
        FlatNode,
        FlatSphere,
        FlattenedScene,
    },
    error::Result,
};

/// Uniform block sized for a fixed maximum scene.
///
/// ```text
/// [nodes; max_nodes][objects; max_objects][materials; max_objects]
/// ```
/// Unused tails stay zeroed. The block is bound whole at slot 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedBlock {
    pub max_nodes:   usize,
    pub max_objects: usize,
}

impl Default for FixedBlock {
    fn default() -> Self {
        Self {
            max_nodes:   Self::MAX_NODES,
            max_objects: Self::MAX_OBJECTS,
        }
    }
}

impl FixedBlock {
    pub const MAX_NODES: usize = 640;
    pub const MAX_OBJECTS: usize = 512;

    #[must_use]
    pub const fn objects_offset(&self) -> usize {
        self.max_nodes * size_of::<FlatNode>()
    }

    #[must_use]
    pub const fn materials_offset(&self) -> usize {
        self.objects_offset() + self.max_objects * size_of::<FlatSphere>()
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.materials_offset() + self.max_objects * size_of::<FlatMaterial>()
    }
}

impl LayoutEncoder for FixedBlock {
    fn kind(&self) -> LayoutKind {
        LayoutKind::FixedBlock
    }

    #[instrument(skip_all, fields(nodes = scene.nodes.len(), objects = scene.objects.len()))]
    fn encode(
        &self,
        scene: &FlattenedScene,
    ) -> Result<EncodedBuffer> {
        let layout = self.kind();
        check_capacity(layout, "objects", scene.objects.len(), self.max_objects)?;
        check_capacity(layout, "materials", scene.materials.len(), self.max_objects)?;
        check_capacity(layout, "nodes", scene.nodes.len(), self.max_nodes)?;

        let mut buffer = EncodedBuffer::zeroed(layout, self.size());
        buffer.put(Table::Nodes, 0, scene.nodes.len(), &scene.nodes);
        buffer.put(
            Table::Objects,
            self.objects_offset(),
            scene.objects.len(),
            &scene.objects,
        );
        buffer.put(
            Table::Materials,
            self.materials_offset(),
            scene.materials.len(),
            &scene.materials,
        );
        buffer.expose(Binding {
            slot:   0,
            offset: 0,
            size:   self.size(),
            kind:   BindingKind::UniformBlock,
        });

        tracing::debug!(size = self.size(), "encoded fixed block");
        Ok(buffer)
    }
}
