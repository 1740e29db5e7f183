// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

//! Binary layouts of a [`FlattenedScene`] for the GPU.
//!
//! Every backend writes the same records (48 byte nodes, 16 byte spheres,
//! 32 byte materials) and only differs in where they land and how they are
//! exposed to shaders.

mod dynamic;
mod fixed;
mod stage;
mod texel;

use std::{
    fmt,
    str::FromStr,
};

use bytemuck::Pod;
pub use dynamic::DynamicBlock;
pub use fixed::FixedBlock;
pub use stage::{
    ComputeStage,
    HeadlessStage,
};
pub use texel::TexelTables;

use crate::{
    bvh::{
        FlatMaterial,
        FlatNode,
        FlatSphere,
        FlattenedScene,
    },
    error::{
        Error,
        Result,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// One statically sized uniform block
    #[default]
    FixedBlock,
    /// Exactly sized storage ranges in one allocation
    DynamicBlock,
    /// One dimensional vec4 textures
    Texel,
}

impl fmt::Display for LayoutKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(match self {
            Self::FixedBlock => "fixed-block",
            Self::DynamicBlock => "dynamic-block",
            Self::Texel => "texel",
        })
    }
}

impl FromStr for LayoutKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" | "fixed-block" | "ubo" => Ok(Self::FixedBlock),
            "dynamic" | "dynamic-block" | "ssbo" => Ok(Self::DynamicBlock),
            "texel" | "texture" => Ok(Self::Texel),
            other => Err(Error::InvalidArgument(format!("unknown layout `{other}`"))),
        }
    }
}

/// What a run of records inside an encoded buffer holds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    /// Whole 48 byte node records
    Nodes,
    /// Two vec4 per node: `(min, pad)`, `(max, pad)`
    NodeBounds,
    /// One ivec4 per node: `(left, right, first_index, count)`
    NodeTopology,
    Objects,
    Materials,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexelFormat {
    Rgba32F,
    Rgba32I,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    UniformBlock,
    StorageRange,
    Texels(TexelFormat),
}

/// A byte range of an encoded buffer exposed at a shader binding slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub slot:   u32,
    pub offset: usize,
    pub size:   usize,
    pub kind:   BindingKind,
}

impl Binding {
    pub const TEXEL_SIZE: usize = 16;

    #[must_use]
    pub const fn texels(&self) -> usize {
        self.size / Self::TEXEL_SIZE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Section {
    table:  Table,
    offset: usize,
    len:    usize,
}

/// The single backing allocation an encoder produces.
///
/// Nothing can write to it once `encode` returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBuffer {
    layout:   LayoutKind,
    data:     Vec<u8>,
    sections: Vec<Section>,
    bindings: Vec<Binding>,
}

impl EncodedBuffer {
    fn zeroed(
        layout: LayoutKind,
        size: usize,
    ) -> Self {
        Self {
            layout,
            data: vec![0; size],
            sections: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Copy `records` to `offset`. `len` is the count `decode` will read back.
    fn put<T: Pod>(
        &mut self,
        table: Table,
        offset: usize,
        len: usize,
        records: &[T],
    ) {
        let bytes = bytemuck::cast_slice::<T, u8>(records);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.sections.push(Section { table, offset, len });
    }

    fn expose(
        &mut self,
        binding: Binding,
    ) {
        debug_assert!(binding.offset + binding.size <= self.data.len());
        self.bindings.push(binding);
    }

    #[must_use]
    pub const fn layout(&self) -> LayoutKind {
        self.layout
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Hands every binding to the compute stage.
    pub fn bind(
        &self,
        stage: &mut dyn ComputeStage,
    ) {
        for binding in &self.bindings {
            tracing::trace!(layout = %self.layout, ?binding, "binding");
            stage.bind(binding, &self.data[binding.offset..binding.offset + binding.size]);
        }
    }

    fn read<T: Pod>(
        &self,
        section: &Section,
    ) -> Vec<T> {
        let size = size_of::<T>();
        self.data[section.offset..section.offset + section.len * size]
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Rebuilds the flattened scene the buffer was encoded from.
    #[must_use]
    pub fn decode(&self) -> FlattenedScene {
        let mut scene = FlattenedScene::default();
        let mut bounds = Vec::<[[f32; 4]; 2]>::new();
        let mut topology = Vec::<[i32; 4]>::new();

        for section in &self.sections {
            match section.table {
                Table::Nodes => scene.nodes = self.read::<FlatNode>(section),
                Table::NodeBounds => bounds = self.read(section),
                Table::NodeTopology => topology = self.read(section),
                Table::Objects => scene.objects = self.read::<FlatSphere>(section),
                Table::Materials => scene.materials = self.read::<FlatMaterial>(section),
            }
        }

        if scene.nodes.is_empty() {
            scene.nodes = bounds
                .iter()
                .zip(&topology)
                .map(|([min, max], [left, right, first_index, count])| FlatNode {
                    min:         [min[0], min[1], min[2]],
                    _pad0:       min[3],
                    max:         [max[0], max[1], max[2]],
                    _pad1:       max[3],
                    left:        *left,
                    right:       *right,
                    first_index: *first_index,
                    count:       *count,
                })
                .collect();
        }

        scene
    }
}

pub trait LayoutEncoder {
    fn kind(&self) -> LayoutKind;

    /// Packs `scene`, or fails without producing any buffer.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`](crate::Error::CapacityExceeded) naming the
    /// first table that does not fit the layout's limits.
    fn encode(
        &self,
        scene: &FlattenedScene,
    ) -> Result<EncodedBuffer>;
}

/// Encoder picked by configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoder {
    Fixed(FixedBlock),
    Dynamic(DynamicBlock),
    Texel(TexelTables),
}

impl Encoder {
    /// Configures `kind` with the limits `stage` reports
    #[must_use]
    pub fn for_stage(
        kind: LayoutKind,
        stage: &dyn ComputeStage,
    ) -> Self {
        match kind {
            LayoutKind::FixedBlock => Self::Fixed(FixedBlock::default()),
            LayoutKind::DynamicBlock => Self::Dynamic(DynamicBlock::new(
                stage.minimum_suballocation_alignment(),
                stage.max_storage_range(),
            )),
            LayoutKind::Texel => Self::Texel(TexelTables::new(stage.max_texel_extent())),
        }
    }
}

impl LayoutEncoder for Encoder {
    fn kind(&self) -> LayoutKind {
        match self {
            Self::Fixed(encoder) => encoder.kind(),
            Self::Dynamic(encoder) => encoder.kind(),
            Self::Texel(encoder) => encoder.kind(),
        }
    }

    fn encode(
        &self,
        scene: &FlattenedScene,
    ) -> Result<EncodedBuffer> {
        match self {
            Self::Fixed(encoder) => encoder.encode(scene),
            Self::Dynamic(encoder) => encoder.encode(scene),
            Self::Texel(encoder) => encoder.encode(scene),
        }
    }
}

fn check_capacity(
    layout: LayoutKind,
    table: &'static str,
    requested: usize,
    limit: usize,
) -> Result<()> {
    if requested > limit {
        tracing::warn!(%layout, table, requested, limit, "capacity exceeded");
        return Err(Error::CapacityExceeded {
            layout,
            table,
            requested,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::Vec3A;
    use rand::{
        rngs::StdRng,
        Rng,
        SeedableRng,
    };

    use super::*;
    use crate::{
        bvh::{
            self,
            Builder,
        },
        render::{
            Material,
            PrimitiveStore,
            Sphere,
        },
    };

    pub fn random_flat_scene(
        seed: u64,
        count: usize,
    ) -> FlattenedScene {
        let mut rng = StdRng::seed_from_u64(seed);
        let store: PrimitiveStore = (0..count)
            .map(|i| {
                let material = match i % 3 {
                    0 => Material::diffuse(Vec3A::new(rng.gen(), rng.gen(), rng.gen())),
                    1 => Material::metal(Vec3A::new(rng.gen(), rng.gen(), rng.gen()), rng.gen()),
                    _ => Material::dielectric(1.5),
                };
                Sphere::new(
                    Vec3A::new(
                        rng.gen_range(-10.0..10.0),
                        rng.gen_range(0.0..2.0),
                        rng.gen_range(-10.0..10.0),
                    ),
                    0.2,
                    material,
                )
            })
            .collect();
        let bvh = Builder::new(&store).build().expect("build");
        bvh::flatten(&bvh, &store)
    }

    #[test]
    fn all_layouts_round_trip() {
        let scene = random_flat_scene(3, 200);
        let stage = HeadlessStage::default();

        for kind in [
            LayoutKind::FixedBlock,
            LayoutKind::DynamicBlock,
            LayoutKind::Texel,
        ] {
            let encoder = Encoder::for_stage(kind, &stage);
            assert_eq!(encoder.kind(), kind);

            let buffer = encoder.encode(&scene).expect("encode");
            assert_eq!(buffer.layout(), kind);
            assert_eq!(buffer.decode(), scene, "{kind} did not round trip");
        }
    }

    #[test]
    fn layouts_share_record_bytes() {
        let scene = random_flat_scene(8, 64);
        let stage = HeadlessStage::default();

        let encoded = [
            LayoutKind::FixedBlock,
            LayoutKind::DynamicBlock,
            LayoutKind::Texel,
        ]
        .map(|kind| {
            Encoder::for_stage(kind, &stage)
                .encode(&scene)
                .expect("encode")
        });

        let object_bytes = bytemuck::cast_slice::<_, u8>(&scene.objects);
        let material_bytes = bytemuck::cast_slice::<_, u8>(&scene.materials);
        for buffer in &encoded {
            let bytes = buffer.as_bytes();
            assert!(bytes
                .windows(object_bytes.len())
                .any(|window| window == object_bytes));
            assert!(bytes
                .windows(material_bytes.len())
                .any(|window| window == material_bytes));
        }
    }

    #[test]
    fn layout_names_parse() {
        assert_eq!("fixed".parse::<LayoutKind>(), Ok(LayoutKind::FixedBlock));
        assert_eq!("ssbo".parse::<LayoutKind>(), Ok(LayoutKind::DynamicBlock));
        assert_eq!("texel".parse::<LayoutKind>(), Ok(LayoutKind::Texel));
        assert!(matches!(
            "voxel".parse::<LayoutKind>(),
            Err(Error::InvalidArgument(_))
        ));

        for kind in [
            LayoutKind::FixedBlock,
            LayoutKind::DynamicBlock,
            LayoutKind::Texel,
        ] {
            assert_eq!(kind.to_string().parse::<LayoutKind>(), Ok(kind));
        }
    }
}
