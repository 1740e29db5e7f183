// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use super::Binding;

/// The parallel compute stage that consumes encoded scenes.
pub trait ComputeStage {
    /// Required alignment for the start of a bound sub-range, in bytes
    fn minimum_suballocation_alignment(&self) -> usize;

    /// Largest number of texels a one dimensional table may hold
    fn max_texel_extent(&self) -> usize;

    /// Largest bindable storage range in bytes, if the stage has one
    fn max_storage_range(&self) -> Option<usize> {
        None
    }

    fn bind(
        &mut self,
        binding: &Binding,
        bytes: &[u8],
    );
}

/// Stage without a device. Keeps a copy of everything bound to it.
#[derive(Clone, Debug)]
pub struct HeadlessStage {
    pub alignment:         usize,
    pub max_texel_extent:  usize,
    pub max_storage_range: Option<usize>,
    pub bound:             Vec<(Binding, Vec<u8>)>,
}

impl HeadlessStage {
    pub const DEFAULT_ALIGNMENT: usize = 256;
    pub const DEFAULT_MAX_TEXEL_EXTENT: usize = 16384;

    #[must_use]
    pub fn bound_at(
        &self,
        slot: u32,
    ) -> Option<&(Binding, Vec<u8>)> {
        self.bound.iter().rev().find(|(binding, _)| binding.slot == slot)
    }
}

impl Default for HeadlessStage {
    fn default() -> Self {
        Self {
            alignment:         Self::DEFAULT_ALIGNMENT,
            max_texel_extent:  Self::DEFAULT_MAX_TEXEL_EXTENT,
            max_storage_range: None,
            bound:             Vec::new(),
        }
    }
}

impl ComputeStage for HeadlessStage {
    fn minimum_suballocation_alignment(&self) -> usize {
        self.alignment
    }

    fn max_texel_extent(&self) -> usize {
        self.max_texel_extent
    }

    fn max_storage_range(&self) -> Option<usize> {
        self.max_storage_range
    }

    fn bind(
        &mut self,
        binding: &Binding,
        bytes: &[u8],
    ) {
        self.bound.push((*binding, bytes.to_vec()));
    }
}
