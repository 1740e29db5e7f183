// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

//! Static sphere scenes behind a median-split BVH.
//!
//! The tree answers nearest-hit queries on the CPU and is flattened into
//! index-addressed records that one of three [`layout`] encoders packs for a
//! GPU compute stage.

pub mod bvh;
pub mod config;
pub mod error;
pub mod layout;
pub mod render;
pub mod scene;

pub use error::{
    Error,
    Result,
};
