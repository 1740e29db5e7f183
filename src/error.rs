// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use thiserror::Error;

use crate::layout::LayoutKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A BVH needs at least one primitive to bound
    #[error("cannot build a BVH over an empty scene")]
    EmptyScene,

    /// The flattened scene does not fit the addressing scheme of a layout
    #[error("{layout} layout cannot hold {requested} {table} (limit {limit})")]
    CapacityExceeded {
        layout:    LayoutKind,
        table:     &'static str,
        requested: usize,
        limit:     usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
