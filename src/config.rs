// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use std::{
    path::PathBuf,
    str::FromStr,
};

use crate::{
    bvh::Builder,
    error::{
        Error,
        Result,
    },
    layout::{
        HeadlessStage,
        LayoutKind,
    },
    render::{
        HitTest,
        Sphere,
    },
};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 450;
pub const SEED: u64 = 0x5EED;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub width:     u32,
    pub height:    u32,
    pub seed:      u64,
    pub leaf_size: usize,
    pub layout:    LayoutKind,
    pub hit_test:  HitTest,
    pub output:    PathBuf,
    pub verbose:   bool,

    pub alignment:         usize,
    pub max_texel_extent:  usize,
    pub max_storage_range: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width:     WIDTH,
            height:    HEIGHT,
            seed:      SEED,
            leaf_size: Builder::<Sphere>::BVH_MAX_LEAF,
            layout:    LayoutKind::default(),
            hit_test:  HitTest::default(),
            output:    PathBuf::from("preview.png"),
            verbose:   false,

            alignment:         HeadlessStage::DEFAULT_ALIGNMENT,
            max_texel_extent:  HeadlessStage::DEFAULT_MAX_TEXEL_EXTENT,
            max_storage_range: None,
        }
    }
}

impl FromStr for HitTest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bvh" => Ok(Self::Bvh),
            "brute-force" | "linear" => Ok(Self::BruteForce),
            other => Err(Error::InvalidArgument(format!("unknown hit test `{other}`"))),
        }
    }
}

fn parse_value<T: FromStr>(
    flag: &str,
    value: Option<String>,
) -> Result<T> {
    let value = value.ok_or_else(|| Error::InvalidArgument(format!("{flag} expects a value")))?;
    value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{flag}: cannot parse `{value}`")))
}

impl Config {
    /// Parses flags, not including the program name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown flag, a missing or unparsable
    /// value, a zero image size or a zero leaf size.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--width" => config.width = parse_value(&flag, args.next())?,
                "--height" => config.height = parse_value(&flag, args.next())?,
                "--seed" => config.seed = parse_value(&flag, args.next())?,
                "--leaf-size" => config.leaf_size = parse_value(&flag, args.next())?,
                "--layout" => config.layout = parse_value(&flag, args.next())?,
                "--hit-test" => config.hit_test = parse_value(&flag, args.next())?,
                "--output" => config.output = parse_value(&flag, args.next())?,
                "--alignment" => config.alignment = parse_value(&flag, args.next())?,
                "--max-texel-extent" => {
                    config.max_texel_extent = parse_value(&flag, args.next())?;
                },
                "--max-storage-range" => {
                    config.max_storage_range = Some(parse_value(&flag, args.next())?);
                },
                "-v" | "--verbose" => config.verbose = true,
                other => {
                    return Err(Error::InvalidArgument(format!("unknown flag `{other}`")));
                },
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(Error::InvalidArgument("image size must be non-zero".into()));
        }
        if config.leaf_size == 0 {
            return Err(Error::InvalidArgument("leaf size must be at least 1".into()));
        }

        Ok(config)
    }

    #[must_use]
    pub fn stage(&self) -> HeadlessStage {
        HeadlessStage {
            alignment: self.alignment,
            max_texel_extent: self.max_texel_extent,
            max_storage_range: self.max_storage_range,
            ..HeadlessStage::default()
        }
    }

    #[must_use]
    pub const fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::INFO
        }
    }
}
