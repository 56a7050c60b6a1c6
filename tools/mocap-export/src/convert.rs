//! Raw positions (.json) -> rotation animation (.anim.json)
//!
//! Input documents are JSON objects with a `poses` array (one map of bone
//! name to `[x, y, z]` per frame, rest pose first) and an optional inline
//! `skeleton` (`{"root": ..., "relations": {...}}`).

use anyhow::{Context, Result, bail};
use mocap_core::{Animation, Pose, RawAnimation, Skeleton, SolverConfig};
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::ANIMATION_EXT;

/// Where the bone hierarchy comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonSource {
    /// Whatever the input document carries, HDM05 if it carries none
    Document,
    /// The built-in HDM05 topology
    Hdm05,
    /// A skeleton file (.toml or .json)
    File(PathBuf),
}

impl FromStr for SkeletonSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "hdm05" => SkeletonSource::Hdm05,
            path => SkeletonSource::File(PathBuf::from(path)),
        })
    }
}

#[derive(Deserialize)]
struct InputDocument {
    #[serde(default)]
    skeleton: Option<Skeleton>,
    poses: Vec<Pose>,
}

/// Read a raw animation, resolving its skeleton from `source`
pub fn load_raw_animation(input: &Path, source: &SkeletonSource) -> Result<RawAnimation> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input: {:?}", input))?;
    let document: InputDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input: {:?}", input))?;

    let skeleton = match source {
        SkeletonSource::Hdm05 => Skeleton::hdm05(),
        SkeletonSource::File(path) => Arc::new(load_skeleton(path)?),
        SkeletonSource::Document => match document.skeleton {
            Some(skeleton) => Arc::new(skeleton),
            None => {
                tracing::debug!("No skeleton in {:?}, using HDM05", input);
                Skeleton::hdm05()
            }
        },
    };

    RawAnimation::new(document.poses, skeleton)
        .with_context(|| format!("Invalid raw animation: {:?}", input))
}

fn load_skeleton(path: &Path) -> Result<Skeleton> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read skeleton: {:?}", path))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse skeleton: {:?}", path)),
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse skeleton: {:?}", path)),
        _ => bail!("Unsupported skeleton format: {:?} (use .toml or .json)", path),
    }
}

/// `walk.json` -> `walk.anim.json`
pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension(ANIMATION_EXT)
}

/// Convert `input` and write the animation to `output` as JSON
pub fn convert_file(
    input: &Path,
    output: &Path,
    source: &SkeletonSource,
    config: &SolverConfig,
) -> Result<Animation> {
    let raw = load_raw_animation(input, source)?;
    tracing::info!(
        "Loaded {} frames for {} bones from {:?}",
        raw.len(),
        raw.skeleton().len(),
        input
    );

    let animation = mocap_core::convert(&raw, config)
        .with_context(|| format!("Failed to convert {:?}", input))?;

    for degenerate in animation.degenerate() {
        tracing::warn!("{}", degenerate);
    }

    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &animation)
        .with_context(|| format!("Failed to write animation: {:?}", output))?;

    tracing::info!(
        "Exported animation: {} frames, {} bones, movement: {}, degenerate: {}",
        animation.len(),
        animation.bone_order().len(),
        animation.has_movement(),
        animation.degenerate().len()
    );

    Ok(animation)
}
