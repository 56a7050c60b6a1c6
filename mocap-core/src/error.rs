//! Error types for the rotation pipeline
//!
//! Structural problems (bad topology, inconsistent poses, empty input) abort a
//! conversion and surface as [`Error`]. Numerical edge cases inside a single
//! bone alignment are not errors: they are collected as [`DegenerateVector`]
//! values and the solver carries on with a fallback rotation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level pipeline error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Skeleton relation table is not a single rooted tree
    #[error("invalid skeleton topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    /// A pose disagrees with the skeleton or with the other poses
    #[error("inconsistent pose at frame {frame}: {source}")]
    InconsistentPose {
        /// Index of the offending pose in the input sequence
        frame: usize,
        #[source]
        source: PoseError,
    },

    /// No rest frame was supplied
    #[error("pose sequence is empty, at least one rest frame is required")]
    EmptySequence,

    /// Assembled animation parts disagree in length
    #[error("invalid animation: {0}")]
    InvalidAnimation(#[from] AnimationError),
}

impl Error {
    /// Shorthand for a missing bone at `frame`
    pub fn missing_bone(frame: usize, bone: impl Into<String>) -> Self {
        Error::InconsistentPose {
            frame,
            source: PoseError::MissingBone(bone.into()),
        }
    }
}

/// Skeleton validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The root bone has no entry in the relation table
    #[error("root bone '{0}' is not present in the relation table")]
    MissingRoot(String),

    /// A bone lists one of its own ancestors as a child
    #[error("bone '{bone}' closes a cycle through '{parent}'")]
    Cycle { bone: String, parent: String },

    /// A bone is listed as the child of two different parents
    #[error("bone '{bone}' has two parents ('{first}' and '{second}')")]
    MultipleParents {
        bone: String,
        first: String,
        second: String,
    },

    /// A bone is listed twice in one parent's child list
    #[error("bone '{bone}' is listed twice as a child of '{parent}'")]
    DuplicateChild { bone: String, parent: String },

    /// A bone appears in the table but cannot be reached from the root
    #[error("bone '{0}' is not reachable from the root")]
    Unreachable(String),
}

/// Pose consistency failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoseError {
    /// The skeleton declares a bone that the pose has no position for
    #[error("missing position for bone '{0}'")]
    MissingBone(String),

    /// The pose's bone-name set differs from the rest frame's
    #[error("bone set differs from the rest frame ({expected} bones expected, {found} found)")]
    BoneSetMismatch { expected: usize, found: usize },
}

/// Animation consistency failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnimationError {
    /// A bone name appears twice in the bone order
    #[error("bone '{0}' appears twice in the bone order")]
    DuplicateBone(String),

    /// Rest positions do not cover the bone order
    #[error("{found} rest positions for {expected} bones")]
    RestLength { expected: usize, found: usize },

    /// A rotation frame does not cover the bone order
    #[error("rotation frame {frame} has {found} rotations for {expected} bones")]
    FrameLength {
        frame: usize,
        expected: usize,
        found: usize,
    },

    /// The movement track is not one entry per rotation frame
    #[error("{found} movement entries for {expected} rotation frames")]
    MovementLength { expected: usize, found: usize },
}

/// Which degenerate alignment case was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateKind {
    /// One of the two vectors has (near) zero length
    ZeroLength,
    /// The two vectors point in opposite directions
    AntiParallel,
}

impl fmt::Display for DegenerateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateKind::ZeroLength => f.write_str("near-zero-length vector"),
            DegenerateKind::AntiParallel => f.write_str("anti-parallel vectors"),
        }
    }
}

/// A recoverable alignment problem for one bone in one frame
///
/// `frame` is the index in the raw pose sequence, so the first solved frame
/// after the rest pose is frame 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("degenerate alignment for bone '{bone}' at frame {frame}: {kind}")]
pub struct DegenerateVector {
    pub frame: usize,
    pub bone: String,
    pub kind: DegenerateKind,
}

/// Solver config loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse solver config: {0}")]
    Parse(#[from] toml::de::Error),
}
