//! mocap-core
//!
//! Reconstructs per-bone local rotations from raw motion-capture joint
//! positions. A [`RawAnimation`] (one absolute position per joint per frame,
//! frame 0 being the rest pose) goes through
//!
//! 1. root normalization ([`pose::normalize`])
//! 2. hierarchical shortest-arc solving ([`solver::Solver`])
//! 3. quaternion sign stabilization ([`stabilize::stabilize`])
//! 4. assembly into an [`Animation`]
//!
//! [`convert`] runs the whole pipeline. Converted animations can then be
//! laid out as keyframes with the [`timeline`] module.

pub mod animation;
pub mod config;
pub mod error;
pub mod math;
pub mod pose;
pub mod skeleton;
pub mod solver;
pub mod stabilize;
pub mod timeline;

pub use animation::{Animation, convert};
pub use config::{BoneVectors, SolverConfig, TranslationMode};
pub use error::{
    AnimationError, ConfigError, DegenerateKind, DegenerateVector, Error, PoseError, Result, TopologyError,
};
pub use pose::{Normalized, Pose, RawAnimation, normalize};
pub use skeleton::{DEFAULT_ROOT, HDM05_BONE_ORDER, Skeleton};
pub use solver::{RotationFrame, SolvedFrame, Solver, solve_frame, solve_sequence};
pub use stabilize::stabilize;
pub use timeline::{Action, BodyPart, Channel, Keyframe, Timeline, schedule_groups};
