//! mocap-export library
//!
//! File-level wrappers around `mocap-core` used by the `mocap-export` binary:
//! loading raw position documents, converting them and summarizing the
//! resulting animations.

pub mod convert;
pub mod inspect;

pub use convert::{SkeletonSource, convert_file, default_output, load_raw_animation};
pub use inspect::{AnimationSummary, inspect_file};

/// File suffix of converted animations
pub const ANIMATION_EXT: &str = "anim.json";
