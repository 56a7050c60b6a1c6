//! Solver configuration
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! epsilon = 1e-9
//! bone_vectors = "absolute"      # or "parent_offset"
//! translations = "absolute"      # or "relative_to_rest"
//! parallel = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Which vector represents a bone during alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneVectors {
    /// Root-relative joint position (the position itself after normalization)
    #[default]
    Absolute,
    /// Joint position minus the parent joint position
    ParentOffset,
}

/// What the movement track records per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Raw root position
    #[default]
    Absolute,
    /// Root position minus the rest frame's root position
    RelativeToRest,
}

/// Tunables for [`crate::convert`] and the per-frame solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Length and dot-product threshold for degenerate alignments
    pub epsilon: f64,
    pub bone_vectors: BoneVectors,
    pub translations: TranslationMode,
    /// Solve frames on the rayon pool
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            bone_vectors: BoneVectors::default(),
            translations: TranslationMode::default(),
            parallel: true,
        }
    }
}

impl SolverConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse config from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
