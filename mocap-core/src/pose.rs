//! Poses, raw animations and root normalization

use glam::DVec3;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::TranslationMode;
use crate::error::{Error, PoseError, Result};
use crate::skeleton::Skeleton;

/// Absolute joint positions for a single instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    positions: HashMap<String, DVec3>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position of `bone`, returning the previous one
    pub fn insert(&mut self, bone: impl Into<String>, position: DVec3) -> Option<DVec3> {
        self.positions.insert(bone.into(), position)
    }

    pub fn position(&self, bone: &str) -> Option<DVec3> {
        self.positions.get(bone).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate over `(bone, position)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, DVec3)> {
        self.positions.iter().map(|(name, pos)| (name.as_str(), *pos))
    }

    /// Copy of this pose with every position shifted by `offset`
    pub fn translated(&self, offset: DVec3) -> Pose {
        Pose {
            positions: self
                .positions
                .iter()
                .map(|(name, pos)| (name.clone(), *pos + offset))
                .collect(),
        }
    }

    /// Positions of all skeleton bones in hierarchical order
    ///
    /// `frame` is only used to label the error.
    pub fn ordered(&self, skeleton: &Skeleton, frame: usize) -> Result<Vec<DVec3>> {
        skeleton
            .bones()
            .iter()
            .map(|bone| {
                self.position(bone)
                    .ok_or_else(|| Error::missing_bone(frame, bone.as_str()))
            })
            .collect()
    }

    /// Check that every skeleton bone has a position (extra entries are fine)
    pub fn validate(&self, skeleton: &Skeleton, frame: usize) -> Result<()> {
        match skeleton.bones().iter().find(|bone| !self.positions.contains_key(*bone)) {
            Some(bone) => Err(Error::missing_bone(frame, bone.as_str())),
            None => Ok(()),
        }
    }

    fn same_bones(&self, other: &Pose) -> bool {
        self.positions.len() == other.positions.len()
            && self.positions.keys().all(|k| other.positions.contains_key(k))
    }
}

impl<K: Into<String>> FromIterator<(K, DVec3)> for Pose {
    fn from_iter<T: IntoIterator<Item = (K, DVec3)>>(iter: T) -> Self {
        Pose {
            positions: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered pose sequence sharing one skeleton; frame 0 is the rest pose
///
/// Construction validates the sequence, so a `RawAnimation` is always
/// non-empty and every pose covers every skeleton bone with the same bone set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawAnimation {
    skeleton: Arc<Skeleton>,
    poses: Vec<Pose>,
}

impl RawAnimation {
    pub fn new(poses: Vec<Pose>, skeleton: Arc<Skeleton>) -> Result<Self> {
        let Some(rest) = poses.first() else {
            return Err(Error::EmptySequence);
        };

        rest.validate(&skeleton, 0)?;
        for (frame, pose) in poses.iter().enumerate().skip(1) {
            if !pose.same_bones(rest) {
                pose.validate(&skeleton, frame)?;
                return Err(Error::InconsistentPose {
                    frame,
                    source: PoseError::BoneSetMismatch {
                        expected: rest.len(),
                        found: pose.len(),
                    },
                });
            }
        }

        Ok(Self { skeleton, poses })
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Frame 0
    pub fn rest(&self) -> &Pose {
        &self.poses[0]
    }

    /// Number of frames including the rest frame
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Apply `f` to every position of every frame
    ///
    /// Used by callers for coordinate-convention fixes (axis swaps) before
    /// conversion; the bone sets are untouched so the invariants still hold.
    pub fn map_positions(mut self, f: impl Fn(DVec3) -> DVec3) -> Self {
        for pose in &mut self.poses {
            for pos in pose.positions.values_mut() {
                *pos = f(*pos);
            }
        }
        self
    }
}

/// Wire form of [`RawAnimation`], validated on the way in
#[derive(Deserialize)]
struct RawAnimationDef {
    skeleton: Skeleton,
    poses: Vec<Pose>,
}

impl<'de> Deserialize<'de> for RawAnimation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let def = RawAnimationDef::deserialize(deserializer)?;
        RawAnimation::new(def.poses, Arc::new(def.skeleton)).map_err(serde::de::Error::custom)
    }
}

/// Root-normalized poses and the extracted root track
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Poses with the root moved to the origin
    pub poses: Vec<Pose>,
    /// One root position per input pose
    pub translations: Vec<DVec3>,
}

/// Move every pose so its root sits at the origin
///
/// `translations[i]` is frame `i`'s root position (relative to frame 0's
/// root with [`TranslationMode::RelativeToRest`]). Poses without a root entry
/// fail with [`Error::InconsistentPose`]. The input is not modified.
pub fn normalize(poses: &[Pose], root: &str, mode: TranslationMode) -> Result<Normalized> {
    let mut normalized = Vec::with_capacity(poses.len());
    let mut translations = Vec::with_capacity(poses.len());

    for (frame, pose) in poses.iter().enumerate() {
        let root_position = pose
            .position(root)
            .ok_or_else(|| Error::missing_bone(frame, root))?;
        normalized.push(pose.translated(-root_position));
        translations.push(root_position);
    }

    if mode == TranslationMode::RelativeToRest {
        let origin = translations.first().copied().unwrap_or(DVec3::ZERO);
        for t in &mut translations {
            *t -= origin;
        }
    }

    Ok(Normalized {
        poses: normalized,
        translations,
    })
}
