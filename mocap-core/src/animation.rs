//! Assembled animation and the raw → rotation conversion pipeline

use glam::{DQuat, DVec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::error::{AnimationError, DegenerateVector, Error, Result};
use crate::math::shortest_arc;
use crate::pose::{Normalized, Pose, RawAnimation, normalize};
use crate::skeleton::Skeleton;
use crate::solver::{RotationFrame, Solver};
use crate::stabilize::stabilize;

/// Rest pose, per-frame local rotations and optional root movement
///
/// Built once per conversion and never mutated afterwards. Rotation frame
/// `i` corresponds to raw frame `i + 1`; the rest frame itself has no entry.
/// Deserialization checks that every part covers the same bones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AnimationDef")]
pub struct Animation {
    /// Bone names in the order used by `rest` and every rotation frame
    bone_order: Vec<String>,

    /// Root-normalized rest positions, one per bone
    rest: Vec<DVec3>,

    /// Stabilized local rotations, one frame per non-rest raw frame
    frames: Vec<RotationFrame>,

    /// Root translation per rotation frame, absent when the root never moves
    #[serde(skip_serializing_if = "Option::is_none")]
    movement: Option<Vec<DVec3>>,

    /// Alignments that fell back to a substitute rotation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    degenerate: Vec<DegenerateVector>,

    // ========================================================================
    // Lookup cache (derived from bone_order)
    // ========================================================================
    #[serde(skip)]
    bone_index: HashMap<String, usize>,
}

/// Wire form of [`Animation`], validated on the way in
#[derive(Deserialize)]
struct AnimationDef {
    bone_order: Vec<String>,
    rest: Vec<DVec3>,
    frames: Vec<RotationFrame>,
    #[serde(default)]
    movement: Option<Vec<DVec3>>,
    #[serde(default)]
    degenerate: Vec<DegenerateVector>,
}

impl TryFrom<AnimationDef> for Animation {
    type Error = AnimationError;

    fn try_from(def: AnimationDef) -> std::result::Result<Self, Self::Error> {
        Animation::from_parts(def.bone_order, def.rest, def.frames, def.movement, def.degenerate)
    }
}

impl PartialEq for Animation {
    fn eq(&self, other: &Self) -> bool {
        self.bone_order == other.bone_order
            && self.rest == other.rest
            && self.frames == other.frames
            && self.movement == other.movement
            && self.degenerate == other.degenerate
    }
}

impl Animation {
    /// Combine the pipeline stages into an animation
    ///
    /// `normalized` covers every raw frame (rest included); `frames` covers the
    /// raw frames after the rest frame and must already be stabilized. The
    /// movement track keeps the translations of the solved frames and is
    /// dropped entirely when all of them are zero.
    pub fn assemble(
        skeleton: &Skeleton,
        normalized: &Normalized,
        frames: Vec<RotationFrame>,
        degenerate: Vec<DegenerateVector>,
    ) -> Result<Self> {
        let rest_pose = normalized.poses.first().ok_or(Error::EmptySequence)?;
        let rest = rest_pose.ordered(skeleton, 0)?;

        let translations = normalized.translations.get(1..).unwrap_or(&[]);
        if translations.len() != frames.len() {
            return Err(AnimationError::MovementLength {
                expected: frames.len(),
                found: translations.len(),
            }
            .into());
        }

        let movement = translations
            .iter()
            .any(|t| *t != DVec3::ZERO)
            .then(|| translations.to_vec());

        Self::from_parts(skeleton.bones().to_vec(), rest, frames, movement, degenerate)
            .map_err(Error::from)
    }

    /// Build an animation from its parts, checking that they agree
    pub fn from_parts(
        bone_order: Vec<String>,
        rest: Vec<DVec3>,
        frames: Vec<RotationFrame>,
        movement: Option<Vec<DVec3>>,
        degenerate: Vec<DegenerateVector>,
    ) -> std::result::Result<Self, AnimationError> {
        let bones = bone_order.len();

        let mut index = HashMap::with_capacity(bones);
        for (i, name) in bone_order.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(AnimationError::DuplicateBone(name.clone()));
            }
        }

        if rest.len() != bones {
            return Err(AnimationError::RestLength {
                expected: bones,
                found: rest.len(),
            });
        }
        if let Some((frame, rotations)) = frames.iter().enumerate().find(|(_, f)| f.len() != bones) {
            return Err(AnimationError::FrameLength {
                frame,
                expected: bones,
                found: rotations.len(),
            });
        }
        if let Some(track) = movement.as_ref().filter(|t| t.len() != frames.len()) {
            return Err(AnimationError::MovementLength {
                expected: frames.len(),
                found: track.len(),
            });
        }

        Ok(Self {
            bone_order,
            rest,
            frames,
            movement,
            degenerate,
            bone_index: index,
        })
    }

    /// Bone names in hierarchical order
    pub fn bone_order(&self) -> &[String] {
        &self.bone_order
    }

    /// Rest positions in [`Animation::bone_order`]
    pub fn rest(&self) -> &[DVec3] {
        &self.rest
    }

    /// Rest positions keyed by bone name
    pub fn rest_pose(&self) -> Pose {
        self.bone_order
            .iter()
            .cloned()
            .zip(self.rest.iter().copied())
            .collect()
    }

    pub fn frames(&self) -> &[RotationFrame] {
        &self.frames
    }

    /// Root translation per rotation frame, if the root moves at all
    pub fn movement(&self) -> Option<&[DVec3]> {
        self.movement.as_deref()
    }

    pub fn has_movement(&self) -> bool {
        self.movement.is_some()
    }

    pub fn degenerate(&self) -> &[DegenerateVector] {
        &self.degenerate
    }

    /// Number of rotation frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Position of `bone` in [`Animation::bone_order`]
    pub fn bone_index(&self, bone: &str) -> Option<usize> {
        self.bone_index.get(bone).copied()
    }

    /// Local rotation of `bone` at rotation frame `frame`
    pub fn rotation(&self, frame: usize, bone: &str) -> Option<DQuat> {
        let index = self.bone_index(bone)?;
        self.frames.get(frame)?.get(index)
    }

    /// Per-bone shortest arc from `base`'s rest vectors to this animation's
    ///
    /// Lets an animation recorded on a differently proportioned performer be
    /// replayed on `base`'s skeleton. Bones missing from `base` get identity.
    pub fn rest_difference(&self, base: &Animation) -> Vec<DQuat> {
        self.bone_order
            .iter()
            .zip(&self.rest)
            .map(|(bone, &own)| {
                base.bone_index(bone)
                    .and_then(|i| base.rest.get(i))
                    .map(|&rest| shortest_arc(rest, own, f64::EPSILON).rotation)
                    .unwrap_or(DQuat::IDENTITY)
            })
            .collect()
    }
}

/// Convert a raw position sequence into an [`Animation`]
///
/// Runs normalize → solve → stabilize → assemble. Structural problems abort
/// the conversion; degenerate alignments are collected on the result.
pub fn convert(raw: &RawAnimation, config: &SolverConfig) -> Result<Animation> {
    let skeleton = raw.skeleton();
    let _span = tracing::debug_span!("convert", frames = raw.len(), bones = skeleton.len()).entered();

    let normalized = normalize(raw.poses(), skeleton.root(), config.translations)?;
    let (rest, targets) = normalized
        .poses
        .split_first()
        .ok_or(Error::EmptySequence)?;

    let solved = Solver::new(skeleton, config).solve_poses(rest, targets)?;

    let mut degenerate = Vec::new();
    let mut frames = Vec::with_capacity(solved.len());
    for frame in solved {
        degenerate.extend(frame.degenerate);
        frames.push(frame.rotations);
    }

    let flips = stabilize(&mut frames);
    tracing::debug!(
        frames = frames.len(),
        flips,
        degenerate = degenerate.len(),
        "rotation frames solved"
    );

    Animation::assemble(skeleton, &normalized, frames, degenerate)
}
