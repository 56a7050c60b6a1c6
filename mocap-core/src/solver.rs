//! Hierarchical rotation solver
//!
//! For every target frame the skeleton is walked in hierarchical order while
//! threading each bone's cumulative rotation `P` down to its children:
//!
//! 1. predict where the bone would be if only its ancestors moved: `P * rest`
//! 2. find the shortest arc `W` from the prediction to the target vector
//! 3. record `W` expressed in the parent's frame (`P⁻¹ W P`)
//! 4. hand `P * local` to the children
//!
//! Frames are independent of each other, so a sequence can be solved on the
//! rayon pool; sign stabilization is a separate sequential pass
//! (see [`crate::stabilize`]).

use glam::{DQuat, DVec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{BoneVectors, SolverConfig};
use crate::error::{DegenerateVector, Result};
use crate::math::{shortest_arc, to_local};
use crate::pose::Pose;
use crate::skeleton::Skeleton;

/// Local rotation of every bone for one frame, in hierarchical order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotationFrame {
    rotations: Vec<DQuat>,
}

impl RotationFrame {
    /// Wrap rotations already laid out in a skeleton's hierarchical order
    pub fn from_rotations(rotations: Vec<DQuat>) -> Self {
        Self { rotations }
    }

    pub fn rotations(&self) -> &[DQuat] {
        &self.rotations
    }

    pub(crate) fn rotations_mut(&mut self) -> &mut [DQuat] {
        &mut self.rotations
    }

    /// Rotation of the bone at `index` in hierarchical order
    pub fn get(&self, index: usize) -> Option<DQuat> {
        self.rotations.get(index).copied()
    }

    /// Rotation of `bone`, looked up through `skeleton`
    pub fn rotation(&self, skeleton: &Skeleton, bone: &str) -> Option<DQuat> {
        self.get(skeleton.index_of(bone)?)
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }
}

/// Solver output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedFrame {
    pub rotations: RotationFrame,
    /// Bones whose alignment fell back to a substitute rotation
    pub degenerate: Vec<DegenerateVector>,
}

/// Per-frame rotation solver bound to one skeleton
#[derive(Debug, Clone, Copy)]
pub struct Solver<'a> {
    skeleton: &'a Skeleton,
    config: &'a SolverConfig,
}

impl<'a> Solver<'a> {
    pub fn new(skeleton: &'a Skeleton, config: &'a SolverConfig) -> Self {
        Self { skeleton, config }
    }

    /// Bone vectors used for alignment, from positions in hierarchical order
    pub fn bone_vectors(&self, positions: &[DVec3]) -> Vec<DVec3> {
        match self.config.bone_vectors {
            BoneVectors::Absolute => positions.to_vec(),
            BoneVectors::ParentOffset => positions
                .iter()
                .enumerate()
                .map(|(i, &pos)| match self.skeleton.parent_index(i) {
                    Some(parent) => pos - positions[parent],
                    None => pos,
                })
                .collect(),
        }
    }

    /// Solve one frame from bone vectors laid out in hierarchical order
    ///
    /// `frame` only labels degenerate-vector reports.
    pub fn solve_vectors(&self, rest: &[DVec3], target: &[DVec3], frame: usize) -> SolvedFrame {
        let bones = self.skeleton.bones();
        debug_assert_eq!(rest.len(), bones.len());
        debug_assert_eq!(target.len(), bones.len());

        let mut rotations = Vec::with_capacity(bones.len());
        let mut cumulative: Vec<DQuat> = Vec::with_capacity(bones.len());
        let mut degenerate = Vec::new();

        for (i, bone) in bones.iter().enumerate() {
            let parent = self
                .skeleton
                .parent_index(i)
                .map_or(DQuat::IDENTITY, |p| cumulative[p]);

            let predicted = parent * rest[i];
            let arc = shortest_arc(predicted, target[i], self.config.epsilon);

            if let Some(kind) = arc.degenerate {
                tracing::warn!(frame, bone = %bone, %kind, "degenerate bone alignment, using fallback rotation");
                degenerate.push(DegenerateVector {
                    frame,
                    bone: bone.clone(),
                    kind,
                });
            }

            let local = to_local(parent, arc.rotation);
            rotations.push(local);
            cumulative.push((parent * local).normalize());
        }

        SolvedFrame {
            rotations: RotationFrame { rotations },
            degenerate,
        }
    }

    /// Solve one frame from two poses
    pub fn solve_pose(&self, rest: &Pose, target: &Pose, frame: usize) -> Result<SolvedFrame> {
        let rest = self.bone_vectors(&rest.ordered(self.skeleton, 0)?);
        let target = self.bone_vectors(&target.ordered(self.skeleton, frame)?);
        Ok(self.solve_vectors(&rest, &target, frame))
    }

    /// Solve every target pose against `rest`
    ///
    /// Targets are numbered from 1 (the rest pose is frame 0) in errors and
    /// degenerate reports. Output order always matches input order, and a
    /// missing bone is reported for the lowest offending frame.
    pub fn solve_poses(&self, rest: &Pose, targets: &[Pose]) -> Result<Vec<SolvedFrame>> {
        let rest = self.bone_vectors(&rest.ordered(self.skeleton, 0)?);

        // Validate in order before fanning out
        let targets: Vec<Vec<DVec3>> = targets
            .iter()
            .enumerate()
            .map(|(i, target)| Ok(self.bone_vectors(&target.ordered(self.skeleton, i + 1)?)))
            .collect::<Result<_>>()?;

        let solve_one = |(i, target): (usize, &Vec<DVec3>)| self.solve_vectors(&rest, target, i + 1);

        let frames = if self.config.parallel {
            targets.par_iter().enumerate().map(solve_one).collect()
        } else {
            targets.iter().enumerate().map(solve_one).collect()
        };
        Ok(frames)
    }
}

/// Local rotations taking `rest` to `target`, with default settings
///
/// Degenerate alignments fall back as described in [`crate::math::shortest_arc`]
/// and are logged; use [`Solver`] to collect them.
pub fn solve_frame(rest: &Pose, target: &Pose, skeleton: &Skeleton) -> Result<RotationFrame> {
    let config = SolverConfig::default();
    Ok(Solver::new(skeleton, &config)
        .solve_pose(rest, target, 1)?
        .rotations)
}

/// [`solve_frame`] applied to every target pose, in order
pub fn solve_sequence(
    rest: &Pose,
    targets: &[Pose],
    skeleton: &Skeleton,
) -> Result<Vec<RotationFrame>> {
    let config = SolverConfig::default();
    Ok(Solver::new(skeleton, &config)
        .solve_poses(rest, targets)?
        .into_iter()
        .map(|solved| solved.rotations)
        .collect())
}
