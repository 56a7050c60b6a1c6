//! End-to-end tests of the raw positions → animation pipeline

use std::sync::Arc;

use glam::{DQuat, DVec3};
use hashbrown::HashMap;
use mocap_core::math::angular_distance;
use mocap_core::{
    Action, Animation, Pose, RawAnimation, RotationFrame, Skeleton, SolverConfig, TranslationMode,
    convert, normalize, schedule_groups, solve_frame, stabilize,
};

const TOLERANCE: f64 = 1e-4;

// ============================================================================
// Fixtures
// ============================================================================

/// HDM05 rest pose with every joint spread out in the XY plane
fn planar_hdm05_rest() -> Pose {
    Skeleton::hdm05()
        .bones()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let pos = if i == 0 {
                DVec3::ZERO
            } else {
                let angle = i as f64 * 0.37;
                DVec3::new(angle.cos(), angle.sin(), 0.0) * (1.0 + i as f64 * 0.1)
            };
            (name.clone(), pos)
        })
        .collect()
}

fn rotated(pose: &Pose, q: DQuat, offset: DVec3) -> Pose {
    pose.iter().map(|(name, pos)| (name.to_string(), q * pos + offset)).collect()
}

fn world_rotations(skeleton: &Skeleton, frame: &RotationFrame) -> Vec<DQuat> {
    let mut world: Vec<DQuat> = Vec::with_capacity(skeleton.len());
    for (i, local) in frame.rotations().iter().enumerate() {
        let parent = skeleton.parent_index(i).map_or(DQuat::IDENTITY, |p| world[p]);
        world.push(parent * *local);
    }
    world
}

fn chain() -> Arc<Skeleton> {
    Arc::new(Skeleton::new([("root", vec!["child"])]).unwrap())
}

fn chain_pose(root: DVec3, child: DVec3) -> Pose {
    [("root", root), ("child", child)].into_iter().collect()
}

// ============================================================================
// Skeleton
// ============================================================================

#[test]
fn test_hierarchical_order_puts_ancestors_first() {
    let custom = Skeleton::new([
        ("root", vec!["c", "a"]),
        ("a", vec!["a1", "a2"]),
        ("a2", vec!["a21"]),
        ("c", vec!["c1"]),
    ])
    .unwrap();
    let hdm05 = Skeleton::hdm05();

    for skeleton in [hdm05.as_ref(), &custom] {
        let order = skeleton.hierarchical_order();
        assert_eq!(order[0], skeleton.root());
        assert_eq!(order.len(), skeleton.len());

        for (i, bone) in order.iter().enumerate() {
            let mut ancestor = skeleton.parent_of(bone);
            while let Some(parent) = ancestor {
                let pos = skeleton.index_of(parent).unwrap();
                assert!(pos < i, "{parent} must precede {bone}");
                ancestor = skeleton.parent_of(parent);
            }
        }

        // Deterministic across calls
        assert_eq!(skeleton.hierarchical_order(), order);
    }
}

// ============================================================================
// Solver
// ============================================================================

#[test]
fn test_rest_against_rest_is_identity() {
    let skeleton = Skeleton::hdm05();
    let rest = planar_hdm05_rest();
    let frame = solve_frame(&rest, &rest, &skeleton).unwrap();
    for q in frame.rotations() {
        assert!(angular_distance(*q, DQuat::IDENTITY) < TOLERANCE);
    }
}

#[test]
fn test_known_rotation_is_recovered_for_every_bone() {
    let skeleton = Skeleton::hdm05();
    let rest = planar_hdm05_rest();
    let rotations: Vec<DQuat> = (1..6).map(|i| DQuat::from_rotation_z(0.25 * i as f64)).collect();

    let mut poses = vec![rest.clone()];
    poses.extend(rotated_frames(&rest, &rotations));
    let raw = RawAnimation::new(poses, skeleton.clone()).unwrap();
    let animation = convert(&raw, &SolverConfig::default()).unwrap();

    assert_eq!(animation.len(), rotations.len());
    assert!(animation.degenerate().is_empty());
    for (frame, known) in animation.frames().iter().zip(&rotations) {
        for (bone, world) in skeleton.bones().iter().zip(world_rotations(&skeleton, frame)).skip(1) {
            let err = angular_distance(world, *known);
            assert!(err < TOLERANCE, "{bone}: off by {err} rad");
        }
    }
}

/// Off-plane rigid rotation: each bone is represented by one direction, so the
/// solver recovers every direction exactly but not the twist about it. The
/// world rotations match the known one only up to that twist.
#[test]
fn test_off_axis_rotation_recovers_directions_not_twist() {
    let skeleton = Skeleton::hdm05();
    let rest = planar_hdm05_rest();
    let known = DQuat::from_axis_angle(DVec3::ONE.normalize(), 0.8);
    let target = rotated(&rest, known, DVec3::ZERO);

    let frame = solve_frame(&rest, &target, &skeleton).unwrap();
    let world = world_rotations(&skeleton, &frame);

    let mut max_twist: f64 = 0.0;
    for (i, bone) in skeleton.bones().iter().enumerate().skip(1) {
        let rest_dir = rest.position(bone).unwrap().normalize();
        let target_dir = target.position(bone).unwrap().normalize();
        assert!(
            (world[i] * rest_dir).abs_diff_eq(target_dir, 1e-9),
            "{bone}: direction not recovered"
        );
        max_twist = max_twist.max(angular_distance(world[i], known));
    }
    assert!(max_twist > 1e-3, "twist unexpectedly recovered: {max_twist}");
}

fn rotated_frames<'a>(rest: &'a Pose, rotations: &'a [DQuat]) -> impl Iterator<Item = Pose> + 'a {
    rotations.iter().map(move |q| rotated(rest, *q, DVec3::ZERO))
}

#[test]
fn test_quarter_turn_scenario() {
    let raw = RawAnimation::new(
        vec![
            chain_pose(DVec3::ZERO, DVec3::new(0.0, 1.0, 0.0)),
            chain_pose(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)),
        ],
        chain(),
    )
    .unwrap();
    let animation = convert(&raw, &SolverConfig::default()).unwrap();

    let root = animation.rotation(0, "root").unwrap();
    let child = animation.rotation(0, "child").unwrap();
    assert!(angular_distance(root, DQuat::IDENTITY) < TOLERANCE);

    let expected = DQuat::from_rotation_z(-std::f64::consts::FRAC_PI_2);
    assert!(angular_distance(child, expected) < TOLERANCE, "{child:?}");
    assert!(!animation.has_movement());
}

// ============================================================================
// Normalization and movement
// ============================================================================

#[test]
fn test_normalize_zeroes_root_and_keeps_translations() {
    let rest = planar_hdm05_rest();
    let poses: Vec<Pose> = (0..4)
        .map(|i| rotated(&rest, DQuat::IDENTITY, DVec3::new(i as f64, 0.5, -(i as f64))))
        .collect();

    let out = normalize(&poses, "root", TranslationMode::Absolute).unwrap();
    for (i, pose) in out.poses.iter().enumerate() {
        assert_eq!(pose.position("root"), Some(DVec3::ZERO));
        assert_eq!(out.translations[i], poses[i].position("root").unwrap());
    }
}

#[test]
fn test_translated_root_scenario() {
    let raw = RawAnimation::new(
        vec![
            chain_pose(DVec3::ZERO, DVec3::Y),
            chain_pose(DVec3::new(2.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 0.0)),
        ],
        chain(),
    )
    .unwrap();
    let animation = convert(&raw, &SolverConfig::default()).unwrap();

    for bone in ["root", "child"] {
        let q = animation.rotation(0, bone).unwrap();
        assert!(angular_distance(q, DQuat::IDENTITY) < TOLERANCE, "{bone}");
    }
    assert_eq!(animation.movement(), Some(&[DVec3::new(2.0, 0.0, 0.0)][..]));
}

#[test]
fn test_single_frame_boundary() {
    let raw = RawAnimation::new(vec![planar_hdm05_rest()], Skeleton::hdm05()).unwrap();
    let animation = convert(&raw, &SolverConfig::default()).unwrap();
    assert!(animation.frames().is_empty());
    assert_eq!(animation.movement(), None);
    assert_eq!(animation.rest().len(), 31);
}

// ============================================================================
// Stabilization
// ============================================================================

#[test]
fn test_converted_sequence_is_continuous_and_stable() {
    let skeleton = chain();
    let swing = |degrees: f64| {
        chain_pose(DVec3::ZERO, DQuat::from_rotation_z(degrees.to_radians()) * DVec3::Y)
    };
    let poses = [0.0, 170.0, 190.0, 170.0, 200.0, 160.0].map(swing).to_vec();
    let raw = RawAnimation::new(poses, skeleton).unwrap();
    let animation = convert(&raw, &SolverConfig::default()).unwrap();

    for pair in animation.frames().windows(2) {
        for (a, b) in pair[0].rotations().iter().zip(pair[1].rotations()) {
            assert!(a.dot(*b) >= 0.0);
        }
    }

    let mut frames = animation.frames().to_vec();
    assert_eq!(stabilize(&mut frames), 0);
    assert_eq!(frames, animation.frames());
}

// ============================================================================
// Serialized input and scheduling
// ============================================================================

#[test]
fn test_json_input_to_timeline() {
    let json = r#"{
        "skeleton": {"root": "hips", "relations": {"hips": ["spine", "leg"], "spine": ["head"]}},
        "poses": [
            {"hips": [0, 1, 0], "spine": [0, 2, 0], "head": [0, 3, 0], "leg": [0, 0, 0]},
            {"hips": [1, 1, 0], "spine": [1, 2, 0], "head": [2, 3, 0], "leg": [1, 0, 0]},
            {"hips": [2, 1, 0], "spine": [2, 2, 0], "head": [3, 2, 0], "leg": [2, 0, 0]}
        ]
    }"#;
    let raw: RawAnimation = serde_json::from_str(json).unwrap();
    let animation: Arc<Animation> = Arc::new(convert(&raw, &SolverConfig::default()).unwrap());

    assert_eq!(animation.bone_order()[0], "hips");
    assert_eq!(
        animation.movement(),
        Some(&[DVec3::new(1.0, 1.0, 0.0), DVec3::new(2.0, 1.0, 0.0)][..])
    );

    let mut action = Action::new("lean", animation.clone());
    action.use_movement = true;
    let timeline = schedule_groups(&[vec![action]], &HashMap::new(), &[]);

    // 3 bones keyed at the base frame plus 2 source frames, 2 root locations
    assert_eq!(timeline.keyframes.len(), 3 * 3 + 2);
    assert_eq!(timeline.end, 2);
    assert!(timeline.collisions.is_empty());
}
