//! Vector alignment helpers
//!
//! Thin layer over glam's double-precision types. The shortest-arc helper is
//! written out by hand (instead of `DQuat::from_rotation_arc`) so that the
//! degenerate inputs are reported back to the caller.

use glam::{DQuat, DVec3};

use crate::error::DegenerateKind;

/// Result of aligning one vector onto another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    /// Rotation taking `from` onto `to` (identity or a fallback when degenerate)
    pub rotation: DQuat,
    /// Set when the fallback path was taken
    pub degenerate: Option<DegenerateKind>,
}

impl Arc {
    const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        degenerate: None,
    };
}

/// Minimal-angle rotation taking direction `from` onto direction `to`
///
/// Neither vector needs to be normalized. Degenerate cases:
/// - both shorter than `epsilon`: identity, not reported
/// - exactly one shorter than `epsilon`: identity, [`DegenerateKind::ZeroLength`]
/// - opposite directions: half turn about an axis perpendicular to `from`,
///   [`DegenerateKind::AntiParallel`]
pub fn shortest_arc(from: DVec3, to: DVec3, epsilon: f64) -> Arc {
    let from_len = from.length();
    let to_len = to.length();

    match (from_len < epsilon, to_len < epsilon) {
        (true, true) => return Arc::IDENTITY,
        (true, false) | (false, true) => {
            return Arc {
                rotation: DQuat::IDENTITY,
                degenerate: Some(DegenerateKind::ZeroLength),
            };
        }
        (false, false) => {}
    }

    let from = from / from_len;
    let to = to / to_len;
    let dot = from.dot(to);

    if dot >= 1.0 - epsilon {
        return Arc::IDENTITY;
    }

    if dot <= -1.0 + epsilon {
        let axis = from.any_orthonormal_vector();
        return Arc {
            rotation: DQuat::from_axis_angle(axis, std::f64::consts::PI),
            degenerate: Some(DegenerateKind::AntiParallel),
        };
    }

    // Half-way quaternion: (from x to, 1 + from . to), normalized
    let axis = from.cross(to);
    let rotation = DQuat::from_xyzw(axis.x, axis.y, axis.z, 1.0 + dot).normalize();
    Arc {
        rotation,
        degenerate: None,
    }
}

/// Re-express a world-space rotation in the frame described by `parent`
///
/// Returns `parent⁻¹ · world · parent`, so that `parent * local == world * parent`.
pub fn to_local(parent: DQuat, world: DQuat) -> DQuat {
    (parent.inverse() * world * parent).normalize()
}

/// Angle in radians between two rotations, ignoring quaternion sign
pub fn angular_distance(a: DQuat, b: DQuat) -> f64 {
    let dot = a.dot(b).abs().min(1.0);
    2.0 * dot.acos()
}
