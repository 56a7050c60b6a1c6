//! Quaternion sign stabilization
//!
//! `q` and `-q` are the same rotation but interpolate along different paths.
//! Frames are solved independently, so consecutive frames may disagree in
//! sign; this pass negates a bone's rotation whenever it points away from the
//! (already stabilized) previous frame. It must run strictly left to right.

use crate::solver::RotationFrame;

/// Flip signs in place so consecutive rotations of each bone have a
/// non-negative dot product; returns the number of flipped rotations
///
/// Running it again on its own output flips nothing.
pub fn stabilize(frames: &mut [RotationFrame]) -> usize {
    let mut flips = 0;

    for i in 1..frames.len() {
        let (done, pending) = frames.split_at_mut(i);
        let previous = &done[i - 1];
        let current = &mut pending[0];

        for (prev, next) in previous
            .rotations()
            .iter()
            .zip(current.rotations_mut().iter_mut())
        {
            if prev.dot(*next) < 0.0 {
                *next = -*next;
                flips += 1;
            }
        }
    }

    if flips > 0 {
        tracing::debug!(flips, frames = frames.len(), "stabilized quaternion signs");
    }
    flips
}
