//! Keyframe scheduling of converted animations
//!
//! Actions play a (range of an) [`Animation`] on top of a base pose,
//! restricted to a subset of body parts. Actions are arranged in groups:
//! actions in one group start on the same frame, groups play one after the
//! other. The result is a flat list of keyframes for whatever host applies
//! them.

use glam::{DQuat, DVec3};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::animation::Animation;

/// Named set of bones that can be switched off per action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    pub name: String,
    pub bones: Vec<String>,
}

impl BodyPart {
    pub fn new<I, S>(name: impl Into<String>, bones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            bones: bones.into_iter().map(Into::into).collect(),
        }
    }
}

/// Source frame window of an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    /// Exclusive end, the animation length when unset
    #[serde(default)]
    pub end: Option<usize>,
}

impl Range {
    /// Clamp to an animation of `len` frames, keeping `start <= end`
    pub fn resolve(&self, len: usize) -> std::ops::Range<usize> {
        let end = self.end.unwrap_or(len).min(len);
        self.start.min(end)..end
    }
}

/// What happens after an action's last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    /// Return to the base pose this many frames after the last frame
    pub reset: Option<u32>,
    /// Gap between the last keyframe and the next free frame (at least 1)
    pub length: u32,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            reset: None,
            length: 1,
        }
    }
}

/// One animation placed on the timeline
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub animation: Arc<Animation>,
    pub range: Range,
    /// Timeline frames per source frame (at least 1)
    pub slowdown: u32,
    /// Key the root location from the movement track
    pub use_movement: bool,
    /// Names of body parts this action leaves alone
    pub disabled_parts: HashSet<String>,
    pub transition: Transition,
}

impl Action {
    /// Full-range action at normal speed with every body part enabled
    pub fn new(name: impl Into<String>, animation: Arc<Animation>) -> Self {
        Self {
            name: name.into(),
            animation,
            range: Range::default(),
            slowdown: 1,
            use_movement: false,
            disabled_parts: HashSet::new(),
            transition: Transition::default(),
        }
    }

    /// Bones that receive rotation keyframes, in hierarchical order
    ///
    /// The root never does; its motion is the movement track.
    pub fn enabled_bones(&self, parts: &[BodyPart]) -> Vec<&str> {
        let disabled: HashSet<&str> = parts
            .iter()
            .filter(|part| self.disabled_parts.contains(&part.name))
            .flat_map(|part| part.bones.iter().map(String::as_str))
            .collect();

        self.animation
            .bone_order()
            .iter()
            .skip(1)
            .map(String::as_str)
            .filter(|bone| !disabled.contains(bone))
            .collect()
    }

    fn root(&self) -> Option<&str> {
        self.animation.bone_order().first().map(String::as_str)
    }

    fn keys_movement(&self) -> bool {
        self.use_movement && self.animation.has_movement()
    }

    /// Every bone this action writes a keyframe for
    fn driven_bones(&self, parts: &[BodyPart]) -> Vec<&str> {
        let mut bones = self.enabled_bones(parts);
        if self.keys_movement() {
            bones.extend(self.root());
        }
        bones
    }
}

/// Animated property of a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Rotation(DQuat),
    Location(DVec3),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: u32,
    pub bone: String,
    pub channel: Channel,
}

/// Two actions of one group driving the same bone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub group: usize,
    pub bone: String,
    pub first: String,
    pub second: String,
}

/// Scheduled keyframes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub keyframes: Vec<Keyframe>,
    /// First free frame after everything scheduled so far
    pub end: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<Collision>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key `action` starting at `frame_start`, returning the next free frame
    ///
    /// `base` holds the base-pose rotation per bone (identity when absent);
    /// animation rotations are applied on top of it. Frame numbers saturate
    /// at `u32::MAX`.
    pub fn schedule_action(
        &mut self,
        action: &Action,
        base: &HashMap<String, DQuat>,
        parts: &[BodyPart],
        frame_start: u32,
    ) -> u32 {
        let animation = &action.animation;
        let slowdown = action.slowdown.max(1);
        let bones: Vec<(&str, usize, DQuat)> = action
            .enabled_bones(parts)
            .into_iter()
            .filter_map(|bone| {
                let index = animation.bone_index(bone)?;
                let base = base.get(bone).copied().unwrap_or(DQuat::IDENTITY);
                Some((bone, index, base))
            })
            .collect();

        self.key_base(&bones, frame_start);

        let movement = animation.movement().filter(|_| action.use_movement);
        let root = action.root();

        let range = action.range.resolve(animation.len());
        let mut last_frame = frame_start;
        for (i, source) in range.enumerate() {
            let offset = u32::try_from(i).unwrap_or(u32::MAX).saturating_mul(slowdown);
            last_frame = frame_start.saturating_add(offset);

            if let Some((&location, root)) = movement.and_then(|track| track.get(source)).zip(root) {
                self.push(last_frame, root, Channel::Location(location));
            }

            let frame = &animation.frames()[source];
            for &(bone, index, base) in &bones {
                let rotation = frame.get(index).unwrap_or(DQuat::IDENTITY);
                self.push(last_frame, bone, Channel::Rotation(base * rotation));
            }
        }

        if let Some(reset) = action.transition.reset {
            last_frame = last_frame.saturating_add(reset);
            self.key_base(&bones, last_frame);
        }

        let next = last_frame.saturating_add(action.transition.length.max(1));
        tracing::debug!(
            action = %action.name,
            start = frame_start,
            next,
            bones = bones.len(),
            "scheduled action"
        );
        self.end = self.end.max(next);
        next
    }

    fn key_base(&mut self, bones: &[(&str, usize, DQuat)], frame: u32) {
        for &(bone, _, base) in bones {
            self.push(frame, bone, Channel::Rotation(base));
        }
    }

    fn push(&mut self, frame: u32, bone: &str, channel: Channel) {
        self.keyframes.push(Keyframe {
            frame,
            bone: bone.to_string(),
            channel,
        });
    }

    /// Record every bone driven by more than one action of `group`
    fn check_collisions(&mut self, index: usize, group: &[Action], parts: &[BodyPart]) {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for action in group {
            for bone in action.driven_bones(parts) {
                match owners.get(bone) {
                    Some(&first) => {
                        tracing::warn!(
                            group = index,
                            bone,
                            first,
                            second = %action.name,
                            "actions in one group drive the same bone"
                        );
                        self.collisions.push(Collision {
                            group: index,
                            bone: bone.to_string(),
                            first: first.to_string(),
                            second: action.name.clone(),
                        });
                    }
                    None => {
                        owners.insert(bone, &action.name);
                    }
                }
            }
        }
    }
}

/// Schedule action groups back to back, starting at frame 0
///
/// Actions of one group start together; the next group starts at the latest
/// end frame of the previous one. Colliding actions are still scheduled,
/// the later keyframes win in the host.
pub fn schedule_groups(
    groups: &[Vec<Action>],
    base: &HashMap<String, DQuat>,
    parts: &[BodyPart],
) -> Timeline {
    let mut timeline = Timeline::new();
    let mut start = 0;

    for (index, group) in groups.iter().enumerate() {
        timeline.check_collisions(index, group, parts);

        let mut group_end = start;
        for action in group {
            group_end = group_end.max(timeline.schedule_action(action, base, parts, start));
        }
        start = group_end;
    }

    timeline.end = start;
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::convert;
    use crate::pose::{Pose, RawAnimation};
    use crate::skeleton::Skeleton;

    /// root -> arm -> hand, root -> leg; the arm swings about Z a bit more every frame
    fn animation(frames: usize, moving: bool) -> Arc<Animation> {
        let skeleton = Arc::new(
            Skeleton::new([("root", vec!["arm", "leg"]), ("arm", vec!["hand"])]).unwrap(),
        );
        let poses: Vec<Pose> = (0..=frames)
            .map(|i| {
                let offset = if moving { DVec3::new(i as f64, 0.0, 0.0) } else { DVec3::ZERO };
                let swing = DQuat::from_rotation_z(0.1 * i as f64);
                [
                    ("root", offset),
                    ("arm", offset + swing * DVec3::Y),
                    ("hand", offset + swing * DVec3::new(0.0, 2.0, 0.0)),
                    ("leg", offset - DVec3::Y),
                ]
                .into_iter()
                .collect()
            })
            .collect();
        let raw = RawAnimation::new(poses, skeleton).unwrap();
        Arc::new(convert(&raw, &SolverConfig::default()).unwrap())
    }

    fn parts() -> Vec<BodyPart> {
        vec![
            BodyPart::new("arms", ["arm", "hand"]),
            BodyPart::new("legs", ["leg"]),
        ]
    }

    fn keys_at<'a>(timeline: &'a Timeline, frame: u32) -> Vec<&'a Keyframe> {
        timeline.keyframes.iter().filter(|k| k.frame == frame).collect()
    }

    #[test]
    fn test_range_resolve_clamps() {
        assert_eq!(Range::default().resolve(5), 0..5);
        assert_eq!(Range { start: 1, end: Some(3) }.resolve(5), 1..3);
        assert_eq!(Range { start: 0, end: Some(9) }.resolve(5), 0..5);
        assert_eq!(Range { start: 4, end: Some(2) }.resolve(5), 2..2);
        assert_eq!(Range { start: 7, end: None }.resolve(5), 5..5);
    }

    #[test]
    fn test_schedule_action_frames_and_end() {
        let mut action = Action::new("wave", animation(3, false));
        action.slowdown = 2;

        let mut timeline = Timeline::new();
        let next = timeline.schedule_action(&action, &HashMap::new(), &parts(), 10);

        // Source frames land on 10, 12, 14; transition length 1
        assert_eq!(next, 15);
        assert_eq!(timeline.end, 15);
        let frames: HashSet<u32> = timeline.keyframes.iter().map(|k| k.frame).collect();
        assert_eq!(frames, [10, 12, 14].into_iter().collect());

        // Base keys plus the first source frame share frame 10
        assert_eq!(keys_at(&timeline, 10).len(), 6);
        assert_eq!(keys_at(&timeline, 12).len(), 3);
        assert!(timeline.keyframes.iter().all(|k| k.bone != "root"));
    }

    #[test]
    fn test_rotations_are_applied_on_top_of_base() {
        let animation = animation(2, false);
        let action = Action::new("wave", animation.clone());
        let tilt = DQuat::from_rotation_x(0.3);
        let base: HashMap<String, DQuat> = [("arm".to_string(), tilt)].into_iter().collect();

        let mut timeline = Timeline::new();
        timeline.schedule_action(&action, &base, &parts(), 0);

        let arm: Vec<DQuat> = timeline
            .keyframes
            .iter()
            .filter(|k| k.bone == "arm")
            .map(|k| match k.channel {
                Channel::Rotation(q) => q,
                Channel::Location(_) => panic!("arm keyed with a location"),
            })
            .collect();

        assert_eq!(arm.len(), 3);
        assert_eq!(arm[0], tilt);
        for (i, q) in arm[1..].iter().enumerate() {
            let expected = tilt * animation.rotation(i, "arm").unwrap();
            assert!(q.abs_diff_eq(expected, 1e-12));
        }
    }

    #[test]
    fn test_disabled_parts_are_not_keyed() {
        let mut action = Action::new("walk", animation(2, false));
        action.disabled_parts.insert("arms".to_string());
        assert_eq!(action.enabled_bones(&parts()), ["leg"]);

        let mut timeline = Timeline::new();
        timeline.schedule_action(&action, &HashMap::new(), &parts(), 0);
        assert!(timeline.keyframes.iter().all(|k| k.bone == "leg"));
    }

    #[test]
    fn test_movement_keys_root_location() {
        let mut action = Action::new("walk", animation(3, true));
        action.range = Range { start: 1, end: None };

        let mut timeline = Timeline::new();
        timeline.schedule_action(&action, &HashMap::new(), &parts(), 0);
        assert!(timeline.keyframes.iter().all(|k| k.bone != "root"));

        action.use_movement = true;
        let mut timeline = Timeline::new();
        timeline.schedule_action(&action, &HashMap::new(), &parts(), 0);

        let root: Vec<(u32, Channel)> = timeline
            .keyframes
            .iter()
            .filter(|k| k.bone == "root")
            .map(|k| (k.frame, k.channel))
            .collect();
        // Rotation frames 1 and 2 are raw frames 2 and 3
        assert_eq!(
            root,
            vec![
                (0, Channel::Location(DVec3::new(2.0, 0.0, 0.0))),
                (1, Channel::Location(DVec3::new(3.0, 0.0, 0.0))),
            ]
        );
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut action = Action::new("wave", animation(2, false));
        action.transition = Transition {
            reset: Some(5),
            length: 3,
        };

        let mut timeline = Timeline::new();
        let next = timeline.schedule_action(&action, &HashMap::new(), &parts(), 0);

        // Last source frame at 1, reset at 6, free from 9
        assert_eq!(next, 9);
        let reset = keys_at(&timeline, 6);
        assert_eq!(reset.len(), 3);
        assert!(reset.iter().all(|k| k.channel == Channel::Rotation(DQuat::IDENTITY)));
    }

    #[test]
    fn test_empty_range_keys_base_only() {
        let mut action = Action::new("hold", animation(2, false));
        action.range = Range { start: 2, end: Some(2) };

        let mut timeline = Timeline::new();
        let next = timeline.schedule_action(&action, &HashMap::new(), &parts(), 4);
        assert_eq!(next, 5);
        assert_eq!(timeline.keyframes.len(), 3);
    }

    #[test]
    fn test_groups_run_back_to_back() {
        let long = Action::new("long", animation(4, false));
        let mut short = Action::new("short", animation(1, false));
        short.disabled_parts.insert("legs".to_string());
        let mut legs = Action::new("legs", animation(2, false));
        legs.disabled_parts.insert("arms".to_string());

        let timeline = schedule_groups(&[vec![short, legs], vec![long]], &HashMap::new(), &parts());

        // First group ends at max(0 + 1, 1 + 1) = 2, second at 2 + 3 + 1
        assert!(timeline.collisions.is_empty());
        assert_eq!(keys_at(&timeline, 2).len(), 6);
        assert_eq!(timeline.end, 6);
        assert_eq!(timeline.keyframes.iter().map(|k| k.frame).max(), Some(5));
    }

    #[test]
    fn test_colliding_actions_are_reported() {
        let a = Action::new("a", animation(1, false));
        let mut b = Action::new("b", animation(1, false));
        b.disabled_parts.insert("legs".to_string());

        let timeline = schedule_groups(&[vec![a, b]], &HashMap::new(), &parts());

        let bones: Vec<&str> = timeline.collisions.iter().map(|c| c.bone.as_str()).collect();
        assert_eq!(bones, ["arm", "hand"]);
        assert!(timeline.collisions.iter().all(|c| c.group == 0 && c.first == "a" && c.second == "b"));
        // Both actions are still keyed
        assert_eq!(keys_at(&timeline, 0).len(), 6 + 6 - 2);
    }

    #[test]
    fn test_huge_slowdown_and_transition_saturate() {
        let mut action = Action::new("crawl", animation(2, false));
        action.slowdown = u32::MAX;
        action.transition = Transition {
            reset: Some(u32::MAX),
            length: u32::MAX,
        };

        let timeline = schedule_groups(&[vec![action.clone()], vec![action]], &HashMap::new(), &parts());

        assert_eq!(timeline.end, u32::MAX);
        let frames: HashSet<u32> = timeline.keyframes.iter().map(|k| k.frame).collect();
        // Second source frame, reset and the whole second group pile up on the last frame
        assert_eq!(frames, [0, u32::MAX].into_iter().collect());
    }
}
