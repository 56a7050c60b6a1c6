//! Summaries of converted animations

use anyhow::{Context, Result};
use mocap_core::Animation;
use std::path::Path;

/// Headline numbers of one animation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationSummary {
    pub bones: usize,
    pub frames: usize,
    pub movement: bool,
    pub degenerate: usize,
}

impl From<&Animation> for AnimationSummary {
    fn from(animation: &Animation) -> Self {
        Self {
            bones: animation.bone_order().len(),
            frames: animation.len(),
            movement: animation.has_movement(),
            degenerate: animation.degenerate().len(),
        }
    }
}

/// Load a converted animation and log its summary
pub fn inspect_file(input: &Path) -> Result<AnimationSummary> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read animation: {:?}", input))?;
    let animation: Animation = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse animation: {:?}", input))?;

    let summary = AnimationSummary::from(&animation);
    tracing::info!("Animation {:?}:", input);
    tracing::info!("  bones:      {}", summary.bones);
    tracing::info!("  frames:     {}", summary.frames);
    tracing::info!("  movement:   {}", if summary.movement { "yes" } else { "no" });
    tracing::info!("  degenerate: {}", summary.degenerate);
    for degenerate in animation.degenerate() {
        tracing::info!("    {}", degenerate);
    }

    Ok(summary)
}
