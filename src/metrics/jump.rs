//! Vertical jump extractor
//!
//! Jump height is the rise of the body centroid from the standing level to the
//! apex. Takeoff alignment uses hip extension at the last grounded frame (with
//! the knees extended at takeoff this tracks ankle-hip-shoulder alignment), and
//! landing stability averages movement stability after touchdown.

use super::signal::{bilateral, mean};
use crate::config::JumpConfig;
use crate::types::{Joint, KineticBlueprint, MetricDetail, Technique, TestMetrics};
use tracing::debug;

/// Height at which the height component saturates
const FULL_MARKS_HEIGHT_CM: f64 = 80.0;

pub fn analyze(blueprint: &KineticBlueprint, config: &JumpConfig) -> TestMetrics {
    let pattern = &blueprint.movement_pattern;
    // (index into movement pattern, centroid height coordinate)
    let heights: Vec<(usize, f64)> = pattern
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.centroid.map(|c| (i, c.y)))
        .collect();

    if heights.len() < 3 {
        debug!(samples = heights.len(), "jump: too few centroid samples");
        return undetermined();
    }

    let ground_window = ((heights.len() as f64 * config.ground_window_ratio).ceil() as usize)
        .clamp(1, heights.len());
    let ground_y = heights[..ground_window].iter().map(|(_, y)| y).sum::<f64>()
        / ground_window as f64;

    // y grows downward, so the apex is the smallest y
    let Some(apex_pos) = heights
        .iter()
        .enumerate()
        .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map(|(pos, _)| pos)
    else {
        return undetermined();
    };
    let (apex_idx, apex_y) = heights[apex_pos];

    let jump_height_cm = (ground_y - apex_y) * 100.0;
    if jump_height_cm < config.min_jump_height_cm {
        debug!(jump_height_cm, "jump: no discernible flight phase");
        return undetermined();
    }

    let band = config.phase_band_ratio * (ground_y - apex_y);
    let grounded = |y: f64| ground_y - y <= band;

    let takeoff_idx = heights[..apex_pos]
        .iter()
        .rev()
        .find(|(_, y)| grounded(*y))
        .map(|(i, _)| *i)
        .unwrap_or(heights[0].0);
    let takeoff_frame = pattern[takeoff_idx].frame;
    let apex_frame = pattern[apex_idx].frame;

    let hips = bilateral(
        blueprint.angles(Joint::LeftHip),
        blueprint.angles(Joint::RightHip),
    );
    let takeoff_angle_deg = hips
        .iter()
        .filter(|s| s.frame <= apex_frame)
        .min_by_key(|s| s.frame.abs_diff(takeoff_frame))
        .map(|s| s.degrees);

    let touchdown_idx = heights[apex_pos + 1..]
        .iter()
        .find(|(_, y)| grounded(*y))
        .map(|(i, _)| *i);
    let landing_start = touchdown_idx.unwrap_or(apex_idx + 1);
    let landing_stability = mean(
        pattern
            .iter()
            .skip(landing_start)
            .take(config.landing_window_frames.max(1))
            .map(|s| s.stability),
    )
    .unwrap_or(0.0);

    let height_component = (jump_height_cm / FULL_MARKS_HEIGHT_CM).min(1.0) * 80.0;
    let alignment_component = takeoff_angle_deg
        .map(|a| (a / 180.0).clamp(0.0, 1.0) * 10.0)
        .unwrap_or(0.0);
    let landing_component = landing_stability.clamp(0.0, 1.0) * 10.0;
    let score = (height_component + alignment_component + landing_component).clamp(0.0, 100.0);

    TestMetrics {
        score,
        technique: classify(jump_height_cm),
        detail: MetricDetail::VerticalJump {
            jump_height_cm,
            takeoff_angle_deg,
            landing_stability,
        },
    }
}

fn classify(jump_height_cm: f64) -> Technique {
    match jump_height_cm {
        h if h >= 70.0 => Technique::Elite,
        h if h >= 60.0 => Technique::Excellent,
        h if h >= 50.0 => Technique::Advanced,
        h if h >= 40.0 => Technique::Good,
        h if h >= 30.0 => Technique::Developing,
        _ => Technique::NeedsImprovement,
    }
}

fn undetermined() -> TestMetrics {
    TestMetrics {
        score: 0.0,
        technique: Technique::Undetermined,
        detail: MetricDetail::VerticalJump {
            jump_height_cm: 0.0,
            takeoff_angle_deg: None,
            landing_stability: 0.0,
        },
    }
}
