//! Push-up extractor

use super::signal::{bilateral, detect_reps, mean};
use crate::config::PushUpConfig;
use crate::types::{Joint, KineticBlueprint, MetricDetail, Technique, TestMetrics};
use tracing::debug;

/// Elbow swing at which the range-of-motion component saturates
const FULL_SWING_DEG: f64 = 90.0;
const MAX_SCORED_REPS: u32 = 20;

pub fn analyze(blueprint: &KineticBlueprint, config: &PushUpConfig) -> TestMetrics {
    let elbow = bilateral(
        blueprint.angles(Joint::LeftElbow),
        blueprint.angles(Joint::RightElbow),
    );
    let reps = detect_reps(&elbow, config.rep_threshold_deg, config.min_rep_seconds);

    if reps.is_empty() {
        debug!(samples = elbow.len(), "push-up: no repetition detected");
        return undetermined();
    }

    let rep_count = reps.len() as u32;
    let full_depth = reps
        .iter()
        .filter(|r| r.degrees <= config.full_depth_deg)
        .count();
    let form_quality = full_depth as f64 / reps.len() as f64;
    let range_of_motion_deg = mean(reps.iter().map(|r| r.swing_deg())).unwrap_or(0.0);

    let rep_component = rep_count.min(MAX_SCORED_REPS) as f64 * 2.5;
    let form_component = form_quality * 30.0;
    let rom_component = (range_of_motion_deg / FULL_SWING_DEG).min(1.0) * 20.0;
    let score = (rep_component + form_component + rom_component).clamp(0.0, 100.0);

    TestMetrics {
        score,
        technique: Technique::from_score(score),
        detail: MetricDetail::PushUp {
            rep_count,
            form_quality,
            range_of_motion_deg,
        },
    }
}

fn undetermined() -> TestMetrics {
    TestMetrics {
        score: 0.0,
        technique: Technique::Undetermined,
        detail: MetricDetail::PushUp {
            rep_count: 0,
            form_quality: 0.0,
            range_of_motion_deg: 0.0,
        },
    }
}
