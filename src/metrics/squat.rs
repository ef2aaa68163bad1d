//! Squat extractor

use super::signal::{bilateral, detect_reps, mean, min_degrees};
use crate::config::SquatConfig;
use crate::types::{Joint, KineticBlueprint, MetricDetail, Technique, TestMetrics};
use tracing::debug;

/// Knee flexion at which the depth component saturates
const FULL_DEPTH_FLEXION_DEG: f64 = 100.0;
const MAX_SCORED_REPS: u32 = 10;

pub fn analyze(blueprint: &KineticBlueprint, config: &SquatConfig) -> TestMetrics {
    let knee = bilateral(
        blueprint.angles(Joint::LeftKnee),
        blueprint.angles(Joint::RightKnee),
    );
    let reps = detect_reps(&knee, config.rep_threshold_deg, config.min_rep_seconds);

    if reps.is_empty() {
        debug!(samples = knee.len(), "squat: no repetition crossed the depth threshold");
        return undetermined();
    }

    let min_knee_angle_deg = min_degrees(&knee);
    let squat_depth_deg = min_knee_angle_deg.map(|a| 180.0 - a).unwrap_or(0.0);
    let knee_alignment = knee_alignment(blueprint);
    let rep_count = reps.len() as u32;

    let depth_component = (squat_depth_deg / FULL_DEPTH_FLEXION_DEG).min(1.0) * 50.0;
    let alignment_component = knee_alignment * 30.0;
    let rep_component = rep_count.min(MAX_SCORED_REPS) as f64 * 2.0;
    let score = (depth_component + alignment_component + rep_component).clamp(0.0, 100.0);

    TestMetrics {
        score,
        technique: Technique::from_score(score),
        detail: MetricDetail::Squat {
            squat_depth_deg,
            min_knee_angle_deg,
            knee_alignment,
            rep_count,
        },
    }
}

/// 1 minus the mean lateral knee-over-ankle offset relative to shank length.
///
/// The shank inclination θ from vertical gives that ratio directly as sin θ.
fn knee_alignment(blueprint: &KineticBlueprint) -> f64 {
    let ankles = bilateral(
        blueprint.angles(Joint::LeftAnkle),
        blueprint.angles(Joint::RightAnkle),
    );
    mean(ankles.iter().map(|s| s.degrees.to_radians().sin().abs()))
        .map(|deviation| (1.0 - deviation).clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

fn undetermined() -> TestMetrics {
    TestMetrics {
        score: 0.0,
        technique: Technique::Undetermined,
        detail: MetricDetail::Squat {
            squat_depth_deg: 0.0,
            min_knee_angle_deg: None,
            knee_alignment: 0.0,
            rep_count: 0,
        },
    }
}
