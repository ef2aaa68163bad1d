//! Sprint extractor
//!
//! The run window opens at the first frame where centroid speed stays above
//! the motion threshold for `sustain_frames` frames and closes at the last
//! such frame, a proxy for the start signal and the finish-line crossing.
//! Cadence and step length come from the oscillation of the shank
//! inclination (ankle angle) inside that window.

use super::signal::count_cycles;
use crate::config::SprintConfig;
use crate::types::{
    AngleSample, Joint, KineticBlueprint, MetricDetail, MovementSample, Technique, TestMetrics,
};
use tracing::debug;

/// Projected 100 m time that earns full marks
const FULL_MARKS_100M_SECONDS: f64 = 10.0;

pub fn analyze(blueprint: &KineticBlueprint, config: &SprintConfig) -> TestMetrics {
    let pattern = &blueprint.movement_pattern;
    let Some((start, finish)) = run_window(pattern, config) else {
        debug!(frames = pattern.len(), "sprint: no sustained running phase");
        return undetermined();
    };

    let t_start = pattern[start].timestamp_seconds;
    let t_finish = pattern[finish].timestamp_seconds;
    let run_time_seconds = t_finish - t_start;
    if run_time_seconds <= 0.0 {
        return undetermined();
    }

    // Trapezoidal integration of centroid speed (m/s) over the run window
    let distance_m: f64 = pattern[start..=finish]
        .windows(2)
        .map(|w| (w[0].velocity + w[1].velocity) / 2.0 * (w[1].timestamp_seconds - w[0].timestamp_seconds))
        .sum();
    let average_speed_mps = distance_m / run_time_seconds;

    let ankle = dominant_ankle_trace(blueprint, t_start, t_finish);
    let steps = count_cycles(&ankle) * 2;
    let (cadence_spm, stride_length_m) = if steps > 0 {
        (
            steps as f64 / run_time_seconds * 60.0,
            distance_m / steps as f64,
        )
    } else {
        (0.0, 0.0)
    };

    let projected_100m = if average_speed_mps > 0.0 {
        100.0 / average_speed_mps
    } else {
        f64::INFINITY
    };
    let score = (100.0 - (projected_100m - FULL_MARKS_100M_SECONDS) * 10.0).clamp(0.0, 100.0);

    TestMetrics {
        score,
        technique: classify(projected_100m),
        detail: MetricDetail::Sprint {
            run_time_seconds,
            stride_length_m,
            cadence_spm,
            average_speed_mps,
        },
    }
}

/// First and last frame of sustained above-threshold speed
fn run_window(pattern: &[MovementSample], config: &SprintConfig) -> Option<(usize, usize)> {
    let sustain = config.sustain_frames.max(1);
    if pattern.len() < sustain {
        return None;
    }
    let moving: Vec<bool> = pattern
        .iter()
        .map(|s| s.velocity >= config.motion_threshold_mps)
        .collect();
    let sustained = |w: &[bool]| w.iter().all(|m| *m);

    let start = moving.windows(sustain).position(sustained)?;
    let finish = moving.windows(sustain).rposition(sustained)? + sustain - 1;
    (finish > start).then_some((start, finish))
}

/// Ankle trace with more samples inside the window
fn dominant_ankle_trace(blueprint: &KineticBlueprint, t_start: f64, t_finish: f64) -> Vec<AngleSample> {
    let within = |joint: Joint| -> Vec<AngleSample> {
        blueprint
            .angles(joint)
            .iter()
            .filter(|s| s.timestamp_seconds >= t_start && s.timestamp_seconds <= t_finish)
            .copied()
            .collect()
    };
    let left = within(Joint::LeftAnkle);
    let right = within(Joint::RightAnkle);
    if right.len() > left.len() {
        right
    } else {
        left
    }
}

fn classify(projected_100m: f64) -> Technique {
    match projected_100m {
        t if t < 11.0 => Technique::Elite,
        t if t < 12.0 => Technique::Excellent,
        t if t < 13.0 => Technique::Advanced,
        t if t < 14.5 => Technique::Good,
        t if t < 16.0 => Technique::Developing,
        _ => Technique::NeedsImprovement,
    }
}

fn undetermined() -> TestMetrics {
    TestMetrics {
        score: 0.0,
        technique: Technique::Undetermined,
        detail: MetricDetail::Sprint {
            run_time_seconds: 0.0,
            stride_length_m: 0.0,
            cadence_spm: 0.0,
            average_speed_mps: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const FPS: f64 = 10.0;

    /// Idle for 5 frames, run at `speed` for `run_frames`, idle for 5 frames.
    /// The ankle swings ±20° every 5 frames while running.
    fn blueprint(speed: f64, run_frames: usize) -> KineticBlueprint {
        let total = run_frames + 10;
        let movement_pattern = (0..total)
            .map(|i| MovementSample {
                frame: i as u32,
                timestamp_seconds: i as f64 / FPS,
                centroid: None,
                velocity: if (5..5 + run_frames).contains(&i) { speed } else { 0.0 },
                acceleration: 0.0,
                stability: 1.0,
            })
            .collect();
        let ankle = (0..total)
            .map(|i| AngleSample {
                frame: i as u32,
                timestamp_seconds: i as f64 / FPS,
                degrees: if (i / 5) % 2 == 0 { -20.0 } else { 20.0 },
            })
            .collect();
        let mut joint_angles = BTreeMap::new();
        joint_angles.insert(Joint::LeftAnkle, ankle);
        KineticBlueprint {
            joint_angles,
            movement_pattern,
            signature: String::new(),
        }
    }

    #[test]
    fn test_run_time_and_speed() {
        let metrics = analyze(&blueprint(8.0, 41), &SprintConfig::default());
        let MetricDetail::Sprint {
            run_time_seconds,
            average_speed_mps,
            cadence_spm,
            stride_length_m,
        } = metrics.detail
        else {
            panic!("expected sprint metrics");
        };

        assert!((run_time_seconds - 4.0).abs() < 1e-9);
        assert!((average_speed_mps - 8.0).abs() < 1e-9);
        assert!(cadence_spm > 0.0);
        assert!(stride_length_m > 0.0);
        // 100 m at 8 m/s projects to 12.5 s
        assert!((metrics.score - 75.0).abs() < 1e-9);
        assert_eq!(metrics.technique, Technique::Advanced);
    }

    #[test]
    fn test_faster_run_scores_higher() {
        let slow = analyze(&blueprint(6.0, 30), &SprintConfig::default());
        let fast = analyze(&blueprint(9.0, 30), &SprintConfig::default());
        assert!(fast.score > slow.score);
    }

    #[test]
    fn test_standing_still_is_undetermined() {
        let metrics = analyze(&blueprint(0.0, 30), &SprintConfig::default());
        assert_eq!(metrics.technique, Technique::Undetermined);
    }

    #[test]
    fn test_brief_twitch_is_not_a_run() {
        // Two fast frames never satisfy the three-frame sustain
        let metrics = analyze(&blueprint(8.0, 2), &SprintConfig::default());
        assert_eq!(metrics.technique, Technique::Undetermined);
    }
}
