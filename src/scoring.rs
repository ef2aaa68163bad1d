//! Composite scoring and cheat detection
//!
//! The composite score adds a capped confidence bonus to the raw test score
//! and subtracts a fixed penalty when any anomaly check fires. Every check is
//! driven by `AnomalyConfig` and can be switched off on its own.

use crate::config::{EngineConfig, ScoringConfig};
use crate::index::SignatureIndex;
use crate::types::{CheatReason, MetricDetail, NormalizedSequence, TestMetrics};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Composite biomechanical score, always within [0, 100]
pub fn composite_score(
    raw_score: f64,
    mean_confidence: f64,
    cheat_detected: bool,
    config: &ScoringConfig,
) -> f64 {
    let bonus = (config.confidence_bonus_weight * mean_confidence.max(0.0))
        .min(config.confidence_bonus_cap);
    let penalty = if cheat_detected {
        config.cheat_penalty
    } else {
        0.0
    };
    let score = raw_score + bonus + penalty;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Outcome of the anomaly checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatVerdict {
    pub cheat_detected: bool,
    pub reasons: Vec<CheatReason>,
}

impl CheatVerdict {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, reason: CheatReason) {
        warn!(?reason, "cheat check raised");
        self.cheat_detected = true;
        self.reasons.push(reason);
    }
}

/// Runs the enabled anomaly checks against one analysed recording.
///
/// Reads the signature index but never writes to it; registering a clean
/// signature is the caller's job.
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn evaluate(
        sequence: &NormalizedSequence,
        metrics: &TestMetrics,
        signature: &str,
        assessment_id: &str,
        index: &dyn SignatureIndex,
        config: &EngineConfig,
    ) -> CheatVerdict {
        let checks = &config.anomaly;
        let mut verdict = CheatVerdict::clean();

        if checks.low_confidence.enabled {
            let mean_confidence = sequence.mean_confidence();
            if mean_confidence < checks.low_confidence.floor {
                verdict.raise(CheatReason::LowConfidence {
                    mean_confidence,
                    floor: checks.low_confidence.floor,
                });
            }
        }

        if checks.implausible_metric.enabled {
            let distance = sequence
                .distance_meters
                .unwrap_or(config.metrics.sprint.default_distance_meters);
            for reason in implausible_metrics(metrics, distance, config) {
                verdict.raise(reason);
            }
        }

        if checks.replay.enabled {
            if let Some(owner) = index.owner_of(signature) {
                if owner != assessment_id {
                    verdict.raise(CheatReason::ReplayedSignature { owner: Some(owner) });
                }
            }
        }

        if checks.duration_mismatch.enabled {
            let declared = sequence.declared_duration_seconds;
            let actual = sequence.duration_seconds();
            let tolerance = checks.duration_mismatch.tolerance_for(declared);
            if (actual - declared).abs() > tolerance {
                verdict.raise(CheatReason::DurationMismatch {
                    declared_seconds: declared,
                    actual_seconds: actual,
                    tolerance_seconds: tolerance,
                });
            }
        }

        verdict
    }
}

fn implausible_metrics(
    metrics: &TestMetrics,
    distance_meters: f64,
    config: &EngineConfig,
) -> Vec<CheatReason> {
    let limits = &config.anomaly.implausible_metric;
    let mut reasons = Vec::new();

    match metrics.detail {
        MetricDetail::VerticalJump { jump_height_cm, .. } => {
            if jump_height_cm > limits.max_jump_height_cm {
                reasons.push(CheatReason::ImplausibleMetric {
                    metric: "jumpHeightCm".to_string(),
                    value: jump_height_cm,
                    limit: limits.max_jump_height_cm,
                });
            }
        }
        MetricDetail::Sprint {
            run_time_seconds,
            average_speed_mps,
            ..
        } => {
            if average_speed_mps > limits.max_sprint_speed_mps {
                reasons.push(CheatReason::ImplausibleMetric {
                    metric: "averageSpeedMps".to_string(),
                    value: average_speed_mps,
                    limit: limits.max_sprint_speed_mps,
                });
            }
            // Faster than record pace over the declared course
            let record_time = distance_meters / limits.max_sprint_speed_mps;
            if run_time_seconds > 0.0 && run_time_seconds < record_time {
                reasons.push(CheatReason::ImplausibleMetric {
                    metric: "runTimeSeconds".to_string(),
                    value: run_time_seconds,
                    limit: record_time,
                });
            }
        }
        MetricDetail::Squat { .. } | MetricDetail::PushUp { .. } => {}
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemorySignatureIndex;
    use crate::types::{PoseFrame, Technique, TestType};
    use pretty_assertions::assert_eq;

    fn sequence(declared: f64, span: f64, confidence: f64) -> NormalizedSequence {
        NormalizedSequence {
            test_type: TestType::VerticalJump,
            declared_duration_seconds: declared,
            distance_meters: None,
            frames: vec![PoseFrame::new(0, 0.0), PoseFrame::new(1, span)],
            frame_confidence: vec![confidence, confidence],
            dropped_keypoints: 0,
            quality_flags: vec![],
        }
    }

    fn jump(height_cm: f64) -> TestMetrics {
        TestMetrics {
            score: 60.0,
            technique: Technique::Advanced,
            detail: MetricDetail::VerticalJump {
                jump_height_cm: height_cm,
                takeoff_angle_deg: Some(170.0),
                landing_stability: 1.0,
            },
        }
    }

    fn sprint(run_time_seconds: f64, average_speed_mps: f64) -> TestMetrics {
        TestMetrics {
            score: 50.0,
            technique: Technique::Good,
            detail: MetricDetail::Sprint {
                run_time_seconds,
                stride_length_m: 2.0,
                cadence_spm: 200.0,
                average_speed_mps,
            },
        }
    }

    fn evaluate(seq: &NormalizedSequence, metrics: &TestMetrics) -> CheatVerdict {
        AnomalyDetector::evaluate(
            seq,
            metrics,
            "sig",
            "assessment-1",
            &InMemorySignatureIndex::new(),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_composite_score_bounds() {
        let config = ScoringConfig::default();
        assert_eq!(composite_score(95.0, 1.0, false, &config), 100.0);
        assert_eq!(composite_score(5.0, 0.0, true, &config), 0.0);
        assert_eq!(composite_score(f64::NAN, 0.9, false, &config), 0.0);
        assert!((composite_score(60.0, 0.9, false, &config) - 69.0).abs() < 1e-9);
        assert!((composite_score(60.0, 0.9, true, &config) - 49.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_bonus_is_capped() {
        let mut config = ScoringConfig::default();
        config.confidence_bonus_weight = 50.0;
        assert_eq!(composite_score(50.0, 0.9, false, &config), 60.0);
    }

    #[test]
    fn test_clean_recording() {
        let verdict = evaluate(&sequence(1.0, 1.0, 0.9), &jump(40.0));
        assert_eq!(verdict, CheatVerdict::clean());
    }

    #[test]
    fn test_low_confidence() {
        let verdict = evaluate(&sequence(1.0, 1.0, 0.5), &jump(40.0));
        assert!(verdict.cheat_detected);
        assert!(matches!(
            verdict.reasons.as_slice(),
            [CheatReason::LowConfidence { floor, .. }] if *floor == 0.7
        ));
    }

    #[test]
    fn test_implausible_jump() {
        let verdict = evaluate(&sequence(1.0, 1.0, 0.9), &jump(95.0));
        assert!(verdict.cheat_detected);
        assert!(matches!(
            &verdict.reasons[0],
            CheatReason::ImplausibleMetric { metric, .. } if metric == "jumpHeightCm"
        ));
    }

    #[test]
    fn test_sprint_faster_than_record_pace() {
        // 100 m in 8 s
        let mut seq = sequence(8.0, 8.0, 0.9);
        seq.test_type = TestType::Sprint;
        let verdict = evaluate(&seq, &sprint(8.0, 9.0));
        assert!(verdict.cheat_detected);

        // Same time over a declared 60 m course is plausible
        seq.distance_meters = Some(60.0);
        let verdict = evaluate(&seq, &sprint(8.0, 7.5));
        assert!(!verdict.cheat_detected);
    }

    #[test]
    fn test_replayed_signature() {
        let index = InMemorySignatureIndex::new();
        index.record_signature("sig", "assessment-0");

        let verdict = AnomalyDetector::evaluate(
            &sequence(1.0, 1.0, 0.9),
            &jump(40.0),
            "sig",
            "assessment-1",
            &index,
            &EngineConfig::default(),
        );
        assert_eq!(
            verdict.reasons,
            vec![CheatReason::ReplayedSignature {
                owner: Some("assessment-0".to_string())
            }]
        );

        // The owning assessment is not a replay of itself
        let verdict = AnomalyDetector::evaluate(
            &sequence(1.0, 1.0, 0.9),
            &jump(40.0),
            "sig",
            "assessment-0",
            &index,
            &EngineConfig::default(),
        );
        assert!(!verdict.cheat_detected);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_duration_mismatch() {
        let verdict = evaluate(&sequence(30.0, 5.0, 0.9), &jump(40.0));
        assert!(matches!(
            verdict.reasons.as_slice(),
            [CheatReason::DurationMismatch { tolerance_seconds, .. }] if (*tolerance_seconds - 3.0).abs() < 1e-9
        ));

        // Within tolerance
        let verdict = evaluate(&sequence(10.0, 9.2, 0.9), &jump(40.0));
        assert!(!verdict.cheat_detected);
    }

    #[test]
    fn test_disabled_checks_do_not_fire() {
        let mut config = EngineConfig::default();
        config.anomaly.low_confidence.enabled = false;
        config.anomaly.implausible_metric.enabled = false;
        config.anomaly.duration_mismatch.enabled = false;

        let verdict = AnomalyDetector::evaluate(
            &sequence(30.0, 5.0, 0.2),
            &jump(120.0),
            "sig",
            "assessment-1",
            &InMemorySignatureIndex::new(),
            &config,
        );
        assert!(!verdict.cheat_detected);
    }
}
