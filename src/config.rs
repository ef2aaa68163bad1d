//! Engine configuration
//!
//! Every threshold, weight and toggle used by the pipeline lives here. The
//! defaults are calibration guesses, not validated constants; deployments are
//! expected to tune them. All sections deserialize with `#[serde(default)]`, so
//! a partial JSON document only overrides the fields it names.

use crate::error::AssessmentError;
use serde::{Deserialize, Serialize};

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub blueprint: BlueprintConfig,
    pub metrics: MetricsConfig,
    pub scoring: ScoringConfig,
    pub anomaly: AnomalyConfig,
}

impl EngineConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, AssessmentError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values no pipeline stage can work with
    pub fn validate(&self) -> Result<(), AssessmentError> {
        let n = &self.normalizer;
        positive("normalizer.expectedFrameRate", n.expected_frame_rate)?;
        unit_interval("normalizer.minFrameRatio", n.min_frame_ratio)?;
        unit_interval("normalizer.minKeypointConfidence", n.min_keypoint_confidence)?;

        let b = &self.blueprint;
        unit_interval("blueprint.minAngleCoverage", b.min_angle_coverage)?;
        positive("blueprint.unitsPerMeter", b.units_per_meter)?;
        positive("blueprint.stabilityVarianceScale", b.stability_variance_scale)?;

        let m = &self.metrics;
        unit_interval("metrics.jump.groundWindowRatio", m.jump.ground_window_ratio)?;
        unit_interval("metrics.jump.phaseBandRatio", m.jump.phase_band_ratio)?;
        non_negative("metrics.jump.minJumpHeightCm", m.jump.min_jump_height_cm)?;
        non_negative("metrics.squat.minRepSeconds", m.squat.min_rep_seconds)?;
        non_negative("metrics.pushUp.minRepSeconds", m.push_up.min_rep_seconds)?;
        positive("metrics.sprint.motionThresholdMps", m.sprint.motion_threshold_mps)?;
        positive("metrics.sprint.defaultDistanceMeters", m.sprint.default_distance_meters)?;

        let s = &self.scoring;
        non_negative("scoring.confidenceBonusWeight", s.confidence_bonus_weight)?;
        non_negative("scoring.confidenceBonusCap", s.confidence_bonus_cap)?;
        if s.cheat_penalty > 0.0 || !s.cheat_penalty.is_finite() {
            return Err(AssessmentError::InvalidConfig(format!(
                "scoring.cheatPenalty must be zero or negative, got {}",
                s.cheat_penalty
            )));
        }

        let a = &self.anomaly;
        unit_interval("anomaly.lowConfidence.floor", a.low_confidence.floor)?;
        positive(
            "anomaly.implausibleMetric.maxJumpHeightCm",
            a.implausible_metric.max_jump_height_cm,
        )?;
        positive(
            "anomaly.implausibleMetric.maxSprintSpeedMps",
            a.implausible_metric.max_sprint_speed_mps,
        )?;
        non_negative(
            "anomaly.durationMismatch.toleranceSeconds",
            a.duration_mismatch.tolerance_seconds,
        )?;
        non_negative(
            "anomaly.durationMismatch.toleranceRatio",
            a.duration_mismatch.tolerance_ratio,
        )?;

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), AssessmentError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AssessmentError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), AssessmentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AssessmentError::InvalidConfig(format!(
            "{name} must be zero or positive, got {value}"
        )))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<(), AssessmentError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AssessmentError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// Pose sequence validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizerConfig {
    /// Capture rate the declared duration is checked against
    pub expected_frame_rate: f64,
    /// Minimum fraction of the expected frame count
    pub min_frame_ratio: f64,
    /// Keypoints below this confidence are treated as absent
    pub min_keypoint_confidence: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            expected_frame_rate: 30.0,
            min_frame_ratio: 0.5,
            min_keypoint_confidence: 0.3,
        }
    }
}

/// Blueprint generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlueprintConfig {
    /// Minimum fraction of frames that must yield at least one joint angle
    pub min_angle_coverage: f64,
    /// Keypoint coordinate units per metre
    pub units_per_meter: f64,
    /// Confidence-change variance at which stability drops to 0.5
    pub stability_variance_scale: f64,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            min_angle_coverage: 0.3,
            units_per_meter: 1.0,
            stability_variance_scale: 0.01,
        }
    }
}

/// Per-test extractor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub jump: JumpConfig,
    pub squat: SquatConfig,
    pub push_up: PushUpConfig,
    pub sprint: SprintConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JumpConfig {
    /// Leading fraction of frames averaged to find the standing level
    pub ground_window_ratio: f64,
    /// Fraction of the jump height treated as "still on the ground"
    pub phase_band_ratio: f64,
    /// Jumps lower than this are not a discernible jump
    pub min_jump_height_cm: f64,
    /// Frames after touchdown averaged for landing stability
    pub landing_window_frames: usize,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            ground_window_ratio: 0.1,
            phase_band_ratio: 0.1,
            min_jump_height_cm: 2.0,
            landing_window_frames: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SquatConfig {
    /// Knee angle a minimum must reach to count as a rep
    pub rep_threshold_deg: f64,
    /// Minima closer together than this merge into one rep
    pub min_rep_seconds: f64,
}

impl Default for SquatConfig {
    fn default() -> Self {
        Self {
            rep_threshold_deg: 110.0,
            min_rep_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushUpConfig {
    /// Elbow angle a minimum must reach to count as a rep
    pub rep_threshold_deg: f64,
    /// Elbow angle that counts as full depth
    pub full_depth_deg: f64,
    pub min_rep_seconds: f64,
}

impl Default for PushUpConfig {
    fn default() -> Self {
        Self {
            rep_threshold_deg: 120.0,
            full_depth_deg: 90.0,
            min_rep_seconds: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SprintConfig {
    /// Centroid speed that counts as running
    pub motion_threshold_mps: f64,
    /// Consecutive frames above the threshold needed to mark a start
    pub sustain_frames: usize,
    /// Course distance used when the input does not declare one
    pub default_distance_meters: f64,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            motion_threshold_mps: 1.0,
            sustain_frames: 3,
            default_distance_meters: 100.0,
        }
    }
}

/// Composite score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Bonus points per unit of mean confidence
    pub confidence_bonus_weight: f64,
    pub confidence_bonus_cap: f64,
    /// Offset applied when a cheat verdict is raised (zero or negative)
    pub cheat_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            confidence_bonus_weight: 10.0,
            confidence_bonus_cap: 10.0,
            cheat_penalty: -20.0,
        }
    }
}

/// Cheat detection checks, each independently togglable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnomalyConfig {
    pub low_confidence: LowConfidenceCheck,
    pub implausible_metric: ImplausibleMetricCheck,
    pub replay: ReplayCheck,
    pub duration_mismatch: DurationMismatchCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LowConfidenceCheck {
    pub enabled: bool,
    pub floor: f64,
}

impl Default for LowConfidenceCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            floor: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImplausibleMetricCheck {
    pub enabled: bool,
    pub max_jump_height_cm: f64,
    /// 100 m world-record pace
    pub max_sprint_speed_mps: f64,
}

impl Default for ImplausibleMetricCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            max_jump_height_cm: 80.0,
            max_sprint_speed_mps: 10.44,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayCheck {
    pub enabled: bool,
}

impl Default for ReplayCheck {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DurationMismatchCheck {
    pub enabled: bool,
    pub tolerance_seconds: f64,
    /// Tolerance as a fraction of the declared duration; the larger bound wins
    pub tolerance_ratio: f64,
}

impl DurationMismatchCheck {
    pub fn tolerance_for(&self, declared_seconds: f64) -> f64 {
        self.tolerance_seconds
            .max(self.tolerance_ratio * declared_seconds.abs())
    }
}

impl Default for DurationMismatchCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_seconds: 1.0,
            tolerance_ratio: 0.1,
        }
    }
}
