//! Core types for the kinetic blueprint pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw pose frames, the normalized sequence, the kinetic blueprint,
//! test metrics, and the frozen assessment record.

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Body landmark vocabulary reported by the pose detector (COCO order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// How the angle at a joint is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleDefinition {
    /// Angle at the joint between the segments towards the two neighbours
    Segments(Joint, Joint),
    /// Inclination of the segment towards the neighbour, measured from the
    /// vertical through the joint (0° = upright)
    FromVertical(Joint),
}

impl Joint {
    /// Joints with an anatomically defined angle, in canonical signature order
    pub const ANGLE_JOINTS: [Joint; 10] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftEye => "left_eye",
            Joint::RightEye => "right_eye",
            Joint::LeftEar => "left_ear",
            Joint::RightEar => "right_ear",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }

    /// Angle definition for this joint, if it has one
    ///
    /// - shoulder: elbow-shoulder-hip
    /// - elbow: wrist-elbow-shoulder
    /// - hip: knee-hip-shoulder
    /// - knee: ankle-knee-hip
    /// - ankle: shank inclination (knee above ankle) from vertical
    pub fn angle_definition(&self) -> Option<AngleDefinition> {
        use AngleDefinition::{FromVertical, Segments};
        match self {
            Joint::LeftShoulder => Some(Segments(Joint::LeftElbow, Joint::LeftHip)),
            Joint::RightShoulder => Some(Segments(Joint::RightElbow, Joint::RightHip)),
            Joint::LeftElbow => Some(Segments(Joint::LeftWrist, Joint::LeftShoulder)),
            Joint::RightElbow => Some(Segments(Joint::RightWrist, Joint::RightShoulder)),
            Joint::LeftHip => Some(Segments(Joint::LeftKnee, Joint::LeftShoulder)),
            Joint::RightHip => Some(Segments(Joint::RightKnee, Joint::RightShoulder)),
            Joint::LeftKnee => Some(Segments(Joint::LeftAnkle, Joint::LeftHip)),
            Joint::RightKnee => Some(Segments(Joint::RightAnkle, Joint::RightHip)),
            Joint::LeftAnkle => Some(FromVertical(Joint::LeftKnee)),
            Joint::RightAnkle => Some(FromVertical(Joint::RightKnee)),
            _ => None,
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported physical tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    VerticalJump,
    Squat,
    Sprint,
    PushUp,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::VerticalJump => "vertical-jump",
            TestType::Squat => "squat",
            TestType::Sprint => "sprint",
            TestType::PushUp => "push-up",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single detected landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Detector confidence (0-1)
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> Point2 {
        Point2 {
            x: self.x,
            y: self.y,
        }
    }
}

/// 2D position in keypoint coordinates (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Keypoints detected in one video frame. Missing joints are absent from the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    pub frame_index: u32,
    pub timestamp_seconds: f64,
    /// At most one keypoint per joint; a repeated joint key fails deserialization
    #[serde(default, deserialize_with = "unique_keypoints")]
    pub keypoints: BTreeMap<Joint, Keypoint>,
}

fn unique_keypoints<'de, D>(deserializer: D) -> Result<BTreeMap<Joint, Keypoint>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeypointsVisitor;

    impl<'de> Visitor<'de> for KeypointsVisitor {
        type Value = BTreeMap<Joint, Keypoint>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map from joint name to keypoint")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut keypoints = BTreeMap::new();
            while let Some((joint, keypoint)) = map.next_entry::<Joint, Keypoint>()? {
                if keypoints.insert(joint, keypoint).is_some() {
                    return Err(de::Error::custom(format!(
                        "duplicate keypoint for joint {joint}"
                    )));
                }
            }
            Ok(keypoints)
        }
    }

    deserializer.deserialize_map(KeypointsVisitor)
}

impl PoseFrame {
    pub fn new(frame_index: u32, timestamp_seconds: f64) -> Self {
        Self {
            frame_index,
            timestamp_seconds,
            keypoints: BTreeMap::new(),
        }
    }

    pub fn with_keypoint(mut self, joint: Joint, keypoint: Keypoint) -> Self {
        self.keypoints.insert(joint, keypoint);
        self
    }

    pub fn get(&self, joint: Joint) -> Option<&Keypoint> {
        self.keypoints.get(&joint)
    }
}

/// One submitted recording, after pose detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    pub test_type: TestType,
    pub declared_duration_seconds: f64,
    /// Declared course distance (sprint only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    pub frames: Vec<PoseFrame>,
}

/// Quality flag indicating data issues found during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    LowConfidenceKeypoints,
    EmptyFrames,
    RepeatedTimestamps,
}

/// Validated sequence with low-confidence keypoints removed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSequence {
    pub test_type: TestType,
    pub declared_duration_seconds: f64,
    pub distance_meters: Option<f64>,
    pub frames: Vec<PoseFrame>,
    /// Mean detector confidence per frame, taken before filtering
    pub frame_confidence: Vec<f64>,
    /// Keypoints dropped for falling below the confidence floor
    pub dropped_keypoints: usize,
    pub quality_flags: Vec<QualityFlag>,
}

impl NormalizedSequence {
    /// Last timestamp minus first timestamp
    pub fn duration_seconds(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp_seconds - first.timestamp_seconds,
            _ => 0.0,
        }
    }

    /// Mean of the per-frame detector confidence
    pub fn mean_confidence(&self) -> f64 {
        if self.frame_confidence.is_empty() {
            return 0.0;
        }
        self.frame_confidence.iter().sum::<f64>() / self.frame_confidence.len() as f64
    }
}

/// Joint angle measured at one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleSample {
    pub frame: u32,
    pub timestamp_seconds: f64,
    pub degrees: f64,
}

/// Whole-body motion at one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSample {
    pub frame: u32,
    pub timestamp_seconds: f64,
    /// Mean of the available keypoints, absent when the frame has none
    pub centroid: Option<Point2>,
    /// Centroid speed (coordinate units per second)
    pub velocity: f64,
    pub acceleration: f64,
    /// 1 / (1 + variance of frame-to-frame confidence changes / scale)
    pub stability: f64,
}

/// Biomechanical fingerprint of a movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KineticBlueprint {
    /// Sparse angle trajectories keyed by the vertex joint
    pub joint_angles: BTreeMap<Joint, Vec<AngleSample>>,
    /// One sample per source frame
    pub movement_pattern: Vec<MovementSample>,
    /// Hex SHA-256 over quantized joint-angle summaries
    pub signature: String,
}

impl KineticBlueprint {
    pub fn angles(&self, joint: Joint) -> &[AngleSample] {
        self.joint_angles
            .get(&joint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Technique classification shared by every test type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Technique {
    Undetermined,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Developing,
    Good,
    Advanced,
    Excellent,
    Elite,
}

impl Technique {
    /// Generic ladder over a 0-100 score
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Technique::Elite,
            s if s >= 80.0 => Technique::Excellent,
            s if s >= 70.0 => Technique::Advanced,
            s if s >= 60.0 => Technique::Good,
            s if s >= 45.0 => Technique::Developing,
            _ => Technique::NeedsImprovement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Undetermined => "Undetermined",
            Technique::NeedsImprovement => "Needs Improvement",
            Technique::Developing => "Developing",
            Technique::Good => "Good",
            Technique::Advanced => "Advanced",
            Technique::Excellent => "Excellent",
            Technique::Elite => "Elite",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test-specific measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "testType", rename_all = "kebab-case")]
pub enum MetricDetail {
    #[serde(rename_all = "camelCase")]
    VerticalJump {
        jump_height_cm: f64,
        takeoff_angle_deg: Option<f64>,
        landing_stability: f64,
    },
    #[serde(rename_all = "camelCase")]
    Squat {
        /// Knee flexion at the deepest point (180° minus minimum knee angle)
        squat_depth_deg: f64,
        min_knee_angle_deg: Option<f64>,
        knee_alignment: f64,
        rep_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Sprint {
        run_time_seconds: f64,
        /// Distance covered per step
        stride_length_m: f64,
        /// Steps per minute
        cadence_spm: f64,
        average_speed_mps: f64,
    },
    #[serde(rename_all = "camelCase")]
    PushUp {
        rep_count: u32,
        form_quality: f64,
        range_of_motion_deg: f64,
    },
}

/// Metrics produced by a test extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    /// Raw test score (0-100)
    pub score: f64,
    pub technique: Technique,
    #[serde(flatten)]
    pub detail: MetricDetail,
}

impl TestMetrics {
    pub fn test_type(&self) -> TestType {
        match self.detail {
            MetricDetail::VerticalJump { .. } => TestType::VerticalJump,
            MetricDetail::Squat { .. } => TestType::Squat,
            MetricDetail::Sprint { .. } => TestType::Sprint,
            MetricDetail::PushUp { .. } => TestType::PushUp,
        }
    }

    /// Repetitions performed; a detected jump counts as one
    pub fn rep_count(&self) -> u32 {
        match self.detail {
            MetricDetail::VerticalJump { jump_height_cm, .. } => u32::from(jump_height_cm > 0.0),
            MetricDetail::Squat { rep_count, .. } | MetricDetail::PushUp { rep_count, .. } => {
                rep_count
            }
            MetricDetail::Sprint { .. } => 0,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.technique != Technique::Undetermined
    }
}

/// Condition that raised a cheat verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CheatReason {
    #[serde(rename_all = "camelCase")]
    LowConfidence { mean_confidence: f64, floor: f64 },
    #[serde(rename_all = "camelCase")]
    ImplausibleMetric {
        metric: String,
        value: f64,
        limit: f64,
    },
    #[serde(rename_all = "camelCase")]
    ReplayedSignature { owner: Option<String> },
    #[serde(rename_all = "camelCase")]
    DurationMismatch {
        declared_seconds: f64,
        actual_seconds: f64,
        tolerance_seconds: f64,
    },
}

/// Detector-level summary of the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub pose_points: Vec<PoseFrame>,
    pub rep_count: u32,
    /// Composite score (0-100)
    pub biomechanical_score: f64,
    pub cheat_detected: bool,
    #[serde(default)]
    pub cheat_reasons: Vec<CheatReason>,
    /// Mean per-frame detector confidence (0-1)
    pub confidence_score: f64,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
}

/// Tamper-evident link in an athlete's assessment chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofChain {
    pub hash: String,
    pub previous_hash: Option<String>,
    pub integrity: bool,
}

/// Ranking band derived from the performance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankCategory {
    Elite,
    Advanced,
    Intermediate,
    Beginner,
    Novice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    pub percentile: u8,
    pub category: RankCategory,
}

/// Immutable result of one submitted recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub athlete_id: String,
    pub test_type: TestType,
    pub created_at: DateTime<Utc>,
    pub ai_analysis: AiAnalysis,
    pub kinetic_blueprint: KineticBlueprint,
    pub performance_metrics: TestMetrics,
    pub proof_chain: ProofChain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Ranking>,
}
