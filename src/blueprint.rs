//! Kinetic blueprint generation
//!
//! This module derives the biomechanical fingerprint of a normalized sequence:
//! - Sparse joint-angle trajectories (three-point angles per frame)
//! - Movement pattern (centroid velocity, acceleration, confidence stability)
//! - Content-addressed signature over quantized angle summaries

use crate::config::BlueprintConfig;
use crate::error::AssessmentError;
use crate::types::{
    AngleDefinition, AngleSample, Joint, KineticBlueprint, MovementSample, NormalizedSequence,
    Point2, PoseFrame,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Segments shorter than this (in coordinate units) have no direction
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Generator for kinetic blueprints
pub struct BlueprintGenerator;

impl BlueprintGenerator {
    /// Build the blueprint for a normalized sequence
    pub fn generate(
        sequence: &NormalizedSequence,
        config: &BlueprintConfig,
    ) -> Result<KineticBlueprint, AssessmentError> {
        let joint_angles = compute_joint_angles(&sequence.frames);

        let covered = frames_with_angles(&joint_angles);
        let total = sequence.frames.len();
        let coverage = if total > 0 {
            covered as f64 / total as f64
        } else {
            0.0
        };

        if coverage < config.min_angle_coverage || covered == 0 {
            warn!(covered, total, coverage, "too few frames produced joint angles");
            return Err(AssessmentError::InsufficientPoseData(format!(
                "{covered} of {total} frames produced a joint angle (minimum ratio {})",
                config.min_angle_coverage
            )));
        }

        let movement_pattern = compute_movement_pattern(&sequence.frames, config);
        let signature = compute_signature(&joint_angles);

        debug!(
            covered,
            total,
            joints = joint_angles.len(),
            %signature,
            "kinetic blueprint generated"
        );

        Ok(KineticBlueprint {
            joint_angles,
            movement_pattern,
            signature,
        })
    }
}

/// Angle at `vertex` between the segments towards `a` and `c`, in degrees
pub fn three_point_angle(a: Point2, vertex: Point2, c: Point2) -> Option<f64> {
    angle_between(
        (a.x - vertex.x, a.y - vertex.y),
        (c.x - vertex.x, c.y - vertex.y),
    )
}

fn angle_between(u: (f64, f64), v: (f64, f64)) -> Option<f64> {
    let len_u = (u.0 * u.0 + u.1 * u.1).sqrt();
    let len_v = (v.0 * v.0 + v.1 * v.1).sqrt();
    if len_u < MIN_SEGMENT_LENGTH || len_v < MIN_SEGMENT_LENGTH {
        return None;
    }
    let cos = ((u.0 * v.0 + u.1 * v.1) / (len_u * len_v)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Angle of `joint` in `frame`, if every keypoint it needs is present
pub fn joint_angle(frame: &PoseFrame, joint: Joint) -> Option<f64> {
    let vertex = frame.get(joint)?.position();
    match joint.angle_definition()? {
        AngleDefinition::Segments(a, c) => {
            let a = frame.get(a)?.position();
            let c = frame.get(c)?.position();
            three_point_angle(a, vertex, c)
        }
        AngleDefinition::FromVertical(neighbour) => {
            let n = frame.get(neighbour)?.position();
            // y grows downward, so "up" is negative y
            angle_between((n.x - vertex.x, n.y - vertex.y), (0.0, -1.0))
        }
    }
}

fn compute_joint_angles(frames: &[PoseFrame]) -> BTreeMap<Joint, Vec<AngleSample>> {
    let mut angles = BTreeMap::new();

    for joint in Joint::ANGLE_JOINTS {
        let samples: Vec<AngleSample> = frames
            .iter()
            .filter_map(|frame| {
                joint_angle(frame, joint).map(|degrees| AngleSample {
                    frame: frame.frame_index,
                    timestamp_seconds: frame.timestamp_seconds,
                    degrees,
                })
            })
            .collect();

        if !samples.is_empty() {
            angles.insert(joint, samples);
        }
    }

    angles
}

fn frames_with_angles(angles: &BTreeMap<Joint, Vec<AngleSample>>) -> usize {
    let mut frames: Vec<u32> = angles
        .values()
        .flat_map(|samples| samples.iter().map(|s| s.frame))
        .collect();
    frames.sort_unstable();
    frames.dedup();
    frames.len()
}

fn centroid(frame: &PoseFrame, units_per_meter: f64) -> Option<Point2> {
    if frame.keypoints.is_empty() {
        return None;
    }
    let n = frame.keypoints.len() as f64;
    let (sx, sy) = frame
        .keypoints
        .values()
        .fold((0.0, 0.0), |(sx, sy), kp| (sx + kp.x, sy + kp.y));
    Some(Point2 {
        x: sx / n / units_per_meter,
        y: sy / n / units_per_meter,
    })
}

/// Variance of per-joint confidence changes between two frames
fn confidence_change_variance(prev: &PoseFrame, curr: &PoseFrame) -> Option<f64> {
    let deltas: Vec<f64> = curr
        .keypoints
        .iter()
        .filter_map(|(joint, kp)| prev.get(*joint).map(|p| kp.confidence - p.confidence))
        .collect();

    if deltas.is_empty() {
        return None;
    }
    let n = deltas.len() as f64;
    let mean = deltas.iter().sum::<f64>() / n;
    Some(deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n)
}

fn compute_movement_pattern(frames: &[PoseFrame], config: &BlueprintConfig) -> Vec<MovementSample> {
    let mut pattern: Vec<MovementSample> = Vec::with_capacity(frames.len());
    // Most recent frame that had a centroid
    let mut last_seen: Option<(Point2, f64)> = None;

    for (i, frame) in frames.iter().enumerate() {
        let c = centroid(frame, config.units_per_meter);
        let ts = frame.timestamp_seconds;

        let sample = match pattern.last() {
            None => MovementSample {
                frame: frame.frame_index,
                timestamp_seconds: ts,
                centroid: c,
                velocity: 0.0,
                acceleration: 0.0,
                stability: 1.0,
            },
            Some(prev) => {
                let velocity = match (c, last_seen) {
                    (Some(curr), Some((seen, seen_ts))) if ts > seen_ts => {
                        curr.distance(&seen) / (ts - seen_ts)
                    }
                    _ => prev.velocity,
                };

                let dt = ts - prev.timestamp_seconds;
                let acceleration = if dt > 0.0 {
                    (velocity - prev.velocity) / dt
                } else {
                    0.0
                };

                let stability = confidence_change_variance(&frames[i - 1], frame)
                    .map(|var| 1.0 / (1.0 + var / config.stability_variance_scale))
                    .unwrap_or(prev.stability);

                MovementSample {
                    frame: frame.frame_index,
                    timestamp_seconds: ts,
                    centroid: c,
                    velocity,
                    acceleration,
                    stability,
                }
            }
        };

        if let Some(curr) = c {
            last_seen = Some((curr, ts));
        }
        pattern.push(sample);
    }

    pattern
}

/// Quantize to tenths of a degree
fn quantize(degrees: f64) -> i64 {
    (degrees * 10.0).round() as i64
}

/// Canonical text that the signature hashes
///
/// One `joint=mean:range:count;` entry per angle joint in canonical order,
/// with `joint=-;` for joints that produced no angle.
pub fn signature_input(joint_angles: &BTreeMap<Joint, Vec<AngleSample>>) -> String {
    let mut input = String::new();

    for joint in Joint::ANGLE_JOINTS {
        match joint_angles.get(&joint).filter(|s| !s.is_empty()) {
            Some(samples) => {
                let n = samples.len() as f64;
                let mean = samples.iter().map(|s| s.degrees).sum::<f64>() / n;
                let (min, max) = samples.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
                    (lo.min(s.degrees), hi.max(s.degrees))
                });
                input.push_str(&format!(
                    "{}={}:{}:{};",
                    joint.as_str(),
                    quantize(mean),
                    quantize(max - min),
                    samples.len()
                ));
            }
            None => input.push_str(&format!("{}=-;", joint.as_str())),
        }
    }

    input
}

/// Hex SHA-256 of the signature input
pub fn compute_signature(joint_angles: &BTreeMap<Joint, Vec<AngleSample>>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature_input(joint_angles).as_bytes());
    hex::encode(hasher.finalize())
}
