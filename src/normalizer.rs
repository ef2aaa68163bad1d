//! Pose sequence normalization
//!
//! This module validates a raw pose sequence and cleans it for blueprinting:
//! - Ordering, finiteness and frame-count checks (rejects with `InvalidSequence`)
//! - Per-frame detector confidence captured before filtering
//! - Keypoints under the confidence floor removed, never zeroed

use crate::config::NormalizerConfig;
use crate::error::AssessmentError;
use crate::types::{AssessmentInput, NormalizedSequence, PoseFrame, QualityFlag};
use tracing::{debug, warn};

/// Normalizer for validating and cleaning pose sequences
pub struct PoseNormalizer;

impl PoseNormalizer {
    /// Validate and clean a raw recording
    pub fn normalize(
        input: AssessmentInput,
        config: &NormalizerConfig,
    ) -> Result<NormalizedSequence, AssessmentError> {
        validate_header(&input)?;
        validate_frames(&input.frames)?;
        validate_frame_count(&input, config)?;

        let mut quality_flags = Vec::new();
        let mut frame_confidence = Vec::with_capacity(input.frames.len());
        let mut dropped_keypoints = 0;
        let mut empty_frames = 0;

        if has_repeated_timestamps(&input.frames) {
            quality_flags.push(QualityFlag::RepeatedTimestamps);
        }

        let mut frames = input.frames;
        for frame in &mut frames {
            frame_confidence.push(mean_confidence(frame));

            let before = frame.keypoints.len();
            frame
                .keypoints
                .retain(|_, kp| kp.confidence >= config.min_keypoint_confidence);
            dropped_keypoints += before - frame.keypoints.len();

            if frame.keypoints.is_empty() {
                empty_frames += 1;
            }
        }

        if dropped_keypoints > 0 {
            quality_flags.push(QualityFlag::LowConfidenceKeypoints);
        }
        if empty_frames > 0 {
            quality_flags.push(QualityFlag::EmptyFrames);
        }

        debug!(
            test_type = %input.test_type,
            frames = frames.len(),
            dropped_keypoints,
            empty_frames,
            "pose sequence normalized"
        );

        Ok(NormalizedSequence {
            test_type: input.test_type,
            declared_duration_seconds: input.declared_duration_seconds,
            distance_meters: input.distance_meters,
            frames,
            frame_confidence,
            dropped_keypoints,
            quality_flags,
        })
    }
}

fn reject(reason: String) -> AssessmentError {
    warn!(%reason, "pose sequence rejected");
    AssessmentError::InvalidSequence(reason)
}

fn validate_header(input: &AssessmentInput) -> Result<(), AssessmentError> {
    if input.frames.is_empty() {
        return Err(reject("sequence contains no frames".to_string()));
    }
    let declared = input.declared_duration_seconds;
    if !declared.is_finite() || declared < 0.0 {
        return Err(reject(format!("declared duration {declared} is not valid")));
    }
    if let Some(distance) = input.distance_meters {
        if !distance.is_finite() || distance <= 0.0 {
            return Err(reject(format!("declared distance {distance} is not valid")));
        }
    }
    Ok(())
}

fn validate_frames(frames: &[PoseFrame]) -> Result<(), AssessmentError> {
    let mut previous: Option<&PoseFrame> = None;

    for frame in frames {
        let ts = frame.timestamp_seconds;
        if !ts.is_finite() || ts < 0.0 {
            return Err(reject(format!(
                "frame {} has invalid timestamp {ts}",
                frame.frame_index
            )));
        }

        if let Some(prev) = previous {
            if frame.frame_index <= prev.frame_index {
                return Err(reject(format!(
                    "frame index {} follows {} (duplicate or decreasing)",
                    frame.frame_index, prev.frame_index
                )));
            }
            if ts < prev.timestamp_seconds {
                return Err(reject(format!(
                    "timestamp decreases at frame {}",
                    frame.frame_index
                )));
            }
        }

        for (joint, kp) in &frame.keypoints {
            if !kp.x.is_finite() || !kp.y.is_finite() {
                return Err(reject(format!(
                    "frame {} joint {joint} has non-finite coordinates",
                    frame.frame_index
                )));
            }
            if !(0.0..=1.0).contains(&kp.confidence) {
                return Err(reject(format!(
                    "frame {} joint {joint} has confidence {} outside [0, 1]",
                    frame.frame_index, kp.confidence
                )));
            }
        }

        previous = Some(frame);
    }

    Ok(())
}

/// Minimum frames required for the declared duration
pub fn required_frames(declared_duration_seconds: f64, config: &NormalizerConfig) -> usize {
    let expected = declared_duration_seconds * config.expected_frame_rate;
    ((expected * config.min_frame_ratio).ceil() as usize).max(1)
}

fn validate_frame_count(
    input: &AssessmentInput,
    config: &NormalizerConfig,
) -> Result<(), AssessmentError> {
    let required = required_frames(input.declared_duration_seconds, config);
    if input.frames.len() < required {
        return Err(reject(format!(
            "{} frames captured, at least {required} expected for {}s at {} fps",
            input.frames.len(),
            input.declared_duration_seconds,
            config.expected_frame_rate
        )));
    }
    Ok(())
}

fn has_repeated_timestamps(frames: &[PoseFrame]) -> bool {
    frames
        .windows(2)
        .any(|w| w[0].timestamp_seconds == w[1].timestamp_seconds)
}

/// Mean confidence over every keypoint the detector reported
fn mean_confidence(frame: &PoseFrame) -> f64 {
    if frame.keypoints.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.keypoints.values().map(|kp| kp.confidence).sum();
    sum / frame.keypoints.len() as f64
}
