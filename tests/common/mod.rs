//! Common fixtures for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use kinetic_blueprint::{AssessmentInput, AssessmentRequest, Joint, Keypoint, PoseFrame, TestType};

/// Upright figure in metres, image convention (y grows downward)
pub const STANDING_BODY: [(Joint, f64, f64); 13] = [
    (Joint::Nose, 0.0, 0.1),
    (Joint::LeftShoulder, -0.2, 0.4),
    (Joint::RightShoulder, 0.2, 0.4),
    (Joint::LeftElbow, -0.2, 0.7),
    (Joint::RightElbow, 0.2, 0.7),
    (Joint::LeftWrist, -0.2, 1.0),
    (Joint::RightWrist, 0.2, 1.0),
    (Joint::LeftHip, -0.15, 0.9),
    (Joint::RightHip, 0.15, 0.9),
    (Joint::LeftKnee, -0.15, 1.3),
    (Joint::RightKnee, 0.15, 1.3),
    (Joint::LeftAnkle, -0.15, 1.7),
    (Joint::RightAnkle, 0.15, 1.7),
];

/// Standing figure shifted by `(dx, -rise)` with every keypoint at `confidence`
pub fn standing_frame(index: u32, fps: f64, dx: f64, rise: f64, confidence: f64) -> PoseFrame {
    STANDING_BODY.iter().fold(
        PoseFrame::new(index, index as f64 / fps),
        |frame, (joint, x, y)| {
            frame.with_keypoint(*joint, Keypoint::new(x + dx, y - rise, confidence))
        },
    )
}

/// 30 frames over one second; the body rises 0.5 m and returns to baseline
pub fn vertical_jump(confidence: f64) -> AssessmentInput {
    let frames = (0..30u32)
        .map(|i| {
            let rise = if (5..=25).contains(&i) {
                0.5 * (std::f64::consts::PI * (i - 5) as f64 / 20.0).sin()
            } else {
                0.0
            };
            standing_frame(i, 30.0, 0.0, rise, confidence)
        })
        .collect();
    AssessmentInput {
        test_type: TestType::VerticalJump,
        declared_duration_seconds: 1.0,
        distance_meters: None,
        frames,
    }
}

/// Motionless figure filmed at `fps` for `span_seconds`
pub fn still_capture(
    test_type: TestType,
    declared_duration_seconds: f64,
    span_seconds: f64,
    fps: f64,
) -> AssessmentInput {
    let count = (span_seconds * fps).round() as u32 + 1;
    AssessmentInput {
        test_type,
        declared_duration_seconds,
        distance_meters: None,
        frames: (0..count)
            .map(|i| standing_frame(i, fps, 0.0, 0.0, 0.9))
            .collect(),
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

pub fn request(athlete_id: &str, assessment_id: &str) -> AssessmentRequest {
    AssessmentRequest::new(athlete_id)
        .with_assessment_id(assessment_id)
        .with_created_at(fixed_time())
}
