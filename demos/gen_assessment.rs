//! Generate a vertical-jump assessment for validation testing

use kinetic_blueprint::{AssessmentInput, Joint, Keypoint, KineticEngine, PoseFrame, TestType};

const FPS: f64 = 30.0;

fn frame(index: u32, rise: f64) -> PoseFrame {
    let body = [
        (Joint::Nose, 0.0, 0.1),
        (Joint::LeftShoulder, -0.2, 0.4),
        (Joint::RightShoulder, 0.2, 0.4),
        (Joint::LeftElbow, -0.22, 0.7),
        (Joint::RightElbow, 0.22, 0.7),
        (Joint::LeftWrist, -0.22, 1.0),
        (Joint::RightWrist, 0.22, 1.0),
        (Joint::LeftHip, -0.15, 0.9),
        (Joint::RightHip, 0.15, 0.9),
        (Joint::LeftKnee, -0.16, 1.3),
        (Joint::RightKnee, 0.16, 1.3),
        (Joint::LeftAnkle, -0.15, 1.7),
        (Joint::RightAnkle, 0.15, 1.7),
    ];
    body.iter()
        .fold(PoseFrame::new(index, index as f64 / FPS), |f, (joint, x, y)| {
            f.with_keypoint(*joint, Keypoint::new(*x, y - rise, 0.92))
        })
}

fn main() {
    // Stand for 10 frames, 45 cm flight, land and hold
    let frames = (0..45u32)
        .map(|i| {
            let rise = if (10..=30).contains(&i) {
                0.45 * (std::f64::consts::PI * (i - 10) as f64 / 20.0).sin()
            } else {
                0.0
            };
            frame(i, rise)
        })
        .collect();

    let input = AssessmentInput {
        test_type: TestType::VerticalJump,
        declared_duration_seconds: 1.5,
        distance_meters: None,
        frames,
    };

    let engine = KineticEngine::default();
    match engine.submit_with_report(input, "demo-athlete") {
        Ok((assessment, report)) => {
            match serde_json::to_string_pretty(&assessment) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: {e:?}"),
            }
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: {e:?}"),
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
