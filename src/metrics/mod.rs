//! Test metric extractors
//!
//! One pure function per supported test type maps a kinetic blueprint to
//! domain metrics, a bounded score and a technique label. Extractors are
//! total: when a required signal cannot be computed they return zeroed
//! metrics with `Technique::Undetermined` instead of failing the pipeline.

mod jump;
mod push_up;
pub mod signal;
mod sprint;
mod squat;

use crate::config::MetricsConfig;
use crate::types::{KineticBlueprint, TestMetrics, TestType};
use tracing::debug;

/// Extract metrics for `test_type` from a blueprint
pub fn extract(
    test_type: TestType,
    blueprint: &KineticBlueprint,
    config: &MetricsConfig,
) -> TestMetrics {
    let metrics = match test_type {
        TestType::VerticalJump => jump::analyze(blueprint, &config.jump),
        TestType::Squat => squat::analyze(blueprint, &config.squat),
        TestType::Sprint => sprint::analyze(blueprint, &config.sprint),
        TestType::PushUp => push_up::analyze(blueprint, &config.push_up),
    };

    debug!(
        %test_type,
        score = metrics.score,
        technique = %metrics.technique,
        determined = metrics.is_determined(),
        "test metrics extracted"
    );
    metrics
}
