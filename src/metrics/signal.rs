//! Angle-trajectory helpers shared by the extractors

use crate::types::AngleSample;
use std::collections::BTreeMap;

/// One counted repetition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repetition {
    /// Frame of the deepest point
    pub frame: u32,
    pub timestamp_seconds: f64,
    /// Deepest angle reached
    pub degrees: f64,
    /// Highest angle between the previous rep and this one
    pub peak_before_deg: f64,
}

impl Repetition {
    pub fn swing_deg(&self) -> f64 {
        (self.peak_before_deg - self.degrees).max(0.0)
    }
}

/// Merge left and right trajectories, averaging frames where both sides exist
pub fn bilateral(left: &[AngleSample], right: &[AngleSample]) -> Vec<AngleSample> {
    let mut by_frame: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();
    for s in left.iter().chain(right) {
        let entry = by_frame.entry(s.frame).or_insert((s.timestamp_seconds, 0.0, 0));
        entry.1 += s.degrees;
        entry.2 += 1;
    }
    by_frame
        .into_iter()
        .map(|(frame, (timestamp_seconds, sum, n))| AngleSample {
            frame,
            timestamp_seconds,
            degrees: sum / n as f64,
        })
        .collect()
}

/// Count repetitions as local minima at or below `threshold_deg`.
///
/// Minima closer than `min_rep_seconds` to the previous counted rep merge into
/// it (keeping the deeper angle), so noise around the bottom of one rep is not
/// counted twice. The gap is measured from the rep's current deepest point,
/// so consecutive counted reps are always at least `min_rep_seconds` apart.
/// Endpoints are never minima.
pub fn detect_reps(
    samples: &[AngleSample],
    threshold_deg: f64,
    min_rep_seconds: f64,
) -> Vec<Repetition> {
    let mut reps: Vec<Repetition> = Vec::new();
    let mut segment_start = 0;

    for i in 1..samples.len().saturating_sub(1) {
        let (prev, curr, next) = (samples[i - 1], samples[i], samples[i + 1]);
        let is_minimum = curr.degrees <= prev.degrees && curr.degrees < next.degrees;
        if !is_minimum || curr.degrees > threshold_deg {
            continue;
        }

        if let Some(last) = reps.last_mut() {
            if curr.timestamp_seconds - last.timestamp_seconds < min_rep_seconds {
                if curr.degrees < last.degrees {
                    last.frame = curr.frame;
                    last.timestamp_seconds = curr.timestamp_seconds;
                    last.degrees = curr.degrees;
                }
                segment_start = i;
                continue;
            }
        }

        let peak_before_deg = samples[segment_start..=i]
            .iter()
            .map(|s| s.degrees)
            .fold(f64::MIN, f64::max);

        reps.push(Repetition {
            frame: curr.frame,
            timestamp_seconds: curr.timestamp_seconds,
            degrees: curr.degrees,
            peak_before_deg,
        });
        segment_start = i;
    }

    reps
}

/// Number of oscillation cycles, counted as upward crossings of the mean
pub fn count_cycles(samples: &[AngleSample]) -> usize {
    if samples.len() < 3 {
        return 0;
    }
    let mean = samples.iter().map(|s| s.degrees).sum::<f64>() / samples.len() as f64;
    samples
        .windows(2)
        .filter(|w| w[0].degrees < mean && w[1].degrees >= mean)
        .count()
}

pub fn min_degrees(samples: &[AngleSample]) -> Option<f64> {
    samples.iter().map(|s| s.degrees).reduce(f64::min)
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
