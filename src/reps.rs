//! Repetition detection
//!
//! Counts discrete repetitions for rep-based categories. Strength sets are
//! detected as a rising crossing of vertical acceleration; HIIT movements as
//! energy spikes in acceleration magnitude. Each rule has a refractory
//! interval during which no second repetition can be credited.

use crate::types::{ExerciseCategory, SensorSample};
use crate::window::{mean, SampleWindow};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Vertical acceleration the rising edge must clear (m/s²)
const STRENGTH_RISE_THRESHOLD: f64 = 2.0;

/// Minimum spacing between strength repetitions (s)
const STRENGTH_REFRACTORY_SEC: f64 = 1.0;

/// Samples in the HIIT baseline mean, excluding the current one
const HIIT_BASELINE_SAMPLES: usize = 5;

/// Spike ratio over the baseline mean
const HIIT_SPIKE_RATIO: f64 = 1.5;

/// Absolute magnitude floor for a HIIT spike (m/s²)
const HIIT_SPIKE_FLOOR: f64 = 15.0;

/// Minimum spacing between HIIT repetitions (s)
const HIIT_REFRACTORY_SEC: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct RepetitionDetector {
    count: u32,
    last_rep_at: Option<DateTime<Utc>>,
}

impl RepetitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_rep_at(&self) -> Option<DateTime<Utc>> {
        self.last_rep_at
    }

    /// Inspect the newest sample in `window` and credit at most one repetition.
    ///
    /// Returns the increment (0 or 1). Non-rep categories always return 0.
    pub fn update(&mut self, category: ExerciseCategory, window: &SampleWindow) -> u32 {
        let Some(current) = window.latest() else {
            return 0;
        };

        let (detected, refractory) = match category {
            ExerciseCategory::Strength => (
                Self::rising_crossing(window.previous(), current),
                STRENGTH_REFRACTORY_SEC,
            ),
            ExerciseCategory::Hiit => (Self::energy_spike(window, current), HIIT_REFRACTORY_SEC),
            _ => return 0,
        };

        if !detected || self.in_refractory(current.timestamp, refractory) {
            return 0;
        }

        self.count += 1;
        self.last_rep_at = Some(current.timestamp);
        debug!(
            category = category.as_str(),
            rep_count = self.count,
            "repetition detected"
        );
        1
    }

    /// Whether a repetition was credited within `seconds` before `at`
    pub fn within(&self, at: DateTime<Utc>, seconds: f64) -> bool {
        self.last_rep_at.is_some_and(|last| {
            let since = (at - last).num_milliseconds() as f64 / 1000.0;
            (0.0..=seconds).contains(&since)
        })
    }

    fn in_refractory(&self, at: DateTime<Utc>, seconds: f64) -> bool {
        self.last_rep_at.is_some_and(|last| {
            let since = (at - last).num_milliseconds() as f64 / 1000.0;
            since < seconds
        })
    }

    fn rising_crossing(previous: Option<&SensorSample>, current: &SensorSample) -> bool {
        match (previous.and_then(|s| s.accel_z), current.accel_z) {
            (Some(before), Some(now)) => before < 0.0 && now > STRENGTH_RISE_THRESHOLD,
            _ => false,
        }
    }

    fn energy_spike(window: &SampleWindow, current: &SensorSample) -> bool {
        let Some(magnitude) = current.accel_magnitude() else {
            return false;
        };
        // Baseline excludes the sample under test
        let baseline: Vec<f64> = window
            .recent(HIIT_BASELINE_SAMPLES + 1)
            .take(HIIT_BASELINE_SAMPLES)
            .filter_map(|s| s.accel_magnitude())
            .collect();
        if baseline.len() < HIIT_BASELINE_SAMPLES {
            return false;
        }
        mean(&baseline).is_some_and(|m| {
            magnitude > HIIT_SPIKE_RATIO * m && magnitude > HIIT_SPIKE_FLOOR
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn run(category: ExerciseCategory, samples: Vec<SensorSample>) -> (RepetitionDetector, Vec<u32>) {
        let mut window = SampleWindow::default();
        let mut detector = RepetitionDetector::new();
        let increments = samples
            .into_iter()
            .map(|s| {
                window.push(s);
                detector.update(category, &window)
            })
            .collect();
        (detector, increments)
    }

    fn z(ms: i64, value: f64) -> SensorSample {
        SensorSample::at(t(ms)).with_vertical_acceleration(value)
    }

    #[test]
    fn test_strength_crossings_counted() {
        let (detector, increments) = run(
            ExerciseCategory::Strength,
            vec![z(0, -9.8), z(100, 3.0), z(1200, -9.8), z(1300, 3.0)],
        );
        assert_eq!(increments, vec![0, 1, 0, 1]);
        assert_eq!(detector.count(), 2);
        assert_eq!(detector.last_rep_at(), Some(t(1300)));
    }

    #[test]
    fn test_strength_refractory() {
        let (detector, increments) = run(
            ExerciseCategory::Strength,
            vec![z(0, -9.8), z(100, 3.0), z(400, -9.8), z(500, 3.0)],
        );
        assert_eq!(increments, vec![0, 1, 0, 0]);
        assert_eq!(detector.count(), 1);
    }

    #[test]
    fn test_strength_needs_clear_rise() {
        let (detector, _) = run(
            ExerciseCategory::Strength,
            vec![z(0, -9.8), z(100, 1.5), z(2000, 0.5), z(3000, 3.0)],
        );
        assert_eq!(detector.count(), 0);
    }

    #[test]
    fn test_hiit_energy_spike() {
        let mut samples: Vec<SensorSample> = (0..5)
            .map(|i| SensorSample::at(t(i * 100)).with_acceleration(0.0, 0.0, 9.8))
            .collect();
        samples.push(SensorSample::at(t(500)).with_acceleration(0.0, 0.0, 20.0));
        // Inside the 0.5 s refractory window
        samples.push(SensorSample::at(t(700)).with_acceleration(0.0, 0.0, 25.0));
        let (detector, increments) = run(ExerciseCategory::Hiit, samples);
        assert_eq!(increments, vec![0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(detector.count(), 1);
    }

    #[test]
    fn test_hiit_spike_below_floor() {
        let mut samples: Vec<SensorSample> = (0..5)
            .map(|i| SensorSample::at(t(i * 100)).with_acceleration(0.0, 0.0, 5.0))
            .collect();
        samples.push(SensorSample::at(t(500)).with_acceleration(0.0, 0.0, 12.0));
        let (detector, _) = run(ExerciseCategory::Hiit, samples);
        assert_eq!(detector.count(), 0);
    }

    #[test]
    fn test_non_rep_category_never_counts() {
        let (detector, _) = run(
            ExerciseCategory::Endurance,
            vec![z(0, -9.8), z(100, 3.0), z(1200, -9.8), z(1300, 3.0)],
        );
        assert_eq!(detector.count(), 0);
    }

    #[test]
    fn test_within_boost_window() {
        let (detector, _) = run(ExerciseCategory::Strength, vec![z(0, -9.8), z(100, 3.0)]);
        assert!(detector.within(t(2000), 2.0));
        assert!(!detector.within(t(2200), 2.0));
    }
}
