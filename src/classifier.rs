//! Exercise classification
//!
//! Infers the exercise (and through it the category) plus an intensity tier
//! from the rolling sample window when the operator has not declared them.
//! Learned classifiers plug in through [`ExerciseModel`]; the built-in
//! [`HeuristicClassifier`] implements the motion and heart-rate rules below.

use crate::catalog::{
    TargetMuscleCatalog, ENDURANCE_FALLBACK_EXERCISE, STRENGTH_FALLBACK_EXERCISE,
};
use crate::types::{ExerciseCategory, IntensityTier, UserProfile};
use crate::window::{dominant_lag, variance, SampleWindow};

/// Samples used for the vertical-acceleration variance test
const STRENGTH_WINDOW: usize = 10;

/// Vertical-acceleration variance above which motion looks like lifting ((m/s²)²)
const STRENGTH_VARIANCE_THRESHOLD: f64 = 4.0;

/// Instantaneous |acceleration| required alongside the variance test (m/s²)
const STRENGTH_ACCEL_THRESHOLD: f64 = 12.0;

/// Samples used for periodicity detection
const PERIODICITY_WINDOW: usize = 30;

/// Normalized autocorrelation a peak must exceed
const PERIODICITY_THRESHOLD: f64 = 0.5;

/// Cadence band accepted as endurance motion (Hz)
const ENDURANCE_BAND_HZ: (f64, f64) = (0.5, 2.0);

/// Samples after which the heart-rate fallback applies
const CLASSIFICATION_DEADLINE: usize = 60;

/// Mean heart rate above which the fallback picks endurance (bpm)
const FALLBACK_HR_THRESHOLD: f64 = 120.0;

/// Samples averaged for intensity resolution
const INTENSITY_WINDOW: usize = 30;

/// Samples required before a signal-based intensity decision
const INTENSITY_MIN_SAMPLES: usize = 10;

/// How a classification was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationBasis {
    /// Motion pattern matched a category rule
    Motion,
    /// No confident motion match before the deadline; heart-rate default
    Fallback,
    /// Supplied by an external model
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseClassification {
    pub exercise_name: String,
    pub category: ExerciseCategory,
    pub basis: ClassificationBasis,
}

impl ExerciseClassification {
    fn from_name(name: &str, basis: ClassificationBasis) -> Self {
        Self {
            exercise_name: name.to_string(),
            category: TargetMuscleCatalog::category_of(name),
            basis,
        }
    }
}

/// Strategy seam for exercise and intensity inference.
///
/// `samples_seen` counts every sample of the session, which may exceed the
/// window length once the ring buffer wraps.
pub trait ExerciseModel: Send + Sync {
    /// Attempt to name the exercise; `None` defers the decision
    fn classify_exercise(
        &self,
        window: &SampleWindow,
        samples_seen: usize,
    ) -> Option<ExerciseClassification>;

    /// Attempt to resolve the intensity tier; `None` defers the decision
    fn classify_intensity(
        &self,
        window: &SampleWindow,
        samples_seen: usize,
        profile: &UserProfile,
    ) -> Option<IntensityTier> {
        resolve_intensity(window, samples_seen, profile)
    }
}

/// Rule-based classifier over acceleration and heart rate
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn looks_like_strength(window: &SampleWindow) -> bool {
        let vertical = window.values(STRENGTH_WINDOW, |s| s.accel_z);
        if vertical.len() < STRENGTH_WINDOW {
            return false;
        }
        let spread = variance(&vertical).unwrap_or(0.0);
        let peak = window
            .latest()
            .and_then(|s| s.accel_magnitude())
            .unwrap_or(0.0);
        spread > STRENGTH_VARIANCE_THRESHOLD && peak > STRENGTH_ACCEL_THRESHOLD
    }

    fn cadence_hz(window: &SampleWindow) -> Option<f64> {
        let magnitudes = window.values(PERIODICITY_WINDOW, |s| s.accel_magnitude());
        if magnitudes.len() < PERIODICITY_WINDOW {
            return None;
        }
        let lag = dominant_lag(&magnitudes, PERIODICITY_THRESHOLD)?;
        let dt = window.sample_interval_sec(PERIODICITY_WINDOW)?;
        Some(1.0 / (lag as f64 * dt))
    }
}

impl ExerciseModel for HeuristicClassifier {
    fn classify_exercise(
        &self,
        window: &SampleWindow,
        samples_seen: usize,
    ) -> Option<ExerciseClassification> {
        if Self::looks_like_strength(window) {
            return Some(ExerciseClassification::from_name(
                STRENGTH_FALLBACK_EXERCISE,
                ClassificationBasis::Motion,
            ));
        }

        if let Some(hz) = Self::cadence_hz(window) {
            if (ENDURANCE_BAND_HZ.0..=ENDURANCE_BAND_HZ.1).contains(&hz) {
                return Some(ExerciseClassification::from_name(
                    ENDURANCE_FALLBACK_EXERCISE,
                    ClassificationBasis::Motion,
                ));
            }
        }

        if samples_seen >= CLASSIFICATION_DEADLINE {
            let mean_hr = window.mean_of(PERIODICITY_WINDOW, |s| s.heart_rate);
            let name = match mean_hr {
                Some(hr) if hr > FALLBACK_HR_THRESHOLD => ENDURANCE_FALLBACK_EXERCISE,
                _ => STRENGTH_FALLBACK_EXERCISE,
            };
            return Some(ExerciseClassification::from_name(
                name,
                ClassificationBasis::Fallback,
            ));
        }

        None
    }
}

/// Intensity tier from heart-rate reserve, then power, then a default.
pub fn resolve_intensity(
    window: &SampleWindow,
    samples_seen: usize,
    profile: &UserProfile,
) -> Option<IntensityTier> {
    if samples_seen >= INTENSITY_MIN_SAMPLES {
        if let Some(hr) = window.mean_of(INTENSITY_WINDOW, |s| s.heart_rate) {
            return Some(IntensityTier::from_heart_rate_reserve(
                profile.heart_rate_reserve(hr),
            ));
        }
        if let Some(watts) = window.mean_of(INTENSITY_WINDOW, |s| s.power) {
            return Some(IntensityTier::from_power(watts));
        }
    }
    (samples_seen >= INTENSITY_WINDOW).then_some(IntensityTier::Moderate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorSample;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::f64::consts::PI;

    fn t(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::milliseconds(i as i64 * 100)
    }

    fn profile() -> UserProfile {
        UserProfile::new(62.0, 185.0)
    }

    #[test]
    fn test_strength_motion() {
        let mut window = SampleWindow::default();
        for i in 0..10 {
            let z = if i % 2 == 0 { 5.0 } else { 16.0 };
            window.push(SensorSample::at(t(i)).with_acceleration(0.0, 0.0, z));
        }
        let result = HeuristicClassifier.classify_exercise(&window, 10).unwrap();
        assert_eq!(result.category, ExerciseCategory::Strength);
        assert_eq!(result.exercise_name, "squat");
        assert_eq!(result.basis, ClassificationBasis::Motion);
    }

    #[test]
    fn test_periodic_motion_is_endurance() {
        let mut window = SampleWindow::default();
        for i in 0..30 {
            // 1 Hz bounce sampled at 10 Hz
            let z = 9.81 + 2.0 * (2.0 * PI * i as f64 / 10.0).sin();
            window.push(SensorSample::at(t(i)).with_acceleration(0.0, 0.0, z));
        }
        let result = HeuristicClassifier.classify_exercise(&window, 30).unwrap();
        assert_eq!(result.category, ExerciseCategory::Endurance);
        assert_eq!(result.exercise_name, "running");
    }

    #[test]
    fn test_cadence_outside_band_is_not_endurance() {
        let mut window = SampleWindow::default();
        for i in 0..30 {
            // 2.5 Hz at 10 Hz sampling: period of 4 samples
            let z = 9.81 + 1.5 * (2.0 * PI * i as f64 / 4.0).sin();
            window.push(SensorSample::at(t(i)).with_acceleration(0.0, 0.0, z));
        }
        assert!(HeuristicClassifier.classify_exercise(&window, 30).is_none());
    }

    #[test]
    fn test_undecided_before_deadline() {
        let mut window = SampleWindow::default();
        for i in 0..59 {
            window.push(SensorSample::at(t(i)).with_heart_rate(140.0));
        }
        assert!(HeuristicClassifier.classify_exercise(&window, 59).is_none());
    }

    #[test]
    fn test_heart_rate_fallback() {
        let mut window = SampleWindow::default();
        for i in 0..60 {
            window.push(SensorSample::at(t(i)).with_heart_rate(140.0));
        }
        let result = HeuristicClassifier.classify_exercise(&window, 60).unwrap();
        assert_eq!(result.exercise_name, "running");
        assert_eq!(result.basis, ClassificationBasis::Fallback);

        let mut window = SampleWindow::default();
        for i in 0..60 {
            window.push(SensorSample::at(t(i)).with_heart_rate(95.0));
        }
        let result = HeuristicClassifier.classify_exercise(&window, 60).unwrap();
        assert_eq!(result.exercise_name, "squat");
    }

    #[test]
    fn test_intensity_from_heart_rate() {
        let mut window = SampleWindow::default();
        for i in 0..10 {
            // reserve (170 - 62) / 123 = 0.878
            window.push(SensorSample::at(t(i)).with_heart_rate(170.0).with_power(20.0));
        }
        assert_eq!(
            resolve_intensity(&window, 10, &profile()),
            Some(IntensityTier::VeryHigh)
        );
        assert_eq!(resolve_intensity(&window, 9, &profile()), None);
    }

    #[test]
    fn test_intensity_from_power() {
        let mut window = SampleWindow::default();
        for i in 0..10 {
            window.push(SensorSample::at(t(i)).with_power(120.0));
        }
        assert_eq!(
            resolve_intensity(&window, 10, &profile()),
            Some(IntensityTier::High)
        );
    }

    #[test]
    fn test_intensity_default_after_thirty_samples() {
        let mut window = SampleWindow::default();
        for i in 0..30 {
            window.push(SensorSample::at(t(i)).with_emg(0.4));
        }
        assert_eq!(resolve_intensity(&window, 29, &profile()), None);
        assert_eq!(
            resolve_intensity(&window, 30, &profile()),
            Some(IntensityTier::Moderate)
        );
    }
}
