//! Fatigue estimation
//!
//! Produces a 0-1 fatigue scalar per sample. The model is chosen with the
//! control strategy:
//!
//! - [`ControlStrategy::Elapsed`] pairs with the elapsed-time model, which
//!   blends session time against heart-rate drift from an early baseline.
//! - [`ControlStrategy::HeartRateReserve`] pairs with the continuous model,
//!   a leaky integrator over heart-rate reserve and EMG amplitude.

use crate::config::ControlStrategy;
use crate::types::{SensorSample, UserProfile};

/// Samples averaged into the heart-rate baseline
const BASELINE_SAMPLES: usize = 10;

/// Session length treated as full time fatigue (s)
const FULL_FATIGUE_SEC: f64 = 3600.0;

/// Weight of normalized elapsed time
const TIME_WEIGHT: f64 = 0.7;

/// Weight of normalized heart-rate drift
const DRIFT_WEIGHT: f64 = 0.3;

/// Relative drift treated as maximal
const MAX_DRIFT: f64 = 0.3;

/// Weight of the previous estimate in the continuous model
const RETENTION: f64 = 0.8;

/// Share of heart-rate reserve in the continuous model's input
const RESERVE_SHARE: f64 = 0.4;

/// Share of the EMG component in the continuous model's input
const EMG_SHARE: f64 = 0.6;

/// EMG amplitude to fatigue component gain
const EMG_GAIN: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct FatigueEstimator {
    strategy: ControlStrategy,
    fatigue: f64,
    baseline_hrs: Vec<f64>,
    last_hr: Option<f64>,
}

impl FatigueEstimator {
    pub fn new(strategy: ControlStrategy) -> Self {
        Self {
            strategy,
            fatigue: 0.0,
            baseline_hrs: Vec::with_capacity(BASELINE_SAMPLES),
            last_hr: None,
        }
    }

    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    /// Mean heart rate of the first samples of the session, once known
    pub fn baseline_hr(&self) -> Option<f64> {
        crate::window::mean(&self.baseline_hrs)
    }

    /// Fold in one sample and return the updated estimate in [0, 1]
    pub fn update(&mut self, sample: &SensorSample, elapsed_sec: f64, profile: &UserProfile) -> f64 {
        let heart_rate = sample.heart_rate.filter(|hr| hr.is_finite());
        if let Some(hr) = heart_rate {
            if self.baseline_hrs.len() < BASELINE_SAMPLES {
                self.baseline_hrs.push(hr);
            }
            self.last_hr = Some(hr);
        }

        let next = match self.strategy {
            ControlStrategy::Elapsed => self.elapsed_model(elapsed_sec),
            ControlStrategy::HeartRateReserve => self.continuous_model(sample, profile),
        };
        self.fatigue = if next.is_finite() {
            next.clamp(0.0, 1.0)
        } else {
            self.fatigue
        };
        self.fatigue
    }

    fn elapsed_model(&self, elapsed_sec: f64) -> f64 {
        let time = (elapsed_sec.max(0.0) / FULL_FATIGUE_SEC).min(1.0);
        let drift = match (self.last_hr, self.baseline_hr()) {
            (Some(hr), Some(base)) if base > 0.0 => {
                ((hr - base) / base).clamp(0.0, MAX_DRIFT) / MAX_DRIFT
            }
            _ => 0.0,
        };
        TIME_WEIGHT * time + DRIFT_WEIGHT * drift
    }

    fn continuous_model(&self, sample: &SensorSample, profile: &UserProfile) -> f64 {
        let reserve = sample
            .heart_rate
            .filter(|hr| hr.is_finite())
            .map(|hr| profile.heart_rate_reserve(hr));
        let emg = sample
            .emg
            .filter(|e| e.is_finite())
            .map(|e| (EMG_GAIN * e).clamp(0.0, 1.0));

        // A lone signal carries the full input weight; absent is not zero.
        let input = match (reserve, emg) {
            (Some(r), Some(e)) => RESERVE_SHARE * r + EMG_SHARE * e,
            (Some(r), None) => r,
            (None, Some(e)) => e,
            (None, None) => return self.fatigue,
        };
        RETENTION * self.fatigue + (1.0 - RETENTION) * input
    }
}
