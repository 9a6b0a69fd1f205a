//! Rolling sample window
//!
//! A fixed-capacity ring buffer over the most recent sensor samples. Every
//! "last N samples" statistic used by the classifier, phase tracker and
//! repetition detector is computed over this window, so memory stays bounded
//! no matter how long a session runs.

use crate::types::SensorSample;
use std::collections::VecDeque;

/// Default number of samples retained
pub const DEFAULT_WINDOW_CAPACITY: usize = 64;

/// Smallest capacity that still covers two back-to-back 30-sample windows
pub const MIN_WINDOW_CAPACITY: usize = 60;

/// Ring buffer of recent samples, oldest first
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<SensorSample>,
    capacity: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl SampleWindow {
    /// Create a window; capacities below [`MIN_WINDOW_CAPACITY`] are raised to it
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_WINDOW_CAPACITY);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: SensorSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// The sample before the latest one
    pub fn previous(&self) -> Option<&SensorSample> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        self.samples.get(len - 2)
    }

    /// The last `n` samples in arrival order
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter().skip(self.samples.len().saturating_sub(n))
    }

    /// The `n` samples immediately before the last `skip` samples
    fn before(&self, skip: usize, n: usize) -> impl Iterator<Item = &SensorSample> {
        let end = self.samples.len().saturating_sub(skip);
        self.samples.iter().take(end).skip(end.saturating_sub(n))
    }

    /// Present values of a signal over the last `n` samples
    pub fn values<F>(&self, n: usize, signal: F) -> Vec<f64>
    where
        F: Fn(&SensorSample) -> Option<f64>,
    {
        self.recent(n).filter_map(signal).collect()
    }

    /// Mean of a signal over the last `n` samples, ignoring absent values
    pub fn mean_of<F>(&self, n: usize, signal: F) -> Option<f64>
    where
        F: Fn(&SensorSample) -> Option<f64>,
    {
        mean(&self.values(n, signal))
    }

    /// Means of a signal over the last `n` samples and the `n` before them.
    ///
    /// Returns `(prior, current)` once at least `2n` samples are buffered and
    /// both windows carry the signal.
    pub fn consecutive_means<F>(&self, n: usize, signal: F) -> Option<(f64, f64)>
    where
        F: Fn(&SensorSample) -> Option<f64>,
    {
        if n == 0 || self.samples.len() < 2 * n {
            return None;
        }
        let prior: Vec<f64> = self.before(n, n).filter_map(&signal).collect();
        let current: Vec<f64> = self.recent(n).filter_map(&signal).collect();
        Some((mean(&prior)?, mean(&current)?))
    }

    /// Mean spacing between consecutive samples over the last `n` (seconds)
    pub fn sample_interval_sec(&self, n: usize) -> Option<f64> {
        let recent: Vec<&SensorSample> = self.recent(n).collect();
        if recent.len() < 2 {
            return None;
        }
        let first = recent.first()?.timestamp;
        let last = recent.last()?.timestamp;
        let span = (last - first).num_milliseconds() as f64 / 1000.0;
        let interval = span / (recent.len() - 1) as f64;
        (interval > 0.0).then_some(interval)
    }
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64)
}

/// Lag (in samples) of the first strong autocorrelation peak.
///
/// The series is mean-centered, its non-negative-lag autocorrelation is
/// normalized by its maximum, and the first local maximum after lag 0 that
/// exceeds `threshold` is returned.
pub fn dominant_lag(values: &[f64], threshold: f64) -> Option<usize> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();

    let acf: Vec<f64> = (0..n)
        .map(|lag| {
            centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect();

    let peak = acf.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(peak > 0.0) {
        return None;
    }
    let normalized: Vec<f64> = acf.iter().map(|c| c / peak).collect();

    (1..n - 1).find(|&lag| {
        let r = normalized[lag];
        r > threshold && r > normalized[lag - 1] && r >= normalized[lag + 1]
    })
}
