//! Session phase tracking
//!
//! Two strategies drive the phase machine:
//!
//! - **Elapsed**: Setup → Warmup → Main → Cooldown → Recovery from sample
//!   count, elapsed time and rolling heart-rate/activity trends.
//! - **HeartRateReserve**: Warmup/Main/Peak from instantaneous heart-rate
//!   reserve, falling to Cooldown and then Recovery when reserve drops.
//!
//! Under both, once Cooldown has been entered the working phases are never
//! re-entered. Main and Peak may alternate while working.

use crate::config::ControlStrategy;
use crate::types::{ExercisePhase, SensorSample, UserProfile};
use crate::window::SampleWindow;
use tracing::info;

/// Samples buffered before Setup ends
const SETUP_SAMPLES: usize = 10;

/// Window for short rolling means
const SHORT_WINDOW: usize = 10;

/// Window for trend comparison
const TREND_WINDOW: usize = 30;

/// Heart rate marking working effort (bpm)
const WORKING_HR_BPM: f64 = 100.0;

/// Warmup ends after this long regardless of heart rate (s)
const WARMUP_TIMEOUT_SEC: f64 = 5.0 * 60.0;

/// Main ends after this much session time (s)
const MAIN_TIMEOUT_SEC: f64 = 45.0 * 60.0;

/// Heart-rate trend ratio that ends Main
const HR_DROP_RATIO: f64 = 0.9;

/// Activity trend ratio that ends Main
const ACTIVITY_DROP_RATIO: f64 = 0.7;

/// Activity below which the user counts as at rest
const REST_ACTIVITY: f64 = 0.3;

/// Cooldown ends after this long in phase (s)
const COOLDOWN_TIMEOUT_SEC: f64 = 5.0 * 60.0;

/// Reserve below which effort counts as light
const RESERVE_LIGHT: f64 = 0.3;

/// Reserve at or above which effort counts as peak
const RESERVE_PEAK: f64 = 0.7;

/// A phase change, reported once per transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTransition {
    pub from: ExercisePhase,
    pub to: ExercisePhase,
    /// Session time of the transition (s)
    pub at_sec: f64,
}

#[derive(Debug, Clone)]
pub struct PhaseTracker {
    strategy: ControlStrategy,
    phase: ExercisePhase,
    entered_at_sec: f64,
    cooldown_reached: bool,
}

impl PhaseTracker {
    pub fn new(strategy: ControlStrategy) -> Self {
        let phase = match strategy {
            ControlStrategy::Elapsed => ExercisePhase::Setup,
            ControlStrategy::HeartRateReserve => ExercisePhase::Warmup,
        };
        Self {
            strategy,
            phase,
            entered_at_sec: 0.0,
            cooldown_reached: false,
        }
    }

    pub fn phase(&self) -> ExercisePhase {
        self.phase
    }

    /// Seconds spent in the current phase at session time `elapsed_sec`
    pub fn time_in_phase(&self, elapsed_sec: f64) -> f64 {
        (elapsed_sec - self.entered_at_sec).max(0.0)
    }

    /// Advance the machine with the newest window contents.
    ///
    /// At most one transition happens per call.
    pub fn update(
        &mut self,
        window: &SampleWindow,
        elapsed_sec: f64,
        profile: &UserProfile,
    ) -> Option<PhaseTransition> {
        let next = match self.strategy {
            ControlStrategy::Elapsed => self.next_by_elapsed(window, elapsed_sec),
            ControlStrategy::HeartRateReserve => self.next_by_reserve(window.latest(), profile),
        };

        // Working phases are closed once Cooldown has been reached.
        if self.cooldown_reached && next < ExercisePhase::Cooldown {
            return None;
        }
        if next == self.phase {
            return None;
        }

        let transition = PhaseTransition {
            from: self.phase,
            to: next,
            at_sec: elapsed_sec,
        };
        info!(
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            at_sec = elapsed_sec,
            "exercise phase transition"
        );
        self.phase = next;
        self.entered_at_sec = elapsed_sec;
        if next >= ExercisePhase::Cooldown {
            self.cooldown_reached = true;
        }
        Some(transition)
    }

    fn next_by_elapsed(&self, window: &SampleWindow, elapsed_sec: f64) -> ExercisePhase {
        let heart_rate = |s: &SensorSample| s.heart_rate;
        let activity = |s: &SensorSample| s.activity_level();

        match self.phase {
            ExercisePhase::Setup => {
                if window.len() >= SETUP_SAMPLES {
                    ExercisePhase::Warmup
                } else {
                    ExercisePhase::Setup
                }
            }
            ExercisePhase::Warmup => {
                let warmed_up = window
                    .mean_of(SHORT_WINDOW, heart_rate)
                    .is_some_and(|hr| hr > WORKING_HR_BPM);
                if warmed_up || elapsed_sec >= WARMUP_TIMEOUT_SEC {
                    ExercisePhase::Main
                } else {
                    ExercisePhase::Warmup
                }
            }
            ExercisePhase::Main | ExercisePhase::Peak => {
                let hr_dropped = window
                    .consecutive_means(TREND_WINDOW, heart_rate)
                    .is_some_and(|(prior, current)| current < HR_DROP_RATIO * prior);
                let activity_dropped = window
                    .consecutive_means(TREND_WINDOW, activity)
                    .is_some_and(|(prior, current)| current < ACTIVITY_DROP_RATIO * prior);
                if elapsed_sec > MAIN_TIMEOUT_SEC || hr_dropped || activity_dropped {
                    ExercisePhase::Cooldown
                } else {
                    self.phase
                }
            }
            ExercisePhase::Cooldown => {
                let hr_settled = window
                    .mean_of(SHORT_WINDOW, heart_rate)
                    .is_some_and(|hr| hr < WORKING_HR_BPM);
                let at_rest = window
                    .mean_of(SHORT_WINDOW, activity)
                    .map_or(true, |a| a < REST_ACTIVITY);
                if (hr_settled && at_rest)
                    || self.time_in_phase(elapsed_sec) >= COOLDOWN_TIMEOUT_SEC
                {
                    ExercisePhase::Recovery
                } else {
                    ExercisePhase::Cooldown
                }
            }
            ExercisePhase::Recovery => ExercisePhase::Recovery,
        }
    }

    fn next_by_reserve(&self, latest: Option<&SensorSample>, profile: &UserProfile) -> ExercisePhase {
        let Some(hr) = latest.and_then(|s| s.heart_rate) else {
            return self.phase;
        };
        let reserve = profile.heart_rate_reserve(hr);

        if reserve < RESERVE_LIGHT {
            match self.phase {
                ExercisePhase::Main | ExercisePhase::Peak => ExercisePhase::Cooldown,
                ExercisePhase::Cooldown | ExercisePhase::Recovery => ExercisePhase::Recovery,
                ExercisePhase::Setup | ExercisePhase::Warmup => ExercisePhase::Warmup,
            }
        } else if reserve < RESERVE_PEAK {
            ExercisePhase::Main
        } else {
            ExercisePhase::Peak
        }
    }
}
