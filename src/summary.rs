//! Session summary
//!
//! This module accumulates running aggregates while a session is active and
//! turns them into the end-of-session report:
//! - Duration and per-phase time breakdown
//! - Heart rate, muscle activation and power statistics
//! - Repetition totals and rate
//! - Heart-rate zones, calories and post-exercise heart-rate recovery
//! - Advisory effectiveness estimates and operator-scored effectiveness history

use crate::types::{
    ExerciseCategory, ExercisePhase, IntensityTier, SensorSample, StimulationParameterSet,
    UserProfile,
};
use crate::window::mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Main-phase power samples in each of the early and late comparison windows
const POWER_WINDOW: usize = 30;

/// Heart-rate recovery is measured this long after Cooldown begins (s)
const HR_RECOVERY_SEC: f64 = 60.0;

/// Upper reserve bounds of the easy, fat-burn and cardio zones
const ZONE_BOUNDS: [f64; 3] = [0.6, 0.7, 0.8];

/// Effectiveness assumed when the profile does not provide one
const DEFAULT_TENS_EFFECTIVENESS: f64 = 0.7;

/// Oldest effectiveness records are discarded beyond this many
pub const MAX_EFFECTIVENESS_HISTORY: usize = 256;

/// Score given when the operator supplies no metrics at all
pub const DEFAULT_EFFECTIVENESS_SCORE: f64 = 0.5;

/// Operator-reported performance, each on a 0-10 scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetrics {
    pub power_output: Option<f64>,
    pub endurance: Option<f64>,
    /// Rating of perceived exertion; lower scores better
    pub perceived_exertion: Option<f64>,
}

impl PerformanceMetrics {
    pub fn is_empty(&self) -> bool {
        self.power_output.is_none() && self.endurance.is_none() && self.perceived_exertion.is_none()
    }

    /// `(0.4·power + 0.4·endurance + 0.2·(10 − exertion)) / 10`, clamped to [0, 1].
    ///
    /// Missing power and endurance count as 0, missing exertion as 5.
    /// Non-finite values count as missing.
    pub fn score(&self) -> f64 {
        if self.is_empty() {
            return DEFAULT_EFFECTIVENESS_SCORE;
        }
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        let power = finite(self.power_output).unwrap_or(0.0);
        let endurance = finite(self.endurance).unwrap_or(0.0);
        let exertion = finite(self.perceived_exertion).unwrap_or(5.0);
        ((0.4 * power + 0.4 * endurance + 0.2 * (10.0 - exertion)) / 10.0).clamp(0.0, 1.0)
    }
}

/// One effectiveness evaluation and the output it judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessRecord {
    pub score: f64,
    pub phase: ExercisePhase,
    /// Sample time the evaluation followed, if any sample was processed
    pub at: Option<DateTime<Utc>>,
    /// Stimulation output at evaluation time; absent while stimulation is off
    pub parameters: Option<StimulationParameterSet>,
}

/// Fraction of heart-rate-bearing samples in each reserve zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRateZones {
    pub easy: f64,
    pub fat_burn: f64,
    pub cardio: f64,
    pub peak: f64,
}

/// Ad hoc estimates carried for reporting only
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryMetrics {
    /// `1 - late/early` Main-phase power
    pub power_fatigue_index: Option<f64>,
    /// Average power per heart beat (W/bpm)
    pub aerobic_efficiency: Option<f64>,
    pub stimulation_effectiveness: f64,
    pub performance_boost_pct: f64,
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_sec: f64,
    pub sample_count: u64,
    pub exercise_name: Option<String>,
    pub category: ExerciseCategory,
    pub intensity: Option<IntensityTier>,
    pub avg_heart_rate: Option<f64>,
    pub peak_heart_rate: Option<f64>,
    pub avg_activation: Option<f64>,
    pub peak_activation: Option<f64>,
    /// Present for rep-based categories
    pub total_reps: Option<u32>,
    /// Repetitions per minute
    pub rep_rate: Option<f64>,
    pub phase_durations: BTreeMap<ExercisePhase, f64>,
    pub final_fatigue: f64,
    pub heart_rate_zones: Option<HeartRateZones>,
    pub avg_power: Option<f64>,
    pub peak_power: Option<f64>,
    pub calories_kcal: Option<f64>,
    /// Heart-rate drop over the first minute of Cooldown (bpm)
    pub heart_rate_recovery: Option<f64>,
    pub advisory: AdvisoryMetrics,
    /// Operator-scored evaluations, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effectiveness_history: Vec<EffectivenessRecord>,
}

impl SessionSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Running mean and maximum of one signal
#[derive(Debug, Clone, Copy, Default)]
struct RunningStat {
    sum: f64,
    count: u64,
    max: Option<f64>,
}

impl RunningStat {
    fn push(&mut self, value: Option<f64>) {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return;
        };
        self.sum += v;
        self.count += 1;
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Heart rate at the start of Cooldown and one minute later
#[derive(Debug, Clone, Copy)]
struct CooldownMark {
    started_at: DateTime<Utc>,
    start_hr: Option<f64>,
    after_minute_hr: Option<f64>,
}

/// Per-session running aggregates, constant memory
#[derive(Debug, Clone)]
pub struct SessionAggregates {
    samples: u64,
    heart_rate: RunningStat,
    activation: RunningStat,
    power: RunningStat,
    zone_counts: [u64; 4],
    phase_durations: BTreeMap<ExercisePhase, f64>,
    last: Option<(DateTime<Utc>, ExercisePhase)>,
    last_hr: Option<f64>,
    early_power: Vec<f64>,
    late_power: VecDeque<f64>,
    working_power_samples: usize,
    cooldown: Option<CooldownMark>,
    effectiveness: VecDeque<EffectivenessRecord>,
}

impl SessionAggregates {
    pub fn new(initial_phase: ExercisePhase) -> Self {
        let mut phase_durations = BTreeMap::new();
        phase_durations.insert(initial_phase, 0.0);
        Self {
            samples: 0,
            heart_rate: RunningStat::default(),
            activation: RunningStat::default(),
            power: RunningStat::default(),
            zone_counts: [0; 4],
            phase_durations,
            last: None,
            last_hr: None,
            early_power: Vec::with_capacity(POWER_WINDOW),
            late_power: VecDeque::with_capacity(POWER_WINDOW),
            working_power_samples: 0,
            cooldown: None,
            effectiveness: VecDeque::new(),
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Fold in a processed sample and the phase it was assigned
    pub fn record(&mut self, sample: &SensorSample, phase: ExercisePhase, profile: &UserProfile) {
        self.samples += 1;

        // Time between samples belongs to the phase of the earlier one
        if let Some((prev_ts, prev_phase)) = self.last {
            let dt = seconds_between(prev_ts, sample.timestamp);
            *self.phase_durations.entry(prev_phase).or_insert(0.0) += dt;
        }
        self.phase_durations.entry(phase).or_insert(0.0);
        self.last = Some((sample.timestamp, phase));

        let heart_rate = sample.heart_rate.filter(|hr| hr.is_finite());
        self.heart_rate.push(heart_rate);
        if let Some(hr) = heart_rate {
            let reserve = profile.heart_rate_reserve(hr);
            let zone = ZONE_BOUNDS
                .iter()
                .position(|bound| reserve < *bound)
                .unwrap_or(ZONE_BOUNDS.len());
            self.zone_counts[zone] += 1;
            self.last_hr = Some(hr);
        }

        self.activation.push(sample.activity_level());
        self.power.push(sample.power);

        if phase.is_working() {
            if let Some(watts) = sample.power.filter(|p| p.is_finite()) {
                self.working_power_samples += 1;
                if self.early_power.len() < POWER_WINDOW {
                    self.early_power.push(watts);
                }
                self.late_power.push_back(watts);
                if self.late_power.len() > POWER_WINDOW {
                    self.late_power.pop_front();
                }
            }
        }

        if phase == ExercisePhase::Cooldown || phase == ExercisePhase::Recovery {
            self.mark_cooldown(sample.timestamp, heart_rate);
        }
    }

    /// Keep an evaluation, bounded by [`MAX_EFFECTIVENESS_HISTORY`]
    pub fn record_effectiveness(&mut self, record: EffectivenessRecord) {
        if self.effectiveness.len() == MAX_EFFECTIVENESS_HISTORY {
            self.effectiveness.pop_front();
        }
        self.effectiveness.push_back(record);
    }

    fn mark_cooldown(&mut self, at: DateTime<Utc>, heart_rate: Option<f64>) {
        let last_hr = self.last_hr;
        let mark = self.cooldown.get_or_insert(CooldownMark {
            started_at: at,
            start_hr: last_hr,
            after_minute_hr: None,
        });
        if mark.start_hr.is_none() {
            mark.start_hr = heart_rate;
        }
        if mark.after_minute_hr.is_none() && seconds_between(mark.started_at, at) >= HR_RECOVERY_SEC {
            mark.after_minute_hr = heart_rate;
        }
    }

    /// Build the report. `duration_sec` is measured by the session.
    #[allow(clippy::too_many_arguments)]
    pub fn summarize(
        &self,
        session_id: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_sec: f64,
        exercise_name: Option<String>,
        category: ExerciseCategory,
        intensity: Option<IntensityTier>,
        reps: u32,
        final_fatigue: f64,
        profile: &UserProfile,
    ) -> SessionSummary {
        let (total_reps, rep_rate) = if category.is_rep_based() {
            (Some(reps), Some(compute_rep_rate(reps, duration_sec)))
        } else {
            (None, None)
        };

        let avg_heart_rate = self.heart_rate.mean();
        let avg_activation = self.activation.mean();
        let avg_power = self.power.mean();
        let advisory = compute_advisory(
            category,
            avg_activation,
            avg_power,
            avg_heart_rate,
            self.power_fatigue_index(),
            profile,
        );

        SessionSummary {
            session_id: session_id.to_string(),
            started_at,
            ended_at,
            duration_sec,
            sample_count: self.samples,
            exercise_name,
            category,
            intensity,
            avg_heart_rate,
            peak_heart_rate: self.heart_rate.max,
            avg_activation,
            peak_activation: self.activation.max,
            total_reps,
            rep_rate,
            phase_durations: self.phase_durations.clone(),
            final_fatigue,
            heart_rate_zones: self.heart_rate_zones(),
            avg_power,
            peak_power: self.power.max,
            calories_kcal: compute_calories(category, duration_sec, profile),
            heart_rate_recovery: self.heart_rate_recovery(),
            advisory,
            effectiveness_history: self.effectiveness.iter().cloned().collect(),
        }
    }

    fn heart_rate_zones(&self) -> Option<HeartRateZones> {
        let total: u64 = self.zone_counts.iter().sum();
        if total == 0 {
            return None;
        }
        let share = |i: usize| self.zone_counts[i] as f64 / total as f64;
        Some(HeartRateZones {
            easy: share(0),
            fat_burn: share(1),
            cardio: share(2),
            peak: share(3),
        })
    }

    fn power_fatigue_index(&self) -> Option<f64> {
        if self.working_power_samples < 2 * POWER_WINDOW {
            return None;
        }
        let early = mean(&self.early_power)?;
        let late: Vec<f64> = self.late_power.iter().copied().collect();
        let late = mean(&late)?;
        (early > 0.0).then(|| 1.0 - late / early)
    }

    fn heart_rate_recovery(&self) -> Option<f64> {
        let mark = self.cooldown?;
        Some(mark.start_hr? - mark.after_minute_hr?)
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

/// Repetitions per minute; zero for an empty session
fn compute_rep_rate(reps: u32, duration_sec: f64) -> f64 {
    if duration_sec > 0.0 {
        reps as f64 / (duration_sec / 60.0)
    } else {
        0.0
    }
}

/// MET-based energy estimate; needs body weight
fn compute_calories(category: ExerciseCategory, duration_sec: f64, profile: &UserProfile) -> Option<f64> {
    let weight = profile.weight_kg.filter(|w| w.is_finite() && *w > 0.0)?;
    let per_minute = category.met() * 3.5 * weight / 200.0;
    Some(per_minute * duration_sec / 60.0)
}

fn compute_advisory(
    category: ExerciseCategory,
    avg_activation: Option<f64>,
    avg_power: Option<f64>,
    avg_heart_rate: Option<f64>,
    power_fatigue_index: Option<f64>,
    profile: &UserProfile,
) -> AdvisoryMetrics {
    let aerobic_efficiency = match (avg_power, avg_heart_rate) {
        (Some(watts), Some(hr)) if hr > 0.0 => Some(watts / hr),
        _ => None,
    };
    let base = profile
        .tens_effectiveness
        .filter(|e| e.is_finite())
        .unwrap_or(DEFAULT_TENS_EFFECTIVENESS);

    let boost = if category.is_rep_based() {
        1.5 * avg_activation.unwrap_or(0.0) - power_fatigue_index.unwrap_or(0.0)
    } else {
        0.1 * aerobic_efficiency.unwrap_or(0.0)
    };

    AdvisoryMetrics {
        power_fatigue_index,
        aerobic_efficiency,
        stimulation_effectiveness: (base + boost).clamp(0.0, 1.0),
        performance_boost_pct: base * 15.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(sec)
    }

    fn profile() -> UserProfile {
        UserProfile::new(60.0, 160.0)
    }

    fn summarize(agg: &SessionAggregates, category: ExerciseCategory, reps: u32, duration: f64) -> SessionSummary {
        agg.summarize("s-1", t(0), t(duration as i64), duration, None, category, None, reps, 0.0, &profile())
    }

    #[test]
    fn test_empty_summary() {
        let agg = SessionAggregates::new(ExercisePhase::Setup);
        let summary = summarize(&agg, ExerciseCategory::Strength, 0, 0.0);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.total_reps, Some(0));
        assert_eq!(summary.rep_rate, Some(0.0));
        assert_eq!(summary.avg_heart_rate, None);
        assert_eq!(summary.heart_rate_zones, None);
        assert_eq!(summary.phase_durations.get(&ExercisePhase::Setup), Some(&0.0));
        assert!(summary.to_json().is_ok());
    }

    #[test]
    fn test_phase_durations() {
        let mut agg = SessionAggregates::new(ExercisePhase::Warmup);
        agg.record(&SensorSample::at(t(0)), ExercisePhase::Warmup, &profile());
        agg.record(&SensorSample::at(t(10)), ExercisePhase::Main, &profile());
        agg.record(&SensorSample::at(t(40)), ExercisePhase::Main, &profile());
        agg.record(&SensorSample::at(t(45)), ExercisePhase::Cooldown, &profile());
        let summary = summarize(&agg, ExerciseCategory::Endurance, 0, 45.0);

        let mut expected = BTreeMap::new();
        expected.insert(ExercisePhase::Warmup, 10.0);
        expected.insert(ExercisePhase::Main, 35.0);
        expected.insert(ExercisePhase::Cooldown, 0.0);
        assert_eq!(summary.phase_durations, expected);
        assert_eq!(summary.total_reps, None);
    }

    #[test]
    fn test_heart_rate_statistics_and_zones() {
        let mut agg = SessionAggregates::new(ExercisePhase::Main);
        // reserves 0.5, 0.65, 0.75, 0.9
        for (i, hr) in [110.0, 125.0, 135.0, 150.0].iter().enumerate() {
            agg.record(
                &SensorSample::at(t(i as i64)).with_heart_rate(*hr).with_emg(0.5),
                ExercisePhase::Main,
                &profile(),
            );
        }
        let summary = summarize(&agg, ExerciseCategory::Endurance, 0, 3.0);
        assert_eq!(summary.avg_heart_rate, Some(130.0));
        assert_eq!(summary.peak_heart_rate, Some(150.0));
        assert_eq!(summary.avg_activation, Some(0.5));
        assert_eq!(
            summary.heart_rate_zones,
            Some(HeartRateZones {
                easy: 0.25,
                fat_burn: 0.25,
                cardio: 0.25,
                peak: 0.25
            })
        );
    }

    #[test]
    fn test_rep_rate() {
        let agg = SessionAggregates::new(ExercisePhase::Main);
        let summary = summarize(&agg, ExerciseCategory::Strength, 12, 120.0);
        assert_eq!(summary.rep_rate, Some(6.0));
    }

    #[test]
    fn test_calories_need_weight() {
        let mut p = profile();
        assert_eq!(compute_calories(ExerciseCategory::Endurance, 600.0, &p), None);
        p.weight_kg = Some(80.0);
        // 7 * 3.5 * 80 / 200 = 9.8 kcal/min
        let kcal = compute_calories(ExerciseCategory::Endurance, 600.0, &p).unwrap();
        assert!((kcal - 98.0).abs() < 1e-9);
    }

    #[test]
    fn test_heart_rate_recovery() {
        let mut agg = SessionAggregates::new(ExercisePhase::Main);
        agg.record(&SensorSample::at(t(0)).with_heart_rate(160.0), ExercisePhase::Main, &profile());
        agg.record(&SensorSample::at(t(1)).with_heart_rate(158.0), ExercisePhase::Cooldown, &profile());
        agg.record(&SensorSample::at(t(30)).with_heart_rate(140.0), ExercisePhase::Cooldown, &profile());
        agg.record(&SensorSample::at(t(61)).with_heart_rate(130.0), ExercisePhase::Cooldown, &profile());
        agg.record(&SensorSample::at(t(90)).with_heart_rate(110.0), ExercisePhase::Cooldown, &profile());
        let summary = summarize(&agg, ExerciseCategory::Endurance, 0, 90.0);
        assert_eq!(summary.heart_rate_recovery, Some(28.0));
    }

    #[test]
    fn test_power_fatigue_index() {
        let mut agg = SessionAggregates::new(ExercisePhase::Main);
        for i in 0..60 {
            let watts = if i < 30 { 200.0 } else { 150.0 };
            agg.record(&SensorSample::at(t(i)).with_power(watts), ExercisePhase::Main, &profile());
        }
        let summary = summarize(&agg, ExerciseCategory::Strength, 0, 60.0);
        assert_eq!(summary.advisory.power_fatigue_index, Some(0.25));
        assert_eq!(summary.peak_power, Some(200.0));
        assert_eq!(summary.avg_power, Some(175.0));
    }

    #[test]
    fn test_advisory_defaults() {
        let advisory = compute_advisory(
            ExerciseCategory::Endurance,
            None,
            Some(150.0),
            Some(150.0),
            None,
            &profile(),
        );
        assert_eq!(advisory.aerobic_efficiency, Some(1.0));
        assert!((advisory.stimulation_effectiveness - 0.8).abs() < 1e-9);
        assert!((advisory.performance_boost_pct - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_effectiveness_score() {
        let metrics = PerformanceMetrics {
            power_output: Some(8.0),
            endurance: Some(6.0),
            perceived_exertion: Some(7.0),
        };
        // (3.2 + 2.4 + 0.6) / 10
        assert!((metrics.score() - 0.62).abs() < 1e-9);

        let power_only = PerformanceMetrics {
            power_output: Some(5.0),
            ..Default::default()
        };
        // exertion defaults to 5: (2.0 + 0 + 1.0) / 10
        assert!((power_only.score() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_effectiveness_default_and_clamp() {
        assert_eq!(PerformanceMetrics::default().score(), DEFAULT_EFFECTIVENESS_SCORE);

        let high = PerformanceMetrics {
            power_output: Some(30.0),
            endurance: Some(30.0),
            perceived_exertion: Some(0.0),
        };
        assert_eq!(high.score(), 1.0);

        let low = PerformanceMetrics {
            perceived_exertion: Some(20.0),
            ..Default::default()
        };
        assert_eq!(low.score(), 0.0);

        let non_finite = PerformanceMetrics {
            power_output: Some(f64::NAN),
            endurance: Some(f64::INFINITY),
            perceived_exertion: None,
        };
        assert!((non_finite.score() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_effectiveness_history_is_bounded() {
        let mut agg = SessionAggregates::new(ExercisePhase::Main);
        for i in 0..MAX_EFFECTIVENESS_HISTORY + 10 {
            agg.record_effectiveness(EffectivenessRecord {
                score: i as f64,
                phase: ExercisePhase::Main,
                at: None,
                parameters: None,
            });
        }
        let summary = summarize(&agg, ExerciseCategory::Endurance, 0, 0.0);
        assert_eq!(summary.effectiveness_history.len(), MAX_EFFECTIVENESS_HISTORY);
        assert_eq!(summary.effectiveness_history[0].score, 10.0);

        let json = summary.to_json().unwrap();
        let parsed: SessionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
