//! Session lifecycle and the per-sample control loop
//!
//! [`SessionManager`] owns at most one active session. Each call to
//! [`SessionManager::process_sample`] ingests exactly one sample and returns a
//! fully updated snapshot:
//!
//! classify (if unresolved) → phase → repetitions → fatigue → stimulation
//! (if enabled) → safety clamp.
//!
//! Every failing call returns a typed [`SessionError`] and leaves state as it
//! was.

use crate::classifier::{ExerciseModel, HeuristicClassifier};
use crate::catalog::TargetMuscleCatalog;
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::fatigue::FatigueEstimator;
use crate::phase::PhaseTracker;
use crate::reps::RepetitionDetector;
use crate::safety::TENS_INTENSITY_RANGE;
use crate::stimulation::{
    AdaptationContext, ParameterOverrides, StimulationParameterEngine, REP_BOOST_WINDOW_SEC,
};
use crate::summary::{EffectivenessRecord, PerformanceMetrics, SessionAggregates, SessionSummary};
use crate::types::{
    ExerciseCategory, ExercisePhase, IntensityTier, ProcessedSample, SensorSample,
    SessionDescriptor, StimulationParameterSet, UserProfile,
};
use crate::window::SampleWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Samples averaged to decide a HIIT work interval
const WORK_INTERVAL_SAMPLES: usize = 5;

/// Mean activity above which a HIIT interval counts as work
const WORK_ACTIVITY_THRESHOLD: f64 = 0.5;

/// Optional operator declarations for a new session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    pub exercise_name: Option<String>,
    pub intensity: Option<IntensityTier>,
    /// Reference time for elapsed-time computation; defaults to the first
    /// sample's timestamp
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exercise(mut self, name: impl Into<String>) -> Self {
        self.exercise_name = Some(name.into());
        self
    }

    pub fn with_intensity(mut self, tier: IntensityTier) -> Self {
        self.intensity = Some(tier);
        self
    }

    pub fn starting_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }
}

/// State of the running session
struct ActiveSession {
    id: String,
    started_at: DateTime<Utc>,
    origin: Option<DateTime<Utc>>,
    profile: Arc<UserProfile>,
    exercise_name: Option<String>,
    category: ExerciseCategory,
    intensity: Option<IntensityTier>,
    window: SampleWindow,
    samples_seen: usize,
    last_timestamp: Option<DateTime<Utc>>,
    elapsed_sec: f64,
    phase: PhaseTracker,
    reps: RepetitionDetector,
    fatigue: FatigueEstimator,
    aggregates: SessionAggregates,
    stimulation_enabled: bool,
    base: Option<StimulationParameterSet>,
    current: Option<StimulationParameterSet>,
    overrides: ParameterOverrides,
}

impl ActiveSession {
    fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            session_id: self.id.clone(),
            started_at: self.started_at,
            exercise_name: self.exercise_name.clone(),
            category: self.category,
            intensity: self.intensity,
            phase: self.phase.phase(),
            stimulation_enabled: self.stimulation_enabled,
        }
    }

    fn adaptation_context(&self, at: Option<DateTime<Utc>>) -> AdaptationContext {
        let work_interval = self
            .window
            .mean_of(WORK_INTERVAL_SAMPLES, |s| s.activity_level())
            .map(|activity| activity > WORK_ACTIVITY_THRESHOLD);
        AdaptationContext {
            category: self.category,
            phase: self.phase.phase(),
            fatigue: self.fatigue.fatigue(),
            time_in_phase_sec: self.phase.time_in_phase(self.elapsed_sec),
            work_interval,
            recent_rep: at.is_some_and(|t| self.reps.within(t, REP_BOOST_WINDOW_SEC)),
        }
    }

    /// Compute (once) the base snapshot; requires exercise and intensity
    fn ensure_base(&mut self) -> Result<&StimulationParameterSet, SessionError> {
        let name = self
            .exercise_name
            .as_deref()
            .ok_or(SessionError::ExerciseUnknown)?;
        let tier = self.intensity.ok_or(SessionError::IntensityUnknown)?;
        let category = self.category;
        let profile = &self.profile;
        Ok(self.base.get_or_insert_with(|| {
            StimulationParameterEngine::base_parameters(name, category, tier, profile)
        }))
    }

    /// Rebuild current parameters from the frozen base
    fn recompute(&mut self) {
        let Some(base) = &self.base else {
            self.current = None;
            return;
        };
        let ctx = self.adaptation_context(self.last_timestamp);
        let mut params = StimulationParameterEngine::adapt(base, &ctx, &self.profile);
        if !self.overrides.is_empty() {
            self.overrides.apply(&mut params);
            StimulationParameterEngine::finalize(&mut params, &self.profile);
        }
        self.current = Some(params);
    }

    fn enable_stimulation(&mut self) -> Result<StimulationParameterSet, SessionError> {
        self.ensure_base()?;
        self.stimulation_enabled = true;
        self.recompute();
        self.current.clone().ok_or(SessionError::ParametersUninitialized)
    }

    fn resolve_context(&mut self, classifier: &dyn ExerciseModel) {
        if self.exercise_name.is_none() {
            if let Some(found) = classifier.classify_exercise(&self.window, self.samples_seen) {
                info!(
                    session_id = %self.id,
                    exercise = %found.exercise_name,
                    category = found.category.as_str(),
                    basis = ?found.basis,
                    "exercise resolved"
                );
                self.exercise_name = Some(found.exercise_name);
                self.category = found.category;
            }
        }
        if self.intensity.is_none() {
            if let Some(tier) =
                classifier.classify_intensity(&self.window, self.samples_seen, &self.profile)
            {
                info!(session_id = %self.id, intensity = tier.as_str(), "intensity resolved");
                self.intensity = Some(tier);
            }
        }
    }
}

/// Owner of the session lifecycle: NoSession → Active → Ended
pub struct SessionManager {
    config: EngineConfig,
    classifier: Box<dyn ExerciseModel>,
    profile: Option<Arc<UserProfile>>,
    session: Option<ActiveSession>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            classifier: Box::new(HeuristicClassifier),
            profile: None,
            session: None,
        }
    }

    /// Replace the built-in heuristic classifier
    pub fn with_classifier(mut self, classifier: Box<dyn ExerciseModel>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Set the profile used by subsequent sessions; a running session keeps
    /// the profile it started with
    pub fn set_profile(&mut self, profile: impl Into<Arc<UserProfile>>) {
        self.profile = Some(profile.into());
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        self.session.as_ref().map(ActiveSession::descriptor)
    }

    pub fn current_parameters(&self) -> Option<&StimulationParameterSet> {
        self.session.as_ref().and_then(|s| s.current.as_ref())
    }

    pub fn base_parameters(&self) -> Option<&StimulationParameterSet> {
        self.session.as_ref().and_then(|s| s.base.as_ref())
    }

    pub fn start(&mut self, request: SessionRequest) -> Result<SessionDescriptor, SessionError> {
        let profile = self.profile.clone().ok_or(SessionError::ProfileMissing)?;
        if self.session.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        if let Some(ceiling) = profile
            .max_tens_intensity_ma
            .filter(|c| *c < TENS_INTENSITY_RANGE.0)
        {
            warn!(
                ceiling,
                floor = TENS_INTENSITY_RANGE.0,
                "personal TENS ceiling is below the device floor; the floor applies"
            );
        }

        let exercise_name = request
            .exercise_name
            .map(|name| TargetMuscleCatalog::normalize_name(&name))
            .filter(|name| !name.is_empty());
        let category = exercise_name
            .as_deref()
            .map(TargetMuscleCatalog::category_of)
            .unwrap_or(ExerciseCategory::Unknown);

        let phase = PhaseTracker::new(self.config.strategy);
        let session = ActiveSession {
            id: Uuid::new_v4().to_string(),
            started_at: request.started_at.unwrap_or_else(Utc::now),
            origin: request.started_at,
            profile,
            exercise_name,
            category,
            intensity: request.intensity,
            window: SampleWindow::new(self.config.window_capacity),
            samples_seen: 0,
            last_timestamp: None,
            elapsed_sec: 0.0,
            aggregates: SessionAggregates::new(phase.phase()),
            phase,
            reps: RepetitionDetector::new(),
            fatigue: FatigueEstimator::new(self.config.strategy),
            stimulation_enabled: false,
            base: None,
            current: None,
            overrides: ParameterOverrides::default(),
        };

        info!(
            session_id = %session.id,
            exercise = session.exercise_name.as_deref().unwrap_or("auto"),
            intensity = session.intensity.map(|t| t.as_str()).unwrap_or("auto"),
            strategy = self.config.strategy.as_str(),
            "session started"
        );
        let descriptor = session.descriptor();
        self.session = Some(session);
        Ok(descriptor)
    }

    /// Ingest one sample and return the updated snapshot
    pub fn process_sample(&mut self, sample: SensorSample) -> Result<ProcessedSample, SessionError> {
        let auto_enable = self.config.auto_enable_stimulation;
        let classifier = &*self.classifier;
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;

        let origin = *session.origin.get_or_insert(sample.timestamp);
        session.elapsed_sec = ((sample.timestamp - origin).num_milliseconds() as f64 / 1000.0).max(0.0);
        session.last_timestamp = Some(sample.timestamp);
        session.window.push(sample.clone());
        session.samples_seen += 1;

        session.resolve_context(classifier);
        if auto_enable && !session.stimulation_enabled && session.ensure_base().is_ok() {
            session.stimulation_enabled = true;
            info!(session_id = %session.id, "stimulation enabled automatically");
        }

        let profile = Arc::clone(&session.profile);
        if session
            .phase
            .update(&session.window, session.elapsed_sec, &profile)
            .is_some()
            && !session.overrides.is_empty()
        {
            debug!(session_id = %session.id, "manual overrides cleared on phase change");
            session.overrides = ParameterOverrides::default();
        }
        let phase = session.phase.phase();

        let rep_detected = session.reps.update(session.category, &session.window) > 0;
        let fatigue = session.fatigue.update(&sample, session.elapsed_sec, &profile);

        if session.stimulation_enabled {
            session.recompute();
        }

        session.aggregates.record(&sample, phase, &profile);

        Ok(ProcessedSample {
            timestamp: sample.timestamp,
            session_id: session.id.clone(),
            exercise_name: session.exercise_name.clone(),
            category: session.category,
            intensity: session.intensity,
            phase,
            elapsed_sec: session.elapsed_sec,
            rep_count: session
                .category
                .is_rep_based()
                .then(|| session.reps.count()),
            rep_detected,
            fatigue,
            heart_rate_reserve: sample.heart_rate.map(|hr| profile.heart_rate_reserve(hr)),
            activity_level: sample.activity_level(),
            hydration: sample.hydration(),
            stimulation: if session.stimulation_enabled {
                session.current.clone()
            } else {
                None
            },
        })
    }

    /// Turn stimulation on or off.
    ///
    /// Enabling requires a resolved exercise and intensity and returns the
    /// current parameter set; disabling returns `None`.
    pub fn toggle_stimulation(
        &mut self,
        enable: bool,
    ) -> Result<Option<StimulationParameterSet>, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        if !enable {
            session.stimulation_enabled = false;
            session.current = None;
            info!(session_id = %session.id, "stimulation disabled");
            return Ok(None);
        }
        let params = session.enable_stimulation()?;
        info!(session_id = %session.id, "stimulation enabled");
        Ok(Some(params))
    }

    /// Apply bounded manual overrides to the current parameters.
    ///
    /// Overrides are re-applied after every recomputation until the phase
    /// changes.
    pub fn adjust(
        &mut self,
        overrides: &ParameterOverrides,
    ) -> Result<StimulationParameterSet, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        if !session.stimulation_enabled {
            return Err(SessionError::StimulationDisabled);
        }
        let current = session
            .current
            .as_mut()
            .ok_or(SessionError::ParametersUninitialized)?;

        overrides.apply(current);
        StimulationParameterEngine::finalize(current, &session.profile);
        session.overrides.merge(overrides);
        debug!(session_id = %session.id, ?overrides, "manual adjustment applied");
        Ok(current.clone())
    }

    /// Score operator-reported performance against the current output.
    ///
    /// The score, phase and parameter snapshot are kept for the summary.
    pub fn evaluate_effectiveness(&mut self, metrics: &PerformanceMetrics) -> Result<f64, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let score = metrics.score();
        let phase = session.phase.phase();
        session.aggregates.record_effectiveness(EffectivenessRecord {
            score,
            phase,
            at: session.last_timestamp,
            parameters: session.current.clone(),
        });
        info!(session_id = %session.id, score, phase = phase.as_str(), "effectiveness evaluated");
        Ok(score)
    }

    /// End the session and return its summary
    pub fn end(&mut self) -> Result<SessionSummary, SessionError> {
        let session = self.session.take().ok_or(SessionError::NoActiveSession)?;

        let origin = session.origin.unwrap_or(session.started_at);
        let ended_at = session.last_timestamp.unwrap_or(origin);
        let duration_sec = ((ended_at - origin).num_milliseconds() as f64 / 1000.0).max(0.0);

        let summary = session.aggregates.summarize(
            &session.id,
            origin,
            ended_at,
            duration_sec,
            session.exercise_name.clone(),
            session.category,
            session.intensity,
            session.reps.count(),
            session.fatigue.fatigue(),
            &session.profile,
        );
        info!(
            session_id = %session.id,
            duration_sec,
            samples = summary.sample_count,
            final_phase = session.phase.phase().as_str(),
            "session ended"
        );
        Ok(summary)
    }

    /// Phase of the running session
    pub fn phase(&self) -> Option<ExercisePhase> {
        self.session.as_ref().map(|s| s.phase.phase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassificationBasis, ExerciseClassification};
    use crate::config::ControlStrategy;
    use crate::safety::SafetyClamp;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn profile() -> UserProfile {
        UserProfile::new(62.0, 185.0)
    }

    fn manager(config: EngineConfig) -> SessionManager {
        let mut m = SessionManager::new(config);
        m.set_profile(profile());
        m
    }

    #[test]
    fn test_start_requires_profile() {
        let mut m = SessionManager::default();
        assert_eq!(m.start(SessionRequest::new()), Err(SessionError::ProfileMissing));
        assert!(!m.is_active());
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut m = manager(EngineConfig::default());
        assert_eq!(
            m.process_sample(SensorSample::at(t(0))).unwrap_err(),
            SessionError::NoActiveSession
        );
        assert_eq!(m.end().unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(m.toggle_stimulation(true).unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(
            m.adjust(&ParameterOverrides::default()).unwrap_err(),
            SessionError::NoActiveSession
        );

        m.start(SessionRequest::new()).unwrap();
        assert_eq!(m.start(SessionRequest::new()).unwrap_err(), SessionError::AlreadyActive);
        m.end().unwrap();
        assert!(!m.is_active());
        assert_eq!(
            m.process_sample(SensorSample::at(t(0))).unwrap_err(),
            SessionError::NoActiveSession
        );
    }

    #[test]
    fn test_zero_duration_summary() {
        let mut m = manager(EngineConfig::default());
        let descriptor = m
            .start(
                SessionRequest::new()
                    .with_exercise("squat")
                    .with_intensity(IntensityTier::High),
            )
            .unwrap();
        assert_eq!(descriptor.category, ExerciseCategory::Strength);

        let summary = m.end().unwrap();
        assert_eq!(summary.session_id, descriptor.session_id);
        assert_eq!(summary.duration_sec, 0.0);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.total_reps, Some(0));
        assert_eq!(summary.category, ExerciseCategory::Strength);
        assert_eq!(summary.intensity, Some(IntensityTier::High));

        let json = summary.to_json().unwrap();
        let parsed: SessionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_squat_scenario() {
        let mut m = manager(EngineConfig::default().with_strategy(ControlStrategy::HeartRateReserve));
        m.start(
            SessionRequest::new()
                .with_exercise("squat")
                .with_intensity(IntensityTier::High),
        )
        .unwrap();
        assert!(m.toggle_stimulation(true).unwrap().is_some());

        let mut last = None;
        for (ms, z) in [(0, -9.8), (100, 3.0), (1200, -9.8), (1300, 3.0)] {
            let sample = SensorSample::at(t(ms))
                .with_heart_rate(170.0)
                .with_acceleration(0.0, 0.0, z);
            last = Some(m.process_sample(sample).unwrap());
        }
        let snapshot = last.unwrap();
        assert_eq!(snapshot.rep_count, Some(2));
        assert!(snapshot.rep_detected);
        assert!(snapshot.phase.is_working());
        let tens = &snapshot.stimulation.as_ref().unwrap().tens;
        assert!((1.0..=10.0).contains(&tens.intensity_ma));
        assert_eq!(tens.target_muscles, vec!["quadriceps", "hamstrings", "glutes"]);
    }

    #[test]
    fn test_toggle_before_resolution() {
        let mut m = manager(EngineConfig::default());
        m.start(SessionRequest::new()).unwrap();
        assert_eq!(m.toggle_stimulation(true).unwrap_err(), SessionError::ExerciseUnknown);
        assert!(!m.descriptor().unwrap().stimulation_enabled);
        assert!(m.base_parameters().is_none());
        assert!(m.current_parameters().is_none());
        m.end().unwrap();

        m.start(SessionRequest::new().with_exercise("running")).unwrap();
        assert_eq!(m.toggle_stimulation(true).unwrap_err(), SessionError::IntensityUnknown);
        assert!(m.current_parameters().is_none());
    }

    #[test]
    fn test_adjust_requires_enabled_stimulation() {
        let mut m = manager(EngineConfig::default());
        m.start(
            SessionRequest::new()
                .with_exercise("running")
                .with_intensity(IntensityTier::Moderate),
        )
        .unwrap();
        let overrides = ParameterOverrides {
            tens_intensity_ma: Some(8.0),
            ..Default::default()
        };
        assert_eq!(m.adjust(&overrides).unwrap_err(), SessionError::StimulationDisabled);

        m.toggle_stimulation(true).unwrap();
        let adjusted = m.adjust(&overrides).unwrap();
        assert_eq!(adjusted.tens.intensity_ma, 8.0);

        let excessive = ParameterOverrides {
            tens_intensity_ma: Some(80.0),
            thermal_intensity: Some(-1.0),
            ..Default::default()
        };
        let adjusted = m.adjust(&excessive).unwrap();
        assert_eq!(adjusted.tens.intensity_ma, 10.0);
        assert_eq!(adjusted.thermal.intensity, 0.0);

        assert_eq!(m.toggle_stimulation(false).unwrap(), None);
        assert!(m.current_parameters().is_none());
    }

    #[test]
    fn test_overrides_persist_until_phase_change() {
        let mut m = manager(EngineConfig::default());
        m.start(
            SessionRequest::new()
                .with_exercise("running")
                .with_intensity(IntensityTier::Moderate),
        )
        .unwrap();
        m.toggle_stimulation(true).unwrap();
        m.adjust(&ParameterOverrides {
            tens_intensity_ma: Some(9.0),
            ..Default::default()
        })
        .unwrap();

        let snapshot = m
            .process_sample(SensorSample::at(t(0)).with_heart_rate(80.0))
            .unwrap();
        assert_eq!(snapshot.phase, ExercisePhase::Setup);
        assert_eq!(snapshot.stimulation.as_ref().unwrap().tens.intensity_ma, 9.0);

        let mut snapshot = snapshot;
        for i in 1..10 {
            snapshot = m
                .process_sample(SensorSample::at(t(i * 1000)).with_heart_rate(80.0))
                .unwrap();
        }
        assert_eq!(snapshot.phase, ExercisePhase::Warmup);
        // 4.5 * 0.85 * 0.7
        let tens = snapshot.stimulation.unwrap().tens;
        assert!((tens.intensity_ma - 2.6775).abs() < 1e-9);
    }

    #[test]
    fn test_classification_and_auto_enable() {
        let mut m = manager(EngineConfig::default().with_auto_enable_stimulation(true));
        m.start(SessionRequest::new()).unwrap();
        let mut snapshot = None;
        for i in 0..60 {
            let s = SensorSample::at(t(i * 1000)).with_heart_rate(140.0);
            snapshot = Some(m.process_sample(s).unwrap());
        }
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.exercise_name.as_deref(), Some("running"));
        assert_eq!(snapshot.category, ExerciseCategory::Endurance);
        // reserve (140 - 62) / 123 = 0.634
        assert_eq!(snapshot.intensity, Some(IntensityTier::Moderate));
        assert!(snapshot.stimulation.is_some());
        assert!(m.descriptor().unwrap().stimulation_enabled);
    }

    #[test]
    fn test_effectiveness_history_in_summary() {
        let mut m = manager(EngineConfig::default());
        assert_eq!(
            m.evaluate_effectiveness(&PerformanceMetrics::default()).unwrap_err(),
            SessionError::NoActiveSession
        );

        m.start(
            SessionRequest::new()
                .with_exercise("running")
                .with_intensity(IntensityTier::Moderate),
        )
        .unwrap();
        assert_eq!(m.evaluate_effectiveness(&PerformanceMetrics::default()).unwrap(), 0.5);

        m.toggle_stimulation(true).unwrap();
        m.process_sample(SensorSample::at(t(0)).with_heart_rate(120.0)).unwrap();
        let score = m
            .evaluate_effectiveness(&PerformanceMetrics {
                power_output: Some(8.0),
                endurance: Some(6.0),
                perceived_exertion: Some(7.0),
            })
            .unwrap();
        assert!((score - 0.62).abs() < 1e-9);

        let summary = m.end().unwrap();
        assert_eq!(summary.effectiveness_history.len(), 2);
        let first = &summary.effectiveness_history[0];
        assert_eq!(first.at, None);
        assert_eq!(first.parameters, None);
        let second = &summary.effectiveness_history[1];
        assert_eq!(second.phase, ExercisePhase::Setup);
        assert_eq!(second.at, Some(t(0)));
        assert!(second.parameters.is_some());
    }

    struct FixedModel;

    impl ExerciseModel for FixedModel {
        fn classify_exercise(&self, _: &SampleWindow, _: usize) -> Option<ExerciseClassification> {
            Some(ExerciseClassification {
                exercise_name: "burpees".to_string(),
                category: ExerciseCategory::Hiit,
                basis: ClassificationBasis::Model,
            })
        }
    }

    #[test]
    fn test_pluggable_classifier() {
        let mut m = SessionManager::default().with_classifier(Box::new(FixedModel));
        m.set_profile(profile());
        m.start(SessionRequest::new()).unwrap();
        let snapshot = m.process_sample(SensorSample::at(t(0))).unwrap();
        assert_eq!(snapshot.category, ExerciseCategory::Hiit);
        assert_eq!(snapshot.rep_count, Some(0));
    }

    #[test]
    fn test_ninety_minute_endurance_session() {
        let mut m = manager(EngineConfig::default());
        m.start(
            SessionRequest::new()
                .with_exercise("running")
                .with_intensity(IntensityTier::Moderate),
        )
        .unwrap();
        m.toggle_stimulation(true).unwrap();

        let mut phases: Vec<ExercisePhase> = Vec::new();
        for sec in 0..5400i64 {
            let (hr, emg) = match sec {
                s if s < 300 => (95.0, 0.3),
                s if s < 2700 => (150.0, 0.6),
                s if s < 3000 => (110.0, 0.2),
                _ => (85.0, 0.1),
            };
            let snapshot = m
                .process_sample(
                    SensorSample::at(t(sec * 1000))
                        .with_heart_rate(hr)
                        .with_emg(emg),
                )
                .unwrap();
            assert!((0.0..=1.0).contains(&snapshot.fatigue));
            assert!(SafetyClamp::is_within_bounds(snapshot.stimulation.as_ref().unwrap()));
            if phases.last() != Some(&snapshot.phase) {
                phases.push(snapshot.phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                ExercisePhase::Setup,
                ExercisePhase::Warmup,
                ExercisePhase::Main,
                ExercisePhase::Cooldown,
                ExercisePhase::Recovery,
            ]
        );

        let summary = m.end().unwrap();
        assert_eq!(summary.duration_sec, 5399.0);
        assert_eq!(summary.sample_count, 5400);
        assert_eq!(summary.total_reps, None);
        assert!(summary.heart_rate_recovery.is_some());
        let total: f64 = summary.phase_durations.values().sum();
        assert!((total - 5399.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_reps_and_parameters_stay_consistent(
            readings in proptest::collection::vec(
                (-30.0f64..30.0, proptest::option::of(30.0f64..220.0), 50i64..1500),
                1..120,
            ),
            adjust_every in 1usize..20,
            override_value in -500.0f64..500.0,
        ) {
            let mut m = manager(EngineConfig::default());
            m.start(SessionRequest::new().with_exercise("squat").with_intensity(IntensityTier::VeryHigh)).unwrap();
            m.toggle_stimulation(true).unwrap();

            let mut ms = 0;
            let mut previous = 0;
            for (i, (z, hr, step)) in readings.into_iter().enumerate() {
                ms += step;
                let mut sample = SensorSample::at(t(ms)).with_vertical_acceleration(z);
                sample.heart_rate = hr;
                let snapshot = m.process_sample(sample).unwrap();
                let count = snapshot.rep_count.unwrap();
                prop_assert!(count >= previous && count - previous <= 1);
                previous = count;
                prop_assert!(SafetyClamp::is_within_bounds(snapshot.stimulation.as_ref().unwrap()));

                if i % adjust_every == 0 {
                    let adjusted = m.adjust(&ParameterOverrides {
                        tens_intensity_ma: Some(override_value),
                        tens_frequency_hz: Some(override_value),
                        visual_intensity: Some(override_value),
                        ..Default::default()
                    }).unwrap();
                    prop_assert!(SafetyClamp::is_within_bounds(&adjusted));
                }
            }
        }
    }
}
