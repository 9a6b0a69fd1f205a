//! Core types for the Smart Orb engine
//!
//! This module defines the data structures that flow through each stage of the
//! per-sample control loop: ingested sensor samples, the user profile, the
//! exercise/phase enumerations and the stimulation parameter set returned to
//! the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard gravity (m/s²), the resting magnitude of a triaxial accelerometer
pub const GRAVITY: f64 = 9.81;

/// One instant of physiological input.
///
/// Every signal is optional; an absent signal is never treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Sample time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Heart rate (bpm)
    pub heart_rate: Option<f64>,
    /// Lateral acceleration (m/s²)
    pub accel_x: Option<f64>,
    /// Fore-aft acceleration (m/s²)
    pub accel_y: Option<f64>,
    /// Vertical acceleration (m/s²)
    pub accel_z: Option<f64>,
    /// Normalized EMG amplitude (0-1)
    pub emg: Option<f64>,
    /// Mechanical power output (W)
    pub power: Option<f64>,
    /// Galvanic skin response (µS)
    pub gsr: Option<f64>,
    /// Bioimpedance (Ω)
    pub impedance: Option<f64>,
}

impl SensorSample {
    /// Create an empty sample at the given time
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            heart_rate: None,
            accel_x: None,
            accel_y: None,
            accel_z: None,
            emg: None,
            power: None,
            gsr: None,
            impedance: None,
        }
    }

    pub fn with_heart_rate(mut self, bpm: f64) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn with_acceleration(mut self, x: f64, y: f64, z: f64) -> Self {
        self.accel_x = Some(x);
        self.accel_y = Some(y);
        self.accel_z = Some(z);
        self
    }

    pub fn with_vertical_acceleration(mut self, z: f64) -> Self {
        self.accel_z = Some(z);
        self
    }

    pub fn with_emg(mut self, amplitude: f64) -> Self {
        self.emg = Some(amplitude);
        self
    }

    pub fn with_power(mut self, watts: f64) -> Self {
        self.power = Some(watts);
        self
    }

    pub fn with_impedance(mut self, ohms: f64) -> Self {
        self.impedance = Some(ohms);
        self
    }

    /// Euclidean magnitude over the axes that are present
    pub fn accel_magnitude(&self) -> Option<f64> {
        let axes = [self.accel_x, self.accel_y, self.accel_z];
        if axes.iter().all(Option::is_none) {
            return None;
        }
        Some(axes.iter().flatten().map(|a| a * a).sum::<f64>().sqrt())
    }

    /// Normalized activity level (0-1).
    ///
    /// EMG amplitude when available, otherwise the deviation of the
    /// acceleration magnitude from gravity relative to one g.
    pub fn activity_level(&self) -> Option<f64> {
        if let Some(emg) = self.emg {
            return Some(emg.clamp(0.0, 1.0));
        }
        self.accel_magnitude()
            .map(|m| ((m - GRAVITY).abs() / GRAVITY).clamp(0.0, 1.0))
    }

    /// Hydration estimate (0-1) from single-frequency impedance
    pub fn hydration(&self) -> Option<f64> {
        self.impedance
            .map(|z| ((z - 400.0) / 200.0).clamp(0.0, 1.0))
    }
}

/// Skin sensitivity declared in the user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinSensitivity {
    #[default]
    Normal,
    Sensitive,
}

/// Demographic and physiological baseline, read-only during a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Age (years)
    #[serde(default)]
    pub age: Option<u32>,
    /// Resting heart rate (bpm)
    pub resting_hr: f64,
    /// Maximum heart rate (bpm)
    pub max_hr: f64,
    /// TENS sensitivity factor; base TENS intensity is divided by it
    #[serde(default)]
    pub stimulation_sensitivity: Option<f64>,
    /// Preferred TENS frequency (Hz), honored when inside the category band
    #[serde(default)]
    pub preferred_frequency_hz: Option<f64>,
    #[serde(default)]
    pub skin_sensitivity: SkinSensitivity,
    /// Body weight (kg), used for calorie estimates
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// Personal TENS ceiling (mA), applied below the device ceiling
    #[serde(default)]
    pub max_tens_intensity_ma: Option<f64>,
    /// Prior estimate of how well this user responds to TENS (0-1)
    #[serde(default)]
    pub tens_effectiveness: Option<f64>,
    /// Preferred audio soundscape for calm phases
    #[serde(default)]
    pub preferred_audio: Option<String>,
}

impl UserProfile {
    pub fn new(resting_hr: f64, max_hr: f64) -> Self {
        Self {
            age: None,
            resting_hr,
            max_hr,
            stimulation_sensitivity: None,
            preferred_frequency_hz: None,
            skin_sensitivity: SkinSensitivity::Normal,
            weight_kg: None,
            max_tens_intensity_ma: None,
            tens_effectiveness: None,
            preferred_audio: None,
        }
    }

    /// Heart-rate reserve `(hr - resting) / (max - resting)`, clamped to [0, 1]
    pub fn heart_rate_reserve(&self, heart_rate: f64) -> f64 {
        let span = self.max_hr - self.resting_hr;
        if span <= 0.0 || !heart_rate.is_finite() {
            return 0.0;
        }
        ((heart_rate - self.resting_hr) / span).clamp(0.0, 1.0)
    }
}

/// Exercise category, a pure function of the exercise name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Strength,
    Endurance,
    Hiit,
    Flexibility,
    Unknown,
}

impl ExerciseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseCategory::Strength => "strength",
            ExerciseCategory::Endurance => "endurance",
            ExerciseCategory::Hiit => "hiit",
            ExerciseCategory::Flexibility => "flexibility",
            ExerciseCategory::Unknown => "unknown",
        }
    }

    /// Whether progress is measured in discrete repetitions
    pub fn is_rep_based(&self) -> bool {
        matches!(self, ExerciseCategory::Strength | ExerciseCategory::Hiit)
    }

    /// Metabolic equivalent used for calorie estimates
    pub fn met(&self) -> f64 {
        match self {
            ExerciseCategory::Strength => 5.0,
            ExerciseCategory::Endurance => 7.0,
            ExerciseCategory::Hiit => 8.0,
            ExerciseCategory::Flexibility => 3.0,
            ExerciseCategory::Unknown => 5.0,
        }
    }
}

impl fmt::Display for ExerciseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strength" => Ok(ExerciseCategory::Strength),
            "endurance" => Ok(ExerciseCategory::Endurance),
            "hiit" => Ok(ExerciseCategory::Hiit),
            "flexibility" => Ok(ExerciseCategory::Flexibility),
            "unknown" => Ok(ExerciseCategory::Unknown),
            other => Err(format!("unknown exercise category: {other}")),
        }
    }
}

/// Session phase.
///
/// Declaration order is the forward order of the phase machine. `Setup` is
/// only used by the elapsed-time strategy, `Peak` only by the reserve strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExercisePhase {
    Setup,
    Warmup,
    Main,
    Peak,
    Cooldown,
    Recovery,
}

impl ExercisePhase {
    pub const ALL: [ExercisePhase; 6] = [
        ExercisePhase::Setup,
        ExercisePhase::Warmup,
        ExercisePhase::Main,
        ExercisePhase::Peak,
        ExercisePhase::Cooldown,
        ExercisePhase::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExercisePhase::Setup => "setup",
            ExercisePhase::Warmup => "warmup",
            ExercisePhase::Main => "main",
            ExercisePhase::Peak => "peak",
            ExercisePhase::Cooldown => "cooldown",
            ExercisePhase::Recovery => "recovery",
        }
    }

    /// Main or its Peak sub-phase
    pub fn is_working(&self) -> bool {
        matches!(self, ExercisePhase::Main | ExercisePhase::Peak)
    }
}

impl fmt::Display for ExercisePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exercise intensity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityTier {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl IntensityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityTier::Low => "low",
            IntensityTier::Moderate => "moderate",
            IntensityTier::High => "high",
            IntensityTier::VeryHigh => "very_high",
        }
    }

    /// Scale applied to TENS intensity, pulse width and sensory intensities
    pub fn multiplier(&self) -> f64 {
        match self {
            IntensityTier::Low => 0.7,
            IntensityTier::Moderate => 0.85,
            IntensityTier::High => 1.0,
            IntensityTier::VeryHigh => 1.15,
        }
    }

    pub fn from_heart_rate_reserve(reserve: f64) -> Self {
        if reserve < 0.6 {
            IntensityTier::Low
        } else if reserve < 0.7 {
            IntensityTier::Moderate
        } else if reserve < 0.85 {
            IntensityTier::High
        } else {
            IntensityTier::VeryHigh
        }
    }

    pub fn from_power(watts: f64) -> Self {
        if watts < 50.0 {
            IntensityTier::Low
        } else if watts < 100.0 {
            IntensityTier::Moderate
        } else if watts < 150.0 {
            IntensityTier::High
        } else {
            IntensityTier::VeryHigh
        }
    }
}

impl FromStr for IntensityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "low" => Ok(IntensityTier::Low),
            "moderate" => Ok(IntensityTier::Moderate),
            "high" => Ok(IntensityTier::High),
            "very_high" | "veryhigh" => Ok(IntensityTier::VeryHigh),
            other => Err(format!("unknown intensity tier: {other}")),
        }
    }
}

impl fmt::Display for IntensityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Electrical stimulation output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensParameters {
    /// Pulse frequency (Hz)
    pub frequency_hz: f64,
    /// Pulse width (µs)
    pub pulse_width_us: f64,
    /// Current amplitude (mA)
    pub intensity_ma: f64,
    /// Waveform tag
    pub waveform: String,
    /// Electrode placement, ordered by priority
    pub target_muscles: Vec<String>,
}

/// LED feedback channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualChannel {
    pub intensity: f64,
    /// RGB color
    pub color: [u8; 3],
    pub pattern: String,
}

/// Audio feedback channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChannel {
    pub intensity: f64,
    /// Output volume (0-1)
    pub volume: f64,
    /// Binaural beat frequency (Hz)
    pub beat_frequency_hz: f64,
    pub pattern: String,
}

/// Vibration feedback channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HapticChannel {
    pub intensity: f64,
    /// Vibration frequency (Hz)
    pub frequency_hz: f64,
    pub pattern: String,
}

/// Temperature feedback channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalChannel {
    pub intensity: f64,
    /// Contact plate temperature (°C)
    pub temperature_c: f64,
    pub pattern: String,
}

/// Complete, always fully populated stimulation output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulationParameterSet {
    pub tens: TensParameters,
    pub visual: VisualChannel,
    pub audio: AudioChannel,
    pub haptic: HapticChannel,
    pub thermal: ThermalChannel,
}

impl StimulationParameterSet {
    /// Scale every sensory-channel intensity (audio volume follows intensity)
    pub fn scale_sensory(&mut self, factor: f64) {
        self.visual.intensity *= factor;
        self.audio.intensity *= factor;
        self.audio.volume *= factor;
        self.haptic.intensity *= factor;
        self.thermal.intensity *= factor;
    }
}

/// Returned by a successful session start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub exercise_name: Option<String>,
    pub category: ExerciseCategory,
    pub intensity: Option<IntensityTier>,
    pub phase: ExercisePhase,
    pub stimulation_enabled: bool,
}

/// Per-sample output snapshot, the contract consumed by dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub exercise_name: Option<String>,
    pub category: ExerciseCategory,
    pub intensity: Option<IntensityTier>,
    pub phase: ExercisePhase,
    /// Seconds since session start
    pub elapsed_sec: f64,
    /// Running repetition total, present for rep-based categories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_count: Option<u32>,
    /// Whether this sample credited a repetition
    pub rep_detected: bool,
    /// Smoothed fatigue estimate (0-1)
    pub fatigue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_reserve: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hydration: Option<f64>,
    /// Present while stimulation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stimulation: Option<StimulationParameterSet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_heart_rate_reserve_is_clamped() {
        let profile = UserProfile::new(62.0, 185.0);
        assert_eq!(profile.heart_rate_reserve(40.0), 0.0);
        assert_eq!(profile.heart_rate_reserve(250.0), 1.0);
        let mid = profile.heart_rate_reserve(123.5);
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_profile_reserve_is_zero() {
        let profile = UserProfile::new(100.0, 100.0);
        assert_eq!(profile.heart_rate_reserve(150.0), 0.0);
    }

    #[test]
    fn test_accel_magnitude_uses_present_axes() {
        let sample = SensorSample::at(t0()).with_vertical_acceleration(-3.0);
        assert_eq!(sample.accel_magnitude(), Some(3.0));

        let sample = SensorSample::at(t0()).with_acceleration(3.0, 4.0, 0.0);
        assert_eq!(sample.accel_magnitude(), Some(5.0));

        assert_eq!(SensorSample::at(t0()).accel_magnitude(), None);
    }

    #[test]
    fn test_activity_prefers_emg() {
        let sample = SensorSample::at(t0())
            .with_emg(1.4)
            .with_acceleration(0.0, 0.0, GRAVITY);
        assert_eq!(sample.activity_level(), Some(1.0));

        let at_rest = SensorSample::at(t0()).with_acceleration(0.0, 0.0, GRAVITY);
        assert!(at_rest.activity_level().unwrap() < 1e-9);
    }

    #[test]
    fn test_hydration_from_impedance() {
        let sample = SensorSample::at(t0()).with_impedance(500.0);
        assert_eq!(sample.hydration(), Some(0.5));
        assert_eq!(SensorSample::at(t0()).with_impedance(900.0).hydration(), Some(1.0));
    }

    #[test]
    fn test_intensity_tier_thresholds() {
        assert_eq!(IntensityTier::from_heart_rate_reserve(0.59), IntensityTier::Low);
        assert_eq!(IntensityTier::from_heart_rate_reserve(0.6), IntensityTier::Moderate);
        assert_eq!(IntensityTier::from_heart_rate_reserve(0.84), IntensityTier::High);
        assert_eq!(IntensityTier::from_heart_rate_reserve(0.85), IntensityTier::VeryHigh);

        assert_eq!(IntensityTier::from_power(49.0), IntensityTier::Low);
        assert_eq!(IntensityTier::from_power(100.0), IntensityTier::High);
        assert_eq!(IntensityTier::from_power(150.0), IntensityTier::VeryHigh);
    }

    #[test]
    fn test_intensity_tier_parse_and_serde() {
        assert_eq!("very-high".parse::<IntensityTier>(), Ok(IntensityTier::VeryHigh));
        assert!("extreme".parse::<IntensityTier>().is_err());
        let json = serde_json::to_string(&IntensityTier::VeryHigh).unwrap();
        assert_eq!(json, "\"very_high\"");
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!("HIIT".parse::<ExerciseCategory>(), Ok(ExerciseCategory::Hiit));
        assert_eq!(" strength ".parse::<ExerciseCategory>(), Ok(ExerciseCategory::Strength));
        assert!("cardio".parse::<ExerciseCategory>().is_err());
        assert_eq!(ExerciseCategory::Flexibility.to_string(), "flexibility");
    }

    #[test]
    fn test_phase_order_is_forward_order() {
        assert!(ExercisePhase::Setup < ExercisePhase::Warmup);
        assert!(ExercisePhase::Main < ExercisePhase::Peak);
        assert!(ExercisePhase::Peak < ExercisePhase::Cooldown);
        assert!(ExercisePhase::Cooldown < ExercisePhase::Recovery);
    }

    #[test]
    fn test_profile_deserializes_sparse_json() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"resting_hr": 62, "max_hr": 185}"#).unwrap();
        assert_eq!(profile.skin_sensitivity, SkinSensitivity::Normal);
        assert!(profile.stimulation_sensitivity.is_none());
    }
}
