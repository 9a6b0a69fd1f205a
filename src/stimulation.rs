//! Stimulation parameter engine
//!
//! Base parameters are derived once per session from a per-category archetype
//! table, the resolved intensity tier and the user profile. Every sample the
//! current parameters are rebuilt from that frozen base for the active phase
//! and always finish with [`SafetyClamp::enforce`].

use crate::catalog::TargetMuscleCatalog;
use crate::safety::{ParameterKind, SafetyClamp};
use crate::types::{
    AudioChannel, ExerciseCategory, ExercisePhase, HapticChannel, IntensityTier,
    SkinSensitivity, StimulationParameterSet, TensParameters, ThermalChannel, UserProfile,
    VisualChannel,
};
use serde::{Deserialize, Serialize};

/// Sensory channel defaults for an archetype or phase preset
#[derive(Debug, Clone, Copy)]
struct SensoryPreset {
    color: [u8; 3],
    visual_intensity: f64,
    visual_pattern: &'static str,
    audio_intensity: f64,
    audio_volume: f64,
    beat_frequency_hz: f64,
    audio_pattern: &'static str,
    haptic_intensity: f64,
    haptic_frequency_hz: f64,
    haptic_pattern: &'static str,
    thermal_intensity: f64,
    temperature_c: f64,
    thermal_pattern: &'static str,
}

impl SensoryPreset {
    fn channels(&self) -> (VisualChannel, AudioChannel, HapticChannel, ThermalChannel) {
        (
            VisualChannel {
                intensity: self.visual_intensity,
                color: self.color,
                pattern: self.visual_pattern.to_string(),
            },
            AudioChannel {
                intensity: self.audio_intensity,
                volume: self.audio_volume,
                beat_frequency_hz: self.beat_frequency_hz,
                pattern: self.audio_pattern.to_string(),
            },
            HapticChannel {
                intensity: self.haptic_intensity,
                frequency_hz: self.haptic_frequency_hz,
                pattern: self.haptic_pattern.to_string(),
            },
            ThermalChannel {
                intensity: self.thermal_intensity,
                temperature_c: self.temperature_c,
                pattern: self.thermal_pattern.to_string(),
            },
        )
    }

    fn apply_to(&self, params: &mut StimulationParameterSet) {
        let (visual, audio, haptic, thermal) = self.channels();
        params.visual = visual;
        params.audio = audio;
        params.haptic = haptic;
        params.thermal = thermal;
    }
}

/// Fixed per-category stimulation profile
#[derive(Debug, Clone, Copy)]
pub struct Archetype {
    pub frequency_hz: f64,
    pub pulse_width_us: f64,
    pub intensity_ma: f64,
    pub waveform: &'static str,
    /// Preferred frequencies accepted for this category (Hz, inclusive)
    pub frequency_band: (f64, f64),
    sensory: SensoryPreset,
}

const STRENGTH: Archetype = Archetype {
    frequency_hz: 85.0,
    pulse_width_us: 250.0,
    intensity_ma: 6.0,
    waveform: "burst",
    frequency_band: (80.0, 100.0),
    sensory: SensoryPreset {
        color: [255, 60, 0],
        visual_intensity: 0.8,
        visual_pattern: "pulse",
        audio_intensity: 0.6,
        audio_volume: 0.6,
        beat_frequency_hz: 16.0,
        audio_pattern: "rhythm",
        haptic_intensity: 0.7,
        haptic_frequency_hz: 60.0,
        haptic_pattern: "strong_pulse",
        thermal_intensity: 0.3,
        temperature_c: 30.0,
        thermal_pattern: "cooling",
    },
};

const ENDURANCE: Archetype = Archetype {
    frequency_hz: 40.0,
    pulse_width_us: 200.0,
    intensity_ma: 4.5,
    waveform: "continuous",
    frequency_band: (30.0, 50.0),
    sensory: SensoryPreset {
        color: [0, 180, 255],
        visual_intensity: 0.6,
        visual_pattern: "steady",
        audio_intensity: 0.5,
        audio_volume: 0.5,
        beat_frequency_hz: 12.0,
        audio_pattern: "steady_beat",
        haptic_intensity: 0.5,
        haptic_frequency_hz: 50.0,
        haptic_pattern: "pulsed",
        thermal_intensity: 0.4,
        temperature_c: 29.0,
        thermal_pattern: "cooling",
    },
};

const HIIT: Archetype = Archetype {
    frequency_hz: 90.0,
    pulse_width_us: 220.0,
    intensity_ma: 6.5,
    waveform: "alternating",
    frequency_band: (20.0, 100.0),
    sensory: SensoryPreset {
        color: [255, 120, 0],
        visual_intensity: 0.9,
        visual_pattern: "fast_pulse",
        audio_intensity: 0.7,
        audio_volume: 0.7,
        beat_frequency_hz: 20.0,
        audio_pattern: "dynamic",
        haptic_intensity: 0.8,
        haptic_frequency_hz: 80.0,
        haptic_pattern: "burst",
        thermal_intensity: 0.5,
        temperature_c: 28.0,
        thermal_pattern: "cooling",
    },
};

const FLEXIBILITY: Archetype = Archetype {
    frequency_hz: 6.0,
    pulse_width_us: 300.0,
    intensity_ma: 3.0,
    waveform: "long_pulse",
    frequency_band: (2.0, 10.0),
    sensory: SensoryPreset {
        color: [150, 80, 255],
        visual_intensity: 0.4,
        visual_pattern: "slow_wave",
        audio_intensity: 0.4,
        audio_volume: 0.4,
        beat_frequency_hz: 8.0,
        audio_pattern: "ambient",
        haptic_intensity: 0.3,
        haptic_frequency_hz: 30.0,
        haptic_pattern: "gentle",
        thermal_intensity: 0.6,
        temperature_c: 36.0,
        thermal_pattern: "warming",
    },
};

const UNKNOWN: Archetype = Archetype {
    frequency_hz: 35.0,
    pulse_width_us: 200.0,
    intensity_ma: 3.5,
    waveform: "continuous",
    frequency_band: (20.0, 80.0),
    sensory: SensoryPreset {
        color: [0, 200, 255],
        visual_intensity: 0.5,
        visual_pattern: "steady",
        audio_intensity: 0.5,
        audio_volume: 0.5,
        beat_frequency_hz: 10.0,
        audio_pattern: "steady_beat",
        haptic_intensity: 0.5,
        haptic_frequency_hz: 40.0,
        haptic_pattern: "pulsed",
        thermal_intensity: 0.4,
        temperature_c: 32.0,
        thermal_pattern: "neutral",
    },
};

const COOLDOWN_PRESET: SensoryPreset = SensoryPreset {
    color: [180, 180, 255],
    visual_intensity: 0.4,
    visual_pattern: "slow_fade",
    audio_intensity: 0.4,
    audio_volume: 0.4,
    beat_frequency_hz: 8.0,
    audio_pattern: "calming",
    haptic_intensity: 0.3,
    haptic_frequency_hz: 50.0,
    haptic_pattern: "gentle_wave",
    thermal_intensity: 0.4,
    temperature_c: 28.0,
    thermal_pattern: "cooling",
};

const RECOVERY_PRESET: SensoryPreset = SensoryPreset {
    color: [150, 255, 220],
    visual_intensity: 0.3,
    visual_pattern: "breathing",
    audio_intensity: 0.3,
    audio_volume: 0.3,
    beat_frequency_hz: 6.0,
    audio_pattern: "ambient",
    haptic_intensity: 0.2,
    haptic_frequency_hz: 30.0,
    haptic_pattern: "gentle",
    thermal_intensity: 0.5,
    temperature_c: 33.0,
    thermal_pattern: "warming",
};

/// Archetype for a category; the match is exhaustive over categories
pub fn archetype(category: ExerciseCategory) -> &'static Archetype {
    match category {
        ExerciseCategory::Strength => &STRENGTH,
        ExerciseCategory::Endurance => &ENDURANCE,
        ExerciseCategory::Hiit => &HIIT,
        ExerciseCategory::Flexibility => &FLEXIBILITY,
        ExerciseCategory::Unknown => &UNKNOWN,
    }
}

const WARMUP_INTENSITY: f64 = 0.7;
const WARMUP_PULSE_WIDTH: f64 = 0.8;
const WARMUP_SENSORY: f64 = 0.8;

/// Fatigue gain on TENS intensity in working phases
const FATIGUE_GAIN: f64 = 0.2;

/// Thermal cooling per unit fatigue in working phases (°C)
const FATIGUE_COOLING_C: f64 = 2.0;

const HIIT_WORK_MULTIPLIER: f64 = 1.1;
const HIIT_REST_MULTIPLIER: f64 = 0.7;

const REP_BOOST_INTENSITY: f64 = 1.2;
const REP_BOOST_PULSE_WIDTH: f64 = 1.1;

/// Seconds after a repetition during which the strength boost applies
pub const REP_BOOST_WINDOW_SEC: f64 = 2.0;

const PEAK_FREQUENCY_MULTIPLIER: f64 = 1.15;

/// (seconds in Cooldown, intensity factor), latest matching step wins
const COOLDOWN_STEPS: [(f64, f64); 3] = [(0.0, 0.6), (60.0, 0.4), (180.0, 0.2)];
const COOLDOWN_FREQUENCY_HZ: f64 = 20.0;
const COOLDOWN_PULSE_WIDTH_US: f64 = 200.0;

const RECOVERY_INTENSITY: f64 = 0.3;
const RECOVERY_FREQUENCY_HZ: f64 = 5.0;
const RECOVERY_PULSE_WIDTH_US: f64 = 300.0;

const SENSITIVE_SKIN_FACTOR: f64 = 0.8;

/// Per-sample inputs to phase adaptation
#[derive(Debug, Clone, Copy)]
pub struct AdaptationContext {
    pub category: ExerciseCategory,
    pub phase: ExercisePhase,
    pub fatigue: f64,
    pub time_in_phase_sec: f64,
    /// HIIT work (true) or rest (false) interval; `None` when activity is unknown
    pub work_interval: Option<bool>,
    /// A repetition was credited within the boost window
    pub recent_rep: bool,
}

/// Sparse manual overrides, each bounded on application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    pub tens_intensity_ma: Option<f64>,
    pub tens_frequency_hz: Option<f64>,
    pub target_muscles: Option<Vec<String>>,
    pub visual_intensity: Option<f64>,
    pub audio_intensity: Option<f64>,
    pub haptic_intensity: Option<f64>,
    pub thermal_intensity: Option<f64>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Later overrides win field by field
    pub fn merge(&mut self, other: &ParameterOverrides) {
        let ParameterOverrides {
            tens_intensity_ma,
            tens_frequency_hz,
            target_muscles,
            visual_intensity,
            audio_intensity,
            haptic_intensity,
            thermal_intensity,
        } = other.clone();
        self.tens_intensity_ma = tens_intensity_ma.or(self.tens_intensity_ma);
        self.tens_frequency_hz = tens_frequency_hz.or(self.tens_frequency_hz);
        self.target_muscles = target_muscles.or(self.target_muscles.take());
        self.visual_intensity = visual_intensity.or(self.visual_intensity);
        self.audio_intensity = audio_intensity.or(self.audio_intensity);
        self.haptic_intensity = haptic_intensity.or(self.haptic_intensity);
        self.thermal_intensity = thermal_intensity.or(self.thermal_intensity);
    }

    pub fn apply(&self, params: &mut StimulationParameterSet) {
        let sensory = |v: f64| SafetyClamp::clamp(ParameterKind::SensoryIntensity, v);
        if let Some(v) = self.tens_intensity_ma {
            params.tens.intensity_ma = SafetyClamp::clamp(ParameterKind::TensIntensity, v);
        }
        if let Some(v) = self.tens_frequency_hz {
            params.tens.frequency_hz = SafetyClamp::clamp(ParameterKind::TensFrequency, v);
        }
        if let Some(muscles) = &self.target_muscles {
            params.tens.target_muscles = muscles.clone();
        }
        if let Some(v) = self.visual_intensity {
            params.visual.intensity = sensory(v);
        }
        if let Some(v) = self.audio_intensity {
            params.audio.intensity = sensory(v);
        }
        if let Some(v) = self.haptic_intensity {
            params.haptic.intensity = sensory(v);
        }
        if let Some(v) = self.thermal_intensity {
            params.thermal.intensity = sensory(v);
        }
    }
}

/// Stateless parameter derivation
pub struct StimulationParameterEngine;

impl StimulationParameterEngine {
    /// Frozen base snapshot for a category, tier and profile
    pub fn base_parameters(
        exercise_name: &str,
        category: ExerciseCategory,
        tier: IntensityTier,
        profile: &UserProfile,
    ) -> StimulationParameterSet {
        let arch = archetype(category);
        let multiplier = tier.multiplier();

        let mut intensity = arch.intensity_ma * multiplier;
        if let Some(sensitivity) = profile
            .stimulation_sensitivity
            .filter(|s| s.is_finite() && *s > 0.0)
        {
            intensity /= sensitivity;
        }
        if profile.skin_sensitivity == SkinSensitivity::Sensitive {
            intensity *= SENSITIVE_SKIN_FACTOR;
        }

        let (low, high) = arch.frequency_band;
        let frequency = profile
            .preferred_frequency_hz
            .filter(|f| (low..=high).contains(f))
            .unwrap_or(arch.frequency_hz);

        let (visual, audio, haptic, thermal) = arch.sensory.channels();
        let mut params = StimulationParameterSet {
            tens: TensParameters {
                frequency_hz: frequency,
                pulse_width_us: arch.pulse_width_us * multiplier,
                intensity_ma: intensity,
                waveform: arch.waveform.to_string(),
                target_muscles: TargetMuscleCatalog::muscles_for(exercise_name),
            },
            visual,
            audio,
            haptic,
            thermal,
        };
        params.scale_sensory(multiplier);
        if let Some(pattern) = &profile.preferred_audio {
            params.audio.pattern = pattern.clone();
        }
        Self::finalize(&mut params, profile);
        params
    }

    /// Current parameters for this sample, rebuilt from `base`
    pub fn adapt(
        base: &StimulationParameterSet,
        ctx: &AdaptationContext,
        profile: &UserProfile,
    ) -> StimulationParameterSet {
        let mut params = base.clone();

        match ctx.phase {
            ExercisePhase::Setup | ExercisePhase::Warmup => {
                params.tens.intensity_ma *= WARMUP_INTENSITY;
                params.tens.pulse_width_us *= WARMUP_PULSE_WIDTH;
                params.scale_sensory(WARMUP_SENSORY);
            }
            ExercisePhase::Main | ExercisePhase::Peak => {
                Self::apply_working(&mut params, ctx);
                if ctx.phase == ExercisePhase::Peak {
                    params.tens.frequency_hz *= PEAK_FREQUENCY_MULTIPLIER;
                    params.visual.pattern = "fast_pulse".to_string();
                }
            }
            ExercisePhase::Cooldown => {
                let step = COOLDOWN_STEPS
                    .iter()
                    .rev()
                    .find(|(after, _)| ctx.time_in_phase_sec >= *after)
                    .map(|(_, factor)| *factor)
                    .unwrap_or(COOLDOWN_STEPS[0].1);
                params.tens.intensity_ma *= step;
                params.tens.frequency_hz = COOLDOWN_FREQUENCY_HZ;
                params.tens.pulse_width_us = COOLDOWN_PULSE_WIDTH_US;
                params.tens.waveform = "wave".to_string();
                COOLDOWN_PRESET.apply_to(&mut params);
            }
            ExercisePhase::Recovery => {
                params.tens.intensity_ma *= RECOVERY_INTENSITY;
                params.tens.frequency_hz = RECOVERY_FREQUENCY_HZ;
                params.tens.pulse_width_us = RECOVERY_PULSE_WIDTH_US;
                params.tens.waveform = "long_pulse".to_string();
                RECOVERY_PRESET.apply_to(&mut params);
            }
        }

        Self::finalize(&mut params, profile);
        params
    }

    /// Personal ceiling, then the absolute clamp.
    ///
    /// The device floor wins over a personal ceiling set below it.
    pub fn finalize(params: &mut StimulationParameterSet, profile: &UserProfile) {
        if let Some(ceiling) = profile.max_tens_intensity_ma.filter(|c| c.is_finite()) {
            params.tens.intensity_ma = params.tens.intensity_ma.min(ceiling);
        }
        SafetyClamp::enforce(params);
    }

    fn apply_working(params: &mut StimulationParameterSet, ctx: &AdaptationContext) {
        let fatigue = ctx.fatigue.clamp(0.0, 1.0);
        params.tens.intensity_ma *= 1.0 + FATIGUE_GAIN * fatigue;
        params.thermal.temperature_c -= FATIGUE_COOLING_C * fatigue;

        match ctx.category {
            ExerciseCategory::Hiit => {
                let factor = match ctx.work_interval {
                    Some(true) => HIIT_WORK_MULTIPLIER,
                    Some(false) => HIIT_REST_MULTIPLIER,
                    None => 1.0,
                };
                params.tens.intensity_ma *= factor;
                params.scale_sensory(factor);
            }
            ExerciseCategory::Strength if ctx.recent_rep => {
                params.tens.intensity_ma *= REP_BOOST_INTENSITY;
                params.tens.pulse_width_us *= REP_BOOST_PULSE_WIDTH;
            }
            _ => {}
        }
    }
}
