//! Safety clamp
//!
//! Bounds every numeric stimulation output to the device-safe range of its
//! kind. Clamping is total: out-of-range values are silently repaired, never
//! rejected, and NaN collapses to the lower bound.

use crate::types::StimulationParameterSet;
use tracing::debug;

/// TENS current amplitude (mA)
pub const TENS_INTENSITY_RANGE: (f64, f64) = (1.0, 10.0);
/// TENS pulse frequency (Hz)
pub const TENS_FREQUENCY_RANGE: (f64, f64) = (1.0, 200.0);
/// TENS pulse width (µs)
pub const TENS_PULSE_WIDTH_RANGE: (f64, f64) = (50.0, 500.0);
/// Any sensory-channel intensity
pub const SENSORY_INTENSITY_RANGE: (f64, f64) = (0.0, 1.0);
/// Audio output volume
pub const AUDIO_VOLUME_RANGE: (f64, f64) = (0.0, 1.0);
/// Thermal plate temperature (°C)
pub const THERMAL_TEMPERATURE_RANGE: (f64, f64) = (25.0, 40.0);
/// Haptic vibration frequency (Hz)
pub const HAPTIC_FREQUENCY_RANGE: (f64, f64) = (10.0, 300.0);
/// Binaural beat frequency (Hz)
pub const AUDIO_BEAT_FREQUENCY_RANGE: (f64, f64) = (1.0, 40.0);

/// Named parameter kinds with a fixed safe range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    TensIntensity,
    TensFrequency,
    TensPulseWidth,
    SensoryIntensity,
    AudioVolume,
    ThermalTemperature,
    HapticFrequency,
    AudioBeatFrequency,
}

impl ParameterKind {
    /// Closed `(min, max)` range for this kind
    pub const fn range(&self) -> (f64, f64) {
        match self {
            ParameterKind::TensIntensity => TENS_INTENSITY_RANGE,
            ParameterKind::TensFrequency => TENS_FREQUENCY_RANGE,
            ParameterKind::TensPulseWidth => TENS_PULSE_WIDTH_RANGE,
            ParameterKind::SensoryIntensity => SENSORY_INTENSITY_RANGE,
            ParameterKind::AudioVolume => AUDIO_VOLUME_RANGE,
            ParameterKind::ThermalTemperature => THERMAL_TEMPERATURE_RANGE,
            ParameterKind::HapticFrequency => HAPTIC_FREQUENCY_RANGE,
            ParameterKind::AudioBeatFrequency => AUDIO_BEAT_FREQUENCY_RANGE,
        }
    }
}

/// Final authority on every value leaving the engine
pub struct SafetyClamp;

impl SafetyClamp {
    /// Clip `value` into the safe range of `kind`
    pub fn clamp(kind: ParameterKind, value: f64) -> f64 {
        let (lo, hi) = kind.range();
        if value.is_nan() {
            return lo;
        }
        value.clamp(lo, hi)
    }

    /// Clamp every numeric field of a parameter set in place.
    ///
    /// Returns `true` if any field had to be repaired.
    pub fn enforce(params: &mut StimulationParameterSet) -> bool {
        let mut repaired = false;
        let mut apply = |kind: ParameterKind, value: &mut f64| {
            let clamped = Self::clamp(kind, *value);
            if clamped != *value {
                repaired = true;
                *value = clamped;
            }
        };

        apply(ParameterKind::TensIntensity, &mut params.tens.intensity_ma);
        apply(ParameterKind::TensFrequency, &mut params.tens.frequency_hz);
        apply(ParameterKind::TensPulseWidth, &mut params.tens.pulse_width_us);
        apply(ParameterKind::SensoryIntensity, &mut params.visual.intensity);
        apply(ParameterKind::SensoryIntensity, &mut params.audio.intensity);
        apply(ParameterKind::AudioVolume, &mut params.audio.volume);
        apply(ParameterKind::AudioBeatFrequency, &mut params.audio.beat_frequency_hz);
        apply(ParameterKind::SensoryIntensity, &mut params.haptic.intensity);
        apply(ParameterKind::HapticFrequency, &mut params.haptic.frequency_hz);
        apply(ParameterKind::SensoryIntensity, &mut params.thermal.intensity);
        apply(ParameterKind::ThermalTemperature, &mut params.thermal.temperature_c);

        if repaired {
            debug!(
                tens_intensity_ma = params.tens.intensity_ma,
                tens_frequency_hz = params.tens.frequency_hz,
                "stimulation parameters clamped to safe range"
            );
        }
        repaired
    }

    /// Whether every numeric field already lies in its safe range
    pub fn is_within_bounds(params: &StimulationParameterSet) -> bool {
        let ok = |kind: ParameterKind, v: f64| {
            let (lo, hi) = kind.range();
            v >= lo && v <= hi
        };
        ok(ParameterKind::TensIntensity, params.tens.intensity_ma)
            && ok(ParameterKind::TensFrequency, params.tens.frequency_hz)
            && ok(ParameterKind::TensPulseWidth, params.tens.pulse_width_us)
            && ok(ParameterKind::SensoryIntensity, params.visual.intensity)
            && ok(ParameterKind::SensoryIntensity, params.audio.intensity)
            && ok(ParameterKind::AudioVolume, params.audio.volume)
            && ok(ParameterKind::AudioBeatFrequency, params.audio.beat_frequency_hz)
            && ok(ParameterKind::SensoryIntensity, params.haptic.intensity)
            && ok(ParameterKind::HapticFrequency, params.haptic.frequency_hz)
            && ok(ParameterKind::SensoryIntensity, params.thermal.intensity)
            && ok(ParameterKind::ThermalTemperature, params.thermal.temperature_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AudioChannel, HapticChannel, TensParameters, ThermalChannel, VisualChannel,
    };
    use proptest::prelude::*;

    fn params_with(tens_intensity: f64, tens_frequency: f64, pulse_width: f64, sensory: f64) -> StimulationParameterSet {
        StimulationParameterSet {
            tens: TensParameters {
                frequency_hz: tens_frequency,
                pulse_width_us: pulse_width,
                intensity_ma: tens_intensity,
                waveform: "continuous".to_string(),
                target_muscles: vec!["quadriceps".to_string()],
            },
            visual: VisualChannel {
                intensity: sensory,
                color: [0, 200, 255],
                pattern: "steady".to_string(),
            },
            audio: AudioChannel {
                intensity: sensory,
                volume: sensory,
                beat_frequency_hz: 10.0,
                pattern: "nature".to_string(),
            },
            haptic: HapticChannel {
                intensity: sensory,
                frequency_hz: 50.0,
                pattern: "rhythmic".to_string(),
            },
            thermal: ThermalChannel {
                intensity: sensory,
                temperature_c: 32.0,
                pattern: "constant".to_string(),
            },
        }
    }

    #[test]
    fn test_exact_ranges() {
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensIntensity, 0.2), 1.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensIntensity, 12.0), 10.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensFrequency, 0.0), 1.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensFrequency, 250.0), 200.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensPulseWidth, 10.0), 50.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensPulseWidth, 900.0), 500.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::SensoryIntensity, -0.5), 0.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::SensoryIntensity, 1.5), 1.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensIntensity, 5.5), 5.5);
    }

    #[test]
    fn test_non_finite_values() {
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensIntensity, f64::NAN), 1.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensIntensity, f64::INFINITY), 10.0);
        assert_eq!(SafetyClamp::clamp(ParameterKind::TensFrequency, f64::NEG_INFINITY), 1.0);
    }

    #[test]
    fn test_enforce_reports_repairs() {
        let mut params = params_with(5.0, 40.0, 200.0, 0.5);
        assert!(!SafetyClamp::enforce(&mut params));

        let mut params = params_with(50.0, 40.0, 200.0, 0.5);
        assert!(SafetyClamp::enforce(&mut params));
        assert_eq!(params.tens.intensity_ma, 10.0);
    }

    proptest! {
        #[test]
        fn prop_clamp_is_idempotent_and_bounded(v in proptest::num::f64::ANY) {
            for kind in [
                ParameterKind::TensIntensity,
                ParameterKind::TensFrequency,
                ParameterKind::TensPulseWidth,
                ParameterKind::SensoryIntensity,
                ParameterKind::ThermalTemperature,
            ] {
                let (lo, hi) = kind.range();
                let once = SafetyClamp::clamp(kind, v);
                prop_assert!(once >= lo && once <= hi);
                prop_assert_eq!(SafetyClamp::clamp(kind, once), once);
            }
        }

        #[test]
        fn prop_enforced_parameters_are_in_bounds(
            intensity in -1.0e6f64..1.0e6,
            frequency in -1.0e6f64..1.0e6,
            pulse_width in -1.0e6f64..1.0e6,
            sensory in -10.0f64..10.0,
        ) {
            let mut params = params_with(intensity, frequency, pulse_width, sensory);
            SafetyClamp::enforce(&mut params);
            prop_assert!(SafetyClamp::is_within_bounds(&params));
        }
    }
}
