//! Engine configuration
//!
//! Runtime knobs for the control loop. Algorithm thresholds are fixed
//! constants in their modules; only the strategy selection and resource
//! limits are configurable.

use crate::error::ComputeError;
use crate::window::DEFAULT_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};

/// Which phase-detection and fatigue model pair drives a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStrategy {
    /// Setup/Warmup/Main/Cooldown/Recovery from elapsed time and rolling
    /// trends; fatigue from elapsed time and heart-rate drift
    #[default]
    Elapsed,
    /// Warmup/Main/Peak/Cooldown/Recovery from instantaneous heart-rate
    /// reserve; fatigue as a leaky integrator over reserve and EMG
    HeartRateReserve,
}

impl ControlStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlStrategy::Elapsed => "elapsed",
            ControlStrategy::HeartRateReserve => "heart_rate_reserve",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: ControlStrategy,
    /// Ring buffer size for rolling statistics
    pub window_capacity: usize,
    /// Turn stimulation on by itself once exercise and intensity resolve
    pub auto_enable_stimulation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: ControlStrategy::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            auto_enable_stimulation: false,
        }
    }
}

impl EngineConfig {
    pub fn with_strategy(mut self, strategy: ControlStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_auto_enable_stimulation(mut self, enabled: bool) -> Self {
        self.auto_enable_stimulation = enabled;
        self
    }

    /// Load configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}
