//! Smart Orb engine - adaptive stimulation control for wearable exercise devices
//!
//! The engine ingests a stream of sensor samples and, per sample, classifies the
//! exercise, tracks the session phase, detects repetitions, estimates fatigue and
//! computes safety-bounded stimulation parameters: classify → phase →
//! repetitions → fatigue → stimulation → safety clamp.
//!
//! ## Modules
//!
//! - **Session**: lifecycle and the per-sample entry point ([`SessionManager`])
//! - **Signals**: rolling window, classifier, phase tracker, repetition and fatigue estimators
//! - **Stimulation**: archetype table, phase adaptation and the [`SafetyClamp`]
//! - **Interop**: the `orb.sensor_reading.v1` wire schema and C ABI bindings

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fatigue;
pub mod phase;
pub mod reps;
pub mod safety;
pub mod schema;
pub mod session;
pub mod stimulation;
pub mod summary;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use catalog::TargetMuscleCatalog;
pub use classifier::{ExerciseModel, HeuristicClassifier};
pub use config::{ControlStrategy, EngineConfig};
pub use error::{ComputeError, SessionError};
pub use safety::SafetyClamp;
pub use session::{SessionManager, SessionRequest};
pub use stimulation::{ParameterOverrides, StimulationParameterEngine};
pub use summary::{EffectivenessRecord, PerformanceMetrics, SessionSummary};
pub use types::{
    ExerciseCategory, ExercisePhase, IntensityTier, ProcessedSample, SensorSample,
    StimulationParameterSet, UserProfile,
};

// Schema exports
pub use schema::{ReadingParser, SensorReading, SCHEMA_VERSION};

/// Engine version reported by the CLI and FFI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name attached to emitted reports
pub const PRODUCER_NAME: &str = "smartorb-engine";
