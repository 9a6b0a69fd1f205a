//! Error types for the Smart Orb engine

use thiserror::Error;

/// Precondition violations on the session control surface.
///
/// Every variant is caller-correctable: the call that produced it left the
/// session untouched and may be retried once the precondition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No user profile has been supplied")]
    ProfileMissing,

    #[error("A session is already active")]
    AlreadyActive,

    #[error("No active session")]
    NoActiveSession,

    #[error("Exercise has not been declared or detected yet")]
    ExerciseUnknown,

    #[error("Exercise intensity has not been declared or detected yet")]
    IntensityUnknown,

    #[error("Stimulation parameters have not been initialized")]
    ParametersUninitialized,

    #[error("Stimulation is disabled")]
    StimulationDisabled,
}

impl SessionError {
    /// Stable machine-readable code used by the CLI and FFI layers
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ProfileMissing => "PROFILE_MISSING",
            SessionError::AlreadyActive => "ALREADY_ACTIVE",
            SessionError::NoActiveSession => "NO_ACTIVE_SESSION",
            SessionError::ExerciseUnknown => "EXERCISE_UNKNOWN",
            SessionError::IntensityUnknown => "INTENSITY_UNKNOWN",
            SessionError::ParametersUninitialized => "PARAMETERS_UNINITIALIZED",
            SessionError::StimulationDisabled => "STIMULATION_DISABLED",
        }
    }
}

/// Errors raised while ingesting or encoding data around the engine
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}
