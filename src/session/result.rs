//! Turn results handed back to the presentation shell

use std::fmt;

use crate::core::PilotError;

/// Why a turn failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The session could not be bootstrapped
    Init,
    /// The model or a tool failed mid-turn
    Generation,
    /// Another turn was already running
    Busy,
    /// The turn exceeded its time bound
    Timeout,
}

/// A failed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one submitted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    Success(String),
    Failure(TurnFailure),
}

impl TurnResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(text.into())
    }

    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failure(TurnFailure {
            kind,
            reason: reason.into(),
        })
    }

    /// Rejection for a submission that overlaps a running turn
    pub fn busy() -> Self {
        Self::from_error(PilotError::Busy)
    }

    /// Classify an error into a failed turn
    pub fn from_error(error: PilotError) -> Self {
        let kind = match error {
            PilotError::Init(_) => FailureKind::Init,
            PilotError::Busy => FailureKind::Busy,
            PilotError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Generation,
        };
        Self::failure(kind, error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.kind),
        }
    }

    /// Text to show the user
    pub fn display_text(&self) -> String {
        self.to_string()
    }
}

impl From<crate::core::Result<String>> for TurnResult {
    fn from(result: crate::core::Result<String>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(e) => Self::from_error(e),
        }
    }
}

impl fmt::Display for TurnResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(text) => write!(f, "{}", text),
            Self::Failure(TurnFailure {
                kind: FailureKind::Init,
                reason,
            }) => write!(f, "Error during initialization: {}", reason),
            Self::Failure(TurnFailure { reason, .. }) => write!(f, "Error: {}", reason),
        }
    }
}
