use thiserror::Error;

/// Failure of the external engine to produce audio. The only hard error for a unit.
#[derive(Debug, Clone, Error)]
#[error("synthesis failed for unit {unit_index}: {message}")]
pub struct SynthesisError {
    pub unit_index: usize,
    pub message: String,
}

impl SynthesisError {
    pub fn new(unit_index: usize, message: impl Into<String>) -> Self {
        Self {
            unit_index,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("unit {unit_index} has no usable duration (no audio and no phoneme timing)")]
    NoDuration { unit_index: usize },
}

impl AlignmentError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Persistent-tier failure. Logged and treated as a miss, never fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("cache record error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache audio error while {context}: {source}")]
    Wav {
        context: &'static str,
        #[source]
        source: hound::Error,
    },
}

impl CacheError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn wav(context: &'static str, source: hound::Error) -> Self {
        Self::Wav { context, source }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("unit {unit_index} was cancelled by a settings or document change")]
    Cancelled { unit_index: usize },
    #[error("no document loaded")]
    NoDocument,
    #[error("unit {unit_index} out of range (document has {unit_count} units)")]
    UnitOutOfRange {
        unit_index: usize,
        unit_count: usize,
    },
    #[error("worker for unit {unit_index} stopped: {message}")]
    Worker { unit_index: usize, message: String },
}

impl SchedulerError {
    pub(crate) fn cancelled(unit_index: usize) -> Self {
        Self::Cancelled { unit_index }
    }

    pub(crate) fn worker(unit_index: usize, err: impl std::fmt::Display) -> Self {
        Self::Worker {
            unit_index,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
