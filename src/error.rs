use std::fmt;

use thiserror::Error;

/// Categorical axis a prediction attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Position,
    Year,
    DevTrait,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Position => "position",
            Axis::Year => "year",
            Axis::DevTrait => "dev trait",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(
        "unknown {axis} '{value}' for model {version}; reselect a valid value for this model version"
    )]
    UnknownCategory {
        axis: Axis,
        value: String,
        version: String,
    },

    #[error("no accuracy profile for dev trait '{tier}' in model {version}")]
    UnknownTier { tier: String, version: String },

    #[error("unknown model version '{0}'")]
    UnknownVersion(String),

    #[error("prediction was made with model {expected}, not {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("invalid {field}: {reason}")]
    InvalidAttribute { field: &'static str, reason: String },

    #[error("model {version} failed validation: {reason}")]
    InvalidModel { version: String, reason: String },

    #[error("feedback sink unavailable: {0}")]
    SinkUnavailable(String),
}

impl EngineError {
    pub(crate) fn invalid_model(version: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidModel {
            version: version.to_string(),
            reason: reason.into(),
        }
    }
}
