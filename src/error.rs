//! Error taxonomy shared by every generation stage.
//!
//! Parameter problems and external accessor misuse come back as `Err`.
//! Convergence trouble and unknown terrain names are recoverable: stages log
//! them and push a [`Warning`] into the generation report instead.

use std::fmt;

use thiserror::Error;

/// Errors raised by the surface generator.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("coordinates ({x}, {y}) outside {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{stage} stopped after {passes} passes at {achieved:.1}% (target {target}%)")]
    ConvergenceFailure {
        stage: &'static str,
        target: u8,
        achieved: f64,
        passes: usize,
    },
    #[error("unknown terrain or resource '{0}'")]
    RegistryMiss(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;

/// Shorthand for `MapError::InvalidParameter`.
pub fn invalid(message: impl Into<String>) -> MapError {
    MapError::InvalidParameter(message.into())
}

/// A recoverable problem noticed during generation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum Warning {
    /// A loop hit its pass cap or stalled; the closest result was kept.
    Convergence {
        stage: String,
        target: u8,
        achieved: f64,
        passes: usize,
    },
    /// A terrain or resource name was not found and the assignment was skipped.
    RegistryMiss(String),
    /// A value outside its legal range was clamped.
    Clamped { what: String, count: usize },
}

impl Warning {
    /// Convert an error into a warning when it is one of the recoverable kinds.
    pub fn from_error(error: &MapError) -> Option<Self> {
        match error {
            MapError::ConvergenceFailure {
                stage,
                target,
                achieved,
                passes,
            } => Some(Warning::Convergence {
                stage: stage.to_string(),
                target: *target,
                achieved: *achieved,
                passes: *passes,
            }),
            MapError::RegistryMiss(name) => Some(Warning::RegistryMiss(name.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Convergence {
                stage,
                target,
                achieved,
                passes,
            } => write!(
                f,
                "{} did not converge: {:.1}% after {} passes (target {}%)",
                stage, achieved, passes, target
            ),
            Warning::RegistryMiss(name) => write!(f, "skipped unknown name '{}'", name),
            Warning::Clamped { what, count } => write!(f, "clamped {} {} values", count, what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors_become_warnings() {
        let err = MapError::ConvergenceFailure {
            stage: "grow",
            target: 60,
            achieved: 41.5,
            passes: 12,
        };
        let warning = Warning::from_error(&err).unwrap();
        assert!(matches!(warning, Warning::Convergence { target: 60, .. }));

        let miss = Warning::from_error(&MapError::RegistryMiss("Tundra".into())).unwrap();
        assert_eq!(miss, Warning::RegistryMiss("Tundra".into()));
    }

    #[test]
    fn test_fatal_errors_stay_errors() {
        assert!(Warning::from_error(&invalid("width must be positive")).is_none());
        let oob = MapError::OutOfBounds { x: -1, y: 0, width: 4, height: 4 };
        assert!(Warning::from_error(&oob).is_none());
        assert!(oob.to_string().contains("(-1, 0)"));
    }
}
