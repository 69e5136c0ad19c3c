//! Error types for slice loading, event sources, configuration, and merging.

use std::fmt;
use std::path::PathBuf;

use crate::histogram::Axis;

/// Why a kinematic slice could not be loaded.
///
/// Every variant is recoverable at the run level: the aggregator skips the
/// slice and continues with the rest.
#[derive(Debug)]
pub enum SliceError {
    /// Slice directory or one of its required files does not exist.
    Missing { path: PathBuf },
    /// Reading a file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// `summary.json` exists but is not a valid summary.
    Summary { path: PathBuf, reason: String },
    /// `pairs.csv` has a bad header or a malformed row.
    Records {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "missing {}", path.display()),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Summary { path, reason } => {
                write!(f, "invalid slice summary {}: {reason}", path.display())
            }
            Self::Records { path, line, reason } => {
                write!(f, "invalid pair records {}:{line}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for SliceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure of an event source.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be opened or read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// One event could not be decoded.
    Parse { line: usize, reason: String },
    /// The source refused its configuration.
    Init(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "event source {}: {source}", path.display()),
            Self::Parse { line, reason } => write!(f, "bad event on line {line}: {reason}"),
            Self::Init(reason) => write!(f, "event source initialization failed: {reason}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Invalid or unreadable configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse { path: PathBuf, reason: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            Self::Parse { path, reason } => {
                write!(f, "failed to parse config {}: {reason}", path.display())
            }
            Self::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Two accumulators that cannot be combined.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeError {
    /// Histograms or profiles with different axes.
    Binning { ours: Vec<Axis>, theirs: Vec<Axis> },
    /// Aggregators built with different aggregation settings.
    Settings,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binning { ours, theirs } => {
                write!(f, "incompatible binning: {ours:?} vs {theirs:?}")
            }
            Self::Settings => write!(f, "cannot merge aggregators with different settings"),
        }
    }
}

impl std::error::Error for MergeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_error_display_names_path() {
        let err = SliceError::Missing {
            path: PathBuf::from("out/pp200_pThat_2_3/summary.json"),
        };
        assert_eq!(err.to_string(), "missing out/pp200_pThat_2_3/summary.json");
    }

    #[test]
    fn records_error_display_has_line() {
        let err = SliceError::Records {
            path: PathBuf::from("pairs.csv"),
            line: 4,
            reason: "expected 11 fields, found 3".to_string(),
        };
        assert!(err.to_string().contains("pairs.csv:4"));
    }

    #[test]
    fn io_error_exposes_source() {
        use std::error::Error;
        let err = SourceError::Io {
            path: PathBuf::from("events.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn merge_error_display_lists_both_axes() {
        let err = MergeError::Binning {
            ours: vec![Axis::new(10, 0.0, 10.0)],
            theirs: vec![Axis::new(10, 0.0, 30.0)],
        };
        let text = err.to_string();
        assert!(text.starts_with("incompatible binning"));
        assert!(text.contains("30.0"));
    }
}
