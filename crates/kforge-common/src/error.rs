//! Unified error types for the kforge workspace.
//!
//! Every failure is fatal to the package currently being resolved or built.
//! The four domain variants (`Configuration`, `Build`, `Validation`,
//! `Network`) are the ones surfaced to users; the rest wrap plumbing errors.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum KforgeError {
    /// An option/setting combination is invalid or unsupported, or a required
    /// credential is missing.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the violated constraint.
        message: String,
    },

    /// An external tool invocation returned a failure status.
    #[error("build error: `{program}` exited with status {status}: {stderr}")]
    Build {
        /// Program that was invoked.
        program: String,
        /// Exit status (`-1` when terminated by a signal or not spawned).
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An artifact expected after installation is missing.
    #[error("validation error: expected {kind} is missing: {}", path.display())]
    Validation {
        /// Kind of artifact (e.g. "library directory").
        kind: &'static str,
        /// Path that was checked.
        path: PathBuf,
    },

    /// A download or remote service call failed.
    #[error("network error for {url}: {message}")]
    Network {
        /// Remote endpoint involved.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// A downloaded artifact did not match its published checksum.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected hash value.
        expected: String,
        /// Actual computed hash value.
        actual: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A document (XML, TOML, HTML) could not be parsed.
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed.
        what: &'static str,
        /// Parser diagnostic.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl KforgeError {
    /// Shorthand for a [`KforgeError::Configuration`] error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KforgeError>;
