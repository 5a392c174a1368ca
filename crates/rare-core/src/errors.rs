//! Error families shared by the sampling crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Details carried by every [`RareError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Short kebab-case code, stable across releases (`weight-drift`, `command-exit`).
    pub code: String,
    /// What went wrong, for humans.
    pub message: String,
    /// Where it went wrong: cycle, walker, phase, path.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, when there is an obvious one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with no context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records `key = value`, replacing an earlier value for `key`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampling drivers.
///
/// Variants name the family of the failure; the payload carries the details.
/// Only the controller layer decides whether a family terminates a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RareError {
    /// External MD engine failures (crash, missing output files).
    #[error("step error: {0}")]
    Step(ErrorInfo),
    /// Progress coordinate evaluation failures.
    #[error("progress error: {0}")]
    Progress(ErrorInfo),
    /// Bin definition or assignment errors.
    #[error("binning error: {0}")]
    Binning(ErrorInfo),
    /// Boundary detection and recycling errors.
    #[error("recycle error: {0}")]
    Recycle(ErrorInfo),
    /// Split/merge invariant violations.
    #[error("resample error: {0}")]
    Resample(ErrorInfo),
    /// Population level failures (empty ensemble, weight drift).
    #[error("population error: {0}")]
    Population(ErrorInfo),
    /// Checkpoint corruption or mismatch on restart.
    #[error("checkpoint error: {0}")]
    Checkpoint(ErrorInfo),
    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl RareError {
    /// Payload of the error, whatever its family.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RareError::Step(info)
            | RareError::Progress(info)
            | RareError::Binning(info)
            | RareError::Recycle(info)
            | RareError::Resample(info)
            | RareError::Population(info)
            | RareError::Checkpoint(info)
            | RareError::Config(info)
            | RareError::Serde(info) => info,
        }
    }

    /// Adds a context entry to the payload, keeping the family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            RareError::Step(info) => RareError::Step(info.with_context(key, value)),
            RareError::Progress(info) => RareError::Progress(info.with_context(key, value)),
            RareError::Binning(info) => RareError::Binning(info.with_context(key, value)),
            RareError::Recycle(info) => RareError::Recycle(info.with_context(key, value)),
            RareError::Resample(info) => RareError::Resample(info.with_context(key, value)),
            RareError::Population(info) => RareError::Population(info.with_context(key, value)),
            RareError::Checkpoint(info) => RareError::Checkpoint(info.with_context(key, value)),
            RareError::Config(info) => RareError::Config(info.with_context(key, value)),
            RareError::Serde(info) => RareError::Serde(info.with_context(key, value)),
        }
    }

    /// Returns the stable family label of the error.
    pub fn family(&self) -> &'static str {
        match self {
            RareError::Step(_) => "step",
            RareError::Progress(_) => "progress",
            RareError::Binning(_) => "binning",
            RareError::Recycle(_) => "recycle",
            RareError::Resample(_) => "resample",
            RareError::Population(_) => "population",
            RareError::Checkpoint(_) => "checkpoint",
            RareError::Config(_) => "config",
            RareError::Serde(_) => "serde",
        }
    }
}
