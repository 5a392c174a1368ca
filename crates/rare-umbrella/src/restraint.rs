use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Restraint};
use rare_engine::{format_float, render};

/// Text template of the engine's restraint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestraintTemplate {
    text: String,
}

impl RestraintTemplate {
    /// Wraps template text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Reads the template from disk.
    pub fn load(path: &Path) -> Result<Self, RareError> {
        let text = fs::read_to_string(path).map_err(|err| {
            RareError::Config(
                ErrorInfo::new("template-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Ok(Self::new(text))
    }

    /// Renders a flat-bottomed harmonic restraint around `center`.
    ///
    /// `r1 = max(lower_limit, center - flank)`, `r2 = center` and
    /// `r4 = center + flank`.
    pub fn render(
        &self,
        center: f64,
        force_constant: f64,
        flank: f64,
        lower_limit: f64,
    ) -> Result<Restraint, RareError> {
        let mut params = BTreeMap::new();
        params.insert("r1", format_float(lower_limit.max(center - flank)));
        params.insert("r2", format_float(center));
        params.insert("r4", format_float(center + flank));
        params.insert("r_k", format_float(force_constant));
        Ok(Restraint {
            center,
            force_constant,
            contents: render(&self.text, &params)?,
        })
    }
}
