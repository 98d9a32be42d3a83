//! # Solver configuration
//!
//! Settings for the iterative solvers, usually read from a small TOML file. Unspecified values
//! take their defaults, so partial files are fine.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::linear_algebra::CLEAN_TOLERANCE;

/// Default relative residual at which conjugate gradients stop.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
/// Default maximum number of conjugate gradient iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// How the system is preconditioned before conjugate gradients are applied.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preconditioner {
    /// Plain conjugate gradients.
    None,
    /// Solve with the incomplete LU factors in every iteration.
    #[default]
    Ilu,
    /// Transform the system with the inverse of the incomplete lower factor `L` into
    /// `L^-1 A L^-T y = L^-1 b` and map the solution back with `x = L^-T y`.
    IluTransform,
}

/// Settings for the conjugate gradient family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolverConfig {
    /// Relative residual `|r| / |b|` at which iteration stops.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Values closer to zero than this are removed from the transformed system.
    pub clean_tolerance: f64,
    /// Preconditioning variant.
    pub preconditioner: Preconditioner,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            clean_tolerance: CLEAN_TOLERANCE,
            preconditioner: Preconditioner::default(),
        }
    }
}

/// Reading a configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The contents are not a valid configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SolverConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Use a different preconditioner.
    #[must_use]
    pub fn with_preconditioner(mut self, preconditioner: Preconditioner) -> Self {
        self.preconditioner = preconditioner;
        self
    }
}
