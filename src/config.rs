use crate::errors::SourceError;
use serde::Deserialize;
use std::path::Path;

/// Tunables for a fusion run. All distances are in the units of the
/// network's projected coordinate system.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    /// Nominal tolerance used when cutting edge fragments.
    pub tolerance: f64,
    /// Retry ceiling. A split that still fails above this is abandoned.
    pub tolerance_max: f64,
    pub retry_multiplier: f64,
    /// Whether the nominal attempt may retry once at ten times the tolerance.
    pub allow_slack: bool,
    /// Tolerance of the containment and overlap predicates.
    pub match_tolerance: f64,
    /// Two observations with geometries closer than this count as the same observation.
    pub duplicate_geometry_tolerance: f64,
    pub srid: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            tolerance_max: 0.1,
            retry_multiplier: 1.1,
            allow_slack: true,
            match_tolerance: 1e-10,
            duplicate_geometry_tolerance: 0.1,
            srid: 3006,
        }
    }
}

impl FusionConfig {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = std::io::BufReader::new(file);
        let config: Self = serde_json::from_reader(reader).map_err(|source| SourceError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|reason| SourceError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Checks that tolerance escalation terminates: a positive finite
    /// tolerance, a finite ceiling at or above it, and a multiplier above one.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err("tolerance must be positive and finite");
        }
        if !(self.tolerance_max.is_finite() && self.tolerance_max >= self.tolerance) {
            return Err("tolerance_max must be finite and at least tolerance");
        }
        if !(self.retry_multiplier.is_finite() && self.retry_multiplier > 1.0) {
            return Err("retry_multiplier must be finite and greater than 1");
        }
        if !(self.match_tolerance.is_finite() && self.match_tolerance >= 0.0) {
            return Err("match_tolerance must be finite and not negative");
        }
        if !(self.duplicate_geometry_tolerance.is_finite()
            && self.duplicate_geometry_tolerance >= 0.0)
        {
            return Err("duplicate_geometry_tolerance must be finite and not negative");
        }
        Ok(())
    }
}
