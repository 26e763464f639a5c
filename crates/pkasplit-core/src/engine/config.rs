use thiserror::Error;

/// Physiological pH used to separate acidic from basic sites.
pub const DEFAULT_PH: f64 = 7.4;

/// pKa interval within which the conjugate rule trusts charge-driven and
/// hydrogen-driven proton transfers.
pub const DEFAULT_KNOWN_PKA_RANGE: (f64, f64) = (-1.0, 14.0);

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("pH must be a finite number (value: {0})")]
    InvalidPh(f64),

    #[error("Known pKa range must satisfy min < max (min: {min}, max: {max})")]
    InvalidPkaRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Entries with a pKa at or below this value are acidic.
    pub ph: f64,
    pub remove_hydrogens: bool,
    pub compute_2d_coords: bool,
    pub known_pka_range: (f64, f64),
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ph: DEFAULT_PH,
            remove_hydrogens: true,
            compute_2d_coords: true,
            known_pka_range: DEFAULT_KNOWN_PKA_RANGE,
        }
    }
}

#[derive(Default)]
pub struct SplitConfigBuilder {
    ph: Option<f64>,
    remove_hydrogens: Option<bool>,
    compute_2d_coords: Option<bool>,
    known_pka_range: Option<(f64, f64)>,
}

impl SplitConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ph(mut self, ph: f64) -> Self {
        self.ph = Some(ph);
        self
    }
    pub fn remove_hydrogens(mut self, remove: bool) -> Self {
        self.remove_hydrogens = Some(remove);
        self
    }
    pub fn compute_2d_coords(mut self, compute: bool) -> Self {
        self.compute_2d_coords = Some(compute);
        self
    }
    pub fn known_pka_range(mut self, min: f64, max: f64) -> Self {
        self.known_pka_range = Some((min, max));
        self
    }

    pub fn build(self) -> Result<SplitConfig, ConfigError> {
        let defaults = SplitConfig::default();

        let ph = self.ph.unwrap_or(defaults.ph);
        if !ph.is_finite() {
            return Err(ConfigError::InvalidPh(ph));
        }

        let (min, max) = self.known_pka_range.unwrap_or(defaults.known_pka_range);
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(ConfigError::InvalidPkaRange { min, max });
        }

        Ok(SplitConfig {
            ph,
            remove_hydrogens: self.remove_hydrogens.unwrap_or(defaults.remove_hydrogens),
            compute_2d_coords: self
                .compute_2d_coords
                .unwrap_or(defaults.compute_2d_coords),
            known_pka_range: (min, max),
        })
    }
}
