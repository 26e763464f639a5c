use pkasplit::engine::config::{DEFAULT_KNOWN_PKA_RANGE, DEFAULT_PH};

pub struct DefaultsConfig {
    pub ph: f64,
    pub remove_hydrogens: bool,
    pub compute_2d_coords: bool,
    pub known_pka_range: (f64, f64),
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ph: DEFAULT_PH,
            remove_hydrogens: true,
            compute_2d_coords: true,
            known_pka_range: DEFAULT_KNOWN_PKA_RANGE,
        }
    }
}
