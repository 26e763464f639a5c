use nalgebra::Point3;

/// Represents a single atom of a small-molecule connection table.
///
/// Atoms are addressed positionally: the index of an atom inside its
/// [`Molecule`](super::molecule::Molecule) is the 0-based counterpart of the
/// 1-based atom number used by SD files and by the pKa predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The element symbol as written in the atom block (e.g., "C", "Cl").
    pub symbol: String,
    /// The atom coordinates in Angstroms.
    pub position: Point3<f64>,
    /// The formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Hydrogens attached to this atom that are not present as atoms.
    ///
    /// Implicit hydrogens derived from the default valence are not included.
    pub explicit_hydrogens: u8,
    /// The mass difference column of the V2000 atom block.
    pub mass_difference: i8,
}

impl Atom {
    /// Creates a neutral atom with no explicit hydrogens.
    ///
    /// # Arguments
    ///
    /// * `symbol` - The element symbol.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(symbol: &str, position: Point3<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            position,
            formal_charge: 0,
            explicit_hydrogens: 0,
            mass_difference: 0,
        }
    }

    /// Builder-style setter for the formal charge.
    pub fn with_charge(mut self, charge: i8) -> Self {
        self.formal_charge = charge;
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self.symbol.as_str(), "H" | "D" | "T")
    }
}
