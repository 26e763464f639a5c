use super::valence::{self, ValenceError};
use crate::core::models::molecule::Molecule;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConjugateError {
    #[error("Atom index {index} is out of range for a molecule with {atom_count} atoms")]
    AtomIndexOutOfRange { index: usize, atom_count: usize },

    #[error(
        "No proton transfer applies at atom #{atom} (pKa {pka}, pH {ph}, charge {charge}, {hydrogens} H)"
    )]
    NoApplicableTransfer {
        atom: usize,
        pka: f64,
        ph: f64,
        charge: i8,
        hydrogens: u32,
    },

    #[error("Conjugate would leave atom #{atom} with implausible charge {charge}")]
    UnlikelyCharge { atom: usize, charge: i8 },

    #[error("Sanitization failed: {0}")]
    Valence(#[from] ValenceError),
}

/// Derives the conjugate acid or base of a molecule at a single site.
///
/// This is the only chemistry the chain builders depend on, so tests can
/// substitute a scripted implementation.
pub trait ConjugateEngine {
    /// Returns a new molecule differing from `molecule` by one proton at
    /// `atom_index`. The input is never modified.
    ///
    /// # Errors
    ///
    /// Returns a [`ConjugateError`] if no chemically sensible conjugate can be
    /// formed at the requested site.
    fn derive_conjugate(
        &self,
        molecule: &Molecule,
        atom_index: usize,
        pka: f64,
        ph: f64,
    ) -> Result<Molecule, ConjugateError>;
}

/// Default conjugate engine: moves one proton on or off the reaction centre.
///
/// The direction is decided from the predicted pKa relative to the pH and
/// from the site's current charge and hydrogen count. A site with a pKa above
/// the pH that still carries hydrogens, or any cationic site, loses a proton.
/// A site with a pKa below the pH that is not cationic, or any site with no
/// hydrogens, gains one. pKa values outside `known_pka_range` disable the
/// charge-driven and hydrogen-driven fallbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtonTransfer {
    pub known_pka_range: (f64, f64),
}

impl Default for ProtonTransfer {
    fn default() -> Self {
        Self {
            known_pka_range: (-1.0, 14.0),
        }
    }
}

impl ProtonTransfer {
    pub fn new(known_pka_range: (f64, f64)) -> Self {
        Self { known_pka_range }
    }
}

impl ConjugateEngine for ProtonTransfer {
    fn derive_conjugate(
        &self,
        molecule: &Molecule,
        atom_index: usize,
        pka: f64,
        ph: f64,
    ) -> Result<Molecule, ConjugateError> {
        valence::sanitize(molecule)?;

        let Some(site) = molecule.atom(atom_index) else {
            return Err(ConjugateError::AtomIndexOutOfRange {
                index: atom_index,
                atom_count: molecule.atom_count(),
            });
        };
        let charge = site.formal_charge;
        let explicit = site.explicit_hydrogens;
        let total = valence::total_hydrogens(molecule, atom_index);
        let (pka_min, pka_max) = self.known_pka_range;

        let mut conjugate = molecule.clone();
        let Some(atom) = conjugate.atom_mut(atom_index) else {
            return Err(ConjugateError::AtomIndexOutOfRange {
                index: atom_index,
                atom_count: molecule.atom_count(),
            });
        };

        if (pka > ph && total > 0) || (charge > 0 && pka > pka_min) {
            atom.formal_charge = charge.saturating_sub(1);
            if explicit > 0 {
                atom.explicit_hydrogens = explicit - 1;
            }
        } else if (pka < ph && charge <= 0) || (total == 0 && pka < pka_max) {
            atom.formal_charge = charge.saturating_add(1);
            if total == 0 || explicit > 0 {
                atom.explicit_hydrogens = explicit.saturating_add(1);
            }
        } else {
            return Err(ConjugateError::NoApplicableTransfer {
                atom: atom_index,
                pka,
                ph,
                charge,
                hydrogens: total,
            });
        }

        if atom.formal_charge.unsigned_abs() > 1 {
            return Err(ConjugateError::UnlikelyCharge {
                atom: atom_index,
                charge: atom.formal_charge,
            });
        }

        valence::sanitize(&conjugate)?;
        Ok(conjugate)
    }
}
