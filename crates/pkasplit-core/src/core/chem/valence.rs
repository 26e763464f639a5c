use crate::core::models::molecule::Molecule;
use phf::{Map, phf_map};
use thiserror::Error;

#[rustfmt::skip]
static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "D" => 1, "T" => 1, "He" => 2,
    "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9, "Ne" => 10,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18,
    "K" => 19, "Ca" => 20, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30,
    "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Ag" => 47, "Sn" => 50, "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54,
    "Cs" => 55, "Ba" => 56, "Pt" => 78, "Au" => 79, "Hg" => 80,
};

/// Default valences by atomic number, smallest first.
///
/// Elements without an entry (metals, noble gases, anything unknown) get no
/// implicit hydrogens and are never rejected by [`sanitize`].
fn default_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        1 => &[1],
        5 => &[3],
        6 => &[4],
        7 => &[3],
        8 => &[2],
        9 => &[1],
        14 => &[4],
        15 => &[3, 5, 7],
        16 => &[2, 4, 6],
        17 => &[1],
        32 => &[4],
        33 => &[3, 5, 7],
        34 => &[2, 4, 6],
        35 => &[1],
        52 => &[2, 4, 6],
        53 => &[1, 3, 5],
        _ => &[],
    }
}

pub fn atomic_number(symbol: &str) -> Option<u8> {
    ATOMIC_NUMBERS.get(symbol.trim()).copied()
}

/// Allowed valences for an element in a given charge state.
///
/// A charged atom behaves like its isoelectronic neighbour, so N+ takes the
/// valences of carbon and O- those of fluorine.
pub fn allowed_valences(symbol: &str, formal_charge: i8) -> &'static [u8] {
    let Some(z) = atomic_number(symbol) else {
        return &[];
    };
    let effective = z as i16 - formal_charge as i16;
    if !(1..=u8::MAX as i16).contains(&effective) {
        return &[];
    }
    default_valences(effective as u8)
}

/// Valence from bonds and explicit hydrogens. Aromatic bonds count 1.5 and
/// the sum is truncated.
pub fn explicit_valence(molecule: &Molecule, atom: usize) -> u32 {
    let half: u32 = molecule
        .bonds_of(atom)
        .map(|b| b.order.half_valence())
        .sum();
    let hydrogens = molecule
        .atom(atom)
        .map_or(0, |a| a.explicit_hydrogens as u32);
    half / 2 + hydrogens
}

/// Number of hydrogens implied by the default valence of the atom.
pub fn implicit_hydrogens(molecule: &Molecule, atom: usize) -> u32 {
    let Some(a) = molecule.atom(atom) else {
        return 0;
    };
    let valence = explicit_valence(molecule, atom);
    allowed_valences(&a.symbol, a.formal_charge)
        .iter()
        .map(|&v| v as u32)
        .find(|&v| v >= valence)
        .map_or(0, |v| v - valence)
}

/// Explicit plus implicit hydrogens on an atom.
pub fn total_hydrogens(molecule: &Molecule, atom: usize) -> u32 {
    let explicit = molecule
        .atom(atom)
        .map_or(0, |a| a.explicit_hydrogens as u32);
    explicit + implicit_hydrogens(molecule, atom)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Explicit valence for atom #{atom} {symbol} is {valence}, greater than permitted")]
pub struct ValenceError {
    pub atom: usize,
    pub symbol: String,
    pub valence: u32,
}

/// Checks every atom against the largest valence allowed for its charge state.
///
/// # Errors
///
/// Returns the first atom, in index order, whose explicit valence exceeds
/// what its element and charge permit.
pub fn sanitize(molecule: &Molecule) -> Result<(), ValenceError> {
    for (idx, atom) in molecule.atoms().iter().enumerate() {
        let Some(&max) = allowed_valences(&atom.symbol, atom.formal_charge).last() else {
            continue;
        };
        let valence = explicit_valence(molecule, idx);
        if valence > max as u32 {
            return Err(ValenceError {
                atom: idx,
                symbol: atom.symbol.clone(),
                valence,
            });
        }
    }
    Ok(())
}
