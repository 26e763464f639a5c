use super::atom::Atom;
use super::properties::PropertyMap;
use super::topology::{Bond, BondOrder};

/// A small molecule read from, or destined for, a single SD record.
///
/// Atoms and bonds are stored positionally so that atom numbers from the pKa
/// predictor map directly onto indices. The title and comment lines of the
/// header block are carried alongside the structure, and the data items
/// of the record live in an insertion-ordered [`PropertyMap`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    /// Title line of the record (the molecule name).
    pub name: String,
    /// Free-text comment line of the header block.
    pub comment: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    properties: PropertyMap,
    /// Whether the source record carried a data block at all.
    has_data_block: bool,
}

impl Molecule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    /// Adds a bond between two existing atoms.
    ///
    /// # Return
    ///
    /// Returns `None` if either index is out of range or the bond would be a
    /// self-loop. Adding a bond that already exists succeeds without creating
    /// a duplicate.
    pub fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondOrder) -> Option<()> {
        self.push_bond(Bond::new(atom1, atom2, order))
    }

    /// Adds a fully specified bond, including its stereo code.
    pub fn push_bond(&mut self, bond: Bond) -> Option<()> {
        if bond.atom1 >= self.atoms.len() || bond.atom2 >= self.atoms.len() {
            return None;
        }
        if bond.atom1 == bond.atom2 {
            return None;
        }
        let exists = self
            .bonds
            .iter()
            .any(|b| b.contains(bond.atom1) && b.contains(bond.atom2));
        if !exists {
            self.bonds.push(bond);
        }
        Some(())
    }

    /// Returns the bonds incident to an atom.
    pub fn bonds_of(&self, atom: usize) -> impl Iterator<Item = &Bond> + '_ {
        self.bonds.iter().filter(move |b| b.contains(atom))
    }

    /// Returns the indices of atoms directly bonded to `atom`.
    pub fn neighbors(&self, atom: usize) -> Vec<usize> {
        self.bonds_of(atom).filter_map(|b| b.partner(atom)).collect()
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    /// Whether the record this molecule came from had any data items.
    ///
    /// Molecules built in memory report `true` as soon as a property is set.
    pub fn has_properties(&self) -> bool {
        self.has_data_block || !self.properties.is_empty()
    }

    pub(crate) fn set_data_block(&mut self, properties: PropertyMap) {
        self.has_data_block = !properties.is_empty();
        self.properties = properties;
    }

    /// Folds terminal hydrogens into the explicit hydrogen count of their
    /// heavy-atom neighbour and removes them from the atom list.
    ///
    /// A hydrogen is only removed if it is neutral, carries no isotope label
    /// and has exactly one neighbour, which is not itself a hydrogen. Bond
    /// indices are renumbered to match the compacted atom list.
    ///
    /// # Return
    ///
    /// The number of hydrogen atoms removed.
    pub fn strip_hydrogens(&mut self) -> usize {
        let removable: Vec<Option<usize>> = (0..self.atoms.len())
            .map(|idx| {
                let atom = &self.atoms[idx];
                if atom.symbol != "H" || atom.formal_charge != 0 || atom.mass_difference != 0 {
                    return None;
                }
                match self.neighbors(idx).as_slice() {
                    [heavy] if !self.atoms[*heavy].is_hydrogen() => Some(*heavy),
                    _ => None,
                }
            })
            .collect();

        let removed = removable.iter().filter(|r| r.is_some()).count();
        if removed == 0 {
            return 0;
        }

        for heavy in removable.iter().flatten() {
            let atom = &mut self.atoms[*heavy];
            atom.explicit_hydrogens = atom.explicit_hydrogens.saturating_add(1);
        }

        let mut new_index = vec![None; self.atoms.len()];
        let mut next = 0;
        for (idx, slot) in new_index.iter_mut().enumerate() {
            if removable[idx].is_none() {
                *slot = Some(next);
                next += 1;
            }
        }

        let old_atoms = std::mem::take(&mut self.atoms);
        self.atoms = old_atoms
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| removable[*idx].is_none())
            .map(|(_, atom)| atom)
            .collect();

        let old_bonds = std::mem::take(&mut self.bonds);
        self.bonds = old_bonds
            .into_iter()
            .filter_map(|bond| {
                let a1 = new_index[bond.atom1]?;
                let a2 = new_index[bond.atom2]?;
                Some(Bond {
                    atom1: a1,
                    atom2: a2,
                    ..bond
                })
            })
            .collect();

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn methanol_with_hydrogens() -> Molecule {
        let mut mol = Molecule::new("methanol");
        let c = mol.add_atom(Atom::new("C", Point3::new(0.0, 0.0, 0.0)));
        let o = mol.add_atom(Atom::new("O", Point3::new(1.4, 0.0, 0.0)));
        mol.add_bond(c, o, BondOrder::Single).unwrap();
        for i in 0..3 {
            let h = mol.add_atom(Atom::new("H", Point3::new(-0.5, i as f64, 0.0)));
            mol.add_bond(c, h, BondOrder::Single).unwrap();
        }
        let ho = mol.add_atom(Atom::new("H", Point3::new(1.9, 0.8, 0.0)));
        mol.add_bond(o, ho, BondOrder::Single).unwrap();
        mol
    }

    #[test]
    fn add_bond_rejects_out_of_range_and_self_bonds() {
        let mut mol = Molecule::new("x");
        let a = mol.add_atom(Atom::new("C", Point3::origin()));
        assert!(mol.add_bond(a, 5, BondOrder::Single).is_none());
        assert!(mol.add_bond(a, a, BondOrder::Single).is_none());
        assert!(mol.bonds().is_empty());
    }

    #[test]
    fn add_bond_is_idempotent() {
        let mut mol = Molecule::new("x");
        let a = mol.add_atom(Atom::new("C", Point3::origin()));
        let b = mol.add_atom(Atom::new("C", Point3::origin()));
        mol.add_bond(a, b, BondOrder::Single).unwrap();
        mol.add_bond(b, a, BondOrder::Double).unwrap();
        assert_eq!(mol.bonds().len(), 1);
        assert_eq!(mol.bonds()[0].order, BondOrder::Single);
    }

    #[test]
    fn neighbors_lists_bonded_atoms() {
        let mol = methanol_with_hydrogens();
        let mut n = mol.neighbors(0);
        n.sort_unstable();
        assert_eq!(n, vec![1, 2, 3, 4]);
        assert_eq!(mol.neighbors(1), vec![0, 5]);
    }

    #[test]
    fn strip_hydrogens_folds_counts_into_heavy_atoms() {
        let mut mol = methanol_with_hydrogens();
        let removed = mol.strip_hydrogens();

        assert_eq!(removed, 4);
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.atoms()[0].explicit_hydrogens, 3);
        assert_eq!(mol.atoms()[1].explicit_hydrogens, 1);
        assert_eq!(mol.bonds().len(), 1);
        assert_eq!((mol.bonds()[0].atom1, mol.bonds()[0].atom2), (0, 1));
    }

    #[test]
    fn strip_hydrogens_renumbers_bonds_after_interleaved_hydrogens() {
        let mut mol = Molecule::new("interleaved");
        let c = mol.add_atom(Atom::new("C", Point3::origin()));
        let h = mol.add_atom(Atom::new("H", Point3::origin()));
        let n = mol.add_atom(Atom::new("N", Point3::origin()));
        mol.add_bond(c, h, BondOrder::Single).unwrap();
        mol.add_bond(c, n, BondOrder::Single).unwrap();

        mol.strip_hydrogens();

        assert_eq!(mol.atoms()[1].symbol, "N");
        assert_eq!(mol.bonds()[0].partner(0), Some(1));
    }

    #[test]
    fn strip_hydrogens_keeps_molecular_hydrogen_and_charged_protons() {
        let mut mol = Molecule::new("h2");
        let h1 = mol.add_atom(Atom::new("H", Point3::origin()));
        let h2 = mol.add_atom(Atom::new("H", Point3::origin()));
        mol.add_bond(h1, h2, BondOrder::Single).unwrap();
        mol.add_atom(Atom::new("H", Point3::origin()).with_charge(1));

        assert_eq!(mol.strip_hydrogens(), 0);
        assert_eq!(mol.atom_count(), 3);
    }

    #[test]
    fn has_properties_reflects_data_block() {
        let mut mol = Molecule::new("x");
        assert!(!mol.has_properties());

        let mut props = PropertyMap::new();
        props.set("chembl_id", "CHEMBL1");
        mol.set_data_block(props);
        assert!(mol.has_properties());

        mol.properties_mut().clear();
        assert!(mol.has_properties());
    }
}
