use super::pka::PkaEntry;
use crate::core::chem::conjugate::{ConjugateEngine, ConjugateError};
use crate::core::io::sdf::SdfFile;
use crate::core::models::molecule::Molecule;
use std::fmt;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Acidic,
    Basic,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Acidic => write!(f, "acid"),
            Side::Basic => write!(f, "base"),
        }
    }
}

/// The `pka_number` tag of an emitted conjugate, e.g. `acid_1` or `base_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtonationLabel {
    pub side: Side,
    /// 1-based position in the order the side's entries are visited.
    pub number: usize,
}

impl fmt::Display for ProtonationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.side, self.number)
    }
}

/// Shortest round-trip text of a float, always with a fractional part or an
/// exponent, and with at least two signed exponent digits (`4.0`, `1e-05`,
/// `1e+16`).
pub fn format_float(value: f64) -> String {
    let text = format!("{:?}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

/// Writes the five output tags of an entry onto a structure.
///
/// The pKa is written with [`format_float`]. The atom index is 0-based.
pub fn tag(molecule: &mut Molecule, entry: &PkaEntry, label: ProtonationLabel) {
    let pka = format_float(entry.pka);
    let props = molecule.properties_mut();
    props.set("ID", entry.identifier.as_str());
    props.set("pKa", pka.as_str());
    props.set("marvin_pKa", pka);
    props.set("marvin_atom", entry.atom_index.to_string());
    props.set("pka_number", label.to_string());
}

/// Conjugates emitted for one side of one molecule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainOutcome {
    pub conjugates: Vec<Molecule>,
    /// Entries that produced no output: the failing one and every entry after it.
    pub suppressed: usize,
    /// Derivations attempted and failed; at most one per side.
    pub failures: usize,
}

/// Shared inputs of the two chain builders.
pub struct ChainContext<'a, E: ConjugateEngine + ?Sized> {
    pub engine: &'a E,
    /// The classified input molecule; never modified.
    pub origin: &'a Molecule,
    pub ph: f64,
    /// 0-based index of the input record, for diagnostics.
    pub record: usize,
}

impl<E: ConjugateEngine + ?Sized> ChainContext<'_, E> {
    fn report_failure(
        &self,
        side: Side,
        entry: &PkaEntry,
        entries: &[PkaEntry],
        error: &ConjugateError,
    ) {
        let molblock = SdfFile::to_molblock(self.origin)
            .unwrap_or_else(|e| format!("<molblock unavailable: {}>", e));
        warn!(
            record = self.record,
            %side,
            %entry,
            entries = ?entries,
            %error,
            "Failed to derive conjugate; skipping the remaining {} entries of this molecule.\n{}",
            side,
            molblock
        );
    }
}

/// Builds the acidic protonation chain.
///
/// Entries are visited in reverse collection order. Each conjugate is derived
/// from the previously emitted one (the origin for the first) and tagged
/// after derivation. The first failure suppresses every later entry.
pub fn build_acidic_chain<E: ConjugateEngine + ?Sized>(
    ctx: &ChainContext<'_, E>,
    entries: &[PkaEntry],
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();

    for (idx, entry) in entries.iter().rev().enumerate() {
        if outcome.suppressed > 0 {
            outcome.suppressed += 1;
            continue;
        }

        let precursor = outcome.conjugates.last().unwrap_or(ctx.origin);
        match ctx
            .engine
            .derive_conjugate(precursor, entry.atom_index, entry.pka, ctx.ph)
        {
            Ok(mut conjugate) => {
                let label = ProtonationLabel {
                    side: Side::Acidic,
                    number: idx + 1,
                };
                tag(&mut conjugate, entry, label);
                trace!(record = ctx.record, %label, %entry, "Derived conjugate.");
                outcome.conjugates.push(conjugate);
            }
            Err(error) => {
                ctx.report_failure(Side::Acidic, entry, entries, &error);
                outcome.suppressed += 1;
                outcome.failures += 1;
            }
        }
    }
    outcome
}

/// Builds the basic protonation chain.
///
/// Entries are visited in collection order. The current tail is tagged with
/// the entry *before* the next conjugate is derived from it, so every emitted
/// structure is the protonated precursor of its reaction. The final tail,
/// one step beyond all tagged entries, is never emitted. The first failure
/// suppresses every later entry.
pub fn build_basic_chain<E: ConjugateEngine + ?Sized>(
    ctx: &ChainContext<'_, E>,
    entries: &[PkaEntry],
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();
    let mut tail = ctx.origin.clone();

    for (idx, entry) in entries.iter().enumerate() {
        if outcome.suppressed > 0 {
            outcome.suppressed += 1;
            continue;
        }

        let label = ProtonationLabel {
            side: Side::Basic,
            number: idx + 1,
        };
        tag(&mut tail, entry, label);

        match ctx
            .engine
            .derive_conjugate(&tail, entry.atom_index, entry.pka, ctx.ph)
        {
            Ok(next) => {
                trace!(record = ctx.record, %label, %entry, "Derived conjugate.");
                outcome.conjugates.push(std::mem::replace(&mut tail, next));
            }
            Err(error) => {
                ctx.report_failure(Side::Basic, entry, entries, &error);
                outcome.suppressed += 1;
                outcome.failures += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use std::cell::RefCell;

    const PH: f64 = 7.4;

    /// Appends the atom index to the molecule name and fails on listed atoms.
    struct ScriptedEngine {
        fail_on: Vec<usize>,
        calls: RefCell<Vec<(String, usize)>>,
    }

    impl ScriptedEngine {
        fn new(fail_on: &[usize]) -> Self {
            Self {
                fail_on: fail_on.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ConjugateEngine for ScriptedEngine {
        fn derive_conjugate(
            &self,
            molecule: &Molecule,
            atom_index: usize,
            pka: f64,
            ph: f64,
        ) -> Result<Molecule, ConjugateError> {
            self.calls
                .borrow_mut()
                .push((molecule.name.clone(), atom_index));
            if self.fail_on.contains(&atom_index) {
                return Err(ConjugateError::NoApplicableTransfer {
                    atom: atom_index,
                    pka,
                    ph,
                    charge: 0,
                    hydrogens: 0,
                });
            }
            let mut next = molecule.clone();
            next.name = format!("{}>{}", molecule.name, atom_index);
            Ok(next)
        }
    }

    fn origin() -> Molecule {
        let mut mol = Molecule::new("m");
        mol.add_atom(Atom::new("C", Point3::origin()));
        mol
    }

    fn entry(pka: f64, atom_index: usize) -> PkaEntry {
        PkaEntry {
            pka,
            atom_index,
            identifier: "CHEMBL1".to_string(),
        }
    }

    fn prop<'m>(mol: &'m Molecule, key: &str) -> &'m str {
        mol.properties().get(key).unwrap()
    }

    fn names(outcome: &ChainOutcome) -> Vec<&str> {
        outcome.conjugates.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn labels_render_side_and_number() {
        let label = ProtonationLabel {
            side: Side::Acidic,
            number: 2,
        };
        assert_eq!(label.to_string(), "acid_2");
        let label = ProtonationLabel {
            side: Side::Basic,
            number: 1,
        };
        assert_eq!(label.to_string(), "base_1");
    }

    #[test]
    fn floats_use_python_style_text() {
        assert_eq!(format_float(4.0), "4.0");
        assert_eq!(format_float(-1.25), "-1.25");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(2.5e123), "2.5e+123");
    }

    #[test]
    fn tag_writes_five_properties_in_order() {
        let mut mol = origin();
        tag(
            &mut mol,
            &entry(9.35, 4),
            ProtonationLabel {
                side: Side::Basic,
                number: 3,
            },
        );
        let items: Vec<(&str, &str)> = mol.properties().iter().collect();
        assert_eq!(
            items,
            vec![
                ("ID", "CHEMBL1"),
                ("pKa", "9.35"),
                ("marvin_pKa", "9.35"),
                ("marvin_atom", "4"),
                ("pka_number", "base_3"),
            ]
        );
    }

    #[test]
    fn tag_formats_whole_pka_with_fraction() {
        let mut mol = origin();
        tag(
            &mut mol,
            &entry(4.0, 0),
            ProtonationLabel {
                side: Side::Acidic,
                number: 1,
            },
        );
        assert_eq!(prop(&mol, "pKa"), "4.0");
    }

    #[test]
    fn acidic_chain_visits_entries_in_reverse_and_stacks_derivations() {
        let engine = ScriptedEngine::new(&[]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 0,
        };
        let entries = [entry(6.0, 1), entry(3.0, 2)];

        let outcome = build_acidic_chain(&ctx, &entries);

        assert_eq!(names(&outcome), vec!["m>2", "m>2>1"]);
        assert_eq!(prop(&outcome.conjugates[0], "pka_number"), "acid_1");
        assert_eq!(prop(&outcome.conjugates[0], "pKa"), "3.0");
        assert_eq!(prop(&outcome.conjugates[1], "pka_number"), "acid_2");
        assert_eq!(prop(&outcome.conjugates[1], "marvin_atom"), "1");
        assert_eq!((outcome.suppressed, outcome.failures), (0, 0));
        assert!(!mol.has_properties());
    }

    #[test]
    fn acidic_failure_suppresses_remaining_entries() {
        let engine = ScriptedEngine::new(&[2]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 5,
        };
        // Visited as atoms 4, 2, 1: the second derivation fails.
        let entries = [entry(2.0, 1), entry(4.0, 2), entry(6.0, 4)];

        let outcome = build_acidic_chain(&ctx, &entries);

        assert_eq!(names(&outcome), vec!["m>4"]);
        assert_eq!(outcome.suppressed, 2);
        assert_eq!(outcome.failures, 1);
        assert_eq!(
            *engine.calls.borrow(),
            vec![("m".to_string(), 4), ("m>4".to_string(), 2)]
        );
    }

    #[test]
    fn basic_chain_tags_the_precursor_and_drops_the_final_tail() {
        let engine = ScriptedEngine::new(&[]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 0,
        };
        let entries = [entry(9.0, 3), entry(11.0, 7)];

        let outcome = build_basic_chain(&ctx, &entries);

        assert_eq!(names(&outcome), vec!["m", "m>3"]);
        assert_eq!(prop(&outcome.conjugates[0], "pka_number"), "base_1");
        assert_eq!(prop(&outcome.conjugates[0], "pKa"), "9.0");
        assert_eq!(prop(&outcome.conjugates[1], "pka_number"), "base_2");
        assert_eq!(prop(&outcome.conjugates[1], "marvin_atom"), "7");
        assert!(!mol.has_properties());
    }

    #[test]
    fn basic_failure_keeps_earlier_precursors_only() {
        let engine = ScriptedEngine::new(&[7]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 0,
        };
        let entries = [entry(8.0, 3), entry(9.0, 7), entry(10.0, 9)];

        let outcome = build_basic_chain(&ctx, &entries);

        assert_eq!(names(&outcome), vec!["m"]);
        assert_eq!(prop(&outcome.conjugates[0], "pka_number"), "base_1");
        assert_eq!(outcome.suppressed, 2);
        assert_eq!(outcome.failures, 1);
        assert_eq!(engine.calls.borrow().len(), 2);
    }

    #[test]
    fn first_basic_failure_emits_nothing() {
        let engine = ScriptedEngine::new(&[3]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 0,
        };

        let outcome = build_basic_chain(&ctx, &[entry(9.0, 3)]);

        assert!(outcome.conjugates.is_empty());
        assert_eq!((outcome.suppressed, outcome.failures), (1, 1));
    }

    #[test]
    fn empty_entry_lists_produce_nothing() {
        let engine = ScriptedEngine::new(&[]);
        let mol = origin();
        let ctx = ChainContext {
            engine: &engine,
            origin: &mol,
            ph: PH,
            record: 0,
        };
        assert_eq!(build_acidic_chain(&ctx, &[]), ChainOutcome::default());
        assert_eq!(build_basic_chain(&ctx, &[]), ChainOutcome::default());
        assert!(engine.calls.borrow().is_empty());
    }
}
