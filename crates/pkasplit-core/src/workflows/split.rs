use crate::core::chem::conjugate::{ConjugateEngine, ProtonTransfer};
use crate::core::chem::layout::{CoordinateLayout, PlanarProjection};
use crate::core::io::compression;
use crate::core::io::sdf::{SdfFile, SdfReadOptions, SdfSupplier};
use crate::core::io::traits::MolecularFile;
use crate::core::models::molecule::Molecule;
use crate::engine::chain::{self, ChainContext};
use crate::engine::config::SplitConfig;
use crate::engine::error::EngineError;
use crate::engine::pka::{self, MetadataError};
use crate::engine::progress::{Progress, ProgressReporter};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Totals of a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Records yielded by the reader, including unreadable ones.
    pub records_read: usize,
    /// Molecules without usable pKa metadata plus failed derivations.
    pub skipped: usize,
    /// pKa entries that produced no output because their side failed.
    pub suppressed_entries: usize,
    pub conjugates_written: usize,
}

/// Result of splitting a single molecule.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// Conjugates to write: the acidic chain followed by the basic chain.
    Emitted {
        conjugates: Vec<Molecule>,
        suppressed: usize,
        failures: usize,
    },
    /// The molecule lacked usable pKa metadata and produced nothing.
    Skipped(MetadataError),
}

/// Splits molecules into their protonation chains.
///
/// The conjugate engine and layout are pluggable; [`Splitter::new`] uses
/// [`ProtonTransfer`] and [`PlanarProjection`].
pub struct Splitter<C = ProtonTransfer, L = PlanarProjection> {
    config: SplitConfig,
    engine: C,
    layout: L,
}

impl Splitter {
    pub fn new(config: SplitConfig) -> Self {
        let engine = ProtonTransfer::new(config.known_pka_range);
        Self::with_engines(config, engine, PlanarProjection)
    }
}

impl<C: ConjugateEngine, L: CoordinateLayout> Splitter<C, L> {
    pub fn with_engines(config: SplitConfig, engine: C, layout: L) -> Self {
        Self {
            config,
            engine,
            layout,
        }
    }

    /// Lays out, classifies and splits one molecule.
    ///
    /// The molecule's data items are cleared once its pKa entries have been
    /// read; emitted structures carry only the tags written by the chain
    /// builders.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Consistency`] if the entry partition or the
    /// number of emitted conjugates contradicts the entry counts.
    pub fn split_molecule(
        &self,
        mut molecule: Molecule,
        record: usize,
    ) -> Result<SplitOutcome, EngineError> {
        if self.config.compute_2d_coords {
            self.layout.compute_2d(&mut molecule);
        }

        let entries = match pka::extract_entries(&molecule) {
            Ok(entries) => entries,
            Err(err) => return Ok(SplitOutcome::Skipped(err)),
        };

        let groups = pka::partition(&entries, self.config.ph);
        if groups.len() != entries.len() {
            return Err(EngineError::Consistency {
                record,
                message: format!(
                    "{} acidic and {} basic entries do not add up to {} entries",
                    groups.acidic.len(),
                    groups.basic.len(),
                    entries.len()
                ),
            });
        }

        molecule.properties_mut().clear();

        let ctx = ChainContext {
            engine: &self.engine,
            origin: &molecule,
            ph: self.config.ph,
            record,
        };
        let acids = chain::build_acidic_chain(&ctx, &groups.acidic);
        let bases = chain::build_basic_chain(&ctx, &groups.basic);

        let expected =
            groups.acidic.len() - acids.suppressed + groups.basic.len() - bases.suppressed;
        let mut conjugates = acids.conjugates;
        conjugates.extend(bases.conjugates);
        if conjugates.len() != expected {
            return Err(EngineError::Consistency {
                record,
                message: format!(
                    "emitted {} conjugates, expected {}",
                    conjugates.len(),
                    expected
                ),
            });
        }

        debug!(
            record,
            acidic = groups.acidic.len(),
            basic = groups.basic.len(),
            emitted = conjugates.len(),
            "Split molecule."
        );
        Ok(SplitOutcome::Emitted {
            conjugates,
            suppressed: acids.suppressed + bases.suppressed,
            failures: acids.failures + bases.failures,
        })
    }

    /// Splits every record of an SD stream and writes the conjugates.
    ///
    /// Unreadable records and records without pKa metadata are logged and
    /// skipped. The writer is not flushed or finished.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails, or if a consistency
    /// check fails.
    pub fn split_stream<R: BufRead, W: Write>(
        &self,
        reader: R,
        writer: &mut W,
        reporter: &ProgressReporter,
    ) -> Result<SplitSummary, EngineError> {
        let options = SdfReadOptions {
            remove_hydrogens: self.config.remove_hydrogens,
            ..Default::default()
        };
        let mut supplier = SdfSupplier::with_options(reader, options);
        let mut summary = SplitSummary::default();

        while let Some(item) = supplier.next() {
            let record = supplier.records_read().saturating_sub(1);
            let molecule = match item {
                Ok(molecule) => molecule,
                Err(e) if e.is_recoverable() => {
                    warn!(record, error = %e, "Skipping unreadable record.");
                    reporter.report(Progress::RecordDone { emitted: 0 });
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let emitted = match self.split_molecule(molecule, record)? {
                SplitOutcome::Skipped(err) => {
                    warn!(record, error = %err, "Skipping molecule without pKa metadata.");
                    summary.skipped += 1;
                    0
                }
                SplitOutcome::Emitted {
                    conjugates,
                    suppressed,
                    failures,
                } => {
                    for conjugate in &conjugates {
                        SdfFile::write_record(conjugate, writer)?;
                    }
                    summary.skipped += failures;
                    summary.suppressed_entries += suppressed;
                    summary.conjugates_written += conjugates.len();
                    conjugates.len()
                }
            };
            reporter.report(Progress::RecordDone { emitted });
        }

        summary.records_read = supplier.records_read();
        Ok(summary)
    }
}

/// Splits an SD file into a gzip-compressed SD file of conjugates.
///
/// The input may be plain or gzip-compressed; compression is detected from
/// the file content.
///
/// # Errors
///
/// Returns an error if either file cannot be opened, if reading or writing
/// fails, or if a consistency check fails.
#[instrument(skip_all, name = "split_workflow", fields(input = %input.display(), output = %output.display()))]
pub fn run(
    input: &Path,
    output: &Path,
    config: &SplitConfig,
    reporter: &ProgressReporter,
) -> Result<SplitSummary, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Splitting" });
    info!(ph = config.ph, "Starting protonation state splitting.");

    let reader = compression::open_input(input)?;
    let mut writer = compression::create_output(output)?;

    let splitter = Splitter::new(config.clone());
    let summary = splitter.split_stream(reader, &mut writer, reporter)?;
    writer.finish()?.flush()?;

    reporter.report(Progress::PhaseFinish);
    reporter.report(Progress::Message(format!(
        "Wrote {} conjugates from {} records.",
        summary.conjugates_written, summary.records_read
    )));
    info!(
        records = summary.records_read,
        skipped = summary.skipped,
        written = summary.conjugates_written,
        "Splitting complete."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::conjugate::ConjugateError;
    use crate::core::models::atom::Atom;
    use flate2::read::MultiGzDecoder;
    use nalgebra::Point3;
    use std::fs::File;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;

    /// Renames the molecule after the site it was derived at; fails on listed atoms.
    struct RenamingEngine {
        fail_on: Vec<usize>,
    }

    impl ConjugateEngine for RenamingEngine {
        fn derive_conjugate(
            &self,
            molecule: &Molecule,
            atom_index: usize,
            _pka: f64,
            _ph: f64,
        ) -> Result<Molecule, ConjugateError> {
            if self.fail_on.contains(&atom_index) {
                return Err(ConjugateError::AtomIndexOutOfRange {
                    index: atom_index,
                    atom_count: molecule.atom_count(),
                });
            }
            let mut next = molecule.clone();
            next.name = format!("{}>{}", molecule.name, atom_index);
            Ok(next)
        }
    }

    struct NoLayout;

    impl CoordinateLayout for NoLayout {
        fn compute_2d(&self, _molecule: &mut Molecule) {}
    }

    fn scripted(fail_on: &[usize]) -> Splitter<RenamingEngine, NoLayout> {
        Splitter::with_engines(
            SplitConfig::default(),
            RenamingEngine {
                fail_on: fail_on.to_vec(),
            },
            NoLayout,
        )
    }

    fn annotated(items: &[(&str, &str)]) -> Molecule {
        let mut mol = Molecule::new("m");
        for _ in 0..8 {
            mol.add_atom(Atom::new("C", Point3::origin()));
        }
        for (k, v) in items {
            mol.properties_mut().set(*k, *v);
        }
        mol
    }

    fn three_site_molecule() -> Molecule {
        annotated(&[
            ("chembl_id", "CHEMBL1"),
            ("r_epik_pKa_1", "9.0"),
            ("i_epik_pKa_atom_1", "4"),
            ("r_epik_pKa_2", "4.0"),
            ("i_epik_pKa_atom_2", "6"),
            ("r_epik_pKa_3", "11.0"),
            ("i_epik_pKa_atom_3", "8"),
        ])
    }

    fn tags(mol: &Molecule) -> (String, String, String) {
        let get = |k: &str| mol.properties().get(k).unwrap_or_default().to_string();
        (get("pka_number"), get("pKa"), get("marvin_atom"))
    }

    #[test]
    fn mixed_entries_emit_acids_then_bases() {
        let outcome = scripted(&[])
            .split_molecule(three_site_molecule(), 0)
            .unwrap();
        let SplitOutcome::Emitted {
            conjugates,
            suppressed,
            failures,
        } = outcome
        else {
            panic!("expected conjugates");
        };

        let got: Vec<_> = conjugates.iter().map(tags).collect();
        assert_eq!(
            got,
            vec![
                ("acid_1".into(), "4.0".into(), "5".into()),
                ("base_1".into(), "9.0".into(), "3".into()),
                ("base_2".into(), "11.0".into(), "7".into()),
            ]
        );
        assert_eq!(conjugates[0].name, "m>5");
        assert_eq!(conjugates[1].name, "m");
        assert_eq!(conjugates[2].name, "m>3");
        assert_eq!((suppressed, failures), (0, 0));
    }

    #[test]
    fn original_data_items_are_not_carried_over() {
        let mut mol = three_site_molecule();
        mol.properties_mut().set("mw", "123.4");
        let SplitOutcome::Emitted { conjugates, .. } =
            scripted(&[]).split_molecule(mol, 0).unwrap()
        else {
            panic!("expected conjugates");
        };
        for conjugate in &conjugates {
            let keys: Vec<&str> = conjugate.properties().keys().collect();
            assert_eq!(keys, vec!["ID", "pKa", "marvin_pKa", "marvin_atom", "pka_number"]);
        }
    }

    #[test]
    fn molecule_without_metadata_is_skipped() {
        let mut mol = Molecule::new("bare");
        mol.add_atom(Atom::new("C", Point3::origin()));
        let outcome = scripted(&[]).split_molecule(mol, 3).unwrap();
        assert_eq!(outcome, SplitOutcome::Skipped(MetadataError::NoDataBlock));
    }

    #[test]
    fn molecule_without_pka_entries_emits_nothing() {
        let outcome = scripted(&[])
            .split_molecule(annotated(&[("chembl_id", "CHEMBL9")]), 0)
            .unwrap();
        assert_eq!(
            outcome,
            SplitOutcome::Emitted {
                conjugates: vec![],
                suppressed: 0,
                failures: 0
            }
        );
    }

    #[test]
    fn failure_on_one_side_leaves_the_other_intact() {
        let outcome = scripted(&[5])
            .split_molecule(three_site_molecule(), 0)
            .unwrap();
        let SplitOutcome::Emitted {
            conjugates,
            suppressed,
            failures,
        } = outcome
        else {
            panic!("expected conjugates");
        };
        let labels: Vec<_> = conjugates.iter().map(|m| tags(m).0).collect();
        assert_eq!(labels, vec!["base_1", "base_2"]);
        assert_eq!((suppressed, failures), (1, 1));
    }

    #[test]
    fn ph_threshold_moves_entries_between_sides() {
        let config = SplitConfig {
            ph: 10.0,
            ..Default::default()
        };
        let splitter = Splitter::with_engines(config, RenamingEngine { fail_on: vec![] }, NoLayout);
        let SplitOutcome::Emitted { conjugates, .. } =
            splitter.split_molecule(three_site_molecule(), 0).unwrap()
        else {
            panic!("expected conjugates");
        };
        let labels: Vec<_> = conjugates.iter().map(|m| tags(m).0).collect();
        assert_eq!(labels, vec!["acid_1", "acid_2", "base_1"]);
        assert_eq!(tags(&conjugates[0]).1, "4.0");
    }

    const RECORDS: &str = "\
acetate
  test

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.3000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000    1.2000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000   -1.2000    0.0000 O   0  5  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  2  0
  2  4  1  0
M  END
>  <chembl_id>
CHEMBL539

>  <r_epik_pKa_1>
4.76

>  <i_epik_pKa_atom_1>
4

$$$$
unreadable
  test

  x  0  0  0  0  0  0  0  0  0999 V2000
M  END
$$$$
no metadata
  test

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
M  END
$$$$
methylammonium
  test

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4700    0.0000    0.0000 N   0  3  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  END
>  <chembl_id>
CHEMBL43

>  <r_epik_pKa_1>
10.6

>  <i_epik_pKa_atom_1>
2

$$$$
";

    #[test]
    fn stream_counts_reads_skips_and_writes() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| {
            events.lock().unwrap().push(e);
        }));

        let mut out = Vec::new();
        let summary = Splitter::new(SplitConfig::default())
            .split_stream(Cursor::new(RECORDS), &mut out, &reporter)
            .unwrap();
        drop(reporter);

        assert_eq!(
            summary,
            SplitSummary {
                records_read: 4,
                skipped: 1,
                suppressed_entries: 0,
                conjugates_written: 2,
            }
        );

        let done = events
            .into_inner()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, Progress::RecordDone { .. }))
            .count();
        assert_eq!(done, 4);

        let written: Vec<Molecule> = SdfSupplier::new(Cursor::new(out))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(written.len(), 2);

        let acid = &written[0];
        assert_eq!(acid.name, "acetate");
        assert_eq!(acid.properties().get("ID"), Some("CHEMBL539"));
        assert_eq!(acid.properties().get("pka_number"), Some("acid_1"));
        assert_eq!(acid.properties().get("marvin_atom"), Some("3"));
        assert_eq!(acid.atoms()[3].formal_charge, 0);
        assert!(acid.atoms().iter().all(|a| a.position.z == 0.0));

        let base = &written[1];
        assert_eq!(base.name, "methylammonium");
        assert_eq!(base.properties().get("pka_number"), Some("base_1"));
        assert_eq!(base.properties().get("pKa"), Some("10.6"));
        // Basic records are the protonated precursor of their reaction.
        assert_eq!(base.atoms()[1].formal_charge, 1);
    }

    #[test]
    fn derivation_failures_count_as_skipped() {
        let first = RECORDS.split("$$$$\n").next().unwrap();
        let text = format!("{first}$$$$\n").replace(
            ">  <i_epik_pKa_atom_1>\n4\n",
            ">  <i_epik_pKa_atom_1>\n9\n",
        );

        let mut out = Vec::new();
        let summary = Splitter::new(SplitConfig::default())
            .split_stream(Cursor::new(text), &mut out, &ProgressReporter::new())
            .unwrap();

        assert_eq!(
            summary,
            SplitSummary {
                records_read: 1,
                skipped: 1,
                suppressed_entries: 1,
                conjugates_written: 0,
            }
        );
        assert!(out.is_empty());
    }

    #[test]
    fn run_reads_plain_input_and_writes_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("epik.sdf");
        let output = dir.path().join("split.sdf.gz");
        std::fs::write(&input, RECORDS).unwrap();

        let summary = run(&input, &output, &SplitConfig::default(), &ProgressReporter::new()).unwrap();
        assert_eq!(summary.conjugates_written, 2);

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&output).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.matches("$$$$").count(), 2);
        assert!(text.contains(">  <pka_number>\nacid_1\n"));
        assert!(text.contains(">  <pka_number>\nbase_1\n"));
    }

    #[test]
    fn run_fails_on_truncated_gzip_input() {
        let mut encoder = compression::gzip_writer(Vec::new());
        encoder.write_all(RECORDS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("epik.sdf.gz");
        std::fs::write(&input, &compressed[..compressed.len() / 2]).unwrap();

        let err = run(
            &input,
            &dir.path().join("out.sdf.gz"),
            &SplitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Sdf(crate::core::io::sdf::SdfError::Io(_))
        ));
    }

    #[test]
    fn run_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &dir.path().join("absent.sdf"),
            &dir.path().join("out.sdf.gz"),
            &SplitConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
