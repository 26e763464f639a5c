use crate::core::chem::valence::{self, ValenceError};
use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::molecule::Molecule;
use crate::core::models::properties::PropertyMap;
use crate::core::models::topology::{Bond, BondOrder};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::trace;

const RECORD_TERMINATOR: &str = "$$$$";
const END_LINE: &str = "M  END";
const V2000_LIMIT: usize = 999;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line} of the record: {kind}")]
    Parse { line: usize, kind: SdfParseErrorKind },
    #[error("Molecule with {atoms} atoms and {bonds} bonds exceeds the V2000 limit of 999")]
    TooLarge { atoms: usize, bonds: usize },
}

impl SdfError {
    /// Whether reading can continue with the next record after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SdfError::Parse { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SdfParseErrorKind {
    #[error("Record ends before the counts line")]
    MissingCountsLine,
    #[error("Invalid counts line (value: '{0}')")]
    InvalidCountsLine(String),
    #[error("V3000 connection tables are not supported")]
    UnsupportedV3000,
    #[error("Expected {expected} {block} lines, found {found}")]
    TruncatedBlock {
        block: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid {field} in columns {columns} (value: '{value}')")]
    InvalidField {
        field: &'static str,
        columns: &'static str,
        value: String,
    },
    #[error("Bond references atom {atom}, but the record has {atom_count} atoms")]
    BondAtomOutOfRange { atom: usize, atom_count: usize },
    #[error("Bond connects atom {0} to itself")]
    SelfBond(usize),
    #[error("Malformed property line '{0}'")]
    InvalidPropertyLine(String),
    #[error("Missing 'M  END' line")]
    MissingEnd,
    #[error("Sanitization failed: {0}")]
    Sanitization(#[from] ValenceError),
}

/// Options controlling how records are turned into molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdfReadOptions {
    /// Reject records whose atoms exceed their permitted valence.
    pub sanitize: bool,
    /// Fold terminal hydrogen atoms into hydrogen counts on their neighbours.
    pub remove_hydrogens: bool,
}

impl Default for SdfReadOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            remove_hydrogens: true,
        }
    }
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("").trim()
}

fn parse_error(line_idx: usize, kind: SdfParseErrorKind) -> SdfError {
    SdfError::Parse {
        line: line_idx + 1,
        kind,
    }
}

/// Maps the V2000 atom block charge code onto a formal charge.
fn charge_from_code(code: i32) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

/// Collects the lines of one record, stopping after its `$$$$` terminator.
///
/// Data item values are allowed to start with `$$$$`; a terminator is only
/// recognized outside of a data item. Returns `None` once the stream holds
/// nothing but whitespace.
fn read_raw_record(reader: &mut impl BufRead) -> io::Result<Option<Vec<String>>> {
    let mut lines = Vec::new();
    let mut past_end = false;
    let mut in_item = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end_matches(['\n', '\r']);

        if !in_item && line.starts_with(RECORD_TERMINATOR) {
            if lines.is_empty() {
                continue;
            }
            return Ok(Some(lines));
        }

        if past_end {
            if in_item {
                in_item = !line.trim().is_empty();
            } else {
                in_item = line.starts_with('>');
            }
        } else if line.starts_with(END_LINE) {
            past_end = true;
        }
        lines.push(line.to_string());
    }

    if lines.iter().all(|l| l.trim().is_empty()) {
        Ok(None)
    } else {
        Ok(Some(lines))
    }
}

fn parse_atom_line(line: &str, idx: usize) -> Result<Atom, SdfError> {
    let coord = |start: usize, end: usize, columns: &'static str| {
        let value = slice_and_trim(line, start, end);
        value.parse::<f64>().map_err(|_| {
            parse_error(
                idx,
                SdfParseErrorKind::InvalidField {
                    field: "coordinate",
                    columns,
                    value: value.to_string(),
                },
            )
        })
    };
    let x = coord(0, 10, "1-10")?;
    let y = coord(10, 20, "11-20")?;
    let z = coord(20, 30, "21-30")?;

    let symbol = slice_and_trim(line, 31, 34);
    if symbol.is_empty() {
        return Err(parse_error(
            idx,
            SdfParseErrorKind::InvalidField {
                field: "element symbol",
                columns: "32-34",
                value: String::new(),
            },
        ));
    }

    let int_field = |start: usize, end: usize, field: &'static str, columns: &'static str| {
        let value = slice_and_trim(line, start, end);
        if value.is_empty() {
            return Ok(0);
        }
        value.parse::<i32>().map_err(|_| {
            parse_error(
                idx,
                SdfParseErrorKind::InvalidField {
                    field,
                    columns,
                    value: value.to_string(),
                },
            )
        })
    };
    let mass_difference = int_field(34, 36, "mass difference", "35-36")?;
    let charge_code = int_field(36, 39, "charge code", "37-39")?;

    let mut atom = Atom::new(symbol, Point3::new(x, y, z));
    atom.mass_difference = mass_difference.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
    atom.formal_charge = charge_from_code(charge_code);
    Ok(atom)
}

fn parse_bond_line(line: &str, idx: usize, atom_count: usize) -> Result<Bond, SdfError> {
    let index_field = |start: usize, end: usize, columns: &'static str| {
        let value = slice_and_trim(line, start, end);
        let number = value.parse::<usize>().map_err(|_| {
            parse_error(
                idx,
                SdfParseErrorKind::InvalidField {
                    field: "atom number",
                    columns,
                    value: value.to_string(),
                },
            )
        })?;
        if number == 0 || number > atom_count {
            return Err(parse_error(
                idx,
                SdfParseErrorKind::BondAtomOutOfRange {
                    atom: number,
                    atom_count,
                },
            ));
        }
        Ok(number - 1)
    };
    let atom1 = index_field(0, 3, "1-3")?;
    let atom2 = index_field(3, 6, "4-6")?;
    if atom1 == atom2 {
        return Err(parse_error(idx, SdfParseErrorKind::SelfBond(atom1 + 1)));
    }

    let type_str = slice_and_trim(line, 6, 9);
    let order: BondOrder = type_str.parse().map_err(|_| {
        parse_error(
            idx,
            SdfParseErrorKind::InvalidField {
                field: "bond type",
                columns: "7-9",
                value: type_str.to_string(),
            },
        )
    })?;
    let stereo = slice_and_trim(line, 9, 12).parse::<u8>().unwrap_or(0);

    let mut bond = Bond::new(atom1, atom2, order);
    bond.stereo = stereo;
    Ok(bond)
}

/// V2000 limit on the number of entries in one `M  CHG` line.
const MAX_CHARGES_PER_LINE: usize = 8;
/// V2000 limit on the magnitude of a charge in an `M  CHG` line.
const MAX_FORMAL_CHARGE: u8 = 15;

/// Applies an `M  CHG` property line to the atom list.
fn apply_charge_line(line: &str, idx: usize, atoms: &mut [Atom]) -> Result<(), SdfError> {
    let malformed = || parse_error(idx, SdfParseErrorKind::InvalidPropertyLine(line.to_string()));
    let tokens: Vec<&str> = line[6..].split_whitespace().collect();
    let (count, pairs) = tokens.split_first().ok_or_else(malformed)?;
    let count: usize = count
        .parse()
        .ok()
        .filter(|n| (1..=MAX_CHARGES_PER_LINE).contains(n))
        .ok_or_else(malformed)?;
    let needed = count.checked_mul(2).ok_or_else(malformed)?;
    if pairs.len() < needed {
        return Err(malformed());
    }
    for pair in pairs[..needed].chunks_exact(2) {
        let number: usize = pair[0].parse().map_err(|_| malformed())?;
        let charge: i8 = pair[1]
            .parse()
            .ok()
            .filter(|q: &i8| q.unsigned_abs() <= MAX_FORMAL_CHARGE)
            .ok_or_else(malformed)?;
        let atom = number
            .checked_sub(1)
            .and_then(|i| atoms.get_mut(i))
            .ok_or_else(malformed)?;
        atom.formal_charge = charge;
    }
    Ok(())
}

/// Extracts the field name from a data header such as `>  <r_epik_pKa_1>  (1)`.
fn data_item_name(header: &str) -> Option<&str> {
    let start = header.find('<')? + 1;
    let end = header[start..].find('>')? + start;
    Some(&header[start..end])
}

fn parse_data_block(lines: &[String]) -> PropertyMap {
    let mut properties = PropertyMap::new();
    let mut iter = lines.iter();
    while let Some(line) = iter.next() {
        if !line.starts_with('>') {
            continue;
        }
        let mut value_lines = Vec::new();
        for value in iter.by_ref() {
            if value.trim().is_empty() {
                break;
            }
            value_lines.push(value.as_str());
        }
        if let Some(name) = data_item_name(line) {
            properties.set(name, value_lines.join("\n"));
        }
    }
    properties
}

fn parse_record(lines: &[String], options: &SdfReadOptions) -> Result<Molecule, SdfError> {
    if lines.len() < 4 {
        return Err(parse_error(
            lines.len(),
            SdfParseErrorKind::MissingCountsLine,
        ));
    }

    let counts = &lines[3];
    if counts.contains("V3000") {
        return Err(parse_error(3, SdfParseErrorKind::UnsupportedV3000));
    }
    let invalid_counts = || parse_error(3, SdfParseErrorKind::InvalidCountsLine(counts.clone()));
    let atom_count: usize = slice_and_trim(counts, 0, 3)
        .parse()
        .map_err(|_| invalid_counts())?;
    let bond_count: usize = slice_and_trim(counts, 3, 6)
        .parse()
        .map_err(|_| invalid_counts())?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    let props_start = bond_start + bond_count;

    if lines.len() < bond_start {
        return Err(parse_error(
            lines.len(),
            SdfParseErrorKind::TruncatedBlock {
                block: "atom",
                expected: atom_count,
                found: lines.len() - atom_start,
            },
        ));
    }
    if lines.len() < props_start {
        return Err(parse_error(
            lines.len(),
            SdfParseErrorKind::TruncatedBlock {
                block: "bond",
                expected: bond_count,
                found: lines.len() - bond_start,
            },
        ));
    }

    let mut molecule = Molecule::new(&lines[0]);
    molecule.comment = lines[2].clone();

    let mut atoms = Vec::with_capacity(atom_count);
    for (offset, line) in lines[atom_start..bond_start].iter().enumerate() {
        atoms.push(parse_atom_line(line, atom_start + offset)?);
    }

    let mut bonds = Vec::with_capacity(bond_count);
    for (offset, line) in lines[bond_start..props_start].iter().enumerate() {
        bonds.push(parse_bond_line(line, bond_start + offset, atom_count)?);
    }

    let mut end_idx = None;
    let mut charges_reset = false;
    for (offset, line) in lines[props_start..].iter().enumerate() {
        let idx = props_start + offset;
        if line.starts_with(END_LINE) {
            end_idx = Some(idx);
            break;
        }
        if line.starts_with('>') {
            break;
        }
        if line.starts_with("M  CHG") {
            if !charges_reset {
                atoms.iter_mut().for_each(|a| a.formal_charge = 0);
                charges_reset = true;
            }
            apply_charge_line(line, idx, &mut atoms)?;
        }
    }
    let Some(end_idx) = end_idx else {
        return Err(parse_error(props_start, SdfParseErrorKind::MissingEnd));
    };

    for atom in atoms {
        molecule.add_atom(atom);
    }
    for bond in bonds {
        molecule.push_bond(bond);
    }

    molecule.set_data_block(parse_data_block(&lines[end_idx + 1..]));

    if options.sanitize {
        valence::sanitize(&molecule).map_err(|e| parse_error(0, e.into()))?;
    }
    if options.remove_hydrogens {
        let removed = molecule.strip_hydrogens();
        if removed > 0 {
            trace!(name = %molecule.name, removed, "Folded explicit hydrogen atoms.");
        }
    }

    Ok(molecule)
}

/// MDL SD file format (V2000 connection tables).
pub struct SdfFile;

impl SdfFile {
    /// Writes the connection table of a molecule, up to and including
    /// `M  END`, without any data items.
    ///
    /// # Errors
    ///
    /// Returns an error if the molecule exceeds the V2000 size limit or
    /// writing fails.
    pub fn write_molblock(molecule: &Molecule, writer: &mut impl Write) -> Result<(), SdfError> {
        let atoms = molecule.atoms();
        let bonds = molecule.bonds();
        if atoms.len() > V2000_LIMIT || bonds.len() > V2000_LIMIT {
            return Err(SdfError::TooLarge {
                atoms: atoms.len(),
                bonds: bonds.len(),
            });
        }

        let dimension = if atoms.iter().all(|a| a.position.z == 0.0) {
            "2D"
        } else {
            "3D"
        };
        writeln!(writer, "{}", molecule.name)?;
        writeln!(writer, "  pkasplit      {}", dimension)?;
        writeln!(writer, "{}", molecule.comment)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            atoms.len(),
            bonds.len()
        )?;

        for atom in atoms {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3}{:>2}  0  0  0  0  0  0  0  0  0  0  0",
                atom.position.x, atom.position.y, atom.position.z, atom.symbol, atom.mass_difference
            )?;
        }
        for bond in bonds {
            writeln!(
                writer,
                "{:>3}{:>3}{:>3}{:>3}",
                bond.atom1 + 1,
                bond.atom2 + 1,
                bond.order.mdl_code(),
                bond.stereo
            )?;
        }

        let charged: Vec<(usize, i8)> = atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.formal_charge != 0)
            .map(|(i, a)| (i + 1, a.formal_charge))
            .collect();
        for chunk in charged.chunks(MAX_CHARGES_PER_LINE) {
            write!(writer, "M  CHG{:>3}", chunk.len())?;
            for (number, charge) in chunk {
                write!(writer, " {:>3} {:>3}", number, charge)?;
            }
            writeln!(writer)?;
        }
        writeln!(writer, "{}", END_LINE)?;
        Ok(())
    }

    /// Renders the connection table of a molecule as text.
    pub fn to_molblock(molecule: &Molecule) -> Result<String, SdfError> {
        let mut buf = Vec::new();
        Self::write_molblock(molecule, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl MolecularFile for SdfFile {
    type Options = SdfReadOptions;
    type Error = SdfError;

    fn read_record(
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<Option<Molecule>, Self::Error> {
        match read_raw_record(reader)? {
            Some(lines) => parse_record(&lines, options).map(Some),
            None => Ok(None),
        }
    }

    fn write_record(molecule: &Molecule, writer: &mut impl Write) -> Result<(), Self::Error> {
        Self::write_molblock(molecule, writer)?;
        for (key, value) in molecule.properties().iter() {
            writeln!(writer, ">  <{}>", key)?;
            writeln!(writer, "{}", value)?;
            writeln!(writer)?;
        }
        writeln!(writer, "{}", RECORD_TERMINATOR)?;
        Ok(())
    }
}

/// Iterates over the records of an SD stream.
///
/// A record that fails to parse is yielded as an error and the supplier moves
/// on to the next one. After an I/O error the supplier is exhausted.
pub struct SdfSupplier<R> {
    reader: R,
    options: SdfReadOptions,
    records_read: usize,
    exhausted: bool,
}

impl<R: BufRead> SdfSupplier<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, SdfReadOptions::default())
    }

    pub fn with_options(reader: R, options: SdfReadOptions) -> Self {
        Self {
            reader,
            options,
            records_read: 0,
            exhausted: false,
        }
    }

    /// Number of records consumed so far, including unparseable ones.
    pub fn records_read(&self) -> usize {
        self.records_read
    }
}

impl<R: BufRead> Iterator for SdfSupplier<R> {
    type Item = Result<Molecule, SdfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let lines = match read_raw_record(&mut self.reader) {
            Ok(Some(lines)) => lines,
            Ok(None) => {
                self.exhausted = true;
                return None;
            }
            Err(e) => {
                self.exhausted = true;
                return Some(Err(SdfError::Io(e)));
            }
        };
        self.records_read += 1;
        Some(parse_record(&lines, &self.options))
    }
}
