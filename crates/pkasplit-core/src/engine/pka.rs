//! Reading pKa predictions from the data items of a record.
//!
//! Epik stores one prediction per ionizable site as numbered pairs of data
//! items: `r_epik_pKa_<i>` holds the value and `i_epik_pKa_atom_<i>` the
//! 1-based atom number. The record identifier comes from `chembl_id`.

use crate::core::models::molecule::Molecule;
use std::fmt;
use thiserror::Error;

/// Substring identifying a pKa value among a record's data item names.
pub const PKA_KEY_MARKER: &str = "r_epik_pKa";
pub const IDENTIFIER_KEY: &str = "chembl_id";

fn pka_key(n: usize) -> String {
    format!("r_epik_pKa_{}", n)
}

fn atom_key(n: usize) -> String {
    format!("i_epik_pKa_atom_{}", n)
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetadataError {
    #[error("Record has no data items")]
    NoDataBlock,

    #[error("Missing required data item '{0}'")]
    MissingProperty(String),

    #[error("Invalid value for data item '{key}' (value: '{value}')")]
    InvalidValue { key: String, value: String },
}

/// A single predicted protonation site.
#[derive(Debug, Clone, PartialEq)]
pub struct PkaEntry {
    pub pka: f64,
    /// 0-based index of the reaction centre.
    pub atom_index: usize,
    pub identifier: String,
}

impl fmt::Display for PkaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:?}, {}, '{}')",
            self.pka, self.atom_index, self.identifier
        )
    }
}

/// pKa entries split by the pH threshold, each group in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub acidic: Vec<PkaEntry>,
    pub basic: Vec<PkaEntry>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.acidic.len() + self.basic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn required<'a>(molecule: &'a Molecule, key: &str) -> Result<&'a str, MetadataError> {
    molecule
        .properties()
        .get(key)
        .ok_or_else(|| MetadataError::MissingProperty(key.to_string()))
}

fn invalid(key: String, value: &str) -> MetadataError {
    MetadataError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

/// Collects the pKa entries of a record in numbering order.
///
/// The number of entries is the number of data item names containing
/// [`PKA_KEY_MARKER`]. A record that has data items but no pKa values yields
/// an empty list.
///
/// # Errors
///
/// Returns [`MetadataError`] if the record has no data items, if a numbered
/// item or the identifier is missing, or if a value does not parse. Atom
/// number 0 and NaN pKa values are rejected as invalid.
pub fn extract_entries(molecule: &Molecule) -> Result<Vec<PkaEntry>, MetadataError> {
    if !molecule.has_properties() {
        return Err(MetadataError::NoDataBlock);
    }

    let count = molecule
        .properties()
        .keys()
        .filter(|k| k.contains(PKA_KEY_MARKER))
        .count();

    let mut entries = Vec::with_capacity(count);
    for n in 1..=count {
        let key = pka_key(n);
        let raw = required(molecule, &key)?;
        let pka = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| !v.is_nan())
            .ok_or_else(|| invalid(key, raw))?;

        let key = atom_key(n);
        let raw = required(molecule, &key)?;
        let atom_index = raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
            .ok_or_else(|| invalid(key, raw))?;

        let identifier = required(molecule, IDENTIFIER_KEY)?.to_string();

        entries.push(PkaEntry {
            pka,
            atom_index,
            identifier,
        });
    }
    Ok(entries)
}

/// Splits entries into acidic (pKa at or below `ph`) and basic (above) groups.
pub fn partition(entries: &[PkaEntry], ph: f64) -> Partition {
    Partition {
        acidic: entries.iter().filter(|e| e.pka <= ph).cloned().collect(),
        basic: entries.iter().filter(|e| e.pka > ph).cloned().collect(),
    }
}
