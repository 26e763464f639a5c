use super::compression;
use crate::core::models::molecule::Molecule;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Defines the interface for reading and writing multi-record molecular files.
///
/// Formats such as SDF hold many independent records in a single stream.
/// Implementors parse or serialize one record at a time so that a caller can
/// recover from a malformed record and keep going.
pub trait MolecularFile {
    /// Format-specific reading options.
    type Options: Default;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads the next record from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    /// * `options` - Format-specific reading options.
    ///
    /// # Return
    ///
    /// Returns `Ok(None)` once the stream holds no further records.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be parsed or the reader fails.
    /// After a parse error the reader is positioned at the start of the
    /// following record.
    fn read_record(
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<Option<Molecule>, Self::Error>;

    /// Writes a single record, including its terminator, to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the molecule cannot be represented in the format
    /// or writing fails.
    fn write_record(molecule: &Molecule, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every record from a file path, gzip-compressed or not.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; no partial result is returned.
    fn read_all_from_path<P: AsRef<Path>>(
        path: P,
        options: &Self::Options,
    ) -> Result<Vec<Molecule>, Self::Error> {
        let mut reader = compression::open_input(path.as_ref())?;
        let mut molecules = Vec::new();
        while let Some(molecule) = Self::read_record(&mut reader, options)? {
            molecules.push(molecule);
        }
        Ok(molecules)
    }

    /// Writes records to a gzip-compressed file, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_all_to_path<P: AsRef<Path>>(
        molecules: &[Molecule],
        path: P,
    ) -> Result<(), Self::Error> {
        let mut writer = compression::create_output(path.as_ref())?;
        for molecule in molecules {
            Self::write_record(molecule, &mut writer)?;
        }
        writer.finish()?.flush()?;
        Ok(())
    }
}
