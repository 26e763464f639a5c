//! Provides input/output functionality for SD files.
//!
//! Records are read and written one at a time through the
//! [`traits::MolecularFile`] interface so that a single malformed record never
//! aborts a whole file. Gzip-compressed input is detected by content, and all
//! output is gzip-compressed.

pub mod compression;
pub mod sdf;
pub mod traits;
