//! # Workflows Module
//!
//! High-level entry points that tie file I/O, classification and chain
//! building together.
//!
//! - **Split Workflow** ([`split`]) - Turns an Epik-annotated SD file into a
//!   gzip-compressed SD file of tagged protonation states, returning a
//!   [`split::SplitSummary`] of what was read, skipped and written.

pub mod split;
