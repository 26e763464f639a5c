//! # pkasplit Core Library
//!
//! Splits molecules annotated with Epik pKa predictions into the sequence of
//! protonation states they pass through, one tagged SD record per reaction.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`), SD file
//!   I/O with gzip support, and the chemistry primitives: valence rules, the
//!   conjugate acid/base rule and a 2D layout.
//!
//! - **[`engine`]: The Logic Core.** Classification of pKa entries by pH and
//!   the fail-fast acidic and basic chain builders, with their configuration,
//!   progress reporting and error types.
//!
//! - **[`workflows`]: The Public API.** Runs a complete split over a file or
//!   stream and reports a summary of the run.

pub mod core;
pub mod engine;
pub mod workflows;
