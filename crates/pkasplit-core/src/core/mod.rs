//! # Core Module
//!
//! The stateless building blocks of the splitter: the small-molecule data
//! model, SD file I/O and the chemistry needed to derive protonation states.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, data items and molecules
//! - **File I/O** ([`io`]) - Record-oriented SD reading and writing with gzip support
//! - **Chemistry** ([`chem`]) - Valence rules, conjugate acid/base derivation and 2D layout

pub mod chem;
pub mod io;
pub mod models;
