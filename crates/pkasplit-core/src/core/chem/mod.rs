//! Chemistry primitives used to derive protonation states.
//!
//! The chain builders only see the [`conjugate::ConjugateEngine`] and
//! [`layout::CoordinateLayout`] traits; the implementations here are the
//! defaults used by the command-line tool.

pub mod conjugate;
pub mod layout;
pub mod valence;
