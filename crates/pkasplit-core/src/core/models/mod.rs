//! # Core Models Module
//!
//! Data structures for the small molecules flowing through the splitter.
//!
//! - [`atom`] - Element, coordinates, formal charge and hydrogen bookkeeping
//! - [`topology`] - Bonds and bond orders
//! - [`properties`] - Insertion-ordered SD data items
//! - [`molecule`] - A complete record: header, connection table and properties

pub mod atom;
pub mod molecule;
pub mod properties;
pub mod topology;
