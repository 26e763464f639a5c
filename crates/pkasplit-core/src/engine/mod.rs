//! # Engine Module
//!
//! The per-molecule logic of the splitter: classifying pKa predictions and
//! growing the acidic and basic protonation chains from them.
//!
//! - **Configuration** ([`config`]) - pH threshold, hydrogen handling and layout switches
//! - **Classification** ([`pka`]) - Reading Epik pKa data items and partitioning them by pH
//! - **Chain Building** ([`chain`]) - Fail-fast acidic and basic chain construction and tagging
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events for front ends
//! - **Error Handling** ([`error`]) - Fatal errors that abort a run

pub mod chain;
pub mod config;
pub mod error;
pub mod pka;
pub mod progress;
