//! Domain model for Roundtable debates.
//!
//! A debate is a sequence of rounds in which every participant speaks once,
//! always in the same order. This crate holds the plain data types and the
//! bookkeeping that keeps turns in that order; scheduling and provider I/O
//! live in the `orchestrator` crate.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::CoreError;
