//! Bundled filters.
//!
//! [`plaintext`] extracts line- or paragraph-per-unit text documents and is
//! the reference implementation of the filter contract; [`compound`] wraps
//! its configurations behind one delegating filter keyed by sub-format.

pub mod compound;
pub mod plaintext;
