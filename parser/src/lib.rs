//! Parsing of artifact references (`KEYWORD-123`) out of free text.

pub mod error;
pub mod reference;

pub use error::ParseReferenceError;
pub use reference::{ReferenceId, ReferenceParser, ReferenceSet, References};
