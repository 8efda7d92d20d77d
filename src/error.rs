//! Crate errors.

use thiserror::Error;

use crate::props::PropId;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by construction, property access, and resolution.
///
/// All variants are unrecoverable at the point of detection and propagate
/// synchronously to the caller. Absence of a value is *not* an error: an
/// unresolved geometry cell reads as `None` and formulas over it stay
/// unresolved until the renderer supplies measurements.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing value from cell `{0}` (block may not be resolved yet)")]
    MissingValue(String),

    #[error("negative value from cell `{name}`: {value}")]
    NegativeValue { name: String, value: f64 },

    #[error("block {0} already has a parent")]
    AlreadyParented(String),

    #[error("irregular table: row {row} has {got} columns, expected {expected}")]
    IrregularTable {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("property `{0}` is derived and read-only")]
    ReadOnlyProperty(PropId),

    #[error("cannot assign an absent value to property `{0}`")]
    InvalidAssignment(PropId),

    #[error("not resolved yet: {0}")]
    NotResolved(String),

    #[error("duplicate declaration of property `{0}`")]
    ConfigurationError(PropId),

    #[error("cyclic dependency detected while evaluating cell `{0}`")]
    CyclicDependency(String),

    #[error("invalid justification character `{0}` (expected one of l, c, r)")]
    InvalidJustify(char),
}
