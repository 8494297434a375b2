//! Domain error taxonomy and the validation violation batch model.
//!
//! Structural and semantic validators never fail on the first offending
//! cell: they collect every [`ValidationViolation`] found in one pass and
//! reject the file as a whole, so an operator sees all problems at once.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Sanity ceiling for monetary cells; a larger absolute value almost always
/// means the source columns shifted and the projection grabbed the wrong one.
pub const NUMERIC_CEILING: f64 = 1_000_000.0;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to load schema {path:?}: {reason}")]
    SchemaLoad { path: PathBuf, reason: String },

    #[error("column count mismatch: schema defines {expected} column(s) but the sheet contains {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("header mismatch at position {position}: expected '{expected}' but found '{found}'")]
    HeaderMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("division by zero while deriving '{field}' at data row {row}")]
    DivisionByZeroInDerivation { row: usize, field: &'static str },

    #[error("{0}")]
    FileRejected(ValidationReport),
}

/// Which semantic rule a cell violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    NegativeValue,
    ValueTooHigh,
    InvalidDate,
    MissingRequiredValue,
}

impl ViolationKind {
    pub fn rule_id(&self) -> &'static str {
        match self {
            ViolationKind::NegativeValue => "negative_value",
            ViolationKind::ValueTooHigh => "value_too_high",
            ViolationKind::InvalidDate => "invalid_date",
            ViolationKind::MissingRequiredValue => "missing_required_value",
        }
    }
}

/// One offending cell, with enough context to find it in the spreadsheet.
#[derive(Debug, Clone)]
pub struct ValidationViolation {
    pub kind: ViolationKind,
    /// 1-based data row index (header row excluded); `None` for file-level problems.
    pub row: Option<usize>,
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind.rule_id())?;
        if let Some(row) = self.row {
            write!(f, " row {row}")?;
        }
        if let Some(column) = &self.column {
            write!(f, " column '{column}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// The full batch of violations collected for one file.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        kind: ViolationKind,
        row: usize,
        column: &str,
        message: impl Into<String>,
    ) {
        self.violations.push(ValidationViolation {
            kind,
            row: Some(row),
            column: Some(column.to_string()),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Converts a non-empty report into the hard file rejection.
    pub fn into_result(self) -> Result<(), LedgerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::FileRejected(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "file rejected with {} violation(s):",
            self.violations.len()
        )?;
        for (idx, violation) in self.violations.iter().enumerate() {
            writeln!(f, "  {}. {violation}", idx + 1)?;
        }
        Ok(())
    }
}
