//! Hand-rolled error and diagnostics types.
//!
//! No `thiserror`/`anyhow` here: every variant implements `Display` and
//! `std::error::Error` by hand, matching the rest of this codebase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural failures raised while compiling a [`crate::circuit::NumericalCircuit`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// No active buses in the snapshot.
    EmptyNetwork,
    /// A branch's `from`/`to` index is out of range for the snapshot's bus array.
    InvalidBranchEndpoint { branch: usize },
    /// A branch declares a control mode/kind inconsistent with its
    /// endpoints' AC/DC domain (e.g. a VSC wired between two AC buses).
    InvalidControl { branch: usize },
    /// Two devices share a primary key that must be unique.
    DuplicateKey { id: u32 },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::EmptyNetwork => write!(f, "network has no active buses"),
            CompileError::InvalidBranchEndpoint { branch } => {
                write!(f, "branch {branch} has an out-of-range endpoint index")
            }
            CompileError::InvalidControl { branch } => {
                write!(f, "branch {branch} declares an invalid control mode for its endpoints")
            }
            CompileError::DuplicateKey { id } => write!(f, "duplicate primary key: {id}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Failures raised by a numerical solver during the course of an otherwise
/// well-formed solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// A direct solve returned a non-finite value and no fallback applied.
    Singular,
    /// The iteration cap was reached before `‖F‖∞ < tol`.
    NonConvergence { iterations: usize },
    /// HELM coefficient magnitudes exceeded the overflow threshold.
    NumericalOverflow,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Singular => write!(f, "linear system is singular"),
            SolverError::NonConvergence { iterations } => {
                write!(f, "did not converge after {iterations} iterations")
            }
            SolverError::NumericalOverflow => write!(f, "numerical overflow in series coefficients"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Severity of a non-fatal [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One accumulated diagnostic. Non-fatal by construction: producing one
/// never aborts the calling driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub island: Option<usize>,
    pub branch: Option<usize>,
    pub message: String,
}

/// Accumulates non-fatal diagnostics across a driver call (linear analysis,
/// contingency composition, Ward reduction, ...), returned alongside the
/// driver's result rather than threaded as a side channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Logger {
    entries: Vec<LogEntry>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry {
            severity: Severity::Warning,
            island: None,
            branch: None,
            message: message.into(),
        });
    }

    pub fn warn_island(&mut self, island: usize, message: impl Into<String>) {
        self.entries.push(LogEntry {
            severity: Severity::Warning,
            island: Some(island),
            branch: None,
            message: message.into(),
        });
    }

    pub fn warn_branch(&mut self, branch: usize, message: impl Into<String>) {
        self.entries.push(LogEntry {
            severity: Severity::Warning,
            island: None,
            branch: Some(branch),
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry {
            severity: Severity::Error,
            island: None,
            branch: None,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Logger) {
        self.entries.extend(other.entries);
    }
}
