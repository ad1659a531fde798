//! The diagnostic sink: an accumulator of non-fatal errors, warnings, and
//! informational notes collected across a compile.
//!
//! A compile fails overall iff the sink holds at least one `Error`.
//! Warnings never stop compilation; the optimizer uses `warn` to downgrade
//! certain semantic findings (e.g. an always-false comparison) instead of
//! hard-failing, replacing the expression with a constant and moving on.

use avm_ir::SourceLocation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

/// Accumulates diagnostics across passes and subroutines for one compile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn error(&mut self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.push(Severity::Error, message, location);
    }

    pub fn warn(&mut self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.push(Severity::Warning, message, location);
    }

    pub fn info(&mut self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.push(Severity::Info, message, location);
    }

    fn push(&mut self, severity: Severity, message: impl Into<String>, location: Option<SourceLocation>) {
        let diag = Diagnostic {
            severity,
            message: message.into(),
            location,
        };
        tracing::debug!(?diag.severity, %diag.message, "diagnostic");
        self.items.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}
