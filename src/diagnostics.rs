//! Diagnostics collection for SSA construction
//!
//! Building never aborts on problems caused by the front end. Unbound free values, invalid
//! member reads, emission into finished blocks and similar anomalies are recorded here and
//! surfaced once the program (or the relevant function) is finished.
//!
//! Every [`crate::ssa::Function`] owns one [`Diagnostics`] container;
//! [`crate::ssa::Program::diagnostics`] collects them all.

use std::fmt;

use strum::{EnumIter, IntoStaticStr};
use tracing::warn;

use crate::ssa::FunctionId;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Suspicious input, construction produced a usable fallback.
    Warn,

    /// Wrong input or builder misuse, the affected IR is incomplete.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// What kind of problem a diagnostic describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, EnumIter, IntoStaticStr)]
pub enum DiagnosticTag {
    /// A closure call site has no binding for one of the closure's free values.
    UnboundFreeValue,

    /// A read resolved to an `Undefined` placeholder.
    UndefinedValue,

    /// A member read has no statically known slot.
    InvalidMember,

    /// An instruction was emitted into a block that already ends in a terminator.
    FinishedBlock,

    /// A block was sealed twice.
    DoubleSeal,

    /// A phi ended up with a different number of edges than its block has predecessors.
    PhiEdgeMismatch,

    /// Argument counts or side-effect targets do not match the callee.
    TypeMismatch,

    /// `break`, `continue` or `fallthrough` without an enclosing target.
    MissingTarget,

    /// An edge was added to a block whose predecessors were already final.
    SealedBlockEdge,

    /// A call targets a closure whose body has not been built yet.
    CalleeNotBuilt,

    /// A block handle does not name a block of the function being built.
    UnknownBlock,
}

/// A source position range, reported by the front end through
/// [`crate::builder::FunctionBuilder::set_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceRange {
    /// First line (1-based)
    pub start_line: u32,
    /// First column (1-based)
    pub start_column: u32,
    /// Last line (1-based)
    pub end_line: u32,
    /// Last column (1-based)
    pub end_column: u32,
}

impl SourceRange {
    /// Creates a new source range
    #[must_use]
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: Severity,

    /// What kind of problem this is.
    pub tag: DiagnosticTag,

    /// Human-readable description of the issue.
    pub message: String,

    /// Source position the builder was at when the issue was found.
    pub range: Option<SourceRange>,

    /// Function the issue belongs to.
    pub function: Option<FunctionId>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `tag` - Kind of problem
    /// * `message` - Human-readable description
    pub fn new(severity: Severity, tag: DiagnosticTag, message: impl Into<String>) -> Self {
        Self {
            severity,
            tag,
            message: message.into(),
            range: None,
            function: None,
        }
    }

    /// Adds source position information to the diagnostic.
    #[must_use]
    pub fn with_range(mut self, range: Option<SourceRange>) -> Self {
        self.range = range;
        self
    }

    /// Adds the owning function to the diagnostic.
    #[must_use]
    pub fn with_function(mut self, function: FunctionId) -> Self {
        self.function = Some(function);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.tag, self.message)?;

        if let Some(function) = self.function {
            write!(f, " (function: {})", function)?;
        }

        if let Some(range) = self.range {
            write!(f, " (at {})", range)?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free append operations, so a finished program can
/// be inspected and annotated from analysis threads through a shared reference.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Diagnostics {
    fn clone(&self) -> Self {
        let cloned = Self::new();
        for (_, diagnostic) in self.entries.iter() {
            cloned.push(diagnostic.clone());
        }
        cloned
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds a warning diagnostic.
    pub fn warn(&self, tag: DiagnosticTag, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Warn, tag, message));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, tag: DiagnosticTag, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Error, tag, message));
    }

    /// Adds a diagnostic entry directly.
    pub fn push(&self, diagnostic: Diagnostic) {
        warn!(
            severity = %diagnostic.severity,
            tag = %diagnostic.tag,
            "{}",
            diagnostic.message
        );
        self.entries.push(diagnostic);
    }

    /// Returns true if no diagnostics have been collected.
    pub fn is_empty(&self) -> bool {
        self.entries.count() == 0
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == Severity::Error)
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == Severity::Warn)
            .count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns an iterator over the diagnostics carrying `tag`.
    pub fn with_tag(&self, tag: DiagnosticTag) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |d| d.tag == tag)
    }

    /// Returns a one line summary, e.g. `2 error(s), 1 warning(s)`.
    pub fn summary(&self) -> String {
        format!(
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_diagnostics_empty() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.count(), 0);
    }

    #[test]
    fn test_diagnostics_counts() {
        let diagnostics = Diagnostics::new();
        diagnostics.warn(DiagnosticTag::DoubleSeal, "b3 sealed twice");
        diagnostics.error(DiagnosticTag::FinishedBlock, "emit into finished b2");
        diagnostics.warn(DiagnosticTag::UndefinedValue, "x is undefined");

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 2);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.with_tag(DiagnosticTag::DoubleSeal).count(), 1);
        assert_eq!(diagnostics.summary(), "1 error(s), 2 warning(s)");
    }

    #[test]
    fn test_diagnostics_clone() {
        let diagnostics = Diagnostics::new();
        diagnostics.warn(DiagnosticTag::MissingTarget, "break outside of loop");
        let cloned = diagnostics.clone();
        assert_eq!(cloned.count(), 1);
        diagnostics.warn(DiagnosticTag::MissingTarget, "continue outside of loop");
        assert_eq!(cloned.count(), 1);
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::new(
            Severity::Error,
            DiagnosticTag::PhiEdgeMismatch,
            "phi v4 has 1 edge(s) for 2 predecessor(s)",
        )
        .with_function(FunctionId::new(0))
        .with_range(Some(SourceRange::new(3, 1, 3, 12)));

        assert_eq!(
            diagnostic.to_string(),
            "[ERROR] PhiEdgeMismatch: phi v4 has 1 edge(s) for 2 predecessor(s) (function: f0) (at 3:1-3:12)"
        );
    }

    #[test]
    fn test_tags_are_distinct() {
        let names: Vec<&'static str> = DiagnosticTag::iter().map(Into::into).collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert_eq!(names.len(), 10);
    }
}
