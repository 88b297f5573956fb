//! Diagnostic reporting. The checker never unwinds on a recoverable error —
//! it reports through a [`DiagnosticSink`] and keeps walking so a single pass
//! surfaces as many problems as it can (spec: "the walker always visits
//! every node").

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source location, as an opaque index into the token/line table owned by
/// the (out-of-scope) lexer. The checker never interprets this beyond
/// passing it through to [`DiagnosticSink::report`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SourceLoc(pub u32);

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
  /// Informational; never affects whether codegen proceeds.
  Info,
  /// A problem worth surfacing but not fatal to the translation unit.
  Warning,
  /// A semantic error. Increments the sink's error counter.
  Error,
}

/// A single reported diagnostic.
#[derive(Clone, Debug)]
pub struct Diagnostic {
  /// Severity of the diagnostic.
  pub severity: Severity,
  /// Where it occurred.
  pub loc: SourceLoc,
  /// The rendered message.
  pub message: String,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self.severity {
      Severity::Info => "info",
      Severity::Warning => "warning",
      Severity::Error => "error",
    };
    write!(f, "{}: {}: {}", self.loc.0, kind, self.message)
  }
}

/// Collects diagnostics for one translation unit and tracks the error count
/// the driver consults before allowing codegen to proceed (spec §7: "the
/// driver refuses codegen if it is non-zero").
///
/// The error counter is deliberately module-scoped rather than a true
/// process global (spec §9, "Process-wide counters... do not make them truly
/// global") — each [`DiagnosticSink`] is owned by exactly one translation
/// unit's checking pass.
#[derive(Default)]
pub struct DiagnosticSink {
  diagnostics: std::sync::Mutex<Vec<Diagnostic>>,
  error_count: AtomicUsize,
}

impl DiagnosticSink {
  /// Create an empty sink.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Report a diagnostic. Thread-safe: multiple workers sharing a
  /// diagnostics sink (e.g. a driver aggregating several TUs) may call this
  /// concurrently.
  pub fn report(&self, severity: Severity, loc: SourceLoc, message: impl Into<String>) {
    if severity == Severity::Error { self.error_count.fetch_add(1, Ordering::Relaxed); }
    self.diagnostics.lock().expect("diagnostic sink poisoned").push(Diagnostic { severity, loc, message: message.into() });
  }

  /// Number of `Error`-severity diagnostics reported so far.
  #[must_use] pub fn error_count(&self) -> usize { self.error_count.load(Ordering::Relaxed) }

  /// `true` once any error has been reported.
  #[must_use] pub fn has_errors(&self) -> bool { self.error_count() > 0 }

  /// A snapshot of every diagnostic reported so far, in report order.
  #[must_use] pub fn diagnostics(&self) -> Vec<Diagnostic> {
    self.diagnostics.lock().expect("diagnostic sink poisoned").clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_count_tracks_only_errors() {
    let sink = DiagnosticSink::new();
    sink.report(Severity::Info, SourceLoc(0), "note");
    sink.report(Severity::Warning, SourceLoc(1), "careful");
    assert_eq!(sink.error_count(), 0);
    assert!(!sink.has_errors());
    sink.report(Severity::Error, SourceLoc(2), "could not implicitly convert type int into int *");
    assert_eq!(sink.error_count(), 1);
    assert!(sink.has_errors());
    assert_eq!(sink.diagnostics().len(), 3);
  }
}
