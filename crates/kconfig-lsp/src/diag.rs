//! Small constructors for protocol diagnostics.

use lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, DiagnosticTag, Location, Range,
};

fn with_severity(message: String, range: Range, severity: DiagnosticSeverity) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        message,
        ..Diagnostic::default()
    }
}

/// An error diagnostic.
pub fn error(message: impl Into<String>, range: Range) -> Diagnostic {
    with_severity(message.into(), range, DiagnosticSeverity::ERROR)
}

/// A warning diagnostic.
pub fn warning(message: impl Into<String>, range: Range) -> Diagnostic {
    with_severity(message.into(), range, DiagnosticSeverity::WARNING)
}

/// A hint diagnostic.
pub fn hint(message: impl Into<String>, range: Range) -> Diagnostic {
    with_severity(message.into(), range, DiagnosticSeverity::HINT)
}

/// Tag a diagnostic as unnecessary code, so editors fade it out.
pub fn mark_unnecessary(diag: &mut Diagnostic) {
    diag.tags
        .get_or_insert_with(Vec::new)
        .push(DiagnosticTag::UNNECESSARY);
}

/// A related-information link.
pub fn related(location: Location, message: impl Into<String>) -> DiagnosticRelatedInformation {
    DiagnosticRelatedInformation {
        location,
        message: message.into(),
    }
}
