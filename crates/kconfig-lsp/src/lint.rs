//! Semantic checks for configuration override entries.
//!
//! Every lint pass re-derives the entries of each conf file and runs the
//! checks below against the evaluated symbol graph. The checks are mutually
//! exclusive by construction: they run in a fixed order and the first one
//! that produces a finding wins, so an entry never collects more than one
//! diagnostic. An entry naming a symbol the evaluation has never seen is
//! skipped entirely.
//!
//! The checks reimplement the assignment validation the build system runs
//! when generating the final configuration, so developers see the fallout
//! while editing instead of at build time.

use crate::conf::{ConfEntry, ConfFile, EntryKind, LintDiagnostic};
use crate::diag;
use crate::vfs::DocumentStore;
use kconfig_graph::{Evaluation, SymbolInfo, SymbolType};
use lsp_types::{CodeAction, CodeActionKind, DiagnosticSeverity, Range, TextEdit, Uri, WorkspaceEdit};
use std::collections::HashMap;

/// Run the pipeline over every entry of every conf file.
///
/// `all_entries` is the cross-file entry list (board file first, then the
/// conf files in application order); the duplicate check works across it.
pub fn run(
    docs: &mut DocumentStore,
    eval: &dyn Evaluation,
    files: &mut [ConfFile],
    all_entries: &[ConfEntry],
) {
    for file in files.iter_mut() {
        let entries = file.entries(docs);
        for entry in &entries {
            let Some(sym) = eval.symbol(&entry.name) else {
                continue;
            };
            if let Some(finding) = check_entry(entry, &sym, &entries, all_entries) {
                file.diags.push(finding);
            }
        }
    }
}

fn check_entry(
    entry: &ConfEntry,
    sym: &SymbolInfo,
    file_entries: &[ConfEntry],
    all_entries: &[ConfEntry],
) -> Option<LintDiagnostic> {
    check_undefined(entry, sym)
        .or_else(|| check_type(entry, sym))
        .or_else(|| check_assignment(entry, sym, file_entries))
        .or_else(|| check_visibility(entry, sym))
        .or_else(|| check_defaults(entry, sym))
        .or_else(|| check_multiple_assignments(entry, all_entries))
}

#[allow(clippy::mutable_key_type)] // Uri is the key type the LSP WorkspaceEdit API requires
fn quickfix(title: String, uri: &Uri, edits: Vec<TextEdit>) -> CodeAction {
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), edits);
    CodeAction {
        title,
        kind: Some(CodeActionKind::QUICKFIX),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..WorkspaceEdit::default()
        }),
        ..CodeAction::default()
    }
}

/// The entry names a symbol without a definition anywhere in the tree.
fn check_undefined(entry: &ConfEntry, sym: &SymbolInfo) -> Option<LintDiagnostic> {
    if sym.symbol_type != SymbolType::Unknown {
        return None;
    }
    Some(LintDiagnostic::new(diag::error(
        format!("Undefined symbol CONFIG_{}", sym.name),
        entry.full_range(),
    )))
}

/// The literal shape of the value does not match the symbol's type.
fn check_type(entry: &ConfEntry, sym: &SymbolInfo) -> Option<LintDiagnostic> {
    if sym.symbol_type.as_str() == entry.kind().as_str() {
        return None;
    }
    let mut finding = LintDiagnostic::new(diag::error(
        format!("Invalid type. Expected {}", sym.symbol_type),
        entry.full_range(),
    ));
    // Hex and int values convert mechanically; offer the rewrite.
    if sym.symbol_type.is_numeric() && matches!(entry.kind(), EntryKind::Hex | EntryKind::Int) {
        if let Some(value) = entry.int_value() {
            let new_text = if sym.symbol_type == SymbolType::Hex {
                format!("{value:#x}")
            } else {
                value.to_string()
            };
            finding = finding.with_action(quickfix(
                format!("Convert value to {}", sym.symbol_type),
                &entry.loc.uri,
                vec![TextEdit {
                    range: entry.value_range,
                    new_text,
                }],
            ));
        }
    }
    Some(finding)
}

/// The assigned value did not (fully) take effect.
///
/// Only fires when the symbol has unmet dependencies to report; the message
/// names them, and for plain boolean dependencies the attached actions
/// either flip an existing entry in the same file or insert a new
/// `CONFIG_<dep>=y` line right above the entry.
fn check_assignment(
    entry: &ConfEntry,
    sym: &SymbolInfo,
    file_entries: &[ConfEntry],
) -> Option<LintDiagnostic> {
    let user = sym.user_value.as_deref()?;
    if user == sym.value {
        if user == "y" {
            return None;
        }
        if sym.unmet_deps.is_empty() {
            return None;
        }
        let mut diagnostic = diag::hint(
            format!("CONFIG_{} was already disabled.", sym.name),
            entry.range(),
        );
        diag::mark_unnecessary(&mut diagnostic);
        return Some(LintDiagnostic::new(diagnostic));
    }

    if sym.unmet_deps.is_empty() {
        return None;
    }

    let mut msg = if sym.value.is_empty() {
        format!("CONFIG_{} couldn't be set.", sym.name)
    } else {
        format!(
            "CONFIG_{} was assigned the value {}, but got the value {}.",
            sym.name, entry.raw, sym.value
        )
    };
    msg.push_str(" Missing dependencies:\n");
    msg.push_str(
        &sym.unmet_deps
            .iter()
            .map(|c| c.display.as_str())
            .collect::<Vec<_>>()
            .join(" && "),
    );

    let mut edits: Vec<(String, TextEdit)> = Vec::new();
    for clause in &sym.unmet_deps {
        let Some(dep) = &clause.bool_symbol else {
            continue;
        };
        let edit = match file_entries.iter().find(|e| e.name == *dep) {
            Some(dep_entry) => TextEdit {
                range: dep_entry.value_range,
                new_text: "y".to_owned(),
            },
            None => TextEdit {
                range: Range::new(entry.line_range().start, entry.line_range().start),
                new_text: format!("CONFIG_{dep}=y\n"),
            },
        };
        edits.push((dep.clone(), edit));
    }

    let mut finding = LintDiagnostic::new(diag::warning(msg, entry.range()));
    if edits.len() == 1 {
        let (dep, edit) = edits.remove(0);
        finding = finding.with_action(quickfix(
            format!("Enable CONFIG_{dep} to resolve dependency"),
            &entry.loc.uri,
            vec![edit],
        ));
    } else if edits.len() > 1 {
        // Dependencies are discovered nearest-first; insert the most distal
        // one first so the resulting file reads top to bottom.
        edits.reverse();
        finding = finding.with_action(quickfix(
            format!("Enable {} entries to resolve dependencies", edits.len()),
            &entry.loc.uri,
            edits.into_iter().map(|(_, edit)| edit).collect(),
        ));
    }
    Some(finding.with_action(entry.remove("Remove entry")))
}

/// The symbol has no prompt anywhere, so conf files cannot set it.
fn check_visibility(entry: &ConfEntry, sym: &SymbolInfo) -> Option<LintDiagnostic> {
    if sym.has_prompt() {
        return None;
    }
    let diagnostic = diag::warning(
        format!("Symbol CONFIG_{} cannot be set (has no prompt)", entry.name),
        entry.full_range(),
    );
    Some(LintDiagnostic::new(diagnostic).with_action(entry.remove("Remove entry")))
}

/// The assigned value is exactly the symbol's computed default.
fn check_defaults(entry: &ConfEntry, sym: &SymbolInfo) -> Option<LintDiagnostic> {
    if sym.default_value.is_none() || sym.default_value != sym.user_value {
        return None;
    }
    let mut diagnostic = diag::hint(
        format!("Value is {} by default", entry.raw),
        entry.full_range(),
    );
    diag::mark_unnecessary(&mut diagnostic);
    Some(LintDiagnostic::new(diagnostic).with_action(entry.remove("Remove redundant entry")))
}

/// The symbol is assigned more than once across the session's files.
fn check_multiple_assignments(
    entry: &ConfEntry,
    all_entries: &[ConfEntry],
) -> Option<LintDiagnostic> {
    let matching: Vec<&ConfEntry> = all_entries.iter().filter(|e| e.name == entry.name).collect();
    if matching.len() < 2 || matching[0] == entry {
        return None;
    }
    let existing = matching[0];
    let mut diagnostic = diag::warning(
        format!(
            "{} set more than once. Old value \"{}\", new value \"{}\".",
            entry.name,
            existing.value(),
            entry.value()
        ),
        entry.full_range(),
    );
    diagnostic.related_information = Some(
        matching
            .iter()
            .filter(|e| ***e != *entry)
            .map(|e| diag::related(e.loc.clone(), format!("Already set to \"{}\" here", e.value())))
            .collect(),
    );
    let mut finding = LintDiagnostic::new(diagnostic);
    if existing.value() == entry.value() {
        diag::mark_unnecessary(&mut finding.diagnostic);
        finding.diagnostic.severity = Some(DiagnosticSeverity::HINT);
        finding = finding.with_action(entry.remove("Remove redundant entry"));
    }
    Some(finding)
}
