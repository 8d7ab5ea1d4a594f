//! Configuration override files (`prj.conf` and friends).
//!
//! A conf file is an ordered list of `CONFIG_<NAME>=<value>` assignment
//! lines. Entries are re-derived from the backing document on every lint
//! pass; only the diagnostics produced for them are kept on the file.

use crate::vfs::{path_to_uri, DocumentStore};
use lsp_types::{
    CodeAction, CodeActionKind, Diagnostic, Location, Position, Range, TextEdit, Uri,
    WorkspaceEdit,
};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

fn entry_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(CONFIG_(\w+))\s*=("[^"]+"|\w+)"#).expect("entry pattern compiles")
    })
}

/// Literal shape of an entry's value, derived without consulting the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Quoted text.
    String,
    /// `0x`-prefixed hexadecimal number.
    Hex,
    /// Decimal number.
    Int,
    /// Exactly `y` or `n`.
    Bool,
    /// Anything else.
    Unknown,
}

impl EntryKind {
    /// Name matching the symbol-type vocabulary.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Hex => "hex",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Unknown => "unknown",
        }
    }
}

/// One assignment line in a conf file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfEntry {
    /// Symbol name without the `CONFIG_` prefix.
    pub name: String,
    /// Location of the name text (including the prefix).
    pub loc: Location,
    /// The assigned value text, as written.
    pub raw: String,
    /// Range of the value text.
    pub value_range: Range,
}

impl ConfEntry {
    /// Range of the name text.
    pub fn range(&self) -> Range {
        self.loc.range
    }

    /// Range of the whole assignment, name through value.
    pub fn full_range(&self) -> Range {
        Range::new(self.loc.range.start, self.value_range.end)
    }

    /// Range of the whole line, including its newline.
    pub fn line_range(&self) -> Range {
        Range::new(
            Position::new(self.loc.range.start.line, 0),
            Position::new(self.loc.range.start.line + 1, 0),
        )
    }

    fn is_string(&self) -> bool {
        self.raw.len() >= 2 && self.raw.starts_with('"') && self.raw.ends_with('"')
    }

    fn is_hex(&self) -> bool {
        self.raw
            .strip_prefix("0x")
            .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_hexdigit()))
    }

    fn is_int(&self) -> bool {
        !self.raw.is_empty() && self.raw.bytes().all(|b| b.is_ascii_digit())
    }

    /// The literal kind of the value.
    pub fn kind(&self) -> EntryKind {
        if self.is_string() {
            EntryKind::String
        } else if self.is_hex() {
            EntryKind::Hex
        } else if self.is_int() {
            EntryKind::Int
        } else if self.raw == "y" || self.raw == "n" {
            EntryKind::Bool
        } else {
            EntryKind::Unknown
        }
    }

    /// Numeric value for hex and int entries.
    pub fn int_value(&self) -> Option<i64> {
        match self.kind() {
            EntryKind::Hex => i64::from_str_radix(&self.raw[2..], 16).ok(),
            EntryKind::Int => self.raw.parse().ok(),
            _ => None,
        }
    }

    /// The value as the engine would see it: strings unquoted, numbers in
    /// decimal. Used for comparing entries and in messages.
    pub fn value(&self) -> String {
        if self.is_string() {
            return self.raw[1..self.raw.len() - 1].to_owned();
        }
        if let Some(n) = self.int_value() {
            return n.to_string();
        }
        self.raw.clone()
    }

    /// A code action deleting this entry's line.
    #[allow(clippy::mutable_key_type)] // Uri is the key type the LSP WorkspaceEdit API requires
    pub fn remove(&self, title: &str) -> CodeAction {
        let mut changes = HashMap::new();
        changes.insert(
            self.loc.uri.clone(),
            vec![TextEdit {
                range: self.line_range(),
                new_text: String::new(),
            }],
        );
        CodeAction {
            title: title.to_owned(),
            kind: Some(CodeActionKind::QUICKFIX),
            edit: Some(WorkspaceEdit {
                changes: Some(changes),
                ..WorkspaceEdit::default()
            }),
            ..CodeAction::default()
        }
    }
}

/// A diagnostic plus the remediation actions attached to it.
///
/// Publishing sends only the protocol diagnostic; the code-action handler
/// recovers the actions for diagnostics overlapping the requested range.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// The protocol diagnostic.
    pub diagnostic: Diagnostic,
    /// Quick fixes for it.
    pub actions: Vec<CodeAction>,
}

impl LintDiagnostic {
    /// A diagnostic without actions.
    pub fn new(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic,
            actions: Vec::new(),
        }
    }

    /// Attach an action.
    #[must_use]
    pub fn with_action(mut self, action: CodeAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// One override file of a session.
#[derive(Debug)]
pub struct ConfFile {
    /// The file's URI.
    pub uri: Uri,
    /// Diagnostics from the last lint pass.
    pub diags: Vec<LintDiagnostic>,
}

impl ConfFile {
    /// A conf file with no diagnostics.
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            diags: Vec::new(),
        }
    }

    /// Scan the backing document for assignment entries.
    ///
    /// The entry list is always re-derived; the document may have changed
    /// since the last pass.
    pub fn entries(&self, docs: &mut DocumentStore) -> Vec<ConfEntry> {
        let Some(doc) = docs.get(&self.uri, true) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for (linenr, line) in doc.lines().iter().enumerate() {
            let Some(caps) = entry_pattern().captures(line) else {
                continue;
            };
            let (Some(full_name), Some(name), Some(value)) = (caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let linenr = linenr as u32;
            let range = Range::new(
                Position::new(linenr, full_name.start() as u32),
                Position::new(linenr, full_name.end() as u32),
            );
            entries.push(ConfEntry {
                name: name.as_str().to_owned(),
                loc: Location::new(self.uri.clone(), range),
                raw: value.as_str().trim().to_owned(),
                value_range: Range::new(
                    Position::new(linenr, value.start() as u32),
                    Position::new(linenr, value.end() as u32),
                ),
            });
        }
        entries
    }

    /// All entries assigning the given symbol name.
    pub fn find(&self, docs: &mut DocumentStore, name: &str) -> Vec<ConfEntry> {
        self.entries(docs)
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

/// A board definition: its default configuration participates in every
/// session for that board as the replace-mode base file.
#[derive(Debug, Clone)]
pub struct BoardConf {
    /// Board name, e.g. `nrf52840dk_nrf52840`.
    pub name: String,
    /// Board architecture.
    pub arch: String,
    /// Board directory.
    pub dir: PathBuf,
}

impl BoardConf {
    /// Create a board description.
    pub fn new(name: impl Into<String>, arch: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            arch: arch.into(),
            dir: dir.into(),
        }
    }

    /// The `<name>_defconfig` file included when building for this board.
    pub fn conf_file(&self) -> Option<ConfFile> {
        let path = self.dir.join(format!("{}_defconfig", self.name));
        path_to_uri(&path).map(ConfFile::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::TextDocument;

    fn store_with(uri: &Uri, text: &str) -> DocumentStore {
        let mut docs = DocumentStore::new();
        docs.open(TextDocument::new(uri.clone(), text, None, 1));
        docs
    }

    fn file(text: &str) -> (ConfFile, DocumentStore) {
        let uri: Uri = "file:///prj.conf".parse().expect("uri");
        let docs = store_with(&uri, text);
        (ConfFile::new(uri), docs)
    }

    fn entry(raw: &str) -> ConfEntry {
        let (conf, mut docs) = file(&format!("CONFIG_X={raw}"));
        conf.entries(&mut docs).remove(0)
    }

    #[test]
    fn scans_assignment_lines_only() {
        let (conf, mut docs) = file(
            "# comment\n  CONFIG_SERIAL=y\nmainmenu oops\nCONFIG_NAME=\"board x\"\nCONFIG_BAD=\n",
        );
        let entries = conf.entries(&mut docs);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "SERIAL");
        assert_eq!(entries[0].loc.range.start, Position::new(1, 2));
        assert_eq!(entries[1].raw, "\"board x\"");
    }

    #[test]
    fn ranges_cover_name_and_value() {
        let e = entry("y");
        assert_eq!(e.range(), Range::new(Position::new(0, 0), Position::new(0, 8)));
        assert_eq!(e.value_range, Range::new(Position::new(0, 9), Position::new(0, 10)));
        assert_eq!(e.full_range(), Range::new(Position::new(0, 0), Position::new(0, 10)));
        assert_eq!(e.line_range(), Range::new(Position::new(0, 0), Position::new(1, 0)));
    }

    #[test]
    fn literal_kinds() {
        assert_eq!(entry("y").kind(), EntryKind::Bool);
        assert_eq!(entry("n").kind(), EntryKind::Bool);
        assert_eq!(entry("\"text\"").kind(), EntryKind::String);
        assert_eq!(entry("0x1A").kind(), EntryKind::Hex);
        assert_eq!(entry("128").kind(), EntryKind::Int);
        assert_eq!(entry("m").kind(), EntryKind::Unknown);
        assert_eq!(entry("0xZZ").kind(), EntryKind::Unknown);
    }

    #[test]
    fn values_are_canonical() {
        assert_eq!(entry("0x10").value(), "16");
        assert_eq!(entry("16").value(), "16");
        assert_eq!(entry("\"quoted\"").value(), "quoted");
        assert_eq!(entry("y").value(), "y");
        assert_eq!(entry("0x10").int_value(), Some(0x10));
    }

    #[test]
    fn find_matches_by_name() {
        let (conf, mut docs) = file("CONFIG_A=y\nCONFIG_B=n\nCONFIG_A=n\n");
        assert_eq!(conf.find(&mut docs, "A").len(), 2);
        assert_eq!(conf.find(&mut docs, "C").len(), 0);
    }

    #[test]
    fn remove_action_deletes_the_line() {
        let e = entry("y");
        let action = e.remove("Remove entry");
        let edit = action.edit.expect("edit");
        let changes = edit.changes.expect("changes");
        let edits = changes.get(&e.loc.uri).expect("file edits");
        assert_eq!(edits[0].range, e.line_range());
        assert_eq!(edits[0].new_text, "");
    }

    #[test]
    fn board_defconfig_path() {
        let board = BoardConf::new("nrf52dk", "arm", "/zephyr/boards/arm/nrf52dk");
        let conf = board.conf_file().expect("conf file");
        assert!(conf
            .uri
            .as_str()
            .ends_with("/zephyr/boards/arm/nrf52dk/nrf52dk_defconfig"));
    }
}
