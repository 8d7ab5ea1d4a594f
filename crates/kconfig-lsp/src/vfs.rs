//! In-memory documents and the process-wide document store.
//!
//! Documents mirror editor buffers line by line and apply the incremental
//! changes reported over the protocol. The store owns every open document,
//! materializes unopened files from disk on demand, and lets virtual
//! backends serve schemes other than `file`.

use lsp_types::{Position, Range, Uri};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Version value for content that did not come from the editor.
pub const UNKNOWN_VERSION: i32 = -1;

/// Convert a `file://` URI to a path.
#[cfg(not(windows))]
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    uri.as_str().strip_prefix("file://").map(PathBuf::from)
}

/// Convert a `file://` URI to a path (Windows version).
#[cfg(windows)]
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    uri.as_str()
        .strip_prefix("file://")
        // Handle Windows paths like file:///C:/...
        .map(|p| p.strip_prefix('/').unwrap_or(p))
        .map(PathBuf::from)
}

/// Build a `file://` URI from a path.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    format!("file://{}", path.display()).parse().ok()
}

/// The scheme portion of a URI.
pub fn uri_scheme(uri: &Uri) -> &str {
    uri.as_str().split(':').next().unwrap_or("")
}

/// One in-memory document.
///
/// The line vector is the source of truth; `text()` always ends with a
/// newline, matching how configuration files are written out.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Uri,
    language_id: Option<String>,
    lines: Vec<String>,
    version: i32,
    modified: bool,
    virtual_doc: bool,
}

impl TextDocument {
    /// Create a document with the given content.
    pub fn new(uri: Uri, text: &str, language_id: Option<String>, version: i32) -> Self {
        let virtual_doc = uri_scheme(&uri) != "file";
        let mut doc = Self {
            uri,
            language_id,
            lines: Vec::new(),
            version,
            modified: version != 0,
            virtual_doc,
        };
        doc.set_text(text);
        doc
    }

    /// Read a document from disk.
    pub fn from_disk(uri: Uri) -> std::io::Result<Self> {
        let path = uri_to_path(&uri).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file URI")
        })?;
        let text = std::fs::read_to_string(path)?;
        let mut doc = Self::new(uri, &text, None, UNKNOWN_VERSION);
        doc.modified = false;
        Ok(doc)
    }

    /// The document URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The language id reported by the editor, if the document was opened.
    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    /// The document version; [`UNKNOWN_VERSION`] for server-originated content.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Set the version reported by the editor.
    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    /// Whether the document differs from its last loaded state.
    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Whether the document is backed by something other than a file.
    pub fn is_virtual(&self) -> bool {
        self.virtual_doc
    }

    fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_owned).collect();
    }

    /// The full text, with a trailing newline.
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// The lines of the document.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// A single line, without its newline.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Clamp a column to the line's length plus the newline slot, landing on
    /// a character boundary.
    fn clamp_column(line: &str, character: usize) -> usize {
        let mut col = character.min(line.len() + 1);
        while col <= line.len() && !line.is_char_boundary(col) {
            col -= 1;
        }
        col
    }

    /// Byte offset of a position within [`text`](Self::text), clamped so
    /// out-of-range positions never fail.
    pub fn offset(&self, pos: Position) -> usize {
        let line = pos.line as usize;
        if line >= self.lines.len() {
            return self.text().len();
        }
        let before: usize = self.lines[..line].iter().map(|l| l.len() + 1).sum();
        before + Self::clamp_column(&self.lines[line], pos.character as usize)
    }

    /// Position of a byte offset within [`text`](Self::text).
    pub fn position(&self, offset: usize) -> Position {
        let text = self.text();
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count();
        let character = offset - before.rfind('\n').map_or(0, |i| i + 1);
        Position::new(line as u32, character as u32)
    }

    /// The text covered by `range`, or the whole text.
    ///
    /// Whole-line extraction drags in the line's newline; trim it when the
    /// range does not actually end at the start of a following line.
    pub fn get(&self, range: Option<Range>) -> String {
        let Some(range) = range else {
            return self.text();
        };
        let text = self.text();
        let start = self.offset(range.start);
        let end = self.offset(range.end).max(start);
        let mut out = text[start..end].to_owned();
        if out.ends_with('\n') && range.end.character != 0 && (range.end.line as usize) < self.lines.len()
        {
            out.pop();
        }
        out
    }

    /// The word (alphanumerics and `_`) around a position.
    pub fn word_at(&self, pos: Position) -> Option<String> {
        let line = self.line(pos.line as usize)?;
        let col = Self::clamp_column(line, pos.character as usize).min(line.len());
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let start = line[..col]
            .rfind(|c| !is_word(c))
            .map_or(0, |i| i + line[i..].chars().next().map_or(1, char::len_utf8));
        let end = line[col..]
            .find(|c| !is_word(c))
            .map_or(line.len(), |i| col + i);
        let word = &line[start..end];
        if word.is_empty() {
            None
        } else {
            Some(word.to_owned())
        }
    }

    /// Replace `range` with `text`, or the whole content when `range` is
    /// `None`. An empty buffer ignores the range: there is nothing to splice
    /// into.
    pub fn replace(&mut self, text: &str, range: Option<Range>, version: i32) {
        match range {
            Some(range) if !self.lines.is_empty() => {
                let full = self.text();
                let start = self.offset(range.start);
                let end = self.offset(range.end).max(start);
                let mut next = String::with_capacity(full.len() + text.len());
                next.push_str(&full[..start]);
                next.push_str(text);
                next.push_str(&full[end..]);
                self.set_text(&next);
            }
            _ => self.set_text(text),
        }
        self.version = version;
        self.modified = true;
    }
}

/// A backend serving documents for a non-`file` URI scheme.
pub trait DocProvider: Send + Sync {
    /// Materialize the document for `uri`, if the backend has it.
    fn get(&self, uri: &Uri) -> Option<TextDocument>;
}

/// Process-wide registry of documents, keyed by URI.
#[derive(Default)]
pub struct DocumentStore {
    docs: HashMap<String, TextDocument>,
    providers: HashMap<String, Box<dyn DocProvider>>,
}

impl DocumentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a virtual backend for a URI scheme.
    pub fn register_provider(&mut self, scheme: impl Into<String>, provider: Box<dyn DocProvider>) {
        self.providers.insert(scheme.into(), provider);
    }

    /// Insert an editor-opened document.
    pub fn open(&mut self, doc: TextDocument) {
        self.docs.insert(doc.uri().as_str().to_owned(), doc);
    }

    /// Drop an editor-opened document.
    pub fn close(&mut self, uri: &Uri) {
        self.docs.remove(uri.as_str());
    }

    /// Look up a document.
    ///
    /// A registered provider for the URI's scheme is consulted first, then
    /// the cache; with `create`, an unopened `file` URI is materialized from
    /// disk and cached. A resource that does not exist yields `None`, never
    /// an error: evaluation probes for optional files this way and must not
    /// fabricate empty buffers.
    pub fn get(&mut self, uri: &Uri, create: bool) -> Option<&TextDocument> {
        let key = uri.as_str().to_owned();
        if !self.docs.contains_key(&key) {
            if let Some(provider) = self.providers.get(uri_scheme(uri)) {
                let doc = provider.get(uri)?;
                self.docs.insert(key.clone(), doc);
            } else if create {
                let doc = TextDocument::from_disk(uri.clone()).ok()?;
                self.docs.insert(key.clone(), doc);
            } else {
                return None;
            }
        }
        self.docs.get(&key)
    }

    /// Mutable access to an already-known document.
    pub fn get_mut(&mut self, uri: &Uri) -> Option<&mut TextDocument> {
        self.docs.get_mut(uri.as_str())
    }

    /// Whether the store currently holds `uri`.
    pub fn contains(&self, uri: &Uri) -> bool {
        self.docs.contains_key(uri.as_str())
    }
}

/// [`FileSource`](kconfig_graph::FileSource) adapter exposing the store's
/// live buffers to the evaluation engine without creating new entries.
pub struct StoreSource<'a>(pub &'a parking_lot::RwLock<DocumentStore>);

impl kconfig_graph::FileSource for StoreSource<'_> {
    fn read(&self, path: &Path) -> Option<String> {
        let uri = path_to_uri(path)?;
        self.0.write().get(&uri, false).map(TextDocument::text)
    }
}
