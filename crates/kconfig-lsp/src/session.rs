//! Build sessions and the router that picks one for a request.
//!
//! A session is one independent evaluation of the Kconfig tree for one
//! build directory: its environment, its override files, a version counter
//! stamped into node ids, and the diagnostic buckets filled by parsing and
//! linting. Sessions never share evaluation state.

use crate::conf::{BoardConf, ConfEntry, ConfFile, LintDiagnostic};
use crate::diag;
use crate::ext::{MenuItem, MenuSnapshot, RequestError, SymbolItem};
use crate::lint;
use crate::node_id;
use crate::vfs::{path_to_uri, DocumentStore, StoreSource, TextDocument};
use kconfig_graph::{Engine, EngineWarning, EvalError, Evaluation, NodeId, NodeItem, SymbolInfo, WarningKind};
use lsp_types::{Diagnostic, Location, Position, Range, Uri};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

const CONFIG_PREFIX: &str = "CONFIG_";

/// A session could not be created from the given parameters.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A required environment variable is missing.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

fn line_start(line: u32) -> Range {
    let pos = Position::new(line.saturating_sub(1), 0);
    Range::new(pos, pos)
}

/// One build's evaluation context.
pub struct Session {
    uri: Uri,
    root: PathBuf,
    env: BTreeMap<String, String>,
    /// Override files, in application order.
    pub conf_files: Vec<ConfFile>,
    board: BoardConf,
    board_file: Option<ConfFile>,
    version: u64,
    evaluation: Option<Box<dyn Evaluation>>,
    valid: bool,
    /// Node id of the menu the client is currently showing.
    pub menu: Option<String>,
    modified: Vec<String>,
    /// Diagnostics not attributable to any file.
    pub cmd_diags: Vec<Diagnostic>,
    /// Evaluation diagnostics, keyed by the URI of the definition file.
    pub eval_diags: HashMap<String, Vec<Diagnostic>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("uri", &self.uri)
            .field("root", &self.root)
            .field("env", &self.env)
            .field("conf_files", &self.conf_files)
            .field("board", &self.board)
            .field("board_file", &self.board_file)
            .field("version", &self.version)
            .field("evaluation", &self.evaluation.as_ref().map(|_| "..."))
            .field("valid", &self.valid)
            .field("menu", &self.menu)
            .field("modified", &self.modified)
            .field("cmd_diags", &self.cmd_diags)
            .field("eval_diags", &self.eval_diags)
            .finish()
    }
}

impl Session {
    /// Create a session for a build directory.
    ///
    /// `env` must name the board via `BOARD`, `ARCH` and `BOARD_DIR`; the
    /// board's defconfig becomes the replace-mode base file.
    pub fn new(
        uri: Uri,
        root: impl Into<PathBuf>,
        conf_uris: Vec<Uri>,
        env: HashMap<String, String>,
    ) -> Result<Self, SessionError> {
        let require = |key: &'static str| -> Result<String, SessionError> {
            env.get(key).cloned().ok_or(SessionError::MissingEnv(key))
        };
        let board = BoardConf::new(require("BOARD")?, require("ARCH")?, require("BOARD_DIR")?);
        let board_file = board.conf_file();
        Ok(Self {
            uri,
            root: root.into(),
            env: env.into_iter().collect(),
            conf_files: conf_uris.into_iter().map(ConfFile::new).collect(),
            board,
            board_file,
            version: 0,
            evaluation: None,
            valid: false,
            menu: None,
            modified: Vec::new(),
            cmd_diags: Vec::new(),
            eval_diags: HashMap::new(),
        })
    }

    /// The build directory URI, doubling as the session id.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The board this session builds for.
    pub fn board(&self) -> &BoardConf {
        &self.board
    }

    /// The board's defconfig file, when its path forms a URI.
    pub fn board_file(&self) -> Option<&ConfFile> {
        self.board_file.as_ref()
    }

    /// The current evaluation generation. Bumped by every [`parse`], also
    /// failing ones, so node ids from before the reparse reliably desync.
    ///
    /// [`parse`]: Session::parse
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the last evaluation succeeded and is still current.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The current evaluation, if any.
    pub fn evaluation(&self) -> Option<&dyn Evaluation> {
        self.evaluation.as_deref()
    }

    /// Mark the evaluation stale without touching the version or any cached
    /// state. The next request needing a valid session reparses lazily.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Drop all diagnostics, in every bucket.
    pub fn clear_diags(&mut self) {
        self.cmd_diags.clear();
        self.eval_diags.clear();
        for file in &mut self.conf_files {
            file.diags.clear();
        }
        if let Some(board) = &mut self.board_file {
            board.diags.clear();
        }
    }

    /// Evaluate the Kconfig tree from scratch.
    ///
    /// Evaluation failures become diagnostics (at the reported definition
    /// location when known, command-level otherwise); they never propagate.
    /// The version increments regardless of the outcome.
    pub fn parse(&mut self, engine: &dyn Engine, docs: &RwLock<DocumentStore>) {
        self.menu = None;
        self.modified.clear();
        self.clear_diags();
        self.valid = false;

        let result = {
            let source = StoreSource(docs);
            engine.evaluate(&self.root, &self.env, &source)
        };
        match result {
            Ok(eval) => {
                self.valid = eval.symbol_count() > 0;
                self.evaluation = Some(eval);
                tracing::debug!(uri = %self.uri.as_str(), "parsed kconfig tree");
            }
            Err(err) => {
                self.evaluation = None;
                self.record_eval_error(&err);
                tracing::debug!(uri = %self.uri.as_str(), error = %err, "kconfig parse failed");
            }
        }
        self.version += 1;
    }

    fn record_eval_error(&mut self, err: &EvalError) {
        let located = err
            .location
            .as_ref()
            .and_then(|(file, line)| path_to_uri(file).map(|uri| (uri, *line)));
        match located {
            Some((uri, line)) => {
                let range = Range::new(
                    Position::new(line.saturating_sub(1), 0),
                    Position::new(line.saturating_sub(1), 99_999),
                );
                self.eval_diags
                    .entry(uri.as_str().to_owned())
                    .or_default()
                    .push(diag::error(err.message.clone(), range));
            }
            None => self
                .cmd_diags
                .push(diag::error(err.message.clone(), Range::default())),
        }
    }

    /// Apply the board defconfig (replacing all prior user values) and the
    /// override files (additively, in order), then lint and redistribute
    /// engine warnings. Requires a prior successful [`parse`](Session::parse).
    ///
    /// Any unexpected failure becomes a single command-level diagnostic.
    pub fn load_config(&mut self, docs: &RwLock<DocumentStore>) {
        if !self.valid {
            return;
        }
        match self.try_load(docs) {
            Ok(warnings) => self.distribute_warnings(warnings),
            Err(message) => self.cmd_diags.push(diag::error(
                format!("Kconfig tree parse failed: {message}"),
                Range::default(),
            )),
        }
    }

    fn try_load(&mut self, docs: &RwLock<DocumentStore>) -> Result<Vec<EngineWarning>, String> {
        let eval = self
            .evaluation
            .as_mut()
            .ok_or_else(|| "no evaluation".to_owned())?;

        let mut warnings = Vec::new();
        let mut apply = |uri: &Uri, replace: bool| -> Result<Vec<EngineWarning>, String> {
            let content = docs.write().get(uri, true).map(TextDocument::text);
            match content {
                Some(text) => Ok(eval.apply_config(&text, replace)),
                None => Err(format!("failed to read {}", uri.as_str())),
            }
        };
        if let Some(board) = &self.board_file {
            warnings.extend(apply(&board.uri, true)?);
        }
        for file in &self.conf_files {
            warnings.extend(apply(&file.uri, false)?);
        }

        let mut docs_guard = docs.write();
        let mut all_entries: Vec<ConfEntry> = Vec::new();
        if let Some(board) = &self.board_file {
            all_entries.extend(board.entries(&mut docs_guard));
        }
        for file in &self.conf_files {
            all_entries.extend(file.entries(&mut docs_guard));
        }
        let Some(eval) = self.evaluation.as_deref() else {
            return Err("no evaluation".to_owned());
        };
        lint::run(&mut docs_guard, eval, &mut self.conf_files, &all_entries);
        Ok(warnings)
    }

    fn distribute_warnings(&mut self, warnings: Vec<EngineWarning>) {
        for warning in warnings {
            if warning.kind == WarningKind::DuplicateAssignment {
                // Covered by the duplicate-assignment lint check, with
                // better ranges and actions.
                continue;
            }
            let range = line_start(warning.line.unwrap_or(1));
            let diagnostic = diag::warning(warning.message, range);
            let target = warning
                .filename
                .as_deref()
                .and_then(path_to_uri)
                .and_then(|uri| self.conf_file_mut(&uri).map(|_| uri));
            match target {
                Some(uri) => {
                    if let Some(file) = self.conf_file_mut(&uri) {
                        file.diags.push(LintDiagnostic::new(diagnostic));
                    }
                }
                None => self.cmd_diags.push(diagnostic),
            }
        }
    }

    /// Clear stale diagnostics, reparse if needed, and reload the
    /// configuration files.
    pub fn refresh(&mut self, engine: &dyn Engine, docs: &RwLock<DocumentStore>) {
        self.clear_diags();
        if !self.valid {
            tracing::debug!(uri = %self.uri.as_str(), "reparsing invalid session");
            self.parse(engine, docs);
        }
        self.load_config(docs);
    }

    /// Whether `uri` is one of this session's conf files (which must exist)
    /// or its board defconfig.
    pub fn has_file(&self, docs: &RwLock<DocumentStore>, uri: &Uri) -> bool {
        self.conf_files
            .iter()
            .any(|f| f.uri == *uri && docs.write().get(&f.uri, true).is_some())
            || self.board_file.as_ref().is_some_and(|b| b.uri == *uri)
    }

    /// The conf file (board defconfig included) with the given URI.
    pub fn conf_file(&self, uri: &Uri) -> Option<&ConfFile> {
        self.board_file
            .iter()
            .chain(self.conf_files.iter())
            .find(|f| f.uri == *uri)
    }

    fn conf_file_mut(&mut self, uri: &Uri) -> Option<&mut ConfFile> {
        self.board_file
            .iter_mut()
            .chain(self.conf_files.iter_mut())
            .find(|f| f.uri == *uri)
    }

    /// Symbols matching a name prefix; a leading `CONFIG_` is stripped from
    /// the filter, and an empty filter matches everything.
    pub fn symbols(&self, filter: Option<&str>) -> Vec<SymbolInfo> {
        let Some(eval) = self.evaluation.as_deref() else {
            return Vec::new();
        };
        let filter = filter.map(|f| f.strip_prefix(CONFIG_PREFIX).unwrap_or(f));
        eval.symbols()
            .into_iter()
            .filter(|s| filter.map_or(true, |f| f.is_empty() || s.name.starts_with(f)))
            .collect()
    }

    /// Look up one symbol by name (without the `CONFIG_` prefix).
    pub fn symbol(&self, name: &str) -> Option<SymbolInfo> {
        self.evaluation.as_deref()?.symbol(name)
    }

    /// The symbol referenced by the word at a position in a conf file.
    pub fn symbol_at(
        &self,
        docs: &RwLock<DocumentStore>,
        uri: &Uri,
        pos: Position,
    ) -> Option<SymbolInfo> {
        let word = docs.write().get(uri, true)?.word_at(pos)?;
        let name = word.strip_prefix(CONFIG_PREFIX)?;
        self.symbol(name)
    }

    /// Search results for [`kconfig/search`](crate::ext::Search).
    pub fn symbol_search(&self, query: &str) -> Vec<SymbolItem> {
        self.symbols(Some(query))
            .into_iter()
            .map(|sym| SymbolItem {
                visible: sym.visible,
                symbol_type: sym.symbol_type.to_string(),
                help: sym.help().unwrap_or("").to_owned(),
                prompt: sym.prompt().map(str::to_owned),
                name: sym.name,
            })
            .collect()
    }

    /// Set a symbol value without touching any conf file.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        let Some(eval) = self.evaluation.as_mut() else {
            return Err(RequestError::UnknownSymbol(name.to_owned()));
        };
        if eval.symbol(name).is_none() {
            return Err(RequestError::UnknownSymbol(name.to_owned()));
        }
        let accepted = eval.set_value(name, value);
        if accepted && !self.modified.iter().any(|n| n == name) {
            self.modified.push(name.to_owned());
        }
        Ok(())
    }

    /// Revert a previous [`set`](Session::set).
    pub fn unset(&mut self, name: &str) {
        if let Some(eval) = self.evaluation.as_mut() {
            eval.unset_value(name);
        }
    }

    /// Resolve a node id against the current evaluation.
    pub fn find_node(&self, token: &str) -> Result<NodeId, RequestError> {
        let eval = self.evaluation.as_deref().ok_or(RequestError::ParsingFailed)?;
        node_id::decode(token, self.version, eval.tree()).map_err(Into::into)
    }

    /// The rendered snapshot of the menu level identified by `token`.
    pub fn menu_snapshot(&self, token: &str) -> Result<MenuSnapshot, RequestError> {
        let eval = self.evaluation.as_deref().ok_or(RequestError::ParsingFailed)?;
        let id = self.find_node(token)?;
        let tree = eval.tree();
        let name = tree.get(id).map(kconfig_graph::MenuNode::name).unwrap_or_default();
        let items = tree
            .listing(id)
            .into_iter()
            .filter_map(|child| self.menu_item(eval, child))
            .collect();
        Ok(MenuSnapshot {
            name,
            id: token.to_owned(),
            items,
        })
    }

    fn menu_item(&self, eval: &dyn Evaluation, id: NodeId) -> Option<MenuItem> {
        let tree = eval.tree();
        let node = tree.get(id)?;
        let mut item = MenuItem {
            visible: tree.is_visible(id),
            loc: Location::new(path_to_uri(&node.file)?, line_start(node.line)),
            is_menu: node.is_menuconfig,
            depth: tree.suboption_depth(id),
            id: node_id::encode(self.version, tree, id),
            prompt: node.prompt.as_ref().map(|(text, _)| text.clone()),
            help: node.help.clone(),
            symbol_type: None,
            val: None,
            name: None,
            options: None,
        };
        if let NodeItem::Symbol { name, .. } = &node.item {
            if let Some(sym) = eval.symbol(name) {
                item.symbol_type = Some(sym.symbol_type.to_string());
                item.val = Some(sym.value.clone());
                if !sym.assignable.is_empty() {
                    item.options = Some(
                        sym.assignable
                            .iter()
                            .map(|t| t.as_str().to_owned())
                            .collect(),
                    );
                }
                item.name = Some(sym.name);
            }
        }
        Some(item)
    }
}

/// All registered sessions plus the routing state.
///
/// Routing prefers the active (main) session when it owns the file, then
/// sticks to the last-used session to avoid flapping between sessions that
/// both claim a shared file, then falls back to a scan in registration
/// order. An unclaimed file resolves to no session, which is not an error.
#[derive(Default)]
pub struct SessionSet {
    sessions: Vec<Session>,
    main_uri: Option<Uri>,
    last_used: Option<Uri>,
}

impl SessionSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any previous one with the same id.
    pub fn insert(&mut self, session: Session) {
        self.sessions.retain(|s| s.uri() != session.uri());
        self.sessions.push(session);
    }

    /// Remove a session by id.
    pub fn remove(&mut self, uri: &Uri) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.uri() == uri)?;
        Some(self.sessions.remove(index))
    }

    /// Look up a session by its id string.
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.uri().as_str() == id)
    }

    /// Mutable lookup by id string.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.uri().as_str() == id)
    }

    /// All sessions.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    /// The active build, if one was marked.
    pub fn main_uri(&self) -> Option<&Uri> {
        self.main_uri.as_ref()
    }

    /// Mark the active build and remember it as last used.
    pub fn set_main(&mut self, uri: Uri) {
        self.last_used = Some(uri.clone());
        self.main_uri = Some(uri);
    }

    /// The session that should answer a request about `uri`.
    pub fn resolve(&mut self, docs: &RwLock<DocumentStore>, uri: &Uri) -> Option<&mut Session> {
        if let Some(main) = self.main_uri.clone() {
            let claims = self
                .get(main.as_str())
                .is_some_and(|s| s.has_file(docs, uri));
            if claims {
                self.last_used = Some(main.clone());
                return self.get_mut(main.as_str());
            }
        }
        if let Some(last) = self.last_used.clone() {
            if self.get(last.as_str()).is_some_and(|s| s.has_file(docs, uri)) {
                return self.get_mut(last.as_str());
            }
        }
        let index = self.sessions.iter().position(|s| s.has_file(docs, uri))?;
        self.last_used = Some(self.sessions[index].uri().clone());
        Some(&mut self.sessions[index])
    }
}
