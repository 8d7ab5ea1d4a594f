//! Main event loop for the language server.
//!
//! One message is read from the transport and fully handled (including any
//! nested evaluation and lint pass) before the next one; all sessions and
//! the document store are only ever touched from this loop, which is what
//! makes the shared mutable state safe and guarantees that no two
//! evaluations of the same session run concurrently. Long evaluations block
//! the loop; no timeout is imposed here.
//!
//! `$/cancelRequest` is accepted and deliberately has no effect: in-flight
//! work is never aborted, and clients must not rely on cancellation
//! reaching an evaluation mid-run.

use crate::ext::{self, RequestError};
use crate::handlers::code_actions::handle_code_actions;
use crate::handlers::completion::handle_completion;
use crate::handlers::definition::handle_definition;
use crate::handlers::hover::handle_hover;
use crate::handlers::symbols::handle_document_symbols;
use crate::session::{Session, SessionSet};
use crate::vfs::{path_to_uri, DocumentStore, TextDocument};
use crossbeam_channel::{Receiver, Sender};
use kconfig_graph::Engine;
use lsp_types::notification::{
    DidChangeTextDocument, DidChangeWatchedFiles, DidCloseTextDocument, DidOpenTextDocument,
    Notification, PublishDiagnostics,
};
use lsp_types::request::{
    CodeActionRequest, Completion, DocumentSymbolRequest, GotoDefinition, HoverRequest, Request,
    Shutdown,
};
use lsp_types::{
    CodeActionParams, CompletionParams, DocumentSymbolParams, GotoDefinitionParams, HoverParams,
    PublishDiagnosticsParams, Uri,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// The virtual document command-level diagnostics are published against.
pub fn command_line_uri() -> Uri {
    "kconfig://command-line".parse().expect("static uri")
}

/// A failed request, carrying the wire error code.
struct HandlerError {
    code: i32,
    message: String,
}

impl HandlerError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: lsp_server::ErrorCode::InvalidParams as i32,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            code: lsp_server::ErrorCode::InternalError as i32,
            message: message.into(),
        }
    }
}

impl From<RequestError> for HandlerError {
    fn from(err: RequestError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

type HandlerResult = Result<serde_json::Value, HandlerError>;

fn to_result<T: serde::Serialize>(value: T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| HandlerError::internal(e.to_string()))
}

/// State owned by the main loop: the document store, every session, the
/// evaluation engine, and the outgoing message channel.
///
/// This is created empty at startup, populated by `didOpen`/`addBuild`
/// traffic, and torn down with the process; handlers receive it explicitly.
pub struct GlobalState {
    docs: Arc<RwLock<DocumentStore>>,
    sessions: SessionSet,
    engine: Arc<dyn Engine>,
    sender: Sender<lsp_server::Message>,
    shutdown_requested: bool,
}

impl GlobalState {
    /// Fresh state around an engine and an outgoing channel.
    pub fn new(sender: Sender<lsp_server::Message>, engine: Arc<dyn Engine>) -> Self {
        Self {
            docs: Arc::new(RwLock::new(DocumentStore::new())),
            sessions: SessionSet::new(),
            engine,
            sender,
            shutdown_requested: false,
        }
    }

    /// Handle one message from the transport.
    pub fn handle_message(&mut self, msg: lsp_server::Message) {
        match msg {
            lsp_server::Message::Request(req) => self.handle_request(req),
            lsp_server::Message::Notification(notif) => self.handle_notification(notif),
            lsp_server::Message::Response(_) => {
                // Responses to server-initiated requests (capability
                // registration) carry nothing we act on.
            }
        }
    }

    fn handle_request(&mut self, req: lsp_server::Request) {
        let id = req.id.clone();
        let result = match req.method.as_str() {
            Shutdown::METHOD => {
                self.shutdown_requested = true;
                Ok(serde_json::Value::Null)
            }
            Completion::METHOD => self.handle_completion_request(req),
            GotoDefinition::METHOD => self.handle_definition_request(req),
            HoverRequest::METHOD => self.handle_hover_request(req),
            DocumentSymbolRequest::METHOD => self.handle_document_symbols_request(req),
            CodeActionRequest::METHOD => self.handle_code_action_request(req),
            ext::AddBuild::METHOD => self.handle_add_build(req),
            ext::RemoveBuild::METHOD => self.handle_remove_build(req),
            ext::SetMainBuild::METHOD => self.handle_set_main_build(req),
            ext::Search::METHOD => self.handle_search(req),
            ext::SetMenu::METHOD => self.handle_set_menu(req),
            ext::SetVal::METHOD => self.handle_set_val(req),
            method => {
                tracing::warn!(method, "unhandled request");
                Err(HandlerError {
                    code: lsp_server::ErrorCode::MethodNotFound as i32,
                    message: format!("Unknown method \"{method}\""),
                })
            }
        };

        let response = match result {
            Ok(value) => lsp_server::Response::new_ok(id, value),
            Err(err) => lsp_server::Response::new_err(id, err.code, err.message),
        };
        self.send(lsp_server::Message::Response(response));
    }

    fn parse_params<P: DeserializeOwned>(req: lsp_server::Request) -> Result<P, HandlerError> {
        serde_json::from_value(req.params).map_err(|e| HandlerError::invalid_params(e.to_string()))
    }

    /// Reparse and relint one session, then publish its diagnostics.
    fn refresh_session(&mut self, id: &str) {
        let engine = Arc::clone(&self.engine);
        let docs = Arc::clone(&self.docs);
        let sender = self.sender.clone();
        if let Some(session) = self.sessions.get_mut(id) {
            session.refresh(engine.as_ref(), &docs);
            publish_diagnostics(&sender, session);
        }
    }

    /// The session owning `uri`, refreshed (and its diagnostics published)
    /// when it is not currently valid.
    fn ensure_routed(&mut self, uri: &Uri) -> Option<&mut Session> {
        let key = self
            .sessions
            .resolve(&self.docs, uri)?
            .uri()
            .as_str()
            .to_owned();
        if self.sessions.get(&key).is_some_and(|s| !s.is_valid()) {
            self.refresh_session(&key);
        }
        self.sessions.get_mut(&key)
    }

    fn handle_completion_request(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: CompletionParams = Self::parse_params(req)?;
        let uri = params.text_document_position.text_document.uri.clone();
        let docs = Arc::clone(&self.docs);
        let Some(session) = self.ensure_routed(&uri) else {
            tracing::debug!(uri = uri.as_str(), "no session for completion");
            return Ok(serde_json::Value::Null);
        };
        to_result(handle_completion(&params, session, &docs))
    }

    fn handle_definition_request(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: GotoDefinitionParams = Self::parse_params(req)?;
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .clone();
        let docs = Arc::clone(&self.docs);
        let Some(session) = self.ensure_routed(&uri) else {
            return Ok(serde_json::Value::Null);
        };
        to_result(handle_definition(&params, session, &docs))
    }

    fn handle_hover_request(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: HoverParams = Self::parse_params(req)?;
        let uri = params
            .text_document_position_params
            .text_document
            .uri
            .clone();
        let docs = Arc::clone(&self.docs);
        let Some(session) = self.ensure_routed(&uri) else {
            return Ok(serde_json::Value::Null);
        };
        to_result(handle_hover(&params, session, &docs))
    }

    fn handle_document_symbols_request(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: DocumentSymbolParams = Self::parse_params(req)?;
        let uri = params.text_document.uri.clone();
        let docs = Arc::clone(&self.docs);
        // Symbols read whatever evaluation is current; no refresh.
        let Some(session) = self.sessions.resolve(&docs, &uri) else {
            return Ok(serde_json::Value::Null);
        };
        to_result(handle_document_symbols(&params, session, &docs))
    }

    fn handle_code_action_request(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: CodeActionParams = Self::parse_params(req)?;
        let uri = params.text_document.uri.clone();
        let Some(session) = self.ensure_routed(&uri) else {
            return Ok(serde_json::Value::Null);
        };
        to_result(handle_code_actions(&params, session))
    }

    fn handle_add_build(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::AddBuildParams = Self::parse_params(req)?;
        let mut conf_uris = Vec::with_capacity(params.conf.len());
        for path in &params.conf {
            let uri = path_to_uri(Path::new(path))
                .ok_or_else(|| HandlerError::invalid_params(format!("bad conf path {path}")))?;
            conf_uris.push(uri);
        }
        let session = Session::new(params.uri.clone(), params.root, conf_uris, params.env)
            .map_err(|e| HandlerError::invalid_params(e.to_string()))?;
        tracing::info!(uri = params.uri.as_str(), "created build context");
        self.sessions.insert(session);

        // The active build is parsed right away.
        if self.sessions.main_uri() == Some(&params.uri) {
            self.sessions.set_main(params.uri.clone());
            self.refresh_session(params.uri.as_str());
        }
        to_result(ext::AddBuildResult {
            id: params.uri.as_str().to_owned(),
        })
    }

    fn handle_remove_build(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::BuildParams = Self::parse_params(req)?;
        if self.sessions.remove(&params.uri).is_some() {
            tracing::info!(uri = params.uri.as_str(), "deleted build context");
        }
        Ok(serde_json::Value::Null)
    }

    fn handle_set_main_build(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::BuildParams = Self::parse_params(req)?;
        self.sessions.set_main(params.uri.clone());
        if self.sessions.get(params.uri.as_str()).is_some() {
            tracing::info!(uri = params.uri.as_str(), "main build set");
            self.refresh_session(params.uri.as_str());
        }
        Ok(serde_json::Value::Null)
    }

    fn handle_search(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::SearchParams = Self::parse_params(req)?;
        let session = self
            .sessions
            .get(&params.ctx)
            .ok_or_else(|| RequestError::UnknownContext(params.ctx.clone()))?;
        to_result(ext::SearchResult {
            symbols: session.symbol_search(&params.query),
            ctx: params.ctx,
            query: params.query,
        })
    }

    fn handle_set_menu(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::SetMenuParams = Self::parse_params(req)?;
        let session = self
            .sessions
            .get_mut(&params.ctx)
            .ok_or_else(|| RequestError::UnknownContext(params.ctx.clone()))?;
        session.menu = Some(params.id.clone());
        let snapshot = session.menu_snapshot(&params.id).map_err(HandlerError::from)?;
        to_result(snapshot)
    }

    fn handle_set_val(&mut self, req: lsp_server::Request) -> HandlerResult {
        let params: ext::SetValParams = Self::parse_params(req)?;
        let session = self
            .sessions
            .get_mut(&params.ctx)
            .ok_or_else(|| RequestError::UnknownContext(params.ctx.clone()))?;
        match &params.val {
            Some(val) => session.set(&params.name, val).map_err(HandlerError::from)?,
            None => session.unset(&params.name),
        }
        Ok(serde_json::Value::Null)
    }

    fn handle_notification(&mut self, notif: lsp_server::Notification) {
        match notif.method.as_str() {
            DidOpenTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidOpenTextDocumentParams>(notif.params)
                {
                    self.on_did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeTextDocumentParams>(notif.params)
                {
                    self.on_did_change(params);
                }
            }
            DidCloseTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidCloseTextDocumentParams>(notif.params)
                {
                    self.on_did_close(&params);
                }
            }
            DidChangeWatchedFiles::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeWatchedFilesParams>(notif.params)
                {
                    self.on_did_change_watched_files(params);
                }
            }
            "initialized" => {
                tracing::info!("client initialized");
                self.register_file_watchers();
            }
            "exit" => {
                tracing::info!("exit notification received");
                std::process::exit(i32::from(!self.shutdown_requested));
            }
            // Accepted with no effect; in-flight work is never aborted.
            "$/cancelRequest" => {}
            "$/setTrace" | "$/progress" => {}
            method => {
                tracing::debug!(method, "unhandled notification");
            }
        }
    }

    fn on_did_open(&mut self, params: lsp_types::DidOpenTextDocumentParams) {
        let doc = params.text_document;
        tracing::info!(uri = doc.uri.as_str(), "document opened");
        self.docs.write().open(TextDocument::new(
            doc.uri,
            &doc.text,
            Some(doc.language_id),
            doc.version,
        ));
    }

    fn on_did_change(&mut self, params: lsp_types::DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut docs = self.docs.write();
            let Some(doc) = docs.get_mut(&uri) else {
                return;
            };
            for change in params.content_changes {
                doc.replace(&change.text, change.range, params.text_document.version);
            }
        }
        tracing::debug!(uri = uri.as_str(), "document changed");

        // Route the change to the owning session and re-lint it.
        let key = self
            .sessions
            .resolve(&self.docs, &uri)
            .map(|s| s.uri().as_str().to_owned());
        if let Some(key) = key {
            self.refresh_session(&key);
        }
    }

    fn on_did_close(&mut self, params: &lsp_types::DidCloseTextDocumentParams) {
        tracing::info!(uri = params.text_document.uri.as_str(), "document closed");
        self.docs.write().close(&params.text_document.uri);
    }

    fn on_did_change_watched_files(&mut self, params: lsp_types::DidChangeWatchedFilesParams) {
        for change in params.changes {
            let basename = change
                .uri
                .as_str()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_owned();
            if basename.starts_with("Kconfig") {
                // A definition file changed; every tree may depend on it.
                for session in self.sessions.iter_mut() {
                    session.invalidate();
                }
                tracing::info!(uri = change.uri.as_str(), "invalidated all contexts");
            } else if basename == "edt.pickle" {
                // The devicetree snapshot of one build changed; only that
                // build's context is stale.
                let build = change
                    .uri
                    .as_str()
                    .strip_suffix("/zephyr/edt.pickle")
                    .unwrap_or_default()
                    .to_owned();
                if let Some(session) = self.sessions.get_mut(&build) {
                    session.invalidate();
                    tracing::info!(build, "invalidated context after devicetree change");
                }
            }
        }
    }

    fn register_file_watchers(&self) {
        let watchers = vec![
            lsp_types::FileSystemWatcher {
                glob_pattern: lsp_types::GlobPattern::String("**/Kconfig*".to_owned()),
                kind: Some(lsp_types::WatchKind::all()),
            },
            lsp_types::FileSystemWatcher {
                glob_pattern: lsp_types::GlobPattern::String("**/edt.pickle".to_owned()),
                kind: Some(lsp_types::WatchKind::all()),
            },
        ];
        let registration = lsp_types::Registration {
            id: "kconfig-file-watchers".to_owned(),
            method: DidChangeWatchedFiles::METHOD.to_owned(),
            register_options: serde_json::to_value(
                lsp_types::DidChangeWatchedFilesRegistrationOptions { watchers },
            )
            .ok(),
        };
        let request = lsp_server::Request::new(
            lsp_server::RequestId::from("register-file-watchers".to_owned()),
            "client/registerCapability".to_owned(),
            lsp_types::RegistrationParams {
                registrations: vec![registration],
            },
        );
        self.send(lsp_server::Message::Request(request));
    }

    fn send(&self, msg: lsp_server::Message) {
        if let Err(err) = self.sender.send(msg) {
            tracing::error!(error = %err, "failed to send message");
        }
    }
}

/// Publish every diagnostic bucket of a session: per conf file (board
/// defconfig included), per evaluation file, and the command-level bucket
/// against the virtual command-line document.
fn publish_diagnostics(sender: &Sender<lsp_server::Message>, session: &Session) {
    let mut publish = |uri: Uri, diagnostics: Vec<lsp_types::Diagnostic>| {
        let params = PublishDiagnosticsParams {
            uri,
            diagnostics,
            version: None,
        };
        let notif = lsp_server::Notification::new(PublishDiagnostics::METHOD.to_owned(), params);
        if let Err(err) = sender.send(lsp_server::Message::Notification(notif)) {
            tracing::error!(error = %err, "failed to publish diagnostics");
        }
    };

    for file in session.board_file().into_iter().chain(&session.conf_files) {
        publish(
            file.uri.clone(),
            file.diags.iter().map(|d| d.diagnostic.clone()).collect(),
        );
    }
    publish(command_line_uri(), session.cmd_diags.clone());
    for (uri, diags) in &session.eval_diags {
        if let Ok(uri) = uri.parse() {
            publish(uri, diags.clone());
        }
    }
}

/// Run the main event loop until the transport closes.
pub fn run_main_loop(
    receiver: Receiver<lsp_server::Message>,
    sender: Sender<lsp_server::Message>,
    engine: Arc<dyn Engine>,
) {
    let mut state = GlobalState::new(sender, engine);
    tracing::info!("main loop started");
    for msg in receiver {
        state.handle_message(msg);
    }
    tracing::info!("main loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kconfig_graph::fixture::{FixtureEngine, GraphSpec, SymbolSpec};
    use lsp_types::{DiagnosticSeverity, Position, Range};
    use serde_json::json;

    const BUILD: &str = "file:///ws/app/build";
    const CONF: &str = "/ws/app/prj.conf";
    const CONF_URI: &str = "file:///ws/app/prj.conf";
    const BOARD_CONF_URI: &str = "file:///boards/arm/nrf52dk/nrf52dk_defconfig";

    fn graph() -> GraphSpec {
        GraphSpec::new()
            .symbol(SymbolSpec::bool("BAR").prompt("Bar support"))
            .symbol(SymbolSpec::bool("FOO").prompt("Foo support").depends_on("BAR"))
    }

    fn state() -> (GlobalState, Receiver<lsp_server::Message>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let state = GlobalState::new(sender, Arc::new(FixtureEngine::new(graph())));
        (state, receiver)
    }

    fn open(state: &mut GlobalState, uri: &str, text: &str) {
        state.handle_message(lsp_server::Message::Notification(
            lsp_server::Notification::new(
                "textDocument/didOpen".to_owned(),
                json!({
                    "textDocument": {
                        "uri": uri, "languageId": "properties", "version": 1, "text": text,
                    }
                }),
            ),
        ));
    }

    fn request(state: &mut GlobalState, id: i32, method: &str, params: serde_json::Value) {
        state.handle_message(lsp_server::Message::Request(lsp_server::Request::new(
            id.into(),
            method.to_owned(),
            params,
        )));
    }

    fn add_build(state: &mut GlobalState) {
        request(
            state,
            1,
            "kconfig/addBuild",
            json!({
                "uri": BUILD,
                "root": "/ws/app/Kconfig",
                "conf": [CONF],
                "env": {"BOARD": "nrf52dk", "ARCH": "arm", "BOARD_DIR": "/boards/arm/nrf52dk"},
            }),
        );
    }

    fn response_for(
        receiver: &Receiver<lsp_server::Message>,
        id: i32,
    ) -> lsp_server::Response {
        receiver
            .try_iter()
            .find_map(|msg| match msg {
                lsp_server::Message::Response(resp) if resp.id == id.into() => Some(resp),
                _ => None,
            })
            .expect("response")
    }

    fn published(
        receiver: &Receiver<lsp_server::Message>,
    ) -> Vec<PublishDiagnosticsParams> {
        receiver
            .try_iter()
            .filter_map(|msg| match msg {
                lsp_server::Message::Notification(n)
                    if n.method == PublishDiagnostics::METHOD =>
                {
                    serde_json::from_value(n.params).ok()
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn set_main_build_refreshes_and_publishes() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "CONFIG_BAR=y\n");
        open(&mut state, CONF_URI, "CONFIG_FOO=y\n");
        add_build(&mut state);
        let resp = response_for(&receiver, 1);
        assert_eq!(resp.result.expect("result")["id"], BUILD);

        request(&mut state, 2, "kconfig/setMainBuild", json!({"uri": BUILD}));
        assert!(response_for(&receiver, 2).error.is_none());
        let published = published(&receiver);
        // Board file, prj.conf, and the command-line bucket at minimum.
        assert!(published.iter().any(|p| p.uri.as_str() == CONF_URI));
        assert!(published.iter().any(|p| p.uri.as_str() == BOARD_CONF_URI));
        assert!(published
            .iter()
            .any(|p| p.uri.as_str() == command_line_uri().as_str()));
        // BAR=y in the board file satisfies FOO's dependency: no findings.
        let conf = published.iter().find(|p| p.uri.as_str() == CONF_URI).unwrap();
        assert!(conf.diagnostics.is_empty());
    }

    #[test]
    fn did_change_relints_the_owning_session() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "");
        open(&mut state, CONF_URI, "CONFIG_FOO=n\n");
        add_build(&mut state);
        request(&mut state, 2, "kconfig/setMainBuild", json!({"uri": BUILD}));
        receiver.try_iter().for_each(drop);

        // Flip the value to y: the missing dependency now warrants a warning.
        state.handle_message(lsp_server::Message::Notification(
            lsp_server::Notification::new(
                "textDocument/didChange".to_owned(),
                json!({
                    "textDocument": {"uri": CONF_URI, "version": 2},
                    "contentChanges": [{
                        "range": {
                            "start": {"line": 0, "character": 11},
                            "end": {"line": 0, "character": 12},
                        },
                        "text": "y",
                    }],
                }),
            ),
        ));
        let published = published(&receiver);
        let conf = published.iter().find(|p| p.uri.as_str() == CONF_URI).expect("conf diags");
        assert_eq!(conf.diagnostics.len(), 1);
        assert_eq!(conf.diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        assert!(conf.diagnostics[0].message.contains("Missing dependencies"));
    }

    #[test]
    fn hover_routes_through_the_session() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "");
        open(&mut state, CONF_URI, "CONFIG_BAR=y\n");
        add_build(&mut state);
        request(
            &mut state,
            2,
            "textDocument/hover",
            json!({
                "textDocument": {"uri": CONF_URI},
                "position": {"line": 0, "character": 8},
            }),
        );
        let resp = response_for(&receiver, 2);
        let contents = &resp.result.expect("result")["contents"]["value"];
        assert!(contents.as_str().expect("markdown").starts_with("Bar support"));
    }

    #[test]
    fn unknown_context_errors_use_domain_codes() {
        let (mut state, receiver) = state();
        request(
            &mut state,
            7,
            "kconfig/setVal",
            json!({"ctx": "file:///nope", "name": "BAR", "val": "y"}),
        );
        let err = response_for(&receiver, 7).error.expect("error");
        assert_eq!(err.code, ext::codes::UNKNOWN_NODE);

        request(
            &mut state,
            8,
            "kconfig/search",
            json!({"ctx": "file:///nope", "query": "BA"}),
        );
        let err = response_for(&receiver, 8).error.expect("error");
        assert_eq!(err.code, ext::codes::UNKNOWN_NODE);
    }

    #[test]
    fn set_menu_desync_reports_the_desync_code() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "");
        add_build(&mut state);
        request(&mut state, 2, "kconfig/setMainBuild", json!({"uri": BUILD}));
        receiver.try_iter().for_each(drop);

        // The session parsed once, so its version is 1; a stale token from
        // version 0 must desync.
        request(
            &mut state,
            3,
            "kconfig/setMenu",
            json!({"ctx": BUILD, "id": "0@MAINMENU"}),
        );
        let err = response_for(&receiver, 3).error.expect("error");
        assert_eq!(err.code, ext::codes::DESYNC);

        request(
            &mut state,
            4,
            "kconfig/setMenu",
            json!({"ctx": BUILD, "id": "1@MAINMENU"}),
        );
        let resp = response_for(&receiver, 4);
        let result = resp.result.expect("result");
        assert_eq!(result["name"], "Main menu");
        assert_eq!(result["items"].as_array().expect("items").len(), 2);
    }

    #[test]
    fn search_filters_by_prefix() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "");
        add_build(&mut state);
        request(&mut state, 2, "kconfig/setMainBuild", json!({"uri": BUILD}));
        receiver.try_iter().for_each(drop);

        request(
            &mut state,
            3,
            "kconfig/search",
            json!({"ctx": BUILD, "query": "CONFIG_BA"}),
        );
        let result = response_for(&receiver, 3).result.expect("result");
        let symbols = result["symbols"].as_array().expect("symbols");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0]["name"], "BAR");
        assert_eq!(symbols[0]["type"], "bool");
    }

    #[test]
    fn kconfig_file_changes_invalidate_sessions() {
        let (mut state, receiver) = state();
        open(&mut state, BOARD_CONF_URI, "");
        add_build(&mut state);
        request(&mut state, 2, "kconfig/setMainBuild", json!({"uri": BUILD}));
        receiver.try_iter().for_each(drop);

        state.handle_message(lsp_server::Message::Notification(
            lsp_server::Notification::new(
                "workspace/didChangeWatchedFiles".to_owned(),
                json!({"changes": [{"uri": "file:///ws/app/Kconfig.soc", "type": 2}]}),
            ),
        ));
        assert!(!state.sessions.get(BUILD).expect("session").is_valid());

        // The next routed request reparses lazily and bumps the version.
        request(
            &mut state,
            3,
            "textDocument/hover",
            json!({
                "textDocument": {"uri": BOARD_CONF_URI},
                "position": {"line": 0, "character": 0},
            }),
        );
        let _ = response_for(&receiver, 3);
        let session = state.sessions.get(BUILD).expect("session");
        assert!(session.is_valid());
        assert_eq!(session.version(), 2);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let (mut state, receiver) = state();
        request(&mut state, 9, "kconfig/doesNotExist", json!({}));
        let err = response_for(&receiver, 9).error.expect("error");
        assert_eq!(err.code, lsp_server::ErrorCode::MethodNotFound as i32);
    }

    #[test]
    fn cancel_request_is_accepted_and_ignored() {
        let (mut state, receiver) = state();
        state.handle_message(lsp_server::Message::Notification(
            lsp_server::Notification::new("$/cancelRequest".to_owned(), json!({"id": 1})),
        ));
        assert!(receiver.try_iter().next().is_none());
    }
}
