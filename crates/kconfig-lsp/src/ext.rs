//! Protocol extensions: the `kconfig/*` methods and their payloads, plus
//! the domain error codes reported in failing responses.

use lsp_types::request::Request;
use lsp_types::{Location, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain-specific error codes, alongside the standard JSON-RPC ones.
pub mod codes {
    /// The referenced node or context is unknown.
    pub const UNKNOWN_NODE: i32 = 1;
    /// The kconfig data has changed and the menu tree is out of sync.
    pub const DESYNC: i32 = 2;
    /// The kconfig tree couldn't be parsed.
    pub const PARSING_FAILED: i32 = 3;
}

/// A request failure that maps onto a domain error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// No symbol with the given name.
    #[error("Unknown symbol {0}")]
    UnknownSymbol(String),
    /// No build context registered under the given id.
    #[error("Unknown build context {0}")]
    UnknownContext(String),
    /// A node id from a superseded evaluation.
    #[error("Menu tree is out of sync")]
    Desync,
    /// A node id that does not resolve in the current evaluation.
    #[error("Unknown node")]
    UnknownNode,
    /// The context has no evaluation to serve the request from.
    #[error("Kconfig tree couldn't be parsed")]
    ParsingFailed,
}

impl RequestError {
    /// The wire error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::Desync => codes::DESYNC,
            Self::ParsingFailed => codes::PARSING_FAILED,
            Self::UnknownSymbol(_) | Self::UnknownContext(_) | Self::UnknownNode => {
                codes::UNKNOWN_NODE
            }
        }
    }
}

impl From<crate::node_id::NodeIdError> for RequestError {
    fn from(err: crate::node_id::NodeIdError) -> Self {
        match err {
            crate::node_id::NodeIdError::Desync => Self::Desync,
            crate::node_id::NodeIdError::Unknown => Self::UnknownNode,
        }
    }
}

/// Register a build, creating a session for it.
#[derive(Debug)]
pub enum AddBuild {}

impl Request for AddBuild {
    type Params = AddBuildParams;
    type Result = Option<AddBuildResult>;
    const METHOD: &'static str = "kconfig/addBuild";
}

/// Parameters of [`AddBuild`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBuildParams {
    /// Build directory URI, used as the session id.
    pub uri: Uri,
    /// Path of the root Kconfig file.
    pub root: String,
    /// Paths of the configuration override files, in application order.
    pub conf: Vec<String>,
    /// Environment for the evaluation. Must contain `BOARD`, `ARCH` and
    /// `BOARD_DIR`.
    pub env: HashMap<String, String>,
}

/// Result of [`AddBuild`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBuildResult {
    /// The session id (the build directory URI).
    pub id: String,
}

/// Dispose of a build's session.
#[derive(Debug)]
pub enum RemoveBuild {}

impl Request for RemoveBuild {
    type Params = BuildParams;
    type Result = ();
    const METHOD: &'static str = "kconfig/removeBuild";
}

/// Mark a build as the active one and refresh it.
#[derive(Debug)]
pub enum SetMainBuild {}

impl Request for SetMainBuild {
    type Params = BuildParams;
    type Result = ();
    const METHOD: &'static str = "kconfig/setMainBuild";
}

/// Parameters naming an existing build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildParams {
    /// The build directory URI.
    pub uri: Uri,
}

/// Search the symbol graph by name prefix.
#[derive(Debug)]
pub enum Search {}

impl Request for Search {
    type Params = SearchParams;
    type Result = SearchResult;
    const METHOD: &'static str = "kconfig/search";
}

/// Parameters of [`Search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// The session id.
    pub ctx: String,
    /// Name prefix; a leading `CONFIG_` is stripped.
    pub query: String,
}

/// Result of [`Search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The session id the search ran against.
    pub ctx: String,
    /// The query as given.
    pub query: String,
    /// Matching symbols.
    pub symbols: Vec<SymbolItem>,
}

/// One symbol in a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolItem {
    /// Symbol name without the `CONFIG_` prefix.
    pub name: String,
    /// Whether the symbol is currently visible.
    pub visible: bool,
    /// Type name (`bool`, `int`, ...).
    #[serde(rename = "type")]
    pub symbol_type: String,
    /// First help text across definition sites, or empty.
    pub help: String,
    /// First prompt across definition sites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Enter a menu level, returning its rendered snapshot.
#[derive(Debug)]
pub enum SetMenu {}

impl Request for SetMenu {
    type Params = SetMenuParams;
    type Result = Option<MenuSnapshot>;
    const METHOD: &'static str = "kconfig/setMenu";
}

/// Parameters of [`SetMenu`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMenuParams {
    /// The session id.
    pub ctx: String,
    /// Node id of the menu to enter.
    pub id: String,
}

/// One rendered menu level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuSnapshot {
    /// Menu display name.
    pub name: String,
    /// The node id the snapshot was taken for.
    pub id: String,
    /// Rendered items, suboptions expanded in place.
    pub items: Vec<MenuItem>,
}

/// One entry of a [`MenuSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    /// Whether the entry is currently visible.
    pub visible: bool,
    /// Where the entry is defined.
    pub loc: Location,
    /// Whether the entry opens its own menu level.
    pub is_menu: bool,
    /// Indentation depth within the rendered menu.
    pub depth: usize,
    /// Node id for this entry.
    pub id: String,
    /// Prompt text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Symbol type name, for symbol entries.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub symbol_type: Option<String>,
    /// Current value in kconfig string form, for symbol entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
    /// Symbol name, for symbol entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Currently assignable values, for symbol entries with any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Set or unset a symbol value without touching any conf file.
#[derive(Debug)]
pub enum SetVal {}

impl Request for SetVal {
    type Params = SetValParams;
    type Result = ();
    const METHOD: &'static str = "kconfig/setVal";
}

/// Parameters of [`SetVal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetValParams {
    /// The session id.
    pub ctx: String,
    /// Symbol name without the `CONFIG_` prefix.
    pub name: String,
    /// The value to set; omitted to revert a previous set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
}
