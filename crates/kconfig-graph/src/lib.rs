//! Typed interface between the kconfig language server and a Kconfig
//! evaluation engine.
//!
//! The server treats the engine as an external collaborator: it hands over a
//! root definition file, an environment map and a [`FileSource`] for live
//! editor buffers, and receives an [`Evaluation`]: a symbol graph with
//! typed per-symbol snapshots ([`SymbolInfo`]) and a menu tree with stable
//! enumeration order ([`MenuTree`]).
//!
//! The [`fixture`] module provides a deterministic engine built from
//! declarative symbol specs, used by the server's test suite and by
//! embedders serving pre-computed graphs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod fixture;
pub mod symbol;
pub mod tree;

pub use engine::{DiskOnly, Engine, Evaluation, FileSource};
pub use symbol::{
    DefinitionSite, DepClause, EngineWarning, EvalError, SymbolInfo, SymbolType, Tristate,
    WarningKind,
};
pub use tree::{MenuNode, MenuTree, NodeId, NodeItem};
