//! Language Server Protocol implementation for Kconfig configuration
//! workspaces.
//!
//! The server keeps one [`session::Session`] per registered build, each an
//! independent evaluation of the Kconfig tree for that build's board and
//! environment. Editing a `prj.conf`-style override file feeds the
//! [`vfs::DocumentStore`], the session router picks the owning session,
//! and the lint pipeline cross-checks every assignment against the
//! evaluated symbol graph, publishing diagnostics with attached quick
//! fixes.
//!
//! # Architecture
//!
//! - **Main loop**: single-threaded dispatch over the `lsp-server`
//!   connection; notifications and requests are handled strictly in order.
//! - **Sessions**: evaluation state, version-stamped node identity, and
//!   diagnostic buckets per build.
//! - **Handlers**: completion, hover, definition, document symbols and
//!   code actions against the routed session.
//!
//! The Kconfig evaluation itself lives behind the `kconfig-graph`
//! interface; the binary wires in the engine, and the test suite uses the
//! deterministic fixture engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod conf;
pub mod diag;
pub mod ext;
pub mod handlers;
pub mod lint;
pub mod main_loop;
pub mod node_id;
pub mod session;
pub mod vfs;

mod server;

pub use main_loop::run_main_loop;
pub use server::{capabilities, start_stdio, Server};

/// Server version, reported in the initialize handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
