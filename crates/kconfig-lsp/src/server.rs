//! Server bootstrap: stdio transport, initialize handshake, capabilities.

use crate::main_loop::run_main_loop;
use kconfig_graph::Engine;
use lsp_server::Connection;
use lsp_types::InitializeParams;
use std::sync::Arc;

/// The language server, bound to a connection and an evaluation engine.
pub struct Server {
    connection: Connection,
    init_params: InitializeParams,
    engine: Arc<dyn Engine>,
}

impl Server {
    /// Create a server from an established connection.
    pub fn new(connection: Connection, init_params: InitializeParams, engine: Arc<dyn Engine>) -> Self {
        Self {
            connection,
            init_params,
            engine,
        }
    }

    /// Run the server's main loop until the client disconnects.
    pub fn run(self) {
        tracing::info!("starting kconfig language server v{}", crate::VERSION);

        if let Some(folders) = &self.init_params.workspace_folders {
            if let Some(folder) = folders.first() {
                tracing::info!(root = folder.uri.as_str(), "workspace root");
            }
        }

        let (sender, receiver) = (self.connection.sender, self.connection.receiver);
        run_main_loop(receiver, sender, self.engine);

        tracing::info!("server shutdown complete");
    }
}

/// The capabilities this server advertises.
///
/// Text synchronization is incremental: the client sends range deltas and
/// the document store splices them into its line buffers.
pub fn capabilities() -> lsp_types::ServerCapabilities {
    lsp_types::ServerCapabilities {
        text_document_sync: Some(lsp_types::TextDocumentSyncCapability::Kind(
            lsp_types::TextDocumentSyncKind::INCREMENTAL,
        )),
        completion_provider: Some(lsp_types::CompletionOptions::default()),
        definition_provider: Some(lsp_types::OneOf::Left(true)),
        hover_provider: Some(lsp_types::HoverProviderCapability::Simple(true)),
        document_symbol_provider: Some(lsp_types::OneOf::Left(true)),
        code_action_provider: Some(lsp_types::CodeActionProviderCapability::Simple(true)),
        ..Default::default()
    }
}

/// Start the server on stdio with the given evaluation engine.
pub fn start_stdio(engine: Arc<dyn Engine>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("starting LSP server on stdio");

    let (connection, io_threads) = Connection::stdio();

    let (id, params) = connection.initialize_start()?;
    let init_params: InitializeParams = serde_json::from_value(params)?;

    let init_result = lsp_types::InitializeResult {
        capabilities: capabilities(),
        server_info: Some(lsp_types::ServerInfo {
            name: "zephyr-kconfig".to_owned(),
            version: Some(crate::VERSION.to_owned()),
        }),
    };
    connection.initialize_finish(id, serde_json::to_value(init_result)?)?;

    tracing::info!("LSP initialized");

    let server = Server::new(connection, init_params, engine);
    server.run();

    io_threads.join()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_is_incremental() {
        let caps = capabilities();
        assert_eq!(
            caps.text_document_sync,
            Some(lsp_types::TextDocumentSyncCapability::Kind(
                lsp_types::TextDocumentSyncKind::INCREMENTAL
            ))
        );
        assert!(caps.completion_provider.is_some());
        assert!(caps.code_action_provider.is_some());
    }
}
