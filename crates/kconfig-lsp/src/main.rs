//! Kconfig language server binary.
//!
//! Usage:
//!   kconfig-ls              # Start LSP server (stdio)
//!   kconfig-ls --version    # Print version
//!   kconfig-ls --help      # Print help

use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("kconfig-ls {}", kconfig_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Kconfig Language Server");
        println!();
        println!("Usage: kconfig-ls [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!("Builds are registered with the kconfig/addBuild request; an embedding");
        println!("extension supplies the evaluation engine through kconfig_lsp::start_stdio.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG       Set log level (e.g., RUST_LOG=kconfig_lsp=debug)");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr; stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kconfig_lsp=info".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    // The standalone binary serves the fixture engine; embedders link a
    // real Kconfig engine and call start_stdio with it instead.
    let engine = Arc::new(kconfig_graph::fixture::FixtureEngine::empty());

    match kconfig_lsp::start_stdio(engine) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
