//! Document symbols: one entry per assignment in a conf file.

use crate::session::Session;
use crate::vfs::DocumentStore;
use lsp_types::{DocumentSymbol, DocumentSymbolParams, DocumentSymbolResponse, SymbolKind};
use parking_lot::RwLock;

/// Handle a document-symbol request for a conf file of the routed session.
#[allow(deprecated)] // DocumentSymbol::deprecated must be populated
pub fn handle_document_symbols(
    params: &DocumentSymbolParams,
    session: &Session,
    docs: &RwLock<DocumentStore>,
) -> Option<DocumentSymbolResponse> {
    let file = session.conf_file(&params.text_document.uri)?;
    let entries = file.entries(&mut docs.write());

    let symbols = entries
        .into_iter()
        .map(|entry| {
            let detail = session
                .symbol(&entry.name)
                .and_then(|sym| {
                    sym.sites
                        .iter()
                        .rev()
                        .find_map(|site| site.prompt.clone())
                })
                .unwrap_or_default();
            DocumentSymbol {
                name: format!("CONFIG_{}", entry.name),
                detail: Some(detail),
                kind: SymbolKind::PROPERTY,
                tags: None,
                deprecated: None,
                range: entry.full_range(),
                selection_range: entry.full_range(),
                children: None,
            }
        })
        .collect();
    Some(DocumentSymbolResponse::Nested(symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::TextDocument;
    use kconfig_graph::fixture::{FixtureEngine, GraphSpec, SymbolSpec};
    use lsp_types::{PartialResultParams, TextDocumentIdentifier, WorkDoneProgressParams};
    use std::collections::HashMap;

    const CONF: &str = "file:///ws/app/prj.conf";

    #[test]
    fn one_property_symbol_per_entry() {
        let mut store = DocumentStore::new();
        store.open(TextDocument::new(
            CONF.parse().expect("uri"),
            "CONFIG_SERIAL=y\n# comment\nCONFIG_NOPE=y\n",
            None,
            1,
        ));
        let docs = RwLock::new(store);
        let graph =
            GraphSpec::new().symbol(SymbolSpec::bool("SERIAL").prompt("Serial drivers"));
        let env = HashMap::from([
            ("BOARD".to_owned(), "nrf52dk".to_owned()),
            ("ARCH".to_owned(), "arm".to_owned()),
            ("BOARD_DIR".to_owned(), "/boards".to_owned()),
        ]);
        let mut session = Session::new(
            "file:///ws/app/build".parse().expect("uri"),
            "Kconfig",
            vec![CONF.parse().expect("uri")],
            env,
        )
        .expect("session");
        session.parse(&FixtureEngine::new(graph), &docs);

        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier {
                uri: CONF.parse().expect("uri"),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response =
            handle_document_symbols(&params, &session, &docs).expect("symbols");
        let DocumentSymbolResponse::Nested(symbols) = response else {
            panic!("expected nested symbols");
        };
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "CONFIG_SERIAL");
        assert_eq!(symbols[0].detail.as_deref(), Some("Serial drivers"));
        assert_eq!(symbols[0].range.start.line, 0);
        // Unknown symbols still appear, with an empty detail.
        assert_eq!(symbols[1].name, "CONFIG_NOPE");
        assert_eq!(symbols[1].detail.as_deref(), Some(""));

        // A file the session does not own yields nothing.
        let mut params = params;
        params.text_document.uri = "file:///other.conf".parse().expect("uri");
        assert!(handle_document_symbols(&params, &session, &docs).is_none());
    }
}
