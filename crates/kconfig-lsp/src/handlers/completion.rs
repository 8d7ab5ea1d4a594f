//! Completion handler for `CONFIG_` symbols in conf files.
//!
//! Without a typed prefix, only currently visible symbols are offered and
//! the list is marked incomplete so the client re-queries once the user
//! types something distinguishing; with a prefix, non-visible symbols join
//! the list. Insert text is a snippet shaped by the symbol's type.

use crate::session::Session;
use crate::vfs::DocumentStore;
use kconfig_graph::{SymbolInfo, SymbolType};
use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionParams, CompletionResponse,
    Documentation, InsertTextFormat,
};
use parking_lot::RwLock;

/// Handle a completion request against the routed session.
pub fn handle_completion(
    params: &CompletionParams,
    session: &Session,
    docs: &RwLock<DocumentStore>,
) -> Option<CompletionResponse> {
    let uri = &params.text_document_position.text_document.uri;
    let pos = params.text_document_position.position;

    let line = {
        let mut docs = docs.write();
        let doc = docs.get(uri, true)?;
        doc.line(pos.line as usize).map(str::to_owned)
    };

    let mut show_non_visible = false;
    let mut word = None;
    if let Some(line) = line.filter(|l| !l.is_empty()) {
        let mut col = (pos.character as usize).min(line.len());
        while !line.is_char_boundary(col) {
            col -= 1;
        }
        let typed = line[..col].trim_start();
        if !typed.is_empty() {
            // Align the typed word with the CONFIG_ prefix; a partial
            // prefix like "CONF" is completed rather than duplicated.
            let common = typed
                .bytes()
                .zip("CONFIG_".bytes())
                .take_while(|(a, b)| a == b)
                .count();
            word = Some(format!("CONFIG_{}", &typed[common..]));
            show_non_visible = true;
        }
    }

    let items: Vec<CompletionItem> = session
        .symbols(word.as_deref())
        .into_iter()
        .filter(|sym| sym.visible || show_non_visible)
        .map(completion_item)
        .collect();

    tracing::debug!(
        filter = word.as_deref().unwrap_or(""),
        results = items.len(),
        "completion"
    );

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: !show_non_visible,
        items,
    }))
}

fn completion_item(sym: SymbolInfo) -> CompletionItem {
    let documentation = sym
        .help()
        .map_or_else(|| " ".to_owned(), |help| help.replace('\n', " "));
    CompletionItem {
        label: format!("CONFIG_{}", sym.name),
        kind: Some(CompletionItemKind::VARIABLE),
        detail: Some(sym.symbol_type.to_string()),
        documentation: Some(Documentation::String(documentation)),
        insert_text: Some(insert_text(&sym)),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..CompletionItem::default()
    }
}

/// Snippet inserting a full assignment, shaped by the symbol's type.
fn insert_text(sym: &SymbolInfo) -> String {
    let mut text = format!("CONFIG_{}=", sym.name);
    match sym.symbol_type {
        SymbolType::Bool | SymbolType::Tristate => {
            // Assignable values list `n` first; users usually want `y`.
            let choices: Vec<&str> = sym.assignable.iter().rev().map(|t| t.as_str()).collect();
            if !choices.is_empty() {
                text.push_str(&format!("${{1|{}|}}", choices.join(",")));
            }
        }
        SymbolType::String => text.push_str("\"${1}\""),
        SymbolType::Hex => text.push_str("0x"),
        SymbolType::Int | SymbolType::Unknown => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::TextDocument;
    use kconfig_graph::fixture::{FixtureEngine, GraphSpec, SymbolSpec};
    use lsp_types::{
        PartialResultParams, Position, TextDocumentIdentifier, TextDocumentPositionParams,
        WorkDoneProgressParams,
    };
    use std::collections::HashMap;

    const CONF: &str = "file:///ws/app/prj.conf";

    fn graph() -> GraphSpec {
        GraphSpec::new()
            .symbol(SymbolSpec::bool("BAR").prompt("Bar support").help("Enables bar.\nReally."))
            .symbol(SymbolSpec::bool("BAZ").prompt("Baz support").depends_on("BAR"))
            .symbol(SymbolSpec::string("BOARD_NAME").prompt("Board name"))
            .symbol(SymbolSpec::hex("BASE").prompt("Base address"))
    }

    fn setup(text: &str) -> (Session, RwLock<DocumentStore>) {
        let mut store = DocumentStore::new();
        store.open(TextDocument::new(CONF.parse().expect("uri"), text, None, 1));
        let docs = RwLock::new(store);
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
        session.parse(&FixtureEngine::new(graph()), &docs);
        (session, docs)
    }

    fn params(line: u32, character: u32) -> CompletionParams {
        CompletionParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: CONF.parse().expect("uri"),
                },
                position: Position::new(line, character),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: None,
        }
    }

    fn list(response: Option<CompletionResponse>) -> CompletionList {
        match response.expect("completion response") {
            CompletionResponse::List(list) => list,
            CompletionResponse::Array(_) => panic!("expected a list"),
        }
    }

    #[test]
    fn empty_prefix_is_incomplete_and_visible_only() {
        let (session, docs) = setup("   \n");
        let list = list(handle_completion(&params(0, 2), &session, &docs));
        assert!(list.is_incomplete);
        // BAZ's dependency is unmet, so it is not visible and not offered.
        let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"CONFIG_BAR"));
        assert!(!labels.contains(&"CONFIG_BAZ"));
    }

    #[test]
    fn typed_prefix_includes_non_visible_symbols() {
        let (session, docs) = setup("CONFIG_BA\n");
        let list = list(handle_completion(&params(0, 9), &session, &docs));
        assert!(!list.is_incomplete);
        let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"CONFIG_BAZ"));
        assert!(labels.contains(&"CONFIG_BAR"));
        assert!(!labels.contains(&"CONFIG_BOARD_NAME"));
    }

    #[test]
    fn partial_config_prefix_is_corrected() {
        let (session, docs) = setup("BA\n");
        let list = list(handle_completion(&params(0, 2), &session, &docs));
        assert!(!list.is_incomplete);
        let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"CONFIG_BAR"));
    }

    #[test]
    fn snippets_follow_symbol_type() {
        let (session, docs) = setup("CONFIG_B\n");
        let list = list(handle_completion(&params(0, 8), &session, &docs));
        let find = |label: &str| {
            list.items
                .iter()
                .find(|i| i.label == label)
                .and_then(|i| i.insert_text.clone())
                .expect("item")
        };
        assert_eq!(find("CONFIG_BAR"), "CONFIG_BAR=${1|y,n|}");
        assert_eq!(find("CONFIG_BOARD_NAME"), "CONFIG_BOARD_NAME=\"${1}\"");
        assert_eq!(find("CONFIG_BASE"), "CONFIG_BASE=0x");
        // Not visible, nothing assignable: plain freeform assignment.
        assert_eq!(find("CONFIG_BAZ"), "CONFIG_BAZ=");
    }

    #[test]
    fn help_is_flattened_into_documentation() {
        let (session, docs) = setup("CONFIG_BAR\n");
        let list = list(handle_completion(&params(0, 10), &session, &docs));
        let bar = list.items.iter().find(|i| i.label == "CONFIG_BAR").expect("BAR");
        match &bar.documentation {
            Some(Documentation::String(text)) => assert_eq!(text, "Enables bar. Really."),
            other => panic!("unexpected documentation: {other:?}"),
        }
    }

    #[test]
    fn unknown_document_yields_nothing() {
        let (session, docs) = setup("");
        let mut p = params(0, 0);
        p.text_document_position.text_document.uri =
            "file:///absent.conf".parse().expect("uri");
        assert!(handle_completion(&p, &session, &docs).is_none());
    }
}
