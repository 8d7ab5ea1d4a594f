//! Code actions: the quick fixes attached to lint diagnostics.

use super::utils::ranges_overlap;
use crate::session::Session;
use lsp_types::{CodeActionParams, CodeActionResponse};

/// Handle a code-action request: collect the actions of every lint
/// diagnostic on the file that overlaps the requested range.
pub fn handle_code_actions(
    params: &CodeActionParams,
    session: &Session,
) -> Option<CodeActionResponse> {
    let conf = session.conf_file(&params.text_document.uri)?;
    let actions: CodeActionResponse = conf
        .diags
        .iter()
        .filter(|d| ranges_overlap(params.range, d.diagnostic.range))
        .flat_map(|d| d.actions.iter().cloned())
        .map(Into::into)
        .collect();
    Some(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{DocumentStore, TextDocument};
    use kconfig_graph::fixture::{FixtureEngine, GraphSpec, SymbolSpec};
    use lsp_types::{
        CodeActionContext, CodeActionOrCommand, PartialResultParams, Position, Range,
        TextDocumentIdentifier, WorkDoneProgressParams,
    };
    use parking_lot::RwLock;
    use std::collections::HashMap;

    const CONF: &str = "file:///ws/app/prj.conf";
    const BOARD_CONF: &str = "file:///boards/nrf52dk_defconfig";

    fn setup(text: &str) -> (Session, RwLock<DocumentStore>) {
        let mut store = DocumentStore::new();
        store.open(TextDocument::new(CONF.parse().expect("uri"), text, None, 1));
        store.open(TextDocument::new(BOARD_CONF.parse().expect("uri"), "", None, 0));
        let docs = RwLock::new(store);
        let graph = GraphSpec::new()
            .symbol(SymbolSpec::bool("BAR").prompt("Bar support"))
            .symbol(SymbolSpec::bool("FOO").prompt("Foo support").depends_on("BAR"));
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
        session.refresh(&FixtureEngine::new(graph), &docs);
        (session, docs)
    }

    fn params(range: Range) -> CodeActionParams {
        CodeActionParams {
            text_document: TextDocumentIdentifier {
                uri: CONF.parse().expect("uri"),
            },
            range,
            context: CodeActionContext::default(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        }
    }

    #[test]
    fn actions_for_overlapping_diagnostics_only() {
        let (session, _docs) = setup("CONFIG_FOO=y\n");
        let on_entry = params(Range::new(Position::new(0, 0), Position::new(0, 5)));
        let actions = handle_code_actions(&on_entry, &session).expect("actions");
        assert_eq!(actions.len(), 2);
        let titles: Vec<&str> = actions
            .iter()
            .map(|a| match a {
                CodeActionOrCommand::CodeAction(a) => a.title.as_str(),
                CodeActionOrCommand::Command(c) => c.title.as_str(),
            })
            .collect();
        assert!(titles.contains(&"Enable CONFIG_BAR to resolve dependency"));
        assert!(titles.contains(&"Remove entry"));

        let elsewhere = params(Range::new(Position::new(5, 0), Position::new(5, 1)));
        let actions = handle_code_actions(&elsewhere, &session).expect("actions");
        assert!(actions.is_empty());
    }

    #[test]
    fn unowned_file_yields_nothing() {
        let (session, _docs) = setup("CONFIG_FOO=y\n");
        let mut p = params(Range::default());
        p.text_document.uri = "file:///other.conf".parse().expect("uri");
        assert!(handle_code_actions(&p, &session).is_none());
    }
}
