//! Hover handler for `CONFIG_` references in conf files.

use crate::session::Session;
use crate::vfs::DocumentStore;
use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use parking_lot::RwLock;

/// Handle a hover request against the routed session.
///
/// Shows the symbol's prompt (or a name-and-location label when it has
/// none), its type and current value, and the help text collected across
/// its definition sites.
pub fn handle_hover(
    params: &HoverParams,
    session: &Session,
    docs: &RwLock<DocumentStore>,
) -> Option<Hover> {
    let uri = &params.text_document_position_params.text_document.uri;
    let pos = params.text_document_position_params.position;
    let sym = session.symbol_at(docs, uri, pos)?;

    let mut value = String::new();
    match sym.prompt() {
        Some(prompt) => value.push_str(prompt),
        None => value.push_str(&sym.name_and_loc()),
    }
    value.push_str("\n\n");
    value.push_str(&format!("Type: `{}`", sym.symbol_type));
    value.push_str("\n\n");
    value.push_str(&format!("Value: `{}`", sym.value));
    value.push_str("\n\n");

    let help = sym
        .sites
        .iter()
        .filter_map(|s| s.help.as_deref())
        .map(|h| h.replace('\n', " "))
        .collect::<Vec<_>>()
        .join("\n\n");
    if !help.is_empty() {
        value.push_str(&help);
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    })
}
