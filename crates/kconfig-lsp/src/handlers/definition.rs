//! Go-to-definition for `CONFIG_` references in conf files.

use crate::session::Session;
use crate::vfs::{path_to_uri, DocumentStore};
use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, Location, Position, Range};
use parking_lot::RwLock;

/// Handle a definition request: every definition site of the referenced
/// symbol, since a symbol may be defined in several Kconfig files.
pub fn handle_definition(
    params: &GotoDefinitionParams,
    session: &Session,
    docs: &RwLock<DocumentStore>,
) -> Option<GotoDefinitionResponse> {
    let uri = &params.text_document_position_params.text_document.uri;
    let pos = params.text_document_position_params.position;
    let sym = session.symbol_at(docs, uri, pos)?;

    let locations: Vec<Location> = sym
        .sites
        .iter()
        .filter_map(|site| {
            let start = Position::new(site.line.saturating_sub(1), 0);
            Some(Location::new(
                path_to_uri(&site.file)?,
                Range::new(start, start),
            ))
        })
        .collect();
    Some(GotoDefinitionResponse::Array(locations))
}
