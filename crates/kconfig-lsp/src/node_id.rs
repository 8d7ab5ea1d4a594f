//! Version-stamped node identity tokens.
//!
//! Menu nodes have no stable identity across re-evaluations: every reparse
//! rebuilds the tree, and positional ordinals shift with it. Tokens
//! therefore embed the session version they were minted under, and
//! resolution against any other version fails with [`NodeIdError::Desync`]
//! rather than silently pointing at an unrelated node.
//!
//! Token grammar, `@`-separated:
//! `<version>@MAINMENU`, `<version>@MENU@<ordinal>`,
//! `<version>@SYM@<name>@<site>`, `<version>@CHOICE@<ordinal>`,
//! `<version>@COMMENT@<ordinal>`, `<version>@UNKNOWN@<file>@<line>`.

use kconfig_graph::{MenuTree, NodeId, NodeItem};
use thiserror::Error;

/// Separator between token parts; never valid inside a discriminator.
pub const ID_SEP: char = '@';

/// Why a token failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NodeIdError {
    /// The token was minted under a different session version; the tree has
    /// been rebuilt since and the token's ordinals are meaningless.
    #[error("menu tree has changed since the node id was issued")]
    Desync,
    /// The token is malformed or names a node the current tree lacks.
    #[error("unknown node")]
    Unknown,
}

/// Encode a token for `id` under the given session version.
pub fn encode(version: u64, tree: &MenuTree, id: NodeId) -> String {
    let Some(node) = tree.get(id) else {
        return format!("{version}{ID_SEP}UNKNOWN{ID_SEP}?{ID_SEP}0");
    };
    match &node.item {
        NodeItem::MainMenu => format!("{version}{ID_SEP}MAINMENU"),
        NodeItem::Symbol { name, site } => {
            format!("{version}{ID_SEP}SYM{ID_SEP}{name}{ID_SEP}{site}")
        }
        NodeItem::Menu | NodeItem::Choice | NodeItem::Comment => {
            let tag = match node.item {
                NodeItem::Menu => "MENU",
                NodeItem::Choice => "CHOICE",
                _ => "COMMENT",
            };
            match tree.ordinal(id) {
                Some(ordinal) => format!("{version}{ID_SEP}{tag}{ID_SEP}{ordinal}"),
                None => format!(
                    "{version}{ID_SEP}UNKNOWN{ID_SEP}{}{ID_SEP}{}",
                    node.file.display(),
                    node.line
                ),
            }
        }
    }
}

/// Resolve a token against the current tree.
///
/// `version` must be the session's *current* version; any mismatch is a
/// [`NodeIdError::Desync`], distinct from a merely unresolvable token.
pub fn decode(token: &str, version: u64, tree: &MenuTree) -> Result<NodeId, NodeIdError> {
    let mut parts = token.split(ID_SEP);
    let minted: u64 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or(NodeIdError::Unknown)?;
    if minted != version {
        return Err(NodeIdError::Desync);
    }
    let kind = parts.next().ok_or(NodeIdError::Unknown)?;
    match kind {
        "MAINMENU" => Ok(tree.top()),
        "MENU" | "CHOICE" | "COMMENT" => {
            let ordinal: usize = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or(NodeIdError::Unknown)?;
            let list = match kind {
                "MENU" => tree.menus(),
                "CHOICE" => tree.choices(),
                _ => tree.comments(),
            };
            list.get(ordinal).copied().ok_or(NodeIdError::Unknown)
        }
        "SYM" => {
            let name = parts.next().ok_or(NodeIdError::Unknown)?;
            let site: usize = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or(NodeIdError::Unknown)?;
            tree.symbol_node(name, site).ok_or(NodeIdError::Unknown)
        }
        _ => Err(NodeIdError::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kconfig_graph::tree::node;

    fn tree() -> MenuTree {
        let mut tree = MenuTree::with_root("Main menu");
        let top = tree.top();
        let mut menu = node(NodeItem::Menu, Some("Drivers"), "Kconfig", 2);
        menu.is_menuconfig = true;
        let drivers = tree.add_child(top, menu);
        tree.add_child(
            drivers,
            node(NodeItem::Symbol { name: "SERIAL".into(), site: 0 }, Some("Serial"), "Kconfig", 3),
        );
        tree.add_child(
            drivers,
            node(NodeItem::Symbol { name: "SERIAL".into(), site: 1 }, None, "boards/Kconfig", 8),
        );
        tree.add_child(top, node(NodeItem::Choice, Some("Console"), "Kconfig", 12));
        tree.add_child(top, node(NodeItem::Comment, Some("EOF"), "Kconfig", 40));
        tree
    }

    #[test]
    fn round_trips_every_kind() {
        let tree = tree();
        let mut ids = vec![tree.top()];
        ids.extend(tree.menus());
        ids.extend(tree.choices());
        ids.extend(tree.comments());
        ids.push(tree.symbol_node("SERIAL", 1).expect("site 1"));
        for id in ids {
            let token = encode(3, &tree, id);
            assert_eq!(decode(&token, 3, &tree), Ok(id), "token {token}");
        }
    }

    #[test]
    fn symbol_tokens_carry_name_and_site() {
        let tree = tree();
        let id = tree.symbol_node("SERIAL", 1).expect("site 1");
        assert_eq!(encode(3, &tree, id), "3@SYM@SERIAL@1");
    }

    #[test]
    fn version_mismatch_is_desync_for_every_kind() {
        let tree = tree();
        for token in ["3@MAINMENU", "3@MENU@0", "3@SYM@SERIAL@0", "3@CHOICE@0", "3@COMMENT@0"] {
            assert_eq!(decode(token, 4, &tree), Err(NodeIdError::Desync), "token {token}");
        }
    }

    #[test]
    fn malformed_and_missing_tokens_are_unknown() {
        let tree = tree();
        assert_eq!(decode("", 3, &tree), Err(NodeIdError::Unknown));
        assert_eq!(decode("x@MAINMENU", 3, &tree), Err(NodeIdError::Unknown));
        assert_eq!(decode("3@MENU@7", 3, &tree), Err(NodeIdError::Unknown));
        assert_eq!(decode("3@SYM@NOPE@0", 3, &tree), Err(NodeIdError::Unknown));
        assert_eq!(decode("3@SYM@SERIAL@9", 3, &tree), Err(NodeIdError::Unknown));
        assert_eq!(decode("3@UNKNOWN@Kconfig@1", 3, &tree), Err(NodeIdError::Unknown));
        // Desync wins over malformed discriminators: the version is checked first.
        assert_eq!(decode("2@MENU@xyz", 3, &tree), Err(NodeIdError::Desync));
    }
}
