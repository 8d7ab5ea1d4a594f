//! The menu tree of an evaluation.
//!
//! Menu nodes have no stable identity across re-evaluations, so the tree
//! exposes its menus, choices and comments in a fixed evaluation order;
//! clients address nodes by ordinals within those lists (plus, for symbols,
//! the definition-site index). The server's node-identity tokens are built
//! on exactly these ordinals.

use std::path::PathBuf;

/// Index of a node within a [`MenuTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a menu node represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeItem {
    /// The root of the tree.
    MainMenu,
    /// A `menu` block.
    Menu,
    /// A symbol definition site.
    Symbol {
        /// Symbol name without the `CONFIG_` prefix.
        name: String,
        /// Index of this node among the symbol's definition sites.
        site: usize,
    },
    /// A `choice` block.
    Choice,
    /// A `comment` line.
    Comment,
}

/// One node in the menu tree.
#[derive(Debug, Clone)]
pub struct MenuNode {
    /// Parent node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Direct children, in menu order.
    pub children: Vec<NodeId>,
    /// What this node represents.
    pub item: NodeItem,
    /// Prompt text and the current value of its condition.
    pub prompt: Option<(String, bool)>,
    /// For `menu` nodes, the current value of the `visible if` condition.
    pub menu_visibility: bool,
    /// Whether the node opens its own menu level (`menu`, `menuconfig`).
    pub is_menuconfig: bool,
    /// Defining file.
    pub file: PathBuf,
    /// 1-based line in `file`.
    pub line: u32,
    /// Help text attached to the node.
    pub help: Option<String>,
}

impl MenuNode {
    /// Display name: the prompt if there is one, else a kind-derived label.
    #[must_use]
    pub fn name(&self) -> String {
        if let Some((prompt, _)) = &self.prompt {
            return prompt.clone();
        }
        match &self.item {
            NodeItem::MainMenu => "Main menu".to_owned(),
            NodeItem::Menu => "menu".to_owned(),
            NodeItem::Symbol { name, .. } => name.clone(),
            NodeItem::Choice => "choice".to_owned(),
            NodeItem::Comment => "comment".to_owned(),
        }
    }
}

/// The menu tree of one evaluation, with stable enumeration orders.
#[derive(Debug, Clone, Default)]
pub struct MenuTree {
    nodes: Vec<MenuNode>,
    menus: Vec<NodeId>,
    choices: Vec<NodeId>,
    comments: Vec<NodeId>,
}

impl MenuTree {
    /// Build a tree containing only a root node with the given title.
    #[must_use]
    pub fn with_root(title: impl Into<String>) -> Self {
        let mut tree = Self::default();
        tree.nodes.push(MenuNode {
            parent: None,
            children: Vec::new(),
            item: NodeItem::MainMenu,
            prompt: Some((title.into(), true)),
            menu_visibility: true,
            is_menuconfig: true,
            file: PathBuf::from("Kconfig"),
            line: 1,
            help: None,
        });
        tree
    }

    /// The root node.
    #[must_use]
    pub fn top(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&MenuNode> {
        self.nodes.get(id.0)
    }

    /// All `menu` nodes in evaluation order.
    #[must_use]
    pub fn menus(&self) -> &[NodeId] {
        &self.menus
    }

    /// All `choice` nodes in evaluation order.
    #[must_use]
    pub fn choices(&self) -> &[NodeId] {
        &self.choices
    }

    /// All `comment` nodes in evaluation order.
    #[must_use]
    pub fn comments(&self) -> &[NodeId] {
        &self.comments
    }

    /// Ordinal of `id` within its kind's enumeration list, if it has one.
    #[must_use]
    pub fn ordinal(&self, id: NodeId) -> Option<usize> {
        let node = self.get(id)?;
        let list = match node.item {
            NodeItem::Menu => &self.menus,
            NodeItem::Choice => &self.choices,
            NodeItem::Comment => &self.comments,
            NodeItem::MainMenu | NodeItem::Symbol { .. } => return None,
        };
        list.iter().position(|n| *n == id)
    }

    /// Append a child to `parent` and register it in its enumeration list.
    pub fn add_child(&mut self, parent: NodeId, mut node: MenuNode) -> NodeId {
        node.parent = Some(parent);
        let id = NodeId(self.nodes.len());
        match node.item {
            NodeItem::Menu => self.menus.push(id),
            NodeItem::Choice => self.choices.push(id),
            NodeItem::Comment => self.comments.push(id),
            NodeItem::MainMenu | NodeItem::Symbol { .. } => {}
        }
        self.nodes.push(node);
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    /// Whether the node is currently visible.
    ///
    /// A node is visible when it has a prompt whose condition holds, and,
    /// for menus, when the menu's own visibility condition holds too.
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let prompt_live = node.prompt.as_ref().is_some_and(|(_, cond)| *cond);
        prompt_live && !(node.item == NodeItem::Menu && !node.menu_visibility)
    }

    /// The nodes rendered within the menu level opened by `id`.
    ///
    /// Children that do not open their own menu level are expanded in place,
    /// matching how menuconfig renders plain symbols under a menu entry.
    #[must_use]
    pub fn listing(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(node) = self.get(id) {
            for &child in &node.children {
                out.push(child);
                if let Some(c) = self.get(child) {
                    if !c.children.is_empty() && !c.is_menuconfig {
                        out.extend(self.listing(child));
                    }
                }
            }
        }
        out
    }

    /// Indentation depth of `id` within its rendered menu: the number of
    /// ancestors between it and the nearest menu-opening node.
    #[must_use]
    pub fn suboption_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = self.get(id).and_then(|n| n.parent);
        while let Some(pid) = cur {
            let Some(parent) = self.get(pid) else { break };
            if parent.is_menuconfig {
                break;
            }
            depth += 1;
            cur = parent.parent;
        }
        depth
    }

    /// Find the definition-site node for a symbol, by name and site index.
    #[must_use]
    pub fn symbol_node(&self, name: &str, site: usize) -> Option<NodeId> {
        self.nodes.iter().position(|n| {
            matches!(&n.item, NodeItem::Symbol { name: n2, site: s2 } if n2 == name && *s2 == site)
        }).map(NodeId)
    }
}

/// Convenience constructor for nodes fed to [`MenuTree::add_child`].
#[must_use]
pub fn node(item: NodeItem, prompt: Option<&str>, file: impl Into<PathBuf>, line: u32) -> MenuNode {
    MenuNode {
        parent: None,
        children: Vec::new(),
        item,
        prompt: prompt.map(|p| (p.to_owned(), true)),
        menu_visibility: true,
        is_menuconfig: false,
        file: file.into(),
        line,
        help: None,
    }
}
