//! A deterministic, programmatically constructed evaluation.
//!
//! [`FixtureEngine`] builds an [`Evaluation`] from declarative
//! [`SymbolSpec`]s instead of parsing Kconfig sources. The server's test
//! suite drives every session, lint and handler scenario through it, and
//! embedders can use it to serve a pre-computed graph.
//!
//! Value propagation is a single pass in declaration order: a symbol's
//! dependency clauses read the values its dependencies held when the pass
//! reached them. Declare dependencies before their dependents.

use crate::engine::{Engine, Evaluation, FileSource};
use crate::symbol::{
    DefinitionSite, DepClause, EngineWarning, EvalError, SymbolInfo, SymbolType, Tristate,
    WarningKind,
};
use crate::tree::{node, MenuTree, NodeItem};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// One dependency clause of a [`SymbolSpec`].
#[derive(Debug, Clone)]
enum DepSpec {
    /// Reference to another symbol in the graph; satisfied while that
    /// symbol's value is `y` or `m`.
    Symbol(String),
    /// An opaque expression with a fixed truth value.
    Expr { display: String, satisfied: bool },
}

/// Declarative description of one symbol.
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    name: String,
    symbol_type: SymbolType,
    sites: Vec<DefinitionSite>,
    default: Option<String>,
    deps: Vec<DepSpec>,
}

impl SymbolSpec {
    /// A symbol of the given type, defined at `Kconfig:1` without a prompt.
    #[must_use]
    pub fn new(name: impl Into<String>, symbol_type: SymbolType) -> Self {
        Self {
            name: name.into(),
            symbol_type,
            sites: vec![DefinitionSite {
                file: PathBuf::from("Kconfig"),
                line: 1,
                prompt: None,
                help: None,
            }],
            default: None,
            deps: Vec::new(),
        }
    }

    /// A `bool` symbol.
    #[must_use]
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, SymbolType::Bool)
    }

    /// A `tristate` symbol.
    #[must_use]
    pub fn tristate(name: impl Into<String>) -> Self {
        Self::new(name, SymbolType::Tristate)
    }

    /// A `string` symbol.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, SymbolType::String)
    }

    /// An `int` symbol.
    #[must_use]
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, SymbolType::Int)
    }

    /// A `hex` symbol.
    #[must_use]
    pub fn hex(name: impl Into<String>) -> Self {
        Self::new(name, SymbolType::Hex)
    }

    /// Set the prompt of the first definition site.
    #[must_use]
    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        if let Some(site) = self.sites.first_mut() {
            site.prompt = Some(text.into());
        }
        self
    }

    /// Set the help text of the first definition site.
    #[must_use]
    pub fn help(mut self, text: impl Into<String>) -> Self {
        if let Some(site) = self.sites.first_mut() {
            site.help = Some(text.into());
        }
        self
    }

    /// Move the first definition site.
    #[must_use]
    pub fn at(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        if let Some(site) = self.sites.first_mut() {
            site.file = file.into();
            site.line = line;
        }
        self
    }

    /// Add another definition site.
    #[must_use]
    pub fn site(mut self, file: impl Into<PathBuf>, line: u32, prompt: Option<&str>) -> Self {
        self.sites.push(DefinitionSite {
            file: file.into(),
            line,
            prompt: prompt.map(str::to_owned),
            help: None,
        });
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Depend on another symbol in the graph.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.deps.push(DepSpec::Symbol(name.into()));
        self
    }

    /// Depend on an opaque expression with a fixed truth value.
    #[must_use]
    pub fn depends_expr(mut self, display: impl Into<String>, satisfied: bool) -> Self {
        self.deps.push(DepSpec::Expr {
            display: display.into(),
            satisfied,
        });
        self
    }

    fn has_prompt(&self) -> bool {
        self.sites.iter().any(|s| s.prompt.is_some())
    }
}

/// Declarative description of a whole graph.
#[derive(Debug, Clone, Default)]
pub struct GraphSpec {
    symbols: Vec<SymbolSpec>,
    title: Option<String>,
    tree: Option<MenuTree>,
}

impl GraphSpec {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol.
    #[must_use]
    pub fn symbol(mut self, spec: SymbolSpec) -> Self {
        self.symbols.push(spec);
        self
    }

    /// Set the main-menu title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the derived menu tree with an explicit one.
    #[must_use]
    pub fn with_tree(mut self, tree: MenuTree) -> Self {
        self.tree = Some(tree);
        self
    }

    fn build_tree(&self) -> MenuTree {
        if let Some(tree) = &self.tree {
            return tree.clone();
        }
        let mut tree = MenuTree::with_root(self.title.clone().unwrap_or_else(|| "Main menu".to_owned()));
        let top = tree.top();
        for spec in &self.symbols {
            for (site, def) in spec.sites.iter().enumerate() {
                tree.add_child(
                    top,
                    node(
                        NodeItem::Symbol {
                            name: spec.name.clone(),
                            site,
                        },
                        def.prompt.as_deref(),
                        def.file.clone(),
                        def.line,
                    ),
                );
            }
        }
        tree
    }
}

#[derive(Debug, Clone)]
struct SymbolState {
    spec: SymbolSpec,
    user_value: Option<String>,
    value: String,
    unmet: Vec<DepClause>,
    visible: bool,
}

/// The evaluation produced by [`FixtureEngine`].
#[derive(Debug)]
pub struct FixtureEvaluation {
    order: Vec<String>,
    symbols: HashMap<String, SymbolState>,
    tree: MenuTree,
}

impl FixtureEvaluation {
    fn new(spec: &GraphSpec) -> Self {
        let mut order = Vec::new();
        let mut symbols = HashMap::new();
        for sym in &spec.symbols {
            order.push(sym.name.clone());
            symbols.insert(
                sym.name.clone(),
                SymbolState {
                    spec: sym.clone(),
                    user_value: None,
                    value: String::new(),
                    unmet: Vec::new(),
                    visible: false,
                },
            );
        }
        let mut eval = Self {
            order,
            symbols,
            tree: spec.build_tree(),
        };
        eval.recompute();
        eval
    }

    fn clause_satisfied(&self, dep: &DepSpec) -> bool {
        match dep {
            DepSpec::Symbol(name) => self
                .symbols
                .get(name)
                .is_some_and(|s| s.value == "y" || s.value == "m"),
            DepSpec::Expr { satisfied, .. } => *satisfied,
        }
    }

    fn clause_info(&self, dep: &DepSpec) -> DepClause {
        match dep {
            DepSpec::Symbol(name) => DepClause {
                display: name.clone(),
                satisfied: self.clause_satisfied(dep),
                bool_symbol: self
                    .symbols
                    .get(name)
                    .filter(|s| s.spec.symbol_type == SymbolType::Bool)
                    .map(|_| name.clone()),
            },
            DepSpec::Expr { display, satisfied } => DepClause {
                display: display.clone(),
                satisfied: *satisfied,
                bool_symbol: None,
            },
        }
    }

    fn recompute(&mut self) {
        for name in self.order.clone() {
            let Some(state) = self.symbols.get(&name) else {
                continue;
            };
            let clauses: Vec<DepClause> =
                state.spec.deps.iter().map(|d| self.clause_info(d)).collect();
            let deps_sat = clauses.iter().all(|c| c.satisfied);
            let visible = state.spec.has_prompt() && deps_sat;

            let Some(state) = self.symbols.get_mut(&name) else {
                continue;
            };
            let assigned = if visible { state.user_value.clone() } else { None };
            state.value = match state.spec.symbol_type {
                SymbolType::Bool | SymbolType::Tristate => {
                    if deps_sat {
                        assigned
                            .or_else(|| state.spec.default.clone())
                            .unwrap_or_else(|| "n".to_owned())
                    } else {
                        "n".to_owned()
                    }
                }
                SymbolType::String | SymbolType::Int | SymbolType::Hex => {
                    if deps_sat {
                        assigned
                            .or_else(|| state.spec.default.clone())
                            .unwrap_or_default()
                    } else {
                        String::new()
                    }
                }
                SymbolType::Unknown => String::new(),
            };
            state.visible = visible;
            state.unmet = clauses.into_iter().filter(|c| !c.satisfied).collect();
        }
    }

    fn info(&self, state: &SymbolState) -> SymbolInfo {
        let assignable = match (state.spec.symbol_type, state.visible) {
            (SymbolType::Bool, true) => vec![Tristate::N, Tristate::Y],
            (SymbolType::Tristate, true) => vec![Tristate::N, Tristate::M, Tristate::Y],
            _ => Vec::new(),
        };
        SymbolInfo {
            name: state.spec.name.clone(),
            symbol_type: state.spec.symbol_type,
            value: state.value.clone(),
            user_value: state.user_value.clone(),
            visible: state.visible,
            assignable,
            default_value: state.spec.default.clone(),
            sites: state.spec.sites.clone(),
            unmet_deps: state.unmet.clone(),
        }
    }

    fn lexically_valid(symbol_type: SymbolType, value: &str) -> bool {
        match symbol_type {
            SymbolType::Bool => matches!(value, "y" | "n"),
            SymbolType::Tristate => matches!(value, "y" | "m" | "n"),
            SymbolType::Int => value.parse::<i64>().is_ok(),
            SymbolType::Hex => {
                let digits = value.strip_prefix("0x").unwrap_or(value);
                !digits.is_empty() && i64::from_str_radix(digits, 16).is_ok()
            }
            SymbolType::String | SymbolType::Unknown => true,
        }
    }
}

impl Evaluation for FixtureEvaluation {
    fn symbol(&self, name: &str) -> Option<SymbolInfo> {
        self.symbols.get(name).map(|s| self.info(s))
    }

    fn symbols(&self) -> Vec<SymbolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.symbols.get(name))
            .map(|s| self.info(s))
            .collect()
    }

    fn symbol_count(&self) -> usize {
        self.order.len()
    }

    fn apply_config(&mut self, content: &str, replace: bool) -> Vec<EngineWarning> {
        let mut warnings = Vec::new();
        if replace {
            for state in self.symbols.values_mut() {
                state.user_value = None;
            }
        }
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some(rest) = trimmed.strip_prefix("CONFIG_") else {
                continue;
            };
            let Some((name, raw)) = rest.split_once('=') else {
                continue;
            };
            let value = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(raw)
                .to_owned();
            if self.symbols.contains_key(name) {
                let Some(state) = self.symbols.get_mut(name) else {
                    continue;
                };
                if state.user_value.is_some() {
                    warnings.push(EngineWarning {
                        message: format!("{name} set more than once."),
                        filename: None,
                        line: None,
                        kind: WarningKind::DuplicateAssignment,
                    });
                }
                state.user_value = Some(value);
            } else {
                // Undefined names materialize as unknown symbols, the way
                // the real engine records stray assignments.
                let mut spec = SymbolSpec::new(name, SymbolType::Unknown);
                spec.sites.clear();
                self.order.push(name.to_owned());
                self.symbols.insert(
                    name.to_owned(),
                    SymbolState {
                        spec,
                        user_value: Some(value),
                        value: String::new(),
                        unmet: Vec::new(),
                        visible: false,
                    },
                );
            }
        }
        self.recompute();
        warnings
    }

    fn set_value(&mut self, name: &str, value: &str) -> bool {
        let Some(state) = self.symbols.get_mut(name) else {
            return false;
        };
        if !Self::lexically_valid(state.spec.symbol_type, value) {
            return false;
        }
        state.user_value = Some(value.to_owned());
        self.recompute();
        true
    }

    fn unset_value(&mut self, name: &str) {
        if let Some(state) = self.symbols.get_mut(name) {
            state.user_value = None;
            self.recompute();
        }
    }

    fn tree(&self) -> &MenuTree {
        &self.tree
    }
}

/// Engine serving a fixed [`GraphSpec`] for every root.
#[derive(Debug, Clone, Default)]
pub struct FixtureEngine {
    spec: GraphSpec,
    fail: Option<EvalError>,
}

impl FixtureEngine {
    /// Serve the given graph.
    #[must_use]
    pub fn new(spec: GraphSpec) -> Self {
        Self { spec, fail: None }
    }

    /// Serve an empty graph. Sessions evaluate without error but never
    /// become valid, since a tree without symbols is not a configuration.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fail every evaluation with the given error.
    #[must_use]
    pub fn failing(error: EvalError) -> Self {
        Self {
            spec: GraphSpec::default(),
            fail: Some(error),
        }
    }
}

impl Engine for FixtureEngine {
    fn evaluate(
        &self,
        _root: &Path,
        _env: &BTreeMap<String, String>,
        _files: &dyn FileSource,
    ) -> Result<Box<dyn Evaluation>, EvalError> {
        if let Some(error) = &self.fail {
            return Err(error.clone());
        }
        Ok(Box::new(FixtureEvaluation::new(&self.spec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DiskOnly;

    fn eval(spec: GraphSpec) -> Box<dyn Evaluation> {
        FixtureEngine::new(spec)
            .evaluate(Path::new("Kconfig"), &BTreeMap::new(), &DiskOnly)
            .expect("fixture evaluation")
    }

    fn demo() -> GraphSpec {
        GraphSpec::new()
            .symbol(SymbolSpec::bool("BAR").prompt("Bar support"))
            .symbol(
                SymbolSpec::bool("FOO")
                    .prompt("Foo support")
                    .depends_on("BAR"),
            )
            .symbol(
                SymbolSpec::int("FOO_COUNT")
                    .prompt("Foo instance count")
                    .default_value("4")
                    .depends_on("FOO"),
            )
    }

    #[test]
    fn dependency_propagation_in_declaration_order() {
        let mut eval = eval(demo());
        let foo = eval.symbol("FOO").unwrap();
        assert_eq!(foo.value, "n");
        assert_eq!(foo.unmet_deps.len(), 1);
        assert_eq!(foo.unmet_deps[0].bool_symbol.as_deref(), Some("BAR"));

        eval.apply_config("CONFIG_BAR=y\nCONFIG_FOO=y\n", false);
        let foo = eval.symbol("FOO").unwrap();
        assert_eq!(foo.value, "y");
        assert!(foo.unmet_deps.is_empty());
        // FOO_COUNT's default kicks in once its dependency is met.
        assert_eq!(eval.symbol("FOO_COUNT").unwrap().value, "4");
    }

    #[test]
    fn unmet_dependency_suppresses_assignment() {
        let mut eval = eval(demo());
        eval.apply_config("CONFIG_FOO=y\n", false);
        let foo = eval.symbol("FOO").unwrap();
        assert_eq!(foo.user_value.as_deref(), Some("y"));
        assert_eq!(foo.value, "n");
        assert!(!foo.visible);
    }

    #[test]
    fn replace_clears_previous_user_values() {
        let mut eval = eval(demo());
        eval.apply_config("CONFIG_BAR=y\n", false);
        assert_eq!(eval.symbol("BAR").unwrap().value, "y");
        eval.apply_config("CONFIG_FOO=y\n", true);
        assert_eq!(eval.symbol("BAR").unwrap().user_value, None);
        assert_eq!(eval.symbol("BAR").unwrap().value, "n");
    }

    #[test]
    fn undefined_assignment_materializes_unknown_symbol() {
        let mut eval = eval(demo());
        eval.apply_config("CONFIG_TYPO=y\n", false);
        let typo = eval.symbol("TYPO").unwrap();
        assert_eq!(typo.symbol_type, SymbolType::Unknown);
        assert!(typo.sites.is_empty());
    }

    #[test]
    fn duplicate_assignment_warns_with_kind() {
        let mut eval = eval(demo());
        let warnings = eval.apply_config("CONFIG_BAR=y\nCONFIG_BAR=n\n", false);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::DuplicateAssignment);
        assert_eq!(eval.symbol("BAR").unwrap().value, "n");
    }

    #[test]
    fn quoted_string_values_are_unwrapped() {
        let spec = GraphSpec::new().symbol(SymbolSpec::string("NAME").prompt("Device name"));
        let mut eval = eval(spec);
        eval.apply_config("CONFIG_NAME=\"tester\"\n", false);
        assert_eq!(eval.symbol("NAME").unwrap().value, "tester");
    }

    #[test]
    fn set_value_validates_lexically() {
        let mut eval = eval(demo());
        assert!(!eval.set_value("BAR", "maybe"));
        assert!(eval.set_value("BAR", "y"));
        assert!(!eval.set_value("FOO_COUNT", "0x10"));
        assert!(eval.set_value("FOO_COUNT", "16"));
        assert!(!eval.set_value("MISSING", "y"));
    }

    #[test]
    fn failing_engine_reports_error() {
        let engine = FixtureEngine::failing(EvalError::at("unexpected token", "soc/Kconfig", 14));
        let Err(err) = engine.evaluate(Path::new("Kconfig"), &BTreeMap::new(), &DiskOnly) else {
            panic!("expected evaluation to fail");
        };
        assert_eq!(err.location.as_ref().unwrap().1, 14);
    }

    #[test]
    fn derived_tree_has_one_node_per_site() {
        let spec = GraphSpec::new().symbol(
            SymbolSpec::bool("UART")
                .prompt("UART driver")
                .site("boards/Kconfig", 5, Some("Board UART")),
        );
        let eval = eval(spec);
        let tree = eval.tree();
        assert!(tree.symbol_node("UART", 0).is_some());
        assert!(tree.symbol_node("UART", 1).is_some());
        assert_eq!(tree.listing(tree.top()).len(), 2);
    }
}
