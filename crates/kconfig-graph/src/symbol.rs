//! Typed views of the symbols exposed by a Kconfig evaluation.
//!
//! The evaluation engine owns the real symbol objects; the server only ever
//! sees the snapshot types in this module. Everything the session layer and
//! the lint pipeline need (type, effective value, visibility, dependency
//! clauses, definition sites) is an explicit field here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The declared type of a Kconfig symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    /// `bool` symbol, assignable `y`/`n`.
    Bool,
    /// `tristate` symbol, assignable `y`/`m`/`n`.
    Tristate,
    /// Quoted string symbol.
    String,
    /// Decimal integer symbol.
    Int,
    /// Hexadecimal integer symbol.
    Hex,
    /// Symbol without a known type, e.g. one that is only ever assigned.
    Unknown,
}

impl SymbolType {
    /// Canonical lower-case name, as used in messages and wire payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Tristate => "tristate",
            Self::String => "string",
            Self::Int => "int",
            Self::Hex => "hex",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the type holds a numeric value (`int` or `hex`).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Hex)
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tristate value. Ordered so that `N < M < Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    /// Disabled.
    N,
    /// Built as a module.
    M,
    /// Enabled.
    Y,
}

impl Tristate {
    /// The kconfig string form (`n`, `m` or `y`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::M => "m",
            Self::Y => "y",
        }
    }

    /// Parse the kconfig string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "n" => Some(Self::N),
            "m" => Some(Self::M),
            "y" => Some(Self::Y),
            _ => None,
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One place a symbol is defined.
///
/// A symbol may be defined in several Kconfig files (or several times in the
/// same file); each definition site may carry its own prompt and help text.
/// Engines must omit the prompt when its condition evaluates to false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSite {
    /// Path of the defining file.
    pub file: PathBuf,
    /// 1-based line of the definition.
    pub line: u32,
    /// Prompt text, when present and its condition holds.
    pub prompt: Option<String>,
    /// Help text, when present.
    pub help: Option<String>,
}

/// One AND-clause of a symbol's direct dependency expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepClause {
    /// Human-readable form of the clause, e.g. `NET_SOCKETS` or `SERIAL && !UART_ASYNC`.
    pub display: String,
    /// Whether the clause currently evaluates to a non-`n` value.
    pub satisfied: bool,
    /// The clause's symbol name when it is a plain boolean symbol reference.
    ///
    /// Only such clauses can be auto-fixed by inserting `CONFIG_<name>=y`.
    pub bool_symbol: Option<String>,
}

/// Owned snapshot of a single symbol, produced by [`Evaluation::symbol`].
///
/// [`Evaluation::symbol`]: crate::Evaluation::symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Symbol name without the `CONFIG_` prefix.
    pub name: String,
    /// Declared type.
    pub symbol_type: SymbolType,
    /// Effective value in kconfig string form (`y`/`m`/`n`, number, or text).
    ///
    /// Empty when the symbol has no value, e.g. an `int` with no default and
    /// unmet dependencies.
    pub value: String,
    /// The value the user assigned, if any, in the same string form.
    pub user_value: Option<String>,
    /// Whether the symbol is currently visible (has a live prompt).
    pub visible: bool,
    /// Values currently assignable through the configuration interface.
    pub assignable: Vec<Tristate>,
    /// The computed default value, if the symbol has one.
    pub default_value: Option<String>,
    /// All definition sites, in evaluation order.
    pub sites: Vec<DefinitionSite>,
    /// Dependency clauses that currently evaluate to `n`.
    pub unmet_deps: Vec<DepClause>,
}

impl SymbolInfo {
    /// First prompt found across the definition sites.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.sites.iter().find_map(|s| s.prompt.as_deref())
    }

    /// First help text found across the definition sites.
    #[must_use]
    pub fn help(&self) -> Option<&str> {
        self.sites.iter().find_map(|s| s.help.as_deref())
    }

    /// Whether any definition site carries a prompt.
    #[must_use]
    pub fn has_prompt(&self) -> bool {
        self.sites.iter().any(|s| s.prompt.is_some())
    }

    /// `NAME (defined at file:line, file:line)` label, used when a symbol
    /// has no prompt to show.
    #[must_use]
    pub fn name_and_loc(&self) -> String {
        if self.sites.is_empty() {
            return format!("{} (undefined)", self.name);
        }
        let sites = self
            .sites
            .iter()
            .map(|s| format!("{}:{}", s.file.display(), s.line))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} (defined at {})", self.name, sites)
    }
}

/// Classification of an engine warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A symbol was assigned more than once while loading configuration
    /// files. The server runs its own duplicate check and suppresses these.
    DuplicateAssignment,
    /// Any other warning.
    Other,
}

/// A warning emitted by the engine while evaluating or applying configuration.
#[derive(Debug, Clone)]
pub struct EngineWarning {
    /// Warning text.
    pub message: String,
    /// The file the warning refers to, when known.
    pub filename: Option<PathBuf>,
    /// 1-based line within `filename`, when known.
    pub line: Option<u32>,
    /// Warning classification.
    pub kind: WarningKind,
}

impl EngineWarning {
    /// A warning without a location.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filename: None,
            line: None,
            kind: WarningKind::Other,
        }
    }
}

/// Failure to evaluate the Kconfig tree.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EvalError {
    /// What went wrong.
    pub message: String,
    /// Definition-file location of the failure, when the engine knows it.
    pub location: Option<(PathBuf, u32)>,
}

impl EvalError {
    /// An evaluation error without a location.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// An evaluation error pinned to a definition-file location.
    #[must_use]
    pub fn at(message: impl Into<String>, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            message: message.into(),
            location: Some((file.into(), line)),
        }
    }
}
