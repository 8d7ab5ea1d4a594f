//! The seam between the server and the Kconfig evaluation engine.
//!
//! The server never touches engine internals; it drives one [`Evaluation`]
//! per session through this interface and consumes the typed snapshots from
//! [`crate::symbol`]. Engines read definition files through a [`FileSource`]
//! so that evaluation sees live editor buffers instead of stale disk state.

use crate::symbol::{EngineWarning, EvalError, SymbolInfo};
use crate::tree::MenuTree;
use std::collections::BTreeMap;
use std::path::Path;

/// Read hook for definition files.
///
/// Implementations return the in-memory contents for `path`, or `None` to
/// let the engine fall back to the filesystem. Returning `None` must never
/// fabricate an empty file; probing for optional files relies on it.
pub trait FileSource {
    /// The live contents of `path`, if any.
    fn read(&self, path: &Path) -> Option<String>;
}

/// A `FileSource` that always defers to the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskOnly;

impl FileSource for DiskOnly {
    fn read(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// A Kconfig evaluation engine.
pub trait Engine: Send + Sync {
    /// Evaluate the tree rooted at `root` with the given environment.
    ///
    /// `files` is consulted before the filesystem for every file the
    /// evaluation opens.
    fn evaluate(
        &self,
        root: &Path,
        env: &BTreeMap<String, String>,
        files: &dyn FileSource,
    ) -> Result<Box<dyn Evaluation>, EvalError>;
}

/// One live evaluation of a Kconfig tree.
///
/// All mutation goes through [`apply_config`], [`set_value`] and
/// [`unset_value`]; the snapshot accessors reflect the state after the last
/// mutation.
///
/// [`apply_config`]: Evaluation::apply_config
/// [`set_value`]: Evaluation::set_value
/// [`unset_value`]: Evaluation::unset_value
pub trait Evaluation {
    /// Snapshot of the named symbol (name without the `CONFIG_` prefix).
    fn symbol(&self, name: &str) -> Option<SymbolInfo>;

    /// Snapshots of every symbol, in stable evaluation order.
    fn symbols(&self) -> Vec<SymbolInfo>;

    /// Number of defined symbols.
    fn symbol_count(&self) -> usize;

    /// Apply the contents of a configuration file.
    ///
    /// With `replace`, all previously assigned user values are cleared
    /// first; without it, assignments add to the current user values.
    /// Assigning an undefined name materializes an [`Unknown`]-typed symbol.
    ///
    /// [`Unknown`]: crate::SymbolType::Unknown
    fn apply_config(&mut self, content: &str, replace: bool) -> Vec<EngineWarning>;

    /// Assign a user value to a symbol. Returns whether the value was
    /// lexically valid for the symbol's type.
    fn set_value(&mut self, name: &str, value: &str) -> bool;

    /// Revert a previous [`set_value`](Evaluation::set_value).
    fn unset_value(&mut self, name: &str);

    /// The menu tree of this evaluation.
    fn tree(&self) -> &MenuTree;
}
