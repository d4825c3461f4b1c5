//! Registry of synthesized ("virtual") modules seen during a build.
//!
//! Imports made from inside a virtual module reach the resolve hook with a
//! missing or wrong issuer. The only thing the host does get right is the
//! context directory, so we remember which virtual module lives in which
//! directory and use that to put the issuer back.
//!
//! Virtual modules are addressed through a reserved loader:
//!
//! ```text
//! !@embroider/webpack/src/virtual-loader?f=%2Fapp%2Fassets%2Fapp.js&a=%2Fapp!
//! ```
//!
//! `f` is the module's filename and `a` the app root.

use crate::paths::{directory_of, same_dir};
use rustc_hash::FxHashMap as HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::trace;
use url::form_urlencoded;

/// Reserved loader name that synthesizes virtual modules.
pub const VIRTUAL_LOADER_NAME: &str = "@embroider/webpack/src/virtual-loader";

/// Prefix placed before the loader name in a virtual specifier. A leading
/// `!` tells the host to skip its configured loaders for this request.
pub const VIRTUAL_LOADER_PREFIX: &str = "!";

/// Separator between stages of a loader chain.
pub const LOADER_SEPARATOR: char = '!';

/// Build the specifier that loads `filename` as a virtual module.
#[must_use]
pub fn encode_virtual_specifier(filename: &str, app_root: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("f", filename)
        .append_pair("a", app_root)
        .finish();
    format!("{VIRTUAL_LOADER_PREFIX}{VIRTUAL_LOADER_NAME}?{query}{LOADER_SEPARATOR}")
}

/// Whether `specifier` goes through the virtual loader.
#[must_use]
pub fn references_virtual_loader(specifier: &str) -> bool {
    specifier.contains(VIRTUAL_LOADER_NAME)
}

/// Whether `specifier` is a loader chain.
#[must_use]
pub fn is_loader_chain(specifier: &str) -> bool {
    specifier.contains(LOADER_SEPARATOR)
}

/// Extract `(directory, filename)` from a virtual loader specifier.
///
/// Returns `None` when the specifier does not reference the loader, has no
/// query, or the query carries no `f` parameter.
#[must_use]
pub fn decode_virtual_specifier(specifier: &str) -> Option<(String, String)> {
    let (_, after) = specifier.split_once(VIRTUAL_LOADER_NAME)?;
    let query = after.strip_prefix('?')?;
    let query = query.split_once(LOADER_SEPARATOR).map_or(query, |(q, _)| q);

    let filename = form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "f")
        .map(|(_, value)| value.into_owned())
        .filter(|f| !f.is_empty())?;

    Some((directory_of(&filename), filename))
}

#[derive(Debug, Default)]
struct Entries {
    /// Insertion-ordered `(directory, filename)` pairs.
    order: Vec<(String, String)>,
    /// Directory key to position in `order`.
    index: HashMap<String, usize>,
}

/// Append-only map from directory to the virtual module living there.
///
/// Shared by every resolve hook invocation of one plugin instance. Entries
/// are never removed; a directory recorded twice keeps its original
/// position and takes the latest filename.
#[derive(Debug, Default)]
pub struct VirtualModules {
    entries: RwLock<Entries>,
}

impl VirtualModules {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `filename` under its own directory.
    ///
    /// Returns `true` if the registry changed.
    pub fn record(&self, filename: &str) -> bool {
        self.insert(&directory_of(filename), filename)
    }

    /// Record the virtual module named by a loader specifier.
    ///
    /// Specifiers that do not decode are ignored.
    pub fn record_specifier(&self, specifier: &str) -> bool {
        if let Some((dir, filename)) = decode_virtual_specifier(specifier) {
            self.insert(&dir, &filename)
        } else {
            trace!(specifier, "no virtual module in loader specifier");
            false
        }
    }

    /// Record `filename` under an explicit directory key.
    pub fn insert(&self, directory: &str, filename: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(&pos) = entries.index.get(directory) {
            let slot = &mut entries.order[pos].1;
            if slot.as_str() == filename {
                return false;
            }
            *slot = filename.to_string();
            return true;
        }

        trace!(directory, filename, "recording virtual module");
        let pos = entries.order.len();
        entries
            .order
            .push((directory.to_string(), filename.to_string()));
        entries.index.insert(directory.to_string(), pos);
        true
    }

    /// Exact-key lookup.
    #[must_use]
    pub fn lookup(&self, directory: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .index
            .get(directory)
            .map(|&pos| entries.order[pos].1.clone())
    }

    /// Linear scan comparing each entry's directory path-wise.
    ///
    /// When several entries match, the earliest recorded wins.
    #[must_use]
    pub fn scan(&self, directory: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .order
            .iter()
            .find(|(dir, _)| same_dir(dir, directory))
            .map(|(_, filename)| filename.clone())
    }

    /// [`lookup`](Self::lookup), falling back to [`scan`](Self::scan).
    #[must_use]
    pub fn find(&self, directory: &str) -> Option<String> {
        self.lookup(directory).or_else(|| self.scan(directory))
    }

    /// Number of tracked directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
