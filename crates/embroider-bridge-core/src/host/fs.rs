//! Filesystem-backed native resolver.
//!
//! ## Specifier Types
//!
//! - Relative: `./utils`, `../lib/foo`
//! - Absolute: `/abs/path/to/module`
//! - Bare: `lodash`, `@scope/pkg`, `@scope/pkg/sub/path`
//! - Builtin: `node:fs` (returned as-is)

use super::NativeResolver;
use crate::error::ResolveError;
use crate::paths::split_bare_specifier;
use async_trait::async_trait;
use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Extensions probed, in order, when a specifier names no existing file.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".ts", ".mjs", ".cjs", ".hbs", ".json"];

const INDEX_FILES: &[&str] = &["index.js", "index.ts", "index.mjs", "index.hbs"];

type CacheKey = (PathBuf, String);

/// Native resolver over the real filesystem.
///
/// Probing runs on tokio's blocking pool. Results, including misses, are
/// cached per `(base_dir, specifier)` and shared between clones.
#[derive(Debug, Clone)]
pub struct FsResolver {
    extensions: Arc<[String]>,
    cache: Arc<RwLock<HashMap<CacheKey, Option<PathBuf>>>>,
}

impl Default for FsResolver {
    fn default() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS)
    }
}

impl FsResolver {
    /// Create a resolver with the default extension list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver probing `extensions` (each with its leading dot).
    #[must_use]
    pub fn with_extensions(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(ToString::to_string).collect(),
            cache: Arc::new(RwLock::new(HashMap::default())),
        }
    }

    /// Resolve synchronously.
    pub fn resolve_sync(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let key = (base_dir.to_path_buf(), specifier.to_string());
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(cached.clone());
        }

        let result = self.resolve_uncached(base_dir, specifier)?;

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result.clone());

        Ok(result)
    }

    fn resolve_uncached(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if specifier.is_empty() {
            return Ok(None);
        }

        if specifier.starts_with("node:") {
            return Ok(Some(PathBuf::from(specifier)));
        }

        if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." {
            return Ok(self.probe(&base_dir.join(specifier)));
        }

        if Path::new(specifier).is_absolute() {
            return Ok(self.probe(Path::new(specifier)));
        }

        self.resolve_bare(base_dir, specifier)
    }

    /// Walk up from `base_dir` through each `node_modules`.
    fn resolve_bare(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let (pkg_name, subpath) = split_bare_specifier(specifier);

        for dir in base_dir.ancestors() {
            let pkg_dir = dir.join("node_modules").join(pkg_name);
            if !pkg_dir.is_dir() {
                continue;
            }

            if let Some(sub) = subpath {
                if let Some(found) = self.probe(&pkg_dir.join(sub)) {
                    return Ok(Some(found));
                }
                continue;
            }

            if let Some(found) = self.package_entry(&pkg_dir, specifier)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// Entry point from `package.json` `module`/`main`, then `index.*`.
    fn package_entry(
        &self,
        pkg_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let pkg_json = pkg_dir.join("package.json");
        if pkg_json.is_file() {
            let content = std::fs::read_to_string(&pkg_json)
                .map_err(|e| ResolveError::native(specifier, e.to_string()))?;
            let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                ResolveError::native(specifier, format!("{}: {e}", pkg_json.display()))
            })?;

            for field in ["module", "main"] {
                if let Some(entry) = json.get(field).and_then(|v| v.as_str()) {
                    if let Some(found) = self.probe(&pkg_dir.join(entry)) {
                        return Ok(Some(found));
                    }
                }
            }
        }

        Ok(probe_index(pkg_dir))
    }

    /// The path itself, then with each extension, then as a directory.
    fn probe(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return canonical(target);
        }

        for ext in self.extensions.iter() {
            let with_ext = PathBuf::from(format!("{}{ext}", target.display()));
            if with_ext.is_file() {
                return canonical(&with_ext);
            }
        }

        if target.is_dir() {
            return probe_index(target);
        }

        None
    }

}

fn probe_index(dir: &Path) -> Option<PathBuf> {
    INDEX_FILES
        .iter()
        .map(|index| dir.join(index))
        .find(|p| p.is_file())
        .and_then(|p| canonical(&p))
}

fn canonical(path: &Path) -> Option<PathBuf> {
    dunce::canonicalize(path).ok()
}

#[async_trait]
impl NativeResolver for FsResolver {
    async fn resolve(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let this = self.clone();
        let base_dir = base_dir.to_path_buf();
        let spec = specifier.to_string();

        tokio::task::spawn_blocking(move || this.resolve_sync(&base_dir, &spec))
            .await
            .map_err(|e| ResolveError::native(specifier, e.to_string()))?
    }
}
