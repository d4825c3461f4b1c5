//! A data-driven declarative resolver.
//!
//! Rules come from a JSON file written by the build's prepare step:
//!
//! ```json
//! {
//!   "renamedPackages": { "ember-data": "@ember-data/store" },
//!   "virtualFiles": { "#embroider-entrypoint": "/app/assets/app.js" },
//!   "relocatedFiles": { "/app/old/a.js": "/app/rewritten-app/a.js" }
//! }
//! ```
//!
//! Order per request: relocate the issuer, then virtualize, then rename the
//! package, then ask the fallback.

use crate::error::{Error, ResolveError};
use crate::fallback::FallbackResolver;
use crate::host::Meta;
use crate::paths::{is_bare, split_bare_specifier};
use crate::request::Request;
use crate::resolver::{ModuleResolver, Resolution};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::trace;

/// Meta key recording which rule rewrote a request.
pub const RULE_META_KEY: &str = "embroiderRule";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleConfig {
    /// Package name to replacement package name.
    pub renamed_packages: BTreeMap<String, String>,
    /// Exact specifier to the absolute file it is synthesized from.
    pub virtual_files: BTreeMap<String, String>,
    /// Issuer file to the file it now lives at.
    pub relocated_files: BTreeMap<String, String>,
}

impl RuleConfig {
    /// Load rules from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rename the package part of a bare specifier, keeping any subpath.
    #[must_use]
    pub fn rename(&self, specifier: &str) -> Option<String> {
        if !is_bare(specifier) {
            return None;
        }
        let (name, subpath) = split_bare_specifier(specifier);
        let renamed = self.renamed_packages.get(name)?;
        Some(match subpath {
            Some(sub) => format!("{renamed}/{sub}"),
            None => renamed.clone(),
        })
    }
}

/// [`ModuleResolver`] applying a [`RuleConfig`].
#[derive(Debug, Clone, Default)]
pub struct RuleResolver {
    rules: RuleConfig,
}

impl RuleResolver {
    #[must_use]
    pub fn new(rules: RuleConfig) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleConfig {
        &self.rules
    }
}

fn tag(request: Request, rule: &str) -> Request {
    let mut meta = request.meta().cloned().unwrap_or_else(Meta::new);
    meta.insert(RULE_META_KEY.to_string(), Value::String(rule.to_string()));
    request.with_meta(meta)
}

#[async_trait]
impl ModuleResolver for RuleResolver {
    async fn resolve(
        &self,
        request: Request,
        fallback: &FallbackResolver,
    ) -> Result<Resolution, ResolveError> {
        let mut request = request;

        if let Some(to) = self.rules.relocated_files.get(request.from_file()) {
            trace!(from = request.from_file(), to = %to, "relocated issuer");
            request = tag(request.rehome(to.clone()), "relocatedFile");
        }

        if let Some(filename) = self.rules.virtual_files.get(request.specifier()) {
            if !Path::new(filename).is_absolute() {
                return Err(ResolveError::resolver(format!(
                    "virtual file for '{}' must be an absolute path, got '{filename}'",
                    request.specifier()
                )));
            }
            let request = tag(request, "virtualFile").virtualize(filename);
            return Ok(Resolution::Found(request));
        }

        if let Some(renamed) = self.rules.rename(request.specifier()) {
            request = tag(request.alias(renamed), "renamedPackage");
        }

        Ok(fallback.resolve(request).await)
    }
}
