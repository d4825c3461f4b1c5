//! Plugin options and bridge configuration.
//!
//! [`Options`] is the JSON bag the plugin is constructed with; [`BridgeConfig`]
//! adds the app root and the markers that identify rewritten output trees.

use crate::error::Error;
use crate::virtual_modules::VIRTUAL_LOADER_NAME;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Path fragments marking the rewritten package and app output trees.
pub const DEFAULT_REWRITTEN_MARKERS: &[&str] = &["/rewritten-packages/", "/rewritten-app"];

/// Plugin options as accepted at construction.
///
/// Everything except `publicAssetURL` is passed through untouched to the
/// host or to auxiliary loaders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Overrides merged into the host configuration.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub webpack_config: Value,

    /// Public URL prefix for emitted assets.
    #[serde(rename = "publicAssetURL", skip_serializing_if = "Option::is_none")]
    pub public_asset_url: Option<String>,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub thread_loader_options: Value,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub babel_loader_options: Value,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub css_loader_options: Value,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub style_loader_options: Value,
}

impl Options {
    /// Load options from a JSON file.
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
}

/// Settings for one plugin instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Root of the app being built; encoded into virtual specifiers.
    pub app_root: PathBuf,

    /// A context containing any of these is a rewritten package or app
    /// location, where implicit-module requests may arrive without an issuer.
    pub rewritten_markers: Vec<String>,

    /// Module path the virtual loader name is aliased to. Defaults to the
    /// loader inside the app's `node_modules`.
    pub virtual_loader_path: Option<PathBuf>,

    pub options: Options,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            rewritten_markers: DEFAULT_REWRITTEN_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            virtual_loader_path: None,
            options: Options::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a config for the app at `app_root`.
    #[must_use]
    pub fn new(app_root: PathBuf) -> Self {
        Self {
            app_root,
            ..Default::default()
        }
    }

    /// Replace the rewritten-location markers.
    #[must_use]
    pub fn with_rewritten_markers(mut self, markers: Vec<String>) -> Self {
        self.rewritten_markers = markers;
        self
    }

    /// Set the virtual loader module path.
    #[must_use]
    pub fn with_virtual_loader_path(mut self, path: PathBuf) -> Self {
        self.virtual_loader_path = Some(path);
        self
    }

    /// Set plugin options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Where the virtual loader name should resolve to.
    #[must_use]
    pub fn loader_path(&self) -> PathBuf {
        self.virtual_loader_path.clone().unwrap_or_else(|| {
            self.app_root
                .join("node_modules")
                .join(format!("{VIRTUAL_LOADER_NAME}.js"))
        })
    }

    /// Whether `context` lies in a rewritten package or app tree.
    #[must_use]
    pub fn is_rewritten_location(&self, context: &str) -> bool {
        self.rewritten_markers
            .iter()
            .any(|marker| context.contains(marker.as_str()))
    }
}
