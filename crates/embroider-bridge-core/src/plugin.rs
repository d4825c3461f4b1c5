//! The resolve hook handler.
//!
//! ## States
//!
//! ```text
//! received -> validated -> (issuer repair) -> dispatched -> found
//!                                                        -> implicit (empty module)
//!                                                        -> passthrough
//!                                                        -> error
//! ```
//!
//! Anything that is not ours, or that we cannot give a trustworthy issuer,
//! is declined so the host's default resolution gets a go at it.

use crate::config::BridgeConfig;
use crate::fallback::FallbackResolver;
use crate::host::{
    Completion, HookSignal, NativeResolver, ResolveDataHandle, ResolveHook, ResolveHooks,
};
use crate::paths::join;
use crate::request::Request;
use crate::resolver::{ModuleResolver, Resolution};
use crate::virtual_modules::{
    references_virtual_loader, VirtualModules, LOADER_SEPARATOR, VIRTUAL_LOADER_NAME,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Name the plugin taps the resolve hook under.
pub const PLUGIN_NAME: &str = "embroider";

/// Placeholder issuer file name for implicit-module requests.
pub const IMPLICIT_MODULES_FILE: &str = "-embroider-implicit-modules.js";

/// Specifier standing in for an optional module that does not exist.
pub const EMPTY_MODULE: &str = "data:text/javascript,export default {};";

const IMPLICIT_MODULE_PATTERNS: &[&str] = &[
    "-embroider-implicit-modules",
    "-embroider-implicit-test-modules",
];

/// Whether `specifier` names an implicit-modules aggregate.
#[must_use]
pub fn is_implicit_modules(specifier: &str) -> bool {
    IMPLICIT_MODULE_PATTERNS
        .iter()
        .any(|pattern| specifier.contains(pattern))
}

/// Drives a [`ModuleResolver`] from the host's resolve hook.
pub struct EmbroiderPlugin {
    config: BridgeConfig,
    app_root: Arc<str>,
    resolver: Arc<dyn ModuleResolver>,
    fallback: FallbackResolver,
}

impl EmbroiderPlugin {
    /// Create a plugin with a fresh virtual module registry.
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        resolver: Arc<dyn ModuleResolver>,
        native: Arc<dyn NativeResolver>,
    ) -> Self {
        Self::with_virtual_modules(config, resolver, native, Arc::new(VirtualModules::new()))
    }

    /// Create a plugin recording into an existing registry.
    #[must_use]
    pub fn with_virtual_modules(
        config: BridgeConfig,
        resolver: Arc<dyn ModuleResolver>,
        native: Arc<dyn NativeResolver>,
        virtual_modules: Arc<VirtualModules>,
    ) -> Self {
        let app_root: Arc<str> = config.app_root.to_string_lossy().into();
        Self {
            config,
            app_root,
            resolver,
            fallback: FallbackResolver::new(native, virtual_modules),
        }
    }

    /// Register the virtual loader alias and tap the resolve hook.
    pub fn apply(self: Arc<Self>, hooks: &mut ResolveHooks) {
        hooks.alias_loader(
            VIRTUAL_LOADER_NAME,
            self.config.loader_path().to_string_lossy(),
        );
        hooks.tap(self);
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn virtual_modules(&self) -> &Arc<VirtualModules> {
        self.fallback.virtual_modules()
    }

    /// Run one resolution and decide the host signal.
    pub async fn handle(&self, data: &ResolveDataHandle) -> HookSignal {
        let Some(request) = Request::from_handle(data.clone(), Arc::clone(&self.app_root)) else {
            debug!("declining: no request or context");
            return HookSignal::Proceed;
        };

        if references_virtual_loader(request.specifier()) {
            self.virtual_modules().record_specifier(request.specifier());
            debug!(specifier = request.specifier(), "declining: virtual loader request");
            return HookSignal::Proceed;
        }

        if request.specifier().starts_with(LOADER_SEPARATOR) {
            debug!(specifier = request.specifier(), "declining: loader chain");
            return HookSignal::Proceed;
        }

        let request = self.repair_issuer(request);

        if request.from_file().is_empty() && !is_implicit_modules(request.specifier()) {
            debug!(specifier = request.specifier(), "declining: no issuer");
            return HookSignal::Proceed;
        }

        self.dispatch(request).await
    }

    /// Put back the issuer the host loses for imports made from inside
    /// virtual modules, or invent one for implicit-module requests from
    /// rewritten trees.
    fn repair_issuer(&self, request: Request) -> Request {
        let context = request.handle().context().unwrap_or_default();

        if let Some(virtual_file) = self.virtual_modules().find(&context) {
            if virtual_file == request.from_file() {
                return request;
            }
            debug!(
                context = %context,
                issuer = %virtual_file,
                "issuer repaired from virtual module"
            );
            return request.restore_issuer(virtual_file);
        }

        if request.from_file().is_empty() && self.config.is_rewritten_location(&context) {
            let issuer = join(&context, IMPLICIT_MODULES_FILE);
            debug!(context = %context, issuer = %issuer, "synthesized implicit-modules issuer");
            return request.restore_issuer(issuer);
        }

        request
    }

    async fn dispatch(&self, request: Request) -> HookSignal {
        let specifier = request.specifier().to_string();
        let implicit = is_implicit_modules(&specifier);
        let fallback_view = request.clone();

        match self.resolver.resolve(request, &self.fallback).await {
            Ok(Resolution::Found(found)) => {
                debug!(
                    specifier = %specifier,
                    resolved = found.specifier(),
                    "found"
                );
                HookSignal::Handled
            }
            Ok(Resolution::NotFound(err)) if implicit => {
                debug!(
                    specifier = %specifier,
                    error = %err,
                    "implicit module absent, using empty module"
                );
                fallback_view.alias(EMPTY_MODULE);
                HookSignal::Handled
            }
            Ok(Resolution::NotFound(err)) => {
                debug!(specifier = %specifier, error = %err, "passthrough: not found");
                HookSignal::Proceed
            }
            Err(err) if implicit => {
                debug!(
                    specifier = %specifier,
                    error = %err,
                    "implicit module failed, using empty module"
                );
                fallback_view.alias(EMPTY_MODULE);
                HookSignal::Handled
            }
            Err(err) => {
                debug!(specifier = %specifier, error = %err, "error");
                HookSignal::Fail(err)
            }
        }
    }
}

#[async_trait]
impl ResolveHook for EmbroiderPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    async fn resolve(&self, data: ResolveDataHandle, done: Completion) {
        match self.handle(&data).await {
            HookSignal::Proceed => done.proceed(),
            HookSignal::Handled => done.handled(),
            HookSignal::Fail(err) => done.fail(err),
        }
    }
}
