//! The declarative resolver's last resort: ask the host.

use crate::error::ResolveError;
use crate::host::NativeResolver;
use crate::paths::directory_of;
use crate::request::Request;
use crate::resolver::Resolution;
use crate::virtual_modules::{is_loader_chain, references_virtual_loader, VirtualModules};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Wraps the host's native resolver as a `request -> outcome` function.
///
/// Answers only "can the host resolve this"; the resolved path is dropped
/// because the host redoes its own resolution bookkeeping once the hook
/// completes.
#[derive(Clone)]
pub struct FallbackResolver {
    native: Arc<dyn NativeResolver>,
    virtual_modules: Arc<VirtualModules>,
}

impl FallbackResolver {
    #[must_use]
    pub fn new(native: Arc<dyn NativeResolver>, virtual_modules: Arc<VirtualModules>) -> Self {
        Self {
            native,
            virtual_modules,
        }
    }

    /// Resolve the record behind `request` as it stands now.
    ///
    /// Loader chains are already final: they are reported found without
    /// touching the native resolver, after recording any virtual module
    /// they name.
    ///
    /// Everything else resolves from the issuer's directory, or from the
    /// record's context when there is no issuer.
    pub async fn resolve(&self, request: Request) -> Resolution {
        let (specifier, issuer, context) = request.handle().read(|d| {
            (
                d.request.clone().unwrap_or_default(),
                d.context_info.issuer.clone().unwrap_or_default(),
                d.context.clone().unwrap_or_default(),
            )
        });

        if is_loader_chain(&specifier) {
            if references_virtual_loader(&specifier) {
                self.virtual_modules.record_specifier(&specifier);
            }
            trace!(specifier = %specifier, "loader chain, treating as resolved");
            return Resolution::Found(request);
        }

        let (base_dir, from) = if issuer.is_empty() {
            (context.clone(), context)
        } else {
            (directory_of(&issuer), issuer)
        };
        match self.native.resolve(Path::new(&base_dir), &specifier).await {
            Ok(Some(_)) => Resolution::Found(request),
            Ok(None) => {
                debug!(specifier = %specifier, from = %from, "native resolver found nothing");
                Resolution::NotFound(ResolveError::not_found(specifier, from))
            }
            Err(err) => {
                debug!(
                    specifier = %specifier,
                    from = %from,
                    error = %err,
                    "native resolver failed"
                );
                Resolution::NotFound(err)
            }
        }
    }

    /// The registry this fallback records into.
    #[must_use]
    pub fn virtual_modules(&self) -> &Arc<VirtualModules> {
        &self.virtual_modules
    }
}
