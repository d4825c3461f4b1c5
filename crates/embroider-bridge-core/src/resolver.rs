//! Contract for the declarative resolver the plugin drives.

use crate::error::ResolveError;
use crate::fallback::FallbackResolver;
use crate::request::Request;
use async_trait::async_trait;

/// Outcome of resolving one request.
///
/// Callers match this exhaustively; a new variant must be handled at every
/// site that consumes one.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Resolved. The host record already reflects any rewrites; the carried
    /// request is the newest view of it.
    Found(Request),
    /// Every attempted path failed.
    NotFound(ResolveError),
}

impl Resolution {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A declarative module resolver.
///
/// It inspects and rewrites the [`Request`], and calls `fallback` for
/// anything it cannot decide itself. `Err` means the resolver failed
/// outright, which is distinct from a clean [`Resolution::NotFound`].
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(
        &self,
        request: Request,
        fallback: &FallbackResolver,
    ) -> Result<Resolution, ResolveError>;
}
