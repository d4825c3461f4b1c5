//! The host bundler's side of the resolve protocol.
//!
//! The host owns a mutable [`ResolveData`] record per resolution, fires a
//! chain of named, staged [`ResolveHook`]s over it, and waits for each hook
//! to signal completion exactly once through a [`Completion`].
//!
//! ## Signals
//!
//! - [`Completion::proceed`]: not ours, continue with the next hook and then
//!   the host's default resolution.
//! - [`Completion::handled`]: the record has been mutated, stop here.
//! - [`Completion::fail`]: hard resolution failure.

mod fs;

pub use fs::FsResolver;

use crate::error::ResolveError;
use async_trait::async_trait;
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Opaque metadata carried alongside a request.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Provenance of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// File that contains the import. Unset or empty for some
    /// host-initiated requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Opaque data for the declarative resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// The host's per-resolution state record.
///
/// `issuer` and `context` must agree: whenever the issuer changes, the
/// context becomes the issuer's directory in the same update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveData {
    /// Specifier being resolved.
    #[serde(default)]
    pub request: Option<String>,
    /// Base directory for relative resolution.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub context_info: ContextInfo,
}

impl ResolveData {
    /// Create a record for `request` resolved relative to `context`.
    #[must_use]
    pub fn new(request: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            request: Some(request.into()),
            context: Some(context.into()),
            context_info: ContextInfo::default(),
        }
    }

    /// Set the issuer without touching `context`.
    ///
    /// This mirrors what the host hands us, which is allowed to disagree.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.context_info.issuer = Some(issuer.into());
        self
    }

    /// Set the metadata mapping.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.context_info.meta = Some(meta);
        self
    }
}

#[derive(Debug)]
struct HandleInner {
    data: ResolveData,
    generation: u64,
}

/// Shared handle to one [`ResolveData`] record.
///
/// Cloning the handle shares the record. Every [`update`](Self::update)
/// bumps a generation counter so callers can tell whether anything was
/// written.
#[derive(Debug, Clone)]
pub struct ResolveDataHandle {
    inner: Arc<Mutex<HandleInner>>,
}

impl ResolveDataHandle {
    /// Wrap a record.
    #[must_use]
    pub fn new(data: ResolveData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandleInner {
                data,
                generation: 0,
            })),
        }
    }

    /// Read from the record.
    pub fn read<R>(&self, f: impl FnOnce(&ResolveData) -> R) -> R {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&inner.data)
    }

    /// Mutate the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut ResolveData) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.generation += 1;
        f(&mut inner.data)
    }

    /// Copy of the record as it stands now.
    #[must_use]
    pub fn snapshot(&self) -> ResolveData {
        self.read(Clone::clone)
    }

    /// Current specifier.
    #[must_use]
    pub fn request(&self) -> Option<String> {
        self.read(|d| d.request.clone())
    }

    /// Current issuer.
    #[must_use]
    pub fn issuer(&self) -> Option<String> {
        self.read(|d| d.context_info.issuer.clone())
    }

    /// Current context directory.
    #[must_use]
    pub fn context(&self) -> Option<String> {
        self.read(|d| d.context.clone())
    }

    /// Number of updates applied so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }
}

/// Terminal signal a hook sends to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookSignal {
    /// Continue with default resolution.
    Proceed,
    /// Record mutated, stop.
    Handled,
    /// Hard failure.
    Fail(ResolveError),
}

/// Single-use completion callback for one hook invocation.
///
/// Each method consumes the completion, so a hook can signal at most once.
/// Dropping it without signalling is reported by the host as
/// [`HookError::Abandoned`].
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<HookSignal>,
}

impl Completion {
    /// Create a completion and the receiver the host waits on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<HookSignal>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Let the host continue with its default resolution.
    pub fn proceed(self) {
        self.signal(HookSignal::Proceed);
    }

    /// Tell the host the record is final.
    pub fn handled(self) {
        self.signal(HookSignal::Handled);
    }

    /// Fail the resolution.
    pub fn fail(self, error: ResolveError) {
        self.signal(HookSignal::Fail(error));
    }

    /// Send an already-built signal.
    pub fn signal(self, signal: HookSignal) {
        // The host may have stopped listening; nothing left to tell it.
        let _ = self.tx.send(signal);
    }
}

/// A handler on the host's resolve hook.
#[async_trait]
pub trait ResolveHook: Send + Sync {
    /// Name for logging and error reports.
    fn name(&self) -> &str;

    /// Stage; lower stages run first.
    fn stage(&self) -> i32 {
        0
    }

    /// Handle one resolution. Must signal through `done` exactly once.
    async fn resolve(&self, data: ResolveDataHandle, done: Completion);
}

/// The host's native, filesystem-backed resolver.
#[async_trait]
pub trait NativeResolver: Send + Sync {
    /// Resolve `specifier` relative to `base_dir`.
    ///
    /// `Ok(None)` means the specifier is not resolvable, same as an error.
    async fn resolve(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError>;
}

/// How a run of the hook chain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// A hook took ownership of the resolution.
    Handled { by: String },
    /// Every hook proceeded; the host's default resolution applies.
    Default,
}

/// Failure surfaced by the hook chain.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("[{hook}] resolve: {source}")]
    Failed {
        hook: String,
        #[source]
        source: ResolveError,
    },

    #[error("[{hook}] resolve: hook finished without signalling completion")]
    Abandoned { hook: String },
}

/// The host's resolve hook: a stage-ordered chain of handlers plus the
/// loader alias table handlers may register into.
#[derive(Default)]
pub struct ResolveHooks {
    hooks: Vec<Arc<dyn ResolveHook>>,
    loader_aliases: HashMap<String, String>,
}

impl ResolveHooks {
    /// Create an empty hook chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers are kept sorted by stage; within a
    /// stage, registration order is preserved.
    pub fn tap(&mut self, hook: Arc<dyn ResolveHook>) {
        debug!(hook = hook.name(), stage = hook.stage(), "tapping resolve hook");
        self.hooks.push(hook);
        self.hooks.sort_by_key(|h| h.stage());
    }

    /// Map a loader name to a loader module path.
    pub fn alias_loader(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.loader_aliases.insert(name.into(), path.into());
    }

    /// Look up a loader alias.
    #[must_use]
    pub fn resolve_loader(&self, name: &str) -> Option<&str> {
        self.loader_aliases.get(name).map(String::as_str)
    }

    /// Names of the registered handlers, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Run the chain over one record.
    pub async fn call(&self, data: &ResolveDataHandle) -> Result<HookOutcome, HookError> {
        for hook in &self.hooks {
            let (done, rx) = Completion::channel();
            hook.resolve(data.clone(), done).await;

            match rx.await {
                Ok(HookSignal::Proceed) => {
                    trace!(hook = hook.name(), "hook proceeded");
                }
                Ok(HookSignal::Handled) => {
                    return Ok(HookOutcome::Handled {
                        by: hook.name().to_string(),
                    });
                }
                Ok(HookSignal::Fail(source)) => {
                    return Err(HookError::Failed {
                        hook: hook.name().to_string(),
                        source,
                    });
                }
                Err(_) => {
                    return Err(HookError::Abandoned {
                        hook: hook.name().to_string(),
                    });
                }
            }
        }
        Ok(HookOutcome::Default)
    }
}
