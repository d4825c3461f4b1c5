#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::return_self_not_must_use)]

//! Bridges a declarative module resolver onto a bundler's callback-driven
//! resolve hook.
//!
//! ## Flow
//!
//! 1. The host fires its resolve hook with a mutable [`ResolveData`] record.
//! 2. [`EmbroiderPlugin`] wraps it in a [`Request`], repairs the issuer if it
//!    came from a virtual module, and hands it to a [`ModuleResolver`].
//! 3. The resolver rewrites the request (`alias`, `rehome`, `virtualize`) and
//!    may ask the [`FallbackResolver`] whether the host can resolve it natively.
//! 4. The plugin maps the outcome onto exactly one host signal.

pub mod config;
pub mod error;
pub mod fallback;
pub mod host;
pub mod paths;
pub mod plugin;
pub mod request;
pub mod resolver;
pub mod rules;
pub mod version;
pub mod virtual_modules;

pub use config::{BridgeConfig, Options};
pub use error::{Error, ResolveError};
pub use fallback::FallbackResolver;
pub use host::{
    Completion, ContextInfo, FsResolver, HookError, HookOutcome, HookSignal, Meta,
    NativeResolver, ResolveData, ResolveDataHandle, ResolveHook, ResolveHooks,
};
pub use plugin::{EmbroiderPlugin, EMPTY_MODULE, IMPLICIT_MODULES_FILE, PLUGIN_NAME};
pub use request::Request;
pub use resolver::{ModuleResolver, Resolution};
pub use rules::{RuleConfig, RuleResolver};
pub use version::VERSION;
pub use virtual_modules::{VirtualModules, VIRTUAL_LOADER_NAME, VIRTUAL_LOADER_PREFIX};
