//! `embroider-bridge resolve` command implementation.
//!
//! Runs each specifier through a resolve hook chain holding the embroider
//! plugin over the real filesystem, and reports what the host would do.

use embroider_bridge_core::{
    BridgeConfig, EmbroiderPlugin, FsResolver, HookError, HookOutcome, Options, ResolveData,
    ResolveDataHandle, ResolveHooks, RuleConfig, RuleResolver,
};
use futures::stream::{self, StreamExt};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Maximum resolutions in flight at once.
const MAX_CONCURRENT_RESOLVES: usize = 16;

/// Resolve command action.
#[derive(Debug, Clone)]
pub struct ResolveAction {
    pub specifiers: Vec<String>,
    pub context: PathBuf,
    pub issuer: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub options: Option<PathBuf>,
    pub app_root: PathBuf,
}

/// JSON output for one specifier.
#[derive(Debug, Serialize)]
struct ResolveResultJson {
    ok: bool,
    specifier: String,
    /// `handled`, `default` or `error`.
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    handled_by: Option<String>,
    /// Record after the hook chain ran.
    record: ResolveData,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ResolveResultJson {
    fn new(specifier: String, result: Result<HookOutcome, HookError>, record: ResolveData) -> Self {
        match result {
            Ok(HookOutcome::Handled { by }) => Self {
                ok: true,
                specifier,
                outcome: "handled",
                handled_by: Some(by),
                record,
                error: None,
            },
            Ok(HookOutcome::Default) => Self {
                ok: true,
                specifier,
                outcome: "default",
                handled_by: None,
                record,
                error: None,
            },
            Err(err) => Self {
                ok: false,
                specifier,
                outcome: "error",
                handled_by: None,
                record,
                error: Some(err.to_string()),
            },
        }
    }
}

fn build_hooks(action: &ResolveAction) -> Result<ResolveHooks> {
    let rules = match &action.rules {
        Some(path) => RuleConfig::from_path(path).into_diagnostic()?,
        None => RuleConfig::default(),
    };
    let options = match &action.options {
        Some(path) => Options::from_path(path).into_diagnostic()?,
        None => Options::default(),
    };

    let config = BridgeConfig::new(action.app_root.clone()).with_options(options);
    let plugin = Arc::new(EmbroiderPlugin::new(
        config,
        Arc::new(RuleResolver::new(rules)),
        Arc::new(FsResolver::new()),
    ));

    let mut hooks = ResolveHooks::new();
    plugin.apply(&mut hooks);
    Ok(hooks)
}

/// Run the resolve command.
pub fn run(action: ResolveAction, json: bool) -> Result<()> {
    let hooks = build_hooks(&action)?;
    let context = action.context.to_string_lossy().into_owned();
    let issuer = action
        .issuer
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let results: Vec<ResolveResultJson> = runtime.block_on(async {
        stream::iter(action.specifiers.clone())
            .map(|specifier| {
                let mut data = ResolveData::new(specifier.clone(), context.clone());
                if let Some(issuer) = &issuer {
                    data = data.with_issuer(issuer.clone());
                }
                let handle = ResolveDataHandle::new(data);
                let hooks = &hooks;
                async move {
                    let result = hooks.call(&handle).await;
                    debug!(specifier = %specifier, ok = result.is_ok(), "resolve hook finished");
                    ResolveResultJson::new(specifier, result, handle.snapshot())
                }
            })
            .buffered(MAX_CONCURRENT_RESOLVES)
            .collect()
            .await
    });

    let failed = results.iter().any(|r| !r.ok);

    if json {
        println!("{}", serde_json::to_string_pretty(&results).into_diagnostic()?);
    } else {
        for result in &results {
            print_human(result);
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_human(result: &ResolveResultJson) {
    let request = result.record.request.as_deref().unwrap_or("");
    match result.outcome {
        "handled" => {
            println!("  {} -> {request}", result.specifier);
            if let Some(issuer) = &result.record.context_info.issuer {
                println!("    issuer: {issuer}");
            }
        }
        "default" => println!("  {} -> (host default resolution)", result.specifier),
        _ => eprintln!(
            "  {} -> error: {}",
            result.specifier,
            result.error.as_deref().unwrap_or("unknown")
        ),
    }
}
