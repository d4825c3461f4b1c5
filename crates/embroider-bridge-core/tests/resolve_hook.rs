//! Integration tests for the resolve hook protocol.

use async_trait::async_trait;
use embroider_bridge_core::{
    BridgeConfig, EmbroiderPlugin, FsResolver, HookError, HookOutcome, NativeResolver,
    ResolveData, ResolveDataHandle, ResolveError, ResolveHooks, RuleConfig, RuleResolver,
    EMPTY_MODULE, PLUGIN_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Native resolver that yields before answering, so invocations interleave.
struct Slow {
    calls: AtomicUsize,
}

#[async_trait]
impl NativeResolver for Slow {
    async fn resolve(
        &self,
        base_dir: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok((!specifier.contains("missing")).then(|| base_dir.join(specifier)))
    }
}

fn rules() -> RuleConfig {
    serde_json::from_str(
        r##"{
            "renamedPackages": {"old-addon": "new-addon"},
            "virtualFiles": {"#entry": "/app/assets/app.js", "#broken": "nope.js"}
        }"##,
    )
    .unwrap()
}

fn hooks_with(native: Arc<dyn NativeResolver>) -> (ResolveHooks, Arc<EmbroiderPlugin>) {
    let plugin = Arc::new(EmbroiderPlugin::new(
        BridgeConfig::new(PathBuf::from("/app")),
        Arc::new(RuleResolver::new(rules())),
        native,
    ));
    let mut hooks = ResolveHooks::new();
    Arc::clone(&plugin).apply(&mut hooks);
    (hooks, plugin)
}

fn slow() -> Arc<Slow> {
    Arc::new(Slow {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_renamed_package_handled() {
    let (hooks, _) = hooks_with(slow());
    let data = ResolveDataHandle::new(
        ResolveData::new("old-addon/thing", "/app/src").with_issuer("/app/src/a.js"),
    );

    let outcome = hooks.call(&data).await.unwrap();
    assert_eq!(
        outcome,
        HookOutcome::Handled {
            by: PLUGIN_NAME.to_string()
        }
    );
    assert_eq!(data.request().as_deref(), Some("new-addon/thing"));
}

#[tokio::test]
async fn test_unresolvable_falls_back_to_host_default() {
    let (hooks, _) = hooks_with(slow());
    let data = ResolveDataHandle::new(
        ResolveData::new("./missing", "/app/src").with_issuer("/app/src/a.js"),
    );

    assert_eq!(hooks.call(&data).await.unwrap(), HookOutcome::Default);
    assert_eq!(data.request().as_deref(), Some("./missing"));
}

#[tokio::test]
async fn test_resolver_error_surfaces_as_hook_error() {
    let (hooks, _) = hooks_with(slow());
    let data =
        ResolveDataHandle::new(ResolveData::new("#broken", "/app").with_issuer("/app/index.js"));

    let err = hooks.call(&data).await.unwrap_err();
    match err {
        HookError::Failed { hook, source } => {
            assert_eq!(hook, PLUGIN_NAME);
            assert!(matches!(source, ResolveError::Resolver(_)));
        }
        HookError::Abandoned { .. } => panic!("expected a failure"),
    }
}

#[tokio::test]
async fn test_virtual_entry_then_sibling_import_gets_issuer() {
    let native = slow();
    let (hooks, plugin) = hooks_with(native.clone());

    // The app imports a virtual entry; the rule resolver virtualizes it.
    let entry = ResolveDataHandle::new(
        ResolveData::new("#entry", "/app").with_issuer("/app/index.js"),
    );
    hooks.call(&entry).await.unwrap();
    let virtual_spec = entry.request().unwrap();
    assert!(virtual_spec.starts_with("!@embroider/webpack/src/virtual-loader?"));

    // The host re-enters the hook with the loader specifier; we record it
    // and let the host's loader alias take over.
    let reentry = ResolveDataHandle::new(
        ResolveData::new(virtual_spec, "/app").with_issuer("/app/index.js"),
    );
    assert_eq!(hooks.call(&reentry).await.unwrap(), HookOutcome::Default);
    assert_eq!(
        plugin.virtual_modules().lookup("/app/assets").as_deref(),
        Some("/app/assets/app.js")
    );

    // An import made from inside the virtual module arrives without issuer.
    let sibling = ResolveDataHandle::new(ResolveData::new("./vendor", "/app/assets"));
    assert!(matches!(
        hooks.call(&sibling).await.unwrap(),
        HookOutcome::Handled { .. }
    ));
    assert_eq!(sibling.issuer().as_deref(), Some("/app/assets/app.js"));
    assert_eq!(sibling.context().as_deref(), Some("/app/assets"));
}

#[tokio::test]
async fn test_implicit_modules_missing_is_empty_module() {
    let (hooks, _) = hooks_with(slow());
    let data = ResolveDataHandle::new(ResolveData::new(
        "./-embroider-implicit-modules.js-missing",
        "/out/rewritten-packages/addon",
    ));

    assert!(matches!(
        hooks.call(&data).await.unwrap(),
        HookOutcome::Handled { .. }
    ));
    assert_eq!(data.request().as_deref(), Some(EMPTY_MODULE));
    assert_eq!(
        data.issuer().as_deref(),
        Some("/out/rewritten-packages/addon/-embroider-implicit-modules.js")
    );
}

#[tokio::test]
async fn test_concurrent_invocations_stay_independent() {
    let native = slow();
    let (hooks, _) = hooks_with(native.clone());

    let records: Vec<ResolveDataHandle> = (0..16)
        .map(|i| {
            let spec = if i % 2 == 0 {
                format!("./file-{i}")
            } else {
                format!("./missing-{i}")
            };
            ResolveDataHandle::new(
                ResolveData::new(spec, "/app/src").with_issuer(format!("/app/src/from-{i}.js")),
            )
        })
        .collect();

    let outcomes = futures::future::join_all(records.iter().map(|r| hooks.call(r))).await;

    for (i, (outcome, record)) in outcomes.into_iter().zip(&records).enumerate() {
        let outcome = outcome.unwrap();
        if i % 2 == 0 {
            assert!(matches!(outcome, HookOutcome::Handled { .. }));
            assert_eq!(record.request(), Some(format!("./file-{i}")));
        } else {
            assert_eq!(outcome, HookOutcome::Default);
        }
        assert_eq!(record.issuer(), Some(format!("/app/src/from-{i}.js")));
    }
    assert_eq!(native.calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn test_with_filesystem_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let src = root.join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a.js"), "import './b';").unwrap();
    std::fs::write(src.join("b.js"), "").unwrap();

    let plugin = Arc::new(EmbroiderPlugin::new(
        BridgeConfig::new(root.clone()),
        Arc::new(RuleResolver::default()),
        Arc::new(FsResolver::new()),
    ));
    let mut hooks = ResolveHooks::new();
    plugin.apply(&mut hooks);

    let issuer = src.join("a.js").to_string_lossy().into_owned();
    let context = src.to_string_lossy().into_owned();

    let found = ResolveDataHandle::new(ResolveData::new("./b", &context).with_issuer(&issuer));
    assert!(matches!(
        hooks.call(&found).await.unwrap(),
        HookOutcome::Handled { .. }
    ));

    let missing = ResolveDataHandle::new(ResolveData::new("./c", &context).with_issuer(&issuer));
    assert_eq!(hooks.call(&missing).await.unwrap(), HookOutcome::Default);
}
