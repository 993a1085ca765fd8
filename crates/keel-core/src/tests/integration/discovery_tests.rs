#![cfg(test)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tempfile::tempdir;

use crate::component::error::ComponentError;
use crate::kernel::error::Result as KernelResult;
use crate::kernel::lifecycle::Lifecycle;
use crate::plugin_system::catalog::PluginCatalog;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{load_manifest, ManifestLoader};
use crate::plugin_system::manifest::{LoadPolicy, PluginKind};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::Plugin;
use crate::tests::integration::common::*;

fn loader_for(roots: &[&std::path::Path]) -> ManifestLoader {
    ManifestLoader::new(
        roots.iter().map(|r| r.to_path_buf()).collect(),
        vec!["plugins".to_string()],
        "manifest.json",
    )
}

#[tokio::test]
async fn test_discover_looks_one_level_deep() {
    let dir = tempdir().unwrap();
    let direct = write_manifest(dir.path(), "plugins", "alpha", &manifest_json("alpha", "1.0.0", &[]));
    write_manifest(&dir.path().join("plugins").join("alpha"), "nested", "beta", &manifest_json("beta", "1.0.0", &[]));
    fs::write(dir.path().join("plugins").join("manifest.json"), "{}").unwrap();
    fs::create_dir_all(dir.path().join("plugins").join("empty")).unwrap();

    let found = loader_for(&[dir.path()]).discover().await;

    assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![direct]);
}

#[tokio::test]
async fn test_discover_skips_missing_directories() {
    let dir = tempdir().unwrap();
    let loader = loader_for(&[&dir.path().join("does-not-exist")]);
    assert!(loader.discover().await.is_empty());
}

#[tokio::test]
async fn test_discover_searches_every_base_path() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    write_manifest(first.path(), "plugins", "one", &manifest_json("one", "1.0.0", &[]));
    write_manifest(second.path(), "plugins", "two", &manifest_json("two", "1.0.0", &[]));
    let loader = ManifestLoader::new(
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
        vec!["plugins".to_string(), "extra".to_string()],
        "manifest.json",
    );
    write_manifest(second.path(), "extra", "three", &manifest_json("three", "1.0.0", &[]));

    assert_eq!(loader.search_dirs().len(), 4);
    assert_eq!(loader.discover().await.len(), 3);
}

#[tokio::test]
async fn test_custom_manifest_file_name() {
    let dir = tempdir().unwrap();
    let plugin_dir = dir.path().join("plugins").join("custom");
    fs::create_dir_all(&plugin_dir).unwrap();
    fs::write(plugin_dir.join("package.json"), manifest_json("custom", "1.0.0", &[])).unwrap();

    let loader = ManifestLoader::new(vec![dir.path().to_path_buf()], vec!["plugins".to_string()], "package.json");
    assert_eq!(loader.discover().await.len(), 1);
    assert!(loader_for(&[dir.path()]).discover().await.is_empty());
}

#[tokio::test]
async fn test_load_manifest_reads_runtime_block() {
    let dir = tempdir().unwrap();
    let body = serde_json::json!({
        "name": "store",
        "version": "2.3.4",
        "main": "./store",
        "policy": "eager",
        "auto": true,
        "keel": {
            "type": "extension",
            "engine": "^0.1",
            "dependencies": { "core": "^1" },
            "credentials": { "token": "abc" }
        }
    });
    let path = write_manifest(dir.path(), "plugins", "store", &body.to_string());

    let manifest = load_manifest(&path).await.unwrap().expect("keel block present");
    assert_eq!(manifest.name, "store");
    assert_eq!(manifest.version, "2.3.4");
    assert_eq!(manifest.kind, PluginKind::Extension);
    assert_eq!(manifest.engine, "^0.1");
    assert_eq!(manifest.dependencies.get("core").map(String::as_str), Some("^1"));
    assert_eq!(manifest.policy, LoadPolicy::Eager);
    assert!(manifest.auto);
    assert!(manifest.mortal);
    assert_eq!(manifest.credentials.unwrap()["token"], "abc");
    assert_eq!(manifest.base_dir.as_deref(), path.parent());
}

#[tokio::test]
async fn test_load_manifest_without_runtime_block() {
    let dir = tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        "plugins",
        "lib",
        r#"{"name": "lib", "version": "1.0.0", "main": "index"}"#,
    );
    assert!(load_manifest(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_manifest_rejects_bad_json() {
    let dir = tempdir().unwrap();
    let path = write_manifest(dir.path(), "plugins", "bad", "{ not json");
    match load_manifest(&path).await {
        Err(PluginSystemError::ManifestError { path: p, .. }) => assert_eq!(p, path),
        other => panic!("Expected ManifestError, got {:?}", other.map(|m| m.map(|m| m.name))),
    }
}

#[tokio::test]
async fn test_register_sorts_manifests_into_outcomes() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), "plugins", "good", &manifest_json("good", "1.0.0", &[]));
    write_manifest(dir.path(), "plugins", "plain", r#"{"name": "plain", "version": "1.0.0", "main": "x"}"#);
    write_manifest(dir.path(), "plugins", "broken", "[1, 2");
    write_manifest(dir.path(), "plugins", "orphan", &manifest_json("orphan", "1.0.0", &[]));
    write_manifest(dir.path(), "plugins", "badver", &manifest_json("badver", "one", &[]));

    let t = tracker();
    let catalog = catalog_with(vec![("good", TestPlugin::new("good", &t)), ("badver", TestPlugin::new("badver", &t))]);
    let mut registry = PluginRegistry::new(catalog, loader_for(&[dir.path()]));

    assert_eq!(registry.discover().await.len(), 5);
    let report = registry.register().await;

    assert_eq!(report.registered, vec!["good".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].ends_with("plain/manifest.json"));
    assert_eq!(report.failed.len(), 3);
    assert!(report
        .failed
        .iter()
        .any(|f| matches!(&f.error, PluginSystemError::UnknownEntryPoint { entry_point, .. } if entry_point == "orphan")));
    assert!(report
        .failed
        .iter()
        .any(|f| matches!(&f.error, PluginSystemError::SchemaViolation { plugin_id, .. } if plugin_id == "badver")));
    assert!(report
        .failed
        .iter()
        .any(|f| matches!(f.error, PluginSystemError::ManifestError { .. })));
    assert_eq!(registry.names(), &["good".to_string()]);
    assert_eq!(registry.registered_paths().len(), 5);
}

#[tokio::test]
async fn test_second_discover_only_returns_new_manifests() {
    let dir = tempdir().unwrap();
    write_manifest(dir.path(), "plugins", "a", &manifest_json("a", "1.0.0", &[]));
    let t = tracker();
    let catalog = catalog_with(vec![("a", TestPlugin::new("a", &t)), ("b", TestPlugin::new("b", &t))]);
    let mut registry = PluginRegistry::new(catalog, loader_for(&[dir.path()]));

    assert_eq!(registry.discover().await.len(), 1);
    registry.register().await;
    assert!(registry.discover().await.is_empty());
    assert!(registry.register().await.registered.is_empty());

    let added = write_manifest(dir.path(), "plugins", "b", &manifest_json("b", "1.0.0", &[("a", "*")]));
    assert_eq!(registry.discover().await, vec![added]);
    registry.register().await;
    assert_eq!(registry.names(), &["a".to_string(), "b".to_string()]);
    assert_eq!(calls(&t, crate::kernel::lifecycle::LifecycleHook::Install), vec!["a", "b"]);
}

#[tokio::test]
async fn test_entry_point_prefix_is_normalized() {
    let dir = tempdir().unwrap();
    let body = serde_json::json!({
        "name": "dotted",
        "version": "1.0.0",
        "main": "./dotted",
        "keel": {}
    });
    write_manifest(dir.path(), "plugins", "dotted", &body.to_string());
    let t = tracker();
    let mut registry = PluginRegistry::new(catalog_with(vec![("dotted", TestPlugin::new("dotted", &t))]), loader_for(&[dir.path()]));

    registry.discover().await;
    assert_eq!(registry.register().await.registered, vec!["dotted".to_string()]);
}

#[tokio::test]
async fn test_engine_range_is_checked_on_register() {
    let t = tracker();
    let mut registry = registry();
    let manifest = manifest("future", "1.0.0", &[]).with_engine(">=9.0.0");
    let err = crate::plugin_system::plugin::RegisteredPlugin::register(
        manifest,
        &mut registry,
        Box::new(TestPlugin::new("future", &t)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PluginSystemError::IncompatibleEngine { ref engine, .. } if engine == ">=9.0.0"));
    assert!(registry.is_empty());
    assert!(events(&t).is_empty());
}

// ===== MODULE DIRECTORIES =====

/// Registers the documents of one directory and captures what happened
struct DirectoryPlugin {
    directory: String,
    seen: Arc<StdMutex<Option<Result<Vec<String>, String>>>>,
}

#[async_trait]
impl Lifecycle<PluginContext> for DirectoryPlugin {
    async fn initialize(&self, ctx: &mut PluginContext) -> KernelResult<()> {
        let outcome = ctx.directory(&self.directory).await;
        let failed = outcome.is_err();
        *self.seen.lock().unwrap() = Some(outcome.map_err(|e| e.to_string()));
        if failed {
            return Err(ComponentError::UnknownModule(self.directory.clone()).into());
        }
        Ok(())
    }
}

impl Plugin for DirectoryPlugin {}

async fn initialize_directory_plugin(
    base_dir: Option<PathBuf>,
    directory: &str,
) -> (PluginRegistry, Option<Result<Vec<String>, String>>) {
    let seen = Arc::new(StdMutex::new(None));
    let mut registry = registry();
    let mut manifest = manifest("docs", "1.0.0", &[]);
    if let Some(base) = base_dir {
        manifest = manifest.with_base_dir(base);
    }
    crate::plugin_system::plugin::RegisteredPlugin::register(
        manifest,
        &mut registry,
        Box::new(DirectoryPlugin {
            directory: directory.to_string(),
            seen: seen.clone(),
        }),
    )
    .await
    .unwrap();
    registry.resolve().await;
    registry.prioritize().unwrap();
    registry.initialize().await;
    let outcome = seen.lock().unwrap().take();
    (registry, outcome)
}

#[tokio::test]
async fn test_directory_registers_documents_by_stem() {
    let dir = tempdir().unwrap();
    let routes = dir.path().join("routes");
    fs::create_dir_all(&routes).unwrap();
    fs::write(routes.join("users.json"), r#"{"path": "/users"}"#).unwrap();
    fs::write(routes.join("posts.yaml"), "path: /posts\n").unwrap();
    fs::write(routes.join("index.json"), r#"{"ignored": true}"#).unwrap();
    fs::write(routes.join("README.md"), "not a document").unwrap();
    fs::create_dir_all(routes.join("nested.json")).unwrap();

    let (registry, outcome) = initialize_directory_plugin(Some(dir.path().to_path_buf()), "routes").await;

    assert_eq!(outcome, Some(Ok(vec!["posts".to_string(), "users".to_string()])));
    let injector = registry.injector();
    assert!(!injector.info("users").unwrap().resolved);
    let users = injector.get_as::<serde_json::Value>("users").unwrap();
    assert_eq!(users["path"], "/users");
    let posts = injector.get_as::<serde_json::Value>("posts").unwrap();
    assert_eq!(posts["path"], "/posts");
    assert!(!injector.contains("index"));
    assert_eq!(
        registry.get("docs").unwrap().components(),
        &["posts".to_string(), "users".to_string()]
    );
}

#[tokio::test]
async fn test_directory_document_parse_error_surfaces_on_get() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("broken.json"), "{").unwrap();

    let (registry, outcome) = initialize_directory_plugin(Some(dir.path().to_path_buf()), "data").await;

    assert_eq!(outcome, Some(Ok(vec!["broken".to_string()])));
    assert!(matches!(
        registry.injector().get("broken"),
        Err(ComponentError::FactoryFailed { .. })
    ));
}

#[tokio::test]
async fn test_directory_without_base_dir_or_folder_fails() {
    let (_, outcome) = initialize_directory_plugin(None, "routes").await;
    assert!(matches!(outcome, Some(Err(ref m)) if m.contains("docs")));

    let dir = tempdir().unwrap();
    let (registry, outcome) = initialize_directory_plugin(Some(dir.path().to_path_buf()), "missing").await;
    assert!(matches!(outcome, Some(Err(_))));
    assert!(!registry.get("docs").unwrap().is_initialized());
}

// ===== HOST MODULES =====

#[tokio::test]
async fn test_require_imports_host_modules() {
    let t = tracker();
    let catalog = PluginCatalog::new().with_module("clock", || Ok(1_700_000_000u64));
    let mut registry = PluginRegistry::new(catalog, ManifestLoader::default());
    add(
        &mut registry,
        manifest("user", "1.0.0", &[]),
        TestPlugin::new("user", &t).on_initialize(|ctx| ctx.require(&[("now", "clock")])),
    )
    .await;
    add(
        &mut registry,
        manifest("greedy", "1.0.0", &[]),
        TestPlugin::new("greedy", &t).on_initialize(|ctx| ctx.require(&[("fs", "filesystem")])),
    )
    .await;

    registry.resolve().await;
    registry.prioritize().unwrap();
    let init = registry.initialize().await;

    assert_eq!(init.succeeded, vec!["user".to_string()]);
    assert_eq!(init.failed[0].plugin, "greedy");
    assert_eq!(*registry.injector().get_as::<u64>("now").unwrap(), 1_700_000_000);
    assert!(!registry.injector().contains("fs"));
}
