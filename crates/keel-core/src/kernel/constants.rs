/// Application name
pub const APP_NAME: &str = "keel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current plugin API version; manifests declare an `engine` range against it
pub const API_VERSION: &str = "0.1.0";

/// Key of the runtime metadata block that marks a manifest as a keel plugin
pub const MANIFEST_METADATA_KEY: &str = "keel";

/// Default manifest file name looked up in every plugin directory
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// Default plugins directory searched below every base path
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Engine range assumed when a manifest does not declare one
pub const DEFAULT_ENGINE_RANGE: &str = ">=0.0.0";

/// Name of the injector's self-reference component
pub const INJECTOR_COMPONENT: &str = "injector";

/// Name of the registry inspection component
pub const REGISTRY_COMPONENT: &str = "registry";

/// Base name of files skipped when a plugin registers a module directory
pub const MODULE_INDEX_STEM: &str = "index";
