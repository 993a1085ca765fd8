//! Manifest discovery and loading.
//!
//! Discovery looks exactly one directory level deep:
//! `<base path>/<plugin directory>/*/<manifest file>` for every combination of
//! configured base paths and plugin directory names.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;

use crate::config::AppConfig;
use crate::kernel::constants::{DEFAULT_MANIFEST_FILE, DEFAULT_PLUGINS_DIR};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::{ManifestDocument, PluginManifest};

/// Where to look for manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLoader {
    base_paths: Vec<PathBuf>,
    directories: Vec<String>,
    manifest_file: String,
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")], vec![DEFAULT_PLUGINS_DIR.to_string()], DEFAULT_MANIFEST_FILE)
    }
}

impl ManifestLoader {
    pub fn new(base_paths: Vec<PathBuf>, directories: Vec<String>, manifest_file: &str) -> Self {
        Self {
            base_paths,
            directories,
            manifest_file: manifest_file.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.base_paths.clone(), config.directories.clone(), &config.manifest_file)
    }

    /// Every `<base path>/<plugin directory>` combination, in configuration order
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        self.base_paths
            .iter()
            .flat_map(|base| self.directories.iter().map(move |dir| base.join(dir)))
            .collect()
    }

    /// Find manifest files. Missing or unreadable directories are skipped.
    pub async fn discover(&self) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();
        for dir in self.search_dirs() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("skipping plugin directory {}: {}", dir.display(), e);
                    continue;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("error reading plugin directory {}: {}", dir.display(), e);
                        break;
                    }
                };
                let candidate = entry.path().join(&self.manifest_file);
                match fs::metadata(&candidate).await {
                    Ok(meta) if meta.is_file() => {
                        found.insert(candidate);
                    }
                    _ => {}
                }
            }
        }
        debug!("discovered {} manifest(s)", found.len());
        found
    }
}

/// Load the manifest at `path`.
///
/// Returns `Ok(None)` when the document parses but has no `keel` block,
/// i.e. it is not a plugin for this host.
pub async fn load_manifest(path: &Path) -> Result<Option<PluginManifest>, PluginSystemError> {
    let content = fs::read_to_string(path).await.map_err(|e| PluginSystemError::ManifestError {
        path: path.to_path_buf(),
        message: format!("Failed to read manifest: {}", e),
        source: Some(Box::new(e)),
    })?;

    let document: ManifestDocument = serde_json::from_str(&content).map_err(|e| PluginSystemError::ManifestError {
        path: path.to_path_buf(),
        message: format!("Failed to parse manifest JSON: {}", e),
        source: Some(Box::new(e)),
    })?;

    Ok(PluginManifest::from_document(document, path.parent()))
}
