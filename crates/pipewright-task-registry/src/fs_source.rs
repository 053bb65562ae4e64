use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use tokio::fs;
use tracing::warn;

use crate::error::RegistryError;
use crate::manifest::PluginManifest;

/// A place task plugins are discovered from.
#[async_trait]
pub trait PluginSource: Send + Sync {
  /// List the plugins to register, at most one manifest per plugin id.
  async fn list(&self) -> Result<Vec<PluginManifest>, RegistryError>;
}

/// Filesystem-based plugin source.
///
/// Plugins are stored in a directory structure:
/// ```text
/// {root}/
/// └── com.example.curl--1.2.0/
///     └── manifest.json
/// ```
///
/// When several versions of a plugin are installed, the highest semantic
/// version wins. Versions that are not valid semver compare as strings.
pub struct FsPluginSource {
  root: PathBuf,
}

impl FsPluginSource {
  /// Create a new filesystem source at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the source.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Parse a directory name into (id, version).
  /// Example: "com.example.curl--1.2.0" -> ("com.example.curl", "1.2.0")
  fn parse_dir_name(dir_name: &str) -> Option<(String, String)> {
    let last_sep = dir_name.rfind("--")?;
    let id = &dir_name[..last_sep];
    let version = &dir_name[last_sep + 2..];
    if id.is_empty() || version.is_empty() {
      return None;
    }
    Some((id.to_string(), version.to_string()))
  }

  /// Read the manifest from a plugin directory.
  async fn read_manifest(&self, plugin_dir: &Path) -> Result<PluginManifest, RegistryError> {
    let manifest_path = plugin_dir.join("manifest.json");
    let content = fs::read_to_string(&manifest_path).await?;
    let manifest: PluginManifest = serde_json::from_str(&content)?;
    Ok(manifest)
  }
}

#[async_trait]
impl PluginSource for FsPluginSource {
  async fn list(&self) -> Result<Vec<PluginManifest>, RegistryError> {
    let mut latest: HashMap<String, PluginManifest> = HashMap::new();

    if !self.root.exists() {
      return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }

      let Some((dir_id, dir_version)) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(Self::parse_dir_name)
      else {
        continue;
      };

      let manifest = match self.read_manifest(&path).await {
        Ok(manifest) => manifest,
        Err(err) => {
          warn!(path = %path.display(), error = %err, "skipping unreadable plugin manifest");
          continue;
        }
      };

      if manifest.id != dir_id || manifest.version != dir_version {
        warn!(
          path = %path.display(),
          manifest_id = %manifest.id,
          manifest_version = %manifest.version,
          "skipping plugin whose manifest does not match its directory"
        );
        continue;
      }

      match latest.get(&manifest.id) {
        Some(existing) if !is_newer(&manifest.version, &existing.version) => {}
        _ => {
          latest.insert(manifest.id.clone(), manifest);
        }
      }
    }

    let mut manifests: Vec<PluginManifest> = latest.into_values().collect();
    manifests.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(manifests)
  }
}

fn is_newer(candidate: &str, existing: &str) -> bool {
  match (Version::parse(candidate), Version::parse(existing)) {
    (Ok(candidate), Ok(existing)) => candidate > existing,
    _ => candidate > existing,
  }
}
