//! Installed plugin resolution
//!
//! The host records installed plugins in `installed_plugins.json`. Two
//! incompatible layouts exist in the wild, selected by the top-level
//! `version` field (absent means version 1):
//!
//! ```text
//! v1 list: [{"path": "...", "name": "..."}]
//! v1 map:  {"name": {"path": "..."}}  or  {"name": "..."}
//! v2:      {"name@org": [{"scope": "user", "installPath": "..."}]}
//! ```
//!
//! Either layout may be wrapped in a top-level `plugins` object. When the
//! manifest is missing, unreadable, or yields no usable roots, the resolver
//! falls back to globbing the plugin cache directory.

use crate::config::expand_home;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Manifest file name inside the plugins directory.
pub const MANIFEST_FILE: &str = "installed_plugins.json";

/// Fixed-depth cache layout: `cache/<org>/<repo>/<ref>/<plugin>/`.
const CACHE_PATTERN: &str = "*/*/*/*";

/// An installed plugin root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRoot {
    pub root: PathBuf,
    pub name: String,
    /// Installation scopes (empty for v1 manifests and cache fallback)
    pub scopes: BTreeSet<String>,
}

impl PluginRoot {
    /// Scopes joined with commas, sorted.
    pub fn scope(&self) -> String {
        self.scopes.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// The catalog source tag for components in this plugin.
    pub fn source(&self) -> String {
        format!("plugin:{}", self.name)
    }
}

// ============================================
// Manifest decoding
// ============================================

#[derive(Debug, Deserialize)]
struct V1ListEntry {
    #[serde(default)]
    path: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum V1Target {
    Path(String),
    Entry {
        #[serde(alias = "installPath")]
        path: String,
    },
}

impl V1Target {
    fn path(&self) -> &str {
        match self {
            V1Target::Path(p) => p,
            V1Target::Entry { path } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V2Install {
    #[serde(default)]
    scope: Option<String>,
    install_path: String,
}

/// A decoded manifest. Each version has its own decoder.
#[derive(Debug)]
enum Manifest {
    V1List(Vec<V1ListEntry>),
    V1Map(Vec<(String, V1Target)>),
    V2(Vec<(String, Vec<V2Install>)>),
}

impl Manifest {
    fn decode(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let version = value.get("version").and_then(Value::as_u64).unwrap_or(1);

        match version {
            1 => Self::decode_v1(entries(value)),
            2 => Self::decode_v2(entries(value)),
            other => {
                tracing::warn!(version = other, "Unsupported plugin manifest version");
                None
            }
        }
    }

    fn decode_v1(body: Value) -> Option<Self> {
        match body {
            Value::Array(items) => Some(Manifest::V1List(
                items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
            )),
            Value::Object(map) => Some(Manifest::V1Map(
                map.into_iter()
                    .filter(|(key, _)| key != "version")
                    .filter_map(|(name, v)| Some((name, serde_json::from_value(v).ok()?)))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn decode_v2(body: Value) -> Option<Self> {
        let Value::Object(map) = body else {
            return None;
        };

        let plugins = map
            .into_iter()
            .filter_map(|(key, v)| {
                let Value::Array(items) = v else {
                    return None;
                };
                let installs = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect();
                Some((key, installs))
            })
            .collect();

        Some(Manifest::V2(plugins))
    }
}

/// The plugin entries, unwrapping a top-level `plugins` object if present.
fn entries(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("plugins") => {
            map.remove("plugins").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ============================================
// Resolver
// ============================================

/// Resolves installed plugin roots from the manifest or the plugin cache.
pub struct PluginResolver {
    plugins_dir: PathBuf,
    home: PathBuf,
}

impl PluginResolver {
    /// `home` is used to expand `~` in manifest paths.
    pub fn new(plugins_dir: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            home: home.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.plugins_dir.join(MANIFEST_FILE)
    }

    /// Resolve installed plugins. Never fails; missing data yields an empty list.
    pub fn resolve(&self) -> Vec<PluginRoot> {
        let from_manifest = self
            .read_manifest()
            .map(|manifest| self.roots_from_manifest(manifest))
            .unwrap_or_default();

        if !from_manifest.is_empty() {
            tracing::debug!(count = from_manifest.len(), "Resolved plugins from manifest");
            return from_manifest;
        }

        let from_cache = self.roots_from_cache();
        tracing::debug!(count = from_cache.len(), "Resolved plugins from cache directory");
        from_cache
    }

    fn read_manifest(&self) -> Option<Manifest> {
        let path = self.manifest_path();
        let text = std::fs::read_to_string(&path).ok()?;
        let manifest = Manifest::decode(&text);
        if manifest.is_none() {
            tracing::warn!(path = %path.display(), "Ignoring unrecognized plugin manifest");
        }
        manifest
    }

    fn roots_from_manifest(&self, manifest: Manifest) -> Vec<PluginRoot> {
        let mut roots = Vec::new();

        match manifest {
            Manifest::V1List(items) => {
                for entry in items {
                    let root = expand_home(&entry.path, &self.home);
                    let name = entry.name.unwrap_or_else(|| dir_name(&root));
                    push_existing(&mut roots, root, name, BTreeSet::new());
                }
            }
            Manifest::V1Map(items) => {
                for (name, target) in items {
                    let root = expand_home(target.path(), &self.home);
                    push_existing(&mut roots, root, name, BTreeSet::new());
                }
            }
            Manifest::V2(plugins) => {
                for (key, installs) in plugins {
                    let name = key.split('@').next().unwrap_or(&key).to_string();

                    // Merge installs sharing a path, unioning their scopes
                    let mut merged: Vec<(String, BTreeSet<String>)> = Vec::new();
                    for install in installs {
                        let idx = match merged.iter().position(|(p, _)| *p == install.install_path) {
                            Some(idx) => idx,
                            None => {
                                merged.push((install.install_path.clone(), BTreeSet::new()));
                                merged.len() - 1
                            }
                        };
                        if let Some(scope) = install.scope.filter(|s| !s.is_empty()) {
                            merged[idx].1.insert(scope);
                        }
                    }

                    for (path, scopes) in merged {
                        let root = expand_home(&path, &self.home);
                        push_existing(&mut roots, root, name.clone(), scopes);
                    }
                }
            }
        }

        roots
    }

    fn roots_from_cache(&self) -> Vec<PluginRoot> {
        let cache_dir = self.plugins_dir.join("cache");
        if !cache_dir.is_dir() {
            return Vec::new();
        }

        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&cache_dir.to_string_lossy()),
            CACHE_PATTERN
        );
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid plugin cache pattern");
                return Vec::new();
            }
        };

        let mut candidates: Vec<PathBuf> = entries.flatten().filter(|p| p.is_dir()).collect();
        candidates.sort();

        candidates
            .into_iter()
            .map(|root| {
                let name = declared_name(&root).unwrap_or_else(|| dir_name(&root));
                PluginRoot {
                    root,
                    name,
                    scopes: BTreeSet::new(),
                }
            })
            .collect()
    }
}

fn push_existing(roots: &mut Vec<PluginRoot>, root: PathBuf, name: String, scopes: BTreeSet<String>) {
    if root.is_dir() {
        roots.push(PluginRoot { root, name, scopes });
    } else {
        tracing::debug!(plugin = %name, root = %root.display(), "Skipping missing plugin root");
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The `name` field of a plugin's own manifest, if present.
fn declared_name(root: &Path) -> Option<String> {
    [root.join("plugin.json"), root.join(".claude-plugin/plugin.json")]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .filter_map(|text| serde_json::from_str::<Value>(&text).ok())
        .find_map(|v| v.get("name").and_then(Value::as_str).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let plugins = temp.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        (temp, plugins)
    }

    fn write_manifest(plugins: &Path, json: &str) {
        fs::write(plugins.join(MANIFEST_FILE), json).unwrap();
    }

    #[test]
    fn test_v1_list() {
        let (temp, plugins) = setup();
        let root = temp.path().join("tools");
        fs::create_dir_all(&root).unwrap();
        write_manifest(
            &plugins,
            &format!(
                r#"[{{"path": "{}"}}, {{"path": "/missing", "name": "ghost"}}]"#,
                root.display()
            ),
        );

        let resolved = PluginResolver::new(&plugins, temp.path()).resolve();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "tools");
        assert!(resolved[0].scopes.is_empty());
    }

    #[test]
    fn test_v1_map_with_bare_paths_and_home_expansion() {
        let (temp, plugins) = setup();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        write_manifest(
            &plugins,
            r#"{"alpha": {"path": "~/a"}, "beta": "~/b", "broken": {"nope": 1}}"#,
        );

        let resolved = PluginResolver::new(&plugins, temp.path()).resolve();
        let names: Vec<_> = resolved.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(resolved[0].root, temp.path().join("a"));
    }

    #[test]
    fn test_v2_merges_scopes_by_install_path() {
        let (temp, plugins) = setup();
        let root = temp.path().join("cache/org/spam/1.0.0");
        fs::create_dir_all(&root).unwrap();
        write_manifest(
            &plugins,
            &format!(
                r#"{{"version": 2, "plugins": {{"spam@org": [
                    {{"scope": "user", "installPath": "{0}"}},
                    {{"scope": "project", "installPath": "{0}"}}
                ]}}}}"#,
                root.display()
            ),
        );

        let resolved = PluginResolver::new(&plugins, temp.path()).resolve();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "spam");
        assert_eq!(resolved[0].scope(), "project,user");
        assert_eq!(resolved[0].source(), "plugin:spam");
    }

    #[test]
    fn test_malformed_manifest_falls_back_to_cache() {
        let (temp, plugins) = setup();
        write_manifest(&plugins, "{not json");

        let with_manifest = plugins.join("cache/org/repo/main/fancy");
        fs::create_dir_all(&with_manifest).unwrap();
        fs::write(with_manifest.join("plugin.json"), r#"{"name": "fancy-plugin"}"#).unwrap();
        fs::create_dir_all(plugins.join("cache/org/repo/main/plain")).unwrap();

        let resolved = PluginResolver::new(&plugins, temp.path()).resolve();
        let names: Vec<_> = resolved.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fancy-plugin", "plain"]);
    }

    #[test]
    fn test_no_manifest_no_cache() {
        let (temp, plugins) = setup();
        assert!(PluginResolver::new(&plugins, temp.path()).resolve().is_empty());
    }

    #[test]
    fn test_unknown_version_is_ignored() {
        let (temp, plugins) = setup();
        write_manifest(&plugins, r#"{"version": 9, "plugins": {}}"#);
        assert!(PluginResolver::new(&plugins, temp.path()).resolve().is_empty());
    }
}
