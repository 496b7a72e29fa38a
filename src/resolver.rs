//! Project-layout resolver.
//!
//! Loads a Rojo-style `*.project.json` manifest into a mount table and maps
//! filesystem paths to logical tree paths by longest-prefix matching.
//!
//! ```json
//! {
//!   "name": "game",
//!   "tree": {
//!     "$className": "DataModel",
//!     "ReplicatedStorage": {
//!       "Shared": { "$path": "out/shared" }
//!     },
//!     "ServerScriptService": { "Server": "out/server" }
//!   }
//! }
//! ```
//!
//! Keys starting with `$` are node properties; only `$path` is read. Any other
//! key names a child node whose value is either a nested mapping or a path
//! string (shorthand for `{ "$path": ... }`). A `$path` on the tree itself
//! (`{ "tree": { "$path": "out" } }`, the usual package layout) mounts that
//! directory at the empty logical path.

use crate::diagnostics::TransformError;
use crate::program::normalize_path;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_MANIFEST_NAME: &str = "default.project.json";
const MANIFEST_SUFFIX: &str = ".project.json";

// ═══════════════════════════════════════════════════════════════════════════════
// MOUNT TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub fs_prefix: PathBuf,
    pub logical_prefix: Vec<String>,
}

/// Immutable after construction. Entries are kept ordered most-specific first.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Every entry must name a non-empty logical path.
    pub fn new(entries: Vec<MountEntry>) -> Result<Self, TransformError> {
        Self::build(entries, None)
    }

    /// Like [`MountTable::new`], plus the manifest's tree root mounted at the
    /// empty logical path.
    pub fn with_tree_root(
        tree_root: PathBuf,
        entries: Vec<MountEntry>,
    ) -> Result<Self, TransformError> {
        Self::build(entries, Some(tree_root))
    }

    fn build(
        entries: Vec<MountEntry>,
        tree_root: Option<PathBuf>,
    ) -> Result<Self, TransformError> {
        for entry in &entries {
            if entry.logical_prefix.is_empty() {
                return Err(TransformError::configuration(format!(
                    "Mount '{}' maps to the empty logical path",
                    entry.fs_prefix.display()
                )));
            }
            if entry.logical_prefix.iter().any(|s| s.is_empty()) {
                return Err(TransformError::configuration(format!(
                    "Mount '{}' has an empty segment name in its logical path",
                    entry.fs_prefix.display()
                )));
            }
        }

        let root_entry = tree_root.map(|fs_prefix| MountEntry {
            fs_prefix,
            logical_prefix: Vec::new(),
        });

        let mut table: Vec<MountEntry> = Vec::with_capacity(entries.len() + 1);
        for mut entry in root_entry.into_iter().chain(entries) {
            entry.fs_prefix = normalize_path(&entry.fs_prefix);

            if let Some(existing) = table.iter().find(|e| e.fs_prefix == entry.fs_prefix) {
                if existing.logical_prefix == entry.logical_prefix {
                    continue;
                }
                return Err(TransformError::configuration(format!(
                    "Path '{}' is mounted at both {} and {}",
                    entry.fs_prefix.display(),
                    display_logical(&existing.logical_prefix),
                    display_logical(&entry.logical_prefix)
                )));
            }
            table.push(entry);
        }

        // Two distinct prefixes of the same path never have the same depth,
        // so the first hit in this order is the longest.
        table.sort_by_key(|e| std::cmp::Reverse(e.fs_prefix.components().count()));
        Ok(MountTable { entries: table })
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest matching prefix wins. `None` when nothing covers `path`.
    pub fn lookup(&self, path: &Path) -> Option<Vec<String>> {
        let (entry, rest) = self
            .entries
            .iter()
            .find_map(|e| path.strip_prefix(&e.fs_prefix).ok().map(|rest| (e, rest)))?;

        let mut segments: Vec<String> = rest
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if let Some(last) = segments.pop() {
            let name = strip_script_extension(&last);
            if name != "init" {
                segments.push(name);
            }
        }

        let mut logical = entry.logical_prefix.clone();
        logical.extend(segments);
        Some(logical)
    }
}

/// Instance name Rojo gives a file: `foo.server.lua` → `foo`, `bar.ts` →
/// `bar`, `Tool.model.json` → `Tool`, `strings.csv` → `strings`. Unknown
/// extensions are kept.
fn strip_script_extension(file_name: &str) -> String {
    lazy_static! {
        static ref SCRIPT_EXT_RE: Regex = Regex::new(
            r"^(.+?)(?:(?:\.(?:server|client))?\.(?:d\.ts|tsx|ts|js|luau|lua)|\.(?:model\.json|meta\.json|json|rbxmx|rbxm|txt|csv|toml))$"
        )
        .unwrap();
    }
    match SCRIPT_EXT_RE.captures(file_name) {
        Some(cap) => cap[1].to_string(),
        None => file_name.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    base_dir: PathBuf,
    mounts: MountTable,
}

impl ProjectResolver {
    /// Builds a resolver from explicit mounts. Relative prefixes and relative
    /// queries are both taken relative to `base_dir`.
    pub fn from_mounts(
        base_dir: impl Into<PathBuf>,
        mounts: Vec<(PathBuf, Vec<String>)>,
    ) -> Result<Self, TransformError> {
        let base_dir = normalize_path(&base_dir.into());
        let entries = mounts
            .into_iter()
            .map(|(prefix, logical_prefix)| MountEntry {
                fs_prefix: base_dir.join(prefix),
                logical_prefix,
            })
            .collect();
        Ok(ProjectResolver {
            base_dir,
            mounts: MountTable::new(entries)?,
        })
    }

    pub fn from_manifest(location: &Path) -> Result<Self, TransformError> {
        let location = absolute_path(location)?;
        let base_dir = location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut loader = ManifestLoader::default();
        loader.load(&location, Vec::new())?;
        let mounts = match loader.tree_root {
            Some(tree_root) => MountTable::with_tree_root(tree_root, loader.entries)?,
            None => MountTable::new(loader.entries)?,
        };

        if mounts.is_empty() {
            tracing::warn!(
                manifest = %location.display(),
                "project manifest declares no $path mounts; every macro call will fail to resolve"
            );
        }
        tracing::info!(
            manifest = %location.display(),
            mounts = mounts.len(),
            "loaded project manifest"
        );

        Ok(ProjectResolver { base_dir, mounts })
    }

    /// Uses `explicit` when given, otherwise the nearest manifest at or above
    /// `project_dir`.
    pub fn discover(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, TransformError> {
        let location = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_manifest_path(project_dir).ok_or_else(|| {
                TransformError::configuration(format!(
                    "Unable to find Rojo configuration file above {}",
                    project_dir.display()
                ))
            })?,
        };
        Self::from_manifest(&location)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Maps a filesystem path to its logical path segments. The file does not
    /// need to exist.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Option<Vec<String>> {
        let absolute = normalize_path(&self.base_dir.join(path.as_ref()));
        self.mounts.lookup(&absolute)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf, TransformError> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    let cwd = std::env::current_dir().map_err(|e| {
        TransformError::configuration(format!("Unable to read current directory: {}", e))
    })?;
    Ok(normalize_path(&cwd.join(path)))
}

/// Walks upward from `start`, preferring `default.project.json` and otherwise
/// the first `*.project.json` by name in each directory.
pub fn find_manifest_path(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let default = dir.join(DEFAULT_MANIFEST_NAME);
        if default.is_file() {
            return Some(default);
        }

        let candidate = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| {
                entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(MANIFEST_SUFFIX)
            });
        if let Some(entry) = candidate {
            return Some(entry.into_path());
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANIFEST LOADING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ManifestLoader {
    entries: Vec<MountEntry>,
    tree_root: Option<PathBuf>,
    active: HashSet<PathBuf>,
}

impl ManifestLoader {
    fn load(&mut self, location: &Path, logical: Vec<String>) -> Result<(), TransformError> {
        if !self.active.insert(location.to_path_buf()) {
            return Err(TransformError::configuration(format!(
                "Project manifest {} includes itself",
                location.display()
            )));
        }

        let raw = fs::read_to_string(location).map_err(|e| {
            TransformError::configuration(format!(
                "Unable to read project manifest {}: {}",
                location.display(),
                e
            ))
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            TransformError::configuration(format!(
                "Invalid project manifest {}: {}",
                location.display(),
                e
            ))
        })?;
        let tree = value
            .as_object()
            .and_then(|root| root.get("tree"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                TransformError::configuration(format!(
                    "Project manifest {} is missing the required \"tree\" mapping",
                    location.display()
                ))
            })?;

        let manifest_dir = location.parent().unwrap_or_else(|| Path::new("/"));
        self.walk_node(tree, &logical, manifest_dir)?;

        self.active.remove(location);
        Ok(())
    }

    fn walk_node(
        &mut self,
        node: &Map<String, Value>,
        logical: &[String],
        manifest_dir: &Path,
    ) -> Result<(), TransformError> {
        for (key, value) in node {
            if key == "$path" {
                let path = path_property(value).ok_or_else(|| {
                    TransformError::configuration(format!(
                        "$path of '{}' must be a string or {{ \"optional\": string }}",
                        display_logical(logical)
                    ))
                })?;
                self.mount(path, logical, manifest_dir)?;
                continue;
            }
            if key.starts_with('$') {
                continue;
            }

            let mut child = logical.to_vec();
            child.push(key.clone());
            match value {
                Value::Object(map) => self.walk_node(map, &child, manifest_dir)?,
                Value::String(path) => self.mount(path, &child, manifest_dir)?,
                other => {
                    return Err(TransformError::configuration(format!(
                        "Node '{}' must be a mapping or a path string, found {}",
                        display_logical(&child),
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(())
    }

    fn mount(
        &mut self,
        path: &str,
        logical: &[String],
        manifest_dir: &Path,
    ) -> Result<(), TransformError> {
        if path.is_empty() {
            return Err(TransformError::configuration(format!(
                "$path of '{}' is empty",
                display_logical(logical)
            )));
        }
        let fs_path = normalize_path(&manifest_dir.join(path));
        if path.ends_with(MANIFEST_SUFFIX) {
            return self.load(&fs_path, logical.to_vec());
        }

        if logical.is_empty() {
            if let Some(existing) = &self.tree_root {
                if *existing != fs_path {
                    return Err(TransformError::configuration(format!(
                        "The tree root is mounted at both '{}' and '{}'",
                        existing.display(),
                        fs_path.display()
                    )));
                }
            }
            self.tree_root = Some(fs_path);
            return Ok(());
        }

        self.entries.push(MountEntry {
            fs_prefix: fs_path,
            logical_prefix: logical.to_vec(),
        });
        Ok(())
    }
}

fn path_property(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("optional").and_then(Value::as_str),
        _ => None,
    }
}

fn display_logical(logical: &[String]) -> String {
    if logical.is_empty() {
        "<root>".to_string()
    } else {
        logical.join(".")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
