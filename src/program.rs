//! Compiler program handle and the path translator built from it.
//!
//! The program is read once by the driver and shared read-only by every unit.
//! The pass only asks it for the `rootDir`/`rootDirs`/`outDir` options.

use crate::config::TransformerConfig;
use crate::diagnostics::TransformError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER PROGRAM
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub root_dir: Option<PathBuf>,
    pub root_dirs: Option<Vec<PathBuf>>,
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfigFile {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Clone)]
pub struct CompilerProgram {
    current_directory: PathBuf,
    options: CompilerOptions,
}

impl CompilerProgram {
    pub fn new(current_directory: impl Into<PathBuf>, options: CompilerOptions) -> Self {
        let current_directory: PathBuf = current_directory.into();
        CompilerProgram {
            current_directory: normalize_path(&current_directory),
            options,
        }
    }

    /// Reads `compilerOptions` from a tsconfig file. Relative option paths are
    /// taken relative to the tsconfig's directory.
    pub fn from_tsconfig(path: &Path) -> Result<Self, TransformError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TransformError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let parsed: TsConfigFile = serde_json::from_str(&strip_json_comments(&raw)).map_err(|e| {
            TransformError::configuration(format!("Invalid tsconfig {}: {}", path.display(), e))
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(CompilerProgram::new(dir, parsed.compiler_options))
    }

    pub fn current_directory(&self) -> &Path {
        &self.current_directory
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// `[rootDir]` when set, otherwise `rootDirs`. Absolute and normalized.
    pub fn root_dirs(&self) -> Result<Vec<PathBuf>, TransformError> {
        let dirs = match (&self.options.root_dir, &self.options.root_dirs) {
            (Some(dir), _) => vec![dir.clone()],
            (None, Some(dirs)) if !dirs.is_empty() => dirs.clone(),
            _ => {
                return Err(TransformError::configuration(
                    "rootDir or rootDirs must be specified",
                ))
            }
        };
        Ok(dirs.iter().map(|d| self.absolute(d)).collect())
    }

    pub fn out_dir(&self) -> Result<PathBuf, TransformError> {
        self.options
            .out_dir
            .as_ref()
            .map(|d| self.absolute(d))
            .ok_or_else(|| TransformError::configuration("outDir must be specified"))
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        normalize_path(&self.current_directory.join(path))
    }
}

fn strip_json_comments(source: &str) -> String {
    lazy_static! {
        static ref BLOCK_COMMENT_RE: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
        static ref LINE_COMMENT_RE: Regex = Regex::new(r"(?m)^\s*//.*$").unwrap();
        static ref TRAILING_COMMA_RE: Regex = Regex::new(r",(\s*[}\]])").unwrap();
    }
    let without_blocks = BLOCK_COMMENT_RE.replace_all(source, "");
    let without_lines = LINE_COMMENT_RE.replace_all(&without_blocks, "");
    TRAILING_COMMA_RE
        .replace_all(&without_lines, "$1")
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lexical normalization: drops `.` components and folds `..` into its parent.
/// Never touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Walks up from the first directory until every directory lies under it.
pub fn find_ancestor_dir(dirs: &[PathBuf]) -> Option<PathBuf> {
    let normalized: Vec<PathBuf> = dirs.iter().map(|d| normalize_path(d)).collect();
    let mut current = normalized.first()?.clone();
    while !normalized.iter().all(|d| d.starts_with(&current)) {
        if !current.pop() {
            return None;
        }
    }
    Some(current)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH TRANSLATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum Translation {
    /// Replace the first segment equal to `source` with `output`.
    Tokens { source: String, output: String },
    /// Re-root paths under `root_dir` into `out_dir`.
    Directories {
        current_dir: PathBuf,
        root_dir: PathBuf,
        out_dir: PathBuf,
    },
}

/// Maps a source location written in a macro literal to the compiled output
/// location the project manifest describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    translation: Translation,
}

impl PathTranslator {
    pub fn from_tokens(source: impl Into<String>, output: impl Into<String>) -> Self {
        PathTranslator {
            translation: Translation::Tokens {
                source: source.into(),
                output: output.into(),
            },
        }
    }

    pub fn from_config(config: &TransformerConfig) -> Self {
        Self::from_tokens(config.source_root.clone(), config.output_root.clone())
    }

    pub fn from_program(program: &CompilerProgram) -> Result<Self, TransformError> {
        let mut dirs = program.root_dirs()?;
        let root_dir = if dirs.len() == 1 {
            dirs.remove(0)
        } else {
            find_ancestor_dir(&dirs).ok_or_else(|| {
                TransformError::configuration("rootDirs have no common ancestor directory")
            })?
        };
        Ok(PathTranslator {
            translation: Translation::Directories {
                current_dir: program.current_directory().to_path_buf(),
                root_dir,
                out_dir: program.out_dir()?,
            },
        })
    }

    pub fn translate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.translation {
            Translation::Tokens { source, output } => {
                let mut replaced = false;
                let mut out = PathBuf::new();
                for component in path.components() {
                    match component {
                        Component::Normal(seg) if !replaced && seg == OsStr::new(source) => {
                            out.push(output);
                            replaced = true;
                        }
                        other => out.push(other.as_os_str()),
                    }
                }
                out
            }
            Translation::Directories {
                current_dir,
                root_dir,
                out_dir,
            } => {
                let absolute = normalize_path(&current_dir.join(path));
                match absolute.strip_prefix(root_dir) {
                    Ok(rest) => out_dir.join(rest),
                    Err(_) => absolute,
                }
            }
        }
    }
}
