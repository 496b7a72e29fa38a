//! Driver: the setup a host performs before any unit is transformed.
//!
//! Locates `tsconfig.json` and the project manifest, builds the shared
//! [`Project`], then transforms units, one context each.

use crate::config::TransformerConfig;
use crate::context::Project;
use crate::diagnostics::TransformError;
use crate::program::CompilerProgram;
use crate::resolver::ProjectResolver;
use crate::transform_source;
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub const TSCONFIG_NAME: &str = "tsconfig.json";

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "yeagar", about = "Rewrites path macro calls into project tree paths")]
pub struct DriverOptions {
    /// tsconfig.json, or a directory to search upward from.
    #[arg(short = 'p', long = "project")]
    pub project: Option<PathBuf>,

    /// Rojo project manifest. Discovered from the project directory when omitted.
    #[arg(long = "rojo")]
    pub rojo: Option<PathBuf>,

    /// Transformer configuration as a JSON object.
    #[arg(long = "config")]
    pub config: Option<String>,

    /// Source files to transform.
    pub files: Vec<PathBuf>,
}

impl DriverOptions {
    /// Host compilers pass their own flags alongside ours; anything this
    /// parser does not understand is ignored rather than rejected.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args: Vec<std::ffi::OsString> = args.into_iter().map(Into::into).collect();
        match DriverOptions::try_parse_from(&args) {
            Ok(options) => options,
            Err(_) => scan_known_flags(&args),
        }
    }
}

/// Picks our flags out of a host command line wherever they appear. The
/// values of unknown flags cannot be told apart from inputs, so only
/// arguments naming a TypeScript source are taken as files.
fn scan_known_flags(args: &[std::ffi::OsString]) -> DriverOptions {
    let mut options = DriverOptions::default();
    let mut iter = args.iter().skip(1).map(|a| a.to_string_lossy().into_owned());
    while let Some(arg) = iter.next() {
        if let Some((flag, value)) = arg.split_once('=').filter(|_| arg.starts_with('-')) {
            apply_flag(&mut options, flag, Some(value.to_string()));
            continue;
        }
        match arg.as_str() {
            "-p" | "--project" | "--rojo" | "--config" => {
                let value = iter.next();
                apply_flag(&mut options, &arg, value);
            }
            _ if !arg.starts_with('-') && is_source_file(&arg) => {
                options.files.push(PathBuf::from(&arg))
            }
            _ => {}
        }
    }
    options
}

fn apply_flag(options: &mut DriverOptions, flag: &str, value: Option<String>) {
    match flag {
        "-p" | "--project" => options.project = value.map(PathBuf::from),
        "--rojo" => options.rojo = value.filter(|v| !v.is_empty()).map(PathBuf::from),
        "--config" => options.config = value,
        _ => {}
    }
}

fn is_source_file(arg: &str) -> bool {
    [".ts", ".tsx"].iter().any(|ext| arg.ends_with(ext))
}

/// `project` itself when it is a file, otherwise the nearest `tsconfig.json`
/// at or above it.
pub fn find_tsconfig_path(project: &Path) -> Result<PathBuf, TransformError> {
    if project.is_file() {
        return Ok(project.to_path_buf());
    }
    project
        .ancestors()
        .map(|dir| dir.join(TSCONFIG_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| TransformError::configuration("Unable to find tsconfig.json!"))
}

pub struct Driver {
    project: Project,
}

impl Driver {
    /// All fallible setup happens here, before any unit runs.
    pub fn new(options: &DriverOptions) -> Result<Self, TransformError> {
        let cwd = std::env::current_dir().map_err(|e| {
            TransformError::configuration(format!("Unable to read current directory: {}", e))
        })?;
        let project_arg = options.project.clone().unwrap_or_else(|| PathBuf::from("."));
        let tsconfig = find_tsconfig_path(&cwd.join(project_arg))?;
        let program = CompilerProgram::from_tsconfig(&tsconfig)?;

        let config = match &options.config {
            Some(json) => TransformerConfig::from_json(json)?,
            None => TransformerConfig::default(),
        };
        let rojo = options.rojo.as_ref().map(|p| cwd.join(p));
        let resolver = ProjectResolver::discover(program.current_directory(), rojo.as_deref())?;

        let project = if program.options().root_dir.is_some() || program.options().root_dirs.is_some()
        {
            Project::with_program(program, resolver, config)?
        } else {
            tracing::warn!(
                tsconfig = %tsconfig.display(),
                "no rootDir/rootDirs; falling back to configured source/output roots"
            );
            Project::new(resolver, config)
        };
        Ok(Driver { project })
    }

    pub fn from_project(project: Project) -> Self {
        Driver { project }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn transform_file(&self, path: &Path) -> Result<String, TransformError> {
        let source = fs::read_to_string(path).map_err(|e| {
            TransformError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        transform_source(&source, &path.to_string_lossy(), &self.project)
    }

    /// Transforms units in parallel. Each unit gets its own context; the
    /// project is shared read-only. Any failing unit fails the whole run.
    pub fn transform_units(&self, files: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, TransformError> {
        files
            .par_iter()
            .map(|path| self.transform_file(path).map(|code| (path.clone(), code)))
            .collect()
    }
}
