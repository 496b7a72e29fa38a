//! # Yeagar path macro transformer
//!
//! Rewrites calls to the `$path` macro exported by `rbxts-transformer-yeagar`
//! into the location of a file inside the project tree declared by a Rojo
//! manifest:
//!
//! ```ts
//! import { $path } from "rbxts-transformer-yeagar";
//! const remotes = $path("src/shared/remotes.ts");
//! // becomes
//! const remotes = ["ReplicatedStorage", "Shared", "remotes"];
//! ```
//!
//! ## Invariants
//!
//! 1. **Setup before traversal**: the manifest and compiler options are loaded
//!    once into a [`Project`]. A bad manifest fails the run before any unit is
//!    touched.
//! 2. **One context per unit**: [`TransformContext::enter_unit`] consumes its
//!    context; aliases never leak between units.
//! 3. **No partial output**: a malformed call or an unresolvable path fails the
//!    unit, and the unit's tree is dropped.
//! 4. **Single application**: rewritten call sites no longer match the macro,
//!    so running the pass twice changes nothing.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;

mod config;
mod context;
mod diagnostics;
mod driver;
mod program;
mod resolver;
mod visitor;

#[cfg(test)]
mod transform_tests;

pub use config::{RewriteShape, TransformerConfig, DEFAULT_MACRO_MODULE};
pub use context::{MacroAliases, Project, TransformContext};
pub use diagnostics::{
    Diagnostic, SourceLocation, TransformError, ERR_CONFIG, ERR_RESOLVE, ERR_SYNTAX,
    ERR_USAGE_ARITY, ERR_USAGE_LITERAL, ERR_USAGE_RUNTIME,
};
pub use driver::{find_tsconfig_path, Driver, DriverOptions};
pub use program::{find_ancestor_dir, normalize_path, CompilerOptions, CompilerProgram, PathTranslator};
pub use resolver::{find_manifest_path, MountEntry, MountTable, ProjectResolver};

/// Parses one TypeScript unit, runs the pass and prints the result.
pub fn transform_source(
    source: &str,
    file_path: &str,
    project: &Project,
) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true)
        .with_jsx(file_path.ends_with(".tsx"));

    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TransformError::Usage(Diagnostic::new(
            diagnostics::ERR_SYNTAX,
            &format!("Failed to parse {}: {:?}", file_path, error),
        )));
    }

    let context = TransformContext::new(&allocator, project, file_path);
    let program = context.enter_unit(ret.program)?;
    Ok(Codegen::new().build(&program).code)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi(object)]
pub struct TransformOutput {
    pub code: Option<String>,
    pub error: Option<Diagnostic>,
}

/// Node entry point. `manifest_path` may be empty to discover the manifest
/// from the file's directory.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_source_native(
    source: String,
    file_path: String,
    manifest_path: String,
    config_json: Option<String>,
) -> TransformOutput {
    let result = (|| -> Result<String, TransformError> {
        let config = match &config_json {
            Some(json) => TransformerConfig::from_json(json)?,
            None => TransformerConfig::default(),
        };
        let file_dir = std::path::Path::new(&file_path)
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."));
        let explicit = (!manifest_path.is_empty()).then(|| std::path::PathBuf::from(&manifest_path));
        let resolver = ProjectResolver::discover(file_dir, explicit.as_deref())?;
        let project = Project::new(resolver, config);
        transform_source(&source, &file_path, &project)
    })();

    match result {
        Ok(code) => TransformOutput {
            code: Some(code),
            error: None,
        },
        Err(err) => TransformOutput {
            code: None,
            error: Some(err.diagnostic().clone()),
        },
    }
}
