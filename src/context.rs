//! Transform context: the shared, read-only project inputs and the per-unit
//! state one traversal carries.

use crate::config::TransformerConfig;
use crate::diagnostics::TransformError;
use crate::program::{CompilerProgram, PathTranslator};
use crate::resolver::ProjectResolver;
use crate::visitor::{AliasCollector, MacroRewriter};
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_ast::AstBuilder;
use oxc_ast_visit::{Visit, VisitMut};
use oxc_semantic::{SemanticBuilder, SymbolId};
use std::collections::{BTreeSet, HashSet};

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT (shared across units)
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything built once before the first unit is traversed.
#[derive(Debug, Clone)]
pub struct Project {
    program: Option<CompilerProgram>,
    resolver: ProjectResolver,
    translator: PathTranslator,
    config: TransformerConfig,
}

impl Project {
    /// Paths in macro literals are translated with the configured
    /// `sourceRoot` → `outputRoot` tokens.
    pub fn new(resolver: ProjectResolver, config: TransformerConfig) -> Self {
        Project {
            program: None,
            translator: PathTranslator::from_config(&config),
            resolver,
            config,
        }
    }

    /// Paths in macro literals are translated with the program's
    /// `rootDir`/`outDir`.
    pub fn with_program(
        program: CompilerProgram,
        resolver: ProjectResolver,
        config: TransformerConfig,
    ) -> Result<Self, TransformError> {
        let translator = PathTranslator::from_program(&program)?;
        Ok(Project {
            program: Some(program),
            resolver,
            translator,
            config,
        })
    }

    pub fn program(&self) -> Option<&CompilerProgram> {
        self.program.as_ref()
    }

    pub fn resolver(&self) -> &ProjectResolver {
        &self.resolver
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACRO ALIASES
// ═══════════════════════════════════════════════════════════════════════════════

/// Bindings through which the macro is reachable in one unit. Only grows.
///
/// Names back the public recognition API; symbols are what call sites are
/// matched against, so a local that shadows an import is never the macro.
#[derive(Debug, Clone, Default)]
pub struct MacroAliases {
    functions: HashSet<String>,
    namespaces: BTreeSet<String>,
    function_symbols: HashSet<SymbolId>,
    namespace_symbols: HashSet<SymbolId>,
}

impl MacroAliases {
    pub fn record_alias(&mut self, name: &str) {
        if self.functions.insert(name.to_string()) {
            tracing::debug!(alias = name, "recorded path macro alias");
        }
    }

    pub fn record_namespace_alias(&mut self, name: &str) {
        if self.namespaces.insert(name.to_string()) {
            tracing::debug!(alias = name, "recorded path macro namespace");
        }
    }

    pub fn bind_function(&mut self, name: &str, symbol: Option<SymbolId>) {
        self.record_alias(name);
        if let Some(symbol) = symbol {
            self.function_symbols.insert(symbol);
        }
    }

    pub fn bind_namespace(&mut self, name: &str, symbol: Option<SymbolId>) {
        self.record_namespace_alias(name);
        if let Some(symbol) = symbol {
            self.namespace_symbols.insert(symbol);
        }
    }

    pub fn is_recognized_callee(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub fn is_namespace_alias(&self, name: &str) -> bool {
        self.namespaces.contains(name)
    }

    pub fn is_function_symbol(&self, symbol: SymbolId) -> bool {
        self.function_symbols.contains(&symbol)
    }

    pub fn is_namespace_symbol(&self, symbol: SymbolId) -> bool {
        self.namespace_symbols.contains(&symbol)
    }

    /// First namespace alias by name.
    pub fn runtime_receiver(&self) -> Option<&str> {
        self.namespaces.iter().next().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.namespaces.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM CONTEXT (one per unit)
// ═══════════════════════════════════════════════════════════════════════════════

/// Created for one compilation unit and consumed by [`TransformContext::enter_unit`].
pub struct TransformContext<'a, 'p> {
    ast: AstBuilder<'a>,
    project: &'p Project,
    file_path: String,
    aliases: MacroAliases,
}

impl<'a, 'p> TransformContext<'a, 'p> {
    pub fn new(allocator: &'a Allocator, project: &'p Project, file_path: impl Into<String>) -> Self {
        TransformContext {
            ast: AstBuilder::new(allocator),
            project,
            file_path: file_path.into(),
            aliases: MacroAliases::default(),
        }
    }

    pub fn record_alias(&mut self, name: &str) {
        self.aliases.record_alias(name);
    }

    pub fn is_recognized_callee(&self, name: &str) -> bool {
        self.aliases.is_recognized_callee(name)
    }

    pub fn aliases(&self) -> &MacroAliases {
        &self.aliases
    }

    /// Runs the pass over one unit. On error the unit is dropped, so no
    /// partially rewritten tree ever escapes.
    pub fn enter_unit(mut self, mut program: Program<'a>) -> Result<Program<'a>, TransformError> {
        // Binds every identifier reference to its symbol; import specifiers
        // carry their symbol ids from here on.
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        AliasCollector::new(self.project, &mut self.aliases).visit_program(&program);
        if self.aliases.is_empty() {
            return Ok(program);
        }

        let mut rewriter = MacroRewriter::new(
            self.ast,
            self.project,
            &self.aliases,
            &scoping,
            &self.file_path,
            program.source_text,
        );
        rewriter.visit_program(&mut program);
        let rewritten = rewriter.finish()?;

        tracing::info!(file = %self.file_path, rewritten, "transformed unit");
        Ok(program)
    }
}
