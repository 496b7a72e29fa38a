//! Macro-rewrite traversal.
//!
//! Two passes over one unit:
//! 1. `AliasCollector` records every local name bound to the macro module.
//! 2. `MacroRewriter` replaces each recognized call with its resolved path.
//!
//! Collecting first makes recognition independent of where the import sits.
//! Call sites are matched by the symbol their callee resolves to, so a
//! parameter or local that shadows an import is left alone.

use crate::config::RewriteShape;
use crate::context::{MacroAliases, Project};
use crate::diagnostics::{
    Diagnostic, SourceLocation, TransformError, ERR_RESOLVE, ERR_USAGE_ARITY, ERR_USAGE_LITERAL,
    ERR_USAGE_RUNTIME,
};
use oxc_allocator::Box as oxc_box;
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::walk_expression;
use oxc_ast_visit::{Visit, VisitMut};
use oxc_semantic::{Scoping, SymbolId};
use oxc_span::{GetSpan, Span, SPAN};

// ═══════════════════════════════════════════════════════════════════════════════
// ALIAS COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct AliasCollector<'c> {
    macro_module: &'c str,
    path_export: &'c str,
    aliases: &'c mut MacroAliases,
}

impl<'c> AliasCollector<'c> {
    pub fn new(project: &'c Project, aliases: &'c mut MacroAliases) -> Self {
        AliasCollector {
            macro_module: &project.config().macro_module,
            path_export: &project.config().path_export,
            aliases,
        }
    }
}

impl<'a> Visit<'a> for AliasCollector<'_> {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if decl.source.value.as_str() != self.macro_module || decl.import_kind.is_type() {
            return;
        }
        let Some(specifiers) = &decl.specifiers else {
            return;
        };

        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                    let imported = match &spec.imported {
                        ModuleExportName::IdentifierName(id) => id.name.as_str(),
                        ModuleExportName::StringLiteral(s) => s.value.as_str(),
                        _ => continue,
                    };
                    if imported == self.path_export && !spec.import_kind.is_type() {
                        self.aliases
                            .bind_function(spec.local.name.as_str(), spec.local.symbol_id.get());
                    }
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                    self.aliases
                        .bind_namespace(spec.local.name.as_str(), spec.local.symbol_id.get());
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                    self.aliases
                        .bind_namespace(spec.local.name.as_str(), spec.local.symbol_id.get());
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACRO REWRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// How a recognized call site named the macro.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MacroCallee {
    /// `$path(...)` or a renamed import of it.
    Function,
    /// `Yeagar.addPath(...)`, carrying the receiver's local name.
    Method(String),
}

pub struct MacroRewriter<'a, 'c> {
    ast: AstBuilder<'a>,
    project: &'c Project,
    aliases: &'c MacroAliases,
    scoping: &'c Scoping,
    file_path: &'c str,
    source_text: &'a str,
    error: Option<TransformError>,
    rewritten: usize,
}

impl<'a, 'c> MacroRewriter<'a, 'c> {
    pub fn new(
        ast: AstBuilder<'a>,
        project: &'c Project,
        aliases: &'c MacroAliases,
        scoping: &'c Scoping,
        file_path: &'c str,
        source_text: &'a str,
    ) -> Self {
        MacroRewriter {
            ast,
            project,
            aliases,
            scoping,
            file_path,
            source_text,
            error: None,
            rewritten: 0,
        }
    }

    /// Number of rewritten call sites, or the first error hit.
    pub fn finish(self) -> Result<usize, TransformError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.rewritten),
        }
    }

    fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::from_offset(self.file_path, self.source_text, span.start)
    }

    /// Symbol the reference is bound to; `None` for globals and unresolved names.
    fn resolved_symbol(&self, id: &IdentifierReference<'a>) -> Option<SymbolId> {
        let reference_id = id.reference_id.get()?;
        self.scoping.get_reference(reference_id).symbol_id()
    }

    fn classify_callee(&self, callee: &Expression<'a>) -> Option<MacroCallee> {
        match callee {
            Expression::Identifier(id) => self
                .resolved_symbol(id)
                .filter(|symbol| self.aliases.is_function_symbol(*symbol))
                .map(|_| MacroCallee::Function),
            Expression::StaticMemberExpression(member)
                if member.property.name.as_str() == self.project.config().namespace_method =>
            {
                match &member.object {
                    Expression::Identifier(obj)
                        if self
                            .resolved_symbol(obj)
                            .is_some_and(|symbol| self.aliases.is_namespace_symbol(symbol)) =>
                    {
                        Some(MacroCallee::Method(obj.name.to_string()))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Receiver of the runtime-call shape. The function form borrows the
    /// unit's default or namespace import of the macro module.
    fn runtime_receiver(
        &self,
        callee: &MacroCallee,
        span: Span,
    ) -> Result<Option<String>, TransformError> {
        if self.project.config().rewrite_shape != RewriteShape::RuntimeCall {
            return Ok(None);
        }
        match callee {
            MacroCallee::Method(name) => Ok(Some(name.clone())),
            MacroCallee::Function => match self.aliases.runtime_receiver() {
                Some(name) => Ok(Some(name.to_string())),
                None => Err(TransformError::Usage(
                    Diagnostic::new(
                        ERR_USAGE_RUNTIME,
                        &format!(
                            "runtime path call needs a default or namespace import of '{}'",
                            self.project.config().macro_module
                        ),
                    )
                    .at(self.location(span))
                    .with_hint("Add `import Yeagar from \"rbxts-transformer-yeagar\"` to this file"),
                )),
            },
        }
    }

    /// `Ok(None)` leaves the call untouched; the walk continues into it.
    fn rewrite_call(
        &mut self,
        call: &CallExpression<'a>,
    ) -> Result<Option<Expression<'a>>, TransformError> {
        let Some(callee) = self.classify_callee(&call.callee) else {
            return Ok(None);
        };

        match call.arguments.len() {
            0 => {
                tracing::debug!(
                    location = %self.location(call.span),
                    "path macro called without arguments; left as is"
                );
                return Ok(None);
            }
            1 => {}
            n => {
                return Err(TransformError::Usage(
                    Diagnostic::new(
                        ERR_USAGE_ARITY,
                        &format!("path macro expects exactly one argument, got {}", n),
                    )
                    .at(self.location(call.arguments[1].span())),
                ));
            }
        }

        let literal = match &call.arguments[0] {
            Argument::StringLiteral(lit) => lit,
            other => {
                return Err(TransformError::Usage(
                    Diagnostic::new(ERR_USAGE_LITERAL, "macro only accepts string literals")
                        .at(self.location(other.span()))
                        .with_hint("Write the file path inline, e.g. $path(\"src/shared/module.ts\")"),
                ));
            }
        };

        let receiver = self.runtime_receiver(&callee, call.span)?;

        let output_path = self.project.translator().translate(literal.value.as_str());
        let segments = self
            .project
            .resolver()
            .resolve(&output_path)
            .ok_or_else(|| {
                TransformError::Resolution(
                    Diagnostic::new(
                        ERR_RESOLVE,
                        &format!(
                            "unable to find logical path for file '{}' (looked up as '{}')",
                            literal.value,
                            output_path.display()
                        ),
                    )
                    .at(self.location(literal.span))
                    .with_hint("Check that a $path in the project manifest covers this file"),
                )
            })?;

        tracing::debug!(
            location = %self.location(call.span),
            path = %literal.value,
            logical = %segments.join("."),
            "rewrote path macro call"
        );
        Ok(Some(self.build_replacement(receiver, &segments)))
    }

    /// Array literal of the segments, wrapped in `receiver._addPath(...)` when
    /// a runtime receiver is given.
    fn build_replacement(&self, receiver: Option<String>, segments: &[String]) -> Expression<'a> {
        let mut elements = self.ast.vec();
        for segment in segments {
            let atom = self.ast.allocator.alloc_str(segment);
            elements.push(ArrayExpressionElement::from(
                self.ast.expression_string_literal(SPAN, atom, None),
            ));
        }
        let array = self.ast.expression_array(SPAN, elements);

        let Some(receiver) = receiver else {
            return array;
        };
        let receiver_atom = self.ast.allocator.alloc_str(&receiver);
        let method_atom = self.ast.allocator.alloc_str(&self.project.config().runtime_method);

        let callee = Expression::from(self.ast.member_expression_static(
            SPAN,
            self.ast.expression_identifier(SPAN, receiver_atom),
            self.ast.identifier_name(SPAN, method_atom),
            false,
        ));
        let mut args = self.ast.vec();
        args.push(Argument::from(array));

        self.ast.expression_call(
            SPAN,
            callee,
            None::<oxc_box<TSTypeParameterInstantiation>>,
            args,
            false,
        )
    }
}

impl<'a> VisitMut<'a> for MacroRewriter<'a, '_> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if self.error.is_some() {
            return;
        }

        if let Expression::CallExpression(call) = expr {
            match self.rewrite_call(call) {
                Ok(Some(replacement)) => {
                    // Segments are terminal literals; nothing below needs a visit.
                    *expr = replacement;
                    self.rewritten += 1;
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    self.error = Some(err);
                    return;
                }
            }
        }

        walk_expression(self, expr);
    }
}
