#[cfg(test)]
mod tests {
    use crate::config::{RewriteShape, TransformerConfig};
    use crate::context::{Project, TransformContext};
    use crate::diagnostics::{
        TransformError, ERR_RESOLVE, ERR_SYNTAX, ERR_USAGE_ARITY, ERR_USAGE_LITERAL,
        ERR_USAGE_RUNTIME,
    };
    use crate::resolver::ProjectResolver;
    use crate::transform_source;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::{ArrayExpression, ArrayExpressionElement};
    use oxc_ast_visit::{walk, Visit};
    use oxc_parser::Parser;
    use oxc_span::SourceType;
    use std::path::PathBuf;

    const FILE: &str = "/game/src/client/main.ts";

    fn segs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn project_with(shape: RewriteShape) -> Project {
        let resolver = ProjectResolver::from_mounts(
            "/game",
            vec![
                (PathBuf::from("out"), segs(&["ReplicatedStorage", "Game"])),
                (PathBuf::from("out/shared"), segs(&["ReplicatedStorage", "Shared"])),
            ],
        )
        .unwrap();
        let config = TransformerConfig {
            rewrite_shape: shape,
            ..Default::default()
        };
        Project::new(resolver, config)
    }

    fn project() -> Project {
        project_with(RewriteShape::Inline)
    }

    struct ArrayCollector {
        arrays: Vec<Vec<String>>,
    }

    impl<'a> Visit<'a> for ArrayCollector {
        fn visit_array_expression(&mut self, arr: &ArrayExpression<'a>) {
            let items = arr
                .elements
                .iter()
                .filter_map(|el| match el {
                    ArrayExpressionElement::StringLiteral(s) => Some(s.value.to_string()),
                    _ => None,
                })
                .collect();
            self.arrays.push(items);
            walk::walk_array_expression(self, arr);
        }
    }

    /// Re-parses printed output and returns every array literal's strings.
    fn arrays_in(code: &str) -> Vec<Vec<String>> {
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_typescript(true)
            .with_module(true);
        let ret = Parser::new(&allocator, code, source_type).parse();
        assert!(ret.errors.is_empty(), "output does not parse: {}", code);
        let mut collector = ArrayCollector { arrays: vec![] };
        collector.visit_program(&ret.program);
        collector.arrays
    }

    fn transform(code: &str) -> Result<String, TransformError> {
        transform_source(code, FILE, &project())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // RECOGNITION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_named_import_is_rewritten() {
        let out = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
const net = $path("src/shared/net.ts");"#,
        )
        .unwrap();
        assert_eq!(
            arrays_in(&out),
            vec![segs(&["ReplicatedStorage", "Shared", "net"])]
        );
        assert!(!out.contains("$path("), "call should be gone: {}", out);
    }

    #[test]
    fn test_renamed_import_matches_direct_use() {
        let direct = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
export const a = $path("src/a.ts");"#,
        )
        .unwrap();
        let aliased = transform(
            r#"import { $path as p } from "rbxts-transformer-yeagar";
export const a = p("src/a.ts");"#,
        )
        .unwrap();
        assert_eq!(arrays_in(&direct), vec![segs(&["ReplicatedStorage", "Game", "a"])]);
        assert_eq!(arrays_in(&direct), arrays_in(&aliased));
    }

    #[test]
    fn test_namespace_method_call() {
        let out = transform(
            r#"import Yeagar from "rbxts-transformer-yeagar";
const bar = Yeagar.addPath("src/foo/bar.ts");"#,
        )
        .unwrap();
        assert_eq!(
            arrays_in(&out),
            vec![segs(&["ReplicatedStorage", "Game", "foo", "bar"])]
        );
        assert!(!out.contains("addPath"), "got: {}", out);
    }

    #[test]
    fn test_star_import_method_call() {
        let out = transform(
            r#"import * as Y from "rbxts-transformer-yeagar";
const bar = Y.addPath("src/foo/bar.ts");"#,
        )
        .unwrap();
        assert_eq!(
            arrays_in(&out),
            vec![segs(&["ReplicatedStorage", "Game", "foo", "bar"])]
        );
    }

    #[test]
    fn test_call_before_import_is_recognized() {
        let out = transform(
            r#"const early = $path("src/a.ts");
import { $path } from "rbxts-transformer-yeagar";"#,
        )
        .unwrap();
        assert_eq!(arrays_in(&out), vec![segs(&["ReplicatedStorage", "Game", "a"])]);
    }

    #[test]
    fn test_nested_call_sites() {
        let out = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
register(() => $path("src/shared/a.ts"), [$path("src/b.ts")]);
function f() { return { where: $path("src/shared/ui/init.ts") }; }"#,
        )
        .unwrap();
        let arrays = arrays_in(&out);
        assert!(arrays.contains(&segs(&["ReplicatedStorage", "Shared", "a"])));
        assert!(arrays.contains(&segs(&["ReplicatedStorage", "Game", "b"])));
        assert!(arrays.contains(&segs(&["ReplicatedStorage", "Shared", "ui"])));
    }

    #[test]
    fn test_unrelated_calls_untouched() {
        let source = r#"import { $path } from "some-other-module";
import Yeagar from "rbxts-transformer-yeagar";
const a = $path("src/a.ts");
const b = Other.addPath("src/a.ts");
const c = Yeagar.other("src/a.ts");"#;
        let out = transform(source).unwrap();
        assert!(arrays_in(&out).is_empty(), "nothing should be rewritten: {}", out);
        assert!(out.contains("$path(\"src/a.ts\")"));
        assert!(out.contains("Other.addPath(\"src/a.ts\")"));
    }

    #[test]
    fn test_type_only_import_is_ignored() {
        let out = transform(
            r#"import type { $path } from "rbxts-transformer-yeagar";
const a = $path("src/a.ts");"#,
        )
        .unwrap();
        assert!(out.contains("$path(\"src/a.ts\")"), "got: {}", out);
    }

    #[test]
    fn test_shadowing_binding_is_not_the_macro() {
        let out = transform(
            r#"import Yeagar, { $path as p } from "rbxts-transformer-yeagar";
const a = p("src/a.ts");
function g(p: (x: number, y: number) => string[]) { return p(1, 2); }
const h = (p: (s: string) => string[]) => p("src/b.ts");
function k(Yeagar: { addPath(s: string): string[] }) { return Yeagar.addPath("src/c.ts"); }"#,
        )
        .unwrap();
        assert_eq!(arrays_in(&out), vec![segs(&["ReplicatedStorage", "Game", "a"])]);
        assert!(out.contains("p(1, 2)"), "got: {}", out);
        assert!(out.contains("p(\"src/b.ts\")"), "got: {}", out);
        assert!(out.contains("Yeagar.addPath(\"src/c.ts\")"), "got: {}", out);
    }

    #[test]
    fn test_aliases_do_not_leak_between_units() {
        let project = project();
        transform_source(
            r#"import { $path } from "rbxts-transformer-yeagar";
$path("src/a.ts");"#,
            "/game/src/a.ts",
            &project,
        )
        .unwrap();
        let second = transform_source(r#"$path("src/a.ts");"#, "/game/src/b.ts", &project).unwrap();
        assert!(second.contains("$path(\"src/a.ts\")"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CALL SHAPE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_zero_arguments_pass_through() {
        let out = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
const a = $path();"#,
        )
        .unwrap();
        assert!(out.contains("$path()"), "got: {}", out);
        assert!(arrays_in(&out).is_empty());
    }

    #[test]
    fn test_two_arguments_is_usage_error() {
        let err = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
const a = $path("src/a.ts", "extra");"#,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Usage(_)));
        assert_eq!(err.code(), ERR_USAGE_ARITY);
        let loc = err.diagnostic().location.clone().unwrap();
        assert_eq!((loc.file.as_str(), loc.line, loc.column), (FILE, 2, 29));
    }

    #[test]
    fn test_non_literal_argument_is_usage_error() {
        for source in [
            "import { $path } from \"rbxts-transformer-yeagar\";\nconst file = \"src/a.ts\";\n$path(file);",
            "import { $path } from \"rbxts-transformer-yeagar\";\n$path(`src/a.ts`);",
            "import { $path } from \"rbxts-transformer-yeagar\";\n$path(...files);",
        ] {
            let err = transform(source).unwrap_err();
            assert_eq!(err.code(), ERR_USAGE_LITERAL, "source: {}", source);
            assert!(err.to_string().contains("macro only accepts string literals"));
        }
    }

    #[test]
    fn test_unresolvable_path_is_resolution_error() {
        let err = transform(
            r#"import { $path } from "rbxts-transformer-yeagar";
const ok = $path("src/a.ts");
const missing = $path("lib/elsewhere.ts");"#,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Resolution(_)));
        assert_eq!(err.code(), ERR_RESOLVE);
        assert!(err.to_string().contains("unable to find logical path for file"));
        let loc = err.diagnostic().location.clone().unwrap();
        assert_eq!((loc.line, loc.column), (3, 23));
    }

    #[test]
    fn test_syntax_error_fails_unit() {
        let err = transform("import { $path from").unwrap_err();
        assert_eq!(err.code(), ERR_SYNTAX);
    }

    #[test]
    fn test_tree_root_mount_yields_bare_segments() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("default.project.json");
        std::fs::write(&manifest, r#"{ "name": "pkg", "tree": { "$path": "out" } }"#).unwrap();
        let project = Project::new(
            ProjectResolver::from_manifest(&manifest).unwrap(),
            TransformerConfig::default(),
        );
        let out = transform_source(
            r#"import Yeagar from "rbxts-transformer-yeagar";
const bar = Yeagar.addPath("src/foo/bar.ts");"#,
            FILE,
            &project,
        )
        .unwrap();
        assert_eq!(arrays_in(&out), vec![segs(&["foo", "bar"])]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // REWRITE SHAPES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_runtime_call_shape() {
        let project = project_with(RewriteShape::RuntimeCall);
        let out = transform_source(
            r#"import Yeagar from "rbxts-transformer-yeagar";
const bar = Yeagar.addPath("src/foo/bar.ts");"#,
            FILE,
            &project,
        )
        .unwrap();
        assert!(out.contains("Yeagar._addPath(["), "got: {}", out);
        assert_eq!(
            arrays_in(&out),
            vec![segs(&["ReplicatedStorage", "Game", "foo", "bar"])]
        );
    }

    #[test]
    fn test_runtime_call_shape_keeps_receiver_and_function_form() {
        let project = project_with(RewriteShape::RuntimeCall);
        let out = transform_source(
            r#"import Y, { $path as p } from "rbxts-transformer-yeagar";
const a = Y.addPath("src/a.ts");
const b = p("src/shared/b.ts");"#,
            FILE,
            &project,
        )
        .unwrap();
        assert_eq!(out.matches("Y._addPath(").count(), 2, "got: {}", out);
        assert!(!out.contains("Yeagar"), "got: {}", out);
        assert_eq!(arrays_in(&out).len(), 2);
    }

    #[test]
    fn test_runtime_call_shape_needs_an_imported_receiver() {
        let project = project_with(RewriteShape::RuntimeCall);
        let err = transform_source(
            r#"import { $path as p } from "rbxts-transformer-yeagar";
const a = p("src/a.ts");"#,
            FILE,
            &project,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Usage(_)));
        assert_eq!(err.code(), ERR_USAGE_RUNTIME);
        let loc = err.diagnostic().location.clone().unwrap();
        assert_eq!((loc.line, loc.column), (2, 11));
    }

    #[test]
    fn test_pass_is_single_application_safe() {
        for shape in [RewriteShape::Inline, RewriteShape::RuntimeCall] {
            let project = project_with(shape);
            let source = r#"import Yeagar, { $path } from "rbxts-transformer-yeagar";
const a = Yeagar.addPath("src/foo/bar.ts");
const b = $path("src/shared/c.ts");"#;
            let once = transform_source(source, FILE, &project).unwrap();
            let twice = transform_source(&once, FILE, &project).unwrap();
            assert_eq!(once, twice);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTEXT
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_context_alias_recording_is_idempotent() {
        let allocator = Allocator::default();
        let project = project();
        let mut context = TransformContext::new(&allocator, &project, FILE);
        assert!(!context.is_recognized_callee("p"));
        context.record_alias("p");
        context.record_alias("p");
        assert!(context.is_recognized_callee("p"));
        assert!(!context.is_recognized_callee("$path"));
    }

    #[test]
    fn test_enter_unit_returns_rewritten_program() {
        let allocator = Allocator::default();
        let project = project();
        let source = r#"import { $path } from "rbxts-transformer-yeagar";
export const a = $path("src/a.ts");"#;
        let source_type = SourceType::default()
            .with_typescript(true)
            .with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        let body_len = ret.program.body.len();

        let program = TransformContext::new(&allocator, &project, FILE)
            .enter_unit(ret.program)
            .unwrap();
        // Same root, same statements; the import stays in place.
        assert_eq!(program.body.len(), body_len);

        let mut collector = ArrayCollector { arrays: vec![] };
        collector.visit_program(&program);
        assert_eq!(collector.arrays, vec![segs(&["ReplicatedStorage", "Game", "a"])]);
    }

    #[test]
    fn test_enter_unit_hands_back_nothing_after_a_late_error() {
        let allocator = Allocator::default();
        let project = project();
        let source = r#"import { $path } from "rbxts-transformer-yeagar";
export const ok = $path("src/a.ts");
export const bad = $path("src/b.ts", "extra");"#;
        let source_type = SourceType::default()
            .with_typescript(true)
            .with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();

        let result = TransformContext::new(&allocator, &project, FILE).enter_unit(ret.program);
        let Err(err) = result else {
            panic!("a unit with a bad call must not produce a program");
        };
        assert_eq!(err.code(), ERR_USAGE_ARITY);
        assert_eq!(err.diagnostic().location.as_ref().map(|l| l.line), Some(3));
    }
}
