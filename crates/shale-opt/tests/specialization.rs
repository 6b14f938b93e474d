//! End-to-end behavior of the specialization pass over the builtin table.
//!
//! Trees are built directly, optimized to a fixpoint, and checked through
//! their rendered form, the pass report, and the per-pass trace.

use shale_opt::expr::{Constant, Expr, ExprKind};
use shale_opt::pass::{run_pass, PassEnv};
use shale_opt::table::{init_builtin_table, OperationSpec, ParamSpec, Variation, VariationTest};
use shale_opt::trace::{ChangeTag, ExceptionKind, TraceCollection};
use shale_opt::{
    ExactShapeOracle, MissKind, OptimizationReport, Optimizer, OptimizerConfig, Shape,
    ShapeKnowledge, SpecializationTable, Span, TableError, TargetGeneration,
};
use shale_opt::shape::VersionPredicate;

// ── Helpers ────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(target: TargetGeneration) -> OptimizerConfig {
    OptimizerConfig {
        target,
        ..Default::default()
    }
}

/// Optimize with the builtin table for `target`.
fn optimize_for(tree: Expr, target: TargetGeneration) -> (Expr, OptimizationReport) {
    init_logging();
    Optimizer::new(config(target)).unwrap().optimize(tree)
}

fn optimize(tree: Expr) -> (Expr, OptimizationReport) {
    optimize_for(tree, TargetGeneration::Modern)
}

/// One pass with the builtin table, keeping the trace for inspection.
fn single_pass(tree: Expr, target: TargetGeneration) -> (Expr, TraceCollection) {
    let env = PassEnv {
        table: init_builtin_table().unwrap(),
        oracle: &ExactShapeOracle,
        target,
    };
    let mut trace = TraceCollection::new();
    let out = run_pass(tree, &env, &mut trace);
    (out, trace)
}

fn exact(name: &str, shape: Shape) -> Expr {
    Expr::opaque(name, ShapeKnowledge::Exact(shape))
}

fn text() -> Expr {
    Expr::str("a,b")
}

fn miss_kinds(report: &OptimizationReport) -> Vec<&'static str> {
    report.misses.iter().map(|m| m.kind.code()).collect()
}

// ── Scenario A: dictionary keys ────────────────────────────────────────

/// `d.keys()` on an exact dictionary becomes the keys operation.
#[test]
fn test_keys_call_becomes_operation() {
    let (out, report) = optimize(Expr::method_call(exact("d", Shape::Dict), "keys", vec![]));
    assert_eq!(out.to_string(), "DictOperationKeys(d)");
    assert!(report.reached_fixpoint);
    assert_eq!(report.rewrites.len(), 2);
    assert!(report.misses.is_empty());
}

/// The legacy generation picks the list-returning constructor.
#[test]
fn test_keys_version_split_for_legacy() {
    let (out, _) = optimize_for(
        Expr::method_call(exact("d", Shape::Dict), "keys", vec![]),
        TargetGeneration::Legacy,
    );
    assert_eq!(out.to_string(), "DictOperationKeysList(d)");
}

/// `d.keys` with no call only narrows the lookup.
#[test]
fn test_keys_lookup_without_call_is_only_specialized() {
    let (out, report) = optimize(Expr::attribute(exact("d", Shape::Dict), "keys"));
    assert_eq!(
        out.kind,
        ExprKind::AttributeLookupSpecialized {
            source: Box::new(exact("d", Shape::Dict)),
            attribute: "keys".into(),
            shape: Shape::Dict,
        }
    );
    assert_eq!(report.rewrites.len(), 1);
    assert_eq!(report.rewrites[0].tag, ChangeTag::NewExpression);
}

#[test]
fn test_keys_report_summary() {
    let lookup = Expr::attribute(exact("d", Shape::Dict), "keys").with_span(Span::new(0, 6));
    let tree = Expr::call(lookup, vec![]).with_span(Span::new(0, 8));
    let (_, report) = optimize(tree);
    insta::assert_snapshot!(report.summary(), @r"
    passes: 2 (fixpoint)
    new_expression 0..6: Attribute lookup 'keys' of dict specialized.
    new_expression 0..8: Call to 'keys' of dict recognized.
    ");
}

// ── Scenario B: text split ─────────────────────────────────────────────

#[test]
fn test_split_without_arguments() {
    let (out, _) = optimize(Expr::method_call(text(), "split", vec![]));
    assert_eq!(out.to_string(), "StrOperationSplit1(\"a,b\")");
}

#[test]
fn test_split_with_separator_and_limit() {
    let (out, _) = optimize(Expr::method_call(
        text(),
        "split",
        vec![Expr::str(","), Expr::int(1)],
    ));
    assert_eq!(out.to_string(), "StrOperationSplit3(\"a,b\", \",\", 1)");
}

#[test]
fn test_split_keywords_are_put_in_parameter_order() {
    let tree = Expr::call_kw(
        Expr::attribute(text(), "split"),
        vec![],
        vec![("maxsplit", Expr::int(1)), ("sep", Expr::str(","))],
    );
    let (out, _) = optimize(tree);
    assert_eq!(out.to_string(), "StrOperationSplit3(\"a,b\", \",\", 1)");
}

/// An unproven separator keeps the generic call.
#[test]
fn test_split_with_unknown_separator_stays_generic() {
    let x = Expr::opaque("x", ShapeKnowledge::Unknown);
    let (out, report) = optimize(Expr::method_call(text(), "split", vec![x]));
    assert_eq!(out.to_string(), "\"a,b\".split@str(x)");
    assert!(matches!(out.kind, ExprKind::Call { .. }));
    assert_eq!(miss_kinds(&report), vec!["R0002"]);
}

#[test]
fn test_split_miss_report_summary() {
    let lookup = Expr::attribute(exact("s", Shape::Str), "split").with_span(Span::new(0, 7));
    let x = Expr::opaque("x", ShapeKnowledge::Unknown);
    let tree = Expr::call(lookup, vec![x]).with_span(Span::new(0, 10));
    let (_, report) = optimize(tree);
    insta::assert_snapshot!(report.summary(), @r"
    passes: 2 (fixpoint)
    new_expression 0..7: Attribute lookup 'split' of str specialized.
    R0002 0..10: 'split': call arguments do not fit: argument 'sep' not proven to be str
    ");
}

/// A separator of the wrong shape is not accepted either.
#[test]
fn test_split_separator_of_other_shape_stays_generic() {
    let (out, _) = optimize(Expr::method_call(
        text(),
        "split",
        vec![Expr::bytes(b",".to_vec())],
    ));
    assert!(matches!(out.kind, ExprKind::Call { .. }));
}

// ── Scenario C: unknown attribute ──────────────────────────────────────

#[test]
fn test_unknown_attribute_is_never_specialized() {
    for target in [TargetGeneration::Legacy, TargetGeneration::Modern] {
        for shape in [Shape::Dict, Shape::Str, Shape::Bytes] {
            let tree = Expr::method_call(exact("v", shape), "foo", vec![Expr::int(1)]);
            let (out, report) = optimize_for(tree.clone(), target);
            assert_eq!(out, tree);
            assert!(report.rewrites.is_empty());
            assert!(report.misses.is_empty());
            assert_eq!(report.passes, 1);
        }
    }
}

#[test]
fn test_unknown_attribute_may_raise_attribute_error() {
    let (_, trace) = single_pass(
        Expr::attribute(exact("d", Shape::Dict), "foo"),
        TargetGeneration::Modern,
    );
    assert!(trace.may_raise(ExceptionKind::AttributeError));
}

// ── Exactness guard ────────────────────────────────────────────────────

#[test]
fn test_inexact_sources_are_not_specialized() {
    for knowledge in [
        ShapeKnowledge::Possibly(Shape::Dict),
        ShapeKnowledge::Unknown,
    ] {
        let tree = Expr::method_call(Expr::opaque("o", knowledge), "keys", vec![]);
        let (out, report) = optimize(tree.clone());
        assert_eq!(out, tree);
        assert_eq!(miss_kinds(&report), vec!["R0001"]);
    }
}

#[test]
fn test_int_constant_is_not_a_shape() {
    let tree = Expr::method_call(Expr::int(7), "upper", vec![]);
    let (out, _) = optimize(tree.clone());
    assert_eq!(out, tree);
}

// ── Idempotence and monotonicity ───────────────────────────────────────

#[test]
fn test_specialized_lookup_without_call_is_idempotent() {
    let node = Expr::new(
        ExprKind::AttributeLookupSpecialized {
            source: Box::new(text()),
            attribute: "upper".into(),
            shape: Shape::Str,
        },
        Span::new(2, 9),
    );
    let (out, trace) = single_pass(node.clone(), TargetGeneration::Modern);
    assert_eq!(out, node);
    assert_eq!(trace.rewrite_count(), 0);
}

#[test]
fn test_optimized_tree_is_a_fixpoint() {
    let tree = Expr::sequence(vec![
        Expr::method_call(exact("d", Shape::Dict), "get", vec![Expr::str("k")]),
        Expr::attribute(text(), "upper"),
        Expr::method_call(text(), "split", vec![Expr::opaque("x", ShapeKnowledge::Unknown)]),
    ]);
    let (once, _) = optimize(tree);
    let (twice, report) = optimize(once.clone());
    assert_eq!(twice, once);
    assert!(report.rewrites.is_empty());
    assert_eq!(report.passes, 1);
}

/// A specialized node keeps its shape across passes, even when its source
/// would now match a different one.
#[test]
fn test_specialized_shape_never_changes() {
    let node = Expr::new(
        ExprKind::AttributeLookupSpecialized {
            source: Box::new(exact("d", Shape::Dict)),
            attribute: "copy".into(),
            shape: Shape::Str,
        },
        Span::new(0, 6),
    );
    let mut tree = node.clone();
    for _ in 0..4 {
        let (out, trace) = single_pass(tree, TargetGeneration::Modern);
        assert_eq!(out, node);
        assert_eq!(trace.rewrite_count(), 0);
        tree = out;
    }
}

/// Once narrowed, a lookup only ever moves on to an operation.
#[test]
fn test_lineage_only_moves_forward() {
    let tree = Expr::method_call(exact("d", Shape::Dict), "items", vec![]);
    let (first, _) = single_pass(tree, TargetGeneration::Modern);
    assert!(matches!(first.kind, ExprKind::Operation { .. }));
    let (second, trace) = single_pass(first.clone(), TargetGeneration::Modern);
    assert_eq!(second, first);
    assert_eq!(trace.rewrite_count(), 0);
}

/// Dependent specializations propagate within one pass.
#[test]
fn test_chained_specializations_in_one_pass() {
    let copy = Expr::method_call(exact("d", Shape::Dict), "copy", vec![]);
    let tree = Expr::method_call(copy, "keys", vec![]);
    let (out, trace) = single_pass(tree, TargetGeneration::Modern);
    assert_eq!(out.to_string(), "DictOperationKeys(DictOperationCopy(d))");
    assert_eq!(trace.rewrite_count(), 4);
}

#[test]
fn test_case_mapping_result_keeps_shape() {
    let upper = Expr::method_call(text(), "upper", vec![]);
    let tree = Expr::method_call(upper, "split", vec![Expr::str(",")]);
    let (out, _) = optimize(tree);
    assert_eq!(
        out.to_string(),
        "StrOperationSplit2(StrOperationUpper(\"a,b\"), \",\")"
    );
}

// ── Variation selection ────────────────────────────────────────────────

fn synthetic_table(variations: Vec<Variation>) -> SpecializationTable {
    SpecializationTable::from_specs([OperationSpec::new("pick", Shape::Str)
        .params(&[ParamSpec::any("a"), ParamSpec::any("b")])
        .variations(variations)])
    .unwrap()
}

fn optimize_with(table: &SpecializationTable, tree: Expr) -> Expr {
    Optimizer::with_table(table, &ExactShapeOracle, OptimizerConfig::default())
        .optimize(tree)
        .0
}

/// With V1 (one optional parameter) and V2 (two), supplying both picks V2.
#[test]
fn test_most_specific_variation_wins() {
    let table = synthetic_table(vec![
        Variation::new("V0", &[], VariationTest::Base),
        Variation::new("V1", &[0], VariationTest::Supplied(0)),
        Variation::new("V2", &[0, 1], VariationTest::Supplied(1)),
    ]);
    let tree = Expr::method_call(text(), "pick", vec![Expr::int(1), Expr::int(2)]);
    assert_eq!(optimize_with(&table, tree).to_string(), "StrOperationV2(\"a,b\", 1, 2)");

    let tree = Expr::method_call(text(), "pick", vec![Expr::int(1)]);
    assert_eq!(optimize_with(&table, tree).to_string(), "StrOperationV1(\"a,b\", 1)");

    let tree = Expr::method_call(text(), "pick", vec![]);
    assert_eq!(optimize_with(&table, tree).to_string(), "StrOperationV0(\"a,b\")");
}

/// Declaration order does not matter across specificities.
#[test]
fn test_variation_order_is_by_specificity() {
    let table = synthetic_table(vec![
        Variation::new("V1", &[0], VariationTest::Supplied(0)),
        Variation::new("V0", &[], VariationTest::Base),
        Variation::new("V2", &[0, 1], VariationTest::Supplied(1)),
    ]);
    let tree = Expr::method_call(text(), "pick", vec![Expr::int(1), Expr::int(2)]);
    assert_eq!(optimize_with(&table, tree).to_string(), "StrOperationV2(\"a,b\", 1, 2)");
}

/// Equal specificity is decided by declaration order.
#[test]
fn test_equal_specificity_uses_declaration_order() {
    let first_a = synthetic_table(vec![
        Variation::new("Base", &[], VariationTest::Base),
        Variation::new("A", &[0, 1], VariationTest::Supplied(0)),
        Variation::new("B", &[0, 1], VariationTest::Supplied(1)),
    ]);
    let first_b = synthetic_table(vec![
        Variation::new("Base", &[], VariationTest::Base),
        Variation::new("B", &[0, 1], VariationTest::Supplied(1)),
        Variation::new("A", &[0, 1], VariationTest::Supplied(0)),
    ]);
    let tree = Expr::method_call(text(), "pick", vec![Expr::int(1), Expr::int(2)]);
    assert_eq!(
        optimize_with(&first_a, tree.clone()).to_string(),
        "StrOperationA(\"a,b\", 1, 2)"
    );
    assert_eq!(
        optimize_with(&first_b, tree).to_string(),
        "StrOperationB(\"a,b\", 1, 2)"
    );
}

#[test]
fn test_optional_default_variation() {
    let d = exact("d", Shape::Dict);
    let (out, _) = optimize(Expr::method_call(d.clone(), "get", vec![Expr::str("k")]));
    assert_eq!(out.to_string(), "DictOperationGet2(d, \"k\")");
    let (out, _) = optimize(Expr::method_call(d, "get", vec![Expr::str("k"), Expr::none()]));
    assert_eq!(out.to_string(), "DictOperationGet3(d, \"k\", None)");
}

#[test]
fn test_too_many_arguments_stay_generic() {
    let args = vec![Expr::str("k"), Expr::none(), Expr::int(3)];
    let (out, report) = optimize(Expr::method_call(exact("d", Shape::Dict), "get", args));
    assert!(matches!(out.kind, ExprKind::Call { .. }));
    assert_eq!(miss_kinds(&report), vec!["R0002"]);
}

// ── Generation gating ──────────────────────────────────────────────────

#[test]
fn test_legacy_only_attribute() {
    let tree = Expr::method_call(exact("d", Shape::Dict), "has_key", vec![Expr::str("k")]);
    let (out, _) = optimize_for(tree.clone(), TargetGeneration::Legacy);
    assert_eq!(out.to_string(), "DictOperationHaskey(d, \"k\")");

    let (out, report) = optimize_for(tree.clone(), TargetGeneration::Modern);
    assert_eq!(out, tree);
    assert_eq!(miss_kinds(&report), vec!["R0001"]);
}

#[test]
fn test_byte_sequences_are_modern_only() {
    let tree = Expr::method_call(Expr::bytes(b"ab".to_vec()), "upper", vec![]);
    let (out, _) = optimize_for(tree.clone(), TargetGeneration::Modern);
    assert_eq!(out.to_string(), "BytesOperationUpper(b\"ab\")");
    let (out, _) = optimize_for(tree.clone(), TargetGeneration::Legacy);
    assert_eq!(out, tree);
}

#[test]
fn test_modern_only_text_method() {
    let tree = Expr::method_call(text(), "casefold", vec![]);
    let (out, _) = optimize_for(tree.clone(), TargetGeneration::Legacy);
    assert_eq!(out, tree);
    let (out, _) = optimize_for(tree, TargetGeneration::Modern);
    assert_eq!(out.to_string(), "StrOperationCasefold(\"a,b\")");
}

/// An entry that narrows for every generation but only has its operation
/// on the modern one.
fn modern_operation_table() -> SpecializationTable {
    SpecializationTable::from_specs([OperationSpec::new("casefold", Shape::Str)
        .single("Casefold")
        .available(VersionPredicate::ModernOnly)
        .returns(Shape::Str)])
    .unwrap()
}

fn optimize_table_for(
    table: &SpecializationTable,
    tree: Expr,
    target: TargetGeneration,
) -> (Expr, OptimizationReport) {
    init_logging();
    Optimizer::with_table(table, &ExactShapeOracle, config(target)).optimize(tree)
}

/// On the legacy generation the lookup narrows but the call stays.
#[test]
fn test_unavailable_operation_keeps_direct_call() {
    let table = modern_operation_table();
    let tree = Expr::method_call(exact("s", Shape::Str), "casefold", vec![]);

    let (out, report) = optimize_table_for(&table, tree.clone(), TargetGeneration::Legacy);
    assert_eq!(out.to_string(), "s.casefold@str()");
    assert_eq!(miss_kinds(&report), vec!["R0003"]);
    assert!(report.reached_fixpoint);

    let (out, report) = optimize_table_for(&table, tree, TargetGeneration::Modern);
    assert_eq!(out.to_string(), "StrOperationCasefold(s)");
    assert!(report.misses.is_empty());
}

/// `let m = s.casefold in m()` follows the same availability gate.
#[test]
fn test_unavailable_operation_keeps_call_through_variable() {
    let table = modern_operation_table();
    let tree = Expr::let_in(
        "m",
        Expr::attribute(exact("s", Shape::Str), "casefold"),
        Expr::call(Expr::var("m"), vec![]),
    );

    let (out, report) = optimize_table_for(&table, tree.clone(), TargetGeneration::Legacy);
    assert_eq!(out.to_string(), "let m = s.casefold@str in m()");
    assert_eq!(miss_kinds(&report), vec!["R0003"]);

    let (out, report) = optimize_table_for(&table, tree, TargetGeneration::Modern);
    assert_eq!(
        out.to_string(),
        "let m = s.casefold@str in StrOperationCasefold(m.__self__)"
    );
    assert!(report.misses.is_empty());
}

/// An attribute with no operation narrows but leaves its call alone.
#[test]
fn test_attribute_without_operation_keeps_call() {
    let tree = Expr::method_call(exact("d", Shape::Dict), "fromkeys", vec![Expr::str("ab")]);
    let (out, report) = optimize(tree);
    assert_eq!(out.to_string(), "d.fromkeys@dict(\"ab\")");
    assert_eq!(miss_kinds(&report), vec!["R0003"]);
}

// ── Empty-argument special case ────────────────────────────────────────

#[test]
fn test_update_without_arguments_is_none_with_effects() {
    let (out, report) = optimize(Expr::method_call(exact("d", Shape::Dict), "update", vec![]));
    assert_eq!(out.to_string(), "(d; None)");
    assert_eq!(out.shape_knowledge(), ShapeKnowledge::Unknown);
    assert_eq!(report.rewrites[1].tag, ChangeTag::NewConstant);
    assert_eq!(
        report.rewrites[1].description,
        "Call to 'update' of dict without arguments has no effect."
    );
}

#[test]
fn test_update_with_argument() {
    let other = Expr::opaque("other", ShapeKnowledge::Unknown);
    let (out, _) = optimize(Expr::method_call(exact("d", Shape::Dict), "update", vec![other]));
    assert_eq!(out.to_string(), "DictOperationUpdate2(d, other)");
}

// ── Calls through a bound variable ─────────────────────────────────────

#[test]
fn test_call_through_variable_uses_bound_self() {
    let tree = Expr::let_in(
        "m",
        Expr::attribute(text(), "split"),
        Expr::call(Expr::var("m"), vec![Expr::str(",")]),
    );
    let (out, report) = optimize(tree);
    assert_eq!(
        out.to_string(),
        "let m = \"a,b\".split@str in StrOperationSplit2(m.__self__, \",\")"
    );
    assert!(report.reached_fixpoint);
}

#[test]
fn test_call_through_unbound_variable_stays_generic() {
    let tree = Expr::let_in(
        "m",
        Expr::attribute(Expr::opaque("o", ShapeKnowledge::Unknown), "split"),
        Expr::call(Expr::var("m"), vec![]),
    );
    let (out, _) = optimize(tree.clone());
    assert_eq!(out, tree);
}

// ── Effects ────────────────────────────────────────────────────────────

/// Extraction may reject the call after it started, so every resolved
/// call is treated as able to raise.
#[test]
fn test_resolver_records_possible_exception() {
    let (_, trace) = single_pass(
        Expr::method_call(text(), "upper", vec![]),
        TargetGeneration::Modern,
    );
    assert!(trace.may_raise(ExceptionKind::Any));
}

#[test]
fn test_exact_lookup_alone_raises_nothing() {
    let (_, trace) = single_pass(Expr::attribute(text(), "upper"), TargetGeneration::Modern);
    assert!(trace.raise_exits().is_empty());
}

// ── Configuration ──────────────────────────────────────────────────────

#[test]
fn test_remarks_can_be_disabled() {
    let config = OptimizerConfig::from_str("[optimizer]\ncollect_remarks = false\n").unwrap();
    let tree = Expr::method_call(Expr::opaque("o", ShapeKnowledge::Unknown), "keys", vec![]);
    let (_, report) = Optimizer::new(config).unwrap().optimize(tree);
    assert!(report.misses.is_empty());
}

#[test]
fn test_config_target_selects_constructor() {
    let config = OptimizerConfig::from_str("[optimizer]\ntarget = \"legacy\"\n").unwrap();
    let dict = Expr::dict(vec![(Constant::Int(1), Constant::None)]);
    let tree = Expr::method_call(dict, "values", vec![]);
    let (out, _) = Optimizer::new(config).unwrap().optimize(tree);
    assert_eq!(out.to_string(), "DictOperationValuesList({1: None})");
}

// ── Table construction ─────────────────────────────────────────────────

#[test]
fn test_duplicate_registration_is_rejected() {
    let err = SpecializationTable::from_specs([
        OperationSpec::new("keys", Shape::Dict).single("Keys"),
        OperationSpec::new("keys", Shape::Dict).single("Keys"),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        TableError::DuplicateEntry {
            attribute: "keys",
            shape: Shape::Dict
        }
    );
}

/// Two attributes sharing one operation node would rewrite `lower()` into
/// an upper-casing operation; the table refuses to build.
#[test]
fn test_operation_shared_by_two_attributes_is_rejected() {
    let err = SpecializationTable::from_specs([
        OperationSpec::new("upper", Shape::Str).single("Upper"),
        OperationSpec::new("lower", Shape::Str).single("Upper"),
    ])
    .unwrap_err();
    assert_eq!(err.to_string(), "operation StrOperationUpper registered twice");
}

#[test]
fn test_builtin_table_is_shared() {
    let first = init_builtin_table().unwrap();
    let second = init_builtin_table().unwrap();
    assert!(std::ptr::eq(first, second));
    assert!(std::ptr::eq(
        shale_opt::table::builtin_table().unwrap(),
        first
    ));
}

#[test]
fn test_misses_have_kinds() {
    let tree = Expr::method_call(Expr::opaque("o", ShapeKnowledge::Unknown), "strip", vec![]);
    let (_, report) = optimize(tree);
    assert_eq!(report.misses[0].kind, MissKind::UnresolvedShape);
    assert_eq!(report.misses[0].attribute, "strip");
}

// ── Remarks ────────────────────────────────────────────────────────────

#[test]
fn test_report_misses_render_as_remarks() {
    let source = "s.split(x)";
    let lookup = Expr::attribute(exact("s", Shape::Str), "split").with_span(Span::new(0, 7));
    let tree = Expr::call(lookup, vec![Expr::opaque("x", ShapeKnowledge::Unknown)])
        .with_span(Span::new(0, 10));
    let (_, report) = optimize(tree);
    let rendered = shale_opt::diagnostics::render_remarks(&report.misses, source);
    assert!(rendered.contains("R0002"), "{rendered}");
    assert!(rendered.contains("'split' not specialized"), "{rendered}");
}
