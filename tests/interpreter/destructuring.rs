//! Binding patterns in declarations, parameters, loops and catch clauses

use super::{eval, eval_json, eval_result, throws_error};
use jsrun::ast::build::*;
use jsrun::ast::{
    BinaryOp, BlockStatement, CatchClause, ForOfLeft, ForOfStatement, FunctionKind, Statement,
    TryStatement, VariableDeclaration, VariableDeclarator, VariableKind,
};
use jsrun::{JsError, JsValue};
use serde_json::json;

#[test]
fn test_object_pattern_with_nesting_and_defaults() {
    // let { a, b: { c }, d = "dflt" } = { a: 1, b: { c: 2 } }; [a, c, d]
    assert_eq!(
        eval_json(program(vec![
            let_pat(
                object_pat(vec![
                    ("a", pat("a")),
                    ("b", object_pat(vec![("c", pat("c"))])),
                    ("d", default_pat(pat("d"), str_("dflt"))),
                ]),
                object(vec![
                    ("a", num(1.0)),
                    ("b", object(vec![("c", num(2.0))])),
                ]),
            ),
            expr(array(vec![ident("a"), ident("c"), ident("d")])),
        ])),
        json!([1, 2, "dflt"])
    );
}

#[test]
fn test_renamed_and_missing_properties() {
    // let { x: renamed, missing } = { x: "v" }; [renamed, typeof missing]
    assert_eq!(
        eval_json(program(vec![
            let_pat(
                object_pat(vec![("x", pat("renamed")), ("missing", pat("missing"))]),
                object(vec![("x", str_("v"))]),
            ),
            expr(array(vec![ident("renamed"), typeof_(ident("missing"))])),
        ])),
        json!(["v", "undefined"])
    );
}

#[test]
fn test_array_pattern_with_holes_and_rest() {
    // let [first, , third, ...rest] = [1, 2, 3, 4, 5]; [first, third, rest]
    assert_eq!(
        eval_json(program(vec![
            let_pat(
                array_pat(vec![
                    Some(pat("first")),
                    None,
                    Some(pat("third")),
                    Some(rest_pat(pat("rest"))),
                ]),
                array(vec![num(1.0), num(2.0), num(3.0), num(4.0), num(5.0)]),
            ),
            expr(array(vec![ident("first"), ident("third"), ident("rest")])),
        ])),
        json!([1, 3, [4, 5]])
    );
}

#[test]
fn test_rest_of_short_source_is_empty() {
    // let [a, b, ...rest] = [1]; [a, b, rest.length]
    assert_eq!(
        eval_json(program(vec![
            let_pat(
                array_pat(vec![
                    Some(pat("a")),
                    Some(pat("b")),
                    Some(rest_pat(pat("rest"))),
                ]),
                array(vec![num(1.0)]),
            ),
            expr(array(vec![
                ident("a"),
                ident("b"),
                member(ident("rest"), "length"),
            ])),
        ])),
        json!([1, null, 0])
    );
}

#[test]
fn test_defaults_apply_only_to_undefined() {
    // let [a = 1, b = 2, c = 3] = [undefined, null, 0]; [a, b, c]
    assert_eq!(
        eval_json(program(vec![
            let_pat(
                array_pat(vec![
                    Some(default_pat(pat("a"), num(1.0))),
                    Some(default_pat(pat("b"), num(2.0))),
                    Some(default_pat(pat("c"), num(3.0))),
                ]),
                array(vec![undefined(), null(), num(0.0)]),
            ),
            expr(array(vec![ident("a"), ident("b"), ident("c")])),
        ])),
        json!([1, null, 0])
    );
}

#[test]
fn test_defaults_are_evaluated_lazily_in_order() {
    // let calls = 0; function f() { calls++; return calls }
    // let [x = f(), y = f(), z = x + y] = [10]; [x, y, z, calls]
    assert_eq!(
        eval_json(program(vec![
            let_("calls", num(0.0)),
            function_decl(
                "f",
                &[],
                vec![expr(incr("calls")), ret(ident("calls"))],
            ),
            let_pat(
                array_pat(vec![
                    Some(default_pat(pat("x"), call(ident("f"), vec![]))),
                    Some(default_pat(pat("y"), call(ident("f"), vec![]))),
                    Some(default_pat(pat("z"), add(ident("x"), ident("y")))),
                ]),
                array(vec![num(10.0)]),
            ),
            expr(array(vec![ident("x"), ident("y"), ident("z"), ident("calls")])),
        ])),
        json!([10, 1, 11, 1])
    );
}

#[test]
fn test_anonymous_function_default_takes_binding_name() {
    // let { handler = function () {} } = {}; handler.name
    assert_eq!(
        eval(program(vec![
            let_pat(
                object_pat(vec![(
                    "handler",
                    default_pat(pat("handler"), func(&[], vec![])),
                )]),
                object(vec![]),
            ),
            expr(member(ident("handler"), "name")),
        ])),
        JsValue::from("handler")
    );
}

#[test]
fn test_destructuring_null_or_undefined_is_type_error() {
    let err = eval_result(program(vec![let_pat(
        object_pat(vec![("a", pat("a"))]),
        null(),
    )]))
    .unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
    assert!(err.to_string().contains("Cannot destructure"));

    assert!(throws_error(
        program(vec![let_pat(array_pat(vec![Some(pat("a"))]), undefined())]),
        "undefined is not iterable"
    ));
}

#[test]
fn test_array_pattern_requires_iterable() {
    assert!(throws_error(
        program(vec![let_pat(array_pat(vec![Some(pat("a"))]), object(vec![]))]),
        "is not iterable"
    ));
}

#[test]
fn test_rest_element_must_be_last() {
    // let [...a, b] = [1, 2]
    let err = eval_result(program(vec![let_pat(
        array_pat(vec![Some(rest_pat(pat("a"))), Some(pat("b"))]),
        array(vec![num(1.0), num(2.0)]),
    )]))
    .unwrap_err();
    assert!(matches!(err, JsError::SyntaxError { .. }));
}

#[test]
fn test_rest_parameter_must_be_last() {
    let err = eval_result(program(vec![
        function_with_params(
            "f",
            vec![rest_pat(pat("a")), pat("b")],
            vec![],
            FunctionKind::Normal,
        ),
        expr(call(ident("f"), vec![num(1.0)])),
    ]))
    .unwrap_err();
    assert!(matches!(err, JsError::SyntaxError { .. }));
}

#[test]
fn test_parameter_patterns() {
    // function f({ x, y = 5 }, [first], ...others) { return [x, y, first, others] }
    // f({ x: 1 }, ["a", "b"], true, false)
    assert_eq!(
        eval_json(program(vec![
            function_with_params(
                "f",
                vec![
                    object_pat(vec![
                        ("x", pat("x")),
                        ("y", default_pat(pat("y"), num(5.0))),
                    ]),
                    array_pat(vec![Some(pat("first"))]),
                    rest_pat(pat("others")),
                ],
                vec![ret(array(vec![
                    ident("x"),
                    ident("y"),
                    ident("first"),
                    ident("others"),
                ]))],
                FunctionKind::Normal,
            ),
            expr(call(
                ident("f"),
                vec![
                    object(vec![("x", num(1.0))]),
                    array(vec![str_("a"), str_("b")]),
                    bool_(true),
                    bool_(false),
                ],
            )),
        ])),
        json!([1, 5, "a", [true, false]])
    );
}

#[test]
fn test_parameter_default_sees_earlier_parameters() {
    // function f(a, b = a * 2) { return b } [f(3), f(3, 1)]
    assert_eq!(
        eval_json(program(vec![
            function_with_params(
                "f",
                vec![pat("a"), default_pat(pat("b"), mul(ident("a"), num(2.0)))],
                vec![ret(ident("b"))],
                FunctionKind::Normal,
            ),
            expr(array(vec![
                call(ident("f"), vec![num(3.0)]),
                call(ident("f"), vec![num(3.0), num(1.0)]),
            ])),
        ])),
        json!([6, 1])
    );
}

#[test]
fn test_for_of_with_pattern() {
    // let sum = 0; for (const { v } of [{ v: 1 }, { v: 2 }]) sum += v; sum
    let loop_stmt = Statement::ForOf(ForOfStatement {
        left: ForOfLeft::Variable(VariableKind::Const, object_pat(vec![("v", pat("v"))])),
        right: array(vec![
            object(vec![("v", num(1.0))]),
            object(vec![("v", num(2.0))]),
        ]),
        body: Box::new(block(vec![expr(assign_op(BinaryOp::Add, "sum", ident("v")))])),
    });
    assert_eq!(
        eval(program(vec![
            let_("sum", num(0.0)),
            loop_stmt,
            expr(ident("sum")),
        ])),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_for_of_assigning_existing_binding() {
    // let last; for (last of [1, 2, 3]) {} last
    let loop_stmt = Statement::ForOf(ForOfStatement {
        left: ForOfLeft::Identifier(jsrun::JsString::from("last")),
        right: array(vec![num(1.0), num(2.0), num(3.0)]),
        body: Box::new(block(vec![])),
    });
    assert_eq!(
        eval(program(vec![var_uninit("last"), loop_stmt, expr(ident("last"))])),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_catch_parameter_pattern() {
    // try { throw { code: 7, detail: "x" } } catch ({ code }) { code }
    let try_stmt = Statement::Try(TryStatement {
        block: BlockStatement {
            body: vec![throw(object(vec![
                ("code", num(7.0)),
                ("detail", str_("x")),
            ]))],
        },
        handler: Some(CatchClause {
            param: Some(object_pat(vec![("code", pat("code"))])),
            body: BlockStatement {
                body: vec![expr(assign("result", ident("code")))],
            },
        }),
        finalizer: None,
    });
    assert_eq!(
        eval(program(vec![let_("result", null()), try_stmt, expr(ident("result"))])),
        JsValue::Number(7.0)
    );
}

#[test]
fn test_const_pattern_bindings_are_immutable() {
    // const [a] = [1]; a = 2
    let decl = Statement::VariableDeclaration(VariableDeclaration {
        kind: VariableKind::Const,
        declarations: vec![VariableDeclarator {
            id: array_pat(vec![Some(pat("a"))]),
            init: Some(array(vec![num(1.0)])),
        }],
    });
    assert!(throws_error(
        program(vec![decl, expr(assign("a", num(2.0)))]),
        "Assignment to constant variable"
    ));
}

#[test]
fn test_partial_array_destructuring_closes_generator() {
    // function* g() { try { yield 1; yield 2 } finally { closed = true } }
    // let closed = false; let [one] = g(); [one, closed]
    assert_eq!(
        eval_json(program(vec![
            let_("closed", bool_(false)),
            generator_decl(
                "g",
                &[],
                vec![try_finally(
                    vec![expr(yield_(num(1.0))), expr(yield_(num(2.0)))],
                    vec![expr(assign("closed", bool_(true)))],
                )],
            ),
            let_pat(array_pat(vec![Some(pat("one"))]), call(ident("g"), vec![])),
            expr(array(vec![ident("one"), ident("closed")])),
        ])),
        json!([1, true])
    );
}

#[test]
fn test_generator_parameters_use_patterns() {
    // function* pairs({ items }) { for (const item of items) yield item * 2 }
    assert_eq!(
        eval_json(program(vec![
            function_with_params(
                "pairs",
                vec![object_pat(vec![("items", pat("items"))])],
                vec![for_of(
                    "item",
                    ident("items"),
                    vec![expr(yield_(mul(ident("item"), num(2.0))))],
                )],
                FunctionKind::Generator,
            ),
            const_("out", array(vec![])),
            for_of(
                "v",
                call(
                    ident("pairs"),
                    vec![object(vec![("items", array(vec![num(1.0), num(2.0)]))])],
                ),
                vec![expr(method(ident("out"), "push", vec![ident("v")]))],
            ),
            expr(ident("out")),
        ])),
        json!([2, 4])
    );
}
