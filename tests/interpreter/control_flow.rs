//! Loops, labels, exceptions and finally blocks

use super::{eval, eval_json, eval_result, run_logged, throws_error};
use jsrun::ast::build::*;
use jsrun::ast::{BinaryOp, Expression, LogicalOp, Statement, UnaryOp};
use jsrun::{JsError, JsValue};
use serde_json::json;

fn log(value: Expression) -> Statement {
    expr(call(ident("log"), vec![value]))
}

fn push(target: &str, value: Expression) -> Statement {
    expr(method(ident(target), "push", vec![value]))
}

/// `outer: for (let i = 0; i < 3; i++) for (let j = 0; j < 3; j++) { <body> }`
fn nested_loops(body: Vec<Statement>) -> Statement {
    labeled(
        "outer",
        for_let(
            "i",
            num(0.0),
            lt(ident("i"), num(3.0)),
            incr("i"),
            vec![for_let(
                "j",
                num(0.0),
                lt(ident("j"), num(3.0)),
                incr("j"),
                body,
            )],
        ),
    )
}

/// An iterable counting 1..=limit whose `return()` bumps `closed`
fn counting_iterable(limit: f64) -> Vec<Statement> {
    let next = func(
        &[],
        vec![
            expr(incr("i")),
            ret(object(vec![
                ("value", ident("i")),
                ("done", binary(BinaryOp::Gt, ident("i"), num(limit))),
            ])),
        ],
    );
    let close = func(&[], vec![expr(incr("closed")), ret(object(vec![]))]);
    vec![
        let_("closed", num(0.0)),
        const_("iterable", object(vec![])),
        expr(assign_index(
            ident("iterable"),
            member(ident("Symbol"), "iterator"),
            func(
                &[],
                vec![
                    let_("i", num(0.0)),
                    ret(object(vec![("next", next), ("return", close)])),
                ],
            ),
        )),
    ]
}

#[test]
fn test_labeled_continue_and_break() {
    // if (j === 1) continue outer; if (i === 2) break outer; out.push(i * 10 + j)
    assert_eq!(
        eval_json(program(vec![
            const_("out", array(vec![])),
            nested_loops(vec![
                if_(
                    strict_eq(ident("j"), num(1.0)),
                    continue_label("outer"),
                    None,
                ),
                if_(strict_eq(ident("i"), num(2.0)), break_label("outer"), None),
                push("out", add(mul(ident("i"), num(10.0)), ident("j"))),
            ]),
            expr(ident("out")),
        ])),
        json!([0, 10])
    );
}

#[test]
fn test_labeled_continue_inside_generator() {
    // function* g() { outer: for (...) for (...) { if (j === 1) continue outer; yield i * 10 + j } }
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "g",
                &[],
                vec![nested_loops(vec![
                    if_(
                        strict_eq(ident("j"), num(1.0)),
                        continue_label("outer"),
                        None,
                    ),
                    expr(yield_(add(mul(ident("i"), num(10.0)), ident("j")))),
                ])],
            ),
            const_("out", array(vec![])),
            for_of("v", call(ident("g"), vec![]), vec![push("out", ident("v"))]),
            expr(ident("out")),
        ])),
        json!([0, 10, 20])
    );
}

#[test]
fn test_break_out_of_labeled_block() {
    let logged = run_logged(program(vec![
        labeled(
            "found",
            block(vec![log(str_("a")), break_label("found"), log(str_("b"))]),
        ),
        log(str_("c")),
    ]));
    assert_eq!(logged, vec![JsValue::from("a"), JsValue::from("c")]);
}

#[test]
fn test_while_and_do_while() {
    // let n = 0; while (n < 5) n++; let m = 10; do { m++ } while (m < 0); [n, m]
    assert_eq!(
        eval_json(program(vec![
            let_("n", num(0.0)),
            while_(lt(ident("n"), num(5.0)), vec![expr(incr("n"))]),
            let_("m", num(10.0)),
            do_while(vec![expr(incr("m"))], lt(ident("m"), num(0.0))),
            expr(array(vec![ident("n"), ident("m")])),
        ])),
        json!([5, 11])
    );
}

#[test]
fn test_continue_skips_rest_of_body() {
    // for (let i = 0; i < 5; i++) { if (i % 2 === 0) continue; out.push(i) }
    assert_eq!(
        eval_json(program(vec![
            const_("out", array(vec![])),
            for_let(
                "i",
                num(0.0),
                lt(ident("i"), num(5.0)),
                incr("i"),
                vec![
                    if_(
                        strict_eq(binary(BinaryOp::Mod, ident("i"), num(2.0)), num(0.0)),
                        continue_(),
                        None,
                    ),
                    push("out", ident("i")),
                ],
            ),
            expr(ident("out")),
        ])),
        json!([1, 3])
    );
}

#[test]
fn test_finally_return_overrides_try_return() {
    // function f() { try { return "try" } finally { return "finally" } }
    assert_eq!(
        eval(program(vec![
            function_decl(
                "f",
                &[],
                vec![try_finally(vec![ret(str_("try"))], vec![ret(str_("finally"))])],
            ),
            expr(call(ident("f"), vec![])),
        ])),
        JsValue::from("finally")
    );
}

#[test]
fn test_finally_runs_without_changing_return_value() {
    let (mut runtime, sink) = super::runtime_with_sink();
    let value = runtime
        .run(&program(vec![
            function_decl(
                "f",
                &[],
                vec![
                    let_("x", str_("try")),
                    try_finally(
                        vec![ret(ident("x"))],
                        vec![expr(assign("x", str_("changed"))), log(str_("cleanup"))],
                    ),
                ],
            ),
            expr(call(ident("f"), vec![])),
        ]))
        .unwrap();
    assert_eq!(value, JsValue::from("try"));
    assert_eq!(*sink.borrow(), vec![JsValue::from("cleanup")]);
}

#[test]
fn test_finally_return_swallows_exception() {
    // function f() { try { throw "x" } finally { return "recovered" } }
    assert_eq!(
        eval(program(vec![
            function_decl(
                "f",
                &[],
                vec![try_finally(
                    vec![throw(str_("x"))],
                    vec![ret(str_("recovered"))],
                )],
            ),
            expr(call(ident("f"), vec![])),
        ])),
        JsValue::from("recovered")
    );
}

#[test]
fn test_finally_return_overrides_inside_generator() {
    // function* g() { try { yield 1; return "a" } finally { return "b" } }
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "g",
                &[],
                vec![try_finally(
                    vec![expr(yield_(num(1.0))), ret(str_("a"))],
                    vec![ret(str_("b"))],
                )],
            ),
            const_("it", call(ident("g"), vec![])),
            expr(method(ident("it"), "next", vec![])),
            const_("r", method(ident("it"), "next", vec![])),
            expr(array(vec![member(ident("r"), "value"), member(ident("r"), "done")])),
        ])),
        json!(["b", true])
    );
}

#[test]
fn test_try_catch_finally_order() {
    let logged = run_logged(program(vec![try_catch_finally(
        vec![log(str_("try")), throw(str_("oops")), log(str_("unreachable"))],
        "e",
        vec![log(add(str_("catch "), ident("e")))],
        vec![log(str_("finally"))],
    )]));
    assert_eq!(
        logged,
        vec![
            JsValue::from("try"),
            JsValue::from("catch oops"),
            JsValue::from("finally"),
        ]
    );
}

#[test]
fn test_exception_from_catch_still_runs_finally() {
    let (mut runtime, sink) = super::runtime_with_sink();
    let err = runtime
        .run(&program(vec![try_catch_finally(
            vec![throw(str_("first"))],
            "e",
            vec![throw(str_("second"))],
            vec![log(str_("finally"))],
        )]))
        .unwrap_err();
    assert_eq!(err.thrown_value(), Some(&JsValue::from("second")));
    assert_eq!(*sink.borrow(), vec![JsValue::from("finally")]);
}

#[test]
fn test_break_through_finally_in_loop() {
    // while (true) { try { break } finally { log("f") } } log("after")
    let logged = run_logged(program(vec![
        while_(
            bool_(true),
            vec![try_finally(vec![break_()], vec![log(str_("f"))])],
        ),
        log(str_("after")),
    ]));
    assert_eq!(logged, vec![JsValue::from("f"), JsValue::from("after")]);
}

#[test]
fn test_engine_errors_are_catchable_as_objects() {
    // try { null.x } catch (e) { [e instanceof TypeError, e instanceof Error, e.name] }
    assert_eq!(
        eval_json(program(vec![
            let_("result", null()),
            try_catch(
                vec![expr(member(null(), "x"))],
                "e",
                vec![expr(assign(
                    "result",
                    array(vec![
                        binary(BinaryOp::Instanceof, ident("e"), ident("TypeError")),
                        binary(BinaryOp::Instanceof, ident("e"), ident("Error")),
                        member(ident("e"), "name"),
                    ]),
                ))],
            ),
            expr(ident("result")),
        ])),
        json!([true, true, "TypeError"])
    );
}

#[test]
fn test_breaking_for_of_closes_iterator() {
    // for (const v of iterable) { if (v === 2) break } closed
    let mut body = counting_iterable(5.0);
    body.push(for_of(
        "v",
        ident("iterable"),
        vec![if_(strict_eq(ident("v"), num(2.0)), break_(), None)],
    ));
    body.push(expr(ident("closed")));
    assert_eq!(eval(program(body)), JsValue::Number(1.0));
}

#[test]
fn test_throwing_body_closes_iterator() {
    // try { for (const v of iterable) throw "stop" } catch (e) {} closed
    let mut body = counting_iterable(5.0);
    body.push(try_catch(
        vec![for_of("v", ident("iterable"), vec![throw(str_("stop"))])],
        "e",
        vec![],
    ));
    body.push(expr(ident("closed")));
    assert_eq!(eval(program(body)), JsValue::Number(1.0));
}

#[test]
fn test_exhausted_or_continued_iterator_is_not_closed() {
    // for (const v of iterable) { continue } closed
    let mut body = counting_iterable(3.0);
    body.push(let_("seen", num(0.0)));
    body.push(for_of(
        "v",
        ident("iterable"),
        vec![expr(incr("seen")), continue_()],
    ));
    body.push(expr(array(vec![ident("closed"), ident("seen")])));
    assert_eq!(eval_json(program(body)), json!([0, 3]));
}

#[test]
fn test_return_from_for_of_in_function_closes_iterator() {
    // function first() { for (const v of iterable) return v } [first(), closed]
    let mut body = counting_iterable(5.0);
    body.push(function_decl(
        "first",
        &[],
        vec![for_of("v", ident("iterable"), vec![ret(ident("v"))])],
    ));
    body.push(expr(array(vec![call(ident("first"), vec![]), ident("closed")])));
    assert_eq!(eval_json(program(body)), json!([1, 1]));
}

#[test]
fn test_for_of_over_non_iterable() {
    assert!(throws_error(
        program(vec![for_of("v", num(5.0), vec![])]),
        "is not iterable"
    ));
}

#[test]
fn test_for_of_over_string_iterates_characters() {
    let logged = run_logged(program(vec![for_of("c", str_("hé!"), vec![log(ident("c"))])]));
    assert_eq!(
        logged,
        vec![JsValue::from("h"), JsValue::from("é"), JsValue::from("!")]
    );
}

#[test]
fn test_top_level_break_is_syntax_error() {
    let err = eval_result(program(vec![break_()])).unwrap_err();
    assert!(matches!(err, JsError::SyntaxError { .. }));
}

#[test]
fn test_logical_operators_short_circuit() {
    // let calls = 0; function f() { calls++; return "f" }
    // [false && f(), true || f(), null ?? "d", 0 ?? "d", 0 || "x", calls]
    assert_eq!(
        eval_json(program(vec![
            let_("calls", num(0.0)),
            function_decl("f", &[], vec![expr(incr("calls")), ret(str_("f"))]),
            expr(array(vec![
                logical(LogicalOp::And, bool_(false), call(ident("f"), vec![])),
                logical(LogicalOp::Or, bool_(true), call(ident("f"), vec![])),
                logical(LogicalOp::NullishCoalesce, null(), str_("d")),
                logical(LogicalOp::NullishCoalesce, num(0.0), str_("d")),
                logical(LogicalOp::Or, num(0.0), str_("x")),
                logical(LogicalOp::And, bool_(true), call(ident("f"), vec![])),
                ident("calls"),
            ])),
        ])),
        json!([false, true, "d", 0, "x", "f", 1])
    );
}

#[test]
fn test_typeof_and_conditional() {
    assert_eq!(
        eval_json(program(vec![expr(array(vec![
            typeof_(ident("neverDeclared")),
            typeof_(null()),
            typeof_(func(&[], vec![])),
            typeof_(num(1.0)),
            typeof_(member(ident("Symbol"), "iterator")),
            cond(bool_(false), str_("yes"), str_("no")),
            unary(UnaryOp::Not, str_("")),
            unary(UnaryOp::Void, num(1.0)),
        ]))])),
        json!(["undefined", "object", "function", "number", "symbol", "no", true, null])
    );
}

#[test]
fn test_loops_with_yield_inside_try() {
    // function* g() { for (let i = 0; i < 3; i++) { try { if (i === 1) throw i; yield i } catch (e) { yield "caught " + e } } }
    let logged = run_logged(program(vec![
        generator_decl(
            "g",
            &[],
            vec![for_let(
                "i",
                num(0.0),
                lt(ident("i"), num(3.0)),
                incr("i"),
                vec![try_catch(
                    vec![
                        if_(strict_eq(ident("i"), num(1.0)), throw(ident("i")), None),
                        expr(yield_(ident("i"))),
                    ],
                    "e",
                    vec![expr(yield_(add(str_("caught "), ident("e"))))],
                )],
            )],
        ),
        for_of("v", call(ident("g"), vec![]), vec![log(ident("v"))]),
    ]));
    assert_eq!(
        logged,
        vec![
            JsValue::Number(0.0),
            JsValue::from("caught 1"),
            JsValue::Number(2.0),
        ]
    );
}
