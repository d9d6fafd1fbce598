//! Generator functions: lazy start, resumption, throw/return and delegation

use super::{eval, eval_json, run_logged, throws_error};
use jsrun::JsValue;
use jsrun::ast::build::*;
use jsrun::ast::{Expression, Statement};
use serde_json::json;

fn log(value: Expression) -> Statement {
    expr(call(ident("log"), vec![value]))
}

/// `[r.value, r.done]` for a call producing an iterator result
fn pair(result: Expression) -> Vec<Statement> {
    vec![
        const_("r", result),
        expr(method(
            ident("out"),
            "push",
            vec![array(vec![member(ident("r"), "value"), member(ident("r"), "done")])],
        )),
    ]
}

/// Collect `it.next()` results into `out` inside a block per step
fn steps(calls: Vec<Expression>) -> Vec<Statement> {
    let mut body = vec![const_("out", array(vec![]))];
    for call in calls {
        body.push(block(pair(call)));
    }
    body.push(expr(ident("out")));
    body
}

fn next(arg: Option<Expression>) -> Expression {
    method(ident("it"), "next", arg.into_iter().collect())
}

#[test]
fn test_yield_sequence_then_done() {
    // function* g() { yield 1; yield 2; return 3 }
    let mut body = vec![
        generator_decl(
            "g",
            &[],
            vec![
                expr(yield_(num(1.0))),
                expr(yield_(num(2.0))),
                ret(num(3.0)),
            ],
        ),
        const_("it", call(ident("g"), vec![])),
    ];
    body.extend(steps(vec![next(None), next(None), next(None), next(None)]));
    assert_eq!(
        eval_json(program(body)),
        json!([[1, false], [2, false], [3, true], [null, true]])
    );
}

#[test]
fn test_body_does_not_run_until_first_next() {
    let logged = run_logged(program(vec![
        generator_decl(
            "g",
            &["x"],
            vec![log(str_("started")), expr(yield_(ident("x")))],
        ),
        const_("it", call(ident("g"), vec![num(5.0)])),
        log(str_("created")),
        log(member(next(None), "value")),
    ]));
    assert_eq!(
        logged,
        vec![
            JsValue::from("created"),
            JsValue::from("started"),
            JsValue::Number(5.0)
        ]
    );
}

#[test]
fn test_side_effects_run_exactly_once() {
    // function* g() { log("a"); yield 1; log("b"); yield 2; log("c") }
    // for (const v of g()) log(v)
    let logged = run_logged(program(vec![
        generator_decl(
            "g",
            &[],
            vec![
                log(str_("a")),
                expr(yield_(num(1.0))),
                log(str_("b")),
                expr(yield_(num(2.0))),
                log(str_("c")),
            ],
        ),
        for_of("v", call(ident("g"), vec![]), vec![log(ident("v"))]),
    ]));
    assert_eq!(
        logged,
        vec![
            JsValue::from("a"),
            JsValue::Number(1.0),
            JsValue::from("b"),
            JsValue::Number(2.0),
            JsValue::from("c"),
        ]
    );
}

#[test]
fn test_expression_before_yield_is_not_replayed() {
    // let calls = 0; function count() { calls++; return 1 }
    // function* g() { const x = count() + (yield "first"); return x }
    // const it = g(); it.next(); const last = it.next(10).value; [last, calls]
    assert_eq!(
        eval_json(program(vec![
            let_("calls", num(0.0)),
            function_decl("count", &[], vec![expr(incr("calls")), ret(num(1.0))]),
            generator_decl(
                "g",
                &[],
                vec![
                    const_("x", add(call(ident("count"), vec![]), yield_(str_("first")))),
                    ret(ident("x")),
                ],
            ),
            const_("it", call(ident("g"), vec![])),
            expr(next(None)),
            const_("last", member(next(Some(num(10.0))), "value")),
            expr(array(vec![ident("last"), ident("calls")])),
        ])),
        json!([11, 1])
    );
}

#[test]
fn test_first_next_argument_is_ignored() {
    // function* g() { const a = yield 1; const b = yield a; return [a, b] }
    let mut body = vec![
        generator_decl(
            "g",
            &[],
            vec![
                const_("a", yield_(num(1.0))),
                const_("b", yield_(ident("a"))),
                ret(array(vec![ident("a"), ident("b")])),
            ],
        ),
        const_("it", call(ident("g"), vec![])),
    ];
    body.extend(steps(vec![
        next(Some(str_("ignored"))),
        next(Some(str_("x"))),
        next(Some(str_("y"))),
    ]));
    assert_eq!(
        eval_json(program(body)),
        json!([[1, false], ["x", false], [["x", "y"], true]])
    );
}

#[test]
fn test_yield_inside_loops() {
    // function* range(n) { for (let i = 0; i < n; i++) yield i * 10 }
    // const out = []; for (const v of range(4)) out.push(v); out
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "range",
                &["n"],
                vec![for_let(
                    "i",
                    num(0.0),
                    lt(ident("i"), ident("n")),
                    incr("i"),
                    vec![expr(yield_(mul(ident("i"), num(10.0))))],
                )],
            ),
            const_("out", array(vec![])),
            for_of(
                "v",
                call(ident("range"), vec![num(4.0)]),
                vec![expr(method(ident("out"), "push", vec![ident("v")]))],
            ),
            expr(ident("out")),
        ])),
        json!([0, 10, 20, 30])
    );
}

#[test]
fn test_infinite_generator_with_break() {
    // function* fib() { let a = 0; let b = 1; while (true) { yield a; const t = a + b; a = b; b = t } }
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "fib",
                &[],
                vec![
                    let_("a", num(0.0)),
                    let_("b", num(1.0)),
                    while_(
                        bool_(true),
                        vec![
                            expr(yield_(ident("a"))),
                            const_("t", add(ident("a"), ident("b"))),
                            expr(assign("a", ident("b"))),
                            expr(assign("b", ident("t"))),
                        ],
                    ),
                ],
            ),
            const_("out", array(vec![])),
            for_of(
                "v",
                call(ident("fib"), vec![]),
                vec![
                    if_(
                        binary(
                            jsrun::ast::BinaryOp::GtEq,
                            member(ident("out"), "length"),
                            num(7.0),
                        ),
                        break_(),
                        None,
                    ),
                    expr(method(ident("out"), "push", vec![ident("v")])),
                ],
            ),
            expr(ident("out")),
        ])),
        json!([0, 1, 1, 2, 3, 5, 8])
    );
}

#[test]
fn test_throw_is_caught_inside_body() {
    // function* g() { try { yield 1 } catch (e) { yield "caught " + e } }
    let mut body = vec![
        generator_decl(
            "g",
            &[],
            vec![try_catch(
                vec![expr(yield_(num(1.0)))],
                "e",
                vec![expr(yield_(add(str_("caught "), ident("e"))))],
            )],
        ),
        const_("it", call(ident("g"), vec![])),
    ];
    body.extend(steps(vec![
        next(None),
        method(ident("it"), "throw", vec![str_("boom")]),
        next(None),
    ]));
    assert_eq!(
        eval_json(program(body)),
        json!([[1, false], ["caught boom", false], [null, true]])
    );
}

#[test]
fn test_uncaught_throw_completes_generator() {
    // try { it.throw(new Error("bad")) } catch (e) { seen = e.message } ; it.next().done
    assert_eq!(
        eval_json(program(vec![
            generator_decl("g", &[], vec![expr(yield_(num(1.0))), expr(yield_(num(2.0)))]),
            const_("it", call(ident("g"), vec![])),
            expr(next(None)),
            let_("seen", null()),
            try_catch(
                vec![expr(method(
                    ident("it"),
                    "throw",
                    vec![new_(ident("Error"), vec![str_("bad")])],
                ))],
                "e",
                vec![expr(assign("seen", member(ident("e"), "message")))],
            ),
            expr(array(vec![ident("seen"), member(next(None), "done")])),
        ])),
        json!(["bad", true])
    );
}

#[test]
fn test_throw_before_start_never_runs_body() {
    let logged = run_logged(program(vec![
        generator_decl("g", &[], vec![log(str_("body")), expr(yield_(num(1.0)))]),
        const_("it", call(ident("g"), vec![])),
        try_catch(
            vec![expr(method(ident("it"), "throw", vec![str_("early")]))],
            "e",
            vec![log(ident("e"))],
        ),
        log(member(next(None), "done")),
    ]));
    assert_eq!(logged, vec![JsValue::from("early"), JsValue::Boolean(true)]);
}

#[test]
fn test_return_runs_finally_and_completes() {
    // function* g() { try { yield 1; yield 2 } finally { log("cleanup") } }
    let (mut runtime, sink) = super::runtime_with_sink();
    let value = runtime
        .run(&program(vec![
            generator_decl(
                "g",
                &[],
                vec![try_finally(
                    vec![expr(yield_(num(1.0))), expr(yield_(num(2.0)))],
                    vec![log(str_("cleanup"))],
                )],
            ),
            const_("it", call(ident("g"), vec![])),
            const_("out", array(vec![])),
            block(pair(next(None))),
            block(pair(method(ident("it"), "return", vec![num(5.0)]))),
            block(pair(next(None))),
            expr(ident("out")),
        ]))
        .unwrap();
    assert_eq!(
        runtime.interpreter().value_to_json(&value).unwrap(),
        json!([[1, false], [5, true], [null, true]])
    );
    assert_eq!(*sink.borrow(), vec![JsValue::from("cleanup")]);
}

#[test]
fn test_return_on_completed_generator() {
    let mut body = vec![
        generator_decl("g", &[], vec![]),
        const_("it", call(ident("g"), vec![])),
    ];
    body.extend(steps(vec![
        next(None),
        method(ident("it"), "return", vec![str_("late")]),
    ]));
    assert_eq!(
        eval_json(program(body)),
        json!([[null, true], ["late", true]])
    );
}

#[test]
fn test_yield_star_delegates_and_receives_return_value() {
    // function* inner() { yield 1; yield 2; return "r" }
    // function* outer() { const r = yield* inner(); yield r; yield* [3, 4] }
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "inner",
                &[],
                vec![
                    expr(yield_(num(1.0))),
                    expr(yield_(num(2.0))),
                    ret(str_("r")),
                ],
            ),
            generator_decl(
                "outer",
                &[],
                vec![
                    const_("r", yield_star(call(ident("inner"), vec![]))),
                    expr(yield_(ident("r"))),
                    expr(yield_star(array(vec![num(3.0), num(4.0)]))),
                ],
            ),
            const_("out", array(vec![])),
            for_of(
                "v",
                call(ident("outer"), vec![]),
                vec![expr(method(ident("out"), "push", vec![ident("v")]))],
            ),
            expr(ident("out")),
        ])),
        json!([1, 2, "r", 3, 4])
    );
}

#[test]
fn test_yield_star_forwards_next_values() {
    // function* inner() { const got = yield "ready"; return got }
    // function* outer() { const got = yield* inner(); yield "outer saw " + got }
    let mut body = vec![
        generator_decl(
            "inner",
            &[],
            vec![const_("got", yield_(str_("ready"))), ret(ident("got"))],
        ),
        generator_decl(
            "outer",
            &[],
            vec![
                const_("got", yield_star(call(ident("inner"), vec![]))),
                expr(yield_(add(str_("outer saw "), ident("got")))),
            ],
        ),
        const_("it", call(ident("outer"), vec![])),
    ];
    body.extend(steps(vec![next(None), next(Some(str_("ping")))]));
    assert_eq!(
        eval_json(program(body)),
        json!([["ready", false], ["outer saw ping", false]])
    );
}

#[test]
fn test_return_is_forwarded_to_delegate() {
    // inner has a finally; outer.return() must run it
    let logged = run_logged(program(vec![
        generator_decl(
            "inner",
            &[],
            vec![try_finally(
                vec![expr(yield_(num(1.0))), expr(yield_(num(2.0)))],
                vec![log(str_("inner cleanup"))],
            )],
        ),
        generator_decl(
            "outer",
            &[],
            vec![
                expr(yield_star(call(ident("inner"), vec![]))),
                log(str_("unreachable")),
            ],
        ),
        const_("it", call(ident("outer"), vec![])),
        expr(next(None)),
        const_("r", method(ident("it"), "return", vec![num(9.0)])),
        log(member(ident("r"), "value")),
        log(member(ident("r"), "done")),
    ]));
    assert_eq!(
        logged,
        vec![
            JsValue::from("inner cleanup"),
            JsValue::Number(9.0),
            JsValue::Boolean(true)
        ]
    );
}

#[test]
fn test_breaking_for_of_closes_generator() {
    // function* g() { try { yield 1; yield 2 } finally { log("closed") } }
    // for (const v of g()) { log(v); break }
    let logged = run_logged(program(vec![
        generator_decl(
            "g",
            &[],
            vec![try_finally(
                vec![expr(yield_(num(1.0))), expr(yield_(num(2.0)))],
                vec![log(str_("closed"))],
            )],
        ),
        for_of(
            "v",
            call(ident("g"), vec![]),
            vec![log(ident("v")), break_()],
        ),
    ]));
    assert_eq!(logged, vec![JsValue::Number(1.0), JsValue::from("closed")]);
}

#[test]
fn test_reentrant_next_is_type_error() {
    // function* g() { it.next(); yield 1 } const it = g(); it.next()
    assert!(throws_error(
        program(vec![
            generator_decl(
                "g",
                &[],
                vec![expr(next(None)), expr(yield_(num(1.0)))],
            ),
            const_("it", call(ident("g"), vec![])),
            expr(next(None)),
        ]),
        "already running"
    ));
}

#[test]
fn test_generator_objects_are_iterable_and_independent() {
    // const a = g(); const b = g(); a.next(); [b.next().value, a[Symbol.iterator]() === a]
    assert_eq!(
        eval_json(program(vec![
            generator_decl(
                "g",
                &[],
                vec![expr(yield_(str_("first"))), expr(yield_(str_("second")))],
            ),
            const_("a", call(ident("g"), vec![])),
            const_("b", call(ident("g"), vec![])),
            expr(method(ident("a"), "next", vec![])),
            expr(array(vec![
                member(method(ident("b"), "next", vec![]), "value"),
                strict_eq(
                    call(
                        index(ident("a"), member(ident("Symbol"), "iterator")),
                        vec![],
                    ),
                    ident("a"),
                ),
            ])),
        ])),
        json!(["first", true])
    );
}

#[test]
fn test_next_on_non_generator_receiver() {
    // const fake = { next: g().next }; fake.next()
    assert!(throws_error(
        program(vec![
            generator_decl("g", &[], vec![]),
            const_(
                "fake",
                object(vec![("next", member(call(ident("g"), vec![]), "next"))]),
            ),
            expr(method(ident("fake"), "next", vec![])),
        ]),
        "incompatible receiver"
    ));
}

#[test]
fn test_generator_methods_on_object_literal() {
    // const obj = { *items() { yield this.a } , a: 4 }; obj.items().next().value
    assert_eq!(
        eval(program(vec![
            const_(
                "obj",
                object(vec![
                    ("a", num(4.0)),
                    ("items", gen_func(&[], vec![expr(yield_(member(this(), "a")))])),
                ]),
            ),
            expr(member(
                method(method(ident("obj"), "items", vec![]), "next", vec![]),
                "value",
            )),
        ])),
        JsValue::Number(4.0)
    );
}
