//! Scoping, hoisting and binding tests

use super::{eval, eval_result, numbers, run_logged, throws_error};
use jsrun::ast::build::*;
use jsrun::ast::{BinaryOp, Statement};
use jsrun::{JsError, JsValue, Runtime, RuntimeConfig};

fn log(value: jsrun::ast::Expression) -> Statement {
    expr(call(ident("log"), vec![value]))
}

#[test]
fn test_block_shadowing() {
    let logged = run_logged(program(vec![
        let_("x", num(1.0)),
        block(vec![let_("x", num(2.0)), log(ident("x"))]),
        log(ident("x")),
    ]));
    assert_eq!(numbers(&logged), vec![2.0, 1.0]);
}

#[test]
fn test_shadowing_in_nested_functions() {
    // let x = "outer"; function f() { let x = "inner"; return function () { return x; }; } f()()
    assert_eq!(
        eval(program(vec![
            let_("x", str_("outer")),
            function_decl(
                "f",
                &[],
                vec![let_("x", str_("inner")), ret(func(&[], vec![ret(ident("x"))]))],
            ),
            expr(call(call(ident("f"), vec![]), vec![])),
        ])),
        JsValue::from("inner")
    );
}

#[test]
fn test_const_assignment_fails() {
    let err = eval_result(program(vec![
        const_("c", num(1.0)),
        expr(assign("c", num(2.0))),
    ]))
    .unwrap_err();
    assert!(matches!(err, JsError::TypeError { .. }));
    assert!(err.to_string().contains("constant"));
}

#[test]
fn test_const_assignment_fails_from_nested_closure() {
    assert!(throws_error(
        program(vec![
            const_("c", num(1.0)),
            function_decl(
                "outer",
                &[],
                vec![ret(func(&[], vec![expr(assign_op(BinaryOp::Add, "c", num(1.0)))]))],
            ),
            expr(call(call(ident("outer"), vec![]), vec![])),
        ]),
        "Assignment to constant variable 'c'"
    ));
}

#[test]
fn test_const_violation_is_catchable() {
    // try { c = 2 } catch (e) { e instanceof TypeError }
    assert_eq!(
        eval(program(vec![
            const_("c", num(1.0)),
            let_("caught", bool_(false)),
            try_catch(
                vec![expr(assign("c", num(2.0)))],
                "e",
                vec![expr(assign(
                    "caught",
                    binary(BinaryOp::Instanceof, ident("e"), ident("TypeError")),
                ))],
            ),
            expr(ident("caught")),
        ])),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_var_escapes_block_let_does_not() {
    assert_eq!(
        eval(program(vec![
            block(vec![var("v", num(1.0)), let_("l", num(2.0))]),
            expr(ident("v")),
        ])),
        JsValue::Number(1.0)
    );
    assert_eq!(
        eval(program(vec![
            block(vec![let_("l", num(2.0))]),
            expr(typeof_(ident("l"))),
        ])),
        JsValue::from("undefined")
    );
    let err = eval_result(program(vec![
        block(vec![let_("l", num(2.0))]),
        expr(ident("l")),
    ]))
    .unwrap_err();
    assert!(matches!(err, JsError::ReferenceError { .. }));
}

#[test]
fn test_var_is_function_scoped() {
    // function f() { if (true) { var inner = 5; } return inner; } f()
    assert_eq!(
        eval(program(vec![
            function_decl(
                "f",
                &[],
                vec![
                    if_(bool_(true), block(vec![var("inner", num(5.0))]), None),
                    ret(ident("inner")),
                ],
            ),
            expr(call(ident("f"), vec![])),
        ])),
        JsValue::Number(5.0)
    );
    // The var does not leak out of the function
    assert!(throws_error(
        program(vec![
            function_decl("f", &[], vec![var("inner", num(5.0))]),
            expr(call(ident("f"), vec![])),
            expr(ident("inner")),
        ]),
        "inner is not defined"
    ));
}

#[test]
fn test_var_hoisted_as_undefined() {
    let logged = run_logged(program(vec![log(ident("v")), var("v", num(3.0)), log(ident("v"))]));
    assert_eq!(logged, vec![JsValue::Undefined, JsValue::Number(3.0)]);
}

#[test]
fn test_redeclared_var_without_initializer_keeps_value() {
    assert_eq!(
        eval(program(vec![var("v", num(3.0)), var_uninit("v"), expr(ident("v"))])),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_function_declarations_are_hoisted() {
    assert_eq!(
        eval(program(vec![
            let_("result", call(ident("seven"), vec![])),
            function_decl("seven", &[], vec![ret(num(7.0))]),
            expr(ident("result")),
        ])),
        JsValue::Number(7.0)
    );
}

#[test]
fn test_undefined_identifier() {
    let err = eval_result(program(vec![expr(ident("missing"))])).unwrap_err();
    assert!(matches!(err, JsError::ReferenceError { .. }));
    assert_eq!(err.to_string(), "ReferenceError: missing is not defined");
}

#[test]
fn test_assignment_to_undeclared_is_reference_error() {
    assert!(throws_error(
        program(vec![expr(assign("nowhere", num(1.0)))]),
        "nowhere is not defined"
    ));
}

#[test]
fn test_per_iteration_let_bindings() {
    // const fns = []; for (let i = 0; i < 3; i++) fns.push(() => i); fns.map(f => f()).join()
    assert_eq!(
        eval(program(vec![
            const_("fns", array(vec![])),
            for_let(
                "i",
                num(0.0),
                lt(ident("i"), num(3.0)),
                incr("i"),
                vec![expr(method(ident("fns"), "push", vec![arrow_expr(&[], ident("i"))]))],
            ),
            expr(method(
                method(
                    ident("fns"),
                    "map",
                    vec![arrow_expr(&["f"], call(ident("f"), vec![]))],
                ),
                "join",
                vec![],
            )),
        ])),
        JsValue::from("0,1,2")
    );
}

#[test]
fn test_closure_counter_shares_frame() {
    // function counter() { let n = 0; return () => ++n; } const c = counter(); c(); c(); c()
    let pre_incr = jsrun::ast::Expression::Update(jsrun::ast::UpdateExpression {
        operator: jsrun::ast::UpdateOp::Increment,
        prefix: true,
        target: jsrun::ast::AssignmentTarget::Identifier(jsrun::JsString::from("n")),
    });
    assert_eq!(
        eval(program(vec![
            function_decl(
                "counter",
                &[],
                vec![let_("n", num(0.0)), ret(arrow_expr(&[], pre_incr))],
            ),
            const_("c", call(ident("counter"), vec![])),
            expr(call(ident("c"), vec![])),
            expr(call(ident("c"), vec![])),
            expr(call(ident("c"), vec![])),
        ])),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_method_this_and_lexical_arrow_this() {
    // const obj = { x: 10, plain() { return this.x }, viaArrow() { return (() => this.x)() } }
    let obj = object(vec![
        ("x", num(10.0)),
        ("plain", func(&[], vec![ret(member(this(), "x"))])),
        (
            "viaArrow",
            func(&[], vec![ret(call(arrow_expr(&[], member(this(), "x")), vec![]))]),
        ),
    ]);
    assert_eq!(
        eval(program(vec![
            const_("obj", obj),
            expr(add(
                method(ident("obj"), "plain", vec![]),
                method(ident("obj"), "viaArrow", vec![]),
            )),
        ])),
        JsValue::Number(20.0)
    );
}

#[test]
fn test_call_depth_is_bounded() {
    // function r() { return r(); } r()
    let config = RuntimeConfig {
        max_call_depth: 32,
        ..RuntimeConfig::default()
    };
    let mut runtime = Runtime::with_config(config).unwrap();
    let err = runtime
        .run(&program(vec![
            function_decl("r", &[], vec![ret(call(ident("r"), vec![]))]),
            expr(call(ident("r"), vec![])),
        ]))
        .unwrap_err();
    assert!(matches!(err, JsError::RangeError { .. }));
}

fn unbounded_recursion() -> jsrun::ast::Program {
    // function r() { return r(); } r()
    program(vec![
        function_decl("r", &[], vec![ret(call(ident("r"), vec![]))]),
        expr(call(ident("r"), vec![])),
    ])
}

#[test]
fn test_default_limits_stop_recursion_on_a_test_thread() {
    let err = Runtime::new().run(&unbounded_recursion()).unwrap_err();
    assert!(matches!(err, JsError::RangeError { .. }));
    assert!(err.to_string().contains("Maximum call stack size exceeded"));
}

#[test]
fn test_stack_budget_applies_before_call_depth() {
    let config = RuntimeConfig {
        max_call_depth: 1_000_000,
        max_stack_bytes: 64 * 1024,
        ..RuntimeConfig::default()
    };
    let mut runtime = Runtime::with_config(config).unwrap();
    let err = runtime.run(&unbounded_recursion()).unwrap_err();
    assert!(matches!(err, JsError::RangeError { .. }));
}

#[test]
fn test_stack_overflow_is_catchable() {
    // let caught = false; try { r() } catch (e) { caught = e instanceof RangeError } caught
    assert_eq!(
        eval(program(vec![
            function_decl("r", &[], vec![ret(call(ident("r"), vec![]))]),
            let_("caught", bool_(false)),
            try_catch(
                vec![expr(call(ident("r"), vec![]))],
                "e",
                vec![expr(assign(
                    "caught",
                    binary(BinaryOp::Instanceof, ident("e"), ident("RangeError")),
                ))],
            ),
            expr(ident("caught")),
        ])),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_calling_non_function_names_the_callee() {
    assert!(throws_error(
        program(vec![
            const_("obj", object(vec![("x", num(1.0))])),
            expr(method(ident("obj"), "x", vec![])),
        ]),
        "obj.x is not a function"
    ));
}
