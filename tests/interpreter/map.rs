//! Map: SameValueZero keys, insertion order, iteration

use super::{eval, eval_json, throws_error};
use jsrun::JsValue;
use jsrun::ast::build::*;
use jsrun::ast::{BinaryOp, Expression, UnaryOp};
use serde_json::json;

fn new_map(args: Vec<Expression>) -> Expression {
    new_(ident("Map"), args)
}

fn m(name: &str, args: Vec<Expression>) -> Expression {
    method(ident("m"), name, args)
}

/// `const out = []; for (const e of m) out.push(e); out`
fn collect_entries() -> Vec<jsrun::ast::Statement> {
    vec![
        const_("out", array(vec![])),
        for_of(
            "e",
            ident("m"),
            vec![expr(method(ident("out"), "push", vec![ident("e")]))],
        ),
        expr(ident("out")),
    ]
}

#[test]
fn test_basic_operations() {
    // const m = new Map(); m.set("a", 1).set("b", 2); [m.get("a"), m.has("b"), m.size, m.delete("a"), m.has("a"), m.size]
    assert_eq!(
        eval_json(program(vec![
            const_("m", new_map(vec![])),
            expr(method(
                m("set", vec![str_("a"), num(1.0)]),
                "set",
                vec![str_("b"), num(2.0)],
            )),
            expr(array(vec![
                m("get", vec![str_("a")]),
                m("has", vec![str_("b")]),
                member(ident("m"), "size"),
                m("delete", vec![str_("a")]),
                m("has", vec![str_("a")]),
                m("delete", vec![str_("a")]),
                member(ident("m"), "size"),
            ])),
        ])),
        json!([1, true, 2, true, false, false, 1])
    );
}

#[test]
fn test_missing_key_reads_undefined() {
    assert_eq!(
        eval(program(vec![
            const_("m", new_map(vec![])),
            expr(m("get", vec![str_("nope")])),
        ])),
        JsValue::Undefined
    );
}

#[test]
fn test_nan_is_a_single_key() {
    // m.set(NaN, "first"); m.set(0 / 0, "second"); [m.size, m.get(NaN)]
    assert_eq!(
        eval_json(program(vec![
            const_("m", new_map(vec![])),
            expr(m("set", vec![ident("NaN"), str_("first")])),
            expr(m(
                "set",
                vec![binary(BinaryOp::Div, num(0.0), num(0.0)), str_("second")],
            )),
            expr(array(vec![
                member(ident("m"), "size"),
                m("get", vec![ident("NaN")]),
            ])),
        ])),
        json!([1, "second"])
    );
}

#[test]
fn test_zero_signs_are_the_same_key() {
    // m.set(-0, "z"); const k = m.entries().next().value[0]; [m.get(0), m.size, 1 / k > 0]
    let negative_zero = unary(UnaryOp::Minus, num(0.0));
    assert_eq!(
        eval_json(program(vec![
            const_("m", new_map(vec![])),
            expr(m("set", vec![negative_zero, str_("z")])),
            expr(m("set", vec![num(0.0), str_("zz")])),
            const_(
                "k",
                index(
                    member(method(m("entries", vec![]), "next", vec![]), "value"),
                    num(0.0),
                ),
            ),
            expr(array(vec![
                m("get", vec![num(0.0)]),
                member(ident("m"), "size"),
                binary(
                    BinaryOp::Gt,
                    binary(BinaryOp::Div, num(1.0), ident("k")),
                    num(0.0),
                ),
            ])),
        ])),
        json!(["zz", 1, true])
    );
}

#[test]
fn test_object_keys_by_identity() {
    // const a = {}; const b = {}; m.set(a, 1); m.set(b, 2); [m.get(a), m.get(b), m.get({}), m.size]
    assert_eq!(
        eval_json(program(vec![
            const_("m", new_map(vec![])),
            const_("a", object(vec![])),
            const_("b", object(vec![])),
            expr(m("set", vec![ident("a"), num(1.0)])),
            expr(m("set", vec![ident("b"), num(2.0)])),
            expr(array(vec![
                m("get", vec![ident("a")]),
                m("get", vec![ident("b")]),
                m("has", vec![object(vec![])]),
                member(ident("m"), "size"),
            ])),
        ])),
        json!([1, 2, false, 2])
    );
}

#[test]
fn test_strings_and_numbers_are_distinct_keys() {
    assert_eq!(
        eval_json(program(vec![
            const_("m", new_map(vec![])),
            expr(m("set", vec![num(1.0), str_("number")])),
            expr(m("set", vec![str_("1"), str_("string")])),
            expr(array(vec![
                m("get", vec![num(1.0)]),
                m("get", vec![str_("1")]),
                member(ident("m"), "size"),
            ])),
        ])),
        json!(["number", "string", 2])
    );
}

#[test]
fn test_iteration_follows_insertion_order() {
    // overwriting keeps the position, delete + set moves to the end
    let mut body = vec![
        const_("m", new_map(vec![])),
        expr(m("set", vec![str_("x"), num(1.0)])),
        expr(m("set", vec![str_("y"), num(2.0)])),
        expr(m("set", vec![str_("z"), num(3.0)])),
        expr(m("set", vec![str_("x"), num(10.0)])),
        expr(m("delete", vec![str_("y")])),
        expr(m("set", vec![str_("y"), num(20.0)])),
    ];
    body.extend(collect_entries());
    assert_eq!(
        eval_json(program(body)),
        json!([["x", 10], ["z", 3], ["y", 20]])
    );
}

#[test]
fn test_constructor_from_iterable() {
    // new Map([["a", 1], ["b", 2], ["a", 3]])
    let mut body = vec![const_(
        "m",
        new_map(vec![array(vec![
            array(vec![str_("a"), num(1.0)]),
            array(vec![str_("b"), num(2.0)]),
            array(vec![str_("a"), num(3.0)]),
        ])]),
    )];
    body.extend(collect_entries());
    assert_eq!(eval_json(program(body)), json!([["a", 3], ["b", 2]]));
}

#[test]
fn test_constructor_from_generator() {
    // function* pairs() { yield [1, "one"]; yield [2, "two"] } new Map(pairs()).get(2)
    assert_eq!(
        eval(program(vec![
            generator_decl(
                "pairs",
                &[],
                vec![
                    expr(yield_(array(vec![num(1.0), str_("one")]))),
                    expr(yield_(array(vec![num(2.0), str_("two")]))),
                ],
            ),
            expr(method(
                new_map(vec![call(ident("pairs"), vec![])]),
                "get",
                vec![num(2.0)],
            )),
        ])),
        JsValue::from("two")
    );
}

#[test]
fn test_constructor_rejects_non_entry_values() {
    assert!(throws_error(
        program(vec![expr(new_map(vec![array(vec![num(1.0)])]))]),
        "Iterator value 1 is not an entry object"
    ));
}

#[test]
fn test_for_each_passes_value_key_and_map() {
    // const seen = []; m.forEach((v, k, map) => seen.push(k + "=" + v, map === m))
    assert_eq!(
        eval_json(program(vec![
            const_(
                "m",
                new_map(vec![array(vec![
                    array(vec![str_("a"), num(1.0)]),
                    array(vec![str_("b"), num(2.0)]),
                ])]),
            ),
            const_("seen", array(vec![])),
            expr(m(
                "forEach",
                vec![arrow_expr(
                    &["v", "k", "map"],
                    method(
                        ident("seen"),
                        "push",
                        vec![
                            add(add(ident("k"), str_("=")), ident("v")),
                            strict_eq(ident("map"), ident("m")),
                        ],
                    ),
                )],
            )),
            expr(ident("seen")),
        ])),
        json!(["a=1", true, "b=2", true])
    );
}

#[test]
fn test_for_each_visits_entries_added_during_walk() {
    // m.forEach((v, k) => { if (v < 3) m.set("k" + v, v + 1) }); m.size
    assert_eq!(
        eval(program(vec![
            const_("m", new_map(vec![array(vec![array(vec![str_("k0"), num(1.0)])])])),
            expr(m(
                "forEach",
                vec![arrow(
                    &["v", "k"],
                    vec![if_(
                        lt(ident("v"), num(3.0)),
                        expr(m(
                            "set",
                            vec![add(str_("k"), ident("v")), add(ident("v"), num(1.0))],
                        )),
                        None,
                    )],
                )],
            )),
            expr(member(ident("m"), "size")),
        ])),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_clear_empties_the_map() {
    assert_eq!(
        eval(program(vec![
            const_("m", new_map(vec![array(vec![array(vec![num(1.0), num(2.0)])])])),
            expr(m("clear", vec![])),
            expr(member(ident("m"), "size")),
        ])),
        JsValue::Number(0.0)
    );
}

#[test]
fn test_destructuring_entries() {
    // let total = 0; for (const [k, v] of m) total += v; total
    let entries = jsrun::ast::Statement::ForOf(jsrun::ast::ForOfStatement {
        left: jsrun::ast::ForOfLeft::Variable(
            jsrun::ast::VariableKind::Const,
            array_pat(vec![Some(pat("k")), Some(pat("v"))]),
        ),
        right: ident("m"),
        body: Box::new(block(vec![expr(assign_op(
            BinaryOp::Add,
            "total",
            ident("v"),
        ))])),
    });
    assert_eq!(
        eval(program(vec![
            const_(
                "m",
                new_map(vec![array(vec![
                    array(vec![str_("a"), num(4.0)]),
                    array(vec![str_("b"), num(5.0)]),
                ])]),
            ),
            let_("total", num(0.0)),
            entries,
            expr(ident("total")),
        ])),
        JsValue::Number(9.0)
    );
}

#[test]
fn test_methods_reject_non_map_receivers() {
    // const fake = { get: new Map().get }; fake.get("x")
    assert!(throws_error(
        program(vec![
            const_(
                "fake",
                object(vec![("get", member(new_map(vec![]), "get"))]),
            ),
            expr(method(ident("fake"), "get", vec![str_("x")])),
        ]),
        "Method Map.prototype.get called on incompatible receiver"
    ));
}
