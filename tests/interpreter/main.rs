//! Integration tests for the runtime, organized by feature
//!
//! Programs are built with `jsrun::ast::build` and run through the public
//! [`Runtime`] API. Tests that observe ordering use the `log` host function,
//! which records its arguments into a shared sink.

mod control_flow;
mod destructuring;
mod environment;
mod generator;
mod map;

use std::cell::RefCell;
use std::rc::Rc;

use jsrun::ast::Program;
use jsrun::{JsError, JsValue, Runtime};

/// Values passed to `log(...)`, one entry per argument
pub type Sink = Rc<RefCell<Vec<JsValue>>>;

/// Runtime with a `log` global appending its arguments to the returned sink
pub fn runtime_with_sink() -> (Runtime, Sink) {
    let mut runtime = Runtime::new();
    let sink: Sink = Rc::new(RefCell::new(Vec::new()));
    let log = sink.clone();
    runtime.register_function("log", 1, move |_interp, _this, args| {
        log.borrow_mut().extend(args.iter().cloned());
        Ok(JsValue::Undefined)
    });
    (runtime, sink)
}

/// Run a program (draining microtasks) and return its completion value
#[allow(clippy::expect_used)]
pub fn eval(program: Program) -> JsValue {
    eval_result(program).expect("eval failed")
}

/// Run a program (draining microtasks), keeping errors for inspection
pub fn eval_result(program: Program) -> Result<JsValue, JsError> {
    let mut runtime = Runtime::new();
    runtime.run(&program)
}

/// Run a program and convert its completion value to JSON.
///
/// `undefined` array elements come back as `null`.
#[allow(clippy::expect_used)]
pub fn eval_json(program: Program) -> serde_json::Value {
    let mut runtime = Runtime::new();
    let value = runtime.run(&program).expect("run failed");
    runtime
        .interpreter()
        .value_to_json(&value)
        .expect("completion value is not serializable")
}

/// Run a program and unwrap the promise it completes with
pub fn eval_settled(program: Program) -> Result<JsValue, JsError> {
    let mut runtime = Runtime::new();
    let value = runtime.execute(&program)?;
    runtime.settle(value)
}

/// Run a program with a `log` sink and return everything it logged
#[allow(clippy::expect_used)]
pub fn run_logged(program: Program) -> Vec<JsValue> {
    let (mut runtime, sink) = runtime_with_sink();
    runtime.run(&program).expect("run failed");
    let logged = sink.borrow().clone();
    logged
}

/// Logged values as numbers, for compact ordering assertions
pub fn numbers(values: &[JsValue]) -> Vec<f64> {
    values.iter().map(JsValue::to_number).collect()
}

/// Whether running the program fails with an error whose message contains `needle`
pub fn throws_error(program: Program, needle: &str) -> bool {
    match eval_result(program) {
        Err(e) => e.to_string().contains(needle),
        Ok(_) => false,
    }
}
