//! Embeddable JavaScript execution runtime
//!
//! The crate executes typed program trees ([`ast::Program`]) produced by an
//! external parser. It provides lexical environments, a prototype-based object
//! model, generator functions backed by resumable coroutines, and promises
//! scheduled on a FIFO microtask queue.
//!
//! # Example
//!
//! ```
//! use jsrun::ast::build::*;
//! use jsrun::{JsValue, Runtime};
//!
//! let mut runtime = Runtime::new();
//! let program = program(vec![
//!     let_("x", num(40.0)),
//!     expr(add(ident("x"), num(2.0))),
//! ]);
//! assert_eq!(runtime.run(&program).unwrap(), JsValue::Number(42.0));
//! ```

pub mod api;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod value;

pub use config::RuntimeConfig;
pub use error::JsError;
pub use interpreter::Interpreter;
pub use value::CheapClone;
pub use value::Invokable;
pub use value::JsObjectRef;
pub use value::JsString;
pub use value::JsSymbol;
pub use value::JsValue;
pub use value::PromiseStatus;

use tracing::debug;

/// The main runtime for executing programs
pub struct Runtime {
    interpreter: Interpreter,
}

impl Runtime {
    /// Create a new runtime instance with the default configuration
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    /// Create a runtime with explicit limits.
    ///
    /// Fails with [`JsError::Config`] when the configuration is unusable.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, JsError> {
        config.validate()?;
        Ok(Self {
            interpreter: Interpreter::with_config(config),
        })
    }

    /// Execute a program synchronously and return its completion value.
    ///
    /// Promise reactions scheduled by the program stay queued; see
    /// [`Runtime::run`] and [`Runtime::run_microtasks`].
    pub fn execute(&mut self, program: &ast::Program) -> Result<JsValue, JsError> {
        self.interpreter.execute_program(program)
    }

    /// Execute a program, then drain the microtask queue
    pub fn run(&mut self, program: &ast::Program) -> Result<JsValue, JsError> {
        let value = self.execute(program)?;
        self.run_microtasks()?;
        Ok(value)
    }

    /// Drain the microtask queue; returns the number of tasks run
    pub fn run_microtasks(&mut self) -> Result<usize, JsError> {
        self.interpreter.run_microtasks()
    }

    /// Drain the microtask queue and unwrap a settled promise.
    ///
    /// Non-promise values are returned unchanged. A rejected promise becomes
    /// an `Err` carrying the rejection reason; a promise still pending after
    /// the drain is a TypeError.
    pub fn settle(&mut self, value: JsValue) -> Result<JsValue, JsError> {
        self.run_microtasks()?;
        match self.interpreter.promise_status(&value) {
            None => Ok(value),
            Some(PromiseStatus::Fulfilled(result)) => Ok(result),
            Some(PromiseStatus::Rejected(reason)) => Err(JsError::thrown(reason)),
            Some(PromiseStatus::Pending) => Err(JsError::type_error(
                "Promise is still pending after draining the microtask queue",
            )),
        }
    }

    /// Expose a host function to scripts as a global.
    ///
    /// # Example
    ///
    /// ```
    /// use jsrun::ast::build::*;
    /// use jsrun::{JsValue, Runtime};
    ///
    /// let mut runtime = Runtime::new();
    /// runtime.register_function("double", 1, |_interp, _this, args| {
    ///     Ok(JsValue::Number(args.first().map(|v| v.to_number()).unwrap_or(0.0) * 2.0))
    /// });
    /// let program = program(vec![expr(call(ident("double"), vec![num(21.0)]))]);
    /// assert_eq!(runtime.run(&program).unwrap(), JsValue::Number(42.0));
    /// ```
    pub fn register_function<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        let function = self.interpreter.create_native_function(name, func, arity);
        self.interpreter
            .define_global(name, JsValue::Object(function));
        debug!(name, "registered host function");
    }

    /// Bind a global value, replacing any existing binding
    pub fn set_global(&mut self, name: &str, value: JsValue) {
        self.interpreter.define_global(name, value);
    }

    /// Read a global binding
    pub fn get_global(&self, name: &str) -> Result<JsValue, JsError> {
        self.interpreter.global_env.get(name)
    }

    /// Call a function value with `undefined` as `this`
    pub fn call(&mut self, func: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        self.interpreter
            .call_function(func.clone(), JsValue::Undefined, args)
    }

    /// State of a promise value, or `None` when the value is not a promise
    pub fn promise_status(&self, value: &JsValue) -> Option<PromiseStatus> {
        self.interpreter.promise_status(value)
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
