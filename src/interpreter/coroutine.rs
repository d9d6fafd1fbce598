//! Resumable execution of generator and async function bodies
//!
//! A [`Coroutine`] owns the compiled [`Plan`] of its body and a
//! machine frame holding everything needed to continue after a suspension:
//! instruction pointer, operand stack, scope stack, handler and loop frames,
//! completions interrupted by `finally`, and an active `yield*` delegate.
//! Resuming never re-executes an op that already ran.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::compiler::{self, Op, Plan};
use crate::error::JsError;
use crate::value::{
    CheapClone, ExoticObject, InterpretedFunction, JsObjectRef, JsString, JsValue, PropertyKey,
    ReactionHandler,
};

use super::completion::{Completion, targets};
use super::environment::Environment;
use super::eval::literal_value;
use super::iteration::IteratorRecord;
use super::Interpreter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Called but not started; the first resumption runs from the top
    Created,
    Suspended,
    Running,
    Completed,
}

/// What drives a coroutine
#[derive(Debug, Clone)]
pub enum CoroutineKind {
    /// Resumed by `next`/`throw`/`return` on a generator object
    Generator,
    /// Resumed by promise reactions; settles `promise` on completion
    Async { promise: JsObjectRef },
}

/// How a suspended coroutine is continued
#[derive(Debug)]
pub enum Resumption {
    /// Continue with a value for the pending `yield`/`await`
    Next(JsValue),
    /// Raise an exception at the suspension point
    Throw(JsError),
    /// Force a return at the suspension point, running `finally` blocks
    Return(JsValue),
}

/// Why a resumption stopped running
#[derive(Debug, PartialEq)]
pub enum Exit {
    Yield(JsValue),
    Await(JsValue),
    /// The body finished; carries the return value
    Complete(JsValue),
}

pub struct Coroutine {
    status: CoroutineStatus,
    kind: CoroutineKind,
    plan: Rc<Plan>,
    /// Taken while running so the machine can borrow it mutably
    frame: Option<MachineFrame>,
}

impl Coroutine {
    pub fn new(plan: Rc<Plan>, env: Environment, kind: CoroutineKind) -> Self {
        Self {
            status: CoroutineStatus::Created,
            kind,
            plan,
            frame: Some(MachineFrame::new(env)),
        }
    }

    pub fn status(&self) -> CoroutineStatus {
        self.status
    }

    /// Result promise of an async function body
    pub fn async_promise(&self) -> Option<JsObjectRef> {
        match &self.kind {
            CoroutineKind::Async { promise } => Some(promise.cheap_clone()),
            CoroutineKind::Generator => None,
        }
    }

    /// Resume the coroutine until it yields, awaits or completes.
    ///
    /// An error escaping the body completes the coroutine and is returned.
    pub fn resume(
        this: &Rc<RefCell<Coroutine>>,
        interp: &mut Interpreter,
        resumption: Resumption,
    ) -> Result<Exit, JsError> {
        let (mut frame, plan, resumption) = {
            let mut co = this.borrow_mut();
            trace!(status = ?co.status, resumption = ?resumption, "resuming coroutine");
            let resumption = match co.status {
                CoroutineStatus::Running => {
                    return Err(JsError::type_error("Generator is already running"));
                }
                CoroutineStatus::Completed => {
                    return match resumption {
                        Resumption::Throw(err) => Err(err),
                        Resumption::Return(value) => Ok(Exit::Complete(value)),
                        Resumption::Next(_) => Ok(Exit::Complete(JsValue::Undefined)),
                    };
                }
                CoroutineStatus::Created => match resumption {
                    // The first argument to next() has no yield to receive it
                    Resumption::Next(_) => None,
                    Resumption::Throw(err) => {
                        co.finish();
                        return Err(err);
                    }
                    Resumption::Return(value) => {
                        co.finish();
                        return Ok(Exit::Complete(value));
                    }
                },
                CoroutineStatus::Suspended => Some(resumption),
            };
            let Some(frame) = co.frame.take() else {
                return Err(JsError::internal_error("coroutine has no frame"));
            };
            co.status = CoroutineStatus::Running;
            (frame, co.plan.cheap_clone(), resumption)
        };

        let result = frame.resume(interp, &plan, resumption);

        let mut co = this.borrow_mut();
        match &result {
            Ok(Exit::Yield(_)) | Ok(Exit::Await(_)) => {
                co.frame = Some(frame);
                co.status = CoroutineStatus::Suspended;
            }
            Ok(Exit::Complete(_)) | Err(_) => {
                co.finish();
                debug!(ok = result.is_ok(), "coroutine completed");
            }
        }
        result
    }

    fn finish(&mut self) {
        self.status = CoroutineStatus::Completed;
        self.frame = None;
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coroutine")
            .field("status", &self.status)
            .field("ops", &self.plan.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Machine frame
// ═══════════════════════════════════════════════════════════════════════════

/// Saved sizes of the frame's stacks, restored when control jumps to a handler
#[derive(Debug, Clone, Copy)]
struct Depths {
    stack: usize,
    scopes: usize,
    pending: usize,
}

struct LoopFrame {
    /// Index into `Plan::loops`
    index: usize,
    depths: Depths,
    /// Iterator of a `for...of` loop, closed on abrupt exit
    iterator: Option<IteratorRecord>,
}

enum ControlFrame {
    Catch { target: usize, depths: Depths },
    Finally { target: usize, depths: Depths },
    Loop(LoopFrame),
}

/// A completion travelling through handler and loop frames
#[derive(Debug)]
enum Pending {
    Normal,
    Throw(JsError),
    Return(JsValue),
    Break(Option<JsString>),
    Continue(Option<JsString>),
}

/// Result of executing one op
enum Step {
    Next,
    Exit(Exit),
    Abrupt(Pending),
}

/// Result of unwinding an abrupt completion
enum Flow {
    /// Control was transferred to a handler or loop target
    Continue,
    Exit(Exit),
}

struct MachineFrame {
    ip: usize,
    stack: Vec<JsValue>,
    /// Function scope of the call
    base: Environment,
    /// Block scopes pushed by the plan, innermost last
    scopes: Vec<Environment>,
    control: Vec<ControlFrame>,
    /// Completions interrupted by a running `finally` block
    pending: Vec<Pending>,
    delegate: Option<IteratorRecord>,
}

impl MachineFrame {
    fn new(base: Environment) -> Self {
        Self {
            ip: 0,
            stack: Vec::new(),
            base,
            scopes: Vec::new(),
            control: Vec::new(),
            pending: Vec::new(),
            delegate: None,
        }
    }

    fn current_env(&self) -> Environment {
        self.scopes.last().unwrap_or(&self.base).cheap_clone()
    }

    fn sync_env(&self, interp: &mut Interpreter) {
        interp.env = self.current_env();
    }

    fn depths(&self) -> Depths {
        Depths {
            stack: self.stack.len(),
            scopes: self.scopes.len(),
            pending: self.pending.len(),
        }
    }

    fn restore(&mut self, interp: &mut Interpreter, depths: Depths) {
        self.stack.truncate(depths.stack);
        self.scopes.truncate(depths.scopes);
        self.pending.truncate(depths.pending);
        self.sync_env(interp);
    }

    fn pop(&mut self) -> Result<JsValue, JsError> {
        self.stack
            .pop()
            .ok_or_else(|| JsError::internal_error("operand stack underflow"))
    }

    fn peek(&self) -> Result<JsValue, JsError> {
        self.stack
            .last()
            .cloned()
            .ok_or_else(|| JsError::internal_error("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<JsValue>, JsError> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| JsError::internal_error("operand stack underflow"))?;
        Ok(self.stack.split_off(start))
    }

    fn innermost_loop(&mut self) -> Result<&mut LoopFrame, JsError> {
        match self.control.last_mut() {
            Some(ControlFrame::Loop(frame)) => Ok(frame),
            _ => Err(JsError::internal_error("iteration outside of a loop frame")),
        }
    }

    fn resume(
        &mut self,
        interp: &mut Interpreter,
        plan: &Plan,
        resumption: Option<Resumption>,
    ) -> Result<Exit, JsError> {
        let saved = interp.env.cheap_clone();
        self.sync_env(interp);
        let step = match resumption {
            None => Step::Next,
            Some(resumption) if self.delegate.is_some() => self.delegate_step(interp, resumption),
            Some(Resumption::Next(value)) => {
                self.stack.push(value);
                Step::Next
            }
            Some(Resumption::Throw(err)) => Step::Abrupt(Pending::Throw(err)),
            Some(Resumption::Return(value)) => Step::Abrupt(Pending::Return(value)),
        };
        let result = self.run(interp, plan, step);
        interp.env = saved;
        result
    }

    fn run(
        &mut self,
        interp: &mut Interpreter,
        plan: &Plan,
        mut step: Step,
    ) -> Result<Exit, JsError> {
        loop {
            match step {
                Step::Next => {}
                Step::Exit(exit) => return Ok(exit),
                Step::Abrupt(pending) => {
                    if let Flow::Exit(exit) = self.unwind(interp, plan, pending)? {
                        return Ok(exit);
                    }
                }
            }
            let Some(op) = plan.ops.get(self.ip) else {
                return Ok(Exit::Complete(JsValue::Undefined));
            };
            self.ip += 1;
            step = self
                .execute(interp, op)
                .unwrap_or_else(|err| Step::Abrupt(Pending::Throw(err)));
        }
    }

    fn execute(&mut self, interp: &mut Interpreter, op: &Op) -> Result<Step, JsError> {
        match op {
            Op::Exec(stmt) => {
                return Ok(match interp.execute_statement(stmt)? {
                    Completion::Normal(_) => Step::Next,
                    Completion::Return(value) => Step::Abrupt(Pending::Return(value)),
                    Completion::Break(label) => Step::Abrupt(Pending::Break(label)),
                    Completion::Continue(label) => Step::Abrupt(Pending::Continue(label)),
                });
            }
            Op::Eval(expr) => {
                let value = interp.evaluate(expr)?;
                self.stack.push(value);
            }

            Op::Const(lit) => self.stack.push(literal_value(lit)),
            Op::PushUndefined => self.stack.push(JsValue::Undefined),
            Op::Pop => {
                self.pop()?;
            }
            Op::Dup => {
                let top = self.peek()?;
                self.stack.push(top);
            }
            Op::Dup2 => {
                let pair = self.pop_n(2)?;
                self.stack.extend(pair.iter().cloned());
                self.stack.extend(pair);
            }

            Op::Yield => return Ok(Step::Exit(Exit::Yield(self.pop()?))),
            Op::YieldDelegate => {
                let iterable = self.pop()?;
                self.delegate = Some(interp.get_iterator(&iterable)?);
                return Ok(self.delegate_step(interp, Resumption::Next(JsValue::Undefined)));
            }
            Op::Await => return Ok(Step::Exit(Exit::Await(self.pop()?))),

            Op::Jump(target) => self.ip = *target,
            Op::JumpIfFalse(target) => {
                if !self.pop()?.to_boolean() {
                    self.ip = *target;
                }
            }
            Op::JumpIfFalsyKeep(target) => self.jump_keeping(*target, |v| !v.to_boolean())?,
            Op::JumpIfTruthyKeep(target) => self.jump_keeping(*target, |v| v.to_boolean())?,
            Op::JumpIfNotNullishKeep(target) => {
                self.jump_keeping(*target, |v| !v.is_null_or_undefined())?
            }

            Op::PushScope => {
                let scope = Environment::new_block(&self.current_env());
                self.scopes.push(scope);
                self.sync_env(interp);
            }
            Op::PopScope => {
                self.scopes.pop();
                self.sync_env(interp);
            }
            Op::RenewScope => {
                if let Some(scope) = self.scopes.last_mut() {
                    *scope = scope.renew();
                }
                self.sync_env(interp);
            }
            Op::DeclareFunction(function) => interp.declare_function(function)?,
            Op::Declare { pattern, kind } => {
                let value = self.pop()?;
                interp.bind_pattern(pattern, value, (*kind).into())?;
            }
            Op::Assign(name) => {
                let value = self.peek()?;
                interp.env.assign(name, value)?;
            }

            Op::GetMember(name) => {
                let object = self.pop()?;
                let value = interp.get_property(&object, &PropertyKey::from(name.cheap_clone()))?;
                self.stack.push(value);
            }
            Op::GetMemberKeep(name) => {
                let object = self.peek()?;
                let value = interp.get_property(&object, &PropertyKey::from(name.cheap_clone()))?;
                self.stack.push(value);
            }
            Op::GetIndex => {
                let key = self.pop()?;
                let object = self.pop()?;
                let key = interp.to_property_key(&key)?;
                let value = interp.get_property(&object, &key)?;
                self.stack.push(value);
            }
            Op::GetIndexKeep => {
                let key = self.pop()?;
                let object = self.peek()?;
                let key = interp.to_property_key(&key)?;
                let value = interp.get_property(&object, &key)?;
                self.stack.push(value);
            }
            Op::SetMember(name) => {
                let value = self.pop()?;
                let object = self.pop()?;
                interp.put_property(&object, PropertyKey::from(name.cheap_clone()), value.clone())?;
                self.stack.push(value);
            }
            Op::SetIndex => {
                let value = self.pop()?;
                let key = self.pop()?;
                let object = self.pop()?;
                let key = interp.to_property_key(&key)?;
                interp.put_property(&object, key, value.clone())?;
                self.stack.push(value);
            }
            Op::UpdateProperty {
                name,
                operator,
                prefix,
            } => {
                let (object, key) = self.pop_member(interp, name)?;
                let value = interp.update_property(&object, key, *operator, *prefix)?;
                self.stack.push(value);
            }
            Op::Delete { name } => {
                let (object, key) = self.pop_member(interp, name)?;
                let deleted = interp.delete_property(&object, &key)?;
                self.stack.push(JsValue::Boolean(deleted));
            }

            Op::Binary(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                let value = interp.binary_op(*op, left, right)?;
                self.stack.push(value);
            }
            Op::Unary(op) => {
                let operand = self.pop()?;
                let value = interp.unary_op(*op, operand)?;
                self.stack.push(value);
            }
            Op::Call { argc, with_this } => {
                let args = self.pop_n(*argc)?;
                let callee = self.pop()?;
                let this_value = if *with_this {
                    self.pop()?
                } else {
                    JsValue::Undefined
                };
                let value = interp.call_function(callee, this_value, &args)?;
                self.stack.push(value);
            }
            Op::New { argc } => {
                let args = self.pop_n(*argc)?;
                let callee = self.pop()?;
                let value = interp.construct(callee, &args)?;
                self.stack.push(value);
            }
            Op::MakeArray(count) => {
                let elements = self.pop_n(*count)?;
                let array = interp.create_array(elements);
                self.stack.push(JsValue::Object(array));
            }
            Op::MakeObject(kinds) => {
                let values = self.pop_n(kinds.len() * 2)?;
                let object = interp.create_object();
                for (pair, kind) in values.chunks_exact(2).zip(kinds) {
                    let [key, value] = pair else {
                        return Err(JsError::internal_error("malformed object literal operands"));
                    };
                    let key = interp.to_property_key(key)?;
                    interp.define_literal_property(&object, key, value.clone(), *kind)?;
                }
                self.stack.push(JsValue::Object(object));
            }

            Op::Return => return Ok(Step::Abrupt(Pending::Return(self.pop()?))),
            Op::Throw => return Ok(Step::Abrupt(Pending::Throw(JsError::thrown(self.pop()?)))),
            Op::EnterCatch(target) => {
                let depths = self.depths();
                self.control.push(ControlFrame::Catch {
                    target: *target,
                    depths,
                });
            }
            Op::EnterFinally(target) => {
                let depths = self.depths();
                self.control.push(ControlFrame::Finally {
                    target: *target,
                    depths,
                });
            }
            Op::ExitHandler => match self.control.pop() {
                Some(ControlFrame::Catch { .. } | ControlFrame::Finally { .. }) => {}
                _ => return Err(JsError::internal_error("handler stack mismatch")),
            },
            Op::PushNormalCompletion => self.pending.push(Pending::Normal),
            Op::EndFinally => {
                return match self.pending.pop() {
                    Some(Pending::Normal) => Ok(Step::Next),
                    Some(pending) => Ok(Step::Abrupt(pending)),
                    None => Err(JsError::internal_error("finally without a completion")),
                };
            }

            Op::EnterLoop(index) => {
                let depths = self.depths();
                self.control.push(ControlFrame::Loop(LoopFrame {
                    index: *index,
                    depths,
                    iterator: None,
                }));
            }
            Op::ExitLoop => match self.control.pop() {
                Some(ControlFrame::Loop(_)) => {}
                _ => return Err(JsError::internal_error("loop stack mismatch")),
            },
            Op::GetIterator => {
                let iterable = self.pop()?;
                let record = interp.get_iterator(&iterable)?;
                let depth = self.stack.len();
                let frame = self.innermost_loop()?;
                frame.iterator = Some(record);
                frame.depths.stack = depth;
            }
            Op::IteratorStep(target) => {
                let Some(record) = self.innermost_loop()?.iterator.clone() else {
                    return Err(JsError::internal_error("loop has no iterator"));
                };
                match interp.iterator_step(&record) {
                    Ok(Some(value)) => self.stack.push(value),
                    Ok(None) => {
                        self.innermost_loop()?.iterator = None;
                        self.ip = *target;
                    }
                    Err(err) => {
                        // A failing iterator is not closed
                        self.innermost_loop()?.iterator = None;
                        return Err(err);
                    }
                }
            }
        }
        Ok(Step::Next)
    }

    /// Jump keeping the top value when `test` holds, otherwise drop it
    fn jump_keeping(
        &mut self,
        target: usize,
        test: impl Fn(&JsValue) -> bool,
    ) -> Result<(), JsError> {
        if test(&self.peek()?) {
            self.ip = target;
        } else {
            self.pop()?;
        }
        Ok(())
    }

    /// Pop `obj [key]` operands of a member op
    fn pop_member(
        &mut self,
        interp: &mut Interpreter,
        name: &Option<JsString>,
    ) -> Result<(JsValue, PropertyKey), JsError> {
        let key = match name {
            Some(name) => PropertyKey::from(name.cheap_clone()),
            None => {
                let key = self.pop()?;
                interp.to_property_key(&key)?
            }
        };
        Ok((self.pop()?, key))
    }

    /// Route an abrupt completion to the innermost frame that handles it
    fn unwind(
        &mut self,
        interp: &mut Interpreter,
        plan: &Plan,
        mut pending: Pending,
    ) -> Result<Flow, JsError> {
        while let Some(frame) = self.control.pop() {
            match frame {
                ControlFrame::Catch { target, depths } => match pending {
                    Pending::Throw(err) if err.is_catchable() => {
                        self.restore(interp, depths);
                        let value = interp.error_to_value(err);
                        self.stack.push(value);
                        self.ip = target;
                        return Ok(Flow::Continue);
                    }
                    other => pending = other,
                },
                ControlFrame::Finally { target, depths } => {
                    self.restore(interp, depths);
                    self.pending.push(pending);
                    self.ip = target;
                    return Ok(Flow::Continue);
                }
                ControlFrame::Loop(frame) => {
                    let Some(info) = plan.loops.get(frame.index) else {
                        return Err(JsError::internal_error("loop index out of range"));
                    };
                    let continues = matches!(
                        &pending,
                        Pending::Continue(label) if info.is_loop && targets(label, &info.labels)
                    );
                    let breaks = matches!(&pending, Pending::Break(label) if match label {
                        None => info.is_loop,
                        Some(label) => info.labels.contains(label),
                    });

                    if continues {
                        let (depths, target) = (frame.depths, info.continue_target);
                        self.control.push(ControlFrame::Loop(frame));
                        self.restore(interp, depths);
                        self.ip = target;
                        return Ok(Flow::Continue);
                    }
                    if breaks {
                        self.restore(interp, frame.depths);
                        if let Some(record) = &frame.iterator {
                            if let Err(err) = interp.iterator_close(record) {
                                pending = Pending::Throw(err);
                                continue;
                            }
                        }
                        self.ip = info.break_target;
                        return Ok(Flow::Continue);
                    }
                    if let Some(record) = &frame.iterator {
                        // An exception already in flight wins over one from return()
                        if let Err(err) = interp.iterator_close(record) {
                            if !matches!(pending, Pending::Throw(_)) {
                                pending = Pending::Throw(err);
                            }
                        }
                    }
                }
            }
        }

        match pending {
            Pending::Throw(err) => Err(err),
            Pending::Return(value) => Ok(Flow::Exit(Exit::Complete(value))),
            Pending::Break(_) => Err(JsError::syntax_error("Illegal break statement")),
            Pending::Continue(_) => Err(JsError::syntax_error("Illegal continue statement")),
            Pending::Normal => Err(JsError::internal_error("normal completion unwound")),
        }
    }

    /// Forward a resumption to the active `yield*` delegate
    fn delegate_step(&mut self, interp: &mut Interpreter, resumption: Resumption) -> Step {
        let Some(record) = self.delegate.clone() else {
            return Step::Next;
        };
        let returning = matches!(resumption, Resumption::Return(_));
        let iterator = record.iterator.cheap_clone();

        let result = match resumption {
            Resumption::Next(value) => {
                interp.call_function(record.next.clone(), iterator, &[value])
            }
            Resumption::Throw(err) if !err.is_catchable() => Err(err),
            Resumption::Throw(err) => match interp.get_method(&iterator, "throw") {
                Ok(Some(throw)) => {
                    let value = interp.error_to_value(err);
                    interp.call_function(throw, iterator, &[value])
                }
                Ok(None) => {
                    self.delegate = None;
                    let err = match interp.iterator_close(&record) {
                        Ok(()) => {
                            JsError::type_error("The iterator does not provide a 'throw' method")
                        }
                        Err(close_err) => close_err,
                    };
                    return Step::Abrupt(Pending::Throw(err));
                }
                Err(err) => Err(err),
            },
            Resumption::Return(value) => match interp.get_method(&iterator, "return") {
                Ok(Some(ret)) => interp.call_function(ret, iterator, &[value]),
                Ok(None) => {
                    self.delegate = None;
                    return Step::Abrupt(Pending::Return(value));
                }
                Err(err) => Err(err),
            },
        };

        match result.and_then(|r| interp.iter_result_parts(&r)) {
            Err(err) => {
                self.delegate = None;
                Step::Abrupt(Pending::Throw(err))
            }
            Ok((true, value)) => {
                self.delegate = None;
                if returning {
                    Step::Abrupt(Pending::Return(value))
                } else {
                    self.stack.push(value);
                    Step::Next
                }
            }
            Ok((false, value)) => Step::Exit(Exit::Yield(value)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Starting coroutines
// ═══════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// Call a generator function: bind its arguments and return a suspended
    /// generator object without running any of the body
    pub(crate) fn start_generator(
        &mut self,
        func: &InterpretedFunction,
        this_value: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let plan = compiler::plan_for(&func.node)?;
        let env = self.prepare_call_env(func, this_value, args)?;
        let coroutine = Coroutine::new(plan, env, CoroutineKind::Generator);
        let generator = self.create_exotic(
            ExoticObject::Generator(Rc::new(RefCell::new(coroutine))),
            &self.generator_prototype,
        );
        Ok(JsValue::Object(generator))
    }

    /// Call an async function: run the body up to its first `await` and
    /// return the promise of its result
    pub(crate) fn start_async(
        &mut self,
        func: &InterpretedFunction,
        this_value: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let promise = self.create_promise();
        let setup = compiler::plan_for(&func.node).and_then(|plan| {
            let env = self.prepare_call_env(func, this_value, args)?;
            Ok(Coroutine::new(
                plan,
                env,
                CoroutineKind::Async {
                    promise: promise.cheap_clone(),
                },
            ))
        });
        match setup {
            Ok(coroutine) => self.resume_async(
                &Rc::new(RefCell::new(coroutine)),
                Resumption::Next(JsValue::Undefined),
            )?,
            Err(err) if err.is_catchable() => {
                let reason = self.error_to_value(err);
                self.reject_promise(&promise, reason);
            }
            Err(err) => return Err(err),
        }
        Ok(JsValue::Object(promise))
    }

    /// Continue an async body and settle its promise once it completes
    pub(crate) fn resume_async(
        &mut self,
        coroutine: &Rc<RefCell<Coroutine>>,
        resumption: Resumption,
    ) -> Result<(), JsError> {
        let Some(promise) = coroutine.borrow().async_promise() else {
            return Err(JsError::internal_error("not an async coroutine"));
        };
        match Coroutine::resume(coroutine, self, resumption) {
            Ok(Exit::Await(value)) => self.await_value(coroutine, value),
            Ok(Exit::Complete(value)) => self.resolve_promise(&promise, value),
            Ok(Exit::Yield(_)) => Err(JsError::internal_error("yield in async function body")),
            Err(err) if err.is_catchable() => {
                let reason = self.error_to_value(err);
                self.reject_promise(&promise, reason);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Subscribe a suspended async body to the settlement of `value`
    fn await_value(
        &mut self,
        coroutine: &Rc<RefCell<Coroutine>>,
        value: JsValue,
    ) -> Result<(), JsError> {
        let promise = self.promise_resolve(value)?;
        self.perform_then(
            &promise,
            ReactionHandler::AsyncResume(coroutine.cheap_clone()),
            ReactionHandler::AsyncResume(coroutine.cheap_clone()),
            None,
        );
        Ok(())
    }
}
