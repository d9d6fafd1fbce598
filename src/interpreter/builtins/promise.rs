//! Promise built-in and the promise resolution procedure

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::interpreter::scheduler::Microtask;
use crate::value::{
    CheapClone, ExoticObject, JsObjectRef, JsValue, PromiseReaction, PromiseState, PromiseStatus,
    ReactionHandler,
};

use super::link_constructor;

/// Initialize Promise.prototype and the global `Promise` constructor
pub fn init_promise(interp: &mut Interpreter) {
    let proto = interp.promise_prototype.clone();
    interp.register_method(&proto, "then", promise_then, 2);
    interp.register_method(&proto, "catch", promise_catch, 1);
    interp.register_method(&proto, "finally", promise_finally, 1);

    let ctor = interp.create_native_function("Promise", promise_constructor, 1);
    interp.register_method(&ctor, "resolve", promise_resolve_static, 1);
    interp.register_method(&ctor, "reject", promise_reject_static, 1);
    link_constructor(&ctor, &proto);
    interp.define_global("Promise", JsValue::Object(ctor));
}

/// Shared state of a promise object
fn promise_state(obj: &JsObjectRef) -> Option<Rc<RefCell<PromiseState>>> {
    match &obj.borrow().exotic {
        ExoticObject::Promise(state) => Some(state.cheap_clone()),
        _ => None,
    }
}

fn this_promise(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match this {
        JsValue::Object(obj) if promise_state(obj).is_some() => Ok(obj.cheap_clone()),
        _ => Err(JsError::type_error(format!(
            "Method Promise.prototype.{} called on incompatible receiver {}",
            method,
            this.to_js_string()
        ))),
    }
}

impl Interpreter {
    /// Create a new pending promise
    pub fn create_promise(&self) -> JsObjectRef {
        self.create_exotic(
            ExoticObject::Promise(Rc::new(RefCell::new(PromiseState::default()))),
            &self.promise_prototype,
        )
    }

    /// Settlement state of a promise value, `None` for non-promises
    pub fn promise_status(&self, value: &JsValue) -> Option<PromiseStatus> {
        let JsValue::Object(obj) = value else {
            return None;
        };
        promise_state(obj).map(|state| state.borrow().status.clone())
    }

    /// Promise resolution procedure: adopt thenables, reject self-resolution,
    /// fulfill with anything else
    pub fn resolve_promise(
        &mut self,
        promise: &JsObjectRef,
        value: JsValue,
    ) -> Result<(), JsError> {
        if let JsValue::Object(obj) = &value {
            if Rc::ptr_eq(obj, promise) {
                let reason = self.create_error("TypeError", "Chaining cycle detected for promise");
                self.reject_promise(promise, reason);
                return Ok(());
            }
            let then = match self.get_named(&value, "then") {
                Ok(then) => then,
                Err(err) if err.is_catchable() => {
                    let reason = self.error_to_value(err);
                    self.reject_promise(promise, reason);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            if then.is_callable() {
                self.enqueue_microtask(Microtask::ResolveThenable {
                    promise: promise.cheap_clone(),
                    thenable: value,
                    then,
                });
                return Ok(());
            }
        }
        self.fulfill_promise(promise, value);
        Ok(())
    }

    /// Move a pending promise to Fulfilled; a no-op once settled
    pub fn fulfill_promise(&mut self, promise: &JsObjectRef, value: JsValue) {
        self.settle_promise(promise, PromiseStatus::Fulfilled(value));
    }

    /// Move a pending promise to Rejected; a no-op once settled
    pub fn reject_promise(&mut self, promise: &JsObjectRef, reason: JsValue) {
        self.settle_promise(promise, PromiseStatus::Rejected(reason));
    }

    fn settle_promise(&mut self, promise: &JsObjectRef, status: PromiseStatus) {
        let Some(state) = promise_state(promise) else {
            return;
        };
        let (reactions, handled) = {
            let mut s = state.borrow_mut();
            if !matches!(s.status, PromiseStatus::Pending) {
                return;
            }
            s.status = status.clone();
            (std::mem::take(&mut s.reactions), s.handled)
        };

        let (argument, fulfilled) = match status {
            PromiseStatus::Fulfilled(value) => (value, true),
            PromiseStatus::Rejected(reason) => {
                if !handled {
                    self.scheduler.track_rejection(promise.cheap_clone());
                }
                (reason, false)
            }
            PromiseStatus::Pending => return,
        };
        for reaction in reactions {
            let handler = if fulfilled {
                reaction.on_fulfilled
            } else {
                reaction.on_rejected
            };
            self.enqueue_microtask(Microtask::Reaction {
                handler,
                downstream: reaction.downstream,
                argument: argument.clone(),
                fulfilled,
            });
        }
    }

    /// Register a reaction; if the promise already settled its job is queued
    /// right away
    pub fn perform_then(
        &mut self,
        promise: &JsObjectRef,
        on_fulfilled: ReactionHandler,
        on_rejected: ReactionHandler,
        downstream: Option<JsObjectRef>,
    ) {
        let Some(state) = promise_state(promise) else {
            return;
        };
        let status = {
            let mut s = state.borrow_mut();
            s.handled = true;
            s.status.clone()
        };
        let (handler, argument, fulfilled) = match status {
            PromiseStatus::Pending => {
                state.borrow_mut().reactions.push(PromiseReaction {
                    on_fulfilled,
                    on_rejected,
                    downstream,
                });
                return;
            }
            PromiseStatus::Fulfilled(value) => (on_fulfilled, value, true),
            PromiseStatus::Rejected(reason) => (on_rejected, reason, false),
        };
        self.enqueue_microtask(Microtask::Reaction {
            handler,
            downstream,
            argument,
            fulfilled,
        });
    }

    /// `resolve`/`reject` functions sharing one "already resolved" flag
    pub fn create_resolving_functions(&self, promise: &JsObjectRef) -> (JsObjectRef, JsObjectRef) {
        let already_resolved = Rc::new(Cell::new(false));

        let resolve = {
            let promise = promise.cheap_clone();
            let already_resolved = already_resolved.cheap_clone();
            self.create_native_function(
                "",
                move |interp, _this, args| {
                    if !already_resolved.replace(true) {
                        let value = args.first().cloned().unwrap_or_default();
                        interp.resolve_promise(&promise, value)?;
                    }
                    Ok(JsValue::Undefined)
                },
                1,
            )
        };
        let reject = {
            let promise = promise.cheap_clone();
            self.create_native_function(
                "",
                move |interp, _this, args| {
                    if !already_resolved.replace(true) {
                        let reason = args.first().cloned().unwrap_or_default();
                        interp.reject_promise(&promise, reason);
                    }
                    Ok(JsValue::Undefined)
                },
                1,
            )
        };
        (resolve, reject)
    }

    /// `Promise.resolve(value)`: native promises are returned unchanged
    pub fn promise_resolve(&mut self, value: JsValue) -> Result<JsObjectRef, JsError> {
        if let JsValue::Object(obj) = &value {
            if promise_state(obj).is_some() {
                return Ok(obj.cheap_clone());
            }
        }
        let promise = self.create_promise();
        self.resolve_promise(&promise, value)?;
        Ok(promise)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Script surface
// ═══════════════════════════════════════════════════════════════════════════

pub fn promise_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let executor = args.first().cloned().unwrap_or_default();
    if !executor.is_callable() {
        return Err(JsError::type_error(format!(
            "Promise resolver {} is not a function",
            executor.to_js_string()
        )));
    }

    let promise = interp.create_promise();
    let (resolve, reject) = interp.create_resolving_functions(&promise);
    let result = interp.call_function(
        executor,
        JsValue::Undefined,
        &[JsValue::Object(resolve), JsValue::Object(reject.cheap_clone())],
    );
    match result {
        Ok(_) => {}
        Err(err) if err.is_catchable() => {
            let reason = interp.error_to_value(err);
            interp.call_function(JsValue::Object(reject), JsValue::Undefined, &[reason])?;
        }
        Err(err) => return Err(err),
    }
    Ok(JsValue::Object(promise))
}

pub fn promise_then(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let promise = this_promise(&this, "then")?;
    let downstream = interp.create_promise();
    interp.perform_then(
        &promise,
        ReactionHandler::from_argument(args.first()),
        ReactionHandler::from_argument(args.get(1)),
        Some(downstream.cheap_clone()),
    );
    Ok(JsValue::Object(downstream))
}

pub fn promise_catch(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let on_rejected = args.first().cloned().unwrap_or_default();
    promise_then(interp, this, &[JsValue::Undefined, on_rejected])
}

/// `finally(onFinally)`: run the callback on either outcome, wait for the
/// promise it returns, then pass the original outcome through
pub fn promise_finally(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let on_finally = args.first().cloned().unwrap_or_default();
    if !on_finally.is_callable() {
        return promise_then(interp, this, &[on_finally.clone(), on_finally]);
    }

    let then_finally = {
        let on_finally = on_finally.clone();
        interp.create_native_function(
            "",
            move |interp, _this, args| {
                let value = args.first().cloned().unwrap_or_default();
                finally_step(interp, &on_finally, move |_, _, _| Ok(value.clone()))
            },
            1,
        )
    };
    let catch_finally = interp.create_native_function(
        "",
        move |interp, _this, args| {
            let reason = args.first().cloned().unwrap_or_default();
            finally_step(interp, &on_finally, move |_, _, _| {
                Err(JsError::thrown(reason.clone()))
            })
        },
        1,
    );
    promise_then(
        interp,
        this,
        &[JsValue::Object(then_finally), JsValue::Object(catch_finally)],
    )
}

/// Call `on_finally`, then settle with `outcome` once its result settles
fn finally_step<F>(
    interp: &mut Interpreter,
    on_finally: &JsValue,
    outcome: F,
) -> Result<JsValue, JsError>
where
    F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
{
    let result = interp.call_function(on_finally.clone(), JsValue::Undefined, &[])?;
    let waited = interp.promise_resolve(result)?;
    let outcome = interp.create_native_function("", outcome, 0);
    let downstream = interp.create_promise();
    interp.perform_then(
        &waited,
        ReactionHandler::Callback(JsValue::Object(outcome)),
        ReactionHandler::Passthrough,
        Some(downstream.cheap_clone()),
    );
    Ok(JsValue::Object(downstream))
}

pub fn promise_resolve_static(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = args.first().cloned().unwrap_or_default();
    Ok(JsValue::Object(interp.promise_resolve(value)?))
}

pub fn promise_reject_static(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let promise = interp.create_promise();
    interp.reject_promise(&promise, args.first().cloned().unwrap_or_default());
    Ok(JsValue::Object(promise))
}
