//! Microtask queue
//!
//! Promise reactions, thenable resolution, async-function resumption and
//! `queueMicrotask` callbacks all run from one FIFO queue. Nothing here runs
//! inline with the code that enqueues it: tasks only execute when the host
//! drains the queue with [`Interpreter::run_microtasks`].

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::error::JsError;
use crate::value::{ExoticObject, JsObjectRef, JsValue, PromiseStatus, ReactionHandler};

use super::coroutine::Resumption;
use super::Interpreter;

/// Host work queued alongside script tasks
pub type HostTask = Box<dyn FnOnce(&mut Interpreter) -> Result<(), JsError>>;

/// A deferred unit of work
pub enum Microtask {
    /// Deliver a settled value to one reaction handler
    Reaction {
        handler: ReactionHandler,
        downstream: Option<JsObjectRef>,
        argument: JsValue,
        /// Whether the source promise was fulfilled (otherwise rejected)
        fulfilled: bool,
    },
    /// Resolve `promise` by subscribing to a thenable's `then`
    ResolveThenable {
        promise: JsObjectRef,
        thenable: JsValue,
        then: JsValue,
    },
    /// A callback from `queueMicrotask`
    Callback { callback: JsValue, args: Vec<JsValue> },
    Host(HostTask),
}

impl fmt::Debug for Microtask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Microtask::Reaction { fulfilled, .. } => {
                write!(f, "Reaction({})", if *fulfilled { "fulfilled" } else { "rejected" })
            }
            Microtask::ResolveThenable { .. } => write!(f, "ResolveThenable"),
            Microtask::Callback { args, .. } => write!(f, "Callback({} args)", args.len()),
            Microtask::Host(_) => write!(f, "Host"),
        }
    }
}

#[derive(Default)]
pub struct Scheduler {
    queue: VecDeque<Microtask>,
    /// Promises rejected while nothing was subscribed to them
    unhandled: Vec<JsObjectRef>,
}

impl Scheduler {
    pub fn enqueue(&mut self, task: Microtask) {
        self.queue.push_back(task);
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn dequeue(&mut self) -> Option<Microtask> {
        self.queue.pop_front()
    }

    pub(crate) fn track_rejection(&mut self, promise: JsObjectRef) {
        self.unhandled.push(promise);
    }

    /// Rejected promises that still have no handler
    fn take_unhandled(&mut self) -> Vec<JsObjectRef> {
        std::mem::take(&mut self.unhandled)
            .into_iter()
            .filter(|promise| match &promise.borrow().exotic {
                ExoticObject::Promise(state) => !state.borrow().handled,
                _ => false,
            })
            .collect()
    }
}

impl Interpreter {
    pub fn enqueue_microtask(&mut self, task: Microtask) {
        self.scheduler.enqueue(task);
    }

    /// Number of microtasks waiting to run
    pub fn pending_microtasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Drain the microtask queue in FIFO order, including tasks enqueued while
    /// draining. Returns the number of tasks run.
    ///
    /// Exceeding the configured budget fails with RangeError and leaves the
    /// remaining tasks queued.
    pub fn run_microtasks(&mut self) -> Result<usize, JsError> {
        let budget = self.config.microtask_budget;
        let mut count = 0;
        while !self.scheduler.is_empty() {
            if budget.is_some_and(|limit| count >= limit) {
                return Err(JsError::range_error(format!(
                    "Microtask budget of {} exceeded",
                    count
                )));
            }
            let Some(task) = self.scheduler.dequeue() else {
                break;
            };
            trace!(task = ?task, "running microtask");
            self.run_microtask(task)?;
            count += 1;
        }

        if count > 0 {
            debug!(tasks = count, "drained microtask queue");
        }
        let unhandled = self.scheduler.take_unhandled();
        if self.config.warn_unhandled_rejections {
            for promise in unhandled {
                let reason = match &promise.borrow().exotic {
                    ExoticObject::Promise(state) => match &state.borrow().status {
                        PromiseStatus::Rejected(reason) => {
                            JsError::thrown(reason.clone()).message()
                        }
                        _ => continue,
                    },
                    _ => continue,
                };
                warn!(reason = %reason, "unhandled promise rejection");
            }
        }
        Ok(count)
    }

    fn run_microtask(&mut self, task: Microtask) -> Result<(), JsError> {
        match task {
            Microtask::Reaction {
                handler,
                downstream,
                argument,
                fulfilled,
            } => self.run_reaction(handler, downstream, argument, fulfilled),
            Microtask::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.create_resolving_functions(&promise);
                let args = [JsValue::Object(resolve), JsValue::Object(reject.clone())];
                match self.call_function(then, thenable, &args) {
                    Ok(_) => Ok(()),
                    Err(err) if err.is_catchable() => {
                        let reason = self.error_to_value(err);
                        self.call_function(JsValue::Object(reject), JsValue::Undefined, &[reason])?;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Microtask::Callback { callback, args } => {
                self.call_function(callback, JsValue::Undefined, &args)?;
                Ok(())
            }
            Microtask::Host(task) => task(self),
        }
    }

    fn run_reaction(
        &mut self,
        handler: ReactionHandler,
        downstream: Option<JsObjectRef>,
        argument: JsValue,
        fulfilled: bool,
    ) -> Result<(), JsError> {
        match handler {
            ReactionHandler::AsyncResume(coroutine) => {
                let resumption = if fulfilled {
                    Resumption::Next(argument)
                } else {
                    Resumption::Throw(JsError::thrown(argument))
                };
                self.resume_async(&coroutine, resumption)
            }
            ReactionHandler::Passthrough => {
                let Some(downstream) = downstream else {
                    return Ok(());
                };
                if fulfilled {
                    self.resolve_promise(&downstream, argument)
                } else {
                    self.reject_promise(&downstream, argument);
                    Ok(())
                }
            }
            ReactionHandler::Callback(callback) => {
                let result = self.call_function(callback, JsValue::Undefined, &[argument]);
                let Some(downstream) = downstream else {
                    return result.map(|_| ());
                };
                match result {
                    Ok(value) => self.resolve_promise(&downstream, value),
                    Err(err) if err.is_catchable() => {
                        let reason = self.error_to_value(err);
                        self.reject_promise(&downstream, reason);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}
