//! Statement completion records
//!
//! Non-local exits travel as the `Ok` payload of statement execution. User
//! exceptions only ever use the `Err` path, so a `try/catch` can never swallow
//! a `break`, `continue` or `return`.

use crate::value::{JsString, JsValue};

/// Outcome of executing a statement
#[derive(Debug, Clone)]
pub enum Completion {
    Normal(JsValue),
    Return(JsValue),
    Break(Option<JsString>),
    Continue(Option<JsString>),
}

/// What a loop does with its body's completion
#[derive(Debug)]
pub enum LoopControl {
    /// Run the next iteration
    Next,
    /// Leave the loop normally
    Exit,
    /// Hand the completion to the enclosing construct
    Propagate(Completion),
}

/// Whether a break/continue target applies to a statement carrying `labels`.
/// Unlabeled signals target the innermost loop.
pub fn targets(label: &Option<JsString>, labels: &[JsString]) -> bool {
    match label {
        None => true,
        Some(label) => labels.contains(label),
    }
}

impl Completion {
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }

    /// Interpret a loop body's completion for a loop labeled with `labels`
    pub fn into_loop_control(self, labels: &[JsString]) -> LoopControl {
        match self {
            Completion::Normal(_) => LoopControl::Next,
            Completion::Continue(ref label) if targets(label, labels) => LoopControl::Next,
            Completion::Break(ref label) if targets(label, labels) => LoopControl::Exit,
            other => LoopControl::Propagate(other),
        }
    }
}
