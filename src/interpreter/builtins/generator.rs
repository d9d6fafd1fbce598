//! Generator.prototype and the shared iterator prototype

use crate::error::JsError;
use crate::interpreter::{Coroutine, Exit, Interpreter, Resumption};
use crate::value::{ExoticObject, JsSymbol, JsValue};

/// Initialize Generator.prototype with next, throw, return and
/// `%IteratorPrototype%[Symbol.iterator]`
pub fn init_generator_prototype(interp: &mut Interpreter) {
    let iterator_proto = interp.iterator_prototype.clone();
    interp.register_symbol_method(
        &iterator_proto,
        JsSymbol::iterator(),
        "[Symbol.iterator]",
        iterator_self,
        0,
    );

    let proto = interp.generator_prototype.clone();
    interp.register_method(&proto, "next", generator_next, 1);
    interp.register_method(&proto, "throw", generator_throw, 1);
    interp.register_method(&proto, "return", generator_return, 1);
}

/// Iterators are their own iterables
fn iterator_self(
    _interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(this)
}

pub fn generator_next(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = args.first().cloned().unwrap_or_default();
    generator_resume(interp, &this, Resumption::Next(value), "next")
}

pub fn generator_throw(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = args.first().cloned().unwrap_or_default();
    generator_resume(interp, &this, Resumption::Throw(JsError::thrown(value)), "throw")
}

pub fn generator_return(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = args.first().cloned().unwrap_or_default();
    generator_resume(interp, &this, Resumption::Return(value), "return")
}

fn generator_resume(
    interp: &mut Interpreter,
    this: &JsValue,
    resumption: Resumption,
    method: &str,
) -> Result<JsValue, JsError> {
    let coroutine = match this {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Generator(coroutine) => Some(coroutine.clone()),
            _ => None,
        },
        _ => None,
    };
    let Some(coroutine) = coroutine else {
        return Err(JsError::type_error(format!(
            "{} method called on incompatible receiver {}",
            method,
            this.to_js_string()
        )));
    };

    match Coroutine::resume(&coroutine, interp, resumption)? {
        Exit::Yield(value) => Ok(interp.create_iter_result(value, false)),
        Exit::Complete(value) => Ok(interp.create_iter_result(value, true)),
        Exit::Await(_) => Err(JsError::internal_error("await in generator body")),
    }
}
