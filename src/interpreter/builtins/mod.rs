//! Built-in functions the runtime core depends on
//!
//! Every built-in is an ordinary host callable registered through
//! [`Interpreter::create_native_function`], the same path embedders use.

pub mod array;
pub mod error;
pub mod generator;
pub mod map;
pub mod promise;
pub mod symbol;
pub mod typed_array;

pub use array::*;
pub use error::*;
pub use generator::*;
pub use map::*;
pub use promise::*;
pub use symbol::*;
pub use typed_array::*;

use std::cell::Cell;
use std::rc::Rc;

use crate::error::JsError;
use crate::interpreter::{Interpreter, Microtask};
use crate::value::{CheapClone, ExoticObject, JsObjectRef, JsValue, Property, PropertyKey};

/// Install every built-in into a fresh realm
pub fn install(interp: &mut Interpreter) {
    interp.define_global("undefined", JsValue::Undefined);
    interp.define_global("NaN", JsValue::Number(f64::NAN));
    interp.define_global("Infinity", JsValue::Number(f64::INFINITY));

    let object_proto = interp.object_prototype.clone();
    interp.register_method(&object_proto, "toString", object_to_string, 0);
    let function_proto = interp.function_prototype.clone();
    interp.register_method(&function_proto, "toString", function_to_string, 0);

    let queue = interp.create_native_function("queueMicrotask", queue_microtask, 1);
    interp.define_global("queueMicrotask", JsValue::Object(queue));

    init_error(interp);
    init_symbol(interp);
    init_array_prototype(interp);
    init_generator_prototype(interp);
    init_map(interp);
    init_promise(interp);
    init_typed_arrays(interp);
}

/// Wire `ctor.prototype` and `proto.constructor`
pub(crate) fn link_constructor(ctor: &JsObjectRef, proto: &JsObjectRef) {
    ctor.borrow_mut().define_property(
        PropertyKey::from("prototype"),
        Property::data_readonly(JsValue::Object(proto.cheap_clone())),
    );
    proto.borrow_mut().define_property(
        PropertyKey::from("constructor"),
        Property::hidden(JsValue::Object(ctor.cheap_clone())),
    );
}

/// Iterator object whose `next` pulls values from `step` until it returns `None`.
///
/// Once exhausted the iterator stays done even if `step` would produce more.
pub(crate) fn create_native_iterator<F>(
    interp: &Interpreter,
    prototype: &JsObjectRef,
    step: F,
) -> JsValue
where
    F: Fn(&mut Interpreter) -> Result<Option<JsValue>, JsError> + 'static,
{
    let done = Rc::new(Cell::new(false));
    let next = interp.create_native_function(
        "next",
        move |interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]| {
            if !done.get() {
                if let Some(value) = step(interp)? {
                    return Ok(interp.create_iter_result(value, false));
                }
                done.set(true);
            }
            Ok(interp.create_iter_result(JsValue::Undefined, true))
        },
        0,
    );
    let iterator = interp.create_object_with_prototype(prototype);
    iterator
        .borrow_mut()
        .define_property(PropertyKey::from("next"), Property::hidden(JsValue::Object(next)));
    JsValue::Object(iterator)
}

/// queueMicrotask(callback)
pub fn queue_microtask(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let callback = args.first().cloned().unwrap_or_default();
    if !callback.is_callable() {
        return Err(JsError::type_error(
            "Failed to execute 'queueMicrotask': parameter 1 is not of type 'Function'",
        ));
    }
    interp.enqueue_microtask(Microtask::Callback {
        callback,
        args: Vec::new(),
    });
    Ok(JsValue::Undefined)
}

/// Object.prototype.toString: `[object Tag]`
pub fn object_to_string(
    _interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let tag = match &this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Symbol(_) => "Symbol",
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Array { .. } => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::Map(_) => "Map",
            ExoticObject::Generator(_) => "Generator",
            ExoticObject::Promise(_) => "Promise",
            ExoticObject::ArrayBuffer(_) => "ArrayBuffer",
            ExoticObject::TypedArray(view) => view.kind.name(),
            ExoticObject::Ordinary => "Object",
        },
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

/// Function.prototype.toString; bodies are not retained as source text
pub fn function_to_string(
    _interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let name = match &this {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Function(func) => func.name().to_string(),
            _ => {
                return Err(JsError::type_error(
                    "Function.prototype.toString requires that 'this' be a Function",
                ));
            }
        },
        _ => {
            return Err(JsError::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ));
        }
    };
    Ok(JsValue::from(format!("function {}() {{ [native code] }}", name)))
}
