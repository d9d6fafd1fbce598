//! Array built-in methods
//!
//! The methods read `length` and indices through ordinary property access, so
//! they work on any array-like receiver, typed arrays included.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{ExoticObject, JsString, JsSymbol, JsValue, PropertyKey};

use super::{create_native_iterator, link_constructor};

/// Initialize Array.prototype.
/// The prototype object must already exist in `interp.array_prototype`.
pub fn init_array_prototype(interp: &mut Interpreter) {
    let proto = interp.array_prototype.clone();

    interp.register_method(&proto, "push", array_push, 1);
    interp.register_method(&proto, "join", array_join, 1);
    interp.register_method(&proto, "toString", array_to_string, 0);

    interp.register_method(&proto, "forEach", array_foreach, 1);
    interp.register_method(&proto, "map", array_map, 1);

    interp.register_method(&proto, "values", array_values, 0);
    interp.register_symbol_method(&proto, JsSymbol::iterator(), "values", array_values, 0);

    let ctor = interp.create_native_function("Array", array_constructor, 0);
    interp.register_method(&ctor, "isArray", array_is_array, 1);
    link_constructor(&ctor, &proto);
    interp.define_global("Array", JsValue::Object(ctor));
}

/// `length` of an array-like receiver
pub(crate) fn length_of(
    interp: &mut Interpreter,
    this: &JsValue,
    method: &str,
) -> Result<u32, JsError> {
    if this.is_null_or_undefined() {
        return Err(JsError::type_error(format!(
            "Array.prototype.{} called on null or undefined",
            method
        )));
    }
    let length = interp.get_named(this, "length")?;
    let n = interp.to_number_value(&length)?;
    if n.is_nan() || n <= 0.0 {
        return Ok(0);
    }
    Ok(n.min(u32::MAX as f64) as u32)
}

fn require_callable(callback: &JsValue) -> Result<(), JsError> {
    if callback.is_callable() {
        Ok(())
    } else {
        Err(JsError::type_error(format!(
            "{} is not a function",
            crate::interpreter::describe_value(callback)
        )))
    }
}

/// Array(...items), or Array(n) for an empty array of length n
pub fn array_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    if let [JsValue::Number(n)] = args {
        let n = *n;
        if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
            return Err(JsError::range_error("Invalid array length"));
        }
        let array = JsValue::Object(interp.create_array(Vec::new()));
        interp.put_property(&array, PropertyKey::from("length"), JsValue::Number(n))?;
        return Ok(array);
    }
    Ok(JsValue::Object(interp.create_array(args.to_vec())))
}

pub fn array_is_array(
    _interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let is_array = match args.first() {
        Some(JsValue::Object(obj)) => matches!(obj.borrow().exotic, ExoticObject::Array { .. }),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

pub fn array_push(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut length = length_of(interp, &this, "push")?;
    if u64::from(length) + args.len() as u64 > u64::from(u32::MAX) {
        return Err(JsError::type_error(format!(
            "Pushing {} elements on an array-like of length {} is disallowed",
            args.len(),
            length
        )));
    }
    for arg in args {
        interp.put_property(&this, PropertyKey::Index(length), arg.clone())?;
        length += 1;
    }
    // Arrays track their own length; other array-likes need it written back
    let is_array = matches!(
        &this,
        JsValue::Object(obj) if matches!(obj.borrow().exotic, ExoticObject::Array { .. })
    );
    if !is_array {
        interp.put_property(
            &this,
            PropertyKey::from("length"),
            JsValue::Number(length as f64),
        )?;
    }
    Ok(JsValue::Number(length as f64))
}

pub fn array_join(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let separator = match args.first() {
        None | Some(JsValue::Undefined) => JsString::from(","),
        Some(sep) => interp.to_string_value(sep)?,
    };
    let length = length_of(interp, &this, "join")?;

    let mut out = String::new();
    for i in 0..length {
        if i > 0 {
            out.push_str(&separator);
        }
        let elem = interp.get_property(&this, &PropertyKey::Index(i))?;
        if !elem.is_null_or_undefined() {
            out.push_str(&interp.to_string_value(&elem)?);
        }
    }
    Ok(JsValue::String(JsString::from(out)))
}

pub fn array_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    array_join(interp, this, &[])
}

/// forEach(callback(element, index, array), thisArg)
pub fn array_foreach(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let length = length_of(interp, &this, "forEach")?;
    let callback = args.first().cloned().unwrap_or_default();
    require_callable(&callback)?;
    let this_arg = args.get(1).cloned().unwrap_or_default();

    for i in 0..length {
        let elem = interp.get_property(&this, &PropertyKey::Index(i))?;
        interp.call_function(
            callback.clone(),
            this_arg.clone(),
            &[elem, JsValue::Number(i as f64), this.clone()],
        )?;
    }
    Ok(JsValue::Undefined)
}

/// map(callback(element, index, array), thisArg) into a new array
pub fn array_map(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let length = length_of(interp, &this, "map")?;
    let callback = args.first().cloned().unwrap_or_default();
    require_callable(&callback)?;
    let this_arg = args.get(1).cloned().unwrap_or_default();

    let mut results = Vec::with_capacity(length as usize);
    for i in 0..length {
        let elem = interp.get_property(&this, &PropertyKey::Index(i))?;
        results.push(interp.call_function(
            callback.clone(),
            this_arg.clone(),
            &[elem, JsValue::Number(i as f64), this.clone()],
        )?);
    }
    Ok(JsValue::Object(interp.create_array(results)))
}

/// values() / [Symbol.iterator](): elements by index until `length` is reached.
///
/// `length` is re-read on every step, so elements pushed during iteration
/// are visited.
pub fn array_values(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    length_of(interp, &this, "values")?;
    let cursor = Rc::new(Cell::new(0u32));
    let proto = interp.array_iterator_prototype.clone();
    Ok(create_native_iterator(interp, &proto, move |interp| {
        let index = cursor.get();
        if index >= length_of(interp, &this, "values")? {
            return Ok(None);
        }
        cursor.set(index + 1);
        interp.get_property(&this, &PropertyKey::Index(index)).map(Some)
    }))
}
