//! ArrayBuffer and the integer typed-array constructors

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{
    CheapClone, ExoticObject, JsObjectRef, JsSymbol, JsValue, Property, PropertyKey,
    TypedArrayKind, TypedArrayView, new_byte_buffer,
};

use super::array::{array_foreach, array_join, array_map, array_values, length_of};
use super::link_constructor;

/// Initialize `ArrayBuffer` and one constructor per [`TypedArrayKind`].
///
/// Every kind's prototype inherits from one shared prototype carrying the
/// iteration helpers.
pub fn init_typed_arrays(interp: &mut Interpreter) {
    let buffer_proto = interp.array_buffer_prototype.clone();
    let buffer_ctor = interp.create_native_function("ArrayBuffer", array_buffer_constructor, 1);
    link_constructor(&buffer_ctor, &buffer_proto);
    interp.define_global("ArrayBuffer", JsValue::Object(buffer_ctor));

    let shared = interp.create_object();
    interp.register_method(&shared, "forEach", array_foreach, 1);
    interp.register_method(&shared, "map", array_map, 1);
    interp.register_method(&shared, "join", array_join, 1);
    interp.register_method(&shared, "values", array_values, 0);
    interp.register_symbol_method(&shared, JsSymbol::iterator(), "values", array_values, 0);
    interp.register_getter(&shared, "buffer", typed_array_buffer);

    for kind in TypedArrayKind::ALL {
        let proto = interp.create_object_with_prototype(&shared);
        let ctor = interp.create_native_function(
            kind.name(),
            move |interp: &mut Interpreter, _this: JsValue, args: &[JsValue]| {
                typed_array_constructor(interp, kind, args)
            },
            3,
        );
        let bytes_per_element = JsValue::Number(kind.element_size() as f64);
        for target in [&ctor, &proto] {
            target.borrow_mut().define_property(
                PropertyKey::from("BYTES_PER_ELEMENT"),
                Property::data_readonly(bytes_per_element.clone()),
            );
        }
        link_constructor(&ctor, &proto);
        interp.typed_array_prototypes.insert(kind, proto);
        interp.define_global(kind.name(), JsValue::Object(ctor));
    }
}

/// ToIndex: a non-negative integer no larger than 2^53 - 1
fn to_index(interp: &mut Interpreter, value: &JsValue, what: &str) -> Result<usize, JsError> {
    if matches!(value, JsValue::Undefined) {
        return Ok(0);
    }
    let n = interp.to_number_value(value)?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if !(0.0..=9_007_199_254_740_991.0).contains(&n) {
        return Err(JsError::range_error(format!("Invalid {}: {}", what, n)));
    }
    Ok(n as usize)
}

pub fn array_buffer_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let byte_length = to_index(
        interp,
        &args.first().cloned().unwrap_or_default(),
        "array buffer length",
    )?;
    let buffer = new_byte_buffer(byte_length);
    let proto = interp.array_buffer_prototype.clone();
    Ok(JsValue::Object(interp.create_exotic(ExoticObject::ArrayBuffer(buffer), &proto)))
}

/// `new Kind(length)`, `new Kind(arrayLike)` or
/// `new Kind(buffer, byteOffset?, length?)`
fn typed_array_constructor(
    interp: &mut Interpreter,
    kind: TypedArrayKind,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let first = args.first().cloned().unwrap_or_default();
    let buffer = match &first {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::ArrayBuffer(buffer) => Some(buffer.cheap_clone()),
            _ => None,
        },
        _ => None,
    };

    let view = match (&first, buffer) {
        (_, Some(buffer)) => {
            let offset = to_index(
                interp,
                &args.get(1).cloned().unwrap_or_default(),
                "typed array offset",
            )?;
            let length = match args.get(2) {
                None | Some(JsValue::Undefined) => None,
                Some(value) => Some(to_index(interp, value, "typed array length")?),
            };
            TypedArrayView::new(kind, buffer, offset, length)?
        }
        (JsValue::Object(_), None) => {
            let length = length_of(interp, &first, "from")? as usize;
            let view = TypedArrayView::with_length(kind, length)?;
            for index in 0..length {
                let element = interp.get_property(&first, &PropertyKey::from(index as u32))?;
                let n = interp.to_number_value(&element)?;
                view.set(index, n)?;
            }
            view
        }
        (other, None) => {
            let length = to_index(interp, other, "typed array length")?;
            TypedArrayView::with_length(kind, length)?
        }
    };

    let proto = typed_array_prototype(interp, kind)?;
    Ok(JsValue::Object(interp.create_exotic(ExoticObject::TypedArray(view), &proto)))
}

fn typed_array_prototype(
    interp: &Interpreter,
    kind: TypedArrayKind,
) -> Result<JsObjectRef, JsError> {
    interp
        .typed_array_prototypes
        .get(&kind)
        .cloned()
        .ok_or_else(|| JsError::internal_error(format!("{} is not initialized", kind.name())))
}

/// `view.buffer`: an ArrayBuffer over the view's storage.
///
/// The wrapper is created on each read, so two reads are different objects
/// sharing the same bytes.
pub fn typed_array_buffer(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let buffer = match &this {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::TypedArray(view) => Some(view.buffer.cheap_clone()),
            _ => None,
        },
        _ => None,
    };
    let Some(buffer) = buffer else {
        return Err(JsError::type_error("Receiver is not a typed array"));
    };
    let proto = interp.array_buffer_prototype.clone();
    Ok(JsValue::Object(interp.create_exotic(ExoticObject::ArrayBuffer(buffer), &proto)))
}
