//! Error constructor built-in methods

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{JsObjectRef, JsString, JsValue, Property, PropertyKey};

use super::link_constructor;

/// Error kinds engine failures materialize as, besides plain `Error`
const DERIVED_KINDS: [&str; 4] = ["TypeError", "RangeError", "ReferenceError", "SyntaxError"];

/// Initialize Error and all derived error constructors and add them to globals
pub fn init_error(interp: &mut Interpreter) {
    let error_proto = interp.error_prototype.clone();
    set_name_and_message(&error_proto, "Error");
    interp.register_method(&error_proto, "toString", error_to_string, 0);
    define_error_constructor(interp, "Error", &error_proto);

    for kind in DERIVED_KINDS {
        let proto = interp.create_object_with_prototype(&error_proto);
        set_name_and_message(&proto, kind);
        define_error_constructor(interp, kind, &proto);
        interp.error_prototypes.insert(kind, proto);
    }
}

fn set_name_and_message(proto: &JsObjectRef, name: &str) {
    let mut p = proto.borrow_mut();
    p.define_property(PropertyKey::from("name"), Property::hidden(JsValue::from(name)));
    p.define_property(PropertyKey::from("message"), Property::hidden(JsValue::from("")));
}

fn define_error_constructor(interp: &mut Interpreter, kind: &'static str, proto: &JsObjectRef) {
    let ctor = interp.create_native_function(
        kind,
        move |interp: &mut Interpreter, _this: JsValue, args: &[JsValue]| {
            error_constructor(interp, kind, args)
        },
        1,
    );
    link_constructor(&ctor, proto);
    interp.define_global(kind, JsValue::Object(ctor));
}

/// `new Error(message)`; works the same without `new`
fn error_constructor(
    interp: &mut Interpreter,
    kind: &str,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let message = match args.first() {
        None | Some(JsValue::Undefined) => None,
        Some(value) => Some(interp.to_string_value(value)?),
    };
    let error = interp.create_error(kind, message.as_deref().unwrap_or(""));
    if message.is_none() {
        // Inherit the prototype's empty message instead of shadowing it
        if let JsValue::Object(obj) = &error {
            obj.borrow_mut()
                .properties
                .shift_remove(&PropertyKey::from("message"));
        }
    }
    Ok(error)
}

/// Error.prototype.toString: `name: message`, or whichever part is non-empty
pub fn error_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    if !matches!(this, JsValue::Object(_)) {
        return Err(JsError::type_error(
            "Error.prototype.toString called on non-object",
        ));
    }
    let name = match interp.get_named(&this, "name")? {
        JsValue::Undefined => JsString::from("Error"),
        value => interp.to_string_value(&value)?,
    };
    let message = match interp.get_named(&this, "message")? {
        JsValue::Undefined => JsString::from(""),
        value => interp.to_string_value(&value)?,
    };

    let text = match (name.is_empty(), message.is_empty()) {
        (true, _) => message.to_string(),
        (_, true) => name.to_string(),
        _ => format!("{}: {}", name, message),
    };
    Ok(JsValue::from(text))
}
