//! Interpreter for executing program trees
//!
//! The [`Interpreter`] owns the realm (global scope and built-in prototypes)
//! and the microtask scheduler.
//! Statement and expression evaluation lives in `eval`, suspendable bodies run
//! on the machine in [`coroutine`].

pub mod builtins;
pub mod completion;
pub mod coroutine;
pub mod environment;
mod eval;
pub mod iteration;
pub mod scheduler;

pub use completion::Completion;
pub use coroutine::{Coroutine, CoroutineKind, CoroutineStatus, Exit, Resumption};
pub use environment::{Binding, Environment};
pub use eval::BindingKind;
pub use iteration::IteratorRecord;
pub use scheduler::{Microtask, Scheduler};

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast;
use crate::config::RuntimeConfig;
use crate::error::JsError;
use crate::value::{
    CheapClone, ExoticObject, JsFunction, JsObject, JsObjectRef, JsString, JsSymbol, JsValue,
    MAX_PROTOTYPE_DEPTH, NativeFunction, Property, PropertyAccess, PropertyKey, PropertyLookup,
    PropertyWrite, TypedArrayKind,
};

/// Which conversion `to_primitive` tries first on objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// `valueOf` before `toString` (arithmetic, comparison, `+`)
    Default,
    /// `toString` before `valueOf` (string conversion, property keys)
    String,
}

/// The interpreter state
pub struct Interpreter {
    pub(crate) config: RuntimeConfig,

    /// Outermost scope, holding the built-in globals
    pub global_env: Environment,
    /// Scope of the code currently executing
    pub env: Environment,

    // Built-in prototypes
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    /// Shared parent of every built-in iterator; `[Symbol.iterator]()` returns `this`
    pub iterator_prototype: JsObjectRef,
    pub array_iterator_prototype: JsObjectRef,
    pub map_iterator_prototype: JsObjectRef,
    pub generator_prototype: JsObjectRef,
    pub promise_prototype: JsObjectRef,
    pub map_prototype: JsObjectRef,
    pub error_prototype: JsObjectRef,
    pub array_buffer_prototype: JsObjectRef,
    pub(crate) error_prototypes: FxHashMap<&'static str, JsObjectRef>,
    pub(crate) typed_array_prototypes: FxHashMap<TypedArrayKind, JsObjectRef>,

    pub(crate) scheduler: Scheduler,

    call_depth: usize,
    /// Stack address recorded when the outermost call was entered
    stack_origin: usize,
}

impl Interpreter {
    /// Create a new interpreter with the default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let object_prototype = crate::value::create_object();
        let derive = |proto: &JsObjectRef| -> JsObjectRef {
            Rc::new(RefCell::new(JsObject::with_prototype(proto.cheap_clone())))
        };
        let function_prototype = derive(&object_prototype);
        let array_prototype = derive(&object_prototype);
        let iterator_prototype = derive(&object_prototype);
        let array_iterator_prototype = derive(&iterator_prototype);
        let map_iterator_prototype = derive(&iterator_prototype);
        let generator_prototype = derive(&iterator_prototype);
        let promise_prototype = derive(&object_prototype);
        let map_prototype = derive(&object_prototype);
        let error_prototype = derive(&object_prototype);
        let array_buffer_prototype = derive(&object_prototype);

        let global_env = Environment::global();
        let mut interp = Self {
            config,
            env: global_env.cheap_clone(),
            global_env,
            object_prototype,
            function_prototype,
            array_prototype,
            iterator_prototype,
            array_iterator_prototype,
            map_iterator_prototype,
            generator_prototype,
            promise_prototype,
            map_prototype,
            error_prototype,
            array_buffer_prototype,
            error_prototypes: FxHashMap::default(),
            typed_array_prototypes: FxHashMap::default(),
            scheduler: Scheduler::default(),
            call_depth: 0,
            stack_origin: 0,
        };

        builtins::install(&mut interp);
        debug!(
            max_call_depth = interp.config.max_call_depth,
            "interpreter initialized"
        );
        interp
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Object creation
    // ═══════════════════════════════════════════════════════════════════════════

    /// Create a plain object with the proper prototype
    pub fn create_object(&self) -> JsObjectRef {
        self.create_object_with_prototype(&self.object_prototype)
    }

    pub fn create_object_with_prototype(&self, prototype: &JsObjectRef) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject::with_prototype(prototype.cheap_clone())))
    }

    /// Create an object with exotic behavior and the given prototype
    pub fn create_exotic(&self, exotic: ExoticObject, prototype: &JsObjectRef) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject {
            exotic,
            ..JsObject::with_prototype(prototype.cheap_clone())
        }))
    }

    /// Create an array with the proper prototype
    pub fn create_array(&self, elements: Vec<JsValue>) -> JsObjectRef {
        let length = elements.len() as u32;
        let mut obj = JsObject {
            exotic: ExoticObject::Array { length },
            ..JsObject::with_prototype(self.array_prototype.cheap_clone())
        };
        for (i, value) in elements.into_iter().enumerate() {
            obj.properties
                .insert(PropertyKey::Index(i as u32), Property::data(value));
        }
        Rc::new(RefCell::new(obj))
    }

    /// Create a function object with the proper prototype, `name` and `length`
    pub fn create_function(&self, func: JsFunction) -> JsObjectRef {
        let name = JsString::from(func.name());
        let arity = match &func {
            JsFunction::Native(native) => native.arity,
            JsFunction::Interpreted(interpreted) => interpreted
                .node
                .params
                .iter()
                .take_while(|p| {
                    !matches!(p, ast::Pattern::Assignment(..) | ast::Pattern::Rest(_))
                })
                .count(),
        };
        let obj = self.create_exotic(ExoticObject::Function(func), &self.function_prototype);
        {
            let mut o = obj.borrow_mut();
            o.define_property(
                PropertyKey::from("name"),
                Property::data_readonly(JsValue::String(name)),
            );
            o.define_property(
                PropertyKey::from("length"),
                Property::data_readonly(JsValue::Number(arity as f64)),
            );
        }
        obj
    }

    /// Wrap a host closure as a callable object
    pub fn create_native_function<F>(&self, name: &str, func: F, arity: usize) -> JsObjectRef
    where
        F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        self.create_function(JsFunction::Native(NativeFunction {
            name: JsString::from(name),
            func: Rc::new(func),
            arity,
        }))
    }

    /// Register a native method on a prototype or constructor object.
    ///
    /// Methods are non-enumerable, like every built-in method.
    pub fn register_method<F>(&self, obj: &JsObjectRef, name: &str, func: F, arity: usize)
    where
        F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        let f = self.create_native_function(name, func, arity);
        obj.borrow_mut()
            .define_property(PropertyKey::from(name), Property::hidden(JsValue::Object(f)));
    }

    /// Register a native method under a symbol key
    pub fn register_symbol_method<F>(
        &self,
        obj: &JsObjectRef,
        symbol: JsSymbol,
        name: &str,
        func: F,
        arity: usize,
    ) where
        F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        let f = self.create_native_function(name, func, arity);
        obj.borrow_mut()
            .define_property(PropertyKey::Symbol(symbol), Property::hidden(JsValue::Object(f)));
    }

    /// Register a native getter (non-enumerable accessor without setter)
    pub fn register_getter<F>(&self, obj: &JsObjectRef, name: &str, func: F)
    where
        F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        let getter = self.create_native_function(&format!("get {}", name), func, 0);
        obj.borrow_mut().define_property(
            PropertyKey::from(name),
            Property {
                enumerable: false,
                ..Property::accessor(Some(getter), None)
            },
        );
    }

    /// Bind a value in the global scope
    pub fn define_global(&self, name: &str, value: JsValue) {
        self.global_env.define(JsString::from(name), value, false);
    }

    /// `{ value, done }` as produced by iterators
    pub fn create_iter_result(&self, value: JsValue, done: bool) -> JsValue {
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.define_property(PropertyKey::from("value"), Property::data(value));
            o.define_property(PropertyKey::from("done"), Property::data(JsValue::Boolean(done)));
        }
        JsValue::Object(obj)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Property access
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read a property, invoking a getter found on the chain
    pub fn get_property(
        &mut self,
        target: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        match target.try_get_property(key)? {
            PropertyLookup::Data(value) => Ok(value),
            PropertyLookup::Accessor(Some(getter)) => {
                self.call_function(JsValue::Object(getter), target.clone(), &[])
            }
            PropertyLookup::Accessor(None) | PropertyLookup::Absent => Ok(JsValue::Undefined),
        }
    }

    pub fn get_named(&mut self, target: &JsValue, name: &str) -> Result<JsValue, JsError> {
        self.get_property(target, &PropertyKey::from(name))
    }

    /// Write a property, invoking a setter found on the chain.
    ///
    /// Writes rejected by a read-only slot fail with TypeError on objects and
    /// are ignored on primitives.
    pub fn put_property(
        &mut self,
        target: &JsValue,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        match target.set_property(key.clone(), value.clone())? {
            PropertyWrite::Done => Ok(()),
            PropertyWrite::Setter(setter) => {
                self.call_function(JsValue::Object(setter), target.clone(), &[value])?;
                Ok(())
            }
            PropertyWrite::Rejected => match target {
                JsValue::Object(_) => Err(JsError::type_error(format!(
                    "Cannot assign to read only property '{}' of object",
                    key
                ))),
                _ => Ok(()),
            },
        }
    }

    /// `delete target[key]`
    pub fn delete_property(
        &mut self,
        target: &JsValue,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        let obj = match target {
            JsValue::Object(obj) => obj,
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot convert {} to object",
                    target.to_js_string()
                )));
            }
            _ => return Ok(true),
        };
        let mut o = obj.borrow_mut();
        if let ExoticObject::TypedArray(view) = &o.exotic {
            if let PropertyKey::Index(i) = key {
                return Ok((*i as usize) >= view.length);
            }
        }
        match o.properties.get(key) {
            Some(prop) if !prop.configurable => Err(JsError::type_error(format!(
                "Cannot delete property '{}'",
                key
            ))),
            Some(_) => {
                o.properties.shift_remove(key);
                Ok(true)
            }
            None => Ok(true),
        }
    }

    /// ToPropertyKey
    pub fn to_property_key(&mut self, value: &JsValue) -> Result<PropertyKey, JsError> {
        match value {
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                Ok(PropertyKey::from_value(&primitive))
            }
            other => Ok(PropertyKey::from_value(other)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Conversions
    // ═══════════════════════════════════════════════════════════════════════════

    /// ToPrimitive: objects are converted through `valueOf`/`toString`
    pub fn to_primitive(
        &mut self,
        value: &JsValue,
        hint: PreferredType,
    ) -> Result<JsValue, JsError> {
        if !matches!(value, JsValue::Object(_)) {
            return Ok(value.clone());
        }
        let order = match hint {
            PreferredType::Default => ["valueOf", "toString"],
            PreferredType::String => ["toString", "valueOf"],
        };
        for name in order {
            let method = self.get_named(value, name)?;
            if method.is_callable() {
                let result = self.call_function(method, value.clone(), &[])?;
                if !matches!(result, JsValue::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("Cannot convert object to primitive value"))
    }

    /// ToString, including object conversion
    pub fn to_string_value(&mut self, value: &JsValue) -> Result<JsString, JsError> {
        match value {
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a string",
            )),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_string_value(&primitive)
            }
            other => Ok(other.to_js_string()),
        }
    }

    /// ToNumber, including object conversion
    pub fn to_number_value(&mut self, value: &JsValue) -> Result<f64, JsError> {
        match value {
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a number",
            )),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Default)?;
                self.to_number_value(&primitive)
            }
            other => Ok(other.to_number()),
        }
    }

    /// `value instanceof constructor`
    pub fn instance_of(&mut self, value: &JsValue, constructor: &JsValue) -> Result<bool, JsError> {
        if !constructor.is_callable() {
            return Err(JsError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        }
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let JsValue::Object(prototype) = self.get_named(constructor, "prototype")? else {
            return Err(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        let mut current = obj.borrow().prototype.clone();
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            match current {
                Some(proto) if Rc::ptr_eq(&proto, &prototype) => return Ok(true),
                Some(proto) => current = proto.borrow().prototype.clone(),
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Script-visible value of an error.
    ///
    /// Thrown payloads come back unchanged; engine errors become error objects
    /// of the matching kind.
    pub fn error_to_value(&mut self, err: JsError) -> JsValue {
        match err {
            JsError::ThrownValue { value } => value,
            other => self.create_error(other.kind(), &other.message()),
        }
    }

    /// Create an error object of the given kind ("TypeError", ...)
    pub fn create_error(&self, kind: &str, message: &str) -> JsValue {
        let prototype = self
            .error_prototypes
            .get(kind)
            .unwrap_or(&self.error_prototype)
            .cheap_clone();
        let obj = self.create_object_with_prototype(&prototype);
        obj.borrow_mut().define_property(
            PropertyKey::from("message"),
            Property::hidden(JsValue::from(message)),
        );
        JsValue::Object(obj)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════

    /// Call a function value with an explicit `this`
    pub fn call_function(
        &mut self,
        callee: JsValue,
        this_value: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let func = match &callee {
            JsValue::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::Function(f) => Some(f.clone()),
                _ => None,
            },
            _ => None,
        };
        let Some(func) = func else {
            return Err(not_a_function(&callee));
        };

        let position = stack_position();
        if self.call_depth == 0 {
            self.stack_origin = position;
        }
        if self.call_depth >= self.config.max_call_depth
            || self.stack_origin.abs_diff(position) > self.config.max_stack_bytes
        {
            return Err(JsError::range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        let result = match func {
            JsFunction::Native(native) => native.func.invoke(self, this_value, args),
            JsFunction::Interpreted(interpreted) => {
                self.call_interpreted(&interpreted, this_value, args)
            }
        };
        self.call_depth -= 1;
        result
    }

    /// `new callee(...args)`
    ///
    /// Native constructors build and return their own instance. Interpreted
    /// constructors receive a fresh object inheriting from `callee.prototype`.
    pub fn construct(&mut self, callee: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let native = match &callee {
            JsValue::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::Function(JsFunction::Native(_)) => Some(true),
                ExoticObject::Function(JsFunction::Interpreted(f))
                    if !f.node.arrow && f.node.kind == ast::FunctionKind::Normal =>
                {
                    Some(false)
                }
                _ => None,
            },
            _ => None,
        };
        let Some(native) = native else {
            return Err(JsError::type_error(format!(
                "{} is not a constructor",
                describe_value(&callee)
            )));
        };
        if native {
            return self.call_function(callee, JsValue::Undefined, args);
        }

        let prototype = match self.get_named(&callee, "prototype")? {
            JsValue::Object(proto) => proto,
            _ => self.object_prototype.cheap_clone(),
        };
        let instance = JsValue::Object(self.create_object_with_prototype(&prototype));
        match self.call_function(callee, instance.clone(), args)? {
            result @ JsValue::Object(_) => Ok(result),
            _ => Ok(instance),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run `f` with `env` as the current scope, restoring the previous scope
    /// afterwards even when `f` fails
    pub(crate) fn with_env<T>(
        &mut self,
        env: Environment,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        let saved = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = saved;
        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Approximate address of the caller's stack frame
#[inline(never)]
fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(std::ptr::addr_of!(marker)) as usize
}

/// Short rendering of a value for error messages
pub(crate) fn describe_value(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => format!("\"{}\"", s),
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Function(f) if !f.name().is_empty() => f.name().to_string(),
            ExoticObject::Array { .. } => "array".to_string(),
            _ => "object".to_string(),
        },
        other => other.to_js_string().to_string(),
    }
}

fn not_a_function(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not a function", describe_value(value)))
}
