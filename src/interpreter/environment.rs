//! Lexical environments
//!
//! An [`Environment`] is one frame of the scope chain. Frames are shared by
//! reference: closures keep the frame they were created in alive for as long
//! as they live themselves.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::JsError;
use crate::value::{CheapClone, JsString, JsValue};

/// A name-to-value association with a mutability flag
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
}

#[derive(Default)]
struct Scope {
    bindings: FxHashMap<JsString, Binding>,
    outer: Option<Environment>,
    /// `var` declarations land on the nearest frame with this flag
    function_scope: bool,
    /// `this` for frames created by non-arrow calls (and the global frame)
    this_value: Option<JsValue>,
}

/// A shared reference to one scope frame
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl CheapClone for Environment {}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = self.0.borrow();
        write!(
            f,
            "[Environment {} bindings{}]",
            scope.bindings.len(),
            if scope.function_scope { ", function" } else { "" }
        )
    }
}

impl Environment {
    /// Root frame of a realm
    pub fn global() -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            function_scope: true,
            this_value: Some(JsValue::Undefined),
            ..Scope::default()
        })))
    }

    /// Frame for a block, loop or catch clause
    pub fn new_block(outer: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            outer: Some(outer.cheap_clone()),
            ..Scope::default()
        })))
    }

    /// Frame for a function call; `this_value` is `None` for arrow functions
    pub fn new_function(outer: &Environment, this_value: Option<JsValue>) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            outer: Some(outer.cheap_clone()),
            function_scope: true,
            this_value,
            ..Scope::default()
        })))
    }

    pub fn outer(&self) -> Option<Environment> {
        self.0.borrow().outer.clone()
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Create or overwrite a binding in this frame
    pub fn define(&self, name: JsString, value: JsValue, is_const: bool) {
        self.0.borrow_mut().bindings.insert(
            name,
            Binding {
                value,
                mutable: !is_const,
            },
        );
    }

    /// Declare `name` on the nearest function-scope frame.
    ///
    /// An existing binding there is only updated when `has_initializer`; this is
    /// what lets hoisting run ahead of the declaration without clobbering it.
    pub fn define_function_scoped(&self, name: JsString, value: JsValue, has_initializer: bool) {
        let target = self.function_scope();
        let mut scope = target.0.borrow_mut();
        match scope.bindings.get_mut(&name) {
            Some(binding) => {
                if has_initializer {
                    binding.value = value;
                }
            }
            None => {
                scope.bindings.insert(
                    name,
                    Binding {
                        value,
                        mutable: true,
                    },
                );
            }
        }
    }

    /// Nearest enclosing frame (self included) marked as a function scope
    fn function_scope(&self) -> Environment {
        let mut current = self.cheap_clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if scope.function_scope {
                    None
                } else {
                    scope.outer.clone()
                }
            };
            match next {
                Some(outer) => current = outer,
                None => return current,
            }
        }
    }

    /// Resolve `name` through the chain
    pub fn get(&self, name: &str) -> Result<JsValue, JsError> {
        let mut current = self.cheap_clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if let Some(binding) = scope.bindings.get(name) {
                    return Ok(binding.value.clone());
                }
                scope.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return Err(JsError::reference_error(name)),
            }
        }
    }

    /// Assign to the nearest binding of `name`
    pub fn assign(&self, name: &str, value: JsValue) -> Result<(), JsError> {
        let mut current = self.cheap_clone();
        loop {
            let next = {
                let mut scope = current.0.borrow_mut();
                if let Some(binding) = scope.bindings.get_mut(name) {
                    if !binding.mutable {
                        return Err(JsError::type_error(format!(
                            "Assignment to constant variable '{}'",
                            name
                        )));
                    }
                    binding.value = value;
                    return Ok(());
                }
                scope.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return Err(JsError::reference_error(name)),
            }
        }
    }

    /// Whether `name` resolves anywhere on the chain
    pub fn has(&self, name: &str) -> bool {
        let mut current = self.cheap_clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if scope.bindings.contains_key(name) {
                    return true;
                }
                scope.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return false,
            }
        }
    }

    /// `this` of the nearest frame that binds one; arrow frames are skipped
    pub fn this_value(&self) -> JsValue {
        let mut current = self.cheap_clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if let Some(this) = &scope.this_value {
                    return this.clone();
                }
                scope.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return JsValue::Undefined,
            }
        }
    }

    /// Copy of this frame with the same bindings and parent.
    ///
    /// Loops with `let` declarations renew their frame per iteration so that
    /// closures captured in one iteration do not observe the next.
    pub fn renew(&self) -> Environment {
        let scope = self.0.borrow();
        Environment(Rc::new(RefCell::new(Scope {
            bindings: scope.bindings.clone(),
            outer: scope.outer.clone(),
            function_scope: scope.function_scope,
            this_value: scope.this_value.clone(),
        })))
    }
}
