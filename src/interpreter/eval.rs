//! Statement execution and expression evaluation
//!
//! Ordinary code runs here directly on the typed tree. Generator and async
//! bodies run on the coroutine machine, which calls back into this module for
//! every fragment that cannot suspend.

use std::rc::Rc;

use crate::ast::{
    AssignmentExpression, AssignmentTarget, BinaryOp, CallExpression, CatchClause, Expression,
    ForInit, ForOfLeft, ForOfStatement, ForStatement, Function, FunctionKind, LiteralValue,
    LogicalOp, MemberExpression, MemberProperty, ObjectProperty, Pattern, Program, PropertyKind,
    PropertyName, Statement, TryStatement, UnaryOp, UpdateExpression, UpdateOp,
    VariableDeclaration, VariableKind,
};
use crate::error::JsError;
use crate::value::{
    CheapClone, InterpretedFunction, JsFunction, JsObjectRef, JsString, JsValue, Property,
    PropertyAccess, PropertyKey, to_int32, to_uint32,
};

use super::completion::{Completion, LoopControl};
use super::environment::Environment;
use super::{Interpreter, PreferredType};

/// How a pattern introduces its names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Let,
    Const,
    Var,
    /// Plain assignment to existing bindings
    Assign,
}

impl From<VariableKind> for BindingKind {
    fn from(kind: VariableKind) -> Self {
        match kind {
            VariableKind::Let => BindingKind::Let,
            VariableKind::Const => BindingKind::Const,
            VariableKind::Var => BindingKind::Var,
        }
    }
}

pub(crate) fn literal_value(lit: &LiteralValue) -> JsValue {
    match lit {
        LiteralValue::Undefined => JsValue::Undefined,
        LiteralValue::Null => JsValue::Null,
        LiteralValue::Boolean(b) => JsValue::Boolean(*b),
        LiteralValue::Number(n) => JsValue::Number(*n),
        LiteralValue::String(s) => JsValue::String(s.cheap_clone()),
    }
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════════
    // Programs & statement lists
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run a program in the global scope.
    ///
    /// Returns the value of the last evaluated expression statement.
    pub fn execute_program(&mut self, program: &Program) -> Result<JsValue, JsError> {
        let env = self.global_env.cheap_clone();
        self.with_env(env, |interp| {
            interp.hoist_var_declarations(&program.body);
            match interp.execute_statements(&program.body)? {
                Completion::Normal(value) => Ok(value),
                Completion::Return(_) => Err(JsError::syntax_error("Illegal return statement")),
                Completion::Break(_) => Err(JsError::syntax_error("Illegal break statement")),
                Completion::Continue(_) => {
                    Err(JsError::syntax_error("Illegal continue statement"))
                }
            }
        })
    }

    /// Execute a statement list after instantiating its function declarations
    pub fn execute_statements(&mut self, statements: &[Statement]) -> Result<Completion, JsError> {
        for stmt in statements {
            if let Statement::FunctionDeclaration(function) = stmt {
                self.declare_function(function)?;
            }
        }

        let mut last = JsValue::Undefined;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Completion::Normal(value) => {
                    if !matches!(
                        stmt,
                        Statement::VariableDeclaration(_)
                            | Statement::FunctionDeclaration(_)
                            | Statement::Empty
                    ) {
                        last = value;
                    }
                }
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    /// Predeclare `var` names of a body in the nearest function scope
    pub(crate) fn hoist_var_declarations(&mut self, statements: &[Statement]) {
        let mut names = Vec::new();
        for stmt in statements {
            collect_var_names(stmt, &mut names);
        }
        for name in names {
            self.env
                .define_function_scoped(name, JsValue::Undefined, false);
        }
    }

    /// Bind a function declaration in the current scope
    pub(crate) fn declare_function(&mut self, function: &Rc<Function>) -> Result<(), JsError> {
        let Some(name) = &function.name else {
            return Err(JsError::syntax_error(
                "Function statements require a function name",
            ));
        };
        let value = self.instantiate_function(function, None);
        self.env.define(name.cheap_clone(), value, false);
        Ok(())
    }

    /// Create a closure over the current scope.
    ///
    /// `name` overrides the node's own name for anonymous functions whose
    /// name is inferred from a binding.
    pub(crate) fn instantiate_function(
        &mut self,
        node: &Rc<Function>,
        name: Option<JsString>,
    ) -> JsValue {
        let func = JsFunction::Interpreted(InterpretedFunction {
            name: node.name.clone().or(name),
            node: node.cheap_clone(),
            closure: self.env.cheap_clone(),
        });
        let obj = self.create_function(func);
        if node.kind == FunctionKind::Normal && !node.arrow {
            let prototype = self.create_object();
            prototype.borrow_mut().define_property(
                PropertyKey::from("constructor"),
                Property::hidden(JsValue::Object(obj.cheap_clone())),
            );
            obj.borrow_mut().define_property(
                PropertyKey::from("prototype"),
                Property {
                    configurable: false,
                    ..Property::hidden(JsValue::Object(prototype))
                },
            );
        }
        JsValue::Object(obj)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn execute_statement(&mut self, stmt: &Statement) -> Result<Completion, JsError> {
        self.execute_labeled_statement(stmt, &[])
    }

    /// Execute a statement carrying the labels of its enclosing labeled statements
    fn execute_labeled_statement(
        &mut self,
        stmt: &Statement,
        labels: &[JsString],
    ) -> Result<Completion, JsError> {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                self.execute_variable_declaration(decl)?;
                Ok(Completion::Normal(JsValue::Undefined))
            }
            // Instantiated when the enclosing statement list was entered
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal(JsValue::Undefined)),
            Statement::Block(block) => self.execute_block(&block.body),
            Statement::If(s) => {
                if self.evaluate(&s.test)?.to_boolean() {
                    self.execute_statement(&s.consequent)
                } else if let Some(alternate) = &s.alternate {
                    self.execute_statement(alternate)
                } else {
                    Ok(Completion::Normal(JsValue::Undefined))
                }
            }
            Statement::For(s) => self.execute_for(s, labels),
            Statement::ForOf(s) => self.execute_for_of(s, labels),
            Statement::While(s) => {
                loop {
                    if !self.evaluate(&s.test)?.to_boolean() {
                        break;
                    }
                    match self.execute_statement(&s.body)?.into_loop_control(labels) {
                        LoopControl::Next => {}
                        LoopControl::Exit => break,
                        LoopControl::Propagate(completion) => return Ok(completion),
                    }
                }
                Ok(Completion::Normal(JsValue::Undefined))
            }
            Statement::DoWhile(s) => {
                loop {
                    match self.execute_statement(&s.body)?.into_loop_control(labels) {
                        LoopControl::Next => {}
                        LoopControl::Exit => break,
                        LoopControl::Propagate(completion) => return Ok(completion),
                    }
                    if !self.evaluate(&s.test)?.to_boolean() {
                        break;
                    }
                }
                Ok(Completion::Normal(JsValue::Undefined))
            }
            Statement::Try(s) => self.execute_try(s),
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Break(label) => Ok(Completion::Break(label.clone())),
            Statement::Continue(label) => Ok(Completion::Continue(label.clone())),
            Statement::Throw(expr) => {
                let value = self.evaluate(expr)?;
                Err(JsError::thrown(value))
            }
            Statement::Expression(expr) => Ok(Completion::Normal(self.evaluate(expr)?)),
            Statement::Labeled(s) => {
                let mut labels = labels.to_vec();
                labels.push(s.label.cheap_clone());
                match s.body.as_ref() {
                    body @ (Statement::For(_)
                    | Statement::ForOf(_)
                    | Statement::While(_)
                    | Statement::DoWhile(_)
                    | Statement::Labeled(_)) => self.execute_labeled_statement(body, &labels),
                    body => match self.execute_statement(body)? {
                        Completion::Break(Some(label)) if labels.contains(&label) => {
                            Ok(Completion::Normal(JsValue::Undefined))
                        }
                        other => Ok(other),
                    },
                }
            }
            Statement::Empty => Ok(Completion::Normal(JsValue::Undefined)),
        }
    }

    fn execute_block(&mut self, statements: &[Statement]) -> Result<Completion, JsError> {
        let env = Environment::new_block(&self.env);
        self.with_env(env, |interp| interp.execute_statements(statements))
    }

    fn execute_variable_declaration(&mut self, decl: &VariableDeclaration) -> Result<(), JsError> {
        for declarator in &decl.declarations {
            match &declarator.init {
                Some(init) => {
                    let value = match &declarator.id {
                        Pattern::Identifier(name) => self.evaluate_named(init, name)?,
                        _ => self.evaluate(init)?,
                    };
                    self.bind_pattern(&declarator.id, value, decl.kind.into())?;
                }
                None => match decl.kind {
                    // Already hoisted; an existing value is kept
                    VariableKind::Var => {
                        let mut names = Vec::new();
                        collect_pattern_names(&declarator.id, &mut names);
                        for name in names {
                            self.env
                                .define_function_scoped(name, JsValue::Undefined, false);
                        }
                    }
                    VariableKind::Let => {
                        self.bind_pattern(&declarator.id, JsValue::Undefined, BindingKind::Let)?
                    }
                    VariableKind::Const => {
                        return Err(JsError::syntax_error(
                            "Missing initializer in const declaration",
                        ));
                    }
                },
            }
        }
        Ok(())
    }

    fn execute_for(
        &mut self,
        s: &ForStatement,
        labels: &[JsString],
    ) -> Result<Completion, JsError> {
        let lexical = matches!(&s.init, Some(ForInit::Variable(d)) if d.kind != VariableKind::Var);
        let env = if lexical {
            Environment::new_block(&self.env)
        } else {
            self.env.cheap_clone()
        };

        self.with_env(env, |interp| {
            match &s.init {
                Some(ForInit::Variable(decl)) => interp.execute_variable_declaration(decl)?,
                Some(ForInit::Expression(expr)) => {
                    interp.evaluate(expr)?;
                }
                None => {}
            }
            loop {
                if let Some(test) = &s.test {
                    if !interp.evaluate(test)?.to_boolean() {
                        break;
                    }
                }
                match interp.execute_statement(&s.body)?.into_loop_control(labels) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Propagate(completion) => return Ok(completion),
                }
                // Closures from this iteration keep the old frame
                if lexical {
                    interp.env = interp.env.renew();
                }
                if let Some(update) = &s.update {
                    interp.evaluate(update)?;
                }
            }
            Ok(Completion::Normal(JsValue::Undefined))
        })
    }

    fn execute_for_of(
        &mut self,
        s: &ForOfStatement,
        labels: &[JsString],
    ) -> Result<Completion, JsError> {
        let iterable = self.evaluate(&s.right)?;
        let record = self.get_iterator(&iterable)?;
        loop {
            let Some(value) = self.iterator_step(&record)? else {
                break;
            };
            let env = Environment::new_block(&self.env);
            let result = self.with_env(env, |interp| {
                match &s.left {
                    ForOfLeft::Variable(kind, pattern) => {
                        interp.bind_pattern(pattern, value, (*kind).into())?
                    }
                    ForOfLeft::Identifier(name) => interp.env.assign(name, value)?,
                }
                interp.execute_statement(&s.body)
            });
            let completion = match result {
                Ok(completion) => completion,
                Err(err) => {
                    // The original error wins over one raised by return()
                    let _ = self.iterator_close(&record);
                    return Err(err);
                }
            };
            match completion.into_loop_control(labels) {
                LoopControl::Next => {}
                LoopControl::Exit => {
                    self.iterator_close(&record)?;
                    break;
                }
                LoopControl::Propagate(completion) => {
                    self.iterator_close(&record)?;
                    return Ok(completion);
                }
            }
        }
        Ok(Completion::Normal(JsValue::Undefined))
    }

    fn execute_try(&mut self, s: &TryStatement) -> Result<Completion, JsError> {
        let result = match (self.execute_block(&s.block.body), &s.handler) {
            (Err(err), Some(handler)) if err.is_catchable() => self.execute_catch(handler, err),
            (result, _) => result,
        };
        let Some(finalizer) = &s.finalizer else {
            return result;
        };
        // An abrupt finally overrides whatever the try/catch produced
        match self.execute_block(&finalizer.body)? {
            Completion::Normal(_) => result,
            abrupt => Ok(abrupt),
        }
    }

    fn execute_catch(
        &mut self,
        handler: &CatchClause,
        err: JsError,
    ) -> Result<Completion, JsError> {
        let value = self.error_to_value(err);
        let env = Environment::new_block(&self.env);
        self.with_env(env, |interp| {
            if let Some(param) = &handler.param {
                interp.bind_pattern(param, value, BindingKind::Let)?;
            }
            interp.execute_statements(&handler.body.body)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Patterns
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bind (or assign) the names of a pattern from a value
    pub fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: JsValue,
        kind: BindingKind,
    ) -> Result<(), JsError> {
        match pattern {
            Pattern::Identifier(name) => {
                match kind {
                    BindingKind::Let => self.env.define(name.cheap_clone(), value, false),
                    BindingKind::Const => self.env.define(name.cheap_clone(), value, true),
                    BindingKind::Var => {
                        self.env.define_function_scoped(name.cheap_clone(), value, true)
                    }
                    BindingKind::Assign => self.env.assign(name, value)?,
                }
                Ok(())
            }
            Pattern::Assignment(inner, default) => {
                let value = match value {
                    JsValue::Undefined => match inner.as_ref() {
                        Pattern::Identifier(name) => self.evaluate_named(default, name)?,
                        _ => self.evaluate(default)?,
                    },
                    other => other,
                };
                self.bind_pattern(inner, value, kind)
            }
            Pattern::Object(properties) => {
                if value.is_null_or_undefined() {
                    return Err(JsError::type_error(format!(
                        "Cannot destructure '{}' as it is {}",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                for prop in properties {
                    let key = match &prop.key {
                        PropertyName::Static(name) => PropertyKey::from(name.cheap_clone()),
                        PropertyName::Computed(expr) => {
                            let key = self.evaluate(expr)?;
                            self.to_property_key(&key)?
                        }
                    };
                    let prop_value = self.get_property(&value, &key)?;
                    self.bind_pattern(&prop.value, prop_value, kind)?;
                }
                Ok(())
            }
            Pattern::Array(elements) => {
                if value.is_null_or_undefined() {
                    return Err(JsError::type_error(format!(
                        "{} is not iterable",
                        value.to_js_string()
                    )));
                }
                let record = self.get_iterator(&value)?;
                let mut done = false;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(Pattern::Rest(inner)) = element {
                        if i + 1 != elements.len() {
                            return Err(JsError::syntax_error("malformed pattern"));
                        }
                        let mut rest = Vec::new();
                        while !done {
                            match self.iterator_step(&record)? {
                                Some(item) => rest.push(item),
                                None => done = true,
                            }
                        }
                        let rest = JsValue::Object(self.create_array(rest));
                        self.bind_pattern(inner, rest, kind)?;
                        continue;
                    }

                    let item = if done {
                        JsValue::Undefined
                    } else {
                        match self.iterator_step(&record)? {
                            Some(item) => item,
                            None => {
                                done = true;
                                JsValue::Undefined
                            }
                        }
                    };
                    if let Some(element) = element {
                        if let Err(err) = self.bind_pattern(element, item, kind) {
                            if !done {
                                let _ = self.iterator_close(&record);
                            }
                            return Err(err);
                        }
                    }
                }
                if !done {
                    self.iterator_close(&record)?;
                }
                Ok(())
            }
            Pattern::Rest(_) => Err(JsError::syntax_error("malformed pattern")),
        }
    }

    /// Fresh call frame with parameters bound and `var` names hoisted
    pub(crate) fn prepare_call_env(
        &mut self,
        func: &InterpretedFunction,
        this_value: JsValue,
        args: &[JsValue],
    ) -> Result<Environment, JsError> {
        let node = &func.node;
        let this_binding = if node.arrow { None } else { Some(this_value) };
        let env = Environment::new_function(&func.closure, this_binding);

        self.with_env(env.cheap_clone(), |interp| {
            if !node.arrow {
                let arguments = interp.create_array(args.to_vec());
                interp
                    .env
                    .define(JsString::from("arguments"), JsValue::Object(arguments), false);
            }
            interp.hoist_var_declarations(&node.body);

            for (i, param) in node.params.iter().enumerate() {
                match param {
                    Pattern::Rest(inner) => {
                        if i + 1 != node.params.len() {
                            return Err(JsError::syntax_error("malformed pattern"));
                        }
                        let rest = args.get(i..).unwrap_or_default().to_vec();
                        let rest = JsValue::Object(interp.create_array(rest));
                        interp.bind_pattern(inner, rest, BindingKind::Let)?;
                    }
                    param => {
                        let arg = args.get(i).cloned().unwrap_or_default();
                        interp.bind_pattern(param, arg, BindingKind::Let)?;
                    }
                }
            }
            Ok(())
        })?;
        Ok(env)
    }

    /// Invoke a script-defined function
    pub(crate) fn call_interpreted(
        &mut self,
        func: &InterpretedFunction,
        this_value: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        match func.node.kind {
            FunctionKind::Generator => self.start_generator(func, this_value, args),
            FunctionKind::Async => self.start_async(func, this_value, args),
            FunctionKind::Normal => {
                let env = self.prepare_call_env(func, this_value, args)?;
                let completion =
                    self.with_env(env, |interp| interp.execute_statements(&func.node.body))?;
                match completion {
                    Completion::Normal(_) => Ok(JsValue::Undefined),
                    Completion::Return(value) => Ok(value),
                    Completion::Break(_) => Err(JsError::syntax_error("Illegal break statement")),
                    Completion::Continue(_) => {
                        Err(JsError::syntax_error("Illegal continue statement"))
                    }
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn evaluate(&mut self, expr: &Expression) -> Result<JsValue, JsError> {
        match expr {
            Expression::Literal(lit) => Ok(literal_value(lit)),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(match element {
                        Some(e) => self.evaluate(e)?,
                        None => JsValue::Undefined,
                    });
                }
                Ok(JsValue::Object(self.create_array(values)))
            }
            Expression::Object(properties) => self.evaluate_object(properties),
            Expression::Function(function) => Ok(self.evaluate_function_expression(function)),
            Expression::Identifier(name) => self.env.get(name),
            Expression::This => Ok(self.env.this_value()),
            Expression::Unary(op, operand) => self.evaluate_unary(*op, operand),
            Expression::Binary(b) => {
                let left = self.evaluate(&b.left)?;
                let right = self.evaluate(&b.right)?;
                self.binary_op(b.operator, left, right)
            }
            Expression::Logical(l) => {
                let left = self.evaluate(&l.left)?;
                let short_circuit = match l.operator {
                    LogicalOp::And => !left.to_boolean(),
                    LogicalOp::Or => left.to_boolean(),
                    LogicalOp::NullishCoalesce => !left.is_null_or_undefined(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(&l.right)
                }
            }
            Expression::Conditional(c) => {
                if self.evaluate(&c.test)?.to_boolean() {
                    self.evaluate(&c.consequent)
                } else {
                    self.evaluate(&c.alternate)
                }
            }
            Expression::Assignment(a) => self.evaluate_assignment(a),
            Expression::Update(u) => self.evaluate_update(u),
            Expression::Sequence(exprs) => {
                let mut last = JsValue::Undefined;
                for e in exprs {
                    last = self.evaluate(e)?;
                }
                Ok(last)
            }
            Expression::Member(member) => {
                let object = self.evaluate(&member.object)?;
                let key = self.evaluate_member_key(&member.property)?;
                self.get_property(&object, &key)
            }
            Expression::Call(call) => self.evaluate_call(call),
            Expression::New(call) => {
                let callee = self.evaluate(&call.callee)?;
                let args = self.evaluate_arguments(&call.arguments)?;
                self.construct(callee, &args)
            }
            Expression::Yield(_) => Err(JsError::syntax_error(
                "yield is only valid in generator functions",
            )),
            Expression::Await(_) => Err(JsError::syntax_error(
                "await is only valid in async functions",
            )),
        }
    }

    /// Evaluate an initializer, naming anonymous functions after their binding
    fn evaluate_named(&mut self, expr: &Expression, name: &JsString) -> Result<JsValue, JsError> {
        match expr {
            Expression::Function(function) if function.name.is_none() => {
                Ok(self.instantiate_function(function, Some(name.cheap_clone())))
            }
            other => self.evaluate(other),
        }
    }

    /// Named function expressions see their own name in an intermediate scope
    fn evaluate_function_expression(&mut self, function: &Rc<Function>) -> JsValue {
        let Some(name) = &function.name else {
            return self.instantiate_function(function, None);
        };
        let scope = Environment::new_block(&self.env);
        let saved = std::mem::replace(&mut self.env, scope.cheap_clone());
        let value = self.instantiate_function(function, None);
        self.env = saved;
        scope.define(name.cheap_clone(), value.clone(), true);
        value
    }

    fn evaluate_object(&mut self, properties: &[ObjectProperty]) -> Result<JsValue, JsError> {
        let obj = self.create_object();
        for prop in properties {
            let key = match &prop.key {
                PropertyName::Static(name) => PropertyKey::from(name.cheap_clone()),
                PropertyName::Computed(expr) => {
                    let key = self.evaluate(expr)?;
                    self.to_property_key(&key)?
                }
            };
            let value = match (&prop.key, prop.kind) {
                (PropertyName::Static(name), PropertyKind::Init) => {
                    self.evaluate_named(&prop.value, name)?
                }
                _ => self.evaluate(&prop.value)?,
            };
            self.define_literal_property(&obj, key, value, prop.kind)?;
        }
        Ok(JsValue::Object(obj))
    }

    /// Define one property of an object literal; accessors merge with an
    /// existing accessor of the same key
    pub(crate) fn define_literal_property(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
        kind: PropertyKind,
    ) -> Result<(), JsError> {
        if kind == PropertyKind::Init {
            obj.borrow_mut().define_property(key, Property::data(value));
            return Ok(());
        }
        let JsValue::Object(func) = value else {
            return Err(JsError::type_error("Accessor must be a function"));
        };
        let mut o = obj.borrow_mut();
        let (mut getter, mut setter) = match o.get_own_property(&key) {
            Some(existing) if existing.is_accessor() => {
                (existing.getter.clone(), existing.setter.clone())
            }
            _ => (None, None),
        };
        if kind == PropertyKind::Get {
            getter = Some(func);
        } else {
            setter = Some(func);
        }
        o.define_property(key, Property::accessor(getter, setter));
        Ok(())
    }

    fn evaluate_unary(&mut self, op: UnaryOp, operand: &Expression) -> Result<JsValue, JsError> {
        match (op, operand) {
            // typeof tolerates unresolvable identifiers
            (UnaryOp::Typeof, Expression::Identifier(name)) if !self.env.has(name) => {
                Ok(JsValue::from("undefined"))
            }
            (UnaryOp::Delete, Expression::Member(member)) => {
                let object = self.evaluate(&member.object)?;
                let key = self.evaluate_member_key(&member.property)?;
                Ok(JsValue::Boolean(self.delete_property(&object, &key)?))
            }
            (UnaryOp::Delete, other) => {
                self.evaluate(other)?;
                Ok(JsValue::Boolean(true))
            }
            (op, operand) => {
                let value = self.evaluate(operand)?;
                self.unary_op(op, value)
            }
        }
    }

    /// Apply a unary operator to an evaluated operand
    pub(crate) fn unary_op(&mut self, op: UnaryOp, value: JsValue) -> Result<JsValue, JsError> {
        Ok(match op {
            UnaryOp::Minus => JsValue::Number(-self.to_number_value(&value)?),
            UnaryOp::Plus => JsValue::Number(self.to_number_value(&value)?),
            UnaryOp::Not => JsValue::Boolean(!value.to_boolean()),
            UnaryOp::BitNot => JsValue::Number(!to_int32(self.to_number_value(&value)?) as f64),
            UnaryOp::Typeof => JsValue::from(value.type_of()),
            UnaryOp::Void => JsValue::Undefined,
            UnaryOp::Delete => JsValue::Boolean(true),
        })
    }

    /// Apply a binary operator to evaluated operands
    pub(crate) fn binary_op(
        &mut self,
        op: BinaryOp,
        left: JsValue,
        right: JsValue,
    ) -> Result<JsValue, JsError> {
        Ok(match op {
            BinaryOp::Add => {
                let left = self.to_primitive(&left, PreferredType::Default)?;
                let right = self.to_primitive(&right, PreferredType::Default)?;
                if matches!(left, JsValue::String(_)) || matches!(right, JsValue::String(_)) {
                    let mut s = self.to_string_value(&left)?.to_string();
                    s.push_str(self.to_string_value(&right)?.as_str());
                    JsValue::from(s)
                } else {
                    JsValue::Number(self.to_number_value(&left)? + self.to_number_value(&right)?)
                }
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Exp => {
                let a = self.to_number_value(&left)?;
                let b = self.to_number_value(&right)?;
                JsValue::Number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a % b,
                    _ => exponentiate(a, b),
                })
            }
            BinaryOp::Eq => JsValue::Boolean(self.loose_equal(&left, &right)?),
            BinaryOp::NotEq => JsValue::Boolean(!self.loose_equal(&left, &right)?),
            BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(&right)),
            BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(&right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                JsValue::Boolean(self.compare(op, &left, &right)?)
            }
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::LShift
            | BinaryOp::RShift
            | BinaryOp::URShift => {
                let a = self.to_number_value(&left)?;
                let b = self.to_number_value(&right)?;
                let shift = to_uint32(b) & 31;
                JsValue::Number(match op {
                    BinaryOp::BitAnd => (to_int32(a) & to_int32(b)) as f64,
                    BinaryOp::BitOr => (to_int32(a) | to_int32(b)) as f64,
                    BinaryOp::BitXor => (to_int32(a) ^ to_int32(b)) as f64,
                    BinaryOp::LShift => to_int32(a).wrapping_shl(shift) as f64,
                    BinaryOp::RShift => (to_int32(a) >> shift) as f64,
                    _ => (to_uint32(a) >> shift) as f64,
                })
            }
            BinaryOp::In => {
                let JsValue::Object(obj) = &right else {
                    return Err(JsError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        left.to_js_string(),
                        right.to_js_string()
                    )));
                };
                let key = self.to_property_key(&left)?;
                JsValue::Boolean(obj.has_property(&key)?)
            }
            BinaryOp::Instanceof => JsValue::Boolean(self.instance_of(&left, &right)?),
        })
    }

    /// `==` with object-to-primitive conversion
    fn loose_equal(&mut self, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        match (left, right) {
            (JsValue::Object(_), JsValue::Object(_)) => Ok(left.strict_equals(right)),
            (JsValue::Object(_), other) if !other.is_null_or_undefined() => {
                let primitive = self.to_primitive(left, PreferredType::Default)?;
                Ok(primitive.loose_equals(other))
            }
            (other, JsValue::Object(_)) if !other.is_null_or_undefined() => {
                let primitive = self.to_primitive(right, PreferredType::Default)?;
                Ok(other.loose_equals(&primitive))
            }
            _ => Ok(left.loose_equals(right)),
        }
    }

    /// Relational comparison; any NaN operand makes it false
    fn compare(&mut self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        let left = self.to_primitive(left, PreferredType::Default)?;
        let right = self.to_primitive(right, PreferredType::Default)?;
        if let (JsValue::String(a), JsValue::String(b)) = (&left, &right) {
            let (a, b) = (a.as_str(), b.as_str());
            return Ok(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::LtEq => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            });
        }
        let a = self.to_number_value(&left)?;
        let b = self.to_number_value(&right)?;
        Ok(match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        })
    }

    fn evaluate_assignment(&mut self, a: &AssignmentExpression) -> Result<JsValue, JsError> {
        match &a.target {
            AssignmentTarget::Identifier(name) => {
                let value = match a.operator {
                    None => self.evaluate_named(&a.value, name)?,
                    Some(op) => {
                        let current = self.env.get(name)?;
                        let rhs = self.evaluate(&a.value)?;
                        self.binary_op(op, current, rhs)?
                    }
                };
                self.env.assign(name, value.clone())?;
                Ok(value)
            }
            AssignmentTarget::Member(member) => {
                let object = self.evaluate(&member.object)?;
                let key = self.evaluate_member_key(&member.property)?;
                let value = match a.operator {
                    None => self.evaluate(&a.value)?,
                    Some(op) => {
                        let current = self.get_property(&object, &key)?;
                        let rhs = self.evaluate(&a.value)?;
                        self.binary_op(op, current, rhs)?
                    }
                };
                self.put_property(&object, key, value.clone())?;
                Ok(value)
            }
        }
    }

    fn evaluate_update(&mut self, u: &UpdateExpression) -> Result<JsValue, JsError> {
        match &u.target {
            AssignmentTarget::Identifier(name) => {
                let current = self.env.get(name)?;
                let old = self.to_number_value(&current)?;
                let new = apply_update(u.operator, old);
                self.env.assign(name, JsValue::Number(new))?;
                Ok(JsValue::Number(if u.prefix { new } else { old }))
            }
            AssignmentTarget::Member(member) => {
                let object = self.evaluate(&member.object)?;
                let key = self.evaluate_member_key(&member.property)?;
                self.update_property(&object, key, u.operator, u.prefix)
            }
        }
    }

    /// `++`/`--` on a property; returns the new value for prefix forms and the
    /// old numeric value otherwise
    pub(crate) fn update_property(
        &mut self,
        object: &JsValue,
        key: PropertyKey,
        operator: UpdateOp,
        prefix: bool,
    ) -> Result<JsValue, JsError> {
        let current = self.get_property(object, &key)?;
        let old = self.to_number_value(&current)?;
        let new = apply_update(operator, old);
        self.put_property(object, key, JsValue::Number(new))?;
        Ok(JsValue::Number(if prefix { new } else { old }))
    }

    fn evaluate_member_key(&mut self, property: &MemberProperty) -> Result<PropertyKey, JsError> {
        match property {
            MemberProperty::Identifier(name) => Ok(PropertyKey::from(name.cheap_clone())),
            MemberProperty::Expression(expr) => {
                let key = self.evaluate(expr)?;
                self.to_property_key(&key)
            }
        }
    }

    fn evaluate_arguments(&mut self, arguments: &[Expression]) -> Result<Vec<JsValue>, JsError> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }
        Ok(values)
    }

    fn evaluate_call(&mut self, call: &CallExpression) -> Result<JsValue, JsError> {
        let (callee, this_value) = match call.callee.as_ref() {
            Expression::Member(member) => {
                let object = self.evaluate(&member.object)?;
                let key = self.evaluate_member_key(&member.property)?;
                let method = self.get_property(&object, &key)?;
                (method, object)
            }
            callee => (self.evaluate(callee)?, JsValue::Undefined),
        };
        let args = self.evaluate_arguments(&call.arguments)?;
        if !callee.is_callable() {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                describe_callee(&call.callee)
            )));
        }
        self.call_function(callee, this_value, &args)
    }
}

fn apply_update(operator: UpdateOp, value: f64) -> f64 {
    match operator {
        UpdateOp::Increment => value + 1.0,
        UpdateOp::Decrement => value - 1.0,
    }
}

/// `**`, where `1 ** NaN` and `(±1) ** ±Infinity` are NaN
fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

/// Source-like rendering of a callee for "is not a function" messages
fn describe_callee(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.to_string(),
        Expression::This => "this".to_string(),
        Expression::Member(MemberExpression {
            object,
            property: MemberProperty::Identifier(name),
        }) => format!("{}.{}", describe_callee(object), name),
        Expression::Member(MemberExpression { object, .. }) => {
            format!("{}[...]", describe_callee(object))
        }
        _ => "expression".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hoisting
// ═══════════════════════════════════════════════════════════════════════════

/// `var` names declared anywhere in a statement, nested functions excluded
fn collect_var_names(stmt: &Statement, names: &mut Vec<JsString>) {
    match stmt {
        Statement::VariableDeclaration(decl) => {
            if decl.kind == VariableKind::Var {
                for declarator in &decl.declarations {
                    collect_pattern_names(&declarator.id, names);
                }
            }
        }
        Statement::Block(block) => {
            for s in &block.body {
                collect_var_names(s, names);
            }
        }
        Statement::If(s) => {
            collect_var_names(&s.consequent, names);
            if let Some(alternate) = &s.alternate {
                collect_var_names(alternate, names);
            }
        }
        Statement::For(s) => {
            if let Some(ForInit::Variable(decl)) = &s.init {
                collect_var_names(&Statement::VariableDeclaration(decl.clone()), names);
            }
            collect_var_names(&s.body, names);
        }
        Statement::ForOf(s) => {
            if let ForOfLeft::Variable(VariableKind::Var, pattern) = &s.left {
                collect_pattern_names(pattern, names);
            }
            collect_var_names(&s.body, names);
        }
        Statement::While(s) => collect_var_names(&s.body, names),
        Statement::DoWhile(s) => collect_var_names(&s.body, names),
        Statement::Try(s) => {
            for stmt in &s.block.body {
                collect_var_names(stmt, names);
            }
            if let Some(handler) = &s.handler {
                for stmt in &handler.body.body {
                    collect_var_names(stmt, names);
                }
            }
            if let Some(finalizer) = &s.finalizer {
                for stmt in &finalizer.body {
                    collect_var_names(stmt, names);
                }
            }
        }
        Statement::Labeled(s) => collect_var_names(&s.body, names),
        Statement::FunctionDeclaration(_)
        | Statement::Return(_)
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Throw(_)
        | Statement::Expression(_)
        | Statement::Empty => {}
    }
}

fn collect_pattern_names(pattern: &Pattern, names: &mut Vec<JsString>) {
    match pattern {
        Pattern::Identifier(name) => names.push(name.cheap_clone()),
        Pattern::Object(properties) => {
            for prop in properties {
                collect_pattern_names(&prop.value, names);
            }
        }
        Pattern::Array(elements) => {
            for element in elements.iter().flatten() {
                collect_pattern_names(element, names);
            }
        }
        Pattern::Rest(inner) | Pattern::Assignment(inner, _) => {
            collect_pattern_names(inner, names)
        }
    }
}
