//! Plan compiler for generator and async function bodies
//!
//! This module lowers a function body to a [`Plan`] executed by the coroutine
//! machine. Only the statements and expressions on the path to a suspension
//! point are lowered; the rest are embedded as atomic `Exec`/`Eval` fragments.

mod analysis;
mod plan;

pub use analysis::{expression_suspends, pattern_suspends, statement_suspends};
pub use plan::{JumpTarget, LoopInfo, Op, Plan};

use std::rc::Rc;

use tracing::trace;

use crate::ast::{
    AssignmentTarget, BlockStatement, CatchClause, Expression, ForInit, ForOfLeft,
    ForOfStatement, ForStatement, Function, FunctionKind, LiteralValue, LogicalOp,
    MemberProperty, PropertyName, Statement, TryStatement, UnaryOp, VariableDeclaration,
    VariableKind,
};
use crate::error::JsError;
use crate::value::JsString;

/// Plan of a generator or async function, compiled on first use and cached on
/// the node
pub fn plan_for(function: &Function) -> Result<Rc<Plan>, JsError> {
    if let Some(plan) = function.plan.get() {
        return Ok(plan.clone());
    }
    let plan = Rc::new(compile_function(function)?);
    Ok(function.plan.get_or_init(|| plan).clone())
}

/// Compile a generator or async function body
pub fn compile_function(function: &Function) -> Result<Plan, JsError> {
    let mut compiler = Compiler::new(function.kind);
    compiler.compile_statements(&function.body)?;
    trace!(
        name = function.name.as_ref().map(|n| n.as_str()).unwrap_or("<anonymous>"),
        ops = compiler.ops.len(),
        "compiled plan"
    );
    Ok(Plan {
        ops: compiler.ops,
        loops: compiler.loops,
    })
}

/// Placeholder for a forward jump whose target is not known yet
#[derive(Debug, Clone, Copy)]
struct JumpPlaceholder(usize);

/// Compiler state for lowering a body to plan ops
struct Compiler {
    ops: Vec<Op>,
    loops: Vec<LoopInfo>,
    kind: FunctionKind,
}

impl Compiler {
    fn new(kind: FunctionKind) -> Self {
        Self {
            ops: Vec::new(),
            loops: Vec::new(),
            kind,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Emission helpers
    // ═══════════════════════════════════════════════════════════════════════════

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    fn emit_jump(&mut self, op: Op) -> JumpPlaceholder {
        JumpPlaceholder(self.emit(op))
    }

    /// Point a previously emitted jump at the current position
    fn patch(&mut self, placeholder: JumpPlaceholder) -> Result<(), JsError> {
        let target = self.here();
        let op = self
            .ops
            .get_mut(placeholder.0)
            .ok_or_else(|| JsError::internal_error("jump placeholder out of range"))?;
        match op {
            Op::Jump(t)
            | Op::JumpIfFalse(t)
            | Op::JumpIfFalsyKeep(t)
            | Op::JumpIfTruthyKeep(t)
            | Op::JumpIfNotNullishKeep(t)
            | Op::EnterCatch(t)
            | Op::EnterFinally(t)
            | Op::IteratorStep(t) => *t = target,
            other => {
                return Err(JsError::internal_error(format!(
                    "cannot patch non-jump op {:?}",
                    other
                )));
            }
        }
        Ok(())
    }

    fn begin_loop(&mut self, labels: &[JsString], is_loop: bool) -> usize {
        self.loops.push(LoopInfo {
            labels: labels.to_vec(),
            is_loop,
            break_target: 0,
            continue_target: 0,
        });
        let index = self.loops.len() - 1;
        self.emit(Op::EnterLoop(index));
        index
    }

    fn set_continue_target(&mut self, index: usize) -> Result<(), JsError> {
        let here = self.here();
        self.loop_info(index)?.continue_target = here;
        Ok(())
    }

    /// Emit `ExitLoop` and make the following op the break target
    fn end_loop(&mut self, index: usize) -> Result<(), JsError> {
        self.emit(Op::ExitLoop);
        let here = self.here();
        self.loop_info(index)?.break_target = here;
        Ok(())
    }

    fn loop_info(&mut self, index: usize) -> Result<&mut LoopInfo, JsError> {
        self.loops
            .get_mut(index)
            .ok_or_else(|| JsError::internal_error("loop index out of range"))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════════

    /// Compile a statement list, hoisting its function declarations first
    fn compile_statements(&mut self, stmts: &[Statement]) -> Result<(), JsError> {
        for stmt in stmts {
            if let Statement::FunctionDeclaration(function) = stmt {
                self.emit(Op::DeclareFunction(Rc::clone(function)));
            }
        }
        for stmt in stmts {
            if matches!(stmt, Statement::FunctionDeclaration(_)) {
                continue;
            }
            self.compile_statement(stmt, &[])?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Statement, labels: &[JsString]) -> Result<(), JsError> {
        if !statement_suspends(stmt) {
            self.emit(Op::Exec(Rc::new(stmt.clone())));
            return Ok(());
        }

        match stmt {
            Statement::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop);
            }
            Statement::VariableDeclaration(decl) => self.compile_declaration(decl)?,
            Statement::Block(block) => self.compile_block(block)?,
            Statement::If(s) => {
                self.compile_expression(&s.test)?;
                let to_else = self.emit_jump(Op::JumpIfFalse(0));
                self.compile_statement(&s.consequent, &[])?;
                match &s.alternate {
                    Some(alternate) => {
                        let to_end = self.emit_jump(Op::Jump(0));
                        self.patch(to_else)?;
                        self.compile_statement(alternate, &[])?;
                        self.patch(to_end)?;
                    }
                    None => self.patch(to_else)?,
                }
            }
            Statement::While(s) => {
                let index = self.begin_loop(labels, true);
                self.set_continue_target(index)?;
                let start = self.here();
                self.compile_expression(&s.test)?;
                let to_exit = self.emit_jump(Op::JumpIfFalse(0));
                self.compile_statement(&s.body, &[])?;
                self.emit(Op::Jump(start));
                self.patch(to_exit)?;
                self.end_loop(index)?;
            }
            Statement::DoWhile(s) => {
                let index = self.begin_loop(labels, true);
                let start = self.here();
                self.compile_statement(&s.body, &[])?;
                self.set_continue_target(index)?;
                self.compile_expression(&s.test)?;
                let to_exit = self.emit_jump(Op::JumpIfFalse(0));
                self.emit(Op::Jump(start));
                self.patch(to_exit)?;
                self.end_loop(index)?;
            }
            Statement::For(s) => self.compile_for(s, labels)?,
            Statement::ForOf(s) => self.compile_for_of(s, labels)?,
            Statement::Try(s) => self.compile_try(s)?,
            Statement::Return(value) => {
                match value {
                    Some(value) => self.compile_expression(value)?,
                    None => {
                        self.emit(Op::PushUndefined);
                    }
                }
                self.emit(Op::Return);
            }
            Statement::Throw(value) => {
                self.compile_expression(value)?;
                self.emit(Op::Throw);
            }
            Statement::Labeled(labeled) => {
                let mut labels = labels.to_vec();
                labels.push(labeled.label.clone());
                match labeled.body.as_ref() {
                    Statement::While(_)
                    | Statement::DoWhile(_)
                    | Statement::For(_)
                    | Statement::ForOf(_)
                    | Statement::Labeled(_) => self.compile_statement(&labeled.body, &labels)?,
                    body => {
                        let index = self.begin_loop(&labels, false);
                        self.compile_statement(body, &[])?;
                        self.end_loop(index)?;
                    }
                }
            }
            // Cannot suspend, handled by the Exec fast path above
            Statement::FunctionDeclaration(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Empty => {
                return Err(JsError::internal_error(
                    "suspension-free statement reached the lowering path",
                ));
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), JsError> {
        self.emit(Op::PushScope);
        self.compile_statements(&block.body)?;
        self.emit(Op::PopScope);
        Ok(())
    }

    fn compile_declaration(&mut self, decl: &VariableDeclaration) -> Result<(), JsError> {
        for declarator in &decl.declarations {
            if pattern_suspends(&declarator.id) {
                return Err(JsError::syntax_error(
                    "yield and await are not supported inside binding patterns",
                ));
            }
            match &declarator.init {
                Some(init) => {
                    self.compile_expression(init)?;
                    self.emit(Op::Declare {
                        pattern: Rc::new(declarator.id.clone()),
                        kind: decl.kind,
                    });
                }
                None => {
                    // Leaves hoisted `var` bindings untouched
                    self.emit(Op::Exec(Rc::new(Statement::VariableDeclaration(
                        VariableDeclaration {
                            kind: decl.kind,
                            declarations: vec![declarator.clone()],
                        },
                    ))));
                }
            }
        }
        Ok(())
    }

    fn compile_for(&mut self, s: &ForStatement, labels: &[JsString]) -> Result<(), JsError> {
        let lexical = matches!(
            &s.init,
            Some(ForInit::Variable(decl)) if decl.kind != VariableKind::Var
        );
        if lexical {
            self.emit(Op::PushScope);
        }
        match &s.init {
            Some(ForInit::Variable(decl)) => {
                self.compile_statement(&Statement::VariableDeclaration(decl.clone()), &[])?
            }
            Some(ForInit::Expression(expr)) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop);
            }
            None => {}
        }

        let index = self.begin_loop(labels, true);
        let test_start = self.here();
        let to_exit = match &s.test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.emit_jump(Op::JumpIfFalse(0)))
            }
            None => None,
        };
        self.compile_statement(&s.body, &[])?;
        self.set_continue_target(index)?;
        if lexical {
            self.emit(Op::RenewScope);
        }
        if let Some(update) = &s.update {
            self.compile_expression(update)?;
            self.emit(Op::Pop);
        }
        self.emit(Op::Jump(test_start));
        if let Some(to_exit) = to_exit {
            self.patch(to_exit)?;
        }
        self.end_loop(index)?;
        if lexical {
            self.emit(Op::PopScope);
        }
        Ok(())
    }

    fn compile_for_of(&mut self, s: &ForOfStatement, labels: &[JsString]) -> Result<(), JsError> {
        if let ForOfLeft::Variable(_, pattern) = &s.left {
            if pattern_suspends(pattern) {
                return Err(JsError::syntax_error(
                    "yield and await are not supported inside binding patterns",
                ));
            }
        }
        self.compile_expression(&s.right)?;
        let index = self.begin_loop(labels, true);
        self.emit(Op::GetIterator);
        self.set_continue_target(index)?;
        let step = self.here();
        let to_exit = self.emit_jump(Op::IteratorStep(0));
        self.emit(Op::PushScope);
        match &s.left {
            ForOfLeft::Variable(kind, pattern) => {
                self.emit(Op::Declare {
                    pattern: Rc::new(pattern.clone()),
                    kind: *kind,
                });
            }
            ForOfLeft::Identifier(name) => {
                self.emit(Op::Assign(name.clone()));
                self.emit(Op::Pop);
            }
        }
        self.compile_statement(&s.body, &[])?;
        self.emit(Op::PopScope);
        self.emit(Op::Jump(step));
        self.patch(to_exit)?;
        self.end_loop(index)?;
        Ok(())
    }

    fn compile_try(&mut self, s: &TryStatement) -> Result<(), JsError> {
        let to_finally = match &s.finalizer {
            Some(_) => Some(self.emit_jump(Op::EnterFinally(0))),
            None => None,
        };

        match &s.handler {
            Some(handler) => {
                let to_catch = self.emit_jump(Op::EnterCatch(0));
                self.compile_block(&s.block)?;
                self.emit(Op::ExitHandler);
                let to_after = self.emit_jump(Op::Jump(0));
                self.patch(to_catch)?;
                self.compile_catch(handler)?;
                self.patch(to_after)?;
            }
            None => self.compile_block(&s.block)?,
        }

        if let (Some(to_finally), Some(finalizer)) = (to_finally, &s.finalizer) {
            self.emit(Op::ExitHandler);
            self.emit(Op::PushNormalCompletion);
            self.patch(to_finally)?;
            self.compile_block(finalizer)?;
            self.emit(Op::EndFinally);
        }
        Ok(())
    }

    /// The machine enters here with the exception value on the stack
    fn compile_catch(&mut self, handler: &CatchClause) -> Result<(), JsError> {
        self.emit(Op::PushScope);
        match &handler.param {
            Some(param) => {
                if pattern_suspends(param) {
                    return Err(JsError::syntax_error(
                        "yield and await are not supported inside binding patterns",
                    ));
                }
                self.emit(Op::Declare {
                    pattern: Rc::new(param.clone()),
                    kind: VariableKind::Let,
                });
            }
            None => {
                self.emit(Op::Pop);
            }
        }
        self.compile_statements(&handler.body.body)?;
        self.emit(Op::PopScope);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════════

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), JsError> {
        if !expression_suspends(expr) {
            self.emit(Op::Eval(Rc::new(expr.clone())));
            return Ok(());
        }

        match expr {
            Expression::Yield(y) => {
                if self.kind != FunctionKind::Generator {
                    return Err(JsError::syntax_error(
                        "yield is only valid in generator functions",
                    ));
                }
                match &y.argument {
                    Some(argument) => self.compile_expression(argument)?,
                    None => {
                        self.emit(Op::PushUndefined);
                    }
                }
                self.emit(if y.delegate { Op::YieldDelegate } else { Op::Yield });
            }
            Expression::Await(argument) => {
                if self.kind != FunctionKind::Async {
                    return Err(JsError::syntax_error(
                        "await is only valid in async functions",
                    ));
                }
                self.compile_expression(argument)?;
                self.emit(Op::Await);
            }
            Expression::Array(elements) => {
                for element in elements {
                    match element {
                        Some(element) => self.compile_expression(element)?,
                        None => {
                            self.emit(Op::PushUndefined);
                        }
                    }
                }
                self.emit(Op::MakeArray(elements.len()));
            }
            Expression::Object(props) => {
                let mut kinds = Vec::with_capacity(props.len());
                for prop in props {
                    match &prop.key {
                        PropertyName::Static(name) => {
                            self.emit(Op::Const(LiteralValue::String(name.clone())));
                        }
                        PropertyName::Computed(key) => self.compile_expression(key)?,
                    }
                    self.compile_expression(&prop.value)?;
                    kinds.push(prop.kind);
                }
                self.emit(Op::MakeObject(kinds));
            }
            Expression::Unary(UnaryOp::Delete, operand) => match operand.as_ref() {
                Expression::Member(member) => {
                    self.compile_expression(&member.object)?;
                    let name = self.compile_member_key(&member.property)?;
                    self.emit(Op::Delete { name });
                }
                other => {
                    self.compile_expression(other)?;
                    self.emit(Op::Pop);
                    self.emit(Op::Const(LiteralValue::Boolean(true)));
                }
            },
            Expression::Unary(op, operand) => {
                self.compile_expression(operand)?;
                self.emit(Op::Unary(*op));
            }
            Expression::Binary(b) => {
                self.compile_expression(&b.left)?;
                self.compile_expression(&b.right)?;
                self.emit(Op::Binary(b.operator));
            }
            Expression::Logical(l) => {
                self.compile_expression(&l.left)?;
                let to_end = self.emit_jump(match l.operator {
                    LogicalOp::And => Op::JumpIfFalsyKeep(0),
                    LogicalOp::Or => Op::JumpIfTruthyKeep(0),
                    LogicalOp::NullishCoalesce => Op::JumpIfNotNullishKeep(0),
                });
                self.compile_expression(&l.right)?;
                self.patch(to_end)?;
            }
            Expression::Conditional(c) => {
                self.compile_expression(&c.test)?;
                let to_else = self.emit_jump(Op::JumpIfFalse(0));
                self.compile_expression(&c.consequent)?;
                let to_end = self.emit_jump(Op::Jump(0));
                self.patch(to_else)?;
                self.compile_expression(&c.alternate)?;
                self.patch(to_end)?;
            }
            Expression::Assignment(a) => match &a.target {
                AssignmentTarget::Identifier(name) => {
                    if let Some(op) = a.operator {
                        self.emit(Op::Eval(Rc::new(Expression::Identifier(name.clone()))));
                        self.compile_expression(&a.value)?;
                        self.emit(Op::Binary(op));
                    } else {
                        self.compile_expression(&a.value)?;
                    }
                    self.emit(Op::Assign(name.clone()));
                }
                AssignmentTarget::Member(member) => {
                    self.compile_expression(&member.object)?;
                    let name = self.compile_member_key(&member.property)?;
                    if let Some(op) = a.operator {
                        match &name {
                            Some(name) => {
                                self.emit(Op::Dup);
                                self.emit(Op::GetMember(name.clone()));
                            }
                            None => {
                                self.emit(Op::Dup2);
                                self.emit(Op::GetIndex);
                            }
                        }
                        self.compile_expression(&a.value)?;
                        self.emit(Op::Binary(op));
                    } else {
                        self.compile_expression(&a.value)?;
                    }
                    self.emit(match name {
                        Some(name) => Op::SetMember(name),
                        None => Op::SetIndex,
                    });
                }
            },
            Expression::Update(u) => match &u.target {
                AssignmentTarget::Member(member) => {
                    self.compile_expression(&member.object)?;
                    let name = self.compile_member_key(&member.property)?;
                    self.emit(Op::UpdateProperty {
                        name,
                        operator: u.operator,
                        prefix: u.prefix,
                    });
                }
                AssignmentTarget::Identifier(_) => {
                    return Err(JsError::internal_error(
                        "identifier update cannot contain a suspension point",
                    ));
                }
            },
            Expression::Sequence(exprs) => {
                let mut first = true;
                for e in exprs {
                    if !first {
                        self.emit(Op::Pop);
                    }
                    first = false;
                    self.compile_expression(e)?;
                }
                if first {
                    self.emit(Op::PushUndefined);
                }
            }
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                match self.compile_member_key(&member.property)? {
                    Some(name) => self.emit(Op::GetMember(name)),
                    None => self.emit(Op::GetIndex),
                };
            }
            Expression::Call(call) => {
                let with_this = match call.callee.as_ref() {
                    Expression::Member(member) => {
                        self.compile_expression(&member.object)?;
                        match self.compile_member_key(&member.property)? {
                            Some(name) => self.emit(Op::GetMemberKeep(name)),
                            None => self.emit(Op::GetIndexKeep),
                        };
                        true
                    }
                    callee => {
                        self.compile_expression(callee)?;
                        false
                    }
                };
                for argument in &call.arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call {
                    argc: call.arguments.len(),
                    with_this,
                });
            }
            Expression::New(call) => {
                self.compile_expression(&call.callee)?;
                for argument in &call.arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::New {
                    argc: call.arguments.len(),
                });
            }
            Expression::Literal(_)
            | Expression::Identifier(_)
            | Expression::This
            | Expression::Function(_) => {
                return Err(JsError::internal_error(
                    "suspension-free expression reached the lowering path",
                ));
            }
        }
        Ok(())
    }

    /// Static member names are returned; computed keys are compiled onto the stack
    fn compile_member_key(
        &mut self,
        property: &MemberProperty,
    ) -> Result<Option<JsString>, JsError> {
        match property {
            MemberProperty::Identifier(name) => Ok(Some(name.clone())),
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                Ok(None)
            }
        }
    }
}
