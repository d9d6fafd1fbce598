//! Suspension-point analysis
//!
//! Decides which parts of a body must be lowered into plan ops. Nested
//! functions are opaque: a `yield` inside them belongs to a different body.

use crate::ast::{
    AssignmentTarget, Expression, ForInit, ForOfLeft, MemberExpression, MemberProperty, Pattern,
    PropertyName, Statement, VariableDeclaration,
};

pub fn statement_suspends(stmt: &Statement) -> bool {
    match stmt {
        Statement::VariableDeclaration(decl) => declaration_suspends(decl),
        Statement::FunctionDeclaration(_) => false,
        Statement::Block(block) => block.body.iter().any(statement_suspends),
        Statement::If(s) => {
            expression_suspends(&s.test)
                || statement_suspends(&s.consequent)
                || s.alternate.as_deref().is_some_and(statement_suspends)
        }
        Statement::For(s) => {
            let init = match &s.init {
                Some(ForInit::Variable(decl)) => declaration_suspends(decl),
                Some(ForInit::Expression(e)) => expression_suspends(e),
                None => false,
            };
            init || s.test.as_ref().is_some_and(expression_suspends)
                || s.update.as_ref().is_some_and(expression_suspends)
                || statement_suspends(&s.body)
        }
        Statement::ForOf(s) => {
            let left = match &s.left {
                ForOfLeft::Variable(_, pattern) => pattern_suspends(pattern),
                ForOfLeft::Identifier(_) => false,
            };
            left || expression_suspends(&s.right) || statement_suspends(&s.body)
        }
        Statement::While(s) => expression_suspends(&s.test) || statement_suspends(&s.body),
        Statement::DoWhile(s) => expression_suspends(&s.test) || statement_suspends(&s.body),
        Statement::Try(s) => {
            s.block.body.iter().any(statement_suspends)
                || s.handler.as_ref().is_some_and(|h| {
                    h.param.as_ref().is_some_and(pattern_suspends)
                        || h.body.body.iter().any(statement_suspends)
                })
                || s
                    .finalizer
                    .as_ref()
                    .is_some_and(|f| f.body.iter().any(statement_suspends))
        }
        Statement::Return(value) => value.as_ref().is_some_and(expression_suspends),
        Statement::Throw(e) | Statement::Expression(e) => expression_suspends(e),
        Statement::Labeled(s) => statement_suspends(&s.body),
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty => false,
    }
}

fn declaration_suspends(decl: &VariableDeclaration) -> bool {
    decl.declarations.iter().any(|d| {
        pattern_suspends(&d.id) || d.init.as_ref().is_some_and(expression_suspends)
    })
}

pub fn pattern_suspends(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Identifier(_) => false,
        Pattern::Object(props) => props.iter().any(|p| {
            matches!(&p.key, PropertyName::Computed(e) if expression_suspends(e))
                || pattern_suspends(&p.value)
        }),
        Pattern::Array(elements) => elements.iter().flatten().any(pattern_suspends),
        Pattern::Rest(inner) => pattern_suspends(inner),
        Pattern::Assignment(inner, default) => {
            pattern_suspends(inner) || expression_suspends(default)
        }
    }
}

fn member_suspends(member: &MemberExpression) -> bool {
    expression_suspends(&member.object)
        || matches!(&member.property, MemberProperty::Expression(e) if expression_suspends(e))
}

fn target_suspends(target: &AssignmentTarget) -> bool {
    match target {
        AssignmentTarget::Identifier(_) => false,
        AssignmentTarget::Member(member) => member_suspends(member),
    }
}

pub fn expression_suspends(expr: &Expression) -> bool {
    match expr {
        Expression::Yield(_) | Expression::Await(_) => true,
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This
        | Expression::Function(_) => false,
        Expression::Array(elements) => elements.iter().flatten().any(expression_suspends),
        Expression::Object(props) => props.iter().any(|p| {
            matches!(&p.key, PropertyName::Computed(e) if expression_suspends(e))
                || expression_suspends(&p.value)
        }),
        Expression::Unary(_, operand) => expression_suspends(operand),
        Expression::Binary(b) => expression_suspends(&b.left) || expression_suspends(&b.right),
        Expression::Logical(l) => expression_suspends(&l.left) || expression_suspends(&l.right),
        Expression::Conditional(c) => {
            expression_suspends(&c.test)
                || expression_suspends(&c.consequent)
                || expression_suspends(&c.alternate)
        }
        Expression::Assignment(a) => target_suspends(&a.target) || expression_suspends(&a.value),
        Expression::Update(u) => target_suspends(&u.target),
        Expression::Sequence(exprs) => exprs.iter().any(expression_suspends),
        Expression::Member(member) => member_suspends(member),
        Expression::Call(call) | Expression::New(call) => {
            expression_suspends(&call.callee) || call.arguments.iter().any(expression_suspends)
        }
    }
}
