//! Typed program tree consumed by the interpreter
//!
//! The runtime never parses source text. An external parser (or a host building
//! programs directly, see [`build`]) produces these nodes and hands a [`Program`]
//! to the interpreter, which treats it as read-only.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::compiler::Plan;
use crate::value::JsString;

/// A complete script
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone)]
pub enum Statement {
    // Declarations
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<Function>),

    // Control Flow
    Block(BlockStatement),
    If(IfStatement),
    For(ForStatement),
    ForOf(ForOfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    Try(TryStatement),

    // Jump
    Return(Option<Expression>),
    Break(Option<JsString>),
    Continue(Option<JsString>),
    Throw(Expression),

    // Other
    Expression(Expression),
    Labeled(LabeledStatement),
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
}

/// A function node shared by declarations and expressions.
///
/// Function objects keep an `Rc` to their node; generator and async bodies are
/// compiled once per node and the plan lives as long as the node does.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<JsString>,
    pub params: Vec<Pattern>,
    pub body: Vec<Statement>,
    pub kind: FunctionKind,
    /// Arrow functions have no own `this` and cannot be constructed
    pub arrow: bool,
    pub(crate) plan: OnceCell<Rc<Plan>>,
}

impl Function {
    pub fn new(
        name: Option<JsString>,
        params: Vec<Pattern>,
        body: Vec<Statement>,
        kind: FunctionKind,
        arrow: bool,
    ) -> Self {
        Self {
            name,
            params,
            body,
            kind,
            arrow,
            plan: OnceCell::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Generator,
    Async,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
}

#[derive(Debug, Clone)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub struct ForOfStatement {
    pub left: ForOfLeft,
    pub right: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone)]
pub enum ForOfLeft {
    Variable(VariableKind, Pattern),
    Identifier(JsString),
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
}

#[derive(Debug, Clone)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: BlockStatement,
}

#[derive(Debug, Clone)]
pub struct LabeledStatement {
    pub label: JsString,
    pub body: Box<Statement>,
}

// ============ PATTERNS ============

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(JsString),
    Object(Vec<ObjectPatternProperty>),
    /// `None` entries are elisions (`[, b]`)
    Array(Vec<Option<Pattern>>),
    /// Only valid as the last array element or parameter
    Rest(Box<Pattern>),
    Assignment(Box<Pattern>, Box<Expression>),
}

#[derive(Debug, Clone)]
pub struct ObjectPatternProperty {
    pub key: PropertyName,
    pub value: Pattern,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone)]
pub enum Expression {
    // Literals
    Literal(LiteralValue),
    Array(Vec<Option<Expression>>),
    Object(Vec<ObjectProperty>),
    Function(Rc<Function>),

    // Identifiers
    Identifier(JsString),
    This,

    // Operations
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Assignment(AssignmentExpression),
    Update(UpdateExpression),
    Sequence(Vec<Expression>),

    // Access
    Member(MemberExpression),
    Call(CallExpression),
    New(CallExpression),

    // Suspension points
    Yield(YieldExpression),
    Await(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
}

#[derive(Debug, Clone)]
pub struct ObjectProperty {
    pub key: PropertyName,
    pub value: Expression,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone)]
pub enum PropertyName {
    Static(JsString),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,  // -
    Plus,   // +
    Not,    // !
    BitNot, // ~
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
    Exp, // **

    // Comparison
    Eq,          // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=

    // Bitwise
    BitAnd,  // &
    BitOr,   // |
    BitXor,  // ^
    LShift,  // <<
    RShift,  // >>
    URShift, // >>>

    // Other
    In,
    Instanceof,
}

#[derive(Debug, Clone)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,             // &&
    Or,              // ||
    NullishCoalesce, // ??
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    /// `None` for plain `=`, otherwise the operator of a compound assignment
    pub operator: Option<BinaryOp>,
    pub target: AssignmentTarget,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    Identifier(JsString),
    Member(MemberExpression),
}

#[derive(Debug, Clone)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub target: AssignmentTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: MemberProperty,
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Identifier(JsString),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct YieldExpression {
    pub argument: Option<Box<Expression>>,
    pub delegate: bool,
}

/// Terse constructors for building programs without a parser.
///
/// ```
/// use jsrun::ast::build::*;
///
/// let program = program(vec![
///     let_("x", num(1.0)),
///     expr(assign("x", add(ident("x"), num(2.0)))),
/// ]);
/// assert_eq!(program.body.len(), 2);
/// ```
pub mod build {
    use super::*;

    pub fn program(body: Vec<Statement>) -> Program {
        Program { body }
    }

    // ---- literals & identifiers ----

    pub fn num(n: f64) -> Expression {
        Expression::Literal(LiteralValue::Number(n))
    }

    pub fn str_(s: &str) -> Expression {
        Expression::Literal(LiteralValue::String(JsString::from(s)))
    }

    pub fn bool_(b: bool) -> Expression {
        Expression::Literal(LiteralValue::Boolean(b))
    }

    pub fn null() -> Expression {
        Expression::Literal(LiteralValue::Null)
    }

    pub fn undefined() -> Expression {
        Expression::Literal(LiteralValue::Undefined)
    }

    pub fn ident(name: &str) -> Expression {
        Expression::Identifier(JsString::from(name))
    }

    pub fn this() -> Expression {
        Expression::This
    }

    pub fn array(elements: Vec<Expression>) -> Expression {
        Expression::Array(elements.into_iter().map(Some).collect())
    }

    pub fn object(props: Vec<(&str, Expression)>) -> Expression {
        Expression::Object(
            props
                .into_iter()
                .map(|(key, value)| ObjectProperty {
                    key: PropertyName::Static(JsString::from(key)),
                    value,
                    kind: PropertyKind::Init,
                })
                .collect(),
        )
    }

    pub fn getter(key: &str, body: Vec<Statement>) -> ObjectProperty {
        ObjectProperty {
            key: PropertyName::Static(JsString::from(key)),
            value: func(&[], body),
            kind: PropertyKind::Get,
        }
    }

    pub fn setter(key: &str, param: &str, body: Vec<Statement>) -> ObjectProperty {
        ObjectProperty {
            key: PropertyName::Static(JsString::from(key)),
            value: func(&[param], body),
            kind: PropertyKind::Set,
        }
    }

    // ---- functions ----

    fn function_node(
        name: Option<&str>,
        params: &[&str],
        body: Vec<Statement>,
        kind: FunctionKind,
        arrow: bool,
    ) -> Rc<Function> {
        Rc::new(Function::new(
            name.map(JsString::from),
            params.iter().map(|p| pat(p)).collect(),
            body,
            kind,
            arrow,
        ))
    }

    pub fn func(params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(function_node(None, params, body, FunctionKind::Normal, false))
    }

    pub fn arrow(params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(function_node(None, params, body, FunctionKind::Normal, true))
    }

    /// Arrow function with an expression body
    pub fn arrow_expr(params: &[&str], body: Expression) -> Expression {
        arrow(params, vec![ret(body)])
    }

    pub fn gen_func(params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(function_node(None, params, body, FunctionKind::Generator, false))
    }

    pub fn async_func(params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(function_node(None, params, body, FunctionKind::Async, false))
    }

    pub fn async_arrow(params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(function_node(None, params, body, FunctionKind::Async, true))
    }

    pub fn function_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
        Statement::FunctionDeclaration(function_node(
            Some(name),
            params,
            body,
            FunctionKind::Normal,
            false,
        ))
    }

    pub fn generator_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
        Statement::FunctionDeclaration(function_node(
            Some(name),
            params,
            body,
            FunctionKind::Generator,
            false,
        ))
    }

    pub fn async_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
        Statement::FunctionDeclaration(function_node(
            Some(name),
            params,
            body,
            FunctionKind::Async,
            false,
        ))
    }

    /// Declaration with full control over parameter patterns
    pub fn function_with_params(
        name: &str,
        params: Vec<Pattern>,
        body: Vec<Statement>,
        kind: FunctionKind,
    ) -> Statement {
        Statement::FunctionDeclaration(Rc::new(Function::new(
            Some(JsString::from(name)),
            params,
            body,
            kind,
            false,
        )))
    }

    // ---- operators ----

    pub fn binary(operator: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary(BinaryExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn add(left: Expression, right: Expression) -> Expression {
        binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Expression, right: Expression) -> Expression {
        binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Expression, right: Expression) -> Expression {
        binary(BinaryOp::Mul, left, right)
    }

    pub fn lt(left: Expression, right: Expression) -> Expression {
        binary(BinaryOp::Lt, left, right)
    }

    pub fn strict_eq(left: Expression, right: Expression) -> Expression {
        binary(BinaryOp::StrictEq, left, right)
    }

    pub fn logical(operator: LogicalOp, left: Expression, right: Expression) -> Expression {
        Expression::Logical(LogicalExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, argument: Expression) -> Expression {
        Expression::Unary(op, Box::new(argument))
    }

    pub fn typeof_(argument: Expression) -> Expression {
        unary(UnaryOp::Typeof, argument)
    }

    pub fn cond(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
        Expression::Conditional(ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    pub fn assign(name: &str, value: Expression) -> Expression {
        Expression::Assignment(AssignmentExpression {
            operator: None,
            target: AssignmentTarget::Identifier(JsString::from(name)),
            value: Box::new(value),
        })
    }

    pub fn assign_op(operator: BinaryOp, name: &str, value: Expression) -> Expression {
        Expression::Assignment(AssignmentExpression {
            operator: Some(operator),
            target: AssignmentTarget::Identifier(JsString::from(name)),
            value: Box::new(value),
        })
    }

    pub fn assign_member(object: Expression, property: &str, value: Expression) -> Expression {
        Expression::Assignment(AssignmentExpression {
            operator: None,
            target: AssignmentTarget::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Identifier(JsString::from(property)),
            }),
            value: Box::new(value),
        })
    }

    pub fn assign_index(object: Expression, index: Expression, value: Expression) -> Expression {
        Expression::Assignment(AssignmentExpression {
            operator: None,
            target: AssignmentTarget::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Expression(Box::new(index)),
            }),
            value: Box::new(value),
        })
    }

    pub fn incr(name: &str) -> Expression {
        Expression::Update(UpdateExpression {
            operator: UpdateOp::Increment,
            prefix: false,
            target: AssignmentTarget::Identifier(JsString::from(name)),
        })
    }

    // ---- access & calls ----

    pub fn member(object: Expression, property: &str) -> Expression {
        Expression::Member(MemberExpression {
            object: Box::new(object),
            property: MemberProperty::Identifier(JsString::from(property)),
        })
    }

    pub fn index(object: Expression, index: Expression) -> Expression {
        Expression::Member(MemberExpression {
            object: Box::new(object),
            property: MemberProperty::Expression(Box::new(index)),
        })
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
        Expression::Call(CallExpression {
            callee: Box::new(callee),
            arguments,
        })
    }

    /// `object.method(arguments)`
    pub fn method(object: Expression, name: &str, arguments: Vec<Expression>) -> Expression {
        call(member(object, name), arguments)
    }

    pub fn new_(callee: Expression, arguments: Vec<Expression>) -> Expression {
        Expression::New(CallExpression {
            callee: Box::new(callee),
            arguments,
        })
    }

    pub fn yield_(argument: Expression) -> Expression {
        Expression::Yield(YieldExpression {
            argument: Some(Box::new(argument)),
            delegate: false,
        })
    }

    pub fn yield_empty() -> Expression {
        Expression::Yield(YieldExpression {
            argument: None,
            delegate: false,
        })
    }

    pub fn yield_star(argument: Expression) -> Expression {
        Expression::Yield(YieldExpression {
            argument: Some(Box::new(argument)),
            delegate: true,
        })
    }

    pub fn await_(argument: Expression) -> Expression {
        Expression::Await(Box::new(argument))
    }

    // ---- patterns ----

    pub fn pat(name: &str) -> Pattern {
        Pattern::Identifier(JsString::from(name))
    }

    pub fn array_pat(elements: Vec<Option<Pattern>>) -> Pattern {
        Pattern::Array(elements)
    }

    pub fn object_pat(props: Vec<(&str, Pattern)>) -> Pattern {
        Pattern::Object(
            props
                .into_iter()
                .map(|(key, value)| ObjectPatternProperty {
                    key: PropertyName::Static(JsString::from(key)),
                    value,
                })
                .collect(),
        )
    }

    pub fn rest_pat(inner: Pattern) -> Pattern {
        Pattern::Rest(Box::new(inner))
    }

    pub fn default_pat(inner: Pattern, default: Expression) -> Pattern {
        Pattern::Assignment(Box::new(inner), Box::new(default))
    }

    // ---- statements ----

    pub fn expr(expression: Expression) -> Statement {
        Statement::Expression(expression)
    }

    fn declare(kind: VariableKind, id: Pattern, init: Option<Expression>) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            kind,
            declarations: vec![VariableDeclarator { id, init }],
        })
    }

    pub fn let_(name: &str, init: Expression) -> Statement {
        declare(VariableKind::Let, pat(name), Some(init))
    }

    pub fn const_(name: &str, init: Expression) -> Statement {
        declare(VariableKind::Const, pat(name), Some(init))
    }

    pub fn var(name: &str, init: Expression) -> Statement {
        declare(VariableKind::Var, pat(name), Some(init))
    }

    pub fn var_uninit(name: &str) -> Statement {
        declare(VariableKind::Var, pat(name), None)
    }

    pub fn let_pat(pattern: Pattern, init: Expression) -> Statement {
        declare(VariableKind::Let, pattern, Some(init))
    }

    pub fn block(body: Vec<Statement>) -> Statement {
        Statement::Block(BlockStatement { body })
    }

    pub fn if_(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
        Statement::If(IfStatement {
            test,
            consequent: Box::new(consequent),
            alternate: alternate.map(Box::new),
        })
    }

    pub fn while_(test: Expression, body: Vec<Statement>) -> Statement {
        Statement::While(WhileStatement {
            test,
            body: Box::new(block(body)),
        })
    }

    pub fn do_while(body: Vec<Statement>, test: Expression) -> Statement {
        Statement::DoWhile(DoWhileStatement {
            body: Box::new(block(body)),
            test,
        })
    }

    /// `for (let name = init; test; update) { body }`
    pub fn for_let(
        name: &str,
        init: Expression,
        test: Expression,
        update: Expression,
        body: Vec<Statement>,
    ) -> Statement {
        Statement::For(ForStatement {
            init: Some(ForInit::Variable(VariableDeclaration {
                kind: VariableKind::Let,
                declarations: vec![VariableDeclarator {
                    id: pat(name),
                    init: Some(init),
                }],
            })),
            test: Some(test),
            update: Some(update),
            body: Box::new(block(body)),
        })
    }

    /// `for (const name of iterable) { body }`
    pub fn for_of(name: &str, iterable: Expression, body: Vec<Statement>) -> Statement {
        Statement::ForOf(ForOfStatement {
            left: ForOfLeft::Variable(VariableKind::Const, pat(name)),
            right: iterable,
            body: Box::new(block(body)),
        })
    }

    pub fn ret(value: Expression) -> Statement {
        Statement::Return(Some(value))
    }

    pub fn ret_empty() -> Statement {
        Statement::Return(None)
    }

    pub fn throw(value: Expression) -> Statement {
        Statement::Throw(value)
    }

    pub fn break_() -> Statement {
        Statement::Break(None)
    }

    pub fn break_label(label: &str) -> Statement {
        Statement::Break(Some(JsString::from(label)))
    }

    pub fn continue_() -> Statement {
        Statement::Continue(None)
    }

    pub fn continue_label(label: &str) -> Statement {
        Statement::Continue(Some(JsString::from(label)))
    }

    pub fn labeled(label: &str, body: Statement) -> Statement {
        Statement::Labeled(LabeledStatement {
            label: JsString::from(label),
            body: Box::new(body),
        })
    }

    pub fn try_catch(block: Vec<Statement>, param: &str, handler: Vec<Statement>) -> Statement {
        Statement::Try(TryStatement {
            block: BlockStatement { body: block },
            handler: Some(CatchClause {
                param: Some(pat(param)),
                body: BlockStatement { body: handler },
            }),
            finalizer: None,
        })
    }

    pub fn try_finally(block: Vec<Statement>, finalizer: Vec<Statement>) -> Statement {
        Statement::Try(TryStatement {
            block: BlockStatement { body: block },
            handler: None,
            finalizer: Some(BlockStatement { body: finalizer }),
        })
    }

    pub fn try_catch_finally(
        block: Vec<Statement>,
        param: &str,
        handler: Vec<Statement>,
        finalizer: Vec<Statement>,
    ) -> Statement {
        Statement::Try(TryStatement {
            block: BlockStatement { body: block },
            handler: Some(CatchClause {
                param: Some(pat(param)),
                body: BlockStatement { body: handler },
            }),
            finalizer: Some(BlockStatement { body: finalizer }),
        })
    }
}
