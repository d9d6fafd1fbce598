//! Resumable plan format
//!
//! A plan is the compiled form of a generator or async function body. It is a
//! flat list of stack-machine ops. Statements and expressions that cannot
//! suspend are embedded whole (`Exec`/`Eval`) and run atomically by the
//! tree-walking evaluator; everything on the path to a `yield`/`await` is
//! lowered so the machine can save its position and operands mid-expression.

use std::rc::Rc;

use crate::ast::{
    BinaryOp, Expression, Function, LiteralValue, Pattern, PropertyKind, Statement, UnaryOp,
    UpdateOp, VariableKind,
};
use crate::value::JsString;

/// Instruction offset inside [`Plan::ops`]
pub type JumpTarget = usize;

/// Plan instruction
#[derive(Debug, Clone)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════
    // Atomic fragments
    // ═══════════════════════════════════════════════════════════════════════════
    /// Run a statement that contains no suspension point
    Exec(Rc<Statement>),

    /// Evaluate an expression that contains no suspension point; push the result
    Eval(Rc<Expression>),

    // ═══════════════════════════════════════════════════════════════════════════
    // Operand stack
    // ═══════════════════════════════════════════════════════════════════════════
    Const(LiteralValue),
    PushUndefined,
    Pop,
    /// Duplicate the top value
    Dup,
    /// Duplicate the top two values, preserving order
    Dup2,

    // ═══════════════════════════════════════════════════════════════════════════
    // Suspension points
    // ═══════════════════════════════════════════════════════════════════════════
    /// Pop a value and suspend; the resumption value is pushed on `next(v)`
    Yield,
    /// Pop an iterable and forward next/throw/return to its iterator until done
    YieldDelegate,
    /// Pop a value and suspend until it settles
    Await,

    // ═══════════════════════════════════════════════════════════════════════════
    // Jumps
    // ═══════════════════════════════════════════════════════════════════════════
    Jump(JumpTarget),
    /// Pop; jump when falsy
    JumpIfFalse(JumpTarget),
    /// Jump keeping the top value when falsy, otherwise pop it (`&&`)
    JumpIfFalsyKeep(JumpTarget),
    /// Jump keeping the top value when truthy, otherwise pop it (`||`)
    JumpIfTruthyKeep(JumpTarget),
    /// Jump keeping the top value unless nullish, otherwise pop it (`??`)
    JumpIfNotNullishKeep(JumpTarget),

    // ═══════════════════════════════════════════════════════════════════════════
    // Scopes & bindings
    // ═══════════════════════════════════════════════════════════════════════════
    PushScope,
    PopScope,
    /// Replace the innermost scope with a per-iteration copy
    RenewScope,
    /// Instantiate a hoisted function declaration in the current scope
    DeclareFunction(Rc<Function>),
    /// Pop a value and bind it to a pattern
    Declare {
        pattern: Rc<Pattern>,
        kind: VariableKind,
    },
    /// Assign the top value to a name, leaving it on the stack
    Assign(JsString),

    // ═══════════════════════════════════════════════════════════════════════════
    // Property access
    // ═══════════════════════════════════════════════════════════════════════════
    /// obj -> obj.name
    GetMember(JsString),
    /// obj -> obj, obj.name (method call receiver stays below the callee)
    GetMemberKeep(JsString),
    /// obj key -> obj[key]
    GetIndex,
    /// obj key -> obj, obj[key]
    GetIndexKeep,
    /// obj value -> value
    SetMember(JsString),
    /// obj key value -> value
    SetIndex,
    /// obj [key] -> result of `++`/`--` on the property
    UpdateProperty {
        name: Option<JsString>,
        operator: UpdateOp,
        prefix: bool,
    },
    /// obj [key] -> true
    Delete { name: Option<JsString> },

    // ═══════════════════════════════════════════════════════════════════════════
    // Operators, calls & literals
    // ═══════════════════════════════════════════════════════════════════════════
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// [this] callee args... -> result
    Call { argc: usize, with_this: bool },
    /// callee args... -> instance
    New { argc: usize },
    /// elements... -> array
    MakeArray(usize),
    /// (key value)... -> object
    MakeObject(Vec<PropertyKind>),

    // ═══════════════════════════════════════════════════════════════════════════
    // Completions & handlers
    // ═══════════════════════════════════════════════════════════════════════════
    /// Pop the return value and unwind through pending `finally` blocks
    Return,
    /// Pop a value and throw it
    Throw,
    /// Install a catch handler starting at the target
    EnterCatch(JumpTarget),
    /// Install a finally handler starting at the target
    EnterFinally(JumpTarget),
    /// Remove the innermost handler after its protected block completed normally
    ExitHandler,
    /// Record a normal entry into the following finally block
    PushNormalCompletion,
    /// Resume whatever completion was interrupted by the finally block
    EndFinally,

    // ═══════════════════════════════════════════════════════════════════════════
    // Loops & iteration
    // ═══════════════════════════════════════════════════════════════════════════
    /// Push the break/continue frame described by `Plan::loops[index]`
    EnterLoop(usize),
    ExitLoop,
    /// Pop an iterable and attach its iterator to the innermost loop frame
    GetIterator,
    /// Step the innermost loop's iterator; push the value or jump when done
    IteratorStep(JumpTarget),
}

/// Static description of a breakable statement
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub labels: Vec<JsString>,
    /// Labeled blocks accept labeled `break` only
    pub is_loop: bool,
    pub break_target: JumpTarget,
    pub continue_target: JumpTarget,
}

/// Compiled body of a generator or async function
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub ops: Vec<Op>,
    pub loops: Vec<LoopInfo>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
