//! Abstract Syntax Tree node types
//!
//! The tree is produced once per parse and is immutable afterwards. Literal
//! text never lives in the tree itself: strings, template skeletons and
//! regular expressions sit in the [`Constants`] pool and nodes refer to them
//! by index.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/* ===================== Program ===================== */

/// A parsed program: statement list plus its constants pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub constants: Constants,
}

/// Literal side tables referenced by index from the tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constants {
    pub strings: Vec<String>,
    pub templates: Vec<TemplateLiteral>,
    pub regexes: Vec<RegexLiteral>,
}

impl Constants {
    pub fn string(&self, idx: usize) -> Option<&str> {
        self.strings.get(idx).map(String::as_str)
    }

    pub fn template(&self, idx: usize) -> Option<&TemplateLiteral> {
        self.templates.get(idx)
    }

    pub fn regex(&self, idx: usize) -> Option<&RegexLiteral> {
        self.regexes.get(idx)
    }
}

/// Template literal skeleton: `parts.len() == exprs.len() + 1`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateLiteral {
    pub parts: Vec<String>,
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexLiteral {
    pub pattern: String,
    pub flags: String,
}

/* ===================== Declarations ===================== */

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "var" => Some(VarKind::Var),
            "let" => Some(VarKind::Let),
            "const" => Some(VarKind::Const),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

/// Function literal shared by declarations, expressions, arrows and methods
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Rest parameter, always the last one
    pub rest: Option<String>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_arrow: bool,
    /// Named function expressions see their own name inside the body
    pub binds_name: bool,
}

/// Uniform loop node all loop forms lower to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDef {
    /// Evaluate `test` before the first iteration (false for do-while)
    pub check_first: bool,
    /// Internal statements run once in the loop head scope
    pub setup: Vec<Stmt>,
    pub init: Option<Box<Stmt>>,
    pub test: Option<Expr>,
    pub step: Option<Expr>,
    /// Statements run at the start of every iteration, before the body
    pub pre_step: Vec<Stmt>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default` branch
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/* ===================== Statements ===================== */

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Expr {
        expr: Expr,
    },
    Declare {
        kind: VarKind,
        decls: Vec<Declarator>,
    },
    Function {
        def: Arc<FunctionDef>,
    },
    Return {
        value: Option<Expr>,
    },
    Throw {
        value: Expr,
    },
    If {
        test: Expr,
        then_s: Vec<Stmt>,
        else_s: Option<Vec<Stmt>>,
    },
    Block {
        body: Vec<Stmt>,
    },
    Loop {
        def: Box<LoopDef>,
    },
    Break,
    Continue,
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        body: Vec<Stmt>,
        catch_var: Option<String>,
        catch_body: Option<Vec<Stmt>>,
        finally: Option<Vec<Stmt>>,
    },
    Empty,
}

/* ===================== Operators ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

/// Binary operator for short-circuit evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Nullish,
}

impl AssignOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "=" => AssignOp::Assign,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Div,
            "%=" => AssignOp::Rem,
            "**=" => AssignOp::Exp,
            "&=" => AssignOp::BitAnd,
            "|=" => AssignOp::BitOr,
            "^=" => AssignOp::BitXor,
            "<<=" => AssignOp::Shl,
            ">>=" => AssignOp::Shr,
            ">>>=" => AssignOp::UShr,
            "&&=" => AssignOp::And,
            "||=" => AssignOp::Or,
            "??=" => AssignOp::Nullish,
            _ => return None,
        })
    }

    /// Arithmetic operator applied by a compound assignment
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Rem => BinaryOp::Rem,
            AssignOp::Exp => BinaryOp::Exp,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::UShr => BinaryOp::UShr,
            AssignOp::Assign | AssignOp::And | AssignOp::Or | AssignOp::Nullish => return None,
        })
    }
}

/// Executor-internal operations produced by loop lowering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    /// Snapshot the values of an iterable into an iterator object
    IterateValues,
    /// Snapshot the enumerable keys of an object into an iterator object
    IterateKeys,
    /// Advance an iterator; evaluates to `false` once exhausted
    IterStep,
    /// Current value of an iterator
    IterValue,
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum MemberKey {
    Name { name: String },
    Computed { expr: Box<Expr> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum PropKey {
    Static { name: String },
    Computed { expr: Expr },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Property {
    KeyValue { key: PropKey, value: Expr },
    Spread { arg: Expr },
}

/// Expression AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Number {
        v: f64,
    },
    NaN,
    Infinity,
    BigInt {
        digits: String,
    },
    Str {
        idx: usize,
    },
    Template {
        idx: usize,
    },
    Regex {
        idx: usize,
    },
    Bool {
        v: bool,
    },
    Null,
    Undefined,
    Ident {
        name: String,
    },
    This,
    Array {
        elements: Vec<Expr>,
    },
    Object {
        props: Vec<Property>,
    },
    Member {
        object: Box<Expr>,
        property: MemberKey,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Sequence {
        exprs: Vec<Expr>,
    },
    Function {
        def: Arc<FunctionDef>,
    },
    Spread {
        arg: Box<Expr>,
    },
    Await {
        arg: Box<Expr>,
    },
    Intrinsic {
        op: Intrinsic,
        arg: Box<Expr>,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident { name: name.into() }
    }

    pub fn intrinsic(op: Intrinsic, arg: Expr) -> Self {
        Expr::Intrinsic {
            op,
            arg: Box::new(arg),
        }
    }

    /// Whether this expression can be the target of an assignment
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Ident { .. } => true,
            Expr::Member { object, optional, .. } => !*optional && !object.has_optional_link(),
            _ => false,
        }
    }

    fn has_optional_link(&self) -> bool {
        match self {
            Expr::Member {
                object, optional, ..
            } => *optional || object.has_optional_link(),
            Expr::Call {
                callee, optional, ..
            } => *optional || callee.has_optional_link(),
            _ => false,
        }
    }
}
