// AST (Abstract Syntax Tree) definitions for Kaleidoscope

use std::fmt;

/// Byte offset into the current input unit, used for diagnostics only.
///
/// Offsets count across lines and restart at zero for every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(pub usize);

impl Pos {
    pub fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric literal; every value in the language is an `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct NumberExpr {
    pub value: f64,
    pub pos: Pos,
}

/// Reference to a named variable or argument
#[derive(Debug, Clone, PartialEq)]
pub struct VariableExpr {
    pub name: String,
    pub pos: Pos,
}

/// Application of a user-declared unary operator
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: char,
    pub operand: Box<Expr>,
    pub pos: Pos,
}

/// Built-in or user-declared binary operator
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: char,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<Expr>,
    pub pos: Pos,
}

/// `if cond then a else b`
#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr {
    pub condition: Box<Expr>,
    pub then_branch: Box<Expr>,
    pub else_branch: Box<Expr>,
    pub pos: Pos,
}

/// `for counter = start, end [, step] in body`
///
/// A missing step means 1.0; filling it in is left to code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr {
    pub counter: String,
    pub start: Box<Expr>,
    pub end: Box<Expr>,
    pub step: Option<Box<Expr>>,
    pub body: Box<Expr>,
    pub pos: Pos,
}

/// One `name [= init]` entry of a `var` expression
#[derive(Debug, Clone, PartialEq)]
pub struct VarBinding {
    pub name: String,
    pub init: Option<Expr>,
}

/// `var a = 1, b in body`
#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr {
    pub bindings: Vec<VarBinding>,
    pub body: Box<Expr>,
    pub pos: Pos,
}

/// Expression nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(NumberExpr),
    Variable(VariableExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    If(IfExpr),
    For(ForExpr),
    Var(VarExpr),
}

impl Expr {
    /// Get the source position of this node
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Number(e) => e.pos,
            Expr::Variable(e) => e.pos,
            Expr::Unary(e) => e.pos,
            Expr::Binary(e) => e.pos,
            Expr::Call(e) => e.pos,
            Expr::If(e) => e.pos,
            Expr::For(e) => e.pos,
            Expr::Var(e) => e.pos,
        }
    }
}

/// Compact s-expression form, e.g. `(+ 2 (* 3 4))`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n.value),
            Expr::Variable(v) => write!(f, "{}", v.name),
            Expr::Unary(u) => write!(f, "({} {})", u.op, u.operand),
            Expr::Binary(b) => write!(f, "({} {} {})", b.op, b.left, b.right),
            Expr::Call(c) => {
                write!(f, "(call {}", c.callee)?;
                for arg in &c.args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::If(i) => write!(
                f,
                "(if {} {} {})",
                i.condition, i.then_branch, i.else_branch
            ),
            Expr::For(l) => {
                write!(f, "(for {} {} {}", l.counter, l.start, l.end)?;
                if let Some(step) = &l.step {
                    write!(f, " {}", step)?;
                }
                write!(f, " {})", l.body)
            }
            Expr::Var(v) => {
                write!(f, "(var (")?;
                for (i, binding) in v.bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match &binding.init {
                        Some(init) => write!(f, "({} {})", binding.name, init)?,
                        None => write!(f, "{}", binding.name)?,
                    }
                }
                write!(f, ") {})", v.body)
            }
        }
    }
}

/// Function signature; also the whole of an `extern` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    /// Empty for an anonymous top-level expression
    pub name: String,
    pub args: Vec<String>,
    pub is_operator: bool,
    /// Only meaningful for binary operators
    pub precedence: u32,
    pub pos: Pos,
}

impl Prototype {
    /// Prototype used to wrap a bare top-level expression.
    pub fn anonymous(pos: Pos) -> Self {
        Prototype {
            name: String::new(),
            args: Vec::new(),
            is_operator: false,
            precedence: 0,
            pos,
        }
    }

    /// Function name declared by `unary op` (`unary!`).
    pub fn unary_name(op: char) -> String {
        format!("unary{}", op)
    }

    /// Function name declared by `binary op` (`binary|`).
    pub fn binary_name(op: char) -> String {
        format!("binary{}", op)
    }

    pub fn is_binary_op(&self) -> bool {
        self.is_operator && self.args.len() == 2
    }

    /// The operator character of `unary!` / `binary|` prototypes.
    pub fn operator_char(&self) -> Option<char> {
        if !self.is_operator {
            return None;
        }
        self.name.chars().last()
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub proto: Prototype,
    pub body: Expr,
    pub pos: Pos,
}

impl Function {
    /// True when this wraps a bare expression to be evaluated immediately.
    pub fn is_anonymous(&self) -> bool {
        self.proto.name.is_empty()
    }
}

/// One parsed top-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Root {
    Function(Function),
    Extern(Prototype),
}

impl Root {
    pub fn pos(&self) -> Pos {
        match self {
            Root::Function(func) => func.pos,
            Root::Extern(proto) => proto.pos,
        }
    }

    /// See [`Function::is_anonymous`]; externs are never anonymous.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Root::Function(func) if func.is_anonymous())
    }

    pub fn prototype(&self) -> &Prototype {
        match self {
            Root::Function(func) => &func.proto,
            Root::Extern(proto) => proto,
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Function(func) if func.is_anonymous() => {
                write!(f, "{}", func.body)
            }
            Root::Function(func) => {
                write!(f, "(def {} {})", func.proto, func.body)
            }
            Root::Extern(proto) => write!(f, "(extern {})", proto),
        }
    }
}
