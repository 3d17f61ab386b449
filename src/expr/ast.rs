//! Expression AST

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String literal
    Literal(String),
    /// Numeric literal
    Number(f64),
    /// `$name`
    Variable(String),
    /// Path relative to the context object. An empty path is `.`
    Path(Vec<String>),
    /// `name(args)` or `prefix:name(args)`
    Call {
        prefix: Option<String>,
        name: String,
        args: Vec<Expr>,
    },
    /// Unary minus
    Negate(Box<Expr>),
    /// Binary operator
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Binary operators, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Expr {
    pub fn call(prefix: Option<&str>, name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
