use wpy_runtime::obj::ops::BinaryOp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(isize),
    Str(String),
    None,
    Bool(bool),
    Name(String),
    Attr { obj: Box<Expr>, name: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Neg(Box<Expr>),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Pass,
    Expr(Expr),
    Assign { target: String, value: Expr },
    /// `raise` with an optional exception.
    Raise(Option<Expr>),
    Import(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}
