//! AST to bytecode.
//!
//! Code is a flat list of stack ops with one source line per op. The
//! compiler also works out the deepest operand stack the code needs, which
//! sizes the frame the VM allocates for it.

use wpy_runtime::obj::ops::BinaryOp;
use wpy_runtime::obj::Value;
use wpy_runtime::{InputKind, Qstr, Runtime};

use crate::ast::{Expr, Stmt, StmtKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Push an immediate value. Only non-heap values are embedded in code.
    LoadConst(Value),
    LoadName(Qstr),
    StoreName(Qstr),
    LoadAttr(Qstr),
    /// Call the callable under `n` arguments.
    Call(u16),
    Binary(BinaryOp),
    Neg,
    Raise,
    /// `raise` with no operand.
    Reraise,
    Import(Qstr),
    Pop,
    /// Print the repr of the top of stack unless it is `None`, then pop.
    PrintExpr,
}

impl Op {
    /// Change in operand stack depth.
    fn stack_effect(self) -> isize {
        match self {
            Op::LoadConst(_) | Op::LoadName(_) | Op::Import(_) => 1,
            Op::LoadAttr(_) | Op::Neg | Op::Reraise => 0,
            Op::StoreName(_) | Op::Binary(_) | Op::Raise | Op::Pop | Op::PrintExpr => -1,
            Op::Call(n) => -(n as isize),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Code {
    pub ops: Vec<Op>,
    pub lines: Vec<usize>,
    pub stack_size: usize,
    pub source_name: Qstr,
}

impl Code {
    pub fn line_of(&self, pc: usize) -> usize {
        self.lines.get(pc).or(self.lines.last()).copied().unwrap_or(1)
    }
}

struct Emitter<'rt> {
    rt: &'rt mut Runtime,
    ops: Vec<Op>,
    lines: Vec<usize>,
    depth: isize,
    max_depth: isize,
    line: usize,
    interactive: bool,
}

impl Emitter<'_> {
    fn emit(&mut self, op: Op) {
        self.depth += op.stack_effect();
        self.max_depth = self.max_depth.max(self.depth);
        self.ops.push(op);
        self.lines.push(self.line);
    }

    fn name(&mut self, s: &str) -> Qstr {
        self.rt.intern(s)
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Pass => {}
            StmtKind::Expr(e) => {
                self.expr(e);
                self.emit(if self.interactive { Op::PrintExpr } else { Op::Pop });
            }
            StmtKind::Assign { target, value } => {
                self.expr(value);
                let q = self.name(target);
                self.emit(Op::StoreName(q));
            }
            StmtKind::Raise(Some(e)) => {
                self.expr(e);
                self.emit(Op::Raise);
            }
            StmtKind::Raise(None) => self.emit(Op::Reraise),
            StmtKind::Import(module) => {
                let q = self.name(module);
                self.emit(Op::Import(q));
                self.emit(Op::StoreName(q));
            }
        }
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Int(n) => self.emit(Op::LoadConst(Value::small_int(*n).unwrap_or(Value::NONE))),
            Expr::Str(s) => {
                let q = self.name(s);
                self.emit(Op::LoadConst(Value::qstr(q)));
            }
            Expr::None => self.emit(Op::LoadConst(Value::NONE)),
            Expr::Bool(b) => self.emit(Op::LoadConst(Value::bool(*b))),
            Expr::Name(n) => {
                let q = self.name(n);
                self.emit(Op::LoadName(q));
            }
            Expr::Attr { obj, name } => {
                self.expr(obj);
                let q = self.name(name);
                self.emit(Op::LoadAttr(q));
            }
            Expr::Call { func, args } => {
                self.expr(func);
                for a in args {
                    self.expr(a);
                }
                // arity is bounded by the parser
                self.emit(Op::Call(args.len() as u16));
            }
            Expr::Neg(operand) => {
                self.expr(operand);
                self.emit(Op::Neg);
            }
            Expr::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);
                self.emit(Op::Binary(*op));
            }
        }
    }
}

/// Lower parsed statements. In interactive mode expression results are
/// printed instead of discarded.
pub fn compile_module(rt: &mut Runtime, stmts: &[Stmt], source_name: Qstr, kind: InputKind) -> Code {
    let mut em = Emitter {
        rt,
        ops: Vec::new(),
        lines: Vec::new(),
        depth: 0,
        max_depth: 0,
        line: 1,
        interactive: kind == InputKind::SingleExpression,
    };
    for stmt in stmts {
        em.stmt(stmt);
    }
    Code { ops: em.ops, lines: em.lines, stack_size: em.max_depth as usize, source_name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;
    use wpy_runtime::{Output, RuntimeConfig};

    fn compile(rt: &mut Runtime, src: &str, kind: InputKind) -> Code {
        let toks = tokenize(src).unwrap();
        let stmts = Parser::new(&toks, *rt.stack_ctrl()).parse_file().unwrap();
        let name = rt.intern("<test>");
        compile_module(rt, &stmts, name, kind)
    }

    #[test]
    fn test_ops_and_stack_size() {
        let mut rt = Runtime::boot(RuntimeConfig::default().with_heap_size(32 * 1024), Output::capture().0);
        let code = compile(&mut rt, "print(1, 2 + 3)\nraise", InputKind::Statements);
        let print = rt.lookup_qstr("print").unwrap();
        assert_eq!(
            code.ops,
            vec![
                Op::LoadName(print),
                Op::LoadConst(Value::small_int(1).unwrap()),
                Op::LoadConst(Value::small_int(2).unwrap()),
                Op::LoadConst(Value::small_int(3).unwrap()),
                Op::Binary(BinaryOp::Add),
                Op::Call(2),
                Op::Pop,
                Op::Reraise,
            ]
        );
        assert_eq!(code.lines, vec![1, 1, 1, 1, 1, 1, 1, 2]);
        assert_eq!(code.stack_size, 4);
    }

    #[test]
    fn test_interactive_prints_expressions() {
        let mut rt = Runtime::boot(RuntimeConfig::default().with_heap_size(32 * 1024), Output::capture().0);
        let code = compile(&mut rt, "x = 1; x", InputKind::SingleExpression);
        assert_eq!(code.ops.last(), Some(&Op::PrintExpr));
        let code = compile(&mut rt, "import gc", InputKind::SingleExpression);
        let gc = rt.lookup_qstr("gc").unwrap();
        assert_eq!(code.ops, vec![Op::Import(gc), Op::StoreName(gc)]);
        assert_eq!(code.stack_size, 1);
    }
}
