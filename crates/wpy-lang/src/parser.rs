//! Recursive-descent parser.
//!
//! ```text
//! file     := (NEWLINE | simple (';' simple)* ';'? NEWLINE)*
//! simple   := 'pass' | 'raise' expr? | 'import' NAME | NAME '=' expr | expr
//! expr     := arith (cmp_op arith)?
//! arith    := term (('+' | '-') term)*
//! term     := unary (('*' | '//' | '%') unary)*
//! unary    := '-' unary | postfix
//! postfix  := atom ('(' args ')' | '.' NAME)*
//! atom     := INT | STR+ | None | True | False | NAME | '(' expr ')'
//! ```

use wpy_runtime::obj::ops::BinaryOp;
use wpy_runtime::obj::Value;
use wpy_runtime::stackctrl::StackCtrl;

use crate::ast::{Expr, Stmt, StmtKind};
use crate::error::CompileError;
use crate::lexer::{Spanned, Token};

type ParseResult<T> = Result<T, CompileError>;

pub struct Parser<'a> {
    toks: &'a [Spanned],
    pos: usize,
    stack: StackCtrl,
}

impl<'a> Parser<'a> {
    /// `toks` must end with a `Newline`, as produced by the lexer.
    pub fn new(toks: &'a [Spanned], stack: StackCtrl) -> Self {
        Self { toks, pos: 0, stack }
    }

    pub fn parse_file(mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at_end() {
            if self.eat(&Token::Newline) {
                continue;
            }
            loop {
                stmts.push(self.parse_simple()?);
                if !self.eat(&Token::Semi) || self.check(&Token::Newline) {
                    break;
                }
            }
            self.expect(&Token::Newline)?;
        }
        Ok(stmts)
    }

    // =========================================================================
    // Token cursor
    // =========================================================================

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos).map(|s| &s.tok)
    }

    fn peek_at(&self, n: usize) -> Option<&'a Token> {
        self.toks.get(self.pos + n).map(|s| &s.tok)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map_or(1, |s| s.line)
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == Some(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token) -> ParseResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(CompileError::syntax(self.line()))
        }
    }

    fn expect_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(CompileError::syntax(self.line())),
        }
    }

    fn enter(&self) -> ParseResult<()> {
        if self.stack.exceeded() {
            return Err(CompileError::RecursionDepth);
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_simple(&mut self) -> ParseResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Some(Token::Pass) => {
                self.pos += 1;
                StmtKind::Pass
            }
            Some(Token::Raise) => {
                self.pos += 1;
                if matches!(self.peek(), Some(Token::Newline | Token::Semi)) {
                    StmtKind::Raise(None)
                } else {
                    StmtKind::Raise(Some(self.parse_expr()?))
                }
            }
            Some(Token::Import) => {
                self.pos += 1;
                StmtKind::Import(self.expect_name()?)
            }
            Some(Token::Ident(name)) if self.peek_at(1) == Some(&Token::Assign) => {
                let target = name.clone();
                self.pos += 2;
                StmtKind::Assign { target, value: self.parse_expr()? }
            }
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        Ok(Stmt { kind, line })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let lhs = self.parse_arith()?;
        let Some(op) = self.peek().and_then(compare_op) else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_arith()?;
        if self.peek().and_then(compare_op).is_some() {
            // chained comparisons are not supported
            return Err(CompileError::syntax(self.line()));
        }
        Ok(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    fn parse_arith(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::SlashSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Call { func: Box::new(expr), args };
            } else if self.eat(&Token::Dot) {
                let name = self.expect_name()?;
                expr = Expr::Attr { obj: Box::new(expr), name };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after an opening paren, through the closing one.
    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }
        if args.len() > u16::MAX as usize {
            return Err(CompileError::Syntax { msg: "too many arguments".to_string(), line: self.line() });
        }
        Ok(args)
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let Some(tok) = self.peek() else {
            return Err(CompileError::syntax(line));
        };
        self.pos += 1;
        match tok {
            Token::Int(digits) => parse_int(digits, line).map(Expr::Int),
            Token::Str(s) => {
                // adjacent literals concatenate
                let mut s = s.clone();
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Token::KwNone => Ok(Expr::None),
            Token::KwTrue => Ok(Expr::Bool(true)),
            Token::KwFalse => Ok(Expr::Bool(false)),
            Token::Ident(name) => Ok(Expr::Name(name.clone())),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            _ => Err(CompileError::syntax(line)),
        }
    }
}

fn compare_op(tok: &Token) -> Option<BinaryOp> {
    Some(match tok {
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::NotEq,
        Token::Lt => BinaryOp::Lt,
        Token::LtEq => BinaryOp::LtEq,
        Token::Gt => BinaryOp::Gt,
        Token::GtEq => BinaryOp::GtEq,
        _ => return None,
    })
}

fn parse_int(digits: &str, line: usize) -> ParseResult<isize> {
    digits
        .parse::<isize>()
        .ok()
        .filter(|&n| n <= Value::SMALL_INT_MAX)
        .ok_or(CompileError::Overflow { line })
}
