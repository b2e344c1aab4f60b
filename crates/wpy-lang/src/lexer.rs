//! Tokenizer.
//!
//! Newlines are significant (they end statements); other whitespace,
//! `#` comments and backslash line continuations are skipped.

use logos::Logos;

use crate::error::CompileError;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token {
    #[regex(r"\r?\n")]
    Newline,
    #[token(";")]
    Semi,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("raise")]
    Raise,
    #[token("pass")]
    Pass,
    #[token("import")]
    Import,
    #[token("None")]
    KwNone,
    #[token("True")]
    KwTrue,
    #[token("False")]
    KwFalse,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9](_?[0-9])*", |lex| lex.slice().replace('_', ""))]
    Int(String),
    #[regex(r#""([^"\\\n]|\\[^\n])*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\\n]|\\[^\n])*'"#, |lex| unescape(lex.slice()))]
    Str(String),
}

impl Token {
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Newline => "newline",
            Token::Ident(_) => "name",
            Token::Int(_) => "integer",
            Token::Str(_) => "string",
            _ => "token",
        }
    }
}

/// A token and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub tok: Token,
    pub line: usize,
}

/// Strip the quotes from a string literal and resolve escapes.
fn unescape(lit: &str) -> Option<String> {
    let inner = &lit[1..lit.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16).ok().filter(|_| hex.len() == 2)?;
                out.push(char::from_u32(code)?);
            }
            // unknown escapes are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Tokenize `source`. The result always ends with a `Newline`.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut out = Vec::new();
    let mut lexer = Token::lexer(source);
    let mut line = 1;
    let mut counted = 0;
    while let Some(tok) = lexer.next() {
        let span = lexer.span();
        line += source[counted..span.start].matches('\n').count();
        counted = span.start;
        match tok {
            Ok(tok) => out.push(Spanned { tok, line }),
            Err(()) => {
                return Err(CompileError::Syntax { msg: "invalid syntax".to_string(), line });
            }
        }
    }
    if out.last().map_or(true, |s| s.tok != Token::Newline) {
        line += source[counted..].matches('\n').count();
        out.push(Spanned { tok: Token::Newline, line });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn toks(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.tok).collect()
    }

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            toks("x = f(1_000, 'a\\n') // 2 # trailing"),
            vec![
                Token::Ident("x".into()),
                Token::Assign,
                Token::Ident("f".into()),
                Token::LParen,
                Token::Int("1000".into()),
                Token::Comma,
                Token::Str("a\n".into()),
                Token::RParen,
                Token::SlashSlash,
                Token::Int("2".into()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_keywords_versus_names() {
        assert_eq!(
            toks("raise None; Nonesuch pass_"),
            vec![
                Token::Raise,
                Token::KwNone,
                Token::Semi,
                Token::Ident("Nonesuch".into()),
                Token::Ident("pass_".into()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let spanned = tokenize("a\n\n# c\nb \\\n + 1\n").unwrap();
        let lines: Vec<(Token, usize)> = spanned.into_iter().map(|s| (s.tok, s.line)).collect();
        assert_eq!(
            lines,
            vec![
                (Token::Ident("a".into()), 1),
                (Token::Newline, 1),
                (Token::Newline, 2),
                (Token::Newline, 3),
                (Token::Ident("b".into()), 4),
                (Token::Plus, 5),
                (Token::Int("1".into()), 5),
                (Token::Newline, 5),
            ]
        );
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(
            tokenize("x = 1\ny = $").unwrap_err(),
            CompileError::Syntax { msg: "invalid syntax".into(), line: 2 }
        );
        assert!(tokenize("'unterminated").is_err());
        assert_eq!(toks("'\\x41\\q'"), vec![Token::Str("A\\q".into()), Token::Newline]);
    }
}
