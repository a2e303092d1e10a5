//! Tokenizer for config sources
//!
//! Produces a flat token stream with logical-line `Newline` tokens. Newlines
//! inside brackets and after a backslash continuation are skipped, so the
//! parser never sees physical line structure.

use super::SyntaxError;
use crate::error::Span;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Name(String),
    /// Magnitude only; the sign is a separate operator token
    Int(u64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

/// Longest operators first so that prefixes never shadow them
const OPERATORS: &[&str] = &[
    "**=", "//=", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "->", "+",
    "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut line_start = true;
        while let Some(c) = self.peek() {
            if line_start && self.depth == 0 {
                line_start = false;
                let span = self.span();
                let indented = self.skip_blanks();
                match self.peek() {
                    None | Some('\n' | '\r' | '#') => {}
                    Some(_) if indented => {
                        return Err(SyntaxError::new(span, "unexpected indent"));
                    }
                    Some(_) => {}
                }
                continue;
            }

            match c {
                ' ' | '\t' | '\x0c' => {
                    self.bump();
                }
                '\r' => {
                    self.bump();
                }
                '\n' => {
                    let span = self.span();
                    self.bump();
                    if self.depth == 0 {
                        self.newline(span);
                        line_start = true;
                    }
                }
                '#' => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                '\\' => {
                    let span = self.span();
                    self.bump();
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    if self.peek() != Some('\n') {
                        return Err(SyntaxError::new(span, "unexpected character after line continuation"));
                    }
                    self.bump();
                }
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if c == '"' || c == '\'' => self.string(false)?,
                c if is_ident_start(c) => {
                    if let Some(raw) = self.string_prefix() {
                        self.string(raw)?;
                    } else {
                        self.name();
                    }
                }
                _ => self.operator()?,
            }
        }

        let span = self.span();
        if self.depth > 0 {
            return Err(SyntaxError::new(span, "unexpected end of file inside brackets"));
        }
        self.newline(span);
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span,
        });
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    const fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    /// Emit a logical newline unless the line produced no tokens
    fn newline(&mut self, span: Span) {
        if matches!(
            self.tokens.last(),
            Some(Token { kind, .. }) if *kind != TokenKind::Newline
        ) {
            self.push(TokenKind::Newline, span);
        }
    }

    fn skip_blanks(&mut self) -> bool {
        let mut skipped = false;
        while matches!(self.peek(), Some(' ' | '\t' | '\x0c')) {
            self.bump();
            skipped = true;
        }
        skipped
    }

    fn name(&mut self) {
        let span = self.span();
        let mut name = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_continue(*c)) {
            name.push(c);
            self.bump();
        }
        self.push(TokenKind::Name(name), span);
    }

    /// Detect `r"..."`-style prefixes; returns whether the string is raw
    fn string_prefix(&mut self) -> Option<bool> {
        let first = self.peek()?;
        let second = self.peek_at(1);
        let quote = |c: Option<char>| matches!(c, Some('"' | '\''));
        match first {
            'r' | 'R' if quote(second) => {
                self.bump();
                Some(true)
            }
            'u' | 'U' if quote(second) => {
                self.bump();
                Some(false)
            }
            _ => None,
        }
    }

    fn string(&mut self, raw: bool) -> Result<(), SyntaxError> {
        let span = self.span();
        let Some(quote) = self.bump() else {
            return Err(SyntaxError::new(span, "expected string"));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new(span, "unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
                value.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(SyntaxError::new(span, "unterminated string literal"));
            }
            if c == '\\' {
                let Some(escaped) = self.bump() else {
                    return Err(SyntaxError::new(span, "unterminated string literal"));
                };
                if raw {
                    value.push('\\');
                    value.push(escaped);
                    continue;
                }
                self.escape(escaped, &mut value, span)?;
                continue;
            }
            value.push(c);
        }

        self.push(TokenKind::Str(value), span);
        Ok(())
    }

    fn escape(&mut self, c: char, out: &mut String, span: Span) -> Result<(), SyntaxError> {
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(self.hex_escape(2, span)?),
            'u' => out.push(self.hex_escape(4, span)?),
            'U' => out.push(self.hex_escape(8, span)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize, span: Span) -> Result<char, SyntaxError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| SyntaxError::new(span, "truncated \\x/\\u escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| SyntaxError::new(span, format!("invalid code point {code:#x}")))
    }

    fn number(&mut self) -> Result<(), SyntaxError> {
        let span = self.span();
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            let radix = match self.bump() {
                Some('x' | 'X') => 16,
                Some('o' | 'O') => 8,
                _ => 2,
            };
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                self.bump();
                if c != '_' {
                    digits.push(c);
                }
            }
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|_| SyntaxError::new(span, format!("invalid integer literal '{}'", self.slice(start))))?;
            self.push(TokenKind::Int(value), span);
            return Ok(());
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') && !self.peek_at(1).is_some_and(is_ident_start) {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if sign {
                    self.bump();
                }
                self.digits();
            }
        }
        if self.peek().is_some_and(is_ident_continue) {
            return Err(SyntaxError::new(span, format!("invalid numeric literal '{}'", self.slice(start))));
        }

        let text: String = self.slice(start).chars().filter(|c| *c != '_').collect();
        let kind = if is_float {
            TokenKind::Float(
                text.parse()
                    .map_err(|_| SyntaxError::new(span, format!("invalid float literal '{text}'")))?,
            )
        } else {
            TokenKind::Int(
                text.parse()
                    .map_err(|_| SyntaxError::new(span, format!("integer literal '{text}' out of range")))?,
            )
        };
        self.push(kind, span);
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let span = self.span();
        let rest: String = self.chars[self.pos..].iter().take(3).collect();
        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(op)) else {
            let c = self.peek().unwrap_or(' ');
            return Err(SyntaxError::new(span, format!("unexpected character '{c}'")));
        };
        for _ in 0..op.len() {
            self.bump();
        }
        match op {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or_else(|| SyntaxError::new(span, format!("unmatched '{op}'")))?;
            }
            ";" => {
                self.newline(span);
                return Ok(());
            }
            _ => {}
        }
        self.push(TokenKind::Op(op), span);
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}
