//! Recursive-descent parser for config sources
//!
//! The grammar is the declarative slice of Python that config files use:
//! imports, assignments, asserts and expressions. Anything else (control
//! flow, function definitions, comprehensions) is a syntax error.

pub(crate) mod ast;
mod lexer;

use ast::{
    BinOp, BoolOp, CmpOp, Expr, ExprKind, ImportName, Keyword, Module, Stmt, StmtKind, UnaryOp,
};
use lexer::{Token, TokenKind};

use crate::error::Span;

/// A syntax problem at a position; the loader attaches the file path
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError {
    pub(crate) span: Span,
    pub(crate) message: String,
}

impl SyntaxError {
    pub(crate) fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

type ParseResult<T> = Result<T, SyntaxError>;

const I64_MIN_MAGNITUDE: u64 = i64::MIN.unsigned_abs();

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

/// Whether `name` is a reserved word of the source language
#[must_use]
pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Parse a whole source file
pub(crate) fn parse_module(source: &str) -> ParseResult<Module> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens).module()
}

/// Parse a single expression, rejecting trailing input
pub(crate) fn parse_expression(source: &str) -> ParseResult<Expr> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expr_list()?;
    parser.eat_newline();
    if !parser.at_eof() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    const fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // -- token helpers -----------------------------------------------------

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)].kind
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Op(o) if *o == op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Name(n) if n == keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_newline(&mut self) -> bool {
        if self.peek().kind == TokenKind::Newline {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> ParseResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{op}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{keyword}'")))
        }
    }

    fn identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected("identifier")),
        }
    }

    fn expected(&self, what: &str) -> SyntaxError {
        SyntaxError::new(self.span(), format!("expected {what}, found {}", describe(&self.peek().kind)))
    }

    fn unexpected(&self) -> SyntaxError {
        SyntaxError::new(self.span(), format!("unexpected {}", describe(&self.peek().kind)))
    }

    // -- statements --------------------------------------------------------

    fn module(mut self) -> ParseResult<Module> {
        let mut body = Vec::new();
        while !self.at_eof() {
            if self.eat_newline() {
                continue;
            }
            self.statement(&mut body)?;
            if !self.eat_newline() && !self.at_eof() {
                return Err(self.unexpected());
            }
        }
        Ok(Module { body })
    }

    fn statement(&mut self, body: &mut Vec<Stmt>) -> ParseResult<()> {
        let span = self.span();
        if let TokenKind::Name(word) = &self.peek().kind {
            match word.as_str() {
                "import" => return self.import(span, body),
                "from" => {
                    body.push(self.from_import(span)?);
                    return Ok(());
                }
                "assert" => {
                    self.advance();
                    let test = self.expr()?;
                    let message = if self.eat_op(",") { Some(self.expr()?) } else { None };
                    body.push(Stmt {
                        kind: StmtKind::Assert { test, message },
                        span,
                    });
                    return Ok(());
                }
                "pass" => {
                    self.advance();
                    body.push(Stmt {
                        kind: StmtKind::Pass,
                        span,
                    });
                    return Ok(());
                }
                w if is_keyword(w) && !matches!(w, "None" | "True" | "False" | "not" | "lambda") => {
                    return Err(SyntaxError::new(span, format!("'{w}' statements are not supported in config files")));
                }
                _ => {}
            }
        }

        let first = self.expr_list()?;
        if let Some(op) = self.augmented_op() {
            check_target(&first)?;
            let value = self.expr_list()?;
            body.push(Stmt {
                kind: StmtKind::AugAssign { target: first, op, value },
                span,
            });
            return Ok(());
        }

        if !self.at_op("=") {
            body.push(Stmt {
                kind: StmtKind::Expr(first),
                span,
            });
            return Ok(());
        }

        let mut targets = vec![first];
        let mut value = None;
        while self.eat_op("=") {
            let next = self.expr_list()?;
            if self.at_op("=") {
                targets.push(next);
            } else {
                value = Some(next);
            }
        }
        let value = value.ok_or_else(|| self.expected("expression"))?;
        for target in &targets {
            check_target(target)?;
        }
        body.push(Stmt {
            kind: StmtKind::Assign { targets, value },
            span,
        });
        Ok(())
    }

    fn augmented_op(&mut self) -> Option<BinOp> {
        let op = match &self.peek().kind {
            TokenKind::Op("+=") => BinOp::Add,
            TokenKind::Op("-=") => BinOp::Sub,
            TokenKind::Op("*=") => BinOp::Mul,
            TokenKind::Op("/=") => BinOp::Div,
            TokenKind::Op("//=") => BinOp::FloorDiv,
            TokenKind::Op("%=") => BinOp::Mod,
            TokenKind::Op("**=") => BinOp::Pow,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn import(&mut self, span: Span, body: &mut Vec<Stmt>) -> ParseResult<()> {
        self.expect_keyword("import")?;
        loop {
            let module = self.dotted()?;
            let alias = if self.eat_keyword("as") { Some(self.identifier()?) } else { None };
            body.push(Stmt {
                kind: StmtKind::Import { module, alias },
                span,
            });
            if !self.eat_op(",") {
                return Ok(());
            }
        }
    }

    fn from_import(&mut self, span: Span) -> ParseResult<Stmt> {
        self.expect_keyword("from")?;
        let mut level = 0;
        while self.at_op(".") {
            self.advance();
            level += 1;
        }
        let module = if self.at_keyword("import") && level > 0 {
            Vec::new()
        } else {
            self.dotted()?
        };
        self.expect_keyword("import")?;

        if self.at_op("*") {
            return Err(SyntaxError::new(self.span(), "wildcard imports are not supported"));
        }
        let parenthesized = self.eat_op("(");
        let mut names = Vec::new();
        loop {
            let name_span = self.span();
            let name = self.identifier()?;
            let alias = if self.eat_keyword("as") { Some(self.identifier()?) } else { None };
            names.push(ImportName {
                name,
                alias,
                span: name_span,
            });
            if !self.eat_op(",") {
                break;
            }
            if parenthesized && self.at_op(")") {
                break;
            }
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(Stmt {
            kind: StmtKind::FromImport { level, module, names },
            span,
        })
    }

    fn dotted(&mut self) -> ParseResult<Vec<String>> {
        let mut parts = vec![self.identifier()?];
        while self.eat_op(".") {
            parts.push(self.identifier()?);
        }
        Ok(parts)
    }

    // -- expressions -------------------------------------------------------

    /// `expr ("," expr)* [","]`; a comma makes a tuple
    fn expr_list(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        let first = self.expr()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_expression_end() {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), span))
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Op("=" | ")" | "]" | "}")
        ) || self.augmented_lookahead()
    }

    fn augmented_lookahead(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Op("+=" | "-=" | "*=" | "/=" | "//=" | "%=" | "**=")
        )
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        if self.at_keyword("lambda") {
            return Err(SyntaxError::new(self.span(), "lambda expressions are not supported in config files"));
        }
        let body = self.or_expr()?;
        if !self.at_keyword("if") {
            return Ok(body);
        }
        let span = body.span;
        self.advance();
        let test = self.or_expr()?;
        self.expect_keyword("else")?;
        let orelse = self.expr()?;
        Ok(Expr::new(
            ExprKind::IfElse {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = bool_op(BoolOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = bool_op(BoolOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let left = self.arith()?;
        let mut ops = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push((op, self.arith()?));
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let span = left.span;
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
            span,
        ))
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match &self.peek().kind {
            TokenKind::Op("==") => CmpOp::Eq,
            TokenKind::Op("!=") => CmpOp::NotEq,
            TokenKind::Op("<") => CmpOp::Lt,
            TokenKind::Op("<=") => CmpOp::LtE,
            TokenKind::Op(">") => CmpOp::Gt,
            TokenKind::Op(">=") => CmpOp::GtE,
            TokenKind::Name(n) if n == "in" => CmpOp::In,
            TokenKind::Name(n) if n == "not" && matches!(self.peek_nth(1), TokenKind::Name(m) if m == "in") => {
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Name(n) if n == "is" => {
                if matches!(self.peek_nth(1), TokenKind::Name(m) if m == "not") {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn arith(&mut self) -> ParseResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.at_op("+") {
                BinOp::Add
            } else if self.at_op("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Op("*") => BinOp::Mul,
                TokenKind::Op("/") => BinOp::Div,
                TokenKind::Op("//") => BinOp::FloorDiv,
                TokenKind::Op("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = binary(op, left, right);
        }
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let span = self.span();
        let op = if self.at_op("-") {
            UnaryOp::Neg
        } else if self.at_op("+") {
            UnaryOp::Pos
        } else {
            return self.power();
        };
        self.advance();
        // i64::MIN has no positive counterpart, so its literal folds here
        if op == UnaryOp::Neg
            && self.peek().kind == TokenKind::Int(I64_MIN_MAGNITUDE)
            && !matches!(self.peek_nth(1), TokenKind::Op("**"))
        {
            self.advance();
            return Ok(Expr::new(ExprKind::Int(i64::MIN), span));
        }
        let operand = self.factor()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            let span = self.span();
            if self.eat_op(".") {
                let attr = self.identifier()?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    span,
                );
            } else if self.eat_op("[") {
                let index = self.expr_list()?;
                self.expect_op("]")?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if self.eat_op("(") {
                let (args, keywords) = self.call_arguments()?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.at_op(")") {
            let span = self.span();
            if self.eat_op("**") {
                keywords.push(Keyword {
                    name: None,
                    value: self.expr()?,
                });
            } else if self.at_op("*") {
                return Err(SyntaxError::new(span, "argument unpacking with '*' is not supported"));
            } else if matches!(self.peek().kind, TokenKind::Name(_)) && matches!(self.peek_nth(1), TokenKind::Op("=")) {
                let name = self.identifier()?;
                self.expect_op("=")?;
                if keywords.iter().any(|k| k.name.as_deref() == Some(name.as_str())) {
                    return Err(SyntaxError::new(span, format!("keyword argument repeated: {name}")));
                }
                keywords.push(Keyword {
                    name: Some(name),
                    value: self.expr()?,
                });
            } else {
                if !keywords.is_empty() {
                    return Err(SyntaxError::new(span, "positional argument follows keyword argument"));
                }
                args.push(self.expr()?);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, keywords))
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Int(i) => ExprKind::Int(
                i64::try_from(i).map_err(|_| SyntaxError::new(span, format!("integer literal '{i}' out of range")))?,
            ),
            TokenKind::Float(f) => ExprKind::Float(f),
            TokenKind::Str(mut s) => {
                // Adjacent literals concatenate
                while let TokenKind::Str(next) = &self.peek().kind {
                    s.push_str(next);
                    self.advance();
                }
                ExprKind::Str(s)
            }
            TokenKind::Name(name) => match name.as_str() {
                "None" => ExprKind::None,
                "True" => ExprKind::Bool(true),
                "False" => ExprKind::Bool(false),
                n if is_keyword(n) => {
                    return Err(SyntaxError::new(span, format!("unexpected keyword '{n}'")));
                }
                _ => ExprKind::Name(name),
            },
            TokenKind::Op("(") => return self.parenthesized(span),
            TokenKind::Op("[") => {
                let items = self.sequence("]")?;
                ExprKind::List(items)
            }
            TokenKind::Op("{") => return self.dict(span),
            other => {
                return Err(SyntaxError::new(span, format!("unexpected {}", describe(&other))));
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn parenthesized(&mut self, span: Span) -> ParseResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), span));
        }
        let first = self.expr()?;
        if self.eat_op(")") {
            return Ok(first);
        }
        self.expect_op(",")?;
        let mut items = vec![first];
        items.extend(self.sequence(")")?);
        Ok(Expr::new(ExprKind::Tuple(items), span))
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed
    fn sequence(&mut self, close: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at_op(close) {
            items.push(self.expr()?);
            if self.at_keyword("for") {
                return Err(SyntaxError::new(self.span(), "comprehensions are not supported in config files"));
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn dict(&mut self, span: Span) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        while !self.at_op("}") {
            if self.at_op("**") {
                return Err(SyntaxError::new(self.span(), "dict unpacking is not supported"));
            }
            let key = self.expr()?;
            if !self.at_op(":") {
                return Err(SyntaxError::new(key.span, "set literals are not supported"));
            }
            self.advance();
            let value = self.expr()?;
            entries.push((key, value));
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(Expr::new(ExprKind::Dict(entries), span))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span;
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

fn bool_op(op: BoolOp, left: Expr, right: Expr) -> Expr {
    let span = left.span;
    Expr::new(
        ExprKind::BoolOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

/// Only names, attributes, subscripts and tuples/lists of them are assignable
fn check_target(expr: &Expr) -> ParseResult<()> {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
        ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().try_for_each(check_target),
        _ => Err(SyntaxError::new(expr.span, "cannot assign to expression")),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Name(name) => format!("'{name}'"),
        TokenKind::Int(i) => format!("number {i}"),
        TokenKind::Float(f) => format!("number {f}"),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Op(op) => format!("'{op}'"),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<StmtKind> {
        parse_module(source).unwrap().body.into_iter().map(|s| s.kind).collect()
    }

    fn expr(source: &str) -> ExprKind {
        parse_expression(source).unwrap().kind
    }

    #[test]
    fn relative_from_import() {
        let body = parse("from ..common.models import model as m, optim\n");
        let StmtKind::FromImport { level, module, names } = &body[0] else {
            panic!("expected from-import, got {body:?}");
        };
        assert_eq!(*level, 2);
        assert_eq!(module, &vec!["common".to_string(), "models".to_string()]);
        assert_eq!(names[0].binding(), "m");
        assert_eq!(names[1].binding(), "optim");
    }

    #[test]
    fn parenthesized_import_list() {
        let body = parse("from . import (\n    dir1_a,\n    dir1_b,\n)\n");
        let StmtKind::FromImport { level, module, names } = &body[0] else {
            panic!("expected from-import");
        };
        assert_eq!(*level, 1);
        assert!(module.is_empty());
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn import_with_alias() {
        let body = parse("import os, numpy.linalg as la\n");
        assert_eq!(
            body,
            vec![
                StmtKind::Import {
                    module: vec!["os".into()],
                    alias: None
                },
                StmtKind::Import {
                    module: vec!["numpy".into(), "linalg".into()],
                    alias: Some("la".into())
                },
            ]
        );
    }

    #[test]
    fn tuple_unpacking_assignment() {
        let body = parse("a, b = load('x.py', ('a', 'b'))\n");
        let StmtKind::Assign { targets, .. } = &body[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(&targets[0].kind, ExprKind::Tuple(items) if items.len() == 2));
    }

    #[test]
    fn chained_assignment() {
        let body = parse("a = b = 1\n");
        let StmtKind::Assign { targets, value } = &body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 2);
        assert_eq!(value.kind, ExprKind::Int(1));
    }

    #[test]
    fn lazy_call_chain() {
        let ExprKind::Call { func, args, keywords } = expr("LazyCall(count)(x=1, y='a')") else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert_eq!(keywords.len(), 2);
        assert!(matches!(func.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn precedence() {
        // -2 ** 2 == -(2 ** 2)
        let ExprKind::Unary { op: UnaryOp::Neg, operand } = expr("-2 ** 2") else {
            panic!("expected negation");
        };
        assert!(matches!(operand.kind, ExprKind::Binary { op: BinOp::Pow, .. }));

        let ExprKind::Binary { op: BinOp::Add, right, .. } = expr("1 + 2 * 3") else {
            panic!("expected addition");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn most_negative_integer() {
        assert_eq!(expr("-9223372036854775808"), ExprKind::Int(i64::MIN));
        assert!(matches!(expr("-9223372036854775807"), ExprKind::Unary { op: UnaryOp::Neg, .. }));
        assert!(parse_expression("9223372036854775808").is_err());
        assert!(parse_expression("- 9223372036854775808 ** 2").is_err());
    }

    #[test]
    fn ternary_and_comparisons() {
        assert!(matches!(expr("1 if a < b <= c else 2"), ExprKind::IfElse { .. }));
        let ExprKind::Compare { ops, .. } = expr("a not in b") else {
            panic!("expected comparison");
        };
        assert_eq!(ops[0].0, CmpOp::NotIn);
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(expr("'a' \"b\"\n"), ExprKind::Str("ab".into()));
    }

    #[test]
    fn dotted_name_of_attribute_chain() {
        let parsed = parse_expression("itertools.count").unwrap();
        assert_eq!(parsed.dotted_name().as_deref(), Some("itertools.count"));
        assert_eq!(parsed.root_name(), Some("itertools"));
    }

    #[test]
    fn rejects_unsupported_statements() {
        assert!(parse_module("def f():\n    pass\n").is_err());
        assert!(parse_module("for x in y:\n    pass\n").is_err());
        assert!(parse_module("x = [i for i in y]\n").is_err());
        assert!(parse_module("x = lambda: 3\n").is_err());
        assert!(parse_module("1 = x\n").is_err());
    }

    #[test]
    fn error_reports_position() {
        let err = parse_module("a = 1\nb = (2,\n").unwrap_err();
        assert!(err.message.contains("end of file"));
        let err = parse_module("a = 1 2\n").unwrap_err();
        assert_eq!(err.span, Span::new(1, 7));
    }

    #[test]
    fn keywords() {
        assert!(is_keyword("class"));
        assert!(!is_keyword("cfg"));
    }
}
