// Recursive-descent parser (§4.4).
//
// Grammar (no operator precedence; every binary operator associates
// left-to-right, with parentheses as the only way to override that):
//
//   File       := Statement*
//   Statement  := Doc* Flag* (Constant | Function)
//   Flag       := '@' Identifier
//   Constant   := 'const' Identifier (':' Expr)? '=' Expr ';'
//   Function   := 'proc' 'recursive'? 'entry_point'? Identifier
//                 '(' (Param (',' Param)*)? ')' ('returns' Expr)?
//                 'is' 'begin' BodyStatement* 'end'
//   Param      := ('mut' | 'imm')? 'param' Identifier ':' Expr
//   BodyStatement := Constant | Function | Return
//   Return     := 'return' Expr? ';'
//
//   Expr       := CallExpr ('then' CallExpr 'else' CallExpr)?
//   CallExpr   := Unary ( '!' | ArgList | BinaryTail )?
//   ArgList    := CallExpr (',' CallExpr)*
//   BinaryTail := (BinOp Operand)*
//   Operand    := Unary ( '!' | ArgList )?
//   Unary      := ('+' | '-' | 'not' | '~') Unary | Postfix
//   Postfix    := Atom ('/' Identifier)*
//   Atom       := Identifier | Integer TypeFlag? | String | '(' Expr ')'
//
// A call's argument list begins with a bare operand (no separating
// token) and is only taken when the token after the callee is itself
// the start of an atom — never a unary-prefix symbol, since those
// symbols (`+`, `-`) double as binary operators and a call argument
// list and a `BinaryTail` must be unambiguous to parse with one token
// of lookahead. `f x` is a call; `f - x` is a subtraction.
//
// `Postfix`'s `/Identifier` repetition binds tighter than `BinaryTail`,
// so `a / b` always parses as field access of `b` on `a`; spelling
// division by a bare identifier requires a parenthesized or
// non-identifier right-hand side (`a / (b)`, `a / 4`).
//
// Error recovery: a malformed `const` statement resyncs by skipping to
// the next top-level `;`; a malformed `proc` resyncs by skipping to
// the `end` at matching `begin`/`end` depth. Lexical errors encountered
// while scanning the whole file are folded into the diagnostics sink
// up front and otherwise ignored by the parser itself.

use std::rc::Rc;

use crate::ast::{
    Argument, BinOp, Constant, Expr, ExprKind, File, Function, FunctionMeta, Node, Statement, StatementFlag,
    StatementKind, UnOp,
};
use crate::diagnostics::Diagnostics;
use crate::lexer::{Keyword, LexError, Lexer, Token, TokenKind};
use crate::source::{FileId, Span};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token")]
    Unexpected,
}

type PResult<T> = Result<T, ParseError>;

fn integer_type_flags() -> &'static [&'static str] {
    &["ct", "i1", "i2", "i4", "i8", "u1", "u2", "u4", "u8", "iptr", "uptr"]
}

fn tokenize(bytes: &[u8], file: FileId, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut lexer = Lexer::new(bytes, file);
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(tok) => {
                let is_eof = tok.kind == TokenKind::Eof;
                if !matches!(tok.kind, TokenKind::Whitespace | TokenKind::Comment) {
                    tokens.push(tok);
                }
                if is_eof {
                    break;
                }
            }
            Err(e) => match e {
                LexError::UnrecognizedInput(span) => {
                    diagnostics.push_error(span, "unrecognized input");
                }
                LexError::UnterminatedString(span) => {
                    diagnostics.push_error(span, "unterminated string literal");
                    // §8's documented boundary behavior: an unterminated
                    // string yields exactly one lexical error and no
                    // parsed statements. Whatever tokens preceded it
                    // can't be completed into anything meaningful (the
                    // string was itself mid-expression), so they're
                    // discarded rather than handed to the parser to
                    // produce a cascade of syntax errors on top.
                    tokens.clear();
                    break;
                }
            },
        }
    }
    // Either the lexer never reached its own EOF (the unterminated-string
    // case above), or the file was empty of an EOF token for some other
    // reason; the parser always needs a terminal `Eof` so it knows it has
    // run out of input (its `advance`/`is_eof` both rely on one being
    // present) rather than spinning on the last real token forever.
    if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
        let loc = crate::source::Location { file, index: bytes.len(), line: 0, column: 0 };
        tokens.push(Token { kind: TokenKind::Eof, text: String::new(), span: Span::new(loc, loc) });
    }
    tokens
}

pub fn parse(bytes: &[u8], file: FileId, diagnostics: &mut Diagnostics) -> File {
    log::debug!("lexing and parsing file {} ({} bytes)", file, bytes.len());
    let tokens = tokenize(bytes, file, diagnostics);
    log::debug!("lexed {} tokens", tokens.len());
    let mut parser = Parser { tokens, pos: 0, diagnostics };
    let file = parser.parse_file();
    log::debug!("parsed {} top-level statements", file.statements.len());
    file
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn prev_span_end(&self) -> crate::source::Location {
        self.tokens[self.pos.saturating_sub(1)].span.end
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if k == kw)
    }

    fn expect_token(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            self.diagnostics.push_error(tok.span, format!("expected {}, found {:?}", what, tok.kind));
            Err(ParseError::Unexpected)
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, what: &str) -> PResult<Token> {
        if self.check_keyword(kw) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            self.diagnostics.push_error(tok.span, format!("expected {}, found {:?}", what, tok.kind));
            Err(ParseError::Unexpected)
        }
    }

    fn expect_identifier(&mut self) -> PResult<Token> {
        self.expect_token(TokenKind::Identifier, "an identifier")
    }

    fn take_doc_comment(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while self.check(TokenKind::Documentation) {
            let tok = self.advance();
            lines.push(tok.text.trim_start_matches('/').trim_start().to_string());
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn take_flags(&mut self) -> Vec<StatementFlag> {
        let mut flags = Vec::new();
        while self.check(TokenKind::At) {
            let at = self.advance();
            if self.check(TokenKind::Identifier) {
                let tok = self.advance();
                match tok.text.as_str() {
                    "print" => flags.push(StatementFlag::Print),
                    other => {
                        self.diagnostics.push_error(tok.span, format!("unknown statement flag `@{}`", other))
                    }
                }
            } else {
                self.diagnostics.push_error(at.span, "expected a flag name after `@`");
            }
        }
        flags
    }

    fn parse_file(&mut self) -> File {
        let mut statements = Vec::new();
        while !self.is_eof() {
            if let Some(stmt) = self.parse_top_statement() {
                statements.push(Rc::new(stmt));
            }
        }
        File { statements }
    }

    fn parse_top_statement(&mut self) -> Option<Statement> {
        let doc = self.take_doc_comment();
        let flags = self.take_flags();
        let start = self.peek().span;

        if self.check_keyword(Keyword::Const) {
            match self.parse_constant() {
                Ok(c) => {
                    let span = Span::new(start.start, self.prev_span_end());
                    Some(Statement { span, kind: StatementKind::Constant(c), doc, flags })
                }
                Err(_) => {
                    self.recover_to_semicolon();
                    None
                }
            }
        } else if self.check_keyword(Keyword::Proc) {
            match self.parse_function() {
                Ok(f) => {
                    let span = Span::new(start.start, self.prev_span_end());
                    Some(Statement { span, kind: StatementKind::Function(f), doc, flags })
                }
                Err(_) => {
                    self.recover_function();
                    None
                }
            }
        } else {
            let tok = self.advance();
            self.diagnostics.push_error(tok.span, format!("expected `const` or `proc`, found {:?}", tok.kind));
            self.recover_to_semicolon();
            None
        }
    }

    fn parse_body_statement(&mut self) -> Option<Statement> {
        let doc = self.take_doc_comment();
        let flags = self.take_flags();
        let start = self.peek().span;

        if self.check_keyword(Keyword::Const) {
            match self.parse_constant() {
                Ok(c) => {
                    let span = Span::new(start.start, self.prev_span_end());
                    Some(Statement { span, kind: StatementKind::Constant(c), doc, flags })
                }
                Err(_) => {
                    self.recover_to_semicolon();
                    None
                }
            }
        } else if self.check_keyword(Keyword::Proc) {
            match self.parse_function() {
                Ok(f) => {
                    let span = Span::new(start.start, self.prev_span_end());
                    Some(Statement { span, kind: StatementKind::Function(f), doc, flags })
                }
                Err(_) => {
                    self.recover_function();
                    None
                }
            }
        } else if self.check_keyword(Keyword::Return) {
            match self.parse_return() {
                Ok(r) => {
                    let span = Span::new(start.start, self.prev_span_end());
                    Some(Statement { span, kind: r, doc, flags })
                }
                Err(_) => {
                    self.recover_to_semicolon();
                    None
                }
            }
        } else {
            let tok = self.advance();
            self.diagnostics.push_error(tok.span, format!("expected a statement, found {:?}", tok.kind));
            None
        }
    }

    fn parse_return(&mut self) -> PResult<StatementKind> {
        self.advance(); // 'return'
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect_token(TokenKind::Semicolon, "`;`")?;
        Ok(StatementKind::Return(value))
    }

    fn parse_constant(&mut self) -> PResult<Constant> {
        self.advance(); // 'const'
        let name_tok = self.expect_identifier()?;
        let type_expr = if self.check(TokenKind::Colon) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_token(TokenKind::Equal, "`=`")?;
        let value = self.parse_expr()?;
        self.expect_token(TokenKind::Semicolon, "`;`")?;
        Ok(Constant {
            name: name_tok.text,
            name_span: name_tok.span,
            type_expr,
            value,
            identifier: std::cell::RefCell::new(None),
        })
    }

    fn parse_function(&mut self) -> PResult<Function> {
        self.advance(); // 'proc'
        let recursive = if self.check_keyword(Keyword::Recursive) {
            self.advance();
            true
        } else {
            false
        };
        let entry_point = if self.check_keyword(Keyword::EntryPoint) {
            self.advance();
            true
        } else {
            false
        };
        let name_tok = self.expect_identifier()?;
        self.expect_token(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_argument()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_token(TokenKind::RParen, "`)`")?;
        let return_type = if self.check_keyword(Keyword::Returns) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_keyword(Keyword::Is, "`is`")?;
        self.expect_keyword(Keyword::Begin, "`begin`")?;
        let mut body = Vec::new();
        while !self.check_keyword(Keyword::End) && !self.is_eof() {
            if let Some(stmt) = self.parse_body_statement() {
                body.push(Rc::new(stmt));
            }
        }
        self.expect_keyword(Keyword::End, "`end`")?;
        Ok(Function {
            name: name_tok.text,
            name_span: name_tok.span,
            args,
            return_type,
            body,
            meta: FunctionMeta { recursive, entry_point },
            identifier: std::cell::RefCell::new(None),
            resolved_return_type: std::cell::RefCell::new(None),
        })
    }

    fn parse_argument(&mut self) -> PResult<Argument> {
        let start = self.peek().span;
        let mutable = if self.check_keyword(Keyword::Mut) {
            self.advance();
            true
        } else if self.check_keyword(Keyword::Imm) {
            self.advance();
            false
        } else {
            false
        };
        self.expect_keyword(Keyword::Param, "`param`")?;
        let name_tok = self.expect_identifier()?;
        self.expect_token(TokenKind::Colon, "`:`")?;
        let type_expr = self.parse_expr()?;
        let span = Span::new(start.start, self.prev_span_end());
        Ok(Argument { name: name_tok.text, type_expr, span, mutable, identifier: std::cell::RefCell::new(None) })
    }

    fn parse_expr(&mut self) -> PResult<Node<Expr>> {
        let base = self.parse_call_expr()?;
        if self.check_keyword(Keyword::Then) {
            self.advance();
            let then_branch = self.parse_call_expr()?;
            self.expect_keyword(Keyword::Else, "`else`")?;
            let else_branch = self.parse_call_expr()?;
            let span = Span::new(base.span.start, else_branch.span.end);
            return Ok(Expr::new(span, ExprKind::Cond(base, then_branch, else_branch)));
        }
        Ok(base)
    }

    fn at_arg_starter(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier | TokenKind::Integer | TokenKind::String | TokenKind::LParen)
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek_kind() {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Mod),
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::NotEq => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::LtEq => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::GtEq => Some(BinOp::Ge),
            TokenKind::Shl => Some(BinOp::Shl),
            TokenKind::Shr => Some(BinOp::Shr),
            TokenKind::Amp => Some(BinOp::BitAnd),
            TokenKind::Pipe => Some(BinOp::BitOr),
            TokenKind::Caret => Some(BinOp::BitXor),
            TokenKind::Keyword(Keyword::And) => Some(BinOp::And),
            TokenKind::Keyword(Keyword::Or) => Some(BinOp::Or),
            _ => None,
        }
    }

    // The call-expression grammar shared by the top of an expression
    // and by the left-fold loop below: `Unary` plus at most one of a
    // bang-call or a juxtaposed argument list.
    fn parse_call_or_unary(&mut self) -> PResult<Node<Expr>> {
        let base = self.parse_unary()?;
        if self.check(TokenKind::Bang) {
            self.advance();
            let span = Span::new(base.span.start, self.prev_span_end());
            return Ok(Expr::new(span, ExprKind::Call(base, vec![])));
        }
        if self.at_arg_starter() {
            let mut args = vec![self.parse_call_expr()?];
            while self.check(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_call_expr()?);
            }
            let end = args.last().unwrap().span.end;
            let span = Span::new(base.span.start, end);
            return Ok(Expr::new(span, ExprKind::Call(base, args)));
        }
        Ok(base)
    }

    fn parse_call_expr(&mut self) -> PResult<Node<Expr>> {
        let base = self.parse_unary()?;
        if self.check(TokenKind::Bang) {
            self.advance();
            let span = Span::new(base.span.start, self.prev_span_end());
            return Ok(Expr::new(span, ExprKind::Call(base, vec![])));
        }
        if self.at_arg_starter() {
            let mut args = vec![self.parse_call_expr()?];
            while self.check(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_call_expr()?);
            }
            let end = args.last().unwrap().span.end;
            let span = Span::new(base.span.start, end);
            return Ok(Expr::new(span, ExprKind::Call(base, args)));
        }
        // Left-to-right fold: each step's right operand is a bare
        // `CallOrUnary`, never a further `BinaryTail`, so precedence
        // never creeps back in through recursion.
        let mut left = base;
        while let Some(op) = self.peek_binop() {
            self.advance();
            let right = self.parse_call_or_unary()?;
            let span = Span::new(left.span.start, right.span.end);
            left = Expr::new(span, ExprKind::Binary(op, left, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Node<Expr>> {
        let start = self.peek().span;
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Keyword(Keyword::Not) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = Span::new(start.start, operand.span.end);
            return Ok(Expr::new(span, ExprKind::Unary(op, operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Node<Expr>> {
        let mut atom = self.parse_atom()?;
        loop {
            let followed_by_ident =
                self.check(TokenKind::Slash) && matches!(self.peek_at(1).map(|t| t.kind), Some(TokenKind::Identifier));
            if !followed_by_ident {
                break;
            }
            self.advance(); // '/'
            let name_tok = self.advance();
            let span = Span::new(atom.span.start, name_tok.span.end);
            atom = Expr::new(span, ExprKind::FieldAccess(atom, name_tok.text));
        }
        Ok(atom)
    }

    fn parse_atom(&mut self) -> PResult<Node<Expr>> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::new(tok.span, ExprKind::Identifier(tok.text)))
            }
            TokenKind::Integer => {
                self.advance();
                let type_flag = match self.peek_kind() {
                    TokenKind::Identifier if integer_type_flags().contains(&self.peek().text.as_str()) => {
                        Some(self.advance().text)
                    }
                    // An identifier immediately following an integer literal that
                    // isn't one of the known flags is still consumed (it can't be
                    // anything else here), but only produces a diagnostic; the
                    // literal keeps its default `ct` flag (§4.4).
                    TokenKind::Identifier => {
                        let bad = self.advance();
                        self.diagnostics.push_error(bad.span, format!("`{}` is not a known integer type flag", bad.text));
                        None
                    }
                    _ => None,
                };
                let span = Span::new(tok.span.start, self.prev_span_end());
                Ok(Expr::new(span, ExprKind::Integer { digits: tok.text, type_flag }))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::new(tok.span, ExprKind::Str(unescape(&tok.text))))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let close = self.expect_token(TokenKind::RParen, "`)`")?;
                let span = Span::new(tok.span.start, close.span.end);
                Ok(Expr::new(span, ExprKind::Group(inner)))
            }
            _ => {
                self.diagnostics.push_error(tok.span, format!("expected an expression, found {:?}", tok.kind));
                Err(ParseError::Unexpected)
            }
        }
    }

    fn recover_to_semicolon(&mut self) {
        log::trace!("recovering to next top-level `;`");
        loop {
            if self.is_eof() {
                return;
            }
            if self.check(TokenKind::Semicolon) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn recover_function(&mut self) {
        log::trace!("recovering to this proc's own matching `end`");
        // A failure inside the header (name, parens, params, return type,
        // `is`, or `begin` itself) happens before this proc's own `begin`
        // has been consumed, so that `begin` is still ahead in the token
        // stream. Skip forward to it first, then track nesting from
        // there, so the `end` this returns at is the one matching *this*
        // proc's `begin` rather than some unrelated one further on.
        while !self.is_eof() && !self.check_keyword(Keyword::Begin) {
            self.advance();
        }
        if self.is_eof() {
            return;
        }
        self.advance(); // this proc's own 'begin'
        let mut depth: i32 = 1;
        loop {
            if self.is_eof() {
                return;
            }
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::Begin) => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::End) => {
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

// The source encoding is ASCII (§6), so `\n`, `\t`, `\\`, and `\"` are
// the only escapes recognized inside a string literal; anything else
// following a backslash is copied through unchanged.
fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> (File, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let file = parse(src.as_bytes(), 0, &mut diagnostics);
        (file, diagnostics)
    }

    #[test]
    fn parses_a_simple_constant() {
        let (file, diagnostics) = parse_ok("const a: i4 = 1 + 2;");
        assert!(!diagnostics.has_errors());
        assert_eq!(file.statements.len(), 1);
        match &file.statements[0].kind {
            StatementKind::Constant(c) => assert_eq!(c.name, "a"),
            _ => panic!("expected a constant"),
        }
    }

    #[test]
    fn binary_chain_is_left_associative() {
        let (file, _) = parse_ok("const a = 3 - 2 - 1;");
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        match &c.value.kind {
            ExprKind::Binary(BinOp::Sub, lhs, _rhs) => match &lhs.kind {
                ExprKind::Binary(BinOp::Sub, _, _) => {}
                _ => panic!("expected (3 - 2) - 1, left side was not itself a subtraction"),
            },
            _ => panic!("expected a top-level subtraction"),
        }
    }

    #[test]
    fn slash_before_identifier_is_field_access_not_division() {
        let (file, diagnostics) = parse_ok("const a = b / c;");
        assert!(!diagnostics.has_errors());
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        assert!(matches!(c.value.kind, ExprKind::FieldAccess(_, _)));
    }

    #[test]
    fn division_by_a_literal_is_binary_not_field_access() {
        let (file, _) = parse_ok("const a = b / 4;");
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        assert!(matches!(c.value.kind, ExprKind::Binary(BinOp::Div, _, _)));
    }

    #[test]
    fn bang_call_has_no_arguments() {
        let (file, _) = parse_ok("const a = f!;");
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        match &c.value.kind {
            ExprKind::Call(_, args) => assert!(args.is_empty()),
            _ => panic!("expected a call"),
        }
    }

    #[test]
    fn juxtaposed_call_collects_comma_separated_args() {
        let (file, diagnostics) = parse_ok("const a = f 1, 2, 3;");
        assert!(!diagnostics.has_errors());
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        match &c.value.kind {
            ExprKind::Call(_, args) => assert_eq!(args.len(), 3),
            _ => panic!("expected a call"),
        }
    }

    #[test]
    fn leading_minus_is_not_mistaken_for_a_call_argument() {
        let (file, _) = parse_ok("const a = x - y;");
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        assert!(matches!(c.value.kind, ExprKind::Binary(BinOp::Sub, _, _)));
    }

    #[test]
    fn parses_function_with_params_and_return_type() {
        let src = "proc add(param x: i4, param y: i4) returns i4 is begin return x + y; end";
        let (file, diagnostics) = parse_ok(src);
        assert!(!diagnostics.has_errors());
        match &file.statements[0].kind {
            StatementKind::Function(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.args.len(), 2);
                assert!(f.return_type.is_some());
                assert_eq!(f.body.len(), 1);
            }
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn recovers_after_malformed_constant_and_keeps_parsing() {
        let src = "const a = ; const b = 1;";
        let (file, diagnostics) = parse_ok(src);
        assert!(diagnostics.has_errors());
        assert_eq!(file.statements.len(), 1);
        match &file.statements[0].kind {
            StatementKind::Constant(c) => assert_eq!(c.name, "b"),
            _ => panic!("expected recovery to reach `b`"),
        }
    }

    #[test]
    fn recovers_after_malformed_function_body_to_matching_end() {
        let src = "proc broken() is begin const ; end const after = 1;";
        let (file, diagnostics) = parse_ok(src);
        assert!(diagnostics.has_errors());
        assert_eq!(file.statements.len(), 2);
        match &file.statements[1].kind {
            StatementKind::Constant(c) => assert_eq!(c.name, "after"),
            _ => panic!("expected recovery to reach `after`"),
        }
    }

    #[test]
    fn recovers_after_malformed_function_header_to_its_own_matching_end() {
        let src = "proc 123 returns i4 is begin return 1; end const after = 1;";
        let (file, diagnostics) = parse_ok(src);
        assert!(diagnostics.has_errors());
        assert_eq!(file.statements.len(), 1);
        match &file.statements[0].kind {
            StatementKind::Constant(c) => assert_eq!(c.name, "after"),
            _ => panic!("expected recovery to reach `after`"),
        }
    }

    #[test]
    fn doc_comment_attaches_to_following_statement() {
        let src = "/// explains a\nconst a = 1;";
        let (file, _) = parse_ok(src);
        assert_eq!(file.statements[0].doc.as_deref(), Some("explains a"));
    }

    #[test]
    fn print_flag_is_recognized() {
        let src = "@print\nconst a = 1;";
        let (file, diagnostics) = parse_ok(src);
        assert!(!diagnostics.has_errors());
        assert_eq!(file.statements[0].flags, vec![StatementFlag::Print]);
    }

    #[test]
    fn then_else_builds_a_cond_node() {
        let (file, diagnostics) = parse_ok("const a = 1 then 2 else 3;");
        assert!(!diagnostics.has_errors());
        let c = match &file.statements[0].kind {
            StatementKind::Constant(c) => c,
            _ => panic!(),
        };
        assert!(matches!(c.value.kind, ExprKind::Cond(_, _, _)));
    }
}
