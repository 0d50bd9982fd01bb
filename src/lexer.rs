// Tokenizer (§4.3).
//
// Whitespace, comments, and documentation comments are emitted as
// tokens rather than dropped, so the parser can see and explicitly
// skip them (and so documentation tokens can be attached to the
// following statement). Keywords are only recognized when not
// followed by an identifier-continuation byte, so `constant` lexes as
// one identifier, not the keyword `const` plus `ant`.

use std::fmt;

use crate::reader::Reader;
use crate::source::{FileId, Span};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Const,
    Proc,
    Is,
    Recursive,
    EntryPoint,
    Param,
    Returns,
    Begin,
    Return,
    Then,
    Else,
    End,
    Mut,
    Imm,
    Or,
    And,
    Not,
}

impl Keyword {
    fn from_bytes(bytes: &[u8]) -> Option<Keyword> {
        Some(match bytes {
            b"const" => Keyword::Const,
            b"proc" => Keyword::Proc,
            b"is" => Keyword::Is,
            b"recursive" => Keyword::Recursive,
            b"entry_point" => Keyword::EntryPoint,
            b"param" => Keyword::Param,
            b"returns" => Keyword::Returns,
            b"begin" => Keyword::Begin,
            b"return" => Keyword::Return,
            b"then" => Keyword::Then,
            b"else" => Keyword::Else,
            b"end" => Keyword::End,
            b"mut" => Keyword::Mut,
            b"imm" => Keyword::Imm,
            b"or" => Keyword::Or,
            b"and" => Keyword::And,
            b"not" => Keyword::Not,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    Documentation,
    Identifier,
    Integer,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    Colon,
    Semicolon,
    Comma,
    Bang,
    Slash,
    At,
    Equal,
    Plus,
    Minus,
    Tilde,
    Star,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    Amp,
    Pipe,
    Caret,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is_skippable(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment | TokenKind::Documentation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unrecognized input")]
    UnrecognizedInput(Span),
    #[error("unexpected end of string")]
    UnterminatedString(Span),
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnrecognizedInput(s) => *s,
            LexError::UnterminatedString(s) => *s,
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

pub struct Lexer<'a> {
    reader: Reader<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(bytes: &'a [u8], file: FileId) -> Lexer<'a> {
        Lexer { reader: Reader::new(bytes, file) }
    }

    pub fn is_eof(&self) -> bool {
        self.reader.is_eof()
    }

    // Produce the next token, or a lexical error. A caller encountering
    // an error may call `next_token` again to resume past the failing
    // run of bytes (§4.3: "subsequent calls may resume").
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if self.reader.is_eof() {
            let loc = self.reader.location();
            return Ok(Token { kind: TokenKind::Eof, text: String::new(), span: Span::new(loc, loc) });
        }

        let start_loc = self.reader.location();
        let start_index = self.reader.index();
        let b = self.reader.peek(0).unwrap();

        if b.is_ascii_whitespace() {
            while let Some(c) = self.reader.peek(0) {
                if c.is_ascii_whitespace() {
                    self.reader.advance(1);
                } else {
                    break;
                }
            }
            return Ok(self.finish(TokenKind::Whitespace, start_index, start_loc));
        }

        if b == b'/' && self.reader.peek(1) == Some(b'/') {
            let is_doc = self.reader.peek(2) == Some(b'/');
            while let Some(c) = self.reader.peek(0) {
                if c == b'\n' {
                    break;
                }
                self.reader.advance(1);
            }
            let kind = if is_doc { TokenKind::Documentation } else { TokenKind::Comment };
            return Ok(self.finish(kind, start_index, start_loc));
        }

        if b == b'"' {
            self.reader.advance(1);
            loop {
                match self.reader.peek(0) {
                    None => {
                        let span = Span::new(start_loc, self.reader.location());
                        return Err(LexError::UnterminatedString(span));
                    }
                    Some(b'"') => {
                        self.reader.advance(1);
                        break;
                    }
                    Some(b'\\') => {
                        self.reader.advance(1);
                        if self.reader.peek(0).is_some() {
                            self.reader.advance(1);
                        }
                    }
                    Some(_) => self.reader.advance(1),
                }
            }
            return Ok(self.finish(TokenKind::String, start_index, start_loc));
        }

        if b.is_ascii_digit() {
            while let Some(c) = self.reader.peek(0) {
                if c.is_ascii_digit() {
                    self.reader.advance(1);
                } else {
                    break;
                }
            }
            return Ok(self.finish(TokenKind::Integer, start_index, start_loc));
        }

        if is_ident_start(b) {
            while let Some(c) = self.reader.peek(0) {
                if is_ident_continue(c) {
                    self.reader.advance(1);
                } else {
                    break;
                }
            }
            let text = self.reader.slice_from(start_index);
            let kind = match Keyword::from_bytes(text) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Identifier,
            };
            return Ok(self.finish(kind, start_index, start_loc));
        }

        // Two-byte operators must be checked before their one-byte prefix.
        let two = self.reader.peek(1).map(|n| [b, n]);
        if let Some(kind) = match two {
            Some([b'=', b'=']) => Some(TokenKind::EqEq),
            Some([b'!', b'=']) => Some(TokenKind::NotEq),
            Some([b'<', b'=']) => Some(TokenKind::LtEq),
            Some([b'>', b'=']) => Some(TokenKind::GtEq),
            Some([b'<', b'<']) => Some(TokenKind::Shl),
            Some([b'>', b'>']) => Some(TokenKind::Shr),
            _ => None,
        } {
            self.reader.advance(2);
            return Ok(self.finish(kind, start_index, start_loc));
        }

        let one = match b {
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b':' => Some(TokenKind::Colon),
            b';' => Some(TokenKind::Semicolon),
            b',' => Some(TokenKind::Comma),
            b'!' => Some(TokenKind::Bang),
            b'/' => Some(TokenKind::Slash),
            b'@' => Some(TokenKind::At),
            b'=' => Some(TokenKind::Equal),
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'~' => Some(TokenKind::Tilde),
            b'*' => Some(TokenKind::Star),
            b'%' => Some(TokenKind::Percent),
            b'<' => Some(TokenKind::Lt),
            b'>' => Some(TokenKind::Gt),
            b'&' => Some(TokenKind::Amp),
            b'|' => Some(TokenKind::Pipe),
            b'^' => Some(TokenKind::Caret),
            _ => None,
        };

        if let Some(kind) = one {
            self.reader.advance(1);
            return Ok(self.finish(kind, start_index, start_loc));
        }

        // Coalesce a contiguous run of unrecognized bytes into one
        // diagnostic, per §4.3.
        while let Some(c) = self.reader.peek(0) {
            if self.byte_starts_known_token(c) {
                break;
            }
            self.reader.advance(1);
        }
        let span = Span::new(start_loc, self.reader.location());
        Err(LexError::UnrecognizedInput(span))
    }

    fn byte_starts_known_token(&self, b: u8) -> bool {
        b.is_ascii_whitespace()
            || b.is_ascii_digit()
            || is_ident_start(b)
            || b"\"():;,!/@=+-~*%<>&|^".contains(&b)
    }

    fn finish(&self, kind: TokenKind, start_index: usize, start_loc: crate::source::Location) -> Token {
        let text = String::from_utf8_lossy(self.reader.slice_from(start_index)).into_owned();
        Token { kind, text, span: Span::new(start_loc, self.reader.location()) }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src.as_bytes(), 0);
        let mut out = Vec::new();
        loop {
            match lexer.next_token() {
                Ok(tok) => {
                    let eof = tok.kind == TokenKind::Eof;
                    out.push(tok);
                    if eof {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        out
    }

    // §8 invariant 1: concatenating every token's slice reproduces the
    // input verbatim.
    #[test]
    fn roundtrips_source_text() {
        let src = "const a: i4 = 1 + 2; // comment\n/// doc\nproc f begin end";
        let tokens = lex_all(src);
        let mut reconstructed = String::new();
        for t in &tokens {
            reconstructed.push_str(&t.text);
        }
        assert_eq!(reconstructed, src);
    }

    #[test]
    fn distinguishes_doc_from_comment() {
        let tokens = lex_all("/// hello\n// world\n");
        assert_eq!(tokens[0].kind, TokenKind::Documentation);
        // whitespace token for the newline
        assert_eq!(tokens[2].kind, TokenKind::Comment);
    }

    #[test]
    fn keyword_requires_word_boundary() {
        let tokens = lex_all("const constant");
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Const));
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].text, "constant");
    }

    #[test]
    fn unterminated_string_fails_at_open_quote() {
        let mut lexer = Lexer::new(b"\"abc", 0);
        let err = lexer.next_token().unwrap_err();
        match err {
            LexError::UnterminatedString(span) => assert_eq!(span.start.index, 0),
            _ => panic!("expected UnterminatedString"),
        }
    }

    #[test]
    fn unrecognized_bytes_coalesce_into_one_error() {
        let mut lexer = Lexer::new("$$$ x".as_bytes(), 0);
        let err = lexer.next_token().unwrap_err();
        match err {
            LexError::UnrecognizedInput(span) => {
                assert_eq!(span.start.index, 0);
                assert_eq!(span.end.index, 3);
            }
            _ => panic!("expected UnrecognizedInput"),
        }
        // resumes afterwards
        let ws = lexer.next_token().unwrap();
        assert_eq!(ws.kind, TokenKind::Whitespace);
        let id = lexer.next_token().unwrap();
        assert_eq!(id.kind, TokenKind::Identifier);
    }

    #[test]
    fn two_byte_operators_win_over_prefix() {
        let tokens = lex_all("<= < == = <<");
        assert_eq!(tokens[0].kind, TokenKind::LtEq);
        assert_eq!(tokens[2].kind, TokenKind::Lt);
        assert_eq!(tokens[4].kind, TokenKind::EqEq);
        assert_eq!(tokens[6].kind, TokenKind::Equal);
        assert_eq!(tokens[8].kind, TokenKind::Shl);
    }

    #[test]
    fn empty_file_has_only_eof() {
        let tokens = lex_all("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
