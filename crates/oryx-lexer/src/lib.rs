//! Oryx specification lexer
//!
//! Tokenizes contract expressions and test specifications. Both grammars
//! share one token set; they differ only in how the parser assembles
//! top-level constructs. Uses the `logos` crate for lexing.

use logos::Logos;
use smol_str::SmolStr;
use std::fmt;
use std::ops::Range;

/// Source span representing a range in the specification text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// A token with its kind and source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All token types shared by the contract and test-specification grammars
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("old")]
    Old,
    #[token("within")]
    Within,
    #[token("isEmpty")]
    IsEmpty,
    #[token("notEmpty")]
    NotEmpty,
    #[token("instanceof")]
    InstanceOf,
    #[token("matches")]
    Matches,
    #[token("satisfies")]
    Satisfies,
    #[token("log")]
    Log,
    #[token("log10")]
    Log10,
    #[token("null")]
    Null,
    #[token("return")]
    Return,
    #[token("EPS")]
    Eps,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("throws")]
    Throws,
    #[token("noThrows")]
    NoThrows,
    #[token("memory")]
    Memory,

    // ========== Operators ==========
    #[token("||")]
    PipePipe,
    #[token("&&")]
    AmpAmp,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+-")]
    PlusMinus,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("|")]
    Pipe,

    // ========== Delimiters ==========
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    // ========== Literals ==========
    /// Integer literal
    #[regex(r"[0-9][0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Integer(SmolStr),

    /// Real (floating point) literal
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*(?:[eE][+-]?[0-9]+)?", |lex| SmolStr::new(lex.slice()))]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", |lex| SmolStr::new(lex.slice()))]
    Real(SmolStr),

    /// String literal (double quotes, raw slice including quotes)
    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| SmolStr::new(lex.slice()))]
    Str(SmolStr),

    /// Bracket-pattern literal such as `1[0-5]` or `[ab]x`, expanded into a
    /// value sequence by the host's pattern expander
    #[regex(r"[0-9A-Za-z_]*(?:\[[^\]]+\][0-9A-Za-z_]*)+", |lex| SmolStr::new(lex.slice()))]
    Pattern(SmolStr),

    // ========== Identifiers ==========
    /// Regular identifier (starts with lowercase or underscore)
    #[regex(r"[a-z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    /// Type identifier (starts with uppercase)
    #[regex(r"[A-Z][a-zA-Z0-9_]*", priority = 1, callback = |lex| SmolStr::new(lex.slice()))]
    TypeIdent(SmolStr),

    // ========== Error ==========
    /// Lexer error - unrecognized character
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Old => write!(f, "old"),
            TokenKind::Within => write!(f, "within"),
            TokenKind::IsEmpty => write!(f, "isEmpty"),
            TokenKind::NotEmpty => write!(f, "notEmpty"),
            TokenKind::InstanceOf => write!(f, "instanceof"),
            TokenKind::Matches => write!(f, "matches"),
            TokenKind::Satisfies => write!(f, "satisfies"),
            TokenKind::Log => write!(f, "log"),
            TokenKind::Log10 => write!(f, "log10"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Eps => write!(f, "EPS"),
            TokenKind::This => write!(f, "this"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Throws => write!(f, "throws"),
            TokenKind::NoThrows => write!(f, "noThrows"),
            TokenKind::Memory => write!(f, "memory"),
            TokenKind::PipePipe => write!(f, "||"),
            TokenKind::AmpAmp => write!(f, "&&"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::PlusMinus => write!(f, "+-"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::At => write!(f, "@"),
            TokenKind::Integer(s) => write!(f, "integer `{}`", s),
            TokenKind::Real(s) => write!(f, "real `{}`", s),
            TokenKind::Str(s) => write!(f, "string {}", s),
            TokenKind::Pattern(s) => write!(f, "pattern `{}`", s),
            TokenKind::Ident(s) => write!(f, "identifier `{}`", s),
            TokenKind::TypeIdent(s) => write!(f, "type `{}`", s),
            TokenKind::Error => write!(f, "error"),
        }
    }
}

impl TokenKind {
    /// Check if this token can begin a goal clause in a test specification
    pub fn starts_goal(&self) -> bool {
        matches!(
            self,
            TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
                | TokenKind::Matches
                | TokenKind::Within
                | TokenKind::Throws
                | TokenKind::NoThrows
                | TokenKind::Satisfies
                | TokenKind::Memory
        )
    }
}

/// Lexer error type with positions
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexerError {
    #[error("Unexpected character '{1}' at position {0}")]
    UnexpectedCharacter(usize, char),
}

/// Lexer for Oryx specification text
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given specification text
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
        }
    }

    /// Get the source text being lexed
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Tokenize the entire source into a vector of tokens
    pub fn tokenize(self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for (result, span) in self.inner.spanned() {
            match result {
                Ok(kind) => {
                    tokens.push(Token::new(kind, Span::from(span)));
                }
                Err(_) => {
                    let bad_char = self.source[span.clone()].chars().next().unwrap_or('?');
                    errors.push(LexerError::UnexpectedCharacter(span.start, bad_char));
                    tokens.push(Token::new(TokenKind::Error, Span::from(span)));
                }
            }
        }

        (tokens, errors)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = std::result::Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|result| {
            let span = self.inner.span();
            let bad_char = self.source[span.clone()].chars().next().unwrap_or('?');
            result
                .map(|kind| Token::new(kind, Span::from(span.clone())))
                .map_err(|_| LexerError::UnexpectedCharacter(span.start, bad_char))
        })
    }
}
