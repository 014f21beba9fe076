//! Recursive-descent grammar over the token stream.
//!
//! ```text
//! workout := (block | comment)*
//! block   := TAG "{" entry* "}"
//! entry   := (param | message) ","? | comment
//! param   := TAG value
//! message := "@" DURATION STRING
//! value   := STRING | scalar ("->" scalar)?
//! scalar  := DURATION | PERCENT | NUMBER | ZONE
//! ```
//!
//! The result is a raw tree: tags are still strings and comments are still
//! present. Turning it into typed blocks is the tree builder's job.

use std::ops::Range;

use crate::parser::error::ParseError;
use crate::parser::lexer::{Token, TokenKind};
use crate::value::{Duration, Scalar};

// ---------------------------------------------------------------------------
// Raw parse tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RawTree {
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Block(RawBlock),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub tag: String,
    pub tag_span: Range<usize>,
    pub entries: Vec<RawEntry>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    Param {
        keyword: String,
        keyword_span: Range<usize>,
        value: RawValue,
        value_span: Range<usize>,
    },
    Message {
        offset: Duration,
        text: String,
        span: Range<usize>,
    },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Scalar(Scalar),
    Range(Scalar, Scalar),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a token stream into a raw tree.
pub fn parse(tokens: &[Token], source_len: usize, file_id: usize) -> Result<RawTree, ParseError> {
    let mut parser = GrammarParser {
        tokens,
        pos: 0,
        source_len,
        file_id,
    };
    parser.workout()
}

// ---------------------------------------------------------------------------
// Productions
// ---------------------------------------------------------------------------

struct GrammarParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source_len: usize,
    file_id: usize,
}

impl<'a> GrammarParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eof_span(&self) -> Range<usize> {
        self.source_len..self.source_len
    }

    fn error(&self, msg: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(msg, span, self.file_id)
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        self.error(
            format!("expected {}, found {}", expected, token.kind.describe()),
            token.span.clone(),
        )
    }

    fn workout(&mut self) -> Result<RawTree, ParseError> {
        let mut items = Vec::new();

        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Comment(text) => {
                    self.pos += 1;
                    items.push(RawItem::Comment(text.clone()));
                }
                TokenKind::Tag(_) => items.push(RawItem::Block(self.block()?)),
                TokenKind::RBrace => {
                    return Err(self.error("unmatched `}`", token.span.clone()));
                }
                _ => return Err(self.unexpected(token, "a block tag")),
            }
        }

        Ok(RawTree { items })
    }

    fn block(&mut self) -> Result<RawBlock, ParseError> {
        let Some(Token {
            kind: TokenKind::Tag(tag),
            span: tag_span,
        }) = self.advance()
        else {
            return Err(self.error("expected a block tag", self.eof_span()));
        };

        match self.advance() {
            Some(Token {
                kind: TokenKind::LBrace,
                ..
            }) => {}
            Some(other) => return Err(self.unexpected(other, &format!("`{{` after `{}`", tag))),
            None => {
                return Err(self.error(format!("expected `{{` after `{}`", tag), self.eof_span()));
            }
        }

        let mut entries = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                return Err(self
                    .error(format!("unclosed `{}` block", tag), tag_span.clone())
                    .with_note("add a closing `}`"));
            };

            match &token.kind {
                TokenKind::RBrace => {
                    self.pos += 1;
                    return Ok(RawBlock {
                        tag: tag.clone(),
                        tag_span: tag_span.clone(),
                        entries,
                        span: tag_span.start..token.span.end,
                    });
                }
                TokenKind::Comment(text) => {
                    self.pos += 1;
                    entries.push(RawEntry::Comment(text.clone()));
                }
                TokenKind::Tag(_) => {
                    entries.push(self.param()?);
                    self.optional_comma();
                }
                TokenKind::At => {
                    entries.push(self.message()?);
                    self.optional_comma();
                }
                TokenKind::LBrace => {
                    return Err(self
                        .unexpected(token, "a parameter or `}`")
                        .with_note("blocks cannot be nested"));
                }
                _ => return Err(self.unexpected(token, "a parameter, message or `}`")),
            }
        }
    }

    fn optional_comma(&mut self) {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
            self.pos += 1;
        }
    }

    fn param(&mut self) -> Result<RawEntry, ParseError> {
        let Some(Token {
            kind: TokenKind::Tag(keyword),
            span: keyword_span,
        }) = self.advance()
        else {
            return Err(self.error("expected a parameter keyword", self.eof_span()));
        };

        let (value, value_span) = self.value(keyword)?;
        Ok(RawEntry::Param {
            keyword: keyword.clone(),
            keyword_span: keyword_span.clone(),
            value,
            value_span,
        })
    }

    fn value(&mut self, keyword: &str) -> Result<(RawValue, Range<usize>), ParseError> {
        let Some(token) = self.advance() else {
            return Err(self.error(format!("expected a value for `{}`", keyword), self.eof_span()));
        };

        if let TokenKind::String(text) = &token.kind {
            return Ok((RawValue::Text(text.clone()), token.span.clone()));
        }

        let left = self.scalar(token, keyword)?;
        if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Arrow)) {
            return Ok((RawValue::Scalar(left), token.span.clone()));
        }
        self.pos += 1; // skip ->

        let Some(right_token) = self.advance() else {
            return Err(self.error("expected a value after `->`", self.eof_span()));
        };
        let right = self.scalar(right_token, keyword)?;
        Ok((RawValue::Range(left, right), token.span.start..right_token.span.end))
    }

    fn scalar(&self, token: &Token, keyword: &str) -> Result<Scalar, ParseError> {
        match &token.kind {
            TokenKind::Duration(d) => Ok(Scalar::Duration(*d)),
            TokenKind::Percent(p) => Ok(Scalar::Percent(*p)),
            TokenKind::Number(n) => Ok(Scalar::Integer(*n)),
            TokenKind::Zone(z) => Ok(Scalar::Zone(*z)),
            _ => Err(self.unexpected(token, &format!("a value for `{}`", keyword))),
        }
    }

    fn message(&mut self) -> Result<RawEntry, ParseError> {
        let Some(at) = self.advance() else {
            return Err(self.error("expected `@`", self.eof_span()));
        };

        let offset = match self.advance() {
            Some(Token {
                kind: TokenKind::Duration(d),
                ..
            }) => *d,
            Some(other) => {
                return Err(self
                    .unexpected(other, "a message offset")
                    .with_note("messages are written as @ MM:SS \"text\""));
            }
            None => return Err(self.error("expected a message offset", self.eof_span())),
        };

        match self.advance() {
            Some(Token {
                kind: TokenKind::String(text),
                span,
            }) => Ok(RawEntry::Message {
                offset,
                text: text.clone(),
                span: at.span.start..span.end,
            }),
            Some(other) => Err(self
                .unexpected(other, "quoted message text")
                .with_note("messages are written as @ MM:SS \"text\"")),
            None => Err(self.error("expected quoted message text", self.eof_span())),
        }
    }
}
