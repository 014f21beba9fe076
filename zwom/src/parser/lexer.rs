use std::ops::Range;

use crate::parser::error::ParseError;
use crate::value::{Duration, Zone};

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Block tag or parameter keyword: `[A-Z_]+`.
    Tag(String),
    /// Double-quoted text, quotes stripped. May span lines.
    String(String),
    Number(u32),
    Duration(Duration),
    Percent(u32),
    Zone(Zone),
    /// `;` to end of line, marker stripped.
    Comment(String),

    LBrace,
    RBrace,
    Comma,
    At,
    Arrow,
}

impl TokenKind {
    /// How the token reads in an error message.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Tag(tag) => format!("tag `{}`", tag),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Number(n) => format!("number `{}`", n),
            TokenKind::Duration(d) => format!("duration `{}`", d),
            TokenKind::Percent(p) => format!("percentage `{}%`", p),
            TokenKind::Zone(z) => format!("zone `{}`", z),
            TokenKind::Comment(_) => "comment".to_string(),
            TokenKind::LBrace => "`{`".to_string(),
            TokenKind::RBrace => "`}`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::At => "`@`".to_string(),
            TokenKind::Arrow => "`->`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// Split source text into tokens. Whitespace is dropped, comments are kept.
pub fn tokenize(source: &str, file_id: usize) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source, file_id).run()
}

struct Lexer<'a> {
    source: &'a str,
    /// Characters paired with their byte offsets.
    chars: Vec<(usize, char)>,
    pos: usize,
    file_id: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            file_id,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    /// Byte offset of the current character (source length at the end).
    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(o, _)| o)
            .unwrap_or(self.source.len())
    }

    fn error(&self, msg: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(msg, span, self.file_id)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let start = self.offset();
            let kind = match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                ';' => self.lex_comment(),
                '"' => self.lex_string()?,
                '0'..='9' => self.lex_number()?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_word()?,
                '{' => { self.pos += 1; TokenKind::LBrace }
                '}' => { self.pos += 1; TokenKind::RBrace }
                ',' => { self.pos += 1; TokenKind::Comma }
                '@' => { self.pos += 1; TokenKind::At }
                '-' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    TokenKind::Arrow
                }
                other => {
                    let end = start + other.len_utf8();
                    return Err(self.error(format!("unexpected character `{}`", other), start..end));
                }
            };
            tokens.push(Token {
                kind,
                span: start..self.offset(),
            });
        }

        Ok(tokens)
    }

    fn lex_comment(&mut self) -> TokenKind {
        self.pos += 1; // skip ;
        let start = self.offset();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
        TokenKind::Comment(self.source[start..self.offset()].trim().to_string())
    }

    fn lex_string(&mut self) -> Result<TokenKind, ParseError> {
        let open = self.offset();
        self.pos += 1; // skip opening quote
        let start = self.offset();
        loop {
            match self.peek() {
                Some('"') => break,
                Some(_) => self.pos += 1,
                None => {
                    return Err(self
                        .error("unterminated string", open..self.source.len())
                        .with_note("strings are closed by a second `\"`"));
                }
            }
        }
        let text = self.source[start..self.offset()].to_string();
        self.pos += 1; // skip closing quote
        Ok(TokenKind::String(text))
    }

    fn lex_digits(&mut self) -> Result<u32, ParseError> {
        let start = self.offset();
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        let span = start..self.offset();
        self.source[span.clone()]
            .parse::<u32>()
            .map_err(|_| self.error("number is too large", span))
    }

    /// Plain integer, `N%` or `MM:SS`.
    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.offset();
        let value = self.lex_digits()?;

        match self.peek() {
            Some('%') => {
                self.pos += 1;
                Ok(TokenKind::Percent(value))
            }
            Some(':') => {
                self.pos += 1;
                if !matches!(self.peek(), Some('0'..='9')) {
                    let span = start..self.offset();
                    return Err(self
                        .error("malformed duration", span)
                        .with_note("durations are written as MM:SS"));
                }
                let seconds = self.lex_digits()?;
                Ok(TokenKind::Duration(Duration::new(value, seconds)))
            }
            _ => Ok(TokenKind::Number(value)),
        }
    }

    /// Tags are `[A-Z_]+`; zones are `Z<digits>` or `SS`. Any other word is malformed.
    fn lex_word(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.offset();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let span = start..self.offset();
        let word = &self.source[span.clone()];

        if word == "SS" {
            return Ok(TokenKind::Zone(Zone::SweetSpot));
        }
        let zone_digits = word
            .strip_prefix('Z')
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()));
        if let Some(digits) = zone_digits {
            let n = digits
                .parse::<u32>()
                .map_err(|_| self.error("zone number is too large", span.clone()))?;
            return Ok(TokenKind::Zone(Zone::Numbered(n)));
        }
        if word.bytes().all(|b| b.is_ascii_uppercase() || b == b'_') {
            return Ok(TokenKind::Tag(word.to_string()));
        }

        Err(self
            .error(format!("malformed tag `{}`", word), span)
            .with_note("tags are written with uppercase letters and underscores only"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, 0)
            .expect("tokenize failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn block_with_values() {
        assert_eq!(
            kinds("SEGMENT {DURATION 11:06, POWER 65%}"),
            vec![
                TokenKind::Tag("SEGMENT".into()),
                TokenKind::LBrace,
                TokenKind::Tag("DURATION".into()),
                TokenKind::Duration(Duration::new(11, 6)),
                TokenKind::Comma,
                TokenKind::Tag("POWER".into()),
                TokenKind::Percent(65),
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn ranges_and_zones() {
        assert_eq!(
            kinds("POWER Z1 -> SS"),
            vec![
                TokenKind::Tag("POWER".into()),
                TokenKind::Zone(Zone::Numbered(1)),
                TokenKind::Arrow,
                TokenKind::Zone(Zone::SweetSpot),
            ]
        );
        assert_eq!(
            kinds("120->420"),
            vec![TokenKind::Number(120), TokenKind::Arrow, TokenKind::Number(420)]
        );
    }

    #[test]
    fn underscore_tag() {
        assert_eq!(kinds("START_REPEAT"), vec![TokenKind::Tag("START_REPEAT".into())]);
    }

    #[test]
    fn multiline_string() {
        assert_eq!(
            kinds("\"Yo quiero\nTaco Bell\""),
            vec![TokenKind::String("Yo quiero\nTaco Bell".into())]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("NAME \"Foo\", ; trailing note\nAUTHOR"),
            vec![
                TokenKind::Tag("NAME".into()),
                TokenKind::String("Foo".into()),
                TokenKind::Comma,
                TokenKind::Comment("trailing note".into()),
                TokenKind::Tag("AUTHOR".into()),
            ]
        );
    }

    #[test]
    fn semicolon_inside_string_is_text() {
        assert_eq!(kinds("\"a; b\""), vec![TokenKind::String("a; b".into())]);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let tokens = tokenize("  @ 00:30", 0).unwrap();
        assert_eq!(tokens[0].span, 2..3);
        assert_eq!(tokens[1].span, 4..9);
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("NAME \"oops", 0).unwrap_err();
        assert_eq!(err.message, "unterminated string");
        assert_eq!(err.span, 5..10);
    }

    #[test]
    fn lowercase_tag_is_malformed() {
        let err = tokenize("meta {}", 0).unwrap_err();
        assert!(err.message.contains("malformed tag `meta`"));
    }

    #[test]
    fn digit_in_tag_is_malformed() {
        assert!(tokenize("BLOCK2 {}", 0).is_err());
    }

    #[test]
    fn stray_character() {
        let err = tokenize("FREE { DURATION 10:00 = }", 0).unwrap_err();
        assert!(err.message.contains("unexpected character `=`"));
    }

    #[test]
    fn huge_number() {
        assert!(tokenize("FTP 99999999999", 0).is_err());
    }
}
