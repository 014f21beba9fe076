pub mod builder;
pub mod error;
pub mod grammar;
pub mod lexer;

pub use error::ParseError;

use tracing::debug;

use crate::WorkoutDocument;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Tokenize, parse and build the source into a WorkoutDocument.
    pub fn parse(&self) -> Result<WorkoutDocument, ParseError> {
        let tokens = lexer::tokenize(&self.source, self.file_id)?;
        let tree = grammar::parse(&tokens, self.source.len(), self.file_id)?;
        let document = builder::build(tree, self.file_id)?;
        debug!(
            file_id = self.file_id,
            tokens = tokens.len(),
            blocks = document.blocks.len(),
            "parsed workout"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockKind, Keyword};

    #[test]
    fn parses_a_small_workout() {
        let source = r#"
META {
    NAME "Foo",
    AUTHOR "sco1",
    DESCRIPTION "Yo quiero
Taco Bell",
}

START_REPEAT {REPEAT 3}
SEGMENT {DURATION 05:00, POWER Z2}
END_REPEAT {}
"#;
        let doc = Parser::new(source.to_string(), 7).parse().unwrap();
        assert_eq!(doc.source_id, 7);
        let kinds: Vec<BlockKind> = doc.blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Meta,
                BlockKind::StartRepeat,
                BlockKind::Segment,
                BlockKind::EndRepeat
            ]
        );
        assert_eq!(doc.meta().and_then(|m| m.get(Keyword::Description)).and_then(|v| v.as_text()), Some("Yo quiero\nTaco Bell"));
        assert_eq!(doc.body().len(), 3);
    }

    #[test]
    fn errors_carry_file_id() {
        let err = Parser::new("FREE {".to_string(), 3).parse().unwrap_err();
        assert_eq!(err.file_id, 3);
    }
}
