use crate::block::message::Message;
use crate::block::{Block, BlockKind, Keyword, Param};
use crate::document::WorkoutDocument;
use crate::parser::error::ParseError;
use crate::parser::grammar::{RawBlock, RawEntry, RawItem, RawTree, RawValue};
use crate::value::{Scalar, ValueExpr};

/// Reshape the raw tree into typed blocks.
///
/// Comments are dropped here. No cross-parameter or cross-block checks are
/// made; the only failures are tags that name no block kind or keyword, and
/// values that cannot be read as their keyword's type at all.
pub fn build(tree: RawTree, file_id: usize) -> Result<WorkoutDocument, ParseError> {
    let mut blocks = Vec::new();
    for item in tree.items {
        match item {
            RawItem::Block(raw) => blocks.push(build_block(raw, file_id)?),
            RawItem::Comment(_) => {}
        }
    }
    Ok(WorkoutDocument::new(blocks, file_id))
}

fn build_block(raw: RawBlock, file_id: usize) -> Result<Block, ParseError> {
    let kind = BlockKind::from_tag(&raw.tag).ok_or_else(|| {
        ParseError::error(format!("unknown block `{}`", raw.tag), raw.tag_span.clone(), file_id)
            .with_note(format!("known blocks: {}", known_tags(BlockKind::ALL.map(|k| k.tag()))))
    })?;

    let mut block = Block {
        kind,
        params: Vec::new(),
        messages: Vec::new(),
        span: raw.span,
        tag_span: raw.tag_span,
    };

    for entry in raw.entries {
        match entry {
            RawEntry::Param {
                keyword,
                keyword_span,
                value,
                value_span,
            } => {
                let keyword = Keyword::from_tag(&keyword).ok_or_else(|| {
                    ParseError::error(
                        format!("unknown parameter `{}`", keyword),
                        keyword_span.clone(),
                        file_id,
                    )
                    .with_note(format!("known parameters: {}", known_tags(Keyword::ALL.map(|k| k.tag()))))
                })?;

                let value = interpret_value(keyword, value).ok_or_else(|| {
                    ParseError::error(
                        format!("`{}` cannot take this value", keyword),
                        value_span.clone(),
                        file_id,
                    )
                    .with_note(expected_value(keyword))
                })?;

                block.params.push(Param {
                    keyword,
                    value,
                    span: keyword_span.start..value_span.end,
                    value_span,
                });
            }
            RawEntry::Message { offset, text, span } => {
                block.messages.push(Message { offset, text, span });
            }
            RawEntry::Comment(_) => {}
        }
    }

    Ok(block)
}

/// Convert a raw value, checking only what the keyword's type makes impossible.
fn interpret_value(keyword: Keyword, raw: RawValue) -> Option<ValueExpr> {
    let value = match raw {
        RawValue::Text(text) => ValueExpr::Text(text),
        RawValue::Scalar(s) => ValueExpr::Scalar(s),
        RawValue::Range(left, right) => ValueExpr::Range { left, right },
    };

    let fits = match keyword {
        Keyword::Duration => match &value {
            ValueExpr::Scalar(s) => is_duration(s),
            ValueExpr::Range { left, right } => is_duration(left) && is_duration(right),
            ValueExpr::Text(_) => false,
        },
        Keyword::Power => match &value {
            ValueExpr::Scalar(s) => s.is_power(),
            ValueExpr::Range { left, right } => left.is_power() && right.is_power(),
            ValueExpr::Text(_) => false,
        },
        _ => true,
    };

    fits.then_some(value)
}

fn is_duration(s: &Scalar) -> bool {
    matches!(s, Scalar::Duration(_))
}

fn expected_value(keyword: Keyword) -> String {
    match keyword {
        Keyword::Duration => "DURATION takes MM:SS or a range of MM:SS values".to_string(),
        Keyword::Power => {
            "POWER takes watts, a percentage, a zone (Z1-Z7, SS) or a range of them".to_string()
        }
        other => format!("unexpected value for {}", other),
    }
}

fn known_tags<const N: usize>(tags: [&str; N]) -> String {
    tags.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::grammar::parse;
    use crate::parser::lexer::tokenize;
    use crate::value::{Duration, Zone};

    fn build_src(source: &str) -> Result<WorkoutDocument, ParseError> {
        let tokens = tokenize(source, 0)?;
        let tree = parse(&tokens, source.len(), 0)?;
        build(tree, 0)
    }

    #[test]
    fn typed_values() {
        let doc = build_src(
            "FREE {DURATION 11:06}\nFREE {POWER 165}\nFREE {POWER 120 -> 420}\nFREE {POWER SS}\nFREE {DESCRIPTION \"x\"}",
        )
        .unwrap();
        let values: Vec<&ValueExpr> = doc.blocks.iter().map(|b| &b.params[0].value).collect();
        assert_eq!(values[0], &ValueExpr::Scalar(Scalar::Duration(Duration::new(11, 6))));
        assert_eq!(values[1], &ValueExpr::Scalar(Scalar::Integer(165)));
        assert_eq!(
            values[2],
            &ValueExpr::Range {
                left: Scalar::Integer(120),
                right: Scalar::Integer(420)
            }
        );
        assert_eq!(values[3], &ValueExpr::Scalar(Scalar::Zone(Zone::SweetSpot)));
        assert_eq!(values[4], &ValueExpr::Text("x".into()));
    }

    #[test]
    fn comments_are_discarded() {
        let doc = build_src("; header\nMETA {\n    ; note\n    NAME \"Foo\", ; trailing\n    ; AUTHOR \"sco1\",\n}").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].kind, BlockKind::Meta);
        assert_eq!(doc.blocks[0].params.len(), 1);
        assert_eq!(doc.blocks[0].get(Keyword::Name), Some(&ValueExpr::Text("Foo".into())));
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let doc = build_src("FREE {DURATION 01:00, DURATION 02:00}").unwrap();
        let params = &doc.blocks[0].params;
        assert_eq!(params.len(), 2);
        assert_eq!(
            doc.blocks[0].get(Keyword::Duration),
            Some(&ValueExpr::Scalar(Scalar::Duration(Duration::new(1, 0))))
        );
    }

    #[test]
    fn messages_keep_order() {
        let doc = build_src("FREE {@ 00:10 \"one\", DURATION 01:00, @ 00:05 \"two\"}").unwrap();
        let texts: Vec<&str> = doc.blocks[0].messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn param_spans() {
        let doc = build_src("FREE {POWER 50% -> 60%}").unwrap();
        let param = &doc.blocks[0].params[0];
        assert_eq!(param.span, 6..22);
        assert_eq!(param.value_span, 12..22);
    }

    #[test]
    fn unknown_block() {
        let err = build_src("SPRINT {DURATION 00:10}").unwrap_err();
        assert_eq!(err.message, "unknown block `SPRINT`");
        assert_eq!(err.span, 0..6);
    }

    #[test]
    fn unknown_keyword() {
        let err = build_src("FREE {SPEED 30}").unwrap_err();
        assert_eq!(err.message, "unknown parameter `SPEED`");
    }

    #[test]
    fn duration_must_be_duration() {
        assert!(build_src("FREE {DURATION 65%}").is_err());
        assert!(build_src("FREE {DURATION \"ten minutes\"}").is_err());
        assert!(build_src("FREE {DURATION 00:30 -> 90}").is_err());
        assert!(build_src("INTERVALS {DURATION 00:30 -> 00:45}").is_ok());
    }

    #[test]
    fn power_must_be_power() {
        assert!(build_src("SEGMENT {POWER 10:00}").is_err());
        assert!(build_src("SEGMENT {POWER \"hard\"}").is_err());
        // side homogeneity is checked later
        assert!(build_src("SEGMENT {POWER 65% -> Z3}").is_ok());
    }

    #[test]
    fn other_keywords_are_left_to_the_validator() {
        assert!(build_src("META {FTP 00:30, NAME 5}").is_ok());
    }
}
