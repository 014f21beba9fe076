//! Emit a normalized workout as `.zwo` XML.
//!
//! Attribute order and layout are fixed so that the same document always
//! produces byte-identical output.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use zwom::{Block, BlockKind, Keyword, Scalar, ValueExpr, WorkoutDocument};

use crate::error::SerializeError;
use crate::validator::is_reserved_tag;
use crate::zones::zone_percent;

/// Element a body block kind is written as.
pub fn element_name(kind: BlockKind) -> Option<&'static str> {
    match kind {
        BlockKind::Free => Some("FreeRide"),
        BlockKind::Segment => Some("SteadyState"),
        BlockKind::Warmup => Some("WarmUp"),
        BlockKind::Ramp => Some("Ramp"),
        BlockKind::Cooldown => Some("Cooldown"),
        BlockKind::Intervals => Some("IntervalsT"),
        BlockKind::Meta | BlockKind::StartRepeat | BlockKind::EndRepeat => None,
    }
}

/// Write a normalized document. Repeat markers are an error here.
pub fn to_xml(document: &WorkoutDocument) -> Result<String, SerializeError> {
    let meta = document.meta().ok_or(SerializeError::MissingMeta)?;
    let ftp = meta.get(Keyword::Ftp).and_then(|v| v.as_integer());

    let mut out = XmlOut {
        writer: Writer::new_with_indent(Vec::new(), b' ', 4),
    };
    out.start(BytesStart::new("workout_file"))?;
    out.text_element("name", meta_text(meta, Keyword::Name)?)?;
    out.text_element("author", meta_text(meta, Keyword::Author)?)?;
    out.text_element("description", meta_text(meta, Keyword::Description)?)?;
    if let Some(tags) = meta.get(Keyword::Tags).and_then(|v| v.as_text()) {
        write_tags(&mut out, tags)?;
    }
    out.text_element("sportType", "bike")?;

    out.start(BytesStart::new("workout"))?;
    for block in document.body() {
        write_block(&mut out, block, ftp)?;
    }
    out.end("workout")?;
    out.end("workout_file")?;

    let mut xml = String::from_utf8(out.writer.into_inner()).map_err(xml_error)?;
    xml.push('\n');
    Ok(xml)
}

fn meta_text(meta: &Block, keyword: Keyword) -> Result<&str, SerializeError> {
    meta.get(keyword)
        .and_then(|v| v.as_text())
        .ok_or(SerializeError::MissingParameter {
            kind: BlockKind::Meta,
            keyword,
        })
}

fn write_tags(out: &mut XmlOut, tags: &str) -> Result<(), SerializeError> {
    let names: Vec<String> = tags
        .split_whitespace()
        .map(|t| t.trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .map(|t| {
            // Built-in tags keep the platform's canonical spelling.
            if is_reserved_tag(t) {
                t.to_ascii_uppercase()
            } else {
                t.to_string()
            }
        })
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    out.start(BytesStart::new("tags"))?;
    for name in &names {
        let mut tag = BytesStart::new("tag");
        tag.push_attribute(("name", name.as_str()));
        out.empty(tag)?;
    }
    out.end("tags")
}

fn write_block(out: &mut XmlOut, block: &Block, ftp: Option<u32>) -> Result<(), SerializeError> {
    let name = element_name(block.kind).ok_or(SerializeError::UnexpectedBlock(block.kind))?;
    let attrs = block_attributes(block, ftp)?;

    let mut element = BytesStart::new(name);
    for (key, value) in &attrs {
        element.push_attribute((*key, value.as_str()));
    }

    if block.messages.is_empty() {
        return out.empty(element);
    }
    out.start(element)?;
    for message in &block.messages {
        let seconds = message.offset.total_seconds().to_string();
        let mut event = BytesStart::new("textevent");
        event.push_attribute(("timeoffset", seconds.as_str()));
        event.push_attribute(("message", message.text.as_str()));
        out.empty(event)?;
    }
    out.end(name)
}

type Attrs = Vec<(&'static str, String)>;

fn block_attributes(block: &Block, ftp: Option<u32>) -> Result<Attrs, SerializeError> {
    let mut attrs: Attrs = Vec::new();
    let power = Power { block, ftp };

    match block.kind {
        BlockKind::Free => {
            attrs.push(("Duration", duration_seconds(block)?));
            push_cadence(&mut attrs, block)?;
            attrs.push(("FlatRoad", "0".to_string()));
        }
        BlockKind::Segment => {
            attrs.push(("Duration", duration_seconds(block)?));
            push_cadence(&mut attrs, block)?;
            match block.get(Keyword::Power) {
                Some(ValueExpr::Range { left, right }) => {
                    attrs.push(("PowerLow", power.fraction(left)?));
                    attrs.push(("PowerHigh", power.fraction(right)?));
                }
                Some(ValueExpr::Scalar(s)) => attrs.push(("Power", power.fraction(s)?)),
                Some(other) => return Err(unexpected(block, Keyword::Power, other)),
                None => {}
            }
            attrs.push(("pace", "0".to_string()));
        }
        BlockKind::Warmup | BlockKind::Ramp | BlockKind::Cooldown => {
            attrs.push(("Duration", duration_seconds(block)?));
            push_cadence(&mut attrs, block)?;
            if let Some((low, high)) = power.pair()? {
                attrs.push(("PowerLow", low));
                attrs.push(("PowerHigh", high));
            }
            attrs.push(("pace", "0".to_string()));
        }
        BlockKind::Intervals => {
            let repeat = block
                .get(Keyword::Repeat)
                .and_then(|v| v.as_integer())
                .ok_or(SerializeError::MissingParameter {
                    kind: block.kind,
                    keyword: Keyword::Repeat,
                })?;
            attrs.push(("Repeat", repeat.to_string()));

            let duration = required(block, Keyword::Duration)?;
            match duration.as_range() {
                Some((Scalar::Duration(on), Scalar::Duration(off))) => {
                    attrs.push(("OnDuration", on.total_seconds().to_string()));
                    attrs.push(("OffDuration", off.total_seconds().to_string()));
                }
                _ => return Err(unexpected(block, Keyword::Duration, duration)),
            }

            if let Some((on, off)) = power.pair()? {
                attrs.push(("OnPower", on));
                attrs.push(("OffPower", off));
            }

            match block.get(Keyword::Cadence) {
                Some(ValueExpr::Range {
                    left: Scalar::Integer(on),
                    right: Scalar::Integer(off),
                }) => {
                    attrs.push(("Cadence", on.to_string()));
                    attrs.push(("CadenceResting", off.to_string()));
                }
                Some(ValueExpr::Scalar(Scalar::Integer(on))) => attrs.push(("Cadence", on.to_string())),
                Some(other) => return Err(unexpected(block, Keyword::Cadence, other)),
                None => {}
            }
            attrs.push(("pace", "0".to_string()));
        }
        BlockKind::Meta | BlockKind::StartRepeat | BlockKind::EndRepeat => {
            return Err(SerializeError::UnexpectedBlock(block.kind));
        }
    }
    Ok(attrs)
}

fn required(block: &Block, keyword: Keyword) -> Result<&ValueExpr, SerializeError> {
    block.get(keyword).ok_or(SerializeError::MissingParameter {
        kind: block.kind,
        keyword,
    })
}

fn duration_seconds(block: &Block) -> Result<String, SerializeError> {
    match required(block, Keyword::Duration)? {
        ValueExpr::Scalar(Scalar::Duration(d)) => Ok(d.total_seconds().to_string()),
        other => Err(unexpected(block, Keyword::Duration, other)),
    }
}

fn push_cadence(attrs: &mut Attrs, block: &Block) -> Result<(), SerializeError> {
    match block.get(Keyword::Cadence) {
        Some(ValueExpr::Scalar(Scalar::Integer(rpm))) => attrs.push(("Cadence", rpm.to_string())),
        Some(other) => return Err(unexpected(block, Keyword::Cadence, other)),
        None => {}
    }
    Ok(())
}

fn unexpected(block: &Block, keyword: Keyword, value: &ValueExpr) -> SerializeError {
    SerializeError::UnexpectedValue {
        kind: block.kind,
        keyword,
        value: value.to_string(),
    }
}

/// Converts a block's POWER values into fractions of FTP.
struct Power<'a> {
    block: &'a Block,
    ftp: Option<u32>,
}

impl Power<'_> {
    fn fraction(&self, scalar: &Scalar) -> Result<String, SerializeError> {
        let (value, of) = match scalar {
            Scalar::Percent(p) => (*p, 100),
            Scalar::Integer(watts) => (*watts, self.ftp.ok_or(SerializeError::MissingFtp)?),
            Scalar::Zone(zone) => (zone_percent(*zone).ok_or(SerializeError::UnknownZone(*zone))?, 100),
            Scalar::Duration(_) => {
                return Err(unexpected(
                    self.block,
                    Keyword::Power,
                    &ValueExpr::Scalar(*scalar),
                ));
            }
        };
        Ok(format_fraction(value, of))
    }

    /// Low/high (or on/off) pair. A scalar is used for both ends.
    fn pair(&self) -> Result<Option<(String, String)>, SerializeError> {
        match self.block.get(Keyword::Power) {
            None => Ok(None),
            Some(ValueExpr::Scalar(s)) => {
                let value = self.fraction(s)?;
                Ok(Some((value.clone(), value)))
            }
            Some(ValueExpr::Range { left, right }) => {
                Ok(Some((self.fraction(left)?, self.fraction(right)?)))
            }
            Some(other) => Err(unexpected(self.block, Keyword::Power, other)),
        }
    }
}

/// Shortest decimal form: 65/100 is `0.65`, 250/250 is `1`.
pub fn format_fraction(value: u32, of: u32) -> String {
    format!("{}", f64::from(value) / f64::from(of))
}

fn xml_error(err: impl std::fmt::Display) -> SerializeError {
    SerializeError::Xml(err.to_string())
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn start(&mut self, element: BytesStart<'_>) -> Result<(), SerializeError> {
        self.writer.write_event(Event::Start(element)).map_err(xml_error)
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<(), SerializeError> {
        self.writer.write_event(Event::Empty(element)).map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<(), SerializeError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), SerializeError> {
        self.start(BytesStart::new(name))?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.end(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zwom::{Duration, Message, Zone};

    fn meta(ftp: Option<u32>) -> Block {
        let mut meta = Block::new(BlockKind::Meta)
            .with_param(Keyword::Name, ValueExpr::Text("Foo".into()))
            .with_param(Keyword::Author, ValueExpr::Text("sco1".into()))
            .with_param(Keyword::Description, ValueExpr::Text("Test".into()));
        if let Some(ftp) = ftp {
            meta = meta.with_param(Keyword::Ftp, ValueExpr::Scalar(Scalar::Integer(ftp)));
        }
        meta
    }

    fn dur(minutes: u32, seconds: u32) -> ValueExpr {
        ValueExpr::Scalar(Scalar::Duration(Duration::new(minutes, seconds)))
    }

    fn body_line(block: Block, ftp: Option<u32>) -> String {
        let doc = WorkoutDocument::new(vec![meta(ftp), block], 0);
        let xml = to_xml(&doc).unwrap();
        let start = xml.find("<workout>").unwrap() + "<workout>".len();
        let end = xml.find("</workout>").unwrap();
        xml[start..end].trim().to_string()
    }

    #[test]
    fn fractions() {
        assert_eq!(format_fraction(65, 100), "0.65");
        assert_eq!(format_fraction(200, 250), "0.8");
        assert_eq!(format_fraction(100, 100), "1");
        assert_eq!(format_fraction(109, 100), "1.09");
    }

    #[test]
    fn whole_document_layout() {
        let doc = WorkoutDocument::new(
            vec![
                meta(None),
                Block::new(BlockKind::Segment)
                    .with_param(Keyword::Duration, dur(5, 0))
                    .with_param(Keyword::Power, ValueExpr::Scalar(Scalar::Percent(65))),
            ],
            0,
        );
        let expected = "\
<workout_file>
    <name>Foo</name>
    <author>sco1</author>
    <description>Test</description>
    <sportType>bike</sportType>
    <workout>
        <SteadyState Duration=\"300\" Power=\"0.65\" pace=\"0\"/>
    </workout>
</workout_file>
";
        assert_eq!(to_xml(&doc).unwrap(), expected);
    }

    #[test]
    fn free_ride() {
        let block = Block::new(BlockKind::Free)
            .with_param(Keyword::Duration, dur(1, 30))
            .with_param(Keyword::Cadence, ValueExpr::Scalar(Scalar::Integer(85)))
            .with_param(Keyword::Power, ValueExpr::Scalar(Scalar::Integer(999)));
        assert_eq!(
            body_line(block, None),
            "<FreeRide Duration=\"90\" Cadence=\"85\" FlatRoad=\"0\"/>"
        );
    }

    #[test]
    fn ramp_with_watts_and_scalar() {
        let block = Block::new(BlockKind::Cooldown)
            .with_param(Keyword::Duration, dur(10, 0))
            .with_param(
                Keyword::Power,
                ValueExpr::Range {
                    left: Scalar::Integer(250),
                    right: Scalar::Integer(125),
                },
            );
        assert_eq!(
            body_line(block, Some(250)),
            "<Cooldown Duration=\"600\" PowerLow=\"1\" PowerHigh=\"0.5\" pace=\"0\"/>"
        );

        let block = Block::new(BlockKind::Ramp)
            .with_param(Keyword::Duration, dur(1, 0))
            .with_param(Keyword::Power, ValueExpr::Scalar(Scalar::Zone(Zone::SweetSpot)));
        assert_eq!(
            body_line(block, None),
            "<Ramp Duration=\"60\" PowerLow=\"0.9\" PowerHigh=\"0.9\" pace=\"0\"/>"
        );
    }

    #[test]
    fn intervals() {
        let block = Block::new(BlockKind::Intervals)
            .with_param(Keyword::Repeat, ValueExpr::Scalar(Scalar::Integer(4)))
            .with_param(
                Keyword::Duration,
                ValueExpr::Range {
                    left: Scalar::Duration(Duration::new(0, 30)),
                    right: Scalar::Duration(Duration::new(1, 0)),
                },
            )
            .with_param(
                Keyword::Power,
                ValueExpr::Range {
                    left: Scalar::Percent(120),
                    right: Scalar::Percent(50),
                },
            )
            .with_param(
                Keyword::Cadence,
                ValueExpr::Range {
                    left: Scalar::Integer(100),
                    right: Scalar::Integer(85),
                },
            );
        assert_eq!(
            body_line(block, None),
            "<IntervalsT Repeat=\"4\" OnDuration=\"30\" OffDuration=\"60\" OnPower=\"1.2\" OffPower=\"0.5\" Cadence=\"100\" CadenceResting=\"85\" pace=\"0\"/>"
        );
    }

    #[test]
    fn messages_become_text_events() {
        let block = Block::new(BlockKind::Segment)
            .with_param(Keyword::Duration, dur(2, 0))
            .with_message(Message::new(Duration::new(0, 0), "Go"))
            .with_message(Message::new(Duration::new(1, 30), "Halfway & more"));
        let doc = WorkoutDocument::new(vec![meta(None), block], 0);
        let xml = to_xml(&doc).unwrap();
        assert!(xml.contains(
            "        <SteadyState Duration=\"120\" pace=\"0\">\n            <textevent timeoffset=\"0\" message=\"Go\"/>\n            <textevent timeoffset=\"90\" message=\"Halfway &amp; more\"/>\n        </SteadyState>\n"
        ));
    }

    #[test]
    fn tags_are_listed() {
        let meta = meta(None).with_param(Keyword::Tags, ValueExpr::Text("#recovery #Spin".into()));
        let block = Block::new(BlockKind::Free).with_param(Keyword::Duration, dur(1, 0));
        let xml = to_xml(&WorkoutDocument::new(vec![meta, block], 0)).unwrap();
        assert!(xml.contains(
            "    <tags>\n        <tag name=\"RECOVERY\"/>\n        <tag name=\"Spin\"/>\n    </tags>\n    <sportType>"
        ));
    }

    #[test]
    fn rejects_unnormalized_or_unvalidated() {
        let doc = WorkoutDocument::new(vec![meta(None), Block::new(BlockKind::StartRepeat)], 0);
        assert_eq!(
            to_xml(&doc),
            Err(SerializeError::UnexpectedBlock(BlockKind::StartRepeat))
        );

        let watts = Block::new(BlockKind::Segment)
            .with_param(Keyword::Duration, dur(1, 0))
            .with_param(Keyword::Power, ValueExpr::Scalar(Scalar::Integer(200)));
        let doc = WorkoutDocument::new(vec![meta(None), watts], 0);
        assert_eq!(to_xml(&doc), Err(SerializeError::MissingFtp));

        let doc = WorkoutDocument::new(vec![Block::new(BlockKind::Free)], 0);
        assert_eq!(to_xml(&doc), Err(SerializeError::MissingMeta));
    }
}
