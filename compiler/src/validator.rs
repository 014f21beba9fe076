use tracing::debug;

use zwom::{Block, BlockKind, Keyword, Param, Scalar, WorkoutDocument};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::rules::{BlockRules, Presence, rules_for};

/// Maximum combined length of user tags.
pub const MAX_TAG_CHARS: usize = 31;

/// Tags the platform treats as built in. They never count toward the limit.
pub const RESERVED_TAGS: [&str; 4] = ["RECOVERY", "INTERVALS", "FTP", "TT"];

/// Check every semantic rule and collect all violations.
///
/// Errors come out grouped by priority: document structure, then META, then
/// each body block in source order with its value checks last.
pub fn validate(document: &WorkoutDocument) -> Vec<ValidationError> {
    let mut validator = Validator {
        file_id: document.source_id,
        errors: Vec::new(),
    };
    validator.check_document_shape(document);
    validator.check_repeat_structure(document);
    if let Some(meta) = document.meta() {
        validator.check_block(meta);
        validator.check_tags(meta);
    }
    validator.check_ftp_requirement(document);
    for block in document.body() {
        if block.kind != BlockKind::Meta {
            validator.check_block(block);
        }
    }
    debug!(errors = validator.errors.len(), "validated workout");
    validator.errors
}

struct Validator {
    file_id: usize,
    errors: Vec<ValidationError>,
}

impl Validator {
    fn report(
        &mut self,
        kind: ValidationErrorKind,
        message: impl Into<String>,
        span: Option<std::ops::Range<usize>>,
    ) {
        self.errors
            .push(ValidationError::new(kind, message, span, self.file_id));
    }

    fn report_with_note(
        &mut self,
        kind: ValidationErrorKind,
        message: impl Into<String>,
        span: Option<std::ops::Range<usize>>,
        note: impl Into<String>,
    ) {
        self.errors
            .push(ValidationError::new(kind, message, span, self.file_id).with_note(note));
    }

    // ------------------------------------------------------------------
    // Document level
    // ------------------------------------------------------------------

    fn check_document_shape(&mut self, document: &WorkoutDocument) {
        match document.blocks.first() {
            None => {
                self.report(
                    ValidationErrorKind::MissingMeta,
                    "workout must begin with a META block",
                    None,
                );
            }
            Some(first) if first.kind != BlockKind::Meta => {
                self.report(
                    ValidationErrorKind::MissingMeta,
                    "workout must begin with a META block",
                    Some(first.tag_span.clone()),
                );
            }
            Some(_) => {}
        }

        for block in document.blocks.iter().skip(1) {
            if block.kind == BlockKind::Meta {
                self.report_with_note(
                    ValidationErrorKind::MisplacedMeta,
                    "unexpected META block",
                    Some(block.tag_span.clone()),
                    "a workout has exactly one META block and it comes first",
                );
            }
        }

        if !document.blocks.iter().any(|b| b.kind.is_body()) {
            let span = document.meta().map(|m| m.tag_span.clone());
            self.report(
                ValidationErrorKind::EmptyWorkout,
                "workout has no blocks after META",
                span,
            );
        }
    }

    fn check_repeat_structure(&mut self, document: &WorkoutDocument) {
        let mut open: Option<&Block> = None;
        let mut enclosed = 0usize;
        for block in &document.blocks {
            match block.kind {
                BlockKind::StartRepeat => {
                    if open.is_some() {
                        self.report_with_note(
                            ValidationErrorKind::RepeatStructure,
                            "nested START_REPEAT",
                            Some(block.tag_span.clone()),
                            "repeat groups cannot be nested",
                        );
                    } else {
                        open = Some(block);
                        enclosed = 0;
                    }
                }
                BlockKind::EndRepeat => match open.take() {
                    None => self.report(
                        ValidationErrorKind::RepeatStructure,
                        "END_REPEAT without a matching START_REPEAT",
                        Some(block.tag_span.clone()),
                    ),
                    Some(start) if enclosed == 0 => self.report(
                        ValidationErrorKind::RepeatStructure,
                        "repeat group contains no blocks",
                        Some(start.tag_span.clone()),
                    ),
                    Some(_) => {}
                },
                kind if kind.is_body() && open.is_some() => enclosed += 1,
                _ => {}
            }
        }
        if let Some(start) = open {
            self.report(
                ValidationErrorKind::RepeatStructure,
                "START_REPEAT is never closed by an END_REPEAT",
                Some(start.tag_span.clone()),
            );
        }
    }

    // ------------------------------------------------------------------
    // META
    // ------------------------------------------------------------------

    fn check_tags(&mut self, meta: &Block) {
        let Some(param) = meta.param(Keyword::Tags) else {
            return;
        };
        let Some(text) = param.value.as_text() else {
            return;
        };
        let used = counted_tag_chars(text);
        if used > MAX_TAG_CHARS {
            self.report_with_note(
                ValidationErrorKind::TagsTooLong,
                format!(
                    "TAGS use {} characters, at most {} are allowed",
                    used, MAX_TAG_CHARS
                ),
                Some(param.value_span.clone()),
                "#RECOVERY, #INTERVALS, #FTP and #TT do not count toward the limit",
            );
        }
    }

    /// Absolute power needs an FTP to convert against. One error per block.
    fn check_ftp_requirement(&mut self, document: &WorkoutDocument) {
        let has_ftp = document.meta().is_some_and(|m| m.has(Keyword::Ftp));
        if has_ftp {
            return;
        }
        for block in document.body() {
            if block.kind == BlockKind::Free || !block.kind.is_body() {
                continue;
            }
            let Some(power) = block.param(Keyword::Power) else {
                continue;
            };
            if power.value.scalars().any(|s| matches!(s, Scalar::Integer(_))) {
                self.report_with_note(
                    ValidationErrorKind::MissingFtp,
                    format!("{} uses absolute power but META has no FTP", block.kind),
                    Some(power.value_span.clone()),
                    "add `FTP <watts>` to META or give power as a percentage or zone",
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Per block
    // ------------------------------------------------------------------

    fn check_block(&mut self, block: &Block) {
        let rules = rules_for(block.kind);
        let mut seen: Vec<Keyword> = Vec::new();
        let mut duplicated: Vec<Keyword> = Vec::new();
        let mut checked: Vec<&Param> = Vec::new();

        for param in &block.params {
            if seen.contains(&param.keyword) {
                if !duplicated.contains(&param.keyword) {
                    duplicated.push(param.keyword);
                    self.report(
                        ValidationErrorKind::DuplicateParameter,
                        format!("{} is given more than once in {}", param.keyword, block.kind),
                        Some(param.span.clone()),
                    );
                }
                continue;
            }
            seen.push(param.keyword);

            match rules.rule(param.keyword) {
                None => self.report_with_note(
                    ValidationErrorKind::ForbiddenParameter,
                    format!("{} is not allowed in {}", param.keyword, block.kind),
                    Some(param.span.clone()),
                    format!("{} accepts: {}", block.kind, rules.allowed_keywords()),
                ),
                Some(rule) if rule.presence == Presence::Ignored => {}
                Some(rule) => {
                    if rule.shapes.iter().any(|shape| shape.matches(&param.value)) {
                        checked.push(param);
                    } else {
                        self.report_with_note(
                            ValidationErrorKind::InvalidValue,
                            format!(
                                "{} in {} does not accept {} values",
                                param.keyword,
                                block.kind,
                                param.value.describe()
                            ),
                            Some(param.value_span.clone()),
                            format!("expected {}", BlockRules::expected(rule)),
                        );
                    }
                }
            }
        }

        for rule in rules.required() {
            if !block.has(rule.keyword) {
                self.report(
                    ValidationErrorKind::MissingParameter,
                    format!("{} is missing required {}", block.kind, rule.keyword),
                    Some(block.tag_span.clone()),
                );
            }
        }

        self.check_messages(block, rules);

        for param in checked {
            self.check_value(block, param);
        }
    }

    fn check_messages(&mut self, block: &Block, rules: &BlockRules) {
        if !rules.messages {
            for message in &block.messages {
                self.report(
                    ValidationErrorKind::UnexpectedMessage,
                    format!("{} cannot carry messages", block.kind),
                    Some(message.span.clone()),
                );
            }
            return;
        }

        let total = block_seconds(block);
        for message in &block.messages {
            if !message.offset.is_well_formed() {
                self.report(
                    ValidationErrorKind::InvalidValue,
                    format!("invalid message offset `{}`: seconds must be below 60", message.offset),
                    Some(message.span.clone()),
                );
                continue;
            }
            if let Some(total) = total.filter(|t| message.offset.total_seconds() > *t) {
                self.report(
                    ValidationErrorKind::MessageOutOfRange,
                    format!(
                        "message at {} is past the end of the {}s block",
                        message.offset, total
                    ),
                    Some(message.span.clone()),
                );
            }
        }
    }

    /// Checks on the values themselves, run only for well-shaped parameters.
    fn check_value(&mut self, block: &Block, param: &Param) {
        let span = Some(param.value_span.clone());
        for scalar in param.value.scalars() {
            match scalar {
                Scalar::Duration(d) if !d.is_well_formed() => self.report(
                    ValidationErrorKind::InvalidValue,
                    format!("invalid duration `{}`: seconds must be below 60", d),
                    span.clone(),
                ),
                Scalar::Zone(z) if !z.is_defined() => self.report_with_note(
                    ValidationErrorKind::InvalidValue,
                    format!("unknown power zone `{}`", z),
                    span.clone(),
                    "zones are Z1 through Z7 and SS",
                ),
                _ => {}
            }
        }

        if let Some((left, right)) = param.value.as_range().filter(|(l, r)| l.kind() != r.kind()) {
            self.report(
                ValidationErrorKind::InvalidValue,
                format!(
                    "{} range mixes a {} and a {}",
                    param.keyword,
                    left.kind(),
                    right.kind()
                ),
                span.clone(),
            );
        }

        match param.keyword {
            Keyword::Repeat | Keyword::Ftp if param.value.as_integer() == Some(0) => {
                self.report(
                    ValidationErrorKind::InvalidValue,
                    format!("{} in {} must be a positive integer", param.keyword, block.kind),
                    span,
                );
            }
            Keyword::Power
                if param
                    .value
                    .scalars()
                    .any(|s| matches!(s, Scalar::Integer(0))) =>
            {
                self.report(
                    ValidationErrorKind::InvalidValue,
                    "absolute power must be greater than 0 watts",
                    span,
                );
            }
            _ => {}
        }
    }
}

/// Length of a block in seconds, when it can be known.
fn block_seconds(block: &Block) -> Option<u64> {
    let duration = block.get(Keyword::Duration)?;
    match block.kind {
        BlockKind::Intervals => {
            let repeat = block.get(Keyword::Repeat)?.as_integer()?;
            let (on, off) = duration.as_range()?;
            Some(u64::from(repeat) * (well_formed_seconds(on)? + well_formed_seconds(off)?))
        }
        _ => well_formed_seconds(duration.as_scalar()?),
    }
}

fn well_formed_seconds(scalar: &Scalar) -> Option<u64> {
    match scalar {
        Scalar::Duration(d) if d.is_well_formed() => Some(d.total_seconds()),
        _ => None,
    }
}

/// Characters the TAGS string spends against the limit.
pub fn counted_tag_chars(tags: &str) -> usize {
    tags.split_whitespace()
        .map(|token| token.trim_start_matches('#'))
        .filter(|name| !is_reserved_tag(name))
        .map(|name| name.chars().count())
        .sum()
}

pub fn is_reserved_tag(name: &str) -> bool {
    RESERVED_TAGS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}
