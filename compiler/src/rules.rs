//! Per-block-kind parameter rules.
//!
//! This table is the single source of truth for which keywords a block kind
//! accepts, which it requires, and what shape each value may take. The
//! validator only interprets it.

use zwom::{BlockKind, Keyword, Scalar, ValueExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Accepted and then ignored entirely (no checks, not serialized).
    Ignored,
}

/// An accepted value shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Text,
    Integer,
    Duration,
    /// Watts, percentage or zone.
    Power,
    DurationRange,
    IntegerRange,
    PowerRange,
}

impl Shape {
    /// Ranges are matched on their left side; mixed sides are reported by
    /// the value checks instead of twice.
    pub fn matches(&self, value: &ValueExpr) -> bool {
        match (self, value) {
            (Shape::Text, ValueExpr::Text(_)) => true,
            (Shape::Integer, ValueExpr::Scalar(Scalar::Integer(_))) => true,
            (Shape::Duration, ValueExpr::Scalar(Scalar::Duration(_))) => true,
            (Shape::Power, ValueExpr::Scalar(s)) => s.is_power(),
            (Shape::DurationRange, ValueExpr::Range { left, .. }) => {
                matches!(left, Scalar::Duration(_))
            }
            (Shape::IntegerRange, ValueExpr::Range { left, .. }) => {
                matches!(left, Scalar::Integer(_))
            }
            (Shape::PowerRange, ValueExpr::Range { left, .. }) => left.is_power(),
            _ => false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Shape::Text => "a quoted string",
            Shape::Integer => "an integer",
            Shape::Duration => "a MM:SS duration",
            Shape::Power => "watts, a percentage or a zone",
            Shape::DurationRange => "a range of durations (on -> off)",
            Shape::IntegerRange => "a range of integers",
            Shape::PowerRange => "a power range",
        }
    }
}

#[derive(Debug)]
pub struct ParamRule {
    pub keyword: Keyword,
    pub presence: Presence,
    pub shapes: &'static [Shape],
}

#[derive(Debug)]
pub struct BlockRules {
    pub kind: BlockKind,
    pub params: &'static [ParamRule],
    /// Whether `@ MM:SS "text"` messages are allowed.
    pub messages: bool,
}

impl BlockRules {
    pub fn rule(&self, keyword: Keyword) -> Option<&'static ParamRule> {
        self.params.iter().find(|r| r.keyword == keyword)
    }

    pub fn required(&self) -> impl Iterator<Item = &'static ParamRule> {
        self.params.iter().filter(|r| r.presence == Presence::Required)
    }

    /// Keywords that may appear at all, for error notes.
    pub fn allowed_keywords(&self) -> String {
        if self.params.is_empty() {
            return "none".to_string();
        }
        self.params
            .iter()
            .map(|r| r.keyword.tag())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Human readable list of the shapes accepted for `rule`.
    pub fn expected(rule: &ParamRule) -> String {
        rule.shapes
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

const fn required(keyword: Keyword, shapes: &'static [Shape]) -> ParamRule {
    ParamRule {
        keyword,
        presence: Presence::Required,
        shapes,
    }
}

const fn optional(keyword: Keyword, shapes: &'static [Shape]) -> ParamRule {
    ParamRule {
        keyword,
        presence: Presence::Optional,
        shapes,
    }
}

const fn ignored(keyword: Keyword) -> ParamRule {
    ParamRule {
        keyword,
        presence: Presence::Ignored,
        shapes: &[],
    }
}

const POWER_ANY: &[Shape] = &[Shape::Power, Shape::PowerRange];

const RAMP_PARAMS: &[ParamRule] = &[
    required(Keyword::Duration, &[Shape::Duration]),
    optional(Keyword::Power, POWER_ANY),
    optional(Keyword::Cadence, &[Shape::Integer]),
];

static RULES: [BlockRules; 9] = [
    BlockRules {
        kind: BlockKind::Meta,
        params: &[
            required(Keyword::Name, &[Shape::Text]),
            required(Keyword::Author, &[Shape::Text]),
            required(Keyword::Description, &[Shape::Text]),
            // Required only when absolute power is used; checked across the document.
            optional(Keyword::Ftp, &[Shape::Integer]),
            optional(Keyword::Tags, &[Shape::Text]),
        ],
        messages: false,
    },
    BlockRules {
        kind: BlockKind::Free,
        params: &[
            required(Keyword::Duration, &[Shape::Duration]),
            ignored(Keyword::Power),
            optional(Keyword::Cadence, &[Shape::Integer]),
        ],
        messages: true,
    },
    BlockRules {
        kind: BlockKind::Warmup,
        params: RAMP_PARAMS,
        messages: true,
    },
    BlockRules {
        kind: BlockKind::Ramp,
        params: RAMP_PARAMS,
        messages: true,
    },
    BlockRules {
        kind: BlockKind::Cooldown,
        params: RAMP_PARAMS,
        messages: true,
    },
    BlockRules {
        kind: BlockKind::Segment,
        params: &[
            required(Keyword::Duration, &[Shape::Duration]),
            optional(Keyword::Power, POWER_ANY),
            optional(Keyword::Cadence, &[Shape::Integer]),
        ],
        messages: true,
    },
    BlockRules {
        kind: BlockKind::Intervals,
        params: &[
            required(Keyword::Repeat, &[Shape::Integer]),
            required(Keyword::Duration, &[Shape::DurationRange]),
            optional(Keyword::Power, POWER_ANY),
            optional(Keyword::Cadence, &[Shape::Integer, Shape::IntegerRange]),
        ],
        messages: true,
    },
    BlockRules {
        kind: BlockKind::StartRepeat,
        params: &[required(Keyword::Repeat, &[Shape::Integer])],
        messages: false,
    },
    BlockRules {
        kind: BlockKind::EndRepeat,
        params: &[],
        messages: false,
    },
];

/// The rule set for a block kind.
pub fn rules_for(kind: BlockKind) -> &'static BlockRules {
    // Every kind has exactly one entry; the fallback is never taken.
    RULES
        .iter()
        .find(|r| r.kind == kind)
        .unwrap_or(&RULES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use zwom::{Duration, Zone};

    #[test]
    fn every_kind_has_rules() {
        for kind in BlockKind::ALL {
            assert_eq!(rules_for(kind).kind, kind);
        }
    }

    #[test]
    fn cadence_range_only_on_intervals() {
        let range = ValueExpr::Range {
            left: Scalar::Integer(80),
            right: Scalar::Integer(100),
        };
        for kind in BlockKind::ALL {
            let accepts = rules_for(kind)
                .rule(Keyword::Cadence)
                .is_some_and(|r| r.shapes.iter().any(|s| s.matches(&range)));
            assert_eq!(accepts, kind == BlockKind::Intervals, "{}", kind);
        }
    }

    #[test]
    fn repeat_only_on_intervals_and_start_repeat() {
        for kind in BlockKind::ALL {
            let allowed = rules_for(kind).rule(Keyword::Repeat).is_some();
            assert_eq!(
                allowed,
                matches!(kind, BlockKind::Intervals | BlockKind::StartRepeat),
                "{}",
                kind
            );
        }
    }

    #[test]
    fn shapes() {
        let zone = ValueExpr::Scalar(Scalar::Zone(Zone::SweetSpot));
        assert!(Shape::Power.matches(&zone));
        assert!(!Shape::PowerRange.matches(&zone));
        let duration = ValueExpr::Scalar(Scalar::Duration(Duration::new(1, 0)));
        assert!(Shape::Duration.matches(&duration));
        assert!(!Shape::Power.matches(&duration));
        assert!(!Shape::Integer.matches(&ValueExpr::Text("5".into())));
    }

    #[test]
    fn end_repeat_takes_nothing() {
        assert_eq!(rules_for(BlockKind::EndRepeat).allowed_keywords(), "none");
        assert_eq!(rules_for(BlockKind::EndRepeat).required().count(), 0);
    }
}
