pub mod message;

use std::fmt;
use std::ops::Range;

use crate::block::message::Message;
use crate::value::ValueExpr;

/// The kind of a block, named by its tag in the source (`SEGMENT { ... }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Meta,
    Free,
    Warmup,
    Ramp,
    Cooldown,
    Segment,
    Intervals,
    StartRepeat,
    EndRepeat,
}

impl BlockKind {
    pub const ALL: [BlockKind; 9] = [
        BlockKind::Meta,
        BlockKind::Free,
        BlockKind::Warmup,
        BlockKind::Ramp,
        BlockKind::Cooldown,
        BlockKind::Segment,
        BlockKind::Intervals,
        BlockKind::StartRepeat,
        BlockKind::EndRepeat,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        BlockKind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::Meta => "META",
            BlockKind::Free => "FREE",
            BlockKind::Warmup => "WARMUP",
            BlockKind::Ramp => "RAMP",
            BlockKind::Cooldown => "COOLDOWN",
            BlockKind::Segment => "SEGMENT",
            BlockKind::Intervals => "INTERVALS",
            BlockKind::StartRepeat => "START_REPEAT",
            BlockKind::EndRepeat => "END_REPEAT",
        }
    }

    /// RAMP and the WARMUP/COOLDOWN spellings are all linear power ramps;
    /// which one is emitted depends on position, not on what was written.
    pub fn is_ramp_family(&self) -> bool {
        matches!(self, BlockKind::Warmup | BlockKind::Ramp | BlockKind::Cooldown)
    }

    pub fn is_repeat_marker(&self) -> bool {
        matches!(self, BlockKind::StartRepeat | BlockKind::EndRepeat)
    }

    /// Blocks that become an element of the workout body.
    pub fn is_body(&self) -> bool {
        !matches!(self, BlockKind::Meta) && !self.is_repeat_marker()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parameter keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Name,
    Author,
    Description,
    Ftp,
    Tags,
    Duration,
    Power,
    Cadence,
    Repeat,
}

impl Keyword {
    pub const ALL: [Keyword; 9] = [
        Keyword::Name,
        Keyword::Author,
        Keyword::Description,
        Keyword::Ftp,
        Keyword::Tags,
        Keyword::Duration,
        Keyword::Power,
        Keyword::Cadence,
        Keyword::Repeat,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Keyword::ALL.into_iter().find(|kw| kw.tag() == tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Keyword::Name => "NAME",
            Keyword::Author => "AUTHOR",
            Keyword::Description => "DESCRIPTION",
            Keyword::Ftp => "FTP",
            Keyword::Tags => "TAGS",
            Keyword::Duration => "DURATION",
            Keyword::Power => "POWER",
            Keyword::Cadence => "CADENCE",
            Keyword::Repeat => "REPEAT",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One `KEYWORD value` entry of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub keyword: Keyword,
    pub value: ValueExpr,
    /// Byte span of the whole entry (keyword and value).
    pub span: Range<usize>,
    /// Byte span of the value alone.
    pub value_span: Range<usize>,
}

/// A typed block of the workout.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Parameters in source order. Duplicates are kept so they can be reported.
    pub params: Vec<Param>,
    /// Timestamped messages in source order.
    pub messages: Vec<Message>,
    /// Byte span from the tag to the closing brace.
    pub span: Range<usize>,
    /// Byte span of the tag alone.
    pub tag_span: Range<usize>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Block {
            kind,
            params: Vec::new(),
            messages: Vec::new(),
            span: 0..0,
            tag_span: 0..0,
        }
    }

    /// Builder-style helper, mostly for constructing blocks by hand in tests.
    pub fn with_param(mut self, keyword: Keyword, value: ValueExpr) -> Self {
        self.params.push(Param {
            keyword,
            value,
            span: 0..0,
            value_span: 0..0,
        });
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// First parameter with this keyword.
    pub fn param(&self, keyword: Keyword) -> Option<&Param> {
        self.params.iter().find(|p| p.keyword == keyword)
    }

    pub fn get(&self, keyword: Keyword) -> Option<&ValueExpr> {
        self.param(keyword).map(|p| &p.value)
    }

    pub fn has(&self, keyword: Keyword) -> bool {
        self.param(keyword).is_some()
    }
}
