use std::ops::Range;

use crate::value::Duration;

/// A text message shown `offset` into its block: `@ 00:30 "Spin up"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub offset: Duration,
    pub text: String,
    pub span: Range<usize>,
}

impl Message {
    pub fn new(offset: Duration, text: impl Into<String>) -> Self {
        Message {
            offset,
            text: text.into(),
            span: 0..0,
        }
    }
}
