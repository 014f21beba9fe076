use crate::block::{Block, BlockKind};

/// A parsed workout: every block in source order.
///
/// Straight out of the parser nothing about the shape is guaranteed. Once the
/// validator has accepted it, the first block is the only META block and at
/// least one body block follows.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutDocument {
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl WorkoutDocument {
    pub fn new(blocks: Vec<Block>, source_id: usize) -> Self {
        WorkoutDocument { blocks, source_id }
    }

    /// The leading META block, if the document starts with one.
    pub fn meta(&self) -> Option<&Block> {
        self.blocks.first().filter(|b| b.kind == BlockKind::Meta)
    }

    /// Everything after the leading META block (the whole sequence if there is none).
    pub fn body(&self) -> &[Block] {
        match self.meta() {
            Some(_) => &self.blocks[1..],
            None => &self.blocks,
        }
    }
}
