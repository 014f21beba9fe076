use tracing::trace;

use zwom::{Block, BlockKind, Keyword, Scalar, WorkoutDocument};

use crate::zones::zone_percent;

/// Rewrite a validated document into the flat form the serializer emits.
///
/// Repeat groups are unrolled and every ramp-family block is renamed by its
/// position. The result has no repeat markers, and running it through again
/// changes nothing.
pub fn normalize(document: &WorkoutDocument) -> WorkoutDocument {
    let expanded = expand_repeats(document.body());
    let body = classify_ramps(&expanded);
    trace!(
        before = document.body().len(),
        after = body.len(),
        "normalized workout body"
    );

    let blocks = document
        .meta()
        .cloned()
        .into_iter()
        .chain(body)
        .collect();
    WorkoutDocument::new(blocks, document.source_id)
}

/// Replace each `START_REPEAT {REPEAT n} .. END_REPEAT` group with `n` copies
/// of its contents. Blocks outside groups keep their place.
pub fn expand_repeats(blocks: &[Block]) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut group: Option<(u32, Vec<Block>)> = None;

    for block in blocks {
        match block.kind {
            BlockKind::StartRepeat => {
                if let Some((times, pending)) = group.take() {
                    flush(&mut out, times, &pending);
                }
                let times = block
                    .get(Keyword::Repeat)
                    .and_then(|v| v.as_integer())
                    .unwrap_or(1);
                group = Some((times, Vec::new()));
            }
            BlockKind::EndRepeat => {
                if let Some((times, pending)) = group.take() {
                    flush(&mut out, times, &pending);
                }
            }
            _ => match group.as_mut() {
                Some((_, pending)) => pending.push(block.clone()),
                None => out.push(block.clone()),
            },
        }
    }
    if let Some((times, pending)) = group {
        flush(&mut out, times, &pending);
    }
    out
}

fn flush(out: &mut Vec<Block>, times: u32, pending: &[Block]) {
    for _ in 0..times {
        out.extend(pending.iter().cloned());
    }
}

/// Rename every ramp-family block by where it sits in the flat body.
pub fn classify_ramps(body: &[Block]) -> Vec<Block> {
    body.iter()
        .enumerate()
        .map(|(position, block)| {
            let mut block = block.clone();
            if block.kind.is_ramp_family() {
                block.kind = classify_ramp(position, body.len(), &block);
            }
            block
        })
        .collect()
}

/// WARMUP if first, COOLDOWN if last and descending, RAMP otherwise.
///
/// The first position wins when the body is a single block.
pub fn classify_ramp(position: usize, len: usize, block: &Block) -> BlockKind {
    if position == 0 {
        BlockKind::Warmup
    } else if position + 1 == len && is_descending(block) {
        BlockKind::Cooldown
    } else {
        BlockKind::Ramp
    }
}

/// Power strictly falls from left to right. Scalar or missing power is flat.
fn is_descending(block: &Block) -> bool {
    let Some((left, right)) = block.get(Keyword::Power).and_then(|v| v.as_range()) else {
        return false;
    };
    match (magnitude(left), magnitude(right)) {
        (Some(l), Some(r)) => l > r,
        _ => false,
    }
}

// Comparable size of a power scalar. Both sides of a valid range share a
// unit, so raw watts and percentages compare directly.
fn magnitude(scalar: &Scalar) -> Option<u32> {
    match scalar {
        Scalar::Integer(n) | Scalar::Percent(n) => Some(*n),
        Scalar::Zone(z) => zone_percent(*z),
        Scalar::Duration(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zwom::{Duration, ValueExpr, Zone};

    fn ramp(kind: BlockKind, left: Scalar, right: Scalar) -> Block {
        Block::new(kind)
            .with_param(Keyword::Duration, ValueExpr::Scalar(Scalar::Duration(Duration::new(5, 0))))
            .with_param(Keyword::Power, ValueExpr::Range { left, right })
    }

    fn segment(minutes: u32) -> Block {
        Block::new(BlockKind::Segment).with_param(
            Keyword::Duration,
            ValueExpr::Scalar(Scalar::Duration(Duration::new(minutes, 0))),
        )
    }

    fn start(n: u32) -> Block {
        Block::new(BlockKind::StartRepeat).with_param(Keyword::Repeat, ValueExpr::Scalar(Scalar::Integer(n)))
    }

    fn kinds(blocks: &[Block]) -> Vec<BlockKind> {
        blocks.iter().map(|b| b.kind).collect()
    }

    #[test]
    fn expands_groups_in_place() {
        let blocks = vec![
            segment(1),
            start(3),
            segment(2),
            segment(3),
            Block::new(BlockKind::EndRepeat),
            segment(4),
        ];
        let out = expand_repeats(&blocks);
        let minutes: Vec<u64> = out
            .iter()
            .map(|b| match b.get(Keyword::Duration) {
                Some(ValueExpr::Scalar(Scalar::Duration(d))) => d.total_seconds() / 60,
                _ => 0,
            })
            .collect();
        assert_eq!(minutes, vec![1, 2, 3, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn single_repeat_just_drops_markers() {
        let blocks = vec![start(1), segment(1), Block::new(BlockKind::EndRepeat)];
        assert_eq!(kinds(&expand_repeats(&blocks)), vec![BlockKind::Segment]);
    }

    #[test]
    fn ramp_positions() {
        let up = || ramp(BlockKind::Ramp, Scalar::Percent(50), Scalar::Percent(75));
        let down = || ramp(BlockKind::Warmup, Scalar::Percent(75), Scalar::Percent(50));
        let body = vec![down(), up(), down(), segment(1), down()];
        assert_eq!(
            kinds(&classify_ramps(&body)),
            vec![
                BlockKind::Warmup,
                BlockKind::Ramp,
                BlockKind::Ramp,
                BlockKind::Segment,
                BlockKind::Cooldown
            ]
        );
    }

    #[test]
    fn ascending_last_stays_ramp() {
        let body = vec![
            segment(1),
            ramp(BlockKind::Cooldown, Scalar::Percent(50), Scalar::Percent(75)),
        ];
        assert_eq!(kinds(&classify_ramps(&body)), vec![BlockKind::Segment, BlockKind::Ramp]);
    }

    #[test]
    fn equal_ends_stay_ramp() {
        let body = vec![
            segment(1),
            ramp(BlockKind::Ramp, Scalar::Percent(60), Scalar::Percent(60)),
        ];
        assert_eq!(kinds(&classify_ramps(&body)), vec![BlockKind::Segment, BlockKind::Ramp]);
    }

    #[test]
    fn zones_compare_by_table() {
        let body = vec![
            segment(1),
            ramp(BlockKind::Ramp, Scalar::Zone(Zone::SweetSpot), Scalar::Zone(Zone::Numbered(3))),
        ];
        assert_eq!(kinds(&classify_ramps(&body))[1], BlockKind::Cooldown);
    }

    #[test]
    fn lone_ramp_is_warmup() {
        let body = vec![ramp(BlockKind::Ramp, Scalar::Percent(75), Scalar::Percent(50))];
        assert_eq!(kinds(&classify_ramps(&body)), vec![BlockKind::Warmup]);
    }

    #[test]
    fn scalar_power_is_not_descending() {
        let block = Block::new(BlockKind::Ramp).with_param(Keyword::Power, ValueExpr::Scalar(Scalar::Percent(60)));
        assert_eq!(classify_ramp(3, 4, &block), BlockKind::Ramp);
        assert_eq!(classify_ramp(3, 4, &Block::new(BlockKind::Ramp)), BlockKind::Ramp);
    }

    #[test]
    fn classification_sees_expanded_positions() {
        // The ramp inside the group is last only in its final copy.
        let meta = Block::new(BlockKind::Meta);
        let doc = WorkoutDocument::new(
            vec![
                meta,
                start(2),
                segment(1),
                ramp(BlockKind::Ramp, Scalar::Percent(80), Scalar::Percent(40)),
                Block::new(BlockKind::EndRepeat),
            ],
            0,
        );
        let out = normalize(&doc);
        assert_eq!(
            kinds(&out.blocks),
            vec![
                BlockKind::Meta,
                BlockKind::Segment,
                BlockKind::Ramp,
                BlockKind::Segment,
                BlockKind::Cooldown
            ]
        );
    }

    #[test]
    fn idempotent() {
        let doc = WorkoutDocument::new(
            vec![
                Block::new(BlockKind::Meta),
                ramp(BlockKind::Cooldown, Scalar::Percent(40), Scalar::Percent(80)),
                start(3),
                segment(2),
                Block::new(BlockKind::EndRepeat),
                ramp(BlockKind::Warmup, Scalar::Integer(300), Scalar::Integer(100)),
            ],
            0,
        );
        let once = normalize(&doc);
        assert_eq!(normalize(&once), once);
        assert!(once.blocks.iter().all(|b| !b.kind.is_repeat_marker()));
    }
}
