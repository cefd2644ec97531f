//! Paragraph-level document units.
//!
//! A block is either plain text carrying entity ranges (links), or an atomic
//! block holding a single placeholder character with one entity range over it
//! (images). All offsets are in chars (Unicode scalar values), not bytes.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

use crate::entity::EntityKey;

/// The single character an atomic block holds.
pub const ATOMIC_PLACEHOLDER: char = ' ';

/// Stable identifier of a block within a content model lineage.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(pub SmolStr);

impl BlockKey {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    pub(crate) fn from_index(index: u64) -> Self {
        Self(format_smolstr!("b{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Atomic,
}

/// A char range inside a block annotated with an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRange {
    pub start: usize,
    pub end: usize,
    pub entity: EntityKey,
}

impl EntityRange {
    pub fn new(start: usize, end: usize, entity: EntityKey) -> Self {
        Self { start, end, entity }
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A maximal run of block text sharing the same entity (or none).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub range: Range<usize>,
    pub text: &'a str,
    pub entity: Option<EntityKey>,
}

/// One paragraph-level unit of the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    key: BlockKey,
    kind: BlockKind,
    text: SmolStr,
    entity_ranges: Vec<EntityRange>,
}

impl Block {
    /// A plain text block without entities.
    pub fn text(key: BlockKey, text: impl Into<SmolStr>) -> Self {
        Self {
            key,
            kind: BlockKind::Text,
            text: text.into(),
            entity_ranges: Vec::new(),
        }
    }

    /// A text block with entity ranges.
    ///
    /// Ranges are clipped to the text, empty ones dropped, and the rest sorted.
    /// Overlaps are resolved in favour of the earlier range.
    pub fn text_with_ranges(
        key: BlockKey,
        text: impl Into<SmolStr>,
        ranges: impl IntoIterator<Item = EntityRange>,
    ) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            key,
            kind: BlockKind::Text,
            entity_ranges: normalize_ranges(ranges, len),
            text,
        }
    }

    /// An atomic block embedding `entity`.
    pub fn atomic(key: BlockKey, entity: EntityKey) -> Self {
        Self {
            key,
            kind: BlockKind::Atomic,
            text: SmolStr::new_inline(" "),
            entity_ranges: vec![EntityRange::new(0, 1, entity)],
        }
    }

    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn is_atomic(&self) -> bool {
        self.kind == BlockKind::Atomic
    }

    pub fn text_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn entity_ranges(&self) -> &[EntityRange] {
        &self.entity_ranges
    }

    /// The embedded entity of an atomic block.
    pub fn atomic_entity(&self) -> Option<EntityKey> {
        match self.kind {
            BlockKind::Atomic => self.entity_ranges.first().map(|r| r.entity),
            BlockKind::Text => None,
        }
    }

    /// Entity covering the char at `offset`, if any.
    pub fn entity_at(&self, offset: usize) -> Option<EntityKey> {
        self.entity_ranges
            .iter()
            .find(|r| r.start <= offset && offset < r.end)
            .map(|r| r.entity)
    }

    /// Every entity key referenced by this block.
    pub fn entity_keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.entity_ranges.iter().map(|r| r.entity)
    }

    /// Slice of the text by char range.
    pub fn slice(&self, range: Range<usize>) -> &str {
        let start = char_to_byte(&self.text, range.start);
        let end = char_to_byte(&self.text, range.end);
        &self.text[start..end]
    }

    /// Split the text into runs of uniform entity coverage.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let len = self.len_chars();
        let mut segments = Vec::new();
        let mut pos = 0;

        for range in &self.entity_ranges {
            if range.start > pos {
                segments.push(Segment {
                    range: pos..range.start,
                    text: self.slice(pos..range.start),
                    entity: None,
                });
            }
            segments.push(Segment {
                range: range.to_range(),
                text: self.slice(range.to_range()),
                entity: Some(range.entity),
            });
            pos = range.end;
        }

        if pos < len {
            segments.push(Segment {
                range: pos..len,
                text: self.slice(pos..len),
                entity: None,
            });
        }

        segments
    }

    /// A copy of this block under a different key.
    pub fn with_key(&self, key: BlockKey) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }

    /// The part of this block covered by `range`, as a new block.
    ///
    /// An atomic block survives only when the whole block is kept; anything
    /// less degrades to a text block.
    pub(crate) fn sliced(&self, key: BlockKey, range: Range<usize>) -> Self {
        let len = self.len_chars();
        let range = range.start.min(len)..range.end.min(len);

        if self.is_atomic() && range == (0..len) {
            return self.with_key(key);
        }
        if self.is_atomic() {
            return Block::text(key, "");
        }

        let ranges = self.entity_ranges.iter().filter_map(|r| {
            let start = r.start.max(range.start);
            let end = r.end.min(range.end);
            (start < end).then(|| EntityRange::new(start - range.start, end - range.start, r.entity))
        });
        Block::text_with_ranges(key, self.slice(range.clone()), ranges)
    }

    /// Concatenate `other` onto a text block.
    pub(crate) fn appended(&self, other: &Block) -> Self {
        debug_assert!(!self.is_atomic() && !other.is_atomic());
        let shift = self.len_chars();
        let mut text = String::with_capacity(self.text.len() + other.text.len());
        text.push_str(&self.text);
        text.push_str(&other.text);

        let ranges = self.entity_ranges.iter().copied().chain(
            other
                .entity_ranges
                .iter()
                .map(|r| EntityRange::new(r.start + shift, r.end + shift, r.entity)),
        );
        Block::text_with_ranges(self.key.clone(), text, ranges)
    }

    /// Insert `insert` at char `offset` of a text block.
    ///
    /// Text typed strictly inside an entity range joins that entity; text typed
    /// at either edge does not.
    pub(crate) fn with_inserted(&self, offset: usize, insert: &str) -> Self {
        let n = insert.chars().count();
        let byte = char_to_byte(&self.text, offset);
        let mut text = String::with_capacity(self.text.len() + insert.len());
        text.push_str(&self.text[..byte]);
        text.push_str(insert);
        text.push_str(&self.text[byte..]);

        let ranges = self.entity_ranges.iter().map(|r| {
            if offset <= r.start {
                EntityRange::new(r.start + n, r.end + n, r.entity)
            } else if offset < r.end {
                EntityRange::new(r.start, r.end + n, r.entity)
            } else {
                *r
            }
        });
        Block::text_with_ranges(self.key.clone(), text, ranges)
    }

    /// Set (or clear, with `None`) the entity over `range` of a text block.
    pub(crate) fn with_entity(&self, range: Range<usize>, entity: Option<EntityKey>) -> Self {
        let mut ranges = Vec::with_capacity(self.entity_ranges.len() + 2);
        for r in &self.entity_ranges {
            // Keep whatever lies outside the new range.
            if r.start < range.start {
                ranges.push(EntityRange::new(r.start, r.end.min(range.start), r.entity));
            }
            if r.end > range.end {
                ranges.push(EntityRange::new(r.start.max(range.end), r.end, r.entity));
            }
        }
        if let Some(entity) = entity {
            ranges.push(EntityRange::new(range.start, range.end, entity));
        }
        Block::text_with_ranges(self.key.clone(), self.text.clone(), ranges)
    }
}

fn normalize_ranges(ranges: impl IntoIterator<Item = EntityRange>, len: usize) -> Vec<EntityRange> {
    let mut ranges: Vec<EntityRange> = ranges
        .into_iter()
        .map(|r| EntityRange::new(r.start.min(len), r.end.min(len), r.entity))
        .filter(|r| !r.is_empty())
        .collect();
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut out: Vec<EntityRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(prev) if r.start < prev.end => {
                let prev_end = prev.end;
                if r.end > prev_end {
                    out.push(EntityRange::new(prev_end, r.end, r.entity));
                }
            }
            // Adjacent runs of the same entity collapse into one.
            Some(prev) if prev.end == r.start && prev.entity == r.entity => prev.end = r.end,
            _ => out.push(r),
        }
    }
    out
}

/// Byte index of the char at `char_offset`, clamped to the end of `text`.
pub(crate) fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> BlockKey {
        BlockKey::new(k)
    }

    fn linked(text: &str, start: usize, end: usize) -> Block {
        Block::text_with_ranges(key("a"), text, [EntityRange::new(start, end, EntityKey(0))])
    }

    #[test]
    fn test_atomic_block_shape() {
        let block = Block::atomic(key("img"), EntityKey(3));
        assert!(block.is_atomic());
        assert_eq!(block.len_chars(), 1);
        assert_eq!(block.text_str().chars().next(), Some(ATOMIC_PLACEHOLDER));
        assert_eq!(block.atomic_entity(), Some(EntityKey(3)));
        assert_eq!(block.entity_ranges(), &[EntityRange::new(0, 1, EntityKey(3))]);
    }

    #[test]
    fn test_segments() {
        let block = linked("click here now", 6, 10);
        let segments = block.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "click ");
        assert_eq!(segments[1].text, "here");
        assert_eq!(segments[1].entity, Some(EntityKey(0)));
        assert_eq!(segments[2].text, " now");
    }

    #[test]
    fn test_segments_multibyte() {
        let block = linked("héllo wörld", 6, 11);
        let segments = block.segments();
        assert_eq!(segments[1].text, "wörld");
        assert_eq!(block.entity_at(7), Some(EntityKey(0)));
        assert_eq!(block.entity_at(5), None);
    }

    #[test]
    fn test_insert_inside_range_extends_it() {
        let block = linked("click here", 6, 10).with_inserted(8, "XX");
        assert_eq!(block.text_str(), "click heXXre");
        assert_eq!(block.entity_ranges()[0].to_range(), 6..12);
    }

    #[test]
    fn test_insert_at_range_edges_does_not_extend() {
        let block = linked("click here", 6, 10).with_inserted(6, ">");
        assert_eq!(block.entity_ranges()[0].to_range(), 7..11);

        let block = linked("click here", 6, 10).with_inserted(10, "!");
        assert_eq!(block.entity_ranges()[0].to_range(), 6..10);
    }

    #[test]
    fn test_sliced_clips_ranges() {
        let block = linked("click here now", 6, 10).sliced(key("b"), 8..14);
        assert_eq!(block.text_str(), "re now");
        assert_eq!(block.entity_ranges()[0].to_range(), 0..2);
        assert_eq!(block.key(), &key("b"));
    }

    #[test]
    fn test_sliced_atomic() {
        let block = Block::atomic(key("img"), EntityKey(1));
        assert!(block.sliced(key("img"), 0..1).is_atomic());
        let emptied = block.sliced(key("img"), 1..1);
        assert!(!emptied.is_atomic());
        assert!(emptied.entity_ranges().is_empty());
    }

    #[test]
    fn test_appended_shifts_ranges() {
        let left = Block::text(key("a"), "see ");
        let right = linked("docs", 0, 4);
        let merged = left.appended(&right);
        assert_eq!(merged.text_str(), "see docs");
        assert_eq!(merged.entity_ranges()[0].to_range(), 4..8);
        assert_eq!(merged.key(), &key("a"));
    }

    #[test]
    fn test_with_entity_replaces_overlap() {
        let block = linked("abcdefgh", 0, 8).with_entity(2..4, Some(EntityKey(9)));
        let ranges: Vec<_> = block
            .entity_ranges()
            .iter()
            .map(|r| (r.start, r.end, r.entity.0))
            .collect();
        assert_eq!(ranges, vec![(0, 2, 0), (2, 4, 9), (4, 8, 0)]);

        let cleared = block.with_entity(0..8, None);
        assert!(cleared.entity_ranges().is_empty());
    }

    #[test]
    fn test_normalize_merges_adjacent_same_entity() {
        let block = Block::text_with_ranges(
            key("a"),
            "abcdef",
            [
                EntityRange::new(3, 6, EntityKey(1)),
                EntityRange::new(0, 3, EntityKey(1)),
                EntityRange::new(4, 9, EntityKey(2)),
            ],
        );
        assert_eq!(block.entity_ranges(), &[EntityRange::new(0, 6, EntityKey(1))]);
    }

    #[test]
    fn test_normalize_keeps_tail_of_overlapping_range() {
        let block = Block::text_with_ranges(
            key("a"),
            "abcdefgh",
            [
                EntityRange::new(0, 4, EntityKey(1)),
                EntityRange::new(2, 7, EntityKey(2)),
                EntityRange::new(5, 6, EntityKey(3)),
            ],
        );
        assert_eq!(
            block.entity_ranges(),
            &[
                EntityRange::new(0, 4, EntityKey(1)),
                EntityRange::new(4, 7, EntityKey(2)),
            ]
        );
    }
}
