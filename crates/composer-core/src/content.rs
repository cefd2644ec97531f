//! The document: an ordered block map plus the entity store.
//!
//! `ContentModel` is immutable from the outside. Edits go through the
//! functions in [`crate::modifier`], which build a new model that shares every
//! untouched block (and entity) with the old one by reference.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::block::{Block, BlockKey};
use crate::entity::{Entity, EntityKey, EntityPatch, EntityStore, EntityType};
use crate::error::{ComposerError, Result};

type BlockMap = IndexMap<BlockKey, Arc<Block>>;

/// Ordered map of blocks plus the entities they reference.
#[derive(Clone, Debug)]
pub struct ContentModel {
    blocks: Arc<BlockMap>,
    entities: EntityStore,
    next_block: u64,
}

impl Default for ContentModel {
    fn default() -> Self {
        Self::empty()
    }
}

impl ContentModel {
    /// The canonical empty document: a single empty text block.
    pub fn empty() -> Self {
        let mut content = Self {
            blocks: Arc::new(IndexMap::new()),
            entities: EntityStore::new(),
            next_block: 0,
        };
        let key = content.fresh_key();
        Arc::make_mut(&mut content.blocks).insert(key.clone(), Arc::new(Block::text(key, "")));
        content
    }

    /// Build a model from blocks in document order.
    ///
    /// Fails if a block references an entity missing from `entities`, if two
    /// blocks share a key, or if an atomic block embeds a non-image. An empty
    /// block list yields the canonical empty document (sharing `entities`).
    pub fn from_blocks(blocks: Vec<Block>, entities: EntityStore) -> Result<Self> {
        for block in &blocks {
            for key in block.entity_keys() {
                entities.require(key)?;
            }
            // Atomic blocks embed images only.
            if let Some(key) = block.atomic_entity() {
                let found = entities.require(key)?.entity_type();
                if found != EntityType::Image {
                    return Err(ComposerError::EntityTypeMismatch {
                        key,
                        expected: EntityType::Image,
                        found,
                    });
                }
            }
        }

        if blocks.is_empty() {
            return Ok(Self {
                entities,
                ..Self::empty()
            });
        }

        let next_block = blocks.len() as u64;
        let mut map = IndexMap::with_capacity(blocks.len());
        for block in blocks {
            let key = block.key().clone();
            if map.contains_key(&key) {
                return Err(ComposerError::DuplicateBlock(key));
            }
            map.insert(key, Arc::new(block));
        }
        Ok(Self {
            blocks: Arc::new(map),
            entities,
            next_block,
        })
    }

    /// Plain text document, one block per line.
    pub fn from_text(text: &str) -> Self {
        let mut content = Self {
            blocks: Arc::new(IndexMap::new()),
            entities: EntityStore::new(),
            next_block: 0,
        };
        for line in text.split('\n') {
            let key = content.fresh_key();
            Arc::make_mut(&mut content.blocks).insert(key.clone(), Arc::new(Block::text(key, line)));
        }
        content
    }

    // === Block access ===

    pub fn block(&self, key: &BlockKey) -> Option<&Block> {
        self.blocks.get(key).map(|b| b.as_ref())
    }

    /// Look up a block, treating a miss as a programming error.
    pub fn require_block(&self, key: &BlockKey) -> Result<&Block> {
        self.block(key)
            .ok_or_else(|| ComposerError::UnknownBlock(key.clone()))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().map(|b| b.as_ref())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn index_of(&self, key: &BlockKey) -> Option<usize> {
        self.blocks.get_index_of(key)
    }

    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get_index(index).map(|(_, b)| b.as_ref())
    }

    pub fn first_block(&self) -> Option<&Block> {
        self.block_at(0)
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last().map(|(_, b)| b.as_ref())
    }

    /// The block immediately following `key` in document order.
    pub fn block_after(&self, key: &BlockKey) -> Option<&Block> {
        self.index_of(key).and_then(|i| self.block_at(i + 1))
    }

    /// The block immediately preceding `key` in document order.
    pub fn block_before(&self, key: &BlockKey) -> Option<&Block> {
        self.index_of(key)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.block_at(i))
    }

    /// Whether `other` holds the very same allocation for block `key`.
    pub fn shares_block(&self, other: &ContentModel, key: &BlockKey) -> bool {
        match (self.blocks.get(key), other.blocks.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    // === Entity access ===

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Whether any block still carries a range for `key`.
    pub fn is_referenced(&self, key: EntityKey) -> bool {
        self.blocks().any(|b| b.entity_keys().any(|k| k == key))
    }

    /// Register an entity, returning the new model and the entity's key.
    pub fn create_entity(&self, data: crate::EntityData) -> (Self, EntityKey) {
        let (entities, key) = self.entities.with_entity(data);
        (self.with_entities(entities), key)
    }

    /// Shallow-merge entity data; blocks are shared untouched.
    pub fn merge_entity_data(&self, key: EntityKey, patch: &EntityPatch) -> Result<Self> {
        Ok(self.with_entities(self.entities.merge_entity_data(key, patch)?))
    }

    // === Whole-document views ===

    /// All block text joined with newlines.
    pub fn plain_text(&self) -> String {
        self.blocks()
            .map(|b| if b.is_atomic() { "" } else { b.text_str() })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the document holds anything beyond empty text blocks.
    pub fn has_text(&self) -> bool {
        self.blocks().any(|b| b.is_atomic() || !b.text_str().trim().is_empty())
    }

    // === Internal construction helpers ===

    pub(crate) fn with_entities(&self, entities: EntityStore) -> Self {
        Self {
            blocks: self.blocks.clone(),
            entities,
            next_block: self.next_block,
        }
    }

    /// A block key not used by any block in this model.
    pub(crate) fn fresh_key(&mut self) -> BlockKey {
        loop {
            let key = BlockKey::from_index(self.next_block);
            self.next_block += 1;
            if !self.blocks.contains_key(&key) {
                return key;
            }
        }
    }

    /// Replace the blocks at `start..=end` (by index) with `replacement`.
    ///
    /// Blocks outside the range keep their allocations.
    pub(crate) fn splice_blocks(&mut self, start: usize, end: usize, replacement: Vec<Block>) {
        let old = Arc::make_mut(&mut self.blocks);
        let tail: Vec<(BlockKey, Arc<Block>)> = old.drain(start..).collect();

        for block in replacement {
            old.insert(block.key().clone(), Arc::new(block));
        }
        for (key, block) in tail.into_iter().skip(end + 1 - start) {
            old.insert(key, block);
        }
    }

    /// Remove one block by key; the map never ends up empty.
    pub(crate) fn remove_block(&mut self, key: &BlockKey) -> Option<Arc<Block>> {
        let removed = Arc::make_mut(&mut self.blocks).shift_remove(key);
        if self.blocks.is_empty() {
            let key = self.fresh_key();
            Arc::make_mut(&mut self.blocks).insert(key.clone(), Arc::new(Block::text(key, "")));
        }
        removed
    }
}

/// Semantic equality: same blocks in the same order with the same entity data.
///
/// Entity keys themselves are compared through what they resolve to, so two
/// models parsed independently from the same HTML compare equal.
impl PartialEq for ContentModel {
    fn eq(&self, other: &Self) -> bool {
        if self.block_count() != other.block_count() {
            return false;
        }
        self.blocks().zip(other.blocks()).all(|(a, b)| {
            a.kind() == b.kind()
                && a.text_str() == b.text_str()
                && a.entity_ranges().len() == b.entity_ranges().len()
                && a
                    .entity_ranges()
                    .iter()
                    .zip(b.entity_ranges())
                    .all(|(ra, rb)| {
                        ra.start == rb.start
                            && ra.end == rb.end
                            && self.entity(ra.entity).map(|e| &e.data)
                                == other.entity(rb.entity).map(|e| &e.data)
                    })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::EntityRange;
    use crate::entity::{EntityData, ImageData, ImagePatch};

    #[test]
    fn test_empty_document() {
        let content = ContentModel::empty();
        assert_eq!(content.block_count(), 1);
        let block = content.first_block().unwrap();
        assert!(!block.is_atomic());
        assert!(block.is_empty());
        assert!(!content.has_text());
    }

    #[test]
    fn test_from_blocks_rejects_dangling_entity() {
        let block = Block::atomic(BlockKey::new("img"), EntityKey(7));
        let err = ContentModel::from_blocks(vec![block], EntityStore::new()).unwrap_err();
        assert_eq!(err, ComposerError::UnknownEntity(EntityKey(7)));
    }

    #[test]
    fn test_from_blocks_rejects_duplicate_keys() {
        let blocks = vec![
            Block::text(BlockKey::new("a"), "one"),
            Block::text(BlockKey::new("a"), "two"),
        ];
        let err = ContentModel::from_blocks(blocks, EntityStore::new()).unwrap_err();
        assert_eq!(err, ComposerError::DuplicateBlock(BlockKey::new("a")));
    }

    #[test]
    fn test_from_blocks_rejects_atomic_link() {
        let mut entities = EntityStore::new();
        let link = entities.insert(EntityData::Link(crate::LinkData::new("https://a.example")));
        let block = Block::atomic(BlockKey::new("x"), link);
        let err = ContentModel::from_blocks(vec![block], entities).unwrap_err();
        assert_eq!(
            err,
            ComposerError::EntityTypeMismatch {
                key: link,
                expected: EntityType::Image,
                found: EntityType::Link,
            }
        );
    }

    #[test]
    fn test_from_text_and_navigation() {
        let content = ContentModel::from_text("one\ntwo\nthree");
        assert_eq!(content.block_count(), 3);
        let first = content.first_block().unwrap().key().clone();
        let second = content.block_after(&first).unwrap();
        assert_eq!(second.text_str(), "two");
        assert_eq!(
            content.block_before(second.key()).unwrap().key(),
            &first
        );
        assert!(content.block_before(&first).is_none());
        assert_eq!(content.plain_text(), "one\ntwo\nthree");
    }

    #[test]
    fn test_fresh_keys_avoid_collisions() {
        let blocks = vec![Block::text(BlockKey::new("b3"), "x")];
        let mut content = ContentModel::from_blocks(blocks, EntityStore::new()).unwrap();
        let a = content.fresh_key();
        let b = content.fresh_key();
        assert_ne!(a, BlockKey::new("b3"));
        assert_ne!(b, BlockKey::new("b3"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_splice_keeps_untouched_blocks_shared() {
        let content = ContentModel::from_text("a\nb\nc\nd");
        let mut next = content.clone();
        let key = content.block_at(1).unwrap().key().clone();
        next.splice_blocks(1, 2, vec![Block::text(key.clone(), "bc")]);

        let texts: Vec<_> = next.blocks().map(|b| b.text_str().to_string()).collect();
        assert_eq!(texts, vec!["a", "bc", "d"]);

        let first = content.block_at(0).unwrap().key().clone();
        let last = content.block_at(3).unwrap().key().clone();
        assert!(next.shares_block(&content, &first));
        assert!(next.shares_block(&content, &last));
        assert!(!next.shares_block(&content, &key));
    }

    #[test]
    fn test_merge_entity_data_shares_blocks() {
        let mut entities = EntityStore::new();
        let image = entities.insert(EntityData::Image(ImageData::new("http://x/a.png", "a")));
        let key = BlockKey::new("img");
        let content = ContentModel::from_blocks(
            vec![Block::atomic(key.clone(), image)],
            entities,
        )
        .unwrap();

        let next = content
            .merge_entity_data(image, &ImagePatch::width("50%").into())
            .unwrap();
        assert!(next.shares_block(&content, &key));
        let width = &next.entity(image).unwrap().data.as_image().unwrap().width;
        assert_eq!(width, "50%");
    }

    #[test]
    fn test_semantic_equality_ignores_keys() {
        let mut left_entities = EntityStore::new();
        left_entities.insert(EntityData::Image(ImageData::new("http://x/a.png", "a")));
        let l = left_entities.insert(EntityData::Image(ImageData::new("http://x/b.png", "b")));
        let mut right_entities = EntityStore::new();
        let r = right_entities.insert(EntityData::Image(ImageData::new("http://x/b.png", "b")));

        let left = ContentModel::from_blocks(
            vec![Block::text_with_ranges(BlockKey::new("x"), "ab", [EntityRange::new(0, 1, l)])],
            left_entities,
        )
        .unwrap();
        let right = ContentModel::from_blocks(
            vec![Block::text_with_ranges(BlockKey::new("y"), "ab", [EntityRange::new(0, 1, r)])],
            right_entities,
        )
        .unwrap();
        assert_eq!(left, right);
    }
}
