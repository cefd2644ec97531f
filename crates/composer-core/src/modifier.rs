//! Structural edits on [`ContentModel`].
//!
//! Every function here takes the current model by reference and returns a
//! new one; nothing is mutated in place. Functions that move the caret also
//! return the selection the edit leaves behind.

use std::ops::Range;

use crate::block::{Block, BlockKey};
use crate::content::ContentModel;
use crate::entity::{EntityKey, EntityPatch, EntityStore, EntityType};
use crate::error::{ComposerError, Result};
use crate::selection::SelectionState;

/// Which side a collapsed selection grows towards when removing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RemovalDirection {
    #[default]
    Backward,
    Forward,
}

/// A new model plus the selection the edit leaves behind.
#[derive(Clone, Debug)]
pub struct Edit {
    pub content: ContentModel,
    pub selection: SelectionState,
}

/// Delete the text and blocks spanned by `selection`.
///
/// A collapsed selection removes one char in `direction`, joining with the
/// neighbouring block at a block edge. Atomic blocks are either kept or
/// dropped whole: a range ending at offset 0 of an atomic block keeps it, one
/// ending at offset 1 removes it. Removing the single-block span of an atomic
/// block leaves an empty text block behind, to be dropped with
/// [`delete_block`].
pub fn remove_range(
    content: &ContentModel,
    selection: &SelectionState,
    direction: RemovalDirection,
) -> Result<ContentModel> {
    let Some(selection) = expand_collapsed(content, selection, direction)? else {
        return Ok(content.clone());
    };
    let ordered = selection.ordered(content)?;
    let start_block = content.require_block(&ordered.start_key)?;
    let end_block = content.require_block(&ordered.end_key)?;

    let replacement = if ordered.is_single_block() {
        let block = start_block;
        if ordered.start_offset == ordered.end_offset {
            return Ok(content.clone());
        }
        let len = block.len_chars();
        let prefix = block.sliced(block.key().clone(), 0..ordered.start_offset);
        let suffix = block.sliced(block.key().clone(), ordered.end_offset..len);
        vec![join(prefix, suffix)]
    } else {
        let prefix = start_block.sliced(ordered.start_key.clone(), 0..ordered.start_offset);
        let suffix = end_block.sliced(
            ordered.end_key.clone(),
            ordered.end_offset..end_block.len_chars(),
        );
        if prefix.is_atomic() || suffix.is_atomic() {
            vec![prefix, suffix]
        } else {
            vec![prefix.appended(&suffix)]
        }
    };

    let mut next = content.clone();
    next.splice_blocks(ordered.start_index, ordered.end_index, replacement);
    Ok(next)
}

fn join(prefix: Block, suffix: Block) -> Block {
    match (prefix.is_atomic(), suffix.is_atomic()) {
        (false, false) => prefix.appended(&suffix),
        (true, _) => prefix,
        (false, true) => suffix,
    }
}

/// Turn a caret into the one-char (or block-joining) range it deletes.
fn expand_collapsed(
    content: &ContentModel,
    selection: &SelectionState,
    direction: RemovalDirection,
) -> Result<Option<SelectionState>> {
    selection.validate(content)?;
    if !selection.is_collapsed() {
        return Ok(Some(selection.clone()));
    }

    let key = &selection.focus_key;
    let offset = selection.focus_offset;
    let len = content.require_block(key)?.len_chars();

    let expanded = match direction {
        RemovalDirection::Backward if offset > 0 => {
            Some(SelectionState::within(key.clone(), offset - 1, offset))
        }
        RemovalDirection::Backward => content.block_before(key).map(|prev| {
            SelectionState::new(prev.key().clone(), prev.len_chars(), key.clone(), 0)
        }),
        RemovalDirection::Forward if offset < len => {
            Some(SelectionState::within(key.clone(), offset, offset + 1))
        }
        RemovalDirection::Forward => content
            .block_after(key)
            .map(|next| SelectionState::new(key.clone(), len, next.key().clone(), 0)),
    };
    Ok(expanded)
}

/// Remove block `key` from the model.
///
/// The caller picks the new selection (see
/// [`SelectionState::after_block_removal`]). Removing the last remaining
/// block leaves the canonical empty document.
pub fn delete_block(content: &ContentModel, key: &BlockKey) -> Result<ContentModel> {
    content.require_block(key)?;
    let mut next = content.clone();
    next.remove_block(key);
    Ok(next)
}

/// Shallow-merge `patch` into the data of entity `key`.
pub fn merge_entity_data(
    store: &EntityStore,
    key: EntityKey,
    patch: &EntityPatch,
) -> Result<EntityStore> {
    store.merge_entity_data(key, patch)
}

/// Replace the selection with `text`; the caret lands after the insertion.
pub fn insert_text(content: &ContentModel, selection: &SelectionState, text: &str) -> Result<Edit> {
    let (content, key, offset) = collapse_for_insert(content, selection)?;
    let block = content.require_block(&key)?;
    if block.is_atomic() {
        return Err(ComposerError::PartialAtomicRange(key));
    }

    let updated = block.with_inserted(offset, text);
    let index = index_of(&content, &key)?;
    let mut next = content.clone();
    next.splice_blocks(index, index, vec![updated]);

    let caret = offset + text.chars().count();
    Ok(Edit {
        content: next,
        selection: SelectionState::collapsed(key, caret),
    })
}

/// Split the block at the caret (Enter).
///
/// On an atomic block, an empty text block is inserted before (caret at 0) or
/// after (caret at 1) it.
pub fn split_block(content: &ContentModel, selection: &SelectionState) -> Result<Edit> {
    let (mut content, key, offset) = collapse_for_insert(content, selection)?;
    let block = content.require_block(&key)?.clone();
    let index = index_of(&content, &key)?;
    let new_key = content.fresh_key();

    if block.is_atomic() {
        let empty = Block::text(new_key.clone(), "");
        return Ok(if offset == 0 {
            content.splice_blocks(index, index, vec![empty, block]);
            Edit {
                content,
                selection: SelectionState::collapsed(key, 0),
            }
        } else {
            content.splice_blocks(index, index, vec![block, empty]);
            Edit {
                content,
                selection: SelectionState::collapsed(new_key, 0),
            }
        });
    }

    let len = block.len_chars();
    let left = block.sliced(key.clone(), 0..offset);
    let right = block.sliced(new_key.clone(), offset..len);
    content.splice_blocks(index, index, vec![left, right]);
    Ok(Edit {
        content,
        selection: SelectionState::collapsed(new_key, 0),
    })
}

/// Set (or clear, with `None`) `entity` over the selected text.
///
/// Atomic blocks inside the selection are left alone.
pub fn apply_entity(
    content: &ContentModel,
    selection: &SelectionState,
    entity: Option<EntityKey>,
) -> Result<ContentModel> {
    if let Some(key) = entity {
        content.entities().require(key)?;
    }
    let ordered = selection.ordered(content)?;

    let mut next = content.clone();
    for index in ordered.start_index..=ordered.end_index {
        let Some(block) = content.block_at(index) else {
            break;
        };
        if block.is_atomic() {
            continue;
        }
        let start = if index == ordered.start_index { ordered.start_offset } else { 0 };
        let end = if index == ordered.end_index {
            ordered.end_offset
        } else {
            block.len_chars()
        };
        if start >= end {
            continue;
        }
        next.splice_blocks(index, index, vec![block.with_entity(start..end, entity)]);
    }
    Ok(next)
}

/// Insert an atomic block for `entity` at the selection.
///
/// The caret block is split around the insertion point. A text block always
/// follows the atomic block so the caret has somewhere to go; the caret lands
/// at its start.
pub fn insert_atomic_block(
    content: &ContentModel,
    selection: &SelectionState,
    entity: EntityKey,
) -> Result<Edit> {
    let found = content.entities().require(entity)?.entity_type();
    if found != EntityType::Image {
        return Err(ComposerError::EntityTypeMismatch {
            key: entity,
            expected: EntityType::Image,
            found,
        });
    }
    let (mut content, key, offset) = collapse_for_insert(content, selection)?;
    let block = content.require_block(&key)?.clone();
    let index = index_of(&content, &key)?;
    let atomic = Block::atomic(content.fresh_key(), entity);

    if block.is_atomic() {
        let after = Block::text(content.fresh_key(), "");
        let caret = SelectionState::collapsed(after.key().clone(), 0);
        let blocks = if offset == 0 {
            vec![atomic, block]
        } else {
            vec![block, atomic, after]
        };
        content.splice_blocks(index, index, blocks);
        let selection = if offset == 0 {
            SelectionState::collapsed(key, 0)
        } else {
            caret
        };
        return Ok(Edit { content, selection });
    }

    let len = block.len_chars();
    let (left, right) = if offset == 0 {
        (None, block.sliced(key.clone(), offset..len))
    } else {
        let right_key = content.fresh_key();
        (
            Some(block.sliced(key.clone(), 0..offset)),
            block.sliced(right_key, offset..len),
        )
    };
    let caret = SelectionState::collapsed(right.key().clone(), 0);

    let blocks = left.into_iter().chain([atomic, right]).collect();
    content.splice_blocks(index, index, blocks);
    Ok(Edit {
        content,
        selection: caret,
    })
}

/// Remove any selected range and return the model plus the caret position.
fn collapse_for_insert(
    content: &ContentModel,
    selection: &SelectionState,
) -> Result<(ContentModel, BlockKey, usize)> {
    let ordered = selection.ordered(content)?;
    if ordered.is_collapsed() {
        return Ok((content.clone(), ordered.start_key, ordered.start_offset));
    }

    let next = remove_range(content, selection, RemovalDirection::Backward)?;
    // The start block survives a removal unless it was an atomic block that
    // got swallowed; fall back to whatever now sits at its index.
    match next.block(&ordered.start_key) {
        Some(block) => {
            let offset = ordered.start_offset.min(block.len_chars());
            Ok((next, ordered.start_key, offset))
        }
        None => {
            let key = next
                .block_at(ordered.start_index)
                .or_else(|| next.last_block())
                .map(|b| b.key().clone())
                .ok_or_else(|| ComposerError::UnknownBlock(ordered.start_key.clone()))?;
            Ok((next, key, 0))
        }
    }
}

fn index_of(content: &ContentModel, key: &BlockKey) -> Result<usize> {
    content
        .index_of(key)
        .ok_or_else(|| ComposerError::UnknownBlock(key.clone()))
}

/// Char range of the selection within a single block, if it is one.
pub fn single_block_range(
    content: &ContentModel,
    selection: &SelectionState,
) -> Result<Option<(BlockKey, Range<usize>)>> {
    let ordered = selection.ordered(content)?;
    Ok(ordered
        .is_single_block()
        .then(|| (ordered.start_key, ordered.start_offset..ordered.end_offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::EntityRange;
    use crate::entity::{EntityData, ImageData, LinkData};

    fn key_at(content: &ContentModel, index: usize) -> BlockKey {
        content.block_at(index).unwrap().key().clone()
    }

    fn texts(content: &ContentModel) -> Vec<String> {
        content.blocks().map(|b| b.text_str().to_string()).collect()
    }

    fn with_image(text_before: &str, text_after: &str) -> (ContentModel, EntityKey) {
        let mut entities = EntityStore::new();
        let image = entities.insert(EntityData::Image(ImageData::new("http://x/img.png", "cat")));
        let content = ContentModel::from_blocks(
            vec![
                Block::text(BlockKey::new("t1"), text_before),
                Block::atomic(BlockKey::new("img"), image),
                Block::text(BlockKey::new("t2"), text_after),
            ],
            entities,
        )
        .unwrap();
        (content, image)
    }

    #[test]
    fn test_remove_range_within_block() {
        let content = ContentModel::from_text("hello world");
        let key = key_at(&content, 0);
        let next = remove_range(
            &content,
            &SelectionState::within(key, 5, 11),
            RemovalDirection::Backward,
        )
        .unwrap();
        assert_eq!(texts(&next), vec!["hello"]);
    }

    #[test]
    fn test_remove_range_across_blocks_merges() {
        let content = ContentModel::from_text("hello\nbig\nworld");
        let sel = SelectionState::new(key_at(&content, 0), 3, key_at(&content, 2), 2);
        let next = remove_range(&content, &sel, RemovalDirection::Backward).unwrap();
        assert_eq!(texts(&next), vec!["helrld"]);
        assert_eq!(key_at(&next, 0), key_at(&content, 0));
    }

    #[test]
    fn test_backspace_at_block_start_joins() {
        let content = ContentModel::from_text("ab\ncd");
        let sel = SelectionState::collapsed(key_at(&content, 1), 0);
        let next = remove_range(&content, &sel, RemovalDirection::Backward).unwrap();
        assert_eq!(texts(&next), vec!["abcd"]);
    }

    #[test]
    fn test_backspace_at_document_start_is_noop() {
        let content = ContentModel::from_text("ab");
        let sel = SelectionState::collapsed(key_at(&content, 0), 0);
        let next = remove_range(&content, &sel, RemovalDirection::Backward).unwrap();
        assert_eq!(next, content);
    }

    #[test]
    fn test_forward_delete() {
        let content = ContentModel::from_text("ab\ncd");
        let sel = SelectionState::collapsed(key_at(&content, 0), 2);
        let next = remove_range(&content, &sel, RemovalDirection::Forward).unwrap();
        assert_eq!(texts(&next), vec!["abcd"]);
    }

    #[test]
    fn test_remove_full_atomic_span_then_delete_block() {
        let (content, image) = with_image("before", "after");
        let img = BlockKey::new("img");
        let span = SelectionState::block_span(&content, &img).unwrap();

        let cleared = remove_range(&content, &span, RemovalDirection::Backward).unwrap();
        let block = cleared.block(&img).unwrap();
        assert!(!block.is_atomic());
        assert!(!cleared.is_referenced(image));

        let next = delete_block(&cleared, &img).unwrap();
        assert_eq!(next.block_count(), 2);
        assert!(next.block(&img).is_none());

        let sel = SelectionState::after_block_removal(&cleared, &img, &next);
        assert_eq!(sel, SelectionState::collapsed(BlockKey::new("t2"), 0));
    }

    #[test]
    fn test_range_across_atomic_block_drops_it() {
        let (content, image) = with_image("before", "after");
        let sel = SelectionState::new(BlockKey::new("t1"), 3, BlockKey::new("t2"), 2);
        let next = remove_range(&content, &sel, RemovalDirection::Backward).unwrap();
        assert_eq!(texts(&next), vec!["befter"]);
        assert!(!next.is_referenced(image));
    }

    #[test]
    fn test_range_ending_before_atomic_keeps_it() {
        let (content, image) = with_image("before", "after");
        let sel = SelectionState::new(BlockKey::new("t1"), 3, BlockKey::new("img"), 0);
        let next = remove_range(&content, &sel, RemovalDirection::Backward).unwrap();
        assert_eq!(next.block_count(), 3);
        assert_eq!(next.block_at(0).unwrap().text_str(), "bef");
        assert!(next.is_referenced(image));
    }

    #[test]
    fn test_delete_last_block_leaves_empty_document() {
        let content = ContentModel::from_text("only");
        let key = key_at(&content, 0);
        let next = delete_block(&content, &key).unwrap();
        assert_eq!(next.block_count(), 1);
        assert!(next.first_block().unwrap().is_empty());
        assert_ne!(key_at(&next, 0), key);
    }

    #[test]
    fn test_delete_unknown_block_fails() {
        let content = ContentModel::from_text("only");
        assert!(matches!(
            delete_block(&content, &BlockKey::new("nope")),
            Err(ComposerError::UnknownBlock(_))
        ));
    }

    #[test]
    fn test_insert_text_replaces_selection() {
        let content = ContentModel::from_text("hello world");
        let key = key_at(&content, 0);
        let edit = insert_text(&content, &SelectionState::within(key.clone(), 6, 11), "rust").unwrap();
        assert_eq!(texts(&edit.content), vec!["hello rust"]);
        assert_eq!(edit.selection, SelectionState::collapsed(key, 10));
    }

    #[test]
    fn test_insert_text_into_atomic_fails() {
        let (content, _) = with_image("a", "b");
        let sel = SelectionState::collapsed(BlockKey::new("img"), 1);
        assert!(matches!(
            insert_text(&content, &sel, "x"),
            Err(ComposerError::PartialAtomicRange(_))
        ));
    }

    #[test]
    fn test_split_block() {
        let content = ContentModel::from_text("hello world");
        let key = key_at(&content, 0);
        let edit = split_block(&content, &SelectionState::collapsed(key.clone(), 5)).unwrap();
        assert_eq!(texts(&edit.content), vec!["hello", " world"]);
        assert_eq!(edit.selection.focus_key, key_at(&edit.content, 1));
        assert_eq!(edit.selection.focus_offset, 0);
    }

    #[test]
    fn test_apply_link_entity() {
        let content = ContentModel::from_text("click here");
        let key = key_at(&content, 0);
        let (content, link) =
            content.create_entity(EntityData::Link(LinkData::new("https://a").with_target("_blank")));
        let next = apply_entity(&content, &SelectionState::within(key.clone(), 6, 10), Some(link))
            .unwrap();
        assert_eq!(
            next.block(&key).unwrap().entity_ranges(),
            &[EntityRange::new(6, 10, link)]
        );

        let cleared = apply_entity(&next, &SelectionState::within(key.clone(), 0, 10), None).unwrap();
        assert!(cleared.block(&key).unwrap().entity_ranges().is_empty());
    }

    #[test]
    fn test_insert_atomic_into_empty_document() {
        let content = ContentModel::empty();
        let key = key_at(&content, 0);
        let (content, image) =
            content.create_entity(EntityData::Image(ImageData::new("http://x/img.png", "cat")));
        let edit = insert_atomic_block(&content, &SelectionState::collapsed(key.clone(), 0), image)
            .unwrap();

        assert_eq!(edit.content.block_count(), 2);
        assert!(edit.content.block_at(0).unwrap().is_atomic());
        assert_eq!(edit.content.block_at(0).unwrap().atomic_entity(), Some(image));
        assert_eq!(edit.selection, SelectionState::collapsed(key, 0));
    }

    #[test]
    fn test_insert_atomic_link_fails() {
        let content = ContentModel::from_text("hi");
        let key = key_at(&content, 0);
        let (content, link) =
            content.create_entity(EntityData::Link(LinkData::new("https://a.example")));
        let err = insert_atomic_block(&content, &SelectionState::collapsed(key, 0), link)
            .unwrap_err();
        assert!(matches!(err, ComposerError::EntityTypeMismatch { .. }));
    }

    #[test]
    fn test_insert_atomic_mid_text_splits() {
        let content = ContentModel::from_text("hello world");
        let key = key_at(&content, 0);
        let (content, image) =
            content.create_entity(EntityData::Image(ImageData::new("http://x/img.png", "cat")));
        let edit = insert_atomic_block(&content, &SelectionState::collapsed(key.clone(), 5), image)
            .unwrap();

        assert_eq!(texts(&edit.content), vec!["hello", " ", " world"]);
        assert_eq!(key_at(&edit.content, 0), key);
        assert!(edit.content.block_at(1).unwrap().is_atomic());
        assert_eq!(edit.selection.focus_key, key_at(&edit.content, 2));
    }

    #[test]
    fn test_untouched_blocks_are_shared() {
        let content = ContentModel::from_text("a\nb\nc");
        let middle = key_at(&content, 1);
        let edit = insert_text(&content, &SelectionState::collapsed(middle.clone(), 1), "!").unwrap();
        assert!(edit.content.shares_block(&content, &key_at(&content, 0)));
        assert!(edit.content.shares_block(&content, &key_at(&content, 2)));
        assert!(!edit.content.shares_block(&content, &middle));
    }
}
