//! Inline controls on an image block: resize, alt text, remove.
//!
//! Resizing and alt edits are cosmetic: they go through
//! [`ChangeType::SelectionOnly`] so neither the caret nor the undo stack moves.
//! Removal is a real edit and is undoable.

use composer_core::{
    BlockKey, ChangeType, ComposerConfig, ContentModel, EditorState, EntityKey, ImagePatch, ImageSize,
    RemovalDirection, SelectionState, modifier,
};

use crate::error::{ControlError, Result};

/// Controls bound to one atomic image block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBlockControls {
    block: BlockKey,
    entity: EntityKey,
}

impl ImageBlockControls {
    /// Controls for `block`, or `None` if it is not an image block.
    pub fn for_block(content: &ContentModel, block: &BlockKey) -> Option<Self> {
        let entity = content.block(block)?.atomic_entity()?;
        content.entity(entity)?.data.as_image()?;
        Some(Self {
            block: block.clone(),
            entity,
        })
    }

    pub fn block(&self) -> &BlockKey {
        &self.block
    }

    pub fn entity(&self) -> EntityKey {
        self.entity
    }

    /// Set the width to one of the configured presets.
    pub fn resize(
        &self,
        editor: &EditorState,
        config: &ComposerConfig,
        size: ImageSize,
    ) -> Result<EditorState> {
        if !config.image_sizes.contains(&size.0) {
            return Err(ControlError::UnsupportedSize { size: size.0 });
        }
        tracing::debug!(target: "composer::render", entity = %self.entity, width = size.0, "resize image");
        self.patch(editor, ImagePatch::width(size.as_width()))
    }

    /// Replace the alt text. Images must keep a description.
    pub fn set_alt(&self, editor: &EditorState, alt: &str) -> Result<EditorState> {
        let alt = alt.trim();
        if alt.is_empty() {
            return Err(ControlError::MissingAltText);
        }
        self.patch(editor, ImagePatch::alt(alt))
    }

    fn patch(&self, editor: &EditorState, patch: ImagePatch) -> Result<EditorState> {
        let content = editor.content().merge_entity_data(self.entity, &patch.into())?;
        Ok(editor.push(content, editor.selection().clone(), ChangeType::SelectionOnly)?)
    }

    /// Remove the block; the caret moves to the block that followed it.
    pub fn remove(&self, editor: &EditorState) -> Result<EditorState> {
        let content = editor.content();
        let span = SelectionState::block_span(content, &self.block)?;
        let emptied = modifier::remove_range(content, &span, RemovalDirection::Backward)?;
        let next = modifier::delete_block(&emptied, &self.block)?;
        let selection = SelectionState::after_block_removal(content, &self.block, &next);
        tracing::debug!(target: "composer::render", block = %self.block, "removed image block");
        Ok(editor.push(next, selection, ChangeType::Undoable)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_core::{Block, EntityData, EntityStore, ImageData};

    fn editor() -> EditorState {
        let mut entities = EntityStore::new();
        let image = entities.insert(EntityData::Image(ImageData::new("http://x/img.png", "cat")));
        let content = ContentModel::from_blocks(
            vec![
                Block::text(BlockKey::new("a"), "intro"),
                Block::atomic(BlockKey::new("img"), image),
            ],
            entities,
        )
        .unwrap();
        EditorState::create(content)
    }

    fn controls(state: &EditorState) -> ImageBlockControls {
        ImageBlockControls::for_block(state.content(), &BlockKey::new("img")).unwrap()
    }

    #[test]
    fn test_only_for_image_blocks() {
        let state = editor();
        assert!(ImageBlockControls::for_block(state.content(), &BlockKey::new("a")).is_none());
        assert!(ImageBlockControls::for_block(state.content(), &BlockKey::new("nope")).is_none());
    }

    #[test]
    fn test_resize_is_not_undoable() {
        let state = editor();
        let resized = controls(&state).resize(&state, &ComposerConfig::default(), ImageSize(50)).unwrap();
        assert_eq!(resized.undo_depth(), 0);
        assert_eq!(resized.selection(), state.selection());
        let image = resized
            .content()
            .entity(controls(&state).entity())
            .unwrap()
            .data
            .as_image()
            .unwrap()
            .clone();
        assert_eq!(image.width, "50%");
        assert_eq!(image.alt, "cat");
    }

    #[test]
    fn test_resize_only_to_presets() {
        let state = editor();
        let config = ComposerConfig::default();
        for size in [0, 60, 200] {
            assert_eq!(
                controls(&state).resize(&state, &config, ImageSize(size)).unwrap_err(),
                ControlError::UnsupportedSize { size }
            );
        }

        let config = ComposerConfig {
            image_sizes: vec![100, 60],
            ..ComposerConfig::default()
        };
        let resized = controls(&state).resize(&state, &config, ImageSize(60)).unwrap();
        let entity = controls(&state).entity();
        let width = &resized.content().entity(entity).unwrap().data.as_image().unwrap().width;
        assert_eq!(width, "60%");
    }

    #[test]
    fn test_alt_must_not_be_empty() {
        let state = editor();
        assert_eq!(
            controls(&state).set_alt(&state, " ").unwrap_err(),
            ControlError::MissingAltText
        );
        let next = controls(&state).set_alt(&state, "a cat").unwrap();
        assert_eq!(next.undo_depth(), 0);
    }

    #[test]
    fn test_remove_last_block_goes_to_document_start() {
        let state = editor();
        let next = controls(&state).remove(&state).unwrap();
        assert_eq!(next.content().block_count(), 1);
        assert_eq!(next.selection(), &SelectionState::collapsed(BlockKey::new("a"), 0));
        assert_eq!(next.undo_depth(), 1);

        let undone = next.undo().unwrap();
        assert_eq!(undone.content().block_count(), 2);
    }
}
