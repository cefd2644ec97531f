//! Link insertion and editing.

use composer_core::{
    ChangeType, ComposerConfig, ContentModel, EditorState, EntityData, EntityKey, EntityPatch,
    EntityType, LinkData, LinkPatch, SelectionState, SmolStr, modifier,
};

use crate::error::{ControlError, Result};

/// An open link editor, bound to the range it will link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkControl {
    range: SelectionState,
    existing: Option<EntityKey>,
    url: String,
}

impl LinkControl {
    /// Open the editor for the current selection.
    ///
    /// Needs either highlighted text or a caret inside an existing link;
    /// otherwise the user is asked to highlight text first.
    pub fn open(editor: &EditorState) -> Result<Self> {
        let content = editor.content();
        let selection = editor.selection();

        if selection.is_collapsed() {
            return existing_link_at(content, selection).ok_or(ControlError::NothingToLink);
        }

        let text = selection.selected_text(content)?;
        if !text.chars().any(|c| c != '\n') {
            return Err(ControlError::NothingToLink);
        }

        // A selection entirely inside one link edits that link.
        let ordered = selection.ordered(content)?;
        let existing = content
            .require_block(&ordered.start_key)?
            .entity_ranges()
            .iter()
            .find(|r| {
                ordered.is_single_block()
                    && r.start <= ordered.start_offset
                    && ordered.end_offset <= r.end
            })
            .map(|r| r.entity)
            .filter(|&key| is_link(content, key));

        Ok(Self {
            range: selection.clone(),
            url: existing.map(|key| link_url(content, key)).unwrap_or_default(),
            existing,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// The range this control links.
    pub fn range(&self) -> &SelectionState {
        &self.range
    }

    pub fn is_editing(&self) -> bool {
        self.existing.is_some()
    }

    /// Apply the link. New and edited links always get the configured target.
    pub fn confirm(&self, editor: &EditorState, config: &ComposerConfig) -> Result<EditorState> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ControlError::EmptyUrl);
        }
        let target = config.default_link_target.clone();

        let content = match self.existing {
            Some(key) => editor.content().merge_entity_data(
                key,
                &EntityPatch::Link(LinkPatch {
                    url: Some(SmolStr::new(url)),
                    target: Some(Some(target)),
                }),
            )?,
            None => {
                let data = EntityData::Link(LinkData::new(url).with_target(target));
                let (content, key) = editor.content().create_entity(data);
                modifier::apply_entity(&content, &self.range, Some(key))?
            }
        };

        tracing::debug!(target: "composer::render", url, editing = self.is_editing(), "link applied");
        Ok(editor.push(content, editor.selection().clone(), ChangeType::Undoable)?)
    }

    /// Strip the link from the range.
    pub fn remove(&self, editor: &EditorState) -> Result<EditorState> {
        let content = modifier::apply_entity(editor.content(), &self.range, None)?;
        Ok(editor.push(content, editor.selection().clone(), ChangeType::Undoable)?)
    }
}

fn is_link(content: &ContentModel, key: EntityKey) -> bool {
    content
        .entity(key)
        .is_some_and(|e| e.entity_type() == EntityType::Link)
}

fn link_url(content: &ContentModel, key: EntityKey) -> String {
    content
        .entity(key)
        .and_then(|e| e.data.as_link())
        .map(|l| l.url.to_string())
        .unwrap_or_default()
}

/// The link around a caret, as a control over the whole link text.
fn existing_link_at(content: &ContentModel, caret: &SelectionState) -> Option<LinkControl> {
    let block = content.block(&caret.focus_key)?;
    let offset = caret.focus_offset;
    let range = block
        .entity_ranges()
        .iter()
        .find(|r| r.start <= offset && offset <= r.end && is_link(content, r.entity))?;
    Some(LinkControl {
        range: SelectionState::within(block.key().clone(), range.start, range.end),
        existing: Some(range.entity),
        url: link_url(content, range.entity),
    })
}
