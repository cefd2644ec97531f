//! Host embedding: HTML in, HTML out.
//!
//! The host form owns persistence. It mounts a [`Composer`] with the stored
//! HTML and gets the new HTML back through `on_change` whenever an edit
//! settles with a different serialization.

use composer_core::{
    BlockRender, ComposerConfig, DecoratorSet, EditorAction, EditorState, Surface, execute_action,
    from_html, to_html,
};

use crate::error::Result;

/// One mounted editor instance.
pub struct Composer<F: FnMut(&str)> {
    state: EditorState,
    decorators: DecoratorSet,
    config: ComposerConfig,
    read_only: bool,
    html: String,
    on_change: F,
}

impl<F: FnMut(&str)> std::fmt::Debug for Composer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("state", &self.state)
            .field("read_only", &self.read_only)
            .field("html", &self.html)
            .finish_non_exhaustive()
    }
}

impl<F: FnMut(&str)> Composer<F> {
    /// Mount on host HTML. Malformed input starts from an empty document.
    pub fn mount(value: &str, read_only: bool, config: ComposerConfig, on_change: F) -> Self {
        let content = from_html(value);
        let state = EditorState::create_with_config(content, &config);
        let html = to_html(state.content());
        Self {
            state,
            decorators: DecoratorSet::from_config(&config),
            config,
            read_only,
            html,
            on_change,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The last serialization handed to the host.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Run an editing action. Returns whether anything changed.
    pub fn apply(&mut self, action: &EditorAction) -> Result<bool> {
        if self.read_only {
            return Ok(false);
        }
        match execute_action(&self.state, action)? {
            Some(next) => Ok(self.commit(next)),
            None => Ok(false),
        }
    }

    /// Adopt a state produced by one of the controls, then settle.
    ///
    /// Read-only composers ignore commits and return `false`.
    pub fn commit(&mut self, next: EditorState) -> bool {
        if self.read_only {
            tracing::debug!(target: "composer::host", "ignored commit on read-only composer");
            return false;
        }
        self.state = next;
        self.settle();
        true
    }

    fn settle(&mut self) {
        let html = to_html(self.state.content());
        if html != self.html {
            tracing::trace!(target: "composer::host", len = html.len(), "emit html");
            (self.on_change)(&html);
            self.html = html;
        }
    }

    /// Render description for the current document.
    pub fn render(&self) -> Vec<BlockRender> {
        let surface = if self.read_only {
            Surface::ReadOnly
        } else {
            Surface::Editable
        };
        self.decorators.render(self.state.content(), surface)
    }
}

/// Render host HTML read-only with the same decorators as the editor.
pub fn preview(html: &str, config: &ComposerConfig) -> Vec<BlockRender> {
    DecoratorSet::from_config(config).render(&from_html(html), Surface::ReadOnly)
}
