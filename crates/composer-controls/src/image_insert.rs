//! Image insertion: pick a file, upload it, add alt text, insert.
//!
//! ```text
//! Idle -> Uploading -> Ready  -> (confirm) -> Idle
//!                   -> Failed -> (retry)   -> Idle
//! ```
//!
//! Uploads run outside the control: [`ImageInsertControl::select_file`] hands
//! back a [`PendingUpload`] to drive against an [`UploadAdapter`], and the
//! result comes back through [`ImageInsertControl::complete`]. Each cycle is
//! tagged with a generation so a result that arrives after the dialog was
//! dismissed is dropped instead of resurrecting the control.

use std::collections::VecDeque;

use composer_core::{
    ChangeType, ComposerConfig, EditorState, EntityData, ImageData, SmolStr, modifier,
};

use crate::error::{ControlError, Result, UploadError};
use crate::upload::{UploadAdapter, UploadFile, UploadedImage, mime_matches};

/// Where one insertion attempt stands.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading {
        file_name: SmolStr,
        size: usize,
    },
    Ready {
        file_name: SmolStr,
        size: usize,
        url: SmolStr,
    },
    Failed {
        file_name: SmolStr,
        error: UploadError,
    },
}

/// An upload cycle handed to the host to run.
#[derive(Clone, Debug)]
pub struct PendingUpload {
    generation: u64,
    file: UploadFile,
}

impl PendingUpload {
    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    /// Run the upload against `adapter`.
    pub async fn run<A: UploadAdapter>(self, adapter: &A) -> UploadOutcome {
        let file_name = self.file.name.clone();
        let size = self.file.size();
        let result = adapter.upload(self.file).await;
        UploadOutcome {
            generation: self.generation,
            file_name,
            size,
            result,
        }
    }
}

/// What came back from one upload cycle.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    generation: u64,
    pub file_name: SmolStr,
    pub size: usize,
    pub result: std::result::Result<UploadedImage, UploadError>,
}

/// State for the "add image" dialog.
#[derive(Debug)]
pub struct ImageInsertControl {
    accept: SmolStr,
    state: UploadState,
    queue: VecDeque<UploadFile>,
    alt: String,
    generation: u64,
}

impl ImageInsertControl {
    pub fn new(config: &ComposerConfig) -> Self {
        Self {
            accept: config.image_accept.clone(),
            state: UploadState::Idle,
            queue: VecDeque::new(),
            alt: String::new(),
            generation: 0,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

    pub fn set_alt(&mut self, alt: impl Into<String>) {
        self.alt = alt.into();
    }

    /// Whether the insert action is enabled.
    pub fn can_insert(&self) -> bool {
        matches!(self.state, UploadState::Ready { .. }) && !self.alt.trim().is_empty()
    }

    /// Accept a picked or dropped file.
    ///
    /// Returns the upload to run when the control was free; a file dropped
    /// while another is in progress is queued and returns `None`.
    pub fn select_file(&mut self, file: UploadFile) -> Result<Option<PendingUpload>> {
        let mime = file.resolved_mime_type();
        if !mime_matches(&self.accept, &mime) {
            tracing::debug!(target: "composer::upload", name = %file.name, %mime, "rejected file");
            return Err(ControlError::NotAnImage { mime });
        }

        match self.state {
            UploadState::Uploading { .. } | UploadState::Ready { .. } => {
                tracing::debug!(target: "composer::upload", name = %file.name, "queued file");
                self.queue.push_back(file);
                Ok(None)
            }
            UploadState::Idle | UploadState::Failed { .. } => Ok(Some(self.start(file))),
        }
    }

    /// Start the next queued file, if the control is free.
    pub fn next_upload(&mut self) -> Option<PendingUpload> {
        if !matches!(self.state, UploadState::Idle) {
            return None;
        }
        let file = self.queue.pop_front()?;
        Some(self.start(file))
    }

    fn start(&mut self, file: UploadFile) -> PendingUpload {
        self.generation += 1;
        self.alt.clear();
        self.state = UploadState::Uploading {
            file_name: file.name.clone(),
            size: file.size(),
        };
        tracing::debug!(
            target: "composer::upload",
            name = %file.name,
            generation = self.generation,
            "uploading"
        );
        PendingUpload {
            generation: self.generation,
            file,
        }
    }

    /// Feed an upload result back in. Returns `false` for stale results.
    pub fn complete(&mut self, outcome: UploadOutcome) -> bool {
        if outcome.generation != self.generation
            || !matches!(self.state, UploadState::Uploading { .. })
        {
            tracing::debug!(
                target: "composer::upload",
                name = %outcome.file_name,
                generation = outcome.generation,
                current = self.generation,
                "discarding stale upload result"
            );
            return false;
        }

        // Images need a source; a blank URL fails the upload.
        let result = outcome.result.and_then(|uploaded| {
            if uploaded.url.trim().is_empty() {
                Err(UploadError::Rejected {
                    reason: "no image URL returned".into(),
                })
            } else {
                Ok(uploaded)
            }
        });
        self.state = match result {
            Ok(uploaded) => {
                tracing::debug!(target: "composer::upload", name = %outcome.file_name, url = %uploaded.url, "ready");
                UploadState::Ready {
                    file_name: outcome.file_name,
                    size: outcome.size,
                    url: uploaded.url,
                }
            }
            Err(error) => {
                tracing::warn!(target: "composer::upload", name = %outcome.file_name, %error, "upload failed");
                UploadState::Failed {
                    file_name: outcome.file_name,
                    error,
                }
            }
        };
        true
    }

    /// Select, upload and settle one file in a single call.
    ///
    /// Convenient when the caller can hold the control across the await. A
    /// file that gets queued is not uploaded here.
    pub async fn upload<A: UploadAdapter>(&mut self, adapter: &A, file: UploadFile) -> Result<()> {
        if let Some(pending) = self.select_file(file)? {
            let outcome = pending.run(adapter).await;
            self.complete(outcome);
        }
        Ok(())
    }

    /// Leave `Failed` so the user can pick another file.
    pub fn retry(&mut self) {
        if matches!(self.state, UploadState::Failed { .. }) {
            tracing::debug!(target: "composer::upload", "retry");
            self.state = UploadState::Idle;
        }
    }

    /// Close the dialog: forget the queue and ignore any in-flight result.
    pub fn dismiss(&mut self) {
        if matches!(self.state, UploadState::Uploading { .. }) {
            tracing::debug!(target: "composer::upload", generation = self.generation, "dismissed during upload");
        }
        self.generation += 1;
        self.queue.clear();
        self.alt.clear();
        self.state = UploadState::Idle;
    }

    /// Insert the uploaded image at the editor selection.
    ///
    /// Needs a finished upload and non-empty alt text; on either failure the
    /// control is left as it was.
    pub fn confirm(&mut self, editor: &EditorState) -> Result<EditorState> {
        let UploadState::Ready { url, .. } = &self.state else {
            return Err(match self.state {
                UploadState::Uploading { .. } => ControlError::UploadInProgress,
                _ => ControlError::NotReady,
            });
        };
        let alt = self.alt.trim();
        if alt.is_empty() {
            return Err(ControlError::MissingAltText);
        }

        let image = ImageData::new(url.clone(), alt);
        let (content, entity) = editor.content().create_entity(EntityData::Image(image));
        let edit = modifier::insert_atomic_block(&content, editor.selection(), entity)?;
        let next = editor.push(edit.content, edit.selection, ChangeType::Undoable)?;

        tracing::debug!(target: "composer::upload", %entity, "inserted image");
        self.state = UploadState::Idle;
        self.alt.clear();
        Ok(next)
    }
}
