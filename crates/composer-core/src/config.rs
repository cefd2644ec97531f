//! Composer configuration.
//!
//! Hosts usually embed the composer with [`ComposerConfig::default`]; a JSON
//! override can be supplied for deployments that need different presets.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{ComposerError, Result};

/// Tunables shared by the engine and its controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Cap on undo entries, oldest evicted first. Unbounded when `None`.
    pub max_undo_steps: Option<usize>,
    /// URL schemes the link decorator renders.
    pub link_schemes: Vec<SmolStr>,
    /// Target applied to every newly created link.
    pub default_link_target: SmolStr,
    /// MIME pattern accepted by the image insertion control.
    pub image_accept: SmolStr,
    /// Resize presets offered for images, as percentages of container width.
    pub image_sizes: Vec<u8>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_undo_steps: None,
            link_schemes: ["http", "https", "mailto", "tel"]
                .into_iter()
                .map(SmolStr::new_static)
                .collect(),
            default_link_target: SmolStr::new_static("_blank"),
            image_accept: SmolStr::new_static("image/*"),
            image_sizes: vec![100, 75, 50, 25],
        }
    }
}

impl ComposerConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ComposerError::parse(format!("config: {e}")))
    }
}
