//! Out-of-band annotations (links, images) referenced from block content.
//!
//! Entities live in an [`EntityStore`] keyed by [`EntityKey`]. Blocks never own
//! entity data directly; they carry [`crate::EntityRange`]s that point at a key.
//! The store is copy-on-write: cloning is a pointer bump, and an edit only
//! copies the key table, never the untouched entities themselves.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{ComposerError, Result};

/// Width used for images that were never resized.
pub const DEFAULT_IMAGE_WIDTH: &str = "100%";
/// Height used for newly inserted images; the renderer keeps aspect ratio.
pub const DEFAULT_IMAGE_HEIGHT: &str = "auto";

/// Key of an entity inside one content model generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(pub u32);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The kind of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Link,
    Image,
}

/// Link entity payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub url: SmolStr,
    /// Browsing context for the anchor. Parsed links keep whatever they had.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SmolStr>,
}

impl LinkData {
    pub fn new(url: impl Into<SmolStr>) -> Self {
        Self {
            url: url.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<SmolStr>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Image entity payload.
///
/// `width` is a percentage string (`"75%"`) or `"auto"`, `height` is `"auto"`
/// or a pixel string. Both are kept as strings since they round-trip through
/// HTML attributes verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub src: SmolStr,
    pub width: SmolStr,
    pub height: SmolStr,
    pub alt: SmolStr,
}

impl ImageData {
    /// A freshly inserted image at full width.
    pub fn new(src: impl Into<SmolStr>, alt: impl Into<SmolStr>) -> Self {
        Self {
            src: src.into(),
            width: SmolStr::new_static(DEFAULT_IMAGE_WIDTH),
            height: SmolStr::new_static(DEFAULT_IMAGE_HEIGHT),
            alt: alt.into(),
        }
    }

    pub fn with_width(mut self, width: impl Into<SmolStr>) -> Self {
        self.width = width.into();
        self
    }
}

/// Entity payload, one variant per entity type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityData {
    Link(LinkData),
    Image(ImageData),
}

impl EntityData {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityData::Link(_) => EntityType::Link,
            EntityData::Image(_) => EntityType::Image,
        }
    }

    pub fn as_link(&self) -> Option<&LinkData> {
        match self {
            EntityData::Link(link) => Some(link),
            EntityData::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageData> {
        match self {
            EntityData::Image(image) => Some(image),
            EntityData::Link(_) => None,
        }
    }
}

/// Partial link update. `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkPatch {
    pub url: Option<SmolStr>,
    /// `Some(None)` clears the target.
    pub target: Option<Option<SmolStr>>,
}

/// Partial image update. `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImagePatch {
    pub src: Option<SmolStr>,
    pub width: Option<SmolStr>,
    pub height: Option<SmolStr>,
    pub alt: Option<SmolStr>,
}

impl ImagePatch {
    pub fn alt(alt: impl Into<SmolStr>) -> Self {
        Self {
            alt: Some(alt.into()),
            ..Self::default()
        }
    }

    pub fn width(width: impl Into<SmolStr>) -> Self {
        Self {
            width: Some(width.into()),
            ..Self::default()
        }
    }
}

/// A shallow, typed update merged into existing entity data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityPatch {
    Link(LinkPatch),
    Image(ImagePatch),
}

impl EntityPatch {
    fn entity_type(&self) -> EntityType {
        match self {
            EntityPatch::Link(_) => EntityType::Link,
            EntityPatch::Image(_) => EntityType::Image,
        }
    }
}

impl From<ImagePatch> for EntityPatch {
    fn from(patch: ImagePatch) -> Self {
        EntityPatch::Image(patch)
    }
}

impl From<LinkPatch> for EntityPatch {
    fn from(patch: LinkPatch) -> Self {
        EntityPatch::Link(patch)
    }
}

/// A keyed annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub key: EntityKey,
    pub data: EntityData,
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        self.data.entity_type()
    }
}

/// Keyed registry of entities.
#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    entries: Arc<BTreeMap<EntityKey, Arc<Entity>>>,
    next_key: u32,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entity and return its key.
    ///
    /// Keys are never reused within a store lineage, even after removal.
    pub fn insert(&mut self, data: EntityData) -> EntityKey {
        let key = EntityKey(self.next_key);
        self.next_key += 1;
        Arc::make_mut(&mut self.entries).insert(key, Arc::new(Entity { key, data }));
        key
    }

    /// Persistent variant of [`EntityStore::insert`].
    pub fn with_entity(&self, data: EntityData) -> (Self, EntityKey) {
        let mut next = self.clone();
        let key = next.insert(data);
        (next, key)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entries.get(&key).map(|e| e.as_ref())
    }

    /// Look up an entity, treating a miss as a programming error.
    pub fn require(&self, key: EntityKey) -> Result<&Entity> {
        self.get(key).ok_or(ComposerError::UnknownEntity(key))
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values().map(|e| e.as_ref())
    }

    /// Shallow-merge `patch` into the entity under `key`.
    ///
    /// The key and every field the patch leaves as `None` are preserved. All
    /// other entities are shared with `self`.
    pub fn merge_entity_data(&self, key: EntityKey, patch: &EntityPatch) -> Result<Self> {
        let entity = self.require(key)?;
        let merged = merge_data(entity, patch)?;

        let mut next = self.clone();
        Arc::make_mut(&mut next.entries).insert(key, Arc::new(Entity { key, data: merged }));
        Ok(next)
    }

    /// True when both stores share the same allocation for `key`.
    pub fn shares_entity(&self, other: &EntityStore, key: EntityKey) -> bool {
        match (self.entries.get(&key), other.entries.get(&key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn merge_data(entity: &Entity, patch: &EntityPatch) -> Result<EntityData> {
    match (&entity.data, patch) {
        (EntityData::Link(link), EntityPatch::Link(p)) => {
            let mut link = link.clone();
            if let Some(url) = &p.url {
                link.url = url.clone();
            }
            if let Some(target) = &p.target {
                link.target = target.clone();
            }
            Ok(EntityData::Link(link))
        }
        (EntityData::Image(image), EntityPatch::Image(p)) => {
            let mut image = image.clone();
            if let Some(src) = &p.src {
                image.src = src.clone();
            }
            if let Some(width) = &p.width {
                image.width = width.clone();
            }
            if let Some(height) = &p.height {
                image.height = height.clone();
            }
            if let Some(alt) = &p.alt {
                image.alt = alt.clone();
            }
            Ok(EntityData::Image(image))
        }
        (data, patch) => Err(ComposerError::EntityTypeMismatch {
            key: entity.key,
            expected: patch.entity_type(),
            found: data.entity_type(),
        }),
    }
}

/// Free-function form of [`EntityStore::merge_entity_data`].
pub fn merge_entity_data(
    store: &EntityStore,
    key: EntityKey,
    patch: &EntityPatch,
) -> Result<EntityStore> {
    store.merge_entity_data(key, patch)
}
