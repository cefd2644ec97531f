//! Decorators: pure strategy/render pairs over block content.
//!
//! A decorator finds the char ranges it cares about in a block (`strategy`)
//! and decides how to wrap them (`render`). The same [`DecoratorSet`] drives
//! both the editable surface and the read-only preview, so the two can never
//! drift apart visually.

use std::ops::Range;

use smol_str::{SmolStr, format_smolstr};

use crate::block::{Block, BlockKey};
use crate::config::ComposerConfig;
use crate::content::ContentModel;
use crate::entity::{EntityData, EntityKey, EntityType};

/// Where a render is headed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    /// The composer itself; atomic blocks get their inline controls.
    Editable,
    /// Standalone preview; no controls.
    ReadOnly,
}

/// Inline render description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderNode {
    Text(SmolStr),
    LineBreak,
    Link {
        href: SmolStr,
        target: Option<SmolStr>,
        children: Vec<RenderNode>,
    },
}

/// Image width preset, as a percentage of the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageSize(pub u8);

impl ImageSize {
    pub const FULL: ImageSize = ImageSize(100);

    /// Parse a `"75%"` style width.
    pub fn parse(width: &str) -> Option<Self> {
        width
            .trim()
            .strip_suffix('%')
            .and_then(|n| n.trim().parse::<u8>().ok())
            .filter(|n| (1..=100).contains(n))
            .map(ImageSize)
    }

    /// The width attribute value for this preset.
    pub fn as_width(self) -> SmolStr {
        format_smolstr!("{}%", self.0)
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::FULL
    }
}

/// Controls offered on an image block in the editable surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageControls {
    pub sizes: Vec<ImageSize>,
    pub can_edit_alt: bool,
    pub can_remove: bool,
}

/// Render description of an atomic image block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageView {
    pub entity: EntityKey,
    pub src: SmolStr,
    pub alt: SmolStr,
    pub height: SmolStr,
    /// Current size; unknown widths fall back to full width.
    pub size: ImageSize,
    /// Present only on the editable surface.
    pub controls: Option<ImageControls>,
}

/// Render description of one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockView {
    Paragraph(Vec<RenderNode>),
    Image(ImageView),
    /// An atomic block whose entity has no block-level rendering.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRender {
    pub key: BlockKey,
    pub view: BlockView,
}

/// A strategy/render pair.
///
/// Implementations must be pure: they read the block and content and never
/// hold state that changes between calls.
pub trait Decorator: Send + Sync {
    /// Char ranges of `block` this decorator wants to wrap.
    fn strategy(&self, block: &Block, content: &ContentModel) -> Vec<Range<usize>>;

    /// Wrap `children`. Returning `None` renders nothing for the range.
    fn render(&self, children: Vec<RenderNode>, data: Option<&EntityData>) -> Option<RenderNode>;
}

/// Wraps link entity ranges in anchors.
///
/// Links whose scheme is not allow-listed render nothing at all, text
/// included. That hides links with valid but unusual schemes (`ftp:`), and
/// relative URLs, which have no scheme.
#[derive(Clone, Debug)]
pub struct LinkDecorator {
    schemes: Vec<SmolStr>,
}

impl LinkDecorator {
    pub fn new(schemes: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ComposerConfig) -> Self {
        Self::new(config.link_schemes.iter().cloned())
    }

    /// Whether `href` parses to an absolute URL with an allowed scheme.
    pub fn is_allowed(&self, href: &str) -> bool {
        match url::Url::parse(href) {
            Ok(url) => self.schemes.iter().any(|s| s.eq_ignore_ascii_case(url.scheme())),
            Err(_) => false,
        }
    }
}

impl Default for LinkDecorator {
    fn default() -> Self {
        Self::from_config(&ComposerConfig::default())
    }
}

impl Decorator for LinkDecorator {
    fn strategy(&self, block: &Block, content: &ContentModel) -> Vec<Range<usize>> {
        block
            .entity_ranges()
            .iter()
            .filter(|r| {
                content
                    .entity(r.entity)
                    .is_some_and(|e| e.entity_type() == EntityType::Link)
            })
            .map(|r| r.to_range())
            .collect()
    }

    fn render(&self, children: Vec<RenderNode>, data: Option<&EntityData>) -> Option<RenderNode> {
        let link = data?.as_link()?;
        if !self.is_allowed(&link.url) {
            tracing::trace!(target: "composer::render", url = %link.url, "link scheme not allowed");
            return None;
        }
        Some(RenderNode::Link {
            href: link.url.clone(),
            target: link.target.clone(),
            children,
        })
    }
}

/// Ordered decorators plus block-level rendering settings.
///
/// Earlier decorators win when ranges overlap.
pub struct DecoratorSet {
    decorators: Vec<Box<dyn Decorator>>,
    image_sizes: Vec<ImageSize>,
}

impl Default for DecoratorSet {
    fn default() -> Self {
        Self::from_config(&ComposerConfig::default())
    }
}

impl std::fmt::Debug for DecoratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorSet")
            .field("decorators", &self.decorators.len())
            .field("image_sizes", &self.image_sizes)
            .finish()
    }
}

impl DecoratorSet {
    pub fn new(image_sizes: Vec<ImageSize>) -> Self {
        Self {
            decorators: Vec::new(),
            image_sizes,
        }
    }

    /// The standard set: links, with presets from `config`.
    pub fn from_config(config: &ComposerConfig) -> Self {
        let sizes = config.image_sizes.iter().map(|&n| ImageSize(n)).collect();
        Self::new(sizes).with(LinkDecorator::from_config(config))
    }

    pub fn with(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.push(Box::new(decorator));
        self
    }

    pub fn image_sizes(&self) -> &[ImageSize] {
        &self.image_sizes
    }

    /// Inline render of a text block.
    pub fn decorate(&self, block: &Block, content: &ContentModel) -> Vec<RenderNode> {
        let mut claimed: Vec<(Range<usize>, usize)> = Vec::new();
        for (idx, decorator) in self.decorators.iter().enumerate() {
            for range in decorator.strategy(block, content) {
                if range.is_empty() || claimed.iter().any(|(r, _)| overlaps(r, &range)) {
                    continue;
                }
                claimed.push((range, idx));
            }
        }
        claimed.sort_by_key(|(r, _)| r.start);

        let mut nodes = Vec::new();
        let mut pos = 0;
        for (range, idx) in claimed {
            if range.start > pos {
                push_text(&mut nodes, block.slice(pos..range.start));
            }
            let mut children = Vec::new();
            push_text(&mut children, block.slice(range.clone()));
            let data = block
                .entity_at(range.start)
                .and_then(|key| content.entity(key))
                .map(|e| &e.data);
            if let Some(node) = self.decorators[idx].render(children, data) {
                nodes.push(node);
            }
            pos = range.end;
        }
        let len = block.len_chars();
        if pos < len {
            push_text(&mut nodes, block.slice(pos..len));
        }
        nodes
    }

    /// Render one block for `surface`.
    pub fn render_block(&self, block: &Block, content: &ContentModel, surface: Surface) -> BlockRender {
        let view = match block.atomic_entity() {
            None => BlockView::Paragraph(self.decorate(block, content)),
            Some(key) => match content.entity(key).map(|e| &e.data) {
                Some(EntityData::Image(image)) => BlockView::Image(ImageView {
                    entity: key,
                    src: image.src.clone(),
                    alt: image.alt.clone(),
                    height: image.height.clone(),
                    size: ImageSize::parse(&image.width)
                        .filter(|s| self.image_sizes.contains(s))
                        .unwrap_or_default(),
                    controls: match surface {
                        Surface::Editable => Some(ImageControls {
                            sizes: self.image_sizes.clone(),
                            can_edit_alt: true,
                            can_remove: true,
                        }),
                        Surface::ReadOnly => None,
                    },
                }),
                Some(EntityData::Link(_)) | None => BlockView::Empty,
            },
        };
        BlockRender {
            key: block.key().clone(),
            view,
        }
    }

    /// Render the whole document in order.
    pub fn render(&self, content: &ContentModel, surface: Surface) -> Vec<BlockRender> {
        content
            .blocks()
            .map(|block| self.render_block(block, content, surface))
            .collect()
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Push text, turning soft newlines into line breaks.
fn push_text(nodes: &mut Vec<RenderNode>, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            nodes.push(RenderNode::LineBreak);
        }
        if !line.is_empty() {
            nodes.push(RenderNode::Text(SmolStr::new(line)));
        }
    }
}
