//! HTML bridge: the only form the document is persisted in.
//!
//! Output is a flat sequence of `<p>` and `<figure>` blocks joined by newlines.
//! Input is parsed leniently: unknown inline tags are transparent, block
//! containers start new blocks, and any `<img>` becomes an atomic block.

use std::sync::LazyLock;

use pulldown_cmark_escape::{FmtWriter, StrWrite, escape_html};
use regex::Regex;
use smol_str::SmolStr;

use crate::block::{Block, BlockKey, EntityRange};
use crate::content::ContentModel;
use crate::entity::{EntityData, EntityKey, EntityStore, ImageData, LinkData};
use crate::error::{ComposerError, Result};

/// Serialize `content`. Deterministic and order-preserving.
pub fn to_html(content: &ContentModel) -> String {
    let mut out = String::new();
    if let Err(err) = write_html(FmtWriter(&mut out), content) {
        tracing::error!(target: "composer::html", ?err, "failed to write html");
    }
    out
}

/// Serialize `content` into any [`StrWrite`] sink.
pub fn write_html<W: StrWrite>(mut writer: W, content: &ContentModel) -> Result<(), W::Error> {
    for (i, block) in content.blocks().enumerate() {
        if i > 0 {
            writer.write_str("\n")?;
        }
        match block.atomic_entity() {
            Some(key) => write_atomic(&mut writer, content, key)?,
            None => write_paragraph(&mut writer, content, block)?,
        }
    }
    Ok(())
}

fn write_paragraph<W: StrWrite>(
    writer: &mut W,
    content: &ContentModel,
    block: &Block,
) -> Result<(), W::Error> {
    writer.write_str("<p>")?;
    for segment in block.segments() {
        let link = segment
            .entity
            .and_then(|key| content.entity(key))
            .and_then(|e| e.data.as_link());
        match link {
            Some(link) => {
                writer.write_str("<a href=\"")?;
                escape_html(&mut *writer, &link.url)?;
                writer.write_str("\"")?;
                if let Some(target) = &link.target {
                    writer.write_str(" target=\"")?;
                    escape_html(&mut *writer, target)?;
                    writer.write_str("\"")?;
                }
                writer.write_str(">")?;
                write_text(writer, segment.text)?;
                writer.write_str("</a>")?;
            }
            None => write_text(writer, segment.text)?,
        }
    }
    writer.write_str("</p>")
}

fn write_atomic<W: StrWrite>(
    writer: &mut W,
    content: &ContentModel,
    key: EntityKey,
) -> Result<(), W::Error> {
    let Some(image) = content.entity(key).and_then(|e| e.data.as_image()) else {
        // Non-image atomic blocks have no HTML form; keep the block boundary.
        return writer.write_str("<p></p>");
    };
    writer.write_str("<figure><img")?;
    for (name, value) in [
        ("src", &image.src),
        ("width", &image.width),
        ("height", &image.height),
        ("alt", &image.alt),
    ] {
        writer.write_str(" ")?;
        writer.write_str(name)?;
        writer.write_str("=\"")?;
        escape_html(&mut *writer, value)?;
        writer.write_str("\"")?;
    }
    writer.write_str("></figure>")
}

/// Escaped text with soft newlines as `<br>`.
///
/// Tabs and carriage returns are written as character references so the
/// parser's whitespace folding leaves them alone.
fn write_text<W: StrWrite>(writer: &mut W, text: &str) -> Result<(), W::Error> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            writer.write_str("<br>")?;
        }
        let mut rest = line;
        while let Some(pos) = rest.find(['\t', '\r']) {
            escape_html(&mut *writer, &rest[..pos])?;
            writer.write_str(if rest[pos..].starts_with('\t') { "&#9;" } else { "&#13;" })?;
            rest = &rest[pos + 1..];
        }
        escape_html(&mut *writer, rest)?;
    }
    Ok(())
}

/// Parse host HTML, degrading to the empty document on failure.
pub fn from_html(html: &str) -> ContentModel {
    match try_from_html(html) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(target: "composer::html", %err, "unparseable html, starting empty");
            ContentModel::empty()
        }
    }
}

/// Parse host HTML, reporting malformed markup.
///
/// Empty or whitespace-only input yields the empty document.
pub fn try_from_html(html: &str) -> Result<ContentModel> {
    let mut builder = Builder::default();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            builder.text(rest);
            break;
        };
        if lt > 0 {
            builder.text(&rest[..lt]);
            rest = &rest[lt..];
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| ComposerError::parse("unterminated comment"))?;
            rest = &after[end + 3..];
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest
                .find('>')
                .ok_or_else(|| ComposerError::parse("unterminated declaration"))?;
            rest = &rest[end + 1..];
            continue;
        }

        let Some(caps) = TAG_RE.captures(rest) else {
            let looks_like_tag = rest[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/');
            if looks_like_tag && !rest.contains('>') {
                return Err(ComposerError::parse("unterminated tag"));
            }
            // A stray '<' is just text.
            builder.text("<");
            rest = &rest[1..];
            continue;
        };

        let whole = caps.get(0).map_or(0, |m| m.end());
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        rest = &rest[whole..];

        if closing {
            builder.close(&name);
            continue;
        }

        if name == "script" || name == "style" {
            let close = format!("</{name}");
            let end = rest
                .to_ascii_lowercase()
                .find(&close)
                .ok_or_else(|| ComposerError::parse(format!("unterminated <{name}>")))?;
            rest = &rest[end..];
            continue;
        }

        builder.open(&name, &parse_attrs(attrs));
    }

    builder.finish()
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/?>"#,
    )
    .unwrap()
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});

static CHAR_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]+);").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "figure",
];

fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

struct Attr {
    name: String,
    value: String,
}

fn parse_attrs(raw: &str) -> Vec<Attr> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some(Attr {
                name,
                value: decode_char_refs(value),
            })
        })
        .collect()
}

fn attr<'a>(attrs: &'a [Attr], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

/// Decode named and numeric character references.
fn decode_char_refs(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    CHAR_REF_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// A text block under construction.
#[derive(Default)]
struct Pending {
    text: String,
    chars: usize,
    ranges: Vec<EntityRange>,
    /// Continues a block that an image split; dropped if nothing follows.
    after_atomic: bool,
}

impl Pending {
    fn is_blank(&self) -> bool {
        self.ranges.is_empty() && self.text.trim().is_empty()
    }
}

/// An open `<a>`; the entity is only created once it wraps some text.
struct OpenLink {
    data: Option<LinkData>,
    entity: Option<EntityKey>,
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    entities: EntityStore,
    pending: Option<Pending>,
    links: Vec<OpenLink>,
}

impl Builder {
    fn next_key(&self) -> BlockKey {
        BlockKey::from_index(self.blocks.len() as u64)
    }

    fn open(&mut self, name: &str, attrs: &[Attr]) {
        match name {
            "br" => self.append("\n"),
            "img" => self.image(attrs),
            "a" => {
                let data = attr(attrs, "href").map(|href| {
                    let link = LinkData::new(href);
                    match attr(attrs, "target") {
                        Some(target) => link.with_target(target),
                        None => link,
                    }
                });
                self.links.push(OpenLink { data, entity: None });
            }
            _ if is_block_tag(name) => {
                if let Some(pending) = self.pending.take() {
                    if !pending.is_blank() {
                        self.push_text_block(pending);
                    }
                }
                self.pending = Some(Pending::default());
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        if name == "a" {
            self.links.pop();
        } else if is_block_tag(name) {
            self.flush();
        }
    }

    /// Raw text between tags.
    fn text(&mut self, raw: &str) {
        if self.pending.is_none() && raw.trim().is_empty() {
            return;
        }
        let folded: String = raw
            .chars()
            .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
            .collect();
        self.append(&decode_char_refs(&folded));
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let link = self.active_link();
        let pending = self.pending.get_or_insert_with(Pending::default);
        let n = text.chars().count();
        if let Some(entity) = link {
            pending
                .ranges
                .push(EntityRange::new(pending.chars, pending.chars + n, entity));
        }
        pending.text.push_str(text);
        pending.chars += n;
    }

    /// Entity of the innermost open link with an href, created on demand.
    fn active_link(&mut self) -> Option<EntityKey> {
        let open = self.links.iter_mut().rev().find(|l| l.data.is_some())?;
        if open.entity.is_none() {
            let data = open.data.clone()?;
            open.entity = Some(self.entities.insert(EntityData::Link(data)));
        }
        open.entity
    }

    fn image(&mut self, attrs: &[Attr]) {
        let Some(src) = attr(attrs, "src").filter(|s| !s.is_empty()) else {
            return;
        };
        let mut image = ImageData::new(src, attr(attrs, "alt").unwrap_or_default());
        if let Some(width) = attr(attrs, "width") {
            image.width = SmolStr::new(width);
        }
        if let Some(height) = attr(attrs, "height") {
            image.height = SmolStr::new(height);
        }

        let inside_block = self.pending.is_some();
        if let Some(pending) = self.pending.take() {
            if !pending.is_blank() {
                self.push_text_block(pending);
            }
        }
        let entity = self.entities.insert(EntityData::Image(image));
        let key = self.next_key();
        tracing::trace!(target: "composer::html", %key, %entity, "image block");
        self.blocks.push(Block::atomic(key, entity));

        if inside_block {
            self.pending = Some(Pending {
                after_atomic: true,
                ..Pending::default()
            });
        }
    }

    fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !(pending.after_atomic && pending.is_blank()) {
                self.push_text_block(pending);
            }
        }
    }

    fn push_text_block(&mut self, pending: Pending) {
        let key = self.next_key();
        tracing::trace!(target: "composer::html", %key, chars = pending.chars, "text block");
        self.blocks
            .push(Block::text_with_ranges(key, pending.text, pending.ranges));
    }

    fn finish(mut self) -> Result<ContentModel> {
        self.flush();
        ContentModel::from_blocks(self.blocks, self.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn image_doc() -> ContentModel {
        let mut entities = EntityStore::new();
        let link = entities.insert(EntityData::Link(
            LinkData::new("https://example.com/?a=1&b=2").with_target("_blank"),
        ));
        let image = entities.insert(EntityData::Image(
            ImageData::new("http://x/img.png", "a \"cat\"").with_width("75%"),
        ));
        ContentModel::from_blocks(
            vec![
                Block::text_with_ranges(
                    BlockKey::new("a"),
                    "see <docs>\nnext",
                    [EntityRange::new(4, 10, link)],
                ),
                Block::atomic(BlockKey::new("b"), image),
                Block::text(BlockKey::new("c"), ""),
            ],
            entities,
        )
        .unwrap()
    }

    #[test]
    fn test_to_html() {
        insta::assert_snapshot!(to_html(&image_doc()), @r#"
        <p>see <a href="https://example.com/?a=1&amp;b=2" target="_blank">&lt;docs&gt;</a><br>next</p>
        <figure><img src="http://x/img.png" width="75%" height="auto" alt="a &quot;cat&quot;"></figure>
        <p></p>
        "#);
    }

    #[test]
    fn test_round_trip_is_semantic() {
        let content = image_doc();
        let parsed = try_from_html(&to_html(&content)).unwrap();
        assert_eq!(parsed, content);
    }

    #[test]
    fn test_round_trip_preserves_tabs() {
        let content = ContentModel::from_text("a\tb");
        assert_eq!(try_from_html(&to_html(&content)).unwrap(), content);
    }

    #[test]
    fn test_empty_input_is_empty_document() {
        for input in ["", "   \n  ", "<!-- nothing -->"] {
            let content = try_from_html(input).unwrap();
            assert_eq!(content, ContentModel::empty(), "input: {input:?}");
        }
    }

    #[test]
    fn test_malformed_degrades_to_empty() {
        assert!(try_from_html("<p>hello <a href=\"x\"").is_err());
        assert!(try_from_html("<p>hi</p><!-- open").is_err());
        assert!(try_from_html("<script>alert(1)").is_err());
        assert_eq!(from_html("<p>hello <a href=\"x\""), ContentModel::empty());
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let content = try_from_html("<p>1 < 2</p>").unwrap();
        assert_eq!(content.plain_text(), "1 < 2");
    }

    #[test]
    fn test_parse_lenient_markup() {
        let html = r#"
            <div>
              <h2>Title</h2>
              <p>Some <b>bold</b> and <a href='https://a.example'>link</a>&nbsp;text</p>
              <script>ignored()</script>
              <ul><li>one</li><li>two</li></ul>
            </div>
        "#;
        let content = try_from_html(html).unwrap();
        let texts: Vec<_> = content.blocks().map(|b| b.text_str().to_string()).collect();
        assert_eq!(texts, vec!["Title", "Some bold and link\u{a0}text", "one", "two"]);

        let para = content.block_at(1).unwrap();
        let range = para.entity_ranges()[0];
        assert_eq!(para.slice(range.to_range()), "link");
        let link = content.entity(range.entity).unwrap().data.as_link().unwrap();
        assert_eq!(link.url, "https://a.example");
        assert_eq!(link.target, None);
    }

    #[test]
    fn test_image_splits_paragraph() {
        let content = try_from_html(r#"<p>before<img src="http://x/a.png" alt="a">after</p>"#).unwrap();
        let kinds: Vec<_> = content.blocks().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec![BlockKind::Text, BlockKind::Atomic, BlockKind::Text]);
        assert_eq!(content.plain_text(), "before\n\nafter");

        let image = content.block_at(1).unwrap().atomic_entity().unwrap();
        let data = content.entity(image).unwrap().data.as_image().unwrap();
        assert_eq!(data.width, "100%");
        assert_eq!(data.height, "auto");
    }

    #[test]
    fn test_image_without_src_is_dropped() {
        let content = try_from_html(r#"<p>x<img alt="nothing"></p>"#).unwrap();
        assert_eq!(content.block_count(), 1);
        assert_eq!(content.plain_text(), "x");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let html = r#"<p>a <a href="mailto:x@example.com" target="_self">mail</a></p>
<figure><img src="http://x/img.png" width="50%" height="240px" alt="cat"></figure>
<p>tail<br>line</p>"#;
        let once = try_from_html(html).unwrap();
        let twice = try_from_html(&to_html(&once)).unwrap();
        assert_eq!(once, twice);
        insta::assert_snapshot!(to_html(&twice), @r#"
        <p>a <a href="mailto:x@example.com" target="_self">mail</a></p>
        <figure><img src="http://x/img.png" width="50%" height="240px" alt="cat"></figure>
        <p>tail<br>line</p>
        "#);
    }

    #[test]
    fn test_decode_char_refs() {
        assert_eq!(decode_char_refs("a &amp; b &#60; &#x3E; &bogus;"), "a & b < > &bogus;");
    }
}
