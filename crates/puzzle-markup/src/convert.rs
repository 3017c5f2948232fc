//! HTML to Markdown conversion for puzzle pages.
//!
//! The dialect is closed: only the tags in [`Tag`] are rendered, anything else
//! aborts the conversion with [`ConvertError::UnsupportedMarkup`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{ConvertError, Result};
use crate::node::MarkupNode;

#[allow(clippy::expect_used)]
static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*: (.*) ---").expect("title pattern is valid"));

/// Converted page: the puzzle title and the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub title: String,
    pub body: String,
}

/// Tags the dialect knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Heading,
    Paragraph,
    Emphasis,
    Code,
    Span,
    Strikethrough,
    UnorderedList,
    ListItem,
    Preformatted,
    Link,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name.to_ascii_lowercase().as_str() {
            "h2" => Self::Heading,
            "p" => Self::Paragraph,
            "em" => Self::Emphasis,
            "code" => Self::Code,
            "span" => Self::Span,
            "s" => Self::Strikethrough,
            "ul" => Self::UnorderedList,
            "li" => Self::ListItem,
            "pre" => Self::Preformatted,
            "a" => Self::Link,
            _ => return None,
        };
        Some(tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Heading => "h2",
            Self::Paragraph => "p",
            Self::Emphasis => "em",
            Self::Code => "code",
            Self::Span => "span",
            Self::Strikethrough => "s",
            Self::UnorderedList => "ul",
            Self::ListItem => "li",
            Self::Preformatted => "pre",
            Self::Link => "a",
        }
    }
}

/// State threaded through one level of recursion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Tag of the node whose children are being rendered.
    pub parent: Option<Tag>,
    /// Joins sibling renderings.
    pub separator: &'a str,
}

impl RenderContext<'_> {
    fn inside(self, parent: Tag) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }
}

/// How a code fence is closed once a `pre` block has been rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceClose {
    /// Last emitted text ended with a newline.
    Fresh,
    NeedsNewline,
}

impl FenceClose {
    fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "```\n",
            Self::NeedsNewline => "\n```\n",
        }
    }
}

/// Parses `html` and converts it; see [`convert`].
pub fn convert_html(html: &str, source_url: &str) -> Result<ConversionResult> {
    let document = MarkupNode::parse_document(html);
    convert(&document, source_url)
}

/// Converts a puzzle page into its title and Markdown body.
///
/// The document must contain at least one `article` and one `h2`. Each
/// top-level `article` is rendered in document order after an attribution line
/// pointing at `source_url`.
#[instrument(name = "puzzle_markup.convert", skip(document))]
pub fn convert(document: &MarkupNode, source_url: &str) -> Result<ConversionResult> {
    let articles = top_level_articles(document);
    if articles.is_empty() {
        return Err(ConvertError::StructuralMismatch { missing: "article" });
    }
    let heading = document
        .descendants()
        .find(|node| node.is_element(Tag::Heading.name()))
        .ok_or(ConvertError::StructuralMismatch { missing: "h2" })?;

    let mut body = format!("original source: [{source_url}]({source_url})\n\n");
    let context = RenderContext::default();
    for (index, article) in articles.iter().enumerate() {
        let rendered = render_children(article, context)?;
        debug!(index, bytes = rendered.len(), "rendered article");
        body.push_str(&rendered);
        body.push('\n');
    }

    let title = extract_title(&decode_entities(&heading.text_content()));
    debug!(title = %title, "extracted puzzle title");

    Ok(ConversionResult { title, body })
}

/// Pulls `Foo` out of headings shaped like `--- Day 5: Foo ---`.
///
/// Headings that do not match are returned unchanged.
pub fn extract_title(heading: &str) -> String {
    TITLE_PATTERN
        .captures(heading)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| heading.to_string(), |m| m.as_str().to_string())
}

/// Renders the children of `node`, joined with `context.separator`.
///
/// `context.parent` must already name `node`'s tag.
pub fn render_children(node: &MarkupNode, context: RenderContext<'_>) -> Result<String> {
    let mut rendered = Vec::with_capacity(node.children().len());
    for child in node.children() {
        rendered.push(render_node(child, context)?);
    }
    Ok(rendered.join(context.separator))
}

/// Renders a single node; `context.parent` is the tag of its parent.
pub fn render_node(node: &MarkupNode, context: RenderContext<'_>) -> Result<String> {
    let element = match node {
        MarkupNode::Text(raw) => return Ok(decode_entities(raw)),
        MarkupNode::Comment(_) => return Err(unsupported(node)),
        MarkupNode::Element(element) => element,
    };

    let Some(tag) = Tag::from_name(&element.tag) else {
        return Err(unsupported(node));
    };
    let inner = context.inside(tag);

    let rendered = match tag {
        Tag::Heading => format!("## {}\n", render_children(node, inner)?),
        Tag::Paragraph => format!("{}\n", render_children(node, inner)?),
        Tag::Emphasis => format!("*{}*", render_children(node, inner)?),
        Tag::Code if context.parent == Some(Tag::Preformatted) => render_children(node, inner)?,
        Tag::Code => format!("`{}`", render_children(node, inner)?),
        Tag::Span | Tag::UnorderedList => render_children(node, inner)?,
        Tag::Strikethrough => format!("~~{}~~", render_children(node, inner)?),
        Tag::ListItem => format!(" - {}", render_children(node, inner)?),
        Tag::Preformatted => render_preformatted(node, inner)?,
        Tag::Link => {
            let href = node
                .attribute("href")
                .ok_or(ConvertError::MissingAttribute {
                    tag: Tag::Link.name(),
                    attribute: "href",
                })?;
            format!("[{}]({href})", render_children(node, inner)?)
        }
    };
    Ok(rendered)
}

fn render_preformatted(node: &MarkupNode, context: RenderContext<'_>) -> Result<String> {
    let mut out = String::from("```\n");
    let mut fresh_line = true;

    for child in node.children() {
        let fragment = render_node(child, context)?;
        if let Some(last) = fragment.chars().last() {
            fresh_line = last == '\n';
        }
        out.push_str(&fragment);
    }

    let close = if fresh_line {
        FenceClose::Fresh
    } else {
        FenceClose::NeedsNewline
    };
    out.push_str(close.as_str());
    Ok(out)
}

/// Collects `article` elements that are not nested in another `article`.
fn top_level_articles(root: &MarkupNode) -> Vec<&MarkupNode> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_element("article") {
            found.push(node);
            continue;
        }
        stack.extend(node.children().iter().rev());
    }
    found
}

fn decode_entities(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

fn unsupported(node: &MarkupNode) -> ConvertError {
    let tag = node.tag_name().to_string();
    warn!(tag = %tag, "refusing to convert unsupported markup");
    ConvertError::UnsupportedMarkup {
        tag,
        inner_html: node.inner_html(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, children: Vec<MarkupNode>) -> MarkupNode {
        MarkupNode::element(tag, children)
    }

    fn text(raw: &str) -> MarkupNode {
        MarkupNode::text(raw)
    }

    fn render(node: &MarkupNode) -> Result<String> {
        render_node(node, RenderContext::default())
    }

    fn page(article_children: Vec<MarkupNode>) -> MarkupNode {
        el(
            "html",
            vec![el(
                "body",
                vec![el(
                    "main",
                    vec![el("article", article_children)],
                )],
            )],
        )
    }

    #[test]
    fn heading_and_paragraph_end_with_newline() {
        assert_eq!(render(&el("h2", vec![text("Title")])).unwrap(), "## Title\n");
        assert_eq!(render(&el("p", vec![text("Body")])).unwrap(), "Body\n");
    }

    #[test]
    fn nested_emphasis_wraps_each_level() {
        let node = el("em", vec![text("a"), el("em", vec![text("b")])]);
        assert_eq!(render(&node).unwrap(), "*a*b**");
    }

    #[test]
    fn inline_code_gets_backticks_outside_pre() {
        let node = el("p", vec![text("run "), el("code", vec![text("cargo")])]);
        assert_eq!(render(&node).unwrap(), "run `cargo`\n");
    }

    #[test]
    fn code_directly_inside_pre_is_verbatim() {
        let node = el("pre", vec![el("code", vec![text("a\nb\n")])]);
        assert_eq!(render(&node).unwrap(), "```\na\nb\n```\n");
    }

    #[test]
    fn code_nested_deeper_in_pre_keeps_backticks() {
        let node = el("pre", vec![el("span", vec![el("code", vec![text("x")])])]);
        assert_eq!(render(&node).unwrap(), "```\n`x`\n```\n");
    }

    #[test]
    fn pre_without_trailing_newline_gets_one_before_fence() {
        let node = el("pre", vec![el("code", vec![text("0 3 0 1 -3")])]);
        assert_eq!(render(&node).unwrap(), "```\n0 3 0 1 -3\n```\n");
    }

    #[test]
    fn pre_tracks_only_the_last_fragment() {
        let node = el(
            "pre",
            vec![text("line\n"), el("em", vec![text("tail")])],
        );
        assert_eq!(render(&node).unwrap(), "```\nline\n*tail*\n```\n");

        let node = el("pre", vec![text("head"), text("line\n")]);
        assert_eq!(render(&node).unwrap(), "```\nheadline\n```\n");
    }

    #[test]
    fn empty_fragments_do_not_reset_newline_tracking() {
        let node = el("pre", vec![text("line\n"), el("span", vec![])]);
        assert_eq!(render(&node).unwrap(), "```\nline\n```\n");
    }

    #[test]
    fn empty_pre_still_has_both_fences() {
        assert_eq!(render(&el("pre", vec![])).unwrap(), "```\n```\n");
    }

    #[test]
    fn list_items_are_flattened() {
        let node = el(
            "ul",
            vec![el("li", vec![text("x")]), el("li", vec![text("y")])],
        );
        assert_eq!(render(&node).unwrap(), " - x - y");
    }

    #[test]
    fn strikethrough_and_span() {
        let node = el(
            "p",
            vec![
                el("s", vec![text("old")]),
                el("span", vec![text(" new")]),
            ],
        );
        assert_eq!(render(&node).unwrap(), "~~old~~ new\n");
    }

    #[test]
    fn link_uses_href() {
        let node = el("a", vec![text("input")]).with_attribute("href", "5/input");
        assert_eq!(render(&node).unwrap(), "[input](5/input)");
    }

    #[test]
    fn link_without_href_is_rejected() {
        let node = el("a", vec![text("input")]);
        assert_eq!(
            render(&node),
            Err(ConvertError::MissingAttribute {
                tag: "a",
                attribute: "href"
            })
        );
    }

    #[test]
    fn text_is_entity_decoded() {
        assert_eq!(render(&text("Fish &amp; Chips &#62; 2")).unwrap(), "Fish & Chips > 2");
    }

    #[test]
    fn unknown_tag_carries_inner_html() {
        let node = el("table", vec![el("tr", vec![el("td", vec![text("1")])])]);
        assert_eq!(
            render(&node),
            Err(ConvertError::UnsupportedMarkup {
                tag: "table".to_string(),
                inner_html: "<tr><td>1</td></tr>".to_string(),
            })
        );
    }

    #[test]
    fn comments_are_unsupported() {
        let node = el("p", vec![MarkupNode::Comment(" hidden ".to_string())]);
        assert!(matches!(
            render(&node),
            Err(ConvertError::UnsupportedMarkup { tag, .. }) if tag == "#comment"
        ));
    }

    #[test]
    fn convert_requires_article() {
        let document = el("html", vec![el("h2", vec![text("--- Day 1: X ---")])]);
        assert_eq!(
            convert(&document, "https://example.com"),
            Err(ConvertError::StructuralMismatch { missing: "article" })
        );
    }

    #[test]
    fn convert_requires_heading() {
        let document = page(vec![el("p", vec![text("no heading")])]);
        assert_eq!(
            convert(&document, "https://example.com"),
            Err(ConvertError::StructuralMismatch { missing: "h2" })
        );
    }

    #[test]
    fn convert_writes_attribution_and_articles() {
        let document = page(vec![
            el("h2", vec![text("--- Day 2: Corruption Checksum ---")]),
            el("p", vec![text("Rows &amp; columns.")]),
        ]);
        let result = convert(&document, "https://adventofcode.com/2017/day/2").unwrap();
        assert_eq!(result.title, "Corruption Checksum");
        assert_eq!(
            result.body,
            "original source: [https://adventofcode.com/2017/day/2](https://adventofcode.com/2017/day/2)\n\n\
             ## --- Day 2: Corruption Checksum ---\n\
             Rows & columns.\n\
             \n"
        );
    }

    #[test]
    fn nested_article_is_unsupported_markup() {
        let document = page(vec![
            el("h2", vec![text("Outer")]),
            el("article", vec![el("p", vec![text("inner")])]),
        ]);
        assert!(matches!(
            convert(&document, "u"),
            Err(ConvertError::UnsupportedMarkup { tag, .. }) if tag == "article"
        ));
    }

    #[test]
    fn title_pattern() {
        assert_eq!(
            extract_title("--- Day 5: A Maze of Twisty Trampolines, All Alike ---"),
            "A Maze of Twisty Trampolines, All Alike"
        );
        assert_eq!(extract_title("Part Two"), "Part Two");
        assert_eq!(extract_title("--- Part Two ---"), "--- Part Two ---");
    }

    #[test]
    fn tag_names_round_trip() {
        for name in ["h2", "p", "em", "code", "span", "s", "ul", "li", "pre", "a"] {
            let tag = Tag::from_name(name).unwrap();
            assert_eq!(tag.name(), name);
        }
        assert_eq!(Tag::from_name("PRE"), Some(Tag::Preformatted));
        assert_eq!(Tag::from_name("table"), None);
    }
}
