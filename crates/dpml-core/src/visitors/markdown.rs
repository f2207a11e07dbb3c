/*
 * visitors/markdown.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Markdown rendering of text content.
 */

//! Markdown content.
//!
//! Content that looks like Markdown is rendered to HTML with comrak. Plain
//! prose is left alone. The heuristics are a [`RegexSet`] over common
//! constructs: headings, emphasis, links, images, lists, code, tables and
//! blockquotes.
//!
//! When the text already contains HTML tags, only the text between tags is
//! rendered, so markup the author wrote by hand survives. Rendered output
//! is sanitized by removing `script`, `style`, `iframe`, `object` and
//! `embed` elements.

use std::sync::LazyLock;

use async_trait::async_trait;
use comrak::{Options, markdown_to_html};
use regex::{Regex, RegexSet};

use super::MARKDOWN_PRIORITY;
use crate::ast::Content;
use crate::context::ProcessingContext;
use crate::error::Result;
use crate::visitor::{ContentVisitor, Visitor};

static MARKDOWN_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?m)^\s{0,3}#{1,6}\s+\S",                // heading
        r"\*\*[^*\n]+\*\*|__[^_\n]+__",            // strong
        r"(?:^|[^\w*])\*[^*\s][^*\n]*\*",          // emphasis
        r"(?:^|[^\w_])_[^_\s][^_\n]*_(?:[^\w_]|$)", // emphasis
        r"~~[^~\n]+~~",                            // strikethrough
        r"!\[[^\]\n]*\]\([^)\n]*\)",               // image
        r"\[[^\]\n]+\]\([^)\n]+\)",                // link
        r"(?m)^\s{0,3}(?:[-*+]|\d+[.)])\s+\S",     // list item
        r"(?m)^\s{0,3}(?:```|~~~)",                // fenced code
        r"`[^`\n]+`",                              // inline code
        r"(?m)^\s*\|.*\|\s*$",                     // table row
        r"(?m)^\s{0,3}>",                          // blockquote
    ])
    .expect("Invalid regex patterns for markdown detection")
});

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*)?/?>").expect("Invalid regex pattern for HTML tags")
});

static UNSAFE_ELEMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "iframe", "object", "embed"]
        .iter()
        .flat_map(|tag| {
            [
                // paired element with its body
                format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"),
                // stray opening, closing or self-closing tag
                format!(r"(?i)</?{tag}\b[^>]*>"),
            ]
        })
        .map(|pattern| Regex::new(&pattern).expect("Invalid regex pattern for sanitizer"))
        .collect()
});

/// Removal may expose new matches, e.g. `<scr<script></script>ipt>`.
const MAX_SANITIZE_PASSES: usize = 5;

pub fn looks_like_markdown(text: &str) -> bool {
    MARKDOWN_PATTERNS.is_match(text)
}

/// Remove unsafe elements, repeating until nothing changes or the pass
/// limit is reached.
pub fn sanitize_html(html: &str) -> String {
    let mut current = html.to_string();
    for _ in 0..MAX_SANITIZE_PASSES {
        let mut next = current.clone();
        for pattern in UNSAFE_ELEMENTS.iter() {
            next = pattern.replace_all(&next, "").into_owned();
        }
        if next == current {
            break;
        }
        current = next;
    }
    current
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownOptions {
    pub sanitize: bool,
    /// Render single newlines as `<br>`.
    pub line_breaks: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            line_breaks: false,
        }
    }
}

/// Renders Markdown-looking [`Content`] to HTML.
#[derive(Debug, Clone, Default)]
pub struct MarkdownContentVisitor {
    options: MarkdownOptions,
}

impl MarkdownContentVisitor {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    fn render_markdown(&self, text: &str) -> String {
        let mut options = Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.render.hardbreaks = self.options.line_breaks;
        // Raw HTML passes through; the sanitizer handles unsafe elements.
        options.render.r#unsafe = true;
        markdown_to_html(text, &options)
    }

    /// Render the text between HTML tags, keeping the tags as written.
    fn render_around_html(&self, text: &str) -> String {
        let mut output = String::with_capacity(text.len() * 2);
        let mut cursor = 0;
        for tag in HTML_TAG.find_iter(text) {
            output.push_str(&self.render_segment(&text[cursor..tag.start()]));
            output.push_str(tag.as_str());
            cursor = tag.end();
        }
        output.push_str(&self.render_segment(&text[cursor..]));
        output
    }

    /// Render one text segment found between tags. A single-line segment
    /// is unwrapped from its paragraph so it stays inline.
    fn render_segment(&self, segment: &str) -> String {
        let body = segment.trim();
        if body.is_empty() || !looks_like_markdown(body) {
            return segment.to_string();
        }
        let html = self.render_markdown(body);
        if !body.contains('\n')
            && let Some(inner) = html
                .trim_end()
                .strip_prefix("<p>")
                .and_then(|rest| rest.strip_suffix("</p>"))
            && !inner.contains("<p>")
        {
            let leading = &segment[..segment.len() - segment.trim_start().len()];
            let trailing = &segment[segment.trim_end().len()..];
            return format!("{}{}{}", leading, inner, trailing);
        }
        html
    }

    pub fn render(&self, text: &str) -> String {
        let html = if HTML_TAG.is_match(text) {
            self.render_around_html(text)
        } else {
            self.render_markdown(text)
        };
        if self.options.sanitize {
            sanitize_html(&html)
        } else {
            html
        }
    }
}

impl Visitor for MarkdownContentVisitor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn priority(&self) -> i32 {
        MARKDOWN_PRIORITY
    }

    fn as_content_visitor(&self) -> Option<&dyn ContentVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ContentVisitor for MarkdownContentVisitor {
    async fn visit_content(
        &self,
        content: &Content,
        _ctx: &mut ProcessingContext,
    ) -> Result<Option<Content>> {
        if !looks_like_markdown(&content.value) {
            return Ok(None);
        }

        let html = self.render(&content.value);
        Ok(Some(Content {
            value: html,
            span: content.span,
            original_markdown: content
                .original_markdown
                .clone()
                .or_else(|| Some(content.value.clone())),
        }))
    }
}
