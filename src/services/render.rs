// src/services/render.rs

//! Standalone HTML rendering of XenForo message bodies.
//!
//! The body is re-serialized node by node. Quotes and spoilers are flattened
//! into plain markup, images point at the local image cache, and presentation
//! wrappers are unwrapped unless they carry a color.

use std::sync::LazyLock;

use scraper::{ElementRef, Node, Selector};

use crate::services::parser::RenderContext;
use crate::utils::resolve_url;

/// `src` written for images the cache could not provide.
pub const IMAGE_CACHE_MISS: &str = "#image-cache-miss";

const DROPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "iframe", "button"];
const DROPPED_CLASSES: &[&str] = &["bbCodeBlock-expandLink", "js-selectToQuoteEnd"];
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];
const KEPT_ATTRS: &[&str] = &["href", "alt", "title", "colspan", "rowspan", "style"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

static EXPAND_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| selector("div.bbCodeBlock-expandContent"));
static SPOILER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("span.bbCodeSpoiler-button-title"));
static SPOILER_CONTENT: LazyLock<Selector> = LazyLock::new(|| selector("div.bbCodeBlock-content"));

/// Escape text for use in HTML content or a double-quoted attribute.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Section heading for a post; the author is named only when they are not
/// the story's author.
pub fn post_heading(category_name: &str, title: &str, author: &str, story_author: &str) -> String {
    if author.is_empty() || author == story_author {
        format!("{category_name}: {title}")
    } else {
        format!("{category_name}: {title} (by {author})")
    }
}

/// Source an `<img>` actually loads from, before resolution.
pub fn raw_image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let element = img.value();
    let src = element.attr("src").filter(|s| !s.starts_with("data:"));
    element
        .attr("data-src")
        .or(src)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Render a complete document around a message body.
pub fn render_document(
    body: Option<ElementRef<'_>>,
    title: &str,
    heading: &str,
    ctx: &RenderContext<'_>,
) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!("<h2>{}</h2>\n", html_escape(heading)));
    if let Some(body) = body {
        render_children(body, ctx, &mut out);
        out.push('\n');
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn parent_is(el: ElementRef<'_>, tag: &str) -> bool {
    el.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| p.value().name() == tag)
}

fn render_children(el: ElementRef<'_>, ctx: &RenderContext<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&html_escape(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, ctx, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(el: ElementRef<'_>, ctx: &RenderContext<'_>, out: &mut String) {
    let name = el.value().name();
    if DROPPED_TAGS.contains(&name) || DROPPED_CLASSES.iter().any(|c| has_class(el, c)) {
        return;
    }

    match name {
        "div" if has_class(el, "bbCodeSpoiler") => render_spoiler(el, ctx, out),
        "div" if has_class(el, "bbCodeBlock-title") && parent_is(el, "blockquote") => {
            out.push_str("<b>");
            render_children(el, ctx, out);
            out.push_str("</b>");
        }
        "div" if has_class(el, "bbCodeBlock-content") && parent_is(el, "blockquote") => {
            let inner = el.select(&EXPAND_CONTENT).next().unwrap_or(el);
            out.push_str("<p>");
            render_children(inner, ctx, out);
            out.push_str("</p><hr>");
        }
        "span" if !carries_color(el) => render_children(el, ctx, out),
        "img" => render_image(el, ctx, out),
        _ => {
            open_tag(el, ctx, out);
            if !VOID_TAGS.contains(&name) {
                render_children(el, ctx, out);
                out.push_str(&format!("</{name}>"));
            }
        }
    }
}

fn carries_color(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("style")
        .is_some_and(|s| s.to_ascii_lowercase().contains("color"))
}

fn open_tag(el: ElementRef<'_>, ctx: &RenderContext<'_>, out: &mut String) {
    let element = el.value();
    out.push('<');
    out.push_str(element.name());
    for (attr, value) in element.attrs() {
        if !KEPT_ATTRS.contains(&attr) {
            continue;
        }
        let value = if attr == "href" {
            resolve_url(ctx.page_url, value)
        } else {
            value.to_string()
        };
        out.push_str(&format!(" {attr}=\"{}\"", html_escape(&value)));
    }
    out.push('>');
}

fn render_image(el: ElementRef<'_>, ctx: &RenderContext<'_>, out: &mut String) {
    let source = raw_image_source(el).map(|src| resolve_url(ctx.page_url, src));
    let local = source
        .as_ref()
        .and_then(|src| ctx.images.get(src))
        .and_then(|path| path.as_ref());

    out.push_str("<img");
    match (local, &source) {
        (Some(path), _) => {
            out.push_str(&format!(
                " src=\"{}\"",
                html_escape(&path.to_string_lossy())
            ));
        }
        (None, Some(src)) => {
            out.push_str(&format!(
                " src=\"{IMAGE_CACHE_MISS}\" data-src=\"{}\"",
                html_escape(src)
            ));
        }
        (None, None) => {
            if let Some(src) = el.value().attr("src") {
                out.push_str(&format!(" src=\"{}\"", html_escape(src)));
            }
        }
    }
    if let Some(alt) = el.value().attr("alt") {
        out.push_str(&format!(" alt=\"{}\"", html_escape(alt)));
    }
    out.push('>');
}

fn render_spoiler(el: ElementRef<'_>, ctx: &RenderContext<'_>, out: &mut String) {
    let title = el
        .select(&SPOILER_TITLE)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let title = title.trim().trim_start_matches(':').trim();

    out.push_str("<blockquote><hr>");
    if title.is_empty() {
        out.push_str("<b>Spoiler</b>");
    } else {
        out.push_str(&format!("<b>Spoiler: {}</b>", html_escape(title)));
    }
    if let Some(content) = el.select(&SPOILER_CONTENT).next() {
        out.push_str("<div>");
        render_children(content, ctx, out);
        out.push_str("</div>");
    }
    out.push_str("<hr></blockquote>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use url::Url;

    fn render(body_html: &str, images: &HashMap<String, Option<PathBuf>>) -> String {
        let page_url = Url::parse("https://forum.example/threads/s.1/reader/").unwrap();
        let ctx = RenderContext {
            page_url: &page_url,
            category_name: "Threadmarks",
            story_author: "Writer",
            images,
        };
        let html = Html::parse_fragment(&format!("<div class=\"bbWrapper\">{body_html}</div>"));
        let wrapper = selector("div.bbWrapper");
        let body = html.select(&wrapper).next();
        render_document(body, "Chapter 1", "Threadmarks: Chapter 1", &ctx)
    }

    #[test]
    fn test_heading_names_guest_author() {
        assert_eq!(
            post_heading("Threadmarks", "Ch 1", "Writer", "Writer"),
            "Threadmarks: Ch 1"
        );
        assert_eq!(
            post_heading("Sidestory", "Omake", "Fan", "Writer"),
            "Sidestory: Omake (by Fan)"
        );
    }

    #[test]
    fn test_document_shell() {
        let out = render("Hello &amp; welcome", &HashMap::new());
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<title>Chapter 1</title>"));
        assert!(out.contains("<h2>Threadmarks: Chapter 1</h2>"));
        assert!(out.contains("Hello &amp; welcome"));
    }

    #[test]
    fn test_quote_is_flattened() {
        let quote = r#"<blockquote class="bbCodeBlock bbCodeBlock--quote">
            <div class="bbCodeBlock-title"><a href="/goto/post?id=9">Bob said:</a></div>
            <div class="bbCodeBlock-content">
                <div class="bbCodeBlock-expandContent js-expandContent">Quoted words</div>
                <div class="bbCodeBlock-expandLink"><a>Click to expand...</a></div>
            </div></blockquote>"#;
        let out = render(quote, &HashMap::new());

        assert!(out.contains("<b><a href=\"https://forum.example/goto/post?id=9\">Bob said:</a></b>"));
        assert!(out.contains("<p>Quoted words</p><hr>"));
        assert!(!out.contains("Click to expand"));
        assert!(!out.contains("bbCodeBlock"));
    }

    #[test]
    fn test_spoiler_becomes_blockquote() {
        let spoiler = r#"<div class="bbCodeSpoiler">
            <button class="bbCodeSpoiler-button"><span class="button-text"><span>Spoiler<span class="bbCodeSpoiler-button-title">: Secret</span></span></span></button>
            <div class="bbCodeSpoiler-content"><div class="bbCodeBlock bbCodeBlock--spoiler"><div class="bbCodeBlock-content">Hidden text</div></div></div>
            </div>"#;
        let out = render(spoiler, &HashMap::new());

        assert!(out.contains("<blockquote><hr><b>Spoiler: Secret</b><div>Hidden text</div><hr></blockquote>"));
        assert!(!out.contains("<button"));
    }

    #[test]
    fn test_spans_unwrapped_unless_colored() {
        let out = render(
            r#"<span class="u-plain">plain</span> <span style="color: #ff0000">red</span>"#,
            &HashMap::new(),
        );
        assert!(out.contains("plain <span style=\"color: #ff0000\">red</span>"));
        assert!(!out.contains("u-plain"));
    }

    #[test]
    fn test_images_point_at_cache() {
        let mut images = HashMap::new();
        images.insert(
            "https://forum.example/attachments/a.png".to_string(),
            Some(PathBuf::from("cache/site-x/images/abc.png")),
        );
        images.insert("https://img.example/gone.png".to_string(), None);

        let out = render(
            r#"<img src="/attachments/a.png" alt="A" class="bbImage"><img src="https://img.example/gone.png">"#,
            &images,
        );

        assert!(out.contains("<img src=\"cache/site-x/images/abc.png\" alt=\"A\">"));
        assert!(out.contains(
            "<img src=\"#image-cache-miss\" data-src=\"https://img.example/gone.png\">"
        ));
    }

    #[test]
    fn test_scripts_dropped() {
        let out = render("<p>a<script>alert(1)</script>b</p><br>", &HashMap::new());
        assert!(out.contains("<p>ab</p><br>"));
    }
}
