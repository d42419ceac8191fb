//! Markdown → HTML rendering for catalog content.
//!
//! Bodies are parsed with `pulldown-cmark` (tables, strikethrough, task
//! lists, footnotes) and the event stream is rewritten before serialization:
//!
//! - Images that sit directly inside a paragraph get catalog-relative URLs
//!   (`/catalog/<dir>/<url>`). URLs with a scheme or starting with `//`
//!   are kept.
//! - Bare `http://` / `https://` URLs in text become links.
//! - `:shortcode:` emoji are substituted in text outside code and links.
//!
//! Input is trusted; raw HTML passes through untouched.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme regex"));
static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s<>]+").expect("url regex"));
static SHORTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([a-z0-9_+\-]+):").expect("shortcode regex"));

/// Render a markdown body that lives in catalog directory `dir`.
pub fn render_markdown(body: &str, dir: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let events = coalesce_text(Parser::new_ext(body, options));
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    // Open container tags, innermost last.
    let mut stack: Vec<Tag<'_>> = Vec::new();

    for event in events {
        match event {
            Event::Start(tag) => {
                let tag = match tag {
                    Tag::Image {
                        link_type,
                        dest_url,
                        title,
                        id,
                    } if matches!(stack.last(), Some(Tag::Paragraph)) => Tag::Image {
                        link_type,
                        dest_url: rewrite_image_url(dir, dest_url),
                        title,
                        id,
                    },
                    other => other,
                };
                stack.push(tag.clone());
                out.push(Event::Start(tag));
            }
            Event::End(end) => {
                stack.pop();
                out.push(Event::End(end));
            }
            Event::Text(text) => {
                let literal = stack.iter().any(|t| {
                    matches!(
                        t,
                        Tag::CodeBlock(_) | Tag::Link { .. } | Tag::Image { .. }
                    )
                });
                if literal {
                    out.push(Event::Text(text));
                } else {
                    push_text(&mut out, &text);
                }
            }
            other => out.push(other),
        }
    }

    let mut html_out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut html_out, out.into_iter());
    html_out.trim().to_string()
}

/// Merge adjacent text events; the parser splits text at special characters.
fn coalesce_text<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut merged: Vec<Event<'a>> = Vec::new();
    for event in events {
        if let Event::Text(next) = &event {
            if let Some(Event::Text(prev)) = merged.last_mut() {
                let joined = format!("{}{}", prev, next);
                *prev = CowStr::from(joined);
                continue;
            }
        }
        merged.push(event);
    }
    merged
}

/// Emit `text` with bare URLs turned into links and shortcodes replaced.
fn push_text<'a>(out: &mut Vec<Event<'a>>, text: &str) {
    let mut cursor = 0;
    for m in BARE_URL.find_iter(text) {
        let url = trim_url(m.as_str());
        if url.len() <= "https://".len() {
            continue;
        }
        let start = m.start();
        if start > cursor {
            out.push(Event::Text(CowStr::from(replace_shortcodes(
                &text[cursor..start],
            ))));
        }
        let url = url.to_string();
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(url.clone()),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(url.clone())));
        out.push(Event::End(TagEnd::Link));
        cursor = start + url.len();
    }
    if cursor < text.len() {
        out.push(Event::Text(CowStr::from(replace_shortcodes(
            &text[cursor..],
        ))));
    }
}

/// Drop trailing punctuation that ends a sentence rather than the URL.
fn trim_url(url: &str) -> &str {
    let mut end = url.len();
    loop {
        let candidate = &url[..end];
        let Some(last) = candidate.chars().last() else {
            break;
        };
        let strip = match last {
            '.' | ',' | ':' | ';' | '!' | '?' | '\'' | '"' | '*' | '_' | '~' => true,
            ')' => candidate.matches(')').count() > candidate.matches('(').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}

/// Replace known `:shortcode:` sequences with their emoji.
pub fn replace_shortcodes(text: &str) -> String {
    SHORTCODE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match emojis::get_by_shortcode(&caps[1]) {
                Some(emoji) => emoji.as_str().to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn rewrite_image_url<'a>(dir: &str, url: CowStr<'a>) -> CowStr<'a> {
    if url.is_empty() || url.starts_with("//") || SCHEME.is_match(&url) {
        return url;
    }
    CowStr::from(catalog_url(dir, &url))
}

/// Join `url` onto `/catalog/<dir>` and collapse `.` / `..` segments.
///
/// Query strings and fragments are carried over untouched.
pub fn catalog_url(dir: &str, url: &str) -> String {
    let split = url.find(['?', '#']).unwrap_or(url.len());
    let (path, suffix) = url.split_at(split);

    let mut segments: Vec<&str> = Vec::new();
    for segment in ["catalog"]
        .into_iter()
        .chain(dir.split('/'))
        .chain(path.split('/'))
    {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}{}", segments.join("/"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_url_normalization() {
        assert_eq!(
            catalog_url("/domains/Orders", "img.png"),
            "/catalog/domains/Orders/img.png"
        );
        assert_eq!(
            catalog_url("/domains/Orders", "./assets/../img.png"),
            "/catalog/domains/Orders/img.png"
        );
        assert_eq!(
            catalog_url("/domains/Orders/events/E", "../../shared/x.svg?v=2"),
            "/catalog/domains/Orders/shared/x.svg?v=2"
        );
        assert_eq!(
            catalog_url("/owners/a@x.io", "/avatar.png"),
            "/catalog/owners/a@x.io/avatar.png"
        );
    }

    #[test]
    fn test_paragraph_image_rewritten() {
        let html = render_markdown("![diagram](diagram.png)", "/domains/Orders");
        assert!(html.starts_with("<p>"));
        assert!(html.contains("src=\"/catalog/domains/Orders/diagram.png\""));
        assert!(html.contains("alt=\"diagram\""));
    }

    #[test]
    fn test_absolute_urls_left_intact() {
        let html = render_markdown(
            "![a](https://cdn.example.com/a.png) ![b](//cdn.example.com/b.png)",
            "/events/E",
        );
        assert!(html.contains("src=\"https://cdn.example.com/a.png\""));
        assert!(html.contains("src=\"//cdn.example.com/b.png\""));
        assert!(!html.contains("/catalog/"));
    }

    #[test]
    fn test_nested_image_not_rewritten() {
        let html = render_markdown("[![badge](badge.svg)](https://ci.example.com)", "/services/S");
        assert!(html.contains("src=\"badge.svg\""));
        assert!(html.contains("href=\"https://ci.example.com\""));
    }

    #[test]
    fn test_gfm_extensions() {
        let html = render_markdown(
            "| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n",
            "/",
        );
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_bare_urls_become_links() {
        let html = render_markdown("Docs at https://example.com/docs.", "/");
        assert!(html.contains(
            "<a href=\"https://example.com/docs\">https://example.com/docs</a>."
        ));
    }

    #[test]
    fn test_existing_links_not_relinked() {
        let html = render_markdown("[https://a.io](https://a.io)", "/");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn test_emoji_shortcodes() {
        let smile = emojis::get_by_shortcode("smile").unwrap().as_str();
        let html = render_markdown("Hello :smile: and `:smile:` at 10:30:45 :not_an_emoji_x:", "/");
        assert!(html.contains(&format!("Hello {} and", smile)));
        assert!(html.contains("<code>:smile:</code>"));
        assert!(html.contains("10:30:45"));
        assert!(html.contains(":not_an_emoji_x:"));
    }

    #[test]
    fn test_emoji_not_substituted_in_code_block() {
        let html = render_markdown("```\n:smile:\n```", "/");
        assert!(html.contains(":smile:"));
    }

    #[test]
    fn test_output_is_trimmed() {
        let html = render_markdown("\n\n# Title\n\n", "/");
        assert_eq!(html, "<h1>Title</h1>");
        assert_eq!(render_markdown("", "/"), "");
    }
}
