//! HTML parser for extracting downloadable resources
//!
//! This module scans a seed page for static resources:
//! - Images (`<img>`, `srcset` candidates, `<picture>` sources, posters, icons)
//! - Scripts (`<script src>`, module preloads)
//! - Stylesheets (`<link rel="stylesheet">`, `@import` in inline CSS)
//! - Fonts (font preloads, `url()` references to font files)
//! - Media (`<video>`, `<audio>`, their `<source>`/`<track>` children)
//!
//! Inline `<style>` blocks and `style` attributes are scanned for `url()`
//! and `@import` references. Linked stylesheets are downloaded as files but
//! not parsed.

use crate::state::ResourceKind;
use crate::url::{dedup_key, is_downloadable};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// `@import "x.css"`, `@import url(x.css)` or a bare `url(...)` reference
static CSS_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)@import\s+(?:url\(\s*)?["']?([^"')\s;]+)|url\(\s*["']?([^"')]+?)["']?\s*\)"#,
    )
    .expect("CSS reference pattern is valid")
});

/// One resource reference found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    /// Absolute URL, fragment removed
    pub url: Url,
    pub kind: ResourceKind,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ExtractedResources {
    /// Unique resources, in discovery order
    pub resources: Vec<DiscoveredResource>,

    /// Further references to a URL already in `resources`
    pub duplicates: Vec<DiscoveredResource>,
}

impl ExtractedResources {
    /// Number of references found, duplicates included
    pub fn discovered(&self) -> usize {
        self.resources.len() + self.duplicates.len()
    }
}

/// Extracts resource references from an HTML document
///
/// Relative references resolve against `<base href>` when the page declares
/// one, otherwise against `base_url` (the final URL after redirects).
/// References that resolve to anything other than http(s) are dropped, so
/// `data:`, `javascript:` and `blob:` URLs never reach the download stage.
///
/// # Arguments
///
/// * `html` - The raw page body
/// * `base_url` - The URL the page was served from
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::extract_resources;
/// use url::Url;
///
/// let html = br#"<img src="/logo.png"><script src="app.js"></script>"#;
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let page = extract_resources(html, &base);
/// assert_eq!(page.resources.len(), 2);
/// assert_eq!(page.resources[1].url.as_str(), "https://example.com/docs/app.js");
/// ```
pub fn extract_resources(html: &[u8], base_url: &Url) -> ExtractedResources {
    let text = String::from_utf8_lossy(html);
    let document = Html::parse_document(&text);

    let base = document_base(&document, base_url);
    let mut collector = Collector::new(&base);

    collect_images(&document, &mut collector);
    collect_scripts(&document, &mut collector);
    collect_links(&document, &mut collector);
    collect_media(&document, &mut collector);
    collect_inline_css(&document, &mut collector);

    collector.finish()
}

/// Extracts `@import` and `url()` references from CSS text
///
/// Returns the raw reference and the kind it implies: `@import` targets are
/// stylesheets, everything else is classified by file extension.
pub fn extract_css_references(css: &str) -> Vec<(String, ResourceKind)> {
    CSS_REFERENCE
        .captures_iter(css)
        .filter_map(|caps| {
            if let Some(import) = caps.get(1) {
                Some((import.as_str().trim().to_string(), ResourceKind::Style))
            } else {
                caps.get(2).map(|reference| {
                    let reference = reference.as_str().trim();
                    (reference.to_string(), ResourceKind::from_extension(strip_query(reference)))
                })
            }
        })
        .filter(|(reference, _)| !reference.is_empty())
        .collect()
}

/// Accumulates resolved references, splitting off in-page duplicates
struct Collector<'a> {
    base: &'a Url,
    seen: HashSet<String>,
    extracted: ExtractedResources,
}

impl<'a> Collector<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            seen: HashSet::new(),
            extracted: ExtractedResources::default(),
        }
    }

    fn add(&mut self, reference: &str, kind: ResourceKind) {
        let Some(url) = resolve_reference(reference, self.base) else {
            return;
        };
        let Some(key) = dedup_key(&url) else {
            return;
        };

        let resource = DiscoveredResource { url, kind };
        if self.seen.insert(key) {
            self.extracted.resources.push(resource);
        } else {
            self.extracted.duplicates.push(resource);
        }
    }

    fn add_srcset(&mut self, srcset: &str, kind: ResourceKind) {
        for candidate in parse_srcset(srcset) {
            self.add(candidate, kind);
        }
    }

    fn add_css(&mut self, css: &str) {
        for (reference, kind) in extract_css_references(css) {
            self.add(&reference, kind);
        }
    }

    fn finish(self) -> ExtractedResources {
        self.extracted
    }
}

fn collect_images(document: &Html, collector: &mut Collector<'_>) {
    for element in select(document, "img") {
        let el = element.value();
        if let Some(src) = el.attr("src") {
            collector.add(src, ResourceKind::Image);
        }
        // common lazy-loading convention
        if let Some(src) = el.attr("data-src") {
            collector.add(src, ResourceKind::Image);
        }
        if let Some(srcset) = el.attr("srcset") {
            collector.add_srcset(srcset, ResourceKind::Image);
        }
    }

    for element in select(document, "input[type='image'][src]") {
        if let Some(src) = element.value().attr("src") {
            collector.add(src, ResourceKind::Image);
        }
    }
}

fn collect_scripts(document: &Html, collector: &mut Collector<'_>) {
    for element in select(document, "script[src]") {
        if let Some(src) = element.value().attr("src") {
            collector.add(src, ResourceKind::Script);
        }
    }
}

fn collect_links(document: &Html, collector: &mut Collector<'_>) {
    for element in select(document, "link[href]") {
        let el = element.value();
        let Some(href) = el.attr("href") else {
            continue;
        };
        let rel = el.attr("rel").unwrap_or("").to_ascii_lowercase();
        if let Some(kind) = link_kind(&rel, el.attr("as"), href) {
            collector.add(href, kind);
        }
    }
}

fn collect_media(document: &Html, collector: &mut Collector<'_>) {
    for element in select(document, "video, audio") {
        let el = element.value();
        if let Some(src) = el.attr("src") {
            collector.add(src, ResourceKind::Media);
        }
        if let Some(poster) = el.attr("poster") {
            collector.add(poster, ResourceKind::Image);
        }
    }

    for element in select(document, "source") {
        let in_picture = element
            .parent()
            .and_then(ElementRef::wrap)
            .map_or(false, |parent| parent.value().name() == "picture");
        let kind = if in_picture {
            ResourceKind::Image
        } else {
            ResourceKind::Media
        };

        let el = element.value();
        if let Some(src) = el.attr("src") {
            collector.add(src, kind);
        }
        if let Some(srcset) = el.attr("srcset") {
            collector.add_srcset(srcset, kind);
        }
    }

    for element in select(document, "track[src]") {
        if let Some(src) = element.value().attr("src") {
            collector.add(src, ResourceKind::Media);
        }
    }
}

fn collect_inline_css(document: &Html, collector: &mut Collector<'_>) {
    for element in select(document, "style") {
        let css: String = element.text().collect();
        collector.add_css(&css);
    }

    for element in select(document, "[style]") {
        if let Some(style) = element.value().attr("style") {
            collector.add_css(style);
        }
    }
}

/// Decides what a `<link>` element points at, if anything downloadable
///
/// # Link Rules
///
/// | rel | Kind |
/// |-----|------|
/// | `stylesheet` | Style |
/// | `icon`, `apple-touch-icon`, `mask-icon` | Image |
/// | `modulepreload` | Script |
/// | `preload` / `prefetch` | from the `as` attribute |
/// | anything else | skipped, unless the href is a font file |
fn link_kind(rel: &str, as_attr: Option<&str>, href: &str) -> Option<ResourceKind> {
    let tokens: Vec<&str> = rel.split_ascii_whitespace().collect();
    let has = |token: &str| tokens.iter().any(|t| *t == token);

    if has("stylesheet") {
        return Some(ResourceKind::Style);
    }
    if has("icon") || has("apple-touch-icon") || has("mask-icon") {
        return Some(ResourceKind::Image);
    }
    if has("modulepreload") {
        return Some(ResourceKind::Script);
    }
    if has("preload") || has("prefetch") {
        return match as_attr.map(str::to_ascii_lowercase).as_deref() {
            Some("font") => Some(ResourceKind::Font),
            Some("image") => Some(ResourceKind::Image),
            Some("script") => Some(ResourceKind::Script),
            Some("style") => Some(ResourceKind::Style),
            Some("audio" | "video" | "track") => Some(ResourceKind::Media),
            _ => None,
        };
    }

    // canonical, alternate, manifest etc. point at documents
    match ResourceKind::from_extension(strip_query(href)) {
        ResourceKind::Font => Some(ResourceKind::Font),
        _ => None,
    }
}

/// Returns the URL of each `srcset` candidate
///
/// A candidate URL runs up to the next whitespace, so commas inside it
/// (`data:` payloads, CDN transform paths) stay part of the URL. Trailing
/// commas end the candidate; otherwise its descriptors run to the next comma.
fn parse_srcset(srcset: &str) -> Vec<&str> {
    let mut urls = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let end = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let (raw, tail) = rest.split_at(end);
        let url = raw.trim_end_matches(',');

        rest = if url.len() < raw.len() {
            tail
        } else {
            tail.find(',').map_or("", |comma| &tail[comma + 1..])
        };

        if !url.is_empty() {
            urls.push(url);
        }
    }

    urls
}

/// Returns the effective base URL, honoring `<base href>`
fn document_base(document: &Html, page_url: &Url) -> Url {
    select(document, "base[href]")
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(is_downloadable)
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a reference to an absolute, downloadable URL
///
/// Returns None if the reference should be excluded:
/// - empty or fragment-only references
/// - javascript:, data:, blob:, mailto:, tel:, about: schemes
/// - anything that fails to resolve
/// - non-HTTP(S) URLs after resolution
fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if ["javascript:", "data:", "blob:", "mailto:", "tel:", "about:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    if !is_downloadable(&url) {
        return None;
    }
    url.set_fragment(None);

    Some(url)
}

fn strip_query(reference: &str) -> &str {
    reference
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(reference)
}

fn select<'a>(document: &'a Html, selector: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let selector = Selector::parse(selector).ok();
    selector
        .into_iter()
        .flat_map(move |selector| document.select(&selector).collect::<Vec<_>>())
}
