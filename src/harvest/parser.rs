//! HTML parser for post pages
//!
//! Pure extraction functions over a parsed document:
//! - The primary image element with its literal width/height/source attributes
//! - The sidebar tag list (order-preserving, duplicates kept)
//! - The "past the end of the catalog" signature used by boundary discovery
//!
//! All functions here are synchronous and return owned data, so the parsed
//! document never has to live across an await point.

use crate::{HarvestError, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Metadata for the primary image on a post page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMeta {
    /// Pixel width as declared by the page
    pub width: u32,
    /// Pixel height as declared by the page
    pub height: u32,
    /// Absolute URL of the image file
    pub source_url: String,
}

/// Everything extracted from one post page
#[derive(Debug, Clone)]
pub struct PostPage {
    pub image: ImageMeta,
    pub tags: Vec<String>,
}

/// Parses a post page and extracts image metadata plus tags
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - The URL the page was fetched from, used to absolutize the
///   image source and to annotate errors
pub fn parse_post_page(html: &str, page_url: &str) -> Result<PostPage> {
    let document = Html::parse_document(html);
    let image = extract_image(&document, page_url)?;
    let tags = extract_tags(&document);
    Ok(PostPage { image, tags })
}

/// Extracts the primary image element's metadata
///
/// The image is located by the fixed identifier `img#image` and its
/// `width`/`height`/`src` attributes are read literally. A missing element
/// or attribute is a data fault and surfaces as `PageStructure` rather than
/// being defaulted.
pub fn extract_image(document: &Html, page_url: &str) -> Result<ImageMeta> {
    let selector = image_selector(page_url)?;
    let element = document.select(&selector).next().ok_or_else(|| {
        structure_error(page_url, "image element img#image not found")
    })?;

    let width = parse_dimension(&element, "width", page_url)?;
    let height = parse_dimension(&element, "height", page_url)?;

    let src = element
        .value()
        .attr("src")
        .ok_or_else(|| structure_error(page_url, "image element has no src attribute"))?;

    // The src attribute can be relative or protocol-relative
    let source_url = Url::parse(page_url)?.join(src)?.to_string();

    Ok(ImageMeta {
        width,
        height,
        source_url,
    })
}

/// Extracts the ordered tag list from the sidebar
///
/// Each `<li>` in `ul#tag-sidebar` that carries a visible tag-count
/// indicator contributes one tag: the display text of the last link in the
/// item. Items without a count indicator are navigation entries and are
/// skipped. Duplicates are kept; deduplication happens in the ingestion
/// writer via set semantics.
pub fn extract_tags(document: &Html) -> Vec<String> {
    let mut tags = Vec::new();

    let sidebar = match Selector::parse("ul#tag-sidebar > li").ok() {
        Some(s) => s,
        None => return tags,
    };
    let count = match Selector::parse("span.tag-count").ok() {
        Some(s) => s,
        None => return tags,
    };
    let link = match Selector::parse("a").ok() {
        Some(s) => s,
        None => return tags,
    };

    for item in document.select(&sidebar) {
        if item.select(&count).next().is_none() {
            continue;
        }
        if let Some(last_link) = item.select(&link).last() {
            let name = last_link.text().collect::<String>().trim().to_string();
            if !name.is_empty() {
                tags.push(name);
            }
        }
    }

    tags
}

/// Returns true when the page carries the catalog's "nonexistent ID"
/// signature: the main post-list container is absent
///
/// The sense is deliberately inverted: `true` means "this ID is past the
/// end of the catalog", not "this is a valid post".
pub fn is_past_end(html: &str) -> bool {
    let document = Html::parse_document(html);
    match Selector::parse("div#post-list").ok() {
        Some(selector) => document.select(&selector).next().is_none(),
        // Unparseable selector would never match, treat as absent
        None => true,
    }
}

fn image_selector(page_url: &str) -> Result<Selector> {
    Selector::parse("img#image")
        .map_err(|_| structure_error(page_url, "invalid image selector"))
}

fn parse_dimension(element: &ElementRef<'_>, attr: &str, page_url: &str) -> Result<u32> {
    let raw = element.value().attr(attr).ok_or_else(|| {
        structure_error(page_url, &format!("image element has no {attr} attribute"))
    })?;
    raw.trim().parse().map_err(|_| {
        structure_error(page_url, &format!("image {attr} is not a number: {raw:?}"))
    })
}

fn structure_error(page_url: &str, message: &str) -> HarvestError {
    HarvestError::PageStructure {
        url: page_url.to_string(),
        message: message.to_string(),
    }
}
