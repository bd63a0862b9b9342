use answerpipe_core::{Error, FetchBackend, FetchRequest, PageExtractor, Result};
use std::io::Cursor;

/// Convert HTML to readable plain text.
///
/// Notes:
/// - This is intentionally "good enough" and deterministic, not a full readability engine.
/// - Callers should apply their own output bounds (chars) if needed.
pub fn html_to_text(html: &str, width: usize) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Truncate to a character budget. Returns the (possibly shortened) text and
/// whether anything was clipped.
pub fn truncate_to_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    let mut n = 0usize;
    for ch in s.chars() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
        n += 1;
    }
    (out, false)
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    // Skip leading whitespace.
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return false;
    }
    let rest = &bytes[i..];
    // Common prefixes; keep it conservative.
    rest.starts_with(b"<!doctype")
        || rest.starts_with(b"<!DOCTYPE")
        || rest.starts_with(b"<html")
        || rest.starts_with(b"<HTML")
        || rest.starts_with(b"<head")
        || rest.starts_with(b"<body")
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_generic_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    // Keep this generic: avoid site/host heuristics; only structural UI words.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    for bad in [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ] {
        if s.contains(bad) {
            return true;
        }
    }
    false
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let sel = html_scraper::Selector::parse("a").ok();
    let Some(sel) = sel else { return 0 };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

fn pick_main_text(html: &str, max_elems: usize) -> Option<String> {
    let max_elems = max_elems.clamp(50, 50_000);
    let doc = html_scraper::Html::parse_document(html);

    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;
    let mut seen = 0usize;
    let mut best_score: i64 = 0;
    let mut best_text: Option<String> = None;

    for el in doc.select(&sel) {
        seen += 1;
        if seen > max_elems {
            break;
        }
        if is_generic_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        // Low enough to work for small "single article" pages; tag bonuses
        // and link-density penalties keep pure nav widgets out.
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        // Prefer dense non-link text. Link text is usually navigation / TOCs / tag clouds.
        let mut score = txt as i64 - 2 * (link_txt as i64);
        let tag = el.value().name();
        if tag == "article" {
            score += 500;
        } else if tag == "main" {
            score += 300;
        }
        // Penalize suspiciously link-heavy blocks.
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            let t = el.text().collect::<Vec<_>>().join(" ");
            best_text = Some(norm_ws(&t));
        }
    }

    best_text
}

/// Extract the main article text from an HTML document, discarding
/// boilerplate. Falls back to a whole-document text conversion when no
/// content-dense candidate stands out.
pub fn readable_text_from_html(html: &str) -> String {
    if let Some(main) = pick_main_text(html, 20_000) {
        if has_any_text(&main) {
            return main;
        }
    }
    let text = html_to_text(html, 80);
    norm_ws(&text)
}

fn content_type_is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        })
        .unwrap_or(false)
}

fn content_type_is_text(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with("text/"))
        .unwrap_or(false)
}

/// Best-effort readable text from a fetched body.
///
/// Non-HTML, non-text payloads (images, PDFs, binaries) yield an empty
/// string rather than garbage.
pub fn best_effort_text_from_bytes(bytes: &[u8], content_type: Option<&str>) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if content_type_is_html(content_type) || bytes_look_like_html(bytes) {
        let html = String::from_utf8_lossy(bytes);
        return readable_text_from_html(&html);
    }
    if content_type_is_text(content_type) {
        return norm_ws(&String::from_utf8_lossy(bytes));
    }
    String::new()
}

/// Readability-style page extraction over any [`FetchBackend`].
///
/// Fetch failures and non-success HTTP statuses are `Err`; a page with no
/// content-bearing text is `Ok("")`. The caller decides what to do with
/// either.
#[derive(Debug, Clone)]
pub struct ReadabilityExtractor<F> {
    fetcher: F,
    timeout_ms: u64,
    max_bytes: u64,
}

impl<F> ReadabilityExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            timeout_ms: 20_000,
            max_bytes: 2 * 1024 * 1024,
        }
    }

    pub fn with_limits(mut self, timeout_ms: u64, max_bytes: u64) -> Self {
        self.timeout_ms = timeout_ms.clamp(1_000, 60_000);
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait::async_trait]
impl<F: FetchBackend> PageExtractor for ReadabilityExtractor<F> {
    async fn extract(&self, url: &str) -> Result<String> {
        let req = FetchRequest {
            url: url.to_string(),
            timeout_ms: Some(self.timeout_ms),
            max_bytes: Some(self.max_bytes),
        };
        let resp = self.fetcher.fetch(&req).await?;
        if !(200..300).contains(&resp.status) {
            return Err(Error::Fetch(format!(
                "fetch of {url} returned HTTP {}",
                resp.status
            )));
        }
        let text = best_effort_text_from_bytes(&resp.bytes, resp.content_type.as_deref());
        Ok(text.trim().to_string())
    }
}
