// src/provider/links.rs
// =============================================================================
// Extracts followable links from fetched documents.
//
// We use:
// - scraper (html5ever + CSS selectors) for HTML pages: every <a href>
// - pulldown-cmark for markdown documents: every [text](dest) link
// - url to resolve relative links against the page they came from
//
// Only http/https links survive. Fragments are stripped so that
// "page#intro" and "page#usage" count as the same page.
//
// Rust concepts:
// - Option chaining: most hrefs are either usable or silently skipped
// - Iterators: filter_map keeps the extraction code flat
// =============================================================================

use pulldown_cmark::{Event, Parser, Tag};
use scraper::{Html, Selector};
use url::Url;

// Extracts all http(s) links from HTML content, resolved against `base`
pub fn extract_html_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);

    // "a[href]" means "all <a> tags that have an href attribute"
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect()
}

// Extracts all http(s) links from markdown text, resolved against `base`
//
// Unlike a plain README scan, relative destinations are kept: on a website
// "./guide.md" is just another page of the same site.
pub fn extract_markdown_links(markdown: &str, base: &Url) -> Vec<Url> {
    Parser::new(markdown)
        .filter_map(|event| match event {
            // In pulldown-cmark 0.9, Link is Tag::Link(link_type, dest_url, title)
            Event::Start(Tag::Link(_link_type, dest_url, _title)) => {
                resolve_link(base, &dest_url)
            }
            _ => None,
        })
        .collect()
}

// Resolves a link (possibly relative) to an absolute, fragment-free URL
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    // Skip anchors and special protocols
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    // join() handles both absolute and relative hrefs
    let url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    Some(canonical_url(&url))
}

/// The URL with its fragment removed
pub fn canonical_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// True when both URLs point at the same host and port
pub fn same_site(a: &Url, b: &Url) -> bool {
    // host_str() rather than domain() so that IP hosts (127.0.0.1) work too
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why strip the fragment?
//    - "#section" only scrolls within a page, it doesn't fetch a new one
//    - Keeping it would make the crawler visit the same page many times
//
// 2. What does the ? do inside resolve_link?
//    - base.join(href).ok()? returns None early if the URL is invalid
//    - It's the Option version of error propagation
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/page/").unwrap()
    }

    #[test]
    fn test_extract_absolute_link() {
        let html = r#"<a href="https://www.rust-lang.org">Rust</a>"#;
        let links = extract_html_links(html, &base());
        assert_eq!(links, vec![Url::parse("https://www.rust-lang.org/").unwrap()]);
    }

    #[test]
    fn test_resolve_relative_links() {
        let html = r#"
            <a href="/docs">Docs</a>
            <a href="../about">About</a>
            <a href="next">Next</a>
        "#;
        let links: Vec<String> = extract_html_links(html, &base())
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/docs",
                "https://example.com/about",
                "https://example.com/page/next",
            ]
        );
    }

    #[test]
    fn test_skip_special_links() {
        let html = r##"
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:123">Call</a>
            <a href="javascript:void(0)">Click</a>
            <a href="#top">Top</a>
            <a href="ftp://example.com/file">Ftp</a>
        "##;
        assert!(extract_html_links(html, &base()).is_empty());
    }

    #[test]
    fn test_fragments_are_stripped() {
        let html = r#"<a href="/guide#install">Install</a>"#;
        let links = extract_html_links(html, &base());
        assert_eq!(links[0].as_str(), "https://example.com/guide");
    }

    #[test]
    fn test_extract_markdown_links() {
        let markdown = r#"
# Resources

- [Rust](https://www.rust-lang.org)
- [Guide](./guide.md)
- [Email](mailto:test@example.com)
        "#;
        let links: Vec<String> = extract_markdown_links(markdown, &base())
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            links,
            vec!["https://www.rust-lang.org/", "https://example.com/page/guide.md"]
        );
    }

    #[test]
    fn test_same_site() {
        let a = Url::parse("http://127.0.0.1:8080/a").unwrap();
        let b = Url::parse("http://127.0.0.1:8080/b").unwrap();
        let c = Url::parse("http://127.0.0.1:9090/a").unwrap();
        let d = Url::parse("https://example.com/").unwrap();
        assert!(same_site(&a, &b));
        assert!(!same_site(&a, &c));
        assert!(!same_site(&a, &d));
    }
}
