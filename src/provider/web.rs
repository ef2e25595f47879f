// src/provider/web.rs
// =============================================================================
// Website provider: crawls pages on the same site as the starting URL.
//
// How pages map onto the traversal:
// - A Page node is a container. Listing it fetches the page once and
//   returns (1) a Body node holding the fetched text and (2) one Page node
//   per same-site link, as long as we're still below max_depth.
// - A Body node is a leaf. Reading it returns the cached text, no request.
//
// So the keyword predicate runs on every page body exactly once, and the
// link graph (which is usually full of cycles) is deduplicated by URL.
//
// A page's depth is reported as its distance. When a page first reached
// through a long path shows up again closer to the start, the traversal
// lists it again at the smaller depth, so max_depth always counts the
// shortest path and the crawled set doesn't depend on task timing.
//
// Politeness:
// - A configurable delay after every fetch
// - Only the starting site is crawled
// =============================================================================

use super::links::{canonical_url, extract_html_links, extract_markdown_links, same_site};
use super::Provider;
use crate::config::CrawlConfig;
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A vertex of the crawl graph
#[derive(Debug, Clone)]
pub enum WebNode {
    /// A page still to be fetched, with its distance from the start (start = 1)
    Page { url: Url, depth: usize },
    /// The text of a page that has already been fetched
    Body { url: Url, text: Arc<str> },
}

impl WebNode {
    pub fn url(&self) -> &Url {
        match self {
            WebNode::Page { url, .. } | WebNode::Body { url, .. } => url,
        }
    }
}

impl fmt::Display for WebNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url().as_str())
    }
}

pub struct WebProvider {
    client: Client,
    start: Url,
    config: CrawlConfig,
}

impl WebProvider {
    pub fn new(start_url: &str, config: CrawlConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let start = Url::parse(start_url).map_err(|e| ConfigError::InvalidUrl {
            url: start_url.to_string(),
            reason: e.to_string(),
        })?;
        if start.scheme() != "http" && start.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: start_url.to_string(),
                reason: "only http and https URLs can be crawled".to_string(),
            });
        }
        if start.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: start_url.to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            start: canonical_url(&start),
            config,
        })
    }

    /// The node the crawl starts from
    pub fn root(&self) -> WebNode {
        WebNode::Page {
            url: self.start.clone(),
            depth: 1,
        }
    }

    // Fetches a page and returns its body plus whether it looks like markdown
    async fn fetch(&self, url: &Url) -> Result<(String, bool), ProviderError> {
        debug!(url = %url, "fetching page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        if let Some(error) = status_error(url, response.status()) {
            return Err(error);
        }

        let is_markdown = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("markdown"))
            .unwrap_or(false)
            || url.path().ends_with(".md");

        let text = response.text().await.map_err(|e| request_error(url, e))?;

        if !self.config.polite_delay.is_zero() {
            tokio::time::sleep(self.config.polite_delay).await;
        }

        Ok((text, is_markdown))
    }
}

#[async_trait]
impl Provider for WebProvider {
    type Node = WebNode;

    async fn is_container(&self, node: &WebNode) -> Result<bool, ProviderError> {
        Ok(matches!(node, WebNode::Page { .. }))
    }

    async fn list(&self, node: &WebNode) -> Result<Vec<WebNode>, ProviderError> {
        let (url, depth) = match node {
            WebNode::Page { url, depth } => (url, *depth),
            WebNode::Body { .. } => return Ok(Vec::new()),
        };

        let (text, is_markdown) = self.fetch(url).await?;

        let links = if depth < self.config.max_depth {
            if is_markdown {
                extract_markdown_links(&text, url)
            } else {
                extract_html_links(&text, url)
            }
        } else {
            Vec::new()
        };

        let mut children = Vec::with_capacity(links.len() + 1);
        children.push(WebNode::Body {
            url: url.clone(),
            text: Arc::from(text),
        });
        children.extend(
            links
                .into_iter()
                .filter(|link| same_site(link, &self.start))
                .map(|link| WebNode::Page {
                    url: link,
                    depth: depth + 1,
                }),
        );

        Ok(children)
    }

    async fn read(&self, node: &WebNode) -> Result<String, ProviderError> {
        match node {
            WebNode::Body { text, .. } => Ok(text.to_string()),
            WebNode::Page { url, .. } => self.fetch(url).await.map(|(text, _)| text),
        }
    }

    fn canonical_key(&self, node: &WebNode) -> String {
        match node {
            WebNode::Page { url, .. } => canonical_url(url).to_string(),
            WebNode::Body { url, .. } => format!("body:{}", canonical_url(url)),
        }
    }

    fn distance(&self, node: &WebNode) -> Option<usize> {
        match node {
            WebNode::Page { depth, .. } => Some(*depth),
            WebNode::Body { .. } => None,
        }
    }
}

// Maps an HTTP status onto the provider taxonomy, None for success
fn status_error(url: &Url, status: StatusCode) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }

    let message = format!("{}: HTTP {}", url, status.as_u16());
    Some(match status {
        // 404 Not Found or 410 Gone - the page isn't there
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AccessDenied(message),
        // Other status codes (e.g., 500 server errors)
        _ => ProviderError::Transport(message),
    })
}

// Categorizes reqwest failures (timeouts, DNS, TLS, redirect loops)
fn request_error(url: &Url, error: reqwest::Error) -> ProviderError {
    let error_string = error.to_string();

    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else if error.is_connect() {
        if error_string.contains("dns") {
            "could not resolve hostname".to_string()
        } else {
            "connection failed".to_string()
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        "SSL certificate error".to_string()
    } else {
        error_string
    };

    ProviderError::Transport(format!("{}: {}", url, reason))
}
