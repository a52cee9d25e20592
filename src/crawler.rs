//! Polite website crawler
//!
//! Fetches a candidate's homepage and reduces it to plain lowercased text for
//! the specialty classifier. Politeness contract: the site's robots.txt is
//! consulted first (absence of a policy is NOT a denial), every page fetch
//! goes through the shared rate limiter, requests carry an identifying
//! user-agent, and body reads are capped while streaming.
//!
//! Every step fails with a typed [`CrawlError`] instead of raising past its
//! own stage; one unreachable website must never abort a batch.

use std::time::Duration;

use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::rate_limit::{service, RateLimiter};

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("crawling not permitted by site policy")]
    PolicyDenied,

    #[error("not an HTML page (content type '{0}')")]
    NotHtml(String),

    #[error("unusable website URL '{0}'")]
    InvalidUrl(String),

    #[error("website returned HTTP status {0}")]
    Status(u16),

    #[error("website fetch failed: {0}")]
    Request(#[from] reqwest::Error),
}

// Compiled once; all patterns are compile-time constants, so parse cannot
// fail at runtime.
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

pub struct Crawler {
    page_client: reqwest::Client,
    robots_client: reqwest::Client,
    user_agent_token: String,
    max_body_bytes: usize,
}

impl Crawler {
    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let page_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.website_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        let robots_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.robots_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            page_client,
            robots_client,
            user_agent_token: user_agent_token(&config.user_agent),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Fetch a website's homepage and return its stripped, lowercased text.
    pub async fn extract_text(
        &self,
        limiter: &mut RateLimiter,
        website: &str,
    ) -> Result<String, CrawlError> {
        let url = normalize_url(website)?;

        if !self.policy_allows(&url).await {
            debug!("Exclusion policy denies crawling {}", url);
            return Err(CrawlError::PolicyDenied);
        }

        limiter.acquire(service::WEBSITE).await;

        debug!("Fetching homepage {}", url);
        let response = self.page_client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(CrawlError::NotHtml(content_type));
        }

        let html = read_body_capped(response, self.max_body_bytes).await?;
        Ok(strip_html(&html))
    }

    /// Check the site's robots.txt. Retrieval failure of any kind - network
    /// error, non-2xx, unreadable body - defaults to allowed: absence of a
    /// policy is not a denial.
    async fn policy_allows(&self, url: &Url) -> bool {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let response = match self.robots_client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("robots.txt fetch failed for {} ({}), allowing", url, e);
                return true;
            }
        };
        if !response.status().is_success() {
            debug!("robots.txt returned {} for {}, allowing", response.status(), url);
            return true;
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(_) => return true,
        };

        policy_allows_path(&body, &self.user_agent_token, url.path())
    }
}

/// Prefix `https://` when the URL carries no scheme, then validate.
pub fn normalize_url(raw: &str) -> Result<Url, CrawlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CrawlError::InvalidUrl(raw.to_string()));
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&with_scheme).map_err(|_| CrawlError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(CrawlError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// The robots.txt match token: leading product token of the user-agent,
/// lowercased ("solarscout/0.1 (+...)" -> "solarscout").
fn user_agent_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or(user_agent)
        .to_lowercase()
}

/// Minimal robots.txt evaluation: group the rules by user-agent, pick the
/// most specific applicable group (a named match beats `*`), then apply
/// longest-prefix-wins between Allow and Disallow for the requested path.
/// Ties go to Allow; no applicable rule means allowed.
pub fn policy_allows_path(robots: &str, agent_token: &str, path: &str) -> bool {
    struct Group {
        agents: Vec<String>,
        rules: Vec<(bool, String)>, // (is_allow, path_prefix)
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<Group> = None;
    let mut last_line_was_agent = false;

    for line in robots.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_lowercase();
        let value = value.trim().to_string();

        match field.as_str() {
            "user-agent" => {
                if !last_line_was_agent {
                    if let Some(group) = current.take() {
                        groups.push(group);
                    }
                    current = Some(Group { agents: Vec::new(), rules: Vec::new() });
                }
                if let Some(group) = current.as_mut() {
                    group.agents.push(value.to_lowercase());
                }
                last_line_was_agent = true;
            }
            "allow" | "disallow" => {
                last_line_was_agent = false;
                if let Some(group) = current.as_mut() {
                    // An empty Disallow means "everything allowed"; it adds
                    // no restriction either way.
                    if !value.is_empty() {
                        group.rules.push((field == "allow", value));
                    }
                }
            }
            _ => {
                last_line_was_agent = false;
            }
        }
    }
    if let Some(group) = current.take() {
        groups.push(group);
    }

    let matches_token = |agent: &str| {
        agent != "*" && (agent_token.contains(agent) || agent.contains(agent_token))
    };
    let selected = groups
        .iter()
        .find(|group| group.agents.iter().any(|agent| matches_token(agent)))
        .or_else(|| groups.iter().find(|group| group.agents.iter().any(|agent| agent == "*")));

    let Some(group) = selected else {
        return true;
    };

    let mut best: Option<(bool, usize)> = None;
    for (is_allow, prefix) in &group.rules {
        if path.starts_with(prefix.as_str()) {
            let len = prefix.len();
            let better = match best {
                None => true,
                Some((best_allow, best_len)) => {
                    len > best_len || (len == best_len && *is_allow && !best_allow)
                }
            };
            if better {
                best = Some((*is_allow, len));
            }
        }
    }

    match best {
        Some((is_allow, _)) => is_allow,
        None => true,
    }
}

/// Read a response body with streaming truncation at `max_bytes`. Oversized
/// bodies are truncated, not rejected; lossy UTF-8 handles a cut multi-byte
/// sequence at the boundary.
async fn read_body_capped(response: reqwest::Response, max_bytes: usize) -> Result<String, CrawlError> {
    let mut body = Vec::with_capacity(max_bytes.min(64 * 1024));
    let mut stream = response.bytes_stream();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = max_bytes.saturating_sub(total);
        if remaining == 0 {
            debug!("Response body truncated at {} bytes", total);
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
        total += take;
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Reduce HTML to plain text: drop script/style blocks and comments, strip
/// the remaining tags, decode the handful of entities that matter for
/// keyword matching, collapse whitespace, lowercase.
pub fn strip_html(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_styles = STYLE_RE.replace_all(&without_scripts, " ");
    let without_comments = COMMENT_RE.replace_all(&without_styles, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");

    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
