//! Page fetching and HTML cleaning.
//!
//! `fetch` is a plain GET. `clean` keeps the readable text of the main
//! content region and scrapes the metadata the source heuristic needs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::models::{domain_of, CleanStats, PageMetadata, TransportMetadata};
use crate::traits::{CleanedPage, FetchedPage, PageFetcher};

const SKIPPED_TAGS: &[&str] = &["script", "style", "svg", "iframe", "noscript", "head"];

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    "#content",
    ".post",
    ".article",
    ".article-body",
    ".story-body",
];

const AUTHOR_META: &[&str] = &[
    "meta[name=\"author\"]",
    "meta[property=\"article:author\"]",
    "meta[name=\"article:author_name\"]",
    "meta[itemprop=\"author\"]",
];

const DATE_META: &[&str] = &[
    "meta[property=\"article:published_time\"]",
    "meta[name=\"publish_date\"]",
    "meta[name=\"publication_date\"]",
    "meta[property=\"article:published\"]",
    "meta[itemprop=\"datePublished\"]",
    "meta[name=\"article_date_time\"]",
    "meta[property=\"og:article:published_time\"]",
];

pub struct HttpPageFetcher {
    client: Client,
    max_content_length: usize,
}

impl HttpPageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            max_content_length: config.max_content_length,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Failed to fetch content: HTTP {}", status);
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let final_url = resp.url().to_string();
        let bytes = resp.bytes().await?;

        Ok(FetchedPage {
            body: String::from_utf8_lossy(&bytes).into_owned(),
            transport: TransportMetadata {
                content_length: bytes.len() as i64,
                content_type,
                status_code: status.as_u16(),
                final_url,
            },
        })
    }

    fn clean(&self, raw: &str, url: &str) -> CleanedPage {
        clean_html(raw, url, self.max_content_length)
    }
}

/// Extracts metadata and the readable main-content text of `raw`.
pub fn clean_html(raw: &str, url: &str, max_content_length: usize) -> CleanedPage {
    let document = Html::parse_document(raw);
    let metadata = extract_metadata(&document, url);

    let mut fragments = Vec::new();
    let mut content_found = false;
    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let matches: Vec<ElementRef> = document.select(&selector).collect();
        if matches.is_empty() {
            continue;
        }
        content_found = true;
        for element in matches {
            collect_text(element, &mut fragments);
        }
        break;
    }
    if !content_found {
        collect_text(document.root_element(), &mut fragments);
    }

    let mut content = fragments.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    if content.chars().count() > max_content_length {
        content = content.chars().take(max_content_length).collect();
    }

    let original_size = raw.len();
    let cleaned_size = content.len();
    let reduction_percent = if original_size == 0 {
        0.0
    } else {
        let pct = (original_size as f64 - cleaned_size as f64) / original_size as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    };

    CleanedPage {
        content,
        stats: CleanStats {
            original_size,
            cleaned_size,
            reduction_percent,
            content_found,
        },
        metadata,
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

pub fn extract_metadata(document: &Html, url: &str) -> PageMetadata {
    PageMetadata {
        domain: domain_of(url),
        title: first_text(document, "title"),
        author: extract_author(document),
        publication_date: extract_publication_date(document),
        description: first_meta(document, &["meta[name=\"description\"]"])
            .or_else(|| first_meta(document, &["meta[property=\"og:description\"]"])),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// `content` of the first matching meta tag that has a non-blank one.
fn first_meta(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document.select(&selector).find_map(|el| {
            el.value()
                .attr("content")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        })
    })
}

fn extract_author(document: &Html) -> Option<String> {
    if let Some(author) = first_meta(document, AUTHOR_META) {
        return Some(author);
    }

    // Byline elements, e.g. <span class="author-name">By Jane Doe</span>
    let byline = Regex::new(r"(?i)author|by-line|byline").ok()?;
    let by_prefix = Regex::new(r"(?i)^by\s+").ok()?;
    for tag in ["span", "div", "p", "a"] {
        let Ok(selector) = Selector::parse(&format!("{}[class]", tag)) else {
            continue;
        };
        let found = document
            .select(&selector)
            .find(|el| el.value().attr("class").is_some_and(|c| byline.is_match(c)));
        if let Some(el) = found {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() && text.chars().count() < 100 {
                let name = by_prefix.replace(text, "").trim().to_string();
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }
    None
}

fn extract_publication_date(document: &Html) -> Option<String> {
    for selector in DATE_META {
        if let Some(date) = first_meta(document, &[*selector]).and_then(|raw| parse_date(&raw)) {
            return Some(date);
        }
    }

    let selector = Selector::parse("time[datetime]").ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr("datetime").and_then(parse_date))
}

/// Normalizes common date spellings to `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.format("%Y-%m-%d").to_string());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}
