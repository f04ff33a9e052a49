//! HTML reduction for the browser agent
//!
//! Pages are read as text, not rendered. Markup is stripped with a handful of
//! regexes, which is enough for spec sheets and search result pages.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::Url;
use serde::{Deserialize, Serialize};

static INVISIBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
        .expect("valid regex")
});
static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6]|/table|/section|/article|/header|/footer|/ul|/ol|/dt|/dd)\b[^>]*>")
        .expect("valid regex")
});
static CELL_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(td|th)\s*>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));
static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex"));
static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid regex"));
static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*"([^"]*)""#).expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

/// A fetched page reduced to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// One result from a web search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Reduce `html` to readable text of at most `limit` characters.
pub fn html_to_text(html: &str, limit: usize) -> String {
    let text = INVISIBLE.replace_all(html, " ");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = CELL_BREAK.replace_all(&text, " | ");
    let text = TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    let collapsed = text
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().trim_matches('|').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&collapsed, limit)
}

/// The document title, if present.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .map(|c| collapse_inline(&decode_entities(&c[1])))
        .filter(|t| !t.is_empty())
}

/// Result links from a DuckDuckGo HTML results page.
pub fn parse_search_results(html: &str, max: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::new();
    for anchor in ANCHOR.captures_iter(html) {
        let attrs = &anchor[1];
        if !attrs.contains("result__a") {
            continue;
        }
        let Some(href) = HREF.captures(attrs).map(|c| decode_entities(&c[1])) else {
            continue;
        };
        let Some(url) = resolve_result_url(&href) else {
            continue;
        };
        if hits.iter().any(|h| h.url == url) {
            continue;
        }
        let title = collapse_inline(&decode_entities(&TAG.replace_all(&anchor[2], "")));
        hits.push(SearchHit { title, url });
        if hits.len() >= max {
            break;
        }
    }
    hits
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=...`) and drop
/// ad links.
fn resolve_result_url(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    let is_ddg = url
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));
    if !is_ddg {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }
    if url.path() != "/l/" {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "ndash" => Some('–'),
                    "mdash" => Some('—'),
                    "deg" => Some('°'),
                    "times" => Some('×'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn collapse_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
