//! Markup extraction: turns one fetched page into candidate findings
//! (emails, contact forms) and a bounded list of links worth following.

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{
    CrawlConfig, DEFAULT_MAX_NEXT_LINKS, DEFAULT_MIN_FORM_CONFIDENCE, DEFAULT_NEXT_LINK_PATH_PATTERN,
};
use crate::contact::Finding;
use crate::domain_utils::email_domain;
use crate::fetcher::FetchedPage;
use crate::scorer::{contains_privacy_keyword, score_email, score_form};

const MAILTO_CONTEXT_CHARS: usize = 200;
const BODY_CONTEXT_CHARS: usize = 500;
const FORM_CONTEXT_CHARS: usize = 400;
const MAX_CONTAINER_DEPTH: usize = 10;

/// Anchor text that marks a link as worth following, beyond the scoring vocabulary.
const LINK_TEXT_KEYWORDS: &[&str] = &["contact", "legal", "imprint", "impressum", "privacybeleid"];

/// Ancestors that count as a form's "container" for context.
const CONTAINER_TAGS: &[&str] = &["section", "article", "main", "div", "fieldset", "aside", "body"];

/// Text under these elements is not visible body text.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

// Safety: all selector and regex strings below are compile-time constants,
// so the unwraps can only fail on a typo caught by the unit tests.
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").unwrap()
});

static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("form").unwrap()
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").unwrap()
});

/// Email addresses not immediately followed by another alphanumeric character.
static EMAIL_PATTERN: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}(?![A-Za-z0-9])").unwrap()
});

static DEFAULT_LINK_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DEFAULT_NEXT_LINK_PATH_PATTERN).unwrap()
});

/// Page content the crawler could not interpret as markup.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },
}

/// Everything one page contributed.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub findings: Vec<Finding>,
    pub next_links: Vec<Url>,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    max_next_links: usize,
    min_form_confidence: u8,
    link_path_pattern: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            max_next_links: DEFAULT_MAX_NEXT_LINKS,
            min_form_confidence: DEFAULT_MIN_FORM_CONFIDENCE,
            link_path_pattern: DEFAULT_LINK_PATH_PATTERN.clone(),
        }
    }
}

impl Extractor {
    pub fn new(max_next_links: usize, min_form_confidence: u8, link_path_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            max_next_links,
            min_form_confidence,
            link_path_pattern: Regex::new(link_path_pattern)?,
        })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, regex::Error> {
        Self::new(config.max_next_links, config.min_form_confidence, &config.next_link_path_pattern)
    }

    /// Extract from a fetched page, rejecting bodies that are not markup.
    pub fn extract_page(&self, page: &FetchedPage, target_domain: &str) -> Result<PageExtraction, ParseError> {
        if let Some(content_type) = &page.content_type {
            if !is_markup_content_type(content_type) {
                return Err(ParseError::UnsupportedContentType {
                    url: page.url.to_string(),
                    content_type: content_type.clone(),
                });
            }
        }
        Ok(self.extract(&page.body, &page.url, target_domain))
    }

    /// Parse `html` into findings and next-link candidates.
    ///
    /// Email findings are scored against `target_domain` but not filtered
    /// here; the crawler decides which ones belong to the target.
    pub fn extract(&self, html: &str, base_url: &Url, target_domain: &str) -> PageExtraction {
        let document = Html::parse_document(html);
        let mut findings = Vec::new();
        // Index into `findings` per address; a later scan only replaces an
        // earlier finding when it scores higher.
        let mut email_slots: HashMap<String, usize> = HashMap::new();

        for anchor in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = anchor.value().attr("href") else { continue };
            let Some(email) = parse_mailto(href) else { continue };

            let mut context = collapse_whitespace(anchor.text());
            if context.is_empty() {
                context = anchor
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(|parent| collapse_whitespace(parent.text()))
                    .unwrap_or_default();
            }
            let context = truncate_chars(&context, MAILTO_CONTEXT_CHARS);
            let confidence = score_email(&email, &context, target_domain);
            debug!("mailto {} on {} scored {}", email, base_url, confidence);
            keep_best_email(&mut findings, &mut email_slots, Finding::email(email, confidence, context));
        }

        let body_text = visible_body_text(&document);
        let body_context = truncate_chars(&body_text, BODY_CONTEXT_CHARS);
        for found in EMAIL_PATTERN.find_iter(&body_text) {
            let found = match found {
                Ok(m) => m,
                Err(e) => {
                    warn!("email scan aborted on {}: {}", base_url, e);
                    break;
                }
            };
            let email = found.as_str().to_lowercase();
            let confidence = score_email(&email, &body_context, target_domain);
            debug!("inline email {} on {} scored {}", email, base_url, confidence);
            keep_best_email(&mut findings, &mut email_slots, Finding::email(email, confidence, body_context.clone()));
        }

        for form in document.select(&FORM_SELECTOR) {
            let target = resolve_form_action(form.value().attr("action"), base_url);
            let context = truncate_chars(&form_container_text(&form), FORM_CONTEXT_CHARS);
            let confidence = score_form(&context);
            if confidence < self.min_form_confidence {
                debug!("form {} on {} dropped (score {})", target, base_url, confidence);
                continue;
            }
            findings.push(Finding::form(target.to_string(), confidence, context));
        }

        let next_links = self.next_links(&document, base_url);

        PageExtraction { findings, next_links }
    }

    fn next_links(&self, document: &Html, base_url: &Url) -> Vec<Url> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&ANCHOR_SELECTOR) {
            if links.len() >= self.max_next_links {
                break;
            }
            let Some(href) = anchor.value().attr("href") else { continue };
            let Some(url) = resolve_link(href, base_url) else { continue };

            let text = collapse_whitespace(anchor.text()).to_lowercase();
            let relevant = contains_privacy_keyword(&text)
                || LINK_TEXT_KEYWORDS.iter().any(|kw| text.contains(kw))
                || self.link_path_pattern.is_match(url.path());
            if !relevant {
                continue;
            }

            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }

        links
    }
}

/// One finding per address: the first sighting keeps its place in document
/// order and is swapped for a later one only on a strictly higher score.
fn keep_best_email(findings: &mut Vec<Finding>, slots: &mut HashMap<String, usize>, candidate: Finding) {
    match slots.get(&candidate.value) {
        Some(&idx) => {
            if candidate.confidence > findings[idx].confidence {
                findings[idx] = candidate;
            }
        }
        None => {
            slots.insert(candidate.value.clone(), findings.len());
            findings.push(candidate);
        }
    }
}

fn is_markup_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("html") || ct.contains("xml") || ct.starts_with("text/")
}

/// Decode a `mailto:` href into a bare lowercase address.
pub fn parse_mailto(href: &str) -> Option<String> {
    let href = href.trim();
    let scheme = href.get(..7)?;
    if !scheme.eq_ignore_ascii_case("mailto:") {
        return None;
    }

    let target = href[7..].split('?').next().unwrap_or("");
    let decoded = urlencoding::decode(target)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| target.to_string());

    let first = decoded.split(',').next().unwrap_or("").trim();
    let cleaned = first
        .trim_start_matches(|c: char| matches!(c, '<' | '(' | '"' | '\''))
        .trim_end_matches(|c: char| {
            matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '>' | '"' | '\'')
        })
        .to_lowercase();

    let domain = email_domain(&cleaned)?;
    if !domain.contains('.') || cleaned.chars().any(char::is_whitespace) {
        return None;
    }
    Some(cleaned)
}

fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:") {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn resolve_form_action(action: Option<&str>, base_url: &Url) -> Url {
    let action = action.map(str::trim).filter(|a| !a.is_empty());
    let resolved = action
        .and_then(|a| base_url.join(a).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"));

    let mut url = resolved.unwrap_or_else(|| base_url.clone());
    url.set_fragment(None);
    url
}

/// Text of the nearest enclosing container of a form, or the form itself.
fn form_container_text(form: &ElementRef) -> String {
    let mut current = form.parent();
    let mut depth = 0;

    while let Some(node) = current {
        if depth >= MAX_CONTAINER_DEPTH {
            break;
        }
        if let Some(element) = ElementRef::wrap(node) {
            if CONTAINER_TAGS.contains(&element.value().name()) {
                return collapse_whitespace(element.text());
            }
        }
        current = node.parent();
        depth += 1;
    }

    collapse_whitespace(form.text())
}

/// Body text with script/style content removed and whitespace collapsed.
fn visible_body_text(document: &Html) -> String {
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| HIDDEN_TAGS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    collapse_whitespace(parts.into_iter())
}

fn collapse_whitespace<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for fragment in fragments {
        for word in fragment.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
