//! Listing extraction from a rendered search results page.
//!
//! Everything here is synchronous and works on an HTML string, so the
//! browser session only ever hands over `page.content()` and the parsing
//! rules stay testable against fixtures.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::ingest::models::{ExtractedListing, StopReason, MISSING_TEXT, MISSING_URL};

#[derive(Debug, Error)]
#[error("Invalid CSS selector '{selector}': {reason}")]
pub struct InvalidSelector {
    pub selector: String,
    pub reason: String,
}

/// CSS selectors describing one listing card and the pagination control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSelectors {
    pub card: String,
    pub title: String,
    pub organization: String,
    pub location: String,
    pub link: String,
    pub next_control: String,
}

impl Default for ListingSelectors {
    /// Public LinkedIn job search markup.
    fn default() -> Self {
        Self {
            card: "ul.jobs-search__results-list li".to_string(),
            title: ".base-search-card__title".to_string(),
            organization: ".base-search-card__subtitle a".to_string(),
            location: ".job-search-card__location".to_string(),
            link: ".base-card__full-link".to_string(),
            next_control: r#"button[aria-label="Next"]"#.to_string(),
        }
    }
}

/// Selectors parsed once at startup; an invalid selector fails configuration.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    source: ListingSelectors,
    card: Selector,
    title: Selector,
    organization: Selector,
    location: Selector,
    link: Selector,
}

impl CompiledSelectors {
    pub fn compile(selectors: &ListingSelectors) -> Result<Self, InvalidSelector> {
        // next_control is handed to the browser as-is, but must still be valid CSS
        compile_one(&selectors.next_control)?;
        Ok(Self {
            card: compile_one(&selectors.card)?,
            title: compile_one(&selectors.title)?,
            organization: compile_one(&selectors.organization)?,
            location: compile_one(&selectors.location)?,
            link: compile_one(&selectors.link)?,
            source: selectors.clone(),
        })
    }

    pub fn next_control(&self) -> &str {
        &self.source.next_control
    }
}

fn compile_one(selector: &str) -> Result<Selector, InvalidSelector> {
    Selector::parse(selector).map_err(|e| InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Extracts at most `cap` listings from a results page.
///
/// Never fails on a malformed card: missing sub-fields fall back to the
/// sentinels on `ExtractedListing::default()`.
pub fn parse_listings(
    html: &str,
    page_url: &str,
    cap: usize,
    selectors: &CompiledSelectors,
) -> Vec<ExtractedListing> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    document
        .select(&selectors.card)
        .take(cap)
        .map(|card| ExtractedListing {
            title: select_text(card, &selectors.title),
            organization: select_text(card, &selectors.organization),
            location: select_text(card, &selectors.location),
            source_url: select_href(card, &selectors.link, base.as_ref()),
            ..ExtractedListing::default()
        })
        .collect()
}

/// Number of listing cards currently in the page.
pub fn count_listings(html: &str, selectors: &CompiledSelectors) -> usize {
    Html::parse_document(html).select(&selectors.card).count()
}

/// Identifies which result set a page is showing: the card count plus the
/// first card's link. `None` when the page has no cards.
pub fn fingerprint(html: &str, selectors: &CompiledSelectors) -> Option<String> {
    let document = Html::parse_document(html);
    let mut cards = document.select(&selectors.card).peekable();
    let first = *cards.peek()?;
    let first_link = first
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or(MISSING_URL)
        .to_string();
    let count = cards.count();
    Some(format!("{count}:{first_link}"))
}

const ANTI_AUTOMATION_MARKERS: &[&str] = &[
    "authwall",
    "captcha",
    "checkpoint/challenge",
    "security verification",
    "unusual activity",
];

/// Decides why a page has no listings, from its document status and content.
pub fn classify_stop(status: Option<u16>, html: &str) -> StopReason {
    match status {
        // 999 is what LinkedIn answers to clients it has flagged as bots
        Some(code @ (429 | 999)) => {
            return StopReason::TransientFailure(format!("source throttled the session (HTTP {code})"))
        }
        Some(code) if code >= 500 => {
            return StopReason::TransientFailure(format!("source server error (HTTP {code})"))
        }
        Some(code) if code >= 400 => {
            return StopReason::FatalFailure(format!("source rejected the request (HTTP {code})"))
        }
        _ => {}
    }

    let lowered = html.to_lowercase();
    if let Some(marker) = ANTI_AUTOMATION_MARKERS
        .iter()
        .find(|m| lowered.contains(*m))
    {
        return StopReason::TransientFailure(format!(
            "anti-automation page detected ({marker})"
        ));
    }

    StopReason::EndOfResults
}

fn select_text(card: ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| MISSING_TEXT.to_string())
}

fn select_href(card: ElementRef<'_>, selector: &Selector, base: Option<&Url>) -> String {
    card.select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .and_then(|href| match base {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        })
        .map(|url| url.to_string())
        .unwrap_or_else(|| MISSING_URL.to_string())
}
