//! Best-effort extraction of postings from rendered job-board markup.
//!
//! Job boards change their markup without notice, so every lookup is an
//! ordered fallback chain of CSS selectors: the first card pattern that
//! matches anything decides which elements are cards, and each field of a
//! card independently takes the first sub-pattern that yields a value.

use chrono::{DateTime, Utc};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::models::posting::{Posting, Source};

pub const COMPANY_NOT_FOUND: &str = "Company not found";
pub const LOCATION_NOT_SPECIFIED: &str = "Location not specified";

/// Selector patterns for one site, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSet {
    pub cards: &'static [&'static str],
    pub title: &'static [&'static str],
    pub company: &'static [&'static str],
    pub location: &'static [&'static str],
    pub salary: &'static [&'static str],
    pub link: &'static [&'static str],
}

pub struct Extractor {
    source: Source,
    cards: Vec<Selector>,
    title: Vec<Selector>,
    company: Vec<Selector>,
    location: Vec<Selector>,
    salary: Vec<Selector>,
    link: Vec<Selector>,
}

impl Extractor {
    pub fn new(source: Source, selectors: &SelectorSet) -> Self {
        Self {
            source,
            cards: compile(source, selectors.cards),
            title: compile(source, selectors.title),
            company: compile(source, selectors.company),
            location: compile(source, selectors.location),
            salary: compile(source, selectors.salary),
            link: compile(source, selectors.link),
        }
    }

    /// Extract postings from a document fetched from `page_url`.
    /// Cards missing a title or a link are dropped.
    pub fn extract(&self, html: &str, page_url: &str, discovered_at: DateTime<Utc>) -> Vec<Posting> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let cards = self.find_cards(&document);
        tracing::debug!(source = %self.source, cards = cards.len(), "Matched job cards");

        cards
            .into_iter()
            .enumerate()
            .filter_map(|(index, card)| match self.extract_card(card, base.as_ref(), discovered_at) {
                Ok(posting) => Some(posting),
                Err(reason) => {
                    tracing::debug!(source = %self.source, index, "Skipping card: {reason}");
                    None
                }
            })
            .collect()
    }

    fn find_cards<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.cards
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
            .unwrap_or_default()
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        base: Option<&Url>,
        discovered_at: DateTime<Utc>,
    ) -> Result<Posting, String> {
        let title = first_text(card, &self.title).ok_or("no title")?;
        let href = first_href(card, &self.link).ok_or("no link")?;
        let url = resolve(base, &href)?;

        Ok(Posting::new(
            self.source,
            title,
            first_text(card, &self.company).unwrap_or_else(|| COMPANY_NOT_FOUND.to_string()),
            first_text(card, &self.location).unwrap_or_else(|| LOCATION_NOT_SPECIFIED.to_string()),
            first_text(card, &self.salary),
            url,
            discovered_at,
        ))
    }
}

fn compile(source: Source, patterns: &[&str]) -> Vec<Selector> {
    patterns
        .iter()
        .filter_map(|pattern| match Selector::parse(pattern) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!(%source, "Ignoring invalid selector '{pattern}': {e}");
                None
            }
        })
        .collect()
}

/// Whitespace-collapsed text of the first element matched by the first
/// pattern that yields non-empty text.
fn first_text(card: ElementRef<'_>, patterns: &[Selector]) -> Option<String> {
    patterns.iter().find_map(|selector| {
        card.select(selector)
            .next()
            .map(|el| collapse_whitespace(el.text()))
            .filter(|text| !text.is_empty())
    })
}

/// First `href` found by the link patterns. A card that is itself an anchor
/// is the last resort.
fn first_href(card: ElementRef<'_>, patterns: &[Selector]) -> Option<String> {
    patterns
        .iter()
        .find_map(|selector| {
            card.select(selector)
                .find_map(|el| el.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .map(String::from)
        })
        .or_else(|| {
            (card.value().name() == "a")
                .then(|| card.value().attr("href"))
                .flatten()
                .map(|href| href.trim().to_string())
                .filter(|href| !href.is_empty())
        })
}

fn resolve(base: Option<&Url>, href: &str) -> Result<String, String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    match resolved {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.to_string()),
        Ok(url) => Err(format!("unsupported link scheme '{}'", url.scheme())),
        Err(e) => Err(format!("bad link '{href}': {e}")),
    }
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
