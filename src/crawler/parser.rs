//! HTML extraction for fetched pages
//!
//! This module handles:
//! - Turning a page into one record according to a field schema
//! - Deriving child jobs from the current step of a job's link plan
//! - Filtering discovered links (resolve, blacklist, tracker claim)
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so a parsed
//! document must never live across an await point.

use crate::crawler::job::Job;
use crate::crawler::tracker::CrawledLinkTracker;
use crate::output::Record;
use crate::url::{resolve_link, Blacklist};
use crate::ExtractError;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// How a field's matched element is turned into a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Trimmed inner text
    #[default]
    Text,
    /// Inner text parsed as a decimal number
    Number,
    /// Inner text parsed as `true`/`false`
    Boolean,
    /// The `src` attribute resolved to an absolute URL
    Image,
    /// Raw inner markup
    Html,
    /// Inner texts of every match, as an array
    List,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Image => "image",
            FieldKind::Html => "html",
            FieldKind::List => "list",
        }
    }
}

/// One named field of a schema
#[derive(Debug, Clone)]
pub struct SchemaField {
    name: String,
    selector_text: String,
    selector: Selector,
    kind: FieldKind,
}

impl SchemaField {
    /// Creates a field, failing if `selector` is not valid CSS
    pub fn new(
        name: impl Into<String>,
        selector: impl Into<String>,
        kind: FieldKind,
    ) -> Result<Self, ExtractError> {
        let selector_text = selector.into();
        let selector = compile_selector(&selector_text)?;
        Ok(Self {
            name: name.into(),
            selector_text,
            selector,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &str {
        &self.selector_text
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// Ordered set of fields extracted from every page
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn compile_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::InvalidSelector {
        selector: selector.to_string(),
    })
}

fn inner_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extracts one record from `document`
///
/// Fails on the first field whose element is missing or whose value does not
/// convert to the field's kind; the page then yields no record.
///
/// # Example
///
/// ```
/// use scraper::Html;
/// use sumi_harvest::crawler::{extract_record, FieldKind, Schema, SchemaField};
/// use url::Url;
///
/// let schema = Schema::new(vec![SchemaField::new("title", ".t", FieldKind::Text).unwrap()]);
/// let document = Html::parse_document(r#"<p class="t"> Hello </p>"#);
/// let page = Url::parse("https://example.test/item/1").unwrap();
///
/// let record = extract_record(&document, &schema, &page).unwrap();
/// assert_eq!(record.fields["title"], "Hello");
/// ```
pub fn extract_record(
    document: &Html,
    schema: &Schema,
    page_url: &Url,
) -> Result<Record, ExtractError> {
    let mut fields = Map::with_capacity(schema.len());

    for field in schema.fields() {
        let value = extract_field(document, field, page_url)?;
        fields.insert(field.name.clone(), value);
    }

    Ok(Record::new(page_url.as_str(), fields))
}

fn extract_field(
    document: &Html,
    field: &SchemaField,
    page_url: &Url,
) -> Result<Value, ExtractError> {
    let first = || {
        document
            .select(&field.selector)
            .next()
            .ok_or_else(|| ExtractError::ElementNotFound {
                field: field.name.clone(),
                selector: field.selector_text.clone(),
            })
    };

    let parse_error = |value: &str| ExtractError::FieldParse {
        field: field.name.clone(),
        value: value.to_string(),
        expected: field.kind.as_str(),
    };

    match field.kind {
        FieldKind::Text => Ok(Value::String(inner_text(first()?))),
        FieldKind::Number => {
            let text = inner_text(first()?);
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| parse_error(&text))
        }
        FieldKind::Boolean => {
            let text = inner_text(first()?);
            match text.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(parse_error(&text)),
            }
        }
        FieldKind::Image => {
            let element = first()?;
            let src = element.value().attr("src").unwrap_or_default().trim();
            if src.is_empty() {
                return Err(parse_error(src));
            }
            page_url
                .join(src)
                .map(|resolved| Value::String(resolved.to_string()))
                .map_err(|_| parse_error(src))
        }
        FieldKind::Html => Ok(Value::String(first()?.inner_html())),
        FieldKind::List => Ok(Value::Array(
            document
                .select(&field.selector)
                .map(|element| Value::String(inner_text(element)))
                .collect(),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Pagination,
    Follow,
}

/// Derives child jobs from the links of a page
///
/// Only the job's current plan step applies. Each candidate link goes through
/// resolve, then the blacklist, then a tracker claim; a link failing any of
/// them is dropped silently.
pub struct LinkExtractor {
    blacklist: Blacklist,
    tracker: Arc<dyn CrawledLinkTracker>,
    blacklisted: AtomicU64,
    duplicates: AtomicU64,
}

impl LinkExtractor {
    pub fn new(blacklist: Blacklist, tracker: Arc<dyn CrawledLinkTracker>) -> Self {
        Self {
            blacklist,
            tracker,
            blacklisted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn tracker(&self) -> &Arc<dyn CrawledLinkTracker> {
        &self.tracker
    }

    /// Links dropped because they matched the blacklist
    pub fn blacklisted_count(&self) -> u64 {
        self.blacklisted.load(Ordering::Relaxed)
    }

    /// Links dropped because they were already claimed
    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    /// Returns the child jobs of `job`, the pagination child first
    ///
    /// Anchors are collected up front; resolution and claiming happen lazily
    /// as the sequence is consumed, so a partially consumed sequence claims
    /// only what it yielded. An invalid selector skips its part of the step.
    pub fn extract_links<'a>(
        &'a self,
        document: &'a Html,
        job: &'a Job,
    ) -> impl Iterator<Item = Job> + 'a {
        let mut hrefs: Vec<(LinkKind, &'a str)> = Vec::new();

        if let Some(step) = job.current_step() {
            if let Some(pagination) = step.pagination_selector.as_deref() {
                if let Some(href) = self
                    .select_hrefs(document, pagination)
                    .into_iter()
                    .next()
                {
                    hrefs.push((LinkKind::Pagination, href));
                }
            }

            hrefs.extend(
                self.select_hrefs(document, &step.selector)
                    .into_iter()
                    .map(|href| (LinkKind::Follow, href)),
            );
        }

        hrefs.into_iter().filter_map(move |(kind, href)| {
            let url = self.admit(href, job.base_url())?;
            Some(match kind {
                LinkKind::Pagination => job.pagination_child(url),
                LinkKind::Follow => job.follow_child(url),
            })
        })
    }

    fn select_hrefs<'a>(&self, document: &'a Html, selector: &str) -> Vec<&'a str> {
        let selector = match compile_selector(selector) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!("Skipping link step: {}", e);
                return Vec::new();
            }
        };

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .collect()
    }

    fn admit(&self, href: &str, base_url: &Url) -> Option<Url> {
        let url = resolve_link(href, base_url)?;

        if self.blacklist.is_blocked(&url) {
            tracing::trace!("Blacklisted: {}", url);
            self.blacklisted.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if !self.tracker.try_claim(&url) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        Some(url)
    }
}
