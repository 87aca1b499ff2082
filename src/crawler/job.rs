//! Job model: one URL visit together with its crawl context
//!
//! A job carries a shared snapshot of the whole link plan plus the level it
//! is at; children are new values derived from their parent.

use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Priority added to a follow-link child relative to its parent
///
/// Lower values dequeue first, so every follow hop lands behind the page it
/// was discovered on.
pub const FOLLOW_PRIORITY_STEP: i32 = 1;

/// Priority added to a pagination child relative to its parent
///
/// Zero keeps every page of a paginated listing in the parent's tier, ahead of
/// the follow-link children found on any of those pages.
pub const PAGINATION_PRIORITY_STEP: i32 = 0;

/// How a selector string is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    #[default]
    Css,
}

/// Whether a plan level also walks a "next page" link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    PageOnly,
    PageWithPagination,
}

/// One level of the link plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPathSelector {
    /// Selector of the anchors to follow
    pub selector: String,
    pub selector_type: SelectorType,
    /// Selector of the "next page" anchor, if this level paginates
    pub pagination_selector: Option<String>,
}

impl LinkPathSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            selector_type: SelectorType::Css,
            pagination_selector: None,
        }
    }

    pub fn with_selector_type(mut self, selector_type: SelectorType) -> Self {
        self.selector_type = selector_type;
        self
    }

    /// Returns a copy of this level that also follows `pagination_selector`
    pub fn with_pagination(mut self, pagination_selector: impl Into<String>) -> Self {
        self.pagination_selector = Some(pagination_selector.into());
        self
    }

    pub fn page_type(&self) -> PageType {
        if self.pagination_selector.is_some() {
            PageType::PageWithPagination
        } else {
            PageType::PageOnly
        }
    }
}

/// An immutable unit of crawl work
#[derive(Debug, Clone)]
pub struct Job {
    base_url: Url,
    url: Url,
    plan: Arc<[LinkPathSelector]>,
    level: usize,
    depth: u32,
    priority: i32,
}

impl Job {
    /// Creates the seed job of a run: depth 0, priority 0, whole plan ahead
    pub fn seed(base_url: Url, url: Url, plan: Arc<[LinkPathSelector]>) -> Self {
        Self {
            base_url,
            url,
            plan,
            level: 0,
            depth: 0,
            priority: 0,
        }
    }

    /// Returns the same job re-prioritized
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The follow/paginate steps still applicable from this job onward
    pub fn link_plan(&self) -> &[LinkPathSelector] {
        self.plan.get(self.level..).unwrap_or(&[])
    }

    /// The plan level applied to this job's page, if any remains
    pub fn current_step(&self) -> Option<&LinkPathSelector> {
        self.link_plan().first()
    }

    /// Follow-link hops from the seed
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Derives the job for a link matched by the current step
    ///
    /// The child is one hop deeper and carries the plan advanced past the
    /// consumed step.
    pub fn follow_child(&self, url: Url) -> Job {
        Job {
            base_url: self.base_url.clone(),
            url,
            plan: Arc::clone(&self.plan),
            level: (self.level + 1).min(self.plan.len()),
            depth: self.depth + 1,
            priority: self.priority.saturating_add(FOLLOW_PRIORITY_STEP),
        }
    }

    /// Derives the job for the next page of the current step's listing
    ///
    /// Same depth, same plan level: the next page is walked with the same step.
    pub fn pagination_child(&self, url: Url) -> Job {
        Job {
            base_url: self.base_url.clone(),
            url,
            plan: Arc::clone(&self.plan),
            level: self.level,
            depth: self.depth,
            priority: self.priority.saturating_add(PAGINATION_PRIORITY_STEP),
        }
    }
}
