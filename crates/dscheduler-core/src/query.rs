//! Job listing: filter, sort and page.
//!
//! Two strategies produce the same pages. Page-then-detail windows the
//! identity set before loading anything and serves sorts and filters that
//! only need the name and group. Everything else (sorting by state, matching
//! on cron or state) loads every record first, then pages.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use dscheduler_config::{PagingMode, QueryConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinator::ConsistencyCoordinator;
use crate::error::StoreError;
use crate::model::{JobIdentity, JobRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Group,
    State,
}

impl SortField {
    /// Unknown fields fall back to [`SortField::Name`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "group" | "jobgroup" | "job_group" => SortField::Group,
            "state" | "status" | "triggerstate" | "trigger_state" => SortField::State,
            _ => SortField::Name,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortField::Name => "name",
            SortField::Group => "group",
            SortField::State => "state",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything but `desc` is ascending.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Name,
    Group,
    Cron,
    State,
}

impl SearchField {
    /// Unknown fields fall back to [`SearchField::Name`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "group" | "jobgroup" | "job_group" => SearchField::Group,
            "cron" | "cronexpression" | "cron_expression" => SearchField::Cron,
            "state" | "status" | "triggerstate" | "trigger_state" => SearchField::State,
            _ => SearchField::Name,
        }
    }

    fn needs_record(&self) -> bool {
        matches!(self, SearchField::Cron | SearchField::State)
    }
}

/// Listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuery {
    /// 1-based; clamped into range.
    pub page: usize,
    /// 0 selects the configured default.
    pub size: usize,
    pub sort: SortField,
    pub order: SortOrder,
    pub search: Option<String>,
    pub search_field: SearchField,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: 0,
            sort: SortField::Name,
            order: SortOrder::Asc,
            search: None,
            search_field: SearchField::Name,
        }
    }
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = field;
        self.order = order;
        self
    }

    pub fn search(mut self, term: impl Into<String>, field: SearchField) -> Self {
        self.search = Some(term.into());
        self.search_field = field;
        self
    }

    /// Lowercased search term, `None` when absent or blank.
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    /// Never less than 1.
    pub total_pages: usize,
}

/// Effective page index and item range for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub total_pages: usize,
    pub range: Range<usize>,
}

impl PageWindow {
    /// `size` must be non-zero.
    pub fn new(total_items: usize, page: usize, size: usize) -> Self {
        let size = size.max(1);
        let total_pages = total_items.div_ceil(size).max(1);
        let page = page.clamp(1, total_pages);
        let start = ((page - 1) * size).min(total_items);
        let end = (start + size).min(total_items);
        Self {
            page,
            total_pages,
            range: start..end,
        }
    }
}

/// How a listing is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Window the identities, then load only the page.
    PageThenDetail,
    /// Load every record, then filter, sort and window.
    LoadAll,
}

impl Strategy {
    pub fn plan(query: &JobQuery, mode: PagingMode) -> Self {
        if mode == PagingMode::LoadAll || query.sort == SortField::State {
            return Strategy::LoadAll;
        }
        if query.needle().is_some() && query.search_field.needs_record() {
            return Strategy::LoadAll;
        }
        Strategy::PageThenDetail
    }
}

fn compare_identities(a: &JobIdentity, b: &JobIdentity, field: SortField) -> Ordering {
    match field {
        SortField::Group => a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)),
        SortField::Name | SortField::State => a.cmp(b),
    }
}

fn compare_records(a: &JobRecord, b: &JobRecord, field: SortField) -> Ordering {
    let by_name = |a: &JobRecord, b: &JobRecord| {
        a.job_name
            .cmp(&b.job_name)
            .then_with(|| a.job_group.cmp(&b.job_group))
    };
    match field {
        SortField::Name => by_name(a, b),
        SortField::Group => a
            .job_group
            .cmp(&b.job_group)
            .then_with(|| a.job_name.cmp(&b.job_name)),
        SortField::State => a
            .trigger_state
            .as_str()
            .cmp(b.trigger_state.as_str())
            .then_with(|| by_name(a, b)),
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn identity_matches(identity: &JobIdentity, field: SearchField, needle: &str) -> bool {
    match field {
        SearchField::Group => identity.group.to_lowercase().contains(needle),
        _ => identity.name.to_lowercase().contains(needle),
    }
}

fn record_matches(record: &JobRecord, field: SearchField, needle: &str) -> bool {
    let haystack = match field {
        SearchField::Name => record.job_name.to_lowercase(),
        SearchField::Group => record.job_group.to_lowercase(),
        SearchField::Cron => record
            .cron_expression
            .as_deref()
            .unwrap_or_default()
            .to_lowercase(),
        SearchField::State => record.trigger_state.as_str().to_lowercase(),
    };
    haystack.contains(needle)
}

/// Builds pages of [`JobRecord`]s from the coordinator's view.
pub struct QueryAssembler {
    coordinator: Arc<ConsistencyCoordinator>,
    config: QueryConfig,
}

impl QueryAssembler {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>, config: QueryConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    fn effective_size(&self, requested: usize) -> usize {
        match requested {
            0 => self.config.default_page_size.max(1),
            n => n.min(self.config.max_page_size.max(1)),
        }
    }

    pub fn strategy(&self, query: &JobQuery) -> Strategy {
        Strategy::plan(query, self.config.paging)
    }

    /// Reconcile the key set, then build the requested page.
    ///
    /// Only the key set read can fail the listing; per-job load failures
    /// drop that job.
    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Page<JobRecord>, StoreError> {
        let pass = self.coordinator.reconcile().await?;
        let forced = pass.forced();
        let size = self.effective_size(query.size);
        let needle = query.needle();
        let strategy = self.strategy(query);

        let page = match strategy {
            Strategy::PageThenDetail => {
                let mut identities: Vec<JobIdentity> = pass
                    .keys
                    .into_iter()
                    .filter(|id| {
                        needle
                            .as_deref()
                            .is_none_or(|n| identity_matches(id, query.search_field, n))
                    })
                    .collect();
                identities.sort_by(|a, b| {
                    directed(compare_identities(a, b, query.sort), query.order)
                });

                let window = PageWindow::new(identities.len(), query.page, size);
                let total_items = identities.len();
                let selected = identities[window.range.clone()].to_vec();
                let content = self.coordinator.load_records(selected, forced).await;

                Page {
                    content,
                    current_page: window.page,
                    page_size: size,
                    total_items,
                    total_pages: window.total_pages,
                }
            }
            Strategy::LoadAll => {
                let mut records = self
                    .coordinator
                    .load_records(pass.keys.into_iter().collect(), forced)
                    .await;
                if let Some(needle) = needle.as_deref() {
                    records.retain(|r| record_matches(r, query.search_field, needle));
                }
                records.sort_by(|a, b| {
                    directed(compare_records(a, b, query.sort), query.order)
                });

                let window = PageWindow::new(records.len(), query.page, size);
                let total_items = records.len();
                let content: Vec<JobRecord> = records
                    .into_iter()
                    .skip(window.range.start)
                    .take(window.range.len())
                    .collect();

                Page {
                    content,
                    current_page: window.page,
                    page_size: size,
                    total_items,
                    total_pages: window.total_pages,
                }
            }
        };

        for stats in self.coordinator.cache_stats() {
            debug!(
                cache = %stats.name,
                entries = stats.entries,
                hits = stats.hits,
                misses = stats.misses,
                loads = stats.loads,
                "Cache stats"
            );
        }
        debug!(
            ?strategy,
            forced,
            page = page.current_page,
            items = page.content.len(),
            total = page.total_items,
            "Listed jobs"
        );

        Ok(page)
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
