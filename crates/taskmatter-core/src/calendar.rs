use chrono::NaiveDate;
use tracing::info;

use crate::bucket::{BucketMap, resolve_record};
use crate::datetime::DateResolver;
use crate::format::format_task;
use crate::grid::{build_month, build_week};
use crate::record::Record;
use crate::render::Renderer;
use crate::trim::{trim_month, trim_week};

/// Week, month and someday views over a set of records, anchored at an
/// explicit `today`.
pub struct Calendar<'r, R: DateResolver + ?Sized> {
    resolver: &'r R,
    today: NaiveDate,
    renderer: Renderer,
}

impl<'r, R: DateResolver + ?Sized> Calendar<'r, R> {
    pub fn new(resolver: &'r R, today: NaiveDate) -> Self {
        Self {
            resolver,
            today,
            renderer: Renderer::default(),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// `None` when the offset week lies outside the representable calendar.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub fn render_week(
        &self,
        records: &[Record],
        week_offset: i64,
        include_done: bool,
        non_trimmed: bool,
    ) -> Option<String> {
        let buckets = BucketMap::build(records, self.resolver);
        let mut grid = build_week(&buckets, self.today, week_offset, include_done)?;
        if !non_trimmed {
            grid = trim_week(grid);
        }
        info!(days = grid.days.len(), "built week view");
        Some(self.renderer.render_week(&grid))
    }

    /// `None` when the offset month lies outside the representable calendar.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub fn render_month(
        &self,
        records: &[Record],
        month_offset: i32,
        include_done: bool,
        non_trimmed: bool,
    ) -> Option<String> {
        let buckets = BucketMap::build(records, self.resolver);
        let mut grid = build_month(&buckets, self.today, month_offset, include_done)?;
        if !non_trimmed {
            grid = trim_month(grid);
        }
        info!(
            weeks = grid.weeks.len(),
            columns = grid.headers.len(),
            "built month view"
        );
        Some(self.renderer.render_month(&grid))
    }

    /// One line per record without a resolvable `planned` or `due` date.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub fn format_someday(&self, records: &[Record], include_done: bool) -> Vec<String> {
        records
            .iter()
            .filter(|record| include_done || !record.is_done())
            .filter(|record| resolve_record(record, self.resolver).is_none())
            .map(|record| format_task(record, self.resolver, true))
            .collect()
    }
}
