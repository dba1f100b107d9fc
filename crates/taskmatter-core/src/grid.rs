//! Week and month grids of day cells.

use chrono::{Datelike, Duration, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::bucket::BucketMap;
use crate::datetime::shift_months;

pub const DAYS_PER_WEEK: usize = 7;

const WEEK_LABEL_FORMAT: &str = "%A, %b %-d";
const MONTH_LABEL_FORMAT: &str = "%-d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// One day in a grid: a label and the formatted task lines under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub label: String,
    pub lines: Vec<String>,
    pub width: usize,
}

impl DayCell {
    pub fn new(label: impl Into<String>, lines: Vec<String>) -> Self {
        let label = label.into();
        let width = lines
            .iter()
            .map(|line| display_width(line))
            .chain(std::iter::once(display_width(&label)))
            .max()
            .unwrap_or(0);
        Self {
            label,
            lines,
            width,
        }
    }

    pub fn header(label: impl Into<String>) -> Self {
        Self::new(label, Vec::new())
    }

    pub fn has_tasks(&self) -> bool {
        !self.lines.is_empty()
    }

    /// A copy padded to `width` columns and `height` lines. Task lines are
    /// always left aligned; `label_align` places the label.
    #[must_use]
    pub fn padded(&self, width: usize, height: usize, label_align: Align) -> DayCell {
        let width = width.max(self.width);
        let mut lines: Vec<String> = self.lines.iter().map(|line| pad(line, width, Align::Left)).collect();
        lines.resize(height.max(self.lines.len()), " ".repeat(width));

        DayCell {
            label: pad(&self.label, width, label_align),
            lines,
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekGrid {
    pub days: Vec<DayCell>,
}

impl WeekGrid {
    pub fn has_tasks(&self) -> bool {
        self.days.iter().any(DayCell::has_tasks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub title: String,
    pub headers: Vec<DayCell>,
    pub weeks: Vec<Vec<DayCell>>,
}

impl MonthGrid {
    pub fn has_tasks(&self) -> bool {
        self.weeks.iter().flatten().any(DayCell::has_tasks)
    }

    pub fn column_has_tasks(&self, column: usize) -> bool {
        self.weeks
            .iter()
            .any(|week| week.get(column).is_some_and(DayCell::has_tasks))
    }
}

/// The Sunday on or before `today`, moved by `offset` whole weeks. `None`
/// when that week does not fit in the calendar.
pub fn week_start(today: NaiveDate, offset: i64) -> Option<NaiveDate> {
    let back = i64::from(today.weekday().num_days_from_sunday());
    let sunday = today.checked_sub_signed(Duration::days(back))?;
    let start = sunday.checked_add_signed(Duration::try_weeks(offset)?)?;
    start.checked_add_signed(Duration::days(6))?;
    Some(start)
}

/// Calendar span of a month view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub grid_start: NaiveDate,
    pub grid_end: NaiveDate,
}

impl MonthSpan {
    /// The month containing `today`, moved by `offset` whole months. `None`
    /// when any day of the span falls outside the calendar.
    pub fn new(today: NaiveDate, offset: i32) -> Option<Self> {
        let first = shift_months(today.with_day(1)?, offset)?;
        let last = shift_months(first, 1)?.pred_opt()?;

        let lead = i64::from(first.weekday().num_days_from_sunday());
        let tail = 6 - i64::from(last.weekday().num_days_from_sunday());
        Some(Self {
            first,
            last,
            grid_start: first.checked_sub_signed(Duration::days(lead))?,
            grid_end: last.checked_add_signed(Duration::days(tail))?,
        })
    }

    pub fn week_count(&self) -> usize {
        let days = (self.grid_end - self.grid_start).num_days() + 1;
        usize::try_from(days).unwrap_or(0) / DAYS_PER_WEEK
    }

    pub fn week_starts(&self) -> impl Iterator<Item = NaiveDate> {
        self.grid_start
            .iter_weeks()
            .take(self.week_count())
    }
}

#[tracing::instrument(level = "debug", skip(buckets))]
pub fn build_week(
    buckets: &BucketMap<'_>,
    today: NaiveDate,
    offset: i64,
    include_done: bool,
) -> Option<WeekGrid> {
    let start = week_start(today, offset)?;
    let days = start
        .iter_days()
        .take(DAYS_PER_WEEK)
        .map(|day| {
            DayCell::new(
                day.format(WEEK_LABEL_FORMAT).to_string(),
                day_lines(buckets, day, include_done),
            )
        })
        .collect();
    Some(WeekGrid { days })
}

#[tracing::instrument(level = "debug", skip(buckets))]
pub fn build_month(
    buckets: &BucketMap<'_>,
    today: NaiveDate,
    offset: i32,
    include_done: bool,
) -> Option<MonthGrid> {
    let span = MonthSpan::new(today, offset)?;

    let weeks: Vec<Vec<DayCell>> = span
        .week_starts()
        .map(|sunday| {
            let week: Vec<DayCell> = sunday
                .iter_days()
                .take(DAYS_PER_WEEK)
                .map(|day| {
                    DayCell::new(
                        day.format(MONTH_LABEL_FORMAT).to_string(),
                        day_lines(buckets, day, include_done),
                    )
                })
                .collect();
            assert_eq!(week.len(), DAYS_PER_WEEK, "week row must have seven days");
            week
        })
        .collect();

    let headers = span
        .grid_start
        .iter_days()
        .take(DAYS_PER_WEEK)
        .map(|day| DayCell::header(day.format("%A").to_string()))
        .collect();

    Some(MonthGrid {
        title: span.first.format("%B").to_string(),
        headers,
        weeks,
    })
}

fn day_lines(buckets: &BucketMap<'_>, day: NaiveDate, include_done: bool) -> Vec<String> {
    buckets
        .get(day)
        .iter()
        .filter(|scheduled| include_done || !scheduled.record.is_done())
        .map(|scheduled| scheduled.display())
        .collect()
}

pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(display_width(text)));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}
