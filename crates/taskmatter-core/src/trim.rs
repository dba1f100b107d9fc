use tracing::trace;

use crate::grid::{DayCell, MonthGrid, WeekGrid};

/// Drops empty days from both ends of the week.
#[must_use]
pub fn trim_week(grid: WeekGrid) -> WeekGrid {
    let WeekGrid { mut days } = grid;
    let Some(first) = days.iter().position(DayCell::has_tasks) else {
        return WeekGrid { days: Vec::new() };
    };
    let last = days.iter().rposition(DayCell::has_tasks).unwrap_or(first);

    days.truncate(last + 1);
    days.drain(..first);
    trace!(kept = days.len(), "trimmed week");
    WeekGrid { days }
}

/// Drops weekday columns with no tasks in any week from both edges, then
/// weeks with no tasks from the top and bottom.
#[must_use]
pub fn trim_month(grid: MonthGrid) -> MonthGrid {
    let columns = grid.headers.len();
    let first_col = (0..columns).find(|&col| grid.column_has_tasks(col));
    let last_col = (0..columns).rev().find(|&col| grid.column_has_tasks(col));

    let MonthGrid {
        title,
        mut headers,
        mut weeks,
    } = grid;

    let (Some(first_col), Some(last_col)) = (first_col, last_col) else {
        return MonthGrid {
            title,
            headers: Vec::new(),
            weeks: Vec::new(),
        };
    };

    keep_range(&mut headers, first_col, last_col);
    for week in &mut weeks {
        keep_range(week, first_col, last_col);
    }

    let week_has_tasks = |week: &Vec<DayCell>| week.iter().any(DayCell::has_tasks);
    let first_row = weeks.iter().position(week_has_tasks).unwrap_or(0);
    let last_row = weeks.iter().rposition(week_has_tasks).unwrap_or(first_row);
    keep_range(&mut weeks, first_row, last_row);

    trace!(
        columns = headers.len(),
        weeks = weeks.len(),
        "trimmed month"
    );
    MonthGrid {
        title,
        headers,
        weeks,
    }
}

fn keep_range<T>(items: &mut Vec<T>, first: usize, last: usize) {
    items.truncate(last + 1);
    items.drain(..first.min(items.len()));
}
