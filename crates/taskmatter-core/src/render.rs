use std::io::{self, IsTerminal};

use tracing::debug;

use crate::grid::{Align, DayCell, MonthGrid, WeekGrid, display_width};

const HORIZONTAL: &str = "─";
const VERTICAL: &str = "│";
const BOLD: &str = "1";

/// Box-drawing glyphs for one horizontal rule: left end, column junction,
/// right end.
struct Rule(&'static str, &'static str, &'static str);

const TOP: Rule = Rule("┌", "┬", "┐");
const MIDDLE: Rule = Rule("├", "┼", "┤");
const BOTTOM: Rule = Rule("└", "┴", "┘");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    bold: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self { bold: true }
    }
}

impl Renderer {
    pub fn new(bold: bool) -> Self {
        Self { bold }
    }

    /// Bold styling only when color is enabled and stdout is a terminal.
    pub fn for_stdout(color: bool) -> Self {
        Self::new(color && io::stdout().is_terminal())
    }

    /// Box table with one column per day and the day labels as the header
    /// row. Empty when the grid has no task lines.
    #[tracing::instrument(level = "debug", skip_all, fields(days = grid.days.len()))]
    pub fn render_week(&self, grid: &WeekGrid) -> String {
        if !grid.has_tasks() {
            return String::new();
        }

        let height = block_height(&grid.days);
        let cells: Vec<DayCell> = grid
            .days
            .iter()
            .map(|day| day.padded(day.width, height, Align::Left))
            .collect();
        let widths: Vec<usize> = cells.iter().map(|cell| cell.width).collect();

        let mut lines = Vec::with_capacity(height + 4);
        lines.push(rule(&TOP, &widths));
        lines.push(row(cells.iter().map(|cell| cell.label.clone())));
        lines.push(rule(&MIDDLE, &widths));
        for idx in 0..height {
            lines.push(row(cells.iter().map(|cell| cell.lines[idx].clone())));
        }
        lines.push(rule(&BOTTOM, &widths));

        debug!(height, columns = widths.len(), "rendered week table");
        lines.join("\n")
    }

    /// Box table under a title bar, with a weekday header row and one block
    /// per week. Day numbers are right aligned and painted bold. Empty when
    /// the grid has no task lines.
    #[tracing::instrument(level = "debug", skip_all, fields(weeks = grid.weeks.len()))]
    pub fn render_month(&self, grid: &MonthGrid) -> String {
        if !grid.has_tasks() || grid.headers.is_empty() {
            return String::new();
        }

        let columns = grid.headers.len();
        for week in &grid.weeks {
            assert_eq!(
                week.len(),
                columns,
                "every week row must line up with the weekday header"
            );
        }

        let mut widths: Vec<usize> = (0..columns)
            .map(|col| {
                grid.weeks
                    .iter()
                    .map(|week| week[col].width)
                    .chain(std::iter::once(grid.headers[col].width))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let title_width = display_width(&grid.title);
        let inner = inner_width(&widths);
        if title_width > inner {
            if let Some(last) = widths.last_mut() {
                *last += title_width - inner;
            }
        }
        let inner = inner_width(&widths);

        let headers: Vec<DayCell> = grid
            .headers
            .iter()
            .zip(&widths)
            .map(|(header, &width)| header.padded(width, 0, Align::Left))
            .collect();

        let mut lines = Vec::new();
        lines.push(format!("┌{}┐", HORIZONTAL.repeat(inner)));
        lines.push(format!(
            "{VERTICAL}{}{}{VERTICAL}",
            grid.title,
            " ".repeat(inner - title_width)
        ));
        lines.push(rule(&Rule("├", "┬", "┤"), &widths));
        lines.push(row(headers.iter().map(|header| header.label.clone())));

        for week in &grid.weeks {
            let height = block_height(week);
            let cells: Vec<DayCell> = week
                .iter()
                .zip(&widths)
                .map(|(day, &width)| day.padded(width, height, Align::Right))
                .collect();

            lines.push(rule(&MIDDLE, &widths));
            lines.push(row(cells.iter().map(|cell| self.paint(&cell.label, BOLD))));
            for idx in 0..height {
                lines.push(row(cells.iter().map(|cell| cell.lines[idx].clone())));
            }
        }
        lines.push(rule(&BOTTOM, &widths));

        debug!(columns, weeks = grid.weeks.len(), "rendered month table");
        lines.join("\n")
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.bold {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Tallest cell in a row group.
pub fn block_height(cells: &[DayCell]) -> usize {
    cells.iter().map(|cell| cell.lines.len()).max().unwrap_or(0)
}

fn inner_width(widths: &[usize]) -> usize {
    widths.iter().sum::<usize>() + widths.len().saturating_sub(1)
}

fn rule(glyphs: &Rule, widths: &[usize]) -> String {
    let segments: Vec<String> = widths.iter().map(|&w| HORIZONTAL.repeat(w)).collect();
    format!("{}{}{}", glyphs.0, segments.join(glyphs.1), glyphs.2)
}

fn row<I>(cells: I) -> String
where
    I: Iterator<Item = String>,
{
    let cells: Vec<String> = cells.collect();
    format!("{VERTICAL}{}{VERTICAL}", cells.join(VERTICAL))
}

/// Visible text with SGR sequences removed.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi};
    use crate::grid::{DayCell, MonthGrid, WeekGrid, display_width};

    fn cell(label: &str, lines: &[&str]) -> DayCell {
        DayCell::new(label, lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn week_table_layout() {
        let grid = WeekGrid {
            days: vec![
                cell("Monday, Jan 5", &["[abc] Write"]),
                cell("Tuesday, Jan 6", &["[def] Review draft", "[ghi] Ship"]),
            ],
        };
        let out = Renderer::default().render_week(&grid);
        let expected = [
            "┌─────────────┬──────────────────┐",
            "│Monday, Jan 5│Tuesday, Jan 6    │",
            "├─────────────┼──────────────────┤",
            "│[abc] Write  │[def] Review draft│",
            "│             │[ghi] Ship        │",
            "└─────────────┴──────────────────┘",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn month_table_layout() {
        let grid = MonthGrid {
            title: "January".to_string(),
            headers: vec![DayCell::header("Thursday"), DayCell::header("Friday")],
            weeks: vec![
                vec![cell("1", &["[abc] New year"]), cell("2", &[])],
                vec![cell("8", &[]), cell("9", &["[xyz] Pay"])],
            ],
        };
        let out = Renderer::default().render_month(&grid);
        let expected = [
            "┌────────────────────────┐",
            "│January                 │",
            "├──────────────┬─────────┤",
            "│Thursday      │Friday   │",
            "├──────────────┼─────────┤",
            "│\x1b[1m             1\x1b[0m│\x1b[1m        2\x1b[0m│",
            "│[abc] New year│         │",
            "├──────────────┼─────────┤",
            "│\x1b[1m             8\x1b[0m│\x1b[1m        9\x1b[0m│",
            "│              │[xyz] Pay│",
            "└──────────────┴─────────┘",
        ]
        .join("\n");
        assert_eq!(out, expected);
        assert_eq!(
            strip_ansi(out.lines().nth(8).unwrap_or_default()),
            "│             8│        9│"
        );
    }

    #[test]
    fn month_rows_share_width() {
        let grid = MonthGrid {
            title: "September".to_string(),
            headers: vec![DayCell::header("Monday")],
            weeks: vec![vec![cell("14", &["[a] b"])]],
        };
        let out = Renderer::new(false).render_month(&grid);
        let widths: Vec<usize> = out.lines().map(display_width).collect();
        assert!(widths.iter().all(|w| *w == widths[0]), "{out}");
        assert!(out.contains("│September│"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn empty_grids_render_nothing() {
        let renderer = Renderer::default();
        assert_eq!(renderer.render_week(&WeekGrid { days: vec![] }), "");
        assert_eq!(
            renderer.render_week(&WeekGrid {
                days: vec![cell("Monday, Jan 5", &[])],
            }),
            ""
        );
        assert_eq!(
            renderer.render_month(&MonthGrid {
                title: "May".to_string(),
                headers: vec![],
                weeks: vec![],
            }),
            ""
        );
    }
}
