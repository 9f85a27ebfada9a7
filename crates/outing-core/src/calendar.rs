use chrono::{Datelike, Days, NaiveDate};

use crate::datetime::{MonthCursor, days_in_month, first_weekday_index};
use crate::event::Event;

pub const DAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const GRID_CELLS: usize = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    PreviousMonth,
    CurrentMonth,
    NextMonth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub kind: CellKind,
    pub has_event: bool,
    pub selected: bool,
}

impl CalendarCell {
    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// Adjacent-month cells are display-only.
    pub fn is_interactive(&self) -> bool {
        self.kind == CellKind::CurrentMonth
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    pub title: String,
    pub headers: [&'static str; 7],
    pub cells: Vec<CalendarCell>,
}

impl CalendarGrid {
    pub fn cells_of(&self, kind: CellKind) -> impl Iterator<Item = &CalendarCell> {
        self.cells.iter().filter(move |cell| cell.kind == kind)
    }

    pub fn event_day_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.has_event).count()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(DAY_HEADERS.len())
    }
}

/// Builds the Sunday-first month grid shown by both the dashboard and the
/// creation date picker. `selected` only flags a current-month cell.
#[tracing::instrument(skip(events), fields(month = %cursor.title(), events = events.len()))]
pub fn build_month_grid(
    cursor: MonthCursor,
    events: &[Event],
    selected: Option<NaiveDate>,
) -> CalendarGrid {
    let first = cursor.first_day();
    let leading = u64::from(first_weekday_index(first));
    let month_days = u64::from(days_in_month(first));

    let grid_start = first.checked_sub_days(Days::new(leading)).unwrap_or(first);

    let mut cells = Vec::with_capacity(GRID_CELLS);
    for offset in 0..GRID_CELLS as u64 {
        let Some(date) = grid_start.checked_add_days(Days::new(offset)) else {
            break;
        };
        let kind = if offset < leading {
            CellKind::PreviousMonth
        } else if offset < leading + month_days {
            CellKind::CurrentMonth
        } else {
            CellKind::NextMonth
        };

        let current = kind == CellKind::CurrentMonth;
        let has_event = current && events.iter().any(|event| event.is_on(date));
        cells.push(CalendarCell {
            date,
            kind,
            has_event,
            selected: current && selected == Some(date),
        });
    }

    tracing::trace!(cells = cells.len(), leading, month_days, "built month grid");
    CalendarGrid {
        title: cursor.title(),
        headers: DAY_HEADERS,
        cells,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::event::RawEvent;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event_on(id: u64, date: Option<NaiveDate>) -> Event {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({ "id": id }))
            .expect("raw event");
        Event::from_raw(raw, date)
    }

    #[test]
    fn february_2024_layout() {
        let cursor = MonthCursor::from_year_month0(2024, 1).expect("month");
        let grid = build_month_grid(cursor, &[], None);

        assert_eq!(grid.title, "February 2024");
        assert_eq!(grid.headers, DAY_HEADERS);
        assert_eq!(grid.cells.len(), GRID_CELLS);
        assert_eq!(grid.cells_of(CellKind::PreviousMonth).count(), 4);
        assert_eq!(grid.cells_of(CellKind::CurrentMonth).count(), 29);
        assert_eq!(grid.cells_of(CellKind::NextMonth).count(), 9);

        let leading: Vec<u32> = grid.cells_of(CellKind::PreviousMonth).map(|c| c.day()).collect();
        assert_eq!(leading, vec![28, 29, 30, 31]);
        let trailing: Vec<u32> = grid.cells_of(CellKind::NextMonth).map(|c| c.day()).collect();
        assert_eq!(trailing, (1..=9).collect::<Vec<_>>());
        assert!(grid.cells_of(CellKind::NextMonth).all(|c| !c.is_interactive()));
    }

    #[test]
    fn every_month_has_forty_two_cells() {
        let mut cursor = MonthCursor::from_year_month0(1999, 0).expect("month");
        for _ in 0..(12 * 40) {
            let grid = build_month_grid(cursor, &[], None);
            assert_eq!(grid.cells.len(), GRID_CELLS, "{}", grid.title);
            assert_eq!(
                grid.cells_of(CellKind::CurrentMonth).count() as u32,
                days_in_month(cursor.first_day())
            );
            assert_eq!(grid.rows().count(), 6);
            cursor = cursor.next();
        }
    }

    #[test]
    fn has_event_counts_distinct_days_in_month_only() {
        let events = vec![
            event_on(1, Some(ymd(2024, 3, 5))),
            event_on(2, Some(ymd(2024, 3, 5))),
            event_on(3, Some(ymd(2024, 3, 31))),
            event_on(4, Some(ymd(2024, 4, 1))),
            event_on(5, Some(ymd(2023, 3, 5))),
            event_on(6, None),
        ];
        let cursor = MonthCursor::from_year_month0(2024, 2).expect("month");
        let grid = build_month_grid(cursor, &events, None);

        let expected: BTreeSet<NaiveDate> = events
            .iter()
            .filter_map(|e| e.date)
            .filter(|d| cursor.contains(*d))
            .collect();
        assert_eq!(grid.event_day_count(), expected.len());
        assert_eq!(grid.event_day_count(), 2);

        // April 1st shows as a trailing cell but stays unflagged.
        let trailing_first = grid
            .cells_of(CellKind::NextMonth)
            .next()
            .expect("trailing cells");
        assert_eq!(trailing_first.date, ymd(2024, 4, 1));
        assert!(!trailing_first.has_event);
    }

    #[test]
    fn selected_flag_marks_only_the_chosen_day() {
        let cursor = MonthCursor::from_year_month0(2024, 2).expect("month");
        let grid = build_month_grid(cursor, &[], Some(ymd(2024, 3, 15)));
        let selected: Vec<NaiveDate> =
            grid.cells.iter().filter(|c| c.selected).map(|c| c.date).collect();
        assert_eq!(selected, vec![ymd(2024, 3, 15)]);

        let other = build_month_grid(cursor, &[], Some(ymd(2024, 4, 2)));
        assert!(other.cells.iter().all(|c| !c.selected));
    }
}
