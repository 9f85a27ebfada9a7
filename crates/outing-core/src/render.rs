use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarGrid, CellKind};
use crate::config::Config;
use crate::creation::CreationUpdate;
use crate::finder::FinderEvent;
use crate::markers::{LatLng, MapSurface, Popup};
use crate::selection::SurfaceUpdate;
use crate::view::{EventDetail, ListView};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true),
        }
    }

    #[tracing::instrument(skip(self, list))]
    pub fn print_event_list(&mut self, list: &ListView) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let ListView::Items(items) = list else {
            writeln!(out, "No events available")?;
            return Ok(());
        };

        let headers = ["", "ID", "When", "Event", "Category", "Location", "Budget", "Attendees"]
            .map(str::to_string)
            .to_vec();

        let rows = items
            .iter()
            .map(|item| {
                let mark = if item.selected { self.paint(">", "32") } else { String::new() };
                let title = if item.selected {
                    self.paint(&item.title, "1")
                } else {
                    item.title.clone()
                };
                vec![
                    mark,
                    self.paint(&item.id.to_string(), "33"),
                    item.when.clone(),
                    title,
                    item.category.clone(),
                    item.address.clone(),
                    item.budget.clone(),
                    item.attendees.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, detail))]
    pub fn print_detail(&mut self, detail: &EventDetail) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "name      {}", detail.name)?;
        writeln!(out, "when      {}", detail.date_time)?;
        writeln!(out, "location  {}", detail.location)?;
        writeln!(out, "category  {}", detail.category)?;
        writeln!(out, "duration  {}", detail.duration)?;
        writeln!(out, "attendees {}", detail.attendees)?;
        writeln!(out, "budget    {}", detail.budget)?;
        writeln!(out, "about     {}", detail.description)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, grid), fields(month = %grid.title))]
    pub fn print_calendar(&mut self, grid: &CalendarGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", grid.title)?;
        for line in calendar_lines(grid) {
            let painted = line
                .into_iter()
                .map(|(text, style)| match style {
                    CellStyle::Plain => text,
                    CellStyle::Muted => self.paint(&text, "2"),
                    CellStyle::Event => self.paint(&text, "36"),
                    CellStyle::Selected => self.paint(&text, "7"),
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{painted}")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_finder(&mut self, events: &[&FinderEvent]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if events.is_empty() {
            writeln!(out, "No events match the current filters")?;
            return Ok(());
        }

        let headers = ["Event", "Type", "Date", "Time", "Lat", "Lng"]
            .map(str::to_string)
            .to_vec();
        let rows = events
            .iter()
            .map(|event| {
                vec![
                    event.name.clone(),
                    event.kind.clone(),
                    event.date_part().to_string(),
                    event.clock_part().to_string(),
                    format!("{:.4}", event.lat),
                    format!("{:.4}", event.lng),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Prints the text-only part of a dashboard update batch.
    pub fn print_updates(&mut self, updates: &[SurfaceUpdate]) -> anyhow::Result<()> {
        for update in updates {
            match update {
                SurfaceUpdate::Detail(detail) => self.print_detail(detail)?,
                SurfaceUpdate::Summary(text) => println!("{}", self.paint(text, "32")),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn print_creation_updates(&mut self, updates: &[CreationUpdate]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        for update in updates {
            match update {
                CreationUpdate::SelectedDate { label, value } => {
                    writeln!(out, "date      {label} ({value})")?;
                }
                CreationUpdate::SelectedLocation(text) => writeln!(out, "location  {text}")?,
                CreationUpdate::MapInfo(text) => writeln!(out, "map       {text}")?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn print_map_log(&mut self, map: &TextMap) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for line in &map.log {
            writeln!(out, "{}", self.paint(line, "2"))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    Muted,
    Event,
    Selected,
}

/// Header row plus six week rows of right-aligned, styled day labels.
pub fn calendar_lines(grid: &CalendarGrid) -> Vec<Vec<(String, CellStyle)>> {
    let mut lines = vec![grid
        .headers
        .iter()
        .map(|h| (format!("{h:>3}"), CellStyle::Plain))
        .collect::<Vec<_>>()];

    for row in grid.rows() {
        lines.push(
            row.iter()
                .map(|cell| {
                    let style = if cell.kind != CellKind::CurrentMonth {
                        CellStyle::Muted
                    } else if cell.selected {
                        CellStyle::Selected
                    } else if cell.has_event {
                        CellStyle::Event
                    } else {
                        CellStyle::Plain
                    };
                    let marker = if cell.has_event { "*" } else { " " };
                    (format!("{:>2}{marker}", cell.day()), style)
                })
                .collect(),
        );
    }

    lines
}

/// Map surface for the terminal: markers are numbered and every call is
/// narrated into `log`.
#[derive(Debug, Default)]
pub struct TextMap {
    pub log: Vec<String>,
    live: Vec<(usize, Popup)>,
    next: usize,
}

impl TextMap {
    pub fn marker_count(&self) -> usize {
        self.live.len()
    }
}

impl MapSurface for TextMap {
    type Marker = usize;

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.log
            .push(format!("map: view {:.4},{:.4} @ zoom {zoom}", center.lat, center.lng));
    }

    fn add_marker(&mut self, at: LatLng, popup: Popup) -> usize {
        let handle = self.next;
        self.next += 1;
        self.log.push(format!(
            "map: marker #{handle} at {:.4},{:.4} ({})",
            at.lat, at.lng, popup.title
        ));
        self.live.push((handle, popup));
        handle
    }

    fn remove_marker(&mut self, marker: &usize) {
        self.live.retain(|(handle, _)| handle != marker);
    }

    fn open_popup(&mut self, marker: &usize) {
        let Some((_, popup)) = self.live.iter().find(|(handle, _)| handle == marker) else {
            return;
        };
        let mut text = format!("map: popup #{marker} {}", popup.title);
        for (label, value) in &popup.fields {
            text.push_str(&format!(" | {label}: {value}"));
        }
        if let Some(body) = &popup.body {
            text.push_str(&format!(" | {body}"));
        }
        self.log.push(text);
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
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
