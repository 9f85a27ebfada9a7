use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::{Config, parse_lat_lng};
use crate::creation::CreationFlow;
use crate::datetime::{
    MonthCursor, display_timezone, parse_clock_expr, parse_day_expr, parse_month_expr,
};
use crate::event::{EventId, RawEvent};
use crate::finder::{ALL_TYPES, FilterState, Finder, sample_events};
use crate::geocode::NominatimGeocoder;
use crate::login::PasswordToggle;
use crate::normalize::{EventSet, normalize};
use crate::render::{Renderer, TextMap};
use crate::selection::{SelectionCoordinator, SurfaceUpdate};

/// Page variable the host would normally inject the events JSON into.
pub const EVENTS_ENV_VAR: &str = "OUTING_EVENTS_JSON";

/// Records used when the embedded data is missing or malformed.
pub fn fallback_events() -> Vec<RawEvent> {
    vec![]
}

/// Reads the embedded events value: `--events`, then `events.file`, then
/// the environment. `None` means nothing was embedded.
#[instrument(skip(cfg))]
pub fn read_embedded(cfg: &Config, events_override: Option<&Path>) -> anyhow::Result<Option<String>> {
    if let Some(path) = events_override.map(Path::to_path_buf).or_else(|| cfg.events_file()) {
        debug!(file = %path.display(), "reading events file");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read events file {}", path.display()))?;
        return Ok(Some(text));
    }

    Ok(std::env::var(EVENTS_ENV_VAR).ok())
}

pub fn load_event_set(cfg: &Config, events_override: Option<&Path>) -> anyhow::Result<EventSet> {
    let embedded = read_embedded(cfg, events_override)?;
    Ok(normalize(embedded.as_deref(), &fallback_events(), display_timezone()))
}

fn today() -> NaiveDate {
    Utc::now().with_timezone(display_timezone()).date_naive()
}

#[instrument(skip(cfg, renderer, events_override))]
pub fn dispatch(
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    events_override: Option<&Path>,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::List => cmd_list(cfg, renderer, events_override),
        Command::Calendar { month, prev, next } => {
            cmd_calendar(cfg, renderer, events_override, month.as_deref(), prev, next)
        }
        Command::Select { id } => cmd_select(cfg, renderer, events_override, EventId(id)),
        Command::Day { date } => cmd_day(cfg, renderer, events_override, &date),
        Command::Find {
            kind,
            date,
            time,
            reset,
        } => cmd_find(renderer, kind, date, time, reset),
        Command::Create { date, at, search } => {
            cmd_create(cfg, renderer, date.as_deref(), at.as_deref(), search.as_deref())
        }
        Command::PasswordToggle { times } => cmd_password_toggle(times),
    }
}

fn dashboard(
    cfg: &Config,
    events_override: Option<&Path>,
    cursor: MonthCursor,
) -> anyhow::Result<SelectionCoordinator<usize>> {
    let set = load_event_set(cfg, events_override)?;
    Ok(SelectionCoordinator::new(set.events, cursor, cfg.map_settings()?))
}

fn last_list(updates: &[SurfaceUpdate]) -> Option<&crate::view::ListView> {
    updates.iter().rev().find_map(|update| match update {
        SurfaceUpdate::List(list) => Some(list),
        _ => None,
    })
}

#[instrument(skip(cfg, renderer, events_override))]
fn cmd_list(cfg: &Config, renderer: &mut Renderer, events_override: Option<&Path>) -> anyhow::Result<()> {
    info!("command list");
    let mut coord = dashboard(cfg, events_override, MonthCursor::containing(today()))?;
    let updates = coord.initial_render();

    if let Some(list) = last_list(&updates) {
        renderer.print_event_list(list)?;
    }
    println!();
    renderer.print_updates(&updates)
}

#[instrument(skip(cfg, renderer, events_override))]
fn cmd_calendar(
    cfg: &Config,
    renderer: &mut Renderer,
    events_override: Option<&Path>,
    month: Option<&str>,
    prev: u32,
    next: u32,
) -> anyhow::Result<()> {
    info!("command calendar");
    let cursor = match month {
        Some(expr) => parse_month_expr(expr)?,
        None => MonthCursor::containing(today()),
    };

    let mut coord = dashboard(cfg, events_override, cursor)?;
    let mut grid = coord.calendar();
    for _ in 0..prev {
        grid = pop_calendar(coord.previous_month())?;
    }
    for _ in 0..next {
        grid = pop_calendar(coord.next_month())?;
    }

    renderer.print_calendar(&grid)
}

fn pop_calendar(updates: Vec<SurfaceUpdate>) -> anyhow::Result<crate::calendar::CalendarGrid> {
    updates
        .into_iter()
        .find_map(|update| match update {
            SurfaceUpdate::Calendar(grid) => Some(grid),
            _ => None,
        })
        .ok_or_else(|| anyhow!("month navigation produced no calendar"))
}

fn show_selection(
    renderer: &mut Renderer,
    coord: &SelectionCoordinator<usize>,
    map: &mut TextMap,
    updates: &[SurfaceUpdate],
) -> anyhow::Result<()> {
    coord.apply_to_map(updates, map);

    if let Some(list) = last_list(updates) {
        renderer.print_event_list(list)?;
    }
    println!();
    renderer.print_calendar(&coord.calendar())?;
    println!();
    renderer.print_updates(updates)?;
    renderer.print_map_log(map)
}

#[instrument(skip(cfg, renderer, events_override))]
fn cmd_select(
    cfg: &Config,
    renderer: &mut Renderer,
    events_override: Option<&Path>,
    id: EventId,
) -> anyhow::Result<()> {
    info!("command select");
    let mut coord = dashboard(cfg, events_override, MonthCursor::containing(today()))?;
    coord.initial_render();
    let mut map = TextMap::default();
    coord.init_map(&mut map);

    let updates = coord.select(id);
    if updates.is_empty() {
        warn!(%id, "no event with this id; selection unchanged");
        println!("No event with id {id}");
        return Ok(());
    }

    if let Some(date) = coord.selected().and_then(|event| event.date) {
        coord.show_month(MonthCursor::containing(date));
    }
    show_selection(renderer, &coord, &mut map, &updates)
}

#[instrument(skip(cfg, renderer, events_override))]
fn cmd_day(
    cfg: &Config,
    renderer: &mut Renderer,
    events_override: Option<&Path>,
    date: &str,
) -> anyhow::Result<()> {
    info!("command day");
    let day = parse_day_expr(date)?;
    let mut coord = dashboard(cfg, events_override, MonthCursor::containing(day))?;
    coord.initial_render();
    let mut map = TextMap::default();
    coord.init_map(&mut map);

    let updates = coord.select_by_date(day);
    if updates.is_empty() {
        println!("No events on {date}");
        return renderer.print_calendar(&coord.calendar());
    }
    show_selection(renderer, &coord, &mut map, &updates)
}

#[instrument(skip(renderer))]
fn cmd_find(
    renderer: &mut Renderer,
    kind: String,
    date: String,
    time: String,
    reset: bool,
) -> anyhow::Result<()> {
    info!("command find");
    if !date.is_empty() {
        parse_day_expr(&date)?;
    }
    let time = if time.is_empty() { time } else { parse_clock_expr(&time)? };
    let kind = if kind.trim().is_empty() { ALL_TYPES.to_string() } else { kind };

    let mut map = TextMap::default();
    let mut finder = Finder::new(sample_events());
    finder.init_map(&mut map);
    finder.set_filters(FilterState { kind, date, time }, &mut map);
    if reset {
        finder.reset_filters(&mut map);
    }

    renderer.print_finder(&finder.visible())?;
    println!();
    println!("{} marker(s) on the map", map.marker_count());
    Ok(())
}

#[instrument(skip(cfg, renderer))]
fn cmd_create(
    cfg: &Config,
    renderer: &mut Renderer,
    date: Option<&str>,
    at: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<()> {
    info!("command create");
    let day = date.map(parse_day_expr).transpose()?;
    let cursor = MonthCursor::containing(day.unwrap_or_else(today));

    let mut map = TextMap::default();
    let mut flow = CreationFlow::new(cursor, cfg.map_settings()?)
        .with_locality(&cfg.geocode_suffix());
    flow.init_map(&mut map);

    let mut updates = vec![];
    if let Some(day) = day {
        updates.extend(flow.select_date(chrono::Datelike::day(&day)));
    }
    if let Some(raw) = at {
        updates.extend(flow.pick_location(parse_lat_lng(raw)?));
    }
    if let Some(query) = search {
        let geocoder = NominatimGeocoder::new(&cfg.geocode_endpoint())?;
        updates.extend(flow.search_with(&geocoder, query));
    }
    flow.apply_to_map(&updates, &mut map);

    renderer.print_calendar(&flow.calendar())?;
    println!();
    renderer.print_creation_updates(&updates)?;
    renderer.print_map_log(&map)?;

    let submission = flow.validate()?;
    println!();
    println!(
        "ready to submit: {} at {},{} {}",
        submission.date, submission.lat, submission.lng, submission.location_name
    );
    Ok(())
}

fn cmd_password_toggle(times: u32) -> anyhow::Result<()> {
    let mut state = PasswordToggle::default();
    println!("type={} button={}", state.input_type(), state.button_glyph());
    for _ in 0..times {
        state = state.toggled();
        println!("type={} button={}", state.input_type(), state.button_glyph());
    }
    Ok(())
}
