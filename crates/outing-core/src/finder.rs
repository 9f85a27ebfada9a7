use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::markers::{LatLng, MapSurface, MarkerRegistry, Popup};

pub const ALL_TYPES: &str = "all";

pub const FINDER_CENTER: LatLng = LatLng {
    lat: 37.7749,
    lng: -122.4194,
};
pub const FINDER_ZOOM: u8 = 13;

/// A finder sample record. `datetime` is a local `YYYY-MM-DDTHH:MM:SS`
/// string compared textually by the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinderEvent {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub datetime: String,
}

impl FinderEvent {
    fn new(name: &str, lat: f64, lng: f64, kind: &str, datetime: &str) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lng,
            kind: kind.to_string(),
            datetime: datetime.to_string(),
        }
    }

    pub fn date_part(&self) -> &str {
        self.datetime.split('T').next().unwrap_or_default()
    }

    /// `HH:MM` taken from the time part; empty when there is none.
    pub fn clock_part(&self) -> &str {
        let time = self.datetime.split_once('T').map(|(_, t)| t).unwrap_or_default();
        time.get(..5).unwrap_or(time)
    }

    pub fn popup(&self) -> Popup {
        let parsed = NaiveDateTime::parse_from_str(&self.datetime, "%Y-%m-%dT%H:%M:%S").ok();
        let date = parsed
            .map(|dt| dt.format("%b %-d").to_string())
            .unwrap_or_else(|| self.date_part().to_string());
        let time = parsed
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| self.clock_part().to_string());
        Popup {
            title: self.name.clone(),
            fields: vec![("Date".to_string(), date), ("Time".to_string(), time)],
            body: None,
        }
    }
}

pub fn sample_events() -> Vec<FinderEvent> {
    vec![
        FinderEvent::new("Music Festival", 37.7749, -122.4194, "music", "2025-10-26T14:00:00"),
        FinderEvent::new("Art Exhibition", 37.7849, -122.4094, "art", "2025-10-27T10:00:00"),
        FinderEvent::new("Food Fair", 37.7649, -122.4294, "food", "2025-10-26T12:00:00"),
    ]
}

/// The three finder controls. Wildcards are `all` for the type and the
/// empty string for date and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub kind: String,
    pub date: String,
    pub time: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            kind: ALL_TYPES.to_string(),
            date: String::new(),
            time: String::new(),
        }
    }
}

impl FilterState {
    pub fn matches(&self, event: &FinderEvent) -> bool {
        let kind_ok = self.kind == ALL_TYPES || event.kind == self.kind;
        let date_ok = self.date.is_empty() || event.date_part() == self.date;
        let time_ok = self.time.is_empty() || event.clock_part() == self.time;
        kind_ok && date_ok && time_ok
    }

    pub fn evaluate<'a>(&self, events: &'a [FinderEvent]) -> Vec<&'a FinderEvent> {
        events.iter().filter(|event| self.matches(event)).collect()
    }
}

/// Finder page state: the fixed sample set, the filter controls and the
/// markers for the currently visible subset.
#[derive(Debug)]
pub struct Finder<M> {
    events: Vec<FinderEvent>,
    filters: FilterState,
    markers: MarkerRegistry<usize, M>,
}

impl<M: Clone + PartialEq> Finder<M> {
    pub fn new(events: Vec<FinderEvent>) -> Self {
        Self {
            events,
            filters: FilterState::default(),
            markers: MarkerRegistry::new(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn markers(&self) -> &MarkerRegistry<usize, M> {
        &self.markers
    }

    pub fn visible(&self) -> Vec<&FinderEvent> {
        self.filters.evaluate(&self.events)
    }

    pub fn init_map<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface<Marker = M>,
    {
        surface.set_view(FINDER_CENTER, FINDER_ZOOM);
        self.update_map_filters(surface)
    }

    pub fn set_filters<S>(&mut self, filters: FilterState, surface: &mut S) -> usize
    where
        S: MapSurface<Marker = M>,
    {
        self.filters = filters;
        self.update_map_filters(surface)
    }

    pub fn reset_filters<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface<Marker = M>,
    {
        debug!("resetting finder filters");
        self.filters = FilterState::default();
        self.update_map_filters(surface)
    }

    /// Re-evaluates the filters and redraws markers for the visible subset.
    #[tracing::instrument(skip(self, surface), fields(filters = ?self.filters))]
    pub fn update_map_filters<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface<Marker = M>,
    {
        let items: Vec<(usize, Option<LatLng>, Popup)> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, event)| self.filters.matches(event))
            .map(|(idx, event)| (idx, Some(LatLng::new(event.lat, event.lng)), event.popup()))
            .collect();
        let shown = self.markers.redraw(surface, items);
        info!(shown, total = self.events.len(), "finder markers updated");
        shown
    }
}
