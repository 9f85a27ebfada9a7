use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarGrid, build_month_grid};
use crate::datetime::{MonthCursor, format_form_date, format_weekday_date};
use crate::geocode::{
    DEFAULT_SUFFIX, GeocodeError, GeocodeHit, Geocoder, RequestToken, TokenIssuer,
    localized_query,
};
use crate::markers::{LatLng, MapSurface, Popup};
use crate::selection::MapSettings;

pub const SEARCH_FAILED: &str = "Error during location search. Please try again.";

/// Hidden inputs submitted with the creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub selected_date: String,
    pub lat: String,
    pub lng: String,
    pub location_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub date: String,
    pub lat: String,
    pub lng: String,
    pub location_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a date from the calendar.")]
    MissingDate,

    #[error("Please select a location on the map or use the search bar.")]
    MissingLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreationUpdate {
    Calendar(CalendarGrid),
    SelectedDate { label: String, value: String },
    SelectedLocation(String),
    MapInfo(String),
    MapFocus { center: LatLng, zoom: u8 },
    PlaceMarker { at: LatLng, popup: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub token: RequestToken,
    pub query: String,
    pub localized: String,
}

/// State behind the event creation page: the date picker, the single
/// location marker and the geocoding search box.
#[derive(Debug)]
pub struct CreationFlow<M> {
    cursor: MonthCursor,
    selected_date: Option<NaiveDate>,
    fields: FormFields,
    marker: Option<M>,
    tokens: TokenIssuer,
    pending: Option<SearchRequest>,
    settings: MapSettings,
    locality: String,
}

impl<M: Clone + PartialEq> CreationFlow<M> {
    pub fn new(cursor: MonthCursor, settings: MapSettings) -> Self {
        Self {
            cursor,
            selected_date: None,
            fields: FormFields::default(),
            marker: None,
            tokens: TokenIssuer::default(),
            pending: None,
            settings,
            locality: DEFAULT_SUFFIX.to_string(),
        }
    }

    pub fn with_locality(mut self, locality: &str) -> Self {
        self.locality = locality.to_string();
        self
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn cursor(&self) -> MonthCursor {
        self.cursor
    }

    pub fn calendar(&self) -> CalendarGrid {
        build_month_grid(self.cursor, &[], self.selected_date)
    }

    pub fn init_map<S>(&mut self, surface: &mut S)
    where
        S: MapSurface<Marker = M>,
    {
        surface.set_view(self.settings.default_center, self.settings.initial_zoom);
    }

    pub fn previous_month(&mut self) -> Vec<CreationUpdate> {
        self.cursor = self.cursor.previous();
        vec![CreationUpdate::Calendar(self.calendar())]
    }

    pub fn next_month(&mut self) -> Vec<CreationUpdate> {
        self.cursor = self.cursor.next();
        vec![CreationUpdate::Calendar(self.calendar())]
    }

    /// Day click in the displayed month. Days outside it are ignored.
    #[tracing::instrument(skip(self), fields(month = %self.cursor.title()))]
    pub fn select_date(&mut self, day: u32) -> Vec<CreationUpdate> {
        let Some(date) = self.cursor.day(day) else {
            debug!("ignoring day outside displayed month");
            return vec![];
        };

        self.selected_date = Some(date);
        self.fields.selected_date = format_form_date(date);
        vec![
            CreationUpdate::SelectedDate {
                label: format_weekday_date(date),
                value: self.fields.selected_date.clone(),
            },
            CreationUpdate::Calendar(self.calendar()),
        ]
    }

    /// Map click: moves the marker and records raw coordinates.
    #[tracing::instrument(skip(self))]
    pub fn pick_location(&mut self, at: LatLng) -> Vec<CreationUpdate> {
        let lat = format!("{:.6}", at.lat);
        let lng = format!("{:.6}", at.lng);
        self.fields.lat = lat.clone();
        self.fields.lng = lng.clone();
        self.fields.location_name.clear();

        vec![
            CreationUpdate::PlaceMarker { at, popup: None },
            CreationUpdate::SelectedLocation(format!("Lat: {lat}, Lng: {lng}")),
            CreationUpdate::MapInfo(format!("Location set to coordinates: ({lat}, {lng})")),
        ]
    }

    /// Starts a search. Blank queries are ignored. Any earlier search still
    /// in flight becomes stale.
    #[tracing::instrument(skip(self))]
    pub fn begin_search(&mut self, query: &str) -> Option<(SearchRequest, Vec<CreationUpdate>)> {
        if query.trim().is_empty() {
            return None;
        }

        let request = SearchRequest {
            token: self.tokens.issue(),
            query: query.to_string(),
            localized: localized_query(query, &self.locality),
        };
        if let Some(previous) = self.pending.replace(request.clone()) {
            debug!(stale = ?previous.token, "superseding search in flight");
        }

        let status = CreationUpdate::MapInfo(format!("Searching for \"{query}\"..."));
        Some((request, vec![status]))
    }

    /// Applies a geocoding outcome. Responses to superseded searches are
    /// discarded without touching any state.
    #[tracing::instrument(skip(self, outcome), fields(token = ?token))]
    pub fn complete_search(
        &mut self,
        token: RequestToken,
        outcome: Result<Option<GeocodeHit>, GeocodeError>,
    ) -> Vec<CreationUpdate> {
        if !self.tokens.is_current(token) {
            debug!("discarding stale geocoding response");
            return vec![];
        }
        let Some(request) = self.pending.take() else {
            debug!("no search in flight for this response");
            return vec![];
        };

        match outcome {
            Ok(Some(hit)) => {
                let lat = format!("{:.6}", hit.lat);
                let lng = format!("{:.6}", hit.lng);
                info!(name = %hit.display_name, %lat, %lng, "location found");
                self.fields.lat = lat;
                self.fields.lng = lng;
                self.fields.location_name = hit.display_name.clone();

                let at = LatLng::new(hit.lat, hit.lng);
                vec![
                    CreationUpdate::MapFocus {
                        center: at,
                        zoom: self.settings.focus_zoom,
                    },
                    CreationUpdate::MapInfo(format!("Location found: {}", hit.display_name)),
                    CreationUpdate::PlaceMarker {
                        at,
                        popup: Some(hit.display_name.clone()),
                    },
                    CreationUpdate::SelectedLocation(hit.display_name),
                ]
            }
            Ok(None) => vec![CreationUpdate::MapInfo(format!(
                "Could not find location for \"{}\". Try a different address or postcode.",
                request.query
            ))],
            Err(err) => {
                warn!(error = %err, "geocoding error");
                vec![CreationUpdate::MapInfo(SEARCH_FAILED.to_string())]
            }
        }
    }

    /// Runs a search to completion against `geocoder`.
    pub fn search_with<G: Geocoder>(&mut self, geocoder: &G, query: &str) -> Vec<CreationUpdate> {
        let Some((request, mut updates)) = self.begin_search(query) else {
            return vec![];
        };
        let outcome = geocoder.search(&request.localized);
        updates.extend(self.complete_search(request.token, outcome));
        updates
    }

    /// Pushes map-facing updates to `surface`, keeping at most one marker.
    pub fn apply_to_map<S>(&mut self, updates: &[CreationUpdate], surface: &mut S)
    where
        S: MapSurface<Marker = M>,
    {
        for update in updates {
            match update {
                CreationUpdate::MapFocus { center, zoom } => surface.set_view(*center, *zoom),
                CreationUpdate::PlaceMarker { at, popup } => {
                    if let Some(old) = self.marker.take() {
                        surface.remove_marker(&old);
                    }
                    let marker = surface.add_marker(
                        *at,
                        Popup {
                            title: popup.clone().unwrap_or_default(),
                            ..Popup::default()
                        },
                    );
                    if popup.is_some() {
                        surface.open_popup(&marker);
                    }
                    self.marker = Some(marker);
                }
                _ => {}
            }
        }
    }

    /// Submission gate: a date first, then a location.
    pub fn validate(&self) -> Result<Submission, ValidationError> {
        if self.fields.selected_date.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        if self.fields.lat.is_empty() || self.fields.lng.is_empty() {
            return Err(ValidationError::MissingLocation);
        }
        Ok(Submission {
            date: self.fields.selected_date.clone(),
            lat: self.fields.lat.clone(),
            lng: self.fields.lng.clone(),
            location_name: self.fields.location_name.clone(),
        })
    }
}
