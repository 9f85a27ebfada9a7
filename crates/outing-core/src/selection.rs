use chrono::NaiveDate;
use tracing::{debug, info};

use crate::calendar::{CalendarGrid, build_month_grid};
use crate::datetime::MonthCursor;
use crate::event::{Event, EventId};
use crate::markers::{LatLng, MapSurface, MarkerRegistry};
use crate::view::{EventDetail, ListView, event_popup, render_list, summary_line};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapSettings {
    pub default_center: LatLng,
    pub initial_zoom: u8,
    pub focus_zoom: u8,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_center: LatLng::new(55.8642, -4.2518),
            initial_zoom: 13,
            focus_zoom: 15,
        }
    }
}

/// One change a front-end has to project onto its surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceUpdate {
    List(ListView),
    Calendar(CalendarGrid),
    Detail(EventDetail),
    MapFocus { center: LatLng, zoom: u8 },
    OpenPopup(EventId),
    Summary(String),
}

/// Owns the dashboard's selection, displayed month and marker table, and
/// keeps list, calendar and map in agreement about the selected event.
#[derive(Debug)]
pub struct SelectionCoordinator<M> {
    events: Vec<Event>,
    selected: Option<EventId>,
    cursor: MonthCursor,
    markers: MarkerRegistry<EventId, M>,
    settings: MapSettings,
}

impl<M: Clone + PartialEq> SelectionCoordinator<M> {
    pub fn new(events: Vec<Event>, cursor: MonthCursor, settings: MapSettings) -> Self {
        Self {
            events,
            selected: None,
            cursor,
            markers: MarkerRegistry::new(),
            settings,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn selected(&self) -> Option<&Event> {
        let id = self.selected?;
        self.events.iter().find(|e| e.id == id)
    }

    pub fn selected_id(&self) -> Option<EventId> {
        self.selected
    }

    pub fn cursor(&self) -> MonthCursor {
        self.cursor
    }

    pub fn markers(&self) -> &MarkerRegistry<EventId, M> {
        &self.markers
    }

    pub fn calendar(&self) -> CalendarGrid {
        let highlighted = self.selected().and_then(|event| event.date);
        build_month_grid(self.cursor, &self.events, highlighted)
    }

    /// First paint: list and calendar, then the first event is selected.
    /// With no events the detail panel shows its prompt.
    #[tracing::instrument(skip(self), fields(events = self.events.len()))]
    pub fn initial_render(&mut self) -> Vec<SurfaceUpdate> {
        let mut updates = vec![SurfaceUpdate::List(render_list(&self.events, self.selected))];
        match self.events.first().map(|e| e.id) {
            Some(first) if self.selected.is_none() => updates.extend(self.select(first)),
            Some(_) => updates.push(SurfaceUpdate::Calendar(self.calendar())),
            None => {
                updates.push(SurfaceUpdate::Calendar(self.calendar()));
                updates.push(SurfaceUpdate::Detail(EventDetail::placeholder()));
            }
        }
        updates
    }

    /// Creates one marker per event with usable coordinates and centres the
    /// map on the first such event, or the configured default.
    #[tracing::instrument(skip(self, surface))]
    pub fn init_map<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface<Marker = M>,
    {
        let center = self
            .events
            .iter()
            .find_map(Event::coordinates)
            .map(LatLng::from)
            .unwrap_or(self.settings.default_center);
        surface.set_view(center, self.settings.initial_zoom);

        let items = self
            .events
            .iter()
            .map(|e| (e.id, e.coordinates().map(LatLng::from), event_popup(e)));
        let added = self.markers.redraw(surface, items);
        info!(markers = added, "map initialised");
        added
    }

    /// Makes `id` the only selection. Unknown ids change nothing and
    /// produce no updates.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn select(&mut self, id: EventId) -> Vec<SurfaceUpdate> {
        let Some(event) = self.events.iter().find(|e| e.id == id) else {
            debug!("select ignored: unknown event id");
            return vec![];
        };

        let mut updates = Vec::with_capacity(6);
        self.selected = Some(id);
        let event = event.clone();

        updates.push(SurfaceUpdate::List(render_list(&self.events, self.selected)));
        updates.push(SurfaceUpdate::Calendar(self.calendar()));

        if let Some(center) = event.coordinates().map(LatLng::from)
            && self.markers.contains(&id)
        {
            updates.push(SurfaceUpdate::MapFocus {
                center,
                zoom: self.settings.focus_zoom,
            });
            updates.push(SurfaceUpdate::OpenPopup(id));
        }

        updates.push(SurfaceUpdate::Detail(EventDetail::of(&event)));
        updates.push(SurfaceUpdate::Summary(summary_line(&event)));
        updates
    }

    /// Calendar click: selects the earliest event (by time string) on `day`.
    #[tracing::instrument(skip(self), fields(day = %day))]
    pub fn select_by_date(&mut self, day: NaiveDate) -> Vec<SurfaceUpdate> {
        let earliest = self
            .events
            .iter()
            .filter(|e| e.is_on(day))
            .min_by(|a, b| a.time.cmp(&b.time))
            .map(|e| e.id);

        match earliest {
            Some(id) => self.select(id),
            None => {
                debug!("no events on clicked day");
                vec![]
            }
        }
    }

    pub fn on_marker_click(&mut self, marker: &M) -> Vec<SurfaceUpdate> {
        match self.markers.key_for(marker) {
            Some(id) => self.select(id),
            None => vec![],
        }
    }

    pub fn previous_month(&mut self) -> Vec<SurfaceUpdate> {
        self.cursor = self.cursor.previous();
        vec![SurfaceUpdate::Calendar(self.calendar())]
    }

    pub fn next_month(&mut self) -> Vec<SurfaceUpdate> {
        self.cursor = self.cursor.next();
        vec![SurfaceUpdate::Calendar(self.calendar())]
    }

    /// Jumps straight to `cursor`, however far away it is.
    pub fn show_month(&mut self, cursor: MonthCursor) -> Vec<SurfaceUpdate> {
        self.cursor = cursor;
        vec![SurfaceUpdate::Calendar(self.calendar())]
    }

    /// Pushes the map-facing part of `updates` to `surface`.
    pub fn apply_to_map<S>(&self, updates: &[SurfaceUpdate], surface: &mut S)
    where
        S: MapSurface<Marker = M>,
    {
        for update in updates {
            match update {
                SurfaceUpdate::MapFocus { center, zoom } => surface.set_view(*center, *zoom),
                SurfaceUpdate::OpenPopup(id) => {
                    if let Some(marker) = self.markers.get(id) {
                        surface.open_popup(marker);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CellKind;
    use crate::event::RawEvent;
    use crate::markers::testing::{MapCall, RecordingMap};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(id: u64, day: Option<NaiveDate>, time: &str, at: Option<(f64, f64)>) -> Event {
        let (lat, lng) = at.map_or((None, None), |(a, b)| (Some(a), Some(b)));
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("Event {id}"),
            "time": time,
            "location": {"address": format!("Venue {id}"), "lat": lat, "lng": lng},
        }))
        .expect("raw event");
        Event::from_raw(raw, day)
    }

    fn coordinator(events: Vec<Event>) -> SelectionCoordinator<usize> {
        let cursor = MonthCursor::containing(ymd(2024, 3, 1));
        SelectionCoordinator::new(events, cursor, MapSettings::default())
    }

    fn sample() -> Vec<Event> {
        vec![
            event(1, Some(ymd(2024, 3, 8)), "19:30", Some((55.8647, -4.2541))),
            event(2, Some(ymd(2024, 3, 12)), "14:00", Some((55.8655, -4.2380))),
            event(3, Some(ymd(2024, 3, 12)), "09:00", None),
            event(4, None, "20:00", Some((55.8722, -4.2936))),
        ]
    }

    fn selected_everywhere(updates: &[SurfaceUpdate]) -> (Vec<EventId>, Vec<NaiveDate>) {
        let mut listed = vec![];
        let mut days = vec![];
        for update in updates {
            match update {
                SurfaceUpdate::List(view) => listed = view.selected_ids(),
                SurfaceUpdate::Calendar(grid) => {
                    days = grid.cells.iter().filter(|c| c.selected).map(|c| c.date).collect();
                }
                _ => {}
            }
        }
        (listed, days)
    }

    #[test]
    fn initial_render_selects_first_event() {
        let mut coord = coordinator(sample());
        let updates = coord.initial_render();
        assert_eq!(coord.selected_id(), Some(EventId(1)));
        assert!(updates.contains(&SurfaceUpdate::Summary("Selected: Event 1 at Venue 1".into())));
        // Map is not up yet, so nothing to focus.
        assert!(!updates.iter().any(|u| matches!(u, SurfaceUpdate::MapFocus { .. })));
    }

    #[test]
    fn initial_render_without_events_shows_prompt() {
        let mut coord = coordinator(vec![]);
        let updates = coord.initial_render();
        assert_eq!(coord.selected_id(), None);
        assert!(updates.contains(&SurfaceUpdate::List(ListView::Empty)));
        assert!(updates.contains(&SurfaceUpdate::Detail(EventDetail::placeholder())));
    }

    #[test]
    fn select_moves_highlight_on_every_surface() {
        let mut map = RecordingMap::default();
        let mut coord = coordinator(sample());
        coord.initial_render();
        assert_eq!(coord.init_map(&mut map), 3);

        let updates = coord.select(EventId(2));
        let (listed, days) = selected_everywhere(&updates);
        assert_eq!(listed, vec![EventId(2)]);
        assert_eq!(days, vec![ymd(2024, 3, 12)]);
        assert!(updates.contains(&SurfaceUpdate::OpenPopup(EventId(2))));

        coord.apply_to_map(&updates, &mut map);
        let marker = *coord.markers().get(&EventId(2)).expect("marker for event 2");
        assert_eq!(
            &map.calls[map.calls.len() - 2..],
            &[
                MapCall::SetView(LatLng::new(55.8655, -4.2380), 15),
                MapCall::OpenPopup(marker),
            ]
        );
    }

    #[test]
    fn select_is_idempotent() {
        let mut coord = coordinator(sample());
        let once = coord.select(EventId(4));
        let twice = coord.select(EventId(4));
        assert_eq!(once, twice);
        assert_eq!(coord.selected_id(), Some(EventId(4)));
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let mut coord = coordinator(sample());
        coord.select(EventId(1));
        assert!(coord.select(EventId(42)).is_empty());
        assert_eq!(coord.selected_id(), Some(EventId(1)));
    }

    #[test]
    fn event_without_marker_skips_map_focus() {
        let mut map = RecordingMap::default();
        let mut coord = coordinator(sample());
        coord.init_map(&mut map);

        let updates = coord.select(EventId(3));
        assert!(!updates.iter().any(|u| matches!(
            u,
            SurfaceUpdate::MapFocus { .. } | SurfaceUpdate::OpenPopup(_)
        )));
        assert!(updates.contains(&SurfaceUpdate::Summary("Selected: Event 3 at Venue 3".into())));
    }

    #[test]
    fn select_by_date_picks_the_earliest_time() {
        let mut coord = coordinator(sample());
        coord.select_by_date(ymd(2024, 3, 12));
        assert_eq!(coord.selected_id(), Some(EventId(3)));

        assert!(coord.select_by_date(ymd(2024, 3, 13)).is_empty());
        assert_eq!(coord.selected_id(), Some(EventId(3)));
    }

    #[test]
    fn marker_click_selects_its_event() {
        let mut map = RecordingMap::default();
        let mut coord = coordinator(sample());
        coord.init_map(&mut map);
        assert_eq!(map.calls[0], MapCall::SetView(LatLng::new(55.8647, -4.2541), 13));

        let marker = *coord.markers().get(&EventId(4)).expect("marker for event 4");
        coord.on_marker_click(&marker);
        assert_eq!(coord.selected_id(), Some(EventId(4)));
        assert!(coord.on_marker_click(&999).is_empty());
    }

    #[test]
    fn map_without_located_events_uses_default_center() {
        let mut map = RecordingMap::default();
        let mut coord = coordinator(vec![event(1, None, "", None)]);
        assert_eq!(coord.init_map(&mut map), 0);
        assert_eq!(map.calls, vec![MapCall::SetView(LatLng::new(55.8642, -4.2518), 13)]);
    }

    #[test]
    fn month_navigation_rebuilds_calendar() {
        let mut coord = coordinator(sample());
        let updates = coord.next_month();
        let [SurfaceUpdate::Calendar(grid)] = updates.as_slice() else {
            panic!("expected a single calendar update");
        };
        assert_eq!(grid.title, "April 2024");
        assert_eq!(grid.cells_of(CellKind::CurrentMonth).count(), 30);

        coord.previous_month();
        coord.previous_month();
        assert_eq!(coord.cursor().month0(), 1);
    }

    #[test]
    fn show_month_jumps_without_stepping() {
        let mut coord = coordinator(sample());
        let far = NaiveDate::from_ymd_opt(200_000, 7, 4).expect("far date");
        let updates = coord.show_month(MonthCursor::containing(far));
        let [SurfaceUpdate::Calendar(grid)] = updates.as_slice() else {
            panic!("expected a single calendar update");
        };
        assert_eq!(grid.title, "July 200000");
        assert_eq!(coord.cursor().first_day(), NaiveDate::from_ymd_opt(200_000, 7, 1).expect("first"));
    }
}
