//! Render-ready projections of dashboard state. Everything here is a pure
//! function of the event set and the current selection.

use crate::event::{Event, EventId};
use crate::markers::Popup;

pub const NO_DESCRIPTION: &str = "No description provided.";
pub const DETAIL_PROMPT: &str = "Select an event from the list or map.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: EventId,
    pub title: String,
    pub category: String,
    pub when: String,
    pub address: String,
    pub budget: String,
    pub attendees: String,
    pub description: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Empty,
    Items(Vec<ListItem>),
}

impl ListView {
    pub fn selected_ids(&self) -> Vec<EventId> {
        match self {
            Self::Empty => vec![],
            Self::Items(items) => items.iter().filter(|i| i.selected).map(|i| i.id).collect(),
        }
    }
}

pub fn render_list(events: &[Event], selected: Option<EventId>) -> ListView {
    if events.is_empty() {
        return ListView::Empty;
    }

    ListView::Items(
        events
            .iter()
            .map(|event| ListItem {
                id: event.id,
                title: event.name.clone(),
                category: event.category.clone(),
                when: format!("{} at {}", event.short_date_label(), event.time),
                address: event.location.address.clone(),
                budget: event.budget_symbol().to_string(),
                attendees: format!("{} attendees", event.attendees_label()),
                description: event.description.clone(),
                selected: selected == Some(event.id),
            })
            .collect(),
    )
}

/// Contents of the "selected event" panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetail {
    pub name: String,
    pub date_time: String,
    pub location: String,
    pub category: String,
    pub duration: String,
    pub attendees: String,
    pub description: String,
    pub budget: String,
}

impl EventDetail {
    pub fn placeholder() -> Self {
        Self {
            name: DETAIL_PROMPT.to_string(),
            date_time: "-".to_string(),
            location: "-".to_string(),
            category: "-".to_string(),
            duration: "-".to_string(),
            attendees: "-".to_string(),
            description: "...".to_string(),
            budget: "-".to_string(),
        }
    }

    pub fn of(event: &Event) -> Self {
        Self {
            name: or_na(&event.name),
            date_time: format!("{} at {}", event.long_date_label(), event.time_label()),
            location: or_na(&event.location.address),
            category: or_na(&event.category),
            duration: event.duration_label(),
            attendees: event.attendees_label(),
            description: if event.description.trim().is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                event.description.clone()
            },
            budget: event.budget_symbol().to_string(),
        }
    }
}

pub fn summary_line(event: &Event) -> String {
    format!("Selected: {} at {}", event.name, event.location.address)
}

pub fn event_popup(event: &Event) -> Popup {
    let date = event
        .date
        .map(|d| d.format("%-d/%-m/%Y").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    Popup {
        title: event.name.clone(),
        fields: vec![
            ("Date".to_string(), date),
            ("Time".to_string(), event.time.clone()),
            ("Location".to_string(), event.location.address.clone()),
            ("Budget".to_string(), event.budget_symbol().to_string()),
        ],
        body: Some(event.description.clone()),
    }
}

fn or_na(value: &str) -> String {
    if value.trim().is_empty() {
        "N/A".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::event::RawEvent;

    fn gig() -> Event {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": 4,
            "name": "Live Set",
            "time": "21:00",
            "location": {"address": "SWG3, West End", "lat": 55.866, "lng": -4.3},
            "category": "LIVE_MUSIC",
            "budget": "HIGH",
            "description": ""
        }))
        .expect("raw event");
        Event::from_raw(raw, NaiveDate::from_ymd_opt(2024, 3, 1))
    }

    #[test]
    fn detail_uses_long_dates_and_placeholders() {
        let detail = EventDetail::of(&gig());
        assert_eq!(detail.date_time, "March 1, 2024 at 21:00");
        assert_eq!(detail.description, NO_DESCRIPTION);
        assert_eq!(detail.duration, "N/A");
        assert_eq!(detail.budget, "£££");

        assert_eq!(EventDetail::placeholder().name, DETAIL_PROMPT);
    }

    #[test]
    fn list_marks_only_the_selected_item() {
        let mut other = gig();
        other.id = EventId(5);
        let events = vec![gig(), other];

        let view = render_list(&events, Some(EventId(5)));
        assert_eq!(view.selected_ids(), vec![EventId(5)]);
        let ListView::Items(items) = view else {
            panic!("expected items");
        };
        assert_eq!(items[0].when, "Mar 1, 2024 at 21:00");
        assert_eq!(items[0].attendees, "N/A attendees");

        assert_eq!(render_list(&[], None), ListView::Empty);
        assert_eq!(summary_line(&events[0]), "Selected: Live Set at SWG3, West End");
    }
}
