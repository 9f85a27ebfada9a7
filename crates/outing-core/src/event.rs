use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::datetime::{format_long_date, format_short_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetTier {
    Low,
    Medium,
    High,
}

impl BudgetTier {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Low => "£",
            Self::Medium => "££",
            Self::High => "£££",
        }
    }
}

/// Display symbol for an optional tier, `N/A` for unknown codes.
pub fn budget_symbol(tier: Option<BudgetTier>) -> &'static str {
    tier.map(BudgetTier::symbol).unwrap_or("N/A")
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLocation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// One record as the host page embeds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: EventId,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default)]
    pub date_ms: Option<i64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub location: RawLocation,

    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,

    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub attendees: Option<u64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub budget: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Location {
    /// Both coordinates present, finite and non-zero.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lng) = (self.lat?, self.lng?);
        let usable = |v: f64| v.is_finite() && v != 0.0;
        (usable(lat) && usable(lng)).then_some((lat, lng))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub time: String,
    pub duration_hours: Option<f64>,
    pub attendees: Option<u64>,
    pub location: Location,
    pub budget: Option<BudgetTier>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn from_raw(raw: RawEvent, date: Option<NaiveDate>) -> Self {
        let budget = raw.budget.as_deref().and_then(BudgetTier::from_code);
        Self {
            id: raw.id,
            name: raw.name,
            category: raw.category,
            description: raw.description,
            date,
            time: raw.time,
            duration_hours: raw.duration,
            attendees: raw.attendees,
            location: Location {
                address: raw.location.address,
                lat: raw.location.lat,
                lng: raw.location.lng,
            },
            budget,
            extra: raw.extra,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.location.coordinates()
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.date == Some(day)
    }

    pub fn budget_symbol(&self) -> &'static str {
        budget_symbol(self.budget)
    }

    pub fn short_date_label(&self) -> String {
        self.date
            .map(format_short_date)
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn long_date_label(&self) -> String {
        self.date
            .map(format_long_date)
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn time_label(&self) -> &str {
        if self.time.trim().is_empty() {
            "N/A"
        } else {
            &self.time
        }
    }

    pub fn duration_label(&self) -> String {
        match self.duration_hours {
            Some(hours) if hours > 0.0 => {
                let plural = if hours > 1.0 { "s" } else { "" };
                format!("{hours} hour{plural}")
            }
            _ => "N/A".to_string(),
        }
    }

    pub fn attendees_label(&self) -> String {
        match self.attendees {
            Some(count) if count > 0 => count.to_string(),
            _ => "N/A".to_string(),
        }
    }
}
