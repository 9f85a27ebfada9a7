use std::collections::BTreeMap;

use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Content bound to a marker, shown when its popup opens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Popup {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub body: Option<String>,
}

/// The mapping library as seen from the view-state code.
pub trait MapSurface {
    type Marker: Clone + PartialEq;

    fn set_view(&mut self, center: LatLng, zoom: u8);

    fn add_marker(&mut self, at: LatLng, popup: Popup) -> Self::Marker;

    fn remove_marker(&mut self, marker: &Self::Marker);

    fn open_popup(&mut self, marker: &Self::Marker);
}

/// Key to live marker handle. Keys are event ids on the dashboard and
/// sample positions on the finder.
#[derive(Debug, Clone)]
pub struct MarkerRegistry<K, M> {
    entries: BTreeMap<K, M>,
}

impl<K, M> Default for MarkerRegistry<K, M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K, M> MarkerRegistry<K, M>
where
    K: Ord + Copy + std::fmt::Debug,
    M: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&M> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Reverse lookup used to route a marker click back to its key.
    pub fn key_for(&self, marker: &M) -> Option<K> {
        self.entries
            .iter()
            .find_map(|(key, handle)| (handle == marker).then_some(*key))
    }

    /// Adds one marker per item. Items without a position get none.
    pub fn populate<S, I>(&mut self, surface: &mut S, items: I) -> usize
    where
        S: MapSurface<Marker = M>,
        I: IntoIterator<Item = (K, Option<LatLng>, Popup)>,
    {
        let mut added = 0;
        for (key, position, popup) in items {
            let Some(position) = position else {
                trace!(?key, "no coordinates; skipping marker");
                continue;
            };
            let marker = surface.add_marker(position, popup);
            if let Some(old) = self.entries.insert(key, marker) {
                surface.remove_marker(&old);
            }
            added += 1;
        }
        debug!(added, total = self.entries.len(), "populated marker registry");
        added
    }

    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: MapSurface<Marker = M>,
    {
        for marker in self.entries.values() {
            surface.remove_marker(marker);
        }
        debug!(removed = self.entries.len(), "cleared marker registry");
        self.entries.clear();
    }

    /// Drops every marker and recreates them for `items` only.
    pub fn redraw<S, I>(&mut self, surface: &mut S, items: I) -> usize
    where
        S: MapSurface<Marker = M>,
        I: IntoIterator<Item = (K, Option<LatLng>, Popup)>,
    {
        self.clear(surface);
        self.populate(surface, items)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMap;
    use super::*;

    fn item(key: u32, at: Option<(f64, f64)>) -> (u32, Option<LatLng>, Popup) {
        (
            key,
            at.map(LatLng::from),
            Popup {
                title: format!("item {key}"),
                ..Popup::default()
            },
        )
    }

    #[test]
    fn items_without_coordinates_get_no_marker() {
        let mut map = RecordingMap::default();
        let mut registry = MarkerRegistry::new();
        let added = registry.populate(
            &mut map,
            vec![item(1, Some((55.86, -4.25))), item(2, None), item(3, Some((55.87, -4.29)))],
        );

        assert_eq!(added, 2);
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&2));
        assert_eq!(registry.key_for(&1), Some(3));
        assert_eq!(registry.key_for(&7), None);
    }

    #[test]
    fn redraw_replaces_every_marker() {
        let mut map = RecordingMap::default();
        let mut registry = MarkerRegistry::new();
        registry.populate(&mut map, vec![item(0, Some((1.0, 1.0))), item(1, Some((2.0, 2.0)))]);
        registry.redraw(&mut map, vec![item(1, Some((2.0, 2.0)))]);

        assert_eq!(registry.len(), 1);
        assert_eq!(map.live, vec![2]);
        assert_eq!(registry.get(&1), Some(&2));

        registry.clear(&mut map);
        assert!(registry.is_empty());
        assert!(map.live.is_empty());
    }
}
