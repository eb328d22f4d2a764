//! CSV-backed local place index implementing [`Geocoder`].
//!
//! # CSV format
//!
//! ```csv
//! name,lat,lng
//! New York,40.7128,-74.0060
//! Philadelphia,39.9526,-75.1652
//! ```
//!
//! Name lookup is case-insensitive and ignores surrounding whitespace.
//! Strings that look like `"lat,lng"` resolve without a table entry.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `[lat, lng]` to the nearest named place for
//! reverse lookups.  Distances inside the tree are planar degrees, which is
//! fine for picking the nearest of a few thousand places; the reported
//! distance is re-checked with haversine against `reverse_radius_km`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::Deserialize;

use ft_core::Waypoint;

use crate::{Geocoder, SpatialError, SpatialResult};

/// Default radius within which a reverse lookup names a place.
const DEFAULT_REVERSE_RADIUS_KM: f64 = 50.0;

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct PlaceEntry {
    point: [f64; 2], // [lat, lng]
    place: usize,
}

impl RTreeObject for PlaceEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for PlaceEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlng = self.point[1] - point[1];
        dlat * dlat + dlng * dlng
    }
}

#[derive(Deserialize)]
struct PlaceRecord {
    name: String,
    lat:  f64,
    lng:  f64,
}

// ── Gazetteer ─────────────────────────────────────────────────────────────────

/// A named-place table with forward and reverse lookup.
pub struct Gazetteer {
    names:             Vec<String>,
    by_name:           HashMap<String, usize>,
    points:            Vec<Waypoint>,
    spatial_idx:       RTree<PlaceEntry>,
    reverse_radius_km: f64,
}

impl Gazetteer {
    /// Build from `(name, point)` pairs.  Later duplicates of a name win.
    pub fn new<I, S>(places: I) -> Self
    where
        I: IntoIterator<Item = (S, Waypoint)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut points = Vec::new();
        let mut by_name = HashMap::new();
        for (name, point) in places {
            let name: String = name.into();
            by_name.insert(normalize(&name), names.len());
            names.push(name);
            points.push(point);
        }

        let entries: Vec<PlaceEntry> = points
            .iter()
            .enumerate()
            .map(|(i, p)| PlaceEntry { point: [p.lat, p.lng], place: i })
            .collect();

        Self {
            names,
            by_name,
            points,
            spatial_idx: RTree::bulk_load(entries),
            reverse_radius_km: DEFAULT_REVERSE_RADIUS_KM,
        }
    }

    /// Load places from a CSV file.
    pub fn load_csv(path: &Path) -> SpatialResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Like [`load_csv`](Self::load_csv) but accepts any `Read` source.
    pub fn from_reader<R: Read>(reader: R) -> SpatialResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut places = Vec::new();
        for result in csv_reader.deserialize::<PlaceRecord>() {
            let row = result.map_err(|e| SpatialError::Parse(e.to_string()))?;
            let point = Waypoint::new(row.lat, row.lng);
            if !point.is_valid() {
                return Err(SpatialError::Parse(format!(
                    "place {:?} has out-of-range coordinate {point}",
                    row.name
                )));
            }
            places.push((row.name, point));
        }
        Ok(Self::new(places))
    }

    /// Only name places within `km` of a reverse-lookup point.
    pub fn with_reverse_radius_km(mut self, km: f64) -> Self {
        self.reverse_radius_km = km;
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Case-insensitive exact name lookup.
    pub fn lookup(&self, name: &str) -> Option<Waypoint> {
        self.by_name.get(&normalize(name)).map(|&i| self.points[i])
    }

    /// Nearest named place and its haversine distance in km.
    pub fn nearest(&self, point: Waypoint) -> Option<(&str, f64)> {
        self.spatial_idx
            .nearest_neighbor(&[point.lat, point.lng])
            .map(|e| (self.names[e.place].as_str(), point.distance_km(self.points[e.place])))
    }
}

#[async_trait]
impl Geocoder for Gazetteer {
    async fn resolve(&self, place: &str) -> SpatialResult<Waypoint> {
        if let Some(point) = self.lookup(place) {
            return Ok(point);
        }
        Waypoint::parse(place).map_err(|_| SpatialError::UnknownPlace(place.to_owned()))
    }

    async fn reverse(&self, point: Waypoint) -> SpatialResult<String> {
        match self.nearest(point) {
            Some((name, km)) if km <= self.reverse_radius_km => {
                if km < 1.0 {
                    Ok(name.to_owned())
                } else {
                    Ok(format!("near {name}"))
                }
            }
            _ => Err(SpatialError::UnknownPlace(point.label())),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
