//! CatRaRE heavy rainfall events.
//!
//! The DWD catalogue of radar-based heavy rainfall events ships as a GeoJSON
//! feature collection of event footprints. Each feature becomes one
//! [`RainEvent`] positioned at its footprint centroid and drawn as a circle
//! whose area matches the footprint and whose color follows the peak depth.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use overlay::{LayerState, PointFeature};
use renderer::Color;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};

/// Events older than this many calendar years are hidden by default.
pub const DEFAULT_YEARS: u32 = 10;

// Circles stay visible at national zoom and never swamp a city
const MIN_RADIUS_M: f32 = 1_000.0;
const MAX_RADIUS_M: f32 = 40_000.0;
const DEFAULT_RADIUS_M: f32 = 2_000.0;

/// One heavy rainfall event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainEvent {
    pub id: String,
    pub date: NaiveDate,
    /// Start time as published, e.g. `"1400"`
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration_h: Option<f64>,
    /// Peak precipitation depth in mm
    pub max_mm: f64,
    /// Accumulated precipitation in mm
    pub total_mm: Option<f64>,
    pub warning_level: Option<u8>,
    pub area_km2: Option<f64>,
    pub lon: f64,
    pub lat: f64,
}

impl RainEvent {
    /// Date as the catalogue's `yyyymmdd` integer.
    pub fn date_key(&self) -> i32 {
        date_key(self.date)
    }

    /// Radius of the circle with the footprint's area.
    pub fn radius_m(&self) -> f32 {
        match self.area_km2 {
            Some(area) if area > 0.0 => {
                let radius = (area / std::f64::consts::PI).sqrt() * 1000.0;
                (radius as f32).clamp(MIN_RADIUS_M, MAX_RADIUS_M)
            }
            _ => DEFAULT_RADIUS_M,
        }
    }

    pub fn color(&self) -> Color {
        depth_color(self.max_mm)
    }

    pub fn label(&self) -> String {
        format!("{} {} {:.1} mm", self.id, self.date, self.max_mm)
    }

    pub fn to_point(&self) -> PointFeature {
        PointFeature {
            lon: self.lon,
            lat: self.lat,
            radius_m: self.radius_m(),
            color: self.color(),
            label: Some(self.label()),
        }
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    geometry: Option<Value>,
}

/// Parse a CatRaRE feature collection.
///
/// Features without an id, a valid `DATUM` or a usable geometry are skipped
/// with a warning.
pub fn parse_events(json: &str) -> Result<Vec<RainEvent>> {
    let collection: FeatureCollection = serde_json::from_str(json)?;
    let total = collection.features.len();

    let events: Vec<RainEvent> = collection
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| match to_event(feature) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(index, error = %e, "Skipping CatRaRE feature");
                None
            }
        })
        .collect();

    debug!(total, parsed = events.len(), "Parsed CatRaRE events");
    Ok(events)
}

pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<RainEvent>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        DashboardError::invalid_catalogue(format!("{}: {}", path.display(), e))
    })?;
    parse_events(&json)
}

/// Keep events from January 1st of `today.year() - years` onwards.
pub fn filter_recent(events: Vec<RainEvent>, years: u32, today: NaiveDate) -> Vec<RainEvent> {
    let min_year = today.year() - years as i32;
    let min_key = min_year * 10_000 + 101;
    events
        .into_iter()
        .filter(|e| e.date_key() >= min_key)
        .collect()
}

/// Point layer with one circle per event.
pub fn event_layer(id: impl Into<String>, events: &[RainEvent]) -> LayerState {
    LayerState::points(id, events.iter().map(RainEvent::to_point).collect())
}

/// Peak depth color, yellow through purple.
pub fn depth_color(max_mm: f64) -> Color {
    match max_mm {
        v if v < 25.0 => Color::new(255, 214, 0, 200),
        v if v < 40.0 => Color::new(255, 140, 0, 200),
        v if v < 60.0 => Color::new(230, 30, 30, 200),
        v if v < 100.0 => Color::new(150, 0, 40, 200),
        _ => Color::new(110, 0, 140, 200),
    }
}

fn to_event(feature: Feature) -> Result<RainEvent> {
    let props = &feature.properties;

    let id = prop_string(props, "ID")
        .ok_or_else(|| DashboardError::invalid_catalogue("missing ID"))?;
    let datum = prop_i64(props, "DATUM")
        .ok_or_else(|| DashboardError::invalid_catalogue(format!("{}: missing DATUM", id)))?;
    let date = parse_datum(datum)
        .ok_or_else(|| DashboardError::invalid_catalogue(format!("{}: bad DATUM {}", id, datum)))?;
    let (lon, lat) = feature
        .geometry
        .as_ref()
        .and_then(centroid)
        .ok_or_else(|| DashboardError::invalid_catalogue(format!("{}: no usable geometry", id)))?;

    Ok(RainEvent {
        date,
        start: prop_string(props, "ANFANG"),
        end: prop_string(props, "ENDE"),
        duration_h: prop_f64(props, "DAUER_H"),
        max_mm: prop_f64(props, "N_MAX").unwrap_or(0.0),
        total_mm: prop_f64(props, "N_SUMME"),
        warning_level: prop_i64(props, "WARNSTUFE").and_then(|v| u8::try_from(v).ok()),
        area_km2: prop_f64(props, "FLAECHE_KM2"),
        lon,
        lat,
        id,
    })
}

fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

fn parse_datum(datum: i64) -> Option<NaiveDate> {
    let year = i32::try_from(datum / 10_000).ok()?;
    let month = u32::try_from(datum / 100 % 100).ok()?;
    let day = u32::try_from(datum % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn prop_string(props: &Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.as_i64().map(|i| i.to_string()).unwrap_or_else(|| n.to_string())),
        _ => None,
    }
}

fn prop_f64(props: &Map<String, Value>, key: &str) -> Option<f64> {
    match props.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn prop_i64(props: &Map<String, Value>, key: &str) -> Option<i64> {
    match props.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Area-weighted centroid of a Point, Polygon or MultiPolygon geometry.
fn centroid(geometry: &Value) -> Option<(f64, f64)> {
    let coordinates = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Point" => position(coordinates),
        "Polygon" => {
            let outer = ring(coordinates.as_array()?.first()?)?;
            ring_centroid(&outer).map(|(x, y, _)| (x, y))
        }
        "MultiPolygon" => {
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            let mut total = 0.0;
            for polygon in coordinates.as_array()? {
                let Some(outer) = polygon.as_array().and_then(|p| p.first()).and_then(ring) else {
                    continue;
                };
                if let Some((x, y, area)) = ring_centroid(&outer) {
                    // Degenerate parts still count with a tiny weight
                    let weight = area.max(f64::EPSILON);
                    sum_x += x * weight;
                    sum_y += y * weight;
                    total += weight;
                }
            }
            (total > 0.0).then(|| (sum_x / total, sum_y / total))
        }
        _ => None,
    }
}

fn position(value: &Value) -> Option<(f64, f64)> {
    let pair = value.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}

fn ring(value: &Value) -> Option<Vec<(f64, f64)>> {
    value.as_array()?.iter().map(position).collect()
}

/// Shoelace centroid and absolute area; vertex mean for zero-area rings.
fn ring_centroid(ring: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    if ring.is_empty() {
        return None;
    }

    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, &(x0, y0)) in ring.iter().enumerate() {
        let (x1, y1) = ring[(i + 1) % ring.len()];
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if area2.abs() < 1e-12 {
        let n = ring.len() as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        return Some((sx / n, sy / n, 0.0));
    }

    Some((cx / (3.0 * area2), cy / (3.0 * area2), area2.abs() / 2.0))
}
