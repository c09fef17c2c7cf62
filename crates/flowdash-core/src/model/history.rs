// ── Historical series ──
//
// Two parallel series back the daily chart: battery energy flow per
// interval (tagged with where it came from and went to) and battery
// state of charge. Both are refetched wholesale when the window moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::HYSTERESIS_WATTS;

/// Source or destination of an energy flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlowEndpoint {
    Solar,
    Grid,
    Battery,
    Home,
}

impl FlowEndpoint {
    /// Which source charged the battery, given the energy each supplied.
    ///
    /// Solar wins unless the grid share plus the hysteresis margin
    /// exceeds the solar share.
    pub fn charge_source(from_solar: f64, from_grid: f64) -> Self {
        if from_grid + HYSTERESIS_WATTS > from_solar {
            Self::Grid
        } else {
            Self::Solar
        }
    }
}

/// One sample of a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub from: Option<FlowEndpoint>,
    #[serde(default)]
    pub to: Option<FlowEndpoint>,
}

impl HistoryPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            from: None,
            to: None,
        }
    }
}

/// Time-ordered samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub points: Vec<HistoryPoint>,
}

impl HistoricalSeries {
    /// Build a series, sorting by timestamp.
    pub fn new(mut points: Vec<HistoryPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }
}

/// Point where the straight line from `start` to `end` crosses zero.
///
/// Keeps the tags of `start`. Callers only use this when the two values
/// have opposite signs; equal values yield `start`'s timestamp.
pub fn interpolate_zero_crossing(start: &HistoryPoint, end: &HistoryPoint) -> HistoryPoint {
    let span = end.value - start.value;
    let timestamp = if span == 0.0 {
        start.timestamp
    } else {
        let fraction = -start.value / span;
        let elapsed = end.timestamp - start.timestamp;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::as_conversions
        )]
        let offset_ms = (elapsed.num_milliseconds() as f64 * fraction).round() as i64;
        start.timestamp + chrono::Duration::milliseconds(offset_ms)
    };
    HistoryPoint {
        timestamp,
        value: 0.0,
        from: start.from,
        to: start.to,
    }
}

/// Insert a zero point between every pair of samples whose values have
/// opposite signs, so a chart can split the area at the axis.
pub fn insert_zero_crossings(points: &[HistoryPoint]) -> Vec<HistoryPoint> {
    let mut out = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let [start, end] = pair else { continue };
        out.push(start.clone());
        if start.value * end.value < 0.0 {
            out.push(interpolate_zero_crossing(start, end));
        }
    }
    if let Some(last) = points.last() {
        out.push(last.clone());
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn tagged(secs: i64, value: f64) -> HistoryPoint {
        HistoryPoint {
            timestamp: at(secs),
            value,
            from: Some(FlowEndpoint::Solar),
            to: Some(FlowEndpoint::Home),
        }
    }

    #[test]
    fn zero_crossing_lands_at_midpoint() {
        let crossing = interpolate_zero_crossing(&tagged(0, 100.0), &tagged(100, -100.0));
        assert_eq!(crossing.timestamp, at(50));
        assert!(crossing.value.abs() < f64::EPSILON);
        assert_eq!(crossing.from, Some(FlowEndpoint::Solar));
        assert_eq!(crossing.to, Some(FlowEndpoint::Home));
    }

    #[test]
    fn crossings_are_inserted_only_on_sign_change() {
        let points = vec![
            tagged(0, 100.0),
            tagged(100, -300.0),
            tagged(200, -100.0),
            tagged(300, 0.0),
        ];
        let out = insert_zero_crossings(&points);
        assert_eq!(out.len(), 5);
        assert_eq!(out[1].timestamp, at(25));
        assert_eq!(out[4].timestamp, at(300));
    }

    #[test]
    fn solar_is_the_charge_source_unless_grid_clearly_wins() {
        assert_eq!(FlowEndpoint::charge_source(500.0, 100.0), FlowEndpoint::Solar);
        assert_eq!(FlowEndpoint::charge_source(500.0, 489.0), FlowEndpoint::Solar);
        assert_eq!(FlowEndpoint::charge_source(500.0, 491.0), FlowEndpoint::Grid);
        assert_eq!(FlowEndpoint::charge_source(0.0, 200.0), FlowEndpoint::Grid);
    }

    #[test]
    fn series_is_sorted_on_construction() {
        let series = HistoricalSeries::new(vec![tagged(200, 1.0), tagged(100, 2.0)]);
        assert_eq!(series.points[0].timestamp, at(100));
        assert_eq!(series.latest().map(|p| p.timestamp), Some(at(200)));
    }
}
