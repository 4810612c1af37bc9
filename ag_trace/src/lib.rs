//! Core library for reconstructing guidance geometry and diagnosing
//! implement-section behavior from recorded field-test telemetry.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod diagnostics;
pub mod geometry;
pub mod scene;
pub mod segments;
pub mod tracks;

pub use diagnostics::{classify, count_flags, format_report, FlagCounts, RootCause};
pub use geometry::{
    clip_to_northing, northing_extent, perpendicular_unit, ExtentOptions, NorthingExtent, Point,
};
pub use scene::{build_scene, AxisBounds, LineKind, MarkerKind, Scene, SceneItem, SceneOptions};
pub use segments::{split_runs, StateRun};
pub use tracks::{build_tracks, track_index_range, Track, TrackSet, DEFAULT_TRACK_RANGE};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("malformed telemetry: {0}")]
    MalformedInput(String),
    #[error("diagnostic field `{0}` is missing from the recording")]
    MissingField(&'static str),
    #[error("recording contains no path samples")]
    EmptyPath,
}

/// One record of the logged tractor path. The section-control fields are
/// optional at parse time so geometry-only recordings still plot; the
/// diagnostic evaluator reports the first missing one by name.
#[derive(Clone, Debug, Deserialize)]
pub struct PathSample {
    pub t: f64,
    pub e: f64,
    pub n: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub uturn: bool,
    #[serde(rename = "pathsAway", default)]
    pub paths_away: Option<f64>,
    #[serde(rename = "jobStarted", default)]
    pub job_started: Option<bool>,
    #[serde(rename = "autoBtnState", default)]
    pub auto_btn_state: Option<JsonValue>,
    #[serde(rename = "patchCounter", default)]
    pub patch_counter: Option<f64>,
    #[serde(rename = "sec0_btnState", default)]
    pub sec_btn_state: Option<JsonValue>,
    #[serde(rename = "sec0_on", default)]
    pub sec_on: Option<bool>,
    #[serde(rename = "sec0_mapping", default)]
    pub sec_mapping: Option<bool>,
    #[serde(rename = "sec0_onReq", default)]
    pub sec_on_req: Option<bool>,
    #[serde(rename = "sec0_offReq", default)]
    pub sec_off_req: Option<bool>,
    #[serde(rename = "avgSpeed", default)]
    pub avg_speed: Option<f64>,
    #[serde(rename = "slowCutoff", default)]
    pub slow_cutoff: Option<f64>,
    #[serde(rename = "sec0_speedPx", default)]
    pub sec_speed_px: Option<f64>,
}

impl PathSample {
    pub fn point(&self) -> Point {
        Point {
            e: self.e,
            n: self.n,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TraceMetadata {
    #[serde(rename = "toolWidth")]
    pub tool_width: Option<f64>,
    #[serde(rename = "youTurnPhase")]
    pub you_turn_phase: Option<JsonValue>,
    #[serde(rename = "isYouTurnBtnOn")]
    pub is_you_turn_btn_on: Option<bool>,
    #[serde(rename = "turnAreaWidth")]
    pub turn_area_width: Option<f64>,
    #[serde(rename = "testRunDateTime")]
    pub test_run_date_time: Option<String>,
}

/// One deserialized recording. Recording versions disagree on the
/// reference-line field name (`refABLine` vs the older `abLine`), so unknown
/// top-level fields are retained in `extra` and resolved through an ordered
/// alias list.
#[derive(Clone, Debug, Deserialize)]
pub struct TraceData {
    #[serde(rename = "tractorPath", default)]
    pub tractor_path: Vec<PathSample>,
    #[serde(rename = "fieldBoundary", default)]
    pub field_boundary: Vec<Point>,
    #[serde(rename = "turnLines", default)]
    pub turn_lines: Vec<Point>,
    #[serde(rename = "turnPattern", default)]
    pub turn_pattern: Vec<Point>,
    #[serde(default)]
    pub metadata: TraceMetadata,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl TraceData {
    /// Resolve the guidance reference line through `aliases`, first match
    /// wins; `Ok(None)` when no alias is present.
    pub fn reference_line(&self, aliases: &[String]) -> Result<Option<Vec<Point>>, TraceError> {
        for name in aliases {
            if let Some(value) = self.extra.get(name.as_str()) {
                let points: Vec<Point> = serde_json::from_value(value.clone())
                    .map_err(|e| TraceError::MalformedInput(format!("field `{name}`: {e}")))?;
                return Ok(Some(points));
            }
        }
        Ok(None)
    }

    pub fn path_points(&self) -> Vec<Point> {
        self.tractor_path.iter().map(PathSample::point).collect()
    }
}

/// Parse one recording from raw JSON bytes.
pub fn parse_trace(input: &[u8]) -> Result<TraceData, TraceError> {
    serde_json::from_slice(input).map_err(|e| TraceError::MalformedInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_recording() {
        let data = parse_trace(
            br#"{"tractorPath": [{"t": 0.0, "e": 1.0, "n": 2.0}],
                 "refABLine": [{"e": 0.0, "n": -10.0}, {"e": 0.0, "n": 10.0}]}"#,
        )
        .unwrap();
        assert_eq!(data.tractor_path.len(), 1);
        assert_eq!(data.tractor_path[0].point(), Point { e: 1.0, n: 2.0 });
        assert!(!data.tractor_path[0].uturn);

        let line = data
            .reference_line(&["refABLine".to_string(), "abLine".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(line.len(), 2);
    }

    #[test]
    fn alias_order_decides_between_line_fields() {
        let data = parse_trace(
            br#"{"abLine": [{"e": 1.0, "n": 0.0}, {"e": 1.0, "n": 5.0}],
                 "refABLine": [{"e": 2.0, "n": 0.0}, {"e": 2.0, "n": 5.0}]}"#,
        )
        .unwrap();
        let richer = data
            .reference_line(&["refABLine".to_string(), "abLine".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(richer[0].e, 2.0);

        let legacy = data
            .reference_line(&["abLine".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(legacy[0].e, 1.0);

        assert!(data
            .reference_line(&["noSuchLine".to_string()])
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_position_field_is_malformed() {
        let err = parse_trace(br#"{"tractorPath": [{"t": 0.0, "e": 1.0}]}"#).unwrap_err();
        assert!(matches!(err, TraceError::MalformedInput(_)));
        assert!(err.to_string().contains("missing field `n`"));
    }

    #[test]
    fn malformed_alias_payload_is_reported_by_name() {
        let data = parse_trace(br#"{"refABLine": "not points"}"#).unwrap();
        let err = data.reference_line(&["refABLine".to_string()]).unwrap_err();
        assert!(err.to_string().contains("refABLine"));
    }
}
