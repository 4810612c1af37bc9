//! Turns one recording into typed drawing primitives. Styling is the
//! rendering adapter's concern; everything geometric is decided here.

use crate::geometry::{northing_extent, ExtentOptions, Point};
use crate::segments::split_runs;
use crate::tracks::{build_tracks, track_index_range};
use crate::{TraceData, TraceError};

pub const PATTERN_TRIGGER_INDEX: usize = 2;
pub const TRIGGER_RADIUS_M: f64 = 1.0;
pub const TIME_LABEL_INTERVAL_S: f64 = 5.0;
pub const DEFAULT_TOOL_WIDTH_M: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Boundary,
    TurnLine,
    OffsetTrack,
    ReferenceLine,
    TurnPattern,
    PathStraight,
    PathManeuver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    TurnLineVertex,
    PatternStart,
    PathStart,
    PathEnd,
    TimeTick,
}

#[derive(Clone, Debug)]
pub enum SceneItem {
    Polyline { kind: LineKind, points: Vec<Point> },
    Marker { kind: MarkerKind, at: Point },
    Circle { at: Point, radius: f64 },
    Label { at: Point, text: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisBounds {
    pub e_min: f64,
    pub e_max: f64,
    pub n_min: f64,
    pub n_max: f64,
}

#[derive(Clone, Debug)]
pub struct Scene {
    /// Items in paint order.
    pub items: Vec<SceneItem>,
    pub axis: Option<AxisBounds>,
}

#[derive(Clone, Debug)]
pub struct SceneOptions {
    /// Reference-line field names, tried in order.
    pub line_aliases: Vec<String>,
    pub extent: ExtentOptions,
    pub tool_width: Option<f64>,
    pub track_range: Option<(i32, i32)>,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            line_aliases: vec!["refABLine".to_string(), "abLine".to_string()],
            extent: ExtentOptions::default(),
            tool_width: None,
            track_range: None,
        }
    }
}

/// Missing optional artifacts are simply not drawn; only a present-but-
/// malformed reference-line field is an error.
pub fn build_scene(data: &TraceData, opts: &SceneOptions) -> Result<Scene, TraceError> {
    let mut items = Vec::new();

    if !data.field_boundary.is_empty() {
        let mut points = data.field_boundary.clone();
        points.push(points[0]);
        items.push(SceneItem::Polyline {
            kind: LineKind::Boundary,
            points,
        });
    }

    if !data.turn_lines.is_empty() {
        items.push(SceneItem::Polyline {
            kind: LineKind::TurnLine,
            points: data.turn_lines.clone(),
        });
        for &at in &data.turn_lines {
            items.push(SceneItem::Marker {
                kind: MarkerKind::TurnLineVertex,
                at,
            });
        }
    }

    if let Some(reference) = data.reference_line(&opts.line_aliases)? {
        let path_points = data.path_points();
        let extent = northing_extent(&data.field_boundary, &path_points, &opts.extent);
        let width = opts
            .tool_width
            .or(data.metadata.tool_width)
            .unwrap_or(DEFAULT_TOOL_WIDTH_M);
        let range = opts
            .track_range
            .unwrap_or_else(|| track_index_range(&data.tractor_path));
        if let Some(set) = build_tracks(&reference, width, extent, range) {
            for track in &set.tracks {
                items.push(SceneItem::Polyline {
                    kind: LineKind::OffsetTrack,
                    points: track.line.to_vec(),
                });
            }
            items.push(SceneItem::Polyline {
                kind: LineKind::ReferenceLine,
                points: set.reference.to_vec(),
            });
        }
    }

    if !data.turn_pattern.is_empty() {
        items.push(SceneItem::Polyline {
            kind: LineKind::TurnPattern,
            points: data.turn_pattern.clone(),
        });
        if data.turn_pattern.len() > PATTERN_TRIGGER_INDEX {
            let at = data.turn_pattern[PATTERN_TRIGGER_INDEX];
            items.push(SceneItem::Marker {
                kind: MarkerKind::PatternStart,
                at,
            });
            items.push(SceneItem::Circle {
                at,
                radius: TRIGGER_RADIUS_M,
            });
        }
    }

    if !data.tractor_path.is_empty() {
        let positions = data.path_points();
        for run in split_runs(data.tractor_path.iter().map(|s| s.uturn)) {
            items.push(SceneItem::Polyline {
                kind: if run.state {
                    LineKind::PathManeuver
                } else {
                    LineKind::PathStraight
                },
                points: positions[run.start..run.end].to_vec(),
            });
        }

        items.push(SceneItem::Marker {
            kind: MarkerKind::PathStart,
            at: positions[0],
        });
        items.push(SceneItem::Marker {
            kind: MarkerKind::PathEnd,
            at: positions[positions.len() - 1],
        });

        let mut next_label = data.tractor_path[0].t;
        for sample in &data.tractor_path {
            if sample.t >= next_label {
                items.push(SceneItem::Marker {
                    kind: MarkerKind::TimeTick,
                    at: sample.point(),
                });
                items.push(SceneItem::Label {
                    at: sample.point().translate(1.0, 1.0),
                    text: format!("{:.0}s", sample.t),
                });
                while next_label <= sample.t {
                    next_label += TIME_LABEL_INTERVAL_S;
                }
            }
        }
    }

    Ok(Scene {
        items,
        axis: axis_bounds(&data.field_boundary),
    })
}

// Axis focus from the field boundary, 20% easting / 15% northing margins.
fn axis_bounds(boundary: &[Point]) -> Option<AxisBounds> {
    let first = boundary.first()?;
    let (mut e_min, mut e_max, mut n_min, mut n_max) = (first.e, first.e, first.n, first.n);
    for p in boundary {
        e_min = e_min.min(p.e);
        e_max = e_max.max(p.e);
        n_min = n_min.min(p.n);
        n_max = n_max.max(p.n);
    }
    let e_pad = (e_max - e_min) * 0.2;
    let n_pad = (n_max - n_min) * 0.15;
    Some(AxisBounds {
        e_min: e_min - e_pad,
        e_max: e_max + e_pad,
        n_min: n_min - n_pad,
        n_max: n_max + n_pad,
    })
}
