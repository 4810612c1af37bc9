//! Clipped reference line plus the family of parallel guidance tracks.

use crate::geometry::{clip_to_northing, perpendicular_unit, NorthingExtent, Point};
use crate::PathSample;

pub const DEFAULT_TRACK_RANGE: (i32, i32) = (-5, 5);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    pub index: i32,
    pub line: [Point; 2],
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackSet {
    pub reference: [Point; 2],
    pub tracks: Vec<Track>,
}

// Half-width bias: the implement edge sits half a width from the reference
// line on the first pass, with the implement centered on the vehicle.
fn offset_distance(index: i32, width: f64) -> f64 {
    if index > 0 {
        (f64::from(index) - 0.5) * width
    } else {
        (f64::from(index) + 0.5) * width
    }
}

/// `[min, max]` track indices from the per-sample `pathsAway` field. Samples
/// without the field count as 0; only an empty path falls back to
/// [`DEFAULT_TRACK_RANGE`].
pub fn track_index_range(samples: &[PathSample]) -> (i32, i32) {
    let mut values = samples.iter().map(|s| s.paths_away.unwrap_or(0.0));
    match values.next() {
        None => DEFAULT_TRACK_RANGE,
        Some(first) => {
            let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
            (min as i32, max as i32)
        }
    }
}

/// Returns `None` for fewer than two points: nothing to draw, not an error.
/// A line with equal northings (which also covers coincident endpoints)
/// cannot be clipped or offset along the northing axis and is emitted alone,
/// unclipped. `width` is assumed positive.
pub fn build_tracks(
    reference: &[Point],
    width: f64,
    extent: NorthingExtent,
    range: (i32, i32),
) -> Option<TrackSet> {
    if reference.len() < 2 {
        return None;
    }
    let line = [reference[0], reference[1]];
    if line[0].n == line[1].n {
        return Some(TrackSet {
            reference: line,
            tracks: Vec::new(),
        });
    }

    let clipped = clip_to_northing(line, extent.min, extent.max);
    // Direction comes from the original endpoints: clipping can shorten or
    // reorder them, which would flip the offset side.
    let perp = perpendicular_unit(line[0], line[1])?;

    let (min_track, max_track) = range;
    let mut tracks = Vec::new();
    for index in min_track..=max_track {
        if index == 0 {
            continue;
        }
        let distance = offset_distance(index, width);
        let de = -perp.e * distance;
        let dn = -perp.n * distance;
        tracks.push(Track {
            index,
            line: [clipped[0].translate(de, dn), clipped[1].translate(de, dn)],
        });
    }

    Some(TrackSet {
        reference: clipped,
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_line() -> Vec<Point> {
        vec![Point::new(0.0, -10.0), Point::new(0.0, 10.0)]
    }

    fn extent() -> NorthingExtent {
        NorthingExtent {
            min: -50.0,
            max: 50.0,
        }
    }

    #[test]
    fn reference_is_clipped_to_extent() {
        let set = build_tracks(&north_line(), 5.0, extent(), (0, 0)).unwrap();
        assert_eq!(set.reference[0], Point::new(0.0, -50.0));
        assert_eq!(set.reference[1], Point::new(0.0, 50.0));
        assert!(set.tracks.is_empty());
    }

    #[test]
    fn no_track_is_emitted_for_index_zero() {
        let set = build_tracks(&north_line(), 5.0, extent(), (-2, 2)).unwrap();
        assert_eq!(set.tracks.len(), 4);
        assert!(set.tracks.iter().all(|t| t.index != 0));
    }

    #[test]
    fn offsets_carry_the_half_width_bias() {
        let set = build_tracks(&north_line(), 5.0, extent(), (-2, 2)).unwrap();
        let offset_of = |index: i32| {
            let track = set.tracks.iter().find(|t| t.index == index).unwrap();
            track.line[0].e
        };
        // north-running line, perp = (-1, 0), offset applied as -perp * d
        assert!((offset_of(1) - 2.5).abs() < 1e-9);
        assert!((offset_of(-1) - -2.5).abs() < 1e-9);
        assert!((offset_of(2) - 7.5).abs() < 1e-9);
        assert!((offset_of(-2) - -7.5).abs() < 1e-9);

        // offsets shift easting only on this line
        for track in &set.tracks {
            assert_eq!(track.line[0].n, -50.0);
            assert_eq!(track.line[1].n, 50.0);
        }
    }

    #[test]
    fn vertical_line_is_emitted_alone_and_unclipped() {
        let line = vec![Point::new(-5.0, 3.0), Point::new(5.0, 3.0)];
        let set = build_tracks(&line, 5.0, extent(), (-2, 2)).unwrap();
        assert_eq!(set.reference, [line[0], line[1]]);
        assert!(set.tracks.is_empty());
    }

    #[test]
    fn fewer_than_two_points_is_nothing_to_draw() {
        assert!(build_tracks(&[], 5.0, extent(), (-2, 2)).is_none());
        assert!(build_tracks(&[Point::new(0.0, 0.0)], 5.0, extent(), (-2, 2)).is_none());
    }

    #[test]
    fn track_range_is_zero_when_no_sample_carries_the_field() {
        let samples: Vec<PathSample> = serde_json::from_str(
            r#"[{"t": 0.0, "e": 0.0, "n": 0.0}, {"t": 0.1, "e": 0.0, "n": 1.0}]"#,
        )
        .unwrap();
        assert_eq!(track_index_range(&samples), (0, 0));
    }

    #[test]
    fn track_range_defaults_only_for_an_empty_path() {
        assert_eq!(track_index_range(&[]), DEFAULT_TRACK_RANGE);
    }

    #[test]
    fn track_range_spans_observed_paths_away() {
        let samples: Vec<PathSample> = serde_json::from_str(
            r#"[{"t": 0.0, "e": 0.0, "n": 0.0, "pathsAway": -1.0},
                {"t": 0.1, "e": 0.0, "n": 1.0, "pathsAway": 3.0},
                {"t": 0.2, "e": 0.0, "n": 2.0}]"#,
        )
        .unwrap();
        assert_eq!(track_index_range(&samples), (-1, 3));
    }
}
