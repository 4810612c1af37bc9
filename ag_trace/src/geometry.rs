//! 2-D point and line helpers. Guidance lines are parameterized on the
//! northing axis, so clipping happens against a northing interval.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Point {
    pub e: f64,
    pub n: f64,
}

impl Point {
    pub fn new(e: f64, n: f64) -> Self {
        Self { e, n }
    }

    pub fn translate(self, de: f64, dn: f64) -> Self {
        Self {
            e: self.e + de,
            n: self.n + dn,
        }
    }
}

/// Unit vector rotated 90 degrees from the direction `p0 -> p1`; `None` when
/// the endpoints coincide.
pub fn perpendicular_unit(p0: Point, p1: Point) -> Option<Point> {
    let de = p1.e - p0.e;
    let dn = p1.n - p0.n;
    let length = (de * de + dn * dn).sqrt();
    if length == 0.0 {
        return None;
    }
    Some(Point {
        e: -dn / length,
        n: de / length,
    })
}

/// Clip the infinite line through two points to `[n_min, n_max]` on the
/// northing axis. A line with equal northings at both endpoints has no
/// northing extent to clip against and is returned unchanged.
pub fn clip_to_northing(line: [Point; 2], n_min: f64, n_max: f64) -> [Point; 2] {
    let [a, b] = line;
    if a.n == b.n {
        return line;
    }
    let slope = (b.e - a.e) / (b.n - a.n);
    let intercept = a.e - slope * a.n;
    [
        Point::new(slope * n_min + intercept, n_min),
        Point::new(slope * n_max + intercept, n_max),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NorthingExtent {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug)]
pub struct ExtentOptions {
    pub boundary_margin: f64,
    pub path_margin: f64,
    pub fallback: NorthingExtent,
}

impl Default for ExtentOptions {
    fn default() -> Self {
        Self {
            boundary_margin: 0.3,
            path_margin: 0.5,
            fallback: NorthingExtent {
                min: -200.0,
                max: 200.0,
            },
        }
    }
}

/// Boundary vertices first, then the recorded path, then the fixed fallback;
/// each source expands its raw northing range symmetrically by
/// `margin * range`.
pub fn northing_extent(boundary: &[Point], path: &[Point], opts: &ExtentOptions) -> NorthingExtent {
    expanded(boundary, opts.boundary_margin)
        .or_else(|| expanded(path, opts.path_margin))
        .unwrap_or(opts.fallback)
}

fn expanded(points: &[Point], margin: f64) -> Option<NorthingExtent> {
    let mut northings = points.iter().map(|p| p.n);
    let first = northings.next()?;
    let (min, max) = northings.fold((first, first), |(lo, hi), n| (lo.min(n), hi.max(n)));
    let pad = margin * (max - min);
    Some(NorthingExtent {
        min: min - pad,
        max: max + pad,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_is_unit_and_rotated() {
        // north-running line: perpendicular points due west
        let perp = perpendicular_unit(Point::new(0.0, 0.0), Point::new(0.0, 10.0)).unwrap();
        assert!((perp.e - -1.0).abs() < 1e-12);
        assert!(perp.n.abs() < 1e-12);

        let perp = perpendicular_unit(Point::new(0.0, 0.0), Point::new(3.0, 4.0)).unwrap();
        assert!((perp.e * perp.e + perp.n * perp.n - 1.0).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_of_coincident_points_is_none() {
        assert!(perpendicular_unit(Point::new(2.0, 2.0), Point::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn clip_round_trips_the_line_equation() {
        let line = [Point::new(1.0, -3.0), Point::new(7.0, 9.0)];
        let clipped = clip_to_northing(line, -100.0, 50.0);

        assert_eq!(clipped[0].n, -100.0);
        assert_eq!(clipped[1].n, 50.0);

        // slope/intercept recomputed from the clipped points match the input line
        let slope = (line[1].e - line[0].e) / (line[1].n - line[0].n);
        let intercept = line[0].e - slope * line[0].n;
        let re_slope = (clipped[1].e - clipped[0].e) / (clipped[1].n - clipped[0].n);
        let re_intercept = clipped[0].e - re_slope * clipped[0].n;
        assert!((slope - re_slope).abs() < 1e-9);
        assert!((intercept - re_intercept).abs() < 1e-9);
    }

    #[test]
    fn clip_leaves_vertical_line_unchanged() {
        let line = [Point::new(-4.0, 12.0), Point::new(9.0, 12.0)];
        assert_eq!(clip_to_northing(line, -100.0, 100.0), line);
    }

    #[test]
    fn extent_from_boundary_with_margin() {
        let boundary = [Point::new(0.0, 10.0), Point::new(5.0, 20.0), Point::new(2.0, 15.0)];
        let extent = northing_extent(&boundary, &[], &ExtentOptions::default());
        assert_eq!(extent, NorthingExtent { min: 7.0, max: 23.0 });
    }

    #[test]
    fn extent_falls_back_to_path_then_fixed_interval() {
        let path = [Point::new(0.0, 0.0), Point::new(0.0, 100.0)];
        let opts = ExtentOptions::default();

        let from_path = northing_extent(&[], &path, &opts);
        assert_eq!(
            from_path,
            NorthingExtent {
                min: -50.0,
                max: 150.0
            }
        );

        let fallback = northing_extent(&[], &[], &opts);
        assert_eq!(fallback, opts.fallback);
    }
}
