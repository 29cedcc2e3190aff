use crate::errors::GeometryError;
use geo::{Coord, EuclideanDistance, EuclideanLength, Line, LineString, Point};
use geozero::wkt::Wkt;
use geozero::{ToGeo, ToWkt};

/// Factor applied to the tolerance on the single slack retry.
pub const SLACK_FACTOR: f64 = 10.0;

// --- Polyline Algebra ---

/// Pushes `c` unless it repeats the last coordinate exactly.
fn push_distinct(coords: &mut Vec<Coord>, c: Coord) {
    if coords.last() != Some(&c) {
        coords.push(c);
    }
}

fn segment_distance(a: Coord, b: Coord, p: Coord) -> f64 {
    Point::from(p).euclidean_distance(&Line::new(a, b))
}

/// Returns `line` with `point` inserted after the start of the first segment
/// closer than `tolerance`, or None when no segment qualifies.
///
/// Without a hit and with `allow_slack`, the whole line is tried once more at
/// `tolerance * 10`.
pub fn project_point(
    line: &LineString,
    point: Coord,
    tolerance: f64,
    allow_slack: bool,
) -> Option<LineString> {
    let coords = &line.0;
    let mut out = Vec::with_capacity(coords.len() + 1);
    let mut inserted = false;

    for (i, c) in coords.iter().enumerate() {
        push_distinct(&mut out, *c);
        if !inserted
            && i + 1 < coords.len()
            && segment_distance(*c, coords[i + 1], point).abs() < tolerance
        {
            push_distinct(&mut out, point);
            inserted = true;
        }
    }

    if inserted {
        Some(LineString::new(out))
    } else if allow_slack {
        project_point(
            &LineString::new(out),
            point,
            tolerance * SLACK_FACTOR,
            false,
        )
    } else {
        None
    }
}

/// Cuts `line` at every point of `points`, in order.
///
/// Each point is first projected into the line, then the line is cut where a
/// vertex equals the next outstanding point exactly. Returns `points.len() + 1`
/// consecutive sublines, or None if a point could not be projected or a cut
/// would leave a subline with fewer than two vertices.
pub fn split_by(
    line: &LineString,
    points: &[Coord],
    tolerance: f64,
    allow_slack: bool,
) -> Option<Vec<LineString>> {
    let mut projected = line.clone();
    for p in points {
        projected = project_point(&projected, *p, tolerance, allow_slack)?;
    }

    let mut parts = Vec::with_capacity(points.len() + 1);
    let mut current: Vec<Coord> = Vec::new();
    let mut idx = 0;

    for c in projected.0 {
        push_distinct(&mut current, c);
        if idx < points.len() && c == points[idx] {
            if current.len() < 2 {
                return None;
            }
            parts.push(LineString::new(std::mem::replace(&mut current, vec![c])));
            idx += 1;
        }
    }

    if current.len() < 2 {
        return None;
    }
    parts.push(LineString::new(current));

    (parts.len() == points.len() + 1).then_some(parts)
}

/// True if `point` lies closer than `tolerance` to some segment of `line`.
pub fn spans_point(line: &LineString, point: Coord, tolerance: f64, allow_slack: bool) -> bool {
    let hit = line
        .lines()
        .any(|seg| segment_distance(seg.start, seg.end, point).abs() < tolerance);

    hit || (allow_slack && spans_point(line, point, tolerance * SLACK_FACTOR, false))
}

/// Concatenates `b` onto `a`.
///
/// When `conditional`, `b` (minus its first vertex) is only added if `a` ends
/// exactly where `b` starts; otherwise `a` is returned unchanged. Repeated
/// vertices at the seam are collapsed.
pub fn append(a: &LineString, b: &LineString, conditional: bool) -> LineString {
    let mut coords = a.0.clone();

    if conditional {
        if a.0.last().is_some() && a.0.last() == b.0.first() {
            for c in b.0.iter().skip(1) {
                push_distinct(&mut coords, *c);
            }
        }
    } else {
        for c in &b.0 {
            push_distinct(&mut coords, *c);
        }
    }

    LineString::new(coords)
}

pub fn reverse(line: &LineString) -> LineString {
    LineString::new(line.0.iter().rev().copied().collect())
}

/// Two-point connector from the last vertex of `a` to the first vertex of `b`.
pub fn between(a: &LineString, b: &LineString) -> Option<LineString> {
    let start = *a.0.last()?;
    let end = *b.0.first()?;
    if start == end {
        return None;
    }
    Some(LineString::new(vec![start, end]))
}

/// Vertex-by-vertex comparison where each axis must differ by less than
/// `tolerance`. Identical vertices always match.
pub fn equals_within(a: &LineString, b: &LineString, tolerance: f64) -> bool {
    a.0.len() == b.0.len()
        && a.0
            .iter()
            .zip(&b.0)
            .all(|(p, q)| p == q || ((p.x - q.x).abs() < tolerance && (p.y - q.y).abs() < tolerance))
}

pub fn length(line: Option<&LineString>) -> f64 {
    line.map(|l| l.euclidean_length()).unwrap_or(0.0)
}

pub fn start_point(line: &LineString) -> Option<Coord> {
    line.0.first().copied()
}

pub fn end_point(line: &LineString) -> Option<Coord> {
    line.0.last().copied()
}

// --- Text Notation ---

/// Marker the attribute sources use for "no geometry".
pub const EMPTY_GEOMETRY_MARKER: &str = "POINT EMPTY";

pub fn parse_line(text: &str) -> Result<LineString, GeometryError> {
    let malformed = |reason: String| GeometryError::Malformed {
        text: text.to_string(),
        reason,
    };

    match Wkt(text).to_geo() {
        Ok(geo::Geometry::LineString(line)) if line.0.len() >= 2 => Ok(line),
        Ok(geo::Geometry::LineString(_)) => Err(malformed("fewer than two vertices".into())),
        Ok(_) => Err(malformed("not a line".into())),
        Err(e) => Err(malformed(e.to_string())),
    }
}

/// Like [`parse_line`], but blank text and the empty-point marker mean "absent".
pub fn parse_optional_line(text: &str) -> Result<Option<LineString>, GeometryError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(EMPTY_GEOMETRY_MARKER) {
        return Ok(None);
    }
    parse_line(trimmed).map(Some)
}

pub fn line_to_wkt(line: &LineString) -> Result<String, GeometryError> {
    geo::Geometry::LineString(line.clone())
        .to_wkt()
        .map_err(|e| GeometryError::Malformed {
            text: format!("{:?}", line.0),
            reason: e.to_string(),
        })
}

pub fn point_to_wkt(point: Coord) -> Result<String, GeometryError> {
    geo::Geometry::Point(Point::from(point))
        .to_wkt()
        .map_err(|e| GeometryError::Malformed {
            text: format!("{:?}", point),
            reason: e.to_string(),
        })
}
