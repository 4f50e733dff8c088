//! Path geometry: flattening SVG path data for arc-length queries.
//!
//! Curves are flattened into short line segments, which is precise enough for
//! placing particles and computing bounding boxes.

use super::geometry::Point;
use super::tree::{Document, NodeId};

/// Segments used to approximate each curve or arc.
const CURVE_STEPS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Segment {
    from: Point,
    to: Point,
}

/// A flattened drawable outline: a list of straight segments with cumulative
/// lengths. Pen moves between subpaths add no length.
#[derive(Debug, Clone, Default)]
pub struct PathGeometry {
    origin: Option<Point>,
    segments: Vec<Segment>,
    /// Arc length at the end of each segment.
    cumulative: Vec<f64>,
}

impl PathGeometry {
    /// Geometry of a `path`, `line`, `polyline` or `polygon` element.
    pub fn from_element(doc: &Document, id: NodeId) -> Option<Self> {
        match doc.name(id) {
            "path" => doc.attr(id, "d").map(Self::from_path_data),
            "line" => {
                let num = |n| doc.attr_f64(id, n).unwrap_or(0.0);
                Some(Self::from_points(
                    &[Point::new(num("x1"), num("y1")), Point::new(num("x2"), num("y2"))],
                    false,
                ))
            }
            "polyline" | "polygon" => {
                let points = parse_points(doc.attr(id, "points").unwrap_or(""));
                Some(Self::from_points(&points, doc.name(id) == "polygon"))
            }
            _ => None,
        }
    }

    pub fn from_points(points: &[Point], closed: bool) -> Self {
        let mut geom = Self::default();
        let Some(first) = points.first() else {
            return geom;
        };
        geom.move_to(*first);
        for p in &points[1..] {
            geom.line_to(*p);
        }
        if closed {
            geom.line_to(*first);
        }
        geom
    }

    /// Flatten SVG path data. Parsing stops at the first malformed token,
    /// keeping everything drawn up to that point.
    pub fn from_path_data(d: &str) -> Self {
        let mut geom = Self::default();
        let mut tokens = Tokens::new(d);
        let mut cmd: Option<u8> = None;
        let mut cur = Point::default();
        let mut subpath_start = Point::default();
        // Reflection points for the smooth curve commands.
        let mut last_cubic_ctrl: Option<Point> = None;
        let mut last_quad_ctrl: Option<Point> = None;

        loop {
            tokens.skip_separators();
            if tokens.at_end() {
                break;
            }
            if let Some(c) = tokens.command() {
                cmd = Some(c);
            } else if cmd.is_none() {
                break;
            }
            let Some(c) = cmd else { break };
            let relative = c.is_ascii_lowercase();
            let base = if relative { cur } else { Point::default() };
            let at = |x: f64, y: f64| Point::new(base.x + x, base.y + y);

            let mut cubic_ctrl = None;
            let mut quad_ctrl = None;
            let ok = match c.to_ascii_uppercase() {
                b'M' => tokens.pair().map(|(x, y)| {
                    cur = at(x, y);
                    subpath_start = cur;
                    geom.move_to(cur);
                    // Extra coordinate pairs after a move are implicit line-tos.
                    cmd = Some(if relative { b'l' } else { b'L' });
                }),
                b'L' => tokens.pair().map(|(x, y)| {
                    cur = at(x, y);
                    geom.line_to(cur);
                }),
                b'H' => tokens.number().map(|x| {
                    cur = Point::new(if relative { cur.x + x } else { x }, cur.y);
                    geom.line_to(cur);
                }),
                b'V' => tokens.number().map(|y| {
                    cur = Point::new(cur.x, if relative { cur.y + y } else { y });
                    geom.line_to(cur);
                }),
                b'C' => tokens.pairs::<3>().map(|[(x1, y1), (x2, y2), (x, y)]| {
                    let (c1, c2, end) = (at(x1, y1), at(x2, y2), at(x, y));
                    geom.cubic_to(cur, c1, c2, end);
                    cubic_ctrl = Some(c2);
                    cur = end;
                }),
                b'S' => tokens.pairs::<2>().map(|[(x2, y2), (x, y)]| {
                    let c1 = last_cubic_ctrl.map_or(cur, |p| reflect(p, cur));
                    let (c2, end) = (at(x2, y2), at(x, y));
                    geom.cubic_to(cur, c1, c2, end);
                    cubic_ctrl = Some(c2);
                    cur = end;
                }),
                b'Q' => tokens.pairs::<2>().map(|[(x1, y1), (x, y)]| {
                    let (ctrl, end) = (at(x1, y1), at(x, y));
                    geom.quad_to(cur, ctrl, end);
                    quad_ctrl = Some(ctrl);
                    cur = end;
                }),
                b'T' => tokens.pair().map(|(x, y)| {
                    let ctrl = last_quad_ctrl.map_or(cur, |p| reflect(p, cur));
                    let end = at(x, y);
                    geom.quad_to(cur, ctrl, end);
                    quad_ctrl = Some(ctrl);
                    cur = end;
                }),
                b'A' => tokens.arc().map(|(rx, ry, rot, large, sweep, x, y)| {
                    let end = at(x, y);
                    for p in arc_points(cur, rx, ry, rot, large, sweep, end) {
                        geom.line_to(p);
                    }
                    cur = end;
                }),
                b'Z' => {
                    geom.line_to(subpath_start);
                    cur = subpath_start;
                    // Z takes no arguments; a following number would be malformed.
                    cmd = None;
                    Some(())
                }
                _ => None,
            };
            if ok.is_none() {
                break;
            }
            last_cubic_ctrl = cubic_ctrl;
            last_quad_ctrl = quad_ctrl;
        }
        geom
    }

    fn move_to(&mut self, p: Point) {
        if self.origin.is_none() {
            self.origin = Some(p);
        }
        self.segments.push(Segment { from: p, to: p });
        self.cumulative.push(self.length());
    }

    fn line_to(&mut self, p: Point) {
        let from = self.segments.last().map_or(p, |s| s.to);
        if self.origin.is_none() {
            self.origin = Some(from);
        }
        let total = self.length() + from.distance(p);
        self.segments.push(Segment { from, to: p });
        self.cumulative.push(total);
    }

    fn cubic_to(&mut self, p0: Point, c1: Point, c2: Point, p3: Point) {
        for i in 1..=CURVE_STEPS {
            let t = i as f64 / CURVE_STEPS as f64;
            let mt = 1.0 - t;
            let (a, b, c, d) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
            self.line_to(Point::new(
                a * p0.x + b * c1.x + c * c2.x + d * p3.x,
                a * p0.y + b * c1.y + c * c2.y + d * p3.y,
            ));
        }
    }

    fn quad_to(&mut self, p0: Point, ctrl: Point, p2: Point) {
        for i in 1..=CURVE_STEPS {
            let t = i as f64 / CURVE_STEPS as f64;
            let mt = 1.0 - t;
            let (a, b, c) = (mt * mt, 2.0 * mt * t, t * t);
            self.line_to(Point::new(
                a * p0.x + b * ctrl.x + c * p2.x,
                a * p0.y + b * ctrl.y + c * p2.y,
            ));
        }
    }

    /// Total drawn length.
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
    }

    /// Every segment end point, for bounding boxes.
    pub fn vertices(&self) -> Vec<Point> {
        self.origin
            .into_iter()
            .chain(self.segments.iter().map(|s| s.to))
            .collect()
    }

    /// Point at the given arc length, clamped to the path's extent.
    pub fn point_at(&self, distance: f64) -> Option<Point> {
        let origin = self.origin?;
        if self.segments.is_empty() || distance <= 0.0 {
            return Some(origin);
        }
        let distance = distance.min(self.length());
        let idx = self.cumulative.partition_point(|&c| c < distance);
        let Some(seg) = self.segments.get(idx) else {
            return self.segments.last().map(|s| s.to);
        };
        let end = self.cumulative[idx];
        let seg_len = seg.from.distance(seg.to);
        if seg_len == 0.0 {
            return Some(seg.to);
        }
        let t = 1.0 - (end - distance) / seg_len;
        Some(Point::new(
            seg.from.x + (seg.to.x - seg.from.x) * t,
            seg.from.y + (seg.to.y - seg.from.y) * t,
        ))
    }
}

fn reflect(ctrl: Point, around: Point) -> Point {
    Point::new(2.0 * around.x - ctrl.x, 2.0 * around.y - ctrl.y)
}

/// Parse a `points` attribute: `"x1,y1 x2,y2 ..."`.
pub fn parse_points(value: &str) -> Vec<Point> {
    let nums: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|s| s.parse().ok())
        .collect();
    nums.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect()
}

/// Flatten an elliptical arc (endpoint parameterization) into points after `p0`.
fn arc_points(
    p0: Point,
    rx: f64,
    ry: f64,
    rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    p1: Point,
) -> Vec<Point> {
    if p0 == p1 {
        return Vec::new();
    }
    let (mut rx, mut ry) = (rx.abs(), ry.abs());
    if rx == 0.0 || ry == 0.0 {
        return vec![p1];
    }
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let dx2 = (p0.x - p1.x) / 2.0;
    let dy2 = (p0.y - p1.y) / 2.0;
    let x1p = cos * dx2 + sin * dy2;
    let y1p = -sin * dx2 + cos * dy2;

    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }

    let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let coef = sign * (num / den).max(0.0).sqrt();
    let cxp = coef * rx * y1p / ry;
    let cyp = -coef * ry * x1p / rx;
    let cx = cos * cxp - sin * cyp + (p0.x + p1.x) / 2.0;
    let cy = sin * cxp + cos * cyp + (p0.y + p1.y) / 2.0;

    let angle = |ux: f64, uy: f64, vx: f64, vy: f64| (ux * vy - uy * vx).atan2(ux * vx + uy * vy);
    let (ux, uy) = ((x1p - cxp) / rx, (y1p - cyp) / ry);
    let (vx, vy) = ((-x1p - cxp) / rx, (-y1p - cyp) / ry);
    let theta1 = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= std::f64::consts::TAU;
    } else if sweep && dtheta < 0.0 {
        dtheta += std::f64::consts::TAU;
    }

    (1..=CURVE_STEPS)
        .map(|i| {
            let t = theta1 + dtheta * i as f64 / CURVE_STEPS as f64;
            let (st, ct) = t.sin_cos();
            Point::new(
                cos * rx * ct - sin * ry * st + cx,
                sin * rx * ct + cos * ry * st + cy,
            )
        })
        .collect()
}

/// Cursor over path data.
struct Tokens<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a str) -> Self {
        Self { s: s.as_bytes(), pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace() || b == b',') {
            self.pos += 1;
        }
    }

    fn command(&mut self) -> Option<u8> {
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() && b != b'e' && b != b'E' => {
                self.pos += 1;
                Some(b)
            }
            _ => None,
        }
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut digits = self.eat_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            digits += self.eat_digits();
        }
        if digits == 0 {
            self.pos = start;
            return None;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.eat_digits() == 0 {
                self.pos = mark;
            }
        }
        std::str::from_utf8(&self.s[start..self.pos]).ok()?.parse().ok()
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn flag(&mut self) -> Option<bool> {
        self.skip_separators();
        let b = self.peek()?;
        let flag = match b {
            b'0' => false,
            b'1' => true,
            _ => return None,
        };
        self.pos += 1;
        Some(flag)
    }

    fn pair(&mut self) -> Option<(f64, f64)> {
        Some((self.number()?, self.number()?))
    }

    fn pairs<const N: usize>(&mut self) -> Option<[(f64, f64); N]> {
        let mut out = [(0.0, 0.0); N];
        for slot in &mut out {
            *slot = self.pair()?;
        }
        Some(out)
    }

    #[allow(clippy::type_complexity)]
    fn arc(&mut self) -> Option<(f64, f64, f64, bool, bool, f64, f64)> {
        let rx = self.number()?;
        let ry = self.number()?;
        let rot = self.number()?;
        let large = self.flag()?;
        let sweep = self.flag()?;
        let (x, y) = self.pair()?;
        Some((rx, ry, rot, large, sweep, x, y))
    }
}
