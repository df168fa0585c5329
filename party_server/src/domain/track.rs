// Procedural racetrack generation.
//
// The pipeline turns a random point cloud into a closed, smoothed polyline:
// cloud -> convex hull -> push apart -> sharp-turn removal -> difficulty
// injection -> push apart -> loop removal -> sharp-turn removal -> tidy -> spline.
// The tidy step repeats loop removal and spacing until both hold at once.
// Stages that receive too few points to work with hand them back untouched.

use crate::domain::errors::TrackError;
use crate::domain::geometry::{
    Vec2, angle_between, centroid, cross, direction, distance, segments_intersect,
};
use crate::domain::spline::spline_chain;
use crate::domain::tuning::TrackTuning;
use rand::Rng;
use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::Arc;

/// A track control or sample point.
pub type TurnPoint = Vec2;

/// Generation parameters stored with the party record.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitConfig {
    pub seed: i64,
    pub min_point: usize,
    pub max_point: usize,
    pub x_size: f64,
    pub y_size: f64,
}

impl CircuitConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.min_point > self.max_point {
            return Err(TrackError::InvalidPointRange {
                min_point: self.min_point,
                max_point: self.max_point,
            });
        }
        let extent_ok = |v: f64| v.is_finite() && v > 0.0;
        if !extent_ok(self.x_size) || !extent_ok(self.y_size) {
            return Err(TrackError::InvalidExtent);
        }
        Ok(())
    }
}

/// Closed polyline racetrack. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    points: Arc<[TurnPoint]>,
}

impl Track {
    pub fn new(points: Vec<TurnPoint>) -> Self {
        Self {
            points: points.into(),
        }
    }

    pub fn points(&self) -> &[TurnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TurnPoint> {
        self.points.get(index).copied()
    }

    pub fn is_closed(&self) -> bool {
        self.points.first() == self.points.last()
    }

    /// Start grid: the first point, facing the point `lookahead` samples ahead.
    pub fn start(&self, lookahead: usize) -> Option<(Vec2, f64)> {
        let start = *self.points.first()?;
        let ahead_index = lookahead.min(self.points.len() - 1);
        let heading = (self.points[ahead_index] - start).angle();
        Some((start, heading))
    }
}

/// Runs the full pipeline with the given random source.
pub fn generate_track<R: Rng + ?Sized>(
    config: &CircuitConfig,
    tuning: &TrackTuning,
    rng: &mut R,
) -> Result<Track, TrackError> {
    let points = control_polygon(config, tuning, rng)?;
    let samples = spline_chain(&points, tuning.samples_per_segment, tuning.spline_alpha);
    Ok(Track::new(samples))
}

/// The closed control polygon the spline is fitted through.
pub fn control_polygon<R: Rng + ?Sized>(
    config: &CircuitConfig,
    tuning: &TrackTuning,
    rng: &mut R,
) -> Result<Vec<Vec2>, TrackError> {
    config.validate()?;

    let cloud = point_cloud(config, rng);
    let mut points = convex_hull(&cloud);

    for _ in 0..tuning.push_apart_passes {
        push_apart(&mut points, tuning.min_separation, rng);
    }
    points = remove_sharp_turns(&points, tuning.sharp_turn_angle);
    points = inject_difficulty(&points, tuning, rng);

    for _ in 0..tuning.push_apart_passes {
        push_apart(&mut points, tuning.min_separation, rng);
    }
    points = remove_loops(&points);
    points = remove_sharp_turns(&points, tuning.sharp_turn_angle);

    // Every step below only drops points, so this settles.
    loop {
        let tidied = enforce_separation(&remove_loops(&points), tuning.min_separation);
        if tidied.len() == points.len() {
            return Ok(points);
        }
        points = tidied;
    }
}

/// Uniform points inside the centred `x_size` by `y_size` rectangle.
pub fn point_cloud<R: Rng + ?Sized>(config: &CircuitConfig, rng: &mut R) -> Vec<Vec2> {
    let count = rng.gen_range(config.min_point..=config.max_point);
    (0..count)
        .map(|_| {
            Vec2::new(
                rng.gen_range(0.0..=config.x_size) - config.x_size / 2.0,
                rng.gen_range(0.0..=config.y_size) - config.y_size / 2.0,
            )
        })
        .collect()
}

/// Monotone-chain convex hull, returned as a closed loop without repeated points.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let mut lower: Vec<Vec2> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vec2> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    let mut hull: Vec<Vec2> = Vec::with_capacity(lower.len() + upper.len());
    for p in lower.into_iter().chain(upper) {
        if !hull.contains(&p) {
            hull.push(p);
        }
    }
    close_loop(&mut hull);
    hull
}

/// One pass pushing every pair of control points closer than `min_distance` apart.
///
/// Points are moved outwards, away from the polygon centroid. The closing
/// point is rewritten afterwards so the loop stays closed.
pub fn push_apart<R: Rng + ?Sized>(points: &mut [Vec2], min_distance: f64, rng: &mut R) {
    if points.len() < 3 {
        return;
    }
    let closed = is_closed(points);
    let open = if closed { points.len() - 1 } else { points.len() };
    let center = centroid(&points[..open]);

    for i in 0..open {
        for j in i + 1..open {
            let a = points[i];
            let b = points[j];
            if distance(a, b) >= min_distance {
                continue;
            }

            let center_to_a = direction(center, a);
            let center_to_b = direction(center, b);

            if same_direction(center_to_a, center_to_b) {
                let shift = Vec2::from_angle(center_to_a.angle()) * (min_distance / 2.0);
                points[i] = a + shift;
                points[j] = b - shift;
                continue;
            }

            if rng.gen_bool(0.5) {
                let push = (direction(b, a) + center_to_a).normalized() * min_distance;
                points[i] = a + push;
            } else {
                let push = (direction(a, b) + center_to_b).normalized() * min_distance;
                points[j] = b + push;
            }
        }
    }

    if closed {
        points[points.len() - 1] = points[0];
    }
}

/// Drops the middle point of every consecutive triple that turns too sharply
/// or runs almost straight.
pub fn remove_sharp_turns(points: &[Vec2], threshold: f64) -> Vec<Vec2> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut rejected = HashSet::new();
    for (index, triple) in points.windows(3).enumerate() {
        let (a, b, c) = (triple[0], triple[1], triple[2]);
        let a_to_b = direction(a, b);
        let b_to_c = direction(b, c);
        let c_to_b = direction(c, b);
        let b_to_a = direction(b, a);

        let angles = [
            angle_between(a_to_b, b_to_c),
            angle_between(a_to_b, c_to_b),
            angle_between(b_to_a, b_to_c),
            angle_between(b_to_a, c_to_b),
        ];
        if angles.iter().any(|angle| *angle < threshold) {
            rejected.insert(index + 1);
        }
    }

    retain_unless_degenerate(points, &rejected)
}

/// Inserts a randomly displaced midpoint into every edge longer than the
/// configured length.
pub fn inject_difficulty<R: Rng + ?Sized>(
    points: &[Vec2],
    tuning: &TrackTuning,
    rng: &mut R,
) -> Vec<Vec2> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len() * 2);
    out.push(points[0]);
    for edge in points.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        if distance(a, b) > tuning.difficulty_edge_length {
            let offset =
                rng.gen_range(0.0..=1.0f64).powf(tuning.difficulty_spice) * tuning.difficulty_max_offset;
            let angle = rng.gen_range(0.0..TAU);
            let midpoint = (a + b) * 0.5;
            out.push(midpoint + Vec2::from_angle(angle) * offset);
        }
        out.push(b);
    }
    out
}

/// Excises self-crossing loops until no two non-adjacent segments intersect.
///
/// For the first intersecting pair `[i, i+1]` and `[j, j+1]` the points
/// `i+1..=j` are removed, then the polygon is checked again. When that would
/// leave fewer than three points only `i+1` goes.
pub fn remove_loops(points: &[Vec2]) -> Vec<Vec2> {
    let mut current = points.to_vec();
    while let Some((i, j)) = first_crossing(&current) {
        let remaining = open_len(&current) - (j - i);
        let last_removed = if remaining >= 3 { j } else { i + 1 };
        current.drain(i + 1..=last_removed);
    }
    current
}

/// First pair of intersecting non-adjacent segments, by start index.
///
/// On a closed polygon the first and the closing segment share a point and
/// count as adjacent.
pub fn first_crossing(points: &[Vec2]) -> Option<(usize, usize)> {
    let segments = points.len().checked_sub(1)?;
    let closed = is_closed(points);
    for i in 0..segments {
        for j in i + 2..segments {
            if closed && i == 0 && j == segments - 1 {
                continue;
            }
            if segments_intersect(points[i], points[i + 1], points[j], points[j + 1]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Drops every control point closer than `min_distance` to the point kept
/// before it, including across the closing edge.
pub fn enforce_separation(points: &[Vec2], min_distance: f64) -> Vec<Vec2> {
    let closed = is_closed(points);
    let open = &points[..open_len(points)];

    let mut kept: Vec<Vec2> = Vec::with_capacity(open.len() + 1);
    for &p in open {
        match kept.last() {
            Some(&last) if distance(last, p) < min_distance => {}
            _ => kept.push(p),
        }
    }
    if closed {
        while kept.len() > 1 && distance(kept[kept.len() - 1], kept[0]) < min_distance {
            kept.pop();
        }
    }

    if kept.len() < 3 {
        return points.to_vec();
    }
    if closed {
        close_loop(&mut kept);
    }
    kept
}

// Removes rejected indices and re-closes the loop. When fewer than three
// distinct points would survive the input is returned as is.
fn retain_unless_degenerate(points: &[Vec2], rejected: &HashSet<usize>) -> Vec<Vec2> {
    if rejected.is_empty() {
        return points.to_vec();
    }

    let mut kept: Vec<Vec2> = points
        .iter()
        .enumerate()
        .filter(|(index, _)| !rejected.contains(index))
        .map(|(_, p)| *p)
        .collect();

    let distinct = if is_closed(&kept) {
        kept.len().saturating_sub(1)
    } else {
        kept.len()
    };
    if distinct < 3 {
        return points.to_vec();
    }

    close_loop(&mut kept);
    kept
}

fn is_closed(points: &[Vec2]) -> bool {
    points.len() > 1 && points.first() == points.last()
}

// Number of points without the repeated closing point.
fn open_len(points: &[Vec2]) -> usize {
    if is_closed(points) {
        points.len() - 1
    } else {
        points.len()
    }
}

fn close_loop(points: &mut Vec<Vec2>) {
    if let Some(&first) = points.first() {
        if points.last() != Some(&first) || points.len() == 1 {
            points.push(first);
        }
    }
}

// Both unit vectors point the same way (collinear with the centroid).
fn same_direction(u: Vec2, v: Vec2) -> bool {
    (u.x * v.y - u.y * v.x).abs() < 1e-9 && u.dot(v) > 0.0
}
