// Plane geometry helpers shared by track generation, progress tracking and physics.

use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians, counter-clockwise from +X).
    pub fn from_angle(angle: f64) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the zero vector for zero-length or non-finite input.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if !len.is_finite() || len == 0.0 {
            return Vec2::ZERO;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
        }
    }

    /// Heading of the vector in radians, in (-PI, PI].
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

pub fn distance(a: Vec2, b: Vec2) -> f64 {
    (a - b).length()
}

/// Z component of the cross product of OA and OB.
///
/// Positive when O, A, B make a counter-clockwise turn, negative for a
/// clockwise turn and zero when the points are collinear.
pub fn cross(o: Vec2, a: Vec2, b: Vec2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Unit vector from `from` towards `to`.
pub fn direction(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalized()
}

/// Unsigned angle between two vectors, in [0, PI]. NaN when either is zero.
pub fn angle_between(v: Vec2, w: Vec2) -> f64 {
    let cos = v.dot(w) / (v.length() * w.length());
    cos.clamp(-1.0, 1.0).acos()
}

pub fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
    sum * (1.0 / points.len() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> Orientation {
    let value = (b.y - a.y) * (c.x - b.x) - (b.x - a.x) * (c.y - b.y);
    if value == 0.0 {
        Orientation::Collinear
    } else if value > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

// `p` is known to be collinear with segment `a`-`b`.
fn on_segment(p: Vec2, a: Vec2, b: Vec2) -> bool {
    p.x <= a.x.max(b.x) && p.x >= a.x.min(b.x) && p.y <= a.y.max(b.y) && p.y >= a.y.min(b.y)
}

/// True when segment AB intersects segment CD, touching endpoints included.
pub fn segments_intersect(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(c, a, b))
        || (o2 == Orientation::Collinear && on_segment(d, a, b))
        || (o3 == Orientation::Collinear && on_segment(a, c, d))
        || (o4 == Orientation::Collinear && on_segment(b, c, d))
}
