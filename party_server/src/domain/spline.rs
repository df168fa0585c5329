// Chained Catmull-Rom interpolation used to smooth the track control polygon.

use crate::domain::geometry::{Vec2, distance};

/// Interpolates a smooth curve through `points`.
///
/// Every pair of consecutive control points becomes one segment of
/// `samples_per_segment` samples. Seam samples are shared, so the output holds
/// `segments * samples_per_segment - (segments - 1)` points and starts and ends
/// exactly on the first and last control points. Inputs with fewer than two
/// points are returned unchanged.
pub fn spline_chain(points: &[Vec2], samples_per_segment: usize, alpha: f64) -> Vec<Vec2> {
    if points.len() < 2 || samples_per_segment < 2 {
        return points.to_vec();
    }

    let first = points[0];
    let second = points[1];
    let before_last = points[points.len() - 2];
    let last = points[points.len() - 1];

    // Extrapolated guards so the real end points get a full segment each.
    let mut control = Vec::with_capacity(points.len() + 2);
    control.push(first - (second - first));
    control.extend_from_slice(points);
    control.push(last + (last - before_last));

    let segments = control.len() - 3;
    let mut curve = Vec::with_capacity(segments * samples_per_segment - (segments - 1));
    for i in 0..segments {
        let segment = catmull_rom(
            [control[i], control[i + 1], control[i + 2], control[i + 3]],
            samples_per_segment,
            alpha,
        );
        if i == 0 {
            curve.extend(segment);
        } else {
            curve.extend(segment.into_iter().skip(1));
        }
    }
    curve
}

/// One Catmull-Rom segment from `p[1]` to `p[2]`, both included verbatim.
fn catmull_rom(p: [Vec2; 4], samples: usize, alpha: f64) -> Vec<Vec2> {
    let t0 = 0.0;
    let t1 = next_knot(t0, p[0], p[1], alpha);
    let t2 = next_knot(t1, p[1], p[2], alpha);
    let t3 = next_knot(t2, p[2], p[3], alpha);

    let step = (t2 - t1) / (samples - 1) as f64;

    let mut out = Vec::with_capacity(samples);
    out.push(p[1]);
    for i in 1..samples - 1 {
        let t = t1 + i as f64 * step;

        let a1 = lerp(p[0], p[1], t0, t1, t);
        let a2 = lerp(p[1], p[2], t1, t2, t);
        let a3 = lerp(p[2], p[3], t2, t3, t);

        let b1 = lerp(a1, a2, t0, t2, t);
        let b2 = lerp(a2, a3, t1, t3, t);

        out.push(lerp(b1, b2, t1, t2, t));
    }
    out.push(p[2]);
    out
}

fn next_knot(ti: f64, pi: Vec2, pj: Vec2, alpha: f64) -> f64 {
    let interval = distance(pi, pj).powf(alpha);
    // Coincident control points would collapse the knot interval.
    if interval > 0.0 && interval.is_finite() {
        ti + interval
    } else {
        ti + 1.0
    }
}

// Blend of `a` and `b` at parameter `t` over the knot span [ta, tb].
fn lerp(a: Vec2, b: Vec2, ta: f64, tb: f64, t: f64) -> Vec2 {
    let span = tb - ta;
    a * ((tb - t) / span) + b * ((t - ta) / span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1000.0, 0.0),
            Vec2::new(1000.0, 1000.0),
            Vec2::new(0.0, 1000.0),
            Vec2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn chain_reproduces_end_points_and_expected_length() {
        let control = square();
        let curve = spline_chain(&control, 100, 1.0);

        let segments = control.len() - 1;
        assert_eq!(curve.len(), segments * 100 - (segments - 1));
        assert_eq!(curve.first(), control.first());
        assert_eq!(curve.last(), control.last());
    }

    #[test]
    fn every_control_point_is_sampled_exactly() {
        let control = square();
        let curve = spline_chain(&control, 10, 0.5);
        for (i, point) in control.iter().enumerate() {
            assert_eq!(curve[i * 9], *point);
        }
    }

    #[test]
    fn collinear_controls_stay_on_the_line() {
        let control = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(300.0, 0.0),
        ];
        for alpha in [0.0, 0.5, 1.0] {
            let curve = spline_chain(&control, 20, alpha);
            assert!(curve.iter().all(|p| p.y.abs() < 1e-9));
            assert!(curve.iter().all(|p| p.x >= -1e-9 && p.x <= 300.0 + 1e-9));
        }
    }

    #[test]
    fn coincident_controls_do_not_produce_nan() {
        let control = vec![Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.0)];
        let curve = spline_chain(&control, 10, 1.0);
        assert_eq!(curve.len(), 10);
        assert!(curve.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn single_point_passes_through() {
        let control = vec![Vec2::new(1.0, 2.0)];
        assert_eq!(spline_chain(&control, 100, 1.0), control);
    }
}
