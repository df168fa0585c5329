// Windowed nearest-point search along the track.

use crate::domain::geometry::{Vec2, distance};
use crate::domain::track::Track;

/// Index of the track point closest to `position` within `window` indices on
/// either side of `last_index`, treating the track as circular.
///
/// The window is clamped to half the track length. A nearer point outside the
/// window is never found, so a car that jumps far along the track keeps its
/// old neighbourhood until it drives back into range. The result always
/// indexes the track (0 for an empty track).
pub fn compute_closest(track: &Track, position: Vec2, last_index: usize, window: usize) -> usize {
    let points = track.points();
    let len = points.len();
    if len == 0 {
        return 0;
    }

    let last = len - 1;
    let current = last_index.min(last);
    let half = window.min(last / 2);

    let mut closest = current;
    let mut smallest = f64::MAX;
    for (start, end) in search_ranges(current, half, last) {
        for (index, point) in points.iter().enumerate().take(end + 1).skip(start) {
            let d = distance(position, *point);
            if d < smallest {
                smallest = d;
                closest = index;
            }
        }
    }
    closest
}

// Inclusive index ranges covering `current - half ..= current + half`, split in
// two when the window wraps past either end of the loop.
fn search_ranges(current: usize, half: usize, last: usize) -> Vec<(usize, usize)> {
    if current < half {
        vec![(0, current + half), (last + current - half, last)]
    } else if current + half > last {
        vec![(0, current + half - last), (current - half, last)]
    } else {
        vec![(current - half, current + half)]
    }
}
