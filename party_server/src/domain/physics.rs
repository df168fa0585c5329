// Per-tick car integration from the last stored input.

use crate::domain::geometry::{Vec2, distance};
use crate::domain::party::{PlayerInput, PlayerPosition};
use crate::domain::tuning::CarTuning;

/// Advances one car by `dt` seconds.
///
/// `closest` is the track point the car is currently nearest to; when it is
/// further away than the off-track distance and the car is outside the grass
/// speed band, a heavy brake is applied before the regular speed update.
pub fn step(
    car: &mut PlayerPosition,
    input: &PlayerInput,
    closest: Option<Vec2>,
    dt: f64,
    tuning: &CarTuning,
) {
    if let Some(point) = closest {
        let off_track = distance(car.position, point) > tuning.off_track_distance;
        let grass_safe =
            strictly_between(car.speed, tuning.grass_min_speed, tuning.grass_max_speed);
        if off_track && !grass_safe {
            car.speed = decelerate(car.speed, tuning.off_track_brake, tuning);
        }
    }

    if input.acceleration == 0.0 {
        car.speed = decelerate(car.speed, 1.0, tuning);
    } else {
        car.speed = (car.speed + input.acceleration * dt * tuning.acceleration)
            .clamp(tuning.min_speed, tuning.max_speed);
    }

    if car.speed != 0.0 {
        car.angle += input.turning * dt * tuning.turning_rate;
    }

    car.position = car.position + Vec2::from_angle(car.angle) * (car.speed * dt);
}

/// Moves `speed` towards zero by one drag step scaled by `multiplier`.
pub fn decelerate(speed: f64, multiplier: f64, tuning: &CarTuning) -> f64 {
    let magnitude = speed.abs();
    if magnitude < tuning.stop_threshold {
        return 0.0;
    }
    let drag = magnitude.sqrt();
    let step = magnitude / drag * tuning.deceleration_factor * multiplier;
    if speed > 0.0 {
        speed - step
    } else {
        speed + step
    }
}

/// Puts a car on the start grid, stopped and facing along the track.
pub fn snap_to_start(car: &mut PlayerPosition, start: Vec2, heading: f64) {
    car.position = start;
    car.angle = heading;
    car.speed = 0.0;
}

fn strictly_between(value: f64, low: f64, high: f64) -> bool {
    value > low && value < high
}
