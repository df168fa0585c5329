// Gameplay tuning values (not runtime/server configuration).

use std::f64::consts::PI;

/// Car handling constants applied by the physics step.
#[derive(Debug, Clone, Copy)]
pub struct CarTuning {
    pub max_speed: f64,
    pub min_speed: f64,
    /// Units per second gained at full throttle.
    pub acceleration: f64,
    /// Radians per second at full steering.
    pub turning_rate: f64,
    pub deceleration_factor: f64,
    /// Below this absolute speed the car is snapped to a stop.
    pub stop_threshold: f64,
    /// Speeds strictly inside this range are safe on the grass.
    pub grass_min_speed: f64,
    pub grass_max_speed: f64,
    /// Distance from the closest track point past which a car is off-track.
    pub off_track_distance: f64,
    pub off_track_brake: f64,
}

impl Default for CarTuning {
    fn default() -> Self {
        Self {
            max_speed: 500.0,
            min_speed: -200.0,
            acceleration: 500.0,
            turning_rate: 2.0,
            deceleration_factor: 0.2,
            stop_threshold: 0.2,
            grass_min_speed: -50.0,
            grass_max_speed: 200.0,
            off_track_distance: 50.0,
            off_track_brake: 10.0,
        }
    }
}

/// Track generation and progress tracking constants.
#[derive(Debug, Clone, Copy)]
pub struct TrackTuning {
    /// Control points closer than this are pushed apart.
    pub min_separation: f64,
    pub push_apart_passes: usize,
    pub sharp_turn_angle: f64,
    /// Edges longer than this get a random bend inserted.
    pub difficulty_edge_length: f64,
    pub difficulty_max_offset: f64,
    /// Exponent applied to the uniform draw for the bend offset.
    pub difficulty_spice: f64,
    pub samples_per_segment: usize,
    /// Catmull-Rom knot parameter: 0 uniform, 0.5 centripetal, 1 chordal.
    pub spline_alpha: f64,
    /// Half-width of the progress search window, in track indices.
    pub search_window: usize,
    /// How far ahead of the start point the start heading is aimed.
    pub start_heading_lookahead: usize,
}

impl Default for TrackTuning {
    fn default() -> Self {
        Self {
            min_separation: 500.0,
            push_apart_passes: 3,
            sharp_turn_angle: PI / 7.0,
            difficulty_edge_length: 500.0,
            difficulty_max_offset: 600.0,
            difficulty_spice: 0.02,
            samples_per_segment: 100,
            spline_alpha: 1.0,
            search_window: 500_000,
            start_heading_lookahead: 100,
        }
    }
}
