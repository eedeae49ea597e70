use crate::algebra_2d::{angle_difference, wrap_degrees, Pos2};
use crate::track::Track;
use crate::vehicle::{MoveOutcome, Vehicle, VehicleParameter};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PursuitParameter {
    /// waypoint advance per step, in degrees of the ring
    pub lap_progress_step: f32,
    /// exponential smoothing factor for heading and speed
    pub smoothing: f32,
    pub base_target_speed: f32,
}

impl Default for PursuitParameter {
    fn default() -> Self {
        Self {
            lap_progress_step: 1.0,
            smoothing: 0.1,
            base_target_speed: 4.0,
        }
    }
}

/// Rule based driver for the opponent vehicle: chases a waypoint moving along the ring's center line.
/// Slows down in sharp turns.
#[derive(Clone, Debug, PartialEq)]
pub struct PursuitController {
    param: PursuitParameter,
    /// angle of the current waypoint on the ring
    lap_progress: f32,
}

impl PursuitController {
    pub fn new(param: PursuitParameter) -> Self {
        Self {
            param,
            lap_progress: 0.0,
        }
    }

    pub fn reset(&mut self) { self.lap_progress = 0.0; }

    pub fn lap_progress(&self) -> f32 { self.lap_progress }

    pub fn time_step(
        &mut self,
        vehicle: &mut Vehicle,
        track: &Track,
        screen: Pos2,
        vehicle_param: &VehicleParameter,
    ) -> MoveOutcome {
        // lap progress advances even when the vehicle gets blocked
        self.lap_progress = wrap_degrees(self.lap_progress + self.param.lap_progress_step);
        let waypoint = track.point_at(self.lap_progress);

        let diff = angle_difference(vehicle.pos.bearing_to(waypoint), vehicle.angle);
        vehicle.angle = wrap_degrees(vehicle.angle + diff * self.param.smoothing);

        let sharpness = (diff.abs() / 90.0).min(1.0);
        let target_speed = self.param.base_target_speed * (1.0 - sharpness * 0.5);
        vehicle.speed += (target_speed - vehicle.speed) * self.param.smoothing;
        vehicle.apply_friction(vehicle_param);

        vehicle.advance(track, screen, vehicle_param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Pos2 = Pos2::new(800.0, 600.0);

    fn track() -> Track { Track::new(Pos2::new(400.0, 300.0), 200.0, 200.0).unwrap() }

    #[test]
    fn test_straight_chase() {
        let mut controller = PursuitController::new(PursuitParameter::default());
        // waypoint at 1° lies straight ahead (+x) of a vehicle placed left of it on the same line
        let track = track();
        let waypoint = track.point_at(1.0);
        let mut vehicle = Vehicle::new(Pos2::new(waypoint.x - 50.0, waypoint.y));

        let outcome = controller.time_step(&mut vehicle, &track, SCREEN, &VehicleParameter::default());
        assert_eq!(outcome, MoveOutcome::Moved);
        assert_eq!(controller.lap_progress(), 1.0);
        assert!(vehicle.angle.abs() < 1e-3);
        // speed: 0 + (4 - 0) * 0.1 = 0.4, then friction
        assert!((vehicle.speed - 0.4 * 0.98).abs() < 1e-5);
    }

    #[test]
    fn test_sharp_turn_halves_target_speed() {
        let mut controller = PursuitController::new(PursuitParameter::default());
        let track = track();
        let waypoint = track.point_at(1.0);
        // waypoint behind on the left: diff = 135° => target speed 2.0
        let mut vehicle = Vehicle::new(Pos2::new(waypoint.x + 20.0, waypoint.y - 20.0));
        controller.time_step(&mut vehicle, &track, SCREEN, &VehicleParameter::default());
        assert!((vehicle.speed - 0.2 * 0.98).abs() < 1e-5);
        assert!((vehicle.angle - 13.5).abs() < 1e-3);
    }

    #[test]
    fn test_lap_progress_wraps_and_resets() {
        let mut controller = PursuitController::new(PursuitParameter::default());
        let track = track();
        let mut vehicle = Vehicle::new(track.point_at(0.0));
        for _ in 0..365 {
            controller.time_step(&mut vehicle, &track, SCREEN, &VehicleParameter::default());
            assert!(track.is_on_track(vehicle.pos.x, vehicle.pos.y));
        }
        assert!((controller.lap_progress() - 5.0).abs() < 1e-2);
        controller.reset();
        assert_eq!(controller.lap_progress(), 0.0);
    }
}
