use crate::algebra_2d::{wrap_degrees, Pos2};
use crate::track::Track;

/// Kinematic constants, shared by player and opponent vehicle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleParameter {
    pub max_speed: f32,
    /// speed change per step at full acceleration input
    pub acceleration_rate: f32,
    /// heading change in degrees per step at full steering input
    pub turn_rate: f32,
    pub friction_factor: f32,
    /// speed factor applied when a move is rejected at the track edge
    pub collision_slowdown: f32,
}

impl Default for VehicleParameter {
    fn default() -> Self {
        Self {
            max_speed: 5.0,
            acceleration_rate: 0.1,
            turn_rate: 3.0,
            friction_factor: 0.98,
            collision_slowdown: 0.5,
        }
    }
}

/// Control pair; each component in [-1, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Control {
    pub acceleration: f32,
    pub steering: f32,
}

impl Control {
    pub const fn new(acceleration: f32, steering: f32) -> Self { Self { acceleration, steering } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// candidate position was off-track; position kept, speed reduced
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vehicle {
    pub pos: Pos2,
    /// heading in degrees [0, 360); 0° points to +x
    pub angle: f32,
    /// signed scalar speed in pixels per step
    pub speed: f32,
}

impl Vehicle {
    pub fn new(pos: Pos2) -> Self {
        Self {
            pos,
            angle: 0.0,
            speed: 0.0,
        }
    }

    /// One simulation step for a directly controlled vehicle
    pub fn time_step(
        &mut self,
        control: Control,
        track: &Track,
        screen: Pos2,
        param: &VehicleParameter,
    ) -> MoveOutcome {
        self.speed = (self.speed + control.acceleration * param.acceleration_rate).clamp(-param.max_speed, param.max_speed);
        self.angle = wrap_degrees(self.angle + control.steering * param.turn_rate);
        self.apply_friction(param);
        self.advance(track, screen, param)
    }

    pub(crate) fn apply_friction(
        &mut self,
        param: &VehicleParameter,
    ) {
        if self.speed.abs() > 0.0 {
            self.speed *= param.friction_factor;
        }
    }

    /// Moves along the current heading, unless the move would leave the track.
    /// The screen clamp is applied before the track check, so a committed position is always on track.
    pub(crate) fn advance(
        &mut self,
        track: &Track,
        screen: Pos2,
        param: &VehicleParameter,
    ) -> MoveOutcome {
        let candidate = self.pos.moved(self.angle, self.speed).clamped(screen.x, screen.y);
        if track.is_on_track(candidate.x, candidate.y) {
            self.pos = candidate;
            MoveOutcome::Moved
        } else {
            self.speed *= param.collision_slowdown;
            MoveOutcome::Blocked
        }
    }
}
