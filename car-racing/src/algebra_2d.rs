use std::ops::Sub;

/// Screen coordinates: TOP / LEFT corner is 0/0, y grows downwards
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pos2 {
    pub x: f32,
    pub y: f32,
}

impl Pos2 {
    pub const fn new(x: f32, y: f32) -> Self { Self { x, y } }

    pub fn distance(self, other: Pos2) -> f32 { (self - other).length() }

    /// Direction from `self` towards `target` in degrees (0° = +x, 90° = +y)
    pub fn bearing_to(self, target: Pos2) -> f32 { (target.y - self.y).atan2(target.x - self.x).to_degrees() }

    /// Moves `distance` along `angle_deg`
    pub fn moved(self, angle_deg: f32, distance: f32) -> Pos2 {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Pos2::new(self.x + distance * cos, self.y + distance * sin)
    }

    pub fn clamped(self, max_x: f32, max_y: f32) -> Pos2 { Pos2::new(self.x.clamp(0.0, max_x), self.y.clamp(0.0, max_y)) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn length(self) -> f32 { self.x.hypot(self.y) }
}

impl Sub for Pos2 {
    type Output = Vec2;

    fn sub(self, rhs: Pos2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// wraps into [0, 360)
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid may round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed difference `target - current`, normalized into [-180, 180)
pub fn angle_difference(target: f32, current: f32) -> f32 { (target - current + 180.0).rem_euclid(360.0) - 180.0 }
