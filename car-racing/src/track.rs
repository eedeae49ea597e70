use anyhow::Result;

use crate::algebra_2d::Pos2;
use crate::environment::RacingError;

/// Ring shaped track: all points whose distance to `center` lies within `radius ± width/2`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    center: Pos2,
    radius: f32,
    width: f32,
}

impl Track {
    pub fn new(
        center: Pos2,
        radius: f32,
        width: f32,
    ) -> Result<Self> {
        if !(width > 0.0 && radius > width / 2.0 && radius.is_finite() && center.x.is_finite() && center.y.is_finite()) {
            return Err(RacingError::InvalidTrack(format!("radius {} / width {}", radius, width)).into());
        }
        Ok(Self { center, radius, width })
    }

    pub fn center(&self) -> Pos2 { self.center }

    pub fn inner_radius(&self) -> f32 { self.radius - self.width / 2.0 }

    pub fn outer_radius(&self) -> f32 { self.radius + self.width / 2.0 }

    /// Boundaries count as on-track
    pub fn is_on_track(
        &self,
        x: f32,
        y: f32,
    ) -> bool {
        let distance = Pos2::new(x, y).distance(self.center);
        (self.inner_radius()..=self.outer_radius()).contains(&distance)
    }

    /// Point on the ring's center line at `angle_deg`
    pub fn point_at(
        &self,
        angle_deg: f32,
    ) -> Pos2 {
        self.center.moved(angle_deg, self.radius)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn track() -> Track { Track::new(Pos2::new(400.0, 300.0), 200.0, 200.0).unwrap() }

    #[rstest]
    #[case(500.0, 300.0)]
    #[case(700.0, 300.0)]
    #[case(400.0, 200.0)]
    #[case(400.0, 0.0)]
    #[case(300.0, 300.0)]
    #[case(100.0, 300.0)]
    fn test_boundaries_are_on_track(#[case] x: f32, #[case] y: f32) {
        assert!(track().is_on_track(x, y));
    }

    #[rstest]
    #[case(400.0, 300.0)]
    #[case(499.0, 300.0)]
    #[case(701.0, 300.0)]
    #[case(0.0, 0.0)]
    fn test_off_track(#[case] x: f32, #[case] y: f32) {
        assert!(!track().is_on_track(x, y));
    }

    #[rstest]
    #[case(200.0, 0.0)]
    #[case(200.0, -1.0)]
    #[case(100.0, 200.0)]
    #[case(100.0, 250.0)]
    #[case(f32::NAN, 10.0)]
    fn test_invalid_track(#[case] radius: f32, #[case] width: f32) {
        let err = Track::new(Pos2::new(0.0, 0.0), radius, width).unwrap_err();
        assert!(matches!(err.downcast_ref::<RacingError>(), Some(RacingError::InvalidTrack(_))));
    }

    #[test]
    fn test_point_at() {
        let t = track();
        assert_eq!(t.inner_radius(), 100.0);
        assert_eq!(t.outer_radius(), 300.0);
        for angle in [0.0, 45.0, 90.0, 271.0] {
            let p = t.point_at(angle);
            assert!((p.distance(t.center()) - 200.0).abs() < 1e-3);
        }
        let p = t.point_at(90.0);
        assert!((p.x - 400.0).abs() < 1e-3 && (p.y - 500.0).abs() < 1e-3);
    }
}
