use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::environment::RacingError;
use crate::track::Track;
use crate::vehicle::Vehicle;

pub type Frame = RgbImage;

const MAX_FRAME_EDGE_LEN: u32 = 8192;

/// Everything needed to draw one frame
#[derive(Clone, Copy, Debug)]
pub struct RaceScene {
    pub screen_width: f32,
    pub screen_height: f32,
    pub track: Track,
    pub player: Vehicle,
    pub opponent: Vehicle,
}

pub trait RaceDrawer: Send + Sync {
    /// Fails with [RacingError::RenderFailure] when the backend cannot produce a frame
    fn draw(
        &self,
        scene: &RaceScene,
    ) -> Result<Frame>;
}

/// Software renderer: grass background, grey track ring, cars as rotated rectangles
pub struct ImageDrawer {
    pub grass_color: Rgb<u8>,
    pub track_color: Rgb<u8>,
    pub player_color: Rgb<u8>,
    pub opponent_color: Rgb<u8>,
    pub car_length: f32,
    pub car_width: f32,
}

impl Default for ImageDrawer {
    fn default() -> Self {
        Self {
            grass_color: Rgb([0, 100, 0]),
            track_color: Rgb([100, 100, 100]),
            player_color: Rgb([255, 0, 0]),
            opponent_color: Rgb([0, 0, 255]),
            car_length: 40.0,
            car_width: 20.0,
        }
    }
}

impl ImageDrawer {
    fn draw_car(
        &self,
        frame: &mut Frame,
        car: &Vehicle,
        color: Rgb<u8>,
    ) {
        let (half_len, half_width) = (self.car_length / 2.0, self.car_width / 2.0);
        let reach = half_len.hypot(half_width);
        let (sin, cos) = car.angle.to_radians().sin_cos();

        let x_min = (car.pos.x - reach).floor().max(0.0) as u32;
        let y_min = (car.pos.y - reach).floor().max(0.0) as u32;
        let x_max = ((car.pos.x + reach).ceil().max(0.0) as u32).min(frame.width().saturating_sub(1));
        let y_max = ((car.pos.y + reach).ceil().max(0.0) as u32).min(frame.height().saturating_sub(1));

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f32 + 0.5 - car.pos.x;
                let dy = y as f32 + 0.5 - car.pos.y;
                // into the car's frame of reference
                let along = dx * cos + dy * sin;
                let across = -dx * sin + dy * cos;
                if along.abs() <= half_len && across.abs() <= half_width {
                    frame.put_pixel(x, y, color);
                }
            }
        }
    }
}

impl RaceDrawer for ImageDrawer {
    fn draw(
        &self,
        scene: &RaceScene,
    ) -> Result<Frame> {
        let (width, height) = (scene.screen_width.round(), scene.screen_height.round());
        if !(width >= 1.0 && height >= 1.0 && width <= MAX_FRAME_EDGE_LEN as f32 && height <= MAX_FRAME_EDGE_LEN as f32) {
            return Err(RacingError::RenderFailure(format!("unsupported frame size {}x{}", scene.screen_width, scene.screen_height)).into());
        }

        let mut frame = RgbImage::from_pixel(width as u32, height as u32, self.grass_color);
        for (x, y, pixel) in frame.enumerate_pixels_mut() {
            if scene.track.is_on_track(x as f32 + 0.5, y as f32 + 0.5) {
                *pixel = self.track_color;
            }
        }
        self.draw_car(&mut frame, &scene.player, self.player_color);
        self.draw_car(&mut frame, &scene.opponent, self.opponent_color);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use crate::algebra_2d::Pos2;

    use super::*;

    fn scene(player: Vehicle) -> RaceScene {
        RaceScene {
            screen_width: 800.0,
            screen_height: 600.0,
            track: Track::new(Pos2::new(400.0, 300.0), 200.0, 200.0).unwrap(),
            player,
            opponent: Vehicle::new(Pos2::new(400.0, 100.0)),
        }
    }

    #[test]
    fn test_draw_scene() -> Result<()> {
        let drawer = ImageDrawer::default();
        let frame = drawer.draw(&scene(Vehicle::new(Pos2::new(600.0, 300.0))))?;
        assert_eq!(frame.dimensions(), (800, 600));
        assert_eq!(frame.get_pixel(400, 300), &drawer.grass_color);
        assert_eq!(frame.get_pixel(5, 5), &drawer.grass_color);
        assert_eq!(frame.get_pixel(250, 300), &drawer.track_color);
        assert_eq!(frame.get_pixel(600, 300), &drawer.player_color);
        // heading 0°: car is 40 long in x, 20 wide in y
        assert_eq!(frame.get_pixel(615, 300), &drawer.player_color);
        assert_eq!(frame.get_pixel(600, 315), &drawer.track_color);
        assert_eq!(frame.get_pixel(400, 100), &drawer.opponent_color);
        Ok(())
    }

    #[test]
    fn test_draw_rotated_car() -> Result<()> {
        let drawer = ImageDrawer::default();
        let mut player = Vehicle::new(Pos2::new(600.0, 300.0));
        player.angle = 90.0;
        let frame = drawer.draw(&scene(player))?;
        assert_eq!(frame.get_pixel(600, 315), &drawer.player_color);
        assert_eq!(frame.get_pixel(615, 300), &drawer.track_color);
        Ok(())
    }

    #[test]
    fn test_invalid_frame_size() {
        let mut scene = scene(Vehicle::new(Pos2::new(600.0, 300.0)));
        scene.screen_width = 0.0;
        let err = ImageDrawer::default().draw(&scene).unwrap_err();
        assert!(matches!(err.downcast_ref::<RacingError>(), Some(RacingError::RenderFailure(_))));
    }
}
