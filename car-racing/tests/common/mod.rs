#![allow(dead_code)]

use anyhow::Result;

use car_racing::algebra_2d::Pos2;
use car_racing::drawer::{Frame, RaceDrawer, RaceScene};
use car_racing::environment::{CarRacingEnvironment, RaceConfig, RacingError};

#[ctor::ctor]
fn init() {
    let _ = env_logger::builder()
        .format_timestamp_secs()
        .filter_level(log::LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}

pub fn environment() -> CarRacingEnvironment { CarRacingEnvironment::new(RaceConfig::default()).unwrap() }

/// Player starting at the track center, which lies inside the inner edge of the ring
pub fn centered_player_environment() -> CarRacingEnvironment {
    CarRacingEnvironment::new(RaceConfig {
        player_start: Pos2::new(400.0, 300.0),
        ..Default::default()
    })
    .unwrap()
}

/// Headless backend
pub struct FailingDrawer;

impl RaceDrawer for FailingDrawer {
    fn draw(
        &self,
        _scene: &RaceScene,
    ) -> Result<Frame> {
        Err(RacingError::RenderFailure("no display available".to_string()).into())
    }
}
