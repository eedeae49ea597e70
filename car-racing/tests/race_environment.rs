use std::sync::{Arc, RwLock};
use std::thread;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use car_racing::drawer::ImageDrawer;
use car_racing::environment::{EnvironmentPhase, RacingAction, RacingError};
use ql::prelude::{Action, Environment};

mod common;

#[test]
fn player_at_track_center_is_done_immediately() -> Result<()> {
    let mut env = common::centered_player_environment();
    env.reset();
    let center = env.track().center();
    assert!(!env.track().is_on_track(center.x, center.y));

    let (_, reward, done) = env.step(RacingAction::Accelerate)?;
    assert!(done);
    assert!((reward - -0.1).abs() < 1e-6);
    assert_eq!(env.phase(), EnvironmentPhase::Terminated);

    let err = env.step(RacingAction::Accelerate).unwrap_err();
    assert_eq!(err.downcast_ref::<RacingError>(), Some(&RacingError::NotRunning(EnvironmentPhase::Terminated)));

    // a new episode starts with reset
    env.reset();
    assert_eq!(env.phase(), EnvironmentPhase::Running);
    Ok(())
}

#[test]
fn reward_and_done_follow_player_track_position() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(17);
    let mut env = common::environment();
    for _ in 0..3 {
        env.reset();
        for _ in 0..2_000 {
            let action = RacingAction::try_from_numeric(rng.gen_range(0..RacingAction::ACTION_SPACE))?;
            let (_, reward, done) = env.step(action)?;
            let pos = env.player().pos;
            let on_track = env.track().is_on_track(pos.x, pos.y);
            assert_eq!(done, !on_track);
            if on_track {
                assert!(reward >= 0.1);
            } else {
                assert!(reward < 0.0);
            }
            assert!(env.player().speed.abs() <= 5.0);
            assert!((0.0..360.0).contains(&env.player().angle));
            if done {
                break;
            }
        }
    }
    Ok(())
}

#[test]
fn render_and_close_are_safe_in_every_phase() -> Result<()> {
    let mut env = common::environment().with_drawer(Box::<ImageDrawer>::default());

    env.render();
    assert!(env.get_frame().is_none());

    env.reset();
    env.render();
    assert_eq!(env.get_frame().map(|f| f.dimensions()), Some((800, 600)));

    env.quit_signal().request();
    env.step(RacingAction::SteerLeft)?;
    assert_eq!(env.phase(), EnvironmentPhase::Terminated);
    let last_frame = env.get_frame().cloned();
    env.render();
    assert_eq!(env.get_frame().cloned(), last_frame);

    env.close();
    assert!(env.get_frame().is_none());
    assert!(env.is_headless());
    env.close();
    env.reset();
    env.render();
    assert!(env.get_frame().is_none());
    Ok(())
}

#[test]
fn render_failure_switches_to_headless_mode() -> Result<()> {
    let mut env = common::environment().with_drawer(Box::new(common::FailingDrawer));
    env.reset();
    assert!(!env.is_headless());

    env.render();
    assert!(env.is_headless());
    assert!(env.get_frame().is_none());

    let (_, reward, done) = env.step(RacingAction::Accelerate)?;
    assert!(!done);
    assert!(reward > 0.0);
    env.render();
    assert!(env.get_frame().is_none());
    Ok(())
}

#[test]
fn frames_can_be_read_from_another_thread() -> Result<()> {
    let env = Arc::new(RwLock::new(common::environment().with_drawer(Box::<ImageDrawer>::default())));
    {
        let mut env = env.write().unwrap();
        env.reset();
        env.step(RacingAction::Accelerate)?;
        env.render();
    }

    let reader = Arc::clone(&env);
    let dimensions = thread::spawn(move || {
        let env = reader.read().unwrap();
        let dimensions = env.get_frame().map(|f| f.dimensions());
        dimensions
    })
    .join()
    .unwrap();
    assert_eq!(dimensions, Some((800, 600)));
    Ok(())
}
