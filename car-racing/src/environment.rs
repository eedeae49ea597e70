use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use ql::prelude::{Action, DebugVisualizer, Environment, ModelActionType, QlError, ToFeatureVector};
use ql::util::immutable::Immutable;

use crate::algebra_2d::Pos2;
use crate::drawer::{Frame, RaceDrawer, RaceScene};
use crate::pursuit::{PursuitController, PursuitParameter};
use crate::track::Track;
use crate::vehicle::{Control, Vehicle, VehicleParameter};

pub const OBSERVATION_LEN: usize = 8;

pub struct RaceConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    pub track_center: Pos2,
    pub track_radius: f32,
    pub track_width: f32,
    pub player_start: Pos2,
    pub opponent_start: Pos2,
    /// base reward per step while the player stays on the track
    pub on_track_reward: f32,
    /// on-track bonus per unit of absolute player speed
    pub speed_reward_factor: f32,
    pub off_track_reward: f32,
    pub vehicle: VehicleParameter,
    pub pursuit: PursuitParameter,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            screen_width: 800.0,
            screen_height: 600.0,
            track_center: Pos2::new(400.0, 300.0),
            track_radius: 200.0,
            track_width: 200.0,
            // track center + (radius, 0)
            player_start: Pos2::new(600.0, 300.0),
            // track center - (0, radius)
            opponent_start: Pos2::new(400.0, 100.0),
            on_track_reward: 0.1,
            speed_reward_factor: 0.01,
            off_track_reward: -0.1,
            vehicle: VehicleParameter::default(),
            pursuit: PursuitParameter::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentPhase {
    /// constructed, never reset
    Ready,
    Running,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RacingError {
    InvalidTrack(String),
    NotRunning(EnvironmentPhase),
    RenderFailure(String),
}

impl Display for RacingError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            RacingError::InvalidTrack(msg) => write!(f, "invalid track: {}", msg),
            RacingError::NotRunning(phase) => write!(f, "environment not running (phase: {:?})", phase),
            RacingError::RenderFailure(msg) => write!(f, "render failure: {}", msg),
        }
    }
}

impl std::error::Error for RacingError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RacingAction {
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
}

impl RacingAction {
    pub const ALL: [RacingAction; 4] = [RacingAction::Accelerate, RacingAction::Brake, RacingAction::SteerLeft, RacingAction::SteerRight];

    pub fn control(&self) -> Control {
        match self {
            RacingAction::Accelerate => Control::new(1.0, 0.0),
            RacingAction::Brake => Control::new(-1.0, 0.0),
            RacingAction::SteerLeft => Control::new(0.0, -1.0),
            RacingAction::SteerRight => Control::new(0.0, 1.0),
        }
    }
}

impl Display for RacingAction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            RacingAction::Accelerate => f.write_str("↑"),
            RacingAction::Brake => f.write_str("↓"),
            RacingAction::SteerLeft => f.write_str("↶"),
            RacingAction::SteerRight => f.write_str("↷"),
        }
    }
}

impl Action for RacingAction {
    const ACTION_SPACE: ModelActionType = 4;

    fn numeric(&self) -> ModelActionType {
        match self {
            RacingAction::Accelerate => 0,
            RacingAction::Brake => 1,
            RacingAction::SteerLeft => 2,
            RacingAction::SteerRight => 3,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        match value {
            0 => Ok(RacingAction::Accelerate),
            1 => Ok(RacingAction::Brake),
            2 => Ok(RacingAction::SteerLeft),
            3 => Ok(RacingAction::SteerRight),
            _ => Err(QlError::InvalidAction(value).into()),
        }
    }
}

/// Normalized vehicle states: player (x, y, speed, angle), then opponent (x, y, speed, angle)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation(pub [f32; OBSERVATION_LEN]);

impl Observation {
    fn new(
        player: &Vehicle,
        opponent: &Vehicle,
        config: &RaceConfig,
    ) -> Self {
        let normalized = |v: &Vehicle| {
            [
                v.pos.x / config.screen_width,
                v.pos.y / config.screen_height,
                v.speed / config.vehicle.max_speed,
                v.angle / 360.0,
            ]
        };
        let (p, o) = (normalized(player), normalized(opponent));
        Observation([p[0], p[1], p[2], p[3], o[0], o[1], o[2], o[3]])
    }
}

impl ToFeatureVector for Observation {
    fn feature_len(&self) -> usize { OBSERVATION_LEN }

    fn to_feature_vector(&self) -> Vec<f32> { self.0.to_vec() }
}

impl DebugVisualizer for Observation {
    fn one_line_info(&self) -> String {
        let o = &self.0;
        format!(
            "player: pos({:.3}, {:.3}) speed {:.3} angle {:.3} | opponent: pos({:.3}, {:.3}) speed {:.3} angle {:.3}",
            o[0], o[1], o[2], o[3], o[4], o[5], o[6], o[7]
        )
    }
}

/// Handle for a host (window, signal handler, web layer) to end the running episode
#[derive(Clone, Debug, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    pub fn request(&self) { self.0.store(true, Ordering::Relaxed) }

    pub fn is_requested(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// Ring track race of a learning player vehicle against a rule driven opponent.
///
/// An episode ends in the step the player vehicle is found off the track, or when the host requests to quit.
/// Without a drawer the environment runs headless; `render` is then a no-op.
pub struct CarRacingEnvironment {
    config: Immutable<RaceConfig>,
    track: Track,
    player: Vehicle,
    opponent: Vehicle,
    pursuit: PursuitController,
    phase: EnvironmentPhase,
    observation: Observation,
    quit_signal: QuitSignal,
    drawer: Option<Box<dyn RaceDrawer>>,
    frame: Option<Frame>,
}

impl CarRacingEnvironment {
    pub fn new(config: RaceConfig) -> Result<Self> {
        let track = Track::new(config.track_center, config.track_radius, config.track_width)?;
        let player = Vehicle::new(config.player_start);
        let opponent = Vehicle::new(config.opponent_start);
        Ok(Self {
            track,
            observation: Observation::new(&player, &opponent, &config),
            player,
            opponent,
            pursuit: PursuitController::new(config.pursuit),
            phase: EnvironmentPhase::Ready,
            quit_signal: QuitSignal::default(),
            drawer: None,
            frame: None,
            config: Immutable::new(config),
        })
    }

    pub fn with_drawer(
        mut self,
        drawer: Box<dyn RaceDrawer>,
    ) -> Self {
        self.drawer = Some(drawer);
        self
    }

    pub fn phase(&self) -> EnvironmentPhase { self.phase }

    pub fn track(&self) -> &Track { &self.track }

    pub fn player(&self) -> &Vehicle { &self.player }

    pub fn opponent(&self) -> &Vehicle { &self.opponent }

    pub fn is_headless(&self) -> bool { self.drawer.is_none() }

    pub fn quit_signal(&self) -> QuitSignal { self.quit_signal.clone() }

    /// Last rendered frame
    pub fn get_frame(&self) -> Option<&Frame> { self.frame.as_ref() }

    /// Step with a raw model action index
    pub fn step_numeric(
        &mut self,
        action: ModelActionType,
    ) -> Result<(&Observation, f32, bool)> {
        let action = RacingAction::try_from_numeric(action)?;
        self.step(action)
    }

    fn scene(&self) -> RaceScene {
        RaceScene {
            screen_width: self.config.screen_width,
            screen_height: self.config.screen_height,
            track: self.track,
            player: self.player,
            opponent: self.opponent,
        }
    }

    fn screen(&self) -> Pos2 { Pos2::new(self.config.screen_width, self.config.screen_height) }
}

impl Environment for CarRacingEnvironment {
    type S = Observation;
    type A = RacingAction;

    fn reset(&mut self) -> &Self::S {
        self.player = Vehicle::new(self.config.player_start);
        self.opponent = Vehicle::new(self.config.opponent_start);
        self.pursuit.reset();
        self.observation = Observation::new(&self.player, &self.opponent, &self.config);
        self.phase = EnvironmentPhase::Running;
        &self.observation
    }

    fn state(&self) -> &Self::S { &self.observation }

    fn step(
        &mut self,
        action: Self::A,
    ) -> Result<(&Self::S, f32, bool)> {
        if self.phase != EnvironmentPhase::Running {
            return Err(RacingError::NotRunning(self.phase).into());
        }
        if self.quit_signal.is_requested() {
            log::debug!("quit requested - terminating episode");
            self.phase = EnvironmentPhase::Terminated;
            return Ok((&self.observation, 0.0, true));
        }

        let screen = self.screen();
        self.player.time_step(action.control(), &self.track, screen, &self.config.vehicle);
        self.pursuit.time_step(&mut self.opponent, &self.track, screen, &self.config.vehicle);
        self.observation = Observation::new(&self.player, &self.opponent, &self.config);

        let on_track = self.track.is_on_track(self.player.pos.x, self.player.pos.y);
        let reward = if on_track {
            self.config.on_track_reward + self.config.speed_reward_factor * self.player.speed.abs()
        } else {
            self.config.off_track_reward
        };
        let done = !on_track;
        if done {
            self.phase = EnvironmentPhase::Terminated;
        }
        Ok((&self.observation, reward, done))
    }

    fn render(&mut self) {
        if self.phase != EnvironmentPhase::Running {
            return;
        }
        let result = match &self.drawer {
            Some(drawer) => drawer.draw(&self.scene()),
            None => return,
        };
        match result {
            Ok(frame) => self.frame = Some(frame),
            Err(e) => {
                log::warn!("{:#} - continuing headless", e);
                self.drawer = None;
            }
        }
    }

    fn close(&mut self) {
        if self.drawer.take().is_some() {
            log::debug!("drawer released");
        }
        self.frame = None;
    }

    fn quit_requested(&self) -> bool { self.quit_signal.is_requested() }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn environment() -> CarRacingEnvironment { CarRacingEnvironment::new(RaceConfig::default()).unwrap() }

    #[test]
    fn test_reset() {
        let mut env = environment();
        assert_eq!(env.phase(), EnvironmentPhase::Ready);
        let observation = *env.reset();
        assert_eq!(env.phase(), EnvironmentPhase::Running);
        assert_eq!(observation.0, [0.75, 0.5, 0.0, 0.0, 0.5, 100.0 / 600.0, 0.0, 0.0]);
        assert_eq!(observation.feature_len(), 8);
        assert_eq!(observation.to_feature_vector().len(), 8);
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = environment();
        let err = env.step(RacingAction::Accelerate).unwrap_err();
        assert_eq!(err.downcast_ref::<RacingError>(), Some(&RacingError::NotRunning(EnvironmentPhase::Ready)));
    }

    #[test]
    fn test_accelerate_from_standstill() -> Result<()> {
        let mut env = environment();
        env.reset();
        let (observation, reward, done) = env.step(RacingAction::Accelerate)?;
        let observation = *observation;
        assert!(!done);
        assert!((env.player().speed - 0.098).abs() < 1e-6);
        assert!((observation.0[2] - 0.098 / 5.0).abs() < 1e-6);
        assert!((reward - (0.1 + 0.01 * 0.098)).abs() < 1e-6);
        Ok(())
    }

    #[rstest]
    #[case(0, RacingAction::Accelerate)]
    #[case(1, RacingAction::Brake)]
    #[case(2, RacingAction::SteerLeft)]
    #[case(3, RacingAction::SteerRight)]
    fn test_action_mapping(#[case] value: ModelActionType, #[case] action: RacingAction) {
        assert_eq!(RacingAction::try_from_numeric(value).unwrap(), action);
        assert_eq!(action.numeric(), value);
        let control = action.control();
        assert!((control.acceleration == 0.0) != (control.steering == 0.0));
    }

    #[rstest]
    #[case(4)]
    #[case(255)]
    fn test_invalid_action_index(#[case] value: ModelActionType) {
        let mut env = environment();
        env.reset();
        let err = env.step_numeric(value).unwrap_err();
        assert_eq!(err.downcast_ref::<QlError>(), Some(&QlError::InvalidAction(value)));
        assert_eq!(env.phase(), EnvironmentPhase::Running);
    }

    #[test]
    fn test_quit_signal_ends_episode() -> Result<()> {
        let mut env = environment();
        env.reset();
        let signal = env.quit_signal();
        env.step(RacingAction::Accelerate)?;
        let speed = env.player().speed;

        signal.request();
        assert!(env.quit_requested());
        let (_, reward, done) = env.step(RacingAction::Accelerate)?;
        assert_eq!((reward, done), (0.0, true));
        assert_eq!(env.player().speed, speed);
        assert_eq!(env.phase(), EnvironmentPhase::Terminated);
        Ok(())
    }

    #[test]
    fn test_observation_one_line_info() {
        let env = environment();
        assert!(env.state().one_line_info().starts_with("player: pos(0.750, 0.500)"));
    }
}
