use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use lazy_static::lazy_static;

use car_racing::drawer::ImageDrawer;
use car_racing::environment::{CarRacingEnvironment, RaceConfig};
use ql::learn::dqn_agent::{AgentParameter, DqnAgent, ModelOrigin};
use ql::learn::trainer::{Trainer, TrainerParameter};
use ql::ml_model::feed_forward::{FeedForwardModel, FeedForwardParameter};
use ql::util::log::init_logging;

const EPISODES: usize = 1_000;
const BATCH_SIZE: usize = 32;
const STATE_SIZE: usize = 8;
const ACTION_SIZE: usize = 4;
const TARGET_SYNC_PERIOD: usize = 10;
const MAX_STEPS_PER_EPISODE: usize = 10_000;
const RENDER_FRAMES: bool = false;
/// continue from the newest checkpoint in [CHECKPOINT_DIR], if there is one
const RESUME: bool = true;

lazy_static!(
    static ref CHECKPOINT_DIR: PathBuf = PathBuf::from("models");
);

fn main() -> Result<()> {
    init_logging();

    let mut environment = CarRacingEnvironment::new(RaceConfig::default())?;
    if RENDER_FRAMES {
        environment = environment.with_drawer(Box::<ImageDrawer>::default());
    }

    let model_param = FeedForwardParameter {
        layer_sizes: vec![STATE_SIZE, 24, 24, ACTION_SIZE],
        ..Default::default()
    };
    let agent = DqnAgent::new(
        AgentParameter::default(),
        FeedForwardModel::new(&model_param)?,
        FeedForwardModel::new(&model_param)?,
    )?;

    let mut trainer = Trainer::new(
        Arc::new(RwLock::new(environment)),
        agent,
        TrainerParameter {
            episodes: EPISODES,
            batch_size: BATCH_SIZE,
            target_sync_period: TARGET_SYNC_PERIOD,
            max_steps_per_episode: MAX_STEPS_PER_EPISODE,
            render: RENDER_FRAMES,
            checkpoint_dir: CHECKPOINT_DIR.clone(),
            checkpoint_prefix: "car_racing_dqn".to_string(),
            ..Default::default()
        },
    );

    if RESUME {
        trainer.resume_from_latest_checkpoint();
    }
    match trainer.agent().origin() {
        ModelOrigin::Fresh => log::info!("training with freshly initialized model"),
        ModelOrigin::Checkpoint(file) => {
            log::info!("continuing training from {} after episode {}", file.display(), trainer.episode_count())
        }
    }

    let reports = trainer.run()?;
    if let Some(last) = reports.last() {
        log::info!(
            "training finished after episode {} - running reward: {:.2}, e: {:.2}",
            last.episode,
            last.running_reward,
            last.epsilon
        );
    }
    Ok(())
}
