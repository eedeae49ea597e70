use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use anyhow::Result;
use glob::{glob, Pattern};
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::learn::dqn_agent::DqnAgent;
use crate::learn::replay_buffer::ReplayBuffer;
use crate::ml_model::model::QValueModel;
use crate::prelude::{Action, DebugVisualizer, Environment, QlError, ToFeatureVector};
use crate::util::format::grouped;
use crate::util::immutable::Immutable;

pub struct TrainerParameter {
    /// Number of episodes per [Trainer::run]
    pub episodes: usize,
    /// Size of the batch sampled from the replay buffer for each training step
    pub batch_size: usize,
    /// Sync the target model and write a checkpoint after every n-th episode
    pub target_sync_period: usize,
    /// An episode which did not end by itself is truncated after that many steps
    pub max_steps_per_episode: usize,
    /// Render the environment after each step
    pub render: bool,
    pub checkpoint_dir: PathBuf,
    pub checkpoint_prefix: String,
    pub checkpoint_extension: String,
    /// Number of recent episodes considered for the running reward
    pub episode_reward_history_buffer_len: usize,
    /// Log the training loss every n-th step
    pub stats_after_steps: usize,
}

impl Default for TrainerParameter {
    fn default() -> Self {
        Self {
            episodes: 1_000,
            batch_size: 32,
            target_sync_period: 10,
            max_steps_per_episode: 10_000,
            render: false,
            checkpoint_dir: PathBuf::from("models"),
            checkpoint_prefix: "dqn".to_string(),
            checkpoint_extension: "ckpt".to_string(),
            episode_reward_history_buffer_len: 100,
            stats_after_steps: 1_000,
        }
    }
}

/// Outcome of one finished episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub episode: usize,
    pub total_reward: f32,
    /// Exploration rate after the episode's decay
    pub epsilon: f64,
    pub steps: usize,
    /// Mean total reward of the recent episodes
    pub running_reward: f32,
    /// Episode hit the step cap instead of ending by itself
    pub truncated: bool,
}

/// Drives episodes on an environment and lets the agent learn from them:
/// reset -> act -> step -> remember -> replay, until the episode is done.
/// After every `target_sync_period` episodes the target model gets synced and a checkpoint written.
///
/// The environment is shared behind a lock, so a presentation layer may read it concurrently.
pub struct Trainer<E, M>
where
    E: Environment,
    M: QValueModel,
{
    environment: Arc<RwLock<E>>,
    agent: DqnAgent<M>,
    param: Immutable<TrainerParameter>,
    episode_rewards: ReplayBuffer<f32>,
    action_counts: FxHashMap<E::A, usize>,
    step_count: usize,
    /// number of the last finished episode
    episode_count: usize,
}

impl<E, M> Trainer<E, M>
where
    E: Environment,
    M: QValueModel,
{
    pub fn new(
        environment: Arc<RwLock<E>>,
        agent: DqnAgent<M>,
        param: TrainerParameter,
    ) -> Self {
        Self {
            environment,
            agent,
            episode_rewards: ReplayBuffer::new(param.episode_reward_history_buffer_len.max(1)),
            param: Immutable::new(param),
            action_counts: FxHashMap::default(),
            step_count: 0,
            episode_count: 0,
        }
    }

    pub fn agent(&self) -> &DqnAgent<M> { &self.agent }

    pub fn environment(&self) -> Arc<RwLock<E>> { Arc::clone(&self.environment) }

    pub fn episode_count(&self) -> usize { self.episode_count }

    pub fn checkpoint_file(
        &self,
        episode: usize,
    ) -> PathBuf {
        self.param.checkpoint_dir.join(format!(
            "{}_{}.{}",
            self.param.checkpoint_prefix, episode, self.param.checkpoint_extension
        ))
    }

    /// Loads the newest checkpoint from the checkpoint directory and continues the episode numbering after it.
    ///
    /// Returns the episode number of the loaded checkpoint. A checkpoint which fails to load is reported as
    /// warning and training continues with the current (fresh) parameters.
    pub fn resume_from_latest_checkpoint(&mut self) -> Option<usize> {
        let (episode, file) = latest_checkpoint(
            &self.param.checkpoint_dir,
            &self.param.checkpoint_prefix,
            &self.param.checkpoint_extension,
        )?;
        match self.agent.load(&file) {
            Ok(()) => {
                self.episode_count = episode;
                Some(episode)
            }
            Err(e) => {
                log::warn!("{:#} - continuing with freshly initialized model parameters", e);
                None
            }
        }
    }

    /// Runs `episodes` episodes (or less, when the environment asks to quit)
    pub fn run(&mut self) -> Result<Vec<EpisodeReport>> {
        let mut reports = Vec::with_capacity(self.param.episodes);
        for _ in 0..self.param.episodes {
            reports.push(self.learn_episode()?);
            if self.environment.read().map_err(|_| QlError::LockPoisoned)?.quit_requested() {
                log::info!("quit requested - stopping training after episode {}", self.episode_count);
                break;
            }
        }
        write_lock(&self.environment)?.close();
        Ok(reports)
    }

    pub fn learn_episode(&mut self) -> Result<EpisodeReport> {
        let episode = self.episode_count + 1;
        let mut state = write_lock(&self.environment)?.reset().clone();
        log::trace!("started learning episode {}", episode);

        let mut episode_reward: f32 = 0.0;
        let mut steps: usize = 0;
        let mut done = false;

        while !done && steps < self.param.max_steps_per_episode {
            steps += 1;
            self.step_count += 1;

            let features = state.to_feature_vector();
            let action_value = self.agent.act(&features)?;
            let action = E::A::try_from_numeric(action_value)?;

            log::trace!("{}", state.one_line_info());
            let (state_next, reward, step_done) = {
                let mut env = write_lock(&self.environment)?;
                let (state_next, reward, step_done) = env.step(action)?;
                let state_next = state_next.clone();
                if self.param.render {
                    env.render();
                }
                (state_next, reward, step_done)
            };
            log::trace!("step with action {} resulted in reward: {:.2}, done: {}", action, reward, step_done);

            episode_reward += reward;
            *self.action_counts.entry(action).or_insert(0) += 1;

            // Save actions and states in replay buffer
            self.agent.remember(features, action_value, reward, state_next.to_feature_vector(), step_done);
            state = state_next;
            done = step_done;

            if let Some(loss) = self.agent.replay(self.param.batch_size)? {
                if self.param.stats_after_steps > 0 && self.step_count % self.param.stats_after_steps == 0 {
                    log::debug!("step: {}, episode: {}, training loss: {:.5}", grouped(self.step_count), episode, loss);
                }
            }
        }

        self.agent.decay_epsilon();
        self.episode_rewards.add(episode_reward);
        self.episode_count = episode;

        if self.param.target_sync_period > 0 && episode % self.param.target_sync_period == 0 {
            self.agent.update_target_model()?;
            self.agent.save(&self.checkpoint_file(episode))?;
            self.learning_update_log();
        }

        let report = EpisodeReport {
            episode,
            total_reward: episode_reward,
            epsilon: self.agent.epsilon(),
            steps,
            running_reward: self.episode_rewards.avg(),
            truncated: !done,
        };
        log::info!(
            "episode: {}, score: {:.2}, e: {:.2}, steps: {}{}",
            grouped(report.episode),
            report.total_reward,
            report.epsilon,
            grouped(report.steps),
            if report.truncated { " (truncated)" } else { "" }
        );
        Ok(report)
    }

    fn learning_update_log(&mut self) {
        let total_actions: usize = self.action_counts.values().sum();
        let action_distribution_line = self
            .action_counts
            .iter()
            .sorted_by_key(|(action, _)| action.numeric())
            .map(|(action, &count)| {
                let ratio = 100.0 * count as f32 / total_actions as f32;
                format!("{} {:.1}%", action, ratio)
            })
            .join(", ");

        log::info!(
            "\n\
    episode: {}, steps: {}, 𝜀={:.2}, rewards (last {}): {{mean: {:.2}, low: {:.2}, high: {:.2}}}\n\
    action_distribution (of last {}): {}",
            grouped(self.episode_count),
            grouped(self.step_count),
            self.agent.epsilon(),
            self.episode_rewards.len(),
            self.episode_rewards.avg(),
            self.episode_rewards.min(),
            self.episode_rewards.max(),
            grouped(total_actions),
            action_distribution_line
        );
        self.action_counts.clear();
    }
}

fn write_lock<E>(environment: &RwLock<E>) -> Result<RwLockWriteGuard<'_, E>> {
    environment.write().map_err(|_| anyhow::Error::from(QlError::LockPoisoned))
}

/// Finds the checkpoint `<dir>/<prefix>_<episode>.<extension>` with the highest episode number
pub fn latest_checkpoint(
    dir: &Path,
    prefix: &str,
    extension: &str,
) -> Option<(usize, PathBuf)> {
    let pattern = format!("{}/{}_*.{}", Pattern::escape(dir.to_str()?), Pattern::escape(prefix), Pattern::escape(extension));
    glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            let episode = path.file_stem()?.to_str()?.strip_prefix(prefix)?.strip_prefix('_')?.parse::<usize>().ok()?;
            Some((episode, path))
        })
        .max_by_key(|(episode, _)| *episode)
}
