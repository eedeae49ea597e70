use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::learn::replay_buffer::{Experience, ReplayBuffer};
use crate::ml_model::checkpoint::{read_checkpoint, write_checkpoint};
use crate::ml_model::model::{argmax, max_value, ModelParameters, QValueModel, TrainingSample};
use crate::prelude::{ModelActionType, QlError};
use crate::util::immutable::Immutable;

pub struct AgentParameter {
    /// Discount rate; (0 <= 𝛾 <= 1) represents the value of future rewards. The bigger, the more farsighted the agent becomes
    pub gamma: f32,
    /// Initial epsilon greedy parameter
    pub epsilon_max: f64,
    /// Minimum epsilon greedy parameter
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay, applied once per finished episode
    pub epsilon_decay: f64,
    /// Maximum replay length
    pub history_buffer_len: usize,
    /// Fixed seed for exploration and sampling; random when `None`
    pub seed: Option<u64>,
}

impl Default for AgentParameter {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            epsilon_max: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            history_buffer_len: 2_000,
            seed: None,
        }
    }
}

/// Where the current model parameters come from.
///
/// An agent still on [ModelOrigin::Fresh] parameters behaves like an untrained, near-random policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOrigin {
    Fresh,
    Checkpoint(PathBuf),
}

/// Deep-Q-Learning agent: epsilon-greedy policy on top of an online model,
/// learning from an experience replay buffer with targets computed by a periodically synced target model.
pub struct DqnAgent<M: QValueModel> {
    param: Immutable<AgentParameter>,
    rng: StdRng,
    model: M,
    // "target model"
    stabilized_model: M,
    replay_buffer: ReplayBuffer<Experience>,
    /// Epsilon greedy parameter
    epsilon: f64,
    origin: ModelOrigin,
}

impl<M: QValueModel> DqnAgent<M> {
    /// `model` and `stabilized_model` must share the same architecture; the stabilized model starts as a copy of `model`.
    pub fn new(
        param: AgentParameter,
        model: M,
        mut stabilized_model: M,
    ) -> Result<Self> {
        stabilized_model.set_parameters(&model.parameters())?;
        let rng = match param.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            replay_buffer: ReplayBuffer::new(param.history_buffer_len),
            epsilon: param.epsilon_max,
            param: Immutable::new(param),
            rng,
            model,
            stabilized_model,
            origin: ModelOrigin::Fresh,
        })
    }

    /// Epsilon-greedy action selection
    pub fn act(
        &mut self,
        state: &[f32],
    ) -> Result<ModelActionType> {
        if self.epsilon > self.rng.gen_range(0_f64..1_f64) {
            // Take random action
            Ok(self.rng.gen_range(0..self.model.action_space()))
        } else {
            // Predict best action Q-values from environment state
            self.greedy_action(state)
        }
    }

    pub fn greedy_action(
        &self,
        state: &[f32],
    ) -> Result<ModelActionType> {
        let q_values = self.q_values(state)?;
        Ok(argmax(&q_values) as ModelActionType)
    }

    pub fn q_values(
        &self,
        state: &[f32],
    ) -> Result<Vec<f32>> {
        let q_values = self.model.predict(state)?;
        check_q_values_len(&q_values, self.model.action_space())?;
        Ok(q_values)
    }

    pub fn target_q_values(
        &self,
        state: &[f32],
    ) -> Result<Vec<f32>> {
        let q_values = self.stabilized_model.predict(state)?;
        check_q_values_len(&q_values, self.stabilized_model.action_space())?;
        Ok(q_values)
    }

    pub fn remember(
        &mut self,
        state: Vec<f32>,
        action: ModelActionType,
        reward: f32,
        state_next: Vec<f32>,
        done: bool,
    ) {
        self.replay_buffer.add(Experience {
            state,
            action,
            reward,
            state_next,
            done,
        });
    }

    /// One training step on a uniformly sampled batch of remembered experiences.
    ///
    /// Returns `None` (no training) while the replay buffer holds less than `batch_size` entries,
    /// otherwise the training loss.
    pub fn replay(
        &mut self,
        batch_size: usize,
    ) -> Result<Option<f32>> {
        if batch_size == 0 || self.replay_buffer.len() < batch_size {
            return Ok(None);
        }

        let indices = generate_distinct_random_ids(&mut self.rng, 0..self.replay_buffer.len(), batch_size);
        let replay_samples = self.replay_buffer.get_many(&indices);

        // Build the updated Q-values for the sampled future states
        // Use the target model for stability
        let mut batch = Vec::with_capacity(batch_size);
        for experience in replay_samples {
            // for terminal steps, the updated q-value shall be exactly the reward
            let target_q_value = if experience.done {
                experience.reward
            } else {
                let future_rewards = self.stabilized_model.predict(&experience.state_next)?;
                check_q_values_len(&future_rewards, self.stabilized_model.action_space())?;
                experience.reward + self.param.gamma * max_value(&future_rewards)
            };
            batch.push(TrainingSample {
                state: &experience.state,
                action: experience.action,
                target_q_value,
            });
        }

        let loss = self.model.train_batch(&batch)?;
        log::trace!("trained batch of {}, loss: {:.5}", batch_size, loss);
        Ok(Some(loss))
    }

    /// Copies all online model parameters into the target model
    pub fn update_target_model(&mut self) -> Result<()> { self.stabilized_model.set_parameters(&self.model.parameters()) }

    pub fn decay_epsilon(&mut self) { self.epsilon = f64::max(self.epsilon * self.param.epsilon_decay, self.param.epsilon_min); }

    pub fn epsilon(&self) -> f64 { self.epsilon }

    pub fn set_epsilon(
        &mut self,
        epsilon: f64,
    ) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn origin(&self) -> &ModelOrigin { &self.origin }

    pub fn model(&self) -> &M { &self.model }

    pub fn replay_buffer(&self) -> &ReplayBuffer<Experience> { &self.replay_buffer }

    pub fn replay_buffer_len(&self) -> usize { self.replay_buffer.len() }

    /// Writes online and target parameters into one checkpoint file
    pub fn save(
        &self,
        file: &Path,
    ) -> Result<()> {
        write_checkpoint(file, &[&self.model.parameters(), &self.stabilized_model.parameters()])?;
        log::debug!("checkpoint written: {}", file.display());
        Ok(())
    }

    /// Restores online and target parameters from `file`.
    ///
    /// Fails with [QlError::Load] when the file is missing, corrupt or was written by a model of another architecture.
    /// The current parameters stay untouched in that case.
    pub fn load(
        &mut self,
        file: &Path,
    ) -> Result<()> {
        let load_error = |reason: String| QlError::Load {
            path: file.to_path_buf(),
            reason,
        };

        let models = read_checkpoint(file).map_err(|e| load_error(format!("{:#}", e)))?;
        let (online, target) = match models.as_slice() {
            [online] => (online, online),
            [online, target] => (online, target),
            other => return Err(load_error(format!("expected 1 or 2 parameter sets, found {}", other.len())).into()),
        };

        let backup = (self.model.parameters(), self.stabilized_model.parameters());
        if let Err(e) = self.apply_parameters(online, target) {
            self.apply_parameters(&backup.0, &backup.1)?;
            return Err(load_error(e.to_string()).into());
        }

        self.origin = ModelOrigin::Checkpoint(file.to_path_buf());
        log::info!("model parameters loaded from {}", file.display());
        Ok(())
    }

    fn apply_parameters(
        &mut self,
        online: &ModelParameters,
        target: &ModelParameters,
    ) -> Result<()> {
        self.model.set_parameters(online)?;
        self.stabilized_model.set_parameters(target)
    }
}

fn check_q_values_len(
    q_values: &[f32],
    action_space: ModelActionType,
) -> Result<()> {
    if q_values.len() != action_space as usize {
        return Err(QlError::Numeric(format!("model returned {} values for {} actions", q_values.len(), action_space)).into());
    }
    Ok(())
}

fn generate_distinct_random_ids(
    rng: &mut StdRng,
    range: Range<usize>,
    count: usize,
) -> Vec<usize> {
    assert!(range.end - range.start >= count);
    let mut result = Vec::with_capacity(count);
    if count == 0 {
        return result;
    }

    let distribution = Uniform::from(range);
    while result.len() < count {
        let x = distribution.sample(rng);
        if !result.contains(&x) {
            result.push(x);
        }
    }
    result
}
