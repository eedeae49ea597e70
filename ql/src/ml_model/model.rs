use anyhow::Result;

use crate::prelude::{ModelActionType, QlError};

/// One row of a training batch: the model output for (`state`, `action`) shall move towards `target_q_value`
#[derive(Debug, Clone, Copy)]
pub struct TrainingSample<'a> {
    pub state: &'a [f32],
    pub action: ModelActionType,
    pub target_q_value: f32,
}

/// Complete, flattened parameter set of a model.
///
/// `architecture` lists the layer sizes (input first, action space last) and identifies
/// which models can exchange parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    pub architecture: Vec<usize>,
    pub values: Vec<f32>,
}

impl ModelParameters {
    pub fn ensure_architecture(
        &self,
        expected: &[usize],
    ) -> Result<()> {
        if self.architecture != expected {
            return Err(QlError::IncompatibleModel {
                expected: expected.to_vec(),
                found: self.architecture.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// Action-value function approximator.
///
/// Any numeric back end can sit behind that interface: a linear model, a small feed-forward network
/// or an external ML library.
pub trait QValueModel {
    /// Length of the state feature vector
    fn input_len(&self) -> usize;

    /// Number of actions = length of the predicted value vector
    fn action_space(&self) -> ModelActionType;

    /// Predicts one Q-value per action for `state`
    fn predict(
        &self,
        state: &[f32],
    ) -> Result<Vec<f32>>;

    /// Performs a single training step (one gradient step) using a batch of data.
    ///
    /// # Returns
    ///   mean squared error between the predicted Q-values of the taken actions and their targets
    fn train_batch(
        &mut self,
        batch: &[TrainingSample],
    ) -> Result<f32>;

    fn parameters(&self) -> ModelParameters;

    /// Fails with [QlError::IncompatibleModel] when `parameters` stems from a different architecture
    fn set_parameters(
        &mut self,
        parameters: &ModelParameters,
    ) -> Result<()>;
}

/// Index of the highest value; ties resolve to the first encountered index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

pub fn max_value(values: &[f32]) -> f32 { values.iter().copied().fold(f32::NEG_INFINITY, f32::max) }

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[0.2, 0.9, 0.1, 0.0], 1)]
    #[case(&[0.5, 0.5, 0.5, 0.5], 0)]
    #[case(&[-1.0, -3.0, 2.0, 2.0], 2)]
    #[case(&[7.0], 0)]
    fn test_argmax(#[case] values: &[f32], #[case] expected: usize) {
        assert_eq!(argmax(values), expected);
    }

    #[test]
    fn test_ensure_architecture() {
        let p = ModelParameters {
            architecture: vec![8, 24, 4],
            values: vec![],
        };
        assert!(p.ensure_architecture(&[8, 24, 4]).is_ok());
        let err = p.ensure_architecture(&[8, 16, 4]).unwrap_err();
        assert!(matches!(err.downcast_ref::<QlError>(), Some(QlError::IncompatibleModel { .. })));
    }
}
