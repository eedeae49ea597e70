use anyhow::Result;
use burn::backend::{Autodiff, NdArray};
use burn::module::{ModuleMapper, Param};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::ElementConversion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ml_model::model::{ModelParameters, QValueModel, TrainingSample};
use crate::prelude::{ModelActionType, QlError};

type TrainingBackend = Autodiff<NdArray<f32>>;

pub struct FeedForwardParameter {
    /// Layer sizes - input layer first, action space last
    pub layer_sizes: Vec<usize>,
    pub learning_rate: f64,
    /// Fixed seed for the weight initialization; random when `None`
    pub seed: Option<u64>,
}

impl Default for FeedForwardParameter {
    fn default() -> Self {
        Self {
            layer_sizes: vec![8, 24, 24, 4],
            learning_rate: 0.001,
            seed: None,
        }
    }
}

/// Dense layers with ReLU in between; the last layer is linear and yields one Q-value per action
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> QNetwork<B> {
    fn new(
        layer_sizes: &[usize],
        device: &B::Device,
    ) -> Self {
        let layers = layer_sizes
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).with_initializer(Initializer::Zeros).init(device))
            .collect();
        Self { layers }
    }

    pub fn forward(
        &self,
        input: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let output_layer = self.layers.len() - 1;
        self.layers.iter().enumerate().fold(input, |x, (i, layer)| {
            let x = layer.forward(x);
            if i < output_layer {
                relu(x)
            } else {
                x
            }
        })
    }
}

/// Collects all parameter tensors flattened, in traversal order (per layer: weight, bias)
struct ParameterCollector<B: Backend> {
    tensors: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParameterCollector<B> {
    fn map_float<const D: usize>(
        &mut self,
        param: Param<Tensor<B, D>>,
    ) -> Param<Tensor<B, D>> {
        let val = param.val();
        let total_size: usize = val.dims().iter().product();
        self.tensors.push(val.reshape([total_size]));
        param
    }
}

/// Replaces all parameter tensors with consecutive slices of `values`, in traversal order
struct ParameterWriter<'a, B: Backend> {
    values: &'a [f32],
    offset: usize,
    device: B::Device,
}

impl<B: Backend> ModuleMapper<B> for ParameterWriter<'_, B> {
    fn map_float<const D: usize>(
        &mut self,
        param: Param<Tensor<B, D>>,
    ) -> Param<Tensor<B, D>> {
        let shape = param.val().dims();
        let total_size: usize = shape.iter().product();
        let slice = &self.values[self.offset..self.offset + total_size];
        self.offset += total_size;
        let tensor = Tensor::<B, 1>::from_floats(slice, &self.device).reshape(shape).require_grad();
        Param::initialized(param.id.clone(), tensor)
    }
}

/// Fully connected Q-network on the ndarray backend, trained with Adam on the mean squared error
/// of the taken action's Q-value.
pub struct FeedForwardModel {
    layer_sizes: Vec<usize>,
    parameter_count: usize,
    network: QNetwork<TrainingBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<TrainingBackend>, TrainingBackend>,
    learning_rate: f64,
    device: <TrainingBackend as Backend>::Device,
}

impl FeedForwardModel {
    pub fn new(param: &FeedForwardParameter) -> Result<Self> {
        let sizes = &param.layer_sizes;
        if sizes.len() < 2 || sizes.iter().any(|&s| s == 0) {
            return Err(QlError::Numeric(format!("invalid layer sizes {:?}", sizes)).into());
        }
        let action_space = sizes[sizes.len() - 1];
        if action_space > ModelActionType::MAX as usize {
            return Err(QlError::Numeric(format!("action space {} too large", action_space)).into());
        }

        let device = <TrainingBackend as Backend>::Device::default();
        let optimizer = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(1e-7)
            .init();

        let mut model = Self {
            layer_sizes: sizes.clone(),
            parameter_count: sizes.windows(2).map(|w| w[0] * w[1] + w[1]).sum(),
            network: QNetwork::new(sizes, &device),
            optimizer,
            learning_rate: param.learning_rate,
            device,
        };
        let initial_values = glorot_uniform(sizes, param.seed);
        model.write_values(&initial_values);
        Ok(model)
    }

    fn check_input(
        &self,
        state: &[f32],
    ) -> Result<()> {
        if state.len() != self.input_len() {
            return Err(QlError::Numeric(format!(
                "state length {} does not match model input length {}",
                state.len(),
                self.input_len()
            ))
            .into());
        }
        Ok(())
    }

    /// `values` must hold exactly `parameter_count` entries
    fn write_values(
        &mut self,
        values: &[f32],
    ) {
        let mut writer = ParameterWriter {
            values,
            offset: 0,
            device: self.device.clone(),
        };
        self.network = self.network.clone().map(&mut writer);
    }
}

/// Glorot uniform weights, zero biases; laid out in the network's parameter traversal order
fn glorot_uniform(
    layer_sizes: &[usize],
    seed: Option<u64>,
) -> Vec<f32> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut values = vec![];
    for w in layer_sizes.windows(2) {
        let (input_len, output_len) = (w[0], w[1]);
        let limit = (6.0 / (input_len + output_len) as f32).sqrt();
        values.extend((0..input_len * output_len).map(|_| rng.gen_range(-limit..limit)));
        values.extend(std::iter::repeat(0.0).take(output_len));
    }
    values
}

impl QValueModel for FeedForwardModel {
    fn input_len(&self) -> usize { self.layer_sizes[0] }

    fn action_space(&self) -> ModelActionType { self.layer_sizes[self.layer_sizes.len() - 1] as ModelActionType }

    fn predict(
        &self,
        state: &[f32],
    ) -> Result<Vec<f32>> {
        self.check_input(state)?;
        let input = Tensor::<TrainingBackend, 1>::from_floats(state, &self.device).reshape([1, state.len()]);
        let q_values = self.network.forward(input).into_data();
        q_values.to_vec::<f32>().map_err(|e| QlError::Numeric(format!("reading Q-values: {:?}", e)).into())
    }

    fn train_batch(
        &mut self,
        batch: &[TrainingSample],
    ) -> Result<f32> {
        if batch.is_empty() {
            return Err(QlError::numeric("empty training batch").into());
        }
        for sample in batch {
            self.check_input(sample.state)?;
            if sample.action >= self.action_space() {
                return Err(QlError::InvalidAction(sample.action).into());
            }
        }

        let n = batch.len();
        let states: Vec<f32> = batch.iter().flat_map(|s| s.state.iter().copied()).collect();
        let actions: Vec<i64> = batch.iter().map(|s| s.action as i64).collect();
        let targets: Vec<f32> = batch.iter().map(|s| s.target_q_value).collect();

        let states = Tensor::<TrainingBackend, 1>::from_floats(states.as_slice(), &self.device).reshape([n, self.input_len()]);
        let actions = Tensor::<TrainingBackend, 1, Int>::from_ints(actions.as_slice(), &self.device).reshape([n, 1]);
        let targets = Tensor::<TrainingBackend, 1>::from_floats(targets.as_slice(), &self.device).reshape([n, 1]);

        // only the Q-value of the taken action contributes to the loss
        let predicted = self.network.forward(states).gather(1, actions);
        let loss = MseLoss::new().forward(predicted, targets, Reduction::Mean);

        let loss_value: f32 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(QlError::Numeric(format!("non-finite loss {}", loss_value)).into());
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        self.network = self.optimizer.step(self.learning_rate, self.network.clone(), grads);
        Ok(loss_value)
    }

    fn parameters(&self) -> ModelParameters {
        let mut collector = ParameterCollector { tensors: vec![] };
        let _ = self.network.clone().map(&mut collector);
        let values = collector
            .tensors
            .into_iter()
            .flat_map(|t| t.into_data().iter::<f32>().collect::<Vec<_>>())
            .collect();
        ModelParameters {
            architecture: self.layer_sizes.clone(),
            values,
        }
    }

    fn set_parameters(
        &mut self,
        parameters: &ModelParameters,
    ) -> Result<()> {
        parameters.ensure_architecture(&self.layer_sizes)?;
        if parameters.values.len() != self.parameter_count {
            return Err(QlError::Numeric(format!(
                "expected {} parameter values, got {}",
                self.parameter_count,
                parameters.values.len()
            ))
            .into());
        }
        self.write_values(&parameters.values);
        Ok(())
    }
}
